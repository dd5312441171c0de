//! Effects applied once a user becomes trusted. Each is an independent
//! `SessionListener`; the only ordering guarantee is that all of them run
//! after the state is already `Trusted`.

use std::sync::Arc;

use crate::core::session_validator::{SessionEvent, SessionListener};
use crate::models::{NavigationTarget, ProfileData};
use crate::ports::{Navigator, Presentation};

fn trusted_profile(event: &SessionEvent) -> Option<&ProfileData> {
    match event {
        SessionEvent::Trusted(user) => user.profile(),
        _ => None,
    }
}

/// Reloads the page under the profile's language when it differs from the
/// locale the UI is served in.
pub struct LocaleRedirect {
    navigator: Arc<dyn Navigator>,
    ui_locale: Option<String>,
}

impl LocaleRedirect {
    pub fn new(navigator: Arc<dyn Navigator>, ui_locale: Option<String>) -> Self {
        Self { navigator, ui_locale }
    }

    /// `/en/feed/all` under `de` becomes `/de/feed/all`. `None` when the path
    /// carries no locale segment.
    pub fn localized_path(path: &str, from: &str, to: &str) -> Option<String> {
        let segment = format!("/{from}/");
        path.contains(&segment)
            .then(|| path.replacen(&segment, &format!("/{to}/"), 1))
    }
}

impl SessionListener for LocaleRedirect {
    fn on_session_event(&self, event: &SessionEvent) {
        let Some(language) = trusted_profile(event).and_then(|p| p.language.as_deref()) else {
            return;
        };
        let Some(current) = self.ui_locale.as_deref() else {
            return;
        };
        if language.is_empty() || language == current {
            return;
        }

        let path = self.navigator.current_path();
        match Self::localized_path(&path, current, language) {
            Some(location) => {
                log::info!("Switching UI locale {current} -> {language}.");
                if let Err(err) = self.navigator.navigate_to(NavigationTarget::Location(location)) {
                    log::warn!("Locale redirect failed: {err}");
                }
            }
            None => log::debug!("No '{current}' segment in '{path}', locale redirect skipped."),
        }
    }
}

/// Applies the profile theme.
pub struct ThemeApplier {
    presentation: Arc<dyn Presentation>,
}

impl ThemeApplier {
    pub fn new(presentation: Arc<dyn Presentation>) -> Self {
        Self { presentation }
    }
}

impl SessionListener for ThemeApplier {
    fn on_session_event(&self, event: &SessionEvent) {
        if let Some(theme) = trusted_profile(event).and_then(|p| p.theme.as_deref()) {
            if !theme.is_empty() {
                self.presentation.apply_theme(theme);
            }
        }
    }
}

/// Activates every share service named in the profile.
pub struct ShareServiceActivator {
    presentation: Arc<dyn Presentation>,
}

impl ShareServiceActivator {
    pub fn new(presentation: Arc<dyn Presentation>) -> Self {
        Self { presentation }
    }
}

impl SessionListener for ShareServiceActivator {
    fn on_session_event(&self, event: &SessionEvent) {
        let services = trusted_profile(event).and_then(|p| p.share_services.as_deref());
        for service in services.unwrap_or_default() {
            self.presentation.activate_share_service(service);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRecord;
    use crate::test_support::{RecordingNavigator, RecordingPresentation};

    fn trusted(profile: ProfileData) -> SessionEvent {
        SessionEvent::Trusted(Arc::new(UserRecord {
            profile_data: Some(profile),
            ..Default::default()
        }))
    }

    #[test]
    fn redirects_when_profile_language_differs() {
        let navigator = Arc::new(RecordingNavigator::default());
        navigator.set_path("/en/feed/all");
        let redirect = LocaleRedirect::new(navigator.clone(), Some("en".into()));

        redirect.on_session_event(&trusted(ProfileData {
            language: Some("de".into()),
            ..Default::default()
        }));
        assert_eq!(
            navigator.navigations(),
            vec![NavigationTarget::Location("/de/feed/all".into())]
        );
    }

    #[test]
    fn same_or_missing_language_stays() {
        let navigator = Arc::new(RecordingNavigator::default());
        navigator.set_path("/en/feed/all");
        let redirect = LocaleRedirect::new(navigator.clone(), Some("en".into()));

        redirect.on_session_event(&trusted(ProfileData {
            language: Some("en".into()),
            ..Default::default()
        }));
        redirect.on_session_event(&trusted(ProfileData::default()));
        redirect.on_session_event(&SessionEvent::LoggedOut);
        assert!(navigator.navigations().is_empty());
    }

    #[test]
    fn localized_path_replaces_first_segment_only() {
        assert_eq!(
            LocaleRedirect::localized_path("/en/feed/en/x", "en", "fr").as_deref(),
            Some("/fr/feed/en/x")
        );
        assert_eq!(LocaleRedirect::localized_path("/feed/all", "en", "fr"), None);
    }

    #[test]
    fn theme_and_share_services_are_applied() {
        let presentation = Arc::new(RecordingPresentation::default());
        let theme = ThemeApplier::new(presentation.clone());
        let share = ShareServiceActivator::new(presentation.clone());
        let event = trusted(ProfileData {
            theme: Some("indigo".into()),
            share_services: Some(vec!["pocket".into(), "email".into()]),
            ..Default::default()
        });

        theme.on_session_event(&event);
        share.on_session_event(&event);

        assert_eq!(presentation.themes(), vec!["indigo".to_string()]);
        assert_eq!(presentation.share_services(), vec!["pocket".to_string(), "email".to_string()]);
    }

    #[test]
    fn empty_profile_applies_nothing() {
        let presentation = Arc::new(RecordingPresentation::default());
        ThemeApplier::new(presentation.clone()).on_session_event(&trusted(ProfileData::default()));
        ShareServiceActivator::new(presentation.clone()).on_session_event(&trusted(ProfileData::default()));
        assert!(presentation.themes().is_empty());
        assert!(presentation.share_services().is_empty());
    }
}
