use lib_feedpulse::ports::Presentation;

/// Headless stand-in for the UI: records the effects in the log.
#[derive(Debug, Default)]
pub struct LogPresentation;

impl Presentation for LogPresentation {
    fn apply_theme(&self, theme: &str) {
        log::info!("Theme '{}' applied.", theme);
    }

    fn activate_share_service(&self, service: &str) {
        log::info!("Share service '{}' activated.", service);
    }
}
