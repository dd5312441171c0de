/// # Presentation
///
/// UI effects applied once a user is trusted.
pub trait Presentation: Send + Sync {
    fn apply_theme(&self, theme: &str);

    fn activate_share_service(&self, service: &str);
}
