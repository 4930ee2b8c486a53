//! Profile overlay: account details and display name editing

use crate::core::records::{UserProfile, UserRole};
use crate::tui::screens::TextInput;

#[derive(Debug, Default)]
pub struct ProfilePanel {
    /// The new name while editing
    pub editing: Option<TextInput>,
    pub saving: bool,
    pub error: Option<String>,
}

impl ProfilePanel {
    /// Start editing with the current name filled in
    pub fn start_editing(&mut self, current: &str) {
        let mut input = TextInput::new();
        input.set(current);
        self.editing = Some(input);
        self.error = None;
    }

    /// Leave edit mode; `false` when not editing
    pub fn cancel(&mut self) -> bool {
        self.error = None;
        self.editing.take().is_some()
    }

    /// The name to save, if editing and not already saving
    pub fn pending_name(&self) -> Option<String> {
        if self.saving {
            return None;
        }
        self.editing.as_ref().map(|input| input.value().to_string())
    }

    /// Record the outcome of a save
    pub fn finish(&mut self, result: Result<(), String>) {
        self.saving = false;
        match result {
            Ok(()) => {
                self.editing = None;
                self.error = None;
            }
            Err(message) => self.error = Some(message),
        }
    }
}

/// Whether the learner gets the admin badge
pub fn is_admin(profile: &UserProfile) -> bool {
    profile.is_admin || profile.role == UserRole::Admin
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_then_save() {
        let mut panel = ProfilePanel::default();
        assert!(panel.pending_name().is_none());

        panel.start_editing("Lan");
        assert_eq!(panel.pending_name().as_deref(), Some("Lan"));

        panel.saving = true;
        assert!(panel.pending_name().is_none(), "one save at a time");

        panel.finish(Err("offline".into()));
        assert!(panel.editing.is_some());
        assert_eq!(panel.error.as_deref(), Some("offline"));

        panel.saving = true;
        panel.finish(Ok(()));
        assert!(panel.editing.is_none());
        assert!(panel.error.is_none());
    }

    #[test]
    fn test_cancel() {
        let mut panel = ProfilePanel::default();
        assert!(!panel.cancel());
        panel.start_editing("Lan");
        assert!(panel.cancel());
    }

    #[test]
    fn test_admin_badge_from_flag_or_role() {
        let mut profile = UserProfile::new_learner("u1", "a@b.c", "An");
        assert!(!is_admin(&profile));
        profile.role = UserRole::Admin;
        assert!(is_admin(&profile));
        profile.role = UserRole::User;
        profile.is_admin = true;
        assert!(is_admin(&profile));
    }
}
