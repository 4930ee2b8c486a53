//! Learner data services over the document store
//!
//! - Custom vocabulary units and their modules
//! - Custom grammar units and their lessons
//! - Chat rooms and messages

pub mod chat;
pub mod custom_grammar;
pub mod custom_vocabulary;

pub use chat::ChatService;
pub use custom_grammar::CustomGrammarService;
pub use custom_vocabulary::CustomVocabularyService;

/// `{prefix}_{millis}`, bumped until it does not collide with `taken`
pub(crate) fn timestamped_id(prefix: &str, millis: i64, taken: impl Fn(&str) -> bool) -> String {
    let mut stamp = millis;
    loop {
        let id = format!("{prefix}_{stamp}");
        if !taken(&id) {
            return id;
        }
        stamp += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamped_id_skips_taken() {
        assert_eq!(timestamped_id("module", 5, |_| false), "module_5");
        assert_eq!(
            timestamped_id("lesson", 5, |id| id == "lesson_5" || id == "lesson_6"),
            "lesson_7"
        );
    }
}
