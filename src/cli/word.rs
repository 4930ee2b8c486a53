//! AI dictionary lookup

use crate::ai::tutor::WordDetails;
use crate::ai::Tutor;
use crate::error::{AppError, Result};

/// Look a word up and print its dictionary entry
pub async fn handle_word(word: String) -> Result<()> {
    let word = word.trim();
    if word.is_empty() {
        return Err(AppError::InvalidInput("No word provided".to_string()));
    }

    let tutor = Tutor::gemini()?;
    println!("Looking up '{}'...\n", word);
    let details = tutor.word_details(word).await?;
    print!("{}", format_details(&details));
    Ok(())
}

fn format_details(details: &WordDetails) -> String {
    let mut out = details.word.clone();
    if !details.pronunciation.is_empty() {
        out.push_str(&format!("  {}", details.pronunciation));
    }
    out.push('\n');

    for definition in &details.definitions {
        out.push_str(&format!("\n[{}] {}\n", definition.part_of_speech, definition.common_meanings));
        for (i, meaning) in definition.meanings.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", i + 1, meaning.meaning));
            for example in &meaning.examples {
                out.push_str(&format!("       {}\n", example));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::tutor::{WordDefinition, WordMeaning};

    #[test]
    fn test_format_details() {
        let details = WordDetails {
            word: "run".into(),
            pronunciation: "/rʌn/".into(),
            definitions: vec![WordDefinition {
                part_of_speech: "verb".into(),
                common_meanings: "chạy, điều hành".into(),
                meanings: vec![WordMeaning {
                    meaning: "chạy".into(),
                    examples: vec!["She runs every morning.".into()],
                }],
            }],
        };
        let text = format_details(&details);
        assert!(text.starts_with("run  /rʌn/\n"));
        assert!(text.contains("[verb] chạy, điều hành"));
        assert!(text.contains("  1. chạy\n"));
        assert!(text.contains("She runs every morning."));
    }
}
