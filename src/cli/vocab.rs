//! Vocabulary CLI command handlers

use std::num::NonZeroUsize;

use crate::cli::commands::VocabCommand;
use crate::core::config::Config;
use crate::core::content::Catalog;
use crate::core::partition::{partition, VocabularyModule};
use crate::error::{AppError, Result};

/// Handle vocabulary commands
pub fn handle_vocab(command: VocabCommand) -> Result<()> {
    let catalog = Catalog::builtin()?;
    match command {
        VocabCommand::Units => {
            print!("{}", format_units(catalog));
            Ok(())
        }
        VocabCommand::Modules { unit, size } => {
            let size = match size {
                Some(size) => NonZeroUsize::new(size).ok_or_else(|| {
                    AppError::InvalidInput("Module size must be at least 1".to_string())
                })?,
                None => Config::load()?.module_size(),
            };
            let unit = catalog
                .find_unit(&unit)
                .ok_or_else(|| AppError::UnitNotFound(unit.clone()))?;

            let modules = partition(&unit.words(), size);
            println!("{} ({} words, {} modules)", unit.name, unit.word_count(), modules.len());
            print!("{}", format_modules(&modules));
            Ok(())
        }
    }
}

/// One line per unit, grouped under its classroom and grade
fn format_units(catalog: &Catalog) -> String {
    let mut out = String::new();
    let mut heading = String::new();
    for (classroom, grade, unit) in catalog.units() {
        let current = format!("{} › {}", classroom.name, grade.name);
        if current != heading {
            if !heading.is_empty() {
                out.push('\n');
            }
            out.push_str(&current);
            out.push('\n');
            heading = current;
        }
        out.push_str(&format!("  {}  ({} words)\n", unit.name, unit.word_count()));
    }
    out
}

fn format_modules(modules: &[VocabularyModule]) -> String {
    modules
        .iter()
        .map(|module| {
            let words: Vec<&str> = module.words.iter().map(|w| w.headword()).collect();
            format!(
                "  {}  {:>2} words  {}\n",
                module.name,
                module.word_count(),
                words.join(", ")
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_are_grouped_by_grade() {
        let catalog = Catalog::builtin().unwrap();
        let listing = format_units(catalog);
        let headings = listing.lines().filter(|l| !l.starts_with(' ') && !l.is_empty()).count();
        let grades: usize = catalog.classrooms.iter().map(|c| c.grades.len()).sum();
        assert_eq!(headings, grades);
        for (_, _, unit) in catalog.units() {
            assert!(listing.contains(&unit.name));
        }
    }

    #[test]
    fn test_module_listing_covers_every_word() {
        let catalog = Catalog::builtin().unwrap();
        let (_, _, unit) = catalog.units().next().unwrap();
        let modules = partition(&unit.words(), NonZeroUsize::new(5).unwrap());
        let listing = format_modules(&modules);
        assert_eq!(listing.lines().count(), modules.len());
        assert!(listing.starts_with("  Part 1 "));
    }
}
