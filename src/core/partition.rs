//! Splitting a unit's word list into study modules
//!
//! A long unit is broken into `ceil(n / target)` contiguous modules whose
//! sizes differ by at most one. The larger modules come first, so when the
//! plain fixed-width windowing is already balanced both layouts coincide.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::core::content::Flashcard;

/// Default number of words per module
pub const DEFAULT_MODULE_SIZE: NonZeroUsize = match NonZeroUsize::new(20) {
    Some(size) => size,
    None => unreachable!(),
};

/// A contiguous slice of a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module<T> {
    /// `module-N`, 1-based
    pub id: String,
    /// `Part N`, 1-based
    pub name: String,
    pub words: Vec<T>,
}

impl<T> Module<T> {
    pub fn word_count(&self) -> usize {
        self.words.len()
    }
}

pub type VocabularyModule = Module<Flashcard>;

/// Partition `items` into balanced modules of roughly `target` items
///
/// Empty input yields no modules. Concatenating the modules' words in
/// order reproduces `items` exactly.
pub fn partition<T: Clone>(items: &[T], target: NonZeroUsize) -> Vec<Module<T>> {
    module_sizes(items.len(), target)
        .into_iter()
        .scan(0usize, |start, size| {
            let slice = &items[*start..*start + size];
            *start += size;
            Some(slice)
        })
        .enumerate()
        .map(|(index, slice)| Module {
            id: format!("module-{}", index + 1),
            name: format!("Part {}", index + 1),
            words: slice.to_vec(),
        })
        .collect()
}

/// Sizes of the modules `partition` would produce for `n` items
pub fn module_sizes(n: usize, target: NonZeroUsize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }

    let count = n.div_ceil(target.get());
    let base = n / count;
    let larger = n % count;

    (0..count)
        .map(|index| if index < larger { base + 1 } else { base })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn numbers(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    /// Fixed-width windows of `ceil(n / ceil(n / target))`, last one shorter
    fn reference_windows(n: usize, target: usize) -> Vec<usize> {
        if n == 0 {
            return Vec::new();
        }
        let count = n.div_ceil(target);
        let per = n.div_ceil(count);
        (0..count)
            .map(|i| per.min(n.saturating_sub(i * per)))
            .filter(|&len| len > 0)
            .collect()
    }

    #[test]
    fn test_forty_seven_words_in_three_balanced_parts() {
        let modules = partition(&numbers(47), DEFAULT_MODULE_SIZE);
        let sizes: Vec<_> = modules.iter().map(Module::word_count).collect();
        assert_eq!(sizes, vec![16, 16, 15]);

        let names: Vec<_> = modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Part 1", "Part 2", "Part 3"]);
        let ids: Vec<_> = modules.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["module-1", "module-2", "module-3"]);

        assert_eq!(modules[0].words, (0..16).collect::<Vec<_>>());
        assert_eq!(modules[1].words, (16..32).collect::<Vec<_>>());
        assert_eq!(modules[2].words, (32..47).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_input_yields_no_modules() {
        assert!(partition::<usize>(&[], DEFAULT_MODULE_SIZE).is_empty());
        assert!(partition::<usize>(&[], size(1)).is_empty());
    }

    #[test]
    fn test_small_unit_is_a_single_module() {
        let modules = partition(&numbers(12), DEFAULT_MODULE_SIZE);
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].word_count(), 12);
        assert_eq!(modules[0].name, "Part 1");
    }

    #[test]
    fn test_unbalanced_windowing_is_rebalanced() {
        // Fixed windows of 3 would leave a lone trailing word: 3, 3, 3, 1
        assert_eq!(reference_windows(10, 3), vec![3, 3, 3, 1]);
        assert_eq!(module_sizes(10, size(3)), vec![3, 3, 2, 2]);
    }

    #[test]
    fn test_target_of_one_gives_singletons() {
        let modules = partition(&numbers(5), size(1));
        assert_eq!(modules.len(), 5);
        assert!(modules.iter().all(|m| m.word_count() == 1));
    }

    #[test]
    fn test_partition_properties_hold_across_sizes() {
        for n in 0..=120 {
            let items = numbers(n);
            for target in 1..=25 {
                let modules = partition(&items, size(target));

                let flattened: Vec<usize> =
                    modules.iter().flat_map(|m| m.words.iter().copied()).collect();
                assert_eq!(flattened, items, "coverage n={n} target={target}");

                assert_eq!(modules.len(), n.div_ceil(target), "count n={n} target={target}");

                if let (Some(max), Some(min)) = (
                    modules.iter().map(Module::word_count).max(),
                    modules.iter().map(Module::word_count).min(),
                ) {
                    assert!(max - min <= 1, "balance n={n} target={target}");
                    assert!(min > 0);
                }

                let reference = reference_windows(n, target);
                let reference_balanced = match (reference.iter().max(), reference.iter().min()) {
                    (Some(max), Some(min)) => max - min <= 1,
                    _ => true,
                };
                if reference_balanced {
                    assert_eq!(
                        module_sizes(n, size(target)),
                        reference,
                        "reference agreement n={n} target={target}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_partition_is_deterministic() {
        let items = numbers(73);
        assert_eq!(
            partition(&items, DEFAULT_MODULE_SIZE),
            partition(&items, DEFAULT_MODULE_SIZE)
        );
    }
}
