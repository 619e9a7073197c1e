//! Reorder engines.
//!
//! An engine turns the ordered list of stores flushed in one epoch into the
//! candidate sequences that could have reached media before a crash. Engines
//! work on indices into that list so the caller keeps ownership of the
//! stores while applying and reverting them.

use crate::sequence::{all_combinations, all_permutations, Combinations};
use pmreorder_log::{EngineKind, LogError};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Population cap per combination size for random sampling
pub const RANDOM_POPULATION_CAP: usize = 1000;

/// Default number of sequences drawn by the random engine
pub const DEFAULT_MAX_SEQ: usize = 3;

/// Candidate sequence generator
pub trait ReorderEngine: fmt::Debug {
    /// Engine name for logs
    fn name(&self) -> &'static str;

    /// Whether sequences are checked at barriers at all
    fn test_on_barrier(&self) -> bool {
        true
    }

    /// Sequences of indices into a list of `count` stores
    fn generate_sequence(&mut self, count: usize) -> Box<dyn Iterator<Item = Vec<usize>> + '_>;
}

/// Every permutation of every subset
#[derive(Debug, Clone, Default)]
pub struct FullReorderEngine;

impl ReorderEngine for FullReorderEngine {
    fn name(&self) -> &'static str {
        "ReorderFull"
    }

    fn generate_sequence(&mut self, count: usize) -> Box<dyn Iterator<Item = Vec<usize>> + '_> {
        Box::new(all_permutations(count))
    }
}

/// Prefixes `[]`, `[a]`, `[a, b]`, ...
#[derive(Debug, Clone, Default)]
pub struct AccumulativeReorderEngine;

impl ReorderEngine for AccumulativeReorderEngine {
    fn name(&self) -> &'static str {
        "ReorderAccumulative"
    }

    fn generate_sequence(&mut self, count: usize) -> Box<dyn Iterator<Item = Vec<usize>> + '_> {
        Box::new((0..=count).map(|len| (0..len).collect()))
    }
}

/// Prefixes of the reversed list
#[derive(Debug, Clone, Default)]
pub struct AccumulativeReverseReorderEngine;

impl ReorderEngine for AccumulativeReverseReorderEngine {
    fn name(&self) -> &'static str {
        "ReorderReverseAccumulative"
    }

    fn generate_sequence(&mut self, count: usize) -> Box<dyn Iterator<Item = Vec<usize>> + '_> {
        Box::new((0..=count).map(move |len| (0..len).map(|j| count - 1 - j).collect()))
    }
}

/// A slice of all combinations of all sizes, enumerated size-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlicePartialReorderEngine {
    start: usize,
    stop: Option<usize>,
    step: usize,
}

impl SlicePartialReorderEngine {
    /// Slice `[start:stop:step]`; a zero step is treated as one
    #[must_use]
    pub fn new(start: usize, stop: Option<usize>, step: usize) -> Self {
        Self {
            start,
            stop,
            step: step.max(1),
        }
    }
}

impl ReorderEngine for SlicePartialReorderEngine {
    fn name(&self) -> &'static str {
        "ReorderSlicePartial"
    }

    fn generate_sequence(&mut self, count: usize) -> Box<dyn Iterator<Item = Vec<usize>> + '_> {
        let take = match self.stop {
            Some(stop) => stop.saturating_sub(self.start),
            None => usize::MAX,
        };
        Box::new(
            all_combinations(count)
                .skip(self.start)
                .take(take)
                .step_by(self.step),
        )
    }
}

/// Predicate on the length of a combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeFilter {
    /// At least this many stores
    Min(usize),
    /// At most this many stores
    Max(usize),
    /// Between `lo` and `hi` stores, inclusive
    Between(usize, usize),
}

impl SizeFilter {
    /// Whether a sequence of `len` stores passes
    #[must_use]
    pub fn accepts(self, len: usize) -> bool {
        match self {
            Self::Min(min) => len >= min,
            Self::Max(max) => len <= max,
            Self::Between(lo, hi) => len >= lo && len <= hi,
        }
    }
}

/// All combinations whose size passes a [`SizeFilter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPartialReorderEngine {
    filter: SizeFilter,
}

impl FilterPartialReorderEngine {
    /// Engine keeping the combinations accepted by `filter`
    #[must_use]
    pub fn new(filter: SizeFilter) -> Self {
        Self { filter }
    }
}

impl ReorderEngine for FilterPartialReorderEngine {
    fn name(&self) -> &'static str {
        "ReorderFilterPartial"
    }

    fn generate_sequence(&mut self, count: usize) -> Box<dyn Iterator<Item = Vec<usize>> + '_> {
        let filter = self.filter;
        Box::new(all_combinations(count).filter(move |seq| filter.accepts(seq.len())))
    }
}

/// Up to `max_seq` combinations drawn without replacement
#[derive(Debug, Clone)]
pub struct RandomPartialReorderEngine {
    max_seq: usize,
    rng: ChaCha8Rng,
}

impl RandomPartialReorderEngine {
    /// Engine drawing `max_seq` sequences, seeded with `seed`
    #[must_use]
    pub fn new(max_seq: usize, seed: u64) -> Self {
        Self {
            max_seq,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl ReorderEngine for RandomPartialReorderEngine {
    fn name(&self) -> &'static str {
        "ReorderPartial"
    }

    fn generate_sequence(&mut self, count: usize) -> Box<dyn Iterator<Item = Vec<usize>> + '_> {
        let population: Vec<Vec<usize>> = (0..=count)
            .flat_map(|size| Combinations::new(count, size).take(RANDOM_POPULATION_CAP))
            .collect();
        let amount = self.max_seq.min(population.len());
        let picked = rand::seq::index::sample(&mut self.rng, population.len(), amount);
        let mut slots: Vec<Option<Vec<usize>>> = population.into_iter().map(Some).collect();
        let drawn: Vec<Vec<usize>> = picked
            .into_iter()
            .filter_map(|i| slots[i].take())
            .collect();
        Box::new(drawn.into_iter())
    }
}

/// The whole list, once
#[derive(Debug, Clone, Default)]
pub struct NoReorderEngine;

impl ReorderEngine for NoReorderEngine {
    fn name(&self) -> &'static str {
        "NoReorderDoCheck"
    }

    fn generate_sequence(&mut self, count: usize) -> Box<dyn Iterator<Item = Vec<usize>> + '_> {
        Box::new(std::iter::once((0..count).collect()))
    }
}

/// The whole list, once, with checking disabled
#[derive(Debug, Clone, Default)]
pub struct NoCheckerEngine;

impl ReorderEngine for NoCheckerEngine {
    fn name(&self) -> &'static str {
        "NoReorderNoCheck"
    }

    fn test_on_barrier(&self) -> bool {
        false
    }

    fn generate_sequence(&mut self, count: usize) -> Box<dyn Iterator<Item = Vec<usize>> + '_> {
        Box::new(std::iter::once((0..count).collect()))
    }
}

/// Buildable description of an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineSpec {
    /// [`NoCheckerEngine`]
    NoChecker,
    /// [`FullReorderEngine`]
    Full,
    /// [`NoReorderEngine`]
    NoReorder,
    /// [`AccumulativeReorderEngine`]
    Accumulative,
    /// [`AccumulativeReverseReorderEngine`]
    AccumulativeReverse,
    /// [`RandomPartialReorderEngine`]
    RandomPartial {
        /// Sequences drawn per barrier
        max_seq: usize,
    },
    /// [`SlicePartialReorderEngine`]
    SlicePartial {
        /// First combination index
        start: usize,
        /// One past the last combination index
        stop: Option<usize>,
        /// Stride
        step: usize,
    },
    /// [`FilterPartialReorderEngine`]
    FilterPartial(SizeFilter),
}

impl EngineSpec {
    /// Engine for a concrete marker kind; `None` for `ReorderDefault`
    #[must_use]
    pub fn for_kind(kind: EngineKind) -> Option<Self> {
        match kind {
            EngineKind::NoReorderNoCheck => Some(Self::NoChecker),
            EngineKind::ReorderFull => Some(Self::Full),
            EngineKind::NoReorderDoCheck => Some(Self::NoReorder),
            EngineKind::ReorderAccumulative => Some(Self::Accumulative),
            EngineKind::ReorderReverseAccumulative => Some(Self::AccumulativeReverse),
            EngineKind::ReorderPartial => Some(Self::RandomPartial {
                max_seq: DEFAULT_MAX_SEQ,
            }),
            EngineKind::ReorderDefault => None,
        }
    }

    /// Instantiate; `seed` only matters for random sampling
    #[must_use]
    pub fn build(self, seed: u64) -> Box<dyn ReorderEngine> {
        match self {
            Self::NoChecker => Box::new(NoCheckerEngine),
            Self::Full => Box::new(FullReorderEngine),
            Self::NoReorder => Box::new(NoReorderEngine),
            Self::Accumulative => Box::new(AccumulativeReorderEngine),
            Self::AccumulativeReverse => Box::new(AccumulativeReverseReorderEngine),
            Self::RandomPartial { max_seq } => Box::new(RandomPartialReorderEngine::new(max_seq, seed)),
            Self::SlicePartial { start, stop, step } => {
                Box::new(SlicePartialReorderEngine::new(start, stop, step))
            }
            Self::FilterPartial(filter) => Box::new(FilterPartialReorderEngine::new(filter)),
        }
    }
}

impl Default for EngineSpec {
    fn default() -> Self {
        Self::NoChecker
    }
}

impl FromStr for EngineSpec {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, LogError> {
        s.parse::<EngineKind>()
            .ok()
            .and_then(Self::for_kind)
            .ok_or_else(|| LogError::UnsupportedEngine {
                name: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequences(engine: &mut dyn ReorderEngine, count: usize) -> Vec<Vec<usize>> {
        engine.generate_sequence(count).collect()
    }

    #[test]
    fn test_full_yields_sixteen_for_three() {
        let seqs = sequences(&mut FullReorderEngine, 3);
        assert_eq!(seqs.len(), 16);
        assert_eq!(seqs[0], Vec::<usize>::new());
        assert!(seqs.contains(&vec![2, 0, 1]));
    }

    #[test]
    fn test_accumulative_prefixes() {
        let seqs = sequences(&mut AccumulativeReorderEngine, 3);
        assert_eq!(seqs, vec![vec![], vec![0], vec![0, 1], vec![0, 1, 2]]);
    }

    #[test]
    fn test_accumulative_reverse_prefixes() {
        let seqs = sequences(&mut AccumulativeReverseReorderEngine, 3);
        assert_eq!(seqs, vec![vec![], vec![2], vec![2, 1], vec![2, 1, 0]]);
        assert_eq!(sequences(&mut AccumulativeReverseReorderEngine, 0), vec![Vec::<usize>::new()]);
    }

    #[test]
    fn test_slice_partial() {
        let mut engine = SlicePartialReorderEngine::new(1, Some(7), 2);
        let seqs = sequences(&mut engine, 3);
        // [], [0], [1], [2], [0,1], [0,2], [1,2], [0,1,2]
        assert_eq!(seqs, vec![vec![0], vec![2], vec![0, 2]]);

        let mut open_ended = SlicePartialReorderEngine::new(6, None, 1);
        assert_eq!(sequences(&mut open_ended, 3), vec![vec![1, 2], vec![0, 1, 2]]);
    }

    #[test]
    fn test_filter_partial() {
        let mut min = FilterPartialReorderEngine::new(SizeFilter::Min(2));
        assert_eq!(sequences(&mut min, 3).len(), 4);

        let mut max = FilterPartialReorderEngine::new(SizeFilter::Max(1));
        assert_eq!(sequences(&mut max, 3), vec![vec![], vec![0], vec![1], vec![2]]);

        let mut between = FilterPartialReorderEngine::new(SizeFilter::Between(1, 2));
        assert_eq!(sequences(&mut between, 3).len(), 6);
    }

    #[test]
    fn test_random_partial_bounded_and_distinct() {
        let mut engine = RandomPartialReorderEngine::new(3, 7);
        let seqs = sequences(&mut engine, 4);
        assert_eq!(seqs.len(), 3);
        for (i, a) in seqs.iter().enumerate() {
            for b in &seqs[i + 1..] {
                assert_ne!(a, b);
            }
        }

        let mut small = RandomPartialReorderEngine::new(10, 7);
        assert_eq!(sequences(&mut small, 1).len(), 2);
    }

    #[test]
    fn test_random_partial_seeded() {
        let a = sequences(&mut RandomPartialReorderEngine::new(5, 42), 6);
        let b = sequences(&mut RandomPartialReorderEngine::new(5, 42), 6);
        assert_eq!(a, b);
    }

    #[test]
    fn test_no_reorder_engines() {
        assert_eq!(sequences(&mut NoReorderEngine, 3), vec![vec![0, 1, 2]]);
        assert_eq!(sequences(&mut NoCheckerEngine, 3), vec![vec![0, 1, 2]]);
        assert!(NoReorderEngine.test_on_barrier());
        assert!(!NoCheckerEngine.test_on_barrier());
    }

    #[test]
    fn test_spec_for_kind() {
        assert_eq!(EngineSpec::for_kind(EngineKind::ReorderFull), Some(EngineSpec::Full));
        assert_eq!(
            EngineSpec::for_kind(EngineKind::ReorderPartial),
            Some(EngineSpec::RandomPartial { max_seq: 3 })
        );
        assert_eq!(EngineSpec::for_kind(EngineKind::ReorderDefault), None);
        for kind in EngineKind::all().filter(|k| k.is_concrete()) {
            let engine = EngineSpec::for_kind(kind).unwrap().build(0);
            assert_eq!(engine.name(), kind.name());
        }
    }

    #[test]
    fn test_spec_from_str() {
        assert_eq!("ReorderAccumulative".parse::<EngineSpec>().unwrap(), EngineSpec::Accumulative);
        assert!("ReorderDefault".parse::<EngineSpec>().is_err());
        assert!("Nope".parse::<EngineSpec>().is_err());
    }
}
