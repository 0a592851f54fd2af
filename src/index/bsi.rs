use roaring::RoaringBitmap;
use crate::bitmap::algebra::{self, Set};
use crate::core::types::RecordId;

/// Bit-sliced index over one numeric field.
///
/// Every record stores `value - min` as a fixed-width word. `zeros[level]`
/// holds the ids whose bit at `level` (0 = most significant) is 0; a 1 bit
/// is implied by presence.
#[derive(Debug, Clone)]
pub struct Bsi {
    min: i64,
    max: i64,
    width: usize,
    presence: RoaringBitmap,
    zeros: Vec<RoaringBitmap>,
}

impl Bsi {
    pub fn new(min: i64, max: i64) -> Self {
        let max = max.max(min);
        let span = (max as i128 - min as i128) as u64;
        // ceil(log2(span + 1)), at least one slice
        let width = ((u64::BITS - span.leading_zeros()) as usize).max(1);

        Bsi {
            min,
            max,
            width,
            presence: RoaringBitmap::new(),
            zeros: vec![RoaringBitmap::new(); width],
        }
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn presence(&self) -> &RoaringBitmap {
        &self.presence
    }

    pub fn len(&self) -> u64 {
        self.presence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presence.is_empty()
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.presence.contains(id)
    }

    pub fn in_domain(&self, value: i64) -> bool {
        value >= self.min && value <= self.max
    }

    fn offset(&self, value: i64) -> u64 {
        (value as i128 - self.min as i128) as u64
    }

    fn bit(&self, word: u64, level: usize) -> bool {
        (word >> (self.width - 1 - level)) & 1 == 1
    }

    /// Index `value` for `id`. Out-of-domain values are ignored and `false`
    /// is returned.
    pub fn add(&mut self, id: RecordId, value: i64) -> bool {
        if !self.in_domain(value) {
            return false;
        }
        if self.presence.contains(id) {
            self.remove(id);
        }

        let word = self.offset(value);
        self.presence.insert(id);
        for level in 0..self.width {
            if !self.bit(word, level) {
                self.zeros[level].insert(id);
            }
        }
        true
    }

    pub fn remove(&mut self, id: RecordId) -> bool {
        if !self.presence.remove(id) {
            return false;
        }
        for slice in &mut self.zeros {
            slice.remove(id);
        }
        true
    }

    /// Exchange the stored values of `a` and `b`.
    pub fn swap(&mut self, a: RecordId, b: RecordId) {
        algebra::swap_membership(&mut self.presence, a, b);
        for slice in &mut self.zeros {
            algebra::swap_membership(slice, a, b);
        }
    }

    /// Rebuild the stored value of `id` from its slices.
    pub fn value_of(&self, id: RecordId) -> Option<i64> {
        if !self.presence.contains(id) {
            return None;
        }
        let word = (0..self.width)
            .filter(|&level| !self.zeros[level].contains(id))
            .fold(0u64, |acc, level| acc | 1 << (self.width - 1 - level));
        Some((self.min as i128 + word as i128) as i64)
    }

    /// Ids whose value lies in `[from, to]`. Omitted bounds default to the
    /// domain bounds.
    pub fn get_bitmap(&self, from: Option<i64>, to: Option<i64>) -> Set<'_> {
        let from = from.unwrap_or(self.min);
        let to = to.unwrap_or(self.max);
        if from > to || from > self.max || to < self.min {
            return algebra::empty();
        }

        let from = self.offset(from.max(self.min));
        let to = self.offset(to.min(self.max));

        let upper = self.at_most(to);
        if from == 0 {
            upper
        } else {
            algebra::and_not(upper, self.at_most(from - 1))
        }
    }

    /// Ids whose offset is `<= word`.
    fn at_most(&self, word: u64) -> Set<'_> {
        self.at_most_from(0, word)
    }

    fn at_most_from(&self, level: usize, word: u64) -> Set<'_> {
        let zeros = algebra::persisted(&self.zeros[level]);
        let last = level + 1 == self.width;

        if self.bit(word, level) {
            // A 0 here is below the bound whatever follows
            if last {
                return algebra::persisted(&self.presence);
            }
            algebra::or(zeros, self.at_most_from(level + 1, word))
        } else {
            if last {
                return zeros;
            }
            algebra::and(zeros, self.at_most_from(level + 1, word))
        }
    }

    /// Lazily order `candidates` by value without materialising values.
    /// Ties come out in ascending id order; candidates without a value
    /// follow every valued one.
    pub fn sort(&self, candidates: &RoaringBitmap, ascending: bool) -> BsiSort {
        let valued = candidates & &self.presence;
        let missing = candidates - &self.presence;
        let zeros = self.zeros.iter().map(|slice| slice & &valued).collect();

        let mut stack = Vec::new();
        if !valued.is_empty() {
            stack.push((0, valued));
        }

        BsiSort {
            width: self.width,
            ascending,
            zeros,
            stack,
            current: None,
            missing: Some(missing),
        }
    }
}

/// Finite, non-restartable value-ordered id sequence produced by `Bsi::sort`.
pub struct BsiSort {
    width: usize,
    ascending: bool,
    zeros: Vec<RoaringBitmap>,
    stack: Vec<(usize, RoaringBitmap)>,
    current: Option<roaring::bitmap::IntoIter>,
    missing: Option<RoaringBitmap>,
}

impl Iterator for BsiSort {
    type Item = RecordId;

    fn next(&mut self) -> Option<RecordId> {
        loop {
            if let Some(iter) = self.current.as_mut() {
                if let Some(id) = iter.next() {
                    return Some(id);
                }
                self.current = None;
            }

            let Some((level, group)) = self.stack.pop() else {
                let missing = self.missing.take()?;
                self.current = Some(missing.into_iter());
                continue;
            };

            if group.len() < 2 || level >= self.width {
                self.current = Some(group.into_iter());
                continue;
            }

            let zero = &group & &self.zeros[level];
            let one = group - &zero;
            let (first, second) = if self.ascending { (zero, one) } else { (one, zero) };

            if !second.is_empty() {
                self.stack.push((level + 1, second));
            }
            if !first.is_empty() {
                self.stack.push((level + 1, first));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn ids(set: &RoaringBitmap) -> Vec<u32> {
        set.iter().collect()
    }

    fn sample() -> Bsi {
        let mut bsi = Bsi::new(1, 5);
        for id in 1..=5u32 {
            bsi.add(id, id as i64);
        }
        bsi
    }

    #[test]
    fn width_covers_the_domain() {
        assert_eq!(Bsi::new(1, 5).width(), 3);
        assert_eq!(Bsi::new(0, 7).width(), 3);
        assert_eq!(Bsi::new(0, 8).width(), 4);
        assert_eq!(Bsi::new(3, 3).width(), 1);
        assert_eq!(Bsi::new(i64::MIN, i64::MAX).width(), 64);
    }

    #[test]
    fn out_of_domain_values_are_ignored() {
        let mut bsi = Bsi::new(1, 5);
        assert!(!bsi.add(1, 0));
        assert!(!bsi.add(1, 6));
        assert!(bsi.is_empty());
    }

    #[test]
    fn ranges() {
        let bsi = sample();
        assert_eq!(ids(&bsi.get_bitmap(Some(2), Some(4))), vec![2, 3, 4]);
        assert_eq!(ids(&bsi.get_bitmap(Some(3), None)), vec![3, 4, 5]);
        assert_eq!(ids(&bsi.get_bitmap(None, Some(1))), vec![1]);
        assert_eq!(ids(&bsi.get_bitmap(Some(-10), Some(2))), vec![1, 2]);
        assert!(bsi.get_bitmap(Some(6), Some(9)).is_empty());
        assert!(bsi.get_bitmap(Some(4), Some(2)).is_empty());
    }

    #[test]
    fn remove_and_swap() {
        let mut bsi = sample();
        bsi.swap(1, 5);
        assert_eq!(bsi.value_of(1), Some(5));
        assert_eq!(bsi.value_of(5), Some(1));

        bsi.remove(3);
        assert_eq!(bsi.value_of(3), None);
        bsi.swap(3, 4);
        assert_eq!(bsi.value_of(3), Some(4));
        assert_eq!(bsi.value_of(4), None);
    }

    #[test]
    fn sort_orders_by_value_then_id() {
        let mut bsi = Bsi::new(0, 10);
        bsi.add(1, 7);
        bsi.add(2, 3);
        bsi.add(3, 7);
        bsi.add(4, 0);
        let candidates: RoaringBitmap = [1, 2, 3, 4, 9].into_iter().collect();

        let asc: Vec<u32> = bsi.sort(&candidates, true).collect();
        assert_eq!(asc, vec![4, 2, 1, 3, 9]);
        let desc: Vec<u32> = bsi.sort(&candidates, false).collect();
        assert_eq!(desc, vec![1, 3, 2, 4, 9]);
    }

    fn build(min: i64, span: i64, entries: &[(u32, i64)]) -> (Bsi, BTreeMap<u32, i64>) {
        let mut bsi = Bsi::new(min, min + span);
        let mut values = BTreeMap::new();
        for &(id, offset) in entries {
            let value = min + offset % (span + 1);
            assert!(bsi.add(id, value));
            values.insert(id, value);
        }
        (bsi, values)
    }

    proptest! {
        #[test]
        fn point_lookup_finds_exactly_the_record(min in -1000i64..1000, span in 0i64..5000, offset in 0i64..5000, id in 0u32..10_000) {
            let value = min + offset % (span + 1);
            let mut bsi = Bsi::new(min, min + span);
            bsi.add(id, value);
            prop_assert_eq!(ids(&bsi.get_bitmap(Some(value), Some(value))), vec![id]);
        }

        #[test]
        fn range_matches_naive_filter(
            min in -100i64..100,
            span in 0i64..300,
            entries in proptest::collection::vec((0u32..200, 0i64..300), 0..60),
            from in -150i64..450,
            to in -150i64..450,
        ) {
            let (bsi, values) = build(min, span, &entries);
            let expected: Vec<u32> = values
                .iter()
                .filter(|&(_, &v)| from <= v && v <= to)
                .map(|(&id, _)| id)
                .collect();
            prop_assert_eq!(ids(&bsi.get_bitmap(Some(from), Some(to))), expected);
        }

        #[test]
        fn sort_is_a_stable_permutation(
            min in -100i64..100,
            span in 0i64..300,
            entries in proptest::collection::vec((0u32..200, 0i64..300), 0..60),
            ascending in any::<bool>(),
        ) {
            let (bsi, values) = build(min, span, &entries);
            let candidates: RoaringBitmap = values.keys().copied().collect();

            let mut expected: Vec<(i64, u32)> = values.iter().map(|(&id, &v)| (v, id)).collect();
            expected.sort_by(|a, b| {
                let by_value = if ascending { a.0.cmp(&b.0) } else { b.0.cmp(&a.0) };
                by_value.then(a.1.cmp(&b.1))
            });
            let expected: Vec<u32> = expected.into_iter().map(|(_, id)| id).collect();

            let sorted: Vec<u32> = bsi.sort(&candidates, ascending).collect();
            prop_assert_eq!(sorted, expected);
        }
    }
}
