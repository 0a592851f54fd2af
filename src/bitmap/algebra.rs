//! Set algebra over compressed id sets.
//!
//! A `Cow::Borrowed` set is persisted: it belongs to an index structure and
//! is never mutated, operations clone it on write. A `Cow::Owned` set is a
//! transient intermediate and is consumed in place by the next operation.

use std::borrow::Cow;
use roaring::RoaringBitmap;
use crate::core::types::RecordId;

pub type Set<'a> = Cow<'a, RoaringBitmap>;

pub fn empty<'a>() -> Set<'a> {
    Cow::Owned(RoaringBitmap::new())
}

pub fn persisted(set: &RoaringBitmap) -> Set<'_> {
    Cow::Borrowed(set)
}

pub fn is_persisted(set: &Set<'_>) -> bool {
    matches!(set, Cow::Borrowed(_))
}

pub fn and<'a>(a: Set<'a>, b: Set<'a>) -> Set<'a> {
    match (a, b) {
        (Cow::Owned(mut a), b) => {
            a &= b.as_ref();
            Cow::Owned(a)
        }
        (a, Cow::Owned(mut b)) => {
            b &= a.as_ref();
            Cow::Owned(b)
        }
        (Cow::Borrowed(a), Cow::Borrowed(b)) => Cow::Owned(a & b),
    }
}

pub fn or<'a>(a: Set<'a>, b: Set<'a>) -> Set<'a> {
    match (a, b) {
        (Cow::Owned(mut a), b) => {
            a |= b.as_ref();
            Cow::Owned(a)
        }
        (a, Cow::Owned(mut b)) => {
            b |= a.as_ref();
            Cow::Owned(b)
        }
        (Cow::Borrowed(a), Cow::Borrowed(b)) => Cow::Owned(a | b),
    }
}

/// `a \ b`
pub fn and_not<'a>(a: Set<'a>, b: Set<'a>) -> Set<'a> {
    match a {
        Cow::Owned(mut a) => {
            a -= b.as_ref();
            Cow::Owned(a)
        }
        Cow::Borrowed(a) => Cow::Owned(a - b.as_ref()),
    }
}

/// Complement of `a` restricted to `[min, max]`.
///
/// Queries complement against the index universe through `and_not`
/// instead, so deleted ids never reappear under NOT.
pub fn not<'a>(a: Set<'a>, min: RecordId, max: RecordId) -> Set<'a> {
    let mut full = RoaringBitmap::new();
    if min <= max {
        full.insert_range(min..=max);
    }
    full -= a.as_ref();
    Cow::Owned(full)
}

/// Intersection of every operand.
///
/// The accumulator is a transient operand when one exists, otherwise a clone
/// of the smallest persisted one; the rest are folded in smallest first.
pub fn and_many<'a>(mut sets: Vec<Set<'a>>) -> Set<'a> {
    if sets.len() <= 1 {
        return sets.pop().unwrap_or_else(empty);
    }

    let pick = sets
        .iter()
        .position(|s| !is_persisted(s))
        .or_else(|| {
            sets.iter()
                .enumerate()
                .min_by_key(|(_, s)| s.len())
                .map(|(i, _)| i)
        })
        .unwrap_or(0);

    let mut acc = sets.swap_remove(pick).into_owned();
    sets.sort_by_key(|s| s.len());

    for set in &sets {
        if acc.is_empty() {
            break;
        }
        acc &= set.as_ref();
    }
    Cow::Owned(acc)
}

/// Union of every operand, accumulating into the largest transient operand
/// when one exists, otherwise into a clone of the largest persisted one.
pub fn or_many<'a>(mut sets: Vec<Set<'a>>) -> Set<'a> {
    if sets.len() <= 1 {
        return sets.pop().unwrap_or_else(empty);
    }

    let largest = |sets: &[Set<'a>], transient: bool| {
        sets.iter()
            .enumerate()
            .filter(|(_, s)| !transient || !is_persisted(s))
            .max_by_key(|(_, s)| s.len())
            .map(|(i, _)| i)
    };
    let pick = largest(&sets, true)
        .or_else(|| largest(&sets, false))
        .unwrap_or(0);

    let mut acc = sets.swap_remove(pick).into_owned();
    for set in &sets {
        acc |= set.as_ref();
    }
    Cow::Owned(acc)
}

/// Move membership between `a` and `b` when exactly one of them is present.
pub fn swap_membership(set: &mut RoaringBitmap, a: RecordId, b: RecordId) {
    let has_a = set.contains(a);
    if has_a != set.contains(b) {
        let (from, to) = if has_a { (a, b) } else { (b, a) };
        set.remove(from);
        set.insert(to);
    }
}
