//! Specificity ranking for overload resolution.
//!
//! Candidates that tie on score are compared parameter by parameter: the
//! first parameter position where one declared type is strictly more
//! specific than the other decides.

use crossbind_core::{CallableCandidate, TypeHash, TypeKind};
use crossbind_registry::TypeRegistry;

/// Which side of a comparison is more specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preference {
    Lhs,
    Neither,
    Rhs,
}

/// Compare two declared parameter types.
///
/// Rules, first match wins:
/// 1. identical types: neither
/// 2. one assignable from the other: the more derived one
/// 3. two numeric primitives: the narrower one (lower type code)
/// 4. two arrays: compare element types
/// 5. instances of the same generic definition: compare type arguments
///    left to right
/// 6. two delegates: more parameters wins, equal counts compare parameter
///    types pairwise
pub fn compare_types(registry: &TypeRegistry, lhs: TypeHash, rhs: TypeHash) -> Preference {
    if lhs == rhs {
        return Preference::Neither;
    }
    if registry.is_assignable(lhs, rhs) {
        return Preference::Rhs;
    }
    if registry.is_assignable(rhs, lhs) {
        return Preference::Lhs;
    }
    let (Some(left), Some(right)) = (registry.get(lhs), registry.get(rhs)) else {
        return Preference::Neither;
    };

    if let (Some(a), Some(b)) = (left.primitive_kind(), right.primitive_kind()) {
        if a.is_numeric() && b.is_numeric() {
            return prefer_lower(a.type_code(), b.type_code());
        }
        return Preference::Neither;
    }

    if let (TypeKind::Array { element: a }, TypeKind::Array { element: b }) =
        (&left.kind, &right.kind)
    {
        return compare_types(registry, *a, *b);
    }

    if left.generic_definition.is_some() && left.generic_definition == right.generic_definition {
        return compare_lists(registry, &left.type_args, &right.type_args);
    }

    if let (Some((left_params, _)), Some((right_params, _))) =
        (left.delegate_signature(), right.delegate_signature())
    {
        return match left_params.len().cmp(&right_params.len()) {
            std::cmp::Ordering::Greater => Preference::Lhs,
            std::cmp::Ordering::Less => Preference::Rhs,
            std::cmp::Ordering::Equal => compare_lists(registry, left_params, right_params),
        };
    }

    Preference::Neither
}

/// Compare two candidates' parameter lists left to right.
pub fn compare_candidates(
    registry: &TypeRegistry,
    lhs: &CallableCandidate,
    rhs: &CallableCandidate,
) -> Preference {
    let left: Vec<TypeHash> = lhs.params.iter().map(|p| p.data_type).collect();
    let right: Vec<TypeHash> = rhs.params.iter().map(|p| p.data_type).collect();
    compare_lists(registry, &left, &right)
}

fn compare_lists(registry: &TypeRegistry, lhs: &[TypeHash], rhs: &[TypeHash]) -> Preference {
    lhs.iter()
        .zip(rhs)
        .map(|(l, r)| compare_types(registry, *l, *r))
        .find(|p| *p != Preference::Neither)
        .unwrap_or(Preference::Neither)
}

fn prefer_lower(a: u8, b: u8) -> Preference {
    match a.cmp(&b) {
        std::cmp::Ordering::Less => Preference::Lhs,
        std::cmp::Ordering::Greater => Preference::Rhs,
        std::cmp::Ordering::Equal => Preference::Neither,
    }
}

/// Pick the most specific candidate among equally scored ones.
///
/// The current best is replaced only when a later candidate is strictly more
/// specific, so exact ties resolve to the first in input order. Returns the
/// index of the winner and the indices it does not strictly beat.
pub fn find_most_specific(
    registry: &TypeRegistry,
    candidates: &[&CallableCandidate],
) -> Option<(usize, Vec<usize>)> {
    if candidates.is_empty() {
        return None;
    }
    let mut best = 0;
    for (index, challenger) in candidates.iter().enumerate().skip(1) {
        if compare_candidates(registry, candidates[best], challenger) == Preference::Rhs {
            best = index;
        }
    }
    let undominated = candidates
        .iter()
        .enumerate()
        .filter(|(index, other)| {
            *index != best
                && compare_candidates(registry, candidates[best], other) != Preference::Lhs
        })
        .map(|(index, _)| index)
        .collect();
    Some((best, undominated))
}
