//! Ordered field-list primitives shared by the engine, the overlay and editor sessions.

use crate::error::ValidationError;
use crate::model::{FieldId, FieldReference};
use ahash::{AHashMap, AHashSet};
use itertools::Itertools;

/// Moves a single element: remove at `from`, insert at `to`.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> Result<(), ValidationError> {
    let len = items.len();
    if from >= len {
        return Err(ValidationError::IndexOutOfBounds { index: from, len });
    }
    if to >= len {
        return Err(ValidationError::IndexOutOfBounds { index: to, len });
    }
    if from != to {
        let item = items.remove(from);
        items.insert(to, item);
    }
    Ok(())
}

pub fn field_ids(fields: &[FieldReference]) -> Vec<FieldId> {
    fields.iter().map(|r| r.field_id).collect()
}

/// Drops every reference whose field id was already seen, keeping the first.
pub fn dedup_references(fields: Vec<FieldReference>) -> Vec<FieldReference> {
    fields.into_iter().unique_by(|r| r.field_id).collect()
}

/// What a call to attach existing fields means for a given current list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachIntent {
    /// Every requested id is already present; nothing changes.
    Unchanged,
    /// Append these ids, in request order, at the end.
    Append(Vec<FieldId>),
    /// Replace the order wholesale with the requested permutation.
    Reorder(Vec<FieldId>),
}

/// Disambiguates append from reorder.
///
/// A request with the same length as the current list that is a permutation of it is
/// a reorder; anything else appends the ids that are missing.
pub fn classify_attach(current: &[FieldId], requested: &[FieldId]) -> AttachIntent {
    if requested.len() == current.len() && !current.is_empty() && is_permutation(current, requested)
    {
        return if requested == current {
            AttachIntent::Unchanged
        } else {
            AttachIntent::Reorder(requested.to_vec())
        };
    }

    let present: AHashSet<FieldId> = current.iter().copied().collect();
    let missing: Vec<FieldId> = requested
        .iter()
        .copied()
        .filter(|id| !present.contains(id))
        .unique()
        .collect();

    if missing.is_empty() {
        AttachIntent::Unchanged
    } else {
        AttachIntent::Append(missing)
    }
}

fn is_permutation(current: &[FieldId], requested: &[FieldId]) -> bool {
    let mut counts: AHashMap<FieldId, i64> = AHashMap::new();
    for id in current {
        *counts.entry(*id).or_default() += 1;
    }
    for id in requested {
        *counts.entry(*id).or_default() -= 1;
    }
    counts.values().all(|c| *c == 0)
}

/// Applies an intent to a reference list, preserving each existing binding's metadata.
pub fn apply_attach(current: &[FieldReference], intent: &AttachIntent) -> Vec<FieldReference> {
    match intent {
        AttachIntent::Unchanged => current.to_vec(),
        AttachIntent::Append(ids) => current
            .iter()
            .copied()
            .chain(ids.iter().map(|id| FieldReference::new(*id)))
            .collect(),
        AttachIntent::Reorder(order) => reorder_references(current, order),
    }
}

/// Rebuilds `current` in the order given by `order`. References missing from `order`
/// keep their relative order at the end.
pub fn reorder_references(current: &[FieldReference], order: &[FieldId]) -> Vec<FieldReference> {
    let by_id: AHashMap<FieldId, FieldReference> =
        current.iter().map(|r| (r.field_id, *r)).collect();
    let ordered: AHashSet<FieldId> = order.iter().copied().collect();

    order
        .iter()
        .unique()
        .filter_map(|id| by_id.get(id).copied())
        .chain(
            current
                .iter()
                .filter(|r| !ordered.contains(&r.field_id))
                .copied(),
        )
        .collect()
}
