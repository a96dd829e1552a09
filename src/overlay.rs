//! Transient ordering/membership overrides shown while a write is in flight.
//!
//! An entry records the canonical order it was staged against (`baseline`) and the
//! order it predicts (`candidate`). Canonical state always wins: the entry is dropped
//! as soon as canonical matches the candidate, or moves anywhere else.

use crate::model::{FieldId, FieldReference, StepId, ViewId};
use crate::ordering::field_ids;
use ahash::AHashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Identifies the list an overlay applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayKey {
    View(ViewId),
    Step(StepId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayEntry {
    pub baseline: Vec<FieldId>,
    pub candidate: Vec<FieldReference>,
}

/// Result of comparing an overlay entry against canonical state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Canonical has not moved yet; keep showing the candidate.
    Pending,
    /// Canonical caught up with the candidate.
    Converged,
    /// Canonical changed to something other than the candidate.
    Superseded,
}

pub fn compare(
    candidate: &[FieldReference],
    baseline: &[FieldId],
    canonical: &[FieldReference],
) -> Reconciliation {
    let canonical_ids = field_ids(canonical);
    if canonical_ids == field_ids(candidate) {
        Reconciliation::Converged
    } else if canonical_ids == baseline {
        Reconciliation::Pending
    } else {
        Reconciliation::Superseded
    }
}

#[derive(Debug, Default)]
pub struct OptimisticOverlay {
    entries: AHashMap<OverlayKey, OverlayEntry>,
}

impl OptimisticOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: OverlayKey) -> Option<&OverlayEntry> {
        self.entries.get(&key)
    }

    /// Records the predicted order for `key`, replacing any earlier prediction but
    /// keeping the baseline of the oldest outstanding one.
    pub fn stage(
        &mut self,
        key: OverlayKey,
        canonical: &[FieldReference],
        candidate: Vec<FieldReference>,
    ) {
        let baseline = match self.entries.get(&key) {
            Some(existing) => existing.baseline.clone(),
            None => field_ids(canonical),
        };
        self.entries.insert(
            key,
            OverlayEntry {
                baseline,
                candidate,
            },
        );
    }

    pub fn discard(&mut self, key: OverlayKey) -> Option<OverlayEntry> {
        self.entries.remove(&key)
    }

    /// Compares the entry for `key` with canonical state and drops it unless still pending.
    pub fn reconcile(
        &mut self,
        key: OverlayKey,
        canonical: &[FieldReference],
    ) -> Option<Reconciliation> {
        let entry = self.entries.get(&key)?;
        let outcome = compare(&entry.candidate, &entry.baseline, canonical);
        if outcome != Reconciliation::Pending {
            debug!(?key, ?outcome, "Clearing optimistic overlay");
            self.entries.remove(&key);
        }
        Some(outcome)
    }

    /// Reconciles every entry against `canonical`, which returns `None` for sources that
    /// no longer exist. Returns the number of entries still pending.
    pub fn reconcile_all<F>(&mut self, canonical: F) -> usize
    where
        F: Fn(OverlayKey) -> Option<Vec<FieldReference>>,
    {
        self.entries.retain(|key, entry| match canonical(*key) {
            Some(current) => {
                compare(&entry.candidate, &entry.baseline, &current) == Reconciliation::Pending
            }
            None => false,
        });
        self.entries.len()
    }

    /// The list to display: canonical, unless a pending overlay exists for `key`.
    pub fn apply(&mut self, key: OverlayKey, canonical: &[FieldReference]) -> Vec<FieldReference> {
        match self.reconcile(key, canonical) {
            Some(Reconciliation::Pending) => self
                .entries
                .get(&key)
                .map(|e| e.candidate.clone())
                .unwrap_or_else(|| canonical.to_vec()),
            _ => canonical.to_vec(),
        }
    }
}

/// A shared overlay, readable by the presentation layer while the engine awaits storage.
#[derive(Debug, Clone, Default)]
pub struct OverlayHandle(Arc<Mutex<OptimisticOverlay>>);

impl OverlayHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(
        &self,
        key: OverlayKey,
        canonical: &[FieldReference],
        candidate: Vec<FieldReference>,
    ) {
        self.0.lock().stage(key, canonical, candidate);
    }

    pub fn discard(&self, key: OverlayKey) {
        self.0.lock().discard(key);
    }

    pub fn reconcile(
        &self,
        key: OverlayKey,
        canonical: &[FieldReference],
    ) -> Option<Reconciliation> {
        self.0.lock().reconcile(key, canonical)
    }

    pub fn apply(&self, key: OverlayKey, canonical: &[FieldReference]) -> Vec<FieldReference> {
        self.0.lock().apply(key, canonical)
    }

    pub fn reconcile_all<F>(&self, canonical: F) -> usize
    where
        F: Fn(OverlayKey) -> Option<Vec<FieldReference>>,
    {
        self.0.lock().reconcile_all(canonical)
    }

    pub fn pending(&self, key: OverlayKey) -> Option<OverlayEntry> {
        self.0.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(ids: &[FieldId]) -> Vec<FieldReference> {
        ids.iter().map(|id| FieldReference::new(*id)).collect()
    }

    #[test]
    fn pending_overlay_is_shown_until_canonical_catches_up() {
        let mut overlay = OptimisticOverlay::new();
        let key = OverlayKey::View(7);
        overlay.stage(key, &refs(&[1, 2, 3]), refs(&[3, 1, 2]));

        assert_eq!(overlay.apply(key, &refs(&[1, 2, 3])), refs(&[3, 1, 2]));
        assert_eq!(overlay.apply(key, &refs(&[3, 1, 2])), refs(&[3, 1, 2]));
        assert!(overlay.is_empty());
    }

    #[test]
    fn canonical_change_elsewhere_discards_overlay() {
        let mut overlay = OptimisticOverlay::new();
        let key = OverlayKey::Step(4);
        overlay.stage(key, &refs(&[1, 2]), refs(&[2, 1]));

        assert_eq!(overlay.apply(key, &refs(&[1, 2, 9])), refs(&[1, 2, 9]));
        assert!(overlay.get(key).is_none());
    }

    #[test]
    fn view_and_step_keys_do_not_collide() {
        let mut overlay = OptimisticOverlay::new();
        overlay.stage(OverlayKey::View(1), &refs(&[1, 2]), refs(&[2, 1]));
        assert_eq!(overlay.apply(OverlayKey::Step(1), &refs(&[1, 2])), refs(&[1, 2]));
        assert_eq!(overlay.len(), 1);
    }

    #[test]
    fn restaging_keeps_the_original_baseline() {
        let mut overlay = OptimisticOverlay::new();
        let key = OverlayKey::View(2);
        overlay.stage(key, &refs(&[1, 2, 3]), refs(&[2, 1, 3]));
        overlay.stage(key, &refs(&[2, 1, 3]), refs(&[2, 3, 1]));

        let entry = overlay.get(key).unwrap();
        assert_eq!(entry.baseline, vec![1, 2, 3]);
        assert_eq!(overlay.reconcile(key, &refs(&[1, 2, 3])), Some(Reconciliation::Pending));
    }
}
