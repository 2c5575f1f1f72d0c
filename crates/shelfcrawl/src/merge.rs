//! Reconciliation of candidate records against an existing collection.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{is_generic_subcategory, Record, RecordKey};

/// Counts produced by one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    /// Candidates whose key was not in the collection.
    pub added: usize,
    /// Existing records that changed.
    pub updated: usize,
    /// Candidates identical to what was stored.
    pub duplicates: usize,
}

impl MergeOutcome {
    /// Whether the collection changed and needs to be written.
    pub fn changed(&self) -> bool {
        self.added > 0 || self.updated > 0
    }

    /// Total candidates considered.
    pub fn seen(&self) -> usize {
        self.added + self.updated + self.duplicates
    }

    pub fn absorb(&mut self, other: MergeOutcome) {
        self.added += other.added;
        self.updated += other.updated;
        self.duplicates += other.duplicates;
    }
}

/// Merge `candidates` into `existing` in place.
///
/// New keys are appended in candidate order. For known keys, price and image
/// follow the candidate; category and subcategory follow the candidate unless
/// that would replace a specific subcategory with a generic one.
pub fn reconcile<I>(existing: &mut Vec<Record>, candidates: I) -> MergeOutcome
where
    I: IntoIterator<Item = Record>,
{
    let mut index: HashMap<RecordKey, usize> = existing
        .iter()
        .enumerate()
        .map(|(i, r)| (r.key(), i))
        .collect();

    let mut outcome = MergeOutcome::default();
    for candidate in candidates {
        let key = candidate.key();
        match index.get(&key).copied() {
            None => {
                index.insert(key, existing.len());
                existing.push(candidate);
                outcome.added += 1;
            }
            Some(i) => {
                if apply_update(&mut existing[i], candidate) {
                    outcome.updated += 1;
                } else {
                    outcome.duplicates += 1;
                }
            }
        }
    }
    outcome
}

/// Apply mutable fields from `candidate` to `stored`; true when anything changed.
fn apply_update(stored: &mut Record, candidate: Record) -> bool {
    let mut changed = false;

    let keeps_specific =
        is_generic_subcategory(&candidate.subcategory) && !is_generic_subcategory(&stored.subcategory);
    if !keeps_specific
        && (stored.category != candidate.category || stored.subcategory != candidate.subcategory)
    {
        stored.category = candidate.category;
        stored.subcategory = candidate.subcategory;
        changed = true;
    }

    if stored.price != candidate.price {
        stored.price = candidate.price;
        changed = true;
    }

    if stored.image != candidate.image {
        stored.image = candidate.image;
        changed = true;
    }

    changed
}
