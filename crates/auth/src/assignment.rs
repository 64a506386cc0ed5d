//! Role → permission assignment reconciliation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::PermissionId;

/// Writes needed to move a role from its current permission set to a desired one.
///
/// Both sides are plain set differences; duplicates in the inputs collapse, so
/// applying `to_add` can never create a duplicate `(role, permission)` pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDiff {
    pub to_add: Vec<PermissionId>,
    pub to_remove: Vec<PermissionId>,
}

impl PermissionDiff {
    /// `to_add = desired − current`, `to_remove = current − desired` (both sorted).
    pub fn compute<C, D>(current: C, desired: D) -> Self
    where
        C: IntoIterator<Item = PermissionId>,
        D: IntoIterator<Item = PermissionId>,
    {
        let current: BTreeSet<PermissionId> = current.into_iter().collect();
        let desired: BTreeSet<PermissionId> = desired.into_iter().collect();

        Self {
            to_add: desired.difference(&current).copied().collect(),
            to_remove: current.difference(&desired).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use retailpos_core::AggregateId;

    fn perm() -> PermissionId {
        PermissionId::new(AggregateId::new())
    }

    #[test]
    fn diff_adds_missing_and_removes_extra() {
        let (p1, p2, p3) = (perm(), perm(), perm());

        let diff = PermissionDiff::compute([p1, p2], [p2, p3]);
        assert_eq!(diff.to_add, vec![p3]);
        assert_eq!(diff.to_remove, vec![p1]);
    }

    #[test]
    fn identical_sets_produce_empty_diff() {
        let (p1, p2) = (perm(), perm());
        let diff = PermissionDiff::compute([p1, p2], [p2, p1]);
        assert!(diff.is_empty());
        assert!(diff.to_add.is_empty() && diff.to_remove.is_empty());
    }

    #[test]
    fn duplicate_desired_ids_collapse() {
        let p1 = perm();
        let diff = PermissionDiff::compute(Vec::new(), [p1, p1, p1]);
        assert_eq!(diff.to_add, vec![p1]);
        assert!(diff.to_remove.is_empty());
    }

    #[test]
    fn empty_desired_set_removes_everything() {
        let current = [perm(), perm(), perm()];
        let diff = PermissionDiff::compute(current, Vec::new());
        let mut expected = current.to_vec();
        expected.sort();
        assert_eq!(diff.to_remove, expected);
        assert!(diff.to_add.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: applying the diff yields exactly the desired set, and a
        /// second diff against that result is empty.
        #[test]
        fn apply_reaches_desired_and_is_idempotent(
            current_mask in prop::collection::vec(any::<bool>(), 8),
            desired_mask in prop::collection::vec(any::<bool>(), 8),
        ) {
            let universe: Vec<PermissionId> = (0..8).map(|_| perm()).collect();
            let pick = |mask: &[bool]| -> BTreeSet<PermissionId> {
                universe
                    .iter()
                    .zip(mask)
                    .filter(|(_, keep)| **keep)
                    .map(|(id, _)| *id)
                    .collect()
            };
            let mut current = pick(&current_mask);
            let desired = pick(&desired_mask);

            let diff = PermissionDiff::compute(current.clone(), desired.clone());
            for id in &diff.to_remove {
                current.remove(id);
            }
            current.extend(diff.to_add.iter().copied());
            prop_assert_eq!(&current, &desired);

            let again = PermissionDiff::compute(current, desired);
            prop_assert!(again.is_empty());
        }
    }
}
