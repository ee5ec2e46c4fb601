//! Partition assignment tracking and reporting.

use std::collections::BTreeSet;

use switchyard_core::{ConsumerState, TopicPartition};

/// The set of partitions a consumer currently owns.
///
/// Built from incremental `Assigned`/`Revoked` deltas. Kept sorted so
/// reports are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    partitions: BTreeSet<TopicPartition>,
}

impl Assignment {
    /// Creates an empty assignment.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            partitions: BTreeSet::new(),
        }
    }

    /// Adds partitions. Returns how many were not already owned.
    pub fn apply_assigned(&mut self, partitions: impl IntoIterator<Item = TopicPartition>) -> usize {
        partitions
            .into_iter()
            .filter(|tp| self.partitions.insert(tp.clone()))
            .count()
    }

    /// Removes partitions. Returns how many were owned.
    pub fn apply_revoked(&mut self, partitions: impl IntoIterator<Item = TopicPartition>) -> usize {
        partitions
            .into_iter()
            .filter(|tp| self.partitions.remove(tp))
            .count()
    }

    /// Drops every partition.
    pub fn clear(&mut self) {
        self.partitions.clear();
    }

    /// Number of owned partitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    /// Returns true if no partitions are owned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Public view of the assignment for a consumer in `state`.
    ///
    /// Defined (possibly empty) while the consumer is a group member,
    /// `None` otherwise.
    #[must_use]
    pub fn report(&self, state: ConsumerState) -> Option<Vec<TopicPartition>> {
        state
            .tracks_assignment()
            .then(|| self.partitions.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tp(topic: &str, partition: i32) -> TopicPartition {
        TopicPartition::new(topic, partition)
    }

    #[test]
    fn test_incremental_deltas() {
        let mut assignment = Assignment::new();
        assert_eq!(assignment.apply_assigned([tp("orders", 1), tp("orders", 0)]), 2);
        assert_eq!(assignment.apply_assigned([tp("orders", 1)]), 0);
        assert_eq!(assignment.apply_revoked([tp("orders", 1), tp("orders", 9)]), 1);

        assert_eq!(
            assignment.report(ConsumerState::Running),
            Some(vec![tp("orders", 0)])
        );
    }

    #[test]
    fn test_report_is_sorted() {
        let mut assignment = Assignment::new();
        assignment.apply_assigned([tp("orders", 2), tp("audit", 5), tp("orders", 0)]);

        let report = assignment.report(ConsumerState::Paused).unwrap();
        assert_eq!(report, vec![tp("audit", 5), tp("orders", 0), tp("orders", 2)]);
    }

    #[test]
    fn test_report_undefined_when_not_member() {
        let mut assignment = Assignment::new();
        assert_eq!(assignment.report(ConsumerState::Running), Some(Vec::new()));

        assignment.apply_assigned([tp("orders", 0)]);
        assert_eq!(assignment.report(ConsumerState::Created), None);
        assert_eq!(assignment.report(ConsumerState::Stopped), None);
    }

    proptest::proptest! {
        #[test]
        fn test_deltas_match_set_model(
            deltas in proptest::collection::vec(
                (proptest::bool::ANY, proptest::collection::vec(0i32..8, 0..6)),
                0..32,
            ),
        ) {
            let mut assignment = Assignment::new();
            let mut model = BTreeSet::new();
            for (assign, partitions) in deltas {
                let partitions: Vec<_> = partitions.into_iter().map(|p| tp("orders", p)).collect();
                if assign {
                    assignment.apply_assigned(partitions.iter().cloned());
                    model.extend(partitions);
                } else {
                    assignment.apply_revoked(partitions.iter().cloned());
                    for partition in &partitions {
                        model.remove(partition);
                    }
                }
            }
            let report = assignment.report(ConsumerState::Running).unwrap();
            proptest::prop_assert_eq!(report, model.into_iter().collect::<Vec<_>>());
        }
    }
}
