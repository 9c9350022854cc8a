use std::sync::Arc;

use crate::aggregator::Aggregator;
use crate::descriptor::{Descriptor, LabelSet};

/// One instrument and label set paired with the aggregator holding its checkpointed state.
#[derive(Clone)]
pub struct Record {
    descriptor: Descriptor,
    labels: LabelSet,
    aggregator: Arc<dyn Aggregator>,
}

impl Record {
    pub fn new(descriptor: Descriptor, labels: LabelSet, aggregator: Arc<dyn Aggregator>) -> Self {
        Record {
            descriptor,
            labels,
            aggregator,
        }
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn aggregator(&self) -> &dyn Aggregator {
        self.aggregator.as_ref()
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("descriptor", &self.descriptor)
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

/// Snapshot of every record updated during one collection interval.
///
/// Records are ordered by metric name and then by label set, so iterating the same checkpoint
/// always visits records in the same order.
#[derive(Clone, Debug, Default)]
pub struct Checkpoint {
    records: Vec<Record>,
}

impl Checkpoint {
    pub fn new(mut records: Vec<Record>) -> Self {
        records.sort_by(|a, b| {
            a.descriptor
                .name()
                .cmp(b.descriptor.name())
                .then_with(|| a.labels.cmp(&b.labels))
        });
        Checkpoint { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }
}

impl FromIterator<Record> for Checkpoint {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Checkpoint::new(iter.into_iter().collect())
    }
}
