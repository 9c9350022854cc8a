use std::sync::Mutex;

use quanta::{Clock, Instant};

use super::{lock, Aggregator, AggregatorError, Capabilities, LastValue};
use crate::number::{Number, NumberKind};

/// Tracks only the most recently reported value.
pub struct LastValueAggregator {
    clock: Clock,
    current: Mutex<Option<(Number, Instant)>>,
    checkpoint: Mutex<Option<(Number, Instant)>>,
}

impl LastValueAggregator {
    pub fn new(clock: Clock) -> Self {
        LastValueAggregator {
            clock,
            current: Mutex::new(None),
            checkpoint: Mutex::new(None),
        }
    }
}

impl Aggregator for LastValueAggregator {
    fn update(&self, number: Number, _kind: NumberKind) {
        let now = self.clock.now();
        *lock(&self.current) = Some((number, now));
    }

    fn checkpoint(&self, _kind: NumberKind) -> bool {
        let value = lock(&self.current).take();
        let updated = value.is_some();
        *lock(&self.checkpoint) = value;
        updated
    }

    fn capabilities(&self) -> Capabilities<'_> {
        Capabilities {
            last_value: Some(self),
            ..Default::default()
        }
    }
}

impl LastValue for LastValueAggregator {
    fn last_value(&self) -> Result<(Number, Instant), AggregatorError> {
        let checkpoint = *lock(&self.checkpoint);
        checkpoint.ok_or(AggregatorError::NoValue)
    }
}
