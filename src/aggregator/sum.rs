use std::sync::atomic::{AtomicU64, Ordering};

use super::{Aggregator, AggregatorError, Capabilities, Sum};
use crate::number::{Number, NumberKind};

/// Keeps a running total of every measurement in the interval.
#[derive(Debug, Default)]
pub struct SumAggregator {
    current: AtomicU64,
    updates: AtomicU64,
    checkpoint: AtomicU64,
}

impl SumAggregator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Aggregator for SumAggregator {
    fn update(&self, number: Number, kind: NumberKind) {
        match kind {
            // two's complement addition is the same for both integer kinds
            NumberKind::I64 | NumberKind::U64 => {
                self.current.fetch_add(number.as_raw(), Ordering::AcqRel);
            }
            NumberKind::F64 => {
                let _ = self
                    .current
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                        Some(Number::from_raw(bits).add(kind, number).as_raw())
                    });
            }
        }
        self.updates.fetch_add(1, Ordering::Release);
    }

    fn checkpoint(&self, _kind: NumberKind) -> bool {
        // the value is taken before the update count: an update caught between the two swaps
        // is either counted here or left in `current` for the next checkpoint
        let value = self.current.swap(0, Ordering::AcqRel);
        let updates = self.updates.swap(0, Ordering::AcqRel);
        self.checkpoint.store(value, Ordering::Release);
        updates > 0 || value != 0
    }

    fn capabilities(&self) -> Capabilities<'_> {
        Capabilities {
            sum: Some(self),
            ..Default::default()
        }
    }
}

impl Sum for SumAggregator {
    fn sum(&self) -> Result<Number, AggregatorError> {
        Ok(Number::from_raw(self.checkpoint.load(Ordering::Acquire)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn sums_integers() {
        let agg = SumAggregator::new();
        agg.update(Number::from_i64(10), NumberKind::I64);
        agg.update(Number::from_i64(-3), NumberKind::I64);
        assert!(agg.checkpoint(NumberKind::I64));
        assert_eq!(agg.sum().unwrap().as_i64(), 7);
    }

    #[test]
    fn sums_floats() {
        let agg = SumAggregator::new();
        agg.update(Number::from_f64(0.5), NumberKind::F64);
        agg.update(Number::from_f64(1.25), NumberKind::F64);
        assert!(agg.checkpoint(NumberKind::F64));
        assert_eq!(agg.sum().unwrap().as_f64(), 1.75);
    }

    #[test]
    fn checkpoint_resets_live_state() {
        let agg = SumAggregator::new();
        agg.update(Number::from_u64(4), NumberKind::U64);
        assert!(agg.checkpoint(NumberKind::U64));
        assert!(!agg.checkpoint(NumberKind::U64));
        assert_eq!(agg.sum().unwrap().as_u64(), 0);
    }

    #[test]
    fn only_sum_capability() {
        let agg = SumAggregator::new();
        let caps = agg.capabilities();
        assert!(caps.sum.is_some());
        assert!(caps.points.is_none());
        assert!(caps.min_max_sum_count.is_none());
        assert!(caps.distribution.is_none());
        assert!(caps.last_value.is_none());
    }

    #[test]
    fn concurrent_updates_are_never_lost() {
        const THREADS: u64 = 4;
        const UPDATES: u64 = 200_000;

        let agg = Arc::new(SumAggregator::new());
        let done = Arc::new(AtomicBool::new(false));

        let collector = {
            let agg = agg.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut exported = 0;
                let mut dropped = 0;
                loop {
                    let finished = done.load(Ordering::Acquire);
                    let reported = agg.checkpoint(NumberKind::U64);
                    let n = agg.sum().unwrap().as_u64();
                    if reported {
                        exported += n;
                    } else {
                        dropped += n;
                    }
                    if finished {
                        return (exported, dropped);
                    }
                }
            })
        };

        let writers: Vec<_> = (0..THREADS)
            .map(|_| {
                let agg = agg.clone();
                thread::spawn(move || {
                    for _ in 0..UPDATES {
                        agg.update(Number::from_u64(1), NumberKind::U64);
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        done.store(true, Ordering::Release);

        let (exported, dropped) = collector.join().unwrap();
        assert_eq!(dropped, 0);
        assert_eq!(exported, THREADS * UPDATES);
    }
}
