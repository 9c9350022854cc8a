use std::cmp::Ordering;
use std::sync::Mutex;

use super::{lock, Aggregator, AggregatorError, Capabilities, MinMaxSumCount, Sum};
use crate::number::{Number, NumberKind};

#[derive(Clone, Copy, Debug)]
struct State {
    min: Number,
    max: Number,
    sum: Number,
    count: u64,
}

/// Summarizes the interval into min, max, sum and count without retaining points.
#[derive(Debug, Default)]
pub struct MinMaxSumCountAggregator {
    current: Mutex<Option<State>>,
    checkpoint: Mutex<Option<State>>,
}

impl MinMaxSumCountAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T, F>(&self, f: F) -> Result<T, AggregatorError>
    where
        F: FnOnce(&State) -> T,
    {
        lock(&self.checkpoint)
            .as_ref()
            .map(f)
            .ok_or(AggregatorError::EmptyDataSet)
    }
}

impl Aggregator for MinMaxSumCountAggregator {
    fn update(&self, number: Number, kind: NumberKind) {
        let mut current = lock(&self.current);
        match current.as_mut() {
            None => {
                *current = Some(State {
                    min: number,
                    max: number,
                    sum: number,
                    count: 1,
                })
            }
            Some(state) => {
                if number.compare(kind, state.min) == Ordering::Less {
                    state.min = number;
                }
                if number.compare(kind, state.max) == Ordering::Greater {
                    state.max = number;
                }
                state.sum = state.sum.add(kind, number);
                state.count += 1;
            }
        }
    }

    fn checkpoint(&self, _kind: NumberKind) -> bool {
        let state = lock(&self.current).take();
        let updated = state.is_some();
        *lock(&self.checkpoint) = state;
        updated
    }

    fn capabilities(&self) -> Capabilities<'_> {
        Capabilities {
            min_max_sum_count: Some(self),
            sum: Some(self),
            ..Default::default()
        }
    }
}

impl MinMaxSumCount for MinMaxSumCountAggregator {
    fn min(&self) -> Result<Number, AggregatorError> {
        self.read(|s| s.min)
    }

    fn max(&self) -> Result<Number, AggregatorError> {
        self.read(|s| s.max)
    }

    fn sum(&self) -> Result<Number, AggregatorError> {
        self.read(|s| s.sum)
    }

    fn count(&self) -> Result<u64, AggregatorError> {
        Ok(self.read(|s| s.count).unwrap_or(0))
    }
}

impl Sum for MinMaxSumCountAggregator {
    fn sum(&self) -> Result<Number, AggregatorError> {
        MinMaxSumCount::sum(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarizes_interval() {
        let agg = MinMaxSumCountAggregator::new();
        for v in [4, -2, 10, 1] {
            agg.update(Number::from_i64(v), NumberKind::I64);
        }
        assert!(agg.checkpoint(NumberKind::I64));

        assert_eq!(agg.min().unwrap().as_i64(), -2);
        assert_eq!(agg.max().unwrap().as_i64(), 10);
        assert_eq!(MinMaxSumCount::sum(&agg).unwrap().as_i64(), 13);
        assert_eq!(agg.count().unwrap(), 4);
    }

    #[test]
    fn no_distribution_capability() {
        let agg = MinMaxSumCountAggregator::new();
        let caps = agg.capabilities();
        assert!(caps.min_max_sum_count.is_some());
        assert!(caps.distribution.is_none());
        assert!(caps.points.is_none());
    }

    #[test]
    fn empty_interval() {
        let agg = MinMaxSumCountAggregator::new();
        agg.update(Number::from_f64(1.0), NumberKind::F64);
        assert!(agg.checkpoint(NumberKind::F64));
        assert!(!agg.checkpoint(NumberKind::F64));
        assert_eq!(agg.max(), Err(AggregatorError::EmptyDataSet));
        assert_eq!(agg.count(), Ok(0));
    }
}
