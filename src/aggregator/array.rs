use std::sync::Mutex;

use super::{
    lock, Aggregator, AggregatorError, Capabilities, Distribution, MinMaxSumCount, Points, Sum,
};
use crate::number::{Number, NumberKind};

#[derive(Default)]
struct Sorted {
    kind: Option<NumberKind>,
    points: Vec<Number>,
    sum: Number,
}

/// Retains every point observed in the interval.
///
/// Points are sorted at checkpoint time, which makes exact quantiles, minimum and maximum
/// available alongside the raw points themselves.
#[derive(Default)]
pub struct ArrayAggregator {
    current: Mutex<Vec<Number>>,
    checkpoint: Mutex<Sorted>,
}

impl ArrayAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_points<T, F>(&self, f: F) -> Result<T, AggregatorError>
    where
        F: FnOnce(&[Number]) -> T,
    {
        let checkpoint = lock(&self.checkpoint);
        if checkpoint.points.is_empty() {
            return Err(AggregatorError::EmptyDataSet);
        }
        Ok(f(&checkpoint.points))
    }
}

impl Aggregator for ArrayAggregator {
    fn update(&self, number: Number, _kind: NumberKind) {
        lock(&self.current).push(number);
    }

    fn checkpoint(&self, kind: NumberKind) -> bool {
        let mut points = std::mem::take(&mut *lock(&self.current));
        points.sort_unstable_by(|a, b| a.compare(kind, *b));
        let sum = points
            .iter()
            .fold(Number::default(), |acc, n| acc.add(kind, *n));

        let updated = !points.is_empty();
        *lock(&self.checkpoint) = Sorted {
            kind: Some(kind),
            points,
            sum,
        };
        updated
    }

    fn capabilities(&self) -> Capabilities<'_> {
        Capabilities {
            points: Some(self),
            min_max_sum_count: Some(self),
            distribution: Some(self),
            sum: Some(self),
            last_value: None,
        }
    }
}

impl Points for ArrayAggregator {
    fn points(&self) -> Result<Vec<Number>, AggregatorError> {
        Ok(lock(&self.checkpoint).points.clone())
    }
}

impl MinMaxSumCount for ArrayAggregator {
    fn min(&self) -> Result<Number, AggregatorError> {
        self.with_points(|p| p[0])
    }

    fn max(&self) -> Result<Number, AggregatorError> {
        self.with_points(|p| p[p.len() - 1])
    }

    fn sum(&self) -> Result<Number, AggregatorError> {
        Ok(lock(&self.checkpoint).sum)
    }

    fn count(&self) -> Result<u64, AggregatorError> {
        Ok(lock(&self.checkpoint).points.len() as u64)
    }
}

impl Sum for ArrayAggregator {
    fn sum(&self) -> Result<Number, AggregatorError> {
        MinMaxSumCount::sum(self)
    }
}

impl Distribution for ArrayAggregator {
    fn quantile(&self, q: f64) -> Result<Number, AggregatorError> {
        if !(0.0..=1.0).contains(&q) {
            return Err(AggregatorError::InvalidQuantile(q));
        }
        self.with_points(|p| {
            if q == 0.0 || p.len() == 1 {
                return p[0];
            }
            if q == 1.0 {
                return p[p.len() - 1];
            }
            let position = (p.len() - 1) as f64 * q;
            p[position.ceil() as usize]
        })
    }
}

impl std::fmt::Debug for ArrayAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let checkpoint = lock(&self.checkpoint);
        f.debug_struct("ArrayAggregator")
            .field("kind", &checkpoint.kind)
            .field("points", &checkpoint.points.len())
            .finish()
    }
}
