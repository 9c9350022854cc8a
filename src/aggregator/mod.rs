//! Aggregators accumulate raw measurements for one record over a collection interval.
//!
//! Every aggregator keeps two states: the live state that [`Aggregator::update`] folds new
//! measurements into, and the checkpointed state produced by [`Aggregator::checkpoint`]. The
//! capability traits ([`Sum`], [`LastValue`], [`MinMaxSumCount`], [`Distribution`], [`Points`])
//! only ever read the checkpointed state, so an exporter sees a stable snapshot while
//! instruments keep recording.
use std::sync::{Mutex, MutexGuard, PoisonError};

use quanta::Instant;
use thiserror::Error;

use crate::number::{Number, NumberKind};

mod array;
pub use self::array::ArrayAggregator;

mod lastvalue;
pub use self::lastvalue::LastValueAggregator;

mod minmaxsumcount;
pub use self::minmaxsumcount::MinMaxSumCountAggregator;

mod sum;
pub use self::sum::SumAggregator;

/// Errors returned when a statistic cannot be produced for the checkpointed interval.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregatorError {
    #[error("the data set is empty")]
    EmptyDataSet,
    #[error("quantile {0} is outside of [0, 1]")]
    InvalidQuantile(f64),
    #[error("no value was reported")]
    NoValue,
}

pub trait Sum {
    fn sum(&self) -> Result<Number, AggregatorError>;
}

pub trait LastValue {
    /// Returns the most recent value and the time it was reported.
    fn last_value(&self) -> Result<(Number, Instant), AggregatorError>;
}

pub trait MinMaxSumCount {
    fn min(&self) -> Result<Number, AggregatorError>;
    fn max(&self) -> Result<Number, AggregatorError>;
    fn sum(&self) -> Result<Number, AggregatorError>;
    fn count(&self) -> Result<u64, AggregatorError>;
}

pub trait Distribution {
    fn quantile(&self, q: f64) -> Result<Number, AggregatorError>;
}

pub trait Points {
    fn points(&self) -> Result<Vec<Number>, AggregatorError>;
}

/// The capability views an aggregator exposes.
///
/// A single aggregator may fill in several slots at once, e.g. an array aggregator is a
/// [`Points`], a [`MinMaxSumCount`] and a [`Distribution`] at the same time.
#[derive(Clone, Copy, Default)]
pub struct Capabilities<'a> {
    pub points: Option<&'a dyn Points>,
    pub min_max_sum_count: Option<&'a dyn MinMaxSumCount>,
    pub distribution: Option<&'a dyn Distribution>,
    pub sum: Option<&'a dyn Sum>,
    pub last_value: Option<&'a dyn LastValue>,
}

pub trait Aggregator: Send + Sync {
    /// Folds one measurement into the live state.
    fn update(&self, number: Number, kind: NumberKind);

    /// Moves the live state into the checkpointed state and resets the live state.
    ///
    /// Returns `false` if no measurement was folded in since the previous checkpoint.
    fn checkpoint(&self, kind: NumberKind) -> bool;

    fn capabilities(&self) -> Capabilities<'_>;
}

#[inline]
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
