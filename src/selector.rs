use std::sync::Arc;

use quanta::Clock;

use crate::aggregator::{
    Aggregator, ArrayAggregator, LastValueAggregator, MinMaxSumCountAggregator, SumAggregator,
};
use crate::descriptor::{Descriptor, InstrumentKind};

/// The aggregation algorithm chosen for an instrument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AggregatorKind {
    Sum,
    LastValue,
    Array,
    MinMaxSumCount,
}

impl AggregatorKind {
    pub fn build(self, clock: &Clock) -> Arc<dyn Aggregator> {
        match self {
            AggregatorKind::Sum => Arc::new(SumAggregator::new()),
            AggregatorKind::LastValue => Arc::new(LastValueAggregator::new(clock.clone())),
            AggregatorKind::Array => Arc::new(ArrayAggregator::new()),
            AggregatorKind::MinMaxSumCount => Arc::new(MinMaxSumCountAggregator::new()),
        }
    }
}

/// Picks the aggregator used to accumulate measurements for each registered instrument.
pub trait AggregatorSelector: Send + Sync {
    fn aggregator_for(&self, descriptor: &Descriptor) -> Arc<dyn Aggregator>;
}

/// Maps an instrument kind to the aggregator datadog expects for it.
///
/// Observers keep their last value, measures keep every point so histograms and quantiles can
/// be computed at export time, and everything else is summed.
pub fn select(kind: InstrumentKind) -> AggregatorKind {
    match kind {
        InstrumentKind::Observer => AggregatorKind::LastValue,
        InstrumentKind::Measure => AggregatorKind::Array,
        _ => AggregatorKind::Sum,
    }
}

/// Default selector, see [`select`].
#[derive(Clone)]
pub struct DogstatsdSelector {
    clock: Clock,
}

impl DogstatsdSelector {
    pub fn new() -> Self {
        Self::with_clock(Clock::new())
    }

    pub fn with_clock(clock: Clock) -> Self {
        DogstatsdSelector { clock }
    }
}

impl Default for DogstatsdSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregatorSelector for DogstatsdSelector {
    fn aggregator_for(&self, descriptor: &Descriptor) -> Arc<dyn Aggregator> {
        select(descriptor.instrument_kind()).build(&self.clock)
    }
}

/// Like [`DogstatsdSelector`], but measures only keep min, max, sum and count.
///
/// Memory per measure stays constant regardless of the number of points, at the cost of
/// quantiles and raw points at export time.
#[derive(Clone)]
pub struct InexpensiveSelector {
    clock: Clock,
}

impl InexpensiveSelector {
    pub fn new() -> Self {
        Self::with_clock(Clock::new())
    }

    pub fn with_clock(clock: Clock) -> Self {
        InexpensiveSelector { clock }
    }
}

impl Default for InexpensiveSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregatorSelector for InexpensiveSelector {
    fn aggregator_for(&self, descriptor: &Descriptor) -> Arc<dyn Aggregator> {
        let kind = match select(descriptor.instrument_kind()) {
            AggregatorKind::Array => AggregatorKind::MinMaxSumCount,
            other => other,
        };
        kind.build(&self.clock)
    }
}
