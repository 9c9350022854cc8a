use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use metrics::{CounterFn, GaugeFn, HistogramFn, Key};
use metrics_util::registry::Storage;
use portable_atomic::AtomicF64;

use crate::aggregator::Aggregator;
use crate::checkpoint::Record;
use crate::descriptor::{Descriptor, InstrumentKind, LabelSet};
use crate::number::{Number, NumberKind};
use crate::selector::AggregatorSelector;

/// A registered instrument and the aggregator chosen for it.
pub(crate) struct Instrument {
    descriptor: Descriptor,
    labels: LabelSet,
    aggregator: Arc<dyn Aggregator>,
}

impl Instrument {
    fn record(&self, number: Number) {
        self.aggregator.update(number, self.descriptor.number_kind());
    }

    /// Checkpoints the aggregator, returning a record if anything was measured since the
    /// previous checkpoint.
    pub(crate) fn checkpoint(&self) -> Option<Record> {
        if !self.aggregator.checkpoint(self.descriptor.number_kind()) {
            return None;
        }
        Some(Record::new(
            self.descriptor.clone(),
            self.labels.clone(),
            self.aggregator.clone(),
        ))
    }
}

pub(crate) struct CounterInstrument {
    pub(crate) instrument: Instrument,
    absolute: AtomicU64,
}

impl CounterFn for CounterInstrument {
    fn increment(&self, value: u64) {
        self.instrument.record(Number::from_u64(value));
    }

    fn absolute(&self, value: u64) {
        // a value below the previous one means the source counter was reset: it becomes the
        // new baseline and its whole value is growth
        let previous = self.absolute.swap(value, Ordering::AcqRel);
        let growth = if value >= previous { value - previous } else { value };
        if growth > 0 {
            self.instrument.record(Number::from_u64(growth));
        }
    }
}

pub(crate) struct GaugeInstrument {
    pub(crate) instrument: Instrument,
    value: AtomicF64,
}

impl GaugeFn for GaugeInstrument {
    fn increment(&self, value: f64) {
        let previous = self.value.fetch_add(value, Ordering::AcqRel);
        self.instrument.record(Number::from_f64(previous + value));
    }

    fn decrement(&self, value: f64) {
        let previous = self.value.fetch_sub(value, Ordering::AcqRel);
        self.instrument.record(Number::from_f64(previous - value));
    }

    fn set(&self, value: f64) {
        self.value.store(value, Ordering::Release);
        self.instrument.record(Number::from_f64(value));
    }
}

pub(crate) struct HistogramInstrument {
    pub(crate) instrument: Instrument,
}

impl HistogramFn for HistogramInstrument {
    fn record(&self, value: f64) {
        self.instrument.record(Number::from_f64(value));
    }
}

/// Registry storage that asks the selector for an aggregator whenever a new key shows up.
///
/// Counters are unsigned integer counters, gauges floating point observers and histograms
/// floating point measures.
pub(crate) struct InstrumentStorage {
    selector: Arc<dyn AggregatorSelector>,
}

impl InstrumentStorage {
    pub(crate) fn new(selector: Arc<dyn AggregatorSelector>) -> Self {
        InstrumentStorage { selector }
    }

    fn instrument(&self, key: &Key, kind: InstrumentKind, number_kind: NumberKind) -> Instrument {
        let descriptor = Descriptor::new(key.name(), kind, number_kind);
        let aggregator = self.selector.aggregator_for(&descriptor);
        Instrument {
            descriptor,
            labels: LabelSet::from(key),
            aggregator,
        }
    }
}

impl Storage<Key> for InstrumentStorage {
    type Counter = Arc<CounterInstrument>;
    type Gauge = Arc<GaugeInstrument>;
    type Histogram = Arc<HistogramInstrument>;

    fn counter(&self, key: &Key) -> Self::Counter {
        Arc::new(CounterInstrument {
            instrument: self.instrument(key, InstrumentKind::Counter, NumberKind::U64),
            absolute: AtomicU64::new(0),
        })
    }

    fn gauge(&self, key: &Key) -> Self::Gauge {
        Arc::new(GaugeInstrument {
            instrument: self.instrument(key, InstrumentKind::Observer, NumberKind::F64),
            value: AtomicF64::new(0.0),
        })
    }

    fn histogram(&self, key: &Key) -> Self::Histogram {
        Arc::new(HistogramInstrument {
            instrument: self.instrument(key, InstrumentKind::Measure, NumberKind::F64),
        })
    }
}
