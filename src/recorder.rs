use std::sync::Arc;

use crate::checkpoint::Checkpoint;
use crate::exporter::{ExportError, ExportOptions, StatsdExporter};
use crate::registry::InstrumentStorage;
use crate::selector::AggregatorSelector;
use crate::sink::BufferSink;

use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use metrics_util::registry::Registry;

pub(crate) struct Inner {
    pub registry: Registry<Key, InstrumentStorage>,
}

impl Inner {
    pub(crate) fn new(selector: Arc<dyn AggregatorSelector>) -> Self {
        Inner {
            registry: Registry::new(InstrumentStorage::new(selector)),
        }
    }

    fn checkpoint(&self) -> Checkpoint {
        let mut records = Vec::new();

        for (_, counter) in self.registry.get_counter_handles() {
            records.extend(counter.instrument.checkpoint());
        }
        for (_, gauge) in self.registry.get_gauge_handles() {
            records.extend(gauge.instrument.checkpoint());
        }
        for (_, histogram) in self.registry.get_histogram_handles() {
            records.extend(histogram.instrument.checkpoint());
        }

        Checkpoint::new(records)
    }
}

/// A [`Recorder`] that routes every registered metric through an aggregator selector.
pub struct StatsdRecorder {
    inner: Arc<Inner>,
}

impl StatsdRecorder {
    pub fn handle(&self) -> StatsdHandle {
        StatsdHandle {
            inner: self.inner.clone(),
        }
    }
}

impl From<Inner> for StatsdRecorder {
    fn from(inner: Inner) -> Self {
        StatsdRecorder {
            inner: Arc::new(inner),
        }
    }
}

impl Recorder for StatsdRecorder {
    fn describe_counter(&self, _k: KeyName, _u: Option<Unit>, _d: SharedString) {}
    fn describe_gauge(&self, _k: KeyName, _u: Option<Unit>, _d: SharedString) {}
    fn describe_histogram(&self, _k: KeyName, _u: Option<Unit>, _d: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        self.inner
            .registry
            .get_or_create_counter(key, |c| Counter::from_arc(c.clone()))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        self.inner
            .registry
            .get_or_create_gauge(key, |g| Gauge::from_arc(g.clone()))
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        self.inner
            .registry
            .get_or_create_histogram(key, |h| Histogram::from_arc(h.clone()))
    }
}

/// Handle for collecting checkpoints from a [`StatsdRecorder`].
///
/// The push gateway task installed by the builder takes a checkpoint every interval. The
/// handle lets callers that schedule exports themselves do the same.
#[derive(Clone)]
pub struct StatsdHandle {
    inner: Arc<Inner>,
}

impl StatsdHandle {
    /// Checkpoints every instrument and returns the records measured since the previous call.
    pub fn checkpoint(&self) -> Checkpoint {
        self.inner.checkpoint()
    }

    /// Takes a checkpoint and renders it in the dogstatsd wire format instead of sending it.
    pub fn render(&self, options: &ExportOptions) -> Result<String, ExportError> {
        let mut exporter = StatsdExporter::new(options.clone(), BufferSink::new());
        exporter.export(&self.checkpoint())?;
        Ok(exporter.sink_mut().take())
    }
}
