//! Aggregation selection and checkpoint export for statsd/datadog.
//!
//! ## Basics
//!
//! `metrics-exporter-dogstatsd-otel` sits between an aggregating metrics SDK and a statsd or
//! datadog agent reached over UDP. It does two things:
//!
//! - it picks, for every instrument, the aggregator that accumulates its measurements over a
//!   collection interval ([`select`], [`AggregatorSelector`])
//! - on every interval it walks the resulting [`Checkpoint`] and sends each record to the agent
//!   as one or more sub-metrics ([`StatsdExporter`])
//!
//! A [`metrics`]-compatible [`StatsdRecorder`] is included, so instruments created through the
//! `metrics` macros are aggregated and exported the same way.
//!
//! ## Behavior
//!
//! - counters are summed, gauges keep their last value, histograms keep every point
//! - aggregators retaining points send one histogram (or [distribution]) sample per point
//! - min-max-sum-count aggregators send `.min` and `.max` gauges, plus `.median` and `.p95`
//!   when they also answer quantile queries
//! - sums are sent as counters and last values as gauges, or both as `.count` gauges with
//!   [`ExportConvention::LegacyGauge`]
//! - only instruments updated during the interval are exported
//! - global tags come first, followed by the metric's own labels in their original order
//! - there is no support for sampling, every value is sent with a rate of 1
//!
//! Metric names are restricted to ASCII alphanumerics: every other run of characters becomes a
//! single underscore, and an optional namespace is joined with a dot. See the datadog
//! [naming rules].
//!
//! ## Usage
//!
//! ```ignore
//! // Push to a local agent every 10 seconds, with a namespace and a global tag.
//! let builder = StatsdBuilder::new()
//!     .with_push_gateway("localhost:8125", Duration::from_secs(10))?
//!     .set_namespace("my service")
//!     .add_global_tag("env", "prod");
//!
//! // Install the recorder globally and spawn the push task.
//! builder.install().expect("failed to install recorder/exporter");
//!
//! // Or drive checkpoints yourself.
//! let mut exporter = builder.build_exporter()?;
//! let recorder = builder.build_recorder();
//! exporter.export(&recorder.handle().checkpoint())?;
//! ```
//!
//! [distribution]: https://docs.datadoghq.com/metrics/distributions/
//! [naming rules]: https://docs.datadoghq.com/metrics/custom_metrics/#naming-custom-metrics
mod common;
pub use self::common::BuildError;

pub mod aggregator;

mod builder;
pub use self::builder::{StatsdBuilder, DEFAULT_STATSD_ADDR};

mod checkpoint;
pub use self::checkpoint::{Checkpoint, Record};

mod descriptor;
pub use self::descriptor::{Descriptor, InstrumentKind, LabelSet};

mod exporter;
pub use self::exporter::{ExportConvention, ExportError, ExportOptions, Statistic, StatsdExporter};

pub mod formatting;

mod number;
pub use self::number::{Number, NumberKind};

mod recorder;
pub use self::recorder::{StatsdHandle, StatsdRecorder};

mod registry;

mod selector;
pub use self::selector::{
    select, AggregatorKind, AggregatorSelector, DogstatsdSelector, InexpensiveSelector,
};

pub mod sink;
