use std::fmt;
use std::io;

use thiserror::Error;
use tracing::debug;

use crate::aggregator::{AggregatorError, Distribution, MinMaxSumCount};
use crate::checkpoint::{Checkpoint, Record};
use crate::formatting::{record_tags, sanitize_metric_name};
use crate::number::{Number, NumberKind};
use crate::sink::MetricSink;

/// Every value is sent, no client side sampling.
const SAMPLE_RATE: f64 = 1.0;

/// How sums and last values are reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportConvention {
    /// Sums and last values are sent as gauges suffixed with `.count`, and the points
    /// capability is never used: measures report `.min`, `.max`, `.median` and `.p95`.
    LegacyGauge,
    /// Sums are sent as counters and last values as gauges, both under the bare name.
    /// Aggregators retaining points send one histogram or distribution sample per point.
    #[default]
    Counter,
}

/// Statistic read from an aggregator, used to describe read failures.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Statistic {
    Points,
    Min,
    Max,
    Quantile(f64),
    Sum,
    LastValue,
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statistic::Points => f.write_str("Points"),
            Statistic::Min => f.write_str("Min"),
            Statistic::Max => f.write_str("Max"),
            Statistic::Quantile(q) => write!(f, "Quantile({q})"),
            Statistic::Sum => f.write_str("Sum"),
            Statistic::LastValue => f.write_str("LastValue"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("error getting {statistic} value for {name}: {source}")]
    Read {
        name: String,
        statistic: Statistic,
        #[source]
        source: AggregatorError,
    },
    #[error("error sending {name}: {source}")]
    Send {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("error flushing metrics: {0}")]
    Flush(#[source] io::Error),
}

/// Options shaping the names, tags and metric types sent for each record.
#[derive(Clone, Debug, Default)]
pub struct ExportOptions {
    pub namespace: Option<String>,
    /// Rendered `key:value` tags attached to every metric ahead of the record's own labels.
    pub global_tags: Vec<String>,
    /// Send points as distributions instead of histograms.
    pub use_distribution: bool,
    pub convention: ExportConvention,
}

#[derive(Clone, Copy)]
enum MetricType {
    Gauge,
    Count,
    Histogram,
    Distribution,
}

/// Walks checkpoints and forwards the derived sub-metrics to a [`MetricSink`].
///
/// The exporter keeps no state between checkpoints. An export either goes through every
/// record or stops at the first read or send failure, leaving it to the caller to decide
/// what to do with the rest of the checkpoint.
pub struct StatsdExporter<S> {
    options: ExportOptions,
    sink: S,
}

impl<S> StatsdExporter<S>
where
    S: MetricSink,
{
    pub fn new(options: ExportOptions, sink: S) -> Self {
        StatsdExporter { options, sink }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn export(&mut self, checkpoint: &Checkpoint) -> Result<(), ExportError> {
        debug!("exporting {} records", checkpoint.len());
        for record in checkpoint.records() {
            self.export_record(record)?;
        }
        self.sink.flush().map_err(ExportError::Flush)
    }

    /// Flushes anything the sink still buffers and releases it.
    pub fn close(mut self) -> io::Result<S> {
        self.sink.flush()?;
        Ok(self.sink)
    }

    fn export_record(&mut self, record: &Record) -> Result<(), ExportError> {
        let descriptor = record.descriptor();
        let kind = descriptor.number_kind();
        let name = sanitize_metric_name(self.options.namespace.as_deref(), descriptor.name());
        let tags = record_tags(&self.options.global_tags, record.labels());
        let read_error = |statistic, source| ExportError::Read {
            name: name.clone(),
            statistic,
            source,
        };

        let caps = record.aggregator().capabilities();
        let points = match self.options.convention {
            ExportConvention::Counter => caps.points,
            ExportConvention::LegacyGauge => None,
        };

        if let Some(points) = points {
            let numbers = points
                .points()
                .map_err(|e| read_error(Statistic::Points, e))?;
            let mtype = if self.options.use_distribution {
                MetricType::Distribution
            } else {
                MetricType::Histogram
            };
            for n in numbers {
                self.send(mtype, &name, n.to_f64(kind), &tags)?;
            }
        } else if let Some(mmsc) = caps.min_max_sum_count {
            let values = summary_values(mmsc, caps.distribution, kind)
                .map_err(|(statistic, e)| read_error(statistic, e))?;
            for (suffix, value) in values {
                let sub_name = format!("{name}.{suffix}");
                self.send(MetricType::Gauge, &sub_name, value, &tags)?;
            }
        } else if let Some(sum) = caps.sum {
            let value = sum.sum().map_err(|e| read_error(Statistic::Sum, e))?;
            self.send_total(&name, value.to_f64(kind), &tags)?;
        } else if let Some(last) = caps.last_value {
            let (value, _) = last
                .last_value()
                .map_err(|e| read_error(Statistic::LastValue, e))?;
            let value = value.to_f64(kind);
            match self.options.convention {
                ExportConvention::Counter => self.send(MetricType::Gauge, &name, value, &tags)?,
                ExportConvention::LegacyGauge => {
                    self.send(MetricType::Gauge, &format!("{name}.count"), value, &tags)?
                }
            }
        }
        Ok(())
    }

    fn send_total(&mut self, name: &str, value: f64, tags: &[String]) -> Result<(), ExportError> {
        match self.options.convention {
            ExportConvention::Counter => self.send(MetricType::Count, name, value, tags),
            ExportConvention::LegacyGauge => {
                self.send(MetricType::Gauge, &format!("{name}.count"), value, tags)
            }
        }
    }

    fn send(
        &mut self,
        mtype: MetricType,
        name: &str,
        value: f64,
        tags: &[String],
    ) -> Result<(), ExportError> {
        let result = match mtype {
            MetricType::Gauge => self.sink.gauge(name, value, tags, SAMPLE_RATE),
            // `as` saturates, so totals past i64::MAX are clamped rather than wrapped
            MetricType::Count => self.sink.count(name, value as i64, tags, SAMPLE_RATE),
            MetricType::Histogram => self.sink.histogram(name, value, tags, SAMPLE_RATE),
            MetricType::Distribution => self.sink.distribution(name, value, tags, SAMPLE_RATE),
        };
        result.map_err(|source| ExportError::Send {
            name: name.to_string(),
            source,
        })
    }
}

type SummaryValues = Vec<(&'static str, f64)>;

fn summary_values(
    mmsc: &dyn MinMaxSumCount,
    distribution: Option<&dyn Distribution>,
    kind: NumberKind,
) -> Result<SummaryValues, (Statistic, AggregatorError)> {
    let read = |statistic: Statistic, r: Result<Number, AggregatorError>| {
        r.map(|n| n.to_f64(kind)).map_err(|e| (statistic, e))
    };

    let mut values = vec![
        ("min", read(Statistic::Min, mmsc.min())?),
        ("max", read(Statistic::Max, mmsc.max())?),
    ];
    if let Some(dist) = distribution {
        values.push(("median", read(Statistic::Quantile(0.5), dist.quantile(0.5))?));
        values.push(("p95", read(Statistic::Quantile(0.95), dist.quantile(0.95))?));
    }
    Ok(values)
}
