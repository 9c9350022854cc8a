use std::future::Future;
use std::net::{SocketAddr, ToSocketAddrs};
use std::pin::Pin;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use indexmap::IndexMap;
use tokio::{runtime, task};
use tracing::error;

use crate::common::BuildError;
use crate::exporter::{ExportConvention, ExportOptions, StatsdExporter};
use crate::formatting::format_tag;
use crate::recorder::{Inner, StatsdRecorder};
use crate::selector::{AggregatorSelector, DogstatsdSelector};
use crate::sink::{MetricSink, UdpSink};

/// Address of a local DogStatsD agent.
pub const DEFAULT_STATSD_ADDR: &str = "localhost:8125";

const DEFAULT_PUSH_INTERVAL: Duration = Duration::from_secs(10);

type ExporterFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Builder for creating and installing a Statsd recorder/exporter.
pub struct StatsdBuilder {
    endpoint: Option<SocketAddr>,
    interval: Duration,
    selector: Arc<dyn AggregatorSelector>,
    namespace: Option<String>,
    global_tags: Option<IndexMap<String, String>>,
    use_distribution: bool,
    convention: ExportConvention,
    max_packet_size: usize,
}

impl StatsdBuilder {
    /// Creates a new [`StatsdBuilder`].
    pub fn new() -> Self {
        Self {
            endpoint: None,
            interval: DEFAULT_PUSH_INTERVAL,
            selector: Arc::new(DogstatsdSelector::new()),
            namespace: None,
            global_tags: None,
            use_distribution: false,
            convention: ExportConvention::default(),
            max_packet_size: 1432,
        }
    }

    /// Configures the exporter to push periodic requests to a statsd agent.
    ///
    /// Without this, the exporter pushes to [`DEFAULT_STATSD_ADDR`] every 10 seconds.
    ///
    /// ## Errors
    ///
    /// If the given endpoint cannot be parsed into a valid SocketAddr, an error variant will be
    /// returned describing the error.
    pub fn with_push_gateway<T>(
        mut self,
        endpoint: T,
        interval: Duration,
    ) -> Result<Self, BuildError>
    where
        T: ToSocketAddrs,
    {
        self.endpoint = Some(resolve(endpoint)?);
        self.interval = interval;
        Ok(self)
    }

    /// Sets the selector choosing the aggregator of each new instrument.
    ///
    /// Defaults to [`DogstatsdSelector`].
    #[must_use]
    pub fn with_selector<S>(mut self, selector: S) -> Self
    where
        S: AggregatorSelector + 'static,
    {
        self.selector = Arc::new(selector);
        self
    }

    /// Sends points as [datadog `Distribution`](https://docs.datadoghq.com/metrics/distributions/)
    /// samples instead of histogram samples.
    #[must_use]
    pub fn set_distribution(mut self) -> Self {
        self.use_distribution = true;
        self
    }

    /// Sets how sums and last values are reported, see [`ExportConvention`].
    #[must_use]
    pub fn set_convention(mut self, convention: ExportConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Adds a global tag to this exporter.
    ///
    /// Global tags are sent ahead of the metric's own labels. If this method is called multiple
    /// times for the same key, the latest value is used.
    #[must_use]
    pub fn add_global_tag<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let tags = self.global_tags.get_or_insert_with(IndexMap::new);
        tags.insert(key.into(), value.into());
        self
    }

    /// Sets the maximum size of packets going out to the gateway.
    ///
    /// Defaults to 1432 bytes
    #[must_use]
    pub fn set_max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = size;
        self
    }

    /// Sets the namespace every metric name is prefixed with.
    ///
    /// The namespace is trimmed of surrounding spaces and sanitized like metric names, then
    /// joined to the name with a dot.
    #[must_use]
    pub fn set_namespace<P>(mut self, namespace: P) -> Self
    where
        P: Into<String>,
    {
        self.namespace = Some(namespace.into());
        self
    }

    /// Builds the recorder and exporter and installs them globally.
    ///
    /// When called from within a Tokio runtime, the exporter future is spawned directly
    /// into the runtime.  Otherwise, a new single-threaded Tokio runtime is created
    /// on a background thread, and the exporter is spawned there.
    ///
    /// ## Errors
    ///
    /// If there is an error while either building the recorder and exporter, or installing the
    /// recorder and exporter, an error variant will be returned describing the error.
    pub fn install(self) -> Result<(), BuildError> {
        let recorder = if let Ok(handle) = runtime::Handle::try_current() {
            let (recorder, exporter) = {
                let _g = handle.enter();
                self.build()?
            };

            handle.spawn(exporter);

            recorder
        } else {
            let runtime = runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| BuildError::FailedToCreateRuntime(e.to_string()))?;

            let (recorder, exporter) = {
                let _g = runtime.enter();
                self.build()?
            };

            thread::Builder::new()
                .name("metrics-exporter-statsd-push-gateway".to_string())
                .spawn(move || runtime.block_on(exporter))
                .map_err(|e| BuildError::FailedToCreateRuntime(e.to_string()))?;

            recorder
        };

        metrics::set_global_recorder(recorder)
            .map_err(|_| BuildError::FailedToSetGlobalRecorder)?;

        Ok(())
    }

    /// Builds the recorder and exporter and returns them both.
    ///
    /// The returned future pushes a checkpoint to the agent every interval. It never
    /// completes on its own; export failures are logged and the next interval is tried.
    ///
    /// ## Errors
    ///
    /// If the agent address cannot be resolved or the socket cannot be opened, an error variant
    /// will be returned describing the error.
    pub fn build(self) -> Result<(StatsdRecorder, ExporterFuture), BuildError> {
        let interval = self.interval;
        let mut exporter = self.build_exporter()?;
        let recorder = self.build_recorder();
        let handle = recorder.handle();

        let future = async move {
            loop {
                // Sleep for `interval` amount of time, and then do a push.
                tokio::time::sleep(interval).await;

                // sending may block on a full socket buffer, keep it off the runtime workers
                let handle = handle.clone();
                let push = task::spawn_blocking(move || {
                    if let Err(e) = exporter.export(&handle.checkpoint()) {
                        error!("error sending metrics to statsd agent: {}", e);
                    }
                    exporter
                });
                exporter = match push.await {
                    Ok(exporter) => exporter,
                    Err(e) => {
                        error!("statsd push task failed, stopping exports: {}", e);
                        return;
                    }
                };
            }
        };

        Ok((recorder, Box::pin(future)))
    }

    /// Builds the recorder and returns it.
    pub fn build_recorder(self) -> StatsdRecorder {
        StatsdRecorder::from(Inner::new(self.selector))
    }

    /// Builds an exporter sending to the configured agent over UDP.
    ///
    /// ## Errors
    ///
    /// If the agent address cannot be resolved or the socket cannot be opened, an error variant
    /// will be returned describing the error.
    pub fn build_exporter(&self) -> Result<StatsdExporter<UdpSink>, BuildError> {
        let endpoint = match self.endpoint {
            Some(endpoint) => endpoint,
            None => resolve(DEFAULT_STATSD_ADDR)?,
        };
        let sink =
            UdpSink::new(endpoint, self.max_packet_size).map_err(BuildError::FailedToCreateClient)?;
        Ok(self.build_exporter_with_sink(sink))
    }

    /// Builds an exporter sending to the given sink.
    pub fn build_exporter_with_sink<S>(&self, sink: S) -> StatsdExporter<S>
    where
        S: MetricSink,
    {
        StatsdExporter::new(self.export_options(), sink)
    }

    fn export_options(&self) -> ExportOptions {
        let global_tags = self
            .global_tags
            .iter()
            .flatten()
            .map(|(k, v)| format_tag(k, v))
            .collect();
        ExportOptions {
            namespace: self.namespace.clone(),
            global_tags,
            use_distribution: self.use_distribution,
            convention: self.convention,
        }
    }
}

impl Default for StatsdBuilder {
    fn default() -> Self {
        StatsdBuilder::new()
    }
}

fn resolve<T>(endpoint: T) -> Result<SocketAddr, BuildError>
where
    T: ToSocketAddrs,
{
    endpoint
        .to_socket_addrs()
        .map_err(|e| BuildError::InvalidPushGatewayEndpoint(e.to_string()))?
        .next() // just use the first address we resolve to
        .ok_or_else(|| {
            BuildError::InvalidPushGatewayEndpoint(
                "to_socket_addrs returned an empty iterator".to_string(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::InexpensiveSelector;
    use crate::sink::BufferSink;
    use metrics::{Key, KeyName, Label, Level, Metadata, Recorder};
    use std::net::UdpSocket;

    static METADATA: Metadata = Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

    #[test]
    fn test_render() {
        let builder = StatsdBuilder::new();
        let recorder = StatsdBuilder::new().build_recorder();
        let handle = recorder.handle();
        let mut exporter = builder.build_exporter_with_sink(BufferSink::new());

        let key = Key::from_name("basic.counter");
        let counter1 = recorder.register_counter(&key, &METADATA);
        counter1.increment(42);

        exporter.export(&handle.checkpoint()).unwrap();
        assert_eq!(exporter.sink_mut().take(), "basic_counter:42|c\n");

        let labels = vec![Label::new("wutang", "forever")];
        let key = Key::from_parts("basic.gauge", labels);
        let gauge1 = recorder.register_gauge(&key, &METADATA);
        gauge1.set(-3.44);

        // the counter was not touched since the last checkpoint
        exporter.export(&handle.checkpoint()).unwrap();
        assert_eq!(exporter.sink_mut().take(), "basic_gauge:-3.44|g|#wutang:forever\n");

        let key = Key::from_name("basic.histogram");
        let histogram1 = recorder.register_histogram(&key, &METADATA);
        histogram1.record(12.0);
        histogram1.record(3.0);

        exporter.export(&handle.checkpoint()).unwrap();
        assert_eq!(
            exporter.sink_mut().take(),
            "basic_histogram:3|h\nbasic_histogram:12|h\n"
        );
    }

    #[test]
    fn test_legacy_render() {
        let builder = StatsdBuilder::new()
            .set_convention(ExportConvention::LegacyGauge)
            .set_namespace("My Service");
        let recorder = StatsdBuilder::new().build_recorder();
        let handle = recorder.handle();
        let mut exporter = builder.build_exporter_with_sink(BufferSink::new());

        recorder
            .register_counter(&Key::from_name("hits"), &METADATA)
            .increment(3);
        recorder
            .register_gauge(&Key::from_name("temp"), &METADATA)
            .set(21.5);
        let histogram = recorder.register_histogram(&Key::from_name("latency"), &METADATA);
        for v in 1..=100 {
            histogram.record(f64::from(v));
        }

        exporter.export(&handle.checkpoint()).unwrap();
        let expected = concat!(
            "My_Service.hits.count:3|g\n",
            "My_Service.latency.min:1|g\n",
            "My_Service.latency.max:100|g\n",
            "My_Service.latency.median:51|g\n",
            "My_Service.latency.p95:96|g\n",
            "My_Service.temp.count:21.5|g\n",
        );
        assert_eq!(exporter.sink_mut().take(), expected);
    }

    #[test]
    fn test_inexpensive_selector() {
        let recorder = StatsdBuilder::new()
            .with_selector(InexpensiveSelector::new())
            .build_recorder();
        let histogram = recorder.register_histogram(&Key::from_name("size"), &METADATA);
        histogram.record(7.0);
        histogram.record(2.0);

        let rendered = recorder
            .handle()
            .render(&ExportOptions::default())
            .unwrap();
        assert_eq!(rendered, "size.min:2|g\nsize.max:7|g\n");
    }

    #[test]
    pub fn test_global_labels() {
        let builder = StatsdBuilder::new()
            .add_global_tag("foo", "foo")
            .add_global_tag("env", "prod")
            .add_global_tag("foo", "bar");
        let recorder = StatsdBuilder::new().build_recorder();
        let mut exporter = builder.build_exporter_with_sink(BufferSink::new());

        let key = Key::from_parts("basic.counter", vec![Label::new("region", "us")]);
        recorder.register_counter(&key, &METADATA).increment(42);

        exporter.export(&recorder.handle().checkpoint()).unwrap();
        assert_eq!(
            exporter.sink_mut().take(),
            "basic_counter:42|c|#foo:bar,env:prod,region:us\n"
        );
    }

    #[test]
    pub fn test_global_distribution() {
        let builder = StatsdBuilder::new().set_distribution();
        let recorder = StatsdBuilder::new().build_recorder();
        let mut exporter = builder.build_exporter_with_sink(BufferSink::new());

        let key = Key::from_name(KeyName::from("distn"));
        recorder.register_histogram(&key, &METADATA).record(12.0);

        exporter.export(&recorder.handle().checkpoint()).unwrap();
        assert_eq!(exporter.sink_mut().take(), "distn:12|d\n");
    }

    #[test]
    fn test_invalid_endpoint() {
        let result =
            StatsdBuilder::new().with_push_gateway("not an address", DEFAULT_PUSH_INTERVAL);
        assert!(matches!(result, Err(BuildError::InvalidPushGatewayEndpoint(_))));
    }

    #[test]
    fn test_push_loop_on_current_thread_runtime() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();

        let runtime = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let (recorder, exporter) = StatsdBuilder::new()
            .with_push_gateway(receiver.local_addr().unwrap(), Duration::from_millis(10))
            .unwrap()
            .build()
            .unwrap();

        recorder
            .register_counter(&Key::from_name("pushed"), &METADATA)
            .increment(3);
        let _ = runtime.block_on(async {
            tokio::time::timeout(Duration::from_millis(200), exporter).await
        });

        let mut buf = [0u8; 1500];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"pushed:3|c\n");
    }

    #[test]
    fn test_udp_exporter() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();

        let builder = StatsdBuilder::new()
            .with_push_gateway(receiver.local_addr().unwrap(), Duration::from_secs(1))
            .unwrap()
            .set_namespace("app");
        let mut exporter = builder.build_exporter().unwrap();
        let recorder = builder.build_recorder();

        recorder
            .register_counter(&Key::from_name("requests"), &METADATA)
            .increment(5);
        exporter.export(&recorder.handle().checkpoint()).unwrap();

        let mut buf = [0u8; 1500];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"app.requests:5|c\n");
        exporter.close().unwrap();
    }
}
