use thiserror::Error;

/// Errors that could occur while building or installing a Statsd recorder/exporter.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Failed to resolve the push gateway endpoint to a socket address.
    #[error("push gateway endpoint is not valid: {0}")]
    InvalidPushGatewayEndpoint(String),

    /// Failed to open the socket used to reach the agent.
    #[error("failed to create the statsd client: {0}")]
    FailedToCreateClient(#[source] std::io::Error),

    /// Failed to create the Tokio runtime (or its background thread) driving the exporter.
    #[error("failed to create Tokio runtime for exporter: {0}")]
    FailedToCreateRuntime(String),

    /// Another recorder was already installed globally.
    #[error("failed to install exporter as global recorder")]
    FailedToSetGlobalRecorder,
}
