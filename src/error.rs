use thiserror::Error;

/// Boxed error returned by callee responders and by the real transport.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Everything that can go wrong while configuring or dispatching through a
/// [`MitmTransport`](crate::MitmTransport).
///
/// Dispatch-time variants (`NotFound`, `Refused`, `Timeout`, `Unsupported`, ...) are returned
/// from [`RoundTrip::round_trip`](crate::RoundTrip::round_trip), exactly where a real client
/// would surface a network failure.
/// Configuration variants (`InvalidTimes`, `NotChained`, `NotChainedResponse`) are raised as
/// panics by the builder chain: they point at a mistake in the test itself.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not found. Please make sure the resource has been stubbed")]
    NotFound,

    #[error("request timeout")]
    Timeout,

    #[error("unsupported body of response data: {0}")]
    Unsupported(&'static str),

    #[error("connection refused. Please make sure the request has been stubbed")]
    Refused,

    #[error("invalid value of times ({0}). It must be a non-negative integer or UNLIMITED_TIMES")]
    InvalidTimes(i64),

    #[error("not a chained invocation. Please invoke mock_request(method, url) first")]
    NotChained,

    #[error("not a chained response. A response has already been attached, invoke mock_request(method, url) first")]
    NotChainedResponse,

    #[error("invalid url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid HTTP method `{0}`")]
    InvalidMethod(String),

    #[error("failed to encode response body: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("callee responder failed: {0}")]
    Callee(#[source] BoxError),

    #[error("transport failed: {0}")]
    Transport(#[source] BoxError),

    #[error("unsupported protocol scheme `{0}`")]
    UnsupportedScheme(String),

    #[error("the default transport is already stubbed by another MitmTransport on this thread")]
    AlreadyInstalled,
}

impl Error {
    pub(crate) fn invalid_url(url: impl Into<String>, source: url::ParseError) -> Self {
        Error::InvalidUrl {
            url: url.into(),
            source,
        }
    }
}
