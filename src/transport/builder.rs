use super::{install, MitmTransport, RoundTrip, TransportState};
use crate::request::{BodyPrintLimit, BODY_PRINT_LIMIT};
use std::collections::HashMap;
use std::env;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, RwLock};

/// A builder providing a fluent API to assemble a [`MitmTransport`] step-by-step.
/// Use [`MitmTransport::builder`] to get started.
pub struct MitmTransportBuilder {
    passthrough: Option<Arc<dyn RoundTrip>>,
    record_requests: bool,
    body_print_limit: BodyPrintLimit,
}

impl MitmTransportBuilder {
    pub(super) fn new() -> Self {
        let body_print_limit = match env::var("HTTPMITM_BODY_PRINT_LIMIT")
            .ok()
            .and_then(|x| x.parse::<usize>().ok())
        {
            Some(limit) => BodyPrintLimit::Limited(limit),
            None => BodyPrintLimit::Limited(BODY_PRINT_LIMIT),
        };
        Self {
            passthrough: None,
            record_requests: true,
            body_print_limit,
        }
    }

    /// The transport receiving requests no mock answers, and every request while the
    /// [`MitmTransport`] is paused. Defaults to an [`HttpTransport`].
    ///
    /// ### Example:
    /// ```rust
    /// use async_trait::async_trait;
    /// use httpmitm::{Error, MitmTransport, Request, Response, RoundTrip};
    ///
    /// struct Offline;
    ///
    /// #[async_trait]
    /// impl RoundTrip for Offline {
    ///     async fn round_trip(&self, _request: Request) -> Result<Response, Error> {
    ///         Err(Error::Refused)
    ///     }
    /// }
    ///
    /// #[async_std::main]
    /// async fn main() {
    ///     let transport = MitmTransport::builder().passthrough(Offline).build();
    ///
    ///     let request = Request::get("https://example.com/").unwrap();
    ///     assert!(transport.round_trip(request).await.is_err());
    /// }
    /// ```
    ///
    /// [`HttpTransport`]: crate::HttpTransport
    pub fn passthrough<T: RoundTrip + 'static>(mut self, transport: T) -> Self {
        self.passthrough = Some(Arc::new(transport));
        self
    }

    /// By default, [`MitmTransport`] records every `mitm://` request it sees, see
    /// [`MitmTransport::received_requests`].
    ///
    /// Long-running suites pushing high volumes of traffic through a single transport can
    /// disable it.
    ///
    /// ### Example (Request recording disabled):
    ///
    /// ```rust
    /// use httpmitm::MitmTransport;
    ///
    /// let transport = MitmTransport::builder().disable_request_recording().build();
    /// assert!(transport.received_requests().is_none());
    /// ```
    pub fn disable_request_recording(mut self) -> Self {
        self.record_requests = false;
        self
    }

    /// Requests no mock is registered for are logged at debug level, body included.
    /// By default, the size of the printed body is limited.
    ///
    /// You can configure this limit with `MitmTransportBuilder::body_print_limit`, or with the
    /// `HTTPMITM_BODY_PRINT_LIMIT` environment variable.
    pub fn body_print_limit(mut self, limit: BodyPrintLimit) -> Self {
        self.body_print_limit = limit;
        self
    }

    /// Finalise the builder.
    pub fn build(self) -> MitmTransport {
        let passthrough = self
            .passthrough
            .unwrap_or_else(|| install::real_transport() as Arc<dyn RoundTrip>);
        MitmTransport::from_state(Arc::new(TransportState {
            chain: Mutex::default(),
            stubs: RwLock::new(HashMap::new()),
            stubbed: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            reporter: Mutex::new(None),
            passthrough,
            received_requests: self.record_requests.then(|| Mutex::new(Vec::new())),
            body_print_limit: self.body_print_limit,
        }))
    }
}

impl Default for MitmTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}
