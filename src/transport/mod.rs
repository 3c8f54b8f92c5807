use crate::mock::{Dispatch, Mock, Times, MOCK_SCHEME, UNLIMITED_TIMES, WILDCARD};
use crate::registry::Registry;
use crate::request::{authority, BodyPrintLimit};
use crate::respond::RefusedResponder;
use crate::verification::{PanicReporter, Reporter, VerificationReport};
use crate::{
    Body, BoxError, Encoding, Error, Match, Request, Respond, Response, ResponseTemplate,
};
use async_trait::async_trait;
use chain::{normalize_key, Chain, Opened, Registration};
use http::header::CONTENT_ENCODING;
use http::HeaderMap;
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::convert::TryFrom;
use std::fmt::{self, Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

pub use builder::MitmTransportBuilder;
pub use http_transport::HttpTransport;
pub use install::default_transport;

mod builder;
mod chain;
mod http_transport;
mod install;

/// Sends a [`Request`] and resolves to its [`Response`].
///
/// Application code performing outbound HTTP calls through a `RoundTrip` (rather than a
/// concrete client) can be pointed at a [`MitmTransport`] in tests, either directly or via
/// [`default_transport`].
#[async_trait]
pub trait RoundTrip: Send + Sync {
    async fn round_trip(&self, request: Request) -> Result<Response, Error>;
}

#[async_trait]
impl<T: RoundTrip + ?Sized> RoundTrip for Arc<T> {
    async fn round_trip(&self, request: Request) -> Result<Response, Error> {
        (**self).round_trip(request).await
    }
}

/// A transport answering `mitm://` requests from registered mocks.
///
/// Mocks are registered through a fluent chain: [`mock_request`] opens a registration,
/// [`times`], [`any_times`] and [`by_matcher`] configure it, and one of the `with_*`
/// response methods commits it:
///
/// ```rust
/// use httpmitm::{MitmTransport, PanicReporter, Request, RoundTrip};
///
/// #[async_std::main]
/// async fn main() {
///     let transport = MitmTransport::new();
///     transport
///         .stub_default_transport(PanicReporter)
///         .mock_request("GET", "https://example.com/users")
///         .times(2)
///         .with_response(200, None, "[]");
///
///     for _ in 0..2 {
///         let request = Request::get("mitm://example.com/users").unwrap();
///         let response = transport.round_trip(request).await.unwrap();
///         assert_eq!(response.status, 200);
///         assert_eq!(response.text(), "[]");
///     }
///
///     // Panics if a mock was not called the expected number of times.
///     transport.unstub_default_transport();
/// }
/// ```
///
/// Requests on any other scheme are forwarded to the passthrough transport unchanged, and
/// so are `mitm://` requests a mock refuses to match or has run out of invocations for,
/// once their scheme is restored.
///
/// Misusing the chain (a response without an open registration, a negative count, an
/// unparsable URL) is a programming error and panics.
///
/// `MitmTransport` is a cheap handle: clones share the same registrations.
///
/// [`mock_request`]: MitmTransport::mock_request
/// [`times`]: MitmTransport::times
/// [`any_times`]: MitmTransport::any_times
/// [`by_matcher`]: MitmTransport::by_matcher
#[derive(Clone)]
pub struct MitmTransport(Arc<TransportState>);

pub(crate) struct TransportState {
    // Lock order: chain -> stubs -> registry -> mock.
    chain: Mutex<Chain>,
    stubs: RwLock<HashMap<String, Arc<Registry>>>,
    stubbed: AtomicBool,
    paused: AtomicBool,
    reporter: Mutex<Option<Box<dyn Reporter>>>,
    passthrough: Arc<dyn RoundTrip>,
    received_requests: Option<Mutex<Vec<Request>>>,
    body_print_limit: BodyPrintLimit,
}

fn panic_on_misuse<T>(result: Result<T, Error>) -> T {
    result.unwrap_or_else(|e| panic!("{}", e))
}

impl MitmTransport {
    /// A transport passing unmatched traffic to an [`HttpTransport`].
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// You can use `MitmTransport::builder` to customise the passthrough transport, request
    /// recording and logging.
    pub fn builder() -> MitmTransportBuilder {
        MitmTransportBuilder::new()
    }

    pub(crate) fn from_state(state: Arc<TransportState>) -> Self {
        Self(state)
    }

    /// Open a registration for `method` + `url`.
    ///
    /// The URL keeps its real scheme (`https://example.com/users`); outbound requests reach it
    /// on `mitm://example.com/users`. A path of `/*` registers the mock for every path of
    /// the origin.
    ///
    /// Opening a new registration while the previous one has no response yet installs a
    /// refusing placeholder for the abandoned origin. Re-opening the pending registration
    /// is a no-op.
    pub fn mock_request(&self, method: impl AsRef<str>, url: impl AsRef<str>) -> &Self {
        panic_on_misuse(self.0.open(method.as_ref(), url.as_ref()));
        self
    }

    /// Replace the matcher of the current registration.
    pub fn by_matcher<M: Match + 'static>(&self, matcher: M) -> &Self {
        panic_on_misuse(self.0.set_matcher(Arc::new(matcher)));
        self
    }

    /// How many times the current registration answers. Use [`UNLIMITED_TIMES`] (or
    /// [`any_times`]) for no bound; other negative counts panic.
    ///
    /// [`any_times`]: MitmTransport::any_times
    pub fn times(&self, n: i64) -> &Self {
        panic_on_misuse(self.0.set_times(n));
        self
    }

    pub fn any_times(&self) -> &Self {
        self.times(UNLIMITED_TIMES)
    }

    /// Commit the current registration with an arbitrary [`Respond`] implementation.
    pub fn with_responder<R: Respond + 'static>(&self, responder: R) -> &Self {
        panic_on_misuse(self.0.commit(Arc::new(responder)));
        self
    }

    /// Answer with `code`, `headers` and a raw `body`.
    ///
    /// Structured bodies are not accepted here: requests reaching the mock fail with
    /// [`Error::Unsupported`]. Use [`with_json_response`] or [`with_xml_response`] for them.
    ///
    /// [`with_json_response`]: MitmTransport::with_json_response
    /// [`with_xml_response`]: MitmTransport::with_xml_response
    pub fn with_response(
        &self,
        code: u16,
        headers: Option<HeaderMap>,
        body: impl Into<Body>,
    ) -> &Self {
        self.with_encoded_response(code, headers, body.into(), Encoding::Raw)
    }

    /// Answer with `code`, `headers` and `body` serialized as JSON.
    pub fn with_json_response(
        &self,
        code: u16,
        headers: Option<HeaderMap>,
        body: impl Into<Body>,
    ) -> &Self {
        self.with_encoded_response(code, headers, body.into(), Encoding::Json)
    }

    /// Answer with `code`, `headers` and `body` serialized as XML.
    ///
    /// A structured body must be an object with a single key, naming the root element.
    pub fn with_xml_response(
        &self,
        code: u16,
        headers: Option<HeaderMap>,
        body: impl Into<Body>,
    ) -> &Self {
        self.with_encoded_response(code, headers, body.into(), Encoding::Xml)
    }

    /// Answer by invoking `callee` for every matched request.
    pub fn with_callee_response<F>(&self, callee: F) -> &Self
    where
        F: Fn(&Request) -> Result<ResponseTemplate, BoxError> + Send + Sync + 'static,
    {
        self.with_responder(callee)
    }

    fn with_encoded_response(
        &self,
        code: u16,
        headers: Option<HeaderMap>,
        body: Body,
        encoding: Encoding,
    ) -> &Self {
        self.with_responder(ResponseTemplate::from_parts(code, headers, body, encoding))
    }

    /// Make this transport the one [`default_transport`] hands out, reporting unmet
    /// expectations to `reporter` when it is unstubbed (or dropped).
    ///
    /// Only one transport can be installed at a time: stubbing from another thread waits
    /// until the current one is unstubbed.
    pub fn stub_default_transport<R: Reporter + 'static>(&self, reporter: R) -> &Self {
        if !self.0.stubbed.swap(true, Ordering::SeqCst) {
            if let Err(e) = install::install(&self.0) {
                self.0.stubbed.store(false, Ordering::SeqCst);
                panic!("{}", e);
            }
            debug!("MitmTransport installed as the default transport");
        }
        *self.0.reporter.lock().expect("Poisoned lock!") = Some(Box::new(reporter));
        self
    }

    /// Restore the default transport, drop every registration and verify expectations.
    ///
    /// Verification is skipped while the transport is paused.
    pub fn unstub_default_transport(&self) {
        self.0.unstub();
    }

    /// Forward every `mitm://` request to the passthrough transport while keeping
    /// registrations, recording successful responses into responders' testdata stores.
    ///
    /// No-op unless the transport is stubbed.
    pub fn pause(&self) {
        if self.is_stubbed() {
            self.0.paused.store(true, Ordering::SeqCst);
        }
    }

    /// Answer from mocks again. No-op unless the transport is stubbed.
    pub fn resume(&self) {
        if self.is_stubbed() {
            self.0.paused.store(false, Ordering::SeqCst);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.0.paused.load(Ordering::SeqCst)
    }

    pub fn is_stubbed(&self) -> bool {
        self.0.stubbed.load(Ordering::SeqCst)
    }

    /// Drop every registration without verifying them.
    pub fn reset(&self) {
        self.0.chain.lock().expect("Poisoned lock!").reset();
        self.0.stubs.write().expect("Poisoned lock!").clear();
    }

    /// Mocked requests complete synchronously, there is nothing in flight to cancel.
    pub fn cancel_request(&self, _request: &Request) {}

    /// Every `mitm://` request seen so far, in arrival order.
    ///
    /// Returns `None` when request recording was disabled with
    /// [`MitmTransportBuilder::disable_request_recording`].
    pub fn received_requests(&self) -> Option<Vec<Request>> {
        self.0
            .received_requests
            .as_ref()
            .map(|requests| requests.lock().expect("Poisoned lock!").clone())
    }

    /// The current state of every registered mock, sorted by key.
    pub fn reports(&self) -> Vec<VerificationReport> {
        let mut reports: Vec<_> = self
            .0
            .registries()
            .iter()
            .flat_map(|registry| registry.mocks())
            .map(|mock| mock.verify())
            .collect();
        reports.sort_by(|a, b| a.key.cmp(&b.key));
        reports
    }
}

impl Default for MitmTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for MitmTransport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let stubs: BTreeMap<String, Arc<Registry>> = self
            .0
            .stubs
            .read()
            .expect("Poisoned lock!")
            .iter()
            .map(|(key, registry)| (key.clone(), registry.clone()))
            .collect();
        f.debug_struct("MitmTransport")
            .field("stubbed", &self.is_stubbed())
            .field("paused", &self.is_paused())
            .field("stubs", &stubs)
            .finish()
    }
}

#[async_trait]
impl RoundTrip for MitmTransport {
    async fn round_trip(&self, request: Request) -> Result<Response, Error> {
        self.0.round_trip(request).await
    }
}

impl TransportState {
    fn open(&self, method: &str, url: &str) -> Result<(), Error> {
        let registration = Registration::parse(method, url)?;
        let mut chain = self.chain.lock().expect("Poisoned lock!");
        match chain.open(registration) {
            Opened::Reentered => {}
            Opened::Fresh { abandoned: None } => {}
            Opened::Fresh {
                abandoned: Some(abandoned),
            } => self.refuse(&abandoned)?,
        }
        Ok(())
    }

    /// Refuse every request to the origin of a registration left without a response,
    /// unless real mocks already serve that origin.
    fn refuse(&self, registration: &Registration) -> Result<(), Error> {
        let mut stubs = self.stubs.write().expect("Poisoned lock!");
        if stubs.contains_key(&registration.origin_key) {
            return Ok(());
        }
        debug!(
            "{} {} has no response, refusing its origin",
            registration.method, registration.raw_url
        );
        let refused = Mock::new(
            registration.origin_key.clone(),
            WILDCARD,
            Arc::new(RefusedResponder),
            Times::Unlimited,
            None,
        )?;
        stubs.insert(
            registration.origin_key.clone(),
            Arc::new(Registry::placeholder(refused)),
        );
        Ok(())
    }

    fn set_matcher(&self, matcher: Arc<dyn Match>) -> Result<(), Error> {
        let mut chain = self.chain.lock().expect("Poisoned lock!");
        match &mut *chain {
            Chain::Idle => Err(Error::NotChained),
            Chain::Pending(pending) => {
                pending.matcher = Some(matcher);
                Ok(())
            }
            Chain::Committed(registration) => {
                self.committed_mock(registration)?.set_matcher(matcher);
                Ok(())
            }
        }
    }

    fn set_times(&self, n: i64) -> Result<(), Error> {
        let mut chain = self.chain.lock().expect("Poisoned lock!");
        match &mut *chain {
            Chain::Idle => Err(Error::NotChained),
            Chain::Pending(pending) => {
                pending.times = Times::try_from(n)?;
                Ok(())
            }
            Chain::Committed(registration) => {
                let times = Times::try_from(n)?;
                self.committed_mock(registration)?.set_expected_times(times);
                Ok(())
            }
        }
    }

    fn committed_mock(&self, registration: &Registration) -> Result<Arc<Mock>, Error> {
        self.stubs
            .read()
            .expect("Poisoned lock!")
            .get(&registration.origin_key)
            .and_then(|registry| registry.get(&registration.path))
            .ok_or(Error::NotChained)
    }

    fn commit(&self, responder: Arc<dyn Respond>) -> Result<(), Error> {
        let mut chain = self.chain.lock().expect("Poisoned lock!");
        let pending = chain.commit()?;
        let registration = pending.registration;
        let mock = Mock::new(
            registration.origin_key.clone(),
            &registration.raw_url,
            responder,
            pending.times,
            pending.matcher,
        )?;

        let mut stubs = self.stubs.write().expect("Poisoned lock!");
        let registry = match stubs.get(&registration.origin_key) {
            Some(registry) if !registry.is_placeholder() => registry.clone(),
            _ => {
                let registry = Arc::new(Registry::new());
                stubs.insert(registration.origin_key.clone(), registry.clone());
                registry
            }
        };
        registry.insert(mock);
        debug!(
            "Registered {} {} ({} times)",
            registration.method, registration.raw_url, pending.times
        );
        Ok(())
    }

    fn registries(&self) -> Vec<Arc<Registry>> {
        self.stubs
            .read()
            .expect("Poisoned lock!")
            .values()
            .cloned()
            .collect()
    }

    fn describe(&self, request: &Request) -> String {
        let mut buffer = String::new();
        if request
            .print_with_limit(&mut buffer, self.body_print_limit)
            .is_err()
        {
            buffer = format!("{} {}", request.method, request.url);
        }
        buffer
    }

    async fn round_trip(&self, request: Request) -> Result<Response, Error> {
        if !request.url.scheme().eq_ignore_ascii_case(MOCK_SCHEME) {
            return self.passthrough.round_trip(request).await;
        }

        if let Some(requests) = &self.received_requests {
            requests
                .lock()
                .expect("Poisoned lock!")
                .push(request.clone());
        }

        let key = normalize_key(&request.method, MOCK_SCHEME, &authority(&request.url));
        let registry = self.stubs.read().expect("Poisoned lock!").get(&key).cloned();
        let registry = match registry {
            Some(registry) => registry,
            None => {
                debug!("No mock registered for {}:\n{}", key, self.describe(&request));
                return Err(Error::Refused);
            }
        };
        let mock = match registry.find(request.path()) {
            Some(mock) => mock,
            None => {
                debug!(
                    "No mock registered for path {} of {}:\n{}",
                    request.path(),
                    key,
                    self.describe(&request)
                );
                return Err(Error::NotFound);
            }
        };

        if self.paused.load(Ordering::SeqCst) {
            return self.record(&mock, request).await;
        }

        match mock.round_trip(&request)? {
            Dispatch::Respond(response) => Ok(response),
            Dispatch::PassThrough => self.pass_through(&mock, request).await,
        }
    }

    async fn pass_through(&self, mock: &Mock, mut request: Request) -> Result<Response, Error> {
        if !mock.scheme().is_empty() {
            request.set_scheme(mock.scheme())?;
        }
        debug!("Passing {} {} through", request.method, request.url);
        self.passthrough.round_trip(request).await
    }

    /// Answer from the real transport, storing the live body in the responder's testdata
    /// when the status is successful or the one the responder would have answered with.
    async fn record(&self, mock: &Mock, request: Request) -> Result<Response, Error> {
        // Replays derive the key from the `mitm://` request, so recordings do too.
        let key_request = (request.method.clone(), request.url.clone());
        let response = self.pass_through(mock, request).await?;

        let responder = mock.responder();
        let store = match responder.testdata() {
            Some(store) => store,
            None => return Ok(response),
        };
        let expected = responder.expected_status();
        if !response.status.is_success() && expected != Some(response.status) {
            return Ok(response);
        }

        let encoding = response
            .headers
            .get(CONTENT_ENCODING)
            .map(|encoding| String::from_utf8_lossy(encoding.as_bytes()).to_ascii_lowercase());
        let response = match encoding.as_deref() {
            None | Some("identity") => response,
            Some("gzip") => response.decode_gzip()?,
            Some(encoding) => {
                warn!(
                    "Not recording {}: {} bodies are not supported",
                    mock.display_key(),
                    encoding
                );
                return Ok(response);
            }
        };

        let key = store.key(&key_request.0, &key_request.1);
        match store.write(&key, &response.body) {
            Ok(()) => info!("Recorded {} bytes for {}", response.body.len(), key),
            Err(e) => warn!("Failed to record {}: {}", key, e),
        }
        Ok(response)
    }

    fn unstub(&self) {
        if self.stubbed.swap(false, Ordering::SeqCst) {
            install::restore(self);
        }
        self.chain.lock().expect("Poisoned lock!").reset();
        let registries: Vec<Arc<Registry>> = self
            .stubs
            .write()
            .expect("Poisoned lock!")
            .drain()
            .map(|(_, registry)| registry)
            .collect();
        let reporter = self.reporter.lock().expect("Poisoned lock!").take();

        if self.paused.swap(false, Ordering::SeqCst) {
            debug!("Transport was paused, skipping verification");
            return;
        }

        let mut failures: Vec<VerificationReport> = registries
            .iter()
            .flat_map(|registry| registry.mocks())
            .map(|mock| mock.verify())
            .filter(|report| !report.is_satisfied())
            .collect();
        if failures.is_empty() {
            return;
        }
        failures.sort_by(|a, b| a.key.cmp(&b.key));
        match reporter {
            Some(reporter) => reporter.report(&failures),
            None => PanicReporter.report(&failures),
        }
    }
}

impl Drop for TransportState {
    fn drop(&mut self) {
        if self.stubbed.load(Ordering::SeqCst) {
            self.unstub();
        }
    }
}
