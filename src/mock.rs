use crate::matchers::{AnyMatcher, DefaultMatcher};
use crate::request::reparse_with_scheme;
use crate::verification::VerificationReport;
use crate::{Error, Request, Respond, Response};
use log::debug;
use std::convert::TryFrom;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::{Arc, Mutex};
use url::Url;

/// The URL scheme outbound requests use to be routed to a [`MitmTransport`], in place of
/// `http`/`https`.
///
/// [`MitmTransport`]: crate::MitmTransport
pub const MOCK_SCHEME: &str = "mitm";

/// The `times` value meaning "any number of times".
pub const UNLIMITED_TIMES: i64 = i64::MIN;

/// Mocks are expected exactly once unless told otherwise.
pub const DEFAULT_TIMES: i64 = 1;

/// Path marker registering a mock for every path of an origin, e.g. `https://example.com/*`.
pub const WILDCARD: &str = "*";

/// Anything that implements `Match` can be used to decide whether a mock answers an outbound
/// request routed to it.
///
/// `url` is the URL the mock was registered with, its scheme replaced by [`MOCK_SCHEME`]
/// so that it can be compared with the outbound request directly.
///
/// ```rust
/// use httpmitm::{Match, MitmTransport, Request, RoundTrip};
/// use url::Url;
///
/// // Only answer requests carrying a `version` query parameter.
/// pub struct VersionedMatcher;
///
/// impl Match for VersionedMatcher {
///     fn matches(&self, request: &Request, _url: &Url) -> bool {
///         request.url.query_pairs().any(|(key, _)| key == "version")
///     }
/// }
///
/// #[async_std::main]
/// async fn main() {
///     let transport = MitmTransport::new();
///     transport
///         .mock_request("GET", "https://example.com/api")
///         .by_matcher(VersionedMatcher)
///         .with_response(200, None, "v2");
///
///     let request = Request::get("mitm://example.com/api?version=2").unwrap();
///     let response = transport.round_trip(request).await.unwrap();
///     assert_eq!(response.text(), "v2");
/// }
/// ```
pub trait Match: Send + Sync {
    /// Given a reference to a `Request` and the registered URL, determine if it should
    /// match or not.
    fn matches(&self, request: &Request, url: &Url) -> bool;
}

/// How many requests a mock expects to answer.
///
/// Mocks with an exact count answer that many requests; further matching requests are passed
/// through to the real transport and the overshoot is reported at teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Times {
    Exact(u64),
    Unlimited,
}

impl Times {
    pub fn is_unlimited(&self) -> bool {
        matches!(self, Times::Unlimited)
    }

    pub(crate) fn is_satisfied_by(&self, n_calls: u64) -> bool {
        match self {
            Times::Exact(expected) => *expected == n_calls,
            Times::Unlimited => true,
        }
    }
}

impl TryFrom<i64> for Times {
    type Error = Error;

    fn try_from(n: i64) -> Result<Self, Self::Error> {
        match n {
            UNLIMITED_TIMES => Ok(Times::Unlimited),
            n if n >= 0 => Ok(Times::Exact(n as u64)),
            n => Err(Error::InvalidTimes(n)),
        }
    }
}

impl From<u64> for Times {
    fn from(n: u64) -> Self {
        Times::Exact(n)
    }
}

impl Display for Times {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Times::Exact(n) => write!(f, "{}", n),
            Times::Unlimited => f.write_str("unlimited"),
        }
    }
}

/// What a mock decided to do with a request routed to it.
pub(crate) enum Dispatch {
    Respond(Response),
    /// Hand the request, back on its original scheme, to the real transport.
    PassThrough,
}

struct MockState {
    matcher: Arc<dyn Match>,
    expected: Times,
    invoked: u64,
    // Matching requests passed through after the mock was exhausted.
    exceeded: u64,
}

/// One registered expectation: a method + URL, the matcher deciding which requests it
/// answers, the responder producing the answer and the invocation ledger.
///
/// Counters are only touched under the mock's own lock.
pub(crate) struct Mock {
    origin_key: String,
    raw_url: String,
    // The registered URL on the mock scheme; `None` for wildcard registrations.
    url: Option<Url>,
    path: String,
    origin_scheme: String,
    responder: Arc<dyn Respond>,
    state: Mutex<MockState>,
}

impl Mock {
    pub(crate) fn new(
        origin_key: String,
        raw_url: &str,
        responder: Arc<dyn Respond>,
        expected: Times,
        matcher: Option<Arc<dyn Match>>,
    ) -> Result<Self, Error> {
        let (url, path, origin_scheme) = if raw_url == WILDCARD {
            (None, WILDCARD.to_owned(), String::new())
        } else {
            let parsed = Url::parse(raw_url).map_err(|e| Error::invalid_url(raw_url, e))?;
            let path = registry_path(&parsed);
            let origin_scheme = parsed.scheme().to_ascii_lowercase();
            let url = if path == WILDCARD {
                None
            } else {
                Some(reparse_with_scheme(raw_url, &parsed, MOCK_SCHEME)?)
            };
            (url, path, origin_scheme)
        };

        let matcher = match matcher {
            Some(matcher) => matcher,
            None if url.is_none() => Arc::new(AnyMatcher) as Arc<dyn Match>,
            None => Arc::new(DefaultMatcher),
        };

        Ok(Self {
            origin_key,
            raw_url: raw_url.to_owned(),
            url,
            path,
            origin_scheme,
            responder,
            state: Mutex::new(MockState {
                matcher,
                expected,
                invoked: 0,
                exceeded: 0,
            }),
        })
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    /// The scheme the mock was registered with, e.g. `https`.
    pub(crate) fn scheme(&self) -> &str {
        &self.origin_scheme
    }

    pub(crate) fn responder(&self) -> &Arc<dyn Respond> {
        &self.responder
    }

    /// `(expected, invoked)`.
    pub(crate) fn times(&self) -> (Times, u64) {
        let state = self.state.lock().expect("Poisoned lock!");
        (state.expected, state.invoked)
    }

    pub(crate) fn set_matcher(&self, matcher: Arc<dyn Match>) {
        self.state.lock().expect("Poisoned lock!").matcher = matcher;
    }

    pub(crate) fn set_expected_times(&self, expected: Times) {
        self.state.lock().expect("Poisoned lock!").expected = expected;
    }

    fn is_request_matched(&self, matcher: &dyn Match, request: &Request) -> bool {
        match &self.url {
            Some(url) => matcher.matches(request, url),
            None => {
                // Wildcards have no URL of their own: compare against the request itself.
                matcher.matches(request, &request.url)
            }
        }
    }

    /// Match, count and answer `request`.
    ///
    /// Unlimited mocks always answer. Bounded mocks answer until `invoked == expected`, then
    /// let matching requests through to the real transport and record the overshoot.
    pub(crate) fn round_trip(&self, request: &Request) -> Result<Dispatch, Error> {
        let mut state = self.state.lock().expect("Poisoned lock!");

        if !self.is_request_matched(state.matcher.as_ref(), request) {
            debug!("{} is not matched by {}", request.url, self.raw_url);
            return Ok(Dispatch::PassThrough);
        }

        match state.expected {
            Times::Exact(expected) if state.invoked >= expected => {
                state.exceeded += 1;
                debug!(
                    "{} {} exhausted after {} calls, passing through",
                    self.origin_key, self.path, expected
                );
                return Ok(Dispatch::PassThrough);
            }
            _ => state.invoked += 1,
        }

        let template = self.responder.respond(request)?;
        template.generate_response(request).map(Dispatch::Respond)
    }

    /// The registered key as users wrote it, e.g. `GET https://example.com/users`.
    pub(crate) fn display_key(&self) -> String {
        let origin = match self.origin_scheme.as_str() {
            "" => self.origin_key.clone(),
            scheme => self.origin_key.replacen(MOCK_SCHEME, scheme, 1),
        };
        match self.path.as_str() {
            "/" => format!("{}/", origin),
            path if path == WILDCARD => format!("{}/{}", origin, WILDCARD),
            path => format!("{}{}", origin, path),
        }
    }

    pub(crate) fn verify(&self) -> VerificationReport {
        let state = self.state.lock().expect("Poisoned lock!");
        VerificationReport {
            key: self.display_key(),
            expected: state.expected,
            invoked: state.invoked,
            exceeded: state.exceeded,
        }
    }
}

impl Debug for Mock {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (expected, invoked) = self.times();
        f.debug_struct("Mock")
            .field("raw_url", &self.raw_url)
            .field("origin_scheme", &self.origin_scheme)
            .field("expected_times", &expected)
            .field("invoked_times", &invoked)
            .finish()
    }
}

/// The registry key of a registered URL: its path, `/` when empty, [`WILDCARD`] for `/*`.
pub(crate) fn registry_path(url: &Url) -> String {
    match url.path() {
        "" | "/" => "/".to_owned(),
        "/*" | "*" => WILDCARD.to_owned(),
        path => path.to_owned(),
    }
}
