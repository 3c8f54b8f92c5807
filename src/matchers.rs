//! A collection of different matching strategies provided out-of-the-box by `httpmitm`.
//!
//! Every mock carries exactly one matcher. Unless [`by_matcher`] replaces it, that matcher
//! is [`DefaultMatcher`]. A matcher receives the outbound [`Request`] and the URL the mock
//! was registered with, its scheme already swapped for [`MOCK_SCHEME`].
//!
//! If the set of matchers provided out-of-the-box is not enough for your specific testing needs
//! you can implement your own thanks to the [`Match`] trait.
//!
//! Furthermore, `Fn` closures that take an immutable [`Request`] and [`Url`] reference as input
//! and return a boolean automatically implement [`Match`] and can be used where a matcher is
//! expected.
//!
//! [`by_matcher`]: crate::MitmTransport::by_matcher
//! [`MOCK_SCHEME`]: crate::MOCK_SCHEME
use crate::request::authority;
use crate::{Match, Request};
use assert_json_diff::{assert_json_matches_no_panic, CompareMode};
use http::{HeaderName, HeaderValue};
use log::debug;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::convert::TryInto;
use url::Url;

/// Implement the `Match` trait for all closures, out of the box,
/// if their signature is compatible.
impl<F> Match for F
where
    F: Fn(&Request, &Url) -> bool,
    F: Send + Sync,
{
    fn matches(&self, request: &Request, url: &Url) -> bool {
        // Just call the closure itself!
        self(request, url)
    }
}

#[derive(Debug, Default, Clone, Copy)]
/// The matcher used by every mock unless [`by_matcher`] says otherwise.
///
/// Comparisons are case-insensitive:
/// 1. the full request URL against the registered URL;
/// 2. failing that, `host + path` of both, with trailing slashes trimmed and query and
///    fragment ignored.
///
/// ### Example:
/// ```rust
/// use httpmitm::{Match, Request};
/// use httpmitm::matchers::DefaultMatcher;
/// use url::Url;
///
/// let registered = Url::parse("mitm://example.com/users/").unwrap();
///
/// let request = Request::get("mitm://EXAMPLE.com/users?page=2").unwrap();
/// assert!(DefaultMatcher.matches(&request, &registered));
///
/// let request = Request::get("mitm://example.com/groups").unwrap();
/// assert!(!DefaultMatcher.matches(&request, &registered));
/// ```
///
/// [`by_matcher`]: crate::MitmTransport::by_matcher
pub struct DefaultMatcher;

impl Match for DefaultMatcher {
    fn matches(&self, request: &Request, url: &Url) -> bool {
        if request.url.as_str().eq_ignore_ascii_case(url.as_str()) {
            return true;
        }

        let live = format!(
            "{}{}",
            authority(&request.url),
            request.url.path().trim_end_matches('/')
        );
        let registered = format!("{}{}", authority(url), url.path().trim_end_matches('/'));
        live.eq_ignore_ascii_case(&registered)
    }
}

#[derive(Debug)]
/// Match all requests routed to the mock, regardless of their URL, headers or body.
pub struct AnyMatcher;

/// Shorthand for [`AnyMatcher`].
pub fn any() -> AnyMatcher {
    AnyMatcher
}

impl Match for AnyMatcher {
    fn matches(&self, _request: &Request, _url: &Url) -> bool {
        true
    }
}

#[derive(Debug)]
/// Match only when the full request URL, query string included, equals the registered URL
/// (case-insensitively).
pub struct ExactUrlMatcher;

/// Shorthand for [`ExactUrlMatcher`].
pub fn exact_url() -> ExactUrlMatcher {
    ExactUrlMatcher
}

impl Match for ExactUrlMatcher {
    fn matches(&self, request: &Request, url: &Url) -> bool {
        request.url.as_str().eq_ignore_ascii_case(url.as_str())
    }
}

#[derive(Debug)]
/// Match the path of a request against a regular expression.
///
/// Useful on wildcard or root registrations, which receive requests for many paths.
pub struct PathRegexMatcher(Regex);

/// Shorthand for [`PathRegexMatcher::new`].
pub fn path_regex<T>(path: T) -> PathRegexMatcher
where
    T: Into<String>,
{
    PathRegexMatcher::new(path)
}

impl PathRegexMatcher {
    pub fn new<T: Into<String>>(path: T) -> Self {
        let path = path.into();

        Self(Regex::new(&path).expect("Failed to create regex for path matcher"))
    }
}

impl Match for PathRegexMatcher {
    fn matches(&self, request: &Request, _url: &Url) -> bool {
        self.0.is_match(request.url.path())
    }
}

#[derive(Debug)]
/// Match **exactly** the header of a request.
pub struct HeaderExactMatcher(HeaderName, HeaderValue);

/// Shorthand for [`HeaderExactMatcher::new`].
pub fn header<K, V>(key: K, value: V) -> HeaderExactMatcher
where
    K: TryInto<HeaderName>,
    <K as TryInto<HeaderName>>::Error: std::fmt::Debug,
    V: TryInto<HeaderValue>,
    <V as TryInto<HeaderValue>>::Error: std::fmt::Debug,
{
    HeaderExactMatcher::new(key, value)
}

impl HeaderExactMatcher {
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        <K as TryInto<HeaderName>>::Error: std::fmt::Debug,
        V: TryInto<HeaderValue>,
        <V as TryInto<HeaderValue>>::Error: std::fmt::Debug,
    {
        let key = key.try_into().expect("Failed to convert to header name.");
        let value = value
            .try_into()
            .expect("Failed to convert to header value.");
        Self(key, value)
    }
}

impl Match for HeaderExactMatcher {
    fn matches(&self, request: &Request, _url: &Url) -> bool {
        request
            .headers
            .get_all(&self.0)
            .iter()
            .any(|value| *value == self.1)
    }
}

#[derive(Debug)]
/// Match **exactly** the parameter in the query string of a request.
pub struct QueryParamExactMatcher(String, String);

impl QueryParamExactMatcher {
    /// Specify the expected value for a query parameter.
    pub fn new<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        let key = key.into();
        let value = value.into();
        Self(key, value)
    }
}

/// Shorthand for [`QueryParamExactMatcher::new`].
pub fn query_param<K, V>(key: K, value: V) -> QueryParamExactMatcher
where
    K: Into<String>,
    V: Into<String>,
{
    QueryParamExactMatcher::new(key, value)
}

impl Match for QueryParamExactMatcher {
    fn matches(&self, request: &Request, _url: &Url) -> bool {
        request
            .url
            .query_pairs()
            .any(|q| q.0 == self.0.as_str() && q.1 == self.1.as_str())
    }
}

#[derive(Debug)]
/// Match **exactly** the body of a request.
pub struct BodyExactMatcher(Vec<u8>);

impl BodyExactMatcher {
    pub fn string<T: Into<String>>(body: T) -> Self {
        Self(body.into().into_bytes())
    }

    pub fn bytes<T: Into<Vec<u8>>>(body: T) -> Self {
        Self(body.into())
    }
}

/// Shorthand for [`BodyExactMatcher::string`].
pub fn body_string<T>(body: T) -> BodyExactMatcher
where
    T: Into<String>,
{
    BodyExactMatcher::string(body)
}

impl Match for BodyExactMatcher {
    fn matches(&self, request: &Request, _url: &Url) -> bool {
        request.body == self.0
    }
}

#[derive(Debug)]
/// Match part of the body of a request as JSON: every field of the expected value must be
/// present in the body with the same value, extra fields are ignored.
pub struct BodyPartialJsonMatcher(Value);

impl BodyPartialJsonMatcher {
    /// Specify the part of the body that should be matched as a JSON value.
    pub fn json<T: Serialize>(body: T) -> Self {
        Self(serde_json::to_value(body).expect("Can't serialize to JSON"))
    }
}

/// Shorthand for [`BodyPartialJsonMatcher::json`].
pub fn body_partial_json<T: Serialize>(body: T) -> BodyPartialJsonMatcher {
    BodyPartialJsonMatcher::json(body)
}

impl Match for BodyPartialJsonMatcher {
    fn matches(&self, request: &Request, _url: &Url) -> bool {
        match serde_json::from_slice::<Value>(&request.body) {
            Ok(body) => {
                let config = assert_json_diff::Config::new(CompareMode::Inclusive);
                assert_json_matches_no_panic(&body, &self.0, config).is_ok()
            }
            Err(err) => {
                debug!("can't parse request body as JSON: {}", err);
                false
            }
        }
    }
}

/// Matches when both inner matchers match. Built with [`MatchExt::and`].
#[derive(Debug)]
pub struct And<A, B>(A, B);

impl<A: Match, B: Match> Match for And<A, B> {
    fn matches(&self, request: &Request, url: &Url) -> bool {
        self.0.matches(request, url) && self.1.matches(request, url)
    }
}

/// Combinators available on every [`Match`].
///
/// ```rust
/// use httpmitm::matchers::{header, DefaultMatcher, MatchExt};
///
/// // Keep the default URL comparison, and also require an API key.
/// let matcher = DefaultMatcher.and(header("x-api-key", "secret"));
/// # let _ = matcher;
/// ```
pub trait MatchExt: Match + Sized {
    fn and<M: Match>(self, other: M) -> And<Self, M> {
        And(self, other)
    }
}

impl<M: Match> MatchExt for M {}
