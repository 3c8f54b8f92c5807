use std::fmt;
use std::str::FromStr;

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use http_body_util::Full;
use hyper::body::Bytes;
use serde::de::DeserializeOwned;
use url::{Position, Url};

use crate::Error;

pub const BODY_PRINT_LIMIT: usize = 10_000;

/// Specifies limitations on printing request bodies when logging requests. For some test suites
/// the bodies may be too large to reasonably print and it may be desirable to limit them.
#[derive(Debug, Copy, Clone)]
pub enum BodyPrintLimit {
    /// Maximum length of a body to print in bytes.
    Limited(usize),
    /// There is no limit to the size of a body that may be printed.
    Unlimited,
}

/// An outbound request handed to a [`RoundTrip`] implementation.
///
/// Requests destined for a [`MitmTransport`] use the [`MOCK_SCHEME`] (`mitm://...`) in place
/// of `http`/`https`. Every matcher gets an immutable reference to the `Request` in
/// [`Match::matches`].
///
/// [`RoundTrip`]: crate::RoundTrip
/// [`MitmTransport`]: crate::MitmTransport
/// [`MOCK_SCHEME`]: crate::MOCK_SCHEME
/// [`Match::matches`]: crate::Match::matches
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Request {
    /// Build a body-less request. The method is upper-cased before parsing.
    pub fn new(method: impl AsRef<str>, url: impl AsRef<str>) -> Result<Self, Error> {
        let method = parse_method(method.as_ref())?;
        let url = Url::parse(url.as_ref()).map_err(|e| Error::invalid_url(url.as_ref(), e))?;
        Ok(Self {
            url,
            method,
            headers: HeaderMap::new(),
            body: Vec::new(),
        })
    }

    /// Shorthand for a `GET` request.
    pub fn get(url: impl AsRef<str>) -> Result<Self, Error> {
        Self::new("GET", url)
    }

    pub fn insert_header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        <K as TryInto<HeaderName>>::Error: std::fmt::Debug,
        V: TryInto<HeaderValue>,
        <V as TryInto<HeaderValue>>::Error: std::fmt::Debug,
    {
        let key = key.try_into().expect("Failed to convert into header name.");
        let value = value
            .try_into()
            .expect("Failed to convert into header value.");
        self.headers.insert(key, value);
        self
    }

    pub fn set_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Replace the scheme of the request URL, e.g. `mitm` back to `https`.
    pub fn set_scheme(&mut self, scheme: &str) -> Result<(), Error> {
        self.url = rewrite_scheme(&self.url, scheme)?;
        Ok(())
    }

    /// The request path, `/` when the URL carries none.
    pub fn path(&self) -> &str {
        match self.url.path() {
            "" => "/",
            path => path,
        }
    }

    pub(crate) fn into_hyper(self) -> Result<http::Request<Full<Bytes>>, Error> {
        let mut builder = http::Request::builder()
            .method(self.method)
            .uri(self.url.as_str());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(self.headers);
        }
        builder
            .body(Full::new(Bytes::from(self.body)))
            .map_err(|e| Error::Transport(Box::new(e)))
    }

    pub(crate) fn print_with_limit(
        &self,
        mut buffer: impl fmt::Write,
        body_print_limit: BodyPrintLimit,
    ) -> fmt::Result {
        writeln!(buffer, "{} {}", self.method, self.url)?;
        for name in self.headers.keys() {
            let values = self
                .headers
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()))
                .collect::<Vec<_>>();
            let values = values.join(",");
            writeln!(buffer, "{}: {}", name, values)?;
        }

        match body_print_limit {
            BodyPrintLimit::Limited(limit) if self.body.len() > limit => {
                // Back off to the closest char boundary at or below the limit.
                let end = (limit.saturating_sub(3)..=limit)
                    .rev()
                    .find(|end| std::str::from_utf8(&self.body[..*end]).is_ok());
                match end {
                    Some(end) => {
                        writeln!(buffer, "{}", String::from_utf8_lossy(&self.body[..end]))?;
                        writeln!(
                            buffer,
                            "We truncated the body because it was too large: {} bytes (limit: {} bytes)",
                            self.body.len(),
                            limit
                        )?;
                        writeln!(
                            buffer,
                            "Increase this limit by setting `HTTPMITM_BODY_PRINT_LIMIT`, or calling `MitmTransportBuilder::body_print_limit` when building your MitmTransport instance"
                        )
                    }
                    None => writeln!(
                        buffer,
                        "Body is likely binary (invalid utf-8) size is {} bytes",
                        self.body.len()
                    ),
                }
            }
            _ => {
                if let Ok(body) = std::str::from_utf8(&self.body) {
                    writeln!(buffer, "{}", body)
                } else {
                    writeln!(
                        buffer,
                        "Body is likely binary (invalid utf-8) size is {} bytes",
                        self.body.len()
                    )
                }
            }
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.print_with_limit(f, BodyPrintLimit::Limited(BODY_PRINT_LIMIT))
    }
}

/// `host[:port]` as it appears in the URL.
pub(crate) fn authority(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_owned(),
        (None, _) => String::new(),
    }
}

pub(crate) fn parse_method(method: &str) -> Result<Method, Error> {
    Method::from_str(&method.to_ascii_uppercase())
        .map_err(|_| Error::InvalidMethod(method.to_owned()))
}

/// Re-parse `raw`, already parsed as `parsed`, under `scheme`.
///
/// Starts from the raw text: parsing under `http`/`https` drops a default port that the
/// `mitm://` request keeps.
pub(crate) fn reparse_with_scheme(raw: &str, parsed: &Url, scheme: &str) -> Result<Url, Error> {
    let raw = raw.trim();
    let split = parsed.scheme().len();
    match raw.get(..split) {
        Some(prefix) if prefix.eq_ignore_ascii_case(parsed.scheme()) => {
            let rewritten = format!("{}{}", scheme, &raw[split..]);
            Url::parse(&rewritten).map_err(|e| Error::invalid_url(rewritten, e))
        }
        _ => rewrite_scheme(parsed, scheme),
    }
}

/// `Url::set_scheme` refuses to move between special (`http`) and non-special (`mitm`)
/// schemes, so the URL is re-parsed with the new scheme instead.
pub(crate) fn rewrite_scheme(url: &Url, scheme: &str) -> Result<Url, Error> {
    if url.scheme().eq_ignore_ascii_case(scheme) {
        return Ok(url.clone());
    }
    let rewritten = format!("{}{}", scheme, &url[Position::AfterScheme..]);
    Url::parse(&rewritten).map_err(|e| Error::invalid_url(rewritten, e))
}
