use crate::body::{Body, Encoding};
use crate::{Error, Request, Response};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use std::convert::TryInto;

/// The blueprint for responses returned by a mock when it matches an outbound request.
///
/// The body is kept as a [`Body`] and converted to bytes on every response, so record/replay
/// stores are read per request while static bodies yield the very same bytes each time.
#[derive(Clone, Debug)]
pub struct ResponseTemplate {
    status_code: StatusCode,
    headers: HeaderMap,
    body: Body,
    encoding: Encoding,
}

// `httpmitm` is a crate meant for testing - failures are most likely not handled/temporary mistakes.
// Hence we prefer to panic and provide an easier API than to use `Result`s thus pushing
// the burden of "correctness" (and conversions) on the user.
//
// Body conversion is the exception: it is deferred to response time and surfaces as an
// `Error` from `round_trip`, the same way a broken upstream would.
impl ResponseTemplate {
    /// Start building a `ResponseTemplate` specifying the status code of the response.
    pub fn new<S>(s: S) -> Self
    where
        S: TryInto<StatusCode>,
        <S as TryInto<StatusCode>>::Error: std::fmt::Debug,
    {
        let status_code = s.try_into().expect("Failed to convert into status code.");
        Self {
            status_code,
            headers: HeaderMap::new(),
            body: Body::Empty,
            encoding: Encoding::Raw,
        }
    }

    pub(crate) fn from_parts(
        code: u16,
        headers: Option<HeaderMap>,
        body: Body,
        encoding: Encoding,
    ) -> Self {
        let mut template = Self::new(code).set_body(body).set_encoding(encoding);
        if let Some(headers) = headers {
            template.headers = headers;
        }
        template
    }

    /// Append a header `value` to list of headers with `key` as header name.
    ///
    /// Unlike `insert_header`, this function will not override the contents of a header:
    /// - if there are no header values with `key` as header name, it will insert one;
    /// - if there are already some values with `key` as header name, it will append to the
    ///   existing list.
    pub fn append_header<K, V>(mut self, key: K, value: V) -> Self
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
        self.headers.append(key, value);
        self
    }

    /// Insert a header `value` with `key` as header name.
    ///
    /// This function will override the contents of a header:
    /// - if there are no header values with `key` as header name, it will insert one;
    /// - if there are already some values with `key` as header name, it will drop them and
    ///   start a new list of header values, containing only `value`.
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

    pub fn set_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    pub fn set_body_string<T: Into<String>>(self, body: T) -> Self {
        self.set_body(Body::Text(body.into()))
    }

    pub fn set_body_bytes<B: Into<Vec<u8>>>(self, body: B) -> Self {
        self.set_body(Body::Bytes(body.into()))
    }

    /// Serialize `body` as JSON and set `Content-Type: application/json`.
    ///
    /// Panics if `body` cannot be represented as JSON.
    pub fn set_body_json<B: serde::Serialize>(self, body: B) -> Self {
        let body = Body::structured(body).expect("Failed to convert into body.");
        self.set_body(body).set_encoding(Encoding::Json)
    }

    /// Choose how structured bodies are encoded. JSON and XML also force the matching
    /// `Content-Type`.
    pub fn set_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    pub(crate) fn body(&self) -> &Body {
        &self.body
    }

    /// Build the response for `request`.
    ///
    /// `Content-Length` is injected from the produced body unless the template already
    /// carries one, in which case it is left untouched and the body is not adjusted to it.
    pub(crate) fn generate_response(&self, request: &Request) -> Result<Response, Error> {
        let body = self.body.to_bytes(self.encoding, request)?;

        let mut headers = self.headers.clone();
        if let Some(mime) = self.encoding.content_type() {
            headers.insert(http::header::CONTENT_TYPE, HeaderValue::from_static(mime));
        }
        if !headers.contains_key(http::header::CONTENT_LENGTH) {
            headers.insert(http::header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        }

        Ok(Response::new(self.status_code, headers, body))
    }
}
