use flate2::read::GzDecoder;
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH};
use http::{HeaderMap, HeaderValue, StatusCode};
use http_body_util::BodyExt;
use hyper::body::{Bytes, Incoming};
use serde::de::DeserializeOwned;
use std::io::Read;

use crate::Error;

/// A fully buffered HTTP response, as returned by [`RoundTrip::round_trip`].
///
/// Responses produced from a mock always carry a `Content-Length` header; `content_length`
/// mirrors it when it can be parsed.
///
/// [`RoundTrip::round_trip`]: crate::RoundTrip::round_trip
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub content_length: Option<u64>,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok());
        Self {
            status,
            headers,
            body,
            content_length,
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Swap a gzip body for its decoded bytes, dropping `Content-Encoding` and resetting
    /// `Content-Length` to match.
    pub(crate) fn decode_gzip(mut self) -> Result<Self, Error> {
        let mut decoded = Vec::new();
        GzDecoder::new(&self.body[..]).read_to_end(&mut decoded)?;
        self.headers.remove(CONTENT_ENCODING);
        self.headers.insert(CONTENT_LENGTH, HeaderValue::from(decoded.len()));
        self.content_length = Some(decoded.len() as u64);
        self.body = Bytes::from(decoded);
        Ok(self)
    }

    pub(crate) async fn from_hyper(response: hyper::Response<Incoming>) -> Result<Self, Error> {
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| Error::Transport(Box::new(e)))?
            .to_bytes();
        Ok(Self::new(parts.status, parts.headers, body))
    }
}
