use std::sync::Arc;

use http::StatusCode;

use crate::error::BoxError;
use crate::testdata::Testdata;
use crate::{Error, Request, ResponseTemplate};

/// Anything that implements `Respond` can be used to reply to an outbound request when a
/// mock matches it.
///
/// ## Fixed responses
///
/// The simplest `Respond` is [`ResponseTemplate`]: no matter the request, it will
/// always return itself.
///
/// ## Dynamic responses
///
/// Closures taking a `&Request` and returning `Result<ResponseTemplate, BoxError>` implement
/// `Respond` out of the box. They are invoked once per matched request; an `Err` is surfaced
/// from `round_trip` as [`Error::Callee`].
///
/// ```rust
/// use httpmitm::{MitmTransport, Request, ResponseTemplate, RoundTrip};
///
/// #[async_std::main]
/// async fn main() {
///     let transport = MitmTransport::new();
///     transport
///         .mock_request("GET", "https://example.com/echo")
///         .with_callee_response(|request: &Request| {
///             let query = request.url.query().unwrap_or_default().to_owned();
///             Ok(ResponseTemplate::new(200).set_body_string(query))
///         });
///
///     let request = Request::get("mitm://example.com/echo?name=mitm").unwrap();
///     let response = transport.round_trip(request).await.unwrap();
///     assert_eq!(response.text(), "name=mitm");
/// }
/// ```
pub trait Respond: Send + Sync {
    /// Given a reference to a [`Request`] return the [`ResponseTemplate`] the response is
    /// generated from, or the error the client should observe.
    fn respond(&self, request: &Request) -> Result<ResponseTemplate, Error>;

    /// The status this responder answers with, when it is fixed.
    ///
    /// While the transport is paused, live responses carrying this status are recorded even
    /// when they are not successful.
    fn expected_status(&self) -> Option<StatusCode> {
        None
    }

    /// The store live responses are recorded into while the transport is paused.
    fn testdata(&self) -> Option<Arc<dyn Testdata>> {
        None
    }
}

impl Respond for ResponseTemplate {
    fn respond(&self, _request: &Request) -> Result<ResponseTemplate, Error> {
        Ok(self.clone())
    }

    fn expected_status(&self) -> Option<StatusCode> {
        Some(self.status_code())
    }

    fn testdata(&self) -> Option<Arc<dyn Testdata>> {
        self.body().testdata_store().cloned()
    }
}

impl<F> Respond for F
where
    F: Fn(&Request) -> Result<ResponseTemplate, BoxError>,
    F: Send + Sync,
{
    fn respond(&self, request: &Request) -> Result<ResponseTemplate, Error> {
        self(request).map_err(Error::Callee)
    }
}

/// Always fails with [`Error::Refused`], as if nothing was listening.
///
/// Registrations that are opened with `mock_request` but never given a response are
/// turned into this responder.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefusedResponder;

impl Respond for RefusedResponder {
    fn respond(&self, _request: &Request) -> Result<ResponseTemplate, Error> {
        Err(Error::Refused)
    }
}

/// Always fails with [`Error::Timeout`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeoutResponder;

impl Respond for TimeoutResponder {
    fn respond(&self, _request: &Request) -> Result<ResponseTemplate, Error> {
        Err(Error::Timeout)
    }
}

/// Always fails with [`Error::NotFound`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFoundResponder;

impl Respond for NotFoundResponder {
    fn respond(&self, _request: &Request) -> Result<ResponseTemplate, Error> {
        Err(Error::NotFound)
    }
}
