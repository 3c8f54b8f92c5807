#![allow(clippy::needless_doctest_main)]
//! `httpmitm` intercepts the outbound HTTP requests of the code under test and answers them
//! from expectations registered by the test, in-process, without a server.
//!
//! # Table of Contents
//! 1. [Getting started](#getting-started)
//! 2. [Resolution](#resolution)
//! 3. [Matchers](#matchers)
//! 4. [Spying](#spying)
//! 5. [Record and replay](#record-and-replay)
//! 6. [Test isolation](#test-isolation)
//! 7. [Runtime compatibility](#runtime-compatibility)
//!
//! ## Getting started
//! ```rust
//! use httpmitm::{MitmTransport, PanicReporter, Request, RoundTrip};
//!
//! #[async_std::main]
//! async fn main() {
//!     let transport = MitmTransport::new();
//!
//!     // Arrange: a GET on https://example.com/hello answers 200 "world", twice.
//!     transport
//!         .stub_default_transport(PanicReporter)
//!         .mock_request("GET", "https://example.com/hello")
//!         .times(2)
//!         .with_response(200, None, "world");
//!
//!     // Code under test sends requests on the `mitm` scheme in place of `https`.
//!     for _ in 0..2 {
//!         let request = Request::get("mitm://example.com/hello").unwrap();
//!         let response = transport.round_trip(request).await.unwrap();
//!         assert_eq!(response.status, 200);
//!         assert_eq!(response.text(), "world");
//!     }
//!
//!     // Origins nobody registered are refused, like a closed port.
//!     let request = Request::get("mitm://example.org/").unwrap();
//!     assert!(transport.round_trip(request).await.is_err());
//!
//!     // Verify expectations and restore the default transport.
//!     transport.unstub_default_transport();
//! }
//! ```
//!
//! ## Resolution
//!
//! Mocks are grouped by origin (method + host) and keyed by path. An outbound request is
//! answered by the mock registered for its exact path, failing that by the mock registered
//! for `/`, failing that by the one registered for `/*`.
//! Unknown origins fail with [`Error::Refused`], unknown paths with [`Error::NotFound`].
//!
//! A mock answers as many times as [`times`] says (once by default). Matching requests
//! beyond that, and requests its matcher rejects, are handed to the real transport.
//!
//! ## Matchers
//!
//! `httpmitm` provides a set of matching strategies out of the box - check the [`matchers`]
//! module for a complete list.
//!
//! You can define your own matchers using the [`Match`] trait, as well as using `Fn` closures.
//! Check [`Match`]'s documentation for more details and examples.
//!
//! ## Spying
//!
//! Expectations are verified when the transport is unstubbed, or dropped while stubbed.
//! Unmet expectations go to the [`Reporter`] given to [`stub_default_transport`]:
//! [`PanicReporter`] fails the test, a closure can collect them instead.
//!
//! ## Record and replay
//!
//! Responses can read their body from a [`Testdata`] store. While the transport is
//! [`pause`]d, requests go to the real transport and successful bodies are written to the
//! store, ready to be replayed once it is resumed.
//!
//! ## Test isolation
//!
//! Registrations live on their [`MitmTransport`] instance. [`default_transport`] is
//! process-wide: only one transport can be stubbed at a time, other threads wait for it to
//! be unstubbed before installing theirs.
//!
//! ## Runtime compatibility
//!
//! Mocked requests never touch the network and work on any executor; `httpmitm` is tested with
//! both [`async_std`] and [`tokio`]. Passthrough requests sent by [`HttpTransport`] need
//! a tokio reactor.
//!
//! [`times`]: MitmTransport::times
//! [`stub_default_transport`]: MitmTransport::stub_default_transport
//! [`pause`]: MitmTransport::pause
//! [`async_std`]: https://docs.rs/async-std/
//! [`tokio`]: https://docs.rs/tokio/
mod body;
mod error;
pub mod http;
pub mod matchers;
mod mock;
mod registry;
mod request;
mod respond;
mod response;
mod response_template;
mod testdata;
mod transport;
mod verification;

pub use body::{Body, Encoding};
pub use error::{BoxError, Error};
pub use mock::{Match, Times, DEFAULT_TIMES, MOCK_SCHEME, UNLIMITED_TIMES, WILDCARD};
pub use request::{BodyPrintLimit, Request, BODY_PRINT_LIMIT};
pub use respond::{NotFoundResponder, RefusedResponder, Respond, TimeoutResponder};
pub use response::Response;
pub use response_template::ResponseTemplate;
pub use testdata::{default_key, FileTestdata, MemoryTestdata, Testdata};
pub use transport::{
    default_transport, HttpTransport, MitmTransport, MitmTransportBuilder, RoundTrip,
};
pub use verification::{PanicReporter, Reporter, VerificationReport};
