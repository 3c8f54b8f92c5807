use super::RoundTrip;
use crate::{Error, Request, Response};
use async_trait::async_trait;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use log::{debug, warn};

/// The real transport: sends requests over the network with a pooled hyper client.
///
/// Speaks `http` and `https`; any other scheme fails with [`Error::UnsupportedScheme`].
/// Certificates are checked against the platform's roots, or the bundled webpki roots when
/// none can be loaded. Connections are driven by the ambient tokio runtime.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl HttpTransport {
    pub fn new() -> Self {
        let roots = HttpsConnectorBuilder::new()
            .with_native_roots()
            .unwrap_or_else(|e| {
                warn!("No native root certificates ({}), using webpki roots", e);
                HttpsConnectorBuilder::new().with_webpki_roots()
            });
        let connector = roots.https_or_http().enable_http1().build();
        Self {
            client: Client::builder(TokioExecutor::new()).build(connector),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoundTrip for HttpTransport {
    async fn round_trip(&self, request: Request) -> Result<Response, Error> {
        match request.url.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::UnsupportedScheme(scheme.to_owned())),
        }
        debug!("{} {}", request.method, request.url);

        let response = self
            .client
            .request(request.into_hyper()?)
            .await
            .map_err(|e| Error::Transport(Box::new(e)))?;
        Response::from_hyper(response).await
    }
}
