//! The process-wide default transport.
//!
//! At most one [`MitmTransport`] is installed at a time. The slot only holds a weak
//! reference: a transport dropped without being unstubbed frees it on drop.
use super::{HttpTransport, MitmTransport, RoundTrip, TransportState};
use crate::Error;
use log::debug;
use once_cell::sync::Lazy;
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::{self, ThreadId};

struct Installed {
    owner: Weak<TransportState>,
    thread: ThreadId,
}

struct Installation {
    slot: Mutex<Option<Installed>>,
    released: Condvar,
}

static INSTALLATION: Lazy<Installation> = Lazy::new(|| Installation {
    slot: Mutex::new(None),
    released: Condvar::new(),
});

static REAL_TRANSPORT: Lazy<Arc<HttpTransport>> = Lazy::new(|| Arc::new(HttpTransport::new()));

/// The shared real transport, built once so root certificates are loaded once.
pub(super) fn real_transport() -> Arc<HttpTransport> {
    REAL_TRANSPORT.clone()
}

/// Install `state` as the default transport.
///
/// Blocks while a transport owned by another thread is installed. Installing a second
/// transport from the thread that owns the current one would wait forever, so it fails
/// with [`Error::AlreadyInstalled`] instead.
pub(super) fn install(state: &Arc<TransportState>) -> Result<(), Error> {
    let mut slot = INSTALLATION.slot.lock().expect("Poisoned lock!");
    loop {
        match slot.as_ref() {
            None => break,
            Some(installed) if installed.owner.strong_count() == 0 => break,
            Some(installed) if Weak::as_ptr(&installed.owner) == Arc::as_ptr(state) => {
                return Ok(())
            }
            Some(installed) if installed.thread == thread::current().id() => {
                return Err(Error::AlreadyInstalled)
            }
            Some(_) => {
                debug!("Waiting for the default transport to be unstubbed");
                slot = INSTALLATION.released.wait(slot).expect("Poisoned lock!");
            }
        }
    }
    *slot = Some(Installed {
        owner: Arc::downgrade(state),
        thread: thread::current().id(),
    });
    Ok(())
}

/// Free the slot if `state` holds it.
pub(super) fn restore(state: &TransportState) {
    let mut slot = INSTALLATION.slot.lock().expect("Poisoned lock!");
    let owned = matches!(
        slot.as_ref(),
        Some(installed) if std::ptr::eq(Weak::as_ptr(&installed.owner), state)
    );
    if owned {
        *slot = None;
        INSTALLATION.released.notify_all();
        debug!("Default transport restored");
    }
}

/// The transport application code should send its requests through: the stubbed
/// [`MitmTransport`] if one is installed, a shared [`HttpTransport`] otherwise.
///
/// ```rust
/// use httpmitm::{default_transport, MitmTransport, PanicReporter, Request, RoundTrip};
///
/// #[async_std::main]
/// async fn main() {
///     let transport = MitmTransport::new();
///     transport
///         .stub_default_transport(PanicReporter)
///         .mock_request("GET", "https://example.com/")
///         .with_response(204, None, ());
///
///     let request = Request::get("mitm://example.com/").unwrap();
///     let response = default_transport().round_trip(request).await.unwrap();
///     assert_eq!(response.status, 204);
///
///     transport.unstub_default_transport();
/// }
/// ```
pub fn default_transport() -> Arc<dyn RoundTrip> {
    let installed = INSTALLATION
        .slot
        .lock()
        .expect("Poisoned lock!")
        .as_ref()
        .and_then(|installed| installed.owner.upgrade());
    match installed {
        Some(state) => Arc::new(MitmTransport::from_state(state)),
        None => real_transport(),
    }
}
