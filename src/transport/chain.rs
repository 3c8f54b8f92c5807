use crate::mock::{registry_path, Times, MOCK_SCHEME};
use crate::request::{authority, parse_method, reparse_with_scheme};
use crate::{Error, Match};
use http::Method;
use std::sync::Arc;
use url::Url;

/// A method + URL as passed to `mock_request`, with the keys it lives under.
#[derive(Debug, Clone)]
pub(crate) struct Registration {
    pub(crate) method: Method,
    pub(crate) raw_url: String,
    pub(crate) origin_key: String,
    pub(crate) path: String,
}

impl Registration {
    pub(crate) fn parse(method: &str, raw_url: &str) -> Result<Self, Error> {
        let method = parse_method(method)?;
        let url = Url::parse(raw_url).map_err(|e| Error::invalid_url(raw_url, e))?;
        let mocked = reparse_with_scheme(raw_url, &url, MOCK_SCHEME)?;
        Ok(Self {
            origin_key: normalize_key(&method, MOCK_SCHEME, &authority(&mocked)),
            path: registry_path(&url),
            method,
            raw_url: raw_url.to_owned(),
        })
    }

    fn is_same_as(&self, other: &Registration) -> bool {
        self.method == other.method && self.raw_url.eq_ignore_ascii_case(&other.raw_url)
    }
}

/// A registration still waiting for its response.
pub(crate) struct Pending {
    pub(crate) registration: Registration,
    pub(crate) matcher: Option<Arc<dyn Match>>,
    pub(crate) times: Times,
}

/// The cursor of the `mock_request(..).times(..).with_response(..)` chain.
///
/// `Idle` until the first `mock_request`; `Pending` until a response is attached;
/// `Committed` afterwards, when `times` and `by_matcher` reconfigure the registered mock.
#[derive(Default)]
pub(crate) enum Chain {
    #[default]
    Idle,
    Pending(Pending),
    Committed(Registration),
}

pub(crate) enum Opened {
    /// Same method + URL as the pending registration: nothing changes.
    Reentered,
    /// A new registration is pending. `abandoned` is the previous one if it never got a
    /// response.
    Fresh { abandoned: Option<Registration> },
}

impl Chain {
    pub(crate) fn open(&mut self, registration: Registration) -> Opened {
        let abandoned = match std::mem::take(self) {
            Chain::Pending(pending) if pending.registration.is_same_as(&registration) => {
                *self = Chain::Pending(pending);
                return Opened::Reentered;
            }
            Chain::Pending(pending) => Some(pending.registration),
            Chain::Idle | Chain::Committed(_) => None,
        };

        *self = Chain::Pending(Pending {
            registration,
            matcher: None,
            times: Times::Exact(crate::mock::DEFAULT_TIMES as u64),
        });
        Opened::Fresh { abandoned }
    }

    /// Move `Pending` to `Committed`, handing back what the mock should be built from.
    pub(crate) fn commit(&mut self) -> Result<Pending, Error> {
        match std::mem::take(self) {
            Chain::Pending(pending) => {
                *self = Chain::Committed(pending.registration.clone());
                Ok(pending)
            }
            Chain::Committed(registration) => {
                *self = Chain::Committed(registration);
                Err(Error::NotChainedResponse)
            }
            Chain::Idle => Err(Error::NotChained),
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Chain::Idle;
    }
}

/// `UPPERCASE(method) + " " + lowercase(scheme://host)`, trailing slash trimmed.
pub(crate) fn normalize_key(method: &Method, scheme: &str, host: &str) -> String {
    let origin = format!("{}://{}", scheme, host).to_lowercase();
    format!(
        "{} {}",
        method.as_str().to_ascii_uppercase(),
        origin.trim_end_matches('/')
    )
}
