//! Record/replay storage for response bodies.
//!
//! A [`Testdata`] store is attached to a response through [`Body::testdata`]: every matched
//! request reads its body from the store (replay), and while the owning
//! [`MitmTransport`] is paused the bodies returned by the real transport are written back
//! into it (record).
//!
//! [`Body::testdata`]: crate::Body::testdata
//! [`MitmTransport`]: crate::MitmTransport
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use base64::prelude::{Engine as _, BASE64_URL_SAFE_NO_PAD};
use http::Method;
use url::Url;

use crate::Error;

/// A keyed store of response bodies.
///
/// Only [`read`] and [`write`] are required; [`key`] defaults to `"METHOD /path"`.
///
/// [`read`]: Testdata::read
/// [`write`]: Testdata::write
/// [`key`]: Testdata::key
pub trait Testdata: Send + Sync {
    /// Derive the storage key of a request.
    fn key(&self, method: &Method, url: &Url) -> String {
        default_key(method, url)
    }

    fn read(&self, key: &str) -> Result<Vec<u8>, Error>;

    fn write(&self, key: &str, data: &[u8]) -> Result<(), Error>;
}

impl<T: Testdata + ?Sized> Testdata for Arc<T> {
    fn key(&self, method: &Method, url: &Url) -> String {
        (**self).key(method, url)
    }

    fn read(&self, key: &str) -> Result<Vec<u8>, Error> {
        (**self).read(key)
    }

    fn write(&self, key: &str, data: &[u8]) -> Result<(), Error> {
        (**self).write(key, data)
    }
}

/// `"METHOD /path"`, with `/` standing in for an empty path. Query and fragment are ignored.
pub fn default_key(method: &Method, url: &Url) -> String {
    let path = match url.path() {
        "" => "/",
        path => path,
    };
    format!("{} {}", method, path)
}

fn missing(key: &str) -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::NotFound,
        format!("no testdata recorded for `{}`", key),
    ))
}

/// An in-process [`Testdata`] store.
///
/// ### Example:
/// ```rust
/// use httpmitm::{MemoryTestdata, Testdata};
///
/// let store = MemoryTestdata::new().with("GET /", "Hello, httpmitm!");
/// assert_eq!(store.read("GET /").unwrap(), b"Hello, httpmitm!".to_vec());
/// assert!(store.read("GET /missing").is_err());
/// ```
#[derive(Debug, Default)]
pub struct MemoryTestdata {
    contents: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryTestdata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a body for `key`.
    pub fn with(self, key: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.contents
            .write()
            .expect("Poisoned lock!")
            .insert(key.into(), data.into());
        self
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .contents
            .read()
            .expect("Poisoned lock!")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

impl Testdata for MemoryTestdata {
    fn read(&self, key: &str) -> Result<Vec<u8>, Error> {
        self.contents
            .read()
            .expect("Poisoned lock!")
            .get(key)
            .cloned()
            .ok_or_else(|| missing(key))
    }

    fn write(&self, key: &str, data: &[u8]) -> Result<(), Error> {
        self.contents
            .write()
            .expect("Poisoned lock!")
            .insert(key.to_owned(), data.to_vec());
        Ok(())
    }
}

/// A [`Testdata`] store keeping one file per key under a directory.
///
/// File names are the URL-safe base64 encoding of the key, so any key maps to a valid
/// file name. The directory is created on the first write.
#[derive(Debug, Clone)]
pub struct FileTestdata {
    root: PathBuf,
}

impl FileTestdata {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.testdata", BASE64_URL_SAFE_NO_PAD.encode(key)))
    }
}

impl Testdata for FileTestdata {
    fn read(&self, key: &str) -> Result<Vec<u8>, Error> {
        match std::fs::read(self.path_for(key)) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(missing(key)),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, data: &[u8]) -> Result<(), Error> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::write(self.path_for(key), data)?;
        Ok(())
    }
}
