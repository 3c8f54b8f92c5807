use std::fmt::{self, Debug, Formatter};
use std::io::Read;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use sxd_document::dom::{Document, Element};
use sxd_document::Package;

use crate::testdata::Testdata;
use crate::{Error, Request};

/// The value a mocked response is built from.
///
/// Raw shapes (`Text`, `Bytes`, `Form`, `Testdata`) are written to the wire unchanged no
/// matter which [`Encoding`] the response uses. `Structured` values need an encoding:
/// they are rejected with [`Error::Unsupported`] by plain responses and serialized by JSON
/// and XML responses.
#[derive(Clone, Default)]
pub enum Body {
    #[default]
    Empty,
    Text(String),
    Bytes(Vec<u8>),
    /// `application/x-www-form-urlencoded` pairs, encoded sorted by key.
    Form(Vec<(String, String)>),
    Structured(Value),
    /// Read from a record/replay store on every response.
    Testdata(Arc<dyn Testdata>),
}

/// How [`Body::Structured`] values are turned into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Raw,
    Json,
    Xml,
}

impl Encoding {
    pub(crate) fn content_type(&self) -> Option<&'static str> {
        match self {
            Encoding::Raw => None,
            Encoding::Json => Some("application/json"),
            Encoding::Xml => Some("text/xml"),
        }
    }
}

impl Body {
    /// Capture any serializable value, to be encoded by a JSON or XML response.
    pub fn structured<T: Serialize>(value: T) -> Result<Self, Error> {
        serde_json::to_value(value)
            .map(Body::Structured)
            .map_err(|e| Error::Encode(e.to_string()))
    }

    pub fn form<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Body::Form(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Drain `reader` into an in-memory body, so it can be served more than once.
    pub fn from_reader<R: Read>(mut reader: R) -> std::io::Result<Self> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        Ok(Body::Bytes(buffer))
    }

    pub fn testdata<T: Testdata + 'static>(store: T) -> Self {
        Body::Testdata(Arc::new(store))
    }

    pub(crate) fn testdata_store(&self) -> Option<&Arc<dyn Testdata>> {
        match self {
            Body::Testdata(store) => Some(store),
            _ => None,
        }
    }

    /// Turn the body into wire bytes for `request`.
    pub(crate) fn to_bytes(&self, encoding: Encoding, request: &Request) -> Result<Vec<u8>, Error> {
        match self {
            Body::Empty => Ok(Vec::new()),
            Body::Text(text) => Ok(text.as_bytes().to_vec()),
            Body::Bytes(bytes) => Ok(bytes.clone()),
            Body::Form(pairs) => {
                let mut pairs = pairs.clone();
                pairs.sort_by(|a, b| a.0.cmp(&b.0));
                Ok(url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(pairs)
                    .finish()
                    .into_bytes())
            }
            Body::Testdata(store) => store.read(&store.key(&request.method, &request.url)),
            Body::Structured(value) => match encoding {
                Encoding::Raw => Err(Error::Unsupported(
                    "structured values need a JSON or XML response",
                )),
                Encoding::Json => {
                    serde_json::to_vec(value).map_err(|e| Error::Encode(e.to_string()))
                }
                Encoding::Xml => to_xml(value),
            },
        }
    }
}

impl Debug for Body {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Body::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Body::Form(pairs) => f.debug_tuple("Form").field(pairs).finish(),
            Body::Structured(value) => f.debug_tuple("Structured").field(value).finish(),
            Body::Testdata(_) => f.write_str("Testdata(..)"),
        }
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_owned())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<&[u8]> for Body {
    fn from(bytes: &[u8]) -> Self {
        Body::Bytes(bytes.to_vec())
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Structured(value)
    }
}

impl From<Arc<dyn Testdata>> for Body {
    fn from(store: Arc<dyn Testdata>) -> Self {
        Body::Testdata(store)
    }
}

impl From<()> for Body {
    fn from(_: ()) -> Self {
        Body::Empty
    }
}

/// XML needs a single root element: the value must be an object with exactly one key,
/// which names the root. Arrays repeat their parent element.
fn to_xml(value: &Value) -> Result<Vec<u8>, Error> {
    let (root, content) = match value {
        Value::Object(map) if map.len() == 1 => match map.iter().next() {
            Some(entry) => entry,
            None => return Err(Error::Unsupported("XML bodies need a root element")),
        },
        _ => {
            return Err(Error::Unsupported(
                "XML bodies need an object with exactly one root key",
            ))
        }
    };

    let package = Package::new();
    let document = package.as_document();
    let element = document.create_element(root.as_str());
    append_xml(&document, element, content);
    document.root().append_child(element);

    let mut output = Vec::new();
    sxd_document::writer::format_document(&document, &mut output)
        .map_err(|e| Error::Encode(e.to_string()))?;
    Ok(output)
}

fn append_xml<'d>(document: &Document<'d>, parent: Element<'d>, value: &Value) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (name, child) in map {
                match child {
                    Value::Array(items) => {
                        for item in items {
                            let element = document.create_element(name.as_str());
                            append_xml(document, element, item);
                            parent.append_child(element);
                        }
                    }
                    _ => {
                        let element = document.create_element(name.as_str());
                        append_xml(document, element, child);
                        parent.append_child(element);
                    }
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                let element = document.create_element("item");
                append_xml(document, element, item);
                parent.append_child(element);
            }
        }
        Value::String(text) => {
            parent.append_child(document.create_text(text));
        }
        other => {
            parent.append_child(document.create_text(&other.to_string()));
        }
    }
}
