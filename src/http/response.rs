//! Buffered responses and the normalized `[data, status]` result.

use std::path::PathBuf;

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use serde::ser::{Serialize, SerializeTuple, Serializer};
use serde_json::Value;

use super::error::TransportError;

/// Status reported when no response was obtained.
pub const TRANSPORT_FAILURE_STATUS: i32 = -1;

/// A fully received response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn status_code(&self) -> i32 {
        i32::from(self.status.as_u16())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE)?.to_str().ok()
    }

    pub fn json(&self) -> serde_json::Result<Value> {
        serde_json::from_slice(&self.body)
    }

    /// Body decoded as UTF-8, invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A file handed to the download collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    pub path: PathBuf,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
}

/// The data half of a call result.
#[derive(Debug)]
pub enum ResponseData {
    /// Body parsed as JSON.
    Json(Value),
    /// Body that could not be parsed; the whole response is returned instead.
    Raw(RawResponse),
    /// Unparseable upload response body.
    Text(String),
    /// Body stored through the download collaborator.
    Saved(SavedFile),
    /// The transport failed; paired with [`TRANSPORT_FAILURE_STATUS`].
    Failed(TransportError),
}

/// Outcome of a call that reached the transport: data plus status code.
///
/// HTTP error statuses are ordinary values here; callers branch on `status`.
#[derive(Debug)]
pub struct FetchResponse {
    pub data: ResponseData,
    pub status: i32,
}

impl FetchResponse {
    pub fn new(data: ResponseData, status: i32) -> Self {
        Self { data, status }
    }

    pub fn transport_failure(error: TransportError) -> Self {
        Self::new(ResponseData::Failed(error), TRANSPORT_FAILURE_STATUS)
    }

    pub fn into_parts(self) -> (ResponseData, i32) {
        (self.data, self.status)
    }

    pub fn is_transport_failure(&self) -> bool {
        self.status == TRANSPORT_FAILURE_STATUS
    }

    pub fn json(&self) -> Option<&Value> {
        match &self.data {
            ResponseData::Json(value) => Some(value),
            _ => None,
        }
    }
}

impl Serialize for ResponseData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ResponseData::Json(value) => value.serialize(serializer),
            ResponseData::Raw(response) => serializer.serialize_str(&response.text()),
            ResponseData::Text(text) => serializer.serialize_str(text),
            ResponseData::Saved(file) => serializer.serialize_str(&file.path.to_string_lossy()),
            ResponseData::Failed(error) => serializer.serialize_str(&error.to_string()),
        }
    }
}

/// Serialized as the two-element array `[data, status]`.
impl Serialize for FetchResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.data)?;
        tuple.serialize_element(&self.status)?;
        tuple.end()
    }
}
