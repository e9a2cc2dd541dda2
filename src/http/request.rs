//! Per-call request descriptor and body encoding helpers.

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::{Map, Value};
use url::form_urlencoded;

/// Content type for `application/x-www-form-urlencoded` bodies.
pub const FORM_URL_ENCODED: &str = "application/x-www-form-urlencoded";

/// Content type used for JSON bodies.
pub const APPLICATION_JSON: &str = "application/json";

/// Target and options for a single call.
///
/// A missing `method` means `GET` for [`fetch`](super::RequestClient::fetch)
/// and `POST` for [`upload_file`](super::RequestClient::upload_file).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestDescriptor {
    pub target: String,
    pub method: Option<Method>,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl RequestDescriptor {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Default::default()
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(target).method(Method::GET)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(target).method(Method::POST)
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Sets `name`, replacing any value already present under any casing.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `value` as the JSON body and sets the matching content type.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> serde_json::Result<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(self
            .header(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON))
            .body(body))
    }

    /// Encodes `fields` as a urlencoded form body and sets the matching content type.
    pub fn form(self, fields: &Map<String, Value>) -> Self {
        self.header(CONTENT_TYPE, HeaderValue::from_static(FORM_URL_ENCODED))
            .body(json_to_form(fields))
    }

    /// Only a missing method or `GET` counts as safe to repeat.
    pub fn is_idempotent(&self) -> bool {
        self.method.as_ref().is_none_or(|method| *method == Method::GET)
    }

    pub fn method_or(&self, default: Method) -> Method {
        self.method.clone().unwrap_or(default)
    }
}

/// Encodes every field as `key=value`, both sides percent-encoded.
pub fn json_to_form(fields: &Map<String, Value>) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{}={}", encode(key), encode(&value_to_string(value))))
        .collect::<Vec<_>>()
        .join("&")
}

/// Builds a query string, leaving out fields that are null, `false` or an
/// empty string. Zero is kept.
pub fn json_to_query_string(fields: &Map<String, Value>) -> String {
    fields
        .iter()
        .filter(|(_, value)| is_present(value))
        .map(|(key, value)| format!("{}={}", encode(key), encode(&value_to_string(value))))
        .collect::<Vec<_>>()
        .join("&")
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn encode(input: &str) -> String {
    form_urlencoded::byte_serialize(input.as_bytes()).collect()
}
