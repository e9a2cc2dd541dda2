//! Header merging and the shared default-header store.
//!
//! Headers are kept in reqwest's [`HeaderMap`], whose names are
//! case-insensitive, so `Content-Type` and `content-type` are one entry.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Layers `overrides` on top of `defaults`.
///
/// Every name present in `overrides` takes all of its values from there;
/// names only in `defaults` keep theirs.
pub fn merge_headers(defaults: &HeaderMap, overrides: &HeaderMap) -> HeaderMap {
    let mut merged = defaults.clone();
    for name in overrides.keys() {
        merged.remove(name);
    }
    for (name, value) in overrides {
        merged.append(name, value.clone());
    }
    merged
}

/// Default headers applied to every outgoing request.
///
/// Cloning yields another handle onto the same map, so a handle obtained
/// from [`RequestClient::headers`](super::RequestClient::headers) observes
/// later additions and removals.
#[derive(Debug, Clone, Default)]
pub struct DefaultHeaders {
    inner: Arc<RwLock<HeaderMap>>,
}

impl DefaultHeaders {
    pub fn new(initial: HeaderMap) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    /// Sets `name`, replacing any previous value.
    pub fn insert(&self, name: HeaderName, value: HeaderValue) {
        self.write().insert(name, value);
    }

    /// Removes the header if present and returns its previous value.
    pub fn remove(&self, name: &str) -> Option<HeaderValue> {
        self.write().remove(name)
    }

    pub fn get(&self, name: &str) -> Option<HeaderValue> {
        self.read().get(name).cloned()
    }

    /// Copies the current contents.
    pub fn snapshot(&self) -> HeaderMap {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HeaderMap> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HeaderMap> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Serde adapter storing a [`HeaderMap`] as a JSON object of name to value.
pub mod serde_header_map {
    use std::collections::BTreeMap;

    use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer, de, ser};

    pub fn serialize<S: Serializer>(headers: &HeaderMap, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(headers.len()))?;
        for (name, value) in headers {
            let value = value
                .to_str()
                .map_err(|e| <S::Error as ser::Error>::custom(format!("header {}: {}", name, e)))?;
            map.serialize_entry(name.as_str(), value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<HeaderMap, D::Error> {
        let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
        let mut headers = HeaderMap::with_capacity(raw.len());
        for (name, value) in raw {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                <D::Error as de::Error>::custom(format!("invalid header name {:?}: {}", name, e))
            })?;
            let header_value = HeaderValue::from_str(&value).map_err(|e| {
                <D::Error as de::Error>::custom(format!("invalid value for header {:?}: {}", name, e))
            })?;
            headers.insert(header_name, header_value);
        }
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        pairs
            .iter()
            .map(|(k, v)| {
                (
                    HeaderName::from_bytes(k.as_bytes()).unwrap(),
                    HeaderValue::from_str(v).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_merge_headers_per_call_wins() {
        let defaults = headers(&[("Content-Type", "application/json"), ("X-App", "demo")]);
        let overrides = headers(&[("Content-Type", "text/plain"), ("X-Trace", "abc")]);

        let merged = merge_headers(&defaults, &overrides);

        assert_eq!(
            merged,
            headers(&[
                ("Content-Type", "text/plain"),
                ("X-App", "demo"),
                ("X-Trace", "abc"),
            ])
        );
    }

    #[test]
    fn test_merge_headers_ignores_case_on_collision() {
        let defaults = headers(&[("Content-Type", "application/json")]);
        let overrides = headers(&[("content-type", "text/csv")]);

        let merged = merge_headers(&defaults, &overrides);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged["CONTENT-TYPE"], "text/csv");
    }

    #[test]
    fn test_merge_headers_replaces_every_default_value() {
        let mut defaults = headers(&[("Accept", "text/html")]);
        defaults.append("accept", HeaderValue::from_static("text/plain"));
        let overrides = headers(&[("Accept", "application/json")]);

        let merged = merge_headers(&defaults, &overrides);

        let accept: Vec<_> = merged.get_all("accept").iter().collect();
        assert_eq!(accept, vec!["application/json"]);
    }

    #[test]
    fn test_merge_headers_empty_overrides_keeps_defaults() {
        let defaults = headers(&[("Accept", "*/*"), ("X-App", "demo")]);
        assert_eq!(merge_headers(&defaults, &HeaderMap::new()), defaults);
    }

    #[test]
    fn test_default_headers_live_view() {
        let store = DefaultHeaders::new(headers(&[("Accept", "*/*")]));
        let view = store.clone();

        store.insert(
            reqwest::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer token"),
        );
        assert_eq!(view.get("Authorization").unwrap(), "Bearer token");

        store.remove("accept");
        assert_eq!(view.get("Accept"), None);
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn test_default_headers_remove_absent_is_noop() {
        let store = DefaultHeaders::default();
        assert_eq!(store.remove("X-Missing"), None);
        assert_eq!(store.remove("not a header name"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_default_headers_insert_replaces_case_variant() {
        let store = DefaultHeaders::default();
        store.insert(
            HeaderName::from_bytes(b"x-token").unwrap(),
            HeaderValue::from_static("one"),
        );
        store.insert(
            HeaderName::from_bytes(b"X-Token").unwrap(),
            HeaderValue::from_static("two"),
        );

        assert_eq!(store.snapshot(), headers(&[("x-token", "two")]));
    }

    #[test]
    fn test_serde_header_map_rejects_invalid_name() {
        #[derive(Debug, serde::Deserialize)]
        struct Wrapper {
            #[serde(with = "serde_header_map")]
            headers: HeaderMap,
        }

        let parsed: Wrapper =
            serde_json::from_str(r#"{"headers": {"X-App": "demo", "Accept": "*/*"}}"#).unwrap();
        assert_eq!(parsed.headers["x-app"], "demo");
        assert_eq!(parsed.headers.len(), 2);

        let result = serde_json::from_str::<Wrapper>(r#"{"headers": {"bad name": "x"}}"#);
        assert!(result.unwrap_err().to_string().contains("invalid header name"));
    }
}
