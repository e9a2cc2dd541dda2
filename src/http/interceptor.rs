//! Ordered interceptor registries.
//!
//! Interceptors run in registration order. Registering one hands back a
//! [`Registration`] that removes exactly that entry, identified by a token
//! rather than by comparing interceptors, so the same closure registered
//! twice yields two independent registrations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use anyhow::Result;
use log::error;
use serde_json::Value;

use super::error::TransportError;
use super::request::RequestDescriptor;
use super::response::{RawResponse, TRANSPORT_FAILURE_STATUS};

/// Verdict returned by an interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Cancel,
}

/// What an after-response interceptor gets to look at.
#[derive(Debug, Clone, Copy)]
pub enum ResponseEvent<'a> {
    /// No response was obtained.
    Failed(&'a TransportError),
    /// A response whose body parsed as JSON.
    Parsed {
        response: &'a RawResponse,
        body: &'a Value,
    },
    /// A response whose body is not JSON (or is kept binary).
    Unparsed { response: &'a RawResponse },
}

impl<'a> ResponseEvent<'a> {
    pub fn response(&self) -> Option<&'a RawResponse> {
        match *self {
            ResponseEvent::Failed(_) => None,
            ResponseEvent::Parsed { response, .. } | ResponseEvent::Unparsed { response } => {
                Some(response)
            }
        }
    }

    pub fn body(&self) -> Option<&'a Value> {
        match *self {
            ResponseEvent::Parsed { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn status(&self) -> i32 {
        self.response()
            .map_or(TRANSPORT_FAILURE_STATUS, RawResponse::status_code)
    }
}

/// Runs before a request is sent and may edit it.
pub type BeforeRequestFn = dyn Fn(&mut RequestDescriptor) -> Result<Flow> + Send + Sync;

/// Runs once a call has an outcome.
pub type AfterResponseFn =
    dyn Fn(&ResponseEvent<'_>, &RequestDescriptor) -> Result<Flow> + Send + Sync;

trait Unregister: Send + Sync {
    fn unregister(&self, id: u64) -> bool;
}

struct Entry<T: ?Sized> {
    id: u64,
    interceptor: Arc<T>,
}

struct Entries<T: ?Sized> {
    next_id: AtomicU64,
    entries: RwLock<Vec<Entry<T>>>,
}

impl<T: ?Sized + Send + Sync> Unregister for Entries<T> {
    fn unregister(&self, id: u64) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.iter().position(|entry| entry.id == id) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Ordered list of interceptors of one kind.
pub struct Registry<T: ?Sized> {
    inner: Arc<Entries<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Registry<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Entries {
                next_id: AtomicU64::new(0),
                entries: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Appends `interceptor` and returns the handle that removes it again.
    pub fn add(&self, interceptor: Arc<T>) -> Registration {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Entry { id, interceptor });

        let registry: Weak<dyn Unregister> = Arc::downgrade(&self.inner) as Weak<dyn Unregister>;
        Registration { id, registry }
    }

    /// Current interceptors in registration order.
    ///
    /// The lock is released before returning, so interceptors run from the
    /// snapshot may register or dispose others.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|entry| Arc::clone(&entry.interceptor))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: ?Sized + Send + Sync + 'static> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for one interceptor registration.
pub struct Registration {
    id: u64,
    registry: Weak<dyn Unregister>,
}

impl Registration {
    /// Removes the interceptor this handle was issued for.
    ///
    /// Returns `false` when it was already removed or the client is gone.
    pub fn dispose(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.unregister(self.id))
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration").field("id", &self.id).finish()
    }
}

/// Runs before-request interceptors in order, stopping at the first cancel.
///
/// An interceptor that returns an error is logged and counts as a cancel.
pub fn apply_before_request(
    interceptors: &[Arc<BeforeRequestFn>],
    request: &mut RequestDescriptor,
) -> Flow {
    for (index, interceptor) in interceptors.iter().enumerate() {
        match interceptor(&mut *request) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Cancel) => {
                error!(
                    "Before-request interceptor #{} canceled the request to {}",
                    index, request.target
                );
                return Flow::Cancel;
            }
            Err(e) => {
                error!(
                    "Before-request interceptor #{} failed for {}: {:#}",
                    index, request.target, e
                );
                return Flow::Cancel;
            }
        }
    }
    Flow::Continue
}

/// Runs after-response interceptors in order, stopping at the first cancel.
pub fn apply_after_response(
    interceptors: &[Arc<AfterResponseFn>],
    event: &ResponseEvent<'_>,
    request: &RequestDescriptor,
) -> Flow {
    for (index, interceptor) in interceptors.iter().enumerate() {
        match interceptor(event, request) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Cancel) => {
                error!(
                    "After-response interceptor #{} canceled handling of {} (status {})",
                    index,
                    request.target,
                    event.status()
                );
                return Flow::Cancel;
            }
            Err(e) => {
                error!(
                    "After-response interceptor #{} failed for {}: {:#}",
                    index, request.target, e
                );
                return Flow::Cancel;
            }
        }
    }
    Flow::Continue
}
