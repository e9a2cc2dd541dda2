//! Error types surfaced by the request client.

/// No HTTP response was obtained.
#[derive(Debug)]
pub enum TransportError {
    /// The request target is not a valid absolute URL.
    InvalidTarget { target: String, reason: String },
    /// Connecting, sending, or receiving the response head failed.
    Network(reqwest::Error),
    /// The response head arrived but the body could not be read.
    Body(reqwest::Error),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::InvalidTarget { target, reason } => {
                write!(f, "Invalid request target {:?}: {}", target, reason)
            }
            TransportError::Network(e) => write!(f, "Network error: {}", e),
            TransportError::Body(e) => write!(f, "Failed to read response body: {}", e),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Network(e) | TransportError::Body(e) => Some(e),
            _ => None,
        }
    }
}

/// Where in the pipeline an interceptor stopped a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelStage {
    BeforeRequest,
    AfterResponse,
}

impl std::fmt::Display for CancelStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelStage::BeforeRequest => write!(f, "before the request was sent"),
            CancelStage::AfterResponse => write!(f, "after the response was received"),
        }
    }
}

/// Failures of [`RequestClient::fetch`](super::RequestClient::fetch) and
/// [`RequestClient::fetch_file`](super::RequestClient::fetch_file).
///
/// Transport failures and HTTP error statuses are not represented here; they
/// come back as a [`FetchResponse`](super::FetchResponse).
#[derive(Debug)]
pub enum FetchError {
    /// An interceptor vetoed the call or failed while running.
    Cancelled(CancelStage),
    /// The download collaborator could not store a fetched file.
    Save(anyhow::Error),
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled(_))
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Cancelled(stage) => {
                write!(f, "Request was canceled by an interceptor {}", stage)
            }
            FetchError::Save(e) => write!(f, "Failed to save downloaded file: {:#}", e),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Cancelled(_) => None,
            FetchError::Save(e) => Some(&**e),
        }
    }
}
