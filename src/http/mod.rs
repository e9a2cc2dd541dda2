//! HTTP request client with default headers, interceptors and retry.

mod client;
mod error;
mod headers;
mod interceptor;
mod request;
mod response;
mod retry;
mod transport;

pub use client::RequestClient;
pub use error::{CancelStage, FetchError, TransportError};
pub use headers::{DefaultHeaders, merge_headers, serde_header_map};
pub use interceptor::{
    AfterResponseFn, BeforeRequestFn, Flow, Registration, Registry, ResponseEvent,
};
pub use request::{
    APPLICATION_JSON, FORM_URL_ENCODED, RequestDescriptor, json_to_form, json_to_query_string,
};
pub use response::{FetchResponse, RawResponse, ResponseData, SavedFile, TRANSPORT_FAILURE_STATUS};
pub use retry::{MAX_RETRIES, RETRY_DELAY_MS, RetryPolicy, is_retryable, send_with_retry};
pub use transport::{ProgressCallback, ReqwestTransport, Transport, UPLOAD_CHUNK_SIZE};
