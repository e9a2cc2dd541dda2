//! Request client with default headers, interceptors and retry.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use log::{debug, error, warn};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Client, Method};

use super::error::{CancelStage, FetchError, TransportError};
use super::headers::{DefaultHeaders, merge_headers};
use super::interceptor::{
    AfterResponseFn, BeforeRequestFn, Flow, Registration, Registry, ResponseEvent,
    apply_after_response, apply_before_request,
};
use super::request::RequestDescriptor;
use super::response::{FetchResponse, RawResponse, ResponseData, SavedFile};
use super::retry::{RetryPolicy, send_with_retry};
use super::transport::{ProgressCallback, ReqwestTransport, Transport};
use crate::config::ClientConfig;
use crate::download::{DEFAULT_MIME_TYPE, SaveFile, format_filename};

/// What came back from the transport for one call.
enum Issued {
    Received(RequestDescriptor, RawResponse),
    TransportFailure(FetchResponse),
}

/// HTTP client returning `[data, status]` pairs instead of failing on error
/// statuses.
///
/// Build one per process and share it (usually behind an `Arc`); header and
/// interceptor changes are visible to every call made afterwards.
pub struct RequestClient<T: Transport = ReqwestTransport> {
    transport: T,
    default_headers: DefaultHeaders,
    before_request: Registry<BeforeRequestFn>,
    after_response: Registry<AfterResponseFn>,
    retry_policy: RetryPolicy,
}

impl RequestClient<ReqwestTransport> {
    /// Creates a reqwest-backed client from configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self::with_config(ReqwestTransport::new(client), config))
    }
}

impl<T: Transport> RequestClient<T> {
    /// Creates a client with the stock default headers and `retry_policy`.
    pub fn new(transport: T, retry_policy: RetryPolicy) -> Self {
        let config = ClientConfig {
            retry: retry_policy,
            ..ClientConfig::default()
        };
        Self::with_config(transport, &config)
    }

    pub fn with_config(transport: T, config: &ClientConfig) -> Self {
        Self {
            transport,
            default_headers: DefaultHeaders::new(config.default_headers.clone()),
            before_request: Registry::new(),
            after_response: Registry::new(),
            retry_policy: config.retry,
        }
    }

    /// Adds or replaces a header sent with every request.
    pub fn add_default_header(&self, name: HeaderName, value: HeaderValue) {
        self.default_headers.insert(name, value);
    }

    pub fn remove_default_header(&self, name: &str) {
        self.default_headers.remove(name);
    }

    /// Live view of the default headers.
    pub fn headers(&self) -> DefaultHeaders {
        self.default_headers.clone()
    }

    /// Registers an interceptor run before each [`fetch`](Self::fetch).
    ///
    /// It may edit the request; returning [`Flow::Cancel`] or an error stops
    /// the call before anything is sent.
    pub fn add_before_request_interceptor<F>(&self, interceptor: F) -> Registration
    where
        F: Fn(&mut RequestDescriptor) -> Result<Flow> + Send + Sync + 'static,
    {
        self.before_request.add(Arc::new(interceptor))
    }

    /// Registers an interceptor run once a call has an outcome.
    ///
    /// Returning [`Flow::Cancel`] or an error turns a received response into
    /// [`FetchError::Cancelled`]; after a transport failure the verdict is
    /// ignored.
    pub fn add_after_response_interceptor<F>(&self, interceptor: F) -> Registration
    where
        F: Fn(&ResponseEvent<'_>, &RequestDescriptor) -> Result<Flow> + Send + Sync + 'static,
    {
        self.after_response.add(Arc::new(interceptor))
    }

    /// Sends `request` and returns the body with its status code.
    ///
    /// Every HTTP status comes back as `Ok`: a JSON body as
    /// [`ResponseData::Json`], anything else as [`ResponseData::Raw`]. A
    /// transport failure comes back as [`ResponseData::Failed`] with status
    /// `-1`. Only interceptor cancellation is an `Err`.
    #[tracing::instrument(skip(self, request), fields(target = %request.target))]
    pub async fn fetch(&self, request: RequestDescriptor) -> Result<FetchResponse, FetchError> {
        match self.issue(request).await? {
            Issued::Received(request, response) => self.finish_response(&request, response),
            Issued::TransportFailure(failed) => Ok(failed),
        }
    }

    /// Like [`fetch`](Self::fetch), but a successful body is handed to `saver`
    /// under `prefix` followed by a `YYYYMMDDHHMMSS` timestamp.
    ///
    /// Non-2xx responses are handled exactly as `fetch` handles them. The
    /// saver runs on tokio's blocking pool.
    #[tracing::instrument(skip(self, request, saver), fields(target = %request.target))]
    pub async fn fetch_file<S>(
        &self,
        request: RequestDescriptor,
        prefix: &str,
        saver: Arc<S>,
    ) -> Result<FetchResponse, FetchError>
    where
        S: SaveFile + ?Sized + 'static,
    {
        let (request, response) = match self.issue(request).await? {
            Issued::Received(request, response) => (request, response),
            Issued::TransportFailure(failed) => return Ok(failed),
        };

        if !response.status.is_success() {
            return self.finish_response(&request, response);
        }

        let event = ResponseEvent::Unparsed {
            response: &response,
        };
        if apply_after_response(&self.after_response.snapshot(), &event, &request) == Flow::Cancel
        {
            return Err(FetchError::Cancelled(CancelStage::AfterResponse));
        }

        let status = response.status_code();
        let mime_type = response
            .content_type()
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();
        let filename = format_filename(prefix, Local::now().naive_local());

        let saved = {
            let blob = response.body.clone();
            let filename = filename.clone();
            let mime_type = mime_type.clone();
            tokio::task::spawn_blocking(move || saver.save(&blob, &filename, &mime_type))
                .await
                .context("File save task failed")
                .and_then(|result| result)
        };

        match saved {
            Ok(path) => {
                debug!("Saved {} bytes to {:?}", response.body.len(), path);
                let file = SavedFile {
                    path,
                    filename,
                    mime_type,
                    size: response.body.len() as u64,
                };
                Ok(FetchResponse::new(ResponseData::Saved(file), status))
            }
            Err(e) => {
                error!("Failed to save {} from {}: {:#}", filename, request.target, e);
                Err(FetchError::Save(e))
            }
        }
    }

    /// Uploads the request body, reporting progress to `progress`.
    ///
    /// The method defaults to `POST`. Interceptors and retry do not apply.
    /// The response body comes back as JSON when it parses, as text
    /// otherwise; only a transport failure is an `Err`.
    #[tracing::instrument(skip(self, request, progress), fields(target = %request.target))]
    pub async fn upload_file(
        &self,
        request: RequestDescriptor,
        progress: Option<ProgressCallback>,
    ) -> Result<FetchResponse, TransportError> {
        let mut request = self.merge_default_headers(request);
        if request.method.is_none() {
            request.method = Some(Method::POST);
        }

        let response = match self.transport.upload(&request, progress).await {
            Ok(response) => response,
            Err(e) => {
                error!("Upload to {} failed: {}", request.target, e);
                return Err(e);
            }
        };

        let status = response.status_code();
        let data = match response.json() {
            Ok(body) => ResponseData::Json(body),
            Err(_) => ResponseData::Text(response.text()),
        };
        Ok(FetchResponse::new(data, status))
    }

    fn merge_default_headers(&self, mut request: RequestDescriptor) -> RequestDescriptor {
        request.headers = merge_headers(&self.default_headers.snapshot(), &request.headers);
        request
    }

    /// Merges headers, runs before-request interceptors and sends the request.
    async fn issue(&self, request: RequestDescriptor) -> Result<Issued, FetchError> {
        let mut request = self.merge_default_headers(request);

        if apply_before_request(&self.before_request.snapshot(), &mut request) == Flow::Cancel {
            return Err(FetchError::Cancelled(CancelStage::BeforeRequest));
        }

        let result = if self.retry_policy.enabled && request.is_idempotent() {
            send_with_retry(&self.transport, &request, &self.retry_policy).await
        } else {
            self.transport.send(&request).await
        };

        match result {
            Ok(response) => Ok(Issued::Received(request, response)),
            Err(e) => {
                error!("Request to {} failed: {}", request.target, e);
                // The call has already failed; a cancel changes nothing.
                apply_after_response(
                    &self.after_response.snapshot(),
                    &ResponseEvent::Failed(&e),
                    &request,
                );
                Ok(Issued::TransportFailure(FetchResponse::transport_failure(e)))
            }
        }
    }

    /// Parses the body and runs after-response interceptors.
    fn finish_response(
        &self,
        request: &RequestDescriptor,
        response: RawResponse,
    ) -> Result<FetchResponse, FetchError> {
        let status = response.status_code();
        let interceptors = self.after_response.snapshot();

        match response.json() {
            Ok(body) => {
                let event = ResponseEvent::Parsed {
                    response: &response,
                    body: &body,
                };
                if apply_after_response(&interceptors, &event, request) == Flow::Cancel {
                    return Err(FetchError::Cancelled(CancelStage::AfterResponse));
                }
                Ok(FetchResponse::new(ResponseData::Json(body), status))
            }
            Err(e) => {
                let event = ResponseEvent::Unparsed {
                    response: &response,
                };
                if apply_after_response(&interceptors, &event, request) == Flow::Cancel {
                    return Err(FetchError::Cancelled(CancelStage::AfterResponse));
                }
                warn!(
                    "Can not parse JSON from response of {} with status {}: {}",
                    request.target, status, e
                );
                Ok(FetchResponse::new(ResponseData::Raw(response), status))
            }
        }
    }
}
