//! The single-shot request primitive the client is built on.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, Method, RequestBuilder, Url};

use super::error::TransportError;
use super::request::RequestDescriptor;
use super::response::RawResponse;

/// Size of the slices an upload body is streamed in.
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Upload progress: cumulative bytes sent and the total, when known.
pub type ProgressCallback = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request and buffers the whole response.
    async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError>;

    /// Sends the request body as an upload, reporting progress as it goes.
    async fn upload(
        &self,
        request: &RequestDescriptor,
        progress: Option<ProgressCallback>,
    ) -> Result<RawResponse, TransportError>;
}

/// [`Transport`] backed by a reqwest [`Client`].
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn builder(
        &self,
        request: &RequestDescriptor,
        default_method: Method,
    ) -> Result<RequestBuilder, TransportError> {
        let url = Url::parse(&request.target).map_err(|e| TransportError::InvalidTarget {
            target: request.target.clone(),
            reason: e.to_string(),
        })?;

        Ok(self
            .client
            .request(request.method_or(default_method), url)
            .headers(request.headers.clone()))
    }

    async fn execute(builder: RequestBuilder) -> Result<RawResponse, TransportError> {
        let response = builder.send().await.map_err(TransportError::Network)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(TransportError::Body)?;

        debug!("Received {} ({} bytes)", status, body.len());
        Ok(RawResponse::new(status, headers, body))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(skip(self, request), fields(target = %request.target))]
    async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError> {
        let mut builder = self.builder(request, Method::GET)?;
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        Self::execute(builder).await
    }

    #[tracing::instrument(skip(self, request, progress), fields(target = %request.target))]
    async fn upload(
        &self,
        request: &RequestDescriptor,
        progress: Option<ProgressCallback>,
    ) -> Result<RawResponse, TransportError> {
        let body = request.body.clone().unwrap_or_default();
        let builder = self.builder(request, Method::POST)?;

        let builder = match progress {
            Some(progress) => {
                let total = body.len() as u64;
                builder
                    .header(CONTENT_LENGTH, total)
                    .body(reqwest::Body::wrap_stream(progress_stream(body, progress)))
            }
            None => builder.body(body),
        };

        Self::execute(builder).await
    }
}

/// Splits `body` into chunks and reports cumulative progress as each chunk
/// is pulled by the connection.
fn progress_stream(
    body: Bytes,
    progress: ProgressCallback,
) -> impl futures_util::stream::Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    let total = body.len() as u64;
    let chunks: Vec<Bytes> = (0..body.len())
        .step_by(UPLOAD_CHUNK_SIZE)
        .map(|start| body.slice(start..(start + UPLOAD_CHUNK_SIZE).min(body.len())))
        .collect();

    let mut sent: u64 = 0;
    futures_util::stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        progress(sent, Some(total));
        Ok(chunk)
    }))
}
