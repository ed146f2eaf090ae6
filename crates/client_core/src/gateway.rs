use std::time::Duration;

use async_trait::async_trait;
use futures::{future, stream::BoxStream, Stream, StreamExt, TryStreamExt};
use reqwest::{Client, StatusCode};
use shared::{
    domain::Product,
    error::GatewayError,
    protocol::{ChatMessageRequest, OperationStatus},
};
use tracing::debug;

use crate::config::Settings;

/// Fragments of an assistant reply, in arrival order. Dropping the stream
/// aborts the underlying request.
pub type ChatFragmentStream = BoxStream<'static, Result<String, GatewayError>>;

/// Backend access for the product catalog. One call per user action; callers
/// decide what to do with failures.
#[async_trait]
pub trait CatalogGateway: Send + Sync {
    async fn list_products(&self) -> Result<Vec<Product>, GatewayError>;
    async fn create_product(&self, product: &Product) -> Result<Product, GatewayError>;
    async fn update_product(&self, id: &str, product: &Product) -> Result<Product, GatewayError>;
    async fn delete_product(&self, id: &str) -> Result<(), GatewayError>;
}

/// Backend access for the product chat thread.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Dispatches one message and returns the incremental reply as a stream of
    /// text fragments, decoded as they arrive.
    async fn send_message(
        &self,
        request: &ChatMessageRequest,
    ) -> Result<ChatFragmentStream, GatewayError>;

    async fn clear_history(&self, product_id: &str) -> Result<(), GatewayError>;
}

/// Builds the shared HTTP client with the fixed per-request timeout. There is
/// no retry layer: a timed-out or failed request surfaces once and the next
/// attempt is a fresh user action.
pub fn build_http_client(settings: &Settings) -> Result<Client, GatewayError> {
    Client::builder()
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .build()
        .map_err(|err| GatewayError::Transport(err.to_string()))
}

pub struct HttpCatalogGateway {
    http: Client,
    base_url: String,
}

impl HttpCatalogGateway {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CatalogGateway for HttpCatalogGateway {
    async fn list_products(&self) -> Result<Vec<Product>, GatewayError> {
        self.http
            .get(format!("{}/products", self.base_url))
            .send()
            .await
            .map_err(map_http_error)?
            .error_for_status()
            .map_err(map_http_error)?
            .json()
            .await
            .map_err(map_http_error)
    }

    async fn create_product(&self, product: &Product) -> Result<Product, GatewayError> {
        self.http
            .post(format!("{}/products", self.base_url))
            .json(product)
            .send()
            .await
            .map_err(map_http_error)?
            .error_for_status()
            .map_err(map_http_error)?
            .json()
            .await
            .map_err(map_http_error)
    }

    async fn update_product(&self, id: &str, product: &Product) -> Result<Product, GatewayError> {
        self.http
            .put(format!("{}/products/{id}", self.base_url))
            .json(product)
            .send()
            .await
            .map_err(map_http_error)?
            .error_for_status()
            .map_err(map_http_error)?
            .json()
            .await
            .map_err(map_http_error)
    }

    async fn delete_product(&self, id: &str) -> Result<(), GatewayError> {
        let response = self
            .http
            .delete(format!("{}/products/{id}", self.base_url))
            .send()
            .await
            .map_err(map_http_error)?
            .error_for_status()
            .map_err(map_http_error)?;

        read_operation_status(response, "delete product").await
    }
}

pub struct HttpChatGateway {
    http: Client,
    base_url: String,
}

impl HttpChatGateway {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ChatGateway for HttpChatGateway {
    async fn send_message(
        &self,
        request: &ChatMessageRequest,
    ) -> Result<ChatFragmentStream, GatewayError> {
        let response = self
            .http
            .post(format!("{}/chat/message", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(map_http_error)?
            .error_for_status()
            .map_err(map_http_error)?;

        debug!(product_id = %request.product_id, "chat: reply stream opened");
        Ok(decode_text_fragments(
            response.bytes_stream().map_err(map_http_error),
        ))
    }

    async fn clear_history(&self, product_id: &str) -> Result<(), GatewayError> {
        let response = self
            .http
            .delete(format!("{}/chat/clear/{product_id}", self.base_url))
            .send()
            .await
            .map_err(map_http_error)?
            .error_for_status()
            .map_err(map_http_error)?;

        read_operation_status(response, "clear chat history").await
    }
}

/// Delete-style endpoints answer 204 with no body, or 2xx with
/// `{"success": bool}`. A body that fails to parse is an error, not a
/// silently accepted success.
async fn read_operation_status(
    response: reqwest::Response,
    operation: &str,
) -> Result<(), GatewayError> {
    if response.status() == StatusCode::NO_CONTENT {
        return Ok(());
    }

    let body = response.bytes().await.map_err(map_http_error)?;
    if body.is_empty() {
        return Ok(());
    }

    let status: OperationStatus = serde_json::from_slice(&body)
        .map_err(|err| GatewayError::Decode(format!("{operation}: {err}")))?;
    if status.success {
        Ok(())
    } else {
        Err(GatewayError::Transport(format!(
            "{operation} reported success=false"
        )))
    }
}

pub(crate) fn map_http_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else if err.is_decode() {
        GatewayError::Decode(err.to_string())
    } else if let Some(status) = err.status() {
        GatewayError::Status {
            status: status.as_u16(),
        }
    } else {
        GatewayError::Transport(err.to_string())
    }
}

#[derive(Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
    failed: bool,
}

/// Turns a byte stream into decoded text fragments. A multi-byte character
/// split across network chunks is held back until its remaining bytes arrive,
/// so every yielded fragment is valid UTF-8 and concatenation preserves the
/// delivered byte order exactly. A byte sequence that can never decode, or a
/// body that ends mid-character, fails the stream with a decode error rather
/// than silently truncating the reply.
fn decode_text_fragments<S, B>(bytes: S) -> ChatFragmentStream
where
    S: Stream<Item = Result<B, GatewayError>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    // The trailing marker lets the decoder observe end-of-body and flag bytes
    // that are still waiting on the rest of their character.
    let chunks = bytes.map(Some).chain(futures::stream::iter([None]));
    let fragments = chunks
        .scan(Utf8Decoder::default(), |decoder, chunk| {
            if decoder.failed {
                return future::ready(None);
            }
            let item = match chunk {
                Some(Err(err)) => {
                    decoder.failed = true;
                    Some(Err(err))
                }
                Some(Ok(chunk)) => {
                    decoder.pending.extend_from_slice(chunk.as_ref());
                    match take_valid_utf8_prefix(&mut decoder.pending) {
                        Ok(text) if text.is_empty() => None,
                        Ok(text) => Some(Ok(text)),
                        Err(err) => {
                            decoder.failed = true;
                            Some(Err(err))
                        }
                    }
                }
                None => {
                    if decoder.pending.is_empty() {
                        None
                    } else {
                        decoder.failed = true;
                        Some(Err(GatewayError::Decode(
                            "reply body ended mid-character".to_string(),
                        )))
                    }
                }
            };
            future::ready(Some(item))
        })
        .filter_map(future::ready);

    Box::pin(fragments)
}

/// Splits off the longest decodable prefix, leaving an incomplete trailing
/// sequence in `pending` for the next chunk. A byte that no continuation can
/// repair is a hard decode failure.
fn take_valid_utf8_prefix(pending: &mut Vec<u8>) -> Result<String, GatewayError> {
    let valid_up_to = match std::str::from_utf8(pending) {
        Ok(_) => pending.len(),
        Err(err) => {
            if err.error_len().is_some() {
                return Err(GatewayError::Decode(format!(
                    "invalid utf-8 byte at offset {}",
                    err.valid_up_to()
                )));
            }
            err.valid_up_to()
        }
    };
    let rest = pending.split_off(valid_up_to);
    let prefix = std::mem::replace(pending, rest);
    // prefix ends on the boundary reported by from_utf8.
    Ok(String::from_utf8(prefix).unwrap_or_default())
}


#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
