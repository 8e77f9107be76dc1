use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bridge_relayer_utils::Error;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// A JSON-RPC 2.0 client of a Chain33 style node.
#[derive(Debug, Clone)]
pub struct JsonRpcClient {
    http: reqwest::Client,
    endpoint: Url,
    next_id: Arc<AtomicU64>,
}

impl JsonRpcClient {
    /// Creates a client of the node at `endpoint`.
    pub fn new(endpoint: Url) -> bridge_relayer_utils::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            endpoint,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// The node endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Calls `method` with one parameter object, or none when `params` is `Null`.
    #[tracing::instrument(skip(self, params), level = "trace")]
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> bridge_relayer_utils::Result<T> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            method,
            params: match params {
                Value::Null => Vec::new(),
                params => vec![params],
            },
        };
        let response: JsonRpcResponse = self
            .http
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if let Some(error) = response.error.filter(|e| !e.is_null()) {
            let message = match error {
                Value::String(message) => message,
                Value::Object(ref o) => o
                    .get("message")
                    .and_then(Value::as_str)
                    .map(ToOwned::to_owned)
                    .unwrap_or_else(|| error.to_string()),
                other => other.to_string(),
            };
            return Err(Error::JsonRpc {
                method: method.to_owned(),
                message,
            });
        }
        let result = response.result.unwrap_or(Value::Null);
        let value =
            serde_path_to_error::deserialize(result).map_err(|e| {
                Error::JsonRpc {
                    method: method.to_owned(),
                    message: format!("unexpected answer: {e}"),
                }
            })?;
        Ok(value)
    }
}
