// Copyright (C) 2022-2024 Webb Technologies Inc.
//
// Tangle is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Tangle is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should receive a copy of the GNU General Public License
// If not, see <http://www.gnu.org/licenses/>.

use std::time::Duration;

use ethers::providers::{HttpClientError, JsonRpcError, RetryPolicy};

/// Default wait before retrying a rate limited request.
const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

/// [RetryPolicy] of the EVM http provider.
///
/// Retries rate limited requests (status 429 or a rate limit JSON-RPC error)
/// and the `"header not found"` error load balanced nodes answer with while
/// they catch up.
#[derive(Debug)]
pub struct BridgeHttpRetryPolicy {
    rate_limit: regex::Regex,
}

impl BridgeHttpRetryPolicy {
    /// Creates the policy.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            rate_limit: regex::Regex::new(
                r"(?mixU)\b(?:rate|limit|429|Too \s Many \s Requests)\b",
            )?,
        })
    }

    /// Creates the policy, boxed for [`ethers::providers::RetryClient`].
    pub fn boxed() -> Result<Box<Self>, regex::Error> {
        Self::new().map(Box::new)
    }

    fn should_retry_rpc_error(err: &JsonRpcError) -> bool {
        match err.code {
            429 | -32005 => true,
            -32016 => err.message.contains("rate limit"),
            _ => matches!(
                err.message.as_str(),
                "header not found"
                    | "daily request count exceeded, request rate limited"
            ),
        }
    }

    fn should_retry_response_text(&self, text: &str) -> bool {
        // some nodes send an error object without an `id`, which fails to
        // decode as a response but still carries the rpc error.
        #[derive(serde::Deserialize)]
        struct Resp {
            error: JsonRpcError,
        }

        if let Ok(resp) = serde_json::from_str::<Resp>(text) {
            return Self::should_retry_rpc_error(&resp.error);
        }
        let text = text.to_lowercase();
        let should_retry = self.rate_limit.is_match(&text) || text.is_empty();
        tracing::event!(
            target: bridge_relayer_utils::probe::TARGET,
            tracing::Level::DEBUG,
            kind = %bridge_relayer_utils::probe::Kind::Retry,
            should_retry,
            error = %text,
        );
        should_retry
    }
}

impl RetryPolicy<HttpClientError> for BridgeHttpRetryPolicy {
    fn should_retry(&self, error: &HttpClientError) -> bool {
        tracing::debug!("should_retry: {:?}", error);
        match error {
            HttpClientError::ReqwestError(err) => {
                err.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS)
            }
            HttpClientError::JsonRpcError(err) => {
                Self::should_retry_rpc_error(err)
            }
            HttpClientError::SerdeJson { text, .. } => {
                self.should_retry_response_text(text)
            }
        }
    }

    fn backoff_hint(&self, error: &HttpClientError) -> Option<Duration> {
        let HttpClientError::JsonRpcError(err) = error else {
            return Some(DEFAULT_BACKOFF);
        };
        let hint = err
            .data
            .as_ref()
            .and_then(|data| data.get("rate"))
            .and_then(|rate| rate.get("backoff_seconds"))
            .and_then(|secs| {
                secs.as_u64()
                    .or_else(|| secs.as_f64().map(|f| f as u64 + 1))
            });
        Some(hint.map(Duration::from_secs).unwrap_or(DEFAULT_BACKOFF))
    }
}
