// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Relayer Utils Module 🕸️
//!
//! Shared error taxonomy, retry policies, probes and metrics used by every
//! crate of the bridge relayer.

#![warn(missing_docs)]

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Metrics functionality
pub mod metric;
/// A module used for debugging relayer lifecycle, sync state, or other relayer state.
pub mod probe;
/// Retry functionality
pub mod retry;

/// An enum of all possible errors that could be encountered during the execution of the
/// Bridge Relayer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An Io error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON Error occurred.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Config loading error.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    /// Error while iterating over a glob pattern.
    #[error(transparent)]
    GlobPattern(#[from] glob::PatternError),
    /// Error from Glob Iterator.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
    /// Error while parsing a URL.
    #[error(transparent)]
    Url(#[from] url::ParseError),
    /// Error in the underlying Http server.
    #[error(transparent)]
    Axum(#[from] axum::Error),
    /// HTTP Error
    #[error(transparent)]
    Hyper(#[from] hyper::Error),
    /// Elliptic Curve error.
    #[error(transparent)]
    EllipticCurve(#[from] ethers::core::k256::elliptic_curve::Error),
    /// Error in Http Provider (ethers client).
    #[error(transparent)]
    EthersProvider(#[from] ethers::providers::ProviderError),
    /// ABI decoding error.
    #[error(transparent)]
    EthersAbi(#[from] ethers::abi::Error),
    /// Ether wallet errors.
    #[error(transparent)]
    EtherWalletError(#[from] ethers::signers::WalletError),
    /// Sled database error.
    #[error(transparent)]
    Sled(#[from] sled::Error),
    /// Sled transaction error.
    #[error(transparent)]
    SledTransaction(
        #[from] sled::transaction::TransactionError<std::io::Error>,
    ),
    /// Reqwest error
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    PrometheusError(#[from] prometheus::Error),
    /// Generic error.
    #[error("{}", _0)]
    Generic(&'static str),
    /// Error while parsing the config files.
    #[error("Config parse error: {}", _0)]
    ParseConfig(#[from] serde_path_to_error::Error<config::ConfigError>),
    /// The configuration was parsed but is not usable.
    #[error("Invalid configuration: {}", _0)]
    InvalidConfig(String),
    /// a backgorund task failed and force restarted.
    #[error("Task Force Restarted from an error")]
    ForceRestart,
    /// a backgorund task failed and stopped Abnormally.
    #[error("Task Stopped Apnormally")]
    TaskStoppedAbnormally,
    /// A raw chain event could not be decoded against the expected schema.
    #[error("Failed to decode event: {}", _0)]
    Decode(String),
    /// The native asset symbol was used with a token address, or the other way around.
    #[error("Native asset mismatch: symbol {symbol} with token {token}")]
    NativeAddressMismatch {
        /// The symbol carried by the event.
        symbol: String,
        /// The token address carried by the event.
        token: String,
    },
    /// An amount did not fit while rescaling between decimals.
    #[error("Amount overflow while scaling {amount} between {from} and {to} decimals")]
    AmountOverflow {
        /// The amount being scaled.
        amount: String,
        /// Decimals of the input amount.
        from: u8,
        /// Requested decimals.
        to: u8,
    },
    /// The watcher could not read the chain height too many times in a row.
    #[error("Failed to fetch the height of chain {chain_id} {attempts} times in a row")]
    HeightFetchExhausted {
        /// The chain being watched.
        chain_id: String,
        /// Consecutive failed attempts.
        attempts: u32,
    },
    /// The relayer state diverged from what it must be.
    #[error("Invariant violation: {}", _0)]
    InvariantViolation(String),
    /// A submitted transaction was not mined within the configured window.
    #[error("Transaction {tx_hash} was not mined in time")]
    TxNotMined {
        /// The transaction hash.
        tx_hash: String,
    },
    /// The bridge contracts did not become available in time.
    #[error("Timed out waiting for the bridge contracts to be deployed")]
    DeploymentTimeout,
    /// The deployed bridge contracts do not match the configuration.
    #[error("Bridge deployment mismatch: {}", _0)]
    DeploymentMismatch(String),
    /// Private keys are locked.
    #[error("Relayer keys are locked, unlock them first")]
    KeysLocked,
    /// The passphrase does not match the stored one.
    #[error("Wrong passphrase")]
    WrongPassphrase,
    /// No key was imported for the given chain.
    #[error("No key imported for chain {}", _0)]
    KeyNotImported(String),
    /// The oracle rejected a request.
    #[error("Oracle error: {}", _0)]
    Oracle(String),
    /// A JSON-RPC endpoint answered with an error object.
    #[error("JSON-RPC error from {method}: {message}")]
    JsonRpc {
        /// The called method.
        method: String,
        /// The error message returned by the node.
        message: String,
    },
}

impl Error {
    /// Returns `true` when the error must stop the relayer instead of being retried.
    ///
    /// Fatal errors are the ones where continuing would risk diverging from the
    /// other validators.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::HeightFetchExhausted { .. }
                | Error::InvariantViolation(_)
                | Error::DeploymentTimeout
                | Error::DeploymentMismatch(_)
        )
    }

    /// Returns `true` when the error comes from the event or claim itself,
    /// so retrying it can never succeed.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::Decode(_)
                | Error::NativeAddressMismatch { .. }
                | Error::AmountOverflow { .. }
                | Error::Oracle(_)
        )
    }

    /// Returns `true` when trying again later may succeed.
    pub fn is_retryable(&self) -> bool {
        !self.is_fatal() && !self.is_input_error()
    }
}

/// A type alias for the result for bridge relayer, that uses the `Error` enum.
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for HandlerError {
    fn from(value: Error) -> Self {
        let status = match value {
            Error::KeysLocked | Error::WrongPassphrase => StatusCode::FORBIDDEN,
            Error::KeyNotImported(_) => StatusCode::NOT_FOUND,
            Error::Decode(_) | Error::InvalidConfig(_) | Error::Oracle(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        HandlerError(status, value.to_string())
    }
}

/// Error type for HTTP handlers
#[derive(Debug)]
pub struct HandlerError(
    /// HTTP status code for response
    pub StatusCode,
    /// Response message
    pub String,
);

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}
