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

use derive_more::Display;
/// Target for logger
pub const TARGET: &str = "bridge_probe";

/// The Kind of the Probe.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// When the Lifecycle of the Relayer changes, like starting or shutting down.
    #[display(fmt = "lifecycle")]
    Lifecycle,
    /// Relayer Sync state on a specific chain.
    #[display(fmt = "sync")]
    Sync,
    /// Chain watcher state transitions (waiting for unlock, catching up, live).
    #[display(fmt = "watcher")]
    Watcher,
    /// Claim submission and nonce handling on a specific chain.
    #[display(fmt = "tx_queue")]
    TxQueue,
    /// Submitted transaction status resolution.
    #[display(fmt = "tx_status")]
    TxStatus,
    /// Prophecy votes and completions.
    #[display(fmt = "oracle")]
    Oracle,
    /// Key import, lock and unlock.
    #[display(fmt = "key_manager")]
    KeyManager,
    /// Bridge contracts deployment bootstrap.
    #[display(fmt = "deployment")]
    Deployment,
    /// When the relayer will retry to do something.
    #[display(fmt = "retry")]
    Retry,
}
