#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # Bridge Relayer Crate 🕸️
//!
//! A two-way relayer between an EVM chain and a Tendermint-style chain
//! running the `x2ethereum` bridge executor.
//!
//! ## Overview
//!
//! Every validator of the bridge runs one relayer. The relayer watches the
//! bridge events on both chains and, once an event is deep enough in its
//! chain, turns it into a claim voted on the other chain with the
//! validator's own key:
//!
//!   1. Locks and burns on the EVM bridge bank become `Eth2Chain33` claims,
//!      voted on the prophecy oracle of the Tendermint side, or on the oracle
//!      embedded in the relayer.
//!   2. Locks and burns of the bridge executor become `newOracleClaim` calls
//!      on the EVM oracle contract.
//!
//! A prophecy succeeds once the validators that voted for the same content
//! hold at least the consensus threshold of the total power; its effect is
//! applied exactly once.
//!
//! Before anything is watched the relayer waits for its keys to be unlocked
//! and for the bridge contracts to be deployed.
//!
//! # Features
//!
//! * `integration-tests`: JSON logs, easy to parse from a test harness. By
//!   default, this is disabled.

/// A module for starting long-running tasks for event watching.
pub mod service;

pub use bridge_relayer_utils::{Error, Result};
