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

#![warn(missing_docs)]
//! # Relayer Events Watcher Module 🕸️
//!
//! A module that listens for bridge events on a given chain.
//!
//! ## Overview
//!
//! A [`ChainWatcher`] runs two producers and one consumer around the
//! persisted event log of its chain. The catch-up producer replays the chain
//! from the last fetched block up to the head, then the live producer keeps
//! the log filled, from a subscription when the chain offers one or by
//! polling otherwise. The consumer processes the matured events of the log
//! in order, calls the [`EventHandler`]s on them and moves the sync cursor.

/// Chain access needed by the watcher.
pub mod client;
/// Handlers of witnessed events.
pub mod handler;
/// A programmable in-memory chain.
#[cfg(any(test, feature = "mock"))]
pub mod mock;
/// The watcher itself.
pub mod watcher;

pub use client::{ChainClient, EventStream};
pub use handler::{EventHandler, EventHandlerWithRetry};
pub use watcher::{ChainWatcher, WatcherState};

#[cfg(test)]
mod tests;
