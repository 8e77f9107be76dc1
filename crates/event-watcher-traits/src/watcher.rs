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

use std::sync::Arc;
use std::time::{Duration, Instant};

use bridge_claim_codec::WitnessedEvent;
use bridge_relayer_config::event_watcher::EventsWatcherConfig;
use bridge_relayer_context::RelayerContext;
use bridge_relayer_store::{HistoryStoreKey, WatcherStore};
use bridge_relayer_types::EventLogIndex;
use bridge_relayer_utils::metric::Metrics;
use bridge_relayer_utils::retry::{ConsecutiveFailures, ConstantWithMaxRetryCount};
use bridge_relayer_utils::{probe, Error};
use futures::StreamExt;
use tokio::sync::{watch, Mutex};

use crate::client::{ChainClient, EventStream};
use crate::handler::{EventHandler, EventHandlerWithRetry};

/// How many times a handler is retried on one event before giving up for this tick.
const MAX_RETRY_COUNT: usize = 5;
/// Wait between two handler attempts.
const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Where a [`ChainWatcher`] is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// The signing keys are locked, nothing is fetched yet.
    WaitingForUnlock,
    /// Replaying the chain from the last fetched block to the head.
    CatchingUp,
    /// Following the head of the chain.
    Live,
}

/// Watches one chain for bridge events and feeds them to the handlers.
///
/// Events are processed in `(height, index)` order, once `maturity_degree`
/// blocks were built on top of them, and at least once: the processed marker
/// is written after the handlers ran.
pub struct ChainWatcher<C, S> {
    client: Arc<C>,
    store: S,
    key: HistoryStoreKey,
    config: EventsWatcherConfig,
    maturity_degree: u64,
    handlers: Vec<Arc<dyn EventHandler>>,
    state: watch::Sender<WatcherState>,
}

impl<C, S> std::fmt::Debug for ChainWatcher<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainWatcher")
            .field("chain", &self.key)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl<C, S> ChainWatcher<C, S>
where
    C: ChainClient + 'static,
    S: WatcherStore<WitnessedEvent> + 'static,
{
    /// Creates a watcher without handlers.
    pub fn new(
        client: Arc<C>,
        store: S,
        config: EventsWatcherConfig,
        maturity_degree: u64,
    ) -> Self {
        let key = HistoryStoreKey::new(client.kind(), client.chain_id());
        let (state, _) = watch::channel(WatcherState::WaitingForUnlock);
        Self {
            client,
            store,
            key,
            config,
            maturity_degree,
            handlers: Vec::new(),
            state,
        }
    }

    /// Adds a handler called on every matured event.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// The current state.
    pub fn state(&self) -> WatcherState {
        *self.state.borrow()
    }

    /// A receiver notified on every state change.
    pub fn subscribe_state(&self) -> watch::Receiver<WatcherState> {
        self.state.subscribe()
    }

    /// The store key of the watched chain.
    pub fn key(&self) -> HistoryStoreKey {
        self.key
    }

    fn set_state(&self, state: WatcherState) {
        let old = self.state.send_replace(state);
        if old != state {
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::Watcher,
                chain = %self.key,
                ?state,
            );
        }
    }

    fn start_cursor(&self) -> Option<EventLogIndex> {
        self.config.start_cursor.map(Into::into)
    }

    /// Runs the watcher until shutdown or a fatal error.
    ///
    /// Nothing is fetched before the relayer keys are unlocked.
    #[tracing::instrument(skip_all, fields(chain = %self.key))]
    pub async fn run(
        &self,
        ctx: &RelayerContext,
    ) -> bridge_relayer_utils::Result<()> {
        let mut shutdown = ctx.shutdown_signal();
        let mut unlocked = ctx.key_manager().subscribe();
        self.set_state(WatcherState::WaitingForUnlock);
        let wait_unlock = async {
            while !*unlocked.borrow_and_update() {
                tracing::info!("Waiting for the relayer keys to be unlocked");
                unlocked
                    .changed()
                    .await
                    .map_err(|_| Error::TaskStoppedAbnormally)?;
            }
            Ok::<_, Error>(())
        };
        tokio::select! {
            biased;
            _ = shutdown.recv() => return Ok(()),
            r = wait_unlock => r?,
        }
        self.set_state(WatcherState::CatchingUp);
        let metrics = ctx.metrics.clone();
        let task = async {
            tokio::try_join!(self.produce(&metrics), self.consume(&metrics))
        };
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Chain watcher stopped");
                Ok(())
            }
            r = task => r.map(|_| ()),
        }
    }

    /// Fetches the blocks after the last fetched one up to `head` into the
    /// event log, in windows of `max-blocks-per-step` blocks.
    async fn fetch_to_head(&self, head: u64) -> bridge_relayer_utils::Result<()> {
        let default_last = self
            .start_cursor()
            .map(|c| c.height.saturating_sub(1))
            .unwrap_or_default();
        let mut last = self.store.get_last_block_number(self.key, default_last)?;
        let step = self.config.max_blocks_per_step.max(1);
        while last < head {
            let to = head.min(last.saturating_add(step));
            let events = self.client.fetch_events(last + 1, to).await?;
            tracing::trace!(from = last + 1, to, "Found #{} events", events.len());
            self.store.insert_events(self.key, &events)?;
            self.store.set_last_block_number(self.key, to)?;
            last = to;
        }
        Ok(())
    }

    async fn live(
        &self,
        subscription: Option<EventStream>,
    ) -> bridge_relayer_utils::Result<()> {
        match subscription {
            Some(mut stream) => {
                while let Some(item) = stream.next().await {
                    let (index, event) = item?;
                    self.store.insert_events(self.key, &[(index, event)])?;
                    // every block before this one was delivered already.
                    let before = index.height.saturating_sub(1);
                    let last = self.store.get_last_block_number_or_default(self.key)?;
                    if before > last {
                        self.store.set_last_block_number(self.key, before)?;
                    }
                }
                Err(Error::ForceRestart)
            }
            None => loop {
                tokio::time::sleep(self.config.polling_interval()).await;
                let head = self.client.latest_height().await?;
                self.fetch_to_head(head).await?;
            },
        }
    }

    async fn produce_once(&self) -> bridge_relayer_utils::Result<()> {
        // subscribe first so that nothing between the catch-up head and the
        // first pushed event is lost.
        let subscription = self.client.subscribe().await?;
        self.set_state(WatcherState::CatchingUp);
        let head = self.client.latest_height().await?;
        self.fetch_to_head(head).await?;
        tracing::info!(head, "Caught up with the chain");
        self.set_state(WatcherState::Live);
        self.live(subscription).await
    }

    /// Keeps the event log filled; transient errors restart the producers.
    async fn produce(
        &self,
        metrics: &Arc<Mutex<Metrics>>,
    ) -> bridge_relayer_utils::Result<()> {
        loop {
            match self.produce_once().await {
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    tracing::warn!(error = %e, "Restarting the event producers");
                    metrics.lock().await.watcher_back_off.inc();
                    tracing::event!(
                        target: probe::TARGET,
                        tracing::Level::DEBUG,
                        kind = %probe::Kind::Retry,
                        chain = %self.key,
                        error = %e,
                    );
                    tokio::time::sleep(self.config.polling_interval()).await;
                }
                Ok(()) => {}
            }
        }
    }

    /// Processes the matured events of the log, one tick per polling interval.
    async fn consume(
        &self,
        metrics: &Arc<Mutex<Metrics>>,
    ) -> bridge_relayer_utils::Result<()> {
        let mut failures =
            ConsecutiveFailures::new(self.config.max_height_fetch_failures);
        let mut cursor = self.store.get_cursor(self.key)?.or(self.start_cursor());
        let mut interval = tokio::time::interval(self.config.polling_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut instant = Instant::now();
        loop {
            interval.tick().await;
            let head = match self.client.latest_height().await {
                Ok(head) => {
                    failures.succeed();
                    head
                }
                Err(e) => {
                    metrics
                        .lock()
                        .await
                        .height_fetch_failures
                        .with_label_values(&[self.key.kind.as_str()])
                        .inc();
                    tracing::warn!(
                        error = %e,
                        failures = failures.current() + 1,
                        "Failed to fetch the chain height"
                    );
                    if failures.fail() {
                        return Err(Error::HeightFetchExhausted {
                            chain_id: self.key.to_string(),
                            attempts: failures.current(),
                        });
                    }
                    continue;
                }
            };
            self.store.set_target_block_number(self.key, head)?;
            match self.process_matured(head, cursor, metrics).await {
                Ok(c) => cursor = c,
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    tracing::warn!(error = %e, "Event processing interrupted");
                    cursor = self.store.get_cursor(self.key)?.or(cursor);
                }
            }

            let progress_interval = self.config.print_progress_interval();
            if progress_interval != Duration::ZERO
                && instant.elapsed() > progress_interval
            {
                self.print_progress(head, cursor)?;
                instant = Instant::now();
            }
        }
    }

    fn print_progress(
        &self,
        head: u64,
        cursor: Option<EventLogIndex>,
    ) -> bridge_relayer_utils::Result<()> {
        let fetched = self.store.get_last_block_number_or_default(self.key)?;
        let processed = cursor.map(|c| c.height).unwrap_or_default();
        let progress = if head == 0 {
            100.0
        } else {
            fetched as f64 / head as f64 * 100.0
        };
        let is_syncing = fetched < head;
        tracing::info!(
            target_block = head,
            fetched,
            processed,
            is_syncing,
            progress,
            chain = %self.key,
        );
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::TRACE,
            kind = %probe::Kind::Sync,
            chain = %self.key,
            %head,
            %fetched,
            %processed,
        );
        Ok(())
    }

    /// Processes matured events after `cursor` in batches, returns the new cursor.
    async fn process_matured(
        &self,
        head: u64,
        mut cursor: Option<EventLogIndex>,
        metrics: &Arc<Mutex<Metrics>>,
    ) -> bridge_relayer_utils::Result<Option<EventLogIndex>> {
        let batch_size = self.config.fetch_batch_size.max(1);
        'batches: loop {
            let batch = self.store.events_after(self.key, cursor, batch_size)?;
            let len = batch.len();
            for (index, event) in batch {
                let matured_at =
                    index.height.saturating_add(self.maturity_degree + 1);
                if matured_at > head {
                    break 'batches;
                }
                self.process_event(index, &event, metrics).await?;
                self.store.set_cursor(self.key, index)?;
                cursor = Some(index);
            }
            if len < batch_size {
                break;
            }
        }
        if let Some(c) = cursor {
            self.store.prune_events(self.key, c)?;
        }
        Ok(cursor)
    }

    #[tracing::instrument(skip_all, fields(%index, tx = ?event.tx_hash, nonce = event.nonce))]
    async fn process_event(
        &self,
        index: EventLogIndex,
        event: &WitnessedEvent,
        metrics: &Arc<Mutex<Metrics>>,
    ) -> bridge_relayer_utils::Result<()> {
        let marker = processed_marker(event);
        if self.store.is_processed(self.key, &marker)? {
            tracing::debug!("Event already processed, skipping");
            return Ok(());
        }
        if !self.client.tx_succeeded(event.tx_hash).await? {
            tracing::warn!("Source transaction failed or vanished, dropping event");
            self.store.mark_processed(self.key, &marker)?;
            return Ok(());
        }
        let tasks = self.handlers.iter().map(|handler| {
            // a constant backoff with maximum retry count is used here.
            let backoff =
                ConstantWithMaxRetryCount::new(RETRY_INTERVAL, MAX_RETRY_COUNT);
            handler.handle_event_with_retry(index, event, backoff)
        });
        let results = futures::future::join_all(tasks).await;
        let mut retryable = None;
        for result in results {
            match result {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) if e.is_input_error() => {
                    tracing::error!(error = %e, "Dropping malformed event");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Error while handling the event");
                    retryable = Some(e);
                }
            }
        }
        // the event is handed again on the next tick.
        if let Some(e) = retryable {
            return Err(e);
        }
        self.store.mark_processed(self.key, &marker)?;
        metrics
            .lock()
            .await
            .events_processed
            .with_label_values(&[self.key.kind.as_str()])
            .inc();
        tracing::trace!("event handled successfully");
        Ok(())
    }
}

/// The processed marker of an event: its transaction hash and event nonce.
///
/// The nonce tells apart several bridge events of the same transaction.
pub fn processed_marker(event: &WitnessedEvent) -> Vec<u8> {
    let mut marker = event.tx_hash.as_bytes().to_vec();
    marker.extend_from_slice(&event.nonce.to_be_bytes());
    marker
}
