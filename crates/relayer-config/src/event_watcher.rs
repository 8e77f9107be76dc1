use std::time::Duration;

use bridge_relayer_types::EventLogIndex;

use super::*;

/// EventsWatcherConfig is the configuration for the chain watcher of one chain.
#[derive(Debug, Clone, Serialize, Deserialize, Copy)]
#[serde(rename_all = "kebab-case")]
pub struct EventsWatcherConfig {
    /// if it is enabled for this chain or not.
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,
    /// Polling interval in milliseconds
    #[serde(
        rename(serialize = "pollingInterval"),
        default = "defaults::polling_interval"
    )]
    pub polling_interval: u64,
    /// How many buffered events are processed per batch.
    #[serde(skip_serializing, default = "defaults::fetch_batch_size")]
    pub fetch_batch_size: usize,
    /// The maximum number of blocks to fetch events from in one request.
    #[serde(skip_serializing, default = "defaults::max_blocks_per_step")]
    pub max_blocks_per_step: u64,
    /// How many consecutive failures to read the chain height are tolerated
    /// before the watcher stops with a fatal error.
    #[serde(skip_serializing, default = "defaults::max_height_fetch_failures")]
    pub max_height_fetch_failures: u32,
    /// print sync progress frequency in milliseconds
    /// if it is zero, means no progress will be printed.
    #[serde(skip_serializing, default = "defaults::print_progress_interval")]
    pub print_progress_interval: u64,
    /// The event taken as already processed when no cursor is stored yet.
    #[serde(rename(serialize = "startCursor"), default)]
    pub start_cursor: Option<StartCursor>,
}

impl Default for EventsWatcherConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            polling_interval: defaults::polling_interval(),
            fetch_batch_size: defaults::fetch_batch_size(),
            max_blocks_per_step: defaults::max_blocks_per_step(),
            max_height_fetch_failures: defaults::max_height_fetch_failures(),
            print_progress_interval: defaults::print_progress_interval(),
            start_cursor: None,
        }
    }
}

impl EventsWatcherConfig {
    /// Polling interval as a [`Duration`].
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval)
    }

    /// Sync progress interval as a [`Duration`].
    pub fn print_progress_interval(&self) -> Duration {
        Duration::from_millis(self.print_progress_interval)
    }
}

/// The position a chain watcher starts from on its first run.
///
/// Events at or before it are considered processed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct StartCursor {
    /// Block height.
    pub height: u64,
    /// Position within the block.
    #[serde(default)]
    pub index: u32,
}

impl From<StartCursor> for EventLogIndex {
    fn from(c: StartCursor) -> Self {
        EventLogIndex::new(c.height, c.index)
    }
}
