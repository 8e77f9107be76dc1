use std::sync::Arc;
use std::time::Duration;

use bridge_relayer_store::SubmissionStore;
use bridge_relayer_types::{Direction, TxStatus};
use bridge_relayer_utils::probe;

use crate::client::SubmitClient;

/// Resolves the submissions of one direction, strictly in submission order.
///
/// The walk stops at the first submission still pending, later ones are not
/// looked at even when already mined. A submission not mined within
/// `mined_timeout` of its broadcast is marked failed.
pub struct TxStatusTracker<C, S> {
    direction: Direction,
    client: Arc<C>,
    store: S,
    interval: Duration,
    mined_timeout: Duration,
}

impl<C, S> TxStatusTracker<C, S>
where
    C: SubmitClient,
    S: SubmissionStore,
{
    /// Creates a tracker checking every `interval`.
    pub fn new(
        direction: Direction,
        client: Arc<C>,
        store: S,
        interval: Duration,
        mined_timeout: Duration,
    ) -> Self {
        Self {
            direction,
            client,
            store,
            interval,
            mined_timeout,
        }
    }

    /// One walk over the unresolved submissions, returns the resolved watermark.
    #[tracing::instrument(skip(self), fields(direction = %self.direction))]
    pub async fn check_once(&self) -> bridge_relayer_utils::Result<u64> {
        let mut checked = self.store.status_checked_index(self.direction)?;
        let count = self.store.submission_count(self.direction)?;
        for index in checked + 1..=count {
            let Some(submission) = self.store.submission(self.direction, index)?
            else {
                break;
            };
            let status = match submission.status {
                TxStatus::Pending => {
                    self.client.tx_status(&submission.tx_hash).await?
                }
                resolved => resolved,
            };
            let status = if status.is_pending() {
                if submission.age() < self.mined_timeout {
                    tracing::trace!(index, tx_hash = %submission.tx_hash, "Still pending");
                    break;
                }
                tracing::warn!(
                    index,
                    tx_hash = %submission.tx_hash,
                    timeout = ?self.mined_timeout,
                    "Submitted claim not mined in time",
                );
                TxStatus::Failed
            } else {
                status
            };
            self.store
                .set_submission_status(self.direction, index, status)?;
            self.store.set_status_checked_index(self.direction, index)?;
            checked = index;
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::TxStatus,
                direction = %self.direction,
                index,
                tx_hash = %submission.tx_hash,
                %status,
            );
            if status == TxStatus::Failed {
                tracing::warn!(index, tx_hash = %submission.tx_hash, "Submitted claim failed");
            }
        }
        Ok(checked)
    }

    /// Checks the submissions every interval, forever.
    ///
    /// Query errors are logged and retried on the next tick.
    pub async fn run(self) -> bridge_relayer_utils::Result<()> {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match self.check_once().await {
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(error = %e, direction = %self.direction, "Status check failed");
                }
            }
        }
    }
}
