use crate::{indexing::logs_from_receipts, syncnode::BlockProvider};
use alloy_eips::BlockNumHash;
use alloy_primitives::ChainId;
use futures::future::join_all;
use sentinel_storage::{LogStorage, StorageError, StorageRewinder};
use sentinel_types::{BlockInfo, Receipts};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Upper bound on blocks fetched in parallel per batch.
const MAX_FETCHER_TASKS: u64 = 10;

/// How long a single block fetch may take before it counts as failed.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors returned by the single-block indexing path.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainIndexerError {
    /// The indexer has no block sources configured.
    #[error("no block sources configured")]
    NoSources,

    /// Fetching block data from the active source failed.
    #[error(transparent)]
    Node(#[from] crate::syncnode::ManagedNodeError),

    /// Writing the extracted logs failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Backfills the log storage of a single chain from one of several block sources.
///
/// Fetching runs in parallel batches, but blocks are committed strictly in order: a batch's
/// results are sorted and only the contiguous prefix starting at the next expected height is
/// written. Triggers only ever raise the target; a trigger for a lower height than an earlier
/// one is a no-op.
#[derive(Debug)]
pub struct ChainIndexer<P, DB> {
    chain_id: ChainId,
    sources: Vec<Arc<P>>,
    db: Arc<DB>,

    active_source: AtomicUsize,
    running: AtomicBool,
    target: AtomicU64,
    sources_tried: AtomicUsize,
}

impl<P, DB> ChainIndexer<P, DB>
where
    P: BlockProvider + 'static,
    DB: LogStorage + StorageRewinder + 'static,
{
    /// Creates a new [`ChainIndexer`] over the given block sources.
    pub fn new(chain_id: ChainId, sources: Vec<Arc<P>>, db: Arc<DB>) -> Self {
        Self {
            chain_id,
            sources,
            db,
            active_source: AtomicUsize::new(0),
            running: AtomicBool::new(false),
            target: AtomicU64::new(0),
            sources_tried: AtomicUsize::new(0),
        }
    }

    /// Requests indexing up to the given block height.
    ///
    /// Raises the current target if needed and starts a backfill pass unless one is already
    /// running.
    pub fn process_chain(self: &Arc<Self>, target: u64) {
        if self.sources.is_empty() {
            warn!(
                target: "supervisor::chain_indexer",
                chain_id = self.chain_id,
                "No block sources configured, ignoring indexing trigger"
            );
            return;
        }

        self.target.fetch_max(target, Ordering::AcqRel);

        if self.running.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err()
        {
            return;
        }

        let indexer = self.clone();
        tokio::spawn(async move {
            indexer.run_until_idle().await;
        });
    }

    /// Fetches and stores the logs of a single known block via the active source.
    ///
    /// Used when a specific block must be re-indexed in place, for example after a rewind or a
    /// block replacement, where the backfill target machinery does not apply.
    pub async fn index_block(&self, block: BlockInfo) -> Result<(), ChainIndexerError> {
        let source = self.active_block_source()?;
        let receipts = source.fetch_receipts(block.hash).await?;
        self.db.store_block_logs(&block, logs_from_receipts(&receipts))?;
        Ok(())
    }

    fn active_block_source(&self) -> Result<&Arc<P>, ChainIndexerError> {
        if self.sources.is_empty() {
            return Err(ChainIndexerError::NoSources);
        }
        Ok(&self.sources[self.active_source.load(Ordering::Acquire) % self.sources.len()])
    }

    /// Returns `true` if the current target lies above the latest indexed block.
    fn pending_work(&self) -> bool {
        self.db
            .get_latest_block()
            .map(|latest| self.target.load(Ordering::Acquire) > latest.number)
            .unwrap_or(false)
    }

    /// Runs backfill passes until the indexer is caught up or stuck.
    ///
    /// A trigger can raise the target after a pass made its final caught-up check but before
    /// the running flag is cleared. Re-checking after the clear and re-arming closes that
    /// window; without it the trigger would be dropped until the next one arrives.
    async fn run_until_idle(self: Arc<Self>) {
        loop {
            let caught_up = self.clone().run().await;
            self.running.store(false, Ordering::Release);

            if !caught_up || !self.pending_work() {
                break;
            }
            if self
                .running
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                // another trigger claimed the flag and will run the pass
                break;
            }
        }
    }

    /// Runs one backfill pass. Returns `true` if the pass ended because the target was reached,
    /// `false` if it aborted on a storage read failure or exhausted sources.
    async fn run(self: Arc<Self>) -> bool {
        loop {
            let next = match self.db.get_latest_block() {
                Ok(latest) => latest.number + 1,
                Err(err) => {
                    error!(
                        target: "supervisor::chain_indexer",
                        chain_id = self.chain_id,
                        %err,
                        "Failed to read latest indexed block, aborting backfill pass"
                    );
                    return false;
                }
            };

            let target = self.target.load(Ordering::Acquire);
            if target < next {
                return true;
            }

            if self.fetch_and_commit(next, target).await {
                self.sources_tried.store(0, Ordering::Release);
                continue;
            }

            // no progress on the active source
            let tried = self.sources_tried.fetch_add(1, Ordering::AcqRel) + 1;
            if tried >= self.sources.len() {
                self.sources_tried.store(0, Ordering::Release);
                debug!(
                    target: "supervisor::chain_indexer",
                    chain_id = self.chain_id,
                    next,
                    target,
                    "All block sources failed to make progress, idling until the next trigger"
                );
                return false;
            }

            let rotated = self.active_source.fetch_add(1, Ordering::AcqRel) + 1;
            info!(
                target: "supervisor::chain_indexer",
                chain_id = self.chain_id,
                source = rotated % self.sources.len(),
                "Switching to the next block source"
            );
        }
    }

    /// Fetches up to [`MAX_FETCHER_TASKS`] blocks in parallel and commits the contiguous prefix.
    /// Returns `true` if at least one block was committed.
    async fn fetch_and_commit(&self, next: u64, target: u64) -> bool {
        let Ok(source) = self.active_block_source() else {
            return false;
        };

        let upper = target.min(next + MAX_FETCHER_TASKS - 1);
        let fetches = (next..=upper).map(|number| {
            let source = source.clone();
            async move {
                let result = tokio::time::timeout(FETCH_TIMEOUT, async {
                    let block = source.block_by_number(number).await?;
                    let receipts = source.fetch_receipts(block.hash).await?;
                    Ok::<_, crate::syncnode::ManagedNodeError>((block, receipts))
                })
                .await;

                match result {
                    Ok(Ok(pair)) => Some(pair),
                    Ok(Err(err)) => {
                        debug!(
                            target: "supervisor::chain_indexer",
                            number,
                            %err,
                            "Failed to fetch block"
                        );
                        None
                    }
                    Err(_) => {
                        debug!(
                            target: "supervisor::chain_indexer",
                            number,
                            "Timed out fetching block"
                        );
                        None
                    }
                }
            }
        });

        let mut fetched: Vec<(BlockInfo, Receipts)> = join_all(fetches)
            .await
            .into_iter()
            .flatten()
            .filter(|(block, _)| {
                self.db
                    .accept_block(block)
                    .inspect_err(|err| {
                        debug!(
                            target: "supervisor::chain_indexer",
                            chain_id = self.chain_id,
                            %block,
                            %err,
                            "Fetched block rejected"
                        );
                    })
                    .is_ok()
            })
            .collect();
        fetched.sort_unstable_by_key(|(block, _)| block.number);

        let mut committed = false;
        let mut expected = next;
        for (block, receipts) in fetched {
            if block.number != expected {
                break;
            }

            let logs = logs_from_receipts(&receipts);
            if let Err(err) = self.db.store_block_logs(&block, logs) {
                warn!(
                    target: "supervisor::chain_indexer",
                    chain_id = self.chain_id,
                    %block,
                    %err,
                    "Failed to commit block logs"
                );

                if block.number != 0 {
                    let parent = BlockNumHash::new(block.number - 1, block.parent_hash);
                    // best effort, the next pass starts from whatever the rewind left behind
                    if let Err(err) = self.db.rewind_log_storage(&parent) {
                        warn!(
                            target: "supervisor::chain_indexer",
                            chain_id = self.chain_id,
                            ?parent,
                            %err,
                            "Failed to rewind log storage after commit failure"
                        );
                    }
                }
                break;
            }

            expected += 1;
            committed = true;
        }
        committed
    }
}
