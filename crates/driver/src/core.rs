//! The cooperative syncing loop: steps the pipeline into the executor and
//! reacts to the outcome.

use crate::{
    executor::{Executor, ExecutorError},
    traits::BlockSource,
};
use mako_derive::errors::DeriveErrorKind;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Initial retry delay.
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
/// Retry delay ceiling.
const MAX_BACKOFF: Duration = Duration::from_secs(10);
/// Consecutive temporary failures tolerated before the driver aborts.
const MAX_TEMPORARY_FAILURES: u32 = 100;
/// L1 blocks rewound per gap-reset, multiplied by the reset counter.
const REWIND_STEP: u64 = 100;
/// Progress log interval.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(60);

/// How a finished driver exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverExit {
    /// The configured L2 end block was reached.
    Terminated,
    /// The shutdown signal fired.
    Cancelled,
}

/// Why the driver gave up.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Too many consecutive temporary failures.
    #[error("{MAX_TEMPORARY_FAILURES} consecutive temporary failures, last: {0}")]
    TemporaryBudgetExhausted(String),
    /// The pipeline hit an unrecoverable error.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] DeriveErrorKind),
    /// The executor failed for good.
    #[error("executor error: {0}")]
    Executor(#[from] ExecutorError),
}

enum StepOutcome {
    /// A block was executed and written.
    Advanced(u64),
    /// The pipeline has nothing yet; retry later.
    Eof,
    /// A transient failure; retry later.
    Temporary(String),
    /// The executor already has this block.
    SkippedLow(u64),
    /// The executor reports a gap below this block.
    Gap(u64),
    /// The configured end block was reached.
    ReachedEnd(u64),
}

/// The pipeline's driving task. Owns the pipeline and the executor; nothing
/// else touches them while the driver runs.
#[derive(Debug)]
pub struct SyncingDriver<P, E> {
    pipeline: P,
    executor: E,
    /// Stop after deriving this height; zero means unlimited.
    l2_end_block: u64,
    /// Whether the executor replaces existing blocks at the same height,
    /// as recovery runs do.
    override_mode: bool,
    /// Whether derived blocks are signed on insertion.
    sign_blocks: bool,
}

impl<P, E> SyncingDriver<P, E>
where
    P: BlockSource + Send,
    E: Executor + Send,
{
    /// Creates a driver over `pipeline` and `executor`.
    pub const fn new(pipeline: P, executor: E, l2_end_block: u64, sign_blocks: bool) -> Self {
        Self { pipeline, executor, l2_end_block, override_mode: false, sign_blocks }
    }

    /// Makes the executor replace existing blocks instead of rejecting them
    /// as too low; recovery-mode runs derive over an already-populated chain.
    pub const fn with_override_mode(mut self) -> Self {
        self.override_mode = true;
        self
    }

    /// Runs until the end block is reached, the shutdown signal fires, or an
    /// unrecoverable error surfaces.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<DriverExit, DriverError> {
        let mut backoff = INITIAL_BACKOFF;
        let mut temporary_failures = 0u32;
        let mut reset_counter = 0u64;
        let mut delay = Duration::ZERO;
        let mut last_block = 0u64;
        let mut last_progress = tokio::time::Instant::now();

        loop {
            if last_progress.elapsed() >= PROGRESS_INTERVAL {
                let checkpoint = self.pipeline.checkpoint();
                info!(
                    target: "driver",
                    last_block,
                    batch = checkpoint.batch_index,
                    l1_cursor = self.pipeline.l1_cursor(),
                    messages = checkpoint.total_l1_messages_popped,
                    "derivation progress"
                );
                last_progress = tokio::time::Instant::now();
            }

            if !delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => return Ok(DriverExit::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let outcome = tokio::select! {
                biased;
                _ = shutdown.changed() => return Ok(DriverExit::Cancelled),
                outcome = self.step() => outcome?,
            };

            delay = Duration::ZERO;
            match outcome {
                StepOutcome::Advanced(number) => {
                    backoff = INITIAL_BACKOFF;
                    temporary_failures = 0;
                    reset_counter = 0;
                    last_block = number;
                }
                StepOutcome::ReachedEnd(number) => {
                    info!(target: "driver", number, "reached configured end block");
                    return Ok(DriverExit::Terminated);
                }
                StepOutcome::Eof => {
                    debug!(target: "driver", backoff = ?backoff, "pipeline empty, delaying");
                    delay = backoff;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
                StepOutcome::Temporary(reason) => {
                    temporary_failures += 1;
                    if temporary_failures >= MAX_TEMPORARY_FAILURES {
                        error!(target: "driver", reason, "temporary failure budget exhausted");
                        return Err(DriverError::TemporaryBudgetExhausted(reason));
                    }
                    warn!(
                        target: "driver",
                        reason,
                        consecutive = temporary_failures,
                        "temporary failure, delaying"
                    );
                    delay = backoff;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
                StepOutcome::SkippedLow(number) => {
                    debug!(target: "driver", number, "block already in local chain, skipping");
                    backoff = INITIAL_BACKOFF;
                    temporary_failures = 0;
                }
                StepOutcome::Gap(number) => {
                    reset_counter += 1;
                    let rewind = REWIND_STEP * reset_counter;
                    warn!(
                        target: "driver",
                        number,
                        rewind,
                        attempt = reset_counter,
                        "local chain behind derived block, rewinding L1 cursor"
                    );
                    self.pipeline.rewind(rewind)?;
                }
            }
        }
    }

    async fn step(&mut self) -> Result<StepOutcome, DriverError> {
        let block = match self.pipeline.next_block().await {
            Ok(block) => block,
            Err(e) if e.is_eof() => return Ok(StepOutcome::Eof),
            Err(DeriveErrorKind::Temporary(e)) => return Ok(StepOutcome::Temporary(e.to_string())),
            Err(e) => {
                error!(target: "driver", error = %e, "derivation failed");
                return Err(DriverError::Pipeline(e));
            }
        };

        let number = block.number();
        if self.l2_end_block > 0 && number > self.l2_end_block {
            return Ok(StepOutcome::ReachedEnd(self.l2_end_block));
        }

        match self
            .executor
            .build_and_write_block(&block, self.override_mode, self.sign_blocks)
            .await
        {
            Ok(()) => {
                if self.l2_end_block > 0 && number == self.l2_end_block {
                    return Ok(StepOutcome::ReachedEnd(number));
                }
                Ok(StepOutcome::Advanced(number))
            }
            Err(ExecutorError::BlockTooLow { block, .. }) => Ok(StepOutcome::SkippedLow(block)),
            Err(ExecutorError::BlockTooHigh { block, .. }) => Ok(StepOutcome::Gap(block)),
            Err(ExecutorError::Temporary(reason)) => Ok(StepOutcome::Temporary(reason)),
            Err(e @ ExecutorError::Fatal(_)) => {
                error!(target: "driver", error = %e, "executor failed");
                Err(DriverError::Executor(e))
            }
        }
    }
}
