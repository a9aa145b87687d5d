//! Block-cadence executor.
//!
//! Runs one cycle per new block, skipping ahead by the configured cadence
//! after a successful cycle and retrying on the very next block otherwise.
//! Every wait and every cycle runs under a deadline; the loop is bounded
//! polling with sleeps, never unbounded recursion or blocking waits.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::time::Instant;

use crate::foundation::constants::SLOT_TIME_SECONDS;
use crate::foundation::error::{Result, WardenError};
use crate::foundation::types::BlockNumber;
use crate::infrastructure::chain::{BlockHeader, ChainReader};
use crate::infrastructure::config::ExecutorConfig;

pub struct Executor {
    reader: Arc<dyn ChainReader>,
    cadence_blocks: u64,
    max_cycle_lifetime: Duration,
    poll_interval: Duration,
    wait_deadline: Duration,
}

impl Executor {
    pub fn new(reader: Arc<dyn ChainReader>, config: &ExecutorConfig) -> Self {
        let cadence_blocks = config.cadence_blocks.max(1);
        // Generous enough for the cadence plus missed slots.
        let wait_deadline = Duration::from_secs(
            (5 * SLOT_TIME_SECONDS).max(cadence_blocks * SLOT_TIME_SECONDS * 2),
        );
        Executor {
            reader,
            cadence_blocks,
            max_cycle_lifetime: Duration::from_secs(config.max_cycle_lifetime_secs),
            poll_interval: Duration::from_secs(1),
            wait_deadline,
        }
    }

    /// Shrinks the polling and wait timings; test hook.
    pub fn with_timings(mut self, poll_interval: Duration, wait_deadline: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.wait_deadline = wait_deadline;
        self
    }

    /// Drives `cycle` forever. Returns only with a fatal error; per-cycle
    /// failures are logged and retried on the next block.
    pub async fn run<F, Fut>(&self, mut cycle: F) -> Result<()>
    where
        F: FnMut(BlockHeader) -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let mut next_block: BlockNumber = 0;
        loop {
            let header = self.wait_for_block(next_block).await?;
            debug!("cycle starting block={} hash={}", header.number, header.hash);
            match tokio::time::timeout(self.max_cycle_lifetime, cycle(header)).await {
                Err(_) => {
                    return Err(WardenError::CycleTimeout {
                        max_lifetime_secs: self.max_cycle_lifetime.as_secs(),
                    });
                }
                Ok(Ok(success)) => {
                    let advance = if success { self.cadence_blocks } else { 1 };
                    if success {
                        info!("cycle succeeded block={} next_in_blocks={}", header.number, advance);
                    }
                    next_block = header.number + advance;
                }
                Ok(Err(e)) if e.is_fatal() => return Err(e),
                Ok(Err(e)) => {
                    warn!("cycle failed, retrying next block block={} error={}", header.number, e);
                    next_block = header.number + 1;
                }
            }
        }
    }

    /// Polls until the head reaches `min_number`. Transient lookup failures
    /// are retried within the deadline; anything else propagates.
    async fn wait_for_block(&self, min_number: BlockNumber) -> Result<BlockHeader> {
        let started = Instant::now();
        loop {
            match self.reader.latest_block().await {
                Ok(header) if header.number >= min_number => return Ok(header),
                Ok(header) => {
                    debug!("waiting for block head={} want={}", header.number, min_number)
                }
                Err(e) if e.is_transient() => debug!("head lookup failed, retrying error={e}"),
                Err(e) => return Err(e),
            }
            if started.elapsed() >= self.wait_deadline {
                return Err(WardenError::WaitForBlockTimeout {
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use alloy_primitives::B256;

    use crate::infrastructure::chain::mock::MockChain;

    fn fast_executor(chain: Arc<MockChain>, cadence_blocks: u64) -> Executor {
        Executor::new(
            chain,
            &ExecutorConfig { cadence_blocks, max_cycle_lifetime_secs: 2 },
        )
        .with_timings(Duration::from_millis(5), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn cadence_advances_on_success_and_resets_on_failure() {
        let chain = Arc::new(MockChain::new());
        chain.set_head(100, B256::repeat_byte(1), 10);
        let executor = fast_executor(chain.clone(), 3);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let result = {
            let seen = seen.clone();
            let chain = chain.clone();
            executor
                .run(move |header| {
                    let seen = seen.clone();
                    let chain = chain.clone();
                    async move {
                        let mut seen = seen.lock().unwrap();
                        seen.push(header.number);
                        // Keep the chain moving so waits can complete.
                        for _ in 0..3 {
                            chain.advance_head();
                        }
                        match seen.len() {
                            1 => Ok(true),
                            2 => Ok(false),
                            3 => Ok(true),
                            _ => Err(WardenError::NoActiveEndpoint("test stop".to_string())),
                        }
                    }
                })
                .await
        };

        assert!(matches!(result, Err(WardenError::NoActiveEndpoint(_))));
        let seen = seen.lock().unwrap().clone();
        // Each cycle advances the mock head by 3. Success at 100 waits for
        // 103; failure at 103 waits for 104 but the head is already at 106;
        // success at 106 waits for 109.
        assert_eq!(seen, vec![100, 103, 106, 109]);
    }

    #[tokio::test]
    async fn missing_head_is_retried_until_it_appears() {
        let chain = Arc::new(MockChain::new());
        let executor = fast_executor(chain.clone(), 1);

        let waiter = {
            let chain = chain.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                chain.set_head(50, B256::repeat_byte(2), 10);
            })
        };

        let result = executor
            .run(|header| async move {
                assert_eq!(header.number, 50);
                Err(WardenError::NoActiveEndpoint("test stop".to_string()))
            })
            .await;
        waiter.await.unwrap();
        assert!(matches!(result, Err(WardenError::NoActiveEndpoint(_))));
    }

    #[tokio::test]
    async fn stalled_chain_times_out_fatally() {
        let chain = Arc::new(MockChain::new());
        chain.set_head(100, B256::repeat_byte(1), 10);
        let executor = fast_executor(chain, 1);

        let result = executor
            .run(|_| async move {
                // Succeed without advancing the chain; the next wait starves.
                Ok(true)
            })
            .await;
        assert!(matches!(result, Err(WardenError::WaitForBlockTimeout { .. })));
    }

    #[tokio::test]
    async fn overlong_cycle_is_fatal() {
        let chain = Arc::new(MockChain::new());
        chain.set_head(100, B256::repeat_byte(1), 10);
        let executor = Executor::new(
            chain,
            &ExecutorConfig { cadence_blocks: 1, max_cycle_lifetime_secs: 0 },
        )
        .with_timings(Duration::from_millis(5), Duration::from_millis(200));

        let result = executor
            .run(|_| async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(true)
            })
            .await;
        assert!(matches!(result, Err(WardenError::CycleTimeout { .. })));
    }
}
