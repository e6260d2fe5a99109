//! Sandbox bootstrap: retry with backoff + circuit breaker, generalized from
//! the teacher's `sandbox::execution::{CircuitBreaker, execute_with_controls}`
//! ("tool execution attempt" → "sandbox bootstrap attempt").

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{instrument, warn};

use crate::error::{SandboxError, SandboxResult};
use crate::port_pool::{PortAssignment, PortPool};
use crate::traits::{Context, Page, Tracing, Wallet};

/// Atomic circuit breaker that opens after N consecutive bootstrap failures.
#[derive(Debug)]
pub struct CircuitBreaker {
    consecutive_failures: AtomicU32,
    threshold: u32,
}

impl CircuitBreaker {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
            threshold,
        }
    }

    pub fn is_open(&self) -> bool {
        self.consecutive_failures.load(Ordering::Relaxed) >= self.threshold
    }

    pub fn record_failure(&self) -> u32 {
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(5),
        }
    }
}

/// Bootstraps a sandbox driver, retrying up to `max_attempts` with
/// `backoff` between attempts. `kill_residual` is invoked (best-effort)
/// before each attempt to forcibly terminate leftover browser processes.
#[instrument(skip_all)]
pub async fn bootstrap<B, F, Fut>(
    breaker: &CircuitBreaker,
    config: &BootstrapConfig,
    kill_residual: impl Fn(),
    factory: F,
) -> SandboxResult<B>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<B, String>>,
{
    for attempt in 1..=config.max_attempts {
        if breaker.is_open() {
            return Err(SandboxError::CircuitBreakerOpen {
                consecutive_failures: breaker.failure_count(),
                threshold: breaker.threshold,
            });
        }

        kill_residual();

        match factory().await {
            Ok(driver) => {
                breaker.record_success();
                return Ok(driver);
            }
            Err(reason) => {
                breaker.record_failure();
                warn!(attempt, %reason, "sandbox bootstrap attempt failed");
                if attempt == config.max_attempts {
                    return Err(SandboxError::BootstrapFailed { attempts: attempt, reason });
                }
                tokio::time::sleep(config.backoff).await;
            }
        }
    }
    unreachable!("loop always returns by the last attempt")
}

/// A bootstrapped sandbox: `page`/`wallet`/`context`/`tracing` are all views
/// onto the same driver, mirroring spec.md §4.2's single `Sandbox` handle.
pub struct Sandbox<B> {
    driver: Arc<B>,
    pub port_assignment: Option<PortAssignment>,
}

impl<B> Sandbox<B>
where
    B: Page + Wallet + Context + Tracing + Send + Sync + 'static,
{
    pub fn new(driver: B, port_assignment: Option<PortAssignment>) -> Self {
        Self {
            driver: Arc::new(driver),
            port_assignment,
        }
    }

    pub fn page(&self) -> &B {
        &self.driver
    }

    pub fn wallet(&self) -> &B {
        &self.driver
    }

    pub fn context(&self) -> &B {
        &self.driver
    }

    pub fn tracing(&self) -> &B {
        &self.driver
    }

    /// Stops tracing, closes the context, and frees any allocated streaming
    /// ports. Removal of an auxiliary isolated environment is the caller's
    /// responsibility (outside this crate's scope).
    #[instrument(skip_all)]
    pub async fn teardown(&self, pool: Option<&PortPool>) -> SandboxResult<Vec<crate::traits::Frame>> {
        let frames = Tracing::stop(self.driver.as_ref()).await?;
        Context::close(self.driver.as_ref()).await?;
        if let (Some(pool), Some(assignment)) = (pool, self.port_assignment) {
            pool.release(assignment.pixel_port);
        }
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeBrowser, FakeBrowserConfig};
    use std::sync::atomic::AtomicU32 as Counter;

    #[tokio::test]
    async fn bootstrap_retries_then_succeeds() {
        let breaker = CircuitBreaker::new(5);
        let config = BootstrapConfig {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        };
        let attempts = Counter::new(0);

        let result = bootstrap(&breaker, &config, || {}, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("residual process still holding the display".to_string())
                } else {
                    Ok(FakeBrowser::new(FakeBrowserConfig::default()))
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn bootstrap_exhausts_attempts_and_reports_reason() {
        let breaker = CircuitBreaker::new(10);
        let config = BootstrapConfig {
            max_attempts: 2,
            backoff: Duration::from_millis(1),
        };

        let result = bootstrap(&breaker, &config, || {}, || async {
            Err::<FakeBrowser, _>("display not available".to_string())
        })
        .await;

        match result {
            Err(SandboxError::BootstrapFailed { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected BootstrapFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn open_circuit_breaker_blocks_bootstrap() {
        let breaker = CircuitBreaker::new(1);
        breaker.record_failure();
        let config = BootstrapConfig::default();

        let result = bootstrap(&breaker, &config, || {}, || async {
            Ok(FakeBrowser::new(FakeBrowserConfig::default()))
        })
        .await;

        assert!(matches!(result, Err(SandboxError::CircuitBreakerOpen { .. })));
    }

    #[tokio::test]
    async fn teardown_frees_the_allocated_port() {
        let pool = PortPool::new(5901, 5901, 60);
        let assignment = pool.allocate("run-1").unwrap();
        let sandbox = Sandbox::new(FakeBrowser::new(FakeBrowserConfig::default()), Some(assignment));
        sandbox.teardown(Some(&pool)).await.unwrap();
        assert_eq!(pool.allocated_count(), 0);
    }
}
