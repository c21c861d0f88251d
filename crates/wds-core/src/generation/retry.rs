//! Bounded retry with exponential backoff and jitter.

use std::time::Duration;

use rand::Rng;

use super::TextGenerator;
use crate::error::GenerationError;

/// When and how often a failed generation is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Base delay before the first retry; doubled for each further retry.
    pub initial_delay: Duration,
    /// Cap on the delay, jitter included.
    pub max_delay: Duration,
    /// Upper bound of the uniform random jitter added to each delay.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Policy with the same attempt cap and no waiting.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Delay to wait after the given failed attempt (1-indexed).
    pub fn delay_after<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let base = self
            .initial_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay);
        let jitter = if self.jitter.is_zero() {
            Duration::ZERO
        } else {
            let millis = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
            Duration::from_millis(rng.random_range(0..=millis))
        };
        base.saturating_add(jitter).min(self.max_delay)
    }
}

type Sleeper = Box<dyn Fn(Duration) + Send + Sync>;

/// Wraps a [`TextGenerator`] with the retry policy.
///
/// A failure is retried only when it carries the transient-overload
/// signature (see [`GenerationError::is_transient`]); any other failure is
/// returned after the first attempt. After the last attempt the final error
/// is returned unchanged.
pub struct RetryingGenerator<G> {
    inner: G,
    policy: RetryPolicy,
    sleep: Sleeper,
}

impl<G: TextGenerator> RetryingGenerator<G> {
    /// Wrap `inner` with the default policy (5 attempts, 1 s to 10 s).
    pub fn new(inner: G) -> Self {
        Self::with_policy(inner, RetryPolicy::default())
    }

    /// Wrap `inner` with a custom policy.
    pub fn with_policy(inner: G, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            sleep: Box::new(std::thread::sleep),
        }
    }

    /// Replace the sleep function (tests record the delays instead).
    #[must_use]
    pub fn with_sleeper(mut self, sleep: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    /// The active policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The wrapped generator.
    pub fn inner(&self) -> &G {
        &self.inner
    }
}

impl<G: TextGenerator> TextGenerator for RetryingGenerator<G> {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let mut rng = rand::rng();
        let mut attempt = 1;
        loop {
            tracing::debug!(attempt, prompt_chars = prompt.chars().count(), "querying model");
            match self.inner.generate(prompt) {
                Ok(text) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "generation succeeded after retry");
                    }
                    return Ok(text);
                }
                Err(err) if err.is_transient() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_after(attempt, &mut rng);
                    tracing::warn!(
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient generation failure, retrying"
                    );
                    (self.sleep)(delay);
                    attempt += 1;
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "generation failed");
                    return Err(err);
                }
            }
        }
    }
}

impl<G> std::fmt::Debug for RetryingGenerator<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingGenerator")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
