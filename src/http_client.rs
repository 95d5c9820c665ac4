use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use tracing::{debug, warn};

use crate::config::HttpConfig;
use crate::error::FetchError;

/// Exponential backoff applied to timeouts only. Other failures return immediately.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub tries: u32,
    pub initial_delay: Duration,
    pub backoff: u32,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            tries: 4,
            initial_delay: Duration::from_secs(2),
            backoff: 2,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            tries: config.retry_tries.max(1),
            initial_delay: Duration::from_secs(config.retry_delay_secs),
            backoff: config.retry_backoff.max(1),
            jitter: true,
        }
    }

    /// No waiting between attempts.
    pub fn immediate(tries: u32) -> Self {
        Self {
            tries: tries.max(1),
            initial_delay: Duration::ZERO,
            backoff: 1,
            jitter: false,
        }
    }

    /// Wait before retry number `attempt` (0 based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff.saturating_pow(attempt);
        let base = self.initial_delay.saturating_mul(factor);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let jitter = rand::thread_rng().gen_range(0.75..=1.25);
        base.mul_f64(jitter)
    }
}

/// Runs `attempt` until it succeeds, fails with a non-timeout error, or the tries run out.
pub fn retry_on_timeout<T>(
    policy: &RetryPolicy,
    url: &str,
    mut attempt: impl FnMut() -> Result<T, FetchError>,
) -> Result<T, FetchError> {
    for idx in 0..policy.tries {
        match attempt() {
            Err(err) if err.is_timeout() => {
                if idx + 1 < policy.tries {
                    let delay = policy.delay_for(idx);
                    debug!(url, attempt = idx + 1, ?delay, "request timed out, retrying");
                    thread::sleep(delay);
                }
            }
            other => return other,
        }
    }
    warn!(url, tries = policy.tries, "giving up after repeated timeouts");
    Err(FetchError::Timeout {
        url: url.to_string(),
        attempts: policy.tries,
    })
}

/// Blocking HTTP client shared by the site clients of one run.
#[derive(Debug, Clone)]
pub struct SourceClient {
    client: Client,
    user_agent: String,
    retry: RetryPolicy,
}

impl SourceClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
            retry: RetryPolicy::from_config(config),
        })
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn get_text(&self, url: &str) -> Result<String, FetchError> {
        retry_on_timeout(&self.retry, url, || self.get_once(url))
    }

    fn get_once(&self, url: &str) -> Result<String, FetchError> {
        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .map_err(|err| classify(url, err))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        resp.text().map_err(|err| classify(url, err))
    }
}

fn classify(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
            attempts: 1,
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}
