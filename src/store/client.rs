//! Retrying HTTP Client
//!
//! Shared by every HTTP-backed interface implementation (rank store, object
//! store, invoker, coordinator). Retries transient transport failures with
//! exponential backoff plus jitter; HTTP status handling stays with the
//! caller, because "404" means different things to different endpoints.

use anyhow::Result;
use std::time::Duration;

pub struct RetryingClient {
    http: reqwest::Client,
    attempts: usize,
    timeout: Duration,
}

impl RetryingClient {
    pub fn new() -> Self {
        Self::with_policy(3, Duration::from_millis(500))
    }

    pub fn with_policy(attempts: usize, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            attempts,
            timeout,
        }
    }

    /// Number of attempts each operation makes before giving up.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub async fn post_json<T: serde::Serialize>(
        &self,
        url: &str,
        payload: &T,
    ) -> Result<reqwest::Response> {
        let mut delay_ms = 150u64;

        for attempt in 0..self.attempts {
            let response = self
                .http
                .post(url)
                .json(payload)
                .timeout(self.timeout)
                .send()
                .await;

            match response {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt + 1 == self.attempts {
                        return Err(anyhow::anyhow!(e));
                    }
                    // Simple jitter to prevent thundering herd
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(anyhow::anyhow!("Retry attempts exhausted"))
    }

    pub async fn put_bytes(&self, url: &str, body: Vec<u8>) -> Result<reqwest::Response> {
        let mut delay_ms = 150u64;

        for attempt in 0..self.attempts {
            let response = self
                .http
                .put(url)
                .body(body.clone())
                .timeout(self.timeout)
                .send()
                .await;

            match response {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt + 1 == self.attempts {
                        return Err(anyhow::anyhow!(e));
                    }
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(anyhow::anyhow!("Retry attempts exhausted"))
    }

    pub async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let mut delay_ms = 150u64;

        for attempt in 0..self.attempts {
            let response = self.http.get(url).timeout(self.timeout).send().await;

            match response {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt + 1 == self.attempts {
                        return Err(anyhow::anyhow!(e));
                    }
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(anyhow::anyhow!("Retry attempts exhausted"))
    }
}

impl Default for RetryingClient {
    fn default() -> Self {
        Self::new()
    }
}
