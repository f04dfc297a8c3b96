//! Single-URL availability checks with bounded retries.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect, Client, StatusCode, Url};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_USER_AGENT: &str = "WebsiteMonitorBot/1.0";

const MAX_REDIRECTS: usize = 10;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Invalid probe policy: {0}")]
    InvalidPolicy(String),
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Timeout and retry settings shared by every probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbePolicy {
    /// Per-attempt deadline, covering connect, TLS and response headers.
    pub timeout: Duration,
    pub max_attempts: u32,
    /// Fixed pause between attempts that failed at the transport level.
    pub attempt_delay: Duration,
    pub user_agent: String,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_attempts: 2,
            attempt_delay: Duration::from_secs(1),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Result of one probe: the availability verdict plus diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub available: bool,
    /// Number of HTTP attempts actually made.
    pub attempts: u32,
    /// Final status code, if any response was received.
    pub status: Option<u16>,
    pub detail: String,
}

/// Success and redirect ranges both count as up.
pub fn is_available_status(status: StatusCode) -> bool {
    (200..400).contains(&status.as_u16())
}

/// Anything able to check a URL. The batch and the admin refresh both go
/// through this trait so tests can substitute a scripted prober.
#[async_trait]
pub trait SiteProbe: Send + Sync {
    /// Network failures are reported as `available: false`, never as `Err`.
    /// `Err` is reserved for inputs that can never succeed.
    async fn probe(&self, url: &str) -> Result<ProbeOutcome, ProbeError>;
}

/// HTTP GET prober backed by a shared `reqwest` client.
pub struct Prober {
    client: Client,
    policy: ProbePolicy,
}

impl Prober {
    pub fn new(policy: ProbePolicy) -> Result<Self, ProbeError> {
        if policy.max_attempts == 0 {
            return Err(ProbeError::InvalidPolicy(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if policy.timeout.is_zero() {
            return Err(ProbeError::InvalidPolicy(
                "timeout must be greater than zero".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(policy.timeout)
            .user_agent(policy.user_agent.clone())
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| ProbeError::InvalidPolicy(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, policy })
    }

    pub fn policy(&self) -> &ProbePolicy {
        &self.policy
    }
}

fn parse_target(url: &str) -> Result<Url, ProbeError> {
    let parsed = Url::parse(url).map_err(|e| ProbeError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ProbeError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Error: Request timed out".to_string()
    } else if error.is_connect() {
        format!("Error: Connection failed ({error})")
    } else if error.is_redirect() {
        format!("Error: Too many redirects ({error})")
    } else {
        format!("Error: {error}")
    }
}

#[async_trait]
impl SiteProbe for Prober {
    async fn probe(&self, url: &str) -> Result<ProbeOutcome, ProbeError> {
        let target = parse_target(url)?;
        let max_attempts = self.policy.max_attempts;
        let mut last_error = String::new();
        let mut attempts = 0;

        for attempt in 1..=max_attempts {
            attempts = attempt;
            match self.client.get(target.clone()).send().await {
                Ok(response) => {
                    let status = response.status();
                    let available = is_available_status(status);
                    debug!(url, attempt, status = status.as_u16(), available, "Probe received response.");
                    return Ok(ProbeOutcome {
                        available,
                        attempts: attempt,
                        status: Some(status.as_u16()),
                        detail: status.to_string(),
                    });
                }
                Err(e) => {
                    last_error = describe_transport_error(&e);
                    warn!(url, attempt, max_attempts, error = %last_error, "Probe attempt failed.");
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.policy.attempt_delay).await;
            }
        }

        Ok(ProbeOutcome {
            available: false,
            attempts,
            status: None,
            detail: last_error,
        })
    }
}
