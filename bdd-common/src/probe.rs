//! Single-shot HTTP GET probe for deployed application URLs.
//!
//! A probe performs exactly one GET per call and compares the status code
//! against the expected one. Retrying is composed by the caller via the
//! retry engine. The last-logged status lives in a [`ProbeState`] the caller
//! threads through the loop, so a long poll logs once per status transition
//! instead of once per attempt.

use std::time::Duration;

use tracing::info;
use ureq::Agent;
use ureq::tls::TlsConfig;

/// Default per-call timeout for a single GET.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for one probe attempt. Both variants are retryable from the
/// caller's point of view.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("GET {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("GET {url} returned status {actual}, expected {expected}")]
    UnexpectedStatus {
        url: String,
        expected: u16,
        actual: u16,
    },
}

impl crate::retry::RetryableError for ProbeError {
    fn is_retryable(&self) -> bool {
        // Transport errors and wrong statuses both resolve by waiting.
        true
    }
}

/// Status observed across repeated probes of one URL.
///
/// Purely log-noise suppression: correctness never depends on it.
#[derive(Debug, Default, Clone)]
pub struct ProbeState {
    last_logged: Option<u16>,
}

impl ProbeState {
    /// Record an observed status; returns true when it differs from the last
    /// logged one (i.e. the caller just logged a transition).
    fn observe(&mut self, status: u16) -> bool {
        if self.last_logged == Some(status) {
            false
        } else {
            self.last_logged = Some(status);
            true
        }
    }

    /// The most recently logged status, if any.
    pub fn last_status(&self) -> Option<u16> {
        self.last_logged
    }
}

/// HTTP GET probe with a fixed expected status code.
pub struct UrlProbe {
    agent: Agent,
    expected_status: u16,
}

impl UrlProbe {
    /// Build a probe with the default 30s per-call timeout.
    pub fn new(expected_status: u16, insecure_skip_verify: bool) -> Self {
        Self::with_timeout(expected_status, insecure_skip_verify, DEFAULT_PROBE_TIMEOUT)
    }

    /// Build a probe with an explicit per-call timeout.
    pub fn with_timeout(
        expected_status: u16,
        insecure_skip_verify: bool,
        timeout: Duration,
    ) -> Self {
        let mut config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false);
        if insecure_skip_verify {
            config = config.tls_config(TlsConfig::builder().disable_verification(true).build());
        }
        Self {
            agent: config.build().into(),
            expected_status,
        }
    }

    /// The status code this probe converges on.
    pub fn expected_status(&self) -> u16 {
        self.expected_status
    }

    /// Issue one GET and compare the status code.
    ///
    /// Succeeds silently on an exact match; logs the observed code only when
    /// it differs from the last one recorded in `state`.
    pub fn check(&self, url: &str, state: &mut ProbeState) -> Result<(), ProbeError> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|source| ProbeError::Transport {
                url: url.to_string(),
                source: Box::new(source),
            })?;

        let actual = response.status().as_u16();
        if state.observe(actual) {
            info!(url, status = actual, "probed URL");
        }

        if actual == self.expected_status {
            Ok(())
        } else {
            Err(ProbeError::UnexpectedStatus {
                url: url.to_string(),
                expected: self.expected_status,
                actual,
            })
        }
    }
}
