// ABOUTME: Pooled reqwest client shared by every AI vendor client in the process
// ABOUTME: Transport ceiling is derived from the generation attempt timeout at startup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use reqwest::{Client, ClientBuilder};
use std::sync::OnceLock;
use std::time::Duration;

/// Headroom above the attempt deadline so the executor's timeout fires first
const TRANSPORT_HEADROOM: Duration = Duration::from_secs(5);

/// Transport settings for the shared client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpClientSettings {
    /// Whole-request ceiling enforced by reqwest
    pub request_timeout: Duration,
    /// TCP and TLS connect deadline
    pub connect_timeout: Duration,
    /// Idle pooled connections kept per vendor host
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpClientSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(10),
            pool_max_idle_per_host: 8,
        }
    }
}

impl HttpClientSettings {
    /// Settings whose transport ceiling sits just above `attempt_timeout`
    #[must_use]
    pub fn for_attempt_timeout(attempt_timeout: Duration) -> Self {
        Self {
            request_timeout: attempt_timeout.saturating_add(TRANSPORT_HEADROOM),
            ..Self::default()
        }
    }
}

static SETTINGS: OnceLock<HttpClientSettings> = OnceLock::new();
static SHARED_CLIENT: OnceLock<Client> = OnceLock::new();

/// Fix the shared client settings
///
/// Only the first call has an effect, and only if no vendor client was
/// built before it. Returns whether these settings were applied.
pub fn configure_shared_client(settings: HttpClientSettings) -> bool {
    SHARED_CLIENT.get().is_none() && SETTINGS.set(settings).is_ok()
}

/// The process-wide vendor HTTP client
pub fn shared_client() -> &'static Client {
    SHARED_CLIENT.get_or_init(|| {
        let settings = SETTINGS.get().copied().unwrap_or_default();
        ClientBuilder::new()
            .timeout(settings.request_timeout)
            .connect_timeout(settings.connect_timeout)
            .pool_max_idle_per_host(settings.pool_max_idle_per_host)
            .build()
            .unwrap_or_else(|_| Client::new())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_ceiling_tracks_attempt_timeout() {
        let settings = HttpClientSettings::for_attempt_timeout(Duration::from_secs(60));
        assert_eq!(settings.request_timeout, Duration::from_secs(65));
        assert_eq!(
            settings.connect_timeout,
            HttpClientSettings::default().connect_timeout
        );
    }
}
