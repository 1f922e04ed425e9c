// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::Result;
use crate::models::ManifestConfig;

/// Create the client used for partner manifest lookups.
///
/// The client-level timeout is a backstop; each lookup is additionally
/// bounded by the resolver's per-call budget.
pub fn create_async_client(config: &ManifestConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_millis(config.timeout_ms.saturating_mul(4)))
        .build()?;
    Ok(client)
}
