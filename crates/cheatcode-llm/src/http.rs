//! Shared HTTP client construction.

use std::time::Duration;

use crate::error::Result;

/// Create the HTTP client used by all providers.
///
/// 30s connect timeout, `request_timeout` for the whole request, rustls TLS,
/// `cheatcode/{version}` user-agent, redirect limit 10.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn default_client(request_timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .timeout(request_timeout)
        .user_agent(concat!("cheatcode/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()?;
    Ok(client)
}
