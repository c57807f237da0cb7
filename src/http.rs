use reqwest::{Client, redirect};
use std::time::Duration;

const MAX_REDIRECTS: usize = 20;

/// Shared builder for outbound HTTP clients. Redirects are followed and every
/// request carries `user_agent`.
pub fn build_client(timeout: Duration, user_agent: &str) -> Client {
    let connect = std::env::var("HTTP_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(5);
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(connect).min(timeout))
        .user_agent(user_agent)
        .redirect(redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .unwrap_or_else(|_| Client::new())
}
