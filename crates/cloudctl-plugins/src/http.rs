//! Shared HTTP client construction and transport error classification

use reqwest::redirect::{Attempt, Policy};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::{NetworkErrorKind, PluginError, PluginResult};

const USER_AGENT: &str = concat!("cloudctl/", env!("CARGO_PKG_VERSION"));

/// Build the client used for index fetches and downloads.
///
/// Proxy settings come from the environment (`HTTP_PROXY`, `HTTPS_PROXY`,
/// `NO_PROXY`). Timeouts are set per request by the callers.
pub fn build_client(max_redirects: usize) -> PluginResult<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(redirect_policy(max_redirects))
        .build()
        .map_err(|e| network_error("<client>", e))
}

fn redirect_policy(max_redirects: usize) -> Policy {
    Policy::custom(move |attempt| check_redirect(attempt, max_redirects))
}

fn check_redirect(attempt: Attempt<'_>, max_redirects: usize) -> reqwest::redirect::Action {
    match redirect_verdict(attempt.previous(), attempt.url(), max_redirects) {
        Ok(()) => {
            debug!(to = %attempt.url(), hops = attempt.previous().len(), "Following redirect");
            attempt.follow()
        }
        Err(reason) => attempt.error(reason),
    }
}

/// Decide whether a redirect to `next` may be followed after `previous` hops
fn redirect_verdict(previous: &[Url], next: &Url, max_redirects: usize) -> Result<(), String> {
    if previous.len() > max_redirects {
        return Err(format!("too many redirects (limit {})", max_redirects));
    }
    let scheme = next.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(format!("refusing redirect to unsupported scheme '{}'", scheme));
    }
    if scheme == "http" && previous.iter().any(|u| u.scheme() == "https") {
        return Err(format!("refusing redirect from https to plain http ({})", next));
    }
    Ok(())
}

/// Parse an absolute http(s) URL or fail before any network I/O
pub fn parse_http_url(raw: &str) -> PluginResult<Url> {
    let invalid = || {
        PluginError::Usage(format!(
            "{} is not a valid url, please provide a url, e.g. http://your_repo.com",
            raw
        ))
    };
    let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(invalid()),
    }
}

/// Wrap a reqwest failure, tagging connect and timeout failures
pub fn network_error(url: impl Into<String>, err: reqwest::Error) -> PluginError {
    let kind = if err.is_timeout() {
        NetworkErrorKind::Timeout
    } else if err.is_connect() {
        NetworkErrorKind::Connect
    } else if err.is_redirect() {
        NetworkErrorKind::Redirect
    } else {
        NetworkErrorKind::Other
    };
    PluginError::Network {
        url: url.into(),
        kind,
        source: err,
    }
}
