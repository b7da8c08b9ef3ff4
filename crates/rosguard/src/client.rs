use std::future::Future;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::RouterEntry;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("router returned {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("unauthorized (401): check router credentials")]
    Unauthorized,

    #[error("not found (404): {path}")]
    NotFound { path: String },
}

/// Raw access to the RouterOS REST tree. Paths are relative to `/rest/`.
pub trait RouterClient {
    fn get(&self, path: &str) -> impl Future<Output = Result<String, ClientError>> + Send;
    fn put(&self, path: &str, body: String)
        -> impl Future<Output = Result<(), ClientError>> + Send;
    fn patch(&self, path: &str, body: String)
        -> impl Future<Output = Result<(), ClientError>> + Send;
    fn delete(&self, path: &str) -> impl Future<Output = Result<(), ClientError>> + Send;
}

/// Build the REST root for a router, leaving out the port when it is the
/// scheme default.
pub fn base_url(host: &str, port: u16, tls: bool) -> String {
    let scheme = if tls { "https" } else { "http" };
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    };
    match (tls, port) {
        (true, 443) | (false, 80) => format!("{scheme}://{host}/rest"),
        _ => format!("{scheme}://{host}:{port}/rest"),
    }
}

/// `RouterClient` over HTTP(S) with basic auth.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    base_url: String,
    username: String,
    password: Option<String>,
}

impl RestClient {
    pub fn new(entry: &RouterEntry) -> Result<Self, ClientError> {
        let http = Client::builder()
            .danger_accept_invalid_certs(entry.accept_invalid_certs)
            .build()?;
        let base_url = base_url(&entry.host, entry.port, entry.tls);
        debug!(base_url = %base_url, username = %entry.username, "created REST client");
        Ok(Self {
            http,
            base_url,
            username: entry.username.clone(),
            password: entry.password.clone(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    #[tracing::instrument(skip(self, body))]
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<String, ClientError> {
        let url = self.url(path);
        debug!(url = %url, "sending request to router");

        let mut req = self
            .http
            .request(method, &url)
            .basic_auth(&self.username, self.password.as_deref());
        if let Some(body) = body {
            req = req.header(CONTENT_TYPE, "application/json").body(body);
        }
        let resp = req.send().await?;

        let status = resp.status().as_u16();
        debug!(status, "received router response");

        match status {
            200..=299 => Ok(resp.text().await?),
            401 => {
                warn!("router returned 401, credentials rejected");
                Err(ClientError::Unauthorized)
            }
            404 => {
                warn!(path, "router returned 404");
                Err(ClientError::NotFound {
                    path: path.to_string(),
                })
            }
            _ => {
                let body = resp.text().await.unwrap_or_default();
                warn!(status, body = %body, "router returned unexpected status");
                Err(ClientError::ServerError { status, body })
            }
        }
    }
}

impl RouterClient for RestClient {
    async fn get(&self, path: &str) -> Result<String, ClientError> {
        self.send(Method::GET, path, None).await
    }

    async fn put(&self, path: &str, body: String) -> Result<(), ClientError> {
        self.send(Method::PUT, path, Some(body)).await.map(drop)
    }

    async fn patch(&self, path: &str, body: String) -> Result<(), ClientError> {
        self.send(Method::PATCH, path, Some(body)).await.map(drop)
    }

    async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.send(Method::DELETE, path, None).await.map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("router.lan", 443, true, "https://router.lan/rest"; "default https")]
    #[test_case("router.lan", 80, false, "http://router.lan/rest"; "default http")]
    #[test_case("router.lan", 8443, true, "https://router.lan:8443/rest"; "custom https")]
    #[test_case("10.0.0.1", 443, false, "http://10.0.0.1:443/rest"; "https port over http")]
    #[test_case("fe80::1", 443, true, "https://[fe80::1]/rest"; "ipv6 literal")]
    #[test_case("2001:db8::1", 8729, true, "https://[2001:db8::1]:8729/rest"; "ipv6 literal with port")]
    #[test_case("[fe80::1]", 80, false, "http://[fe80::1]/rest"; "already bracketed")]
    fn builds_base_url(host: &str, port: u16, tls: bool, expected: &str) {
        assert_eq!(base_url(host, port, tls), expected);
    }

    #[test]
    fn joins_paths() {
        let entry = RouterEntry {
            host: "router.lan".into(),
            port: 443,
            tls: true,
            username: "admin".into(),
            password: None,
            accept_invalid_certs: false,
        };
        let client = RestClient::new(&entry).unwrap();
        assert_eq!(
            client.url("/interface/wireguard"),
            "https://router.lan/rest/interface/wireguard"
        );
        assert_eq!(
            client.url("ip/address/*3"),
            "https://router.lan/rest/ip/address/*3"
        );
    }
}
