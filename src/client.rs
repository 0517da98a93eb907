//! http client for producers and viewers talking to a relay

use std::time::Duration;

use serde_json::Value;

use crate::domain::Reading;
use crate::error::TransportError;

#[derive(Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    pub fn data_url(&self) -> String {
        format!("{}/data", self.base_url)
    }

    /// websocket endpoint: http -> ws, https -> wss
    pub fn live_url(&self) -> String {
        let base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.base_url.clone()
        };
        format!("{}/ws", base)
    }

    /// POST /data
    pub async fn submit(&self, body: &Value) -> Result<(), TransportError> {
        let resp = self.http.post(self.data_url()).json(body).send().await?;
        ensure_success(resp).await.map(|_| ())
    }

    /// GET /data
    pub async fn fetch_history(&self) -> Result<Vec<Reading>, TransportError> {
        let resp = self.http.get(self.data_url()).send().await?;
        let resp = ensure_success(resp).await?;
        Ok(resp.json::<Vec<Reading>>().await?)
    }
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(TransportError::Status { status: status.as_u16(), body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = RelayClient::new("http://relay.local:3000/").unwrap();
        assert_eq!(client.data_url(), "http://relay.local:3000/data");
    }

    #[test]
    fn live_url_swaps_scheme() {
        let plain = RelayClient::new("http://relay.local:3000").unwrap();
        assert_eq!(plain.live_url(), "ws://relay.local:3000/ws");

        let tls = RelayClient::new("https://relay.example.org/").unwrap();
        assert_eq!(tls.live_url(), "wss://relay.example.org/ws");
    }
}
