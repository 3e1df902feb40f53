use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::PeerRpc;
use super::protocol::{ENDPOINT_LOGIN, ENDPOINT_QUERY, ENDPOINT_SEARCH};
use crate::directory::types::{LoginRequest, LoginResponse, PeerAddress};
use crate::error::{OverlayError, OverlayResult};
use crate::search::types::{FileHit, QueryRequest, SearchResponse, StartSearchRequest};

const LOGIN_ATTEMPTS: usize = 3;

/// JSON-over-HTTP client for the control plane.
pub struct HttpPeerRpc {
    http_client: reqwest::Client,
    timeout: Duration,
}

impl HttpPeerRpc {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            timeout,
        }
    }

    fn url(target: &PeerAddress, endpoint: &str) -> String {
        format!("http://{}{}", target, endpoint)
    }

    async fn post_with_retry<T: Serialize, R: DeserializeOwned>(
        &self,
        target: &PeerAddress,
        endpoint: &str,
        payload: &T,
        attempts: usize,
    ) -> OverlayResult<R> {
        let url = Self::url(target, endpoint);
        let mut delay_ms = 150u64;

        for attempt in 0..attempts {
            let response = self
                .http_client
                .post(url.clone())
                .json(payload)
                .timeout(self.timeout)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    if !resp.status().is_success() {
                        return Err(OverlayError::Protocol(format!(
                            "{} answered {} on {}",
                            target,
                            resp.status(),
                            endpoint
                        )));
                    }
                    return resp
                        .json::<R>()
                        .await
                        .map_err(|e| OverlayError::Protocol(e.to_string()));
                }
                Err(e) => {
                    if attempt + 1 == attempts {
                        return Err(OverlayError::unreachable(target, e));
                    }
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(OverlayError::unreachable(target, "retry attempts exhausted"))
    }
}

fn hits_from(target: &PeerAddress, response: SearchResponse) -> OverlayResult<Vec<FileHit>> {
    if !response.success {
        return Err(OverlayError::Protocol(format!(
            "{} rejected search: {}",
            target,
            response.error.unwrap_or_default()
        )));
    }
    Ok(response.results)
}

#[async_trait]
impl PeerRpc for HttpPeerRpc {
    async fn login(
        &self,
        target: &PeerAddress,
        me: &PeerAddress,
    ) -> OverlayResult<Vec<PeerAddress>> {
        let payload = LoginRequest {
            address: me.to_string(),
        };
        let response: LoginResponse = self
            .post_with_retry(target, ENDPOINT_LOGIN, &payload, LOGIN_ATTEMPTS)
            .await?;

        if !response.success {
            return Err(OverlayError::Protocol(format!(
                "{} rejected login: {}",
                target,
                response.error.unwrap_or_default()
            )));
        }
        Ok(response.dl)
    }

    async fn query(
        &self,
        target: &PeerAddress,
        request: &QueryRequest,
    ) -> OverlayResult<Vec<FileHit>> {
        let response: SearchResponse = self
            .post_with_retry(target, ENDPOINT_QUERY, request, 1)
            .await?;
        hits_from(target, response)
    }

    async fn start_search(
        &self,
        target: &PeerAddress,
        filename: &str,
        ttl: u32,
    ) -> OverlayResult<Vec<FileHit>> {
        let payload = StartSearchRequest {
            filename: filename.to_string(),
            ttl: Some(ttl),
        };
        let response: SearchResponse = self
            .post_with_retry(target, ENDPOINT_SEARCH, &payload, 1)
            .await?;
        hits_from(target, response)
    }
}
