//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! HTTP request/response primitive used by [`HttpBroker`](super::HttpBroker).

use crate::transport::TransportError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// The two HTTP exchanges a broker performs.
///
/// Implementations treat any non-2xx status as an error. Abstracting the
/// client lets tests script exchanges without a network.
#[async_trait]
pub trait HttpExchange: Send + Sync + 'static {
    /// POSTs one serialized message.
    async fn post(
        &self,
        url: &str,
        content_type: &'static str,
        body: Vec<u8>,
    ) -> Result<(), TransportError>;

    /// GETs one batch of serialized messages.
    async fn get(&self, url: &str) -> Result<Vec<u8>, TransportError>;
}

/// [`HttpExchange`] backed by `reqwest`.
///
/// TLS and authentication are whatever the wrapped client is configured
/// with.
#[derive(Clone, Debug)]
pub struct ReqwestExchange {
    client: reqwest::Client,
}

impl ReqwestExchange {
    /// Creates an exchange whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidConfiguration`] if the client cannot
    /// be built.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| TransportError::InvalidConfiguration {
                reason: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpExchange for ReqwestExchange {
    async fn post(
        &self,
        url: &str,
        content_type: &'static str,
        body: Vec<u8>,
    ) -> Result<(), TransportError> {
        trace!(url, bytes = body.len(), "HTTP POST starting");
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                warn!(
                    url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "HTTP POST failed"
                );
                TransportError::request_failed("POST", url, e)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                method: "POST",
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        debug!(url, status = status.as_u16(), "HTTP POST delivered");
        Ok(())
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        trace!(url, "HTTP GET starting");
        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(
                url,
                error = %e,
                is_connect = e.is_connect(),
                is_timeout = e.is_timeout(),
                "HTTP GET failed"
            );
            TransportError::request_failed("GET", url, e)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                method: "GET",
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::request_failed("GET", url, e))?;
        trace!(url, bytes = bytes.len(), "HTTP GET body read");
        Ok(bytes.to_vec())
    }
}
