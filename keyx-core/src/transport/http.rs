// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! HTTP transport to a key exchange server.

use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use tracing::debug;
use uuid::Uuid;

use super::{KeyExchangeTransport, TransportError, TransportResult};
use crate::agreement::BackendKind;
use crate::ledger::ExchangeRequestView;
use crate::protocol::{
    ConfirmOrDeclineKeyExchangeRequest, CreateKeyExchangeRequest, CreateKeyExchangeResponse,
    ErrorResponse, GetKeyExchangeRequestsResponse, IDENTITY_HEADER, PARAMETERS_FIELD,
    PARAMETERS_FILE_NAME, ROUTE_PARAMETERS, ROUTE_REQUESTS,
};

/// Connection settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Base URL of the server, e.g. `http://127.0.0.1:8080`.
    pub server_url: String,
    /// Identity sent with every request.
    pub identity: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl HttpTransportConfig {
    pub fn new(server_url: impl Into<String>, identity: impl Into<String>) -> Self {
        HttpTransportConfig {
            server_url: server_url.into(),
            identity: identity.into(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Blocking HTTP client for the key exchange endpoints.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    identity: String,
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Http(e.to_string())
    }
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> TransportResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(format!(
                "keyx/{}",
                option_env!("CARGO_PKG_VERSION").unwrap_or("0.1.0")
            ))
            .build()?;

        Ok(HttpTransport {
            client,
            base_url: config.server_url.trim_end_matches('/').to_string(),
            identity: config.identity,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    fn send(&self, request: RequestBuilder, request_id: Option<Uuid>) -> TransportResult<Response> {
        let response = request.header(IDENTITY_HEADER, &self.identity).send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        debug!(status = status.as_u16(), "Server rejected request");
        let text = response.text().unwrap_or_default();
        match serde_json::from_str::<ErrorResponse>(&text) {
            Ok(body) => Err(body.into_transport_error(request_id)),
            Err(_) if status == StatusCode::UNAUTHORIZED => Err(TransportError::Unauthorized),
            Err(_) => Err(TransportError::Http(format!("{}: {}", status, text))),
        }
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(response: Response) -> TransportResult<T> {
    let text = response.text()?;
    serde_json::from_str(&text).map_err(|e| TransportError::Protocol(e.to_string()))
}

impl KeyExchangeTransport for HttpTransport {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn fetch_parameters(&self) -> TransportResult<Vec<u8>> {
        let response = self.send(self.client.get(self.url(ROUTE_PARAMETERS)), None)?;
        Ok(response.bytes()?.to_vec())
    }

    fn upload_parameters(&self, parameters: &[u8]) -> TransportResult<()> {
        let part = Part::bytes(parameters.to_vec())
            .file_name(PARAMETERS_FILE_NAME)
            .mime_str("text/plain")?;
        let form = Form::new().part(PARAMETERS_FIELD, part);

        self.send(
            self.client.post(self.url(ROUTE_PARAMETERS)).multipart(form),
            None,
        )?;
        Ok(())
    }

    fn list_requests(&self) -> TransportResult<Vec<ExchangeRequestView>> {
        let response = self.send(self.client.get(self.url(ROUTE_REQUESTS)), None)?;
        let body: GetKeyExchangeRequestsResponse = decode_json(response)?;
        Ok(body
            .key_exchange_requests
            .into_iter()
            .map(ExchangeRequestView::from)
            .collect())
    }

    fn create_request(
        &self,
        counterparty_id: &str,
        public_key: &str,
        backend: BackendKind,
    ) -> TransportResult<Uuid> {
        let body = CreateKeyExchangeRequest {
            requested_user_id: counterparty_id.to_string(),
            public_key: public_key.to_string(),
            backend,
        };
        let response = self.send(self.client.post(self.url(ROUTE_REQUESTS)).json(&body), None)?;
        let created: CreateKeyExchangeResponse = decode_json(response)?;
        Ok(created.request_id)
    }

    fn confirm_or_decline(
        &self,
        request_id: Uuid,
        confirmed: bool,
        public_key: Option<&str>,
    ) -> TransportResult<()> {
        let body = ConfirmOrDeclineKeyExchangeRequest {
            request_id,
            confirmed,
            public_key: public_key.map(str::to_string),
        };
        self.send(
            self.client.delete(self.url(ROUTE_REQUESTS)).json(&body),
            Some(request_id),
        )?;
        Ok(())
    }
}
