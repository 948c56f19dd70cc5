// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Wire Protocol
//!
//! JSON bodies exchanged between clients and the key exchange server.
//! Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agreement::BackendKind;
use crate::ledger::{Actor, ExchangeRequest, ExchangeRequestView, LedgerError, RequestStatus};
use crate::registry::RegistryError;
use crate::transport::TransportError;

/// Parameter upload and download.
pub const ROUTE_PARAMETERS: &str = "/key-exchange/openssl-parameters";
/// Exchange request listing, creation and answering.
pub const ROUTE_REQUESTS: &str = "/key-exchange/cng-key-exchange-requests";
pub const ROUTE_HEALTH: &str = "/health";
pub const ROUTE_METRICS: &str = "/metrics";

/// Header carrying the identity resolved by upstream authentication.
pub const IDENTITY_HEADER: &str = "x-authenticated-user";

/// Multipart field holding an uploaded parameter file.
pub const PARAMETERS_FIELD: &str = "file";
/// File name offered when downloading parameters.
pub const PARAMETERS_FILE_NAME: &str = "dh_parameters.pem";

pub const SUCCESS_MESSAGE: &str = "Success";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyExchangeRequest {
    pub requested_user_id: String,
    pub public_key: String,
    /// Clients that predate the field only ever spoke ECDH.
    #[serde(default)]
    pub backend: BackendKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyExchangeResponse {
    pub success: bool,
    pub message: String,
    pub request_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmOrDeclineKeyExchangeRequest {
    pub request_id: Uuid,
    pub confirmed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

/// A request as listed for one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyExchangeRequestDto {
    pub request_id: Uuid,
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(default)]
    pub backend: BackendKind,
    pub sender_public_key: String,
    #[serde(default)]
    pub receiver_public_key: Option<String>,
    pub status: RequestStatus,
    pub actor: Actor,
    pub created_at: u64,
}

impl From<ExchangeRequestView> for KeyExchangeRequestDto {
    fn from(view: ExchangeRequestView) -> Self {
        let ExchangeRequestView { actor, request } = view;
        KeyExchangeRequestDto {
            request_id: request.id,
            sender_id: request.sender_id,
            receiver_id: request.receiver_id,
            backend: request.backend,
            sender_public_key: request.sender_public_key,
            receiver_public_key: request.receiver_public_key,
            status: request.status,
            actor,
            created_at: request.created_at,
        }
    }
}

impl From<KeyExchangeRequestDto> for ExchangeRequestView {
    fn from(dto: KeyExchangeRequestDto) -> Self {
        ExchangeRequestView {
            actor: dto.actor,
            request: ExchangeRequest {
                id: dto.request_id,
                sender_id: dto.sender_id,
                receiver_id: dto.receiver_id,
                backend: dto.backend,
                sender_public_key: dto.sender_public_key,
                receiver_public_key: dto.receiver_public_key,
                status: dto.status,
                created_at: dto.created_at,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetKeyExchangeRequestsResponse {
    pub success: bool,
    pub key_exchange_requests: Vec<KeyExchangeRequestDto>,
}

/// Body of plain success responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBase {
    pub success: bool,
    pub message: String,
}

impl ResponseBase {
    pub fn ok() -> Self {
        ResponseBase {
            success: true,
            message: SUCCESS_MESSAGE.to_string(),
        }
    }
}

/// Machine-readable failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    KeyExchangeRequestAlreadyExists,
    KeyExchangeRequestNotFound,
    KeyExchangeRequestNotPending,
    DhParameterNotFound,
    MalformedParameters,
    /// Request body that is not the expected JSON.
    MalformedRequest,
    MissingPublicKey,
    SelfExchange,
    Unauthorized,
    InternalError,
}

impl ErrorCode {
    /// HTTP status for this code.
    pub fn status(&self) -> u16 {
        match self {
            ErrorCode::KeyExchangeRequestAlreadyExists
            | ErrorCode::KeyExchangeRequestNotFound
            | ErrorCode::KeyExchangeRequestNotPending
            | ErrorCode::DhParameterNotFound => 409,
            ErrorCode::MalformedParameters
            | ErrorCode::MalformedRequest
            | ErrorCode::MissingPublicKey
            | ErrorCode::SelfExchange => 400,
            ErrorCode::Unauthorized => 401,
            ErrorCode::InternalError => 500,
        }
    }
}

impl From<&LedgerError> for ErrorCode {
    fn from(err: &LedgerError) -> Self {
        match err {
            LedgerError::AlreadyExists => ErrorCode::KeyExchangeRequestAlreadyExists,
            LedgerError::NotFound(_) => ErrorCode::KeyExchangeRequestNotFound,
            LedgerError::NotPending(_) => ErrorCode::KeyExchangeRequestNotPending,
            LedgerError::MissingPublicKey => ErrorCode::MissingPublicKey,
            LedgerError::SelfExchange => ErrorCode::SelfExchange,
            LedgerError::Storage(_) => ErrorCode::InternalError,
        }
    }
}

impl From<&RegistryError> for ErrorCode {
    fn from(err: &RegistryError) -> Self {
        match err {
            RegistryError::NotFound => ErrorCode::DhParameterNotFound,
            RegistryError::MalformedParameters(_) => ErrorCode::MalformedParameters,
            RegistryError::Storage(_) => ErrorCode::InternalError,
        }
    }
}

/// Body of every failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error_message: ErrorCode,
    pub error_details: String,
    pub status_code: u16,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, details: impl Into<String>) -> Self {
        ErrorResponse {
            success: false,
            error_message: code,
            error_details: details.into(),
            status_code: code.status(),
        }
    }

    /// Rebuilds the typed error a server reported.
    ///
    /// `request_id` fills in the id for request-scoped codes, since the body
    /// carries it only in the human-readable details.
    pub fn into_transport_error(self, request_id: Option<Uuid>) -> TransportError {
        let id = request_id.unwrap_or_else(Uuid::nil);
        match self.error_message {
            ErrorCode::KeyExchangeRequestAlreadyExists => LedgerError::AlreadyExists.into(),
            ErrorCode::KeyExchangeRequestNotFound => LedgerError::NotFound(id).into(),
            ErrorCode::KeyExchangeRequestNotPending => LedgerError::NotPending(id).into(),
            ErrorCode::MissingPublicKey => LedgerError::MissingPublicKey.into(),
            ErrorCode::SelfExchange => LedgerError::SelfExchange.into(),
            ErrorCode::DhParameterNotFound => RegistryError::NotFound.into(),
            ErrorCode::MalformedParameters => {
                RegistryError::MalformedParameters(self.error_details).into()
            }
            ErrorCode::MalformedRequest => TransportError::Protocol(self.error_details),
            ErrorCode::Unauthorized => TransportError::Unauthorized,
            ErrorCode::InternalError => TransportError::Http(self.error_details),
        }
    }
}

impl From<&LedgerError> for ErrorResponse {
    fn from(err: &LedgerError) -> Self {
        ErrorResponse::new(ErrorCode::from(err), err.to_string())
    }
}

impl From<&RegistryError> for ErrorResponse {
    fn from(err: &RegistryError) -> Self {
        ErrorResponse::new(ErrorCode::from(err), err.to_string())
    }
}
