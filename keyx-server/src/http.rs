//! HTTP API
//!
//! Key exchange endpoints plus health and metrics. Every key exchange
//! endpoint requires the caller's identity in the `x-authenticated-user`
//! header, set by the authenticating proxy in front of this server.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use keyx_core::protocol::{
    ConfirmOrDeclineKeyExchangeRequest, CreateKeyExchangeRequest, CreateKeyExchangeResponse,
    ErrorCode, ErrorResponse, GetKeyExchangeRequestsResponse, ResponseBase, IDENTITY_HEADER,
    PARAMETERS_FIELD, PARAMETERS_FILE_NAME, ROUTE_HEALTH, ROUTE_METRICS, ROUTE_PARAMETERS,
    ROUTE_REQUESTS, SUCCESS_MESSAGE,
};
use keyx_core::{Ledger, LedgerError, ParameterRegistry, RegistryError};

use crate::metrics::ServerMetrics;

/// Room for multipart framing around the parameter file itself.
const MULTIPART_OVERHEAD: usize = 16 * 1024;

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn Ledger>,
    pub registry: Arc<dyn ParameterRegistry>,
    pub metrics: ServerMetrics,
    pub start_time: Instant,
    pub max_parameters_bytes: usize,
}

impl AppState {
    /// Counts and logs a failed call.
    fn rejected(&self, err: impl Into<ApiError>) -> ApiError {
        let err = err.into();
        let body = err.body();
        let code = format!("{:?}", body.error_message);
        self.metrics
            .rejected_calls
            .with_label_values(&[code.as_str()])
            .inc();
        warn!(code = ?body.error_message, "Rejected call: {}", body.error_details);
        err
    }
}

/// Identity of the authenticated caller.
#[derive(Debug, Clone)]
pub struct Identity(pub String);

/// Handler failure, rendered as an `ErrorResponse` body.
#[derive(Debug)]
pub enum ApiError {
    Ledger(LedgerError),
    Registry(RegistryError),
    /// Body the `Json` extractor could not accept.
    MalformedRequest(String),
    Unauthorized,
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        ApiError::Ledger(e)
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        ApiError::Registry(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::MalformedRequest(e.body_text())
    }
}

impl ApiError {
    fn body(&self) -> ErrorResponse {
        match self {
            ApiError::Ledger(e) => ErrorResponse::from(e),
            ApiError::Registry(e) => ErrorResponse::from(e),
            ApiError::MalformedRequest(details) => {
                ErrorResponse::new(ErrorCode::MalformedRequest, details.clone())
            }
            ApiError::Unauthorized => ErrorResponse::new(
                ErrorCode::Unauthorized,
                format!("missing {} header", IDENTITY_HEADER),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = self.body();
        let status =
            StatusCode::from_u16(body.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(body)).into_response()
    }
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

/// Rejects key exchange calls that carry no identity.
async fn require_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = request
        .headers()
        .get(IDENTITY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    match identity {
        Some(identity) => {
            request.extensions_mut().insert(Identity(identity));
            next.run(request).await
        }
        None => state.rejected(ApiError::Unauthorized).into_response(),
    }
}

/// Creates the HTTP router.
pub fn create_router(state: AppState) -> Router {
    let upload_limit = state.max_parameters_bytes + MULTIPART_OVERHEAD;

    let key_exchange = Router::new()
        .route(
            ROUTE_PARAMETERS,
            get(download_parameters)
                .post(upload_parameters)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            ROUTE_REQUESTS,
            get(list_requests)
                .post(create_request)
                .delete(answer_request),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_identity,
        ));

    Router::new()
        .route(ROUTE_HEALTH, get(health_handler))
        .route(ROUTE_METRICS, get(metrics_handler))
        .merge(key_exchange)
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn upload_parameters(
    State(state): State<AppState>,
    Extension(Identity(user)): Extension<Identity>,
    mut multipart: Multipart,
) -> Result<Json<ResponseBase>, ApiError> {
    let malformed = |details: String| state.rejected(RegistryError::MalformedParameters(details));

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| malformed(e.to_string()))?
    {
        if field.name() == Some(PARAMETERS_FIELD) {
            upload = Some(field.bytes().await.map_err(|e| malformed(e.to_string()))?);
            break;
        }
    }

    let bytes = upload
        .ok_or_else(|| malformed(format!("missing multipart field '{}'", PARAMETERS_FIELD)))?;
    if bytes.len() > state.max_parameters_bytes {
        return Err(malformed(format!(
            "upload of {} bytes exceeds limit of {}",
            bytes.len(),
            state.max_parameters_bytes
        )));
    }

    let id = state
        .registry
        .submit_parameters(&bytes)
        .map_err(|e| state.rejected(e))?;
    state.metrics.parameters_submitted.inc();
    info!(%user, id, "Diffie-Hellman parameters submitted");

    Ok(Json(ResponseBase::ok()))
}

async fn download_parameters(
    State(state): State<AppState>,
    Extension(Identity(user)): Extension<Identity>,
) -> Result<Response, ApiError> {
    let latest = state
        .registry
        .latest_parameters()
        .map_err(|e| state.rejected(e))?;
    debug!(%user, id = latest.id, "Serving Diffie-Hellman parameters");

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", PARAMETERS_FILE_NAME),
            ),
        ],
        latest.parameters,
    )
        .into_response())
}

async fn list_requests(
    State(state): State<AppState>,
    Extension(Identity(user)): Extension<Identity>,
) -> Result<Json<GetKeyExchangeRequestsResponse>, ApiError> {
    let views = state
        .ledger
        .list_for(&user)
        .map_err(|e| state.rejected(e))?;

    Ok(Json(GetKeyExchangeRequestsResponse {
        success: true,
        key_exchange_requests: views.into_iter().map(Into::into).collect(),
    }))
}

async fn create_request(
    State(state): State<AppState>,
    Extension(Identity(user)): Extension<Identity>,
    payload: Result<Json<CreateKeyExchangeRequest>, JsonRejection>,
) -> Result<Json<CreateKeyExchangeResponse>, ApiError> {
    let Json(body) = payload.map_err(|e| state.rejected(e))?;
    let request_id = state
        .ledger
        .create(&user, &body.requested_user_id, &body.public_key, body.backend)
        .map_err(|e| state.rejected(e))?;
    state.metrics.requests_created.inc();
    info!(
        %request_id,
        sender = %user,
        receiver = %body.requested_user_id,
        backend = %body.backend,
        "Key exchange request created"
    );

    Ok(Json(CreateKeyExchangeResponse {
        success: true,
        message: SUCCESS_MESSAGE.to_string(),
        request_id,
    }))
}

async fn answer_request(
    State(state): State<AppState>,
    Extension(Identity(user)): Extension<Identity>,
    payload: Result<Json<ConfirmOrDeclineKeyExchangeRequest>, JsonRejection>,
) -> Result<Json<ResponseBase>, ApiError> {
    let Json(body) = payload.map_err(|e| state.rejected(e))?;
    state
        .ledger
        .confirm_or_decline(
            body.request_id,
            &user,
            body.confirmed,
            body.public_key.as_deref(),
        )
        .map_err(|e| state.rejected(e))?;

    if body.confirmed {
        state.metrics.requests_confirmed.inc();
        info!(request_id = %body.request_id, receiver = %user, "Key exchange request confirmed");
    } else {
        state.metrics.requests_declined.inc();
        info!(request_id = %body.request_id, receiver = %user, "Key exchange request declined");
    }

    Ok(Json(ResponseBase::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderMap, Method, Request};
    use keyx_core::{DhParameters, MemoryLedger, MemoryParameterRegistry};
    use tower::ServiceExt;
    use uuid::Uuid;

    const BOUNDARY: &str = "keyx-test-boundary";

    fn create_test_app() -> Router {
        create_router(AppState {
            ledger: Arc::new(MemoryLedger::new()),
            registry: Arc::new(MemoryParameterRegistry::new()),
            metrics: ServerMetrics::new().unwrap(),
            start_time: Instant::now(),
            max_parameters_bytes: 64 * 1024,
        })
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, body.to_vec())
    }

    fn json_request(method: Method, user: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(ROUTE_REQUESTS)
            .header(IDENTITY_HEADER, user)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart_request(user: &str, field: &str, content: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"dh.pem\"\r\nContent-Type: text/plain\r\n\r\n",
                b = BOUNDARY,
                f = field
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri(ROUTE_PARAMETERS)
            .header(IDENTITY_HEADER, user)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn get_request(uri: &str, user: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(user) = user {
            builder = builder.header(IDENTITY_HEADER, user);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn error_code(body: &[u8]) -> ErrorCode {
        serde_json::from_slice::<ErrorResponse>(body)
            .unwrap()
            .error_message
    }

    async fn create(app: &Router, sender: &str, receiver: &str) -> Uuid {
        let (status, _, body) = send(
            app,
            json_request(
                Method::POST,
                sender,
                serde_json::json!({"requestedUserId": receiver, "publicKey": "QUFB"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice::<CreateKeyExchangeResponse>(&body)
            .unwrap()
            .request_id
    }

    #[tokio::test]
    async fn test_health_and_metrics_need_no_identity() {
        let app = create_test_app();

        let (status, _, _) = send(&app, get_request(ROUTE_HEALTH, None)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, headers, body) = send(&app, get_request(ROUTE_METRICS, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        assert!(String::from_utf8(body)
            .unwrap()
            .contains("keyx_exchange_requests_created_total"));
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthorized() {
        let app = create_test_app();

        for uri in [ROUTE_REQUESTS, ROUTE_PARAMETERS] {
            let (status, _, body) = send(&app, get_request(uri, None)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(error_code(&body), ErrorCode::Unauthorized);
        }

        let (status, _, _) = send(&app, get_request(ROUTE_REQUESTS, Some("  "))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let app = create_test_app();
        let id = create(&app, "alice", "bob").await;

        let (status, _, body) = send(&app, get_request(ROUTE_REQUESTS, Some("bob"))).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let listed = &json["keyExchangeRequests"];
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["requestId"], id.to_string());
        assert_eq!(listed[0]["actor"], "receiver");
        assert_eq!(listed[0]["status"], "pending");
        assert_eq!(listed[0]["senderPublicKey"], "QUFB");
        assert_eq!(listed[0]["backend"], "ecdh");

        let (_, _, body) = send(&app, get_request(ROUTE_REQUESTS, Some("carol"))).await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["keyExchangeRequests"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_and_self_requests_rejected() {
        let app = create_test_app();
        create(&app, "alice", "bob").await;

        let (status, _, body) = send(
            &app,
            json_request(
                Method::POST,
                "bob",
                serde_json::json!({"requestedUserId": "alice", "publicKey": "QkJC"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error_code(&body), ErrorCode::KeyExchangeRequestAlreadyExists);

        let (status, _, body) = send(
            &app,
            json_request(
                Method::POST,
                "alice",
                serde_json::json!({"requestedUserId": "alice", "publicKey": "QUFB"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&body), ErrorCode::SelfExchange);
    }

    #[tokio::test]
    async fn test_confirm_flow() {
        let app = create_test_app();
        let id = create(&app, "alice", "bob").await;

        // The sender cannot answer their own request.
        let (status, _, body) = send(
            &app,
            json_request(
                Method::DELETE,
                "alice",
                serde_json::json!({"requestId": id, "confirmed": true, "publicKey": "QUFB"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error_code(&body), ErrorCode::KeyExchangeRequestNotFound);

        let (status, _, body) = send(
            &app,
            json_request(
                Method::DELETE,
                "bob",
                serde_json::json!({"requestId": id, "confirmed": true}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&body), ErrorCode::MissingPublicKey);

        let (status, _, _) = send(
            &app,
            json_request(
                Method::DELETE,
                "bob",
                serde_json::json!({"requestId": id, "confirmed": true, "publicKey": "QkJC"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, body) = send(
            &app,
            json_request(
                Method::DELETE,
                "bob",
                serde_json::json!({"requestId": id, "confirmed": false}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error_code(&body), ErrorCode::KeyExchangeRequestNotPending);

        let (_, _, body) = send(&app, get_request(ROUTE_REQUESTS, Some("alice"))).await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["keyExchangeRequests"][0]["status"], "confirmed");
        assert_eq!(json["keyExchangeRequests"][0]["receiverPublicKey"], "QkJC");
    }

    #[tokio::test]
    async fn test_parameters_round_trip() {
        let app = create_test_app();

        let (status, _, body) = send(&app, get_request(ROUTE_PARAMETERS, Some("alice"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error_code(&body), ErrorCode::DhParameterNotFound);

        let pem = DhParameters::rfc3526_modp_2048().to_pem().unwrap();
        let (status, _, _) = send(&app, multipart_request("alice", "file", pem.as_bytes())).await;
        assert_eq!(status, StatusCode::OK);

        let (status, headers, body) =
            send(&app, get_request(ROUTE_PARAMETERS, Some("bob"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"dh_parameters.pem\""
        );
        assert_eq!(body, pem.as_bytes());
    }

    #[tokio::test]
    async fn test_bad_parameter_uploads() {
        let app = create_test_app();

        let (status, _, body) = send(&app, multipart_request("alice", "file", b"not pem")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&body), ErrorCode::MalformedParameters);

        let pem = DhParameters::rfc3526_modp_2048().to_pem().unwrap();
        let (status, _, body) =
            send(&app, multipart_request("alice", "upload", pem.as_bytes())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&body), ErrorCode::MalformedParameters);

        let (status, _, _) = send(&app, get_request(ROUTE_PARAMETERS, Some("alice"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_rejections_are_counted() {
        let app = create_test_app();
        send(&app, get_request(ROUTE_REQUESTS, None)).await;

        let (_, _, body) = send(&app, get_request(ROUTE_METRICS, None)).await;
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("keyx_rejected_calls_total{code=\"Unauthorized\"} 1"));
    }

    #[tokio::test]
    async fn test_request_records_backend() {
        let app = create_test_app();
        let (status, _, _) = send(
            &app,
            json_request(
                Method::POST,
                "alice",
                serde_json::json!({
                    "requestedUserId": "bob",
                    "publicKey": "QUFB",
                    "backend": "classical"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, _, body) = send(&app, get_request(ROUTE_REQUESTS, Some("bob"))).await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["keyExchangeRequests"][0]["backend"], "classical");
    }

    #[tokio::test]
    async fn test_malformed_json_bodies_are_bad_requests() {
        let app = create_test_app();

        let raw = |method: Method, content_type: &str, body: &str| {
            Request::builder()
                .method(method)
                .uri(ROUTE_REQUESTS)
                .header(IDENTITY_HEADER, "alice")
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body.to_string()))
                .unwrap()
        };

        let cases = [
            raw(Method::POST, "application/json", "{not json"),
            raw(Method::POST, "application/json", r#"{"requestedUserId":"bob"}"#),
            raw(
                Method::POST,
                "application/json",
                r#"{"requestedUserId":"bob","publicKey":"QUFB","backend":"rsa"}"#,
            ),
            raw(Method::POST, "text/plain", r#"{"requestedUserId":"bob","publicKey":"QUFB"}"#),
            raw(Method::DELETE, "application/json", r#"{"requestId":"nope","confirmed":true}"#),
        ];

        for request in cases {
            let (status, headers, body) = send(&app, request).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(headers[header::CONTENT_TYPE], "application/json");
            let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
            assert!(!error.success);
            assert_eq!(error.error_message, ErrorCode::MalformedRequest);
            assert_eq!(error.status_code, 400);
            assert!(!error.error_details.is_empty());
        }

        let (_, _, body) = send(&app, get_request(ROUTE_REQUESTS, Some("alice"))).await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["keyExchangeRequests"].as_array().unwrap().is_empty());
    }
}
