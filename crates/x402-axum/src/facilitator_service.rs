//! The facilitator's own HTTP surface (spec §6 "HTTP: Facilitator service").

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use x402_core::Facilitator;
use x402_types::{PaymentPayload, PaymentRequirements, SettleResponse, VerifyResponse};

/// Body shared by `/verify` and `/settle`: `{paymentPayload, paymentRequirements}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitatorRequest {
    pub payment_payload: Option<PaymentPayload>,
    pub payment_requirements: Option<PaymentRequirements>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SupportedResponse {
    kinds: Vec<x402_core::SupportedKind>,
}

/// Builds the facilitator's router: `POST /verify`, `POST /settle`, `GET
/// /supported`. `/health` is an added liveness alias for `/supported`.
pub fn routes(facilitator: Arc<dyn Facilitator>) -> Router {
    Router::new()
        .route("/verify", post(verify_handler))
        .route("/settle", post(settle_handler))
        .route("/supported", get(supported_handler))
        .route("/health", get(supported_handler))
        .with_state(facilitator)
}

/// `{paymentPayload, paymentRequirements}` missing a field is a 400, per
/// spec §6 — not surfaced through `VerifyResponse`/`SettleResponse` at all.
fn require_body(
    body: FacilitatorRequest,
) -> Result<(PaymentPayload, PaymentRequirements), Response> {
    match (body.payment_payload, body.payment_requirements) {
        (Some(payload), Some(requirements)) => Ok((payload, requirements)),
        _ => Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "missing paymentPayload or paymentRequirements"})),
        )
            .into_response()),
    }
}

async fn verify_handler(
    State(facilitator): State<Arc<dyn Facilitator>>,
    Json(body): Json<FacilitatorRequest>,
) -> Response {
    let (payload, requirements) = match require_body(body) {
        Ok(ok) => ok,
        Err(response) => return response,
    };
    let response: VerifyResponse = facilitator.verify(&payload, &requirements).await;
    Json(response).into_response()
}

/// A hook abort at `onBeforeSettle` surfaces as a 200 `SettleResponse{success:false,
/// errorReason}` (spec §4.1, §6) — it reaches this handler exactly the same way
/// as any other failed settlement, since `Facilitator::settle` never panics
/// or returns an `Err` for protocol-level failures.
async fn settle_handler(
    State(facilitator): State<Arc<dyn Facilitator>>,
    Json(body): Json<FacilitatorRequest>,
) -> Response {
    let (payload, requirements) = match require_body(body) {
        Ok(ok) => ok,
        Err(response) => return response,
    };
    let response: SettleResponse = facilitator.settle(&payload, &requirements).await;
    Json(response).into_response()
}

async fn supported_handler(State(facilitator): State<Arc<dyn Facilitator>>) -> Response {
    let kinds = facilitator.supported().await;
    Json(SupportedResponse { kinds }).into_response()
}
