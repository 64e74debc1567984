//! HTTP-surface integration tests against the facilitator's own router
//! (spec §6 "HTTP: Facilitator service"), exercised in-process with
//! `tower::ServiceExt::oneshot` rather than a bound socket — the idiom used
//! by the wider x402 ecosystem's own facilitator test suites.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use tower::ServiceExt;
use x402_core::{Facilitator, SupportedKind};
use x402_types::requirements::Scheme;
use x402_types::{Amount, ChainId, ErrorReason, PaymentPayload, PaymentRequirements, SettleResponse, VerifyResponse};

/// A stand-in facilitator: accepts whichever payer signed the nonce
/// `"0xvalid"`, rejects everything else. No real chain call is made, so
/// these tests stay hermetic.
struct FakeFacilitator;

#[async_trait]
impl Facilitator for FakeFacilitator {
    async fn verify(&self, payload: &PaymentPayload, _requirements: &PaymentRequirements) -> VerifyResponse {
        match &payload.payload {
            x402_types::payload::PayloadAuthorization::Eip3009(auth) if auth.nonce == "0xvalid" => {
                VerifyResponse::valid(auth.from.clone())
            }
            _ => VerifyResponse::invalid(ErrorReason::InvalidPayload),
        }
    }

    async fn settle(&self, payload: &PaymentPayload, requirements: &PaymentRequirements) -> SettleResponse {
        match &payload.payload {
            x402_types::payload::PayloadAuthorization::Eip3009(auth) if auth.nonce == "0xvalid" => {
                SettleResponse::success(requirements.network.to_string(), "0xdeadbeef", auth.from.clone())
            }
            _ => SettleResponse::failure(requirements.network.to_string(), ErrorReason::InvalidPayload),
        }
    }

    async fn supported(&self) -> Vec<SupportedKind> {
        vec![SupportedKind {
            scheme: Scheme::Exact,
            network: ChainId::new("eip155", "8453").to_string(),
            extra: None,
            signers: vec!["0xfacilitator".to_string()],
        }]
    }
}

fn requirements() -> PaymentRequirements {
    PaymentRequirements {
        scheme: Scheme::Exact,
        network: ChainId::new("eip155", "8453"),
        asset: "0xasset".into(),
        amount: Amount::new(1_000),
        pay_to: "0xpayto".into(),
        max_timeout_seconds: 60,
        extra: Default::default(),
    }
}

fn payload(requirements: PaymentRequirements, nonce: &str) -> PaymentPayload {
    PaymentPayload {
        x402_version: 2,
        resource: "https://example.com/resource".into(),
        accepted: requirements,
        payload: x402_types::payload::PayloadAuthorization::Eip3009(x402_types::Eip3009Authorization {
            from: "0xpayer".into(),
            to: "0xpayto".into(),
            value: Amount::new(1_000),
            valid_after: 0,
            valid_before: u64::MAX,
            nonce: nonce.into(),
            signature: "0xsig".into(),
        }),
    }
}

fn router() -> axum::Router {
    let facilitator: Arc<dyn Facilitator> = Arc::new(FakeFacilitator);
    x402_axum::facilitator_routes(facilitator)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn verify_rejects_unsigned_payload() {
    let req = requirements();
    let body = serde_json::json!({
        "paymentPayload": payload(req.clone(), "0xbad"),
        "paymentRequirements": req,
    });
    let response = router()
        .oneshot(
            Request::post("/verify")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["isValid"], false);
    assert_eq!(json["invalidReason"], "invalid_payload");
}

#[tokio::test]
async fn verify_accepts_signed_payload() {
    let req = requirements();
    let body = serde_json::json!({
        "paymentPayload": payload(req.clone(), "0xvalid"),
        "paymentRequirements": req,
    });
    let response = router()
        .oneshot(
            Request::post("/verify")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["isValid"], true);
    assert_eq!(json["payer"], "0xpayer");
}

#[tokio::test]
async fn settle_after_verify_succeeds_and_matches_invariant_four() {
    // Invariant (spec §4.1): verify(...).isValid ⇒ settle(...) never returns
    // unsupported_scheme/network_mismatch for the same (payload, requirements).
    let req = requirements();
    let p = payload(req.clone(), "0xvalid");
    let router = router();

    let verify_body = serde_json::json!({"paymentPayload": p.clone(), "paymentRequirements": req.clone()});
    let verify_response = router
        .clone()
        .oneshot(
            Request::post("/verify")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&verify_body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    let verify_json = body_json(verify_response).await;
    assert_eq!(verify_json["isValid"], true);

    let settle_body = serde_json::json!({"paymentPayload": p, "paymentRequirements": req});
    let settle_response = router
        .oneshot(
            Request::post("/settle")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&settle_body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(settle_response.status(), StatusCode::OK);
    let settle_json = body_json(settle_response).await;
    assert_eq!(settle_json["success"], true);
    assert_eq!(settle_json["transaction"], "0xdeadbeef");
    assert!(settle_json.get("errorReason").is_none());
}

#[tokio::test]
async fn missing_payment_requirements_is_bad_request() {
    let req = requirements();
    let body = serde_json::json!({"paymentPayload": payload(req, "0xvalid")});
    let response = router()
        .oneshot(
            Request::post("/verify")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn supported_lists_registered_kinds() {
    let response = router().oneshot(Request::get("/supported").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let kinds = json["kinds"].as_array().unwrap();
    assert_eq!(kinds.len(), 1);
    assert_eq!(kinds[0]["scheme"], "exact");
    assert_eq!(kinds[0]["network"], "eip155:8453");
}

#[tokio::test]
async fn health_aliases_supported() {
    let response = router().oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
