//! End-to-end coverage of [`x402_axum::PaymentGate`] as a tower middleware
//! wrapping a protected route: missing-header, rejected-verify, a
//! successful Exact round trip, and Upto cap-exhaustion.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::routing::get;
use axum::Router;
use base64::Engine;
use std::sync::Arc;
use tower::ServiceExt;
use x402_axum::PaymentGate;
use x402_core::{Facilitator, SupportedKind};
use x402_types::payload::{Eip3009Authorization, PayloadAuthorization, PermitAuthorization};
use x402_types::requirements::Scheme;
use x402_types::{Amount, ChainId, ErrorReason, PaymentPayload, PaymentRequirements, SettleResponse, VerifyResponse};
use x402_upto::UptoModule;

struct FakeFacilitator;

#[async_trait]
impl Facilitator for FakeFacilitator {
    async fn verify(&self, payload: &PaymentPayload, _requirements: &PaymentRequirements) -> VerifyResponse {
        match &payload.payload {
            PayloadAuthorization::Eip3009(auth) if auth.nonce == "0xvalid" => VerifyResponse::valid(auth.from.clone()),
            PayloadAuthorization::Permit(permit) => VerifyResponse::valid(permit.from.clone()),
            _ => VerifyResponse::invalid(ErrorReason::InvalidPayload),
        }
    }

    async fn settle(&self, payload: &PaymentPayload, requirements: &PaymentRequirements) -> SettleResponse {
        match &payload.payload {
            PayloadAuthorization::Eip3009(auth) => {
                SettleResponse::success(requirements.network.to_string(), "0xdeadbeef", auth.from.clone())
            }
            _ => SettleResponse::failure(requirements.network.to_string(), ErrorReason::InvalidPayload),
        }
    }

    async fn supported(&self) -> Vec<SupportedKind> {
        Vec::new()
    }
}

fn exact_requirements() -> PaymentRequirements {
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

fn upto_requirements() -> PaymentRequirements {
    PaymentRequirements {
        scheme: Scheme::Upto,
        network: ChainId::new("eip155", "8453"),
        asset: "0xasset".into(),
        amount: Amount::new(300),
        pay_to: "0xfacilitator".into(),
        max_timeout_seconds: 600,
        extra: Default::default(),
    }
}

fn exact_payload(requirements: PaymentRequirements, nonce: &str) -> PaymentPayload {
    PaymentPayload {
        x402_version: 2,
        resource: "https://example.com/resource".into(),
        accepted: requirements,
        payload: PayloadAuthorization::Eip3009(Eip3009Authorization {
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

fn upto_payload(requirements: PaymentRequirements, cap: u128, nonce: &str) -> PaymentPayload {
    PaymentPayload {
        x402_version: 2,
        resource: "https://example.com/resource".into(),
        accepted: requirements,
        payload: PayloadAuthorization::Permit(PermitAuthorization {
            from: "0xowner".into(),
            to: "0xfacilitator".into(),
            value: Amount::new(cap),
            valid_before: 9_999_999_999,
            nonce: nonce.into(),
            signature: "0xsig".into(),
        }),
    }
}

fn encode_header(payload: &PaymentPayload) -> HeaderValue {
    let json = serde_json::to_vec(payload).unwrap();
    let encoded = base64::engine::general_purpose::STANDARD.encode(json);
    HeaderValue::from_str(&encoded).unwrap()
}

async fn handler() -> &'static str {
    "ok"
}

#[tokio::test]
async fn missing_signature_header_returns_402_with_advertisement() {
    let facilitator: Arc<dyn Facilitator> = Arc::new(FakeFacilitator);
    let gate = PaymentGate::new(facilitator);
    let app = Router::new()
        .route("/resource", get(handler))
        .layer(gate.require(vec![exact_requirements()]));

    let response = app
        .oneshot(Request::get("/resource").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert!(response.headers().get("payment-required").is_some());
}

#[tokio::test]
async fn rejected_verify_returns_402_with_reason() {
    let facilitator: Arc<dyn Facilitator> = Arc::new(FakeFacilitator);
    let gate = PaymentGate::new(facilitator);
    let app = Router::new()
        .route("/resource", get(handler))
        .layer(gate.require(vec![exact_requirements()]));

    let payload = exact_payload(exact_requirements(), "0xbad");
    let response = app
        .oneshot(
            Request::get("/resource")
                .header("payment-signature", encode_header(&payload))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["error"], "invalid_payload");
}

#[tokio::test]
async fn valid_exact_payload_passes_through_and_settles() {
    let facilitator: Arc<dyn Facilitator> = Arc::new(FakeFacilitator);
    let gate = PaymentGate::new(facilitator);
    let app = Router::new()
        .route("/resource", get(handler))
        .layer(gate.require(vec![exact_requirements()]));

    let payload = exact_payload(exact_requirements(), "0xvalid");
    let response = app
        .oneshot(
            Request::get("/resource")
                .header("payment-signature", encode_header(&payload))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("payment-response").is_some());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn upto_cap_exhaustion_is_rejected_before_handler_runs() {
    let facilitator: Arc<dyn Facilitator> = Arc::new(FakeFacilitator);
    let upto = Arc::new(UptoModule::new());

    // Pre-exhaust the cap for this exact permit so the request-path tracking
    // call fails deterministically.
    let requirements = upto_requirements();
    let payload = upto_payload(requirements.clone(), 300, "0xsession-1");
    let id = UptoModule::session_id_for(&payload).unwrap();
    upto.ensure_session(&payload, &requirements, 0).unwrap();
    upto.track_pending(&id, Amount::new(300), 0).unwrap();

    let gate = PaymentGate::new(facilitator).with_upto(upto);
    let app = Router::new()
        .route("/resource", get(handler))
        .layer(gate.require(vec![requirements.clone()]));

    let response = app
        .oneshot(
            Request::get("/resource")
                .header("payment-signature", encode_header(&payload))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["error"], "cap_exhausted");
}
