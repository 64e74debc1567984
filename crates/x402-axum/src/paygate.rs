//! The per-route payment-enforcement middleware.
//!
//! Wraps a protected route: extracts the client's signed payload, verifies
//! it against the route's registered [`PaymentRequirements`], tracks Upto
//! pending spend (rejecting over-cap requests before the handler runs), runs
//! the handler, and settles Exact payments afterward.

use axum::body::Body;
use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use http::{HeaderValue, StatusCode};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use x402_core::Facilitator;
use x402_types::requirements::Scheme;
use x402_types::{PaymentRequired, PaymentRequirements};

use crate::headers::{encode_base64_json, extract_payment_payload, payment_required_header_name};

#[cfg(feature = "upto")]
use x402_upto::UptoModule;

/// Builds [`PaymentGateLayer`]s against a shared facilitator (and, if Upto
/// support is compiled in, a shared [`UptoModule`]).
#[derive(Clone)]
pub struct PaymentGate {
    facilitator: Arc<dyn Facilitator>,
    #[cfg(feature = "upto")]
    upto: Option<Arc<UptoModule>>,
}

impl PaymentGate {
    pub fn new(facilitator: Arc<dyn Facilitator>) -> Self {
        PaymentGate {
            facilitator,
            #[cfg(feature = "upto")]
            upto: None,
        }
    }

    #[cfg(feature = "upto")]
    pub fn with_upto(mut self, upto: Arc<UptoModule>) -> Self {
        self.upto = Some(upto);
        self
    }

    /// Builds a layer enforcing `requirements` on whatever route it is
    /// applied to via `.layer(...)`.
    pub fn require(&self, requirements: Vec<PaymentRequirements>) -> PaymentGateLayer {
        PaymentGateLayer {
            facilitator: self.facilitator.clone(),
            #[cfg(feature = "upto")]
            upto: self.upto.clone(),
            requirements: Arc::new(requirements),
        }
    }
}

#[derive(Clone)]
pub struct PaymentGateLayer {
    facilitator: Arc<dyn Facilitator>,
    #[cfg(feature = "upto")]
    upto: Option<Arc<UptoModule>>,
    requirements: Arc<Vec<PaymentRequirements>>,
}

impl<S> Layer<S> for PaymentGateLayer {
    type Service = PaymentGateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PaymentGateService {
            inner,
            facilitator: self.facilitator.clone(),
            #[cfg(feature = "upto")]
            upto: self.upto.clone(),
            requirements: self.requirements.clone(),
        }
    }
}

#[derive(Clone)]
pub struct PaymentGateService<S> {
    inner: S,
    facilitator: Arc<dyn Facilitator>,
    #[cfg(feature = "upto")]
    upto: Option<Arc<UptoModule>>,
    requirements: Arc<Vec<PaymentRequirements>>,
}

fn payment_required_response(requirements: &[PaymentRequirements], resource: &str, error: Option<&str>) -> Response {
    let mut payment_required = PaymentRequired::new(requirements.to_vec(), Some(resource.to_string()));
    if let Some(error) = error {
        payment_required = payment_required.with_error(error);
    }
    let mut response = (StatusCode::PAYMENT_REQUIRED, axum::Json(&payment_required)).into_response();
    if let Some(encoded) = encode_base64_json(&payment_required) {
        if let Ok(value) = HeaderValue::from_str(&encoded) {
            response.headers_mut().insert(payment_required_header_name(), value);
        }
    }
    response
}

impl<S> Service<Request<Body>> for PaymentGateService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        std::mem::swap(&mut self.inner, &mut inner);
        let facilitator = self.facilitator.clone();
        #[cfg(feature = "upto")]
        let upto = self.upto.clone();
        let requirements = self.requirements.clone();
        let resource = req.uri().to_string();

        Box::pin(async move {
            let payload = match extract_payment_payload(req.headers()) {
                Some(payload) => payload,
                None => return Ok(payment_required_response(&requirements, &resource, None)),
            };

            let matched = requirements
                .iter()
                .find(|r| r.scheme == payload.accepted.scheme && r.network == payload.accepted.network);
            let selected = match matched {
                Some(r) => r,
                None => return Ok(payment_required_response(&requirements, &resource, Some("unsupported_scheme"))),
            };

            let verify_response = facilitator.verify(&payload, selected).await;
            if !verify_response.is_valid {
                let reason = verify_response.invalid_reason.map(|r| r.to_string());
                return Ok(payment_required_response(&requirements, &resource, reason.as_deref()));
            }

            #[cfg(feature = "upto")]
            if selected.scheme == Scheme::Upto {
                if let Some(upto) = &upto {
                    let now_ms = now_ms();
                    let session_result = upto
                        .ensure_session(&payload, selected, now_ms)
                        .and_then(|id| upto.track_pending(&id, selected.amount, now_ms).map(|_| id));
                    if let Err(_err) = session_result {
                        return Ok(payment_required_response(&requirements, &resource, Some("cap_exhausted")));
                    }
                }
            }
            #[cfg(not(feature = "upto"))]
            let _ = Scheme::Upto;

            let response = inner.call(req).await?;

            if selected.scheme == Scheme::Exact {
                let settle_response = facilitator.settle(&payload, selected).await;
                let mut response = response;
                if let Some(encoded) = encode_base64_json(&settle_response) {
                    if let Ok(value) = HeaderValue::from_str(&encoded) {
                        response.headers_mut().insert("payment-response", value);
                    }
                }
                return Ok(response);
            }

            Ok(response)
        })
    }
}

#[cfg(feature = "upto")]
fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
