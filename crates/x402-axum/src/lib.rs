//! axum glue: the facilitator's own HTTP surface, and the resource-server
//! route registry and payment-gate middleware that sit in front of it.

pub mod facilitator_client;
pub mod facilitator_service;
pub mod headers;
pub mod paygate;
pub mod registry;

pub use facilitator_client::{FacilitatorClient, FacilitatorClientError};
pub use facilitator_service::routes as facilitator_routes;
pub use paygate::{PaymentGate, PaymentGateLayer, PaymentGateService};
pub use registry::{RegisterError, RouteRegistry};
