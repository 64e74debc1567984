//! The facilitator dispatch engine: `(scheme, network) -> facilitator`,
//! cross-layer invariant checks, hooks, and the aggregated `/supported` view.

pub mod hooks;
pub mod registry;
pub mod scheme;

pub use hooks::{Hooks, HookOutcome};
pub use registry::{DispatchError, Facilitator, FacilitatorCore, SupportedKind};
pub use scheme::SchemeFacilitator;
