//! The Upto session store, its sweeper, and the module that wires both to
//! the facilitator core for deferred batched-cap settlement.

pub mod config;
pub mod module;
pub mod store;
pub mod sweeper;

pub use config::SweeperConfig;
pub use module::UptoModule;
pub use store::{SessionStore, TrackError};
pub use sweeper::Sweeper;
