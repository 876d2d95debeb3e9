//! Service layer for the streaming gatekeeper
//!
//! - Account flows (register, login, token refresh, logout)
//! - Stream access control (key registry, presence, publish gatekeeper)
//! - Background maintenance of in-process state

pub mod account;
pub mod maintenance;
pub mod streaming;

pub use account::{AccountService, LoginOutcome};
pub use maintenance::{MaintenanceHandle, SweepReport, Sweeper};
pub use streaming::{
    Gatekeeper, GatekeeperError, PresenceCache, StreamKeyError, StreamKeyRegistry,
};
