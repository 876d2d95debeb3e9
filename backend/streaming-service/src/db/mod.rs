//! User persistence
//!
//! Everything above this module talks to [`UserStore`]; the in-memory store is
//! the only backend shipped with the service.

pub mod memory;
pub mod user_store;

pub use memory::InMemoryUserStore;
pub use user_store::{SharedUserStore, StoreError, StoreResult, UserStore};
