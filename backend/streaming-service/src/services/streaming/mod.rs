/// Stream access control: key registry, presence and the publish gatekeeper
pub mod gatekeeper;
pub mod presence;
pub mod stream_key;

pub use gatekeeper::{Gatekeeper, GatekeeperError};
pub use presence::{PresenceCache, PresenceEntry, PresenceState, TtlCache};
pub use stream_key::{validate_shape, StreamKeyError, StreamKeyRegistry};
