/// Domain models
pub mod stream;
pub mod user;

pub use stream::{DenyReason, OnlineStream, PublicStreamStatus, PublishDecision, StreamStatusView};
pub use user::{UserPatch, UserProfile, UserRecord};
