mod secret;

pub use secret::*;
use uuid::Uuid;

pub type SessionId = Uuid;
