//! Vocabulary shared by both push roles.
//!
//! The result codes returned from `start()`, the states a streaming session
//! moves through, and the constants that fix the wire behaviour.

pub mod constants;
pub mod result;
pub mod state;

pub use constants::{CHUNK_SIZE, DEFAULT_CLIENT_TIMEOUT_MILLIS, DEFAULT_SERVER_TIMEOUT_MILLIS};
pub use result::TransferResult;
pub use state::SessionState;
