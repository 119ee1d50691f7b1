// handlers/public/mod.rs - endpoints reachable without a token
//
// Service metadata, health, and token acquisition.
pub mod account;
pub mod system;

pub use account::{login, register};
pub use system::{health, root};
