// handlers/protected/mod.rs - endpoints behind jwt_auth_middleware
//
// Every handler here receives the caller as Extension<AuthUser> and scopes
// all reads and writes to that user.
pub mod account;
pub mod notes;
pub mod tags;
