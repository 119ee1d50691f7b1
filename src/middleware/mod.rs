pub mod auth;
pub mod extract;
pub mod request_log;
pub mod response;

pub use auth::{jwt_auth_middleware, AuthUser};
pub use extract::{ApiForm, ApiJson, ApiPath};
pub use request_log::request_log_middleware;
pub use response::{ApiResponse, ApiResult};
