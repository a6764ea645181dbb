pub mod auth;
pub mod response;
pub mod upload;

pub use auth::{authenticate, require_roles, AuthContext, AuthFailure};
pub use response::{ApiResponse, ApiResult, Empty};
pub use upload::FormPayload;
