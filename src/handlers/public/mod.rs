// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Registration, login, password reset and the public yearbook listing.
// No token is read and no AuthContext is available here.

pub mod auth;
pub mod user;
