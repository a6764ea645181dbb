// handlers/mod.rs - 3-Tier Handler Architecture
//
// Public (no token) → Protected (token, ADMIN or USER) → Elevated (token, ADMIN)
//
// The tier only decides where a handler lives; the role gate itself is
// attached per route in `api_routes` (src/lib.rs).

pub mod elevated;
pub mod protected;
pub mod public;
