// handlers/elevated/mod.rs - Elevated handlers (ADMIN role required)
//
// Full user listing, deactivation and schedule mutations. Routes run behind
// `authenticate` followed by a role gate of `{ADMIN}`.

pub mod schedule;
pub mod user;
