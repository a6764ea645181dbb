// handlers/protected/mod.rs - Protected handlers (token required)
//
// Every route here runs behind `authenticate`, so handlers may take
// `Extension<AuthContext>`. The role gate for each route is declared in the
// router: profile reads and updates accept ADMIN and USER, schedule reads
// accept the configured read roles.

pub mod schedule;
pub mod user;
