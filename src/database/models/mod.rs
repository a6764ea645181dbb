pub mod schedule;
pub mod user;

pub use schedule::{Schedule, ScheduleView};
pub use user::{Profile, ProfileView, PublicProfile};
