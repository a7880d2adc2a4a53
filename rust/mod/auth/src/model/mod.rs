mod audit;
mod subject;
mod user;
mod group;
mod group_level;
mod permission;
mod session;

pub use audit::*;
pub use subject::*;
pub use user::*;
pub use group::*;
pub use group_level::*;
pub use permission::*;
pub use session::*;
