//! GitHub API service implementations.

mod apps;
mod meta;
mod repositories;
mod search;
mod users;

pub use apps::*;
pub use meta::*;
pub use repositories::*;
pub use search::*;
pub use users::*;
