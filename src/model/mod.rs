mod collection;
mod period;
mod repository;
mod result;
mod user;

pub use collection::*;
pub use period::*;
pub use repository::Repository;
pub use result::{Error, Result};
pub use user::{looks_like_bot, IdentityKind, Roster, User};
