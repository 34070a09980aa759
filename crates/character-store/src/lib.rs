//! SQLite persistence for the role-play bot.
//!
//! Character sheets are versioned: every change inserts a new revision and
//! deletes are soft. Users, interaction status and static commands live in
//! the same database.

mod characters;
mod error;
mod pictures;
mod rpg;
mod static_messages;
mod status;
mod store;
mod types;
mod users;

pub use error::StoreError;
pub use store::Store;
pub use types::*;
