//! State database for ring-recordings-dl
//!
//! A small SQLite file that survives between runs. It holds the values the tool keeps
//! outside the process:
//! - the cached long-lived refresh token, so later runs skip the password login
//! - the resume marker (id of the last recording considered downloaded)
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`state`] - Key/value runtime state (credential cache, resume marker)

use sqlx::sqlite::SqlitePool;

mod migrations;
mod state;

pub use state::{LAST_DOWNLOADED_KEY, REFRESH_TOKEN_KEY};

/// Database handle for ring-recordings-dl
pub struct Database {
    pool: SqlitePool,
}
