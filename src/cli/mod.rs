//! Command-line interface for ring-dl.
//!
//! - [`args`] - Flag definitions, legacy flag rewriting, date parsing, validation
//! - [`commands`] - Login, device listing and the download run

mod args;
mod commands;

pub use args::{
    Cli, Credentials, Mode, RunRequest, normalize_legacy_args, parse_date,
    parse_error_exit_code,
};
pub use commands::run;
