//! Local CLI command handlers.

pub mod config;
pub mod initialize;
pub mod query;
pub mod status;
pub mod uninitialize;
pub mod version;

pub use config::{run_config_check, run_config_show};
pub use initialize::run_initialize;
pub use query::{QueryCommandInput, run_query};
pub use status::run_status;
pub use uninitialize::run_uninitialize;
pub use version::run_version;
