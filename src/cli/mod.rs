pub mod commands;
pub mod context;
pub mod errors;
pub mod output;
mod shell;
pub mod table;

pub use context::{CliMode, ShellContext};
pub use errors::{CliError, CommandError, CommandResult};
pub use shell::{run_cli, SCRIPT_ENV};
