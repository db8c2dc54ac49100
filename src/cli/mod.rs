pub mod args;
pub mod auth;
pub mod ledger;
pub mod status;

pub use args::{Cli, CliCommand, LedgerCliArgs, StatusCliArgs};
pub use auth::handle_auth_command;
pub use ledger::handle_ledger_command;
pub use status::handle_status_command;
