//! Command dispatch: bridges CLI args -> core operations -> output formatting.

pub mod alerts;
pub mod config_cmd;
pub mod events;
pub mod login;
pub mod util;
pub mod watch;

use crate::cli::{Command, GlobalOpts};
use crate::config::Resolved;
use crate::error::CliError;

/// Dispatch a service-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    resolved: Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Alerts(args) => alerts::handle(&resolved, args, global).await,
        Command::Watch(args) => watch::handle(resolved, args, global).await,
        Command::Events(args) => events::handle(&resolved, args, global).await,
        Command::Login => login::handle(&resolved, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
