//! Command dispatch: bridges CLI args -> session or REST calls -> output formatting.

pub mod config_cmd;
pub mod connect;
pub mod export;
pub mod inventory;
pub mod replay;
pub mod util;

use netdraw_core::SessionConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a server-bound command to its handler.
pub async fn dispatch(
    cmd: Command,
    session: SessionConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Connect(args) => connect::handle(&args, session, global).await,
        Command::Inventory(args) => inventory::handle(&args, &session, global).await,
        // Local commands are handled before dispatch
        Command::Replay(_) | Command::Export(_) | Command::Config(_) | Command::Completions(_) => {
            unreachable!("local commands never reach server dispatch")
        }
    }
}
