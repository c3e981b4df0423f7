//! Command dispatch: bridges CLI args -> core session -> output formatting.

pub mod config_cmd;
pub mod devices;
pub mod home;
pub mod send;
pub mod watch;

use tuyalink_core::Session;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a command that needs a logged-in session.
pub async fn dispatch(cmd: Command, session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(session, args, global).await,
        Command::Watch(args) => watch::handle(session, args, global).await,
        Command::Send(args) => send::handle(session, args, global).await,
        Command::Scenes(args) => home::handle_scenes(session, args, global).await,
        Command::Infrared(args) => home::handle_infrared(session, args, global).await,
        // Config and Completions never open a session
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
