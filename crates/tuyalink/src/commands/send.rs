//! `send`: issue one data point command.

use serde_json::Value;

use tuyalink_core::{Command, Session};

use crate::cli::{GlobalOpts, SendArgs};
use crate::error::CliError;
use crate::output;

/// JSON when it parses (`true`, `42`, `{"h":0}`), otherwise the raw string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}

pub async fn handle(session: &Session, args: SendArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let command = Command::new(args.code, parse_value(&args.value));
    tracing::debug!(device = %args.device, ?command, "sending command");

    if !session
        .send_commands(&args.device, std::slice::from_ref(&command))
        .await?
    {
        return Err(CliError::CommandRejected {
            device: args.device,
        });
    }

    output::print_output(
        &format!("{} {} = {}", args.device, command.code, command.value),
        global.quiet,
    )
}
