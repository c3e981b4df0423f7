//! Config subcommand handlers. None of these open a session.

use std::io::BufRead;

use tabled::Tabled;

use tuyalink_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

const MASK: &str = "***";

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Endpoint")]
    endpoint: String,
    #[tabled(rename = "User")]
    username: String,
}

/// Replace plaintext secrets so `show` never prints them.
fn masked(mut cfg: Config) -> Config {
    for profile in cfg.profiles.values_mut() {
        if profile.access_secret.is_some() {
            profile.access_secret = Some(MASK.into());
        }
        if profile.password.is_some() {
            profile.password = Some(MASK.into());
        }
    }
    cfg
}

fn profile_rows(cfg: &Config, active: &str) -> Vec<ProfileRow> {
    let mut rows: Vec<ProfileRow> = cfg
        .profiles
        .iter()
        .map(|(name, p)| ProfileRow {
            marker: if name == active { "*" } else { "" },
            name: name.clone(),
            mode: format!("{:?}", p.mode),
            endpoint: p.endpoint.clone(),
            username: p.username.clone(),
        })
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    rows
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path(global).display().to_string(), false)?;
        }

        ConfigCommand::Show => {
            let cfg = masked(config::load(global)?);
            let rendered = match global.output {
                OutputFormat::Table | OutputFormat::Plain => toml::to_string_pretty(&cfg)
                    .map_err(|e| CliError::Internal(format!("failed to render config: {e}")))?,
                format => output::render_single(format, &cfg, |_| String::new(), |_| String::new())?,
            };
            output::print_output(&rendered, global.quiet)?;
        }

        ConfigCommand::Profiles => {
            let cfg = config::load(global)?;
            let active = config::active_profile_name(global, &cfg);
            let rows = profile_rows(&cfg, &active);
            let rendered = if global.output == OutputFormat::Plain {
                rows.iter().map(|r| r.name.clone()).collect::<Vec<_>>().join("\n")
            } else {
                output::render_table(&rows)
            };
            output::print_output(&rendered, global.quiet)?;
        }

        ConfigCommand::SetSecret { kind } => {
            let cfg = config::load(global)?;
            let profile = config::active_profile_name(global, &cfg);

            let mut secret = String::new();
            std::io::stdin().lock().read_line(&mut secret)?;
            let secret = secret.trim_end_matches(['\r', '\n']);
            if secret.is_empty() {
                return Err(CliError::Validation {
                    field: kind.keyring_name().into(),
                    reason: "secret read from stdin was empty".into(),
                });
            }

            tuyalink_config::store_secret(&profile, kind.keyring_name(), secret)?;
            if !global.quiet {
                eprintln!("stored {} for profile '{profile}'", kind.keyring_name());
            }
        }
    }
    Ok(())
}
