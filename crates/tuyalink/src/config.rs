//! CLI-side configuration: applies global flag overrides on top of the
//! shared profile loading in `tuyalink-config`.

use std::path::PathBuf;
use std::time::Duration;

use tuyalink_config::{Config, profile_to_connect_config};
use tuyalink_core::ConnectConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config file in effect: `--config` / `TUYALINK_CONFIG`, else the default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(tuyalink_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(tuyalink_config::load_config_from(&config_path(global))?)
}

/// Name of the profile selected by `--profile` or the config default.
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Resolve the active profile into a connect config, applying `--timeout`.
pub fn build_connect_config(global: &GlobalOpts) -> Result<ConnectConfig, CliError> {
    let cfg = load(global)?;
    let selected = active_profile_name(global, &cfg);
    let (name, profile) = cfg
        .profile(Some(&selected))
        .map_err(|_| CliError::ProfileNotFound {
            name: selected.clone(),
            path: config_path(global).display().to_string(),
        })?;

    let mut connect = profile_to_connect_config(profile, name, &cfg.defaults)?;
    if let Some(secs) = global.timeout {
        connect.timeout = Duration::from_secs(secs);
    }
    Ok(connect)
}
