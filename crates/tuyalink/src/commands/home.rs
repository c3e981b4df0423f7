//! `scenes` and `infrared` handlers.

use tabled::Tabled;

use tuyalink_core::{InfraredHub, Scene, Session};

use crate::cli::{GlobalOpts, InfraredArgs, InfraredCommand, OutputFormat, ScenesArgs, ScenesCommand};
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct SceneRow {
    #[tabled(rename = "Home")]
    home: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Enabled")]
    enabled: &'static str,
}

impl From<&Scene> for SceneRow {
    fn from(s: &Scene) -> Self {
        Self {
            home: s.home_id.clone(),
            id: s.scene_id.clone(),
            name: s.name.clone(),
            enabled: if s.enabled { "yes" } else { "no" },
        }
    }
}

#[derive(Tabled)]
struct RemoteRow {
    #[tabled(rename = "Hub")]
    hub: String,
    #[tabled(rename = "Remote")]
    remote: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Keys")]
    keys: String,
}

fn remote_rows(hubs: &[InfraredHub]) -> Vec<RemoteRow> {
    hubs.iter()
        .flat_map(|hub| {
            hub.remotes.iter().map(|learned| RemoteRow {
                hub: hub.infrared_id.clone(),
                remote: learned.remote.remote_id.clone(),
                name: learned.remote.remote_name.clone(),
                keys: learned
                    .keys
                    .iter()
                    .map(|k| k.key.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
        })
        .collect()
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn handle_scenes(session: &Session, args: ScenesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ScenesCommand::List => {
            let scenes = session.scenes().await?;
            let rendered = output::render_list(global.output, &scenes, |s| SceneRow::from(s), |s| s.scene_id.clone())?;
            output::print_output(&rendered, global.quiet)
        }
        ScenesCommand::Trigger { home, scene } => {
            if !session.trigger_scene(&home, &scene).await? {
                return Err(CliError::SceneRejected { scene });
            }
            output::print_output(&format!("scene {scene} triggered"), global.quiet)
        }
    }
}

pub async fn handle_infrared(session: &Session, args: InfraredArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        InfraredCommand::List => {
            let hubs = session.infrared().await?;
            let rows = remote_rows(&hubs);
            let rendered = match global.output {
                OutputFormat::Table => output::render_table(&rows),
                OutputFormat::Plain => rows
                    .iter()
                    .map(|r| format!("{}/{}", r.hub, r.remote))
                    .collect::<Vec<_>>()
                    .join("\n"),
                format => output::render_single(format, &hubs, |_| String::new(), |_| String::new())?,
            };
            output::print_output(&rendered, global.quiet)
        }
        InfraredCommand::Press { hub, remote, key } => {
            session.send_infrared_key(&hub, &remote, &key).await?;
            output::print_output(&format!("{hub}/{remote} {key}"), global.quiet)
        }
    }
}
