//! `watch`: print registry changes as broker events arrive.

use std::collections::{BTreeMap, HashSet};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use owo_colors::OwoColorize;
use serde_json::{Value, json};
use tokio::sync::Notify;

use tuyalink_core::{Device, DeviceListener, Session};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

/// Writes one line per registry change. The first write error stops
/// further output and wakes [`EventPrinter::closed`].
struct EventPrinter {
    only: HashSet<String>,
    json: bool,
    color: bool,
    out: Mutex<Box<dyn Write + Send>>,
    error: Mutex<Option<io::Error>>,
    closed: Notify,
}

impl EventPrinter {
    fn new(only: HashSet<String>, json: bool, color: bool, out: Box<dyn Write + Send>) -> Self {
        Self {
            only,
            json,
            color,
            out: Mutex::new(out),
            error: Mutex::new(None),
            closed: Notify::new(),
        }
    }

    fn wants(&self, device_id: &str) -> bool {
        self.only.is_empty() || self.only.contains(device_id)
    }

    fn render(&self, kind: &str, device_id: &str, name: &str, status: Option<&Device>) -> String {
        if self.json {
            let mut event = json!({
                "time": chrono::Utc::now().to_rfc3339(),
                "event": kind,
                "id": device_id,
                "name": name,
            });
            if let Some(device) = status {
                event["online"] = Value::Bool(device.online);
                event["status"] = json!(sorted_status(device));
            }
            event.to_string()
        } else {
            let time = chrono::Local::now().format("%H:%M:%S").to_string();
            let label = format!("{kind:<6}");
            let label = if self.color {
                match kind {
                    "add" => label.green().to_string(),
                    "remove" => label.red().to_string(),
                    _ => label.cyan().to_string(),
                }
            } else {
                label
            };
            let mut line = format!("{time} {label} {device_id} {name}");
            if let Some(device) = status {
                let state = if device.online { "online" } else { "offline" };
                line.push_str(&format!(" [{state}]"));
                for (code, value) in sorted_status(device) {
                    line.push_str(&format!(" {code}={value}"));
                }
            }
            line
        }
    }

    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "{line}")?;
        out.flush()
    }

    fn emit(&self, kind: &str, device_id: &str, name: &str, status: Option<&Device>) {
        if !self.wants(device_id) {
            return;
        }
        let mut error = self.error.lock().unwrap_or_else(PoisonError::into_inner);
        if error.is_some() {
            return;
        }
        if let Err(e) = self.write_line(&self.render(kind, device_id, name, status)) {
            tracing::debug!(error = %e, "event output closed");
            *error = Some(e);
            self.closed.notify_one();
        }
    }

    fn take_error(&self) -> Option<io::Error> {
        self.error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

fn sorted_status(device: &Device) -> BTreeMap<&str, &Value> {
    device.status.iter().map(|(k, v)| (k.as_str(), v)).collect()
}

impl DeviceListener for EventPrinter {
    fn add_device(&self, device: &Device) {
        self.emit("add", &device.id, &device.name, Some(device));
    }

    fn update_device(&self, device: &Device) {
        self.emit("update", &device.id, &device.name, Some(device));
    }

    fn remove_device(&self, device_id: &str) {
        self.emit("remove", device_id, "", None);
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(session: &Session, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if let Some(missing) = args.device.iter().find(|id| !session.registry().contains(id)) {
        return Err(CliError::DeviceNotFound {
            identifier: missing.clone(),
        });
    }

    let printer = Arc::new(EventPrinter::new(
        args.device.into_iter().collect(),
        matches!(global.output, OutputFormat::Json | OutputFormat::JsonCompact),
        output::should_color(global.color),
        Box::new(io::stdout()),
    ));
    let listener = session.registry().add_listener(Arc::clone(&printer) as Arc<dyn DeviceListener>);

    if !global.quiet {
        eprintln!(
            "watching {} device(s), press Ctrl-C to stop",
            session.registry().len()
        );
    }
    session.listen();

    let outcome = tokio::select! {
        interrupted = tokio::signal::ctrl_c() => interrupted,
        () = printer.closed.notified() => printer.take_error().map_or(Ok(()), Err),
    };
    session.registry().remove_listener(listener);
    session.shutdown().await;
    outcome?;
    Ok(())
}
