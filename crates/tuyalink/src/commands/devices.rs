//! Device command handlers.

use std::collections::BTreeMap;

use serde_json::Value;
use tabled::Tabled;

use tuyalink_core::{Device, Session};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Product")]
    product: String,
    #[tabled(rename = "State")]
    state: &'static str,
}

impl From<&Device> for DeviceRow {
    fn from(d: &Device) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            category: d.category.clone(),
            product: d.product_name.clone(),
            state: if d.online { "online" } else { "offline" },
        }
    }
}

#[derive(Tabled)]
struct SpecRow {
    #[tabled(rename = "Code")]
    code: String,
    #[tabled(rename = "Kind")]
    kind: &'static str,
    #[tabled(rename = "Type")]
    value_type: String,
    #[tabled(rename = "Values")]
    values: String,
}

fn sorted_status(d: &Device) -> BTreeMap<&str, &Value> {
    d.status.iter().map(|(k, v)| (k.as_str(), v)).collect()
}

fn detail(d: &Device) -> String {
    let mut lines = vec![
        format!("ID:       {}", d.id),
        format!("Name:     {}", d.name),
        format!("Category: {}", d.category),
        format!("Product:  {} ({})", d.product_name, d.product_id),
        format!("State:    {}", if d.online { "online" } else { "offline" }),
        format!("IP:       {}", if d.ip.is_empty() { "-" } else { &d.ip }),
    ];
    if !d.status.is_empty() {
        lines.push("Status:".into());
        for (code, value) in sorted_status(d) {
            lines.push(format!("  {code:<20} {value}"));
        }
    }
    lines.join("\n")
}

fn values_text(values: &Value) -> String {
    match values {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn spec_rows(d: &Device) -> Vec<SpecRow> {
    let mut functions: Vec<_> = d.function.values().collect();
    functions.sort_by(|a, b| a.code.cmp(&b.code));
    let mut ranges: Vec<_> = d.status_range.values().collect();
    ranges.sort_by(|a, b| a.code.cmp(&b.code));

    functions
        .into_iter()
        .map(|f| SpecRow {
            code: f.code.clone(),
            kind: "function",
            value_type: f.kind.clone(),
            values: values_text(&f.values),
        })
        .chain(ranges.into_iter().map(|s| SpecRow {
            code: s.code.clone(),
            kind: "status",
            value_type: s.kind.clone(),
            values: values_text(&s.values),
        }))
        .collect()
}

fn find(session: &Session, device_id: &str) -> Result<Device, CliError> {
    session
        .registry()
        .get(device_id)
        .ok_or_else(|| CliError::DeviceNotFound {
            identifier: device_id.into(),
        })
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(session: &Session, args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let rendered = match args.command {
        DevicesCommand::List => {
            let devices = session.devices();
            output::render_list(global.output, &devices, |d| DeviceRow::from(d), |d| d.id.clone())?
        }
        DevicesCommand::Get { device } => {
            let device = find(session, &device)?;
            output::render_single(global.output, &device, detail, |d| d.id.clone())?
        }
        DevicesCommand::Spec { device } => {
            // Specifications may have changed since the fleet was loaded.
            session
                .registry()
                .refresh_specifications(std::slice::from_ref(&device))
                .await?;
            let device = find(session, &device)?;
            let rows = spec_rows(&device);
            match global.output {
                OutputFormat::Table => output::render_table(&rows),
                OutputFormat::Plain => rows
                    .iter()
                    .map(|r| r.code.clone())
                    .collect::<Vec<_>>()
                    .join("\n"),
                _ => output::render_single(
                    global.output,
                    &serde_json::json!({
                        "id": device.id,
                        "functions": device.function,
                        "status": device.status_range,
                    }),
                    |_| String::new(),
                    |_| String::new(),
                )?,
            }
        }
    };

    output::print_output(&rendered, global.quiet)?;
    Ok(())
}
