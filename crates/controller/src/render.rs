//! Terminal rendering for sessions, zones and last runs.

use chrono::{DateTime, Local};
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use console::style;
use sprinklr::countdown::Remaining;
use sprinklr::zones::ZoneDirectory;
use sprinklr::{SessionStatus, Snapshot};
use sprinklr_protocol::EpochMillis;

pub fn status_line(snapshot: &Snapshot, now: EpochMillis) -> String {
    let session = &snapshot.session;
    match session.status {
        SessionStatus::Active => {
            let label = session
                .zone
                .map(|zone| snapshot.zone_label(zone))
                .unwrap_or_default();
            let remaining = session.remaining(now).unwrap_or(Remaining::ZERO);
            format!(
                "{} {}  {}",
                countdown_line(&label, remaining),
                style("·").dim(),
                style(&session.message).dim()
            )
        }
        SessionStatus::Idle => format!("{} {}", style("○").green(), session.message),
        SessionStatus::Loading => format!("{} {}", style("…").yellow(), session.message),
        SessionStatus::Error => {
            let mut line = format!("{} {}", style("✗").red().bold(), style(&session.message).red());
            if let Some(zone) = session.zone {
                line.push_str(&format!(
                    " {}",
                    style(format!("(last known: {})", snapshot.zone_label(zone))).dim()
                ));
            }
            line
        }
    }
}

pub fn countdown_line(label: &str, remaining: Remaining) -> String {
    format!(
        "{} {} {} left",
        style("●").cyan(),
        style(label).bold(),
        style(remaining).cyan()
    )
}

pub fn zones_table(zones: &ZoneDirectory) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Zone", "Name"]);
    for zone in zones.iter() {
        table.add_row(vec![zone.id.to_string(), zone.name.clone()]);
    }
    table
}

/// Backend timestamps are fractional epoch seconds.
pub fn format_timestamp(secs: f64) -> String {
    if !secs.is_finite() {
        return "unknown".to_string();
    }
    DateTime::from_timestamp_millis((secs * 1_000.0) as i64)
        .map(|utc| {
            utc.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "unknown".to_string())
}
