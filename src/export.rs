//! CSV rendering of an export batch, in the column layout the mailing-list
//! provider's import tool expects.

use chrono::SecondsFormat;

use crate::domain::SyncBatchId;
use crate::subscriber_store::PendingSubscriber;

pub const CSV_HEADER: [&str; 3] = ["email", "subscribed_at", "source"];

/// Quote `value` if it contains a comma, a double quote or a line break;
/// inner quotes are doubled.
pub fn escape_csv_value(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}

/// Header line plus one line per row, `\n`-separated, no trailing newline.
/// Timestamps are RFC 3339 in UTC.
pub fn build_csv(rows: &[PendingSubscriber]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(CSV_HEADER.join(","));
    for row in rows {
        let subscribed_at = row.subscribed_at.to_rfc3339_opts(SecondsFormat::Millis, true);
        lines.push(
            [row.email.as_str(), subscribed_at.as_str(), row.source.as_str()]
                .map(escape_csv_value)
                .join(","),
        );
    }
    lines.join("\n")
}

pub fn export_filename(batch_id: &SyncBatchId) -> String { format!("substack-pending-{batch_id}.csv") }
