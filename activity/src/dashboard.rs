use std::fmt::Write;

use time::format_description::well_known::Rfc3339;

use crate::event::{Event, Origin};

const REFRESH_SECS: u32 = 30;
pub const MAX_ROWS: usize = 100;

/// Renders the event list as a self-refreshing HTML page. Only the first
/// `MAX_ROWS` events get a row, the heading still counts all of them.
pub fn render(events: &[Event], window_hours: i64) -> String {
    let mut rows = String::new();
    for event in events.iter().take(MAX_ROWS) {
        let created_at = event
            .occurred_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| event.occurred_at.to_string());
        let source = match event.origin {
            Origin::PolledFeed => "feed",
            Origin::Webhook => "webhook",
        };
        let approximate = if event.approximate_time { " ~" } else { "" };

        // Writing into a String cannot fail
        _ = write!(
            rows,
            "<tr><td>{}{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&created_at),
            approximate,
            escape(&event.category),
            escape(&event.actor),
            escape(&event.repo_scope),
            source,
            escape(&event.identity.to_string()),
        );
    }

    if events.is_empty() {
        rows.push_str(r#"<tr><td colspan="6">No events yet</td></tr>"#);
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="{refresh}">
<title>Repository activity</title>
</head>
<body>
<h1>Repository activity</h1>
<p>{count} events in the last {window_hours} hours</p>
<table>
<thead><tr><th>Time</th><th>Type</th><th>Actor</th><th>Repository</th><th>Source</th><th>Id</th></tr></thead>
<tbody>
{rows}
</tbody>
</table>
</body>
</html>
"#,
        refresh = REFRESH_SECS,
        count = events.len(),
        window_hours = window_hours,
        rows = rows,
    )
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
