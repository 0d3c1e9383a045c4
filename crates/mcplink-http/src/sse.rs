//! Server-Sent Events framing for POST responses.
//!
//! Servers speaking streamable HTTP may answer a POST with an event stream instead
//! of a bare JSON document. Only the first named event matters: its `data:` lines
//! carry the response envelope.

/// Whether a response should be treated as an event stream: either the
/// content type says so, or the body literally starts with `event:`.
pub(crate) fn is_event_stream(content_type: Option<&str>, body: &str) -> bool {
    let declared = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("text/event-stream"))
        .unwrap_or(false);
    declared || starts_with_ignore_case(body, "event:")
}

/// Extract the `data:` payload of the first complete named event.
///
/// An event is a block of lines terminated by a blank line. Comment lines
/// (leading `:`) are skipped and multiple `data:` lines are joined with `\n`.
/// Blocks without an `event:` field are discarded. If the stream ends without
/// a trailing blank line, whatever data was accumulated is returned.
pub(crate) fn extract_first_event_data(body: &str) -> Option<String> {
    let mut event_type: Option<String> = None;
    let mut data = String::new();

    for line in body.lines() {
        if line.starts_with(':') {
            continue;
        }

        if let Some(value) = strip_prefix_ignore_case(line, "event:") {
            event_type = Some(value.trim().to_string());
        } else if let Some(value) = strip_prefix_ignore_case(line, "data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(value.trim_start());
        } else if line.trim().is_empty() {
            if event_type.as_deref().is_some_and(|t| !t.is_empty()) && !data.is_empty() {
                return Some(data);
            }
            event_type = None;
            data.clear();
        }
    }

    (!data.is_empty()).then_some(data)
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    starts_with_ignore_case(s, prefix).then(|| &s[prefix.len()..])
}
