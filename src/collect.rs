use crate::datetime;
use chrono::{DateTime, FixedOffset};
use mail_parser::MessageParser;

/// Returns the unfolded values of every header field called `name` in the
/// header section of `content`, in order of appearance.
fn header_values(content: &[u8], name: &str) -> Vec<Vec<u8>> {
    let mut result = vec![];
    let mut current: Option<Vec<u8>> = None;
    for line in content.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        // The header section ends at the first empty line.
        if line.is_empty() {
            break;
        }
        if line[0] == b' ' || line[0] == b'\t' {
            if let Some(value) = current.as_mut() {
                value.push(b' ');
                value.extend_from_slice(trim(line));
            }
            continue;
        }
        result.extend(current.take());
        if let Some(pos) = line.iter().position(|&b| b == b':') {
            if line[..pos].eq_ignore_ascii_case(name.as_bytes()) {
                current = Some(trim(&line[pos + 1..]).to_vec());
            }
        }
    }
    result.extend(current);
    result
}

fn trim(mut s: &[u8]) -> &[u8] {
    while let Some((first, rest)) = s.split_first() {
        if !first.is_ascii_whitespace() {
            break;
        }
        s = rest;
    }
    while let Some((last, rest)) = s.split_last() {
        if !last.is_ascii_whitespace() {
            break;
        }
        s = rest;
    }
    s
}

/// Date and `Message-ID` of a message, as far as they can be read.
pub fn get_date_and_id(content: &[u8]) -> (Option<DateTime<FixedOffset>>, Option<String>) {
    match MessageParser::default().parse(content) {
        Some(message) => (
            message.date().and_then(datetime::from_header),
            message
                .message_id()
                .filter(|id| !id.is_empty())
                .map(str::to_string),
        ),
        None => (None, None),
    }
}

/// Whether a message from an mbox has been read, i.e. its `Status` header
/// carries the `R` flag.
pub fn is_seen(content: &[u8]) -> bool {
    header_values(content, "Status")
        .iter()
        .any(|value| value.contains(&b'R'))
}
