//! Content normalization for inbound messages
//!
//! Pure helpers that strip quoted-reply and signature noise from raw email
//! bodies, pull a display name out of a free-form From header, and classify
//! senders as known or unknown against the contact directory.

use crate::contacts::ContactDirectory;
use crate::store::{Direction, UnifiedMessage};

/// Prefix marking senders that could not be resolved against the directory
pub const UNKNOWN_SENDER: &str = "Unknown";

/// Display name for an unresolved inbound address
pub fn unknown_sender_name(address: &str) -> String {
    format!("{} ({})", UNKNOWN_SENDER, address)
}

/// Extract a display name from a free-form From header value.
///
/// `"Jane Doe" <jane@x.com>` yields `Jane Doe` (quotes stripped); a bare
/// address yields its local part (`jane`). Anything else falls back to the
/// unknown-sender sentinel.
pub fn extract_sender_name(from_header: &str) -> String {
    let trimmed = from_header.trim();
    if let Some(idx) = trimmed.find('<') {
        let name = trimmed[..idx].trim().trim_matches('"').trim();
        if !name.is_empty() {
            return name.to_string();
        }
    }
    let address = extract_address(trimmed);
    match address.find('@') {
        Some(at) if at > 0 => address[..at].to_string(),
        _ => UNKNOWN_SENDER.to_string(),
    }
}

/// Extract the bare address from a From header.
/// `Jane <jane@x.com>` yields `jane@x.com`; anything without angle brackets
/// is returned verbatim (trimmed) as the lookup key.
pub fn extract_address(from_header: &str) -> String {
    let trimmed = from_header.trim();
    if let (Some(start), Some(end)) = (trimmed.find('<'), trimmed.rfind('>')) {
        if start < end {
            return trimmed[start + 1..end].trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Walk the marker list in order; each marker truncates at its own first
/// matching line (earliest match only, not all matches), re-scanning the
/// possibly already-truncated text. After a full walk no marker can match
/// the remainder, which is what makes the cleaning pass idempotent.
fn cut_at_markers(text: &str, markers: &[fn(&str) -> bool]) -> String {
    let mut lines: Vec<&str> = text.lines().collect();
    for marker in markers {
        if let Some(idx) = lines.iter().position(|line| marker(line)) {
            lines.truncate(idx);
        }
    }
    lines.join("\n")
}

fn is_quote_intro(line: &str) -> bool {
    let t = line.trim();
    t.starts_with("On ") && t.ends_with("wrote:")
}

fn is_from_header(line: &str) -> bool {
    line.trim_start().starts_with("From:")
}

fn is_sent_header(line: &str) -> bool {
    line.trim_start().starts_with("Sent:")
}

fn is_to_header(line: &str) -> bool {
    line.trim_start().starts_with("To:")
}

fn is_subject_header(line: &str) -> bool {
    line.trim_start().starts_with("Subject:")
}

fn is_original_message_divider(line: &str) -> bool {
    line.trim_start().starts_with("-----Original Message-----")
}

fn is_quoted_line(line: &str) -> bool {
    line.trim_start().starts_with("> ")
}

fn is_hyphen_run(line: &str) -> bool {
    let t = line.trim();
    t.len() >= 3 && t.chars().all(|c| c == '-')
}

fn is_signature_divider(line: &str) -> bool {
    line.trim() == "--"
}

fn is_sent_from_device(line: &str) -> bool {
    line.trim_start().starts_with("Sent from my")
}

fn is_best_regards(line: &str) -> bool {
    line.trim_start().starts_with("Best regards")
}

fn is_thanks(line: &str) -> bool {
    line.trim_start().starts_with("Thanks")
}

fn is_thank_you(line: &str) -> bool {
    line.trim_start().starts_with("Thank you")
}

/// Strip quoted-reply and signature noise from a raw email body.
///
/// Two passes over the text: first the reply/quote markers, then the
/// signature markers on the already-truncated remainder. The trimmed result
/// may be empty, which callers must treat as "no displayable content" and
/// drop the message.
pub fn clean_reply_content(raw_body: &str) -> String {
    let reply_markers: &[fn(&str) -> bool] = &[
        is_quote_intro,
        is_from_header,
        is_sent_header,
        is_to_header,
        is_subject_header,
        is_original_message_divider,
        is_quoted_line,
        is_hyphen_run,
    ];
    let signature_markers: &[fn(&str) -> bool] = &[
        is_signature_divider,
        is_sent_from_device,
        is_best_regards,
        is_thanks,
        is_thank_you,
    ];

    let without_quotes = cut_at_markers(raw_body, reply_markers);
    let without_signature = cut_at_markers(&without_quotes, signature_markers);
    without_signature.trim().to_string()
}

/// Naive tag removal for HTML-only emails. Drops everything between `<` and
/// `>` without attempting real HTML parsing.
pub fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Shared known/unknown classification, consumed by every filtering and
/// counting call site. A message counts as known only when its resolved name
/// is not an unknown-sender marker and, for inbound messages with a populated
/// from-address, that address matches a directory contact (phone exact,
/// email case-insensitive).
pub fn is_known_sender(message: &UnifiedMessage, directory: &ContactDirectory) -> bool {
    if message.contact_name.starts_with(UNKNOWN_SENDER) {
        return false;
    }
    if message.direction == Direction::Incoming {
        if message.contact_name.is_empty() {
            return false;
        }
        if !message.from_address.is_empty() {
            return directory.find_by_phone(&message.from_address).is_some()
                || directory.find_by_email(&message.from_address).is_some();
        }
    }
    true
}
