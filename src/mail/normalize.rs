//! Content normalization: raw payload trees to clean plain text.
//!
//! The walk decodes each leaf part, strips markup from HTML parts, and
//! joins parts in structural order. The joined text is then cut at the
//! first quoted-reply marker line, whitespace-collapsed, and trimmed.
//! An empty result means the message carries nothing worth storing.

use tracing::debug;

use super::payload::PayloadNode;

pub fn normalize(payload: &PayloadNode, quote_markers: &[String]) -> String {
    let mut parts = Vec::new();
    collect_parts(payload, &mut parts);

    let joined = parts.join("\n");
    let cut = truncate_at_quote_marker(&joined, quote_markers);

    collapse_whitespace(&cut)
}

fn collect_parts(node: &PayloadNode, out: &mut Vec<String>) {
    match node {
        PayloadNode::Leaf(data) => {
            let Ok(text) = std::str::from_utf8(data) else {
                debug!("dropping undecodable message part ({} bytes)", data.len());
                return;
            };
            let text = text.trim();
            if text.is_empty() {
                return;
            }

            let text = if text.starts_with('<') {
                strip_html_tags(text)
            } else {
                text.to_string()
            };

            if !text.trim().is_empty() {
                out.push(text.trim().to_string());
            }
        }
        PayloadNode::Multipart(children) => {
            for child in children {
                collect_parts(child, out);
            }
        }
    }
}

/// Cut at the first line that starts with a quote marker ("On Mon," etc.);
/// everything from that line on is quoted history.
fn truncate_at_quote_marker(text: &str, markers: &[String]) -> String {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if markers.iter().any(|marker| trimmed.starts_with(marker.as_str())) {
            return text[..offset].to_string();
        }
        offset += line.len();
    }
    text.to_string()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Simple HTML tag stripper; drops script and style bodies entirely.
fn strip_html_tags(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    let mut in_script = false;
    let mut in_style = false;

    let html_lower = html.to_lowercase();
    let chars: Vec<char> = html.chars().collect();
    let chars_lower: Vec<char> = html_lower.chars().collect();

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];

        if i + 7 < chars.len() {
            let tag: String = chars_lower[i..i + 7].iter().collect();
            if tag == "<script" {
                in_script = true;
            } else if tag == "<style "
                || (i + 6 < chars.len()
                    && chars_lower[i..i + 6].iter().collect::<String>() == "<style")
            {
                in_style = true;
            }
        }

        if in_script && i + 9 <= chars.len() {
            let tag: String = chars_lower[i..i + 9].iter().collect();
            if tag == "</script>" {
                in_script = false;
                i += 9;
                continue;
            }
        }
        if in_style && i + 8 <= chars.len() {
            let tag: String = chars_lower[i..i + 8].iter().collect();
            if tag == "</style>" {
                in_style = false;
                i += 8;
                continue;
            }
        }

        if in_script || in_style {
            i += 1;
            continue;
        }

        if c == '<' {
            in_tag = true;
        } else if c == '>' {
            in_tag = false;
        } else if !in_tag {
            result.push(c);
        }

        i += 1;
    }

    let lines: Vec<&str> = result
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    lines.join("\n")
}
