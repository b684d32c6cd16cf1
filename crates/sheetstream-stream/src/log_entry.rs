//! Log cell sections.
//!
//! A log cell holds one block per AI:
//!
//! ```text
//! ---------- ChatGPT ----------
//! Model: gpt-4o
//! Function: none
//! URL: https://chatgpt.com/?model=gpt-4o
//! Sent: 2026/05/01 21:00:00
//! Written: 2026/05/01 21:00:42 (42 sec later)
//! ```
//!
//! Blocks are kept in ChatGPT, Claude, Gemini order; other AIs follow.

use chrono::{DateTime, FixedOffset};
use once_cell::sync::Lazy;
use regex::Regex;

use sheetstream_protocols::AiType;

const RULE: &str = "----------";
const TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

static HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-{10} (?P<name>.+?) -{10}$").expect("log header pattern is valid"));

/// One AI's entry in a log cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSection {
    pub ai: AiType,
    pub model: Option<String>,
    pub feature: Option<String>,
    pub url: String,
    pub sent: DateTime<FixedOffset>,
    pub written: DateTime<FixedOffset>,
}

impl LogSection {
    pub fn elapsed_secs(&self) -> i64 {
        (self.written - self.sent).num_seconds().max(0)
    }

    pub fn render(&self) -> String {
        format!(
            "{RULE} {} {RULE}\nModel: {}\nFunction: {}\nURL: {}\nSent: {}\nWritten: {} ({} sec later)",
            self.ai.label(),
            self.model.as_deref().unwrap_or("default"),
            self.feature.as_deref().unwrap_or("none"),
            self.url,
            self.sent.format(TIME_FORMAT),
            self.written.format(TIME_FORMAT),
            self.elapsed_secs()
        )
    }
}

/// Named blocks of an existing log cell. Text before the first header, such
/// as an exclusive marker, is dropped.
fn parse_blocks(text: &str) -> Vec<(String, String)> {
    let mut blocks: Vec<(String, String)> = Vec::new();
    for line in text.lines() {
        if let Some(caps) = HEADER.captures(line.trim_end()) {
            blocks.push((caps["name"].to_string(), line.trim_end().to_string()));
        } else if let Some((_, body)) = blocks.last_mut() {
            body.push('\n');
            body.push_str(line);
        }
    }
    for (_, body) in &mut blocks {
        let trimmed = body.trim_end().len();
        body.truncate(trimmed);
    }
    blocks
}

fn block_order(name: &str) -> usize {
    AiType::from_label(name).map_or(usize::MAX, |ai| ai.order_index())
}

/// Insert or replace `section` in `existing` and re-render in AI order.
pub fn merge_log(existing: &str, section: &LogSection) -> String {
    let name = section.ai.label();
    let mut blocks = parse_blocks(existing);
    blocks.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    blocks.push((name.to_string(), section.render()));
    blocks.sort_by_key(|(n, _)| block_order(n));
    blocks
        .into_iter()
        .map(|(_, body)| body)
        .collect::<Vec<_>>()
        .join("\n\n")
}
