use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::ticket::mentions_ticket;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid normalize regex")
}

static PREFIX: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)^commit message:\s*"));
static MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| re(r"\s{2,}"));
static SPACE_BEFORE_SCOPE: LazyLock<Regex> = LazyLock::new(|| re(r"^([a-zA-Z]+)\s+\("));
static SCOPE_THEN_SPACE: LazyLock<Regex> = LazyLock::new(|| re(r"^([a-zA-Z]+\([^)]+\)!?)\s+"));
static SUBJECT: LazyLock<Regex> =
    LazyLock::new(|| re(r"^([a-zA-Z]+)(\([^)]+\))?(!)?(:\s*)(.*)$"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| re(r"\s+"));

/// Turn raw model output into a Conventional Commit message, moving `ticket`
/// (when given) out of the subject and into a footer line.
pub fn normalize(raw: &str, ticket: Option<&str>) -> String {
    let text = strip_artifacts(raw);

    let mut lines: Vec<&str> = text.split('\n').collect();
    let subject = normalize_subject(lines[0], ticket);
    lines[0] = &subject;
    let message = lines.join("\n");

    match ticket {
        Some(id) if !mentions_ticket(&message, id) => format!("{message}\n\n{id}"),
        _ => message,
    }
}

/// Code fences, wrapping quotes and a "Commit message:" label.
fn strip_artifacts(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // An info string such as "```text" is a single word on the fence line.
        text = match rest.split_once('\n') {
            Some((info, body)) if !info.trim().contains([' ', ':']) => body,
            _ => rest,
        };
    }
    text = text.strip_suffix("```").unwrap_or(text).trim();

    text = text.strip_prefix(['"', '\'']).unwrap_or(text);
    text = text.strip_suffix(['"', '\'']).unwrap_or(text);

    PREFIX.replace(text, "").into_owned()
}

fn normalize_subject(line: &str, ticket: Option<&str>) -> String {
    let mut line = line.to_string();

    if let Some(id) = ticket {
        let around = re(&format!(r"\s*\b{}\b\s*", regex::escape(id)));
        let removed = around.replace_all(&line, " ");
        line = MULTI_SPACE.replace_all(removed.trim(), " ").into_owned();
    }

    line = SPACE_BEFORE_SCOPE.replace(&line, "$1(").into_owned();
    line = insert_missing_colon(&line);

    let Some(caps) = SUBJECT.captures(&line) else {
        return line;
    };
    rebuild_subject(&caps)
}

/// `feat(ui) add x` becomes `feat(ui): add x`.
fn insert_missing_colon(line: &str) -> String {
    match SCOPE_THEN_SPACE.captures(line) {
        Some(caps) => {
            let whole = caps.get(0).map_or(0, |m| m.end());
            let rest = &line[whole..];
            if rest.starts_with(':') {
                return line.to_string();
            }
            format!("{}: {rest}", &caps[1])
        }
        None => line.to_string(),
    }
}

fn rebuild_subject(caps: &Captures) -> String {
    let kind = caps[1].to_lowercase();
    let scope = caps
        .get(2)
        .map(|m| {
            let inner = m.as_str().trim_start_matches('(').trim_end_matches(')');
            format!("({})", WHITESPACE.replace_all(inner.trim(), "-").to_lowercase())
        })
        .unwrap_or_default();
    let bang = caps.get(3).map_or("", |m| m.as_str());
    let description = lowercase_description(&caps[5]);
    let description = description.trim_end_matches(['.', '!', '?']);

    format!("{kind}{scope}{bang}: {description}")
}

/// Lowercase the first letter. A Title Cased description ("Add Dark Mode")
/// is brought down to sentence case, leaving acronyms and identifiers alone.
fn lowercase_description(description: &str) -> String {
    let words: Vec<&str> = description.split(' ').collect();
    let title_cased = words.len() > 1
        && words
            .iter()
            .filter(|w| w.starts_with(|c: char| c.is_alphabetic()))
            .all(|w| w.starts_with(|c: char| c.is_uppercase()));

    if title_cased {
        return words
            .iter()
            .map(|w| {
                if is_capitalized_word(w) {
                    w.to_lowercase()
                } else {
                    w.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
    }

    let mut chars = description.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `Thing` or `Thing.`, but not `API` or `OAuth2`.
fn is_capitalized_word(word: &str) -> bool {
    let mut chars = word.trim_end_matches(['.', '!', '?', ',']).chars();
    chars.next().is_some_and(|c| c.is_uppercase()) && chars.all(|c| c.is_lowercase())
}
