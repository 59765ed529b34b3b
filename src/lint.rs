use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::ticket::{find_ticket_id, mentions_ticket};

/// Conventional Commit types accepted in the subject line.
pub const ALLOWED_TYPES: [&str; 11] = [
    "build", "chore", "ci", "docs", "feat", "fix", "perf", "refactor", "revert", "style", "test",
];

const SUBJECT_MAX: usize = 72;
const SUBJECT_PREFERRED: usize = 50;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid lint regex")
}

static LEADING_TICKET: LazyLock<Regex> = LazyLock::new(|| re(r"^[A-Z]+-[0-9]+"));
static SCOPE_WITHOUT_COLON: LazyLock<Regex> = LazyLock::new(|| re(r"^[a-z]+\([^)]+\)!?\s+\w"));
static SPACE_BEFORE_SCOPE: LazyLock<Regex> = LazyLock::new(|| re(r"^[a-z]+\s+\("));
static TYPE_TOKEN: LazyLock<Regex> = LazyLock::new(|| re(r"^([A-Za-z]+)(\(|!|:)"));
static SCOPE: LazyLock<Regex> = LazyLock::new(|| re(r"^[a-z]+\(([^)]+)\)!?:"));
static KEBAB: LazyLock<Regex> = LazyLock::new(|| re(r"^[a-z0-9-]+$"));
static SUBJECT: LazyLock<Regex> = LazyLock::new(|| re(r"^([a-z]+)(\(([a-z0-9-]+)\))?!?: .+"));

/// How serious a lint finding is. Errors block the merge, warnings are advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    None,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of linting one message. At most one error is ever reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub severity: Severity,
}

impl LintResult {
    fn valid() -> Self {
        LintResult {
            is_valid: true,
            errors: Vec::new(),
            severity: Severity::None,
        }
    }

    /// Whether the merge should be refused.
    pub fn blocks_merge(&self) -> bool {
        self.severity == Severity::Error
    }
}

struct Violation {
    severity: Severity,
    message: String,
}

impl Violation {
    fn error(message: impl Into<String>) -> Option<Self> {
        Some(Violation {
            severity: Severity::Error,
            message: message.into(),
        })
    }

    fn warning(message: impl Into<String>) -> Option<Self> {
        Some(Violation {
            severity: Severity::Warning,
            message: message.into(),
        })
    }
}

impl From<Violation> for LintResult {
    fn from(v: Violation) -> Self {
        LintResult {
            is_valid: false,
            errors: vec![v.message],
            severity: v.severity,
        }
    }
}

/// The pieces of a message every rule looks at, computed once per call.
struct Candidate<'a> {
    message: &'a str,
    subject: &'a str,
    description: &'a str,
    ticket: Option<&'a str>,
    context_ticket: Option<&'a str>,
}

impl<'a> Candidate<'a> {
    fn new(message: &'a str, context_title: Option<&'a str>) -> Self {
        let subject = message.lines().next().unwrap_or("");
        let description = subject.split_once(": ").map(|(_, d)| d).unwrap_or("");
        Candidate {
            message,
            subject,
            description,
            ticket: find_ticket_id(message),
            context_ticket: context_title.and_then(find_ticket_id),
        }
    }

    fn body_lines(&self) -> impl Iterator<Item = &'a str> {
        self.message.lines().skip(1)
    }
}

type Rule = fn(&Candidate) -> Option<Violation>;

/// Evaluated top to bottom; the first rule that fires is the only one reported.
/// All error rules precede the warning rules.
const RULES: &[Rule] = &[
    empty,
    leading_ticket,
    scope_without_colon,
    space_before_scope,
    uppercase_type,
    non_kebab_scope,
    malformed_subject,
    unknown_type,
    missing_description,
    uppercase_description,
    trailing_punctuation,
    subject_too_long,
    subject_longer_than_preferred,
    ticket_in_subject,
    ticket_missing_from_footer,
    context_ticket_missing,
];

/// Lint a commit message against the Conventional Commits grammar.
///
/// `context_title` is the pull request title; a ticket id found there must also
/// appear somewhere in the message.
pub fn lint(message: &str, context_title: Option<&str>) -> LintResult {
    let candidate = Candidate::new(message.trim(), context_title);

    RULES
        .iter()
        .find_map(|rule| rule(&candidate))
        .map(LintResult::from)
        .unwrap_or_else(LintResult::valid)
}

fn empty(c: &Candidate) -> Option<Violation> {
    if c.message.is_empty() {
        return Violation::error("Add a commit message; an empty commit message can't be merged.");
    }
    None
}

fn leading_ticket(c: &Candidate) -> Option<Violation> {
    if LEADING_TICKET.is_match(c.message) {
        return Violation::error("Move the ticket to the end, not the start.");
    }
    None
}

fn scope_without_colon(c: &Candidate) -> Option<Violation> {
    if SCOPE_WITHOUT_COLON.is_match(c.message) {
        return Violation::error("Add a colon after the scope: type(scope): description");
    }
    None
}

fn space_before_scope(c: &Candidate) -> Option<Violation> {
    if SPACE_BEFORE_SCOPE.is_match(c.message) {
        return Violation::error("Remove the space before the scope: type(scope):");
    }
    None
}

fn uppercase_type(c: &Candidate) -> Option<Violation> {
    let kind = TYPE_TOKEN.captures(c.message)?.get(1)?.as_str();
    if kind.contains(|ch: char| ch.is_ascii_uppercase()) {
        return Violation::error("Type should be lowercase (e.g. feat, fix, chore).");
    }
    None
}

fn non_kebab_scope(c: &Candidate) -> Option<Violation> {
    let scope = SCOPE.captures(c.message)?.get(1)?.as_str();
    if !KEBAB.is_match(scope) {
        return Violation::error("Scope should be kebab-case (e.g. user-auth).");
    }
    None
}

fn malformed_subject(c: &Candidate) -> Option<Violation> {
    if !SUBJECT.is_match(c.message) {
        return Violation::error("Try: type(scope): description or type: description");
    }
    None
}

fn unknown_type(c: &Candidate) -> Option<Violation> {
    let kind = SUBJECT.captures(c.message)?.get(1)?.as_str();
    if !ALLOWED_TYPES.contains(&kind) {
        return Violation::error(format!(
            "\"{kind}\" isn't a standard type. Try feat, fix, chore, etc."
        ));
    }
    None
}

fn missing_description(c: &Candidate) -> Option<Violation> {
    if c.description.is_empty() {
        return Violation::error("Add a description after the colon.");
    }
    None
}

fn uppercase_description(c: &Candidate) -> Option<Violation> {
    if c.description.starts_with(|ch: char| ch.is_ascii_uppercase()) {
        return Violation::warning("Lowercase descriptions are preferred.");
    }
    None
}

fn trailing_punctuation(c: &Candidate) -> Option<Violation> {
    if c.description.ends_with(['.', '!', '?']) {
        return Violation::warning("Skip the ending punctuation.");
    }
    None
}

fn subject_too_long(c: &Candidate) -> Option<Violation> {
    if c.subject.chars().count() > SUBJECT_MAX {
        return Violation::warning(format!(
            "Keep the subject line under {SUBJECT_MAX} characters."
        ));
    }
    None
}

fn subject_longer_than_preferred(c: &Candidate) -> Option<Violation> {
    if c.subject.chars().count() > SUBJECT_PREFERRED {
        return Violation::warning(format!(
            "Subject lines under {SUBJECT_PREFERRED} characters are easier to read."
        ));
    }
    None
}

fn ticket_in_subject(c: &Candidate) -> Option<Violation> {
    let ticket = c.ticket?;
    if mentions_ticket(c.subject, ticket) {
        return Violation::warning(format!("Consider moving {ticket} to the footer."));
    }
    None
}

fn ticket_missing_from_footer(c: &Candidate) -> Option<Violation> {
    let ticket = c.ticket?;
    if !c.body_lines().any(|line| mentions_ticket(line, ticket)) {
        return Violation::warning(format!("The ticket {ticket} works best in the footer."));
    }
    None
}

fn context_ticket_missing(c: &Candidate) -> Option<Violation> {
    let ticket = c.context_ticket?;
    if !mentions_ticket(c.message, ticket) {
        return Violation::warning(format!(
            "Add the ticket ({ticket}) from the pull request title to the commit."
        ));
    }
    None
}
