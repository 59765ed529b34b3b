use regex::Regex;
use std::sync::LazyLock;

/// An issue-tracker key such as `ECHO-1234`: uppercase project key, hyphen, number.
static TICKET_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z]+-[0-9]+").expect("valid ticket regex"));

/// Find the first ticket id anywhere in `text`.
///
/// Matching is case-sensitive, so `echo-1234` or `Echo-1234` never match.
pub fn find_ticket_id(text: &str) -> Option<&str> {
    TICKET_ID.find(text).map(|m| m.as_str())
}

/// Whether `id` appears in `text` as a whole ticket id, so `ECHO-1` is not
/// found inside `ECHO-12` or `XECHO-1`.
pub fn mentions_ticket(text: &str, id: &str) -> bool {
    TICKET_ID.find_iter(text).any(|m| m.as_str() == id)
}

/// A ticket linked to the pull request, as extracted from the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketReference {
    id: String,
    title: String,
}

impl TicketReference {
    /// Build a reference from a ticket link. The id comes from the href, the
    /// title is whatever link text remains once the id is removed.
    pub fn from_link(href: &str, text: &str) -> Option<Self> {
        let id = find_ticket_id(href)?;
        let title = text.replace(id, "").trim().to_string();
        Some(TicketReference {
            id: id.to_string(),
            title,
        })
    }

    /// Reference with only an id, found in free text such as a branch name.
    pub fn from_text(text: &str) -> Option<Self> {
        find_ticket_id(text).map(|id| TicketReference {
            id: id.to_string(),
            title: String::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_id_at_any_position() {
        assert_eq!(find_ticket_id("ECHO-1234 fix login bug"), Some("ECHO-1234"));
        assert_eq!(find_ticket_id("fix login bug ECHO-1234 test"), Some("ECHO-1234"));
        assert_eq!(find_ticket_id("fix login bug ECHO-1234"), Some("ECHO-1234"));
    }

    #[test]
    fn mentions_only_whole_ids() {
        assert!(mentions_ticket("fix: x\n\nRefs ECHO-1", "ECHO-1"));
        assert!(mentions_ticket("(ECHO-1)", "ECHO-1"));
        assert!(!mentions_ticket("see ECHO-12", "ECHO-1"));
        assert!(!mentions_ticket("see XECHO-1", "ECHO-1"));
        assert!(!mentions_ticket("see ECHO-1", "ECHO-2"));
    }

    #[test]
    fn first_match_wins() {
        assert_eq!(find_ticket_id("A-1 and B-2"), Some("A-1"));
        assert_eq!(find_ticket_id("ECHO-1234 and PROJ-5678"), Some("ECHO-1234"));
    }

    #[test]
    fn handles_key_lengths() {
        assert_eq!(find_ticket_id("AB-12"), Some("AB-12"));
        assert_eq!(find_ticket_id("ABCDEF-123456"), Some("ABCDEF-123456"));
    }

    #[test]
    fn ignores_lowercase_and_mixed_case() {
        assert_eq!(find_ticket_id("echo-1234"), None);
        assert_eq!(find_ticket_id("Echo-1234"), None);
        assert_eq!(find_ticket_id(""), None);
        assert_eq!(find_ticket_id("fix login bug"), None);
    }

    #[test]
    fn finds_id_in_brackets_and_parens() {
        assert_eq!(find_ticket_id("[ECHO-1234] fix bug"), Some("ECHO-1234"));
        assert_eq!(find_ticket_id("fix bug (ECHO-1234)"), Some("ECHO-1234"));
    }

    #[test]
    fn link_title_drops_the_id() {
        let t = TicketReference::from_link(
            "https://acme.atlassian.net/browse/ECHO-42",
            "ECHO-42 Checkout button double submits",
        )
        .unwrap();
        assert_eq!(t.id(), "ECHO-42");
        assert_eq!(t.title(), "Checkout button double submits");
    }

    #[test]
    fn link_without_id_is_none() {
        assert!(TicketReference::from_link("https://acme.example/board", "ECHO-42").is_none());
    }

    #[test]
    fn branch_name_yields_bare_reference() {
        let t = TicketReference::from_text("feature/ECHO-7-dark-mode").unwrap();
        assert_eq!(t.id(), "ECHO-7");
        assert_eq!(t.title(), "");
    }
}
