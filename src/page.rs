use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use url::Url;

static PR_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/[^/]+/[^/]+/pull-requests/\d+").expect("valid pull request path regex")
});

/// Read access to the code-review page the merge dialog lives on.
///
/// Missing fields are empty strings or `None`; none of these can fail.
pub trait PageSource {
    /// Full URL (or absolute path) of the current view.
    fn location(&self) -> &str;
    fn title(&self) -> &str;
    /// Only rendered on the overview tab.
    fn description(&self) -> &str;
    fn ticket_link_href(&self) -> Option<&str>;
    fn ticket_link_text(&self) -> &str;
    fn source_branch(&self) -> &str;
}

/// Stable identity of the pull request being viewed: `/<owner>/<repo>/pull-requests/<n>`.
///
/// Query, hash and sub-tab segments are ignored; `None` when not on a PR page.
pub fn page_key(location: &str) -> Option<String> {
    let url = Url::parse(location)
        .or_else(|_| Url::parse("https://localhost/").and_then(|base| base.join(location)))
        .ok()?;
    PR_PATH.find(url.path()).map(|m| m.as_str().to_string())
}

/// One rendering of the page, loaded from JSON.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    pub description: String,
    pub ticket_link_href: Option<String>,
    pub ticket_link_text: String,
    pub source_branch: String,
}

impl PageSnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read page snapshot {:?}", path))?;
        serde_json::from_str(&data)
            .with_context(|| format!("failed to parse page snapshot {:?}", path))
    }
}

impl PageSource for PageSnapshot {
    fn location(&self) -> &str {
        &self.url
    }

    fn title(&self) -> &str {
        self.title.trim()
    }

    fn description(&self) -> &str {
        self.description.trim()
    }

    fn ticket_link_href(&self) -> Option<&str> {
        self.ticket_link_href.as_deref()
    }

    fn ticket_link_text(&self) -> &str {
        self.ticket_link_text.trim()
    }

    fn source_branch(&self) -> &str {
        self.source_branch.trim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ignores_query_hash_and_tabs() {
        let expected = Some("/acme/shop/pull-requests/42".to_string());
        assert_eq!(page_key("https://bitbucket.org/acme/shop/pull-requests/42"), expected);
        assert_eq!(
            page_key("https://bitbucket.org/acme/shop/pull-requests/42/diff?w=1#chg-src"),
            expected
        );
        assert_eq!(page_key("/acme/shop/pull-requests/42/commits"), expected);
    }

    #[test]
    fn key_is_none_off_pull_request_pages() {
        assert_eq!(page_key("https://bitbucket.org/acme/shop/src/main/"), None);
        assert_eq!(page_key(""), None);
    }

    #[test]
    fn snapshot_parses_partial_json() {
        let snap: PageSnapshot =
            serde_json::from_str(r#"{"url": "/a/b/pull-requests/1", "title": " Fix it "}"#).unwrap();
        assert_eq!(snap.title(), "Fix it");
        assert_eq!(snap.description(), "");
        assert_eq!(snap.ticket_link_href(), None);
    }
}
