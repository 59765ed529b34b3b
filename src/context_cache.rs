use crate::page::{page_key, PageSource};
use crate::ticket::TicketReference;

/// Pull request context that is only rendered on some page views.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedContext {
    pub description: Option<String>,
    pub ticket: Option<TicketReference>,
}

/// Remembers the description and linked ticket of the pull request being viewed,
/// so they survive switching to a tab that doesn't render them.
///
/// Entries never mix two pull requests: a page key change drops both fields.
#[derive(Debug, Default)]
pub struct PrContextCache {
    page_key: Option<String>,
    context: CachedContext,
}

impl PrContextCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-read the page. Fresh values overwrite, missing ones keep what we had.
    pub fn refresh(&mut self, page: &dyn PageSource) {
        let key = page_key(page.location());
        if key != self.page_key {
            log::debug!(
                "Page changed ({:?} -> {:?}); dropping cached context",
                self.page_key,
                key
            );
            self.page_key = key;
            self.context = CachedContext::default();
        }

        let description = page.description().trim();
        if !description.is_empty() {
            self.context.description = Some(description.to_string());
        }

        if let Some(href) = page.ticket_link_href() {
            if let Some(ticket) = TicketReference::from_link(href, page.ticket_link_text()) {
                log::trace!("Cached ticket {} from page link", ticket.id());
                self.context.ticket = Some(ticket);
            }
        }
    }

    pub fn get(&self) -> &CachedContext {
        &self.context
    }

    pub fn page_key(&self) -> Option<&str> {
        self.page_key.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageSnapshot;

    fn overview(url: &str) -> PageSnapshot {
        PageSnapshot {
            url: url.into(),
            title: "Add dark mode".into(),
            description: "Adds a toggle to settings.".into(),
            ticket_link_href: Some("https://acme.atlassian.net/browse/ECHO-7".into()),
            ticket_link_text: "ECHO-7 Dark mode".into(),
            ..Default::default()
        }
    }

    fn diff_tab(url: &str) -> PageSnapshot {
        PageSnapshot {
            url: url.into(),
            title: "Add dark mode".into(),
            ..Default::default()
        }
    }

    #[test]
    fn caches_overview_fields() {
        let mut cache = PrContextCache::new();
        cache.refresh(&overview("https://bitbucket.org/acme/web/pull-requests/3"));

        let ctx = cache.get();
        assert_eq!(ctx.description.as_deref(), Some("Adds a toggle to settings."));
        let ticket = ctx.ticket.as_ref().unwrap();
        assert_eq!(ticket.id(), "ECHO-7");
        assert_eq!(ticket.title(), "Dark mode");
        assert_eq!(cache.page_key(), Some("/acme/web/pull-requests/3"));
    }

    #[test]
    fn keeps_fields_missing_from_same_page() {
        let mut cache = PrContextCache::new();
        cache.refresh(&overview("https://bitbucket.org/acme/web/pull-requests/3"));
        cache.refresh(&diff_tab("https://bitbucket.org/acme/web/pull-requests/3/diff#x"));
        cache.refresh(&diff_tab("https://bitbucket.org/acme/web/pull-requests/3/diff?y=1"));

        let ctx = cache.get();
        assert_eq!(ctx.description.as_deref(), Some("Adds a toggle to settings."));
        assert_eq!(ctx.ticket.as_ref().map(|t| t.id()), Some("ECHO-7"));
    }

    #[test]
    fn page_change_clears_both_fields() {
        let mut cache = PrContextCache::new();
        cache.refresh(&overview("https://bitbucket.org/acme/web/pull-requests/3"));
        cache.refresh(&diff_tab("https://bitbucket.org/acme/web/pull-requests/4/diff"));

        assert_eq!(cache.get(), &CachedContext::default());
        assert_eq!(cache.page_key(), Some("/acme/web/pull-requests/4"));
    }

    #[test]
    fn fresh_values_overwrite() {
        let mut cache = PrContextCache::new();
        let url = "https://bitbucket.org/acme/web/pull-requests/3";
        cache.refresh(&overview(url));

        let mut edited = overview(url);
        edited.description = "Now with system theme detection.".into();
        cache.refresh(&edited);

        assert_eq!(
            cache.get().description.as_deref(),
            Some("Now with system theme detection.")
        );
    }

    #[test]
    fn link_without_ticket_id_keeps_cached_ticket() {
        let mut cache = PrContextCache::new();
        let url = "https://bitbucket.org/acme/web/pull-requests/3";
        cache.refresh(&overview(url));

        let mut page = diff_tab(url);
        page.ticket_link_href = Some("https://acme.atlassian.net/jira".into());
        cache.refresh(&page);

        assert_eq!(cache.get().ticket.as_ref().map(|t| t.id()), Some("ECHO-7"));
    }
}
