use crate::llm::prompts;

pub use prompts::PING;

/// Build the generation prompt: fixed commit rules, then whatever context we have.
///
/// Blank fields are left out entirely. The developer's own notes come first and
/// are marked as taking priority over the pull request metadata.
pub fn build_prompt(
    notes: &str,
    pr_title: &str,
    pr_description: &str,
    ticket_title: Option<&str>,
) -> String {
    let mut out = String::from(prompts::COMMIT_RULES);
    out.push_str("\n\n");

    let notes = notes.trim();
    if !notes.is_empty() {
        out.push_str(&format!("User's notes (prioritize this over the PR details):\n{notes}\n\n"));
    }

    out.push_str(&format!("PR Title: {}\n", pr_title.trim()));

    if let Some(ticket_title) = ticket_title.map(str::trim).filter(|t| !t.is_empty()) {
        out.push_str(&format!("Ticket Title: {ticket_title}\n"));
    }

    let description = pr_description.trim();
    if !description.is_empty() {
        out.push_str(&format!("\nPR Description:\n{description}"));
    }

    out.trim().to_string()
}
