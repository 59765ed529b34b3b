pub const COMMIT_RULES: &str = r#"Generate a Conventional Commit message. Return ONLY the commit message, nothing else.

Format: type(scope): description

Types:
- feat: new feature or capability
- fix: bug fix
- refactor: code change that neither fixes a bug nor adds a feature
- docs: documentation only
- test: adding or updating tests
- chore: maintenance tasks, dependencies
- style: formatting, whitespace (not CSS)
- perf: performance improvement
- build: build system or external dependencies
- ci: CI configuration
- revert: reverting a previous commit

Rules:
- Type must be lowercase (feat, not Feat or FEAT)
- Description must start lowercase (add feature, not Add feature)
- Start the description with a verb such as add, fix, update, remove, extract, rename, support
- Use imperative mood ("add feature" not "added feature" or "adds feature")
- No period at the end
- Scope is optional; use kebab-case with no space before it: type(scope): not type (scope):
- Keep under 50 characters (max 72 characters)
- Be specific, not vague ("add password validation" not "update auth")
- Never start with a ticket ID (e.g. don't start with ECHO-1234)

Examples:
- feat(auth): add OAuth2 login support
- fix(cart): prevent duplicate items when clicking rapidly
- refactor(api): extract validation logic into middleware
- docs: update installation instructions
- chore: upgrade webpack to v5"#;

/// Tiny prompt used to check a backend answers at all.
pub const PING: &str = "Say hi";
