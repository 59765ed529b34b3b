use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::PathBuf;
use std::process::Command as GitCommand;

/// Run a git command and capture trimmed stdout.
fn git_output(args: &[&str]) -> Result<String> {
    let output = GitCommand::new("git")
        .args(args)
        .output()
        .with_context(|| format!("failed to run git {:?}", args))?;

    if !output.status.success() {
        return Err(anyhow!(
            "git {:?} exited with status {:?}",
            args,
            output.status.code()
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Branch checked out in the working directory, if we are inside a repository.
pub fn current_branch() -> Option<String> {
    match git_output(&["rev-parse", "--abbrev-ref", "HEAD"]) {
        Ok(name) if !name.is_empty() && name != "HEAD" => Some(name),
        Ok(_) => None,
        Err(e) => {
            log::debug!("No current branch: {e:#}");
            None
        }
    }
}

/// Write the message into .git/COMMIT_EDITMSG so the next `git commit` or
/// `git merge` editor starts from it.
pub fn write_commit_editmsg(message: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(git_output(&["rev-parse", "--git-dir"])?);
    let path = dir.join("COMMIT_EDITMSG");
    fs::write(&path, format!("{message}\n"))
        .with_context(|| format!("failed to write commit message to {:?}", path))?;
    Ok(path)
}
