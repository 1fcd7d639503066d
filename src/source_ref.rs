//! Repository URL parsing.
//!
//! The parse is strictly position-based: after trimming trailing slashes
//! and splitting on `/`, the 4th and 5th segments are owner and repository
//! and an optional `tree/<branch>` pair follows. The host is not checked.
//!
//! ```text
//! https://github.com/acme/widgets/tree/dev
//! [0]    [1] [2]     [3]  [4]     [5]  [6]
//! ```

use crate::error::IngestError;
use crate::models::RepositoryReference;

/// Branch used when the URL does not name one.
pub const DEFAULT_BRANCH: &str = "main";

/// Parse a repository URL into owner, name, and branch.
pub fn parse(url: &str) -> Result<RepositoryReference, IngestError> {
    let trimmed = url.trim().trim_end_matches('/');
    let parts: Vec<&str> = trimmed.split('/').collect();

    if parts.len() < 5 {
        return Err(parse_error(url, "expected https://<host>/<owner>/<repo>"));
    }

    let owner = parts[3];
    let name = parts[4].trim_end_matches(".git");
    if owner.is_empty() {
        return Err(parse_error(url, "missing owner"));
    }
    if name.is_empty() {
        return Err(parse_error(url, "missing repository name"));
    }
    // Dot segments would be resolved away when joined onto the API base.
    if is_dot_segment(owner) || is_dot_segment(name) {
        return Err(parse_error(url, "owner and repository must not be '.' or '..'"));
    }

    let branch = match (parts.get(5), parts.get(6)) {
        (Some(&"tree"), Some(branch)) if !branch.is_empty() => *branch,
        _ => DEFAULT_BRANCH,
    };

    Ok(RepositoryReference {
        owner: owner.to_string(),
        name: name.to_string(),
        branch: branch.to_string(),
    })
}

fn is_dot_segment(s: &str) -> bool {
    s == "." || s == ".."
}

fn parse_error(input: &str, reason: &str) -> IngestError {
    IngestError::Parse {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn reference(owner: &str, name: &str, branch: &str) -> RepositoryReference {
        RepositoryReference {
            owner: owner.into(),
            name: name.into(),
            branch: branch.into(),
        }
    }

    #[test]
    fn default_branch_is_main() {
        assert_eq!(
            parse("https://github.com/acme/widgets").unwrap(),
            reference("acme", "widgets", "main")
        );
    }

    #[test]
    fn tree_segment_selects_branch() {
        assert_eq!(
            parse("https://github.com/acme/widgets/tree/dev").unwrap(),
            reference("acme", "widgets", "dev")
        );
    }

    #[test]
    fn trailing_slashes_and_whitespace_are_ignored() {
        assert_eq!(
            parse("  https://github.com/acme/widgets/tree/dev///  ").unwrap(),
            reference("acme", "widgets", "dev")
        );
    }

    #[test]
    fn non_tree_suffix_keeps_default_branch() {
        assert_eq!(
            parse("https://github.com/acme/widgets/blob/dev/README.md").unwrap(),
            reference("acme", "widgets", "main")
        );
        assert_eq!(
            parse("https://github.com/acme/widgets/tree").unwrap(),
            reference("acme", "widgets", "main")
        );
    }

    #[test]
    fn clone_suffix_is_stripped() {
        assert_eq!(
            parse("https://github.com/acme/widgets.git").unwrap(),
            reference("acme", "widgets", "main")
        );
    }

    #[test]
    fn host_is_not_validated() {
        assert_eq!(
            parse("https://git.example.org/team/tool").unwrap(),
            reference("team", "tool", "main")
        );
    }

    #[test]
    fn malformed_urls_fail() {
        for input in [
            "not-a-url",
            "",
            "https://github.com/acme",
            "https://github.com//widgets",
            "https://github.com/../widgets",
            "https://github.com/acme/..",
            "https://github.com/./widgets",
            "https://github.com/acme/..git",
        ] {
            let err = parse(input).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Parse, "input {:?}", input);
        }
    }
}
