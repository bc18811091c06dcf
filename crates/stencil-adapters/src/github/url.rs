use reqwest::Url;
use stencil_core::application::StageError;

/// A template location inside a GitHub repository.
///
/// Accepted forms:
///
/// ```text
/// https://github.com/<owner>/<repo>
/// https://github.com/<owner>/<repo>/tree/<ref>/<path>
/// https://github.com/<owner>/<repo>/blob/<ref>/<path>/template.yaml
/// ```
///
/// A `blob` URL points at a file; its parent directory is the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubSource {
    pub owner: String,
    pub repo: String,
    /// Branch, tag or commit; `None` means the default branch.
    pub reference: Option<String>,
    /// Slash-separated sub-path, empty for the repository root.
    pub path: String,
}

impl GithubSource {
    pub fn parse(target: &str) -> Result<Self, StageError> {
        let invalid = || StageError::SourceNotFound {
            path: target.to_string(),
        };

        let url = Url::parse(target).map_err(|_| invalid())?;
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let [owner, repo, rest @ ..] = segments.as_slice() else {
            return Err(invalid());
        };
        let repo = repo.trim_end_matches(".git");

        let (reference, path) = match rest {
            [] => (None, String::new()),
            [kind @ ("tree" | "blob"), reference, path @ ..] => {
                let path = if *kind == "blob" {
                    path.split_last().map(|(_, dir)| dir).unwrap_or_default()
                } else {
                    path
                };
                (Some(reference.to_string()), path.join("/"))
            }
            _ => return Err(invalid()),
        };

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            reference,
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_root() {
        let source = GithubSource::parse("https://github.com/acme/templates").unwrap();
        assert_eq!(source.owner, "acme");
        assert_eq!(source.repo, "templates");
        assert_eq!(source.reference, None);
        assert_eq!(source.path, "");
    }

    #[test]
    fn tree_url_with_sub_path() {
        let source =
            GithubSource::parse("https://github.com/acme/templates/tree/main/services/api").unwrap();
        assert_eq!(source.reference.as_deref(), Some("main"));
        assert_eq!(source.path, "services/api");
    }

    #[test]
    fn blob_url_selects_parent_directory() {
        let source = GithubSource::parse(
            "https://github.com/acme/templates/blob/v2/services/api/template.yaml",
        )
        .unwrap();
        assert_eq!(source.reference.as_deref(), Some("v2"));
        assert_eq!(source.path, "services/api");
    }

    #[test]
    fn git_suffix_is_dropped() {
        let source = GithubSource::parse("https://github.com/acme/templates.git").unwrap();
        assert_eq!(source.repo, "templates");
    }

    #[test]
    fn malformed_urls_are_rejected() {
        for bad in [
            "not a url",
            "https://github.com/acme",
            "https://github.com/acme/templates/pulls/1",
        ] {
            assert!(
                matches!(GithubSource::parse(bad), Err(StageError::SourceNotFound { .. })),
                "{bad}"
            );
        }
    }
}
