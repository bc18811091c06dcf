use reqwest::Url;
use stencil_core::application::StageError;

/// A template location inside a GitLab project.
///
/// Accepted forms (groups may be nested):
///
/// ```text
/// https://gitlab.com/<group>/<project>
/// https://gitlab.com/<group>/<sub>/<project>/-/tree/<ref>/<path>
/// https://gitlab.com/<group>/<project>/-/blob/<ref>/<path>/template.yaml
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitlabSource {
    /// `group/project`, including any subgroups.
    pub project: String,
    pub reference: Option<String>,
    pub path: String,
}

impl GitlabSource {
    pub fn parse(target: &str) -> Result<Self, StageError> {
        let invalid = || StageError::SourceNotFound {
            path: target.to_string(),
        };

        let url = Url::parse(target).map_err(|_| invalid())?;
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let (project, rest) = match segments.iter().position(|s| *s == "-") {
            Some(idx) => (&segments[..idx], &segments[idx + 1..]),
            None => (segments.as_slice(), &[][..]),
        };
        if project.len() < 2 {
            return Err(invalid());
        }
        let project = project.join("/").trim_end_matches(".git").to_string();

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
            project,
            reference,
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_root() {
        let source = GitlabSource::parse("https://gitlab.com/acme/templates").unwrap();
        assert_eq!(source.project, "acme/templates");
        assert_eq!(source.reference, None);
        assert_eq!(source.path, "");
    }

    #[test]
    fn nested_groups_and_tree() {
        let source =
            GitlabSource::parse("https://gitlab.example/acme/platform/tpl/-/tree/dev/svc").unwrap();
        assert_eq!(source.project, "acme/platform/tpl");
        assert_eq!(source.reference.as_deref(), Some("dev"));
        assert_eq!(source.path, "svc");
    }

    #[test]
    fn blob_selects_parent() {
        let source =
            GitlabSource::parse("https://gitlab.com/acme/tpl/-/blob/main/svc/template.yaml")
                .unwrap();
        assert_eq!(source.path, "svc");
    }

    #[test]
    fn single_segment_is_not_a_project() {
        assert!(GitlabSource::parse("https://gitlab.com/acme").is_err());
        assert!(GitlabSource::parse("https://gitlab.com/acme/tpl/-/issues/1").is_err());
    }
}
