//! In-process `{{ key }}` substitution.

use std::{
    fs as stdfs,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use stencil_core::{
    application::{StageError, ports::Templater},
    domain::Parameters,
};
use tracing::{debug, info, instrument};

use crate::fs;

/// Template control file kept out of the rendered output.
pub const CONTROL_FILE: &str = "template.yaml";

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Substitutes `{{ key }}` placeholders in file contents and path segments.
///
/// Output is a pure function of the source tree and parameters, except for
/// the optional generation stamp.
#[derive(Debug, Clone, Default)]
pub struct SimpleTemplater {
    stamp: Option<PathBuf>,
}

impl SimpleTemplater {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also write the generation time (RFC 3339) to `path`, relative to the
    /// output directory.
    pub fn with_stamp(mut self, path: impl Into<PathBuf>) -> Self {
        self.stamp = Some(path.into());
        self
    }
}

#[async_trait]
impl Templater for SimpleTemplater {
    #[instrument(skip(self, parameters), fields(source = %source.display()))]
    async fn template(
        &self,
        source: &Path,
        parameters: &Parameters,
        destination: &Path,
    ) -> Result<(), StageError> {
        let source = source.to_path_buf();
        let destination = destination.to_path_buf();
        let parameters = parameters.clone();
        let stamp = self.stamp.clone();

        let files = fs::blocking(move || {
            let files = render_tree(&source, &parameters, &destination)?;
            if let Some(stamp) = stamp {
                let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
                let rel = stamp.to_string_lossy().replace('\\', "/");
                fs::write_relative(&destination, &rel, format!("{now}\n").as_bytes())?;
            }
            Ok(files)
        })
        .await?;

        info!(files, "Template rendered");
        Ok(())
    }

    fn volatile_paths(&self) -> Vec<PathBuf> {
        self.stamp.iter().cloned().collect()
    }
}

fn render_tree(
    source: &Path,
    parameters: &Parameters,
    destination: &Path,
) -> Result<usize, StageError> {
    let mut files = 0;
    for entry in fs::walk(source) {
        let entry = entry.map_err(|e| StageError::Filesystem {
            path: source.display().to_string(),
            reason: e.to_string(),
        })?;
        let rel = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| StageError::Filesystem {
                path: entry.path().display().to_string(),
                reason: e.to_string(),
            })?;
        let rel_display = rel.to_string_lossy().replace('\\', "/");
        if entry.depth() == 1 && rel_display == CONTROL_FILE {
            continue;
        }

        let mut segments = Vec::new();
        for segment in rel.iter() {
            let rendered = render(&segment.to_string_lossy(), parameters)
                .map_err(|e| e.in_file(&rel_display))?;
            check_segment(&rendered).map_err(|e| e.in_file(&rel_display))?;
            segments.push(rendered);
        }
        let target = fs::safe_join(destination, &segments.join("/")).ok_or_else(|| {
            StageError::render(format!("{rel_display}: path escapes the output directory"))
        })?;

        if entry.file_type().is_dir() {
            stdfs::create_dir_all(&target).map_err(|e| StageError::io(&target, e))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            stdfs::create_dir_all(parent).map_err(|e| StageError::io(parent, e))?;
        }

        let bytes = stdfs::read(entry.path()).map_err(|e| StageError::io(entry.path(), e))?;
        let output = match String::from_utf8(bytes) {
            Ok(text) => render(&text, parameters)
                .map_err(|e| e.in_file(&rel_display))?
                .into_bytes(),
            Err(raw) => {
                debug!(path = %rel_display, "Binary file copied verbatim");
                raw.into_bytes()
            }
        };
        stdfs::write(&target, output).map_err(|e| StageError::io(&target, e))?;
        files += 1;
    }
    Ok(files)
}

/// A rendered path segment must name exactly one entry below its parent.
fn check_segment(segment: &str) -> Result<(), PlaceholderError> {
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\'])
    {
        return Err(PlaceholderError::UnsafeSegment {
            segment: segment.to_string(),
        });
    }
    Ok(())
}

/// Why a placeholder could not be substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderError {
    Unclosed { offset: usize },
    EmptyKey { offset: usize },
    MalformedKey { key: String },
    MissingKey { key: String },
    UnsafeSegment { segment: String },
}

impl PlaceholderError {
    fn in_file(self, file: &str) -> StageError {
        let detail = match self {
            Self::Unclosed { offset } => format!("unclosed '{{{{' at byte {offset}"),
            Self::EmptyKey { offset } => format!("empty placeholder at byte {offset}"),
            Self::MalformedKey { key } => format!("malformed placeholder key '{key}'"),
            Self::MissingKey { key } => format!("no value for parameter '{key}'"),
            Self::UnsafeSegment { segment } => {
                format!("rendered path segment '{segment}' is not a plain name")
            }
        };
        StageError::render(format!("{file}: {detail}"))
    }
}

/// Substitute every `{{ key }}` in `text`.
pub fn render(text: &str, parameters: &Parameters) -> Result<String, PlaceholderError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut offset = 0;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            return Err(PlaceholderError::Unclosed {
                offset: offset + start,
            });
        };

        let key = after_open[..end].trim();
        if key.is_empty() {
            return Err(PlaceholderError::EmptyKey {
                offset: offset + start,
            });
        }
        if !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            return Err(PlaceholderError::MalformedKey {
                key: key.to_string(),
            });
        }
        let value = parameters
            .get(key)
            .ok_or_else(|| PlaceholderError::MissingKey {
                key: key.to_string(),
            })?;
        out.push_str(&scalar_text(value));

        let consumed = start + OPEN.len() + end + CLOSE.len();
        offset += consumed;
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    Ok(out)
}

/// JSON scalar text of `value`; strings are unquoted, `null` is empty.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
