//! Scaffold request model.
//!
//! A [`TemplateDescriptor`] is everything one job needs: where the template
//! lives, which engine renders it, the rendering parameters, and where the
//! result is published. Descriptors are only obtainable through the builder,
//! so every descriptor the orchestrator sees has already been validated.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{DomainError, DomainValidator, Visibility};

/// Rendering parameters.
///
/// A `BTreeMap` so that iteration (and anything derived from it, such as a
/// generated `cookiecutter.json`) is independent of insertion order.
pub type Parameters = BTreeMap<String, Value>;

// ============================================================================
// TemplateLocation
// ============================================================================

/// Where a template comes from: `<scheme>:<target>`.
///
/// The scheme selects the preparer; the target is interpreted by that
/// preparer (a path for `file`, a URL for the remote hosts).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TemplateLocation {
    scheme: String,
    target: String,
}

impl TemplateLocation {
    pub fn new(scheme: impl Into<String>, target: impl Into<String>) -> Result<Self, DomainError> {
        let scheme = scheme.into();
        let target = target.into();
        let display = format!("{scheme}:{target}");

        if scheme.trim().is_empty() {
            return Err(DomainError::InvalidLocation {
                location: display,
                reason: "scheme is empty".into(),
            });
        }
        if scheme.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidLocation {
                location: display,
                reason: "scheme contains whitespace".into(),
            });
        }
        if target.trim().is_empty() {
            return Err(DomainError::InvalidLocation {
                location: display,
                reason: "target is empty".into(),
            });
        }

        Ok(Self { scheme, target })
    }

    /// Parse `<scheme>:<target>`, splitting at the first `:`.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let (scheme, target) = raw
            .split_once(':')
            .ok_or_else(|| DomainError::InvalidLocation {
                location: raw.to_string(),
                reason: "expected <scheme>:<target>".into(),
            })?;
        Self::new(scheme.trim(), target.trim())
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl FromStr for TemplateLocation {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TemplateLocation {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TemplateLocation> for String {
    fn from(value: TemplateLocation) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TemplateLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.target)
    }
}

// ============================================================================
// PublishTarget
// ============================================================================

/// Where the rendered repository is published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishTarget {
    /// Publisher scheme (`github`, `gitlab`, `gitlab/api`, ...).
    pub scheme: String,
    /// User, organization, or (GitLab) group path.
    pub owner: String,
    pub name: String,
    /// `None` means "use the publisher's configured default".
    pub visibility: Option<Visibility>,
}

impl PublishTarget {
    pub fn new(
        scheme: impl Into<String>,
        owner: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            owner: owner.into(),
            name: name.into(),
            visibility: None,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for PublishTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.scheme, self.owner, self.name)
    }
}

// ============================================================================
// TemplateDescriptor
// ============================================================================

/// A validated scaffold request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateDescriptor {
    location: TemplateLocation,
    engine: Option<String>,
    target: PublishTarget,
    parameters: Parameters,
}

impl TemplateDescriptor {
    pub fn builder() -> TemplateDescriptorBuilder {
        TemplateDescriptorBuilder::default()
    }

    pub fn location(&self) -> &TemplateLocation {
        &self.location
    }

    /// Engine selector; `None` defers to the orchestrator's default engine.
    pub fn engine(&self) -> Option<&str> {
        self.engine.as_deref()
    }

    pub fn target(&self) -> &PublishTarget {
        &self.target
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }
}

/// Builder for [`TemplateDescriptor`].
///
/// Errors from parsing are deferred to [`build`](Self::build) so call-sites
/// can chain freely.
#[derive(Debug, Default)]
pub struct TemplateDescriptorBuilder {
    location: Option<String>,
    engine: Option<String>,
    target: Option<PublishTarget>,
    parameters: Parameters,
}

impl TemplateDescriptorBuilder {
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    pub fn target(mut self, target: PublishTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn parameters(mut self, parameters: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn build(self) -> Result<TemplateDescriptor, DomainError> {
        let location = self
            .location
            .ok_or(DomainError::MissingRequiredField { field: "location" })?;
        let location = TemplateLocation::parse(&location)?;
        let target = self
            .target
            .ok_or(DomainError::MissingRequiredField { field: "target" })?;

        let engine = match self.engine {
            Some(engine) if engine.trim().is_empty() => None,
            other => other,
        };

        let descriptor = TemplateDescriptor {
            location,
            engine,
            target,
            parameters: self.parameters,
        };
        DomainValidator::validate_descriptor(&descriptor)?;
        Ok(descriptor)
    }
}
