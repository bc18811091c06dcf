use serde_json::Value;

use crate::domain::{DomainError, Parameters, PublishTarget, TemplateDescriptor};

/// Longest repository name accepted by both supported hosts.
const MAX_REPOSITORY_NAME: usize = 100;

/// Centralized domain validation.
///
/// All validation logic lives here, not scattered across entities.
pub struct DomainValidator;

impl DomainValidator {
    pub fn validate_descriptor(descriptor: &TemplateDescriptor) -> Result<(), DomainError> {
        Self::validate_target(descriptor.target())?;
        Self::validate_parameters(descriptor.parameters())
    }

    pub fn validate_target(target: &PublishTarget) -> Result<(), DomainError> {
        if target.scheme.trim().is_empty() {
            return Err(DomainError::MissingRequiredField {
                field: "target.scheme",
            });
        }
        Self::validate_owner(&target.owner)?;
        Self::validate_repository_name(&target.name)
    }

    pub fn validate_owner(owner: &str) -> Result<(), DomainError> {
        let invalid = |reason: &str| DomainError::InvalidOwner {
            owner: owner.to_string(),
            reason: reason.to_string(),
        };

        if owner.is_empty() {
            return Err(invalid("owner cannot be empty"));
        }
        // GitLab subgroups are addressed as `group/subgroup`.
        if owner.starts_with('/') || owner.ends_with('/') || owner.contains("//") {
            return Err(invalid("malformed group path"));
        }
        if owner.chars().any(char::is_whitespace) {
            return Err(invalid("owner cannot contain whitespace"));
        }
        Ok(())
    }

    pub fn validate_repository_name(name: &str) -> Result<(), DomainError> {
        let invalid = |reason: &str| DomainError::InvalidRepositoryName {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if name.is_empty() {
            return Err(invalid("name cannot be empty"));
        }
        if name == "." || name == ".." {
            return Err(invalid("name cannot be '.' or '..'"));
        }
        if name.len() > MAX_REPOSITORY_NAME {
            return Err(invalid("name is longer than 100 characters"));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(invalid(&format!("character '{c}' is not allowed")));
        }
        Ok(())
    }

    pub fn validate_parameters(parameters: &Parameters) -> Result<(), DomainError> {
        for (key, value) in parameters {
            if key.trim().is_empty() {
                return Err(DomainError::InvalidParameter {
                    key: key.clone(),
                    reason: "key cannot be empty".into(),
                });
            }
            if matches!(value, Value::Array(_) | Value::Object(_)) {
                return Err(DomainError::InvalidParameter {
                    key: key.clone(),
                    reason: "only string, number, boolean or null values are allowed".into(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repository_names() {
        for ok in ["demo", "my-service", "my_service.v2", "A1"] {
            assert!(DomainValidator::validate_repository_name(ok).is_ok(), "{ok}");
        }
        for bad in ["", ".", "..", "has space", "slash/name", "ümlaut"] {
            assert!(DomainValidator::validate_repository_name(bad).is_err(), "{bad}");
        }
        let long = "a".repeat(101);
        assert!(DomainValidator::validate_repository_name(&long).is_err());
    }

    #[test]
    fn owners_allow_group_paths() {
        assert!(DomainValidator::validate_owner("acme").is_ok());
        assert!(DomainValidator::validate_owner("acme/platform").is_ok());
        assert!(DomainValidator::validate_owner("").is_err());
        assert!(DomainValidator::validate_owner("/acme").is_err());
        assert!(DomainValidator::validate_owner("acme//x").is_err());
    }

    #[test]
    fn target_needs_scheme() {
        let target = PublishTarget::new("", "acme", "demo");
        assert_eq!(
            DomainValidator::validate_target(&target),
            Err(DomainError::MissingRequiredField {
                field: "target.scheme"
            })
        );
    }

    #[test]
    fn scalar_parameters_pass() {
        let mut params = Parameters::new();
        params.insert("name".into(), json!("demo"));
        params.insert("replicas".into(), json!(3));
        params.insert("debug".into(), json!(false));
        params.insert("optional".into(), Value::Null);
        assert!(DomainValidator::validate_parameters(&params).is_ok());

        params.insert("nested".into(), json!({"a": 1}));
        assert!(DomainValidator::validate_parameters(&params).is_err());
    }
}
