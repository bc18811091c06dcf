//! Scheme-keyed backend registries.

use std::{collections::BTreeMap, fmt, sync::Arc};

use tracing::{debug, warn};

use super::{
    StageError,
    ports::{Preparer, Publisher, Templater},
};

/// Maps a scheme string to one backend.
///
/// Registering an already bound scheme replaces the binding (last write
/// wins). Lookup never falls back to a default.
pub struct Registry<T: ?Sized> {
    name: &'static str,
    entries: BTreeMap<String, Arc<T>>,
}

impl<T: ?Sized> Registry<T> {
    /// `name` identifies the registry in errors and logs (`"preparer"`, ...).
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Bind `scheme` to `backend`, returning the previous binding if any.
    pub fn register(&mut self, scheme: impl Into<String>, backend: Arc<T>) -> Option<Arc<T>> {
        let scheme = scheme.into();
        let previous = self.entries.insert(scheme.clone(), backend);
        if previous.is_some() {
            warn!(registry = self.name, %scheme, "Scheme re-registered, previous backend replaced");
        } else {
            debug!(registry = self.name, %scheme, "Scheme registered");
        }
        previous
    }

    /// Bind several synonymous schemes to the same backend instance.
    pub fn register_aliases(&mut self, schemes: &[&str], backend: Arc<T>) {
        for scheme in schemes {
            self.register(*scheme, Arc::clone(&backend));
        }
    }

    pub fn get(&self, scheme: &str) -> Result<Arc<T>, StageError> {
        self.entries
            .get(scheme)
            .cloned()
            .ok_or_else(|| StageError::UnknownScheme {
                registry: self.name,
                scheme: scheme.to_string(),
            })
    }

    pub fn contains(&self, scheme: &str) -> bool {
        self.entries.contains_key(scheme)
    }

    /// Bound schemes, in order.
    pub fn schemes(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: ?Sized> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("name", &self.name)
            .field("schemes", &self.schemes())
            .finish()
    }
}

/// The three stage registries.
///
/// Mutable while the assembling layer populates it; moved behind an `Arc`
/// when handed to the orchestrator.
#[derive(Debug)]
pub struct Registries {
    pub preparers: Registry<dyn Preparer>,
    pub templaters: Registry<dyn Templater>,
    pub publishers: Registry<dyn Publisher>,
}

impl Registries {
    pub fn new() -> Self {
        Self {
            preparers: Registry::new("preparer"),
            templaters: Registry::new("templater"),
            publishers: Registry::new("publisher"),
        }
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Backend: Send + Sync {
        fn id(&self) -> u32;
    }

    struct Fixed(u32);

    impl Backend for Fixed {
        fn id(&self) -> u32 {
            self.0
        }
    }

    #[test]
    fn last_registration_wins() {
        let mut registry: Registry<dyn Backend> = Registry::new("backend");
        assert!(registry.register("file", Arc::new(Fixed(1))).is_none());

        let previous = registry.register("file", Arc::new(Fixed(2)));
        assert_eq!(previous.map(|b| b.id()), Some(1));
        assert_eq!(registry.get("file").unwrap().id(), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_scheme_is_an_error() {
        let registry: Registry<dyn Backend> = Registry::new("backend");
        let err = registry.get("svn").err().unwrap();
        assert_eq!(
            err,
            StageError::UnknownScheme {
                registry: "backend",
                scheme: "svn".into()
            }
        );
    }

    #[test]
    fn aliases_share_one_instance() {
        let mut registry: Registry<dyn Backend> = Registry::new("backend");
        registry.register_aliases(&["gitlab", "gitlab/api"], Arc::new(Fixed(7)));

        let a = registry.get("gitlab").unwrap();
        let b = registry.get("gitlab/api").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.schemes(), vec!["gitlab", "gitlab/api"]);
    }

    #[test]
    fn schemes_are_sorted() {
        let mut registry: Registry<dyn Backend> = Registry::new("backend");
        for scheme in ["simple", "cra", "cookiecutter"] {
            registry.register(scheme, Arc::new(Fixed(0)));
        }
        assert_eq!(registry.schemes(), vec!["cookiecutter", "cra", "simple"]);
        assert!(registry.contains("cra"));
        assert!(!registry.contains("jinja"));
    }

    #[test]
    fn registries_are_named_per_stage() {
        let registries = Registries::new();
        assert_eq!(registries.preparers.name(), "preparer");
        assert_eq!(registries.templaters.name(), "templater");
        assert_eq!(registries.publishers.name(), "publisher");
        assert!(registries.publishers.is_empty());
    }
}
