use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::backend::Classifier;

/// Classifier shared between the pipeline worker and its host.
pub type SharedClassifier = Arc<Mutex<dyn Classifier>>;

/// Wrap a classifier for sharing with a pipeline.
pub fn shared<C: Classifier + 'static>(classifier: C) -> SharedClassifier {
    Arc::new(Mutex::new(classifier))
}

/// Registry of named classifier backends.
///
/// Backends are wrapped in `Mutex` because `Classifier::classify` takes `&mut self`.
pub struct ClassifierRegistry {
    backends: HashMap<String, SharedClassifier>,
    default_name: Option<String>,
}

impl ClassifierRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<C: Classifier + 'static>(&mut self, classifier: C) {
        let name = classifier.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, shared(classifier));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("classifier '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<SharedClassifier> {
        self.backends.get(name).cloned()
    }

    pub fn default_classifier(&self) -> Option<SharedClassifier> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    /// Registered backend names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Initialize the default backend and hand it out.
    pub fn initialize_default(&self) -> Result<SharedClassifier> {
        let classifier = self
            .default_classifier()
            .ok_or_else(|| anyhow!("no classifier registered"))?;
        {
            let mut guard = classifier
                .lock()
                .map_err(|_| anyhow!("classifier lock poisoned"))?;
            guard.initialize()?;
            log::info!(
                "classifier '{}' ready (input {:?})",
                guard.name(),
                guard.input_size()
            );
        }
        Ok(classifier)
    }
}

impl Default for ClassifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::backends::{ColorClassifier, StubClassifier};

    #[test]
    fn first_registered_is_default() {
        let mut registry = ClassifierRegistry::new();
        registry.register(StubClassifier::default());
        registry.register(ColorClassifier::default());

        assert_eq!(registry.list(), vec!["color", "stub"]);
        let default = registry.default_classifier().unwrap();
        assert_eq!(default.lock().unwrap().name(), "stub");
    }

    #[test]
    fn set_default_requires_registration() -> Result<()> {
        let mut registry = ClassifierRegistry::new();
        registry.register(StubClassifier::default());
        assert!(registry.set_default("tract").is_err());

        registry.register(ColorClassifier::default());
        registry.set_default("color")?;
        let classifier = registry.initialize_default()?;
        let guard = classifier.lock().unwrap();
        assert_eq!(guard.name(), "color");
        assert!(guard.is_ready());
        Ok(())
    }
}
