//! Type-name to factory lookup.
//!
//! Component libraries (built in, or populated by a plugin loader outside the
//! kernel) register factories here; systems instantiate components by type name.

use crate::component::{Component, ComponentInfo};
use crate::error::{KernelError, KernelResult};
use crate::model::Model;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type Factory = Arc<dyn Fn() -> Box<dyn Model> + Send + Sync>;

#[derive(Clone, Default)]
pub struct ComponentRegistry {
    factories: BTreeMap<String, Factory>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, type_name: &str, factory: F) -> KernelResult<()>
    where
        F: Fn() -> Box<dyn Model> + Send + Sync + 'static,
    {
        if self.factories.contains_key(type_name) {
            return Err(KernelError::DuplicateName {
                what: "component type",
                name: type_name.to_string(),
            });
        }
        self.factories
            .insert(type_name.to_string(), Arc::new(factory));
        Ok(())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn create(&self, type_name: &str) -> KernelResult<Box<dyn Model>> {
        self.factories
            .get(type_name)
            .map(|f| f())
            .ok_or_else(|| KernelError::UnknownComponentType {
                type_name: type_name.to_string(),
            })
    }

    /// Ports and parameters of a type, from a throwaway configured instance.
    pub fn describe(&self, type_name: &str) -> KernelResult<ComponentInfo> {
        let model = self.create(type_name)?;
        Ok(Component::new(type_name, type_name, model)?.describe())
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}
