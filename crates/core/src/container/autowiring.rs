use std::any::type_name;
use std::collections::HashMap;
use std::sync::Arc;

use crate::container::assisted::{AssistedBuilder, ClassAssistedBuilder, ProviderOf};
use crate::container::dependency::{Dependency, Key};
use crate::container::key::BindingKey;
use crate::container::provider::Instance;
use crate::container::scope::ScopeRef;
use crate::errors::InjectorError;

/// Trait for types the injector can construct by resolving their declared parameters
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Describe the constructor parameters
    ///
    /// Called every time the type is constructed or inspected, never at bind time,
    /// so a signature may name types that are bound later.
    fn signature() -> Signature {
        Signature::new::<Self>()
    }

    /// Build the value from resolved and caller-supplied arguments
    fn construct(args: &mut Arguments) -> Result<Self, InjectorError>;

    /// Scope applied when the type is bound without naming one
    fn scope() -> Option<ScopeRef> {
        None
    }
}

/// Metadata about one constructor parameter
#[derive(Debug, Clone)]
pub struct Parameter {
    name: String,
    dependency: Dependency,
    injectable: bool,
    default: Option<Instance>,
}

impl Parameter {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependency(&self) -> &Dependency {
        &self.dependency
    }

    pub fn key(&self) -> &BindingKey {
        self.dependency.key()
    }

    /// Whether the injector resolves this parameter when the caller does not supply it
    pub fn is_injectable(&self) -> bool {
        self.injectable
    }

    pub fn default(&self) -> Option<&Instance> {
        self.default.as_ref()
    }
}

#[derive(Debug, Clone)]
enum SignatureProblem {
    Duplicate(String),
    UnknownMarker(String),
}

/// Pre-computed description of a constructor or function's parameters
#[derive(Debug, Clone)]
pub struct Signature {
    owner: String,
    parameters: Vec<Parameter>,
    problems: Vec<SignatureProblem>,
}

impl Signature {
    /// Empty signature owned by `T`
    pub fn new<T: ?Sized + 'static>() -> Self {
        Self::named(type_name::<T>())
    }

    /// Empty signature for a free function or closure
    pub fn named(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            parameters: Vec::new(),
            problems: Vec::new(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Inject the plain binding of `T`
    pub fn inject<T: ?Sized + Send + Sync + 'static>(self, name: impl Into<String>) -> Self {
        self.push(name.into(), Dependency::of::<T>(), true)
    }

    /// Inject the binding of `T` registered under `annotation`
    pub fn inject_annotated<T: ?Sized + Send + Sync + 'static>(
        self,
        name: impl Into<String>,
        annotation: impl Into<String>,
    ) -> Self {
        self.push(name.into(), Dependency::annotated::<T>(annotation), true)
    }

    pub fn inject_key<T: ?Sized + Send + Sync + 'static>(
        self,
        name: impl Into<String>,
        key: &Key<T>,
    ) -> Self {
        self.push(name.into(), key.dependency().clone(), true)
    }

    /// Inject `T`, constructing it from its own signature when it is not bound
    pub fn autowire<T: Injectable>(self, name: impl Into<String>) -> Self {
        self.push(name.into(), Dependency::injectable::<T>(), true)
    }

    /// Inject every multibound `T` as a `Vec<Arc<T>>`
    pub fn inject_all<T: ?Sized + Send + Sync + 'static>(self, name: impl Into<String>) -> Self {
        self.push(name.into(), Dependency::new(BindingKey::sequence::<T>()), true)
    }

    /// Inject every multibound named `T` as a `HashMap<String, Arc<T>>`
    pub fn inject_map<T: ?Sized + Send + Sync + 'static>(self, name: impl Into<String>) -> Self {
        self.push(name.into(), Dependency::new(BindingKey::mapping::<T>()), true)
    }

    /// Inject an [`AssistedBuilder`] for `T`
    pub fn assisted<T: ?Sized + Send + Sync + 'static>(self, name: impl Into<String>) -> Self {
        let key = Key::<AssistedBuilder<T>>::assisted();
        self.push(name.into(), key.dependency().clone(), true)
    }

    /// Inject an [`AssistedBuilder`] for `T`, auto-binding `T` when nothing is bound
    pub fn assisted_injectable<T: Injectable>(self, name: impl Into<String>) -> Self {
        let key = Key::<AssistedBuilder<T>>::assisted_injectable();
        self.push(name.into(), key.dependency().clone(), true)
    }

    /// Inject a [`ClassAssistedBuilder`] for `T`
    pub fn class_assisted<T: Injectable>(self, name: impl Into<String>) -> Self {
        let key = Key::<ClassAssistedBuilder<T>>::class_assisted();
        self.push(name.into(), key.dependency().clone(), true)
    }

    /// Inject a [`ProviderOf`] for `T`
    pub fn provider_of<T: ?Sized + Send + Sync + 'static>(self, name: impl Into<String>) -> Self {
        let key = Key::<ProviderOf<T>>::provider_of();
        self.push(name.into(), key.dependency().clone(), true)
    }

    /// Declare a parameter the caller must supply
    pub fn noninjectable<T: ?Sized + Send + Sync + 'static>(self, name: impl Into<String>) -> Self {
        self.push(name.into(), Dependency::of::<T>(), false)
    }

    /// Give an already declared parameter a default value
    pub fn with_default<T: ?Sized + Send + Sync + 'static>(
        mut self,
        name: &str,
        value: Arc<T>,
    ) -> Self {
        match self.parameters.iter_mut().find(|p| p.name == name) {
            Some(parameter) => parameter.default = Some(Instance::new(value)),
            None => self
                .problems
                .push(SignatureProblem::UnknownMarker(name.to_string())),
        }
        self
    }

    /// Force a declared parameter to be supplied by the caller
    pub fn exclude(self, name: &str) -> Self {
        self.mark(name, false)
    }

    /// Force a declared parameter to be injected
    pub fn include(self, name: &str) -> Self {
        self.mark(name, true)
    }

    fn mark(mut self, name: &str, injectable: bool) -> Self {
        match self.parameters.iter_mut().find(|p| p.name == name) {
            Some(parameter) => parameter.injectable = injectable,
            None => self
                .problems
                .push(SignatureProblem::UnknownMarker(name.to_string())),
        }
        self
    }

    fn push(mut self, name: String, dependency: Dependency, injectable: bool) -> Self {
        if self.parameters.iter().any(|p| p.name == name) {
            self.problems.push(SignatureProblem::Duplicate(name));
            return self;
        }
        self.parameters.push(Parameter {
            name,
            dependency,
            injectable,
            default: None,
        });
        self
    }

    /// Report the first declaration mistake, if any
    pub fn validate(&self) -> Result<(), InjectorError> {
        match self.problems.first() {
            None => Ok(()),
            Some(SignatureProblem::Duplicate(name)) => Err(InjectorError::unknown_provider(
                format!("parameter '{}' of {} is declared twice", name, self.owner),
            )),
            Some(SignatureProblem::UnknownMarker(name)) => {
                Err(InjectorError::unknown_argument(self.owner.clone(), name.clone()))
            }
        }
    }

    /// Dependencies the injector resolves when the caller supplies nothing
    pub fn dependencies(&self) -> Vec<Dependency> {
        self.parameters
            .iter()
            .filter(|p| p.injectable)
            .map(|p| p.dependency.clone())
            .collect()
    }
}

/// Named arguments handed to a constructor or function
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: HashMap<String, Instance>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: ?Sized + Send + Sync + 'static>(
        mut self,
        name: impl Into<String>,
        value: Arc<T>,
    ) -> Self {
        self.insert(name, Instance::new(value));
        self
    }

    pub fn with_value<T: Send + Sync + 'static>(self, name: impl Into<String>, value: T) -> Self {
        self.with(name, Arc::new(value))
    }

    pub fn insert(&mut self, name: impl Into<String>, instance: Instance) {
        self.values.insert(name.into(), instance);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Remove an argument and downcast it
    pub fn take<T: ?Sized + Send + Sync + 'static>(&mut self, name: &str) -> Result<Arc<T>, InjectorError> {
        match self.take_optional::<T>(name)? {
            Some(value) => Ok(value),
            None => Err(InjectorError::call_error(
                name,
                format!("argument '{}' was not supplied", name),
            )),
        }
    }

    /// Remove an argument if present and downcast it
    pub fn take_optional<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        name: &str,
    ) -> Result<Option<Arc<T>>, InjectorError> {
        let Some(instance) = self.values.remove(name) else {
            return Ok(None);
        };
        match instance.downcast::<T>() {
            Some(value) => Ok(Some(value)),
            None => Err(InjectorError::call_error(
                name,
                format!(
                    "argument '{}' holds {} but {} was requested",
                    name,
                    instance.type_name(),
                    type_name::<T>()
                ),
            )),
        }
    }
}
