use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::container::autowiring::Injectable;
use crate::container::injector::Injector;
use crate::container::key::BindingKey;
use crate::container::provider::{ClassProvider, Instance, Provider};
use crate::container::scope::ScopeRef;
use crate::errors::InjectorError;

/// Factory used for interfaces the injector materialises itself
pub type SpecialFactory =
    Arc<dyn Fn(&Injector) -> Result<Instance, InjectorError> + Send + Sync>;

/// How to satisfy a dependency that has no explicit binding
#[derive(Clone)]
pub enum Recipe {
    /// Auto-bind an `Injectable` type to its constructor
    Class {
        provider: fn() -> Arc<dyn Provider>,
        scope: fn() -> Option<ScopeRef>,
    },
    /// Built-in interface produced for the requesting injector, even with auto-binding off
    Special(SpecialFactory),
}

impl Recipe {
    pub fn class<T: Injectable>() -> Self {
        Recipe::Class {
            provider: class_provider::<T>,
            scope: T::scope,
        }
    }

    pub fn special<F>(factory: F) -> Self
    where
        F: Fn(&Injector) -> Result<Instance, InjectorError> + Send + Sync + 'static,
    {
        Recipe::Special(Arc::new(factory))
    }
}

fn class_provider<T: Injectable>() -> Arc<dyn Provider> {
    Arc::new(ClassProvider::<T>::new())
}

impl fmt::Debug for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipe::Class { .. } => write!(f, "Class(<constructor>)"),
            Recipe::Special(_) => write!(f, "Special(<factory>)"),
        }
    }
}

/// A key together with the fallback used when nothing is bound to it
#[derive(Debug, Clone)]
pub struct Dependency {
    key: BindingKey,
    recipe: Option<Recipe>,
}

impl Dependency {
    pub fn new(key: BindingKey) -> Self {
        Self { key, recipe: None }
    }

    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(BindingKey::of::<T>())
    }

    pub fn annotated<T: ?Sized + 'static>(annotation: impl Into<String>) -> Self {
        Self::new(BindingKey::annotated::<T>(annotation))
    }

    /// Dependency on `T` that may be auto-bound to `T`'s constructor
    pub fn injectable<T: Injectable>() -> Self {
        Self::with_recipe(BindingKey::of::<T>(), Recipe::class::<T>())
    }

    pub fn with_recipe(key: BindingKey, recipe: Recipe) -> Self {
        Self {
            key,
            recipe: Some(recipe),
        }
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.key = self.key.with_annotation(annotation);
        self
    }

    pub fn key(&self) -> &BindingKey {
        &self.key
    }

    pub fn recipe(&self) -> Option<&Recipe> {
        self.recipe.as_ref()
    }

    pub(crate) fn is_special(&self) -> bool {
        matches!(self.recipe, Some(Recipe::Special(_)))
    }
}

/// Typed handle for requesting a `T` from an injector
pub struct Key<T: ?Sized> {
    dependency: Dependency,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Key<T> {
    pub fn new() -> Self {
        Self::from_dependency(Dependency::of::<T>())
    }

    pub fn annotated(annotation: impl Into<String>) -> Self {
        Self::from_dependency(Dependency::annotated::<T>(annotation))
    }

    pub fn with_annotation(self, annotation: impl Into<String>) -> Self {
        Self::from_dependency(self.dependency.with_annotation(annotation))
    }

    pub(crate) fn from_dependency(dependency: Dependency) -> Self {
        Self {
            dependency,
            _marker: PhantomData,
        }
    }

    pub fn binding_key(&self) -> &BindingKey {
        self.dependency.key()
    }

    pub fn dependency(&self) -> &Dependency {
        &self.dependency
    }
}

impl<T: Injectable> Key<T> {
    /// Key for `T` that falls back to `T`'s own constructor when unbound
    pub fn injectable() -> Self {
        Self::from_dependency(Dependency::injectable::<T>())
    }
}

impl<T: ?Sized + Send + Sync + 'static> Default for Key<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for Key<T> {
    fn clone(&self) -> Self {
        Self {
            dependency: self.dependency.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&self.dependency.key).finish()
    }
}
