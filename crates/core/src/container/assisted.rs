use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::container::autowiring::{Arguments, Injectable};
use crate::container::dependency::{Dependency, Key, Recipe};
use crate::container::injector::{downcast_instance, Injector};
use crate::container::key::BindingKey;
use crate::container::provider::Instance;
use crate::errors::InjectorError;

/// Builds `T` with some arguments supplied by the caller
///
/// The target is looked up through the bindings of the injector that produced
/// the builder, so an interface builds its bound implementation. Supplied
/// arguments take precedence over injected ones. Depending on an
/// `AssistedBuilder<Self>` instead of `Self` breaks a constructor cycle.
pub struct AssistedBuilder<T: ?Sized> {
    injector: Injector,
    target: Dependency,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> AssistedBuilder<T> {
    pub fn build(&self, args: Arguments) -> Result<Arc<T>, InjectorError> {
        let instance = self.injector.build_assisted(&self.target, args)?;
        downcast_instance(&instance, self.target.key())
    }

    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    pub fn target(&self) -> &BindingKey {
        self.target.key()
    }
}

impl<T: ?Sized + Send + Sync + 'static> Key<AssistedBuilder<T>> {
    /// Builder for whatever `T` is bound to
    pub fn assisted() -> Self {
        Self::assisted_key(&Key::<T>::new())
    }

    /// Builder for the binding behind `target`
    pub fn assisted_key(target: &Key<T>) -> Self {
        let target = target.dependency().clone();
        let recipe = Recipe::special(move |injector: &Injector| {
            Ok(Instance::new(Arc::new(AssistedBuilder::<T> {
                injector: injector.clone(),
                target: target.clone(),
                _marker: PhantomData,
            })))
        });
        Self::from_dependency(Dependency::with_recipe(
            BindingKey::of::<AssistedBuilder<T>>(),
            recipe,
        ))
    }
}

impl<T: Injectable> Key<AssistedBuilder<T>> {
    /// Builder for `T`, constructed from its signature when nothing is bound
    pub fn assisted_injectable() -> Self {
        Self::assisted_key(&Key::injectable())
    }
}

impl<T: ?Sized> Clone for AssistedBuilder<T> {
    fn clone(&self) -> Self {
        Self {
            injector: self.injector.clone(),
            target: self.target.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> fmt::Debug for AssistedBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssistedBuilder")
            .field("target", self.target.key())
            .field("injector", &self.injector.id())
            .finish()
    }
}

/// Builds exactly `T` with some arguments supplied by the caller, ignoring bindings
pub struct ClassAssistedBuilder<T> {
    injector: Injector,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Injectable> ClassAssistedBuilder<T> {
    pub fn build(&self, args: Arguments) -> Result<Arc<T>, InjectorError> {
        self.injector.create_object::<T>(args)
    }

    pub fn injector(&self) -> &Injector {
        &self.injector
    }
}

impl<T: Injectable> Key<ClassAssistedBuilder<T>> {
    pub fn class_assisted() -> Self {
        let recipe = Recipe::special(|injector: &Injector| {
            Ok(Instance::new(Arc::new(ClassAssistedBuilder::<T> {
                injector: injector.clone(),
                _marker: PhantomData,
            })))
        });
        Self::from_dependency(Dependency::with_recipe(
            BindingKey::of::<ClassAssistedBuilder<T>>(),
            recipe,
        ))
    }
}

impl<T> Clone for ClassAssistedBuilder<T> {
    fn clone(&self) -> Self {
        Self {
            injector: self.injector.clone(),
            _marker: PhantomData,
        }
    }
}

/// Deferred handle that resolves `T` each time [`ProviderOf::get`] is called
pub struct ProviderOf<T: ?Sized> {
    injector: Injector,
    target: Dependency,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> ProviderOf<T> {
    pub fn get(&self) -> Result<Arc<T>, InjectorError> {
        let instance = self.injector.resolve(&self.target)?;
        downcast_instance(&instance, self.target.key())
    }
}

impl<T: ?Sized + Send + Sync + 'static> Key<ProviderOf<T>> {
    pub fn provider_of() -> Self {
        Self::provider_of_key(&Key::<T>::new())
    }

    pub fn provider_of_key(target: &Key<T>) -> Self {
        let target = target.dependency().clone();
        let recipe = Recipe::special(move |injector: &Injector| {
            Ok(Instance::new(Arc::new(ProviderOf::<T> {
                injector: injector.clone(),
                target: target.clone(),
                _marker: PhantomData,
            })))
        });
        Self::from_dependency(Dependency::with_recipe(
            BindingKey::of::<ProviderOf<T>>(),
            recipe,
        ))
    }
}

impl<T: ?Sized> Clone for ProviderOf<T> {
    fn clone(&self) -> Self {
        Self {
            injector: self.injector.clone(),
            target: self.target.clone(),
            _marker: PhantomData,
        }
    }
}
