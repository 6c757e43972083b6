use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::container::autowiring::{Arguments, Injectable, Signature};
use crate::container::dependency::Dependency;
use crate::container::injector::Injector;
use crate::errors::InjectorError;

/// A produced value, type-erased
///
/// Always holds an `Arc<T>` so that trait objects and sized values share one
/// representation and clones hand out the same underlying object.
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Instance {
    pub fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            value: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    pub fn from_value<T: Send + Sync + 'static>(value: T) -> Self {
        Self::new(Arc::new(value))
    }

    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.value.downcast_ref::<Arc<T>>().cloned()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Produces instances for a resolution context
pub trait Provider: Send + Sync + 'static {
    /// Produce an instance, resolving sub-dependencies through `injector`
    fn get(&self, injector: &Injector) -> Result<Instance, InjectorError>;

    /// Direct dependencies, or `None` when the provider cannot describe them
    fn dependencies(&self) -> Option<Vec<Dependency>> {
        None
    }

    /// Produce an instance with some arguments supplied by the caller
    fn build_assisted(&self, injector: &Injector, args: Arguments) -> Result<Instance, InjectorError> {
        let _ = (injector, args);
        Err(InjectorError::call_error(
            self.describe(),
            "assisted building needs a constructor or injected callable provider",
        ))
    }

    fn describe(&self) -> String;
}

/// Compare two providers by identity
pub(crate) fn same_provider(a: &Arc<dyn Provider>, b: &Arc<dyn Provider>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Always hands out the same instance
pub struct InstanceProvider {
    instance: Instance,
}

impl InstanceProvider {
    pub fn new(instance: Instance) -> Self {
        Self { instance }
    }

    pub fn of<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self::new(Instance::new(value))
    }
}

impl Provider for InstanceProvider {
    fn get(&self, _injector: &Injector) -> Result<Instance, InjectorError> {
        Ok(self.instance.clone())
    }

    fn dependencies(&self) -> Option<Vec<Dependency>> {
        Some(Vec::new())
    }

    fn describe(&self) -> String {
        format!("InstanceProvider({})", self.instance.type_name())
    }
}

type NullaryFn = Arc<dyn Fn() -> Result<Instance, InjectorError> + Send + Sync>;
type InjectedFn = Arc<dyn Fn(&mut Arguments) -> Result<Instance, InjectorError> + Send + Sync>;
type ContextualFn = Arc<dyn Fn(&Injector) -> Result<Instance, InjectorError> + Send + Sync>;

enum CallableKind {
    Nullary(NullaryFn),
    Injected { signature: Signature, call: InjectedFn },
    Contextual(ContextualFn),
}

/// Invokes a function on every `get`
pub struct CallableProvider {
    output: &'static str,
    kind: CallableKind,
}

impl CallableProvider {
    /// Function without parameters
    pub fn factory<T, F>(factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        Self {
            output: type_name::<T>(),
            kind: CallableKind::Nullary(Arc::new(move || Ok(Instance::new(factory())))),
        }
    }

    /// Function whose declared parameters are resolved as keys
    pub fn injected<T, F>(signature: Signature, call: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&mut Arguments) -> Result<Arc<T>, InjectorError> + Send + Sync + 'static,
    {
        Self {
            output: type_name::<T>(),
            kind: CallableKind::Injected {
                signature,
                call: Arc::new(move |args| call(args).map(Instance::new)),
            },
        }
    }

    /// Function that pulls what it needs from the requesting injector
    ///
    /// The injector cannot see what such a function depends on, which matters for
    /// singleton placement.
    pub fn contextual<T, F>(call: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Injector) -> Result<Arc<T>, InjectorError> + Send + Sync + 'static,
    {
        Self {
            output: type_name::<T>(),
            kind: CallableKind::Contextual(Arc::new(move |injector| call(injector).map(Instance::new))),
        }
    }
}

impl Provider for CallableProvider {
    fn get(&self, injector: &Injector) -> Result<Instance, InjectorError> {
        match &self.kind {
            CallableKind::Nullary(factory) => factory(),
            CallableKind::Injected { signature, call } => {
                injector.call_injected(signature, Arc::as_ptr(call) as *const () as usize, Arguments::new(), |args| call(args))
            }
            CallableKind::Contextual(call) => call(injector),
        }
    }

    fn dependencies(&self) -> Option<Vec<Dependency>> {
        match &self.kind {
            CallableKind::Nullary(_) => Some(Vec::new()),
            CallableKind::Injected { signature, .. } => Some(signature.dependencies()),
            CallableKind::Contextual(_) => None,
        }
    }

    fn build_assisted(&self, injector: &Injector, args: Arguments) -> Result<Instance, InjectorError> {
        match &self.kind {
            CallableKind::Injected { signature, call } => {
                injector.call_injected(signature, Arc::as_ptr(call) as *const () as usize, args, |args| call(args))
            }
            _ => Err(InjectorError::call_error(
                self.describe(),
                "only callables with a declared signature accept assisted arguments",
            )),
        }
    }

    fn describe(&self) -> String {
        let kind = match self.kind {
            CallableKind::Nullary(_) => "factory",
            CallableKind::Injected { .. } => "injected",
            CallableKind::Contextual(_) => "contextual",
        };
        format!("CallableProvider({}, {})", kind, self.output)
    }
}

/// Constructs `T` by resolving its signature on the requesting injector
pub struct ClassProvider<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T: Injectable> ClassProvider<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: Injectable> Default for ClassProvider<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Injectable> Provider for ClassProvider<T> {
    fn get(&self, injector: &Injector) -> Result<Instance, InjectorError> {
        injector.create_object::<T>(Arguments::new()).map(Instance::new)
    }

    fn dependencies(&self) -> Option<Vec<Dependency>> {
        Some(T::signature().dependencies())
    }

    fn build_assisted(&self, injector: &Injector, args: Arguments) -> Result<Instance, InjectorError> {
        injector.create_object::<T>(args).map(Instance::new)
    }

    fn describe(&self) -> String {
        format!("ClassProvider({})", type_name::<T>())
    }
}

/// Binds an interface `I` to the constructor of a concrete `C`
pub struct ImplementationProvider<I: ?Sized, C> {
    cast: fn(Arc<C>) -> Arc<I>,
}

impl<I, C> ImplementationProvider<I, C>
where
    I: ?Sized + Send + Sync + 'static,
    C: Injectable,
{
    pub fn new(cast: fn(Arc<C>) -> Arc<I>) -> Self {
        Self { cast }
    }
}

impl<I, C> Provider for ImplementationProvider<I, C>
where
    I: ?Sized + Send + Sync + 'static,
    C: Injectable,
{
    fn get(&self, injector: &Injector) -> Result<Instance, InjectorError> {
        let concrete = injector.create_object::<C>(Arguments::new())?;
        Ok(Instance::new((self.cast)(concrete)))
    }

    fn dependencies(&self) -> Option<Vec<Dependency>> {
        Some(C::signature().dependencies())
    }

    fn build_assisted(&self, injector: &Injector, args: Arguments) -> Result<Instance, InjectorError> {
        let concrete = injector.create_object::<C>(args)?;
        Ok(Instance::new((self.cast)(concrete)))
    }

    fn describe(&self) -> String {
        format!("ImplementationProvider({} -> {})", type_name::<I>(), type_name::<C>())
    }
}
