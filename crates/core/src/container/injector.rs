use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::container::autowiring::{Arguments, Injectable, Signature};
use crate::container::binding::{Binder, Binding};
use crate::container::builder::InjectorBuilder;
use crate::container::dependency::{Dependency, Key, Recipe};
use crate::container::key::BindingKey;
use crate::container::module::Module;
use crate::container::provider::{Instance, Provider};
use crate::container::resolver::{Frame, FrameOrigin, ResolutionStack};
use crate::container::scope::{ScopeClass, ScopeEntry, ScopeRef, SingletonScope};
use crate::errors::InjectorError;

/// State shared by every injector descending from the same root
pub(crate) struct Hierarchy {
    lock: ReentrantMutex<()>,
    stack: ResolutionStack,
    implicit: Mutex<HashMap<BindingKey, Arc<dyn Provider>>>,
}

impl Hierarchy {
    fn new() -> Self {
        Self {
            lock: ReentrantMutex::new(()),
            stack: ResolutionStack::new(),
            implicit: Mutex::new(HashMap::new()),
        }
    }
}

struct InjectorInner {
    id: Uuid,
    name: Option<String>,
    parent: Option<Injector>,
    binder: RwLock<Binder>,
    scopes: Mutex<HashMap<TypeId, ScopeEntry>>,
    auto_bind: bool,
    default_scope: ScopeRef,
    hierarchy: Arc<Hierarchy>,
}

/// Resolves keys into fully wired instances
///
/// Cloning an `Injector` is cheap and yields a handle to the same injector.
/// Every injector in a hierarchy shares one re-entrant resolution lock, so
/// resolutions from different threads run one at a time and a singleton is
/// built at most once. A provider that blocks stalls the whole hierarchy.
#[derive(Clone)]
pub struct Injector {
    inner: Arc<InjectorInner>,
}

impl Injector {
    /// Root injector with no bindings, auto-binding on and unscoped defaults
    pub fn new() -> Self {
        Self::assemble(None, None, true, ScopeRef::noscope())
    }

    pub fn builder() -> InjectorBuilder {
        InjectorBuilder::new()
    }

    pub(crate) fn assemble(
        parent: Option<Injector>,
        name: Option<String>,
        auto_bind: bool,
        default_scope: ScopeRef,
    ) -> Self {
        let hierarchy = match &parent {
            Some(parent) => parent.inner.hierarchy.clone(),
            None => Arc::new(Hierarchy::new()),
        };
        let injector = Self {
            inner: Arc::new(InjectorInner {
                id: Uuid::new_v4(),
                name,
                parent: parent.clone(),
                binder: RwLock::new(Binder::new(parent, default_scope)),
                scopes: Mutex::new(HashMap::new()),
                auto_bind,
                default_scope,
                hierarchy,
            }),
        };
        match injector.parent() {
            Some(parent) => debug!("Created injector {} as child of {}", injector.label(), parent.label()),
            None => debug!("Created root injector {}", injector.label()),
        }
        injector
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Name if one was configured, id otherwise
    pub fn label(&self) -> String {
        match &self.inner.name {
            Some(name) => name.clone(),
            None => self.inner.id.to_string(),
        }
    }

    pub fn parent(&self) -> Option<&Injector> {
        self.inner.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.inner.parent.is_none()
    }

    pub fn root(&self) -> Injector {
        self.chain().last().unwrap_or_else(|| self.clone())
    }

    pub fn auto_bind(&self) -> bool {
        self.inner.auto_bind
    }

    pub fn default_scope(&self) -> ScopeRef {
        self.inner.default_scope
    }

    pub fn downgrade(&self) -> WeakInjector {
        WeakInjector {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// This injector followed by its ancestors
    pub(crate) fn chain(&self) -> impl Iterator<Item = Injector> {
        std::iter::successors(Some(self.clone()), |injector| injector.parent().cloned())
    }

    /// Strict ancestors, nearest first
    pub(crate) fn ancestors(&self) -> impl Iterator<Item = Injector> {
        self.chain().skip(1)
    }

    /// Change this injector's bindings
    ///
    /// The closure must not resolve through this injector: the binder is locked
    /// for writing while it runs.
    pub fn configure<F>(&self, configure: F) -> Result<(), InjectorError>
    where
        F: FnOnce(&mut Binder) -> Result<(), InjectorError>,
    {
        let mut binder = self.inner.binder.write();
        configure(&mut binder)
    }

    pub fn install<M: Module + ?Sized>(&self, module: &M) -> Result<(), InjectorError> {
        self.configure(|binder| binder.install(module))
    }

    /// Read access to this injector's own bindings
    pub fn with_binder<R>(&self, inspect: impl FnOnce(&Binder) -> R) -> R {
        let binder = self.inner.binder.read();
        inspect(&binder)
    }

    /// Binding for `key` in this injector or the nearest ancestor, with its owner
    pub(crate) fn lookup_binding(&self, key: &BindingKey) -> Option<(Binding, Injector)> {
        self.chain().find_map(|injector| {
            let binding = injector.inner.binder.read().get_binding(key).cloned();
            binding.map(|binding| (binding, injector))
        })
    }

    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, InjectorError> {
        self.get_key(&Key::<T>::new())
    }

    /// Get `T`, constructing it from its signature when nothing is bound
    pub fn get_injectable<T: Injectable>(&self) -> Result<Arc<T>, InjectorError> {
        self.get_key(&Key::<T>::injectable())
    }

    pub fn get_annotated<T: ?Sized + Send + Sync + 'static>(
        &self,
        annotation: &str,
    ) -> Result<Arc<T>, InjectorError> {
        self.get_key(&Key::<T>::annotated(annotation))
    }

    pub fn get_key<T: ?Sized + Send + Sync + 'static>(&self, key: &Key<T>) -> Result<Arc<T>, InjectorError> {
        let instance = self.resolve(key.dependency())?;
        downcast_instance(&instance, key.binding_key())
    }

    /// Get through `scope` instead of the binding's own scope
    pub fn get_scoped<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: &Key<T>,
        scope: impl Into<ScopeRef>,
    ) -> Result<Arc<T>, InjectorError> {
        let instance = self.resolve_with(key.dependency(), Some(scope.into()))?;
        downcast_instance(&instance, key.binding_key())
    }

    /// Every multibound `T`, ancestors' contributions first
    pub fn get_all<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>, InjectorError> {
        let key = BindingKey::sequence::<T>();
        let instance = self.resolve(&Dependency::new(key.clone()))?;
        let values = downcast_instance::<Vec<Arc<T>>>(&instance, &key)?;
        Ok(values.as_ref().clone())
    }

    /// Every named multibound `T`
    pub fn get_map<T: ?Sized + Send + Sync + 'static>(
        &self,
    ) -> Result<HashMap<String, Arc<T>>, InjectorError> {
        let key = BindingKey::mapping::<T>();
        let instance = self.resolve(&Dependency::new(key.clone()))?;
        let values = downcast_instance::<HashMap<String, Arc<T>>>(&instance, &key)?;
        Ok(values.as_ref().clone())
    }

    /// Resolve a dependency into a type-erased instance
    pub fn resolve(&self, dependency: &Dependency) -> Result<Instance, InjectorError> {
        self.resolve_with(dependency, None)
    }

    fn resolve_with(
        &self,
        dependency: &Dependency,
        scope_override: Option<ScopeRef>,
    ) -> Result<Instance, InjectorError> {
        let hierarchy = self.inner.hierarchy.clone();
        let _resolving = hierarchy.lock.lock();
        let key = dependency.key();
        let prefix = hierarchy.stack.prefix();

        if key.is::<Injector>() {
            return Ok(Instance::new(Arc::new(self.clone())));
        }
        if let Some(Recipe::Special(factory)) = dependency.recipe() {
            debug!("{}Providing {} from injector {}", prefix, key, self.label());
            return factory(self);
        }
        if scope_override.is_none() {
            if let Some(cached) = self.cached_singleton(key) {
                trace!("{}Using singleton {} cached in injector {}", prefix, key, self.label());
                return cached.get(self);
            }
        }

        let (binding, owner) = self.find_binding(dependency)?;
        let _pending = hierarchy.stack.enter_key(owner.id(), key)?;
        let scope = scope_override.unwrap_or(binding.scope);
        debug!(
            "{}Providing {} using {} in {}",
            prefix,
            key,
            binding.provider.describe(),
            scope
        );

        let provider = if scope.is_noscope() {
            binding.provider
        } else {
            let entry = self.scope_entry(&scope, &owner);
            entry.scope.get(key, binding.provider)?
        };
        let instance = provider.get(self)?;
        trace!("{}{} -> {}", prefix, key, instance.type_name());
        Ok(instance)
    }

    fn find_binding(&self, dependency: &Dependency) -> Result<(Binding, Injector), InjectorError> {
        let key = dependency.key();
        if let Some(found) = self.lookup_binding(key) {
            return Ok(found);
        }

        match dependency.recipe() {
            Some(Recipe::Class { provider, scope }) if self.inner.auto_bind => {
                let provider = self
                    .inner
                    .hierarchy
                    .implicit
                    .lock()
                    .entry(key.clone())
                    .or_insert_with(*provider)
                    .clone();
                let scope = scope().unwrap_or(self.inner.default_scope);
                debug!("Auto-binding {} in {}", key, scope);
                Ok((Binding::new(key.clone(), provider, scope), self.clone()))
            }
            _ => Err(InjectorError::unsatisfied(None, key.to_string())),
        }
    }

    fn cached_singleton(&self, key: &BindingKey) -> Option<Arc<dyn Provider>> {
        let entry = self
            .inner
            .scopes
            .lock()
            .get(&TypeId::of::<SingletonScope>())
            .cloned()?;
        entry.any.downcast::<SingletonScope>().ok()?.cached(key)
    }

    /// Scope instance serving a binding owned by `owner`
    ///
    /// Per-injector scopes live on `self`. Other scopes are shared from the
    /// nearest injector at or above `owner` that has one, or created on `owner`.
    pub(crate) fn scope_entry(&self, scope: &ScopeRef, owner: &Injector) -> ScopeEntry {
        let home = if scope.is_per_injector() { self } else { owner };
        let existing = if scope.is_per_injector() {
            home.own_scope_entry(scope)
        } else {
            home.chain().find_map(|injector| injector.own_scope_entry(scope))
        };
        if let Some(entry) = existing {
            return entry;
        }

        debug!("Creating {} for injector {}", scope, home.label());
        let created = scope.instantiate(home);
        let entry = home
            .inner
            .scopes
            .lock()
            .entry(scope.type_id())
            .or_insert(created)
            .clone();
        entry
    }

    fn own_scope_entry(&self, scope: &ScopeRef) -> Option<ScopeEntry> {
        let entry = self.inner.scopes.lock().get(&scope.type_id()).cloned();
        entry
    }

    /// Scope instance of type `S` serving this injector, created on demand
    pub fn scope_instance<S: ScopeClass>(&self) -> Result<Arc<S>, InjectorError> {
        let scope = ScopeRef::of::<S>();
        let entry = self.scope_entry(&scope, self);
        downcast_scope(entry, &scope)
    }

    /// Give this injector its own instance of scope `S`
    ///
    /// Descendants binding in `S` share this instance unless they install their own.
    pub fn install_scope<S: ScopeClass>(&self) -> Result<Arc<S>, InjectorError> {
        let scope = ScopeRef::of::<S>();
        let entry = match self.own_scope_entry(&scope) {
            Some(entry) => entry,
            None => {
                let created = scope.instantiate(self);
                let entry = self
                    .inner
                    .scopes
                    .lock()
                    .entry(scope.type_id())
                    .or_insert(created)
                    .clone();
                entry
            }
        };
        downcast_scope(entry, &scope)
    }

    /// Construct `T`, injecting every parameter the caller did not supply
    ///
    /// Always builds a new object; scopes are not consulted for `T` itself.
    pub fn create_object<T: Injectable>(&self, args: Arguments) -> Result<Arc<T>, InjectorError> {
        let signature = T::signature();
        self.call_with_origin(
            &signature,
            FrameOrigin::Type(TypeId::of::<T>()),
            args,
            |args| T::construct(args),
        )
        .map(Arc::new)
    }

    /// Call `call` with `signature`'s parameters resolved; supplied arguments win
    pub fn call_with_injection<R, F>(
        &self,
        signature: &Signature,
        args: Arguments,
        call: F,
    ) -> Result<R, InjectorError>
    where
        F: FnOnce(&mut Arguments) -> Result<R, InjectorError>,
    {
        let origin = FrameOrigin::Named(signature.owner().to_string());
        self.call_with_origin(signature, origin, args, call)
    }

    pub(crate) fn call_injected<R, F>(
        &self,
        signature: &Signature,
        identity: usize,
        args: Arguments,
        call: F,
    ) -> Result<R, InjectorError>
    where
        F: FnOnce(&mut Arguments) -> Result<R, InjectorError>,
    {
        self.call_with_origin(signature, FrameOrigin::Callable(identity), args, call)
    }

    fn call_with_origin<R, F>(
        &self,
        signature: &Signature,
        origin: FrameOrigin,
        args: Arguments,
        call: F,
    ) -> Result<R, InjectorError>
    where
        F: FnOnce(&mut Arguments) -> Result<R, InjectorError>,
    {
        let hierarchy = self.inner.hierarchy.clone();
        let _resolving = hierarchy.lock.lock();
        let mut args = self.inject_arguments(signature, origin, args)?;
        call(&mut args).map_err(|error| error.with_stack(hierarchy.stack.snapshot()))
    }

    fn inject_arguments(
        &self,
        signature: &Signature,
        origin: FrameOrigin,
        mut args: Arguments,
    ) -> Result<Arguments, InjectorError> {
        signature.validate()?;
        let stack = &self.inner.hierarchy.stack;
        let owner = signature.owner();

        let unexpected = args
            .names()
            .find(|name| signature.parameter(name).is_none())
            .map(str::to_string);
        if let Some(name) = unexpected {
            return Err(InjectorError::call_error(
                owner,
                format!("got an unexpected argument '{}'", name),
            )
            .with_stack(stack.snapshot()));
        }

        for parameter in signature.parameters() {
            if parameter.is_injectable() || args.contains(parameter.name()) {
                continue;
            }
            match parameter.default() {
                Some(default) => args.insert(parameter.name(), default.clone()),
                None => {
                    return Err(InjectorError::call_error(
                        owner,
                        format!("missing required argument '{}'", parameter.name()),
                    )
                    .with_stack(stack.snapshot()))
                }
            }
        }

        let needed: Vec<_> = signature
            .parameters()
            .iter()
            .filter(|parameter| parameter.is_injectable() && !args.contains(parameter.name()))
            .collect();
        if needed.is_empty() {
            return Ok(args);
        }

        let mut names: Vec<String> = needed.iter().map(|p| p.name().to_string()).collect();
        names.sort();
        let _frame = stack.enter(Frame::new(origin, owner, names))?;
        debug!("{}Injecting {} into {}", stack.prefix(), needed.len(), owner);

        for parameter in needed {
            match self.resolve(parameter.dependency()) {
                Ok(instance) => args.insert(parameter.name(), instance),
                Err(error) if error.is_unsatisfied() => match parameter.default() {
                    Some(default) => args.insert(parameter.name(), default.clone()),
                    None => return Err(error.with_owner(owner)),
                },
                Err(error) => return Err(error),
            }
        }
        Ok(args)
    }

    /// Build through the binding for `dependency` with caller-supplied arguments
    pub(crate) fn build_assisted(
        &self,
        dependency: &Dependency,
        args: Arguments,
    ) -> Result<Instance, InjectorError> {
        let hierarchy = self.inner.hierarchy.clone();
        let _resolving = hierarchy.lock.lock();
        let (binding, _owner) = self.find_binding(dependency)?;
        debug!(
            "{}Assisted build of {} using {}",
            hierarchy.stack.prefix(),
            dependency.key(),
            binding.provider.describe()
        );
        binding.provider.build_assisted(self, args)
    }

    /// Child injector configured by `module`
    pub fn create_child<M: Module + 'static>(&self, module: M) -> Result<Injector, InjectorError> {
        self.child_builder().module(module).build()
    }

    /// Builder for a child injector that inherits this injector's settings
    pub fn child_builder(&self) -> InjectorBuilder {
        InjectorBuilder::child_of(self.clone())
    }
}

impl Default for Injector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("parent", &self.parent().map(Injector::id))
            .field("auto_bind", &self.inner.auto_bind)
            .field("default_scope", &self.inner.default_scope)
            .finish()
    }
}

/// Non-owning handle to an injector, held by scopes
#[derive(Clone)]
pub struct WeakInjector {
    inner: Weak<InjectorInner>,
}

impl WeakInjector {
    pub fn upgrade(&self) -> Result<Injector, InjectorError> {
        self.inner
            .upgrade()
            .map(|inner| Injector { inner })
            .ok_or_else(|| InjectorError::disposed("injector"))
    }
}

impl fmt::Debug for WeakInjector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakInjector(alive: {})", self.inner.strong_count() > 0)
    }
}

pub(crate) fn downcast_instance<T: ?Sized + Send + Sync + 'static>(
    instance: &Instance,
    key: &BindingKey,
) -> Result<Arc<T>, InjectorError> {
    instance.downcast::<T>().ok_or_else(|| {
        InjectorError::unknown_provider(format!(
            "provider for {} produced {} instead of {}",
            key,
            instance.type_name(),
            type_name::<T>()
        ))
    })
}

fn downcast_scope<S: ScopeClass>(entry: ScopeEntry, scope: &ScopeRef) -> Result<Arc<S>, InjectorError> {
    entry.any.downcast::<S>().map_err(|_| {
        InjectorError::unknown_provider(format!("scope {} is registered with a different type", scope))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Config {
        url: String,
    }

    #[derive(Debug)]
    struct Database {
        config: Arc<Config>,
    }

    impl Injectable for Database {
        fn signature() -> Signature {
            Signature::new::<Self>().inject::<Config>("config")
        }

        fn construct(args: &mut Arguments) -> Result<Self, InjectorError> {
            Ok(Self {
                config: args.take("config")?,
            })
        }
    }

    fn configured() -> Injector {
        Injector::builder()
            .configure(|binder| {
                binder.bind::<Config>().to_value(Config {
                    url: "postgres://localhost".to_string(),
                })
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_get_resolves_declared_dependencies() {
        let injector = configured();
        let database = injector.get_injectable::<Database>().unwrap();
        assert_eq!(database.config.url, "postgres://localhost");
    }

    #[test]
    fn test_unscoped_returns_distinct_instances() {
        let injector = configured();
        let first = injector.get_injectable::<Database>().unwrap();
        let second = injector.get_injectable::<Database>().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first.config, &second.config));
    }

    #[test]
    fn test_unbound_plain_key_is_unsatisfied() {
        let injector = Injector::new();
        let err = injector.get::<Config>().unwrap_err();
        assert!(err.is_unsatisfied());
    }

    #[test]
    fn test_missing_dependency_names_owner() {
        let injector = Injector::new();
        match injector.get_injectable::<Database>() {
            Err(InjectorError::UnsatisfiedRequirement { owner, requirement }) => {
                assert!(owner.unwrap().ends_with("Database"));
                assert!(requirement.ends_with("Config"));
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_injector_provides_itself() {
        let injector = configured();
        let resolved = injector.get::<Injector>().unwrap();
        assert_eq!(resolved.id(), injector.id());

        let child = injector.child_builder().build().unwrap();
        assert_eq!(child.get::<Injector>().unwrap().id(), child.id());
    }

    #[test]
    fn test_get_scoped_overrides_binding_scope() {
        let injector = configured();
        let key = Key::<Database>::injectable();

        let first = injector.get_scoped(&key, ScopeRef::singleton()).unwrap();
        let second = injector.get_scoped(&key, ScopeRef::singleton()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_unexpected_argument_is_a_call_error() {
        let injector = configured();
        let err = injector
            .create_object::<Database>(Arguments::new().with_value("pool_size", 4usize))
            .unwrap_err();
        assert!(err.is_call_error());
    }

    #[test]
    fn test_weak_handle_reports_dropped_injector() {
        let weak = Injector::new().downgrade();
        assert!(matches!(weak.upgrade(), Err(InjectorError::Disposed { .. })));
    }
}
