use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::ConfigError;
use crate::container::injector::{Injector, WeakInjector};
use crate::container::key::BindingKey;
use crate::container::provider::{same_provider, InstanceProvider, Provider};
use crate::errors::InjectorError;

/// Policy deciding how long a provider's instances live
///
/// A scope receives the binding's provider and returns the provider that should
/// actually be used, typically one wrapping a cached instance.
pub trait Scope: Send + Sync + 'static {
    fn get(&self, key: &BindingKey, provider: Arc<dyn Provider>) -> Result<Arc<dyn Provider>, InjectorError>;
}

/// A scope type the injector can instantiate on demand
pub trait ScopeClass: Scope + Sized {
    /// Give every injector its own instance instead of sharing the binding owner's
    const PER_INJECTOR: bool = false;

    fn create(injector: &Injector) -> Self;
}

/// Scope instance as stored by an injector
#[derive(Clone)]
pub(crate) struct ScopeEntry {
    pub(crate) scope: Arc<dyn Scope>,
    pub(crate) any: Arc<dyn Any + Send + Sync>,
}

fn instantiate<S: ScopeClass>(injector: &Injector) -> ScopeEntry {
    let scope = Arc::new(S::create(injector));
    ScopeEntry {
        scope: scope.clone(),
        any: scope,
    }
}

/// Reference to a scope type, used when binding
#[derive(Clone, Copy)]
pub struct ScopeRef {
    type_id: TypeId,
    name: &'static str,
    per_injector: bool,
    instantiate: fn(&Injector) -> ScopeEntry,
}

impl ScopeRef {
    pub fn of<S: ScopeClass>() -> Self {
        Self {
            type_id: TypeId::of::<S>(),
            name: type_name::<S>(),
            per_injector: S::PER_INJECTOR,
            instantiate: instantiate::<S>,
        }
    }

    pub fn noscope() -> Self {
        Self::of::<NoScope>()
    }

    pub fn singleton() -> Self {
        Self::of::<SingletonScope>()
    }

    pub fn threadlocal() -> Self {
        Self::of::<ThreadLocalScope>()
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Short name of the scope type
    pub fn name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }

    pub fn is_noscope(&self) -> bool {
        self.type_id == TypeId::of::<NoScope>()
    }

    pub fn is_per_injector(&self) -> bool {
        self.per_injector
    }

    /// The built-in scope kind this refers to, if any
    pub fn kind(&self) -> Option<ScopeKind> {
        if self.type_id == TypeId::of::<NoScope>() {
            Some(ScopeKind::Unscoped)
        } else if self.type_id == TypeId::of::<SingletonScope>() {
            Some(ScopeKind::Singleton)
        } else if self.type_id == TypeId::of::<ThreadLocalScope>() {
            Some(ScopeKind::ThreadLocal)
        } else {
            None
        }
    }

    pub(crate) fn instantiate(&self, injector: &Injector) -> ScopeEntry {
        (self.instantiate)(injector)
    }
}

impl PartialEq for ScopeRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ScopeRef {}

impl fmt::Debug for ScopeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScopeRef").field(&self.name()).finish()
    }
}

impl fmt::Display for ScopeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Built-in scope kinds, as named in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    /// New instance on every request
    #[default]
    #[serde(alias = "noscope", alias = "transient")]
    Unscoped,
    /// One instance per injector hierarchy, placed as high as its dependencies allow
    Singleton,
    /// One instance per thread
    #[serde(alias = "thread_local")]
    ThreadLocal,
}

impl ScopeKind {
    /// Check if the scope is singleton
    pub fn is_singleton(&self) -> bool {
        matches!(self, ScopeKind::Singleton)
    }

    /// Check if the scope is unscoped
    pub fn is_unscoped(&self) -> bool {
        matches!(self, ScopeKind::Unscoped)
    }

    /// Get the scope name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Unscoped => "unscoped",
            ScopeKind::Singleton => "singleton",
            ScopeKind::ThreadLocal => "threadlocal",
        }
    }

    pub fn scope_ref(&self) -> ScopeRef {
        match self {
            ScopeKind::Unscoped => ScopeRef::noscope(),
            ScopeKind::Singleton => ScopeRef::singleton(),
            ScopeKind::ThreadLocal => ScopeRef::threadlocal(),
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ScopeKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unscoped" | "noscope" | "transient" => Ok(ScopeKind::Unscoped),
            "singleton" => Ok(ScopeKind::Singleton),
            "threadlocal" | "thread_local" => Ok(ScopeKind::ThreadLocal),
            _ => Err(ConfigError::invalid_value(
                "default_scope",
                s,
                "unscoped, singleton, or threadlocal",
            )),
        }
    }
}

impl From<ScopeKind> for ScopeRef {
    fn from(kind: ScopeKind) -> Self {
        kind.scope_ref()
    }
}

/// Produces a new instance on every request
pub struct NoScope;

impl Scope for NoScope {
    fn get(&self, _key: &BindingKey, provider: Arc<dyn Provider>) -> Result<Arc<dyn Provider>, InjectorError> {
        Ok(provider)
    }
}

impl ScopeClass for NoScope {
    fn create(_injector: &Injector) -> Self {
        NoScope
    }
}

struct CachedSingleton {
    origin: Arc<dyn Provider>,
    provider: Arc<dyn Provider>,
    /// Injector whose binder held the binding, or the caching injector for auto-bound keys
    owner: Uuid,
}

/// One instance per key, cached at the highest injector able to build it
///
/// Each injector owns a `SingletonScope`. On a miss the scope asks its injector
/// where the instance belongs: the ancestor closest to the root whose bindings
/// satisfy every transitive dependency, or the injector itself when no ancestor
/// can. The instance is cached in that injector's scope under the binding key.
///
/// An injector that already caches a key answers from its cache without looking
/// at its binder, so a descendant that rebinds the key and resolves it replaces
/// the ancestor's entry for the whole hierarchy. Injectors without a binding
/// below the one that filled the entry keep getting the cached instance. Code
/// should not rely on this.
pub struct SingletonScope {
    injector: WeakInjector,
    cache: Mutex<HashMap<BindingKey, CachedSingleton>>,
}

impl SingletonScope {
    pub fn contains(&self, key: &BindingKey) -> bool {
        self.cache.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn cached(&self, key: &BindingKey) -> Option<Arc<dyn Provider>> {
        self.cache.lock().get(key).map(|entry| entry.provider.clone())
    }

    fn place(
        &self,
        home: &Injector,
        key: &BindingKey,
        provider: Arc<dyn Provider>,
        owner: Option<&Injector>,
    ) -> Result<Arc<dyn Provider>, InjectorError> {
        let kept = self.cache.lock().get(key).and_then(|entry| {
            let overridden = !same_provider(&entry.origin, &provider)
                && owner.map_or(false, |owner| {
                    owner.ancestors().any(|ancestor| ancestor.id() == entry.owner)
                });
            (!overridden).then(|| entry.provider.clone())
        });
        match kept {
            Some(cached) => Ok(cached),
            None => self.store(home, key, provider, owner),
        }
    }

    fn store(
        &self,
        home: &Injector,
        key: &BindingKey,
        provider: Arc<dyn Provider>,
        owner: Option<&Injector>,
    ) -> Result<Arc<dyn Provider>, InjectorError> {
        let instance = provider.get(home)?;
        let cached: Arc<dyn Provider> = Arc::new(InstanceProvider::new(instance));
        debug!("Caching singleton {} in injector {}", key, home.label());

        self.cache.lock().insert(
            key.clone(),
            CachedSingleton {
                origin: provider,
                provider: cached.clone(),
                owner: owner.map_or_else(|| home.id(), Injector::id),
            },
        );
        Ok(cached)
    }
}

impl Scope for SingletonScope {
    fn get(&self, key: &BindingKey, provider: Arc<dyn Provider>) -> Result<Arc<dyn Provider>, InjectorError> {
        if let Some(cached) = self.cached(key) {
            return Ok(cached);
        }

        let injector = self.injector.upgrade()?;
        let owner = injector.lookup_binding(key).map(|(_, owner)| owner);
        let home = injector.singleton_placement(key, &provider);
        if home.id() == injector.id() {
            return self.store(&injector, key, provider, owner.as_ref());
        }

        let scope = home.scope_instance::<SingletonScope>()?;
        scope.place(&home, key, provider, owner.as_ref())
    }
}

impl ScopeClass for SingletonScope {
    const PER_INJECTOR: bool = true;

    fn create(injector: &Injector) -> Self {
        Self {
            injector: injector.downgrade(),
            cache: Mutex::new(HashMap::new()),
        }
    }
}

/// One instance per key and thread
///
/// Instances are built by the injector owning this scope. Entries stay until the
/// thread calls [`ThreadLocalScope::leave`].
pub struct ThreadLocalScope {
    injector: WeakInjector,
    cache: Mutex<HashMap<ThreadId, HashMap<BindingKey, Arc<dyn Provider>>>>,
}

impl ThreadLocalScope {
    /// Drop everything cached for the calling thread
    pub fn leave(&self) {
        let removed = self.cache.lock().remove(&thread::current().id());
        if let Some(entries) = removed {
            debug!("Thread left scope, dropping {} cached instances", entries.len());
        }
    }

    /// Number of threads holding cached instances
    pub fn thread_count(&self) -> usize {
        self.cache.lock().len()
    }

    fn cached(&self, thread: ThreadId, key: &BindingKey) -> Option<Arc<dyn Provider>> {
        self.cache
            .lock()
            .get(&thread)
            .and_then(|entries| entries.get(key))
            .cloned()
    }
}

impl Scope for ThreadLocalScope {
    fn get(&self, key: &BindingKey, provider: Arc<dyn Provider>) -> Result<Arc<dyn Provider>, InjectorError> {
        let thread = thread::current().id();
        if let Some(cached) = self.cached(thread, key) {
            return Ok(cached);
        }

        let injector = self.injector.upgrade()?;
        let instance = provider.get(&injector)?;
        let cached: Arc<dyn Provider> = Arc::new(InstanceProvider::new(instance));
        self.cache
            .lock()
            .entry(thread)
            .or_default()
            .insert(key.clone(), cached.clone());
        Ok(cached)
    }
}

impl ScopeClass for ThreadLocalScope {
    fn create(injector: &Injector) -> Self {
        Self {
            injector: injector.downgrade(),
            cache: Mutex::new(HashMap::new()),
        }
    }
}
