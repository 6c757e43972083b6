use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use crate::container::autowiring::{Arguments, Injectable, Signature};
use crate::container::injector::Injector;
use crate::container::key::BindingKey;
use crate::container::module::Module;
use crate::container::multibinding::{Aggregate, AggregateProvider};
use crate::container::provider::{
    CallableProvider, ClassProvider, ImplementationProvider, InstanceProvider, Provider,
};
use crate::container::scope::ScopeRef;
use crate::errors::InjectorError;

/// A key bound to a provider and the scope its instances live in
#[derive(Clone)]
pub struct Binding {
    pub(crate) key: BindingKey,
    pub(crate) provider: Arc<dyn Provider>,
    pub(crate) scope: ScopeRef,
}

impl Binding {
    pub fn new(key: BindingKey, provider: Arc<dyn Provider>, scope: ScopeRef) -> Self {
        Self {
            key,
            provider,
            scope,
        }
    }

    pub fn key(&self) -> &BindingKey {
        &self.key
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn scope(&self) -> ScopeRef {
        self.scope
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("key", &self.key)
            .field("provider", &self.provider.describe())
            .field("scope", &self.scope)
            .finish()
    }
}

/// Bindings owned by one injector
///
/// Rebinding a key replaces the entry here only. Lookups that fall back to the
/// parent chain are done by the injector.
pub struct Binder {
    bindings: HashMap<BindingKey, Binding>,
    aggregates: HashMap<BindingKey, Arc<dyn Any + Send + Sync>>,
    parent: Option<Injector>,
    default_scope: ScopeRef,
}

impl Binder {
    pub(crate) fn new(parent: Option<Injector>, default_scope: ScopeRef) -> Self {
        Self {
            bindings: HashMap::new(),
            aggregates: HashMap::new(),
            parent,
            default_scope,
        }
    }

    /// Start a binding for `T`
    pub fn bind<T: ?Sized + Send + Sync + 'static>(&mut self) -> BindingBuilder<'_, T> {
        BindingBuilder {
            binder: self,
            key: BindingKey::of::<T>(),
            scope: None,
            _marker: PhantomData,
        }
    }

    /// Bind a key to a provider; `None` uses the binder's default scope
    pub fn bind_key(
        &mut self,
        key: BindingKey,
        provider: Arc<dyn Provider>,
        scope: Option<ScopeRef>,
    ) -> Result<(), InjectorError> {
        if key.is_aggregate() {
            return Err(InjectorError::invalid_binding(
                key.to_string(),
                "sequence and mapping keys are populated with multibind",
            ));
        }
        if key.type_id() == std::any::TypeId::of::<Injector>() {
            return Err(InjectorError::invalid_binding(
                key.to_string(),
                "every injector already provides itself",
            ));
        }

        let scope = scope.unwrap_or(self.default_scope);
        debug!("Binding {} to {} in {}", key, provider.describe(), scope);
        if self.bindings.contains_key(&key) {
            debug!("Replacing existing binding for {}", key);
        }
        self.bindings
            .insert(key.clone(), Binding::new(key, provider, scope));
        Ok(())
    }

    /// Start a contribution to the ordered aggregate of `T`
    pub fn multibind<T: ?Sized + Send + Sync + 'static>(&mut self) -> MultiBindingBuilder<'_, T> {
        MultiBindingBuilder {
            binder: self,
            key: BindingKey::sequence::<T>(),
            scope: None,
            _marker: PhantomData,
        }
    }

    /// Start a contribution to the named aggregate of `T`
    pub fn multibind_map<T: ?Sized + Send + Sync + 'static>(&mut self) -> MapBindingBuilder<'_, T> {
        MapBindingBuilder {
            binder: self,
            key: BindingKey::mapping::<T>(),
            scope: None,
            _marker: PhantomData,
        }
    }

    /// Let a module add its bindings
    pub fn install<M: Module + ?Sized>(&mut self, module: &M) -> Result<(), InjectorError> {
        debug!("Installing module {}", module.name());
        module.configure(self)
    }

    /// Binding registered in this binder only
    pub fn get_binding(&self, key: &BindingKey) -> Option<&Binding> {
        self.bindings.get(key)
    }

    pub fn has_explicit_binding_for(&self, key: &BindingKey) -> bool {
        self.bindings.contains_key(key)
    }

    /// Check this binder and the parent chain
    pub fn has_binding_for(&self, key: &BindingKey) -> bool {
        self.has_explicit_binding_for(key)
            || self
                .parent
                .as_ref()
                .map(|parent| parent.lookup_binding(key).is_some())
                .unwrap_or(false)
    }

    pub fn default_scope(&self) -> ScopeRef {
        self.default_scope
    }

    pub fn keys(&self) -> impl Iterator<Item = &BindingKey> {
        self.bindings.keys()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    fn aggregate<A: Aggregate>(
        &mut self,
        key: BindingKey,
        scope: Option<ScopeRef>,
    ) -> Result<Arc<AggregateProvider<A>>, InjectorError> {
        if let Some(existing) = self.aggregates.get(&key) {
            if let (Some(scope), Some(binding)) = (scope, self.bindings.get(&key)) {
                if binding.scope != scope {
                    return Err(InjectorError::invalid_binding(
                        key.to_string(),
                        format!(
                            "aggregate is bound in {}, a contribution cannot switch it to {}",
                            binding.scope, scope
                        ),
                    ));
                }
            }
            return existing.clone().downcast::<AggregateProvider<A>>().map_err(|_| {
                InjectorError::invalid_binding(key.to_string(), "aggregate holds a different element type")
            });
        }

        let aggregate = Arc::new(AggregateProvider::<A>::new(key.clone(), self.parent.clone()));
        let scope = scope.unwrap_or(self.default_scope);
        debug!("Creating aggregate binding for {} in {}", key, scope);
        self.bindings.insert(
            key.clone(),
            Binding::new(key.clone(), aggregate.clone(), scope),
        );
        self.aggregates.insert(key, aggregate.clone());
        Ok(aggregate)
    }
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("bindings", &self.bindings.values().collect::<Vec<_>>())
            .field("default_scope", &self.default_scope)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

/// Fluent builder returned by [`Binder::bind`]
pub struct BindingBuilder<'a, T: ?Sized> {
    binder: &'a mut Binder,
    key: BindingKey,
    scope: Option<ScopeRef>,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<'a, T: ?Sized + Send + Sync + 'static> BindingBuilder<'a, T> {
    pub fn annotated(mut self, annotation: impl Into<String>) -> Self {
        self.key = self.key.with_annotation(annotation);
        self
    }

    pub fn in_scope(mut self, scope: impl Into<ScopeRef>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn to_instance(self, value: Arc<T>) -> Result<(), InjectorError> {
        self.to_provider(Arc::new(InstanceProvider::of(value)))
    }

    pub fn to_factory<F>(self, factory: F) -> Result<(), InjectorError>
    where
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        self.to_provider(Arc::new(CallableProvider::factory(factory)))
    }

    /// Bind to a function that receives the requesting injector
    pub fn to_callable<F>(self, call: F) -> Result<(), InjectorError>
    where
        F: Fn(&Injector) -> Result<Arc<T>, InjectorError> + Send + Sync + 'static,
    {
        self.to_provider(Arc::new(CallableProvider::contextual(call)))
    }

    /// Bind to a function whose declared parameters are injected
    pub fn to_injected<F>(self, signature: Signature, call: F) -> Result<(), InjectorError>
    where
        F: Fn(&mut Arguments) -> Result<Arc<T>, InjectorError> + Send + Sync + 'static,
    {
        self.to_provider(Arc::new(CallableProvider::injected(signature, call)))
    }

    pub fn to_provider(self, provider: Arc<dyn Provider>) -> Result<(), InjectorError> {
        self.binder.bind_key(self.key, provider, self.scope)
    }

    /// Bind to the constructor of `C`, converted to `T`
    pub fn to_injectable<C: Injectable>(self, cast: fn(Arc<C>) -> Arc<T>) -> Result<(), InjectorError> {
        let scope = self.scope.or_else(C::scope);
        self.binder.bind_key(
            self.key,
            Arc::new(ImplementationProvider::<T, C>::new(cast)),
            scope,
        )
    }
}

impl<'a, T: Send + Sync + 'static> BindingBuilder<'a, T> {
    pub fn to_value(self, value: T) -> Result<(), InjectorError> {
        self.to_instance(Arc::new(value))
    }
}

impl<'a, T: Injectable> BindingBuilder<'a, T> {
    /// Bind `T` to its own constructor
    pub fn to_self(self) -> Result<(), InjectorError> {
        let scope = self.scope.or_else(T::scope);
        self.binder
            .bind_key(self.key, Arc::new(ClassProvider::<T>::new()), scope)
    }
}

/// Fluent builder returned by [`Binder::multibind`]
pub struct MultiBindingBuilder<'a, T: ?Sized> {
    binder: &'a mut Binder,
    key: BindingKey,
    scope: Option<ScopeRef>,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<'a, T: ?Sized + Send + Sync + 'static> MultiBindingBuilder<'a, T> {
    pub fn annotated(mut self, annotation: impl Into<String>) -> Self {
        self.key = self.key.with_annotation(annotation);
        self
    }

    pub fn in_scope(mut self, scope: impl Into<ScopeRef>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn to_element(self, element: Arc<T>) -> Result<(), InjectorError> {
        self.to_sequence(vec![element])
    }

    pub fn to_sequence(self, elements: Vec<Arc<T>>) -> Result<(), InjectorError> {
        self.to_provider(Arc::new(InstanceProvider::of(Arc::new(elements))))
    }

    pub fn to_sequence_factory<F>(self, factory: F) -> Result<(), InjectorError>
    where
        F: Fn(&Injector) -> Result<Vec<Arc<T>>, InjectorError> + Send + Sync + 'static,
    {
        self.to_provider(Arc::new(CallableProvider::contextual(move |injector: &Injector| {
            factory(injector).map(Arc::new)
        })))
    }

    /// Contribute a provider that yields a `Vec<Arc<T>>`
    pub fn to_provider(self, provider: Arc<dyn Provider>) -> Result<(), InjectorError> {
        let aggregate = self.binder.aggregate::<Vec<Arc<T>>>(self.key, self.scope)?;
        aggregate.append(provider);
        Ok(())
    }
}

impl<'a, T: Send + Sync + 'static> MultiBindingBuilder<'a, T> {
    pub fn to_value(self, value: T) -> Result<(), InjectorError> {
        self.to_element(Arc::new(value))
    }
}

/// Fluent builder returned by [`Binder::multibind_map`]
pub struct MapBindingBuilder<'a, T: ?Sized> {
    binder: &'a mut Binder,
    key: BindingKey,
    scope: Option<ScopeRef>,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<'a, T: ?Sized + Send + Sync + 'static> MapBindingBuilder<'a, T> {
    pub fn annotated(mut self, annotation: impl Into<String>) -> Self {
        self.key = self.key.with_annotation(annotation);
        self
    }

    pub fn in_scope(mut self, scope: impl Into<ScopeRef>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn to_entry(self, name: impl Into<String>, value: Arc<T>) -> Result<(), InjectorError> {
        let mut mapping = HashMap::new();
        mapping.insert(name.into(), value);
        self.to_mapping(mapping)
    }

    pub fn to_mapping(self, mapping: HashMap<String, Arc<T>>) -> Result<(), InjectorError> {
        self.to_provider(Arc::new(InstanceProvider::of(Arc::new(mapping))))
    }

    pub fn to_mapping_factory<F>(self, factory: F) -> Result<(), InjectorError>
    where
        F: Fn(&Injector) -> Result<HashMap<String, Arc<T>>, InjectorError> + Send + Sync + 'static,
    {
        self.to_provider(Arc::new(CallableProvider::contextual(move |injector: &Injector| {
            factory(injector).map(Arc::new)
        })))
    }

    /// Contribute a provider that yields a `HashMap<String, Arc<T>>`
    pub fn to_provider(self, provider: Arc<dyn Provider>) -> Result<(), InjectorError> {
        let aggregate = self
            .binder
            .aggregate::<HashMap<String, Arc<T>>>(self.key, self.scope)?;
        aggregate.append(provider);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::scope::ScopeKind;

    #[test]
    fn test_rebinding_replaces_entry() {
        let mut binder = Binder::new(None, ScopeRef::noscope());
        binder.bind::<String>().to_value("asd".to_string()).unwrap();
        binder
            .bind::<String>()
            .in_scope(ScopeKind::Singleton)
            .to_value("qwe".to_string())
            .unwrap();

        assert_eq!(binder.len(), 1);
        let binding = binder.get_binding(&BindingKey::of::<String>()).unwrap();
        assert_eq!(binding.scope(), ScopeRef::singleton());
    }

    #[test]
    fn test_aggregate_keys_are_rejected() {
        let mut binder = Binder::new(None, ScopeRef::noscope());
        let provider: Arc<dyn Provider> = Arc::new(InstanceProvider::of(Arc::new(Vec::<Arc<u8>>::new())));

        let err = binder
            .bind_key(BindingKey::sequence::<u8>(), provider, None)
            .unwrap_err();
        assert!(err.is_invalid_binding());
    }

    #[test]
    fn test_injector_key_is_rejected() {
        let mut binder = Binder::new(None, ScopeRef::noscope());
        let err = binder.bind::<Injector>().to_value(Injector::new()).unwrap_err();
        assert!(err.is_invalid_binding());
    }

    #[test]
    fn test_default_scope_applies_when_unspecified() {
        let mut binder = Binder::new(None, ScopeRef::threadlocal());
        binder.bind::<u32>().to_value(7).unwrap();

        let binding = binder.get_binding(&BindingKey::of::<u32>()).unwrap();
        assert_eq!(binding.scope(), ScopeRef::threadlocal());
    }

    #[test]
    fn test_multibind_scope_conflict_fails_at_bind_time() {
        let mut binder = Binder::new(None, ScopeRef::noscope());
        binder
            .multibind::<str>()
            .in_scope(ScopeKind::Singleton)
            .to_element(Arc::from("a"))
            .unwrap();
        binder.multibind::<str>().to_element(Arc::from("b")).unwrap();

        let err = binder
            .multibind::<str>()
            .in_scope(ScopeKind::ThreadLocal)
            .to_element(Arc::from("c"))
            .unwrap_err();
        assert!(err.is_invalid_binding());
        assert!(binder.has_explicit_binding_for(&BindingKey::sequence::<str>()));
    }
}
