use std::any::type_name;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::container::dependency::Dependency;
use crate::container::injector::Injector;
use crate::container::key::BindingKey;
use crate::container::provider::{Instance, Provider};
use crate::errors::InjectorError;

/// A collection that multibound contributions are merged into
pub trait Aggregate: Default + Clone + Send + Sync + 'static {
    fn merge(&mut self, contribution: &Self);
}

impl<T: ?Sized + Send + Sync + 'static> Aggregate for Vec<Arc<T>> {
    fn merge(&mut self, contribution: &Self) {
        self.extend(contribution.iter().cloned());
    }
}

/// Later contributions win for the same name
impl<T: ?Sized + Send + Sync + 'static> Aggregate for HashMap<String, Arc<T>> {
    fn merge(&mut self, contribution: &Self) {
        for (name, value) in contribution {
            self.insert(name.clone(), value.clone());
        }
    }
}

/// Collects contributions for one aggregate key
///
/// Contributions registered on ancestor injectors come first, in the order they
/// were bound.
pub struct AggregateProvider<A: Aggregate> {
    key: BindingKey,
    parent: Option<Injector>,
    contributions: RwLock<Vec<Arc<dyn Provider>>>,
    _marker: PhantomData<fn() -> A>,
}

/// Ordered list aggregate, resolved as `Vec<Arc<T>>`
pub type MultiBindProvider<T> = AggregateProvider<Vec<Arc<T>>>;

/// Named aggregate, resolved as `HashMap<String, Arc<T>>`
pub type MapBindProvider<T> = AggregateProvider<HashMap<String, Arc<T>>>;

impl<A: Aggregate> AggregateProvider<A> {
    pub(crate) fn new(key: BindingKey, parent: Option<Injector>) -> Self {
        Self {
            key,
            parent,
            contributions: RwLock::new(Vec::new()),
            _marker: PhantomData,
        }
    }

    /// Add a provider that yields an `A` to be merged
    pub fn append(&self, contribution: Arc<dyn Provider>) {
        self.contributions.write().push(contribution);
    }

    pub fn len(&self) -> usize {
        self.contributions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collect(&self, provider: &Arc<dyn Provider>, injector: &Injector) -> Result<Arc<A>, InjectorError> {
        let produced = provider.get(injector)?;
        produced.downcast::<A>().ok_or_else(|| {
            InjectorError::unknown_provider(format!(
                "contribution to {} produced {} instead of {}",
                self.key,
                produced.type_name(),
                type_name::<A>()
            ))
        })
    }
}

impl<A: Aggregate> Provider for AggregateProvider<A> {
    fn get(&self, injector: &Injector) -> Result<Instance, InjectorError> {
        let mut merged = A::default();

        if let Some(parent) = &self.parent {
            if let Some((binding, owner)) = parent.lookup_binding(&self.key) {
                let inherited = if binding.scope.is_noscope() {
                    self.collect(&binding.provider, injector)?
                } else {
                    let entry = parent.scope_entry(&binding.scope, &owner);
                    let scoped = entry.scope.get(&self.key, binding.provider)?;
                    self.collect(&scoped, parent)?
                };
                merged.merge(&inherited);
            }
        }

        let contributions = self.contributions.read().clone();
        for contribution in &contributions {
            let part = self.collect(contribution, injector)?;
            merged.merge(&part);
        }

        Ok(Instance::new(Arc::new(merged)))
    }

    fn dependencies(&self) -> Option<Vec<Dependency>> {
        let mut dependencies = Vec::new();
        for contribution in self.contributions.read().iter() {
            dependencies.extend(contribution.dependencies()?);
        }
        Some(dependencies)
    }

    fn describe(&self) -> String {
        format!("AggregateProvider({}, {} contributions)", self.key, self.len())
    }
}
