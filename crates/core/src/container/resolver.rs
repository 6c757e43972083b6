use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::container::dependency::{Dependency, Recipe};
use crate::container::injector::Injector;
use crate::container::key::BindingKey;
use crate::container::provider::Provider;
use crate::errors::InjectorError;

/// What is being called in a resolution frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FrameOrigin {
    Type(TypeId),
    Callable(usize),
    Named(String),
}

/// One constructor or function call waiting on injected arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Frame {
    origin: FrameOrigin,
    target: String,
    needed: Vec<String>,
}

impl Frame {
    /// `needed` must be sorted so equal requests compare equal
    pub(crate) fn new(origin: FrameOrigin, target: impl Into<String>, needed: Vec<String>) -> Self {
        Self {
            origin,
            target: target.into(),
            needed,
        }
    }

    fn label(&self) -> String {
        format!("{}({})", self.target, self.needed.join(", "))
    }
}

/// Something the current resolution is waiting on
#[derive(Debug, Clone, PartialEq, Eq)]
enum Pending {
    Call(Frame),
    /// A bound key, together with the injector owning its binding
    Key(Uuid, BindingKey),
}

impl Pending {
    fn label(&self) -> String {
        match self {
            Pending::Call(frame) => frame.label(),
            Pending::Key(_, key) => key.to_string(),
        }
    }
}

/// Keys and calls in progress on the current resolution, used to detect cycles
///
/// Only touched while the hierarchy's resolution lock is held.
pub(crate) struct ResolutionStack {
    pending: Mutex<Vec<Pending>>,
}

impl ResolutionStack {
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Push a frame, failing if the same call is already waiting further down
    pub(crate) fn enter(&self, frame: Frame) -> Result<FrameGuard<'_>, InjectorError> {
        self.push(Pending::Call(frame))
    }

    /// Push a key bound in `owner`, failing if it is already being provided
    pub(crate) fn enter_key(&self, owner: Uuid, key: &BindingKey) -> Result<FrameGuard<'_>, InjectorError> {
        self.push(Pending::Key(owner, key.clone()))
    }

    fn push(&self, entry: Pending) -> Result<FrameGuard<'_>, InjectorError> {
        let mut pending = self.pending.lock();
        if pending.contains(&entry) {
            let path = pending
                .iter()
                .chain(std::iter::once(&entry))
                .map(Pending::label)
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(InjectorError::circular(path, entry.label()));
        }
        pending.push(entry);
        Ok(FrameGuard { stack: self })
    }

    pub(crate) fn snapshot(&self) -> Vec<String> {
        self.pending.lock().iter().map(Pending::label).collect()
    }

    pub(crate) fn depth(&self) -> usize {
        self.pending.lock().len()
    }

    /// Log prefix showing how deep the current resolution is
    pub(crate) fn prefix(&self) -> String {
        format!("{} ", ">".repeat(self.depth() + 1))
    }
}

/// Pops its entry when dropped
pub(crate) struct FrameGuard<'a> {
    stack: &'a ResolutionStack,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.stack.pending.lock().pop();
    }
}

impl Injector {
    /// Injector whose singleton scope should hold the instance for `key`
    ///
    /// Picks the ancestor closest to the root that can satisfy every transitive
    /// dependency of `provider`, falling back to `self`. Providers that cannot
    /// describe their dependencies stay with the injector that owns the binding.
    pub(crate) fn singleton_placement(&self, key: &BindingKey, provider: &Arc<dyn Provider>) -> Injector {
        let Some(dependencies) = provider.dependencies() else {
            let owner = self
                .lookup_binding(key)
                .map(|(_, owner)| owner)
                .unwrap_or_else(|| self.clone());
            debug!("Singleton {} has opaque dependencies, keeping it in injector {}", key, owner.label());
            return owner;
        };

        let mut ancestors: Vec<Injector> = self.ancestors().collect();
        ancestors.reverse();
        for candidate in ancestors {
            let mut visiting = HashSet::new();
            if dependencies
                .iter()
                .all(|dependency| candidate.can_satisfy(dependency, &mut visiting))
            {
                debug!("Singleton {} can be shared from injector {}", key, candidate.label());
                return candidate;
            }
        }
        self.clone()
    }

    /// Check whether this injector's chain could resolve `dependency`
    ///
    /// Opaque providers found along the way are assumed to succeed; a revisited
    /// key is treated as satisfiable and left for cycle detection to report.
    pub(crate) fn can_satisfy(&self, dependency: &Dependency, visiting: &mut HashSet<BindingKey>) -> bool {
        let key = dependency.key();
        if key.is::<Injector>() || dependency.is_special() {
            return true;
        }
        if !visiting.insert(key.clone()) {
            return true;
        }

        let provider = match self.lookup_binding(key) {
            Some((binding, _)) => Some(binding.provider),
            None => match dependency.recipe() {
                Some(Recipe::Class { provider, .. }) if self.auto_bind() => Some(provider()),
                _ => None,
            },
        };

        let satisfied = match provider.map(|provider| provider.dependencies()) {
            None => false,
            Some(None) => true,
            Some(Some(dependencies)) => dependencies
                .iter()
                .all(|dependency| self.can_satisfy(dependency, visiting)),
        };
        visiting.remove(key);
        satisfied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_frame_is_a_cycle() {
        let stack = ResolutionStack::new();
        let outer = Frame::new(FrameOrigin::Named("a".into()), "A", vec!["b".into()]);
        let inner = Frame::new(FrameOrigin::Named("b".into()), "B", vec!["a".into()]);

        let _outer = stack.enter(outer.clone()).unwrap();
        let _inner = stack.enter(inner).unwrap();
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.prefix(), ">>> ");

        match stack.enter(outer) {
            Err(InjectorError::CircularDependency { path, cycle_at }) => {
                assert_eq!(path, "A(b) -> B(a) -> A(b)");
                assert_eq!(cycle_at, "A(b)");
            }
            other => panic!("expected a cycle, got {:?}", other.map(|_| ())),
        };
    }

    #[test]
    fn test_same_target_with_different_needs_is_not_a_cycle() {
        let stack = ResolutionStack::new();
        let origin = FrameOrigin::Named("a".into());

        let _first = stack.enter(Frame::new(origin.clone(), "A", vec!["b".into(), "c".into()])).unwrap();
        assert!(stack.enter(Frame::new(origin, "A", vec!["c".into()])).is_ok());
    }

    #[test]
    fn test_guard_pops_frame() {
        let stack = ResolutionStack::new();
        {
            let _guard = stack
                .enter(Frame::new(FrameOrigin::Callable(1), "f", Vec::new()))
                .unwrap();
            assert_eq!(stack.snapshot(), vec!["f()".to_string()]);
        }
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_reentered_key_is_a_cycle() {
        let stack = ResolutionStack::new();
        let owner = Uuid::new_v4();
        let key = BindingKey::of::<String>();

        let _outer = stack.enter_key(owner, &key).unwrap();
        let _call = stack
            .enter(Frame::new(FrameOrigin::Callable(7), "make", vec!["value".into()]))
            .unwrap();
        assert!(stack.enter_key(Uuid::new_v4(), &key).is_ok());

        match stack.enter_key(owner, &key) {
            Err(InjectorError::CircularDependency { path, cycle_at }) => {
                assert_eq!(cycle_at, key.to_string());
                assert!(path.starts_with(&key.to_string()));
                assert!(path.contains("make(value)"));
            }
            other => panic!("expected a cycle, got {:?}", other.map(|_| ())),
        };
    }
}
