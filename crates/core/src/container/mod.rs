pub mod assisted;
pub mod autowiring;
pub mod binding;
pub mod builder;
pub mod dependency;
pub mod injector;
pub mod key;
pub mod module;
pub mod multibinding;
pub mod provider;
pub mod resolver;
pub mod scope;


pub use assisted::{AssistedBuilder, ClassAssistedBuilder, ProviderOf};
pub use autowiring::{Arguments, Injectable, Parameter, Signature};
pub use binding::{Binder, Binding, BindingBuilder, MapBindingBuilder, MultiBindingBuilder};
pub use builder::InjectorBuilder;
pub use dependency::{Dependency, Key, Recipe};
pub use injector::{Injector, WeakInjector};
pub use key::{BindingKey, KeyShape};
pub use module::Module;
pub use multibinding::{Aggregate, AggregateProvider, MapBindProvider, MultiBindProvider};
pub use provider::{CallableProvider, ClassProvider, ImplementationProvider, Instance, InstanceProvider, Provider};
pub use scope::{NoScope, Scope, ScopeClass, ScopeKind, ScopeRef, SingletonScope, ThreadLocalScope};
