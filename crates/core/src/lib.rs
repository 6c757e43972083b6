pub mod config;
pub mod container;
pub mod errors;

// Re-export key types for convenience
pub use config::{ConfigError, ConfigSource, InjectorConfig};
pub use container::{
    Arguments, AssistedBuilder, Binder, BindingKey, ClassAssistedBuilder, Injectable, Injector,
    InjectorBuilder, Key, Module, Provider, ProviderOf, Scope, ScopeClass, ScopeKind, ScopeRef,
    Signature, SingletonScope, ThreadLocalScope,
};
pub use errors::{ErrorReport, InjectorError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version
pub fn version() -> &'static str {
    VERSION
}
