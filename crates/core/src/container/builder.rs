use crate::config::InjectorConfig;
use crate::container::binding::Binder;
use crate::container::injector::Injector;
use crate::container::module::Module;
use crate::container::scope::ScopeRef;
use crate::errors::InjectorError;

/// Builder for root and child injectors
///
/// Settings not given explicitly come from the attached [`InjectorConfig`], then
/// from the parent injector, then from the defaults (auto-binding on, unscoped).
pub struct InjectorBuilder {
    parent: Option<Injector>,
    modules: Vec<Box<dyn Module>>,
    config: Option<InjectorConfig>,
    auto_bind: Option<bool>,
    default_scope: Option<ScopeRef>,
    name: Option<String>,
}

impl InjectorBuilder {
    pub fn new() -> Self {
        Self {
            parent: None,
            modules: Vec::new(),
            config: None,
            auto_bind: None,
            default_scope: None,
            name: None,
        }
    }

    pub(crate) fn child_of(parent: Injector) -> Self {
        Self {
            parent: Some(parent),
            ..Self::new()
        }
    }

    /// Add a module; modules are installed in the order they are added
    pub fn module<M: Module + 'static>(mut self, module: M) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    /// Add a closure module
    pub fn configure<F>(self, configure: F) -> Self
    where
        F: Fn(&mut Binder) -> Result<(), InjectorError> + Send + Sync + 'static,
    {
        self.module(configure)
    }

    pub fn auto_bind(mut self, enabled: bool) -> Self {
        self.auto_bind = Some(enabled);
        self
    }

    pub fn default_scope(mut self, scope: impl Into<ScopeRef>) -> Self {
        self.default_scope = Some(scope.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn config(mut self, config: InjectorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the injector and run its modules
    pub fn build(self) -> Result<Injector, InjectorError> {
        if let Some(config) = &self.config {
            config.validate()?;
        }

        let auto_bind = self
            .auto_bind
            .or_else(|| self.config.as_ref().map(|config| config.auto_bind))
            .or_else(|| self.parent.as_ref().map(Injector::auto_bind))
            .unwrap_or(true);
        let default_scope = self
            .default_scope
            .or_else(|| self.config.as_ref().map(|config| config.default_scope.scope_ref()))
            .or_else(|| self.parent.as_ref().map(Injector::default_scope))
            .unwrap_or_else(ScopeRef::noscope);
        let name = self
            .name
            .or_else(|| self.config.as_ref().and_then(|config| config.name.clone()));

        let injector = Injector::assemble(self.parent, name, auto_bind, default_scope);
        for module in &self.modules {
            injector.install(module.as_ref())?;
        }
        Ok(injector)
    }
}

impl Default for InjectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
