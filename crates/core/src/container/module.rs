use crate::container::binding::Binder;
use crate::errors::InjectorError;

/// A unit of configuration that adds bindings to a binder
///
/// Modules run once, when the injector they are given to is built, in the order
/// they were added. A later module may override bindings made by an earlier one.
pub trait Module: Send + Sync {
    /// Register this module's bindings
    fn configure(&self, binder: &mut Binder) -> Result<(), InjectorError>;

    /// Get module name (defaults to type name)
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> Module for F
where
    F: Fn(&mut Binder) -> Result<(), InjectorError> + Send + Sync,
{
    fn configure(&self, binder: &mut Binder) -> Result<(), InjectorError> {
        self(binder)
    }

    fn name(&self) -> &str {
        "closure"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::key::BindingKey;
    use crate::container::scope::ScopeRef;

    struct GreetingModule;

    impl Module for GreetingModule {
        fn configure(&self, binder: &mut Binder) -> Result<(), InjectorError> {
            binder.bind::<String>().to_value("hello".to_string())
        }
    }

    struct OverridingModule;

    impl Module for OverridingModule {
        fn configure(&self, binder: &mut Binder) -> Result<(), InjectorError> {
            binder.bind::<String>().to_value("bonjour".to_string())?;
            binder.bind::<u16>().to_value(8080)
        }
    }

    #[test]
    fn test_install_runs_modules_in_order() {
        let mut binder = Binder::new(None, ScopeRef::noscope());
        binder.install(&GreetingModule).unwrap();
        binder.install(&OverridingModule).unwrap();

        assert_eq!(binder.len(), 2);
        assert!(binder.has_explicit_binding_for(&BindingKey::of::<u16>()));
        assert!(GreetingModule.name().ends_with("GreetingModule"));
    }

    #[test]
    fn test_closure_modules() {
        let module = |binder: &mut Binder| -> Result<(), InjectorError> {
            binder.bind::<u8>().to_value(1)
        };
        let mut binder = Binder::new(None, ScopeRef::noscope());
        binder.install(&module).unwrap();

        assert_eq!(module.name(), "closure");
        assert!(binder.has_explicit_binding_for(&BindingKey::of::<u8>()));
    }
}
