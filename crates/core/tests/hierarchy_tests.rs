//! Integration tests for parent/child injector hierarchies
//!
//! Covers binding lookup through ancestors, child overrides, and where
//! singletons end up cached when several injectors could build them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sprig_core::{
    Arguments, Binder, Injectable, Injector, InjectorError, ScopeKind, Signature, SingletonScope,
};

#[derive(Debug)]
struct Settings {
    dsn: String,
}

#[derive(Debug)]
struct Repository {
    settings: Arc<Settings>,
}

impl Injectable for Repository {
    fn signature() -> Signature {
        Signature::new::<Self>().inject::<Settings>("settings")
    }

    fn construct(args: &mut Arguments) -> Result<Self, InjectorError> {
        Ok(Self {
            settings: args.take("settings")?,
        })
    }
}

fn settings(dsn: &str) -> Settings {
    Settings {
        dsn: dsn.to_string(),
    }
}

#[test]
fn test_child_override_is_visible_to_child_only() {
    let parent = Injector::builder()
        .configure(|binder: &mut Binder| binder.bind::<String>().to_value("asd".to_string()))
        .build()
        .unwrap();
    let child = parent
        .create_child(|binder: &mut Binder| binder.bind::<String>().to_value("qwe".to_string()))
        .unwrap();

    assert_eq!(*child.get::<String>().unwrap(), "qwe");
    assert_eq!(*parent.get::<String>().unwrap(), "asd");
}

#[test]
fn test_child_falls_back_to_parent_bindings() {
    let parent = Injector::builder()
        .configure(|binder| binder.bind::<Settings>().to_value(settings("postgres://parent")))
        .build()
        .unwrap();
    let child = parent.child_builder().build().unwrap();

    let repository = child.get_injectable::<Repository>().unwrap();
    assert_eq!(repository.settings.dsn, "postgres://parent");
    assert!(child.with_binder(|binder| binder.has_binding_for(&sprig_core::BindingKey::of::<Settings>())));
    assert!(!child.with_binder(|binder| binder.has_explicit_binding_for(&sprig_core::BindingKey::of::<Settings>())));
}

#[test]
fn test_singleton_override_replaces_parent_instance() {
    let parent = Injector::builder()
        .configure(|binder| {
            binder
                .bind::<String>()
                .in_scope(ScopeKind::Singleton)
                .to_value("asd".to_string())
        })
        .build()
        .unwrap();
    assert_eq!(*parent.get::<String>().unwrap(), "asd");

    let child = parent
        .create_child(|binder: &mut Binder| {
            binder
                .bind::<String>()
                .in_scope(ScopeKind::Singleton)
                .to_value("qwe".to_string())
        })
        .unwrap();

    assert_eq!(*child.get::<String>().unwrap(), "qwe");
    assert_eq!(*parent.get::<String>().unwrap(), "qwe");
}

#[test]
fn test_singleton_override_is_seen_by_siblings() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    let parent = Injector::builder()
        .configure(move |binder| {
            let counter = counter.clone();
            binder
                .bind::<String>()
                .in_scope(ScopeKind::Singleton)
                .to_factory(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Arc::new("asd".to_string())
                })
        })
        .build()
        .unwrap();
    let sibling = parent.child_builder().build().unwrap();
    assert_eq!(*sibling.get::<String>().unwrap(), "asd");

    let child = parent
        .create_child(|binder: &mut Binder| {
            binder
                .bind::<String>()
                .in_scope(ScopeKind::Singleton)
                .to_value("qwe".to_string())
        })
        .unwrap();

    for _ in 0..3 {
        assert_eq!(*child.get::<String>().unwrap(), "qwe");
        assert_eq!(*sibling.get::<String>().unwrap(), "qwe");
    }
    assert_eq!(*parent.get::<String>().unwrap(), "qwe");
    assert_eq!(built.load(Ordering::SeqCst), 1);
}

#[test]
fn test_parent_binding_resolves_dependencies_on_requesting_injector() {
    let parent = Injector::builder()
        .configure(|binder| {
            binder.bind::<Settings>().to_value(settings("postgres://parent"))?;
            binder.bind::<Repository>().to_self()
        })
        .build()
        .unwrap();
    let child = parent
        .create_child(|binder: &mut Binder| binder.bind::<Settings>().to_value(settings("postgres://child")))
        .unwrap();

    assert_eq!(child.get::<Repository>().unwrap().settings.dsn, "postgres://child");
    assert_eq!(parent.get::<Repository>().unwrap().settings.dsn, "postgres://parent");
}

#[test]
fn test_singleton_is_shared_from_highest_capable_ancestor() {
    let root = Injector::builder()
        .configure(|binder| {
            binder.bind::<Settings>().to_value(settings("postgres://root"))?;
            binder
                .bind::<Repository>()
                .in_scope(ScopeKind::Singleton)
                .to_self()
        })
        .build()
        .unwrap();
    let first = root.child_builder().build().unwrap();
    let second = first.child_builder().build().unwrap();

    let from_second = second.get::<Repository>().unwrap();
    let from_first = first.get::<Repository>().unwrap();
    let from_root = root.get::<Repository>().unwrap();

    assert!(Arc::ptr_eq(&from_second, &from_first));
    assert!(Arc::ptr_eq(&from_first, &from_root));
    let cache = root.scope_instance::<SingletonScope>().unwrap();
    assert!(cache.contains(&sprig_core::BindingKey::of::<Repository>()));
}

#[test]
fn test_child_only_dependency_keeps_singleton_in_child() {
    let root = Injector::builder()
        .configure(|binder| {
            binder
                .bind::<Repository>()
                .in_scope(ScopeKind::Singleton)
                .to_self()
        })
        .build()
        .unwrap();
    let tenant_a = root
        .create_child(|binder: &mut Binder| binder.bind::<Settings>().to_value(settings("postgres://a")))
        .unwrap();
    let tenant_b = root
        .create_child(|binder: &mut Binder| binder.bind::<Settings>().to_value(settings("postgres://b")))
        .unwrap();

    let repo_a = tenant_a.get::<Repository>().unwrap();
    let repo_b = tenant_b.get::<Repository>().unwrap();

    assert_eq!(repo_a.settings.dsn, "postgres://a");
    assert_eq!(repo_b.settings.dsn, "postgres://b");
    assert!(Arc::ptr_eq(&repo_a, &tenant_a.get::<Repository>().unwrap()));
    assert!(root.scope_instance::<SingletonScope>().unwrap().is_empty());
    assert!(root.get::<Repository>().unwrap_err().is_unsatisfied());
}

#[test]
fn test_auto_binding_can_be_disabled() {
    let injector = Injector::builder()
        .auto_bind(false)
        .configure(|binder| binder.bind::<Settings>().to_value(settings("postgres://local")))
        .build()
        .unwrap();

    assert!(injector.get_injectable::<Repository>().unwrap_err().is_unsatisfied());
    assert_eq!(injector.get::<Settings>().unwrap().dsn, "postgres://local");
}

#[test]
fn test_annotated_bindings_are_distinct_keys() {
    let injector = Injector::builder()
        .configure(|binder| {
            binder.bind::<String>().annotated("primary").to_value("db-1".to_string())?;
            binder.bind::<String>().annotated("replica").to_value("db-2".to_string())
        })
        .build()
        .unwrap();

    assert_eq!(*injector.get_annotated::<String>("primary").unwrap(), "db-1");
    assert_eq!(*injector.get_annotated::<String>("replica").unwrap(), "db-2");
    assert!(injector.get::<String>().unwrap_err().is_unsatisfied());
}

#[test]
fn test_interface_binding_builds_implementation() {
    trait Mailer: Send + Sync {
        fn transport(&self) -> String;
    }

    struct SmtpMailer {
        settings: Arc<Settings>,
    }

    impl Mailer for SmtpMailer {
        fn transport(&self) -> String {
            format!("smtp via {}", self.settings.dsn)
        }
    }

    impl Injectable for SmtpMailer {
        fn signature() -> Signature {
            Signature::new::<Self>().inject::<Settings>("settings")
        }

        fn construct(args: &mut Arguments) -> Result<Self, InjectorError> {
            Ok(Self {
                settings: args.take("settings")?,
            })
        }
    }

    let injector = Injector::builder()
        .configure(|binder| {
            binder.bind::<Settings>().to_value(settings("mail.local"))?;
            binder
                .bind::<dyn Mailer>()
                .to_injectable::<SmtpMailer>(|mailer| mailer as Arc<dyn Mailer>)
        })
        .build()
        .unwrap();

    let mailer = injector.get::<dyn Mailer>().unwrap();
    assert_eq!(mailer.transport(), "smtp via mail.local");
}
