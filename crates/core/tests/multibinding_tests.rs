//! Integration tests for sequence and mapping multibindings

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sprig_core::{Arguments, Binder, Injectable, Injector, InjectorError, ScopeKind, Signature};

trait Plugin: Send + Sync {
    fn name(&self) -> &str;
}

struct Named(&'static str);

impl Plugin for Named {
    fn name(&self) -> &str {
        self.0
    }
}

fn plugin(name: &'static str) -> Arc<dyn Plugin> {
    Arc::new(Named(name))
}

fn names(plugins: &[Arc<dyn Plugin>]) -> Vec<String> {
    plugins.iter().map(|p| p.name().to_string()).collect()
}

#[test]
fn test_contributions_keep_call_order() {
    let injector = Injector::builder()
        .configure(|binder| {
            binder.multibind::<dyn Plugin>().to_element(plugin("auth"))?;
            binder
                .multibind::<dyn Plugin>()
                .to_sequence(vec![plugin("cache"), plugin("metrics")])
        })
        .configure(|binder| binder.multibind::<dyn Plugin>().to_element(plugin("audit")))
        .build()
        .unwrap();

    let plugins = injector.get_all::<dyn Plugin>().unwrap();
    assert_eq!(names(&plugins), vec!["auth", "cache", "metrics", "audit"]);
}

#[test]
fn test_child_contributions_follow_parent_contributions() {
    let parent = Injector::builder()
        .configure(|binder| binder.multibind::<String>().to_value("parent".to_string()))
        .build()
        .unwrap();
    let child = parent
        .create_child(|binder: &mut Binder| binder.multibind::<String>().to_value("child".to_string()))
        .unwrap();

    let from_child: Vec<String> = child
        .get_all::<String>()
        .unwrap()
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(from_child, vec!["parent", "child"]);
    assert_eq!(parent.get_all::<String>().unwrap().len(), 1);
}

#[test]
fn test_sequence_factory_resolves_through_injector() {
    let injector = Injector::builder()
        .configure(|binder| {
            binder.bind::<u16>().to_value(8080)?;
            binder
                .multibind::<String>()
                .to_sequence_factory(|injector: &Injector| {
                    let port = injector.get::<u16>()?;
                    Ok(vec![Arc::new(format!("0.0.0.0:{}", port))])
                })
        })
        .build()
        .unwrap();

    let listeners = injector.get_all::<String>().unwrap();
    assert_eq!(*listeners[0], "0.0.0.0:8080");
}

#[test]
fn test_mapping_last_write_wins() {
    let injector = Injector::builder()
        .configure(|binder| {
            binder
                .multibind_map::<dyn Plugin>()
                .to_entry("storage", plugin("disk"))?;
            binder
                .multibind_map::<dyn Plugin>()
                .to_entry("queue", plugin("memory"))?;
            binder
                .multibind_map::<dyn Plugin>()
                .to_entry("storage", plugin("s3"))
        })
        .build()
        .unwrap();

    let plugins = injector.get_map::<dyn Plugin>().unwrap();
    assert_eq!(plugins.len(), 2);
    assert_eq!(plugins["storage"].name(), "s3");
    assert_eq!(plugins["queue"].name(), "memory");
}

#[test]
fn test_singleton_aggregate_is_cached() {
    let injector = Injector::builder()
        .configure(|binder| {
            binder
                .multibind::<String>()
                .in_scope(ScopeKind::Singleton)
                .to_sequence_factory(|_: &Injector| Ok(vec![Arc::new("only".to_string())]))
        })
        .build()
        .unwrap();

    let first = injector.get_all::<String>().unwrap();
    let second = injector.get_all::<String>().unwrap();
    assert!(Arc::ptr_eq(&first[0], &second[0]));
}

#[test]
fn test_singleton_parent_aggregate_is_built_once_for_children() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    let parent = Injector::builder()
        .configure(move |binder| {
            let counter = counter.clone();
            binder
                .multibind::<String>()
                .in_scope(ScopeKind::Singleton)
                .to_sequence_factory(move |_: &Injector| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![Arc::new("parent".to_string())])
                })
        })
        .build()
        .unwrap();
    let child = parent
        .create_child(|binder: &mut Binder| binder.multibind::<String>().to_value("child".to_string()))
        .unwrap();

    let first = child.get_all::<String>().unwrap();
    let second = child.get_all::<String>().unwrap();
    let names: Vec<&str> = first.iter().map(|name| name.as_str()).collect();
    assert_eq!(names, vec!["parent", "child"]);
    assert!(Arc::ptr_eq(&first[0], &second[0]));

    let from_parent = parent.get_all::<String>().unwrap();
    assert!(Arc::ptr_eq(&first[0], &from_parent[0]));
    assert_eq!(built.load(Ordering::SeqCst), 1);
}

#[test]
fn test_contribution_cannot_change_aggregate_scope() {
    let result = Injector::builder()
        .configure(|binder| {
            binder.multibind::<String>().to_value("a".to_string())?;
            binder
                .multibind::<String>()
                .in_scope(ScopeKind::Singleton)
                .to_value("b".to_string())
        })
        .build();

    assert!(result.unwrap_err().is_invalid_binding());
}

#[test]
fn test_aggregates_can_be_injected() {
    struct Router {
        routes: Arc<HashMap<String, Arc<String>>>,
    }

    impl Injectable for Router {
        fn signature() -> Signature {
            Signature::new::<Self>().inject_map::<String>("routes")
        }

        fn construct(args: &mut Arguments) -> Result<Self, InjectorError> {
            Ok(Self {
                routes: args.take("routes")?,
            })
        }
    }

    let injector = Injector::builder()
        .configure(|binder| {
            binder
                .multibind_map::<String>()
                .to_entry("/health", Arc::new("ok".to_string()))
        })
        .build()
        .unwrap();

    let router = injector.get_injectable::<Router>().unwrap();
    assert_eq!(router.routes["/health"].as_str(), "ok");
}
