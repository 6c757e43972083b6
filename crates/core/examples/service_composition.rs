//! Example: composing an application from modules and per-request child injectors
//!
//! Run with `RUST_LOG=sprig_core=debug` to see how each key is resolved and
//! where singletons end up cached.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sprig_core::{
    Arguments, AssistedBuilder, Binder, Injectable, Injector, InjectorConfig, InjectorError, Key,
    Module, ScopeKind, Signature,
};
use tracing_subscriber::EnvFilter;

pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

struct FixedClock(u64);

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}

pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;
}

struct Logging;
struct Compression;

impl Middleware for Logging {
    fn name(&self) -> &'static str {
        "logging"
    }
}

impl Middleware for Compression {
    fn name(&self) -> &'static str {
        "compression"
    }
}

pub struct ConnectionPool {
    dsn: Arc<String>,
    id: usize,
}

static POOLS: AtomicUsize = AtomicUsize::new(0);

impl Injectable for ConnectionPool {
    fn signature() -> Signature {
        Signature::new::<Self>().inject_annotated::<String>("dsn", "database")
    }

    fn construct(args: &mut Arguments) -> Result<Self, InjectorError> {
        Ok(Self {
            dsn: args.take("dsn")?,
            id: POOLS.fetch_add(1, Ordering::SeqCst),
        })
    }

    fn scope() -> Option<sprig_core::ScopeRef> {
        Some(ScopeKind::Singleton.into())
    }
}

pub struct CurrentUser(String);

pub struct OrderHandler {
    pool: Arc<ConnectionPool>,
    clock: Arc<dyn Clock>,
    user: Arc<CurrentUser>,
    order_id: Arc<u64>,
}

impl Injectable for OrderHandler {
    fn signature() -> Signature {
        Signature::new::<Self>()
            .autowire::<ConnectionPool>("pool")
            .inject::<dyn Clock>("clock")
            .inject::<CurrentUser>("user")
            .noninjectable::<u64>("order_id")
    }

    fn construct(args: &mut Arguments) -> Result<Self, InjectorError> {
        Ok(Self {
            pool: args.take("pool")?,
            clock: args.take("clock")?,
            user: args.take("user")?,
            order_id: args.take("order_id")?,
        })
    }
}

impl OrderHandler {
    fn describe(&self) -> String {
        format!(
            "order {} for {} at {} via pool #{} ({})",
            self.order_id,
            self.user.0,
            self.clock.now(),
            self.pool.id,
            self.pool.dsn
        )
    }
}

struct InfrastructureModule {
    dsn: String,
}

impl Module for InfrastructureModule {
    fn configure(&self, binder: &mut Binder) -> Result<(), InjectorError> {
        binder
            .bind::<String>()
            .annotated("database")
            .to_value(self.dsn.clone())?;
        binder.bind::<dyn Clock>().to_instance(Arc::new(FixedClock(1_700_000_000)))?;
        binder.bind::<ConnectionPool>().to_self()?;
        binder.multibind::<dyn Middleware>().to_element(Arc::new(Logging))?;
        binder.multibind::<dyn Middleware>().to_element(Arc::new(Compression))
    }

    fn name(&self) -> &str {
        "infrastructure"
    }
}

fn handle_request(app: &Injector, user: &str, order_id: u64) -> Result<String, InjectorError> {
    let user = user.to_string();
    let request = app
        .child_builder()
        .name(format!("request:{}", user))
        .configure(move |binder| binder.bind::<CurrentUser>().to_value(CurrentUser(user.clone())))
        .build()?;

    let handlers = request.get_key(&Key::<AssistedBuilder<OrderHandler>>::assisted_key(
        &Key::injectable(),
    ))?;
    let handler = handlers.build(Arguments::new().with_value("order_id", order_id))?;
    Ok(handler.describe())
}

fn main() -> Result<(), InjectorError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = InjectorConfig::from_env()?.with_name("app");
    let app = Injector::builder()
        .config(config)
        .module(InfrastructureModule {
            dsn: "postgres://localhost/orders".to_string(),
        })
        .build()?;

    let middleware: Vec<&str> = app
        .get_all::<dyn Middleware>()?
        .iter()
        .map(|m| m.name())
        .collect();
    println!("middleware: {}", middleware.join(" -> "));

    println!("{}", handle_request(&app, "alice", 1)?);
    println!("{}", handle_request(&app, "bob", 2)?);
    println!("connection pools created: {}", POOLS.load(Ordering::SeqCst));

    Ok(())
}
