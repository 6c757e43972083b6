pub mod core;

pub use self::core::{ErrorReport, InjectorError};
