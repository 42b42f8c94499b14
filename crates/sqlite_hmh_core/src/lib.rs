//! HyperMinHash sketches as SQLite functions.
//!
//! The [`extension`] module decides what can be registered on a host and
//! installs it; [`engine`] implements the callbacks on top of
//! `hyperminhash::Sketch`.

pub mod db;
pub mod engine;
pub mod extension;
pub mod logging;

pub use engine::SketchError;
pub use extension::capability::{CapabilitySet, HostVersion};
pub use extension::descriptor::{
    function_table, validate_table, Callbacks, DescriptorError, FunctionDescriptor, FunctionKind,
    VARIADIC,
};
pub use extension::registrar::{
    load, load_with_capabilities, ExtensionHost, LoadReport, RegisteredFunction, RegistrarError,
    SqliteHost,
};
pub use logging::{default_log_level, init_logging, logging_status};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
