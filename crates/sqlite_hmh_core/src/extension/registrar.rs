//! Extension registrar: version gate plus function registration.
//!
//! # Responsibility
//! - Check the host against the minimum supported version before touching it.
//! - Register the capability-resolved function table in declared order.
//!
//! # Invariants
//! - The host is borrowed for the duration of one `load` call only.
//! - An incompatible host gets zero registrations.
//! - The first failed registration stops the load; its host status code is
//!   surfaced unchanged.

use crate::extension::capability::{CapabilitySet, HostVersion};
use crate::extension::descriptor::{
    function_table, validate_table, Callbacks, DescriptorError, FunctionDescriptor, FunctionKind,
};
use log::{debug, error, info};
use rusqlite::functions::FunctionFlags;
use rusqlite::{ffi, Connection};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::os::raw::c_int;
use std::time::Instant;

/// Host operations the registrar needs.
pub trait ExtensionHost {
    /// Version of the running host library.
    fn version(&self) -> HostVersion;
    /// Installs one function; the error carries the host's status code.
    fn create_function(
        &self,
        descriptor: &FunctionDescriptor,
        flags: FunctionFlags,
    ) -> rusqlite::Result<()>;
}

/// Host backed by one SQLite connection.
pub struct SqliteHost<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteHost<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ExtensionHost for SqliteHost<'_> {
    fn version(&self) -> HostVersion {
        HostVersion::from_number(rusqlite::version_number())
    }

    fn create_function(
        &self,
        descriptor: &FunctionDescriptor,
        flags: FunctionFlags,
    ) -> rusqlite::Result<()> {
        match descriptor.callbacks {
            Callbacks::Scalar(x_func) => {
                self.conn
                    .create_scalar_function(descriptor.name, descriptor.arity, flags, x_func)
            }
            Callbacks::Aggregate(aggregate) => self.conn.create_aggregate_function(
                descriptor.name,
                descriptor.arity,
                flags,
                aggregate,
            ),
        }
    }
}

/// One installed function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredFunction {
    pub name: &'static str,
    pub arity: i32,
    pub kind: FunctionKind,
}

/// Result of a successful load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub capabilities: CapabilitySet,
    pub registered: Vec<RegisteredFunction>,
}

impl LoadReport {
    pub fn is_registered(&self, name: &str, arity: i32) -> bool {
        self.registered
            .iter()
            .any(|function| function.name == name && function.arity == arity)
    }
}

/// Registers every sketch function on `host` using this build's capabilities.
pub fn load(host: &dyn ExtensionHost) -> Result<LoadReport, RegistrarError> {
    let capabilities = CapabilitySet::for_host(host.version());
    load_with_capabilities(host, capabilities)
}

/// Same as [`load`], with an explicit capability set.
pub fn load_with_capabilities(
    host: &dyn ExtensionHost,
    capabilities: CapabilitySet,
) -> Result<LoadReport, RegistrarError> {
    let started_at = Instant::now();
    info!(
        "event=extension_load module=registrar status=start host_version={} serialize={} union_arity2={}",
        capabilities.host_version,
        capabilities.supports_serialize,
        capabilities.supports_union_arity2
    );

    if !capabilities.is_host_compatible() {
        let err = RegistrarError::IncompatibleHost {
            found: capabilities.host_version,
            required: capabilities.min_host_version,
        };
        error!(
            "event=extension_load module=registrar status=error error_code=incompatible_host error={}",
            err
        );
        return Err(err);
    }

    let table = function_table(&capabilities);
    if let Err(err) = validate_table(&table) {
        error!(
            "event=extension_load module=registrar status=error error_code=invalid_descriptor error={}",
            err
        );
        return Err(err.into());
    }

    let flags = capabilities.function_flags();
    let mut registered = Vec::with_capacity(table.len());
    for descriptor in &table {
        if let Err(source) = host.create_function(descriptor, flags) {
            let err = RegistrarError::Registration {
                function: descriptor.name,
                arity: descriptor.arity,
                source,
            };
            error!(
                "event=extension_load module=registrar status=error error_code=register_failed status_code={} error={}",
                err.status_code(),
                err
            );
            return Err(err);
        }
        debug!(
            "event=function_register module=registrar status=ok name={} arity={} kind={:?}",
            descriptor.name,
            descriptor.arity,
            descriptor.kind()
        );
        registered.push(RegisteredFunction {
            name: descriptor.name,
            arity: descriptor.arity,
            kind: descriptor.kind(),
        });
    }

    info!(
        "event=extension_load module=registrar status=ok functions={} duration_ms={}",
        registered.len(),
        started_at.elapsed().as_millis()
    );
    Ok(LoadReport {
        capabilities,
        registered,
    })
}

/// Load failures.
#[derive(Debug)]
pub enum RegistrarError {
    IncompatibleHost {
        found: HostVersion,
        required: HostVersion,
    },
    InvalidDescriptor(DescriptorError),
    Registration {
        function: &'static str,
        arity: i32,
        source: rusqlite::Error,
    },
}

impl RegistrarError {
    /// Status code handed back to the host loader.
    ///
    /// Registration failures return the host's own extended code.
    pub fn status_code(&self) -> c_int {
        match self {
            Self::Registration {
                source: rusqlite::Error::SqliteFailure(err, _),
                ..
            } => err.extended_code,
            _ => ffi::SQLITE_ERROR,
        }
    }

    /// Message for the host's error output, when this error owns one.
    ///
    /// Registration failures return `None`: the host already knows why it
    /// refused the function.
    pub fn host_message(&self) -> Option<String> {
        match self {
            Self::IncompatibleHost { .. } | Self::InvalidDescriptor(_) => Some(self.to_string()),
            Self::Registration { .. } => None,
        }
    }
}

impl Display for RegistrarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IncompatibleHost { found, required } => write!(
                f,
                "sqlite_hmh requires sqlite {required} or later (found {found})"
            ),
            Self::InvalidDescriptor(err) => write!(f, "invalid function table: {err}"),
            Self::Registration {
                function,
                arity,
                source,
            } => write!(f, "failed to register {function}/{arity}: {source}"),
        }
    }
}

impl Error for RegistrarError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::IncompatibleHost { .. } => None,
            Self::InvalidDescriptor(err) => Some(err),
            Self::Registration { source, .. } => Some(source),
        }
    }
}

impl From<DescriptorError> for RegistrarError {
    fn from(value: DescriptorError) -> Self {
        Self::InvalidDescriptor(value)
    }
}
