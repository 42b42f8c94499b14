//! Connection bootstrap for embedding applications.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections with the sketch functions
//!   already installed.
//!
//! # Invariants
//! - A returned connection has passed the registrar's version gate and has
//!   every function of the registration table.

use crate::extension::registrar::RegistrarError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Registrar(RegistrarError),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Registrar(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Registrar(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<RegistrarError> for DbError {
    fn from(value: RegistrarError) -> Self {
        Self::Registrar(value)
    }
}
