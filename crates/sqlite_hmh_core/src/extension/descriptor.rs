//! SQL function descriptors and the registration table.
//!
//! # Responsibility
//! - Describe every SQL-visible function: name, arity and callbacks.
//! - Build the ordered registration table from a [`CapabilitySet`].
//! - Validate the table before any of it reaches the host.
//!
//! # Invariants
//! - Every name is registered in every build; a missing capability binds a
//!   stub that fails at call time instead of dropping the name.
//! - `(name, arity)` pairs are unique within one table.

use crate::engine::{self, FinalFn, ScalarFn, StepFn};
use crate::extension::capability::CapabilitySet;
use hyperminhash::Sketch;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::functions::{Aggregate, Context};
use rusqlite::types::Value;
use serde::Serialize;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

/// Arity value for functions accepting any number of arguments.
pub const VARIADIC: i32 = -1;
/// Largest fixed arity SQLite accepts in `sqlite3_create_function_v2`.
pub const MAX_ARITY: i32 = 127;

pub const SKETCH_AGGREGATE: &str = "sketch_aggregate";
pub const SKETCH_ZERO: &str = "sketch_zero";
pub const SKETCH_ADD: &str = "sketch_add";
pub const SKETCH_SERIALIZE: &str = "sketch_serialize";
pub const SKETCH_DESERIALIZE: &str = "sketch_deserialize";
pub const SKETCH_UNION: &str = "sketch_union";
pub const SKETCH_INTERSECTION: &str = "sketch_intersection";

static FUNCTION_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid function name regex"));

/// Call shape of a registered function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    Scalar,
    Aggregate,
}

/// Step/final pair handed to the host as one aggregate.
#[derive(Clone, Copy)]
pub struct SketchAggregate {
    step: StepFn,
    finalize: FinalFn,
}

impl SketchAggregate {
    pub const fn new(step: StepFn, finalize: FinalFn) -> Self {
        Self { step, finalize }
    }
}

impl Aggregate<Sketch, Value> for SketchAggregate {
    fn init(&self, _ctx: &mut Context<'_>) -> rusqlite::Result<Sketch> {
        Ok(Sketch::default())
    }

    fn step(&self, ctx: &mut Context<'_>, acc: &mut Sketch) -> rusqlite::Result<()> {
        (self.step)(ctx, acc)
    }

    fn finalize(&self, _ctx: &mut Context<'_>, acc: Option<Sketch>) -> rusqlite::Result<Value> {
        (self.finalize)(acc)
    }
}

/// Callback roles for one function.
#[derive(Clone, Copy)]
pub enum Callbacks {
    Scalar(ScalarFn),
    Aggregate(SketchAggregate),
}

impl Callbacks {
    pub fn kind(&self) -> FunctionKind {
        match self {
            Self::Scalar(_) => FunctionKind::Scalar,
            Self::Aggregate(_) => FunctionKind::Aggregate,
        }
    }
}

impl Debug for Callbacks {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(_) => f.write_str("Scalar(x_func)"),
            Self::Aggregate(_) => f.write_str("Aggregate(x_step, x_final)"),
        }
    }
}

/// One SQL function as handed to the host.
#[derive(Debug, Clone, Copy)]
pub struct FunctionDescriptor {
    pub name: &'static str,
    pub arity: i32,
    pub callbacks: Callbacks,
}

impl FunctionDescriptor {
    pub const fn scalar(name: &'static str, arity: i32, x_func: ScalarFn) -> Self {
        Self {
            name,
            arity,
            callbacks: Callbacks::Scalar(x_func),
        }
    }

    pub const fn aggregate(
        name: &'static str,
        arity: i32,
        x_step: StepFn,
        x_final: FinalFn,
    ) -> Self {
        Self {
            name,
            arity,
            callbacks: Callbacks::Aggregate(SketchAggregate::new(x_step, x_final)),
        }
    }

    pub fn kind(&self) -> FunctionKind {
        self.callbacks.kind()
    }
}

/// Builds the ordered registration table for `caps`.
///
/// `sketch_union` is always registered as a one-argument aggregate; the
/// two-argument scalar overload is added when `supports_union_arity2` is set.
pub fn function_table(caps: &CapabilitySet) -> Vec<FunctionDescriptor> {
    let serialized = caps.supports_serialize;
    let scalar = |name, arity, x_func: ScalarFn| {
        if serialized {
            FunctionDescriptor::scalar(name, arity, x_func)
        } else {
            FunctionDescriptor::scalar(name, arity, engine::unsupported_scalar)
        }
    };
    let aggregate = |name, arity, x_step: StepFn, x_final: FinalFn| {
        if serialized {
            FunctionDescriptor::aggregate(name, arity, x_step, x_final)
        } else {
            FunctionDescriptor::aggregate(
                name,
                arity,
                engine::unsupported_step,
                engine::unsupported_final,
            )
        }
    };

    let mut table = vec![
        FunctionDescriptor::aggregate(
            SKETCH_AGGREGATE,
            VARIADIC,
            engine::step,
            engine::estimate_final,
        ),
        scalar(SKETCH_ZERO, 0, engine::zero),
        scalar(SKETCH_ADD, VARIADIC, engine::add),
        aggregate(
            SKETCH_SERIALIZE,
            VARIADIC,
            engine::step,
            engine::serialize_final,
        ),
        scalar(SKETCH_DESERIALIZE, 1, engine::deserialize),
        aggregate(
            SKETCH_UNION,
            1,
            engine::union_step,
            engine::serialize_final,
        ),
    ];
    if caps.supports_union_arity2 {
        table.push(scalar(SKETCH_UNION, 2, engine::union_pair));
    }
    table.push(scalar(SKETCH_INTERSECTION, 2, engine::intersection));
    table
}

/// Checks names, arities and uniqueness of a registration table.
pub fn validate_table(table: &[FunctionDescriptor]) -> Result<(), DescriptorError> {
    let mut seen = BTreeSet::<(&str, i32)>::new();
    for descriptor in table {
        if !FUNCTION_NAME_RE.is_match(descriptor.name) {
            return Err(DescriptorError::InvalidName(descriptor.name.to_string()));
        }
        if descriptor.arity < VARIADIC || descriptor.arity > MAX_ARITY {
            return Err(DescriptorError::InvalidArity {
                name: descriptor.name.to_string(),
                arity: descriptor.arity,
            });
        }
        if !seen.insert((descriptor.name, descriptor.arity)) {
            return Err(DescriptorError::Duplicate {
                name: descriptor.name.to_string(),
                arity: descriptor.arity,
            });
        }
    }
    Ok(())
}

/// Registration table validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    InvalidName(String),
    InvalidArity { name: String, arity: i32 },
    Duplicate { name: String, arity: i32 },
}

impl Display for DescriptorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(name) => write!(f, "function name is invalid: {name}"),
            Self::InvalidArity { name, arity } => {
                write!(f, "function {name} has unsupported arity {arity}")
            }
            Self::Duplicate { name, arity } => {
                write!(f, "function {name}/{arity} is declared twice")
            }
        }
    }
}

impl Error for DescriptorError {}
