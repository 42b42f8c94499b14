//! Sketch engine functional contract.
//!
//! # Responsibility
//! - Adapt `hyperminhash::Sketch` to the callback shapes SQLite invokes:
//!   scalar `x_func`, aggregate `x_step` and `x_final`.
//! - Turn engine failures into user-function errors the SQL caller can read.
//!
//! # Invariants
//! - Callbacks are plain function pointers and own no state; aggregate state
//!   lives in the host's aggregate context.
//! - Sketch arguments must be BLOBs produced by this engine.

use hyperminhash::Sketch;
use rusqlite::functions::Context;
use rusqlite::types::{Value, ValueRef};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;

pub mod codec;
pub mod value;

pub use value::{row_values, RowValue};

/// Scalar callback (`x_func`).
pub type ScalarFn = fn(&Context<'_>) -> rusqlite::Result<Value>;
/// Aggregate step callback (`x_step`).
pub type StepFn = fn(&mut Context<'_>, &mut Sketch) -> rusqlite::Result<()>;
/// Aggregate finalizer (`x_final`); `None` when no row was stepped.
pub type FinalFn = fn(Option<Sketch>) -> rusqlite::Result<Value>;

/// Errors raised while evaluating a sketch function.
#[derive(Debug)]
pub enum SketchError {
    FeatureMissing,
    ValueIsNotBlob,
    MissingSketchArgument(&'static str),
    Io(io::Error),
}

impl Display for SketchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FeatureMissing => write!(
                f,
                "This function is unavailable because sqlite_hmh was compiled without the `serialize`-feature."
            ),
            Self::ValueIsNotBlob => write!(f, "value is not of type BLOB"),
            Self::MissingSketchArgument(function) => {
                write!(f, "{function} requires a serialized sketch as its first argument")
            }
            Self::Io(err) => write!(f, "IO-error in hyperminhash: {err}"),
        }
    }
}

impl Error for SketchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for SketchError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<SketchError> for rusqlite::Error {
    fn from(value: SketchError) -> Self {
        rusqlite::Error::UserFunctionError(Box::new(value))
    }
}

fn sketch_from(value: ValueRef<'_>) -> Result<Sketch, SketchError> {
    match value {
        ValueRef::Blob(bytes) => codec::decode(bytes),
        _ => Err(SketchError::ValueIsNotBlob),
    }
}

fn sketch_arg(ctx: &Context<'_>, idx: usize) -> Result<Sketch, SketchError> {
    sketch_from(ctx.get_raw(idx))
}

fn encoded(sketch: &Sketch) -> rusqlite::Result<Value> {
    Ok(Value::Blob(codec::encode(sketch)?))
}

/// `x_step`: hashes the row's non-NULL arguments into the sketch.
pub fn step(ctx: &mut Context<'_>, sketch: &mut Sketch) -> rusqlite::Result<()> {
    sketch.add(row_values(ctx, 0));
    Ok(())
}

/// `x_final`: cardinality estimate, `0.0` when no row was stepped.
pub fn estimate_final(sketch: Option<Sketch>) -> rusqlite::Result<Value> {
    Ok(Value::Real(sketch.map_or(0.0, |sketch| sketch.cardinality())))
}

/// `x_final`: serialized sketch, empty when no row was stepped.
pub fn serialize_final(sketch: Option<Sketch>) -> rusqlite::Result<Value> {
    encoded(&sketch.unwrap_or_default())
}

/// Serialized empty sketch.
pub fn zero(_ctx: &Context<'_>) -> rusqlite::Result<Value> {
    encoded(&Sketch::default())
}

/// Adds one row of values to a serialized sketch.
///
/// The first argument is the sketch; the remaining arguments form the row.
/// With no row arguments the sketch is returned re-encoded but unchanged.
pub fn add(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    if ctx.len() == 0 {
        return Err(SketchError::MissingSketchArgument("sketch_add").into());
    }
    let mut sketch = sketch_arg(ctx, 0)?;
    if ctx.len() > 1 {
        sketch.add(row_values(ctx, 1));
    }
    encoded(&sketch)
}

/// Validates a serialized sketch and returns its cardinality.
pub fn deserialize(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    let sketch = sketch_arg(ctx, 0)?;
    Ok(Value::Real(sketch.cardinality()))
}

/// `x_step` of the aggregate union: merges each non-NULL serialized sketch.
pub fn union_step(ctx: &mut Context<'_>, acc: &mut Sketch) -> rusqlite::Result<()> {
    let other = match ctx.get_raw(0) {
        ValueRef::Null => return Ok(()),
        value => sketch_from(value)?,
    };
    acc.union(&other);
    Ok(())
}

/// Merges two serialized sketches into a new serialized sketch.
pub fn union_pair(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    let mut merged = sketch_arg(ctx, 0)?;
    let other = sketch_arg(ctx, 1)?;
    merged.union(&other);
    encoded(&merged)
}

/// Estimated cardinality of the intersection of two serialized sketches.
pub fn intersection(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    let left = sketch_arg(ctx, 0)?;
    let right = sketch_arg(ctx, 1)?;
    Ok(Value::Real(left.intersection(&right)))
}

/// Stub bound in place of a scalar whose capability is not available.
pub fn unsupported_scalar(_ctx: &Context<'_>) -> rusqlite::Result<Value> {
    Err(SketchError::FeatureMissing.into())
}

/// Stub bound in place of an aggregate step whose capability is not available.
pub fn unsupported_step(_ctx: &mut Context<'_>, _acc: &mut Sketch) -> rusqlite::Result<()> {
    Err(SketchError::FeatureMissing.into())
}

/// Stub finalizer; also covers aggregates that never stepped.
pub fn unsupported_final(_sketch: Option<Sketch>) -> rusqlite::Result<Value> {
    Err(SketchError::FeatureMissing.into())
}

#[cfg(test)]
mod tests {
    use super::{estimate_final, RowValue, SketchError};
    use hyperminhash::Sketch;
    use rusqlite::types::Value;

    #[test]
    fn estimate_of_no_rows_is_zero() {
        assert_eq!(estimate_final(None).unwrap(), Value::Real(0.0));
    }

    #[test]
    fn estimate_counts_distinct_rows() {
        let mut sketch = Sketch::default();
        for i in 0..10i64 {
            sketch.add(vec![RowValue::Int(i % 5)]);
        }
        let Value::Real(estimate) = estimate_final(Some(sketch)).unwrap() else {
            panic!("estimate must be REAL");
        };
        assert!(estimate > 4.5 && estimate < 5.5, "estimate={estimate}");
    }

    #[test]
    fn errors_render_sql_facing_messages() {
        assert_eq!(
            SketchError::ValueIsNotBlob.to_string(),
            "value is not of type BLOB"
        );
        assert!(SketchError::FeatureMissing
            .to_string()
            .contains("`serialize`-feature"));
        assert_eq!(
            SketchError::MissingSketchArgument("sketch_add").to_string(),
            "sketch_add requires a serialized sketch as its first argument"
        );
    }

    #[test]
    fn converts_into_user_function_error() {
        let err: rusqlite::Error = SketchError::ValueIsNotBlob.into();
        assert!(matches!(err, rusqlite::Error::UserFunctionError(_)));
    }
}
