//! Byte encoding of sketches.
//!
//! This is the only place that depends on the `serialize` feature; without
//! it both directions fail with [`SketchError::FeatureMissing`].

use super::SketchError;
use hyperminhash::Sketch;

#[cfg(feature = "serialize")]
const ENCODE_CAPACITY_HINT: usize = 32 * 1024;

/// Encodes `sketch` with the engine's own serialization.
#[cfg(feature = "serialize")]
pub fn encode(sketch: &Sketch) -> Result<Vec<u8>, SketchError> {
    let mut buf = Vec::with_capacity(ENCODE_CAPACITY_HINT);
    sketch.save(&mut buf)?;
    Ok(buf)
}

/// Decodes a sketch previously produced by [`encode`].
#[cfg(feature = "serialize")]
pub fn decode(bytes: &[u8]) -> Result<Sketch, SketchError> {
    Ok(Sketch::load(bytes)?)
}

#[cfg(not(feature = "serialize"))]
pub fn encode(_sketch: &Sketch) -> Result<Vec<u8>, SketchError> {
    Err(SketchError::FeatureMissing)
}

#[cfg(not(feature = "serialize"))]
pub fn decode(_bytes: &[u8]) -> Result<Sketch, SketchError> {
    Err(SketchError::FeatureMissing)
}

#[cfg(all(test, feature = "serialize"))]
mod tests {
    use super::{decode, encode};
    use crate::engine::SketchError;
    use hyperminhash::Sketch;

    #[test]
    fn empty_sketch_decodes_to_zero_cardinality() {
        let bytes = encode(&Sketch::default()).expect("encode empty sketch");
        let sketch = decode(&bytes).expect("decode empty sketch");
        assert_eq!(sketch.cardinality(), 0.0);
    }

    #[test]
    fn truncated_bytes_are_an_io_error() {
        let err = decode(&[0u8]).expect_err("one byte is not a sketch");
        assert!(matches!(err, SketchError::Io(_)));
        assert!(err.to_string().starts_with("IO-error in hyperminhash"));
    }
}

#[cfg(all(test, not(feature = "serialize")))]
mod tests {
    use super::{decode, encode};
    use crate::engine::SketchError;
    use hyperminhash::Sketch;

    #[test]
    fn both_directions_report_missing_feature() {
        assert!(matches!(
            encode(&Sketch::default()),
            Err(SketchError::FeatureMissing)
        ));
        assert!(matches!(decode(&[]), Err(SketchError::FeatureMissing)));
    }
}
