//! Schema-encoded policies (bincode).

use std::marker::PhantomData;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::CodecPolicy;
use crate::error::NtwkError;
use crate::msgs::Image;

// ── RawImage ─────────────────────────────────────────────────────

/// Identity image form: the image schema, uncompressed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawImage;

impl CodecPolicy for RawImage {
    type Message = Image;

    fn encode(&self, msg: &Image) -> Result<Bytes, NtwkError> {
        msg.validate()?;
        Ok(Bytes::from(bincode::serialize(msg)?))
    }

    fn decode(&self, wire: Bytes) -> Result<Image, NtwkError> {
        let img: Image = bincode::deserialize(&wire)?;
        img.validate()?;
        Ok(img)
    }
}

// ── Bincode<T> ───────────────────────────────────────────────────

/// Bincode encoding of any serde schema type.
pub struct Bincode<T> {
    _schema: PhantomData<fn() -> T>,
}

impl<T> Bincode<T> {
    pub fn new() -> Self {
        Self {
            _schema: PhantomData,
        }
    }
}

impl<T> Default for Bincode<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Bincode<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Bincode<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bincode<{}>", std::any::type_name::<T>())
    }
}

impl<T> CodecPolicy for Bincode<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    type Message = T;

    fn encode(&self, msg: &T) -> Result<Bytes, NtwkError> {
        Ok(Bytes::from(bincode::serialize(msg)?))
    }

    fn decode(&self, wire: Bytes) -> Result<T, NtwkError> {
        Ok(bincode::deserialize(&wire)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgs::{Twist, Vector3};

    #[test]
    fn raw_image_roundtrip_is_byte_exact() {
        let img = Image::new(3, 2, 4, (0u8..24).collect());
        let wire = RawImage.encode(&img).unwrap();
        assert_eq!(RawImage.decode(wire).unwrap(), img);
    }

    #[test]
    fn raw_image_rejects_inconsistent_schema() {
        let bad = Image::new(3, 2, 4, vec![0; 5]);
        let wire = Bytes::from(bincode::serialize(&bad).unwrap());
        assert!(RawImage.decode(wire).is_err());
    }

    #[test]
    fn bincode_twist() {
        let twist = Twist {
            linear: Vector3::new(0.5, 0.0, 0.0),
            angular: Vector3::new(0.0, 0.0, -1.25),
        };
        let policy = Bincode::<Twist>::new();
        assert_eq!(policy.decode(policy.encode(&twist).unwrap()).unwrap(), twist);
    }

    #[test]
    fn bincode_truncated_fails() {
        let policy = Bincode::<Vector3>::new();
        let wire = policy.encode(&Vector3::new(1.0, 2.0, 3.0)).unwrap();
        assert!(policy.decode(wire.slice(..10)).is_err());
    }
}
