//! Plot payloads: opaque rendered results of plot operators.

use bytes::{Bytes, BytesMut};

use super::stref::SpatioTemporalRef;
use crate::wire::{self, Wire, WireError};

/// A rendered plot, carried as text (typically JSON produced by the plot
/// operator) together with the reference of the data it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct Plot {
    pub stref: SpatioTemporalRef,
    pub body: String,
}

impl Plot {
    pub fn new(stref: SpatioTemporalRef, body: impl Into<String>) -> Self {
        Self {
            stref,
            body: body.into(),
        }
    }

    pub fn size_bytes(&self) -> u64 {
        (std::mem::size_of::<Self>() + self.body.len()) as u64
    }
}

impl Wire for Plot {
    fn write_to(&self, buf: &mut BytesMut) {
        self.stref.write_to(buf);
        wire::put_string(buf, &self.body);
    }

    fn read_from(buf: &mut Bytes) -> Result<Self, WireError> {
        let stref = SpatioTemporalRef::read_from(buf)?;
        let body = wire::get_string(buf, "body")?;
        Ok(Self { stref, body })
    }
}
