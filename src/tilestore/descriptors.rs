//! Wire descriptors of rasters and tiles in the remote store.

use bytes::{BufMut, Bytes, BytesMut};

use crate::wire::{self, Wire, WireError};

/// Compression of a stored tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileCompression {
    Uncompressed,
    Gzip,
    Bzip,
}

impl TileCompression {
    pub fn to_wire_code(self) -> u8 {
        match self {
            TileCompression::Uncompressed => 0,
            TileCompression::Gzip => 1,
            TileCompression::Bzip => 2,
        }
    }

    pub fn from_wire_code(code: u8) -> Result<Self, WireError> {
        match code {
            0 => Ok(TileCompression::Uncompressed),
            1 => Ok(TileCompression::Gzip),
            2 => Ok(TileCompression::Bzip),
            other => Err(WireError::Protocol(format!(
                "unknown tile compression {other}"
            ))),
        }
    }
}

/// One stored tile: where it sits in its raster and in its backing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileDescription {
    pub tileid: i64,
    pub channelid: i32,
    pub fileid: i32,
    /// Byte offset inside the backing file.
    pub offset: u64,
    /// Stored (possibly compressed) size in bytes.
    pub size: u64,
    pub x1: u32,
    pub y1: u32,
    pub z1: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub compression: TileCompression,
}

impl Wire for TileDescription {
    fn write_to(&self, buf: &mut BytesMut) {
        buf.put_i64_le(self.tileid);
        buf.put_i32_le(self.channelid);
        buf.put_i32_le(self.fileid);
        buf.put_u64_le(self.offset);
        buf.put_u64_le(self.size);
        buf.put_u32_le(self.x1);
        buf.put_u32_le(self.y1);
        buf.put_u32_le(self.z1);
        buf.put_u32_le(self.width);
        buf.put_u32_le(self.height);
        buf.put_u32_le(self.depth);
        buf.put_u8(self.compression.to_wire_code());
    }

    fn read_from(buf: &mut Bytes) -> Result<Self, WireError> {
        Ok(Self {
            tileid: wire::get_i64(buf, "tileid")?,
            channelid: wire::get_i32(buf, "channelid")?,
            fileid: wire::get_i32(buf, "fileid")?,
            offset: wire::get_u64(buf, "offset")?,
            size: wire::get_u64(buf, "size")?,
            x1: wire::get_u32(buf, "x1")?,
            y1: wire::get_u32(buf, "y1")?,
            z1: wire::get_u32(buf, "z1")?,
            width: wire::get_u32(buf, "width")?,
            height: wire::get_u32(buf, "height")?,
            depth: wire::get_u32(buf, "depth")?,
            compression: TileCompression::from_wire_code(wire::get_u8(buf, "compression")?)?,
        })
    }
}

/// One stored raster: its id and validity interval.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterDescription {
    pub rasterid: i64,
    pub time_start: f64,
    pub time_end: f64,
}

impl Wire for RasterDescription {
    fn write_to(&self, buf: &mut BytesMut) {
        buf.put_i64_le(self.rasterid);
        buf.put_f64_le(self.time_start);
        buf.put_f64_le(self.time_end);
    }

    fn read_from(buf: &mut Bytes) -> Result<Self, WireError> {
        Ok(Self {
            rasterid: wire::get_i64(buf, "rasterid")?,
            time_start: wire::get_f64(buf, "time_start")?,
            time_end: wire::get_f64(buf, "time_end")?,
        })
    }
}
