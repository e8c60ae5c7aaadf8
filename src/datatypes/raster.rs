//! Raster payloads: typed pixel buffers with a spatio-temporal reference.

use bytes::{BufMut, Bytes, BytesMut};

use super::stref::{QueryRect, SpatioTemporalRef};
use super::DatatypeError;
use crate::wire::{self, Wire, WireError};

/// Pixel sample type of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
}

impl DataType {
    /// Size of one sample in bytes.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            DataType::U8 => 1,
            DataType::I16 | DataType::U16 => 2,
            DataType::I32 | DataType::U32 | DataType::F32 => 4,
        }
    }

    fn to_wire_code(self) -> u8 {
        match self {
            DataType::U8 => 0,
            DataType::I16 => 1,
            DataType::U16 => 2,
            DataType::I32 => 3,
            DataType::U32 => 4,
            DataType::F32 => 5,
        }
    }

    fn from_wire_code(code: u8) -> Result<Self, WireError> {
        match code {
            0 => Ok(DataType::U8),
            1 => Ok(DataType::I16),
            2 => Ok(DataType::U16),
            3 => Ok(DataType::I32),
            4 => Ok(DataType::U32),
            5 => Ok(DataType::F32),
            other => Err(WireError::Protocol(format!("unknown data type {other}"))),
        }
    }
}

/// A georeferenced pixel buffer.
///
/// `data` stores `depth` z-slices of `height` rows of `width` samples, row
/// major, without padding.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub stref: SpatioTemporalRef,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub data_type: DataType,
    pub no_data: Option<f64>,
    pub pixel_scale_x: f64,
    pub pixel_scale_y: f64,
    pub data: Vec<u8>,
}

impl Raster {
    /// Create a raster from an existing buffer.
    ///
    /// Fails if the buffer length does not match the dimensions.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stref: SpatioTemporalRef,
        width: u32,
        height: u32,
        depth: u32,
        data_type: DataType,
        no_data: Option<f64>,
        data: Vec<u8>,
    ) -> Result<Self, DatatypeError> {
        let expected =
            width as usize * height as usize * depth as usize * data_type.bytes_per_pixel();
        if data.len() != expected {
            return Err(DatatypeError::Argument(format!(
                "raster buffer is {} bytes, dimensions {}x{}x{} require {}",
                data.len(),
                width,
                height,
                depth,
                expected
            )));
        }
        if width == 0 || height == 0 || depth == 0 {
            return Err(DatatypeError::Argument(
                "raster dimensions must be non-zero".into(),
            ));
        }
        let pixel_scale_x = (stref.x2 - stref.x1) / width as f64;
        let pixel_scale_y = (stref.y2 - stref.y1) / height as f64;
        Ok(Self {
            stref,
            width,
            height,
            depth,
            data_type,
            no_data,
            pixel_scale_x,
            pixel_scale_y,
            data,
        })
    }

    /// Create a zero-initialized raster covering `stref`.
    pub fn zeroed(
        stref: SpatioTemporalRef,
        width: u32,
        height: u32,
        depth: u32,
        data_type: DataType,
        no_data: Option<f64>,
    ) -> Result<Self, DatatypeError> {
        let len = width as usize * height as usize * depth as usize * data_type.bytes_per_pixel();
        Self::new(stref, width, height, depth, data_type, no_data, vec![0; len])
    }

    /// Total size of the payload in bytes, used for cache accounting.
    pub fn size_bytes(&self) -> u64 {
        (std::mem::size_of::<Self>() + self.data.len()) as u64
    }

    fn bpp(&self) -> usize {
        self.data_type.bytes_per_pixel()
    }

    fn sample_offset(&self, x: u32, y: u32, z: u32) -> usize {
        ((z as usize * self.height as usize + y as usize) * self.width as usize + x as usize)
            * self.bpp()
    }

    /// Resample this raster onto the grid a query asks for.
    ///
    /// A cache hit covers the query spatially at up to twice its resolution;
    /// this produces the exact requested sub-rectangle and pixel count via
    /// nearest-neighbour sampling. The result keeps this raster's time
    /// interval and the query's spatial bounds.
    pub fn fit_to_query(&self, query: &QueryRect) -> Result<Raster, DatatypeError> {
        let Some(res) = query.resolution else {
            return Err(DatatypeError::Argument(
                "cannot fit a raster to a query without a resolution".into(),
            ));
        };
        let q = &query.stref;
        if q.crs != self.stref.crs {
            return Err(DatatypeError::Argument(format!(
                "fit_to_query: CRS mismatch ({} vs {})",
                q.crs, self.stref.crs
            )));
        }

        let target_stref = SpatioTemporalRef::new(
            q.crs,
            q.x1,
            q.y1,
            q.x2,
            q.y2,
            self.stref.time_kind,
            self.stref.t1,
            self.stref.t2,
        )?;
        let mut out = Raster::zeroed(
            target_stref,
            res.x,
            res.y,
            self.depth,
            self.data_type,
            self.no_data,
        )?;

        let bpp = self.bpp();
        let out_pw = (q.x2 - q.x1) / res.x as f64;
        let out_ph = (q.y2 - q.y1) / res.y as f64;
        let src_w = (self.stref.x2 - self.stref.x1) / self.width as f64;
        let src_h = (self.stref.y2 - self.stref.y1) / self.height as f64;

        for z in 0..self.depth {
            for row in 0..res.y {
                let wy = q.y1 + (row as f64 + 0.5) * out_ph;
                let sy = (((wy - self.stref.y1) / src_h) as i64)
                    .clamp(0, self.height as i64 - 1) as u32;
                for col in 0..res.x {
                    let wx = q.x1 + (col as f64 + 0.5) * out_pw;
                    let sx = (((wx - self.stref.x1) / src_w) as i64)
                        .clamp(0, self.width as i64 - 1) as u32;

                    let src = self.sample_offset(sx, sy, z);
                    let dst = out.sample_offset(col, row, z);
                    out.data[dst..dst + bpp].copy_from_slice(&self.data[src..src + bpp]);
                }
            }
        }
        Ok(out)
    }
}

impl Wire for Raster {
    fn write_to(&self, buf: &mut BytesMut) {
        self.stref.write_to(buf);
        buf.put_u32_le(self.width);
        buf.put_u32_le(self.height);
        buf.put_u32_le(self.depth);
        buf.put_u8(self.data_type.to_wire_code());
        wire::put_opt_f64(buf, self.no_data);
        buf.put_f64_le(self.pixel_scale_x);
        buf.put_f64_le(self.pixel_scale_y);
        buf.put_u64_le(self.data.len() as u64);
        buf.put_slice(&self.data);
    }

    fn read_from(buf: &mut Bytes) -> Result<Self, WireError> {
        let stref = SpatioTemporalRef::read_from(buf)?;
        let width = wire::get_u32(buf, "width")?;
        let height = wire::get_u32(buf, "height")?;
        let depth = wire::get_u32(buf, "depth")?;
        let data_type = DataType::from_wire_code(wire::get_u8(buf, "data_type")?)?;
        let no_data = wire::get_opt_f64(buf, "no_data")?;
        let pixel_scale_x = wire::get_f64(buf, "pixel_scale_x")?;
        let pixel_scale_y = wire::get_f64(buf, "pixel_scale_y")?;
        let len = wire::get_u64(buf, "data_len")? as usize;
        if buf.len() < len {
            return Err(WireError::Truncated("data"));
        }
        let data = buf.split_to(len).to_vec();

        let mut raster = Raster::new(stref, width, height, depth, data_type, no_data, data)
            .map_err(|e| WireError::Protocol(e.to_string()))?;
        raster.pixel_scale_x = pixel_scale_x;
        raster.pixel_scale_y = pixel_scale_y;
        Ok(raster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::stref::{Crs, Resolution, TimeKind};

    fn stref(x1: f64, y1: f64, x2: f64, y2: f64) -> SpatioTemporalRef {
        SpatioTemporalRef::new(Crs::WEB_MERCATOR, x1, y1, x2, y2, TimeKind::Unix, 0.0, 10.0)
            .unwrap()
    }

    /// 4x4 U8 raster whose sample value encodes its (row, col) position.
    fn gradient_raster() -> Raster {
        let data: Vec<u8> = (0..16).map(|i| (i * 10) as u8).collect();
        Raster::new(
            stref(0.0, 0.0, 4.0, 4.0),
            4,
            4,
            1,
            DataType::U8,
            None,
            data,
        )
        .unwrap()
    }

    #[test]
    fn new_validates_buffer_length() {
        let result = Raster::new(
            stref(0.0, 0.0, 4.0, 4.0),
            4,
            4,
            1,
            DataType::U16,
            None,
            vec![0u8; 16], // needs 32
        );
        assert!(matches!(result, Err(DatatypeError::Argument(_))));
    }

    #[test]
    fn new_rejects_zero_dimensions() {
        let result = Raster::new(stref(0.0, 0.0, 1.0, 1.0), 0, 4, 1, DataType::U8, None, vec![]);
        assert!(result.is_err());
    }

    #[test]
    fn zeroed_computes_pixel_scale() {
        let raster = Raster::zeroed(stref(0.0, 0.0, 100.0, 50.0), 100, 100, 1, DataType::U8, None)
            .unwrap();
        assert_eq!(raster.pixel_scale_x, 1.0);
        assert_eq!(raster.pixel_scale_y, 0.5);
        assert_eq!(raster.data.len(), 10_000);
    }

    #[test]
    fn size_bytes_covers_buffer() {
        let raster =
            Raster::zeroed(stref(0.0, 0.0, 4.0, 4.0), 4, 4, 2, DataType::F32, None).unwrap();
        assert!(raster.size_bytes() >= 4 * 4 * 2 * 4);
    }

    #[test]
    fn fit_to_query_identity() {
        let raster = gradient_raster();
        let query = QueryRect::new(
            stref(0.0, 0.0, 4.0, 4.0),
            Some(Resolution { x: 4, y: 4 }),
        );

        let fitted = raster.fit_to_query(&query).unwrap();
        assert_eq!(fitted.data, raster.data);
        assert_eq!(fitted.width, 4);
        assert_eq!(fitted.height, 4);
    }

    #[test]
    fn fit_to_query_clips_sub_rectangle() {
        let raster = gradient_raster();
        // Lower-left quadrant at full per-pixel resolution.
        let query = QueryRect::new(
            stref(0.0, 0.0, 2.0, 2.0),
            Some(Resolution { x: 2, y: 2 }),
        );

        let fitted = raster.fit_to_query(&query).unwrap();
        // Rows 0-1, cols 0-1 of the source gradient.
        assert_eq!(fitted.data, vec![0, 10, 40, 50]);
        assert_eq!(fitted.stref.x2, 2.0);
        assert_eq!(fitted.stref.t2, 10.0, "keeps the entry's time interval");
    }

    #[test]
    fn fit_to_query_downscales_by_two() {
        let raster = gradient_raster();
        let query = QueryRect::new(
            stref(0.0, 0.0, 4.0, 4.0),
            Some(Resolution { x: 2, y: 2 }),
        );

        let fitted = raster.fit_to_query(&query).unwrap();
        assert_eq!(fitted.width, 2);
        assert_eq!(fitted.height, 2);
        // Nearest-neighbour picks the sample under each output pixel center.
        assert_eq!(fitted.data, vec![50, 70, 130, 150]);
    }

    #[test]
    fn fit_to_query_requires_resolution_and_matching_crs() {
        let raster = gradient_raster();
        let no_res = QueryRect::new(stref(0.0, 0.0, 4.0, 4.0), None);
        assert!(raster.fit_to_query(&no_res).is_err());

        let other_crs = QueryRect::new(
            SpatioTemporalRef::new(
                Crs::LAT_LON,
                0.0,
                0.0,
                4.0,
                4.0,
                TimeKind::Unix,
                0.0,
                10.0,
            )
            .unwrap(),
            Some(Resolution { x: 4, y: 4 }),
        );
        assert!(raster.fit_to_query(&other_crs).is_err());
    }

    #[test]
    fn wire_roundtrip_is_identity() {
        let mut raster =
            Raster::zeroed(stref(0.0, 0.0, 8.0, 8.0), 8, 8, 2, DataType::I16, Some(-1.0))
                .unwrap();
        raster.data[7] = 0xAB;

        let mut bytes = raster.to_wire();
        let decoded = Raster::read_from(&mut bytes).unwrap();
        assert_eq!(decoded, raster);
        assert!(bytes.is_empty());
    }

    #[test]
    fn wire_rejects_truncated_buffer() {
        let raster =
            Raster::zeroed(stref(0.0, 0.0, 4.0, 4.0), 4, 4, 1, DataType::U8, None).unwrap();
        let full = raster.to_wire();
        let mut cut = full.slice(0..full.len() - 4);
        assert!(Raster::read_from(&mut cut).is_err());
    }
}
