//! Spatio-temporal references and query rectangles.
//!
//! Every cached artifact and every incoming query carries a
//! [`SpatioTemporalRef`]: a coordinate reference system, an axis-aligned
//! bounding box and a validity interval in time. A [`QueryRect`] extends the
//! reference with the requested pixel resolution (absent for vector queries).

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use chrono::DateTime;

use super::DatatypeError;
use crate::wire::{self, Wire, WireError};

/// Coordinate reference system identifier.
///
/// The numeric value is the EPSG code where one exists; `UNREFERENCED` marks
/// data without a georeference (e.g. plots over abstract axes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Crs(pub u16);

impl Crs {
    pub const UNREFERENCED: Crs = Crs(0);
    pub const WEB_MERCATOR: Crs = Crs(3857);
    pub const LAT_LON: Crs = Crs(4326);
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Interpretation of the temporal axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeKind {
    /// No temporal reference; infinite bounds are permitted.
    Unreferenced,
    /// Seconds since the UNIX epoch.
    Unix,
}

impl TimeKind {
    fn to_wire_code(self) -> u32 {
        match self {
            TimeKind::Unreferenced => 0,
            TimeKind::Unix => 1,
        }
    }

    fn from_wire_code(code: u32) -> Result<Self, WireError> {
        match code {
            0 => Ok(TimeKind::Unreferenced),
            1 => Ok(TimeKind::Unix),
            other => Err(WireError::Protocol(format!("unknown time kind {other}"))),
        }
    }
}

/// Records which axes were flipped while normalizing a bounding box, so
/// callers can reorient their output accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisFlip {
    pub x: bool,
    pub y: bool,
}

/// A CRS, an axis-aligned bounding box and a time interval.
///
/// Invariants: `x1 <= x2`, `y1 <= y2`, `t1 <= t2`. Non-finite spatial bounds
/// are only allowed for [`Crs::UNREFERENCED`], non-finite temporal bounds only
/// for [`TimeKind::Unreferenced`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatioTemporalRef {
    pub crs: Crs,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub time_kind: TimeKind,
    pub t1: f64,
    pub t2: f64,
}

impl SpatioTemporalRef {
    /// Create a validated reference.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        crs: Crs,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        time_kind: TimeKind,
        t1: f64,
        t2: f64,
    ) -> Result<Self, DatatypeError> {
        let stref = Self {
            crs,
            x1,
            y1,
            x2,
            y2,
            time_kind,
            t1,
            t2,
        };
        stref.validate()?;
        Ok(stref)
    }

    /// Create a reference, flipping inverted axes instead of rejecting them.
    ///
    /// Returns the normalized reference together with the flips performed.
    #[allow(clippy::too_many_arguments)]
    pub fn with_flip(
        crs: Crs,
        mut x1: f64,
        mut y1: f64,
        mut x2: f64,
        mut y2: f64,
        time_kind: TimeKind,
        t1: f64,
        t2: f64,
    ) -> Result<(Self, AxisFlip), DatatypeError> {
        let mut flip = AxisFlip::default();
        if x1 > x2 {
            std::mem::swap(&mut x1, &mut x2);
            flip.x = true;
        }
        if y1 > y2 {
            std::mem::swap(&mut y1, &mut y2);
            flip.y = true;
        }
        Ok((Self::new(crs, x1, y1, x2, y2, time_kind, t1, t2)?, flip))
    }

    /// The full valid extent of a known CRS, temporally unbounded.
    pub fn extent(crs: Crs) -> Result<Self, DatatypeError> {
        let (x1, y1, x2, y2) = match crs {
            Crs::WEB_MERCATOR => (-20037508.34, -20037508.34, 20037508.34, 20037508.34),
            Crs::LAT_LON => (-180.0, -90.0, 180.0, 90.0),
            other => {
                return Err(DatatypeError::Argument(format!(
                    "cannot return extent of unknown CRS {other}"
                )))
            }
        };
        Self::new(
            crs,
            x1,
            y1,
            x2,
            y2,
            TimeKind::Unreferenced,
            f64::NEG_INFINITY,
            f64::INFINITY,
        )
    }

    fn validate(&self) -> Result<(), DatatypeError> {
        if !(self.x1 <= self.x2) || !(self.y1 <= self.y2) {
            return Err(DatatypeError::Argument(format!(
                "invalid bounding box, requires x1:{} <= x2:{}, y1:{} <= y2:{}",
                self.x1, self.x2, self.y1, self.y2
            )));
        }
        if !(self.t1 <= self.t2) {
            return Err(DatatypeError::Argument(format!(
                "invalid time interval, requires t1:{} <= t2:{}",
                self.t1, self.t2
            )));
        }
        let spatial_finite =
            self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite();
        if !spatial_finite && self.crs != Crs::UNREFERENCED {
            return Err(DatatypeError::Argument(format!(
                "non-finite bounds are only allowed for unreferenced extents (crs {})",
                self.crs
            )));
        }
        let temporal_finite = self.t1.is_finite() && self.t2.is_finite();
        if !temporal_finite && self.time_kind != TimeKind::Unreferenced {
            return Err(DatatypeError::Argument(
                "non-finite time bounds are only allowed for unreferenced time".into(),
            ));
        }
        Ok(())
    }

    /// Whether `other` is spatially and temporally contained in this
    /// reference (closed bounds on every side).
    pub fn contains(&self, other: &SpatioTemporalRef) -> Result<bool, DatatypeError> {
        if self.crs != other.crs {
            return Err(DatatypeError::Argument(format!(
                "contains: CRS mismatch ({} vs {})",
                self.crs, other.crs
            )));
        }
        if self.time_kind != other.time_kind {
            return Err(DatatypeError::Argument(
                "contains: time kinds do not match".into(),
            ));
        }
        Ok(self.x1 <= other.x1
            && self.y1 <= other.y1
            && self.x2 >= other.x2
            && self.y2 >= other.y2
            && self.t1 <= other.t1
            && self.t2 >= other.t2)
    }

    /// Whether a query instant falls into the validity interval.
    ///
    /// The upper bound is open so that adjacent intervals produced by
    /// reprojection chains do not both claim the boundary instant. A
    /// degenerate interval (`t1 == t2`) matches exactly at `t1`.
    pub fn contains_instant(&self, ts: f64) -> bool {
        if self.t1 == self.t2 {
            return ts == self.t1;
        }
        ts >= self.t1 && ts < self.t2
    }

    /// Shrink the time interval to the intersection with `other`.
    pub fn intersect_time(&mut self, other: &SpatioTemporalRef) -> Result<(), DatatypeError> {
        if self.time_kind != other.time_kind {
            return Err(DatatypeError::Argument(
                "cannot intersect intervals with different time kinds".into(),
            ));
        }
        let t1 = self.t1.max(other.t1);
        let t2 = self.t2.min(other.t2);
        if t1 > t2 {
            return Err(DatatypeError::Argument(
                "time intervals do not intersect".into(),
            ));
        }
        self.t1 = t1;
        self.t2 = t2;
        Ok(())
    }

    /// Render a timestamp of this reference as ISO-8601 (UNIX time only).
    pub fn to_iso(&self, ts: f64) -> String {
        match self.time_kind {
            TimeKind::Unix => DateTime::from_timestamp(ts as i64, 0)
                .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
                .unwrap_or_else(|| ts.to_string()),
            TimeKind::Unreferenced => ts.to_string(),
        }
    }
}

impl fmt::Display for SpatioTemporalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "STRef[crs: {}, x: [{},{}], y: [{},{}], t: [{},{}]]",
            self.crs, self.x1, self.x2, self.y1, self.y2, self.t1, self.t2
        )
    }
}

impl Wire for SpatioTemporalRef {
    fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.crs.0 as u32);
        buf.put_f64_le(self.x1);
        buf.put_f64_le(self.y1);
        buf.put_f64_le(self.x2);
        buf.put_f64_le(self.y2);
        buf.put_u32_le(self.time_kind.to_wire_code());
        buf.put_f64_le(self.t1);
        buf.put_f64_le(self.t2);
    }

    fn read_from(buf: &mut Bytes) -> Result<Self, WireError> {
        let crs = Crs(wire::get_u32(buf, "crs")? as u16);
        let x1 = wire::get_f64(buf, "x1")?;
        let y1 = wire::get_f64(buf, "y1")?;
        let x2 = wire::get_f64(buf, "x2")?;
        let y2 = wire::get_f64(buf, "y2")?;
        let time_kind = TimeKind::from_wire_code(wire::get_u32(buf, "time_kind")?)?;
        let t1 = wire::get_f64(buf, "t1")?;
        let t2 = wire::get_f64(buf, "t2")?;
        SpatioTemporalRef::new(crs, x1, y1, x2, y2, time_kind, t1, t2)
            .map_err(|e| WireError::Protocol(e.to_string()))
    }
}

/// Requested output resolution in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub x: u32,
    pub y: u32,
}

/// A spatio-temporal reference plus the requested resolution.
///
/// Created once per incoming request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRect {
    pub stref: SpatioTemporalRef,
    pub resolution: Option<Resolution>,
}

impl QueryRect {
    pub fn new(stref: SpatioTemporalRef, resolution: Option<Resolution>) -> Self {
        Self { stref, resolution }
    }

    /// The query instant: the start of the requested time interval.
    pub fn timestamp(&self) -> f64 {
        self.stref.t1
    }

    /// Spatial midpoint, the input to locality-aware placement.
    pub fn center(&self) -> (f64, f64) {
        (
            self.stref.x1 + (self.stref.x2 - self.stref.x1) / 2.0,
            self.stref.y1 + (self.stref.y2 - self.stref.y1) / 2.0,
        )
    }
}

impl fmt::Display for QueryRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.stref;
        write!(
            f,
            "QueryRect[crs: {}, timestamp: {}, x: [{},{}], y: [{},{}]",
            s.crs,
            self.timestamp(),
            s.x1,
            s.x2,
            s.y1,
            s.y2
        )?;
        if let Some(res) = self.resolution {
            write!(f, ", res: [{},{}]", res.x, res.y)?;
        }
        write!(f, "]")
    }
}

impl Wire for QueryRect {
    fn write_to(&self, buf: &mut BytesMut) {
        self.stref.write_to(buf);
        match self.resolution {
            Some(res) => {
                buf.put_u8(1);
                buf.put_u32_le(res.x);
                buf.put_u32_le(res.y);
            }
            None => buf.put_u8(0),
        }
    }

    fn read_from(buf: &mut Bytes) -> Result<Self, WireError> {
        let stref = SpatioTemporalRef::read_from(buf)?;
        let resolution = match wire::get_u8(buf, "resolution")? {
            0 => None,
            1 => Some(Resolution {
                x: wire::get_u32(buf, "xres")?,
                y: wire::get_u32(buf, "yres")?,
            }),
            tag => {
                return Err(WireError::Protocol(format!(
                    "invalid resolution tag {tag}"
                )))
            }
        };
        Ok(QueryRect::new(stref, resolution))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unix_ref(x1: f64, y1: f64, x2: f64, y2: f64, t1: f64, t2: f64) -> SpatioTemporalRef {
        SpatioTemporalRef::new(Crs::WEB_MERCATOR, x1, y1, x2, y2, TimeKind::Unix, t1, t2).unwrap()
    }

    #[test]
    fn new_rejects_inverted_axes() {
        let result = SpatioTemporalRef::new(
            Crs::WEB_MERCATOR,
            10.0,
            0.0,
            0.0,
            10.0,
            TimeKind::Unix,
            0.0,
            1.0,
        );
        assert!(matches!(result, Err(DatatypeError::Argument(_))));
    }

    #[test]
    fn new_rejects_inverted_time() {
        let result = SpatioTemporalRef::new(
            Crs::WEB_MERCATOR,
            0.0,
            0.0,
            1.0,
            1.0,
            TimeKind::Unix,
            10.0,
            0.0,
        );
        assert!(matches!(result, Err(DatatypeError::Argument(_))));
    }

    #[test]
    fn with_flip_records_flipped_axes() {
        let (stref, flip) = SpatioTemporalRef::with_flip(
            Crs::LAT_LON,
            180.0,
            -90.0,
            -180.0,
            90.0,
            TimeKind::Unix,
            0.0,
            1.0,
        )
        .unwrap();

        assert!(flip.x);
        assert!(!flip.y);
        assert_eq!(stref.x1, -180.0);
        assert_eq!(stref.x2, 180.0);
    }

    #[test]
    fn infinite_bounds_require_unreferenced_crs() {
        let result = SpatioTemporalRef::new(
            Crs::WEB_MERCATOR,
            f64::NEG_INFINITY,
            0.0,
            f64::INFINITY,
            1.0,
            TimeKind::Unix,
            0.0,
            1.0,
        );
        assert!(result.is_err());

        let ok = SpatioTemporalRef::new(
            Crs::UNREFERENCED,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
            f64::INFINITY,
            f64::INFINITY,
            TimeKind::Unreferenced,
            f64::NEG_INFINITY,
            f64::INFINITY,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn infinite_time_requires_unreferenced_kind() {
        let result = SpatioTemporalRef::new(
            Crs::WEB_MERCATOR,
            0.0,
            0.0,
            1.0,
            1.0,
            TimeKind::Unix,
            f64::NEG_INFINITY,
            f64::INFINITY,
        );
        assert!(result.is_err());
    }

    #[test]
    fn extent_of_known_systems() {
        let merc = SpatioTemporalRef::extent(Crs::WEB_MERCATOR).unwrap();
        assert_eq!(merc.x2, 20037508.34);

        let latlon = SpatioTemporalRef::extent(Crs::LAT_LON).unwrap();
        assert_eq!(latlon.y1, -90.0);
        assert_eq!(latlon.y2, 90.0);

        assert!(SpatioTemporalRef::extent(Crs(9999)).is_err());
    }

    #[test]
    fn contains_checks_all_axes() {
        let outer = unix_ref(0.0, 0.0, 100.0, 100.0, 0.0, 10.0);
        let inner = unix_ref(10.0, 10.0, 90.0, 90.0, 2.0, 8.0);
        let wide = unix_ref(-10.0, 10.0, 90.0, 90.0, 2.0, 8.0);
        let late = unix_ref(10.0, 10.0, 90.0, 90.0, 2.0, 12.0);

        assert!(outer.contains(&inner).unwrap());
        assert!(!outer.contains(&wide).unwrap());
        assert!(!outer.contains(&late).unwrap());
    }

    #[test]
    fn contains_rejects_crs_mismatch() {
        let a = unix_ref(0.0, 0.0, 1.0, 1.0, 0.0, 1.0);
        let b = SpatioTemporalRef::new(
            Crs::LAT_LON,
            0.0,
            0.0,
            1.0,
            1.0,
            TimeKind::Unix,
            0.0,
            1.0,
        )
        .unwrap();
        assert!(a.contains(&b).is_err());
    }

    #[test]
    fn contains_instant_is_half_open() {
        let stref = unix_ref(0.0, 0.0, 1.0, 1.0, 0.0, 10.0);
        assert!(stref.contains_instant(0.0));
        assert!(stref.contains_instant(5.0));
        assert!(!stref.contains_instant(10.0));
        assert!(!stref.contains_instant(-1.0));
    }

    #[test]
    fn contains_instant_degenerate_interval() {
        let stref = unix_ref(0.0, 0.0, 1.0, 1.0, 5.0, 5.0);
        assert!(stref.contains_instant(5.0));
        assert!(!stref.contains_instant(5.1));
    }

    #[test]
    fn intersect_time_narrows_interval() {
        let mut a = unix_ref(0.0, 0.0, 1.0, 1.0, 0.0, 10.0);
        let b = unix_ref(0.0, 0.0, 1.0, 1.0, 5.0, 20.0);
        a.intersect_time(&b).unwrap();
        assert_eq!(a.t1, 5.0);
        assert_eq!(a.t2, 10.0);

        let disjoint = unix_ref(0.0, 0.0, 1.0, 1.0, 50.0, 60.0);
        assert!(a.intersect_time(&disjoint).is_err());
    }

    #[test]
    fn to_iso_renders_unix_time() {
        let stref = unix_ref(0.0, 0.0, 1.0, 1.0, 0.0, 10.0);
        assert_eq!(stref.to_iso(0.0), "1970-01-01T00:00:00");
    }

    #[test]
    fn stref_wire_roundtrip_is_identity() {
        let stref = unix_ref(-20037508.34, -20037508.34, 20037508.34, 20037508.34, 0.0, 3600.0);
        let mut bytes = stref.to_wire();
        let decoded = SpatioTemporalRef::read_from(&mut bytes).unwrap();
        assert_eq!(decoded, stref);
        assert!(bytes.is_empty());
    }

    #[test]
    fn query_rect_center() {
        let qr = QueryRect::new(
            unix_ref(0.0, 0.0, 100.0, 50.0, 0.0, 1.0),
            Some(Resolution { x: 256, y: 256 }),
        );
        assert_eq!(qr.center(), (50.0, 25.0));
        assert_eq!(qr.timestamp(), 0.0);
    }

    #[test]
    fn query_rect_wire_roundtrip() {
        let with_res = QueryRect::new(
            unix_ref(0.0, 0.0, 100.0, 50.0, 0.0, 1.0),
            Some(Resolution { x: 512, y: 256 }),
        );
        let without = QueryRect::new(unix_ref(0.0, 0.0, 1.0, 1.0, 0.0, 1.0), None);

        for qr in [with_res, without] {
            let mut bytes = qr.to_wire();
            assert_eq!(QueryRect::read_from(&mut bytes).unwrap(), qr);
        }
    }
}
