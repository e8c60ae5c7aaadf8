//! Feature collections: points, lines and polygons.
//!
//! All three share the same storage scheme inherited from the simple-features
//! model: one flat coordinate vector plus one offset vector per nesting level.
//! Every offset vector starts at 0 and ends with a terminator equal to the
//! length of the layer below it, so feature `i` spans
//! `offsets[i]..offsets[i + 1]` without a special case for the last feature.

use std::collections::HashMap;

use bytes::{BufMut, Bytes, BytesMut};

use super::stref::SpatioTemporalRef;
use super::DatatypeError;
use crate::wire::{self, Wire, WireError};

/// A single x/y coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Per-feature validity interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeInterval {
    pub start: f64,
    pub end: f64,
}

impl TimeInterval {
    pub fn new(start: f64, end: f64) -> Result<Self, DatatypeError> {
        if start > end {
            return Err(DatatypeError::Argument(format!(
                "invalid time interval, requires start:{start} <= end:{end}"
            )));
        }
        Ok(Self { start, end })
    }
}

/// Collection-global attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeMaps {
    pub textual: HashMap<String, String>,
    pub numeric: HashMap<String, f64>,
}

/// Per-feature attribute arrays; each vector holds one value per feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureAttributes {
    pub textual: HashMap<String, Vec<String>>,
    pub numeric: HashMap<String, Vec<f64>>,
}

/// State shared by all collection kinds: georeference, coordinates,
/// per-feature time and attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBase {
    pub stref: SpatioTemporalRef,
    pub coordinates: Vec<Coordinate>,
    /// Empty when the collection carries no per-feature time.
    pub time: Vec<TimeInterval>,
    pub global_attributes: AttributeMaps,
    pub feature_attributes: FeatureAttributes,
}

impl FeatureBase {
    fn new(stref: SpatioTemporalRef) -> Self {
        Self {
            stref,
            coordinates: Vec::new(),
            time: Vec::new(),
            global_attributes: AttributeMaps::default(),
            feature_attributes: FeatureAttributes::default(),
        }
    }

    fn add_coordinate(&mut self, x: f64, y: f64) {
        self.coordinates.push(Coordinate::new(x, y));
    }

    /// Whether the attached time vector covers every feature.
    fn has_time(&self, feature_count: usize) -> bool {
        self.time.len() == feature_count
    }

    /// Replace per-feature time with `count` copies of one interval.
    fn set_default_time(&mut self, count: usize, interval: TimeInterval) {
        self.time.clear();
        self.time.resize(count, interval);
    }

    fn size_bytes(&self) -> u64 {
        let attrs = &self.feature_attributes;
        let textual: usize = attrs
            .textual
            .values()
            .flat_map(|v| v.iter().map(String::len))
            .sum();
        let numeric: usize = attrs.numeric.values().map(|v| v.len() * 8).sum();
        let globals: usize = self
            .global_attributes
            .textual
            .values()
            .map(String::len)
            .sum::<usize>()
            + self.global_attributes.numeric.len() * 8;
        (self.coordinates.len() * std::mem::size_of::<Coordinate>()
            + self.time.len() * std::mem::size_of::<TimeInterval>()
            + textual
            + numeric
            + globals) as u64
    }

    fn validate(&self, feature_count: usize) -> Result<(), DatatypeError> {
        if !self.time.is_empty() && self.time.len() != feature_count {
            return Err(DatatypeError::Feature(format!(
                "time vector has {} entries for {} features",
                self.time.len(),
                feature_count
            )));
        }
        for (name, values) in &self.feature_attributes.textual {
            if values.len() != feature_count {
                return Err(DatatypeError::Feature(format!(
                    "attribute array '{name}' has {} entries for {feature_count} features",
                    values.len()
                )));
            }
        }
        for (name, values) in &self.feature_attributes.numeric {
            if values.len() != feature_count {
                return Err(DatatypeError::Feature(format!(
                    "attribute array '{name}' has {} entries for {feature_count} features",
                    values.len()
                )));
            }
        }
        Ok(())
    }

    fn write_to(&self, buf: &mut BytesMut) {
        self.stref.write_to(buf);
        buf.put_u64_le(self.coordinates.len() as u64);
        for c in &self.coordinates {
            buf.put_f64_le(c.x);
            buf.put_f64_le(c.y);
        }
        buf.put_u64_le(self.time.len() as u64);
        for t in &self.time {
            buf.put_f64_le(t.start);
            buf.put_f64_le(t.end);
        }
        write_string_map(buf, &self.global_attributes.textual);
        write_f64_map(buf, &self.global_attributes.numeric);
        write_string_array_map(buf, &self.feature_attributes.textual);
        write_f64_array_map(buf, &self.feature_attributes.numeric);
    }

    fn read_from(buf: &mut Bytes) -> Result<Self, WireError> {
        let stref = SpatioTemporalRef::read_from(buf)?;
        let coord_count = wire::get_u64(buf, "coordinate_count")? as usize;
        let mut coordinates = Vec::with_capacity(coord_count.min(1 << 20));
        for _ in 0..coord_count {
            coordinates.push(Coordinate::new(
                wire::get_f64(buf, "coordinate.x")?,
                wire::get_f64(buf, "coordinate.y")?,
            ));
        }
        let time_count = wire::get_u64(buf, "time_count")? as usize;
        let mut time = Vec::with_capacity(time_count.min(1 << 20));
        for _ in 0..time_count {
            let start = wire::get_f64(buf, "time.start")?;
            let end = wire::get_f64(buf, "time.end")?;
            time.push(TimeInterval::new(start, end).map_err(|e| {
                WireError::Protocol(e.to_string())
            })?);
        }
        Ok(Self {
            stref,
            coordinates,
            time,
            global_attributes: AttributeMaps {
                textual: read_string_map(buf)?,
                numeric: read_f64_map(buf)?,
            },
            feature_attributes: FeatureAttributes {
                textual: read_string_array_map(buf)?,
                numeric: read_f64_array_map(buf)?,
            },
        })
    }
}

fn new_offsets() -> Vec<usize> {
    vec![0]
}

fn push_offset(
    offsets: &mut Vec<usize>,
    below_len: usize,
    what: &str,
    elements: &str,
) -> Result<(), DatatypeError> {
    let last = *offsets.last().unwrap_or(&0);
    if last >= below_len {
        return Err(DatatypeError::Feature(format!(
            "tried to finish {what} with 0 {elements}"
        )));
    }
    offsets.push(below_len);
    Ok(())
}

fn check_terminator(offsets: &[usize], below_len: usize, what: &str) -> Result<(), DatatypeError> {
    match offsets.last() {
        Some(&last) if last == below_len => Ok(()),
        _ => Err(DatatypeError::Feature(format!(
            "{what} offsets are not terminated at {below_len}"
        ))),
    }
}

fn write_offsets(buf: &mut BytesMut, offsets: &[usize]) {
    buf.put_u64_le(offsets.len() as u64);
    for &o in offsets {
        buf.put_u64_le(o as u64);
    }
}

fn read_offsets(buf: &mut Bytes, field: &'static str) -> Result<Vec<usize>, WireError> {
    let count = wire::get_u64(buf, field)? as usize;
    let mut offsets = Vec::with_capacity(count.min(1 << 20));
    for _ in 0..count {
        offsets.push(wire::get_u64(buf, field)? as usize);
    }
    Ok(offsets)
}

/// A collection of (multi-)point features.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCollection {
    pub base: FeatureBase,
    /// Feature `i` owns coordinates `start_feature[i]..start_feature[i+1]`.
    pub start_feature: Vec<usize>,
}

impl PointCollection {
    pub fn new(stref: SpatioTemporalRef) -> Self {
        Self {
            base: FeatureBase::new(stref),
            start_feature: new_offsets(),
        }
    }

    /// Append one coordinate to the feature under construction.
    pub fn add_coordinate(&mut self, x: f64, y: f64) {
        self.base.add_coordinate(x, y);
    }

    /// Close the feature under construction.
    pub fn finish_feature(&mut self) -> Result<(), DatatypeError> {
        push_offset(
            &mut self.start_feature,
            self.base.coordinates.len(),
            "feature",
            "coordinates",
        )
    }

    /// Append a single-point feature.
    pub fn add_point(&mut self, x: f64, y: f64) {
        self.base.add_coordinate(x, y);
        self.start_feature.push(self.base.coordinates.len());
    }

    pub fn feature_count(&self) -> usize {
        self.start_feature.len() - 1
    }

    pub fn coordinate_count(&self) -> usize {
        self.base.coordinates.len()
    }

    /// Whether a per-feature time vector covering every feature is attached.
    pub fn has_time(&self) -> bool {
        self.base.has_time(self.feature_count())
    }

    /// Give every feature the same validity interval.
    ///
    /// A no-op when valid per-feature time is already attached; a stale
    /// vector of the wrong length is cleared and refilled.
    pub fn add_default_timestamps(&mut self, start: f64, end: f64) -> Result<(), DatatypeError> {
        if self.has_time() {
            return Ok(());
        }
        let interval = TimeInterval::new(start, end)?;
        self.base.set_default_time(self.feature_count(), interval);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), DatatypeError> {
        check_terminator(&self.start_feature, self.base.coordinates.len(), "feature")?;
        self.base.validate(self.feature_count())
    }

    pub fn size_bytes(&self) -> u64 {
        (std::mem::size_of::<Self>() + self.start_feature.len() * 8) as u64
            + self.base.size_bytes()
    }
}

impl Wire for PointCollection {
    fn write_to(&self, buf: &mut BytesMut) {
        self.base.write_to(buf);
        write_offsets(buf, &self.start_feature);
    }

    fn read_from(buf: &mut Bytes) -> Result<Self, WireError> {
        let base = FeatureBase::read_from(buf)?;
        let start_feature = read_offsets(buf, "start_feature")?;
        let collection = Self {
            base,
            start_feature,
        };
        collection
            .validate()
            .map_err(|e| WireError::Protocol(e.to_string()))?;
        Ok(collection)
    }
}

/// A collection of (multi-)line features.
#[derive(Debug, Clone, PartialEq)]
pub struct LineCollection {
    pub base: FeatureBase,
    /// Line `i` spans coordinates `start_line[i]..start_line[i+1]`.
    pub start_line: Vec<usize>,
    /// Feature `i` spans lines `start_feature[i]..start_feature[i+1]`.
    pub start_feature: Vec<usize>,
}

impl LineCollection {
    pub fn new(stref: SpatioTemporalRef) -> Self {
        Self {
            base: FeatureBase::new(stref),
            start_line: new_offsets(),
            start_feature: new_offsets(),
        }
    }

    pub fn add_coordinate(&mut self, x: f64, y: f64) {
        self.base.add_coordinate(x, y);
    }

    /// Close the line under construction; a line needs at least two points.
    pub fn finish_line(&mut self) -> Result<(), DatatypeError> {
        let begin = *self.start_line.last().unwrap_or(&0);
        if self.base.coordinates.len() < begin + 2 {
            return Err(DatatypeError::Feature(
                "tried to finish a line with fewer than 2 coordinates".into(),
            ));
        }
        self.start_line.push(self.base.coordinates.len());
        Ok(())
    }

    pub fn finish_feature(&mut self) -> Result<(), DatatypeError> {
        push_offset(
            &mut self.start_feature,
            self.start_line.len() - 1,
            "feature",
            "lines",
        )
    }

    pub fn feature_count(&self) -> usize {
        self.start_feature.len() - 1
    }

    pub fn line_count(&self) -> usize {
        self.start_line.len() - 1
    }

    /// Whether a per-feature time vector covering every feature is attached.
    pub fn has_time(&self) -> bool {
        self.base.has_time(self.feature_count())
    }

    /// Give every feature the same validity interval; a no-op when valid
    /// per-feature time is already attached.
    pub fn add_default_timestamps(&mut self, start: f64, end: f64) -> Result<(), DatatypeError> {
        if self.has_time() {
            return Ok(());
        }
        let interval = TimeInterval::new(start, end)?;
        self.base.set_default_time(self.feature_count(), interval);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), DatatypeError> {
        check_terminator(&self.start_line, self.base.coordinates.len(), "line")?;
        check_terminator(&self.start_feature, self.line_count(), "feature")?;
        self.base.validate(self.feature_count())
    }

    pub fn size_bytes(&self) -> u64 {
        (std::mem::size_of::<Self>() + (self.start_line.len() + self.start_feature.len()) * 8)
            as u64
            + self.base.size_bytes()
    }
}

impl Wire for LineCollection {
    fn write_to(&self, buf: &mut BytesMut) {
        self.base.write_to(buf);
        write_offsets(buf, &self.start_line);
        write_offsets(buf, &self.start_feature);
    }

    fn read_from(buf: &mut Bytes) -> Result<Self, WireError> {
        let base = FeatureBase::read_from(buf)?;
        let start_line = read_offsets(buf, "start_line")?;
        let start_feature = read_offsets(buf, "start_feature")?;
        let collection = Self {
            base,
            start_line,
            start_feature,
        };
        collection
            .validate()
            .map_err(|e| WireError::Protocol(e.to_string()))?;
        Ok(collection)
    }
}

/// A collection of (multi-)polygon features with rings.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonCollection {
    pub base: FeatureBase,
    /// Ring `i` spans coordinates `start_ring[i]..start_ring[i+1]`.
    pub start_ring: Vec<usize>,
    /// Polygon `i` spans rings `start_polygon[i]..start_polygon[i+1]`.
    pub start_polygon: Vec<usize>,
    /// Feature `i` spans polygons `start_feature[i]..start_feature[i+1]`.
    pub start_feature: Vec<usize>,
}

impl PolygonCollection {
    pub fn new(stref: SpatioTemporalRef) -> Self {
        Self {
            base: FeatureBase::new(stref),
            start_ring: new_offsets(),
            start_polygon: new_offsets(),
            start_feature: new_offsets(),
        }
    }

    pub fn add_coordinate(&mut self, x: f64, y: f64) {
        self.base.add_coordinate(x, y);
    }

    /// Close the ring under construction. A ring needs at least four
    /// coordinates and must be closed (first equals last).
    pub fn finish_ring(&mut self) -> Result<(), DatatypeError> {
        let begin = *self.start_ring.last().unwrap_or(&0);
        let coords = &self.base.coordinates;
        if coords.len() < begin + 4 {
            return Err(DatatypeError::Feature(
                "tried to finish a ring with fewer than 4 coordinates".into(),
            ));
        }
        if coords[begin] != coords[coords.len() - 1] {
            return Err(DatatypeError::Feature(
                "tried to finish an unclosed ring".into(),
            ));
        }
        self.start_ring.push(coords.len());
        Ok(())
    }

    pub fn finish_polygon(&mut self) -> Result<(), DatatypeError> {
        push_offset(
            &mut self.start_polygon,
            self.start_ring.len() - 1,
            "polygon",
            "rings",
        )
    }

    pub fn finish_feature(&mut self) -> Result<(), DatatypeError> {
        push_offset(
            &mut self.start_feature,
            self.start_polygon.len() - 1,
            "feature",
            "polygons",
        )
    }

    pub fn feature_count(&self) -> usize {
        self.start_feature.len() - 1
    }

    pub fn polygon_count(&self) -> usize {
        self.start_polygon.len() - 1
    }

    pub fn ring_count(&self) -> usize {
        self.start_ring.len() - 1
    }

    /// Whether a per-feature time vector covering every feature is attached.
    pub fn has_time(&self) -> bool {
        self.base.has_time(self.feature_count())
    }

    /// Give every feature the same validity interval; a no-op when valid
    /// per-feature time is already attached.
    pub fn add_default_timestamps(&mut self, start: f64, end: f64) -> Result<(), DatatypeError> {
        if self.has_time() {
            return Ok(());
        }
        let interval = TimeInterval::new(start, end)?;
        self.base.set_default_time(self.feature_count(), interval);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), DatatypeError> {
        check_terminator(&self.start_ring, self.base.coordinates.len(), "ring")?;
        check_terminator(&self.start_polygon, self.ring_count(), "polygon")?;
        check_terminator(&self.start_feature, self.polygon_count(), "feature")?;
        self.base.validate(self.feature_count())
    }

    pub fn size_bytes(&self) -> u64 {
        let offsets =
            self.start_ring.len() + self.start_polygon.len() + self.start_feature.len();
        (std::mem::size_of::<Self>() + offsets * 8) as u64 + self.base.size_bytes()
    }
}

impl Wire for PolygonCollection {
    fn write_to(&self, buf: &mut BytesMut) {
        self.base.write_to(buf);
        write_offsets(buf, &self.start_ring);
        write_offsets(buf, &self.start_polygon);
        write_offsets(buf, &self.start_feature);
    }

    fn read_from(buf: &mut Bytes) -> Result<Self, WireError> {
        let base = FeatureBase::read_from(buf)?;
        let start_ring = read_offsets(buf, "start_ring")?;
        let start_polygon = read_offsets(buf, "start_polygon")?;
        let start_feature = read_offsets(buf, "start_feature")?;
        let collection = Self {
            base,
            start_ring,
            start_polygon,
            start_feature,
        };
        collection
            .validate()
            .map_err(|e| WireError::Protocol(e.to_string()))?;
        Ok(collection)
    }
}

fn write_string_map(buf: &mut BytesMut, map: &HashMap<String, String>) {
    buf.put_u32_le(map.len() as u32);
    let mut keys: Vec<_> = map.keys().collect();
    keys.sort();
    for key in keys {
        wire::put_string(buf, key);
        wire::put_string(buf, &map[key]);
    }
}

fn read_string_map(buf: &mut Bytes) -> Result<HashMap<String, String>, WireError> {
    let count = wire::get_u32(buf, "textual_map")?;
    let mut map = HashMap::new();
    for _ in 0..count {
        let key = wire::get_string(buf, "textual_map.key")?;
        let value = wire::get_string(buf, "textual_map.value")?;
        map.insert(key, value);
    }
    Ok(map)
}

fn write_f64_map(buf: &mut BytesMut, map: &HashMap<String, f64>) {
    buf.put_u32_le(map.len() as u32);
    let mut keys: Vec<_> = map.keys().collect();
    keys.sort();
    for key in keys {
        wire::put_string(buf, key);
        buf.put_f64_le(map[key]);
    }
}

fn read_f64_map(buf: &mut Bytes) -> Result<HashMap<String, f64>, WireError> {
    let count = wire::get_u32(buf, "numeric_map")?;
    let mut map = HashMap::new();
    for _ in 0..count {
        let key = wire::get_string(buf, "numeric_map.key")?;
        let value = wire::get_f64(buf, "numeric_map.value")?;
        map.insert(key, value);
    }
    Ok(map)
}

fn write_string_array_map(buf: &mut BytesMut, map: &HashMap<String, Vec<String>>) {
    buf.put_u32_le(map.len() as u32);
    let mut keys: Vec<_> = map.keys().collect();
    keys.sort();
    for key in keys {
        wire::put_string(buf, key);
        let values = &map[key];
        buf.put_u64_le(values.len() as u64);
        for v in values {
            wire::put_string(buf, v);
        }
    }
}

fn read_string_array_map(buf: &mut Bytes) -> Result<HashMap<String, Vec<String>>, WireError> {
    let count = wire::get_u32(buf, "textual_arrays")?;
    let mut map = HashMap::new();
    for _ in 0..count {
        let key = wire::get_string(buf, "textual_arrays.key")?;
        let len = wire::get_u64(buf, "textual_arrays.len")? as usize;
        let mut values = Vec::with_capacity(len.min(1 << 20));
        for _ in 0..len {
            values.push(wire::get_string(buf, "textual_arrays.value")?);
        }
        map.insert(key, values);
    }
    Ok(map)
}

fn write_f64_array_map(buf: &mut BytesMut, map: &HashMap<String, Vec<f64>>) {
    buf.put_u32_le(map.len() as u32);
    let mut keys: Vec<_> = map.keys().collect();
    keys.sort();
    for key in keys {
        wire::put_string(buf, key);
        let values = &map[key];
        buf.put_u64_le(values.len() as u64);
        for &v in values {
            buf.put_f64_le(v);
        }
    }
}

fn read_f64_array_map(buf: &mut Bytes) -> Result<HashMap<String, Vec<f64>>, WireError> {
    let count = wire::get_u32(buf, "numeric_arrays")?;
    let mut map = HashMap::new();
    for _ in 0..count {
        let key = wire::get_string(buf, "numeric_arrays.key")?;
        let len = wire::get_u64(buf, "numeric_arrays.len")? as usize;
        let mut values = Vec::with_capacity(len.min(1 << 20));
        for _ in 0..len {
            values.push(wire::get_f64(buf, "numeric_arrays.value")?);
        }
        map.insert(key, values);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::stref::{Crs, TimeKind};

    fn stref() -> SpatioTemporalRef {
        SpatioTemporalRef::new(
            Crs::LAT_LON,
            -180.0,
            -90.0,
            180.0,
            90.0,
            TimeKind::Unix,
            0.0,
            100.0,
        )
        .unwrap()
    }

    #[test]
    fn point_collection_single_points() {
        let mut points = PointCollection::new(stref());
        points.add_point(1.0, 2.0);
        points.add_point(3.0, 4.0);

        assert_eq!(points.feature_count(), 2);
        assert_eq!(points.coordinate_count(), 2);
        assert_eq!(points.start_feature, vec![0, 1, 2]);
        points.validate().unwrap();
    }

    #[test]
    fn point_collection_multi_point_feature() {
        let mut points = PointCollection::new(stref());
        points.add_coordinate(1.0, 1.0);
        points.add_coordinate(2.0, 2.0);
        points.finish_feature().unwrap();

        assert_eq!(points.feature_count(), 1);
        assert_eq!(points.coordinate_count(), 2);
    }

    #[test]
    fn finish_empty_feature_is_an_error() {
        let mut points = PointCollection::new(stref());
        assert!(matches!(
            points.finish_feature(),
            Err(DatatypeError::Feature(_))
        ));

        points.add_point(1.0, 1.0);
        // Still an error: no coordinates since the last feature ended.
        assert!(points.finish_feature().is_err());
    }

    #[test]
    fn default_timestamps_clear_then_fill() {
        let mut points = PointCollection::new(stref());
        points.add_point(1.0, 1.0);
        points.add_point(2.0, 2.0);

        // A stale vector of the wrong length is not valid per-feature time;
        // it gets cleared and refilled.
        points.base.time = vec![TimeInterval::new(7.0, 8.0).unwrap()];
        assert!(!points.has_time());
        points.add_default_timestamps(0.0, 50.0).unwrap();

        assert_eq!(points.base.time.len(), 2);
        assert!(points.base.time.iter().all(|t| t.start == 0.0 && t.end == 50.0));
        points.validate().unwrap();
    }

    #[test]
    fn default_timestamps_preserve_existing_valid_time() {
        let mut points = PointCollection::new(stref());
        points.add_point(1.0, 1.0);
        points.add_point(2.0, 2.0);

        points.base.time = vec![
            TimeInterval::new(1.0, 2.0).unwrap(),
            TimeInterval::new(3.0, 4.0).unwrap(),
        ];
        assert!(points.has_time());

        points.add_default_timestamps(0.0, 50.0).unwrap();
        assert_eq!(points.base.time[0], TimeInterval::new(1.0, 2.0).unwrap());
        assert_eq!(points.base.time[1], TimeInterval::new(3.0, 4.0).unwrap());
    }

    #[test]
    fn default_timestamps_second_call_is_a_noop() {
        let mut lines = LineCollection::new(stref());
        lines.add_coordinate(0.0, 0.0);
        lines.add_coordinate(1.0, 1.0);
        lines.finish_line().unwrap();
        lines.finish_feature().unwrap();

        lines.add_default_timestamps(0.0, 10.0).unwrap();
        lines.add_default_timestamps(5.0, 6.0).unwrap();

        assert_eq!(lines.base.time.len(), 1);
        assert!(lines.base.time.iter().all(|t| t.start == 0.0 && t.end == 10.0));
    }

    #[test]
    fn validate_catches_attribute_length_mismatch() {
        let mut points = PointCollection::new(stref());
        points.add_point(1.0, 1.0);
        points.add_point(2.0, 2.0);
        points
            .base
            .feature_attributes
            .numeric
            .insert("elevation".into(), vec![12.5]);

        assert!(matches!(
            points.validate(),
            Err(DatatypeError::Feature(_))
        ));
    }

    #[test]
    fn line_collection_structure() {
        let mut lines = LineCollection::new(stref());
        lines.add_coordinate(0.0, 0.0);
        lines.add_coordinate(1.0, 1.0);
        lines.finish_line().unwrap();
        lines.add_coordinate(2.0, 2.0);
        lines.add_coordinate(3.0, 3.0);
        lines.finish_line().unwrap();
        lines.finish_feature().unwrap();

        assert_eq!(lines.line_count(), 2);
        assert_eq!(lines.feature_count(), 1);
        lines.validate().unwrap();
    }

    #[test]
    fn line_needs_two_coordinates() {
        let mut lines = LineCollection::new(stref());
        lines.add_coordinate(0.0, 0.0);
        assert!(lines.finish_line().is_err());
    }

    #[test]
    fn polygon_collection_structure() {
        let mut polygons = PolygonCollection::new(stref());
        polygons.add_coordinate(0.0, 0.0);
        polygons.add_coordinate(10.0, 0.0);
        polygons.add_coordinate(10.0, 10.0);
        polygons.add_coordinate(0.0, 0.0);
        polygons.finish_ring().unwrap();
        polygons.finish_polygon().unwrap();
        polygons.finish_feature().unwrap();

        assert_eq!(polygons.ring_count(), 1);
        assert_eq!(polygons.polygon_count(), 1);
        assert_eq!(polygons.feature_count(), 1);
        polygons.validate().unwrap();
    }

    #[test]
    fn ring_must_be_closed() {
        let mut polygons = PolygonCollection::new(stref());
        polygons.add_coordinate(0.0, 0.0);
        polygons.add_coordinate(10.0, 0.0);
        polygons.add_coordinate(10.0, 10.0);
        polygons.add_coordinate(0.0, 10.0);
        assert!(matches!(
            polygons.finish_ring(),
            Err(DatatypeError::Feature(_))
        ));
    }

    #[test]
    fn ring_needs_four_coordinates() {
        let mut polygons = PolygonCollection::new(stref());
        polygons.add_coordinate(0.0, 0.0);
        polygons.add_coordinate(10.0, 0.0);
        polygons.add_coordinate(0.0, 0.0);
        assert!(polygons.finish_ring().is_err());
    }

    #[test]
    fn point_collection_wire_roundtrip() {
        let mut points = PointCollection::new(stref());
        points.add_point(1.5, 2.5);
        points.add_point(-3.0, 4.0);
        points.add_default_timestamps(0.0, 10.0).unwrap();
        points
            .base
            .global_attributes
            .textual
            .insert("source".into(), "sensor-a".into());
        points
            .base
            .feature_attributes
            .numeric
            .insert("elevation".into(), vec![12.5, 13.5]);

        let mut bytes = points.to_wire();
        let decoded = PointCollection::read_from(&mut bytes).unwrap();
        assert_eq!(decoded, points);
        assert!(bytes.is_empty());
    }

    #[test]
    fn line_collection_wire_roundtrip() {
        let mut lines = LineCollection::new(stref());
        lines.add_coordinate(0.0, 0.0);
        lines.add_coordinate(1.0, 1.0);
        lines.finish_line().unwrap();
        lines.finish_feature().unwrap();

        let mut bytes = lines.to_wire();
        assert_eq!(LineCollection::read_from(&mut bytes).unwrap(), lines);
    }

    #[test]
    fn polygon_collection_wire_roundtrip() {
        let mut polygons = PolygonCollection::new(stref());
        polygons.add_coordinate(0.0, 0.0);
        polygons.add_coordinate(10.0, 0.0);
        polygons.add_coordinate(10.0, 10.0);
        polygons.add_coordinate(0.0, 0.0);
        polygons.finish_ring().unwrap();
        polygons.finish_polygon().unwrap();
        polygons.finish_feature().unwrap();

        let mut bytes = polygons.to_wire();
        assert_eq!(PolygonCollection::read_from(&mut bytes).unwrap(), polygons);
    }

    #[test]
    fn wire_rejects_unterminated_offsets() {
        let mut points = PointCollection::new(stref());
        points.add_point(1.0, 1.0);
        points.start_feature.pop(); // break the terminator

        let mut bytes = points.to_wire();
        assert!(PointCollection::read_from(&mut bytes).is_err());
    }

    #[test]
    fn size_bytes_grows_with_content() {
        let mut points = PointCollection::new(stref());
        let empty = points.size_bytes();
        for i in 0..100 {
            points.add_point(i as f64, i as f64);
        }
        assert!(points.size_bytes() > empty + 100 * 16);
    }
}
