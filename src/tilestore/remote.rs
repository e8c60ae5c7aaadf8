//! Blocking client for the remote tile store.

use std::net::TcpStream;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::datatypes::AttributeMaps;
use crate::wire::{self, read_frame, write_frame, Wire, WireError};

use super::descriptors::{RasterDescription, TileDescription};
use super::*;

const SOCKET_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection to a remote tile store.
///
/// Commands numbered [`FIRST_SOURCE_SPECIFIC_COMMAND`] and above require a
/// source to be opened first; issuing them earlier is an illegal-state
/// error, not a protocol exchange.
pub struct RemoteTileBackend {
    stream: TcpStream,
    source: Option<String>,
}

impl RemoteTileBackend {
    pub fn connect(host: &str, port: u16) -> Result<Self, WireError> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_read_timeout(Some(SOCKET_TIMEOUT))?;
        stream.set_write_timeout(Some(SOCKET_TIMEOUT))?;
        debug!(host, port, "connected to tile store");
        Ok(Self {
            stream,
            source: None,
        })
    }

    /// The currently opened source, if any.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Names of all sources the store serves.
    pub fn enumerate_sources(&mut self) -> Result<Vec<String>, WireError> {
        let mut reply = self.exchange(COMMAND_ENUMERATESOURCES, |_| {})?;
        let count = wire::get_u32(&mut reply, "source_count")? as usize;
        let mut sources = Vec::with_capacity(count.min(1 << 16));
        for _ in 0..count {
            sources.push(wire::get_string(&mut reply, "source_name")?);
        }
        Ok(sources)
    }

    /// Metadata document of an arbitrary source, without opening it.
    pub fn read_any_json(&mut self, sourcename: &str) -> Result<String, WireError> {
        let mut reply = self.exchange(COMMAND_READANYJSON, |buf| {
            wire::put_string(buf, sourcename);
        })?;
        wire::get_string(&mut reply, "json")
    }

    /// Select the source all further source-specific commands refer to.
    pub fn open(&mut self, sourcename: &str, writeable: bool) -> Result<(), WireError> {
        let _reply = self.exchange(COMMAND_OPEN, |buf| {
            wire::put_string(buf, sourcename);
            buf.put_u8(writeable as u8);
        })?;
        self.source = Some(sourcename.to_string());
        Ok(())
    }

    /// Metadata document of the opened source.
    pub fn read_json(&mut self) -> Result<String, WireError> {
        let mut reply = self.source_exchange(COMMAND_READJSON, |_| {})?;
        wire::get_string(&mut reply, "json")
    }

    /// The raster of a channel whose validity is closest to `[t1, t2]`.
    pub fn get_closest_raster(
        &mut self,
        channelid: i32,
        t1: f64,
        t2: f64,
    ) -> Result<RasterDescription, WireError> {
        let mut reply = self.source_exchange(COMMAND_GETCLOSESTRASTER, |buf| {
            buf.put_i32_le(channelid);
            buf.put_f64_le(t1);
            buf.put_f64_le(t2);
        })?;
        RasterDescription::read_from(&mut reply)
    }

    /// Attributes attached to a raster.
    pub fn read_attributes(&mut self, rasterid: i64) -> Result<AttributeMaps, WireError> {
        let mut reply = self.source_exchange(COMMAND_READATTRIBUTES, |buf| {
            buf.put_i64_le(rasterid);
        })?;

        let mut attributes = AttributeMaps::default();
        let textual = wire::get_u32(&mut reply, "textual_count")?;
        for _ in 0..textual {
            let key = wire::get_string(&mut reply, "attribute_key")?;
            let value = wire::get_string(&mut reply, "attribute_value")?;
            attributes.textual.insert(key, value);
        }
        let numeric = wire::get_u32(&mut reply, "numeric_count")?;
        for _ in 0..numeric {
            let key = wire::get_string(&mut reply, "attribute_key")?;
            let value = wire::get_f64(&mut reply, "attribute_value")?;
            attributes.numeric.insert(key, value);
        }
        Ok(attributes)
    }

    /// The zoom level the store recommends serving for `desired_zoom`.
    pub fn get_best_zoom(&mut self, rasterid: i64, desired_zoom: i32) -> Result<i32, WireError> {
        let mut reply = self.source_exchange(COMMAND_GETBESTZOOM, |buf| {
            buf.put_i64_le(rasterid);
            buf.put_i32_le(desired_zoom);
        })?;
        wire::get_i32(&mut reply, "zoom")
    }

    /// All tiles of a raster region at a zoom level.
    #[allow(clippy::too_many_arguments)]
    pub fn enumerate_tiles(
        &mut self,
        channelid: i32,
        rasterid: i64,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        zoom: i32,
    ) -> Result<Vec<TileDescription>, WireError> {
        let mut reply = self.source_exchange(COMMAND_ENUMERATETILES, |buf| {
            buf.put_i32_le(channelid);
            buf.put_i64_le(rasterid);
            buf.put_i32_le(x1);
            buf.put_i32_le(y1);
            buf.put_i32_le(x2);
            buf.put_i32_le(y2);
            buf.put_i32_le(zoom);
        })?;
        let count = wire::get_u32(&mut reply, "tile_count")? as usize;
        let mut tiles = Vec::with_capacity(count.min(1 << 16));
        for _ in 0..count {
            tiles.push(TileDescription::read_from(&mut reply)?);
        }
        Ok(tiles)
    }

    /// Whether the store holds a tile of the given placement.
    #[allow(clippy::too_many_arguments)]
    pub fn has_tile(
        &mut self,
        rasterid: i64,
        width: u32,
        height: u32,
        depth: u32,
        offx: i32,
        offy: i32,
        offz: i32,
        zoom: i32,
    ) -> Result<bool, WireError> {
        let mut reply = self.source_exchange(COMMAND_HASTILE, |buf| {
            buf.put_i64_le(rasterid);
            buf.put_u32_le(width);
            buf.put_u32_le(height);
            buf.put_u32_le(depth);
            buf.put_i32_le(offx);
            buf.put_i32_le(offy);
            buf.put_i32_le(offz);
            buf.put_i32_le(zoom);
        })?;
        Ok(wire::get_u8(&mut reply, "has_tile")? != 0)
    }

    /// The stored bytes of one tile.
    pub fn read_tile(&mut self, tile: &TileDescription) -> Result<Bytes, WireError> {
        let mut reply = self.source_exchange(COMMAND_READTILE, |buf| {
            tile.write_to(buf);
        })?;
        let len = wire::get_u64(&mut reply, "tile_len")? as usize;
        if reply.len() < len {
            return Err(WireError::Truncated("tile_data"));
        }
        Ok(reply.split_to(len))
    }

    /// Tell the store this connection is going away.
    pub fn exit(mut self) -> Result<(), WireError> {
        let mut payload = BytesMut::new();
        payload.put_u8(COMMAND_EXIT);
        write_frame(&mut self.stream, &payload)
    }

    /// Issue a source-specific command; fails before `open`.
    fn source_exchange(
        &mut self,
        command: u8,
        build: impl FnOnce(&mut BytesMut),
    ) -> Result<Bytes, WireError> {
        debug_assert!(command >= FIRST_SOURCE_SPECIFIC_COMMAND);
        if self.source.is_none() {
            return Err(WireError::IllegalState(format!(
                "command {command} requires an opened source"
            )));
        }
        self.exchange(command, build)
    }

    /// One command/response exchange. Error replies become typed errors.
    fn exchange(
        &mut self,
        command: u8,
        build: impl FnOnce(&mut BytesMut),
    ) -> Result<Bytes, WireError> {
        let mut payload = BytesMut::new();
        payload.put_u8(command);
        build(&mut payload);
        write_frame(&mut self.stream, &payload)?;

        let mut reply = read_frame(&mut self.stream)?;
        match wire::get_u8(&mut reply, "response_code")? {
            RESPONSE_OK => Ok(reply),
            RESPONSE_ERROR => {
                let message = wire::get_string(&mut reply, "error_message")?;
                Err(WireError::NoSuchElement(message))
            }
            code => Err(WireError::Protocol(format!(
                "tile store answered with unknown code {code}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    /// Serve a fixed list of canned reply payloads, one per request frame.
    fn canned_server(replies: Vec<Vec<u8>>) -> (u16, thread::JoinHandle<Vec<Vec<u8>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut requests = Vec::new();
            for reply in replies {
                let frame = read_frame(&mut stream).unwrap();
                requests.push(frame.to_vec());
                write_frame(&mut stream, &reply).unwrap();
            }
            requests
        });
        (port, handle)
    }

    fn ok_reply(build: impl FnOnce(&mut BytesMut)) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u8(RESPONSE_OK);
        build(&mut buf);
        buf.to_vec()
    }

    #[test]
    fn enumerate_sources_parses_reply() {
        let reply = ok_reply(|buf| {
            buf.put_u32_le(2);
            wire::put_string(buf, "srtm");
            wire::put_string(buf, "worldclim");
        });
        let (port, server) = canned_server(vec![reply]);

        let mut backend = RemoteTileBackend::connect("127.0.0.1", port).unwrap();
        let sources = backend.enumerate_sources().unwrap();
        assert_eq!(sources, vec!["srtm", "worldclim"]);

        let requests = server.join().unwrap();
        assert_eq!(requests[0], vec![COMMAND_ENUMERATESOURCES]);
    }

    #[test]
    fn source_specific_command_requires_open() {
        let (port, server) = canned_server(vec![]);
        let mut backend = RemoteTileBackend::connect("127.0.0.1", port).unwrap();

        assert!(matches!(
            backend.read_json(),
            Err(WireError::IllegalState(_))
        ));
        assert!(matches!(
            backend.get_best_zoom(1, 4),
            Err(WireError::IllegalState(_))
        ));

        drop(backend);
        server.join().unwrap();
    }

    #[test]
    fn open_then_read_tile() {
        let tile = TileDescription {
            tileid: 3,
            channelid: 0,
            fileid: 1,
            offset: 0,
            size: 4,
            x1: 0,
            y1: 0,
            z1: 0,
            width: 256,
            height: 256,
            depth: 1,
            compression: TileCompression::Uncompressed,
        };

        let open_reply = ok_reply(|_| {});
        let tile_reply = ok_reply(|buf| {
            buf.put_u64_le(4);
            buf.put_slice(&[9, 8, 7, 6]);
        });
        let (port, server) = canned_server(vec![open_reply, tile_reply]);

        let mut backend = RemoteTileBackend::connect("127.0.0.1", port).unwrap();
        backend.open("srtm", false).unwrap();
        assert_eq!(backend.source(), Some("srtm"));

        let data = backend.read_tile(&tile).unwrap();
        assert_eq!(&data[..], &[9, 8, 7, 6]);

        let requests = server.join().unwrap();
        assert_eq!(requests[0][0], COMMAND_OPEN);
        assert_eq!(requests[1][0], COMMAND_READTILE);
        // The request frame carries the full tile description.
        assert_eq!(requests[1].len(), 1 + 57);
    }

    #[test]
    fn error_reply_is_typed_not_a_disconnect() {
        let open_reply = ok_reply(|_| {});
        let mut error_reply = BytesMut::new();
        error_reply.put_u8(RESPONSE_ERROR);
        wire::put_string(&mut error_reply, "no raster for channel 7");
        let (port, server) = canned_server(vec![open_reply, error_reply.to_vec()]);

        let mut backend = RemoteTileBackend::connect("127.0.0.1", port).unwrap();
        backend.open("srtm", false).unwrap();

        match backend.get_closest_raster(7, 0.0, 1.0) {
            Err(WireError::NoSuchElement(message)) => {
                assert_eq!(message, "no raster for channel 7");
            }
            other => panic!("expected a typed error reply, got {other:?}"),
        }
        server.join().unwrap();
    }

    #[test]
    fn get_closest_raster_roundtrip() {
        let open_reply = ok_reply(|_| {});
        let raster_reply = ok_reply(|buf| {
            RasterDescription {
                rasterid: 11,
                time_start: 100.0,
                time_end: 200.0,
            }
            .write_to(buf);
        });
        let (port, server) = canned_server(vec![open_reply, raster_reply]);

        let mut backend = RemoteTileBackend::connect("127.0.0.1", port).unwrap();
        backend.open("srtm", false).unwrap();
        let desc = backend.get_closest_raster(0, 120.0, 130.0).unwrap();
        assert_eq!(desc.rasterid, 11);
        assert_eq!(desc.time_end, 200.0);
        server.join().unwrap();
    }

    #[test]
    fn has_tile_decodes_boolean() {
        let open_reply = ok_reply(|_| {});
        let yes = ok_reply(|buf| buf.put_u8(1));
        let no = ok_reply(|buf| buf.put_u8(0));
        let (port, server) = canned_server(vec![open_reply, yes, no]);

        let mut backend = RemoteTileBackend::connect("127.0.0.1", port).unwrap();
        backend.open("srtm", false).unwrap();
        assert!(backend.has_tile(1, 256, 256, 1, 0, 0, 0, 2).unwrap());
        assert!(!backend.has_tile(1, 256, 256, 1, 0, 0, 0, 3).unwrap());
        server.join().unwrap();
    }
}
