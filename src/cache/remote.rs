//! Remote cache client.
//!
//! In the distributed deployment the local process does not own a cache;
//! lookups go to the index server, which either points at a delivery node
//! holding the result or reports a failure. Inserts are not accepted from
//! clients (worker nodes populate their own caches), so `put` always reports
//! "not stored".

use std::marker::PhantomData;
use std::net::TcpStream;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, error};

use crate::datatypes::{
    LineCollection, Plot, PointCollection, PolygonCollection, QueryRect, Raster,
};
use crate::scheduler::BaseRequest;
use crate::wire::{self, read_frame, write_frame, Wire, WireError};

use super::manager::{CacheManager, CacheWrapper};
use super::types::{CachePayload, CacheType};

/// Client → index server: resolve a query to a delivery location.
pub const CLIENT_CMD_GET: u8 = 1;
/// Index → client: request resolved, a `DeliveryResponse` follows.
pub const CLIENT_RESP_OK: u8 = 10;
/// Index → client: request failed, an error message follows.
pub const CLIENT_RESP_ERROR: u8 = 19;

/// Client → delivery node: fetch a result by delivery id.
pub const DELIVERY_CMD_GET: u8 = 1;
/// Delivery → client: the payload follows.
pub const DELIVERY_RESP_OK: u8 = 10;
/// Delivery → client: fetch failed, an error message follows.
pub const DELIVERY_RESP_ERROR: u8 = 19;

const SOCKET_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a computed result can be picked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResponse {
    pub host: String,
    pub port: u16,
    pub delivery_id: u64,
}

impl Wire for DeliveryResponse {
    fn write_to(&self, buf: &mut BytesMut) {
        wire::put_string(buf, &self.host);
        buf.put_u16_le(self.port);
        buf.put_u64_le(self.delivery_id);
    }

    fn read_from(buf: &mut Bytes) -> Result<Self, WireError> {
        Ok(Self {
            host: wire::get_string(buf, "host")?,
            port: wire::get_u16(buf, "port")?,
            delivery_id: wire::get_u64(buf, "delivery_id")?,
        })
    }
}

struct ClientCacheWrapper<P> {
    cache_type: CacheType,
    index_host: String,
    index_port: u16,
    _marker: PhantomData<fn() -> P>,
}

impl<P: CachePayload + Wire> ClientCacheWrapper<P> {
    fn new(cache_type: CacheType, index_host: &str, index_port: u16) -> Self {
        Self {
            cache_type,
            index_host: index_host.to_string(),
            index_port,
            _marker: PhantomData,
        }
    }

    fn connect(host: &str, port: u16) -> Result<TcpStream, WireError> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_read_timeout(Some(SOCKET_TIMEOUT))?;
        stream.set_write_timeout(Some(SOCKET_TIMEOUT))?;
        Ok(stream)
    }

    fn fetch(&self, semantic_id: &str, query: &QueryRect) -> Result<P, WireError> {
        let request = BaseRequest::new(self.cache_type, semantic_id, query.clone());

        let mut index = Self::connect(&self.index_host, self.index_port)?;
        let mut payload = BytesMut::new();
        payload.put_u8(CLIENT_CMD_GET);
        request.write_to(&mut payload);
        write_frame(&mut index, &payload)?;

        let mut reply = read_frame(&mut index)?;
        match wire::get_u8(&mut reply, "response code")? {
            CLIENT_RESP_OK => {
                let target = DeliveryResponse::read_from(&mut reply)?;
                debug!(
                    host = %target.host,
                    port = target.port,
                    delivery_id = target.delivery_id,
                    "contacting delivery node"
                );
                self.fetch_delivery(&target)
            }
            CLIENT_RESP_ERROR => {
                let message = wire::get_string(&mut reply, "error message")?;
                Err(WireError::NoSuchElement(message))
            }
            code => Err(WireError::Protocol(format!(
                "index server answered with unknown code {code}"
            ))),
        }
    }

    fn fetch_delivery(&self, target: &DeliveryResponse) -> Result<P, WireError> {
        let mut delivery = Self::connect(&target.host, target.port)?;
        let mut payload = BytesMut::new();
        payload.put_u8(DELIVERY_CMD_GET);
        payload.put_u64_le(target.delivery_id);
        write_frame(&mut delivery, &payload)?;

        let mut reply = read_frame(&mut delivery)?;
        match wire::get_u8(&mut reply, "response code")? {
            DELIVERY_RESP_OK => P::read_from(&mut reply),
            DELIVERY_RESP_ERROR => {
                let message = wire::get_string(&mut reply, "error message")?;
                Err(WireError::NoSuchElement(message))
            }
            code => Err(WireError::Protocol(format!(
                "delivery node answered with unknown code {code}"
            ))),
        }
    }
}

impl<P: CachePayload + Wire + Sync> CacheWrapper<P> for ClientCacheWrapper<P> {
    fn get(&self, semantic_id: &str, query: &QueryRect) -> Option<P> {
        match self.fetch(semantic_id, query) {
            Ok(payload) => Some(payload),
            Err(WireError::NoSuchElement(message)) => {
                debug!(cache = self.cache_type.as_str(), "remote miss: {message}");
                None
            }
            Err(e) => {
                // A failed remote lookup degrades to a miss; recomputation
                // is always safe.
                error!(
                    cache = self.cache_type.as_str(),
                    index = %self.index_host,
                    "remote cache lookup failed: {e}"
                );
                None
            }
        }
    }

    fn put(&self, semantic_id: &str, _item: &P) -> bool {
        debug!(
            cache = self.cache_type.as_str(),
            "remote cache does not accept client inserts, discarding \"{semantic_id}\""
        );
        false
    }
}

/// Cache manager backed by a remote index server.
pub struct ClientCacheManager {
    raster: ClientCacheWrapper<Raster>,
    points: ClientCacheWrapper<PointCollection>,
    lines: ClientCacheWrapper<LineCollection>,
    polygons: ClientCacheWrapper<PolygonCollection>,
    plots: ClientCacheWrapper<Plot>,
}

impl ClientCacheManager {
    pub fn new(index_host: &str, index_port: u16) -> Self {
        Self {
            raster: ClientCacheWrapper::new(CacheType::Raster, index_host, index_port),
            points: ClientCacheWrapper::new(CacheType::Points, index_host, index_port),
            lines: ClientCacheWrapper::new(CacheType::Lines, index_host, index_port),
            polygons: ClientCacheWrapper::new(CacheType::Polygons, index_host, index_port),
            plots: ClientCacheWrapper::new(CacheType::Plots, index_host, index_port),
        }
    }
}

impl CacheManager for ClientCacheManager {
    fn raster_cache(&self) -> &dyn CacheWrapper<Raster> {
        &self.raster
    }

    fn point_cache(&self) -> &dyn CacheWrapper<PointCollection> {
        &self.points
    }

    fn line_cache(&self) -> &dyn CacheWrapper<LineCollection> {
        &self.lines
    }

    fn polygon_cache(&self) -> &dyn CacheWrapper<PolygonCollection> {
        &self.polygons
    }

    fn plot_cache(&self) -> &dyn CacheWrapper<Plot> {
        &self.plots
    }
}
