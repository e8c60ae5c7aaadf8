//! Jobs: client requests on their way through the scheduler.

use std::collections::HashSet;
use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::cache::CacheType;
use crate::datatypes::QueryRect;
use crate::wire::{self, Wire, WireError};

/// A client query as it travels between index, workers and delivery nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseRequest {
    pub cache_type: CacheType,
    pub semantic_id: String,
    pub query: QueryRect,
}

impl BaseRequest {
    pub fn new(cache_type: CacheType, semantic_id: impl Into<String>, query: QueryRect) -> Self {
        Self {
            cache_type,
            semantic_id: semantic_id.into(),
            query,
        }
    }
}

impl fmt::Display for BaseRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BaseRequest[{}, \"{}\", {}]",
            self.cache_type.as_str(),
            self.semantic_id,
            self.query
        )
    }
}

impl Wire for BaseRequest {
    fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.cache_type.to_wire_code());
        wire::put_string(buf, &self.semantic_id);
        self.query.write_to(buf);
    }

    fn read_from(buf: &mut Bytes) -> Result<Self, WireError> {
        let cache_type = CacheType::from_wire_code(wire::get_u8(buf, "cache_type")?)?;
        let semantic_id = wire::get_string(buf, "semantic_id")?;
        let query = QueryRect::read_from(buf)?;
        Ok(Self {
            cache_type,
            semantic_id,
            query,
        })
    }
}

/// One scheduled unit of work with its subscribed clients.
///
/// Several clients asking the identical question share a job; the delivery
/// layer duplicates the result for each subscriber.
#[derive(Debug, Clone)]
pub struct Job {
    request: BaseRequest,
    node_id: u32,
    clients: HashSet<u64>,
    /// How often this job was rebuilt after a node loss.
    failures: u32,
}

impl Job {
    pub fn new(request: BaseRequest, node_id: u32) -> Self {
        Self {
            request,
            node_id,
            clients: HashSet::new(),
            failures: 0,
        }
    }

    pub fn request(&self) -> &BaseRequest {
        &self.request
    }

    /// The node this job is placed on.
    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    pub fn add_client(&mut self, client_id: u64) {
        self.clients.insert(client_id);
    }

    pub fn add_clients(&mut self, clients: &HashSet<u64>) {
        self.clients.extend(clients);
    }

    pub fn clients(&self) -> &HashSet<u64> {
        &self.clients
    }

    /// Try to widen this job to also answer `request`. This scheduler does
    /// not merge queries.
    pub fn extend(&mut self, _request: &BaseRequest) -> bool {
        false
    }

    /// Whether losing `node_id` invalidates this job.
    pub fn is_affected_by_node(&self, node_id: u32) -> bool {
        self.node_id == node_id
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub(super) fn record_failure(&mut self) {
        self.failures += 1;
    }

    /// Rebuild this job for a new placement, keeping its clients and its
    /// failure history.
    pub(super) fn recreate(&self, node_id: u32) -> Job {
        Job {
            request: self.request.clone(),
            node_id,
            clients: self.clients.clone(),
            failures: self.failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{Crs, Resolution, SpatioTemporalRef, TimeKind};

    fn request() -> BaseRequest {
        let stref = SpatioTemporalRef::new(
            Crs::WEB_MERCATOR,
            0.0,
            0.0,
            50.0,
            50.0,
            TimeKind::Unix,
            0.0,
            1.0,
        )
        .unwrap();
        BaseRequest::new(
            CacheType::Points,
            "filter(species=...)",
            QueryRect::new(stref, Some(Resolution { x: 256, y: 256 })),
        )
    }

    #[test]
    fn base_request_wire_roundtrip() {
        let req = request();
        let mut bytes = req.to_wire();
        assert_eq!(BaseRequest::read_from(&mut bytes).unwrap(), req);
        assert!(bytes.is_empty());
    }

    #[test]
    fn clients_are_deduplicated() {
        let mut job = Job::new(request(), 1);
        job.add_client(10);
        job.add_client(10);
        job.add_client(11);
        assert_eq!(job.clients().len(), 2);

        let mut more = HashSet::new();
        more.insert(11);
        more.insert(12);
        job.add_clients(&more);
        assert_eq!(job.clients().len(), 3);
    }

    #[test]
    fn extend_never_merges() {
        let mut job = Job::new(request(), 1);
        assert!(!job.extend(&request()));
    }

    #[test]
    fn node_affinity() {
        let job = Job::new(request(), 3);
        assert!(job.is_affected_by_node(3));
        assert!(!job.is_affected_by_node(4));
    }

    #[test]
    fn recreate_preserves_clients_and_failures() {
        let mut job = Job::new(request(), 3);
        job.add_client(10);
        job.record_failure();

        let rebuilt = job.recreate(5);
        assert_eq!(rebuilt.node_id(), 5);
        assert_eq!(rebuilt.clients(), job.clients());
        assert_eq!(rebuilt.failures(), 1);
        assert_eq!(rebuilt.request(), job.request());
    }
}
