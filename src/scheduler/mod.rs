//! The distributed query manager.
//!
//! Incoming client queries become jobs; a placement policy picks the worker
//! node likeliest to hold overlapping cached data (DEMA/BEMA centroid
//! tracking), and the query manager binds pending jobs to idle worker
//! connections. All scheduler state is owned by one control thread; worker
//! connections hand their events to that thread and receive commands through
//! send-only mailboxes.

mod jobs;
mod placement;
mod query_manager;
mod worker;

pub use jobs::{BaseRequest, Job};
pub use placement::{BemaPlacement, DemaPlacement, FixedPlacement, PlacementPolicy, Point2};
pub use query_manager::{FailedJob, QueryManager};
pub use worker::{
    WorkerCommand, WorkerConnection, WorkerState, CMD_CREATE, RESP_DELIVERY_QTY,
    RESP_DELIVERY_READY, RESP_ERROR, RESP_RESULT_READY,
};

use thiserror::Error;

/// Scheduling and worker-protocol failures.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// A worker connection was driven through an invalid transition. The
    /// connection is marked faulty.
    #[error("illegal worker state: expected {expected}, was {actual}")]
    IllegalState {
        expected: WorkerState,
        actual: WorkerState,
    },

    /// A worker node became unreachable.
    #[error("node {0} failed")]
    NodeFailed(u32),

    /// A worker exceeded its processing deadline; handled like a node
    /// failure.
    #[error("worker {0} timed out")]
    Timeout(u64),
}

/// A worker node known to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: u32,
    pub host: String,
    pub port: u16,
}

impl Node {
    pub fn new(id: u32, host: impl Into<String>, port: u16) -> Self {
        Self {
            id,
            host: host.into(),
            port,
        }
    }
}
