//! Per-worker connection state.
//!
//! A worker connection walks `Idle → Sending → Processing → Delivering →
//! Done → Idle` as a request is dispatched, computed and delivered. Any
//! protocol violation, socket error or deadline overrun marks the connection
//! faulty, which is terminal until the connection is discarded. The
//! scheduler only dispatches to connections that are idle and not faulty.

use std::fmt;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::jobs::BaseRequest;
use super::ScheduleError;

/// Index → worker: evaluate the operator graph for a request.
pub const CMD_CREATE: u8 = 20;
/// Worker → index: the result is computed and can be delivered.
pub const RESP_RESULT_READY: u8 = 30;
/// Index → worker: how many clients will fetch the result.
pub const RESP_DELIVERY_QTY: u8 = 31;
/// Worker → index: the result is registered for delivery.
pub const RESP_DELIVERY_READY: u8 = 32;
/// Worker → index: processing failed, an error message follows.
pub const RESP_ERROR: u8 = 39;

/// Protocol position of a worker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Ready for a new request.
    Idle,
    /// A request was handed to the connection's I/O thread.
    Sending,
    /// The worker acknowledged the request and is computing.
    Processing,
    /// The worker announced a result; delivery is being arranged.
    Delivering,
    /// Delivery is registered; the result can be fanned out.
    Done,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::Sending => "sending",
            WorkerState::Processing => "processing",
            WorkerState::Delivering => "delivering",
            WorkerState::Done => "done",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Command sent to a worker connection's I/O thread.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerCommand {
    /// `CMD_CREATE`: compute the request on the worker.
    Create(BaseRequest),
}

/// Control-thread view of one worker connection.
///
/// The socket itself is owned by an I/O thread; the control thread only
/// pushes commands into the mailbox and advances the state machine as the
/// I/O thread reports events.
pub struct WorkerConnection {
    pub id: u64,
    pub node_id: u32,
    state: WorkerState,
    faulty: bool,
    mailbox: Sender<WorkerCommand>,
    last_transition: Instant,
}

impl WorkerConnection {
    pub fn new(id: u64, node_id: u32, mailbox: Sender<WorkerCommand>) -> Self {
        Self {
            id,
            node_id,
            state: WorkerState::Idle,
            faulty: false,
            mailbox,
            last_transition: Instant::now(),
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn is_faulty(&self) -> bool {
        self.faulty
    }

    /// Whether the scheduler may dispatch to this connection.
    pub fn is_available(&self) -> bool {
        !self.faulty && self.state == WorkerState::Idle
    }

    /// Dispatch a request: `Idle → Sending`, command into the mailbox.
    pub fn process_request(&mut self, request: &BaseRequest) -> Result<(), ScheduleError> {
        self.advance(WorkerState::Idle, WorkerState::Sending)?;
        if self
            .mailbox
            .send(WorkerCommand::Create(request.clone()))
            .is_err()
        {
            warn!(worker = self.id, "mailbox closed, marking connection faulty");
            self.mark_faulty();
            return Err(ScheduleError::NodeFailed(self.node_id));
        }
        debug!(worker = self.id, node = self.node_id, %request, "dispatched request");
        Ok(())
    }

    /// The I/O thread confirmed the request went out: `Sending → Processing`.
    pub fn request_sent(&mut self) -> Result<(), ScheduleError> {
        self.advance(WorkerState::Sending, WorkerState::Processing)
    }

    /// `RESP_RESULT_READY` arrived: `Processing → Delivering`.
    pub fn result_ready(&mut self) -> Result<(), ScheduleError> {
        self.advance(WorkerState::Processing, WorkerState::Delivering)
    }

    /// `RESP_DELIVERY_READY` arrived: `Delivering → Done`.
    pub fn delivery_ready(&mut self) -> Result<(), ScheduleError> {
        self.advance(WorkerState::Delivering, WorkerState::Done)
    }

    /// Result handed to the fan-out layer: `Done → Idle`.
    pub fn release(&mut self) -> Result<(), ScheduleError> {
        self.advance(WorkerState::Done, WorkerState::Idle)
    }

    /// Mark the connection unusable. Terminal.
    pub fn mark_faulty(&mut self) {
        self.faulty = true;
    }

    /// Fault the connection if it has sat in a non-idle state longer than
    /// `timeout`. Returns whether it newly became faulty.
    pub fn deadline_exceeded(&mut self, timeout: Duration) -> bool {
        if self.faulty || self.state == WorkerState::Idle {
            return false;
        }
        if self.last_transition.elapsed() > timeout {
            warn!(
                worker = self.id,
                node = self.node_id,
                state = %self.state,
                "worker exceeded deadline, marking faulty"
            );
            self.mark_faulty();
            return true;
        }
        false
    }

    fn advance(&mut self, expected: WorkerState, next: WorkerState) -> Result<(), ScheduleError> {
        if self.faulty {
            return Err(ScheduleError::NodeFailed(self.node_id));
        }
        if self.state != expected {
            let actual = self.state;
            self.mark_faulty();
            warn!(
                worker = self.id,
                %expected,
                %actual,
                "protocol violation, marking connection faulty"
            );
            return Err(ScheduleError::IllegalState { expected, actual });
        }
        self.state = next;
        self.last_transition = Instant::now();
        Ok(())
    }
}

impl fmt::Debug for WorkerConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerConnection")
            .field("id", &self.id)
            .field("node_id", &self.node_id)
            .field("state", &self.state)
            .field("faulty", &self.faulty)
            .finish()
    }
}
