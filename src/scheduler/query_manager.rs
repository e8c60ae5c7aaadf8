//! The query manager: pending and running jobs, worker binding, fault
//! replay.
//!
//! Owned entirely by the control thread; worker events arrive as method
//! calls, never through shared state.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::jobs::{BaseRequest, Job};
use super::placement::PlacementPolicy;
use super::worker::WorkerConnection;
use super::Node;

/// Retries before a job is given up and its clients are told.
const MAX_JOB_FAILURES: u32 = 2;

/// A job the scheduler gave up on; the caller sends failure replies to the
/// attached clients.
#[derive(Debug)]
pub struct FailedJob {
    pub request: BaseRequest,
    pub clients: std::collections::HashSet<u64>,
}

/// Tracks jobs awaiting a worker and jobs in flight, and maps worker events
/// back to jobs.
pub struct QueryManager {
    nodes: HashMap<u32, Node>,
    policy: Box<dyn PlacementPolicy>,
    pending: VecDeque<Job>,
    /// In-flight jobs keyed by the worker connection executing them.
    running: HashMap<u64, Job>,
}

impl QueryManager {
    pub fn new(nodes: Vec<Node>, policy: Box<dyn PlacementPolicy>) -> Self {
        Self {
            nodes: nodes.into_iter().map(|n| (n.id, n)).collect(),
            policy,
            pending: VecDeque::new(),
            running: HashMap::new(),
        }
    }

    pub fn node(&self, node_id: u32) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// Register a client query.
    ///
    /// An identical request already pending or running only attaches the
    /// client to the existing job; otherwise the placement policy picks a
    /// node and a fresh job is queued.
    pub fn add_request(&mut self, client_id: u64, request: BaseRequest) {
        if let Some(job) = self
            .pending
            .iter_mut()
            .chain(self.running.values_mut())
            .find(|job| *job.request() == request)
        {
            debug!(client_id, %request, "attaching client to existing job");
            job.add_client(client_id);
            return;
        }

        let node_id = self.policy.place(&request);
        let mut job = Job::new(request, node_id);
        job.add_client(client_id);
        debug!(client_id, node_id, request = %job.request(), "queued job");
        self.pending.push_back(job);
    }

    /// Bind pending jobs to idle workers of their nodes.
    ///
    /// Returns how many jobs were dispatched. Jobs whose node has no
    /// available worker stay pending.
    pub fn schedule(&mut self, workers: &mut HashMap<u64, WorkerConnection>) -> usize {
        let mut dispatched = 0;
        let mut still_pending = VecDeque::new();

        while let Some(job) = self.pending.pop_front() {
            let target = workers
                .values_mut()
                .find(|w| w.is_available() && w.node_id == job.node_id());
            match target {
                Some(worker) => match worker.process_request(job.request()) {
                    Ok(()) => {
                        debug!(worker = worker.id, node = worker.node_id, "job dispatched");
                        self.running.insert(worker.id, job);
                        dispatched += 1;
                    }
                    Err(e) => {
                        // The worker faulted on dispatch; keep the job and
                        // let the fault handling requeue around it.
                        warn!(worker = worker.id, "dispatch failed: {e}");
                        still_pending.push_back(job);
                    }
                },
                None => still_pending.push_back(job),
            }
        }

        self.pending = still_pending;
        dispatched
    }

    /// The job a worker connection is currently executing.
    pub fn running_job(&self, worker_id: u64) -> Option<&Job> {
        self.running.get(&worker_id)
    }

    /// A worker finished delivery; hand back the client set for fan-out.
    pub fn result_delivered(&mut self, worker_id: u64) -> Option<Job> {
        let job = self.running.remove(&worker_id);
        if let Some(job) = &job {
            info!(
                worker_id,
                clients = job.clients().len(),
                request = %job.request(),
                "job completed"
            );
        }
        job
    }

    /// A worker connection became faulty: rebuild the running jobs its node
    /// loss affects.
    ///
    /// Affected jobs below the failure limit are re-placed and pushed back
    /// to pending with their client sets intact. Jobs at the limit are
    /// returned so the caller can answer their clients with a failure.
    pub fn node_failed(&mut self, node_id: u32) -> Vec<FailedJob> {
        let affected: Vec<u64> = self
            .running
            .iter()
            .filter(|(_, job)| job.is_affected_by_node(node_id))
            .map(|(worker_id, _)| *worker_id)
            .collect();

        let mut failed = Vec::new();
        for worker_id in affected {
            let mut job = self
                .running
                .remove(&worker_id)
                .expect("worker id was collected from the running map");
            job.record_failure();

            if job.failures() >= MAX_JOB_FAILURES {
                warn!(
                    node_id,
                    request = %job.request(),
                    "job failed repeatedly, giving up"
                );
                failed.push(FailedJob {
                    request: job.request().clone(),
                    clients: job.clients().clone(),
                });
                continue;
            }

            let new_node = self.policy.place(job.request());
            info!(
                lost_node = node_id,
                new_node,
                request = %job.request(),
                "re-queueing job after node loss"
            );
            self.pending.push_back(job.recreate(new_node));
        }
        failed
    }

    /// Fault every worker that exceeded `timeout` and replay its jobs.
    pub fn expire_stalled(
        &mut self,
        workers: &mut HashMap<u64, WorkerConnection>,
        timeout: Duration,
    ) -> Vec<FailedJob> {
        let mut timed_out = Vec::new();
        for worker in workers.values_mut() {
            if worker.deadline_exceeded(timeout) {
                timed_out.push(worker.node_id);
            }
        }

        let mut failed = Vec::new();
        for node_id in timed_out {
            failed.extend(self.node_failed(node_id));
        }
        failed
    }

    #[cfg(test)]
    pub(super) fn pending_jobs(&self) -> impl Iterator<Item = &Job> {
        self.pending.iter()
    }
}
