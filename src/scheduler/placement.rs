//! Placement policies: which node a job should run on.
//!
//! DEMA keeps an exponential-moving-average centroid of the query centers
//! recently assigned to each node, and routes a new query to the node with
//! the nearest centroid, so spatially clustered workloads keep hitting the
//! caches that already hold their data. BEMA additionally weighs the
//! distance by the node's share of recent assignments to keep one popular
//! region from saturating a single node.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use super::jobs::BaseRequest;

/// EMA smoothing factor for centroid updates.
const EMA_ALPHA: f64 = 0.3;

/// Number of recent scheduling decisions in the BEMA balance window.
const BEMA_WINDOW: usize = 100;

/// A point in query space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point2) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Chooses the node for a new job.
pub trait PlacementPolicy: Send {
    fn place(&mut self, request: &BaseRequest) -> u32;
}

/// Places every job on one configured node. Used for single-node
/// deployments where locality scoring has nothing to choose between.
pub struct FixedPlacement {
    node_id: u32,
}

impl FixedPlacement {
    pub fn new(node_id: u32) -> Self {
        Self { node_id }
    }
}

impl PlacementPolicy for FixedPlacement {
    fn place(&mut self, _request: &BaseRequest) -> u32 {
        self.node_id
    }
}

/// Dynamic EMA placement: nearest centroid wins.
pub struct DemaPlacement {
    /// Known nodes in a stable order, for deterministic tie-breaking.
    nodes: Vec<u32>,
    centroids: HashMap<u32, Point2>,
    alpha: f64,
}

impl DemaPlacement {
    pub fn new(mut nodes: Vec<u32>) -> Self {
        nodes.sort_unstable();
        Self {
            nodes,
            centroids: HashMap::new(),
            alpha: EMA_ALPHA,
        }
    }

    /// Centroid of a node, if it has been seeded.
    pub fn centroid(&self, node_id: u32) -> Option<Point2> {
        self.centroids.get(&node_id).copied()
    }

    /// Core selection: score each node, seed unseen nodes immediately.
    ///
    /// `score` maps (query center, centroid, node) to the value minimized.
    fn select(&mut self, request: &BaseRequest, score: impl Fn(&Point2, &Point2, u32) -> f64) -> u32 {
        let (cx, cy) = request.query.center();
        let qc = Point2::new(cx, cy);

        let mut best_node = None;
        let mut best_score = f64::MAX;
        for &node in &self.nodes {
            match self.centroids.get(&node) {
                None => {
                    // Warm-up: an unseen node takes the query and its center
                    // as the initial centroid.
                    self.centroids.insert(node, qc);
                    debug!(node, "seeded centroid at ({}, {})", qc.x, qc.y);
                    return node;
                }
                Some(centroid) => {
                    let s = score(&qc, centroid, node);
                    if s < best_score {
                        best_score = s;
                        best_node = Some(node);
                    }
                }
            }
        }

        let node = best_node.expect("placement requires at least one known node");
        let centroid = self
            .centroids
            .get_mut(&node)
            .expect("scored nodes have centroids");
        centroid.x = qc.x * self.alpha + centroid.x * (1.0 - self.alpha);
        centroid.y = qc.y * self.alpha + centroid.y * (1.0 - self.alpha);
        node
    }
}

impl PlacementPolicy for DemaPlacement {
    fn place(&mut self, request: &BaseRequest) -> u32 {
        self.select(request, |qc, centroid, _| qc.distance_to(centroid))
    }
}

/// Balanced EMA placement: DEMA score times the node's assignment count
/// over the last [`BEMA_WINDOW`] decisions.
///
/// A node with no recent assignments scores zero and always wins the
/// comparison.
pub struct BemaPlacement {
    dema: DemaPlacement,
    window: VecDeque<u32>,
    counts: HashMap<u32, u32>,
}

impl BemaPlacement {
    pub fn new(nodes: Vec<u32>) -> Self {
        Self {
            dema: DemaPlacement::new(nodes),
            window: VecDeque::new(),
            counts: HashMap::new(),
        }
    }

    /// Recent assignments of a node inside the rolling window.
    pub fn assignments(&self, node_id: u32) -> u32 {
        self.counts.get(&node_id).copied().unwrap_or(0)
    }

    fn record_assignment(&mut self, node_id: u32) {
        *self.counts.entry(node_id).or_insert(0) += 1;
        self.window.push_back(node_id);
        if self.window.len() > BEMA_WINDOW {
            if let Some(expired) = self.window.pop_front() {
                if let Some(count) = self.counts.get_mut(&expired) {
                    *count -= 1;
                }
            }
        }
    }
}

impl PlacementPolicy for BemaPlacement {
    fn place(&mut self, request: &BaseRequest) -> u32 {
        let counts = self.counts.clone();
        let node = self.dema.select(request, |qc, centroid, node| {
            qc.distance_to(centroid) * counts.get(&node).copied().unwrap_or(0) as f64
        });
        self.record_assignment(node);
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheType;
    use crate::datatypes::{Crs, QueryRect, SpatioTemporalRef, TimeKind};

    fn request_at(x: f64, y: f64) -> BaseRequest {
        let stref = SpatioTemporalRef::new(
            Crs::WEB_MERCATOR,
            x - 1.0,
            y - 1.0,
            x + 1.0,
            y + 1.0,
            TimeKind::Unix,
            0.0,
            1.0,
        )
        .unwrap();
        BaseRequest::new(CacheType::Raster, "op", QueryRect::new(stref, None))
    }

    #[test]
    fn point_distance() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(3.0, 4.0);
        assert_eq!(a.distance_to(&b), 5.0);
    }

    #[test]
    fn fixed_placement_always_picks_its_node() {
        let mut policy = FixedPlacement::new(9);
        assert_eq!(policy.place(&request_at(0.0, 0.0)), 9);
        assert_eq!(policy.place(&request_at(500.0, 500.0)), 9);
    }

    #[test]
    fn dema_seeds_unseen_nodes_first() {
        let mut policy = DemaPlacement::new(vec![2, 1]);

        // Nodes are seeded in id order regardless of construction order.
        assert_eq!(policy.place(&request_at(0.0, 0.0)), 1);
        assert_eq!(policy.place(&request_at(100.0, 100.0)), 2);

        assert_eq!(policy.centroid(1), Some(Point2::new(0.0, 0.0)));
        assert_eq!(policy.centroid(2), Some(Point2::new(100.0, 100.0)));
    }

    #[test]
    fn dema_routes_to_nearest_centroid() {
        let mut policy = DemaPlacement::new(vec![1, 2]);
        policy.place(&request_at(0.0, 0.0)); // seeds node 1
        policy.place(&request_at(100.0, 100.0)); // seeds node 2

        assert_eq!(policy.place(&request_at(10.0, 10.0)), 1);
        assert_eq!(policy.place(&request_at(90.0, 90.0)), 2);
    }

    #[test]
    fn dema_updates_centroid_with_ema() {
        let mut policy = DemaPlacement::new(vec![1]);
        policy.place(&request_at(0.0, 0.0)); // seed at (0, 0)
        policy.place(&request_at(10.0, 10.0));

        // 0.3 * 10 + 0.7 * 0 = 3
        assert_eq!(policy.centroid(1), Some(Point2::new(3.0, 3.0)));
    }

    #[test]
    fn dema_seeding_does_not_shift_the_seed() {
        let mut policy = DemaPlacement::new(vec![1]);
        policy.place(&request_at(42.0, 7.0));
        assert_eq!(policy.centroid(1), Some(Point2::new(42.0, 7.0)));
    }

    #[test]
    fn bema_prefers_unloaded_nodes() {
        let mut policy = BemaPlacement::new(vec![1, 2]);
        policy.place(&request_at(0.0, 0.0)); // seeds node 1
        policy.place(&request_at(0.0, 0.0)); // seeds node 2 at the same spot

        // Both centroids sit at (0, 0) with one assignment each; the tie
        // goes to the lower node id.
        assert_eq!(policy.place(&request_at(0.0, 0.0)), 1);
        assert_eq!(policy.assignments(1), 2);

        // Equal distance, but node 2 now has the lower assignment count.
        assert_eq!(policy.place(&request_at(0.5, 0.5)), 2);
    }

    #[test]
    fn bema_window_expires_old_assignments() {
        let mut policy = BemaPlacement::new(vec![1]);
        for _ in 0..(BEMA_WINDOW + 50) {
            policy.place(&request_at(0.0, 0.0));
        }
        assert_eq!(policy.assignments(1), BEMA_WINDOW as u32);
    }

    #[test]
    fn bema_is_well_defined_for_a_single_node() {
        let mut policy = BemaPlacement::new(vec![1]);
        for i in 0..10 {
            assert_eq!(policy.place(&request_at(i as f64, 0.0)), 1);
        }
    }
}
