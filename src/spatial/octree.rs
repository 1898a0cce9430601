use log::{debug, info, warn};

use crate::detect::DetectionError;
use crate::{conjunction, Candidate, ConjunctionRecord, TrackedObject};

/// Maximum points a leaf holds before it subdivides.
pub const CAPACITY: usize = 1;
/// Coincident points stop subdividing here and share one leaf.
pub const MAX_DEPTH: usize = 24;
/// Ceiling for configured depths. Construction recurses once per level.
pub const MAX_DEPTH_LIMIT: usize = 64;

/// Index of a node in the octree arena.
pub type NodeId = usize;

#[derive(Debug, Clone)]
enum NodeKind {
    Leaf(Vec<usize>),
    Branch([NodeId; 8]),
}

/// Axis-aligned cube `center ± half` on every axis.
#[derive(Debug, Clone)]
struct Node {
    center: [f64; 3],
    half: f64,
    depth: usize,
    parent: Option<NodeId>,
    kind: NodeKind,
}

impl Node {
    /// Squared distance from `p` to the closest point of this cube.
    fn min_distance2(&self, p: [f64; 3]) -> f64 {
        (0..3)
            .map(|k| {
                let d = ((p[k] - self.center[k]).abs() - self.half).max(0.0);
                d * d
            })
            .sum()
    }

    /// True when everything outside this cube is farther than `radius` from `p`.
    fn encloses_ball(&self, p: [f64; 3], radius: f64) -> bool {
        (0..3).all(|k| {
            p[k] - (self.center[k] - self.half) > radius
                && (self.center[k] + self.half) - p[k] > radius
        })
    }
}

/// Octant of `p` relative to `center`: bit k set when p[k] is strictly above.
/// Points on a splitting plane go to the lower side.
fn octant(center: [f64; 3], p: [f64; 3]) -> usize {
    (0..3).fold(0, |acc, k| acc | (usize::from(p[k] > center[k]) << k))
}

fn child_center(center: [f64; 3], quarter: f64, octant: usize) -> [f64; 3] {
    let mut c = center;
    for (k, ck) in c.iter_mut().enumerate() {
        *ck += if octant & (1 << k) != 0 { quarter } else { -quarter };
    }
    c
}

/// Spatial partition over one snapshot of tracked objects.
///
/// Nodes live in an arena and refer to each other by index. A node is either
/// a leaf holding state indices or a branch with exactly eight children whose
/// cubes tile it.
#[derive(Debug, Clone)]
pub struct Octree {
    states: Vec<TrackedObject>,
    nodes: Vec<Node>,
    leaf_of: Vec<NodeId>,
    capacity: usize,
    max_depth: usize,
}

impl Octree {
    pub fn build(states: &[TrackedObject]) -> Result<Self, DetectionError> {
        Self::with_limits(states, CAPACITY, MAX_DEPTH)
    }

    pub fn with_limits(
        states: &[TrackedObject],
        capacity: usize,
        max_depth: usize,
    ) -> Result<Self, DetectionError> {
        if max_depth > MAX_DEPTH_LIMIT {
            warn!("octree depth {} clamped to {}", max_depth, MAX_DEPTH_LIMIT);
        }
        let max_depth = max_depth.min(MAX_DEPTH_LIMIT);
        let mut kept = Vec::new();
        kept.try_reserve_exact(states.len())?;
        for state in states {
            if state.is_finite() {
                kept.push(*state);
            } else {
                warn!("object {} has a non-finite position, not indexed", state.id);
            }
        }

        let half = kept
            .iter()
            .flat_map(|s| s.pos)
            .fold(0.0_f64, |acc, c| acc.max(c.abs()));
        let half = if half > 0.0 { half } else { 1.0 };

        let mut leaf_of = Vec::new();
        leaf_of.try_reserve_exact(kept.len())?;
        leaf_of.resize(kept.len(), 0);

        let mut tree = Octree {
            states: kept,
            nodes: Vec::new(),
            leaf_of,
            capacity: capacity.max(1),
            max_depth,
        };
        let all: Vec<usize> = (0..tree.states.len()).collect();
        tree.build_node(all, [0.0; 3], half, 0, None)?;
        debug!(
            "octree over {} objects: {} nodes, depth {}",
            tree.len(),
            tree.node_count(),
            tree.depth()
        );
        Ok(tree)
    }

    fn build_node(
        &mut self,
        indices: Vec<usize>,
        center: [f64; 3],
        half: f64,
        depth: usize,
        parent: Option<NodeId>,
    ) -> Result<NodeId, DetectionError> {
        self.nodes.try_reserve(1)?;
        let id = self.nodes.len();
        self.nodes.push(Node {
            center,
            half,
            depth,
            parent,
            kind: NodeKind::Leaf(Vec::new()),
        });

        if indices.len() <= self.capacity || depth >= self.max_depth {
            for &i in &indices {
                self.leaf_of[i] = id;
            }
            self.nodes[id].kind = NodeKind::Leaf(indices);
            return Ok(id);
        }

        let mut buckets: [Vec<usize>; 8] = Default::default();
        for i in indices {
            buckets[octant(center, self.states[i].pos)].push(i);
        }

        let quarter = half / 2.0;
        let mut children = [0; 8];
        for (oct, bucket) in buckets.into_iter().enumerate() {
            children[oct] = self.build_node(
                bucket,
                child_center(center, quarter, oct),
                quarter,
                depth + 1,
                Some(id),
            )?;
        }
        self.nodes[id].kind = NodeKind::Branch(children);
        Ok(id)
    }

    /// Number of indexed objects.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    pub fn states(&self) -> &[TrackedObject] {
        &self.states
    }

    /// Nearest other object to `states()[index]` no farther than `radius`.
    ///
    /// Starts in the object's own leaf and climbs toward the root, visiting
    /// sibling subtrees only while they could still hold a better candidate.
    pub fn nearest_within(&self, index: usize, radius: f64) -> Option<(usize, f64)> {
        self.nearest_candidate(index, radius)
            .map(|best| (best.index, best.distance))
    }

    fn nearest_candidate(&self, index: usize, radius: f64) -> Option<Candidate> {
        if radius.is_nan() || radius < 0.0 {
            return None;
        }
        let leaf = *self.leaf_of.get(index)?;
        let mut best = None;
        self.scan_leaf(leaf, index, radius, &mut best);

        let p = self.states[index].pos;
        let mut child = leaf;
        while let Some(parent) = self.nodes[child].parent {
            let bound = best.map_or(radius, |b: Candidate| b.distance);
            if self.nodes[child].encloses_ball(p, bound) {
                break;
            }
            if let NodeKind::Branch(children) = &self.nodes[parent].kind {
                for &sibling in children.iter().filter(|&&c| c != child) {
                    self.search_subtree(sibling, index, radius, &mut best);
                }
            }
            child = parent;
        }
        best
    }

    fn search_subtree(
        &self,
        node: NodeId,
        index: usize,
        radius: f64,
        best: &mut Option<Candidate>,
    ) {
        let p = self.states[index].pos;
        let bound = best.map_or(radius, |b| b.distance);
        if self.nodes[node].min_distance2(p) > bound * bound {
            return;
        }
        match &self.nodes[node].kind {
            NodeKind::Leaf(_) => self.scan_leaf(node, index, radius, best),
            NodeKind::Branch(children) => {
                let mut order: Vec<(f64, NodeId)> = children
                    .iter()
                    .map(|&c| (self.nodes[c].min_distance2(p), c))
                    .collect();
                order.sort_by(|a, b| a.0.total_cmp(&b.0));
                for (_, c) in order {
                    self.search_subtree(c, index, radius, best);
                }
            }
        }
    }

    fn scan_leaf(&self, leaf: NodeId, index: usize, radius: f64, best: &mut Option<Candidate>) {
        let NodeKind::Leaf(points) = &self.nodes[leaf].kind else {
            return;
        };
        let subject = &self.states[index];
        for &j in points.iter().filter(|&&j| j != index) {
            let other = &self.states[j];
            let distance = subject.distance(other);
            if distance > radius {
                continue;
            }
            let candidate = Candidate {
                index: j,
                id: other.id,
                distance,
            };
            if candidate.beats(best.as_ref()) {
                *best = Some(candidate);
            }
        }
    }

    /// One record per object whose nearest neighbour lies within `tolerance`.
    /// Output order is unspecified.
    pub fn find_risky_debris(&self, tolerance: f64) -> Vec<ConjunctionRecord> {
        let risky: Vec<ConjunctionRecord> = (0..self.states.len())
            .filter_map(|i| {
                self.nearest_candidate(i, tolerance)
                    .map(|best| conjunction(&self.states[i], &best))
            })
            .collect();
        info!(
            "octree scan: {} of {} objects within {}",
            risky.len(),
            self.states.len(),
            tolerance
        );
        risky
    }
}
