use crate::error::TopologyError;
use crate::math::Point3;
use crate::voxel::BoundingBox;

use super::VertexId;

/// Leaf bucket capacity before an octree cell subdivides.
const LEAF_CAPACITY: usize = 16;

/// Subdivision stops at this depth; overfull leaves then simply grow.
const MAX_DEPTH: u32 = 24;

/// Octree mapping coordinates to vertex ids.
///
/// Lookups are tolerance-based: coordinates closer than the index tolerance
/// resolve to the same vertex, which makes vertex insertion during
/// extraction idempotent.
#[derive(Debug)]
pub struct VertexIndex {
    root: Node,
    tolerance: f64,
}

#[derive(Debug)]
struct Node {
    bounds: BoundingBox,
    entries: Vec<(Point3, VertexId)>,
    children: Option<Box<[Node; 8]>>,
}

impl VertexIndex {
    /// Creates an index covering `bounds`.
    #[must_use]
    pub fn new(bounds: BoundingBox, tolerance: f64) -> Self {
        Self {
            root: Node {
                bounds,
                entries: Vec::new(),
                children: None,
            },
            tolerance,
        }
    }

    /// The id registered within tolerance of `point`, if any.
    #[must_use]
    pub fn find(&self, point: &Point3) -> Option<VertexId> {
        self.root.find(point, self.tolerance)
    }

    /// Registers `id` at `point`.
    ///
    /// The caller is responsible for checking [`find`](Self::find) first;
    /// coincident double insertion violates the vertex-uniqueness invariant.
    ///
    /// # Errors
    ///
    /// Returns an error if `point` lies outside the index bounds.
    pub fn insert(&mut self, point: Point3, id: VertexId) -> Result<(), TopologyError> {
        if !self.root.bounds.contains(&point) {
            return Err(TopologyError::VertexOutOfBounds(point.x, point.y, point.z));
        }
        self.root.insert(point, id, 0);
        Ok(())
    }

    /// Drops the entry registered within tolerance of `point`, if any.
    pub fn remove(&mut self, point: &Point3) {
        self.root.remove(point, self.tolerance);
    }
}

impl Node {
    fn find(&self, point: &Point3, tolerance: f64) -> Option<VertexId> {
        if !self.ball_touches(point, tolerance) {
            return None;
        }
        if let Some(children) = &self.children {
            return children.iter().find_map(|c| c.find(point, tolerance));
        }
        self.entries
            .iter()
            .find(|(p, _)| (p - point).norm() <= tolerance)
            .map(|(_, id)| *id)
    }

    fn insert(&mut self, point: Point3, id: VertexId, depth: u32) {
        if let Some(children) = &mut self.children {
            children[child_slot(&self.bounds, &point)].insert(point, id, depth + 1);
            return;
        }
        self.entries.push((point, id));
        if self.entries.len() > LEAF_CAPACITY && depth < MAX_DEPTH {
            self.subdivide(depth);
        }
    }

    fn remove(&mut self, point: &Point3, tolerance: f64) {
        if !self.ball_touches(point, tolerance) {
            return;
        }
        if let Some(children) = &mut self.children {
            for child in children.iter_mut() {
                child.remove(point, tolerance);
            }
            return;
        }
        self.entries.retain(|(p, _)| (p - point).norm() > tolerance);
    }

    fn ball_touches(&self, point: &Point3, tolerance: f64) -> bool {
        (0..3).all(|a| {
            point[a] >= self.bounds.min[a] - tolerance && point[a] <= self.bounds.max[a] + tolerance
        })
    }

    fn subdivide(&mut self, depth: u32) {
        let min = self.bounds.min;
        let max = self.bounds.max;
        let mid = nalgebra::center(&min, &max);

        let children: Vec<Node> = (0..8)
            .map(|slot| {
                let mut lo = Point3::origin();
                let mut hi = Point3::origin();
                for a in 0..3 {
                    if slot & (1 << a) == 0 {
                        lo[a] = min[a];
                        hi[a] = mid[a];
                    } else {
                        lo[a] = mid[a];
                        hi[a] = max[a];
                    }
                }
                Node {
                    bounds: BoundingBox::new(lo, hi),
                    entries: Vec::new(),
                    children: None,
                }
            })
            .collect();

        let mut children: Box<[Node; 8]> = match children.try_into() {
            Ok(array) => array,
            // Eight nodes were just built; this branch is unreachable.
            Err(_) => return,
        };

        for (point, id) in self.entries.drain(..) {
            children[child_slot(&self.bounds, &point)].insert(point, id, depth + 1);
        }
        self.children = Some(children);
    }
}

fn child_slot(bounds: &BoundingBox, point: &Point3) -> usize {
    let mid = nalgebra::center(&bounds.min, &bounds.max);
    let mut slot = 0;
    for a in 0..3 {
        if point[a] >= mid[a] {
            slot |= 1 << a;
        }
    }
    slot
}
