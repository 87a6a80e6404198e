//! Bounding Volume Hierarchy for accelerated intersection queries.
//!
//! Triangle-pair candidate search and ray casting both go through this tree,
//! so a boolean costs O(n log n + k) rather than O(n * m).

use mesh_types::{Aabb, IndexedMesh, Point3, Vector3};
use smallvec::SmallVec;

/// Bounding box of one triangle.
#[must_use]
pub fn triangle_bounds(v0: &Point3<f64>, v1: &Point3<f64>, v2: &Point3<f64>) -> Aabb {
    let mut bbox = Aabb::from_point(*v0);
    bbox.expand_to_include(v1);
    bbox.expand_to_include(v2);
    bbox
}

fn longest_axis(bbox: &Aabb) -> usize {
    let size = bbox.size();
    if size.x >= size.y && size.x >= size.z {
        0
    } else if size.y >= size.z {
        1
    } else {
        2
    }
}

/// Slab test: does the ray `origin + t * direction`, `t >= 0`, hit the box?
fn ray_hits_box(bbox: &Aabb, origin: &Point3<f64>, inv_dir: &Vector3<f64>) -> bool {
    let mut t_min = 0.0_f64;
    let mut t_max = f64::INFINITY;
    for axis in 0..3 {
        let t1 = (bbox.min[axis] - origin[axis]) * inv_dir[axis];
        let t2 = (bbox.max[axis] - origin[axis]) * inv_dir[axis];
        // NaN appears for a zero direction component with the origin on a slab
        // plane; treat it as a hit along that axis
        let (lo, hi) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
        if !lo.is_nan() {
            t_min = t_min.max(lo);
        }
        if !hi.is_nan() {
            t_max = t_max.min(hi);
        }
        if t_min > t_max {
            return false;
        }
    }
    true
}

/// BVH node containing either leaf triangles or child nodes.
#[derive(Debug)]
pub enum BvhNode {
    /// Leaf node containing triangle indices.
    Leaf {
        /// Bounding box of all triangles in this leaf.
        bbox: Aabb,
        /// Triangle indices stored in this leaf.
        triangles: SmallVec<[u32; 8]>,
    },
    /// Internal node with two children.
    Internal {
        /// Bounding box of all triangles in this subtree.
        bbox: Aabb,
        /// Left child node.
        left: Box<Self>,
        /// Right child node.
        right: Box<Self>,
    },
}

impl BvhNode {
    /// Get the bounding box of this node.
    #[must_use]
    pub fn bbox(&self) -> &Aabb {
        match self {
            Self::Leaf { bbox, .. } | Self::Internal { bbox, .. } => bbox,
        }
    }
}

/// Statistics about a built tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BvhStats {
    /// Number of leaves.
    pub leaf_count: usize,
    /// Number of internal nodes.
    pub internal_count: usize,
    /// Deepest leaf depth (root is 0).
    pub max_depth: usize,
    /// Largest leaf.
    pub max_leaf_size: usize,
}

/// Bounding Volume Hierarchy for triangle meshes.
#[derive(Debug)]
pub struct Bvh {
    /// Root node of the BVH (None for empty meshes).
    root: Option<BvhNode>,
    /// Total number of triangles in the BVH.
    triangle_count: usize,
}

/// Subtrees below this size are built on the current thread.
#[cfg(feature = "parallel")]
const PARALLEL_THRESHOLD: usize = 2048;

impl Bvh {
    /// Build a BVH from a mesh.
    ///
    /// # Arguments
    ///
    /// * `mesh` - The mesh to build the BVH for
    /// * `max_leaf_size` - Maximum triangles per leaf node
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_types::unit_cube;
    /// use mesh_boolean::bvh::Bvh;
    ///
    /// let bvh = Bvh::build(&unit_cube(), 4);
    /// assert_eq!(bvh.triangle_count(), 12);
    /// assert!(bvh.stats().leaf_count >= 3);
    /// ```
    #[must_use]
    pub fn build(mesh: &IndexedMesh, max_leaf_size: usize) -> Self {
        Self::build_with(mesh, max_leaf_size, false)
    }

    /// Build with the two halves of large subtrees constructed in parallel.
    ///
    /// Falls back to [`Bvh::build`] without the `parallel` feature. The tree
    /// is identical either way.
    #[must_use]
    pub fn build_parallel(mesh: &IndexedMesh, max_leaf_size: usize) -> Self {
        Self::build_with(mesh, max_leaf_size, true)
    }

    fn build_with(mesh: &IndexedMesh, max_leaf_size: usize, parallel: bool) -> Self {
        if mesh.faces.is_empty() {
            return Self {
                root: None,
                triangle_count: 0,
            };
        }

        #[allow(clippy::cast_possible_truncation)]
        // Truncation: face indices are stored as u32 throughout
        let triangles: Vec<(u32, Aabb)> = mesh
            .faces
            .iter()
            .enumerate()
            .map(|(i, face)| {
                let [v0, v1, v2] = face.map(|v| mesh.vertices[v as usize].position);
                (i as u32, triangle_bounds(&v0, &v1, &v2))
            })
            .collect();

        let indices: Vec<usize> = (0..triangles.len()).collect();
        let max_leaf = max_leaf_size.max(1);
        let root = Self::build_recursive(&triangles, indices, max_leaf, parallel);

        Self {
            root: Some(root),
            triangle_count: mesh.faces.len(),
        }
    }

    fn build_recursive(
        triangles: &[(u32, Aabb)],
        indices: Vec<usize>,
        max_leaf_size: usize,
        parallel: bool,
    ) -> BvhNode {
        let mut bbox = Aabb::empty();
        for &i in &indices {
            bbox = bbox.union(&triangles[i].1);
        }

        if indices.len() <= max_leaf_size {
            let triangle_indices: SmallVec<[u32; 8]> =
                indices.iter().map(|&i| triangles[i].0).collect();
            return BvhNode::Leaf {
                bbox,
                triangles: triangle_indices,
            };
        }

        // Median split along the longest axis
        let axis = longest_axis(&bbox);
        let mut sorted_indices = indices;
        sorted_indices.sort_by(|&a, &b| {
            let ca = triangles[a].1.center()[axis];
            let cb = triangles[b].1.center()[axis];
            ca.total_cmp(&cb).then(a.cmp(&b))
        });

        let right_indices = sorted_indices.split_off(sorted_indices.len() / 2);
        let left_indices = sorted_indices;

        let (left, right) = Self::build_children(
            triangles,
            left_indices,
            right_indices,
            max_leaf_size,
            parallel,
        );

        BvhNode::Internal {
            bbox,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[cfg(feature = "parallel")]
    fn build_children(
        triangles: &[(u32, Aabb)],
        left: Vec<usize>,
        right: Vec<usize>,
        max_leaf_size: usize,
        parallel: bool,
    ) -> (BvhNode, BvhNode) {
        if parallel && left.len() + right.len() >= PARALLEL_THRESHOLD {
            rayon::join(
                || Self::build_recursive(triangles, left, max_leaf_size, true),
                || Self::build_recursive(triangles, right, max_leaf_size, true),
            )
        } else {
            (
                Self::build_recursive(triangles, left, max_leaf_size, false),
                Self::build_recursive(triangles, right, max_leaf_size, false),
            )
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn build_children(
        triangles: &[(u32, Aabb)],
        left: Vec<usize>,
        right: Vec<usize>,
        max_leaf_size: usize,
        _parallel: bool,
    ) -> (BvhNode, BvhNode) {
        (
            Self::build_recursive(triangles, left, max_leaf_size, false),
            Self::build_recursive(triangles, right, max_leaf_size, false),
        )
    }

    /// Query the BVH for triangles whose bounding boxes touch `query_bbox`
    /// grown by `tolerance`.
    #[must_use]
    pub fn query(&self, query_bbox: &Aabb, tolerance: f64) -> Vec<u32> {
        let mut result = Vec::new();
        if let Some(ref root) = self.root {
            let grown = query_bbox.expanded(tolerance);
            Self::query_recursive(root, &grown, &mut result);
        }
        result
    }

    fn query_recursive(node: &BvhNode, query_bbox: &Aabb, result: &mut Vec<u32>) {
        if !node.bbox().intersects(query_bbox) {
            return;
        }
        match node {
            BvhNode::Leaf { triangles, .. } => result.extend(triangles.iter().copied()),
            BvhNode::Internal { left, right, .. } => {
                Self::query_recursive(left, query_bbox, result);
                Self::query_recursive(right, query_bbox, result);
            }
        }
    }

    /// Triangles whose bounding boxes the ray from `origin` along
    /// `direction` passes through.
    #[must_use]
    pub fn query_ray(&self, origin: &Point3<f64>, direction: &Vector3<f64>) -> Vec<u32> {
        let mut result = Vec::new();
        if let Some(ref root) = self.root {
            let inv_dir = direction.map(|d| 1.0 / d);
            Self::query_ray_recursive(root, origin, &inv_dir, &mut result);
        }
        result
    }

    fn query_ray_recursive(
        node: &BvhNode,
        origin: &Point3<f64>,
        inv_dir: &Vector3<f64>,
        result: &mut Vec<u32>,
    ) {
        if !ray_hits_box(node.bbox(), origin, inv_dir) {
            return;
        }
        match node {
            BvhNode::Leaf { triangles, .. } => result.extend(triangles.iter().copied()),
            BvhNode::Internal { left, right, .. } => {
                Self::query_ray_recursive(left, origin, inv_dir, result);
                Self::query_ray_recursive(right, origin, inv_dir, result);
            }
        }
    }

    /// Get the total number of triangles in the BVH.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    /// Check if the BVH is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Get the root bounding box of the BVH.
    #[must_use]
    pub fn root_bbox(&self) -> Option<&Aabb> {
        self.root.as_ref().map(BvhNode::bbox)
    }

    /// Get statistics about the BVH structure.
    #[must_use]
    pub fn stats(&self) -> BvhStats {
        let mut stats = BvhStats::default();
        if let Some(ref root) = self.root {
            Self::collect_stats(root, 0, &mut stats);
        }
        stats
    }

    fn collect_stats(node: &BvhNode, depth: usize, stats: &mut BvhStats) {
        stats.max_depth = stats.max_depth.max(depth);

        match node {
            BvhNode::Leaf { triangles, .. } => {
                stats.leaf_count += 1;
                stats.max_leaf_size = stats.max_leaf_size.max(triangles.len());
            }
            BvhNode::Internal { left, right, .. } => {
                stats.internal_count += 1;
                Self::collect_stats(left, depth + 1, stats);
                Self::collect_stats(right, depth + 1, stats);
            }
        }
    }
}
