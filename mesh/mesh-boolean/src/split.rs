//! Cutting two meshes along their intersection curve.
//!
//! Every triangle pair found by the BVH contributes one segment of the
//! intersection curve. Segment endpoints are identified by what produced
//! them: an edge of one mesh crossing a face of the other, or an existing
//! vertex lying on the other surface. Both meshes therefore refer to the
//! same vertex for the same curve point, and the two triangles on either
//! side of a crossed edge split that edge at the same place.
//!
//! Each cut triangle is then retriangulated in its own plane: its boundary
//! and the segments form a planar graph, the graph's faces are traced, and
//! every face is ear-clipped.

use std::collections::BTreeSet;

use hashbrown::{HashMap, HashSet};
use mesh_types::{IndexedMesh, Point3, Vector3};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::bvh::{triangle_bounds, Bvh};
use crate::intersect::{
    orient2d, plane_crossing, point_in_triangle, segments_cross_2d, triangle_unit_normal,
};

/// Identity of a point on the intersection curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CutKey {
    /// An existing vertex that lies on the other surface.
    Vertex(u32),
    /// Edge `(lo, hi)` crossing a face, all as global indices.
    EdgeFace(u32, u32, u32),
}

/// Both operands, cut, in one shared index space.
///
/// Vertices of A come first, then vertices of B, then the cut vertices.
/// Face lists hold global vertex indices.
#[derive(Debug)]
pub(crate) struct Arrangement {
    /// Positions of every vertex.
    pub positions: Vec<Point3<f64>>,
    /// Faces of A after cutting.
    pub a_faces: Vec<[u32; 3]>,
    /// Faces of B after cutting.
    pub b_faces: Vec<[u32; 3]>,
    /// Undirected edges lying on the intersection curve.
    pub cut_edges: HashSet<(u32, u32)>,
    /// Counters for logging and stats.
    pub stats: CutStats,
}

/// Counters gathered while cutting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CutStats {
    /// Triangle pairs producing a curve segment.
    pub intersecting_pairs: usize,
    /// Vertices created on the curve.
    pub cut_vertices: usize,
    /// Triangles replaced by their retriangulation.
    pub faces_split: usize,
    /// Cut triangles whose retriangulation failed and were kept whole.
    pub faces_unsplit: usize,
}

#[inline]
fn undirected(a: u32, b: u32) -> (u32, u32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Default)]
struct FaceCuts {
    points: SmallVec<[u32; 4]>,
    segments: SmallVec<[(u32, u32); 2]>,
}

struct Cutter {
    positions: Vec<Point3<f64>>,
    keys: HashMap<CutKey, u32>,
    /// Curve points lying on each undirected edge.
    edge_points: HashMap<(u32, u32), SmallVec<[u32; 2]>>,
    cuts: HashMap<u32, FaceCuts>,
    tolerance: f64,
    stats: CutStats,
}

impl Cutter {
    fn tri(&self, face: &[u32; 3]) -> [Point3<f64>; 3] {
        face.map(|v| self.positions[v as usize])
    }

    fn vertex_for(&mut self, key: CutKey, position: Point3<f64>) -> u32 {
        match key {
            CutKey::Vertex(v) => v,
            CutKey::EdgeFace(lo, hi, _) => {
                if let Some(&id) = self.keys.get(&key) {
                    return id;
                }
                #[allow(clippy::cast_possible_truncation)]
                // Truncation: vertex indices are u32 throughout
                let id = self.positions.len() as u32;
                self.positions.push(position);
                self.keys.insert(key, id);
                self.edge_points.entry((lo, hi)).or_default().push(id);
                self.stats.cut_vertices += 1;
                id
            }
        }
    }

    /// Curve points where `own` (a face with signed distances `dist` from
    /// the other face's plane) meets the other face.
    #[allow(clippy::too_many_arguments)]
    fn collect_points(
        &self,
        own: &[u32; 3],
        tri: &[Point3<f64>; 3],
        dist: &[f64; 3],
        other_face: u32,
        other_tri: &[Point3<f64>; 3],
        other_normal: &Vector3<f64>,
        found: &mut SmallVec<[(CutKey, Point3<f64>); 6]>,
    ) {
        let tol = self.tolerance;
        for k in 0..3 {
            if dist[k].abs() <= tol && point_in_triangle(&tri[k], other_tri, other_normal, tol) {
                found.push((CutKey::Vertex(own[k]), tri[k]));
            }
        }
        for k in 0..3 {
            let (i, j) = (k, (k + 1) % 3);
            let crosses = (dist[i] > tol && dist[j] < -tol) || (dist[i] < -tol && dist[j] > tol);
            if !crosses {
                continue;
            }
            let (lo, hi) = if own[i] < own[j] { (i, j) } else { (j, i) };
            let p = plane_crossing(&tri[lo], &tri[hi], dist[lo], dist[hi]);
            if point_in_triangle(&p, other_tri, other_normal, tol) {
                found.push((CutKey::EdgeFace(own[lo], own[hi], other_face), p));
            }
        }
    }

    /// Intersect face `ga` of A with face `gb` of B, recording the segment.
    fn intersect_pair(&mut self, ga: u32, fa: &[u32; 3], gb: u32, fb: &[u32; 3]) -> bool {
        let tol = self.tolerance;
        let ta = self.tri(fa);
        let tb = self.tri(fb);
        let (Some(na), Some(nb)) = (
            triangle_unit_normal(&ta[0], &ta[1], &ta[2]),
            triangle_unit_normal(&tb[0], &tb[1], &tb[2]),
        ) else {
            return false;
        };

        let da = ta.map(|p| (p - tb[0]).dot(&nb));
        let db = tb.map(|p| (p - ta[0]).dot(&na));
        let one_side = |d: &[f64; 3]| d.iter().all(|&x| x > tol) || d.iter().all(|&x| x < -tol);
        if one_side(&da) || one_side(&db) {
            return false;
        }
        // Coplanar overlaps are not cut
        if da.iter().all(|x| x.abs() <= tol) {
            return false;
        }

        let mut found: SmallVec<[(CutKey, Point3<f64>); 6]> = SmallVec::new();
        self.collect_points(fa, &ta, &da, gb, &tb, &nb, &mut found);
        self.collect_points(fb, &tb, &db, ga, &ta, &na, &mut found);

        // Merge coincident points, existing vertices first
        found.sort_by_key(|(key, _)| !matches!(key, CutKey::Vertex(_)));
        let mut distinct: SmallVec<[(CutKey, Point3<f64>); 6]> = SmallVec::new();
        for (key, p) in found {
            if distinct.iter().all(|(_, q)| (p - q).norm() > tol) {
                distinct.push((key, p));
            }
        }

        if distinct.len() < 2 {
            return false;
        }
        let ids: SmallVec<[u32; 6]> = distinct
            .iter()
            .map(|&(key, p)| self.vertex_for(key, p))
            .collect();

        // All points are collinear; the extremes bound the segment
        let mut best = (0, 1, -1.0);
        for i in 0..distinct.len() {
            for j in i + 1..distinct.len() {
                let d = (distinct[i].1 - distinct[j].1).norm_squared();
                if d > best.2 {
                    best = (i, j, d);
                }
            }
        }
        let segment = (ids[best.0], ids[best.1]);

        for (face, other) in [(ga, gb), (gb, ga)] {
            let entry = self.cuts.entry(face).or_default();
            entry.segments.push(segment);
            for &id in &ids {
                if !entry.points.contains(&id) {
                    entry.points.push(id);
                }
            }
            trace!(face, other, ?segment, "curve segment");
        }
        self.stats.intersecting_pairs += 1;
        true
    }

    /// Replace `face` by its retriangulation if anything cuts it.
    fn split_face(
        &mut self,
        global_face: u32,
        face: &[u32; 3],
        out: &mut Vec<[u32; 3]>,
        cut_edges: &mut HashSet<(u32, u32)>,
    ) {
        let mut points: SmallVec<[u32; 8]> = SmallVec::new();
        let mut segments: SmallVec<[(u32, u32); 4]> = SmallVec::new();
        if let Some(cuts) = self.cuts.get(&global_face) {
            points.extend(cuts.points.iter().copied());
            segments.extend(cuts.segments.iter().copied());
        }
        for k in 0..3 {
            let edge = undirected(face[k], face[(k + 1) % 3]);
            if let Some(on_edge) = self.edge_points.get(&edge) {
                for &id in on_edge {
                    if !points.contains(&id) {
                        points.push(id);
                    }
                }
            }
        }
        points.retain(|id| !face.contains(id));

        if points.is_empty() && segments.is_empty() {
            out.push(*face);
            return;
        }

        match retriangulate(face, &points, &segments, &self.positions, self.tolerance) {
            Some(result) => {
                self.stats.faces_split += 1;
                out.extend(result.faces);
                cut_edges.extend(result.cut_edges);
            }
            None => {
                self.stats.faces_unsplit += 1;
                debug!(face = global_face, "retriangulation failed, keeping face whole");
                out.push(*face);
                for &(a, b) in &segments {
                    if a != b {
                        cut_edges.insert(undirected(a, b));
                    }
                }
            }
        }
    }
}

/// Cut `a` and `b` along their intersection curve.
pub(crate) fn cut(a: &IndexedMesh, b: &IndexedMesh, bvh_b: &Bvh, tolerance: f64) -> Arrangement {
    let mut positions = Vec::with_capacity(a.vertices.len() + b.vertices.len());
    positions.extend(a.positions().copied());
    positions.extend(b.positions().copied());

    #[allow(clippy::cast_possible_truncation)]
    // Truncation: vertex and face indices are u32 throughout
    let (b_offset, b_face_offset) = (a.vertices.len() as u32, a.faces.len() as u32);
    let b_faces: Vec<[u32; 3]> = b
        .faces
        .iter()
        .map(|f| f.map(|v| v + b_offset))
        .collect();

    let mut cutter = Cutter {
        positions,
        keys: HashMap::new(),
        edge_points: HashMap::new(),
        cuts: HashMap::new(),
        tolerance,
        stats: CutStats::default(),
    };

    for (ai, fa) in a.faces.iter().enumerate() {
        let ta = cutter.tri(fa);
        let mut candidates = bvh_b.query(&triangle_bounds(&ta[0], &ta[1], &ta[2]), tolerance);
        // Query order depends only on the tree, but keep pair order obvious
        candidates.sort_unstable();
        #[allow(clippy::cast_possible_truncation)]
        // Truncation: face indices are u32 throughout
        let ga = ai as u32;
        for bj in candidates {
            let fb = b_faces[bj as usize];
            cutter.intersect_pair(ga, fa, b_face_offset + bj, &fb);
        }
    }

    let mut cut_edges = HashSet::new();
    let mut a_out = Vec::with_capacity(a.faces.len());
    for (ai, fa) in a.faces.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        // Truncation: face indices are u32 throughout
        let ga = ai as u32;
        cutter.split_face(ga, fa, &mut a_out, &mut cut_edges);
    }
    let mut b_out = Vec::with_capacity(b_faces.len());
    for (bj, fb) in b_faces.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        // Truncation: face indices are u32 throughout
        let gb = b_face_offset + bj as u32;
        cutter.split_face(gb, fb, &mut b_out, &mut cut_edges);
    }

    debug!(
        pairs = cutter.stats.intersecting_pairs,
        cut_vertices = cutter.stats.cut_vertices,
        split = cutter.stats.faces_split,
        unsplit = cutter.stats.faces_unsplit,
        "cut meshes along intersection curve"
    );

    Arrangement {
        positions: cutter.positions,
        a_faces: a_out,
        b_faces: b_out,
        cut_edges,
        stats: cutter.stats,
    }
}

/// Faces replacing one cut triangle.
#[derive(Debug)]
struct Retriangulation {
    faces: Vec<[u32; 3]>,
    cut_edges: Vec<(u32, u32)>,
}

/// Planar graph of one triangle, in the triangle's projected 2D frame.
struct FaceGraph {
    ids: Vec<u32>,
    pts: Vec<[f64; 2]>,
    edges: BTreeSet<(usize, usize)>,
}

impl FaceGraph {
    fn local(&self, id: u32) -> Option<usize> {
        self.ids.iter().position(|&x| x == id)
    }

    fn add_edge(&mut self, a: usize, b: usize) {
        if a != b {
            self.edges.insert(if a < b { (a, b) } else { (b, a) });
        }
    }

    fn edge_length(&self, a: usize, b: usize) -> f64 {
        let (p, q) = (self.pts[a], self.pts[b]);
        (q[0] - p[0]).hypot(q[1] - p[1])
    }

    /// Nodes strictly inside segment `a-b`, ordered from `a`.
    fn nodes_on_segment(&self, a: usize, b: usize, tol: f64) -> Vec<usize> {
        let len = self.edge_length(a, b);
        if len <= tol {
            return Vec::new();
        }
        let (pa, pb) = (self.pts[a], self.pts[b]);
        let dir = [(pb[0] - pa[0]) / len, (pb[1] - pa[1]) / len];
        let mut on: Vec<(f64, usize)> = (0..self.pts.len())
            .filter(|&w| w != a && w != b)
            .filter_map(|w| {
                let p = self.pts[w];
                let rel = [p[0] - pa[0], p[1] - pa[1]];
                let along = rel[0] * dir[0] + rel[1] * dir[1];
                let across = rel[0] * dir[1] - rel[1] * dir[0];
                (across.abs() <= tol && along > tol && along < len - tol).then_some((along, w))
            })
            .collect();
        on.sort_by(|x, y| x.0.total_cmp(&y.0));
        on.into_iter().map(|(_, w)| w).collect()
    }

    /// Add `a-b`, split at any nodes on it. Returns the pieces added.
    fn add_chain(&mut self, a: usize, b: usize, tol: f64) -> Vec<(usize, usize)> {
        let mut chain = vec![a];
        chain.extend(self.nodes_on_segment(a, b, tol));
        chain.push(b);
        let pieces: Vec<(usize, usize)> = chain.windows(2).map(|w| (w[0], w[1])).collect();
        for &(p, q) in &pieces {
            self.add_edge(p, q);
        }
        pieces
    }

    fn adjacency(&self) -> Vec<Vec<usize>> {
        let mut adj = vec![Vec::new(); self.pts.len()];
        for &(a, b) in &self.edges {
            adj[a].push(b);
            adj[b].push(a);
        }
        adj
    }

    /// Drop edges ending at degree-1 nodes until none remain.
    fn prune_dangling(&mut self) {
        loop {
            let adj = self.adjacency();
            let dangling: Vec<usize> = (3..adj.len()).filter(|&v| adj[v].len() == 1).collect();
            if dangling.is_empty() {
                return;
            }
            self.edges
                .retain(|&(a, b)| !dangling.contains(&a) && !dangling.contains(&b));
        }
    }

    fn crosses_any_edge(&self, a: usize, b: usize, tol: f64) -> bool {
        let (pa, pb) = (self.pts[a], self.pts[b]);
        let area_tol = tol * self.edge_length(a, b);
        self.edges.iter().any(|&(c, d)| {
            c != a
                && c != b
                && d != a
                && d != b
                && segments_cross_2d(pa, pb, self.pts[c], self.pts[d], area_tol)
        })
    }

    /// Connect floating loops to the triangle boundary with bridge edges.
    fn bridge_components(&mut self, tol: f64) -> bool {
        loop {
            let adj = self.adjacency();
            let mut parent: Vec<usize> = (0..adj.len()).collect();
            fn find(parent: &mut [usize], mut x: usize) -> usize {
                while parent[x] != x {
                    parent[x] = parent[parent[x]];
                    x = parent[x];
                }
                x
            }
            for &(a, b) in &self.edges {
                let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
                if ra != rb {
                    parent[ra] = rb;
                }
            }
            let main = find(&mut parent, 0);
            let roots: Vec<usize> = (0..adj.len()).map(|v| find(&mut parent, v)).collect();
            let Some(floating) = (0..adj.len()).find(|&v| !adj[v].is_empty() && roots[v] != main)
            else {
                return true;
            };
            let component = roots[floating];

            let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
            for u in (0..adj.len()).filter(|&u| roots[u] == component) {
                for w in (0..adj.len()).filter(|&w| roots[w] == main && !adj[w].is_empty()) {
                    candidates.push((self.edge_length(u, w), u, w));
                }
            }
            candidates.sort_by(|x, y| x.0.total_cmp(&y.0));
            let bridge = candidates.into_iter().find(|&(_, u, w)| {
                !self.crosses_any_edge(u, w, tol) && self.nodes_on_segment(u, w, tol).is_empty()
            });
            match bridge {
                Some((_, u, w)) => self.add_edge(u, w),
                None => return false,
            }
        }
    }

    /// Bounded faces of the graph as counter-clockwise node cycles.
    fn trace_faces(&self, tol: f64) -> Option<Vec<Vec<usize>>> {
        let adj = self.adjacency();
        let sorted: Vec<Vec<usize>> = adj
            .iter()
            .enumerate()
            .map(|(v, neighbors)| {
                let mut n = neighbors.clone();
                let p = self.pts[v];
                n.sort_by(|&x, &y| {
                    let ax = (self.pts[x][1] - p[1]).atan2(self.pts[x][0] - p[0]);
                    let ay = (self.pts[y][1] - p[1]).atan2(self.pts[y][0] - p[0]);
                    ax.total_cmp(&ay)
                });
                n
            })
            .collect();

        let mut visited: HashSet<(usize, usize)> = HashSet::new();
        let mut faces = Vec::new();
        let limit = 2 * self.edges.len() + 2;

        for &(a, b) in &self.edges {
            for start in [(a, b), (b, a)] {
                if visited.contains(&start) {
                    continue;
                }
                let mut cycle = Vec::new();
                let mut current = start;
                loop {
                    if !visited.insert(current) || cycle.len() > limit {
                        return None;
                    }
                    let (u, v) = current;
                    cycle.push(u);
                    // Turn to the edge just clockwise of the way back
                    let around = &sorted[v];
                    let back = around.iter().position(|&x| x == u)?;
                    let next = around[(back + around.len() - 1) % around.len()];
                    current = (v, next);
                    if current == start {
                        break;
                    }
                }
                if polygon_area(&cycle, &self.pts) > tol * tol {
                    faces.push(cycle);
                }
            }
        }
        Some(faces)
    }
}

fn polygon_area(cycle: &[usize], pts: &[[f64; 2]]) -> f64 {
    let n = cycle.len();
    (0..n)
        .map(|i| {
            let (p, q) = (pts[cycle[i]], pts[cycle[(i + 1) % n]]);
            p[0] * q[1] - q[0] * p[1]
        })
        .sum::<f64>()
        * 0.5
}

fn in_triangle_closed(p: [f64; 2], a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> bool {
    orient2d(a, b, p) >= 0.0 && orient2d(b, c, p) >= 0.0 && orient2d(c, a, p) >= 0.0
}

/// Ear-clip a counter-clockwise polygon that may touch itself at bridge
/// vertices.
fn ear_clip(polygon: &[usize], pts: &[[f64; 2]]) -> Option<Vec<[usize; 3]>> {
    let mut poly = polygon.to_vec();
    let mut out = Vec::with_capacity(poly.len().saturating_sub(2));

    while poly.len() > 3 {
        let n = poly.len();
        let ear = (0..n).find(|&i| {
            let (a, b, c) = (poly[(i + n - 1) % n], poly[i], poly[(i + 1) % n]);
            let (pa, pb, pc) = (pts[a], pts[b], pts[c]);
            orient2d(pa, pb, pc) > 0.0
                && !poly.iter().any(|&w| {
                    w != a && w != b && w != c && pts[w] != pa && pts[w] != pb && pts[w] != pc
                        && in_triangle_closed(pts[w], pa, pb, pc)
                })
        })?;
        let (a, b, c) = (poly[(ear + n - 1) % n], poly[ear], poly[(ear + 1) % n]);
        out.push([a, b, c]);
        poly.remove(ear);
    }
    if poly.len() == 3 && orient2d(pts[poly[0]], pts[poly[1]], pts[poly[2]]) > 0.0 {
        out.push([poly[0], poly[1], poly[2]]);
    }
    Some(out)
}

/// Retriangulate `face` so every segment becomes a chain of edges.
///
/// Returns `None` when the cut pattern cannot be resolved (crossing
/// segments, numerical trouble); the caller keeps the face whole.
fn retriangulate(
    face: &[u32; 3],
    points: &[u32],
    segments: &[(u32, u32)],
    positions: &[Point3<f64>],
    tol: f64,
) -> Option<Retriangulation> {
    let corners = face.map(|v| positions[v as usize]);
    let normal = triangle_unit_normal(&corners[0], &corners[1], &corners[2])?;

    // Drop the dominant axis; swap the other two if that would mirror
    let axis = normal.iamax();
    let (mut u, mut v) = ((axis + 1) % 3, (axis + 2) % 3);
    if normal[axis] < 0.0 {
        std::mem::swap(&mut u, &mut v);
    }
    let project = |p: &Point3<f64>| [p[u], p[v]];

    let mut graph = FaceGraph {
        ids: face.to_vec(),
        pts: corners.iter().map(project).collect(),
        edges: BTreeSet::new(),
    };
    let corner_pts = [graph.pts[0], graph.pts[1], graph.pts[2]];

    // Curve points: aliased to an existing node when coincident, dropped
    // when outside the triangle
    let mut alias: HashMap<u32, usize> = HashMap::new();
    for &id in points {
        let p = project(&positions[id as usize]);
        if let Some(existing) = (0..graph.pts.len()).find(|&n| {
            let q = graph.pts[n];
            (p[0] - q[0]).hypot(p[1] - q[1]) <= tol
        }) {
            alias.insert(id, existing);
            continue;
        }
        let outside = (0..3).any(|k| {
            let (a, b) = (corner_pts[k], corner_pts[(k + 1) % 3]);
            let len = (b[0] - a[0]).hypot(b[1] - a[1]);
            orient2d(a, b, p) / len < -tol
        });
        if outside {
            continue;
        }
        alias.insert(id, graph.pts.len());
        graph.ids.push(id);
        graph.pts.push(p);
    }

    // Triangle boundary, split at curve points on it
    for k in 0..3 {
        graph.add_chain(k, (k + 1) % 3, tol);
    }

    let mut cut_pieces: Vec<(usize, usize)> = Vec::new();
    for &(s, e) in segments {
        // Corners are not aliased; they are found by id
        let ls = alias.get(&s).copied().or_else(|| graph.local(s));
        let le = alias.get(&e).copied().or_else(|| graph.local(e));
        if let (Some(ls), Some(le)) = (ls, le) {
            if ls != le {
                cut_pieces.extend(graph.add_chain(ls, le, tol));
            }
        }
    }

    // Curve pieces must not cross each other
    for (i, &(a, b)) in cut_pieces.iter().enumerate() {
        for &(c, d) in &cut_pieces[i + 1..] {
            if a != c && a != d && b != c && b != d {
                let area_tol = tol * graph.edge_length(a, b);
                if segments_cross_2d(graph.pts[a], graph.pts[b], graph.pts[c], graph.pts[d], area_tol) {
                    return None;
                }
            }
        }
    }

    graph.prune_dangling();
    if !graph.bridge_components(tol) {
        return None;
    }

    let mut faces = Vec::new();
    for cycle in graph.trace_faces(tol)? {
        for [a, b, c] in ear_clip(&cycle, &graph.pts)? {
            faces.push([graph.ids[a], graph.ids[b], graph.ids[c]]);
        }
    }

    // The pieces must tile the original triangle
    let original = orient2d(corner_pts[0], corner_pts[1], corner_pts[2]);
    let covered: f64 = faces
        .iter()
        .map(|f| {
            let [a, b, c] = f.map(|id| project(&positions[id as usize]));
            orient2d(a, b, c)
        })
        .sum();
    if (covered - original).abs() > 1e-9 * original.abs() + tol * tol {
        return None;
    }

    let cut_edges = cut_pieces
        .into_iter()
        .filter(|&(a, b)| {
            let key = if a < b { (a, b) } else { (b, a) };
            graph.edges.contains(&key)
        })
        .map(|(a, b)| undirected(graph.ids[a], graph.ids[b]))
        .collect();

    Some(Retriangulation { faces, cut_edges })
}
