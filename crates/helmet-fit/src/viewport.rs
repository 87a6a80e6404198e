//! Scene redraw against a pluggable render backend.

use std::fmt;

use mesh_types::{Aabb, IndexedMesh, MeshBounds};
use tracing::trace;

/// Display layers, drawn in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    /// Helmet template or carved helmet.
    Helmet,
    /// Positioned head, or the carved helmet once committed.
    Head,
    /// Chin piece.
    Chin,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Helmet => "helmet",
            Self::Head => "head",
            Self::Chin => "chin",
        })
    }
}

/// Receiver of draw calls.
pub trait RenderBackend {
    /// Remove everything from the scene.
    fn clear(&mut self);

    /// Add a mesh to a layer.
    fn add_layer(&mut self, layer: Layer, mesh: &IndexedMesh);

    /// Set the bounding box shown on the axes.
    fn show_bounds(&mut self, bounds: &Aabb);
}

/// One recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    /// [`RenderBackend::clear`].
    Clear,
    /// [`RenderBackend::add_layer`] with the mesh's face count.
    AddLayer {
        /// Target layer.
        layer: Layer,
        /// Faces drawn.
        faces: usize,
    },
    /// [`RenderBackend::show_bounds`].
    ShowBounds(Aabb),
}

/// Backend that keeps the calls of the latest redraw.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    calls: Vec<RenderCall>,
}

impl RecordingBackend {
    /// Calls since the last clear, including the clear itself.
    pub fn calls(&self) -> &[RenderCall] {
        &self.calls
    }

    /// Layers currently drawn.
    pub fn layers(&self) -> Vec<Layer> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                RenderCall::AddLayer { layer, .. } => Some(*layer),
                _ => None,
            })
            .collect()
    }

    /// Bounds currently shown.
    pub fn bounds(&self) -> Option<&Aabb> {
        self.calls.iter().rev().find_map(|c| match c {
            RenderCall::ShowBounds(b) => Some(b),
            _ => None,
        })
    }
}

impl RenderBackend for RecordingBackend {
    fn clear(&mut self) {
        self.calls.clear();
        self.calls.push(RenderCall::Clear);
    }

    fn add_layer(&mut self, layer: Layer, mesh: &IndexedMesh) {
        self.calls.push(RenderCall::AddLayer {
            layer,
            faces: mesh.faces.len(),
        });
    }

    fn show_bounds(&mut self, bounds: &Aabb) {
        self.calls.push(RenderCall::ShowBounds(*bounds));
    }
}

/// What to draw.
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    /// Helmet layer.
    pub helmet: &'a IndexedMesh,
    /// Head layer: the positioned head or the boolean result.
    pub head: &'a IndexedMesh,
    /// Chin layer.
    pub chin: Option<&'a IndexedMesh>,
}

impl Scene<'_> {
    /// Bounds of everything in the scene.
    pub fn bounds(&self) -> Aabb {
        let mut bounds = self.helmet.bounds().union(&self.head.bounds());
        if let Some(chin) = self.chin {
            bounds = bounds.union(&chin.bounds());
        }
        bounds
    }
}

/// Full-redraw viewport.
#[derive(Debug, Default)]
pub struct Viewport<B: RenderBackend = RecordingBackend> {
    backend: B,
    redraws: u64,
}

impl<B: RenderBackend> Viewport<B> {
    /// Viewport drawing into `backend`.
    pub fn new(backend: B) -> Self {
        Self { backend, redraws: 0 }
    }

    /// Clear and redraw every layer, then refresh the axes bounds.
    pub fn redraw(&mut self, scene: &Scene<'_>) {
        self.backend.clear();
        self.backend.add_layer(Layer::Helmet, scene.helmet);
        self.backend.add_layer(Layer::Head, scene.head);
        if let Some(chin) = scene.chin {
            self.backend.add_layer(Layer::Chin, chin);
        }
        self.backend.show_bounds(&scene.bounds());
        self.redraws += 1;
        trace!(redraws = self.redraws, "viewport redrawn");
    }

    /// Number of redraws so far.
    pub fn redraw_count(&self) -> u64 {
        self.redraws
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }
}
