//! Puppet node tree.
//!
//! Nodes live in an arena (`NodeTree::nodes`) and refer to each other by index.
//! Each node has an authored local transform plus per-frame offsets written by
//! parameter bindings; `NodeTree::update_world` folds both into world matrices.

use hashbrown::HashMap;

use crate::drawlist::{BlendMode, MaskMode};
use crate::ids::{NodeId, TextureSlot};
use crate::math::{Affine, Transform, Vec2};
use crate::physics::PendulumDriver;

/// Triangle mesh of a part, in node-local space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub verts: Vec<Vec2>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
}

/// A mask applied to a part or composite.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaskBinding {
    pub source: NodeId,
    pub mode: MaskMode,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Part {
    pub mesh: Mesh,
    /// Attachment slots in order (albedo, emissive, bump, ...). `None` leaves a hole.
    pub textures: Vec<Option<TextureSlot>>,
    pub blend_mode: BlendMode,
    pub tint: [f32; 3],
    pub screen_tint: [f32; 3],
    pub opacity: f32,
    pub mask_threshold: f32,
    pub masks: Vec<MaskBinding>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Composite {
    pub blend_mode: BlendMode,
    pub tint: [f32; 3],
    pub screen_tint: [f32; 3],
    pub opacity: f32,
    pub mask_threshold: f32,
    pub masks: Vec<MaskBinding>,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    /// Plain transform group (also used for node types this runtime does not model).
    Group,
    Part(Part),
    Composite(Composite),
    SimplePhysics(PendulumDriver),
}

/// Offsets accumulated from parameter bindings for the current frame.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeOffsets {
    pub translation: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
    pub zsort: f32,
    pub opacity: f32,
    /// Per-vertex offsets; empty until a deform binding touches the node.
    pub deform: Vec<Vec2>,
}

impl Default for NodeOffsets {
    fn default() -> Self {
        Self {
            translation: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
            zsort: 0.0,
            opacity: 1.0,
            deform: Vec::new(),
        }
    }
}

impl NodeOffsets {
    fn reset(&mut self) {
        let deform = std::mem::take(&mut self.deform);
        *self = NodeOffsets::default();
        // keep the allocation for the next frame
        self.deform = deform;
        self.deform.clear();
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub enabled: bool,
    pub zsort: f32,
    pub transform: Transform,
    pub lock_to_root: bool,
    pub kind: NodeKind,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub offsets: NodeOffsets,
    /// World matrix from the last `update_world`.
    pub world: Affine,
    /// Absolute zsort from the last `update_world`.
    pub abs_zsort: f32,
}

impl Node {
    pub fn new(id: NodeId, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id,
            name: name.into(),
            enabled: true,
            zsort: 0.0,
            transform: Transform::default(),
            lock_to_root: false,
            kind,
            parent: None,
            children: Vec::new(),
            offsets: NodeOffsets::default(),
            world: Affine::IDENTITY,
            abs_zsort: 0.0,
        }
    }

    pub fn as_part(&self) -> Option<&Part> {
        match &self.kind {
            NodeKind::Part(p) => Some(p),
            _ => None,
        }
    }

    /// Local matrix with binding offsets applied.
    pub fn local_matrix(&self) -> Affine {
        let t = &self.transform;
        let o = &self.offsets;
        Affine::from_trs(
            Vec2::new(t.translation[0], t.translation[1]) + o.translation,
            t.rotation[2] + o.rotation,
            Vec2::new(t.scale[0] * o.scale.x, t.scale[1] * o.scale.y),
        )
    }

    /// Mesh vertices with deform offsets applied, transformed into puppet space.
    pub fn world_vertices<'a>(&'a self, mesh: &'a Mesh) -> impl Iterator<Item = Vec2> + 'a {
        let deform = &self.offsets.deform;
        let world = self.world;
        mesh.verts.iter().enumerate().map(move |(i, v)| {
            let d = deform.get(i).copied().unwrap_or(Vec2::ZERO);
            world.apply(*v + d)
        })
    }
}

/// Arena of nodes rooted at index 0.
#[derive(Clone, Debug, Default)]
pub struct NodeTree {
    nodes: Vec<Node>,
    index: HashMap<NodeId, usize>,
}

impl NodeTree {
    /// Build from nodes in pre-order whose `parent` links are already set.
    /// Callers guarantee uuids are unique and index 0 is the root.
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        let index = nodes.iter().enumerate().map(|(i, n)| (n.id, i)).collect();
        Self { nodes, index }
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn get(&self, idx: usize) -> Option<&Node> {
        self.nodes.get(idx)
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn find(&self, id: NodeId) -> Option<&Node> {
        self.index_of(id).map(|i| &self.nodes[i])
    }

    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.index_of(id).map(move |i| &mut self.nodes[i])
    }

    pub fn reset_offsets(&mut self) {
        for n in &mut self.nodes {
            n.offsets.reset();
        }
    }

    /// Recompute world matrices and absolute zsort. Parents precede children in the arena.
    pub fn update_world(&mut self) {
        let root_world = match self.nodes.first() {
            Some(root) => root.local_matrix(),
            None => return,
        };
        for i in 0..self.nodes.len() {
            let local = self.nodes[i].local_matrix();
            let zsort = self.nodes[i].zsort + self.nodes[i].offsets.zsort;
            let (world, abs_zsort) = match self.nodes[i].parent {
                None => (local, zsort),
                Some(_) if self.nodes[i].lock_to_root => (root_world.then(&local), zsort),
                Some(p) => {
                    let parent = &self.nodes[p];
                    (parent.world.then(&local), parent.abs_zsort + zsort)
                }
            };
            let node = &mut self.nodes[i];
            node.world = world;
            node.abs_zsort = abs_zsort;
        }
    }

    /// Whether the node and every ancestor are enabled.
    pub fn is_effectively_enabled(&self, mut idx: usize) -> bool {
        loop {
            let node = &self.nodes[idx];
            if !node.enabled {
                return false;
            }
            match node.parent {
                Some(p) => idx = p,
                None => return true,
            }
        }
    }

    /// Drawables below `scope` in draw order (back to front, highest zsort first).
    ///
    /// Parts are collected together with their part/group descendants; a composite
    /// is collected as a single unit and its children are not included. Disabled
    /// subtrees are skipped.
    pub fn drawables(&self, scope: usize) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect_drawables(scope, &mut out);
        out.sort_by(|a, b| {
            self.nodes[*b]
                .abs_zsort
                .partial_cmp(&self.nodes[*a].abs_zsort)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        out
    }

    fn collect_drawables(&self, idx: usize, out: &mut Vec<usize>) {
        for &child in &self.nodes[idx].children {
            let node = &self.nodes[child];
            if !node.enabled {
                continue;
            }
            match node.kind {
                NodeKind::Composite(_) => out.push(child),
                NodeKind::Part(_) => {
                    out.push(child);
                    self.collect_drawables(child, out);
                }
                _ => self.collect_drawables(child, out),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> NodeTree {
        let mut root = Node::new(NodeId(0), "root", NodeKind::Group);
        root.children = vec![1];
        let mut child = Node::new(NodeId(1), "child", NodeKind::Group);
        child.parent = Some(0);
        child.transform.translation = [5.0, 0.0, 0.0];
        child.zsort = -1.0;
        NodeTree::from_nodes(vec![root, child])
    }

    #[test]
    fn world_includes_offsets() {
        let mut t = tree();
        t.nodes_mut()[0].offsets.translation = Vec2::new(1.0, 2.0);
        t.update_world();
        assert_eq!(t.nodes()[1].world.translation(), Vec2::new(6.0, 2.0));
        assert_eq!(t.nodes()[1].abs_zsort, -1.0);
    }

    #[test]
    fn world_vertices_apply_deform_then_world() {
        let mut t = tree();
        t.nodes_mut()[1].offsets.deform = vec![Vec2::new(0.0, 1.0)];
        t.update_world();
        let mesh = Mesh {
            verts: vec![Vec2::ZERO, Vec2::new(1.0, 0.0)],
            ..Mesh::default()
        };
        let out: Vec<Vec2> = t.nodes()[1].world_vertices(&mesh).collect();
        assert_eq!(out, vec![Vec2::new(5.0, 1.0), Vec2::new(6.0, 0.0)]);
    }

    #[test]
    fn disabled_parent_disables_child() {
        let mut t = tree();
        assert!(t.is_effectively_enabled(1));
        t.nodes_mut()[0].enabled = false;
        assert!(!t.is_effectively_enabled(1));
    }
}
