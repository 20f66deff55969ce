//! Field trees
//!
//! A `FieldTree` is the compiled shape of a schema: an ordered mapping from
//! field name to a type node, a nested tree, or an array of either. Its
//! shape is fixed once compiled.

use settee_core::{FieldPath, PathSegment};

use crate::node::{FieldOptions, TypeNode};

/// One entry of a field tree
#[derive(Debug, Clone)]
pub enum FieldNode {
    /// Single field
    Leaf(TypeNode),
    /// Nested object
    Tree(FieldTree),
    /// Array of the wrapped node
    ArrayOf(Box<FieldNode>),
}

impl FieldNode {
    /// Type node, if this is a leaf
    pub fn as_leaf(&self) -> Option<&TypeNode> {
        match self {
            FieldNode::Leaf(node) => Some(node),
            _ => None,
        }
    }

    /// Element node, if this is an array
    pub fn element(&self) -> Option<&FieldNode> {
        match self {
            FieldNode::ArrayOf(inner) => Some(inner.as_ref()),
            _ => None,
        }
    }

    /// Options that govern assignment of the whole field
    ///
    /// For arrays of scalars or references these are the element's
    /// options: an array's default, readonly flag and so on are declared on
    /// its element.
    pub fn field_options(&self) -> Option<&FieldOptions> {
        match self {
            FieldNode::Leaf(node) => Some(&node.options),
            FieldNode::ArrayOf(inner) => inner.as_leaf().map(|n| &n.options),
            FieldNode::Tree(_) => None,
        }
    }
}

/// Ordered mapping from field name to node
#[derive(Debug, Clone, Default)]
pub struct FieldTree {
    fields: Vec<(String, FieldNode)>,
}

impl FieldTree {
    /// Empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, replacing any existing field of the same name
    pub fn insert(&mut self, name: impl Into<String>, node: FieldNode) {
        let name = name.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = node,
            None => self.fields.push((name, node)),
        }
    }

    /// Node of the direct child `name`
    pub fn get(&self, name: &str) -> Option<&FieldNode> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, n)| n)
    }

    /// Whether `name` is a direct child
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Fields in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldNode)> {
        self.fields.iter().map(|(k, n)| (k.as_str(), n))
    }

    /// Number of direct children
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the tree has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Node addressed by `path`
    ///
    /// Index segments step into array elements. A key segment directly
    /// after an array of objects also steps into the element, so schema
    /// paths such as `comments.author` resolve without indices.
    pub fn resolve(&self, path: &FieldPath) -> Option<&FieldNode> {
        let mut segments = path.segments().iter();
        let mut current = match segments.next()? {
            PathSegment::Key(k) => self.get(k)?,
            PathSegment::Index(_) => return None,
        };
        for segment in segments {
            current = match (segment, current) {
                (PathSegment::Index(_), FieldNode::ArrayOf(inner)) => inner.as_ref(),
                (PathSegment::Key(k), FieldNode::Tree(tree)) => tree.get(k)?,
                (PathSegment::Key(k), FieldNode::ArrayOf(inner)) => match inner.as_ref() {
                    FieldNode::Tree(tree) => tree.get(k)?,
                    _ => return None,
                },
                _ => return None,
            };
        }
        Some(current)
    }

    /// Type node addressed by `path`, if it is a leaf
    pub fn leaf(&self, path: &FieldPath) -> Option<&TypeNode> {
        self.resolve(path).and_then(FieldNode::as_leaf)
    }

    /// Paths of every leaf, depth first in declaration order
    ///
    /// Array elements are addressed without indices.
    pub fn leaf_paths(&self) -> Vec<FieldPath> {
        let mut out = Vec::new();
        collect_leaves(self, &FieldPath::root(), &mut out);
        out
    }
}

fn collect_leaves(tree: &FieldTree, base: &FieldPath, out: &mut Vec<FieldPath>) {
    for (name, node) in tree.iter() {
        let path = base.clone().key(name);
        collect_node(node, path, out);
    }
}

fn collect_node(node: &FieldNode, path: FieldPath, out: &mut Vec<FieldPath>) {
    match node {
        FieldNode::Leaf(_) => out.push(path),
        FieldNode::Tree(tree) => collect_leaves(tree, &path, out),
        FieldNode::ArrayOf(inner) => collect_node(inner, path, out),
    }
}
