//! Minimal syntax tree consumed by the designation builder.
//!
//! Parsing is not part of this workspace; the tree only records the node
//! kinds and parent links needed to decide whether a declaration can be
//! resolved on its own or must be promoted to a container.

use crate::Span;

/// Index of a node inside a unit's [`SyntaxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SyntaxNodeId(u32);

impl SyntaxNodeId {
    pub const ROOT: SyntaxNodeId = SyntaxNodeId(0);

    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Syntactic category of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    File,
    Class,
    /// Anonymous object literal.
    Object,
    TypeAlias,
    Function,
    /// Lambda / anonymous function literal.
    FunctionLiteral,
    PrimaryConstructor,
    SecondaryConstructor,
    Property,
    Accessor,
    /// Value parameter; `val_or_var` marks constructor properties.
    Parameter { val_or_var: bool },
    TypeParameter,
    EnumEntry,
    DestructuringEntry,
    /// Anonymous initializer block of a class.
    Initializer,
    /// Executable code: a body or an initializer expression. Everything
    /// below a block is local.
    Block,
}

impl NodeKind {
    /// Classes and objects own a class body.
    pub fn is_class_like(self) -> bool {
        matches!(self, NodeKind::Class | NodeKind::Object)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    pub parent: Option<SyntaxNodeId>,
    pub span: Span,
}

/// The syntax tree of one file. Node 0 is always the file node.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    nodes: Vec<SyntaxNode>,
}

impl SyntaxTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![SyntaxNode {
                kind: NodeKind::File,
                parent: None,
                span: Span::default(),
            }],
        }
    }

    /// Append a node and return its id.
    pub fn push(&mut self, kind: NodeKind, parent: SyntaxNodeId, span: Span) -> SyntaxNodeId {
        let id = SyntaxNodeId::new(self.nodes.len() as u32);
        self.nodes.push(SyntaxNode {
            kind,
            parent: Some(parent),
            span,
        });
        id
    }

    pub fn node(&self, id: SyntaxNodeId) -> &SyntaxNode {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: SyntaxNodeId) -> NodeKind {
        self.node(id).kind
    }

    pub fn parent(&self, id: SyntaxNodeId) -> Option<SyntaxNodeId> {
        self.node(id).parent
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: SyntaxNodeId) -> impl Iterator<Item = SyntaxNodeId> + '_ {
        std::iter::successors(self.parent(id), move |node| self.parent(*node))
    }

    /// A node is local when any ancestor is executable code.
    pub fn is_local(&self, id: SyntaxNodeId) -> bool {
        self.ancestors(id)
            .any(|node| self.kind(node) == NodeKind::Block)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for SyntaxTree {
    fn default() -> Self {
        Self::new()
    }
}
