//! The assembled result tree.
//!
//! Results from the backend services are assembled into an immutable tree of [`ResultNode`]s.
//! Nodes are never edited in place: every `with_*` method returns a new node, and the children
//! and errors of the original are shared (not copied) with the new node when they are unaffected.
//! Subtrees assembled concurrently from different services therefore never observe each other.

use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::ast;

use crate::error::StitchingError;
use crate::graphql;
use crate::json_ext::Path;
use crate::json_ext::Value;
use crate::normalized::NormalizedField;

pub mod assembly;
pub mod complexity;
pub mod render;

/// Metadata about the field a result node was produced for.
#[derive(Debug, Clone)]
pub struct StepInfo {
    field: Arc<NormalizedField>,
    parent_type: Name,
    declared_type: ast::Type,
}

impl StepInfo {
    pub fn new(field: Arc<NormalizedField>, parent_type: Name, declared_type: ast::Type) -> Self {
        Self {
            field,
            parent_type,
            declared_type,
        }
    }

    pub fn field(&self) -> &Arc<NormalizedField> {
        &self.field
    }

    /// The concrete object type the field was selected on.
    pub fn parent_type(&self) -> &Name {
        &self.parent_type
    }

    /// The type of the field, as declared in the backend schema.
    pub fn declared_type(&self) -> &ast::Type {
        &self.declared_type
    }

    pub fn is_synthetic(&self) -> bool {
        self.field.is_synthetic()
    }
}

/// The variant of a [`ResultNode`], with its variant-specific data.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultNodeKind {
    /// The entry of the tree. Unique, with the empty path and no step.
    Root,
    /// An object whose children are its fields.
    Object,
    /// A list whose children are its items.
    List,
    /// A scalar or enum value, or `null`.
    Leaf { value: Value },
    /// An object whose concrete type, and so whose children, are not known yet.
    UnresolvedObject { value: Value },
    /// A placeholder for a field resolved by a secondary (hydration) fetch, holding its input.
    HydrationInput { value: Value },
}

impl ResultNodeKind {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Root => "Root",
            Self::Object => "Object",
            Self::List => "List",
            Self::Leaf { .. } => "Leaf",
            Self::UnresolvedObject { .. } => "UnresolvedObject",
            Self::HydrationInput { .. } => "HydrationInput",
        }
    }
}

/// A node of the result tree.
///
/// Cloning a node is cheap: children and errors are reference counted.
#[derive(Debug, Clone)]
pub struct ResultNode {
    kind: ResultNodeKind,
    path: Path,
    step: Option<Arc<StepInfo>>,
    children: Arc<[ResultNode]>,
    errors: Arc<[graphql::Error]>,
}

impl ResultNode {
    /// The root of a result tree, always at the empty path.
    ///
    /// # Errors
    /// A root cannot be the child of another node.
    pub fn root(children: impl IntoIterator<Item = ResultNode>) -> Result<Self, StitchingError> {
        Ok(Self {
            kind: ResultNodeKind::Root,
            path: Path::empty(),
            step: None,
            children: collect_children(children)?,
            errors: Vec::new().into(),
        })
    }

    /// # Errors
    /// A root cannot be the child of another node.
    pub fn object(
        path: Path,
        step: Arc<StepInfo>,
        children: impl IntoIterator<Item = ResultNode>,
    ) -> Result<Self, StitchingError> {
        Self::with_kind(ResultNodeKind::Object, path, step).with_children(children)
    }

    /// # Errors
    /// A root cannot be an item of a list.
    pub fn list(
        path: Path,
        step: Arc<StepInfo>,
        items: impl IntoIterator<Item = ResultNode>,
    ) -> Result<Self, StitchingError> {
        Self::with_kind(ResultNodeKind::List, path, step).with_children(items)
    }

    pub fn leaf(path: Path, step: Arc<StepInfo>, value: Value) -> Self {
        Self::with_kind(ResultNodeKind::Leaf { value }, path, step)
    }

    pub fn unresolved_object(path: Path, step: Arc<StepInfo>, value: Value) -> Self {
        Self::with_kind(ResultNodeKind::UnresolvedObject { value }, path, step)
    }

    pub fn hydration_input(path: Path, step: Arc<StepInfo>, value: Value) -> Self {
        Self::with_kind(ResultNodeKind::HydrationInput { value }, path, step)
    }

    fn with_kind(kind: ResultNodeKind, path: Path, step: Arc<StepInfo>) -> Self {
        Self {
            kind,
            path,
            step: Some(step),
            children: Vec::new().into(),
            errors: Vec::new().into(),
        }
    }

    pub fn kind(&self) -> &ResultNodeKind {
        &self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The step this node was produced for; `None` only for the root.
    pub fn step(&self) -> Option<&Arc<StepInfo>> {
        self.step.as_ref()
    }

    pub fn children(&self) -> &[ResultNode] {
        &self.children
    }

    /// The errors attached to this node (not to its descendants).
    pub fn errors(&self) -> &[graphql::Error] {
        &self.errors
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, ResultNodeKind::Root)
    }

    /// The value held by a leaf, unresolved object or hydration input.
    pub fn resolved_value(&self) -> Option<&Value> {
        match &self.kind {
            ResultNodeKind::Leaf { value }
            | ResultNodeKind::UnresolvedObject { value }
            | ResultNodeKind::HydrationInput { value } => Some(value),
            ResultNodeKind::Root | ResultNodeKind::Object | ResultNodeKind::List => None,
        }
    }

    /// Whether this node waits for a secondary fetch: a hydration input, or a non-empty list of
    /// hydration inputs only.
    pub fn is_pending_hydration(&self) -> bool {
        match self.kind {
            ResultNodeKind::HydrationInput { .. } => true,
            ResultNodeKind::List => {
                !self.children.is_empty()
                    && self
                        .children
                        .iter()
                        .all(|child| matches!(child.kind, ResultNodeKind::HydrationInput { .. }))
            }
            _ => false,
        }
    }

    /// Returns a copy of this node with other children.
    ///
    /// # Errors
    /// Leaves cannot have children, and a root cannot be a child.
    pub fn with_children(
        &self,
        children: impl IntoIterator<Item = ResultNode>,
    ) -> Result<Self, StitchingError> {
        let children = collect_children(children)?;
        if matches!(self.kind, ResultNodeKind::Leaf { .. }) && !children.is_empty() {
            tracing::error!(path = %self.path, "attempted to add children to a leaf");
            return Err(StitchingError::LeafChildren {
                path: self.path.clone(),
            });
        }
        Ok(Self {
            children,
            ..self.clone()
        })
    }

    /// Returns a copy of this node with other errors.
    pub fn with_errors(&self, errors: impl IntoIterator<Item = graphql::Error>) -> Self {
        Self {
            errors: errors.into_iter().collect(),
            ..self.clone()
        }
    }

    /// Returns a copy of this node with `errors` attached after its existing errors.
    pub fn with_additional_errors(&self, errors: impl IntoIterator<Item = graphql::Error>) -> Self {
        self.with_errors(self.errors.iter().cloned().chain(errors))
    }

    /// Returns a copy of this node holding another value.
    ///
    /// # Errors
    /// Only leaves, unresolved objects and hydration inputs hold a value.
    pub fn with_resolved_value(&self, value: Value) -> Result<Self, StitchingError> {
        let kind = match self.kind {
            ResultNodeKind::Leaf { .. } => ResultNodeKind::Leaf { value },
            ResultNodeKind::UnresolvedObject { .. } => ResultNodeKind::UnresolvedObject { value },
            ResultNodeKind::HydrationInput { .. } => ResultNodeKind::HydrationInput { value },
            ResultNodeKind::Root | ResultNodeKind::Object | ResultNodeKind::List => {
                tracing::error!(path = %self.path, variant = self.kind.name(), "no resolved value");
                return Err(StitchingError::NoResolvedValue {
                    variant: self.kind.name(),
                });
            }
        };
        Ok(Self {
            kind,
            ..self.clone()
        })
    }

    /// Returns a copy of this node at another path. Descendants keep their paths.
    ///
    /// # Errors
    /// The root can only be at the empty path.
    pub fn with_path(&self, path: Path) -> Result<Self, StitchingError> {
        if self.is_root() && !path.is_empty() {
            tracing::error!(%path, "attempted to move the root result node");
            return Err(StitchingError::RootPath { path });
        }
        Ok(Self {
            path,
            ..self.clone()
        })
    }

    /// Returns a copy of this tree where the node at `path` is replaced by `node`.
    ///
    /// Only the ancestors of the replaced node are copied; every other subtree is shared.
    ///
    /// # Errors
    /// Fails if no node of this tree is at `path`, if `node` is not at `path`, or if the
    /// replacement would move the root or nest another one.
    pub fn replace_at(&self, path: &Path, node: ResultNode) -> Result<Self, StitchingError> {
        if node.path() != path {
            tracing::error!(%path, replacement = %node.path(), "replacement at another path");
            return Err(StitchingError::ReplacementPath {
                path: path.clone(),
                replacement: node.path().clone(),
            });
        }
        match (path.is_empty(), node.is_root()) {
            (true, false) => return Err(StitchingError::RootReplacement),
            (false, true) => return Err(StitchingError::NestedRoot { path: path.clone() }),
            _ => {}
        }
        self.replace_descendant(path, node)
    }

    fn replace_descendant(&self, path: &Path, node: ResultNode) -> Result<Self, StitchingError> {
        if &self.path == path {
            return Ok(node);
        }
        let Some(index) = self
            .children
            .iter()
            .position(|child| path.starts_with(&child.path))
        else {
            return Err(StitchingError::PathNotFound { path: path.clone() });
        };
        let replaced = self.children[index].replace_descendant(path, node)?;
        let children = self
            .children
            .iter()
            .enumerate()
            .map(|(i, child)| if i == index { replaced.clone() } else { child.clone() });
        self.with_children(children)
    }

    /// The node of this tree at `path`, if any.
    pub fn find(&self, path: &Path) -> Option<&ResultNode> {
        if &self.path == path {
            return Some(self);
        }
        self.children
            .iter()
            .find(|child| path.starts_with(&child.path))
            .and_then(|child| child.find(path))
    }

    /// This node and all of its descendants, depth first, parents before children.
    pub fn descendants(&self) -> impl Iterator<Item = &ResultNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    /// The number of nodes of this subtree, this node included.
    pub fn node_count(&self) -> usize {
        self.descendants().count()
    }

    /// The errors of this subtree, depth first.
    pub fn all_errors(&self) -> impl Iterator<Item = &graphql::Error> {
        self.descendants().flat_map(|node| node.errors.iter())
    }

    /// Whether `other` is this very node, sharing its children and errors.
    pub fn ptr_eq(&self, other: &ResultNode) -> bool {
        Arc::ptr_eq(&self.children, &other.children) && Arc::ptr_eq(&self.errors, &other.errors)
    }
}

fn collect_children(
    children: impl IntoIterator<Item = ResultNode>,
) -> Result<Arc<[ResultNode]>, StitchingError> {
    let children: Arc<[ResultNode]> = children.into_iter().collect();
    if let Some(root) = children.iter().find(|child| child.is_root()) {
        tracing::error!(path = %root.path, "attempted to nest a root result node");
        return Err(StitchingError::NestedRoot {
            path: root.path.clone(),
        });
    }
    Ok(children)
}
