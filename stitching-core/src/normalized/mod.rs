//! The normalized field model.
//!
//! A normalized field is a selection that has already been flattened and resolved against the
//! schemas by the query normalizer: fragments are gone, every field instance knows the concrete
//! backend object types it applies to, and argument values are coerced. The execution core only
//! ever reads this model.

use std::fmt;
use std::sync::Arc;
use std::sync::Weak;

use apollo_compiler::Name;
use indexmap::IndexMap;
use indexmap::IndexSet;

mod input_value;

pub use input_value::InputValue;
pub use input_value::NormalizedInputValue;

/// A field of a normalized operation.
///
/// Children are owned through [`Arc`]s while the parent link is a [`Weak`] reference, so the tree
/// is acyclic in terms of ownership and a field can be shared between threads.
pub struct NormalizedField {
    field_name: Name,
    alias: Option<Name>,
    object_type_names: IndexSet<Name>,
    arguments: IndexMap<Name, NormalizedInputValue>,
    children: Vec<Arc<NormalizedField>>,
    parent: Weak<NormalizedField>,
    synthetic: bool,
}

impl NormalizedField {
    pub fn builder(field_name: Name) -> NormalizedFieldBuilder {
        NormalizedFieldBuilder {
            field_name,
            alias: None,
            object_type_names: IndexSet::default(),
            arguments: IndexMap::default(),
            children: Vec::new(),
            synthetic: false,
        }
    }

    pub fn field_name(&self) -> &Name {
        &self.field_name
    }

    pub fn alias(&self) -> Option<&Name> {
        self.alias.as_ref()
    }

    /// The key under which this field appears in a response: its alias, or else its name.
    pub fn result_key(&self) -> &Name {
        self.alias.as_ref().unwrap_or(&self.field_name)
    }

    /// The concrete object types of the backend schema this field instance applies to.
    pub fn object_type_names(&self) -> &IndexSet<Name> {
        &self.object_type_names
    }

    pub fn applies_to(&self, type_name: &str) -> bool {
        self.object_type_names.contains(type_name)
    }

    pub fn arguments(&self) -> &IndexMap<Name, NormalizedInputValue> {
        &self.arguments
    }

    pub fn children(&self) -> &[Arc<NormalizedField>] {
        &self.children
    }

    /// Children of this field that apply to the given concrete parent type.
    pub fn children_for_type<'a>(
        &'a self,
        type_name: &'a str,
    ) -> impl Iterator<Item = &'a Arc<NormalizedField>> + 'a {
        self.children
            .iter()
            .filter(move |child| child.applies_to(type_name))
    }

    pub fn parent(&self) -> Option<Arc<NormalizedField>> {
        self.parent.upgrade()
    }

    pub fn is_top_level(&self) -> bool {
        self.parent.upgrade().is_none()
    }

    /// Whether the gateway added this field itself, rather than the client requesting it.
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    /// The response keys from the top-level field down to this one.
    pub fn query_path(&self) -> Vec<Name> {
        let mut path = vec![self.result_key().clone()];
        let mut current = self.parent();
        while let Some(field) = current {
            path.push(field.result_key().clone());
            current = field.parent();
        }
        path.reverse();
        path
    }
}

impl fmt::Debug for NormalizedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizedField")
            .field("field_name", &self.field_name)
            .field("alias", &self.alias)
            .field("object_type_names", &self.object_type_names)
            .field("arguments", &self.arguments)
            .field("children", &self.children)
            .field("synthetic", &self.synthetic)
            .finish()
    }
}

/// Builds a [`NormalizedField`] tree, wiring up the parent links.
#[derive(Debug, Clone)]
pub struct NormalizedFieldBuilder {
    field_name: Name,
    alias: Option<Name>,
    object_type_names: IndexSet<Name>,
    arguments: IndexMap<Name, NormalizedInputValue>,
    children: Vec<NormalizedFieldBuilder>,
    synthetic: bool,
}

impl NormalizedFieldBuilder {
    pub fn alias(mut self, alias: Name) -> Self {
        self.alias = Some(alias);
        self
    }

    pub fn object_type(mut self, type_name: Name) -> Self {
        self.object_type_names.insert(type_name);
        self
    }

    pub fn object_types(mut self, type_names: impl IntoIterator<Item = Name>) -> Self {
        self.object_type_names.extend(type_names);
        self
    }

    pub fn argument(mut self, name: Name, value: NormalizedInputValue) -> Self {
        self.arguments.insert(name, value);
        self
    }

    pub fn child(mut self, child: NormalizedFieldBuilder) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = NormalizedFieldBuilder>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn synthetic(mut self, synthetic: bool) -> Self {
        self.synthetic = synthetic;
        self
    }

    /// Builds a top-level field.
    pub fn build(self) -> Arc<NormalizedField> {
        self.build_with_parent(Weak::new())
    }

    fn build_with_parent(self, parent: Weak<NormalizedField>) -> Arc<NormalizedField> {
        let Self {
            field_name,
            alias,
            object_type_names,
            arguments,
            children,
            synthetic,
        } = self;
        Arc::new_cyclic(|this| NormalizedField {
            field_name,
            alias,
            object_type_names,
            arguments,
            children: children
                .into_iter()
                .map(|child| child.build_with_parent(this.clone()))
                .collect(),
            parent,
            synthetic,
        })
    }
}
