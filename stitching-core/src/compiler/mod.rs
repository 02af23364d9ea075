//! Compilation of normalized fields into backend documents.
//!
//! The compiler walks a normalized field tree and produces, for one backend service, the
//! operation to send to it: an AST selection set plus the variables extracted from argument values.
//!
//! ## Conditional fields
//! A normalized field instance applies to a set of concrete object types. When that set is exactly
//! the declared type of the enclosing selection, the field is emitted directly. Otherwise it is
//! *conditional*, and one instance of it is emitted per concrete type inside an inline fragment.
//! Conditional instances are grouped across all sibling fields, so a selection level contains at
//! most one inline fragment per type, in the order the types were first seen.

use std::fmt;
use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::ast::OperationType;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::instrument;

use crate::configuration::CompilerConfig;
use crate::error::StitchingError;
use crate::json_ext::Object;
use crate::normalized::NormalizedField;

mod arguments;
#[cfg(test)]
mod tests;
mod variables;

use arguments::translate_arguments;
pub use variables::ExtractAll;
pub use variables::InlineAll;
use variables::VariableAccumulator;
pub use variables::VariablePredicate;

/// An operation ready to be sent to one backend service.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledOperation {
    operation_type: OperationType,
    name: Option<Name>,
    selection_set: Vec<ast::Selection>,
    variable_definitions: Vec<Node<ast::VariableDefinition>>,
    variables: Object,
}

impl CompiledOperation {
    pub fn operation_type(&self) -> OperationType {
        self.operation_type
    }

    pub fn name(&self) -> Option<&Name> {
        self.name.as_ref()
    }

    pub fn selection_set(&self) -> &[ast::Selection] {
        &self.selection_set
    }

    pub fn variable_definitions(&self) -> &[Node<ast::VariableDefinition>] {
        &self.variable_definitions
    }

    /// The values of the extracted variables, keyed by variable name.
    pub fn variables(&self) -> &Object {
        &self.variables
    }

    pub fn to_operation_definition(&self) -> ast::OperationDefinition {
        ast::OperationDefinition {
            operation_type: self.operation_type,
            name: self.name.clone(),
            variables: self.variable_definitions.clone(),
            directives: Default::default(),
            selection_set: self.selection_set.clone(),
        }
    }

    pub fn to_document(&self) -> ast::Document {
        let mut document = ast::Document::new();
        document
            .definitions
            .push(ast::Definition::OperationDefinition(Node::new(
                self.to_operation_definition(),
            )));
        document
    }

    /// The body of the request sending this operation.
    pub fn to_request(&self) -> SubgraphRequest {
        SubgraphRequest {
            query: self.to_document().serialize().no_indent().to_string(),
            operation_name: self.name.as_ref().map(|name| name.to_string()),
            variables: self.variables.clone(),
        }
    }
}

impl fmt::Display for CompiledOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_document(), f)
    }
}

/// A GraphQL request as sent to a backend service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(skip_serializing_if = "Object::is_empty")]
    pub variables: Object,
}

/// Compiles normalized fields into [`CompiledOperation`]s.
#[derive(Debug, Clone, Default)]
pub struct OperationCompiler {
    config: CompilerConfig,
}

impl OperationCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    /// Compiles `fields`, the top-level fields of an operation against the backend `schema`.
    ///
    /// # Errors
    /// Returns an error if a field has no concrete object type, if a field with a selection does
    /// not exist on one of its object types, or if an extracted value cannot be sent as JSON.
    #[instrument(skip_all, level = "debug", name = "compile_operation")]
    pub fn compile(
        &self,
        schema: &Schema,
        fields: &[Arc<NormalizedField>],
        operation_type: OperationType,
        operation_name: Option<Name>,
        predicate: &dyn VariablePredicate,
    ) -> Result<CompiledOperation, StitchingError> {
        let Some(root_type) = schema.root_operation(operation_type) else {
            return Err(StitchingError::MissingRootType {
                operation_type: operation_type_name(operation_type),
            });
        };
        let mut accumulator = VariableAccumulator::new(predicate, &self.config.variable_prefix);
        let selection_set = compile_selection_set(schema, root_type, fields, &mut accumulator)?;
        let (variable_definitions, variables) = accumulator.finish();
        tracing::debug!(
            top_level_fields = fields.len(),
            variables = variable_definitions.len(),
            "compiled operation"
        );
        Ok(CompiledOperation {
            operation_type,
            name: operation_name,
            selection_set,
            variable_definitions,
            variables,
        })
    }
}

/// Compiles `fields` with the default compiler configuration.
pub fn compile(
    schema: &Schema,
    fields: &[Arc<NormalizedField>],
    operation_type: OperationType,
    operation_name: Option<Name>,
    predicate: &dyn VariablePredicate,
) -> Result<CompiledOperation, StitchingError> {
    OperationCompiler::default().compile(schema, fields, operation_type, operation_name, predicate)
}

fn compile_selection_set(
    schema: &Schema,
    parent_type: &Name,
    fields: &[Arc<NormalizedField>],
    accumulator: &mut VariableAccumulator<'_>,
) -> Result<Vec<ast::Selection>, StitchingError> {
    let mut selections = Vec::with_capacity(fields.len());
    let mut conditional: IndexMap<Name, Vec<ast::Selection>> = IndexMap::new();

    for field in fields {
        if field.object_type_names().is_empty() {
            tracing::error!(field = %field.field_name(), "normalized field has no object types");
            return Err(StitchingError::EmptyObjectTypeNames {
                field_name: field.field_name().clone(),
            });
        }
        // Set membership rather than "the" type name: the order of the type set is irrelevant.
        let is_conditional =
            field.object_type_names().len() > 1 || !field.applies_to(parent_type);
        let arguments = translate_arguments(field, accumulator)?;

        for type_name in field.object_type_names() {
            let selection = ast::Selection::Field(Node::new(ast::Field {
                alias: field.alias().cloned(),
                name: field.field_name().clone(),
                arguments: arguments.clone(),
                directives: Default::default(),
                selection_set: compile_field_selection_set(schema, field, type_name, accumulator)?,
            }));
            if is_conditional {
                tracing::trace!(field = %field.result_key(), %type_name, "conditional field");
                conditional
                    .entry(type_name.clone())
                    .or_default()
                    .push(selection);
            } else {
                selections.push(selection);
            }
        }
    }

    selections.extend(conditional.into_iter().map(|(type_name, selection_set)| {
        ast::Selection::InlineFragment(Node::new(ast::InlineFragment {
            type_condition: Some(type_name),
            directives: Default::default(),
            selection_set,
        }))
    }));
    Ok(selections)
}

/// Compiles the children of `field`, for the instance of `field` on the object type `type_name`.
fn compile_field_selection_set(
    schema: &Schema,
    field: &NormalizedField,
    type_name: &Name,
    accumulator: &mut VariableAccumulator<'_>,
) -> Result<Vec<ast::Selection>, StitchingError> {
    if field.children().is_empty() {
        return Ok(Vec::new());
    }
    let definition = schema
        .type_field(type_name, field.field_name())
        .map_err(|_| {
            tracing::error!(%type_name, field = %field.field_name(), "field not found in the backend schema");
            StitchingError::UnknownField {
                type_name: type_name.clone(),
                field_name: field.field_name().clone(),
            }
        })?;
    compile_selection_set(
        schema,
        definition.ty.inner_named_type(),
        field.children(),
        accumulator,
    )
}

pub(crate) const fn operation_type_name(operation_type: OperationType) -> &'static str {
    match operation_type {
        OperationType::Query => "query",
        OperationType::Mutation => "mutation",
        OperationType::Subscription => "subscription",
    }
}
