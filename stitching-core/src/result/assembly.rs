//! Assembly of raw backend responses into result subtrees.
//!
//! The response of one service call is walked along the normalized fields that were compiled into
//! its operation. Every field yields a [`ResultNode`]; backend errors are attached to the node at
//! their path, or to the closest node above it.

use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::ty;

use super::ResultNode;
use super::StepInfo;
use crate::error::FetchError;
use crate::error::StitchingError;
use crate::graphql;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;
use crate::normalized::NormalizedField;

const TYPENAME: &str = "__typename";

/// Decides whether a field is resolved by a secondary (hydration) fetch.
///
/// The value returned by the backend for such a field is only the input of that fetch, so it is
/// kept as a [`super::ResultNodeKind::HydrationInput`] placeholder.
pub trait HydrationPredicate: Send + Sync {
    fn is_hydrated(&self, field: &NormalizedField) -> bool;
}

impl<F> HydrationPredicate for F
where
    F: Fn(&NormalizedField) -> bool + Send + Sync,
{
    fn is_hydrated(&self, field: &NormalizedField) -> bool {
        self(field)
    }
}

/// No field is hydrated.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHydration;

impl HydrationPredicate for NoHydration {
    fn is_hydrated(&self, _: &NormalizedField) -> bool {
        false
    }
}

/// The subtrees assembled from one service call.
#[derive(Debug, Clone)]
pub struct AssembledResult {
    /// One node per top-level field of the call, in field order.
    pub nodes: Vec<ResultNode>,
    /// The number of nodes of all the subtrees.
    pub node_count: usize,
    /// Errors that could not be attached to any node, because the call has no top-level field.
    pub unattached_errors: Vec<graphql::Error>,
}

/// Assembles the responses of one backend service.
pub struct ResultAssembler<'a> {
    schema: &'a Schema,
    service: &'a str,
    hydration: &'a dyn HydrationPredicate,
}

impl<'a> ResultAssembler<'a> {
    pub fn new(schema: &'a Schema, service: &'a str) -> Self {
        Self {
            schema,
            service,
            hydration: &NoHydration,
        }
    }

    pub fn with_hydration(mut self, hydration: &'a dyn HydrationPredicate) -> Self {
        self.hydration = hydration;
        self
    }

    /// Assembles `data`, the response to the top-level `fields` selected on `root_type`.
    ///
    /// Values that do not match the schema are replaced by `null` and reported as errors on their
    /// node; they do not fail the assembly.
    ///
    /// # Errors
    /// Fails if a field does not exist in the backend schema.
    pub fn assemble(
        &self,
        root_type: &Name,
        fields: &[Arc<NormalizedField>],
        data: &Object,
        errors: Vec<graphql::Error>,
    ) -> Result<AssembledResult, StitchingError> {
        let nodes = fields
            .iter()
            .filter(|field| field.applies_to(root_type))
            .map(|field| {
                let key = field.result_key().as_str();
                let value = data.get(key).unwrap_or(&Value::Null);
                self.assemble_field(root_type, field, Path::empty().join(key), value)
            })
            .collect::<Result<Vec<_>, _>>()?;
        attach_errors(nodes, errors)
    }

    /// The subtrees of a call that failed as a whole: every top-level field is `null`, and carries
    /// `error`.
    pub fn failed(
        &self,
        root_type: &Name,
        fields: &[Arc<NormalizedField>],
        error: &FetchError,
    ) -> Result<AssembledResult, StitchingError> {
        let nodes = fields
            .iter()
            .filter(|field| field.applies_to(root_type))
            .map(|field| {
                let path = Path::empty().join(field.result_key().as_str());
                let step = self.step(root_type, field)?;
                Ok(ResultNode::leaf(path.clone(), step, Value::Null)
                    .with_errors([error.to_graphql_error(Some(path))]))
            })
            .collect::<Result<Vec<_>, StitchingError>>()?;
        Ok(AssembledResult {
            node_count: nodes.len(),
            nodes,
            unattached_errors: Vec::new(),
        })
    }

    pub(crate) fn step(
        &self,
        parent_type: &Name,
        field: &Arc<NormalizedField>,
    ) -> Result<Arc<StepInfo>, StitchingError> {
        let declared_type = if field.field_name().as_str() == TYPENAME {
            ty!(String!)
        } else {
            self.schema
                .type_field(parent_type, field.field_name())
                .map_err(|_| {
                    tracing::error!(
                        service = self.service,
                        %parent_type,
                        field = %field.field_name(),
                        "field not found in the backend schema"
                    );
                    StitchingError::UnknownField {
                        type_name: parent_type.clone(),
                        field_name: field.field_name().clone(),
                    }
                })?
                .ty
                .clone()
        };
        Ok(Arc::new(StepInfo::new(
            Arc::clone(field),
            parent_type.clone(),
            declared_type,
        )))
    }

    fn assemble_field(
        &self,
        parent_type: &Name,
        field: &Arc<NormalizedField>,
        path: Path,
        value: &Value,
    ) -> Result<ResultNode, StitchingError> {
        let step = self.step(parent_type, field)?;
        if self.hydration.is_hydrated(field) {
            return hydration_input(path, step, value);
        }
        let declared_type = step.declared_type().clone();
        self.assemble_value(field, &step, path, &declared_type, value)
    }

    fn assemble_value(
        &self,
        field: &NormalizedField,
        step: &Arc<StepInfo>,
        path: Path,
        ty: &ast::Type,
        value: &Value,
    ) -> Result<ResultNode, StitchingError> {
        match (ty, value) {
            (_, Value::Null) => Ok(ResultNode::leaf(path, Arc::clone(step), Value::Null)),
            (ast::Type::List(item_type) | ast::Type::NonNullList(item_type), Value::Array(items)) => {
                let items = items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| {
                        self.assemble_value(field, step, path.join(index), item_type, item)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                ResultNode::list(path, Arc::clone(step), items)
            }
            (ast::Type::List(_) | ast::Type::NonNullList(_), _) => {
                Ok(self.malformed(path, step, "expected a list"))
            }
            (ast::Type::Named(type_name) | ast::Type::NonNullNamed(type_name), _) => {
                self.assemble_named(field, step, path, type_name, value)
            }
        }
    }

    fn assemble_named(
        &self,
        field: &NormalizedField,
        step: &Arc<StepInfo>,
        path: Path,
        type_name: &Name,
        value: &Value,
    ) -> Result<ResultNode, StitchingError> {
        if matches!(
            self.schema.types.get(type_name),
            Some(ExtendedType::Scalar(_) | ExtendedType::Enum(_))
        ) {
            return Ok(ResultNode::leaf(path, Arc::clone(step), value.clone()));
        }
        let Value::Object(object) = value else {
            return Ok(self.malformed(path, step, "expected an object"));
        };

        let concrete_type = if self.schema.get_object(type_name).is_some() {
            Some(type_name.clone())
        } else {
            object
                .get(TYPENAME)
                .and_then(|typename| typename.as_str())
                .and_then(|typename| Name::new(typename).ok())
                .or_else(|| single_candidate_type(field))
        };
        let Some(concrete_type) = concrete_type else {
            tracing::trace!(%path, abstract_type = %type_name, "object type not determined");
            return Ok(ResultNode::unresolved_object(
                path,
                Arc::clone(step),
                value.clone(),
            ));
        };

        let children = field
            .children_for_type(&concrete_type)
            .map(|child| {
                let key = child.result_key().as_str();
                let value = object.get(key).unwrap_or(&Value::Null);
                self.assemble_field(&concrete_type, child, path.join(key), value)
            })
            .collect::<Result<Vec<_>, _>>()?;
        ResultNode::object(path, Arc::clone(step), children)
    }

    fn malformed(&self, path: Path, step: &Arc<StepInfo>, reason: &str) -> ResultNode {
        tracing::debug!(service = self.service, %path, reason, "malformed backend value");
        let error = FetchError::SubrequestMalformedResponse {
            service: self.service.to_string(),
            reason: reason.to_string(),
        };
        ResultNode::leaf(path.clone(), Arc::clone(step), Value::Null)
            .with_errors([error.to_graphql_error(Some(path))])
    }
}

/// When all the children of a field apply to the same single type, that is the only type the
/// object can have.
fn single_candidate_type(field: &NormalizedField) -> Option<Name> {
    let mut types = field
        .children()
        .iter()
        .flat_map(|child| child.object_type_names().iter());
    let first = types.next()?;
    types.all(|other| other == first).then(|| first.clone())
}

fn hydration_input(
    path: Path,
    step: Arc<StepInfo>,
    value: &Value,
) -> Result<ResultNode, StitchingError> {
    match value {
        Value::Array(items) => {
            let items: Vec<_> = items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    ResultNode::hydration_input(path.join(index), Arc::clone(&step), item.clone())
                })
                .collect();
            ResultNode::list(path, step, items)
        }
        _ => Ok(ResultNode::hydration_input(path, step, value.clone())),
    }
}

fn attach_errors(
    nodes: Vec<ResultNode>,
    errors: Vec<graphql::Error>,
) -> Result<AssembledResult, StitchingError> {
    let node_count = nodes.iter().map(ResultNode::node_count).sum();
    if nodes.is_empty() {
        return Ok(AssembledResult {
            nodes,
            node_count,
            unattached_errors: errors,
        });
    }

    let mut tree = ResultNode::root(nodes)?;
    for error in errors {
        let target = error
            .path
            .as_ref()
            .map(|path| closest_node(&tree, path).path().clone())
            .filter(|path| !path.is_empty())
            .unwrap_or_else(|| tree.children()[0].path().clone());
        let Some(node) = tree.find(&target) else {
            return Err(StitchingError::internal(format!(
                "error target '{target}' vanished from the result tree"
            )));
        };
        let node = node.with_additional_errors([error]);
        tree = tree.replace_at(&target, node)?;
    }
    Ok(AssembledResult {
        nodes: tree.children().to_vec(),
        node_count,
        unattached_errors: Vec::new(),
    })
}

/// The deepest node of `tree` at or above `path`.
fn closest_node<'a>(tree: &'a ResultNode, path: &Path) -> &'a ResultNode {
    let mut current = tree;
    while let Some(child) = current
        .children()
        .iter()
        .find(|child| path.starts_with(child.path()))
    {
        current = child;
    }
    current
}
