use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;

use super::variables::VariableAccumulator;
use crate::error::StitchingError;
use crate::normalized::InputValue;
use crate::normalized::NormalizedField;
use crate::normalized::NormalizedInputValue;

/// Translates the arguments of `field`, in their original order.
pub(super) fn translate_arguments(
    field: &NormalizedField,
    accumulator: &mut VariableAccumulator<'_>,
) -> Result<Vec<Node<ast::Argument>>, StitchingError> {
    field
        .arguments()
        .iter()
        .map(|(name, value)| {
            Ok(Node::new(ast::Argument {
                name: name.clone(),
                value: Node::new(translate(field, name, value, accumulator)?),
            }))
        })
        .collect()
}

/// Translates an argument value into an AST value.
///
/// The accumulator is consulted for every value visited, so a policy may extract a nested input
/// object field or list item without extracting the whole argument.
pub(super) fn translate(
    field: &NormalizedField,
    argument_name: &Name,
    value: &NormalizedInputValue,
    accumulator: &mut VariableAccumulator<'_>,
) -> Result<ast::Value, StitchingError> {
    if accumulator.should_extract(field, argument_name, value) {
        return accumulator.accumulate(value);
    }
    Ok(match value.value() {
        InputValue::Null => ast::Value::Null,
        InputValue::Literal(literal) => ast::Value::clone(literal),
        InputValue::List(items) => ast::Value::List(
            items
                .iter()
                .map(|item| Ok(Node::new(translate(field, argument_name, item, accumulator)?)))
                .collect::<Result<_, StitchingError>>()?,
        ),
        InputValue::Object(fields) => ast::Value::Object(
            fields
                .iter()
                .map(|(name, item)| {
                    Ok((
                        name.clone(),
                        Node::new(translate(field, argument_name, item, accumulator)?),
                    ))
                })
                .collect::<Result<_, StitchingError>>()?,
        ),
    })
}
