use std::collections::HashMap;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use serde_json_bytes::ByteString;

use crate::error::StitchingError;
use crate::json_ext::Object;
use crate::normalized::NormalizedField;
use crate::normalized::NormalizedInputValue;

/// Decides whether an argument value is sent as a variable rather than inlined in the document.
///
/// Implemented for any `Fn(&NormalizedField, &Name, &NormalizedInputValue) -> bool`.
pub trait VariablePredicate: Send + Sync {
    fn should_extract(
        &self,
        field: &NormalizedField,
        argument_name: &Name,
        value: &NormalizedInputValue,
    ) -> bool;
}

impl<F> VariablePredicate for F
where
    F: Fn(&NormalizedField, &Name, &NormalizedInputValue) -> bool + Send + Sync,
{
    fn should_extract(
        &self,
        field: &NormalizedField,
        argument_name: &Name,
        value: &NormalizedInputValue,
    ) -> bool {
        self(field, argument_name, value)
    }
}

/// Inlines every argument value as a literal.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineAll;

impl VariablePredicate for InlineAll {
    fn should_extract(&self, _: &NormalizedField, _: &Name, _: &NormalizedInputValue) -> bool {
        false
    }
}

/// Sends every argument value as a variable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractAll;

impl VariablePredicate for ExtractAll {
    fn should_extract(&self, _: &NormalizedField, _: &Name, _: &NormalizedInputValue) -> bool {
        true
    }
}

/// Collects the variables of a single compiled operation.
///
/// Identical values (same declared type, same literal) extracted more than once share one
/// variable. An accumulator must not outlive the compilation it was created for: the variable
/// numbering is only meaningful within one document.
pub(crate) struct VariableAccumulator<'a> {
    predicate: &'a dyn VariablePredicate,
    prefix: &'a str,
    names_by_identity: HashMap<String, Name>,
    definitions: Vec<Node<ast::VariableDefinition>>,
    values: Object,
}

impl<'a> VariableAccumulator<'a> {
    pub(crate) fn new(predicate: &'a dyn VariablePredicate, prefix: &'a str) -> Self {
        Self {
            predicate,
            prefix,
            names_by_identity: HashMap::new(),
            definitions: Vec::new(),
            values: Object::new(),
        }
    }

    pub(crate) fn should_extract(
        &self,
        field: &NormalizedField,
        argument_name: &Name,
        value: &NormalizedInputValue,
    ) -> bool {
        self.predicate.should_extract(field, argument_name, value)
    }

    /// Returns a reference to the variable holding `value`, defining it on first use.
    pub(crate) fn accumulate(
        &mut self,
        value: &NormalizedInputValue,
    ) -> Result<ast::Value, StitchingError> {
        let identity = value.identity_key();
        if let Some(name) = self.names_by_identity.get(&identity) {
            return Ok(ast::Value::Variable(name.clone()));
        }

        let name = Name::new(&format!("{}{}", self.prefix, self.definitions.len()))?;
        let ty: &ast::Type = value.ty();
        tracing::trace!(variable = %name, %ty, "extracting argument value");
        self.values
            .insert(ByteString::from(name.as_str()), value.to_json()?);
        self.definitions.push(Node::new(ast::VariableDefinition {
            name: name.clone(),
            ty: value.ty().clone(),
            default_value: None,
            directives: Default::default(),
        }));
        self.names_by_identity.insert(identity, name.clone());
        Ok(ast::Value::Variable(name))
    }

    /// Variable definitions in first-use order, and the values to send for them.
    pub(crate) fn finish(self) -> (Vec<Node<ast::VariableDefinition>>, Object) {
        (self.definitions, self.values)
    }
}

#[cfg(test)]
mod tests {
    use apollo_compiler::name;
    use apollo_compiler::ty;
    use pretty_assertions::assert_eq;
    use serde_json_bytes::json;

    use super::*;

    fn id(value: &str) -> NormalizedInputValue {
        NormalizedInputValue::literal(ty!(ID!), ast::Value::String(value.into()))
    }

    #[test]
    fn deduplicates_identical_values() {
        let mut accumulator = VariableAccumulator::new(&ExtractAll, "v");
        let first = accumulator.accumulate(&id("42")).unwrap();
        let other = accumulator.accumulate(&id("7")).unwrap();
        let again = accumulator.accumulate(&id("42")).unwrap();

        assert_eq!(first, ast::Value::Variable(name!("v0")));
        assert_eq!(other, ast::Value::Variable(name!("v1")));
        assert_eq!(again, first);

        let (definitions, values) = accumulator.finish();
        assert_eq!(
            definitions
                .iter()
                .map(|definition| (definition.name.as_str(), definition.ty.to_string()))
                .collect::<Vec<_>>(),
            [("v0", "ID!".to_string()), ("v1", "ID!".to_string())]
        );
        assert_eq!(
            serde_json_bytes::Value::Object(values),
            json!({ "v0": "42", "v1": "7" })
        );
    }

    #[test]
    fn same_literal_with_another_type_gets_its_own_variable() {
        let mut accumulator = VariableAccumulator::new(&ExtractAll, "arg");
        let as_id = accumulator.accumulate(&id("42")).unwrap();
        let as_string = accumulator
            .accumulate(&NormalizedInputValue::literal(
                ty!(String),
                ast::Value::String("42".into()),
            ))
            .unwrap();
        assert_eq!(as_id, ast::Value::Variable(name!("arg0")));
        assert_eq!(as_string, ast::Value::Variable(name!("arg1")));
    }

    #[test]
    fn closures_are_predicates() {
        let field = NormalizedField::builder(name!("pet"))
            .object_type(name!("Query"))
            .build();
        let only_ids = |_: &NormalizedField, argument: &Name, _: &NormalizedInputValue| {
            argument.as_str() == "id"
        };
        let accumulator = VariableAccumulator::new(&only_ids, "v");
        assert!(accumulator.should_extract(&field, &name!("id"), &id("1")));
        assert!(!accumulator.should_extract(&field, &name!("name"), &id("1")));
    }
}
