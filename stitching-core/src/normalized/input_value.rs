use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use indexmap::IndexMap;
use serde_json_bytes::ByteString;

use crate::error::StitchingError;
use crate::json_ext::Object;
use crate::json_ext::Value;

/// An argument value that has already been coerced against its declared input type.
///
/// The shape of the value is decided once, when the normalizer builds it, so translating it into a
/// backend document never needs to inspect it dynamically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedInputValue {
    ty: Node<ast::Type>,
    value: InputValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputValue {
    Null,
    /// A value that was already resolved into a literal, e.g. a scalar or an enum value.
    Literal(Node<ast::Value>),
    List(Vec<NormalizedInputValue>),
    /// An input object, in the order its fields were given.
    Object(IndexMap<Name, NormalizedInputValue>),
}

impl NormalizedInputValue {
    pub fn new(ty: impl Into<Node<ast::Type>>, value: InputValue) -> Self {
        Self {
            ty: ty.into(),
            value,
        }
    }

    pub fn null(ty: impl Into<Node<ast::Type>>) -> Self {
        Self::new(ty, InputValue::Null)
    }

    pub fn literal(ty: impl Into<Node<ast::Type>>, value: impl Into<Node<ast::Value>>) -> Self {
        Self::new(ty, InputValue::Literal(value.into()))
    }

    pub fn list(
        ty: impl Into<Node<ast::Type>>,
        items: impl IntoIterator<Item = NormalizedInputValue>,
    ) -> Self {
        Self::new(ty, InputValue::List(items.into_iter().collect()))
    }

    pub fn object(
        ty: impl Into<Node<ast::Type>>,
        fields: impl IntoIterator<Item = (Name, NormalizedInputValue)>,
    ) -> Self {
        Self::new(ty, InputValue::Object(fields.into_iter().collect()))
    }

    /// The declared input type, e.g. `[ID!]!`.
    pub fn ty(&self) -> &Node<ast::Type> {
        &self.ty
    }

    pub fn value(&self) -> &InputValue {
        &self.value
    }

    /// The value as an AST literal, with no variable extraction.
    pub fn to_ast_value(&self) -> ast::Value {
        match &self.value {
            InputValue::Null => ast::Value::Null,
            InputValue::Literal(literal) => ast::Value::clone(literal),
            InputValue::List(items) => ast::Value::List(
                items
                    .iter()
                    .map(|item| Node::new(item.to_ast_value()))
                    .collect(),
            ),
            InputValue::Object(fields) => ast::Value::Object(
                fields
                    .iter()
                    .map(|(name, field)| (name.clone(), Node::new(field.to_ast_value())))
                    .collect(),
            ),
        }
    }

    /// A key that is equal for two values iff they have the same declared type and print to the
    /// same GraphQL literal.
    pub(crate) fn identity_key(&self) -> String {
        format!("{}={}", &*self.ty, self.to_ast_value())
    }

    /// Converts the value into the JSON sent in a request's `variables`.
    pub fn to_json(&self) -> Result<Value, StitchingError> {
        match &self.value {
            InputValue::Null => Ok(Value::Null),
            InputValue::Literal(literal) => literal_to_json(&self.ty, literal),
            InputValue::List(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(NormalizedInputValue::to_json)
                    .collect::<Result<_, _>>()?,
            )),
            InputValue::Object(fields) => {
                let mut object = Object::new();
                for (name, field) in fields {
                    object.insert(ByteString::from(name.as_str()), field.to_json()?);
                }
                Ok(Value::Object(object))
            }
        }
    }
}

fn literal_to_json(ty: &ast::Type, literal: &ast::Value) -> Result<Value, StitchingError> {
    let unsupported = |reason: String| StitchingError::UnsupportedInputValue {
        ty: ty.to_string(),
        reason,
    };
    Ok(match literal {
        ast::Value::Null => Value::Null,
        ast::Value::Enum(name) => Value::String(name.as_str().into()),
        ast::Value::Variable(name) => {
            return Err(unsupported(format!(
                "it references the client variable ${name}, which should have been coerced"
            )));
        }
        ast::Value::String(s) => Value::String(s.as_str().into()),
        ast::Value::Boolean(b) => Value::Bool(*b),
        ast::Value::Int(int) => {
            let text = int.to_string();
            match text.parse::<i64>() {
                Ok(i) => Value::from(i),
                Err(_) => float_to_json(&text).ok_or_else(|| {
                    unsupported(format!("integer literal {text} is out of range"))
                })?,
            }
        }
        ast::Value::Float(float) => {
            let text = float.to_string();
            float_to_json(&text)
                .ok_or_else(|| unsupported(format!("float literal {text} is out of range")))?
        }
        ast::Value::List(items) => Value::Array(
            items
                .iter()
                .map(|item| literal_to_json(ty, item))
                .collect::<Result<_, _>>()?,
        ),
        ast::Value::Object(fields) => {
            let mut object = Object::new();
            for (name, value) in fields {
                object.insert(
                    ByteString::from(name.as_str()),
                    literal_to_json(ty, value)?,
                );
            }
            Value::Object(object)
        }
    })
}

fn float_to_json(text: &str) -> Option<Value> {
    let float = text.parse::<f64>().ok().filter(|f| f.is_finite())?;
    serde_json::Number::from_f64(float).map(Value::Number)
}
