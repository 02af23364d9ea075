//! Projection of a result tree into the client response.

use serde::Serialize;
use serde_json_bytes::ByteString;

use super::ResultNode;
use super::ResultNodeKind;
use super::complexity::ResultComplexity;
use crate::graphql;
use crate::json_ext::Object;
use crate::json_ext::Value;

/// A GraphQL response, as returned to the client.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub data: Object,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<graphql::Error>,
    #[serde(skip_serializing_if = "Object::is_empty")]
    pub extensions: Object,
}

impl Response {
    /// Renders the tree under `root`, collecting the errors of every node.
    ///
    /// Hydration inputs that were never resolved render as `null`.
    pub fn from_tree(root: &ResultNode) -> Self {
        let data = match render(root) {
            Value::Object(data) => data,
            _ => Object::new(),
        };
        Self {
            data,
            errors: root.all_errors().cloned().collect(),
            extensions: Object::new(),
        }
    }

    /// Adds the complexity metrics of the result under the `resultComplexity` extension.
    pub fn with_complexity(mut self, complexity: &ResultComplexity) -> Self {
        self.extensions
            .insert("resultComplexity", Value::Object(complexity.to_map()));
        self
    }
}

fn render(node: &ResultNode) -> Value {
    match node.kind() {
        ResultNodeKind::Root | ResultNodeKind::Object => Value::Object(
            node.children()
                .iter()
                .filter_map(|child| {
                    let key = child.path().last_key()?;
                    Some((ByteString::from(key), render(child)))
                })
                .collect(),
        ),
        ResultNodeKind::List => Value::Array(node.children().iter().map(render).collect()),
        ResultNodeKind::Leaf { value } | ResultNodeKind::UnresolvedObject { value } => {
            value.clone()
        }
        ResultNodeKind::HydrationInput { .. } => Value::Null,
    }
}
