//! Errors raised by the execution core.
//!
//! [`StitchingError`] covers contract violations: an upstream collaborator (or this crate) handed
//! over something that can never be valid. They are propagated with `?` and never retried.
//!
//! [`FetchError`] covers the failure of one backend call. It never aborts the execution; it is
//! converted into a GraphQL error attached to the affected result nodes.
use apollo_compiler::InvalidNameError;
use apollo_compiler::Name;
use displaydoc::Display;
use serde::Serialize;
use thiserror::Error;

use crate::graphql;
use crate::json_ext::Path;

/// Contract violations detected by the compiler or the result model.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StitchingError {
    /// field '{field_name}' has no concrete object type names
    EmptyObjectTypeNames { field_name: Name },

    /// type '{type_name}' has no field '{field_name}' in the underlying schema
    UnknownField { type_name: Name, field_name: Name },

    /// schema has no root type for {operation_type} operations
    MissingRootType { operation_type: &'static str },

    /// input value of type '{ty}' cannot be sent to a backend: {reason}
    UnsupportedInputValue { ty: String, reason: String },

    /// the root result node must have an empty path, got '{path}'
    RootPath { path: Path },

    /// {variant} nodes do not carry a resolved value
    NoResolvedValue { variant: &'static str },

    /// leaf result node at '{path}' cannot have children
    LeafChildren { path: Path },

    /// no result node at path '{path}'
    PathNotFound { path: Path },

    /// a root result node cannot be placed under another node, at '{path}'
    NestedRoot { path: Path },

    /// only a root result node can replace the root of a result tree
    RootReplacement,

    /// cannot replace the result node at '{path}' with a node at '{replacement}'
    ReplacementPath { path: Path, replacement: Path },

    /// invalid GraphQL name: {0}
    InvalidName(String),

    /// an internal error has occurred, please report this bug: {message}
    Internal { message: String },
}

impl StitchingError {
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<InvalidNameError> for StitchingError {
    fn from(error: InvalidNameError) -> Self {
        Self::InvalidName(error.to_string())
    }
}

/// Failure of a single backend call.
///
/// Note that these are not returned to the client as-is, but are converted to a
/// [`graphql::Error`] attached to the fields the call was responsible for.
#[derive(Error, Display, Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
#[ignore_extra_doc_attributes]
#[non_exhaustive]
pub enum FetchError {
    /// HTTP fetch failed from '{service}': {reason}
    ///
    /// note that this relates to a transport error and not a GraphQL error
    SubrequestHttpError {
        /// The service that failed.
        service: String,
        /// The reason the fetch failed.
        reason: String,
    },

    /// service '{service}' response was malformed: {reason}
    SubrequestMalformedResponse {
        /// The service that responded with the malformed response.
        service: String,
        /// The reason the response could not be used.
        reason: String,
    },
}

impl FetchError {
    pub(crate) const fn extension_code(&self) -> &'static str {
        match self {
            Self::SubrequestHttpError { .. } => "SUBREQUEST_HTTP_ERROR",
            Self::SubrequestMalformedResponse { .. } => "SUBREQUEST_MALFORMED_RESPONSE",
        }
    }

    pub(crate) fn service(&self) -> &str {
        match self {
            Self::SubrequestHttpError { service, .. }
            | Self::SubrequestMalformedResponse { service, .. } => service,
        }
    }

    /// Convert the fetch error to a GraphQL error located at `path`.
    pub fn to_graphql_error(&self, path: Option<Path>) -> graphql::Error {
        graphql::Error::builder()
            .message(self.to_string())
            .and_path(path)
            .extension_code(self.extension_code())
            .extension("service", self.service())
            .build()
    }
}

/// Error raised while loading a [`crate::configuration::Configuration`].
#[derive(Error, Display, Debug)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// could not parse configuration: {0}
    InvalidYaml(#[from] serde_yaml::Error),

    /// invalid value for '{field}': {reason}
    InvalidValue { field: &'static str, reason: String },
}
