//! Execution core of a GraphQL stitching gateway.
//!
//! The gateway receives client operations against an overall schema composed from several
//! independent backend services. Once an operation has been normalized into a tree of
//! [`normalized::NormalizedField`]s, this crate:
//!
//! * compiles the fields resolved by each backend into an operation for that backend
//!   ([`compiler`]),
//! * sends those operations concurrently and assembles the responses into one immutable result
//!   tree ([`execution`], [`result`]), counting result complexity along the way,
//! * notifies per-field instrumentation once per field as results arrive ([`tracking`]).
//!
//! Parsing the gateway configuration, composing the schemas, normalizing client operations and
//! the transport to the backends are left to the embedding gateway.

#![warn(
    rustdoc::broken_intra_doc_links,
    unreachable_pub,
    unreachable_patterns,
    unused,
    unused_qualifications,
    dead_code,
    while_true,
    unconditional_panic,
    clippy::all
)]

pub mod compiler;
pub mod configuration;
pub mod error;
pub mod execution;
pub mod graphql;
pub mod json_ext;
pub mod normalized;
pub mod result;
pub mod tracking;

use static_assertions::assert_impl_all;

pub use crate::compiler::CompiledOperation;
pub use crate::compiler::OperationCompiler;
pub use crate::compiler::compile;
pub use crate::configuration::Configuration;
pub use crate::error::FetchError;
pub use crate::error::StitchingError;
pub use crate::execution::Executor;
pub use crate::execution::ServiceCall;
pub use crate::execution::ServiceExecution;
pub use crate::normalized::NormalizedField;
pub use crate::result::ResultNode;
pub use crate::tracking::FieldTracking;

assert_impl_all!(NormalizedField: Send, Sync);
assert_impl_all!(ResultNode: Send, Sync);
assert_impl_all!(result::complexity::ResultComplexityAggregator: Send, Sync);
assert_impl_all!(FieldTracking: Send, Sync);
assert_impl_all!(Executor: Send, Sync);
