//! Execution of an operation across backend services.
//!
//! Each [`ServiceCall`] is compiled, sent through the caller's [`ServiceExecution`], and its
//! response assembled into result subtrees. Calls run concurrently; the failure of one call is
//! reported on its own fields and never prevents the others from completing.

use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Schema;
use apollo_compiler::ast::OperationType;
use apollo_compiler::validation::Valid;
use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use tracing::Instrument;

use crate::compiler::InlineAll;
use crate::compiler::OperationCompiler;
use crate::compiler::SubgraphRequest;
use crate::compiler::VariablePredicate;
use crate::compiler::operation_type_name;
use crate::configuration::Configuration;
use crate::error::FetchError;
use crate::error::StitchingError;
use crate::graphql;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::normalized::NormalizedField;
use crate::result::ResultNode;
use crate::result::assembly::AssembledResult;
use crate::result::assembly::HydrationPredicate;
use crate::result::assembly::NoHydration;
use crate::result::assembly::ResultAssembler;
use crate::result::complexity::ResultComplexity;
use crate::result::complexity::ResultComplexityAggregator;
use crate::result::render::Response;
use crate::tracking::FieldInstrumentation;
use crate::tracking::FieldTracking;

/// Sends compiled operations to backend services.
#[async_trait]
pub trait ServiceExecution: Send + Sync {
    async fn execute(
        &self,
        service: &str,
        request: SubgraphRequest,
    ) -> Result<ServiceResult, FetchError>;
}

/// The response of a backend service.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceResult {
    /// `None` when the service sent `"data": null` or no data at all.
    pub data: Option<Object>,
    pub errors: Vec<graphql::Error>,
}

/// The top-level fields of an operation that one backend service resolves.
#[derive(Debug, Clone)]
pub struct ServiceCall {
    service: String,
    schema: Arc<Valid<Schema>>,
    fields: Vec<Arc<NormalizedField>>,
    operation_name: Option<Name>,
}

impl ServiceCall {
    pub fn new(
        service: impl Into<String>,
        schema: Arc<Valid<Schema>>,
        fields: Vec<Arc<NormalizedField>>,
    ) -> Self {
        Self {
            service: service.into(),
            schema,
            fields,
            operation_name: None,
        }
    }

    pub fn with_operation_name(mut self, operation_name: Name) -> Self {
        self.operation_name = Some(operation_name);
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }
}

/// The outcome of an execution.
#[derive(Debug)]
pub struct ExecutionResult {
    /// The assembled result, with one child per top-level field.
    pub tree: ResultNode,
    /// Errors of calls that resolved no field.
    pub errors: Vec<graphql::Error>,
    pub complexity: ResultComplexity,
    /// The field tracking of the execution, to be completed by the pass resolving hydrations.
    pub tracking: Option<FieldTracking>,
}

impl ExecutionResult {
    /// The response for the client.
    pub fn into_response(self) -> Response {
        let mut response = Response::from_tree(&self.tree).with_complexity(&self.complexity);
        response.errors.extend(self.errors);
        response
    }
}

/// Executes operations across backend services.
pub struct Executor {
    configuration: Configuration,
    transport: Arc<dyn ServiceExecution>,
    variables: Arc<dyn VariablePredicate>,
    hydration: Arc<dyn HydrationPredicate>,
    instrumentation: Option<Arc<dyn FieldInstrumentation>>,
}

impl Executor {
    /// An executor sending its calls through `transport`, with the default configuration.
    ///
    /// Arguments are inlined, no field is hydrated and fields are not tracked unless configured
    /// otherwise.
    pub fn new(transport: Arc<dyn ServiceExecution>) -> Self {
        Self {
            configuration: Configuration::default(),
            transport,
            variables: Arc::new(InlineAll),
            hydration: Arc::new(NoHydration),
            instrumentation: None,
        }
    }

    pub fn with_configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = configuration;
        self
    }

    /// Selects the argument values sent as variables.
    pub fn with_variables(mut self, variables: Arc<dyn VariablePredicate>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_hydration(mut self, hydration: Arc<dyn HydrationPredicate>) -> Self {
        self.hydration = hydration;
        self
    }

    pub fn with_instrumentation(mut self, instrumentation: Arc<dyn FieldInstrumentation>) -> Self {
        self.instrumentation = Some(instrumentation);
        self
    }

    /// Executes `calls`, all parts of one operation of type `operation_type`.
    ///
    /// # Errors
    /// Fails on contract violations: a call that cannot be compiled, or fields that do not match
    /// the schema of their service. Failed service calls are not errors; they are reported on the
    /// fields of the call.
    #[tracing::instrument(skip_all, level = "debug", name = "execute_operation")]
    pub async fn execute(
        &self,
        operation_type: OperationType,
        calls: &[ServiceCall],
    ) -> Result<ExecutionResult, StitchingError> {
        let aggregator = ResultComplexityAggregator::new();
        let tracking = self.instrumentation.as_ref().map(|instrumentation| {
            FieldTracking::new(
                Arc::clone(instrumentation),
                &self.configuration.field_tracking,
            )
        });

        let results = join_all(calls.iter().map(|call| {
            self.execute_call(operation_type, call, &aggregator, tracking.as_ref())
                .instrument(tracing::debug_span!("service_call", service = %call.service))
        }))
        .await;

        let mut nodes = Vec::new();
        let mut errors = Vec::new();
        for result in results {
            let assembled = result?;
            nodes.extend(assembled.nodes);
            errors.extend(assembled.unattached_errors);
        }
        Ok(ExecutionResult {
            tree: ResultNode::root(nodes)?,
            errors,
            complexity: aggregator.snapshot(),
            tracking,
        })
    }

    async fn execute_call(
        &self,
        operation_type: OperationType,
        call: &ServiceCall,
        aggregator: &ResultComplexityAggregator,
        tracking: Option<&FieldTracking>,
    ) -> Result<AssembledResult, StitchingError> {
        let schema: &Schema = &call.schema;
        let root_type = schema
            .root_operation(operation_type)
            .ok_or(StitchingError::MissingRootType {
                operation_type: operation_type_name(operation_type),
            })?;
        let operation = OperationCompiler::new(self.configuration.compiler.clone()).compile(
            schema,
            &call.fields,
            operation_type,
            call.operation_name.clone(),
            self.variables.as_ref(),
        )?;
        let assembler =
            ResultAssembler::new(schema, &call.service).with_hydration(self.hydration.as_ref());

        if let Some(tracking) = tracking {
            for field in call.fields.iter().filter(|field| field.applies_to(root_type)) {
                let step = assembler.step(root_type, field)?;
                tracking.dispatch(&Path::empty().join(field.result_key().as_str()), &step);
            }
        }

        let (assembled, error) = match self
            .transport
            .execute(&call.service, operation.to_request())
            .await
        {
            Ok(response) => {
                tracing::debug!(errors = response.errors.len(), "service responded");
                let data = response.data.unwrap_or_default();
                let assembled =
                    assembler.assemble(root_type, &call.fields, &data, response.errors)?;
                (assembled, None)
            }
            Err(error) => {
                tracing::debug!(%error, "service call failed");
                (assembler.failed(root_type, &call.fields, &error)?, Some(error))
            }
        };
        aggregator.increment_service_node_count(&call.service, assembled.node_count);

        if let Some(tracking) = tracking {
            for node in &assembled.nodes {
                tracking.dispatch_tree(node);
                tracking.complete_tree(node, error.as_ref());
            }
        }
        Ok(assembled)
    }
}
