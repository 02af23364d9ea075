use std::collections::HashMap;
use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Schema;
use apollo_compiler::validation::Valid;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json_bytes::Value;
use stitching_core::FetchError;
use stitching_core::ServiceExecution;
use stitching_core::compiler::SubgraphRequest;
use stitching_core::execution::ServiceResult;
use stitching_core::json_ext::Path;
use stitching_core::normalized::NormalizedFieldBuilder;
use stitching_core::result::ResultNode;
use stitching_core::result::StepInfo;
use stitching_core::tracking::FetchCompletion;
use stitching_core::tracking::FieldInstrumentation;

pub(crate) const PETS_SCHEMA: &str = r#"
type Query {
  pet(id: ID!): Pet
}

interface Pet {
  name: String
}

type Dog implements Pet {
  name: String
  barks: Boolean
  ownerIds: [ID]
}

type Cat implements Pet {
  name: String
  livesLeft: Int
}
"#;

pub(crate) const HUMANS_SCHEMA: &str = r#"
type Query {
  human(id: ID!): Human
}

type Human {
  name: String
  age: Int
}
"#;

pub(crate) fn schema(sdl: &str) -> Arc<Valid<Schema>> {
    Arc::new(Schema::parse_and_validate(sdl, "schema.graphql").unwrap())
}

pub(crate) fn field(name: Name, types: &[Name]) -> NormalizedFieldBuilder {
    stitching_core::NormalizedField::builder(name).object_types(types.iter().cloned())
}

/// Answers each service with a canned response, and records the requests it receives.
#[derive(Default)]
pub(crate) struct MockTransport {
    responses: HashMap<String, Result<Value, FetchError>>,
    requests: Mutex<Vec<(String, SubgraphRequest)>>,
}

impl MockTransport {
    pub(crate) fn with_response(mut self, service: &str, response: Value) -> Self {
        self.responses.insert(service.to_string(), Ok(response));
        self
    }

    pub(crate) fn with_failure(mut self, service: &str, error: FetchError) -> Self {
        self.responses.insert(service.to_string(), Err(error));
        self
    }

    pub(crate) fn request(&self, service: &str) -> SubgraphRequest {
        self.requests
            .lock()
            .iter()
            .find(|(name, _)| name == service)
            .map(|(_, request)| request.clone())
            .unwrap()
    }
}

#[async_trait]
impl ServiceExecution for MockTransport {
    async fn execute(
        &self,
        service: &str,
        request: SubgraphRequest,
    ) -> Result<ServiceResult, FetchError> {
        self.requests.lock().push((service.to_string(), request));
        // give the other calls a chance to run in between
        tokio::task::yield_now().await;
        match self.responses.get(service) {
            Some(Ok(response)) => Ok(serde_json_bytes::from_value(response.clone()).unwrap()),
            Some(Err(error)) => Err(error.clone()),
            None => Err(FetchError::SubrequestHttpError {
                service: service.to_string(),
                reason: "no such service".to_string(),
            }),
        }
    }
}

/// Records begin and end notifications as `begin /path` and `end /path outcome`.
#[derive(Default)]
pub(crate) struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub(crate) fn events(&self) -> Vec<String> {
        let mut events = self.events.lock().clone();
        events.sort();
        events
    }
}

impl FieldInstrumentation for Recorder {
    fn begin_fetch(&self, path: &Path, _: &StepInfo) -> Box<dyn FetchCompletion> {
        self.events.lock().push(format!("begin {path}"));
        Box::new(Completion {
            path: path.clone(),
            events: Arc::clone(&self.events),
        })
    }
}

struct Completion {
    path: Path,
    events: Arc<Mutex<Vec<String>>>,
}

impl FetchCompletion for Completion {
    fn on_completed(self: Box<Self>, node: Option<&ResultNode>, error: Option<&FetchError>) {
        let outcome = match (node, error) {
            (_, Some(_)) => "failed",
            (Some(node), None) => node.kind().name(),
            (None, None) => "nothing",
        };
        self.events
            .lock()
            .push(format!("end {} {outcome}", self.path));
    }
}
