//! Per-field instrumentation of an execution.
//!
//! [`FieldTracking`] notifies a [`FieldInstrumentation`] when the fetch of a field begins and ends.
//! Each result path is notified at most once for each event, and an end is only notified after
//! the begin of the same path, whatever the order and the threads in which the service responses
//! are processed.
//!
//! Some nodes are never tracked:
//! * fields added by the gateway rather than requested by the client,
//! * list items, which are tracked through the field owning the list,
//! * hydration inputs (and lists of them) are not completed: their completion is left to the pass
//!   resolving the secondary fetch, which completes the path with the resolved node.

use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::sync::Arc;

use itertools::Itertools;
use parking_lot::Mutex;

use crate::configuration::FieldTrackingConfig;
use crate::error::FetchError;
use crate::json_ext::Path;
use crate::result::ResultNode;
use crate::result::StepInfo;

/// Receives the begin of the fetch of each tracked field.
pub trait FieldInstrumentation: Send + Sync {
    /// Called once when the field at `path` is dispatched. The returned handle is completed once,
    /// if the field is ever completed.
    fn begin_fetch(&self, path: &Path, step: &StepInfo) -> Box<dyn FetchCompletion>;
}

/// Receives the end of the fetch of one field.
pub trait FetchCompletion: Send {
    fn on_completed(self: Box<Self>, node: Option<&ResultNode>, error: Option<&FetchError>);
}

/// A completion handle that ignores the completion.
#[derive(Debug, Default)]
pub struct NoopCompletion;

impl FetchCompletion for NoopCompletion {
    fn on_completed(self: Box<Self>, _: Option<&ResultNode>, _: Option<&FetchError>) {}
}

/// The lifecycle stage of a tracked path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStage {
    Dispatched,
    Completed,
}

enum Stage {
    /// `begin_fetch` is running.
    Dispatching,
    /// Completed while `begin_fetch` was running; the completion is delivered once it returns.
    CompletedWhileDispatching(Option<ResultNode>, Option<FetchError>),
    Dispatched(Box<dyn FetchCompletion>),
    Completed,
}

/// Tracks the fields of one execution.
pub struct FieldTracking {
    instrumentation: Arc<dyn FieldInstrumentation>,
    enabled: bool,
    stages: Mutex<HashMap<Path, Stage>>,
}

impl FieldTracking {
    pub fn new(instrumentation: Arc<dyn FieldInstrumentation>, config: &FieldTrackingConfig) -> Self {
        Self {
            instrumentation,
            enabled: config.enabled,
            stages: Mutex::new(HashMap::new()),
        }
    }

    /// Records the field at `path` as dispatched, notifying the instrumentation the first time.
    ///
    /// Returns whether the instrumentation was notified.
    pub fn dispatch(&self, path: &Path, step: &StepInfo) -> bool {
        if !self.enabled || is_untracked(path, step) {
            return false;
        }
        {
            let mut stages = self.stages.lock();
            if stages.contains_key(path) {
                return false;
            }
            stages.insert(path.clone(), Stage::Dispatching);
        }

        tracing::trace!(%path, "field dispatched");
        let completion = self.instrumentation.begin_fetch(path, step);

        let (node, error) = {
            let mut stages = self.stages.lock();
            let Some(stage) = stages.get_mut(path) else {
                tracing::error!(%path, "dispatched field vanished from the tracking state");
                return true;
            };
            match mem::replace(stage, Stage::Completed) {
                Stage::CompletedWhileDispatching(node, error) => (node, error),
                _ => {
                    *stage = Stage::Dispatched(completion);
                    return true;
                }
            }
        };
        completion.on_completed(node.as_ref(), error.as_ref());
        true
    }

    /// Records the field at `path` as completed, notifying the instrumentation if the field was
    /// dispatched and not completed yet.
    ///
    /// Returns whether the completion was accepted.
    pub fn complete(
        &self,
        path: &Path,
        node: Option<&ResultNode>,
        error: Option<&FetchError>,
    ) -> bool {
        if !self.enabled || path.last().is_some_and(|element| element.is_index()) {
            return false;
        }
        if let Some(node) = node {
            if node.step().is_some_and(|step| step.is_synthetic()) {
                return false;
            }
            if node.is_pending_hydration() {
                tracing::debug!(%path, "completion deferred until hydration");
                return false;
            }
        }

        let completion = {
            let mut stages = self.stages.lock();
            let Some(stage) = stages.get_mut(path) else {
                // without a node the field may be one that is never dispatched, such as a
                // synthetic field of a failed call
                if node.is_some() {
                    tracing::warn!(%path, "completed a field that was never dispatched");
                } else {
                    tracing::debug!(%path, "completed an untracked field");
                }
                return false;
            };
            match mem::replace(stage, Stage::Completed) {
                Stage::Dispatching => {
                    *stage = Stage::CompletedWhileDispatching(node.cloned(), error.cloned());
                    return true;
                }
                Stage::Dispatched(completion) => completion,
                previous => {
                    *stage = previous;
                    return false;
                }
            }
        };
        tracing::trace!(%path, failed = error.is_some(), "field completed");
        completion.on_completed(node, error);
        true
    }

    /// Dispatches every node of the subtree under `node`.
    pub fn dispatch_tree(&self, node: &ResultNode) -> usize {
        node.descendants()
            .filter_map(|node| Some((node.path(), node.step()?)))
            .filter(|(path, step)| self.dispatch(path, step))
            .count()
    }

    /// Completes every node of the subtree under `node`, parents first.
    pub fn complete_tree(&self, node: &ResultNode, error: Option<&FetchError>) -> usize {
        node.descendants()
            .filter(|node| !node.is_root())
            .filter(|node| self.complete(node.path(), Some(*node), error))
            .count()
    }

    /// The stage of `path`, if it was dispatched.
    pub fn stage(&self, path: &Path) -> Option<FieldStage> {
        self.stages.lock().get(path).map(|stage| match stage {
            Stage::Dispatching | Stage::Dispatched(_) => FieldStage::Dispatched,
            Stage::CompletedWhileDispatching(..) | Stage::Completed => FieldStage::Completed,
        })
    }

    /// The paths dispatched but not completed, such as hydration inputs or the fields of an
    /// abandoned execution.
    pub fn pending_paths(&self) -> Vec<Path> {
        self.stages
            .lock()
            .iter()
            .filter(|(_, stage)| matches!(stage, Stage::Dispatching | Stage::Dispatched(_)))
            .map(|(path, _)| path.clone())
            .sorted_by_cached_key(|path| path.to_string())
            .collect()
    }
}

impl fmt::Debug for FieldTracking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldTracking")
            .field("enabled", &self.enabled)
            .field("tracked_paths", &self.stages.lock().len())
            .finish()
    }
}

fn is_untracked(path: &Path, step: &StepInfo) -> bool {
    if step.is_synthetic() {
        tracing::debug!(%path, "synthetic field not tracked");
        return true;
    }
    path.last().is_some_and(|element| element.is_index())
}
