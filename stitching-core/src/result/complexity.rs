//! Complexity metrics of an assembled result.

use std::collections::BTreeMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::json;

use crate::json_ext::Object;
use crate::json_ext::Value;

/// Counts the result nodes produced by each backend service, and the renames applied to them.
///
/// One aggregator is shared by all the service calls of an execution, which may increment it
/// concurrently.
#[derive(Debug, Default)]
pub struct ResultComplexityAggregator {
    nodes: Mutex<NodeCounts>,
    field_renames: AtomicUsize,
    type_renames: AtomicUsize,
}

#[derive(Debug, Default)]
struct NodeCounts {
    total: usize,
    by_service: BTreeMap<String, usize>,
}

impl ResultComplexityAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `count` nodes to the counts of `service` and to the total, as a single update.
    pub fn increment_service_node_count(&self, service: &str, count: usize) {
        let mut nodes = self.nodes.lock();
        nodes.total += count;
        *nodes.by_service.entry(service.to_string()).or_default() += count;
    }

    pub fn increment_field_rename_count(&self, count: usize) {
        self.field_renames.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_type_rename_count(&self, count: usize) {
        self.type_renames.fetch_add(count, Ordering::Relaxed);
    }

    /// A copy of the current counts, unaffected by later increments.
    pub fn snapshot(&self) -> ResultComplexity {
        let (total_node_count, service_node_counts) = {
            let nodes = self.nodes.lock();
            (nodes.total, nodes.by_service.clone())
        };
        ResultComplexity {
            total_node_count,
            service_node_counts,
            field_renames_count: self.field_renames.load(Ordering::Relaxed),
            type_renames_count: self.type_renames.load(Ordering::Relaxed),
        }
    }
}

/// A point in time copy of a [`ResultComplexityAggregator`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultComplexity {
    pub total_node_count: usize,
    pub service_node_counts: BTreeMap<String, usize>,
    pub field_renames_count: usize,
    pub type_renames_count: usize,
}

impl ResultComplexity {
    /// The metrics as a reporting map.
    pub fn to_map(&self) -> Object {
        let service_node_counts: Object = self
            .service_node_counts
            .iter()
            .map(|(service, count)| (ByteString::from(service.as_str()), json!(count)))
            .collect();
        let mut map = Object::new();
        map.insert("totalNodeCount", json!(self.total_node_count));
        map.insert("serviceNodeCounts", Value::Object(service_node_counts));
        map.insert("fieldRenamesCount", json!(self.field_renames_count));
        map.insert("typeRenamesCount", json!(self.type_renames_count));
        map
    }
}
