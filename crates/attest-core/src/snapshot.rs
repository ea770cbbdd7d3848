//! Snapshot graph model for exporting domain objects
//!
//! A snapshot turns an arbitrary object tree into a directed graph of
//! entities and labeled edges. Edges point at literal JSON values or at
//! other entities, and may carry a [`Relation`] judgment (a verdict such
//! as `VALID`/`INVALID`, or a presentation tag such as `CONTROL`).
//!
//! Objects opt in through the [`JsonSnapshotable`] capability. Within
//! one snapshot, entities are memoized by source-object identity, so a
//! sub-object shared between two parents becomes one shared node rather
//! than a duplicate.
//!
//! The whole graph serializes deterministically to a single JSON
//! document: entities in creation order, metadata and edges in
//! insertion order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

use crate::{Error, Result};

/// Identifier of an entity within one snapshot
///
/// Ids are assigned by the owning snapshot and are only meaningful
/// inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(u64);

impl EntityId {
    /// Get the raw ID value
    pub fn raw(&self) -> u64 {
        self.0
    }

    fn index(&self) -> usize {
        (self.0 - 1) as usize
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity:{}", self.0)
    }
}

/// Verdict or presentation tag attached to an edge or entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Relation {
    /// The connected value passed judgment
    Valid,
    /// The connected value failed judgment
    Invalid,
    /// The connected value is the process that produced its source,
    /// not data produced by it
    Mechanism,
    /// Configuration or input steering an operation
    Control,
    /// Payload data
    Data,
    /// Observed output
    Output,
    /// An error observation
    Error,
}

impl Relation {
    /// Token used in serialized snapshots
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Valid => "VALID",
            Relation::Invalid => "INVALID",
            Relation::Mechanism => "MECHANISM",
            Relation::Control => "CONTROL",
            Relation::Data => "DATA",
            Relation::Output => "OUTPUT",
            Relation::Error => "ERROR",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything with a boolean notion of validity
///
/// Lets [`determine_valid_relation`] accept raw booleans and predicate
/// results through one signature.
pub trait Validity {
    /// Whether this value counts as valid
    fn is_valid(&self) -> bool;
}

impl Validity for bool {
    fn is_valid(&self) -> bool {
        *self
    }
}

/// Map validity to a verdict
///
/// The single source of truth for verdict mapping: every exporter that
/// tags an edge or entity with `VALID`/`INVALID` derives the token here.
pub fn determine_valid_relation(value: &dyn Validity) -> Relation {
    if value.is_valid() {
        Relation::Valid
    } else {
        Relation::Invalid
    }
}

/// Human-readable count summary, e.g. `"3 mapped results"`
pub fn object_count_to_summary(count: usize, subject: &str) -> String {
    if count == 1 {
        format!("1 {}", subject)
    } else {
        format!("{} {}s", count, subject)
    }
}

/// Capability allowing a type to export itself into a snapshot graph
pub trait JsonSnapshotable {
    /// Export this object into `entity` within `snapshot`
    ///
    /// The implementation adds metadata and edges describing itself,
    /// materializing child entities through the snapshot as needed.
    fn export_to_json_snapshot(
        &self,
        snapshot: &mut JsonSnapshot,
        entity: EntityId,
    ) -> Result<()>;

    /// One-line description used as the entity summary and in error
    /// reports; default none
    fn snapshot_summary(&self) -> Option<String> {
        None
    }
}

/// Value carried by an edge: a literal or a reference to another entity
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeValue {
    /// A leaf literal
    Literal(Value),
    /// A reference to another entity in the same snapshot
    Node(EntityId),
}

impl From<EntityId> for EdgeValue {
    fn from(id: EntityId) -> Self {
        EdgeValue::Node(id)
    }
}

impl From<Value> for EdgeValue {
    fn from(value: Value) -> Self {
        EdgeValue::Literal(value)
    }
}

impl From<bool> for EdgeValue {
    fn from(value: bool) -> Self {
        EdgeValue::Literal(Value::Bool(value))
    }
}

impl From<i64> for EdgeValue {
    fn from(value: i64) -> Self {
        EdgeValue::Literal(value.into())
    }
}

impl From<i32> for EdgeValue {
    fn from(value: i32) -> Self {
        EdgeValue::Literal(value.into())
    }
}

impl From<u64> for EdgeValue {
    fn from(value: u64) -> Self {
        EdgeValue::Literal(value.into())
    }
}

impl From<usize> for EdgeValue {
    fn from(value: usize) -> Self {
        EdgeValue::Literal((value as u64).into())
    }
}

impl From<f64> for EdgeValue {
    fn from(value: f64) -> Self {
        EdgeValue::Literal(value.into())
    }
}

impl From<&str> for EdgeValue {
    fn from(value: &str) -> Self {
        EdgeValue::Literal(Value::String(value.to_string()))
    }
}

impl From<String> for EdgeValue {
    fn from(value: String) -> Self {
        EdgeValue::Literal(Value::String(value))
    }
}

/// A labeled, directed connection out of an entity
#[derive(Debug, Clone)]
pub struct Edge {
    label: String,
    value: EdgeValue,
    relation: Option<Relation>,
    summary: Option<String>,
    metadata: IndexMap<String, Value>,
}

impl Edge {
    fn new(label: impl Into<String>, value: EdgeValue) -> Self {
        Self {
            label: label.into(),
            value,
            relation: None,
            summary: None,
            metadata: IndexMap::new(),
        }
    }

    /// The edge label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The edge target
    pub fn value(&self) -> &EdgeValue {
        &self.value
    }

    /// The relation judgment, if any
    pub fn relation(&self) -> Option<Relation> {
        self.relation
    }

    /// Tag the edge with a relation judgment
    pub fn set_relation(&mut self, relation: Relation) -> &mut Edge {
        self.relation = Some(relation);
        self
    }

    /// Attach a one-line summary of the target
    pub fn set_summary(&mut self, summary: impl Into<String>) -> &mut Edge {
        self.summary = Some(summary.into());
        self
    }

    /// Attach extra presentation metadata (e.g. a payload `format` tag)
    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Edge {
        self.metadata.insert(key.into(), value.into());
        self
    }

    fn to_json_object(&self) -> Value {
        let mut object = Map::new();
        object.insert("label".to_string(), self.label.clone().into());
        if let Some(relation) = self.relation {
            object.insert("relation".to_string(), relation.as_str().into());
        }
        if let Some(summary) = &self.summary {
            object.insert("summary".to_string(), summary.clone().into());
        }
        for (key, value) in &self.metadata {
            object.insert(key.clone(), value.clone());
        }
        match &self.value {
            EdgeValue::Literal(value) => {
                object.insert("_value".to_string(), value.clone());
            }
            EdgeValue::Node(id) => {
                object.insert("_to".to_string(), id.raw().into());
            }
        }
        Value::Object(object)
    }
}

/// A node in the snapshot graph
#[derive(Debug, Clone)]
pub struct SnapshotEntity {
    id: EntityId,
    summary: Option<String>,
    metadata: IndexMap<String, Value>,
    edges: Vec<Edge>,
}

impl SnapshotEntity {
    fn new(id: EntityId, summary: Option<String>) -> Self {
        Self {
            id,
            summary,
            metadata: IndexMap::new(),
            edges: Vec::new(),
        }
    }

    /// This entity's id
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The human-readable summary, if any
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Replace the summary
    pub fn set_summary(&mut self, summary: impl Into<String>) {
        self.summary = Some(summary.into());
    }

    /// Add an ordered metadata key/value pair
    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Ordered metadata
    pub fn metadata(&self) -> &IndexMap<String, Value> {
        &self.metadata
    }

    /// Outgoing edges in insertion order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    fn to_json_object(&self) -> Value {
        let mut object = Map::new();
        object.insert("_id".to_string(), self.id.raw().into());
        if let Some(summary) = &self.summary {
            object.insert("summary".to_string(), summary.clone().into());
        }
        for (key, value) in &self.metadata {
            object.insert(key.clone(), value.clone());
        }
        if !self.edges.is_empty() {
            let edges: Vec<Value> = self.edges.iter().map(Edge::to_json_object).collect();
            object.insert("_edges".to_string(), Value::Array(edges));
        }
        Value::Object(object)
    }
}

/// The full graph rooted at one or more exported objects
#[derive(Debug, Default)]
pub struct JsonSnapshot {
    entities: Vec<SnapshotEntity>,
    visited: HashMap<usize, EntityId>,
    roots: Vec<EntityId>,
}

impl JsonSnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh anonymous entity
    pub fn new_entity(&mut self, summary: Option<&str>) -> EntityId {
        let id = EntityId(self.entities.len() as u64 + 1);
        self.entities
            .push(SnapshotEntity::new(id, summary.map(str::to_string)));
        id
    }

    /// Access an entity of this snapshot
    ///
    /// The id must have been issued by this snapshot.
    pub fn entity(&self, id: EntityId) -> &SnapshotEntity {
        &self.entities[id.index()]
    }

    /// Mutable access to an entity of this snapshot
    pub fn entity_mut(&mut self, id: EntityId) -> &mut SnapshotEntity {
        &mut self.entities[id.index()]
    }

    /// Materialize (or reuse) the entity for a snapshotable object
    ///
    /// Entities are memoized by source-object identity within this
    /// snapshot, so a shared sub-object produces one shared node. The
    /// memo entry is recorded before the export hook runs, which also
    /// keeps reference cycles from recursing forever.
    pub fn make_entity_for_data<T>(&mut self, data: &T) -> Result<EntityId>
    where
        T: JsonSnapshotable + ?Sized,
    {
        let key = (data as *const T).cast::<()>() as usize;
        if let Some(id) = self.visited.get(&key) {
            return Ok(*id);
        }

        let summary = data.snapshot_summary();
        let id = self.new_entity(summary.as_deref());
        self.visited.insert(key, id);

        data.export_to_json_snapshot(self, id).map_err(|err| match err {
            export @ Error::SnapshotExport { .. } => export,
            other => Error::SnapshotExport {
                subject: summary.unwrap_or_else(|| id.to_string()),
                reason: other.to_string(),
            },
        })?;
        Ok(id)
    }

    /// Register `data` as a root of the snapshot and materialize it
    pub fn add_data<T>(&mut self, data: &T) -> Result<EntityId>
    where
        T: JsonSnapshotable + ?Sized,
    {
        let id = self.make_entity_for_data(data)?;
        if !self.roots.contains(&id) {
            self.roots.push(id);
        }
        Ok(id)
    }

    /// Borrow the edge-building facade
    pub fn edge_builder(&mut self) -> EdgeBuilder<'_> {
        EdgeBuilder { snapshot: self }
    }

    /// Root entities in registration order
    pub fn roots(&self) -> &[EntityId] {
        &self.roots
    }

    /// Number of entities in the graph
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Serialize the full graph to one deterministic JSON document
    ///
    /// Entities appear in creation order, metadata and edges in
    /// insertion order, so the same build sequence always yields the
    /// same document.
    pub fn to_json_object(&self) -> Value {
        let mut object = Map::new();
        match self.roots.as_slice() {
            [root] => {
                object.insert("_subject_id".to_string(), root.raw().into());
            }
            [] => {}
            roots => {
                let ids: Vec<Value> = roots.iter().map(|id| id.raw().into()).collect();
                object.insert("_subject_ids".to_string(), Value::Array(ids));
            }
        }
        let mut entities = Map::new();
        for entity in &self.entities {
            entities.insert(entity.id.raw().to_string(), entity.to_json_object());
        }
        object.insert("entities".to_string(), Value::Object(entities));
        Value::Object(object)
    }
}

/// Edge-building facade over a snapshot
///
/// Borrowed from [`JsonSnapshot::edge_builder`]; every `make_*` call
/// appends one edge and returns it for optional tagging.
pub struct EdgeBuilder<'a> {
    snapshot: &'a mut JsonSnapshot,
}

impl<'a> EdgeBuilder<'a> {
    /// Add an edge from `from` to a literal value or entity
    pub fn make(
        &mut self,
        from: EntityId,
        label: &str,
        value: impl Into<EdgeValue>,
    ) -> &mut Edge {
        let entity = self.snapshot.entity_mut(from);
        let index = entity.edges.len();
        entity.edges.push(Edge::new(label, value.into()));
        &mut entity.edges[index]
    }

    /// Add an edge denoting "the process that produced this"
    ///
    /// Materializes (or reuses) the entity for `mechanism` and connects
    /// it with a `MECHANISM` relation.
    pub fn make_mechanism<T>(
        &mut self,
        from: EntityId,
        label: &str,
        mechanism: &T,
    ) -> Result<&mut Edge>
    where
        T: JsonSnapshotable + ?Sized,
    {
        let node = self.snapshot.make_entity_for_data(mechanism)?;
        Ok(self.make(from, label, node).set_relation(Relation::Mechanism))
    }

    /// Add an edge tagged as operation input/configuration
    pub fn make_control(
        &mut self,
        from: EntityId,
        label: &str,
        value: impl Into<EdgeValue>,
    ) -> &mut Edge {
        self.make(from, label, value).set_relation(Relation::Control)
    }

    /// Add an edge tagged as payload data
    pub fn make_data(
        &mut self,
        from: EntityId,
        label: &str,
        value: impl Into<EdgeValue>,
    ) -> &mut Edge {
        self.make(from, label, value).set_relation(Relation::Data)
    }

    /// Add an edge tagged as observed output
    pub fn make_output(
        &mut self,
        from: EntityId,
        label: &str,
        value: impl Into<EdgeValue>,
    ) -> &mut Edge {
        self.make(from, label, value).set_relation(Relation::Output)
    }

    /// Add an edge recording an error observation
    pub fn make_error(
        &mut self,
        from: EntityId,
        label: &str,
        error: &dyn fmt::Display,
    ) -> &mut Edge {
        self.make(from, label, error.to_string())
            .set_relation(Relation::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Details;

    impl JsonSnapshotable for Details {
        fn export_to_json_snapshot(
            &self,
            snapshot: &mut JsonSnapshot,
            entity: EntityId,
        ) -> Result<()> {
            let mut builder = snapshot.edge_builder();
            builder.make(entity, "DetailR", 3.14);
            builder.make(entity, "DetailB", true);
            Ok(())
        }
    }

    struct Data<'a> {
        name: &'a str,
        param: i64,
        details: Option<&'a Details>,
    }

    impl JsonSnapshotable for Data<'_> {
        fn export_to_json_snapshot(
            &self,
            snapshot: &mut JsonSnapshot,
            entity: EntityId,
        ) -> Result<()> {
            snapshot.entity_mut(entity).add_metadata("name", self.name);
            snapshot.entity_mut(entity).add_metadata("param", self.param);
            if let Some(details) = self.details {
                let node = snapshot.make_entity_for_data(details)?;
                snapshot.edge_builder().make(entity, "Data", node);
            }
            Ok(())
        }
    }

    struct Failing;

    impl JsonSnapshotable for Failing {
        fn export_to_json_snapshot(
            &self,
            _snapshot: &mut JsonSnapshot,
            _entity: EntityId,
        ) -> Result<()> {
            Err(Error::Serialization("bad payload".to_string()))
        }

        fn snapshot_summary(&self) -> Option<String> {
            Some("failing fixture".to_string())
        }
    }

    #[test]
    fn test_export_builds_entity_with_edges() {
        let details = Details;
        let data = Data {
            name: "NAME",
            param: 1234,
            details: Some(&details),
        };

        let mut snapshot = JsonSnapshot::new();
        let root = snapshot.add_data(&data).unwrap();

        let entity = snapshot.entity(root);
        assert_eq!(entity.metadata().get("name"), Some(&json!("NAME")));
        assert_eq!(entity.metadata().get("param"), Some(&json!(1234)));
        assert_eq!(entity.edges().len(), 1);
        assert_eq!(entity.edges()[0].label(), "Data");
        assert_eq!(snapshot.entity_count(), 2);
    }

    #[test]
    fn test_shared_object_becomes_one_node() {
        let details = Details;
        let first = Data {
            name: "first",
            param: 1,
            details: Some(&details),
        };
        let second = Data {
            name: "second",
            param: 2,
            details: Some(&details),
        };

        let mut snapshot = JsonSnapshot::new();
        snapshot.add_data(&first).unwrap();
        snapshot.add_data(&second).unwrap();

        // Two roots plus one shared details node.
        assert_eq!(snapshot.entity_count(), 3);
        assert_eq!(snapshot.roots().len(), 2);
    }

    #[test]
    fn test_revisiting_data_reuses_the_entity() {
        let details = Details;
        let mut snapshot = JsonSnapshot::new();
        let first = snapshot.make_entity_for_data(&details).unwrap();
        let second = snapshot.make_entity_for_data(&details).unwrap();
        assert_eq!(first, second);
        assert_eq!(snapshot.entity_count(), 1);
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let build = || {
            let details = Details;
            let data = Data {
                name: "NAME",
                param: 7,
                details: Some(&details),
            };
            let mut snapshot = JsonSnapshot::new();
            snapshot.add_data(&data).unwrap();
            serde_json::to_string(&snapshot.to_json_object()).unwrap()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_serialized_document_shape() {
        let data = Data {
            name: "NAME",
            param: 1,
            details: None,
        };
        let mut snapshot = JsonSnapshot::new();
        let root = snapshot.add_data(&data).unwrap();

        let document = snapshot.to_json_object();
        assert_eq!(document["_subject_id"], json!(root.raw()));
        let entity = &document["entities"][root.raw().to_string()];
        assert_eq!(entity["_id"], json!(root.raw()));
        assert_eq!(entity["name"], json!("NAME"));
    }

    #[test]
    fn test_edge_relations_and_metadata() {
        let mut snapshot = JsonSnapshot::new();
        let entity = snapshot.new_entity(Some("operation"));
        {
            let mut builder = snapshot.edge_builder();
            builder.make_control(entity, "Base URL", "http://localhost");
            builder.make_output(entity, "Response", "{}").add_metadata("format", "json");
            builder.make_error(entity, "Fault", &"connection refused");
        }

        let edges = snapshot.entity(entity).edges();
        assert_eq!(edges[0].relation(), Some(Relation::Control));
        assert_eq!(edges[1].relation(), Some(Relation::Output));
        assert_eq!(edges[2].relation(), Some(Relation::Error));
        assert_eq!(
            edges[2].value(),
            &EdgeValue::Literal(json!("connection refused"))
        );
    }

    #[test]
    fn test_mechanism_edge_materializes_the_mechanism() {
        let details = Details;
        let mut snapshot = JsonSnapshot::new();
        let entity = snapshot.new_entity(None);
        snapshot
            .edge_builder()
            .make_mechanism(entity, "Producer", &details)
            .unwrap();

        let edges = snapshot.entity(entity).edges();
        assert_eq!(edges[0].relation(), Some(Relation::Mechanism));
        assert!(matches!(edges[0].value(), EdgeValue::Node(_)));
        assert_eq!(snapshot.entity_count(), 2);
    }

    #[test]
    fn test_export_failure_identifies_the_subject() {
        let mut snapshot = JsonSnapshot::new();
        let err = snapshot.add_data(&Failing).unwrap_err();
        match err {
            Error::SnapshotExport { subject, reason } => {
                assert_eq!(subject, "failing fixture");
                assert!(reason.contains("bad payload"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_determine_valid_relation_over_bools() {
        assert_eq!(determine_valid_relation(&true), Relation::Valid);
        assert_eq!(determine_valid_relation(&false), Relation::Invalid);
    }

    #[test]
    fn test_object_count_to_summary() {
        assert_eq!(object_count_to_summary(1, "mapped result"), "1 mapped result");
        assert_eq!(object_count_to_summary(3, "mapped result"), "3 mapped results");
        assert_eq!(object_count_to_summary(0, "mapped result"), "0 mapped results");
    }

    #[test]
    fn test_relation_tokens() {
        assert_eq!(Relation::Valid.as_str(), "VALID");
        assert_eq!(Relation::Invalid.as_str(), "INVALID");
        assert_eq!(serde_json::to_value(Relation::Mechanism).unwrap(), json!("MECHANISM"));
    }
}
