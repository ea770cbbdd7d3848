//! Predicates over JSON values and their composable results

use attest_core::{
    determine_valid_relation, object_count_to_summary, EntityId, JsonSnapshot, JsonSnapshotable,
    Validity,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::EvalError;

/// A condition evaluated against a JSON value
///
/// The contract: evaluation always produces a [`PredicateResult`].
/// Implementations must absorb unexpected input shapes internally and
/// degrade to an invalid result whose cause names the failure - the
/// signature leaves no channel for an escape.
pub trait ValuePredicate: JsonSnapshotable + Send + Sync {
    /// Apply this predicate to `value`
    fn evaluate(&self, value: &Value) -> PredicateResult;

    /// Short name used in snapshots and summaries
    fn name(&self) -> &str;
}

/// Upstream reason a result came out the way it did
///
/// A tagged union: either an evaluation failure (exception-like, whose
/// equality ignores payload) or a nested result (compared by value).
#[derive(Debug, Clone)]
pub enum PredicateCause {
    /// An evaluation failure
    Error(EvalError),
    /// A nested result explaining this one
    Result(Box<PredicateResult>),
}

impl PartialEq for PredicateCause {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // Failure kinds do not support payload equality; two causes
            // of the same kind count as the same cause.
            (PredicateCause::Error(a), PredicateCause::Error(b)) => a.kind_eq(b),
            (PredicateCause::Result(a), PredicateCause::Result(b)) => a == b,
            _ => false,
        }
    }
}

impl From<EvalError> for PredicateCause {
    fn from(error: EvalError) -> Self {
        PredicateCause::Error(error)
    }
}

impl From<PredicateResult> for PredicateCause {
    fn from(result: PredicateResult) -> Self {
        PredicateCause::Result(Box::new(result))
    }
}

#[derive(Clone)]
struct CompositeParts {
    pred: Arc<dyn ValuePredicate>,
    results: Vec<PredicateResult>,
}

impl fmt::Debug for CompositeParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeParts")
            .field("pred", &self.pred.name())
            .field("results", &self.results)
            .finish()
    }
}

/// Outcome of evaluating a predicate
///
/// Immutable once constructed. Plain results carry a verdict, comment
/// and optional cause; composite results (built through
/// [`CompositePredicateResultBuilder`]) additionally carry the
/// producing predicate and an ordered list of child results, which may
/// themselves be composite.
#[derive(Debug, Clone)]
pub struct PredicateResult {
    valid: bool,
    comment: String,
    cause: Option<PredicateCause>,
    composite: Option<CompositeParts>,
}

impl PredicateResult {
    /// Create a plain result
    pub fn new(valid: bool, comment: impl Into<String>) -> Self {
        Self {
            valid,
            comment: comment.into(),
            cause: None,
            composite: None,
        }
    }

    /// Create a plain result with an upstream cause
    pub fn with_cause(
        valid: bool,
        comment: impl Into<String>,
        cause: impl Into<PredicateCause>,
    ) -> Self {
        Self {
            valid,
            comment: comment.into(),
            cause: Some(cause.into()),
            composite: None,
        }
    }

    /// Whether the evaluated value was acceptable
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Reporting comment; may be empty
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Upstream cause, if any
    pub fn cause(&self) -> Option<&PredicateCause> {
        self.cause.as_ref()
    }

    /// Whether this result aggregates child results
    pub fn is_composite(&self) -> bool {
        self.composite.is_some()
    }

    /// The predicate that produced a composite result
    pub fn pred(&self) -> Option<&Arc<dyn ValuePredicate>> {
        self.composite.as_ref().map(|parts| &parts.pred)
    }

    /// Child results in append order; empty for plain results
    pub fn results(&self) -> &[PredicateResult] {
        self.composite
            .as_ref()
            .map(|parts| parts.results.as_slice())
            .unwrap_or(&[])
    }

    /// One-line description, e.g. `"PredicateResult (GOOD)"`
    pub fn summary(&self) -> String {
        let name = if self.is_composite() {
            "CompositePredicateResult"
        } else {
            "PredicateResult"
        };
        let verdict = if self.valid { "GOOD" } else { "BAD" };
        format!("{} ({})", name, verdict)
    }

    fn export_composite(
        &self,
        parts: &CompositeParts,
        snapshot: &mut JsonSnapshot,
        entity: EntityId,
    ) -> attest_core::Result<()> {
        snapshot
            .edge_builder()
            .make_mechanism(entity, "Predicate", parts.pred.as_ref())?;

        let count = parts.results.len();
        snapshot
            .edge_builder()
            .make(entity, "#", count)
            .set_summary(object_count_to_summary(count, "mapped result"));

        let result_entity = snapshot.new_entity(Some("Composite Results"));
        for (index, result) in parts.results.iter().enumerate() {
            let node = snapshot.make_entity_for_data(result)?;
            let label = format!("[{}]", index);
            snapshot
                .edge_builder()
                .make(result_entity, &label, node)
                .set_relation(determine_valid_relation(result))
                .set_summary(result.summary());
        }
        snapshot
            .edge_builder()
            .make(entity, "Results", result_entity)
            .set_relation(determine_valid_relation(self));
        Ok(())
    }
}

impl Validity for PredicateResult {
    fn is_valid(&self) -> bool {
        self.valid
    }
}

impl PartialEq for PredicateResult {
    /// Same concrete kind, same verdict and comment, equal causes; for
    /// composites, the same producing predicate and equal children.
    fn eq(&self, other: &Self) -> bool {
        match (&self.composite, &other.composite) {
            (None, None) => {
                self.valid == other.valid
                    && self.comment == other.comment
                    && self.cause == other.cause
            }
            (Some(a), Some(b)) => Arc::ptr_eq(&a.pred, &b.pred) && a.results == b.results,
            _ => false,
        }
    }
}

impl fmt::Display for PredicateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.comment.is_empty() {
            return f.write_str(&self.comment);
        }
        let name = if self.is_composite() {
            "CompositePredicateResult"
        } else {
            "PredicateResult"
        };
        let verdict = if self.valid { "OK" } else { "FAILURE" };
        write!(f, "{} is {}", name, verdict)
    }
}

impl JsonSnapshotable for PredicateResult {
    fn export_to_json_snapshot(
        &self,
        snapshot: &mut JsonSnapshot,
        entity: EntityId,
    ) -> attest_core::Result<()> {
        if let Some(parts) = &self.composite {
            self.export_composite(parts, snapshot, entity)?;
        }

        let relation = determine_valid_relation(self);
        {
            let mut builder = snapshot.edge_builder();
            builder.make(entity, "Valid", self.valid).set_relation(relation);
            if !self.comment.is_empty() {
                builder.make(entity, "Comment", self.comment.as_str());
            }
        }
        match &self.cause {
            Some(PredicateCause::Error(error)) => {
                snapshot.edge_builder().make_error(entity, "Cause", error);
            }
            Some(PredicateCause::Result(result)) => {
                let node = snapshot.make_entity_for_data(result.as_ref())?;
                snapshot.edge_builder().make(entity, "Cause", node);
            }
            None => {}
        }

        // Stamp the verdict so aggregators nesting this result can pick
        // it up without re-deriving it.
        snapshot
            .entity_mut(entity)
            .add_metadata("_default_relation", relation.as_str());
        Ok(())
    }

    fn snapshot_summary(&self) -> Option<String> {
        Some(self.summary())
    }
}

/// Accumulator for composite results
///
/// Collects child results in order, then finalizes with a
/// caller-supplied overall validity: the builder never infers an
/// aggregation policy (AND, OR, majority, ...) from its children, and
/// never checks the supplied verdict against them.
pub struct CompositePredicateResultBuilder {
    pred: Arc<dyn ValuePredicate>,
    comment: String,
    cause: Option<PredicateCause>,
    results: Vec<PredicateResult>,
}

impl CompositePredicateResultBuilder {
    /// Create a builder for results produced by `pred`
    pub fn new(pred: Arc<dyn ValuePredicate>) -> Self {
        Self {
            pred,
            comment: String::new(),
            cause: None,
            results: Vec::new(),
        }
    }

    /// Append one child result
    pub fn append_result(&mut self, result: PredicateResult) {
        self.results.push(result);
    }

    /// Append a sequence of child results in order
    pub fn extend_results(&mut self, results: impl IntoIterator<Item = PredicateResult>) {
        self.results.extend(results);
    }

    /// Set the overall comment
    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    /// Set the overall cause
    pub fn set_cause(&mut self, cause: impl Into<PredicateCause>) {
        self.cause = Some(cause.into());
    }

    /// Children accumulated so far, for callers deciding the verdict
    pub fn results(&self) -> &[PredicateResult] {
        &self.results
    }

    /// Finalize with the caller-chosen overall validity
    pub fn build(self, valid: bool) -> PredicateResult {
        PredicateResult {
            valid,
            comment: self.comment,
            cause: self.cause,
            composite: Some(CompositeParts {
                pred: self.pred,
                results: self.results,
            }),
        }
    }
}
