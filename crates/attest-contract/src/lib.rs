//! Attest Contract - predicate and result algebra over JSON values
//!
//! A [`ValuePredicate`] decides whether a JSON value is acceptable and
//! answers with a [`PredicateResult`] - never with a panic or an error:
//! outcomes are data, and unexpected input shapes degrade to invalid
//! results carrying their cause. Results compose into ordered composite
//! results whose overall validity is chosen by the caller, and every
//! result exports itself into the snapshot graph for the journal.
//!
//! # Example
//!
//! ```rust,ignore
//! use attest_contract::{CompositePredicateResultBuilder, ValuePredicate};
//!
//! let mut builder = CompositePredicateResultBuilder::new(pred.clone());
//! for value in observed {
//!     builder.append_result(pred.evaluate(&value));
//! }
//! // Aggregation policy belongs to the caller.
//! let all_good = builder.results().iter().all(|r| r.valid());
//! let composite = builder.build(all_good);
//! journal.store(&composite)?;
//! ```

mod error;
mod predicate;

pub use error::EvalError;
pub use predicate::{
    CompositePredicateResultBuilder, PredicateCause, PredicateResult, ValuePredicate,
};
