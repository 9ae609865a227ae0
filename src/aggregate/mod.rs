//! Aggregate subselect support.
//!
//! This module provides `with_max`, `with_min`, `with_avg` and `with_sum`:
//! each adds one correlated `(SELECT AGG(expression) ...) AS name` column per
//! relation to the outer query.

mod composer;

pub(crate) use composer::{with_aggregate, with_count};

use std::str::FromStr;

use crate::error::{AggregateError, AggregateResult};
use crate::query::QueryBuilder;
use crate::relation::IntoRelations;

/// Aggregate function applied to the related rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateKind {
    Max,
    Min,
    Avg,
    Sum,
}

impl AggregateKind {
    /// The lowercase name, also used as the default column suffix.
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateKind::Max => "max",
            AggregateKind::Min => "min",
            AggregateKind::Avg => "avg",
            AggregateKind::Sum => "sum",
        }
    }

    pub fn sql_function(&self) -> &'static str {
        match self {
            AggregateKind::Max => "MAX",
            AggregateKind::Min => "MIN",
            AggregateKind::Avg => "AVG",
            AggregateKind::Sum => "SUM",
        }
    }

    /// `FUNC(expression)`, e.g. `MAX(likes)`.
    pub fn wrap(&self, expression: &str) -> String {
        format!("{}({})", self.sql_function(), expression)
    }
}

impl FromStr for AggregateKind {
    type Err = AggregateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "max" => Ok(AggregateKind::Max),
            "min" => Ok(AggregateKind::Min),
            "avg" => Ok(AggregateKind::Avg),
            "sum" => Ok(AggregateKind::Sum),
            other => Err(AggregateError::InvalidAggregateType(other.to_string())),
        }
    }
}

impl std::fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A correlated scalar subquery and the column name it is selected as.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSubselect {
    pub query: QueryBuilder,
    pub alias: String,
}

/// Aggregate subselect helpers for a model query.
///
/// Relations may be given as a single name, a list of names, or scoped
/// specs; `"posts as best"` selects the result as `best` instead of the
/// default `posts_<kind>`.
///
/// Calls with an empty kind, no relations or an empty expression leave the
/// query untouched. Every other call appends one column per relation, even
/// if an identical column was appended before.
///
/// # Example
///
/// ```ignore
/// let mut query = User::aggregate_query();
/// query
///     .with_max("posts", "likes")?
///     .with_sum(["orders", "orders as paid_total"], "amount")?;
/// ```
pub trait WithAggregates: Sized {
    /// Adds subselects applying `kind` (`max`, `min`, `avg` or `sum`) to
    /// `expression` over each relation.
    fn with_aggregate<R: IntoRelations>(
        &mut self,
        kind: &str,
        relations: R,
        expression: &str,
    ) -> AggregateResult<&mut Self>;

    fn with_max<R: IntoRelations>(&mut self, relations: R, expression: &str) -> AggregateResult<&mut Self> {
        self.with_aggregate(AggregateKind::Max.as_str(), relations, expression)
    }

    fn with_min<R: IntoRelations>(&mut self, relations: R, expression: &str) -> AggregateResult<&mut Self> {
        self.with_aggregate(AggregateKind::Min.as_str(), relations, expression)
    }

    fn with_avg<R: IntoRelations>(&mut self, relations: R, expression: &str) -> AggregateResult<&mut Self> {
        self.with_aggregate(AggregateKind::Avg.as_str(), relations, expression)
    }

    fn with_sum<R: IntoRelations>(&mut self, relations: R, expression: &str) -> AggregateResult<&mut Self> {
        self.with_aggregate(AggregateKind::Sum.as_str(), relations, expression)
    }
}
