//! Query state shared by model queries and relation subqueries.
//!
//! `QueryBuilder` keeps the projection, joins, where clauses and the
//! clause-keyed bindings of a SELECT statement, and compiles them with
//! `{}` placeholders numbered for the enabled backend.

mod builder;

pub use builder::{BindingClause, Column, Join, JoinType, QueryBuilder, Where};
