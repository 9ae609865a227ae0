//! Model-level queries.
//!
//! `ModelQuery<M>` wraps the `QueryBuilder` of a model's table and knows how
//! to resolve the model's relations, which is what the aggregate helpers
//! need.

use std::fmt;
use std::marker::PhantomData;

use crate::aggregate::{self, WithAggregates};
use crate::bind::{BindProxy, BindValue};
use crate::error::AggregateResult;
use crate::query::{Column, QueryBuilder};
use crate::relation::{IntoRelations, RelationRegistry};

/// A query over the table of model `M`.
pub struct ModelQuery<M> {
    query: QueryBuilder,
    _model: PhantomData<fn() -> M>,
}

impl<M: RelationRegistry> ModelQuery<M> {
    /// Creates an unselected query over `M`'s table.
    pub fn new() -> Self {
        Self {
            query: QueryBuilder::new(&M::scheme().table_name),
            _model: PhantomData,
        }
    }

    /// Adds subselects counting the related rows of each relation, named
    /// `<relation>_count` unless aliased with `"relation as name"`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// User::aggregate_query().with_count(["posts", "comments as replies"])?;
    /// ```
    pub fn with_count<R: IntoRelations>(&mut self, relations: R) -> AggregateResult<&mut Self> {
        aggregate::with_count::<M, R>(&mut self.query, relations)?;
        Ok(self)
    }
}

impl<M> ModelQuery<M> {
    pub fn query(&self) -> &QueryBuilder {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut QueryBuilder {
        &mut self.query
    }

    pub fn into_query(self) -> QueryBuilder {
        self.query
    }

    pub fn columns(&self) -> Option<&[Column]> {
        self.query.columns()
    }

    /// Replaces the projection list.
    pub fn select<I, C>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.query.select(columns);
        self
    }

    /// Adds a WHERE condition with the given statement and parameters.
    ///
    /// The statement should use "{}" as parameter placeholders.
    pub fn where_(&mut self, clause: &str, params: &[&dyn BindProxy]) -> &mut Self {
        self.query.where_(clause, params);
        self
    }

    pub fn get_bindings(&self) -> Vec<BindValue> {
        self.query.get_bindings()
    }

    pub fn to_sql(&self) -> String {
        self.query.to_sql()
    }

    /// Builds the query and returns an interned SQL string.
    pub fn build(&self) -> &'static str {
        self.query.build()
    }
}

impl<M: RelationRegistry> Default for ModelQuery<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for ModelQuery<M> {
    fn clone(&self) -> Self {
        Self {
            query: self.query.clone(),
            _model: PhantomData,
        }
    }
}

impl<M> fmt::Debug for ModelQuery<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelQuery")
            .field("model", &std::any::type_name::<M>())
            .field("query", &self.query)
            .finish()
    }
}

impl<M: RelationRegistry> WithAggregates for ModelQuery<M> {
    fn with_aggregate<R: IntoRelations>(
        &mut self,
        kind: &str,
        relations: R,
        expression: &str,
    ) -> AggregateResult<&mut Self> {
        aggregate::with_aggregate::<M, R>(&mut self.query, kind, relations, expression)?;
        Ok(self)
    }
}

/// Models whose queries support `with_count` and the aggregate helpers.
///
/// Implemented for every `RelationRegistry`, so `#[derive(Aggregates)]` is
/// all a model needs.
pub trait HasAggregates: RelationRegistry + Sized {
    fn aggregate_query() -> ModelQuery<Self> {
        ModelQuery::new()
    }
}

impl<T: RelationRegistry> HasAggregates for T {}

// Execution against the enabled backend. Rows are returned as-is.
macro_rules! impl_fetch {
    ($feature:literal, $db:ty, $pool:ty, $row:ty) => {
        #[cfg(feature = $feature)]
        impl<M> ModelQuery<M> {
            fn bind_values<'q>(
                mut query: sqlx::query::Query<'q, $db, <$db as sqlx::database::HasArguments<'q>>::Arguments>,
                values: Vec<BindValue>,
            ) -> sqlx::query::Query<'q, $db, <$db as sqlx::database::HasArguments<'q>>::Arguments> {
                #[cfg(feature = "log_sql")]
                tracing::debug!(
                    "[SQLxAggregates] BINDINGS: {:?}",
                    values.iter().map(BindValue::debug).collect::<Vec<_>>()
                );
                for value in values {
                    query = match value {
                        BindValue::String(s) => query.bind(s),
                        BindValue::I16(i) => query.bind(i),
                        BindValue::I32(i) => query.bind(i),
                        BindValue::I64(i) => query.bind(i),
                        BindValue::F32(f) => query.bind(f),
                        BindValue::F64(f) => query.bind(f),
                        BindValue::Bool(b) => query.bind(b),
                        BindValue::Binary(bytes) => query.bind(bytes),
                        BindValue::Null => query.bind(None::<String>),
                    };
                }
                query
            }

            /// Execute the query and fetch all rows.
            pub async fn fetch_all(&self, pool: &$pool) -> AggregateResult<Vec<$row>> {
                let query = Self::bind_values(sqlx::query::<$db>(self.build()), self.get_bindings());
                Ok(query.fetch_all(pool).await?)
            }

            /// Execute the query and fetch exactly one row.
            pub async fn fetch_one(&self, pool: &$pool) -> AggregateResult<$row> {
                let query = Self::bind_values(sqlx::query::<$db>(self.build()), self.get_bindings());
                Ok(query.fetch_one(pool).await?)
            }
        }
    };
}

impl_fetch!("postgres", sqlx::Postgres, sqlx::PgPool, sqlx::postgres::PgRow);
impl_fetch!("mysql", sqlx::MySql, sqlx::MySqlPool, sqlx::mysql::MySqlRow);
impl_fetch!("sqlite", sqlx::Sqlite, sqlx::SqlitePool, sqlx::sqlite::SqliteRow);
