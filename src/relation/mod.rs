//! Relation metadata and the per-model relation registry.
//!
//! A `Relation` knows how the related table links back to its parent and
//! builds the correlated "existence" subquery used by `with_count` and the
//! aggregate helpers. It also carries the relation's own constraints as a
//! query on the related table.

mod spec;

pub use spec::{parse_with_relations, IntoRelations, RelationSpec, Scope};

use crate::bind::BindProxy;
use crate::error::{AggregateError, AggregateResult};
use crate::query::{Column, QueryBuilder};
use crate::Scheme;

/// How the related table is linked to its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    /// `related.foreign_key` points at `parent.local_key`.
    HasOne { foreign_key: String, local_key: String },
    /// `related.foreign_key` points at `parent.local_key`.
    HasMany { foreign_key: String, local_key: String },
    /// `parent.foreign_key` points at `related.owner_key`.
    BelongsTo { foreign_key: String, owner_key: String },
    /// Linked through `pivot_table`: `pivot.foreign_pivot_key` points at
    /// `parent.parent_key` and `pivot.related_pivot_key` at `related.related_key`.
    BelongsToMany {
        pivot_table: String,
        foreign_pivot_key: String,
        related_pivot_key: String,
        parent_key: String,
        related_key: String,
    },
}

/// Resolved metadata of a named relation.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    name: String,
    parent: Scheme,
    related: Scheme,
    kind: RelationKind,
    query: QueryBuilder,
}

impl Relation {
    pub fn new(name: &str, parent: &Scheme, related: &Scheme, kind: RelationKind) -> Self {
        Self {
            name: name.to_string(),
            parent: parent.clone(),
            related: related.clone(),
            kind,
            query: QueryBuilder::new(&related.table_name),
        }
    }

    /// Adds a constraint the relation always applies to the related table.
    ///
    /// The clause is emitted as written. For a self relation the related
    /// side is aliased `self_<table>`, so qualify its columns with that alias:
    /// `users.active` would refer to the outer row instead.
    ///
    /// # Example
    ///
    /// ```ignore
    /// Relation::new("published_posts", users, posts, kind)
    ///     .where_("posts.published = {}", &[&true])
    /// ```
    pub fn where_(mut self, clause: &str, params: &[&dyn BindProxy]) -> Self {
        self.query.where_(clause, params);
        self
    }

    /// Adds a parameterless constraint. Qualification follows `where_`.
    pub fn constraint(self, clause: &str) -> Self {
        self.where_(clause, &[])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &RelationKind {
        &self.kind
    }

    pub fn parent(&self) -> &Scheme {
        &self.parent
    }

    pub fn related(&self) -> &Scheme {
        &self.related
    }

    /// The relation's own constraints, as a query on the related table.
    pub fn query(&self) -> &QueryBuilder {
        &self.query
    }

    /// A fresh, unconstrained query on the related table.
    pub fn related_query(&self) -> QueryBuilder {
        QueryBuilder::new(&self.related.table_name)
    }

    /// Whether the relation points back at its own table.
    pub fn is_self_relation(&self) -> bool {
        self.parent.table_name == self.related.table_name
    }

    /// Turns `query` into a subquery correlated with `parent_query`,
    /// projecting only `projection`.
    ///
    /// For a self relation the related side is aliased `self_<table>` so
    /// the correlation does not compare the table with itself.
    pub fn existence_query(
        &self,
        mut query: QueryBuilder,
        parent_query: &QueryBuilder,
        projection: Column,
    ) -> QueryBuilder {
        if self.is_self_relation() {
            query.alias_as(&format!("self_{}", self.related.table_name));
        }

        let parent = parent_query.table_ref().to_string();
        let related = query.table_ref().to_string();

        query.select([projection]);

        match &self.kind {
            RelationKind::HasOne { foreign_key, local_key }
            | RelationKind::HasMany { foreign_key, local_key } => {
                query.where_column(
                    &format!("{}.{}", parent, local_key),
                    "=",
                    &format!("{}.{}", related, foreign_key),
                );
            }
            RelationKind::BelongsTo { foreign_key, owner_key } => {
                query.where_column(
                    &format!("{}.{}", parent, foreign_key),
                    "=",
                    &format!("{}.{}", related, owner_key),
                );
            }
            RelationKind::BelongsToMany {
                pivot_table,
                foreign_pivot_key,
                related_pivot_key,
                parent_key,
                related_key,
            } => {
                query.join(
                    pivot_table,
                    &format!(
                        "{}.{} = {}.{}",
                        related, related_key, pivot_table, related_pivot_key
                    ),
                );
                query.where_column(
                    &format!("{}.{}", parent, parent_key),
                    "=",
                    &format!("{}.{}", pivot_table, foreign_pivot_key),
                );
            }
        }

        query
    }
}

/// Explicit relation lookup for a model type.
///
/// Usually implemented with `#[derive(Aggregates)]`.
pub trait RelationRegistry {
    fn scheme() -> &'static Scheme;

    /// Looks up a relation by name.
    fn relation(name: &str) -> Option<Relation>;

    /// Resolves a relation without any per-parent constraint, failing with
    /// `RelationNotFound` for unknown names.
    fn relation_without_constraints(name: &str) -> AggregateResult<Relation> {
        Self::relation(name).ok_or_else(|| AggregateError::RelationNotFound {
            model: Self::scheme().table_name.clone(),
            relation: name.to_string(),
        })
    }
}
