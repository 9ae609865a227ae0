//! Correlated aggregate subselects for sqlx-backed model queries.
//!
//! `with_max`, `with_min`, `with_avg` and `with_sum` attach one
//! `(SELECT AGG(expr) FROM related WHERE ...) AS name` column per relation to
//! a model query, the same way `with_count` attaches relation counts.
//!
//! ```ignore
//! use sqlx_struct_aggregates::{Aggregates, HasAggregates, WithAggregates};
//!
//! #[derive(Aggregates)]
//! #[table_name = "users"]
//! #[relation(has_many = "Post", name = "posts", foreign_key = "user_id")]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! let mut query = User::aggregate_query();
//! query.with_max(["posts", "posts as best_post"], "likes")?;
//! // SELECT users.*, (SELECT MAX(likes) FROM posts WHERE users.id = posts.user_id) AS posts_max, ...
//! let rows = query.fetch_all(&pool).await?;
//! ```

pub mod aggregate;
pub mod bind;
pub mod error;
pub mod model;
pub mod query;
pub mod relation;

pub use sqlx_aggregates_macros::Aggregates;
pub use aggregate::{AggregateKind, AggregateSubselect, WithAggregates};
pub use bind::{BindProxy, BindValue};
pub use error::{AggregateError, AggregateResult};
pub use model::{HasAggregates, ModelQuery};
pub use query::{BindingClause, Column, Join, JoinType, QueryBuilder, Where};
pub use relation::{IntoRelations, Relation, RelationKind, RelationRegistry, RelationSpec, Scope};

// Used by the code generated from `#[derive(Aggregates)]`.
#[doc(hidden)]
pub use once_cell::sync::Lazy;

use once_cell::sync::Lazy as SyncLazy;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

// Placeholder style is chosen at compile time, so only one backend may be enabled.
#[cfg(all(feature = "postgres", feature = "mysql"))]
compile_error!("Cannot enable both 'postgres' and 'mysql' features simultaneously. Please choose one database backend.");

#[cfg(all(feature = "postgres", feature = "sqlite"))]
compile_error!("Cannot enable both 'postgres' and 'sqlite' features simultaneously. Please choose one database backend.");

#[cfg(all(feature = "mysql", feature = "sqlite"))]
compile_error!("Cannot enable both 'mysql' and 'sqlite' features simultaneously. Please choose one database backend.");

#[cfg(feature = "postgres")]
fn get_db() -> DbType {
    DbType::PostgreSQL
}

#[cfg(all(feature = "mysql", not(feature = "postgres"), not(feature = "sqlite")))]
fn get_db() -> DbType {
    DbType::MySQL
}

#[cfg(all(feature = "sqlite", not(feature = "postgres"), not(feature = "mysql")))]
fn get_db() -> DbType {
    DbType::SQLite
}

#[cfg(not(any(feature = "postgres", feature = "mysql", feature = "sqlite")))]
fn get_db() -> DbType {
    compile_error!("You must enable one of the database features: postgres, mysql, or sqlite")
}

#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
enum DbType {
    PostgreSQL,
    MySQL,
    SQLite,
}

/// Translates a parameter placeholder to the database-specific format.
///
/// - PostgreSQL: `$1`, `$2`, ...
/// - MySQL/SQLite: `?` for every parameter
fn param_trans(index: usize) -> String {
    match get_db() {
        DbType::PostgreSQL => format!("${}", index),
        DbType::MySQL | DbType::SQLite => "?".to_string(),
    }
}

// Parameter slots are stored as this control character, never as `{}`, so
// raw SQL fragments containing `{}` pass through compilation untouched.
const PARAM_MARKER: char = '\u{1}';

/// Turns the `{}` placeholders of a caller clause into parameter slots.
fn mark_params(clause: &str) -> String {
    clause.replace("{}", &PARAM_MARKER.to_string())
}

/// Replaces every parameter slot in a compiled statement with the backend's
/// parameter marker, numbering from `start`.
///
/// # Example
///
/// ```ignore
/// prepare_placeholders(&mark_params("name = {} AND age = {}"), 1);
/// // PostgreSQL: "name = $1 AND age = $2"
/// // MySQL/SQLite: "name = ? AND age = ?"
/// ```
fn prepare_placeholders(sql: &str, start: usize) -> String {
    let mut prepared = String::with_capacity(sql.len());
    let mut index = start;

    for c in sql.chars() {
        if c == PARAM_MARKER {
            prepared.push_str(&param_trans(index));
            index += 1;
        } else {
            prepared.push(c);
        }
    }

    prepared
}

// Interned SQL statements, kept for the whole program so sqlx can borrow them.
static SQL_CACHE: SyncLazy<Mutex<HashMap<String, &'static str>>> =
    SyncLazy::new(|| Mutex::new(HashMap::new()));

/// Returns a `&'static str` for a compiled statement, leaking each distinct
/// statement at most once.
fn intern_sql(sql: String) -> &'static str {
    let mut cache = SQL_CACHE.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(interned) = cache.get(&sql) {
        return interned;
    }
    let interned: &'static str = Box::leak(sql.clone().into_boxed_str());
    cache.insert(sql, interned);
    interned
}

/// Table metadata of a model registered for aggregate queries.
///
/// `#[derive(Aggregates)]` builds one static `Scheme` per model: the table
/// name comes from `#[table_name = "..."]` or the snake_cased struct name and
/// the primary key is the first field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheme {
    pub table_name: String,
    pub id_field: String,
}

impl Scheme {
    pub fn new(table_name: &str, id_field: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            id_field: id_field.to_string(),
        }
    }
}

/// Converts a name to snake_case.
///
/// An underscore is inserted before every uppercase character that is not
/// the first character, then everything is lowercased.
///
/// ```ignore
/// to_snake_case("blogPosts_max");  // "blog_posts_max"
/// to_snake_case("MyTable");        // "my_table"
/// ```
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() * 2);

    for (i, c) in s.char_indices() {
        if i > 0 && c.is_uppercase() {
            result.push('_');
        }
        result.extend(c.to_lowercase());
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_placeholders() {
        let sql = prepare_placeholders(&mark_params("a = {} AND b = {}"), 1);

        #[cfg(feature = "postgres")]
        assert_eq!(sql, "a = $1 AND b = $2");

        #[cfg(not(feature = "postgres"))]
        assert_eq!(sql, "a = ? AND b = ?");
    }

    #[test]
    fn test_prepare_placeholders_offset() {
        let sql = prepare_placeholders(&mark_params("x > {}"), 3);

        #[cfg(feature = "postgres")]
        assert_eq!(sql, "x > $3");

        #[cfg(not(feature = "postgres"))]
        assert_eq!(sql, "x > ?");
    }

    #[test]
    fn test_prepare_placeholders_without_markers() {
        assert_eq!(prepare_placeholders("SELECT 1", 1), "SELECT 1");
    }

    #[test]
    fn test_unmarked_braces_are_not_parameters() {
        let sql = format!("COALESCE(tags, '{{}}') = {}", mark_params("{}"));
        let prepared = prepare_placeholders(&sql, 1);

        assert!(prepared.starts_with("COALESCE(tags, '{}') = "));
        assert_eq!(prepared.matches("{}").count(), 1);

        #[cfg(feature = "postgres")]
        assert_eq!(prepared, "COALESCE(tags, '{}') = $1");
    }

    #[test]
    fn test_intern_sql_reuses_statement() {
        let a = intern_sql("SELECT users.* FROM users".to_string());
        let b = intern_sql("SELECT users.* FROM users".to_string());
        assert_eq!(a, b);
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("posts_max"), "posts_max");
        assert_eq!(to_snake_case("blogPosts_sum"), "blog_posts_sum");
        assert_eq!(to_snake_case("UserProfile"), "user_profile");
        assert_eq!(to_snake_case("comments_avg"), "comments_avg");
    }

    #[test]
    fn test_scheme_new() {
        let scheme = Scheme::new("users", "id");
        assert_eq!(scheme.table_name, "users");
        assert_eq!(scheme.id_field, "id");
    }
}
