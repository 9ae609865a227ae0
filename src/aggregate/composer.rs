//! Composition of correlated aggregate subselects.

use super::{AggregateKind, AggregateSubselect};
use crate::error::AggregateResult;
use crate::query::{BindingClause, Column, QueryBuilder};
use crate::relation::{parse_with_relations, IntoRelations, RelationRegistry, RelationSpec};
use crate::to_snake_case;

/// Appends one `kind(expression)` subselect per relation of `M` to `query`.
///
/// Empty `kind`, `relations` or `expression` make this a no-op. Every
/// subselect is built before `query` is touched, so a failure leaves it
/// unchanged.
pub(crate) fn with_aggregate<M, R>(
    query: &mut QueryBuilder,
    kind: &str,
    relations: R,
    expression: &str,
) -> AggregateResult<()>
where
    M: RelationRegistry,
    R: IntoRelations,
{
    let relations = relations.into_relations();
    if kind.is_empty() || relations.is_empty() || expression.is_empty() {
        return Ok(());
    }

    let kind: AggregateKind = kind.parse()?;
    let subselects = compose_subselects::<M>(query, relations, &kind.wrap(expression), kind.as_str())?;
    append_subselects(query, subselects);

    Ok(())
}

/// Appends one `COUNT(*)` subselect per relation of `M` to `query`.
pub(crate) fn with_count<M, R>(query: &mut QueryBuilder, relations: R) -> AggregateResult<()>
where
    M: RelationRegistry,
    R: IntoRelations,
{
    let relations = relations.into_relations();
    if relations.is_empty() {
        return Ok(());
    }

    let subselects = compose_subselects::<M>(query, relations, "COUNT(*)", "count")?;
    append_subselects(query, subselects);

    Ok(())
}

/// Builds the subselects for `relations`, in order, correlated with
/// `parent_query`.
fn compose_subselects<M: RelationRegistry>(
    parent_query: &QueryBuilder,
    relations: Vec<RelationSpec>,
    projection: &str,
    suffix: &str,
) -> AggregateResult<Vec<AggregateSubselect>> {
    let mut subselects = Vec::new();

    for (spec_name, scope) in parse_with_relations(relations) {
        let (name, alias) = split_alias(&spec_name);
        let relation = M::relation_without_constraints(&name)?;

        let mut query = relation.existence_query(
            relation.related_query(),
            parent_query,
            Column::raw(projection),
        );
        query.set_bindings(Vec::new(), BindingClause::Select);

        query.call_scope(scope.as_ref());
        query.merge_constraints_from(relation.query());

        if query.columns().map_or(0, <[Column]>::len) > 1 {
            query.truncate_columns(1);
        }

        let alias = alias.unwrap_or_else(|| to_snake_case(&format!("{}_{}", name, suffix)));
        subselects.push(AggregateSubselect { query, alias });
    }

    Ok(subselects)
}

/// Appends the subselects to `query`, defaulting an unset projection to
/// `<table>.*` first.
fn append_subselects(query: &mut QueryBuilder, subselects: Vec<AggregateSubselect>) {
    if query.columns().is_none() {
        let all_columns = format!("{}.*", query.table_ref());
        query.select([all_columns]);
    }

    for AggregateSubselect { query: subquery, alias } in subselects {
        #[cfg(feature = "log_sql")]
        tracing::debug!("[SQLxAggregates] AGGREGATE COLUMN {}: {}", alias, subquery.to_sql());
        query.select_sub(subquery, &alias);
    }
}

/// Splits `"relation as alias"` into its parts. Anything other than exactly
/// three words with `as` in the middle is a plain relation name.
fn split_alias(name: &str) -> (String, Option<String>) {
    let segments: Vec<&str> = name.split_whitespace().collect();
    if segments.len() == 3 && segments[1].eq_ignore_ascii_case("as") {
        (segments[0].to_string(), Some(segments[2].to_string()))
    } else {
        (name.to_string(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AggregateError;
    use crate::relation::{Relation, RelationKind};
    use crate::Scheme;
    use once_cell::sync::Lazy;

    static USERS: Lazy<Scheme> = Lazy::new(|| Scheme::new("users", "id"));
    static POSTS: Lazy<Scheme> = Lazy::new(|| Scheme::new("posts", "id"));

    struct User;

    impl RelationRegistry for User {
        fn scheme() -> &'static Scheme {
            &USERS
        }

        fn relation(name: &str) -> Option<Relation> {
            match name {
                "posts" => Some(Relation::new(
                    "posts",
                    &USERS,
                    &POSTS,
                    RelationKind::HasMany {
                        foreign_key: "user_id".to_string(),
                        local_key: "id".to_string(),
                    },
                )),
                _ => None,
            }
        }
    }

    #[test]
    fn test_split_alias() {
        assert_eq!(split_alias("posts"), ("posts".to_string(), None));
        assert_eq!(
            split_alias("posts as max_likes"),
            ("posts".to_string(), Some("max_likes".to_string()))
        );
        assert_eq!(
            split_alias("posts AS top"),
            ("posts".to_string(), Some("top".to_string()))
        );
        assert_eq!(split_alias("posts as"), ("posts as".to_string(), None));
        assert_eq!(split_alias("posts is top"), ("posts is top".to_string(), None));
    }

    #[test]
    fn test_default_projection_then_subselect() {
        let mut query = QueryBuilder::new("users");
        with_aggregate::<User, _>(&mut query, "max", "posts", "likes").unwrap();

        assert_eq!(
            query.to_sql(),
            "SELECT users.*, (SELECT MAX(likes) FROM posts WHERE users.id = posts.user_id) AS posts_max FROM users"
        );
    }

    #[test]
    fn test_existing_projection_is_kept() {
        let mut query = QueryBuilder::new("users");
        query.select(["users.id"]);
        with_aggregate::<User, _>(&mut query, "sum", "posts", "likes").unwrap();

        let columns = query.columns().unwrap();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0], Column::Name("users.id".to_string()));
    }

    #[test]
    fn test_empty_arguments_are_noops() {
        let mut query = QueryBuilder::new("users");
        with_aggregate::<User, _>(&mut query, "", "posts", "likes").unwrap();
        with_aggregate::<User, _>(&mut query, "max", "", "likes").unwrap();
        with_aggregate::<User, _>(&mut query, "max", Vec::<&str>::new(), "likes").unwrap();
        with_aggregate::<User, _>(&mut query, "max", "posts", "").unwrap();
        with_count::<User, _>(&mut query, "").unwrap();

        assert!(query.columns().is_none());
    }

    #[test]
    fn test_empty_arguments_skip_kind_validation() {
        let mut query = QueryBuilder::new("users");
        assert!(with_aggregate::<User, _>(&mut query, "total", "", "likes").is_ok());
        assert!(with_aggregate::<User, _>(&mut query, "total", "posts", "").is_ok());
    }

    #[test]
    fn test_invalid_kind_leaves_query_unchanged() {
        let mut query = QueryBuilder::new("users");
        let before = query.clone();

        let err = with_aggregate::<User, _>(&mut query, "total", "posts", "likes").unwrap_err();
        assert!(matches!(err, AggregateError::InvalidAggregateType(ref v) if v == "total"));
        assert_eq!(query, before);
    }

    #[test]
    fn test_unknown_relation_leaves_query_unchanged() {
        let mut query = QueryBuilder::new("users");
        let before = query.clone();

        let err = with_aggregate::<User, _>(&mut query, "max", ["posts", "likes"], "score").unwrap_err();
        assert!(matches!(err, AggregateError::RelationNotFound { .. }));
        assert_eq!(query, before);
    }

    #[test]
    fn test_with_count_names_and_projection() {
        let mut query = QueryBuilder::new("users");
        with_count::<User, _>(&mut query, "posts").unwrap();

        assert_eq!(
            query.to_sql(),
            "SELECT users.*, (SELECT COUNT(*) FROM posts WHERE users.id = posts.user_id) AS posts_count FROM users"
        );
    }

    #[test]
    fn test_braces_in_expression_stay_literal() {
        let mut query = QueryBuilder::new("users");
        with_aggregate::<User, _>(&mut query, "max", "posts", "jsonb_array_length(COALESCE(tags, '{}'))").unwrap();

        assert_eq!(
            query.to_sql(),
            "SELECT users.*, (SELECT MAX(jsonb_array_length(COALESCE(tags, '{}'))) FROM posts WHERE users.id = posts.user_id) AS posts_max FROM users"
        );
        assert!(query.get_bindings().is_empty());
    }

    #[test]
    fn test_collapsed_scope_columns_take_their_bindings() {
        let mut query = QueryBuilder::new("users");
        let spec = crate::relation::RelationSpec::with_scope("posts", |q| {
            q.select_raw("COALESCE(likes, {}) AS x", &[&0i64]);
        });
        with_aggregate::<User, _>(&mut query, "max", spec, "likes").unwrap();

        assert_eq!(
            query.to_sql(),
            "SELECT users.*, (SELECT MAX(likes) FROM posts WHERE users.id = posts.user_id) AS posts_max FROM users"
        );
        assert!(query.get_bindings().is_empty());
    }

    #[test]
    fn test_compose_collapses_extra_columns() {
        let parent = QueryBuilder::new("users");
        let spec = crate::relation::RelationSpec::with_scope("posts", |q| {
            q.add_select("posts.id");
        });

        let subselects = compose_subselects::<User>(&parent, vec![spec], "MAX(likes)", "max").unwrap();

        assert_eq!(subselects.len(), 1);
        assert_eq!(
            subselects[0].query.columns(),
            Some(&[Column::raw("MAX(likes)")][..])
        );
    }
}
