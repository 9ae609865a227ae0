// Aggregates over every relation kind the derive macro can declare.

use sqlx_struct_aggregates::{
    BindValue, HasAggregates, RelationKind, RelationRegistry, RelationSpec, WithAggregates,
};
use sqlx_struct_aggregates::Aggregates;

#[allow(dead_code)]
#[derive(Debug, Aggregates)]
#[table_name = "users"]
#[relation(has_one = "Profile", name = "profile")]
#[relation(has_many = "Post", name = "posts")]
#[relation(has_many = "Post", name = "published_posts", constraint = "posts.published = 1")]
#[relation(belongs_to_many = "Role", name = "roles", pivot = "role_user")]
#[relation(has_many = "User", name = "children", foreign_key = "parent_id")]
struct User {
    id: i64,
    parent_id: Option<i64>,
}

#[allow(dead_code)]
#[derive(Debug, Aggregates)]
#[table_name = "profiles"]
struct Profile {
    id: i64,
    user_id: i64,
    score: i64,
}

#[allow(dead_code)]
#[derive(Debug, Aggregates)]
#[table_name = "posts"]
#[relation(belongs_to = "User", name = "user")]
#[relation(belongs_to = "User", name = "editor", foreign_key = "edited_by", owner_key = "id")]
struct Post {
    post_id: i64,
    user_id: i64,
    edited_by: i64,
    likes: i64,
}

#[allow(dead_code)]
#[derive(Debug, Aggregates)]
#[table_name = "roles"]
struct Role {
    id: i64,
    level: i64,
}

#[test]
fn test_derived_scheme() {
    assert_eq!(User::scheme().table_name, "users");
    assert_eq!(Post::scheme().id_field, "post_id");
}

#[test]
fn test_derived_relation_defaults() {
    let posts = User::relation("posts").unwrap();
    assert_eq!(
        posts.kind(),
        &RelationKind::HasMany {
            foreign_key: "user_id".to_string(),
            local_key: "id".to_string(),
        }
    );

    let user = Post::relation("user").unwrap();
    assert_eq!(
        user.kind(),
        &RelationKind::BelongsTo {
            foreign_key: "user_id".to_string(),
            owner_key: "id".to_string(),
        }
    );

    let roles = User::relation("roles").unwrap();
    assert_eq!(
        roles.kind(),
        &RelationKind::BelongsToMany {
            pivot_table: "role_user".to_string(),
            foreign_pivot_key: "user_id".to_string(),
            related_pivot_key: "role_id".to_string(),
            parent_key: "id".to_string(),
            related_key: "id".to_string(),
        }
    );

    assert!(User::relation("followers").is_none());
}

#[test]
fn test_has_one_aggregate() {
    let mut query = User::aggregate_query();
    query.with_max("profile", "score").unwrap();

    assert_eq!(
        query.to_sql(),
        "SELECT users.*, (SELECT MAX(score) FROM profiles WHERE users.id = profiles.user_id) AS profile_max FROM users"
    );
}

#[test]
fn test_belongs_to_aggregate() {
    let mut query = Post::aggregate_query();
    query.with_min("editor as editor_since", "created_at").unwrap();

    assert_eq!(
        query.to_sql(),
        "SELECT posts.*, (SELECT MIN(created_at) FROM users WHERE posts.edited_by = users.id) AS editor_since FROM posts"
    );
}

#[test]
fn test_belongs_to_many_aggregate() {
    let mut query = User::aggregate_query();
    query.with_sum("roles", "roles.level").unwrap();

    assert_eq!(
        query.to_sql(),
        "SELECT users.*, (SELECT SUM(roles.level) FROM roles INNER JOIN role_user ON roles.id = role_user.role_id WHERE users.id = role_user.user_id) AS roles_sum FROM users"
    );
}

#[test]
fn test_self_relation_aggregate() {
    let mut query = User::aggregate_query();
    query.with_avg("children", "self_users.id").unwrap();

    assert_eq!(
        query.to_sql(),
        "SELECT users.*, (SELECT AVG(self_users.id) FROM users AS self_users WHERE users.id = self_users.parent_id) AS children_avg FROM users"
    );
}

#[test]
fn test_relation_constraint_follows_correlation() {
    let mut query = User::aggregate_query();
    query
        .with_max(
            RelationSpec::with_scope("published_posts", |q| {
                q.where_("posts.likes > 10", &[]);
            }),
            "likes",
        )
        .unwrap();

    assert_eq!(
        query.to_sql(),
        "SELECT users.*, (SELECT MAX(likes) FROM posts WHERE users.id = posts.user_id AND posts.likes > 10 AND posts.published = 1) AS published_posts_max FROM users"
    );
}

#[test]
fn test_binding_order_across_clauses() {
    let mut query = User::aggregate_query();
    query.where_("users.id > {}", &[&5i64]);
    query
        .with_sum(
            ("posts", |q: &mut sqlx_struct_aggregates::QueryBuilder| {
                q.where_("posts.likes > {}", &[&100i64]);
            }),
            "likes",
        )
        .unwrap();
    query
        .with_max(
            RelationSpec::with_scope("roles", |q| {
                q.where_("roles.name = {}", &[&"admin"]);
            }),
            "roles.level",
        )
        .unwrap();

    assert_eq!(
        query.get_bindings(),
        vec![
            BindValue::I64(100),
            BindValue::String("admin".to_string()),
            BindValue::I64(5),
        ]
    );

    #[cfg(feature = "postgres")]
    assert_eq!(
        query.to_sql(),
        "SELECT users.*, \
         (SELECT SUM(likes) FROM posts WHERE users.id = posts.user_id AND posts.likes > $1) AS posts_sum, \
         (SELECT MAX(roles.level) FROM roles INNER JOIN role_user ON roles.id = role_user.role_id WHERE users.id = role_user.user_id AND roles.name = $2) AS roles_max \
         FROM users WHERE users.id > $3"
    );

    #[cfg(not(feature = "postgres"))]
    assert_eq!(query.to_sql().matches('?').count(), 3);
}
