use std::fmt;
use std::sync::Arc;

use crate::query::QueryBuilder;

/// A caller-supplied callback that further constrains a relation subquery.
pub type Scope = Arc<dyn Fn(&mut QueryBuilder) + Send + Sync>;

/// A relation name, optionally with an `as alias` suffix and a scope.
#[derive(Clone)]
pub struct RelationSpec {
    name: String,
    scope: Option<Scope>,
}

impl RelationSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            scope: None,
        }
    }

    /// A relation constrained by `scope`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// RelationSpec::with_scope("posts as popular_max", |q| {
    ///     q.where_("posts.likes > {}", &[&100i64]);
    /// })
    /// ```
    pub fn with_scope<F>(name: &str, scope: F) -> Self
    where
        F: Fn(&mut QueryBuilder) + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            scope: Some(Arc::new(scope)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }
}

impl fmt::Debug for RelationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationSpec")
            .field("name", &self.name)
            .field("scope", &self.scope.as_ref().map(|_| "<scope>"))
            .finish()
    }
}

impl From<&str> for RelationSpec {
    fn from(name: &str) -> Self {
        RelationSpec::new(name)
    }
}

impl From<String> for RelationSpec {
    fn from(name: String) -> Self {
        RelationSpec::new(&name)
    }
}

impl From<&String> for RelationSpec {
    fn from(name: &String) -> Self {
        RelationSpec::new(name)
    }
}

impl<F> From<(&str, F)> for RelationSpec
where
    F: Fn(&mut QueryBuilder) + Send + Sync + 'static,
{
    fn from((name, scope): (&str, F)) -> Self {
        RelationSpec::with_scope(name, scope)
    }
}

/// Anything accepted as the `relations` argument of the aggregate helpers.
///
/// An empty string converts to no relations at all; every other input
/// keeps one spec per element, in order.
pub trait IntoRelations {
    fn into_relations(self) -> Vec<RelationSpec>;
}

impl IntoRelations for &str {
    fn into_relations(self) -> Vec<RelationSpec> {
        if self.is_empty() {
            Vec::new()
        } else {
            vec![RelationSpec::new(self)]
        }
    }
}

impl IntoRelations for String {
    fn into_relations(self) -> Vec<RelationSpec> {
        self.as_str().into_relations()
    }
}

impl IntoRelations for &String {
    fn into_relations(self) -> Vec<RelationSpec> {
        self.as_str().into_relations()
    }
}

impl IntoRelations for RelationSpec {
    fn into_relations(self) -> Vec<RelationSpec> {
        vec![self]
    }
}

impl<F> IntoRelations for (&str, F)
where
    F: Fn(&mut QueryBuilder) + Send + Sync + 'static,
{
    fn into_relations(self) -> Vec<RelationSpec> {
        vec![self.into()]
    }
}

impl<T: Into<RelationSpec>> IntoRelations for Vec<T> {
    fn into_relations(self) -> Vec<RelationSpec> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T: Into<RelationSpec>, const N: usize> IntoRelations for [T; N] {
    fn into_relations(self) -> Vec<RelationSpec> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T: Into<RelationSpec> + Clone> IntoRelations for &[T] {
    fn into_relations(self) -> Vec<RelationSpec> {
        self.iter().cloned().map(Into::into).collect()
    }
}

/// Normalizes relation specs into an ordered `(name, scope)` list.
///
/// A dotted name such as `posts.comments` first registers each parent
/// segment (`posts`) without a scope. Repeating a name replaces its scope
/// but keeps its original position.
pub fn parse_with_relations(relations: Vec<RelationSpec>) -> Vec<(String, Option<Scope>)> {
    let mut results: Vec<(String, Option<Scope>)> = Vec::new();

    for spec in relations {
        let RelationSpec { name, scope } = spec;

        let mut progress = String::new();
        for segment in name.split('.') {
            if !progress.is_empty() {
                progress.push('.');
            }
            progress.push_str(segment);
            if !results.iter().any(|(existing, _)| *existing == progress) {
                results.push((progress.clone(), None));
            }
        }

        if let Some(entry) = results.iter_mut().find(|(existing, _)| *existing == name) {
            entry.1 = scope;
        }
    }

    results
}
