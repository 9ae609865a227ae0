//! Mutable SELECT query state.

use crate::bind::{BindProxy, BindValue};
use crate::relation::Scope;
use crate::{intern_sql, mark_params, prepare_placeholders};

/// Type of SQL join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

impl std::fmt::Display for JoinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER JOIN"),
            JoinType::Left => write!(f, "LEFT JOIN"),
        }
    }
}

/// Represents a JOIN operation in the query.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: String,
    pub condition: String,
}

/// One entry of the projection list.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// A column name, optionally qualified (`users.*`, `posts.likes`).
    Name(String),
    /// A raw SQL fragment emitted verbatim. `{}` in it is literal text.
    Raw(String),
    /// An expression whose `{}` placeholders are bound parameters.
    Expr(String),
    /// A scalar subselect: `(SELECT ...) AS alias`.
    Sub {
        query: Box<QueryBuilder>,
        alias: String,
    },
}

impl Column {
    pub fn raw(sql: &str) -> Self {
        Column::Raw(sql.to_string())
    }

    fn compile(&self) -> String {
        match self {
            Column::Name(name) => name.clone(),
            Column::Raw(sql) => sql.clone(),
            Column::Expr(sql) => mark_params(sql),
            Column::Sub { query, alias } => format!("({}) AS {}", query.compile(), alias),
        }
    }
}

impl From<&str> for Column {
    fn from(name: &str) -> Self {
        Column::Name(name.to_string())
    }
}

impl From<String> for Column {
    fn from(name: String) -> Self {
        Column::Name(name)
    }
}

/// A WHERE condition. Conditions are joined with AND.
#[derive(Debug, Clone, PartialEq)]
pub enum Where {
    /// Clause text with `{}` placeholders, e.g. `status = {}`.
    Raw(String),
    /// Comparison of two columns, used to correlate subqueries.
    Column {
        first: String,
        operator: String,
        second: String,
    },
}

impl Where {
    fn compile(&self) -> String {
        match self {
            Where::Raw(clause) => mark_params(clause),
            Where::Column { first, operator, second } => {
                format!("{} {} {}", first, operator, second)
            }
        }
    }
}

/// The clause a binding belongs to.
///
/// Select bindings always precede where bindings in the compiled statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingClause {
    Select,
    Where,
}

/// Mutable SELECT query over one table.
///
/// A `None` projection means "not selected yet" and compiles to `*`.
///
/// # Example
///
/// ```ignore
/// let mut posts = QueryBuilder::new("posts");
/// posts
///     .select(["posts.id", "posts.title"])
///     .where_("posts.likes > {}", &[&10i64])
///     .where_column("users.id", "=", "posts.user_id");
///
/// let sql = posts.build();
/// // SELECT posts.id, posts.title FROM posts WHERE posts.likes > $1 AND users.id = posts.user_id
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBuilder {
    from: String,
    alias: Option<String>,
    columns: Option<Vec<Column>>,
    joins: Vec<Join>,
    wheres: Vec<Where>,
    select_bindings: Vec<BindValue>,
    // Number of select bindings owned by each projection column.
    select_binding_counts: Vec<usize>,
    where_bindings: Vec<BindValue>,
}

impl QueryBuilder {
    /// Creates a new query over the given table.
    pub fn new(table: &str) -> Self {
        Self {
            from: table.to_string(),
            alias: None,
            columns: None,
            joins: Vec::new(),
            wheres: Vec::new(),
            select_bindings: Vec::new(),
            select_binding_counts: Vec::new(),
            where_bindings: Vec::new(),
        }
    }

    /// The base table.
    pub fn from(&self) -> &str {
        &self.from
    }

    /// Aliases the base table: `FROM table AS alias`.
    pub fn alias_as(&mut self, alias: &str) -> &mut Self {
        self.alias = Some(alias.to_string());
        self
    }

    /// The name other clauses use to refer to the base table: the alias if
    /// one is set, otherwise the table name.
    pub fn table_ref(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.from)
    }

    /// The projection list, or `None` if nothing has been selected yet.
    pub fn columns(&self) -> Option<&[Column]> {
        self.columns.as_deref()
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn wheres(&self) -> &[Where] {
        &self.wheres
    }

    /// Replaces the projection list and drops the select bindings.
    pub fn select<I, C>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        let columns: Vec<Column> = columns.into_iter().map(Into::into).collect();
        self.select_binding_counts = vec![0; columns.len()];
        self.columns = Some(columns);
        self.select_bindings.clear();
        self
    }

    /// Appends a column to the projection list.
    pub fn add_select(&mut self, column: impl Into<Column>) -> &mut Self {
        self.push_column(column.into(), Vec::new())
    }

    fn push_column(&mut self, column: Column, bindings: Vec<BindValue>) -> &mut Self {
        self.columns.get_or_insert_with(Vec::new).push(column);
        self.select_binding_counts.push(bindings.len());
        self.select_bindings.extend(bindings);
        self
    }

    /// Appends a raw expression to the projection list.
    ///
    /// The expression uses `{}` as parameter placeholders.
    pub fn select_raw(&mut self, expression: &str, params: &[&dyn BindProxy]) -> &mut Self {
        let bindings = params.iter().map(|p| p.bind_value()).collect();
        self.push_column(Column::Expr(expression.to_string()), bindings)
    }

    /// Appends `(query) AS alias` to the projection list.
    ///
    /// The subquery's bindings move into this query's select bindings.
    pub fn select_sub(&mut self, query: QueryBuilder, alias: &str) -> &mut Self {
        let bindings = query.get_bindings();
        self.push_column(
            Column::Sub {
                query: Box::new(query),
                alias: alias.to_string(),
            },
            bindings,
        )
    }

    /// Keeps only the first `len` projection columns, dropping the select
    /// bindings owned by the removed ones.
    pub fn truncate_columns(&mut self, len: usize) -> &mut Self {
        if let Some(columns) = self.columns.as_mut() {
            columns.truncate(len);
        }
        if len < self.select_binding_counts.len() {
            let removed: usize = self.select_binding_counts.drain(len..).sum();
            let kept = self.select_bindings.len().saturating_sub(removed);
            self.select_bindings.truncate(kept);
        }
        self
    }

    /// Adds an INNER JOIN with the specified table and condition.
    ///
    /// # Example
    ///
    /// ```ignore
    /// .join("post_tag", "tags.id = post_tag.tag_id")
    /// ```
    pub fn join(&mut self, table: &str, condition: &str) -> &mut Self {
        self.joins.push(Join {
            join_type: JoinType::Inner,
            table: table.to_string(),
            condition: condition.to_string(),
        });
        self
    }

    /// Adds a LEFT JOIN with the specified table and condition.
    pub fn left_join(&mut self, table: &str, condition: &str) -> &mut Self {
        self.joins.push(Join {
            join_type: JoinType::Left,
            table: table.to_string(),
            condition: condition.to_string(),
        });
        self
    }

    /// Adds a WHERE condition with the given statement and parameters.
    ///
    /// The statement should use "{}" as parameter placeholders.
    ///
    /// # Example
    ///
    /// ```ignore
    /// .where_("status = {} AND likes > {}", &[&"published", &100i64])
    /// ```
    pub fn where_(&mut self, clause: &str, params: &[&dyn BindProxy]) -> &mut Self {
        self.wheres.push(Where::Raw(clause.to_string()));
        self.where_bindings
            .extend(params.iter().map(|p| p.bind_value()));
        self
    }

    /// Adds a `first operator second` condition between two columns.
    pub fn where_column(&mut self, first: &str, operator: &str, second: &str) -> &mut Self {
        self.wheres.push(Where::Column {
            first: first.to_string(),
            operator: operator.to_string(),
            second: second.to_string(),
        });
        self
    }

    /// Replaces the bindings of one clause.
    ///
    /// Replaced select bindings are no longer owned by any column, so
    /// `truncate_columns` keeps them.
    pub fn set_bindings(&mut self, bindings: Vec<BindValue>, clause: BindingClause) -> &mut Self {
        match clause {
            BindingClause::Select => {
                self.select_bindings = bindings;
                self.select_binding_counts.iter_mut().for_each(|count| *count = 0);
            }
            BindingClause::Where => self.where_bindings = bindings,
        }
        self
    }

    /// The bindings of one clause.
    pub fn bindings(&self, clause: BindingClause) -> &[BindValue] {
        match clause {
            BindingClause::Select => &self.select_bindings,
            BindingClause::Where => &self.where_bindings,
        }
    }

    /// All bindings in placeholder order.
    pub fn get_bindings(&self) -> Vec<BindValue> {
        self.select_bindings
            .iter()
            .chain(self.where_bindings.iter())
            .cloned()
            .collect()
    }

    /// Appends the where clauses and where bindings of another query.
    pub fn merge_constraints_from(&mut self, other: &QueryBuilder) -> &mut Self {
        self.wheres.extend(other.wheres.iter().cloned());
        self.where_bindings
            .extend(other.where_bindings.iter().cloned());
        self
    }

    /// Applies a caller-supplied scope to this query.
    pub fn call_scope(&mut self, scope: Option<&Scope>) -> &mut Self {
        if let Some(scope) = scope {
            scope(self);
        }
        self
    }

    /// Compiles the statement with `{}` markers left in place.
    fn compile(&self) -> String {
        let select_clause = match &self.columns {
            Some(columns) if !columns.is_empty() => columns
                .iter()
                .map(Column::compile)
                .collect::<Vec<_>>()
                .join(", "),
            _ => "*".to_string(),
        };

        let mut sql = match &self.alias {
            Some(alias) => format!("SELECT {} FROM {} AS {}", select_clause, self.from, alias),
            None => format!("SELECT {} FROM {}", select_clause, self.from),
        };

        for join in &self.joins {
            sql.push_str(&format!(" {} {} ON {}", join.join_type, join.table, join.condition));
        }

        if !self.wheres.is_empty() {
            let conditions: Vec<String> = self.wheres.iter().map(Where::compile).collect();
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        sql
    }

    /// Compiles the statement with backend-specific parameter markers.
    pub fn to_sql(&self) -> String {
        prepare_placeholders(&self.compile(), 1)
    }

    /// Builds the query and returns an interned SQL string.
    pub fn build(&self) -> &'static str {
        let sql = intern_sql(self.to_sql());
        #[cfg(feature = "log_sql")]
        tracing::debug!("[SQLxAggregates] SELECT SQL: {}", sql);
        sql
    }
}
