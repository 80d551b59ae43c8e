//! Query construction and filtering API.
//!
//! Queries are built from a small filter expression AST plus limit/skip/sort
//! modifiers, and are executed by backends through the [`FilterVisitor`]
//! pattern: the in-memory backend evaluates expressions directly, the MongoDB
//! backend translates them into native query documents, and the signal
//! resolver embeds them in count requests.
//!
//! # Building queries
//!
//! ```ignore
//! use docbind::query::{Filter, Query, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("status", "active").and(Filter::gt("age", 18)))
//!     .limit(10)
//!     .sort("created_at", SortDirection::Desc)
//!     .build();
//! ```

use bson::Bson;

use crate::error::DocbindError;

/// Sort direction for query results.
#[derive(Debug, Clone)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// Sort specification: which field to sort by, and in which direction.
#[derive(Debug, Clone)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone)]
pub enum CmpOp {
    /// Equal to (exact match).
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Field value is one of the given values.
    In,
    /// Field value is none of the given values.
    Nin,
}

/// A filter expression for matching documents.
///
/// Leaf expressions compare a single field; branches combine expressions
/// with boolean logic. Static constructors and the chainable
/// [`and`](Filter::and)/[`or`](Filter::or)/[`not`](Filter::not) combinators
/// cover the common shapes:
///
/// ```ignore
/// let active_adults = Filter::eq("status", "active").and(Filter::gte("age", 18));
/// let flagged = Filter::any([Filter::exists("banned_at"), Filter::eq("strikes", 3)]);
/// ```
#[derive(Debug, Clone)]
pub enum Filter {
    /// Logical AND: every sub-expression must match.
    All(Vec<Filter>),
    /// Logical OR: at least one sub-expression must match.
    Any(Vec<Filter>),
    /// Logical NOT: inverts the inner expression.
    Not(Box<Filter>),
    /// Matches documents where the field is present (or absent).
    Exists {
        /// The field name to test.
        field: String,
        /// `true` to require presence, `false` to require absence.
        exists: bool,
    },
    /// Field comparison expression.
    Cmp {
        /// The field name to compare.
        field: String,
        /// The comparison operator.
        op: CmpOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Filter {
    /// Creates a field comparison expression.
    pub fn cmp(field: impl Into<String>, op: CmpOp, value: impl Into<Bson>) -> Self {
        Filter::Cmp {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Matches documents where the field equals the value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::cmp(field, CmpOp::Eq, value)
    }

    /// Matches documents where the field does not equal the value.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::cmp(field, CmpOp::Ne, value)
    }

    /// Matches documents where the field is greater than the value.
    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::cmp(field, CmpOp::Gt, value)
    }

    /// Matches documents where the field is greater than or equal to the value.
    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::cmp(field, CmpOp::Gte, value)
    }

    /// Matches documents where the field is less than the value.
    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::cmp(field, CmpOp::Lt, value)
    }

    /// Matches documents where the field is less than or equal to the value.
    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::cmp(field, CmpOp::Lte, value)
    }

    /// Matches documents where the field value is one of `values`.
    pub fn within(field: impl Into<String>, values: impl Into<Bson>) -> Self {
        Self::cmp(field, CmpOp::In, values)
    }

    /// Matches documents where the field value is none of `values`.
    pub fn without(field: impl Into<String>, values: impl Into<Bson>) -> Self {
        Self::cmp(field, CmpOp::Nin, values)
    }

    /// Matches documents where the field is present.
    pub fn exists(field: impl Into<String>) -> Self {
        Filter::Exists { field: field.into(), exists: true }
    }

    /// Matches documents where the field is absent.
    pub fn missing(field: impl Into<String>) -> Self {
        Filter::Exists { field: field.into(), exists: false }
    }

    /// Combines expressions such that all must match.
    pub fn all(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::All(filters.into_iter().collect())
    }

    /// Combines expressions such that any may match.
    pub fn any(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Any(filters.into_iter().collect())
    }

    /// Chains another expression with logical AND, flattening nested ANDs.
    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::All(mut list) => {
                list.push(other);
                Filter::All(list)
            }
            _ => Filter::All(vec![self, other]),
        }
    }

    /// Chains another expression with logical OR, flattening nested ORs.
    pub fn or(self, other: Filter) -> Self {
        match self {
            Filter::Any(mut list) => {
                list.push(other);
                Filter::Any(list)
            }
            _ => Filter::Any(vec![self, other]),
        }
    }

    /// Negates this expression.
    pub fn not(self) -> Self {
        Filter::Not(Box::new(self))
    }
}

/// A structured query: an optional filter plus limit, skip and sort
/// modifiers. Use [`Query::builder`] for fluent construction.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Optional filter expression to match documents.
    pub filter: Option<Filter>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Number of documents to skip (for pagination).
    pub skip: Option<usize>,
    /// Sort specification for results.
    pub sort: Option<Sort>,
}

impl Query {
    /// Creates an empty query matching every document.
    pub fn new() -> Self {
        Query::default()
    }

    /// Creates a query with just a filter and no modifiers.
    pub fn filtered(filter: Filter) -> Self {
        Query { filter: Some(filter), ..Query::default() }
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

/// Fluent builder for [`Query`] values.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Sets the filter expression for this query.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Sets the number of documents to skip (for pagination).
    pub fn skip(mut self, skip: usize) -> Self {
        self.query.skip = Some(skip);
        self
    }

    /// Sets the sort specification for the query results.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort = Some(Sort { field: field.into(), direction });
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> Query {
        self.query
    }
}

/// Visitor over the [`Filter`] AST.
///
/// Backends implement this to turn expressions into whatever their engine
/// executes: a boolean for in-memory evaluation, a native query document for
/// a database driver.
pub trait FilterVisitor {
    type Output;
    type Error: Into<DocbindError>;

    fn visit_all(&mut self, filters: &[Filter]) -> Result<Self::Output, Self::Error>;
    fn visit_any(&mut self, filters: &[Filter]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, filter: &Filter) -> Result<Self::Output, Self::Error>;
    fn visit_exists(&mut self, field: &str, exists: bool) -> Result<Self::Output, Self::Error>;
    fn visit_cmp(
        &mut self,
        field: &str,
        op: &CmpOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_filter(&mut self, filter: &Filter) -> Result<Self::Output, Self::Error> {
        match filter {
            Filter::All(filters) => self.visit_all(filters),
            Filter::Any(filters) => self.visit_any(filters),
            Filter::Not(filter) => self.visit_not(filter),
            Filter::Exists { field, exists } => self.visit_exists(field, *exists),
            Filter::Cmp { field, op, value } => self.visit_cmp(field, op, value),
        }
    }
}
