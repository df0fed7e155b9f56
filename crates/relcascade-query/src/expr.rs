//! Filter expressions.
//!
//! `Expr` is the WHERE-clause vocabulary shared by statements and backends.
//! It renders to SQL with placeholders per [`Dialect`] and can also be
//! evaluated directly against a [`Row`] by in-process backends.

use relcascade_core::{Row, Value};
use serde::{Deserialize, Serialize};

/// SQL dialect, controlling placeholders and identifier quoting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `$1`, `"ident"`.
    #[default]
    Postgres,
    /// `?1`, `"ident"`.
    Sqlite,
    /// `?`, `` `ident` ``.
    Mysql,
}

impl Dialect {
    /// Placeholder for the 1-based parameter `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
            Dialect::Mysql => "?".to_string(),
        }
    }

    /// Quote a column identifier.
    pub fn quote_ident(self, ident: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
            Dialect::Mysql => format!("`{}`", ident.replace('`', "``")),
        }
    }
}

/// A boolean filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Matches every row.
    True,
    /// `column = value`.
    Eq {
        /// Column name.
        column: String,
        /// Compared value.
        value: Value,
    },
    /// `column IN (values...)`. An empty list matches nothing.
    In {
        /// Column name.
        column: String,
        /// Candidate values.
        values: Vec<Value>,
    },
    /// `column IS NULL`.
    IsNull {
        /// Column name.
        column: String,
    },
    /// Conjunction.
    And(Vec<Expr>),
    /// Disjunction.
    Or(Vec<Expr>),
}

/// Column handle returned by [`Expr::col`].
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
}

impl Column {
    /// `column = value`.
    pub fn eq(self, value: impl Into<Value>) -> Expr {
        Expr::Eq {
            column: self.name,
            value: value.into(),
        }
    }

    /// `column IN (values...)`.
    pub fn in_list<I, V>(self, values: I) -> Expr
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Expr::In {
            column: self.name,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// `column IS NULL`.
    pub fn is_null(self) -> Expr {
        Expr::IsNull { column: self.name }
    }
}

impl Expr {
    /// Start an expression on `name`.
    pub fn col(name: impl Into<String>) -> Column {
        Column { name: name.into() }
    }

    /// AND this expression with `other`, flattening nested conjunctions.
    pub fn and(self, other: Expr) -> Expr {
        match (self, other) {
            (Expr::True, e) | (e, Expr::True) => e,
            (Expr::And(mut left), Expr::And(right)) => {
                left.extend(right);
                Expr::And(left)
            }
            (Expr::And(mut left), e) => {
                left.push(e);
                Expr::And(left)
            }
            (e, Expr::And(mut right)) => {
                right.insert(0, e);
                Expr::And(right)
            }
            (a, b) => Expr::And(vec![a, b]),
        }
    }

    /// Conjunction of all `exprs`; `True` when empty.
    pub fn all(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        exprs.into_iter().fold(Expr::True, Expr::and)
    }

    /// Conjunction of `column = value` pairs.
    pub fn eq_all<'a, I>(pairs: I) -> Expr
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        Expr::all(pairs.into_iter().map(|(c, v)| Expr::col(c).eq(v.clone())))
    }

    /// Number of top-level OR groups: 0 for `True`, the branch count for
    /// `Or`, 1 otherwise.
    pub fn group_count(&self) -> usize {
        match self {
            Expr::True => 0,
            Expr::Or(groups) => groups.len(),
            _ => 1,
        }
    }

    /// Render with the default dialect.
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default(), 0)
    }

    /// Render to SQL, numbering placeholders after `offset` existing params.
    pub fn build_with_dialect(&self, dialect: Dialect, offset: usize) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = self.render(dialect, offset, &mut params);
        (sql, params)
    }

    fn render(&self, dialect: Dialect, offset: usize, params: &mut Vec<Value>) -> String {
        match self {
            Expr::True => "1 = 1".to_string(),
            Expr::Eq { column, value } => {
                params.push(value.clone());
                format!(
                    "{} = {}",
                    dialect.quote_ident(column),
                    dialect.placeholder(offset + params.len())
                )
            }
            Expr::In { column, values } => {
                if values.is_empty() {
                    return "1 = 0".to_string();
                }
                let placeholders: Vec<String> = values
                    .iter()
                    .map(|v| {
                        params.push(v.clone());
                        dialect.placeholder(offset + params.len())
                    })
                    .collect();
                format!(
                    "{} IN ({})",
                    dialect.quote_ident(column),
                    placeholders.join(", ")
                )
            }
            Expr::IsNull { column } => format!("{} IS NULL", dialect.quote_ident(column)),
            Expr::And(parts) => Self::join(parts, " AND ", dialect, offset, params),
            Expr::Or(parts) => Self::join(parts, " OR ", dialect, offset, params),
        }
    }

    fn join(
        parts: &[Expr],
        sep: &str,
        dialect: Dialect,
        offset: usize,
        params: &mut Vec<Value>,
    ) -> String {
        if parts.is_empty() {
            return if sep == " AND " { "1 = 1" } else { "1 = 0" }.to_string();
        }
        parts
            .iter()
            .map(|part| {
                let sql = part.render(dialect, offset, params);
                if matches!(part, Expr::And(_) | Expr::Or(_)) {
                    format!("({sql})")
                } else {
                    sql
                }
            })
            .collect::<Vec<_>>()
            .join(sep)
    }

    /// Evaluate against a row with SQL semantics: NULL never equals anything.
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Expr::True => true,
            Expr::Eq { column, value } => {
                !value.is_null() && row.get(column).is_some_and(|v| v == value)
            }
            Expr::In { column, values } => row
                .get(column)
                .is_some_and(|v| !v.is_null() && values.contains(v)),
            Expr::IsNull { column } => row.get(column).is_none_or(Value::is_null),
            Expr::And(parts) => parts.iter().all(|p| p.matches(row)),
            Expr::Or(parts) => parts.iter().any(|p| p.matches(row)),
        }
    }
}
