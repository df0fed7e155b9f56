//! Composite key sets.
//!
//! A `KeySet` collects key tuples read from parent rows and turns them into a
//! compact filter on a child table. Tuples are stored as a trie keyed by
//! column position so that shared prefixes are emitted once:
//!
//! ```text
//! {(1,"a"), (1,"b"), (2,"a")}
//!   => (c1 = 1 AND c2 IN ("a","b")) OR (c1 = 2 AND c2 IN ("a"))
//! ```
//!
//! A single column collapses to a plain `IN` list.

use std::collections::HashMap;

use relcascade_core::{Row, Value};
use thiserror::Error;

use crate::expr::Expr;

/// Failures while collecting key tuples.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeySetError {
    /// A tuple had a NULL component, so no child row can reference it.
    #[error("key column '{column}' is null")]
    NullComponent {
        /// Column holding the NULL.
        column: String,
    },
    /// Tuple length does not match the key columns.
    #[error("expected {expected} key values, got {got}")]
    Arity {
        /// Number of key columns.
        expected: usize,
        /// Number of values supplied.
        got: usize,
    },
}

#[derive(Debug, Default, Clone)]
struct KeyNode {
    entries: Vec<(Value, KeyNode)>,
    index: HashMap<Value, usize>,
}

impl KeyNode {
    fn insert(&mut self, tuple: &[Value]) -> bool {
        let Some((head, rest)) = tuple.split_first() else {
            return false;
        };
        let (slot, fresh) = match self.index.get(head) {
            Some(&i) => (i, false),
            None => {
                self.entries.push((head.clone(), KeyNode::default()));
                let i = self.entries.len() - 1;
                self.index.insert(head.clone(), i);
                (i, true)
            }
        };
        if rest.is_empty() {
            return fresh;
        }
        self.entries[slot].1.insert(rest)
    }

    fn to_expr(&self, columns: &[String]) -> Expr {
        let Some((column, rest)) = columns.split_first() else {
            return Expr::True;
        };
        if rest.is_empty() {
            return Expr::In {
                column: column.clone(),
                values: self.entries.iter().map(|(v, _)| v.clone()).collect(),
            };
        }
        let mut groups: Vec<Expr> = self
            .entries
            .iter()
            .map(|(value, child)| Expr::col(column.clone()).eq(value.clone()).and(child.to_expr(rest)))
            .collect();
        if groups.len() == 1 {
            groups.pop().unwrap_or(Expr::True)
        } else {
            Expr::Or(groups)
        }
    }
}

/// Distinct composite key tuples, grouped by shared prefix.
#[derive(Debug, Clone)]
pub struct KeySet {
    columns: Vec<String>,
    root: KeyNode,
    len: usize,
}

impl KeySet {
    /// Empty set over `columns` (the source-side key columns).
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            root: KeyNode::default(),
            len: 0,
        }
    }

    /// Collect the tuples of `columns` from `rows`.
    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: &[Row],
    ) -> Result<Self, KeySetError> {
        let mut set = Self::new(columns);
        for row in rows {
            let tuple = row.tuple(&set.columns);
            set.insert(tuple)?;
        }
        Ok(set)
    }

    /// Source-side key columns.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Add a tuple. Duplicates are ignored.
    pub fn insert(&mut self, tuple: Vec<Value>) -> Result<(), KeySetError> {
        if tuple.len() != self.columns.len() {
            return Err(KeySetError::Arity {
                expected: self.columns.len(),
                got: tuple.len(),
            });
        }
        if let Some(pos) = tuple.iter().position(Value::is_null) {
            return Err(KeySetError::NullComponent {
                column: self.columns[pos].clone(),
            });
        }
        if self.root.insert(&tuple) {
            self.len += 1;
        }
        Ok(())
    }

    /// Number of distinct tuples.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no tuple was collected.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Filter matching target rows whose `target_columns` equal any tuple.
    ///
    /// `target_columns` pair up positionally with [`columns`](Self::columns).
    pub fn to_expr<S: AsRef<str>>(&self, target_columns: &[S]) -> Expr {
        let target: Vec<String> = target_columns.iter().map(|c| c.as_ref().to_string()).collect();
        self.root.to_expr(&target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Dialect;

    #[test]
    fn test_single_column_is_in_list() {
        let mut set = KeySet::new(["id"]);
        set.insert(vec![Value::BigInt(1)]).unwrap();
        set.insert(vec![Value::BigInt(2)]).unwrap();
        set.insert(vec![Value::BigInt(1)]).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.to_expr(&["order_id"]),
            Expr::col("order_id").in_list([1i64, 2])
        );
    }

    #[test]
    fn test_composite_groups_share_prefix() {
        let rows = vec![
            Row::new().with("a", 1i64).with("b", "a"),
            Row::new().with("a", 1i64).with("b", "b"),
            Row::new().with("a", 2i64).with("b", "a"),
        ];
        let set = KeySet::from_rows(["a", "b"], &rows).unwrap();
        let expr = set.to_expr(&["x", "y"]);
        assert_eq!(expr.group_count(), 2);
        let (sql, params) = expr.build_with_dialect(Dialect::Postgres, 0);
        assert_eq!(
            sql,
            "(\"x\" = $1 AND \"y\" IN ($2, $3)) OR (\"x\" = $4 AND \"y\" IN ($5))"
        );
        assert_eq!(params.len(), 5);
    }

    #[test]
    fn test_single_group_is_not_wrapped() {
        let rows = vec![Row::new().with("a", 1i64).with("b", 2i64)];
        let set = KeySet::from_rows(["a", "b"], &rows).unwrap();
        let expr = set.to_expr(&["a", "b"]);
        assert_eq!(expr.group_count(), 1);
        assert!(expr.matches(&Row::new().with("a", 1i64).with("b", 2i64)));
        assert!(!expr.matches(&Row::new().with("a", 1i64).with("b", 3i64)));
    }

    #[test]
    fn test_three_columns_nest() {
        let mut set = KeySet::new(["a", "b", "c"]);
        for (a, b, c) in [(1i64, 1i64, 1i64), (1, 1, 2), (1, 2, 1), (2, 1, 1)] {
            set.insert(vec![a.into(), b.into(), c.into()]).unwrap();
        }
        let expr = set.to_expr(&["a", "b", "c"]);
        assert_eq!(expr.group_count(), 2);
        let hit = Row::new().with("a", 1i64).with("b", 2i64).with("c", 1i64);
        let miss = Row::new().with("a", 2i64).with("b", 2i64).with("c", 1i64);
        assert!(expr.matches(&hit));
        assert!(!expr.matches(&miss));
    }

    #[test]
    fn test_null_component_rejected() {
        let rows = vec![Row::new().with("a", 1i64).with("b", Value::Null)];
        let err = KeySet::from_rows(["a", "b"], &rows).unwrap_err();
        assert_eq!(
            err,
            KeySetError::NullComponent {
                column: "b".to_string()
            }
        );
    }

    #[test]
    fn test_arity_checked() {
        let mut set = KeySet::new(["a", "b"]);
        assert!(matches!(
            set.insert(vec![Value::BigInt(1)]),
            Err(KeySetError::Arity { expected: 2, got: 1 })
        ));
    }
}
