//! SQL text rewriting: list-placeholder expansion, backend placeholder
//! rebinding, and multi-row INSERT assembly.
//!
//! All rewriting happens before any network call. Statements are written
//! with `?` placeholders; Postgres-protocol backends get a `$N` rebind as
//! the last step. Single-quoted string literals are skipped by every
//! scanner here, including escaped quotes (`''`).

use crate::error::{DbError, DbResult};
use crate::models::SqlValue;

/// Expand list-valued arguments into comma-joined placeholder groups.
///
/// Each `?` consumes one argument. A `List` argument with N elements
/// rewrites its `?` into N comma-joined `?` and splices the elements into
/// the flat output. An empty list is rejected, as is any placeholder /
/// argument count mismatch.
pub fn expand_placeholders(sql: &str, args: &[SqlValue]) -> DbResult<(String, Vec<SqlValue>)> {
    let mut out = String::with_capacity(sql.len());
    let mut flat = Vec::with_capacity(args.len());
    let mut next = args.iter();
    let mut chars = sql.chars().peekable();
    let mut in_literal = false;

    while let Some(c) = chars.next() {
        if in_literal {
            out.push(c);
            if c == '\'' {
                // An escaped quote ('') stays inside the literal.
                if chars.peek() == Some(&'\'') {
                    out.push('\'');
                    chars.next();
                } else {
                    in_literal = false;
                }
            }
            continue;
        }
        match c {
            '\'' => {
                in_literal = true;
                out.push(c);
            }
            '?' => {
                let arg = next.next().ok_or_else(|| {
                    DbError::invalid_input(format!(
                        "more placeholders than arguments in: {}",
                        sql
                    ))
                })?;
                match arg {
                    SqlValue::List(items) => {
                        if items.is_empty() {
                            return Err(DbError::invalid_input(
                                "empty list argument for placeholder expansion",
                            ));
                        }
                        for (i, item) in items.iter().enumerate() {
                            if i > 0 {
                                out.push_str(", ");
                            }
                            out.push('?');
                            flat.push(item.clone());
                        }
                    }
                    other => {
                        out.push('?');
                        flat.push(other.clone());
                    }
                }
            }
            _ => out.push(c),
        }
    }

    if next.next().is_some() {
        return Err(DbError::invalid_input(format!(
            "more arguments than placeholders in: {}",
            sql
        )));
    }
    Ok((out, flat))
}

/// Rewrite `?` placeholders to `$1..$N` for Postgres-protocol backends.
pub fn rebind(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0usize;
    let mut chars = sql.chars().peekable();
    let mut in_literal = false;

    while let Some(c) = chars.next() {
        if in_literal {
            out.push(c);
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    out.push('\'');
                    chars.next();
                } else {
                    in_literal = false;
                }
            }
            continue;
        }
        match c {
            '\'' => {
                in_literal = true;
                out.push(c);
            }
            '?' => {
                n += 1;
                out.push('$');
                out.push_str(&n.to_string());
            }
            _ => out.push(c),
        }
    }
    out
}

/// Assemble one multi-row INSERT statement with `?` placeholders.
///
/// The tuple count is the integer quotient of the flat value count by the
/// column count. Boundary behavior: a non-divisible value count drops the
/// trailing leftover values rather than emitting a partial tuple. Zero
/// complete tuples is an error.
pub fn bulk_insert_sql(table: &str, columns: &[&str], value_count: usize) -> DbResult<String> {
    if columns.is_empty() {
        return Err(DbError::invalid_input("bulk insert requires columns"));
    }
    let tuples = value_count / columns.len();
    if tuples == 0 {
        return Err(DbError::invalid_input(format!(
            "bulk insert into {} has no complete value tuple ({} values for {} columns)",
            table,
            value_count,
            columns.len()
        )));
    }

    let one_tuple = {
        let mut t = String::from("(");
        for i in 0..columns.len() {
            if i > 0 {
                t.push_str(", ");
            }
            t.push('?');
        }
        t.push(')');
        t
    };

    let mut sql = format!("INSERT INTO {} ({}) VALUES ", table, columns.join(", "));
    for i in 0..tuples {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push_str(&one_tuple);
    }
    Ok(sql)
}

/// How many values a bulk insert will actually bind (complete tuples only).
pub fn bulk_insert_bound(columns: usize, value_count: usize) -> usize {
    (value_count / columns) * columns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_plain_args() {
        let (sql, flat) = expand_placeholders(
            "SELECT * FROM t WHERE a = ? AND b = ?",
            &[SqlValue::Int(1), SqlValue::Text("x".into())],
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE a = ? AND b = ?");
        assert_eq!(flat.len(), 2);
    }

    #[test]
    fn test_expand_list_argument() {
        let (sql, flat) = expand_placeholders(
            "SELECT * FROM t WHERE id IN (?) AND s = ?",
            &[
                SqlValue::List(vec![SqlValue::Int(1), SqlValue::Int(2), SqlValue::Int(3)]),
                SqlValue::Text("ok".into()),
            ],
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE id IN (?, ?, ?) AND s = ?");
        assert_eq!(flat.len(), 4);
        assert_eq!(flat[3], SqlValue::Text("ok".into()));
    }

    #[test]
    fn test_expand_rejects_empty_list() {
        let err = expand_placeholders(
            "SELECT * FROM t WHERE id IN (?)",
            &[SqlValue::List(vec![])],
        )
        .unwrap_err();
        assert!(err.to_string().contains("empty list"));
    }

    #[test]
    fn test_expand_count_mismatch() {
        assert!(expand_placeholders("SELECT ?", &[]).is_err());
        assert!(expand_placeholders("SELECT 1", &[SqlValue::Int(1)]).is_err());
    }

    #[test]
    fn test_expand_skips_quoted_literals() {
        let (sql, flat) = expand_placeholders(
            "SELECT * FROM t WHERE s = 'what?' AND a = ?",
            &[SqlValue::Int(1)],
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE s = 'what?' AND a = ?");
        assert_eq!(flat.len(), 1);
    }

    #[test]
    fn test_expand_skips_escaped_quotes() {
        let (sql, _) = expand_placeholders(
            "SELECT * FROM t WHERE s = 'it''s?' AND a = ?",
            &[SqlValue::Int(1)],
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE s = 'it''s?' AND a = ?");
    }

    #[test]
    fn test_rebind_numbers_in_order() {
        assert_eq!(
            rebind("SELECT * FROM t WHERE a = ? AND b IN (?, ?)"),
            "SELECT * FROM t WHERE a = $1 AND b IN ($2, $3)"
        );
    }

    #[test]
    fn test_rebind_skips_quoted_literals() {
        assert_eq!(
            rebind("SELECT 'a?b' FROM t WHERE a = ?"),
            "SELECT 'a?b' FROM t WHERE a = $1"
        );
    }

    #[test]
    fn test_bulk_insert_exact_tuples() {
        let sql = bulk_insert_sql("t", &["a", "b"], 4).unwrap();
        assert_eq!(sql, "INSERT INTO t (a, b) VALUES (?, ?), (?, ?)");
    }

    #[test]
    fn test_bulk_insert_truncates_leftover_values() {
        // 7 values over 2 columns: three tuples, one trailing value dropped.
        let sql = bulk_insert_sql("t", &["a", "b"], 7).unwrap();
        assert_eq!(sql.matches("(?, ?)").count(), 3);
        assert_eq!(bulk_insert_bound(2, 7), 6);
    }

    #[test]
    fn test_bulk_insert_zero_tuples_is_error() {
        assert!(bulk_insert_sql("t", &["a", "b", "c"], 2).is_err());
        assert!(bulk_insert_sql("t", &[], 2).is_err());
    }
}
