/*
 * Copyright Cedar Contributors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! This module contains the SQL fragment algebra: parametric expression
//! values with `?` placeholders, nested fragment splicing, and AND/OR
//! reduction with identity elements, plus the marshalling of domain values
//! into SQL bind arguments.

use crate::ast::{Literal, Value};
use crate::extensions::ExtValue;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use smol_str::SmolStr;
use thiserror::Error;

/// The only sanctioned SQL rendition of boolean truth.
pub const SQL_TRUE: &str = "1 = 1";
/// The only sanctioned SQL rendition of boolean falsehood.
pub const SQL_FALSE: &str = "1 = 0";

/// A value bound to a SQL placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// A text bind: strings, entity ids, canonical decimal strings
    Text(SmolStr),
    /// A signed 64-bit integer bind
    Long(i64),
    /// A boolean bind
    Bool(bool),
    /// A native timestamp bind
    Timestamp(DateTime<Utc>),
    /// A positional vector of binds, for `IN`-style and array operators
    Array(Vec<SqlValue>),
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        Self::Text(SmolStr::new(s))
    }
}

impl From<bool> for SqlValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for SqlValue {
    fn from(i: i64) -> Self {
        Self::Long(i)
    }
}

/// Error marshalling a domain value into a SQL bind argument
#[derive(Debug, Error, PartialEq, Clone)]
#[error("unsupported value type for SQL: {value}")]
pub struct UnsupportedSqlValueError {
    /// Rendition of the offending value
    value: String,
}

impl UnsupportedSqlValueError {
    fn new(value: &Value) -> Self {
        Self {
            value: value.to_string(),
        }
    }
}

impl TryFrom<&Value> for SqlValue {
    type Error = UnsupportedSqlValueError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Lit(Literal::String(s)) => Ok(Self::Text(s.clone())),
            Value::Lit(Literal::Long(i)) => Ok(Self::Long(*i)),
            Value::Lit(Literal::Bool(b)) => Ok(Self::Bool(*b)),
            // an entity reference binds as its id component
            Value::Lit(Literal::EntityUID(uid)) => Ok(Self::Text(uid.eid().clone())),
            Value::Ext(ExtValue::Decimal(d)) => Ok(Self::Text(SmolStr::new(d.to_string()))),
            Value::Ext(ExtValue::Datetime(d)) => d
                .to_utc()
                .map(Self::Timestamp)
                .ok_or_else(|| UnsupportedSqlValueError::new(value)),
            Value::Set(set) => Ok(Self::Array(
                set.iter()
                    .map(SqlValue::try_from)
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Value::Record(_) | Value::Ext(ExtValue::IpAddr(_)) => {
                Err(UnsupportedSqlValueError::new(value))
            }
        }
    }
}

/// An argument of a [`Sqlizer::Expr`] template: either a bind value or a
/// nested fragment to splice in.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprArg {
    /// A scalar bind value, emitted as `?`
    Value(SqlValue),
    /// A nested fragment, spliced into the template text
    Sqlizer(Sqlizer),
}

impl From<SqlValue> for ExprArg {
    fn from(v: SqlValue) -> Self {
        Self::Value(v)
    }
}

impl From<Sqlizer> for ExprArg {
    fn from(s: Sqlizer) -> Self {
        Self::Sqlizer(s)
    }
}

/// A piece of a [`Sqlizer::Concat`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConcatPart {
    /// Literal text
    Text(SmolStr),
    /// A nested fragment
    Sqlizer(Sqlizer),
}

impl From<&str> for ConcatPart {
    fn from(s: &str) -> Self {
        Self::Text(SmolStr::new(s))
    }
}

impl From<SmolStr> for ConcatPart {
    fn from(s: SmolStr) -> Self {
        Self::Text(s)
    }
}

impl From<Sqlizer> for ConcatPart {
    fn from(s: Sqlizer) -> Self {
        Self::Sqlizer(s)
    }
}

/// A composable SQL fragment. Rendering yields the SQL text and the bind
/// arguments, with each unescaped `?` in the text matching exactly one
/// argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Sqlizer {
    /// A template whose only metacharacter is `?`; `??` is a literal `?`.
    /// Each unescaped `?` consumes one argument; nested fragments are
    /// spliced in and their arguments concatenated.
    Expr {
        /// The template text
        sql: String,
        /// The template arguments, one per unescaped `?`
        args: Vec<ExprArg>,
    },
    /// Text-level concatenation of strings and fragments
    Concat(Vec<ConcatPart>),
    /// `parts[0] sep parts[1] sep ...`, parenthesized; the identity element
    /// is returned when `parts` is empty
    Conj {
        /// The fragments to join
        parts: Vec<Sqlizer>,
        /// The separator, e.g. `" AND "`
        sep: &'static str,
        /// The identity element, e.g. [`SQL_TRUE`]
        identity: &'static str,
    },
    /// Pre-rendered SQL text with its bind arguments; produced when a mapped
    /// column name replaces rendered text
    Part {
        /// The SQL text, emitted verbatim
        sql: String,
        /// The bind arguments
        args: Vec<SqlValue>,
    },
}

impl Sqlizer {
    /// Create a template fragment.
    ///
    /// # Panics
    ///
    /// Panics if the number of unescaped `?` in the template does not equal
    /// the number of arguments. A mismatch is a programmer error, caught at
    /// authoring time rather than render time.
    #[track_caller]
    pub fn expr(sql: impl Into<String>, args: impl IntoIterator<Item = ExprArg>) -> Self {
        let sql = sql.into();
        let args: Vec<ExprArg> = args.into_iter().collect();
        let expected = count_placeholders(&sql);
        if args.len() != expected {
            panic!(
                "Expr: expected {expected} arguments, got {} for SQL template: {sql}",
                args.len()
            );
        }
        Self::Expr { sql, args }
    }

    /// Create a concatenation fragment.
    pub fn concat(parts: impl IntoIterator<Item = ConcatPart>) -> Self {
        Self::Concat(parts.into_iter().collect())
    }

    /// Create a pre-rendered fragment.
    pub fn part(sql: impl Into<String>, args: Vec<SqlValue>) -> Self {
        Self::Part {
            sql: sql.into(),
            args,
        }
    }

    /// Join fragments with `AND`; the empty conjunction is [`SQL_TRUE`].
    pub fn and_expr(parts: Vec<Sqlizer>) -> Self {
        Self::Conj {
            parts,
            sep: " AND ",
            identity: SQL_TRUE,
        }
    }

    /// Join fragments with `OR`; the empty disjunction is [`SQL_FALSE`].
    pub fn or_expr(parts: Vec<Sqlizer>) -> Self {
        Self::Conj {
            parts,
            sep: " OR ",
            identity: SQL_FALSE,
        }
    }

    /// Render this fragment into SQL text and bind arguments.
    pub fn to_sql(&self) -> (String, Vec<SqlValue>) {
        let mut sql = String::new();
        let mut args = Vec::new();
        self.render(&mut sql, &mut args);
        (sql, args)
    }

    /// Single left-to-right rendering pass over the fragment tree, writing
    /// into an output buffer and argument accumulator.
    fn render(&self, out: &mut String, args: &mut Vec<SqlValue>) {
        match self {
            Self::Expr {
                sql,
                args: expr_args,
            } => {
                let mut arg_iter = expr_args.iter();
                let mut rest = sql.as_str();
                loop {
                    let Some(i) = rest.find('?') else {
                        // no more placeholders
                        out.push_str(rest);
                        break;
                    };
                    out.push_str(&rest[..i]);
                    if rest[i + 1..].starts_with('?') {
                        // escaped "??"; emit a single "?" and step past both
                        out.push('?');
                        rest = &rest[i + 2..];
                        continue;
                    }
                    // PANIC SAFETY: one argument per unescaped `?`, checked at construction
                    #[allow(clippy::unreachable)]
                    match arg_iter.next() {
                        Some(ExprArg::Value(v)) => {
                            out.push('?');
                            args.push(v.clone());
                        }
                        Some(ExprArg::Sqlizer(s)) => s.render(out, args),
                        None => unreachable!("placeholder arity checked at construction"),
                    }
                    rest = &rest[i + 1..];
                }
            }
            Self::Concat(parts) => {
                for part in parts {
                    match part {
                        ConcatPart::Text(text) => out.push_str(text),
                        ConcatPart::Sqlizer(s) => s.render(out, args),
                    }
                }
            }
            Self::Conj {
                parts,
                sep,
                identity,
            } => {
                if parts.is_empty() {
                    out.push_str(identity);
                    return;
                }
                // parts rendering to empty text are skipped
                let rendered: Vec<(String, Vec<SqlValue>)> = parts
                    .iter()
                    .map(Sqlizer::to_sql)
                    .filter(|(sql, _)| !sql.is_empty())
                    .collect();
                if rendered.is_empty() {
                    return;
                }
                out.push('(');
                out.push_str(&rendered.iter().map(|(sql, _)| sql.as_str()).join(sep));
                out.push(')');
                args.extend(rendered.into_iter().flat_map(|(_, args)| args));
            }
            Self::Part {
                sql,
                args: part_args,
            } => {
                out.push_str(sql);
                args.extend(part_args.iter().cloned());
            }
        }
    }
}

/// Count the parameter placeholders in a SQL template, ignoring escaped
/// question marks (`??`).
fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'?' {
            if bytes.get(i + 1) == Some(&b'?') {
                i += 2;
                continue;
            }
            count += 1;
        }
        i += 1;
    }
    count
}

/// The SQL operator templates that vary per dialect: hierarchy/set membership
/// against a column. Templates are [`Sqlizer::Expr`] templates, so `??` is a
/// literal `?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    /// `entity in column`: args are (column fragment, entity bind)
    pub in_set: &'static str,
    /// `column.contains(x)`: args are (column fragment, element bind)
    pub contains: &'static str,
    /// `column.containsAll(xs)`: args are (column fragment, array bind)
    pub contains_all: &'static str,
    /// `column.containsAny(xs)`: args are (column fragment, array bind)
    pub contains_any: &'static str,
}

impl Dialect {
    /// The Postgres JSONB containment operators `?`, `?&`, `?|`.
    pub const POSTGRES: Dialect = Dialect {
        in_set: "? ?? ?",
        contains: "? ?? ?",
        contains_all: "? ??& ?",
        contains_any: "? ??| ?",
    };
}

impl Default for Dialect {
    fn default() -> Self {
        Self::POSTGRES
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::EntityUID;
    use cool_asserts::assert_matches;
    use similar_asserts::assert_eq;

    #[test]
    fn conj_two_parts_parenthesized() {
        let (sql, args) = Sqlizer::and_expr(vec![
            Sqlizer::expr("1 = 1", []),
            Sqlizer::expr("2 = 2", []),
        ])
        .to_sql();
        assert_eq!(sql, "(1 = 1 AND 2 = 2)");
        assert_eq!(args, vec![]);

        let (sql, _) = Sqlizer::or_expr(vec![
            Sqlizer::expr("1 = 1", []),
            Sqlizer::expr("2 = 2", []),
        ])
        .to_sql();
        assert_eq!(sql, "(1 = 1 OR 2 = 2)");
    }

    #[test]
    fn conj_identity_elements() {
        assert_eq!(Sqlizer::and_expr(vec![]).to_sql(), (SQL_TRUE.to_string(), vec![]));
        assert_eq!(Sqlizer::or_expr(vec![]).to_sql(), (SQL_FALSE.to_string(), vec![]));
    }

    #[test]
    fn conj_skips_empty_parts() {
        let (sql, _) = Sqlizer::and_expr(vec![
            Sqlizer::expr("", []),
            Sqlizer::expr("a = 1", []),
        ])
        .to_sql();
        assert_eq!(sql, "(a = 1)");
    }

    #[test]
    fn expr_binds_values() {
        let (sql, args) = Sqlizer::expr(
            "name = ? AND age > ?",
            [SqlValue::from("john").into(), SqlValue::from(25).into()],
        )
        .to_sql();
        assert_eq!(sql, "name = ? AND age > ?");
        assert_eq!(args, vec![SqlValue::from("john"), SqlValue::from(25)]);
    }

    #[test]
    fn expr_splices_nested_fragments() {
        let inner = Sqlizer::expr("status = ?", [SqlValue::from("active").into()]);
        let (sql, args) = Sqlizer::expr(
            "name = ? AND ?",
            [SqlValue::from("john").into(), inner.into()],
        )
        .to_sql();
        assert_eq!(sql, "name = ? AND status = ?");
        assert_eq!(args, vec![SqlValue::from("john"), SqlValue::from("active")]);
    }

    // the escape round-trip scenario from the jsonb operator family
    #[test]
    fn expr_escaped_placeholder() {
        let (sql, args) = Sqlizer::expr(
            "? ??! ?",
            [
                Sqlizer::expr("document.viewACL", []).into(),
                Sqlizer::expr("?::jsonb", [SqlValue::from("User::jared").into()]).into(),
            ],
        )
        .to_sql();
        assert_eq!(sql, "document.viewACL ?! ?::jsonb");
        assert_eq!(args, vec![SqlValue::from("User::jared")]);
    }

    #[test]
    fn placeholder_arity_matches_args() {
        let fragment = Sqlizer::expr(
            "(? OR ?) AND ?",
            [
                Sqlizer::expr("a = ?", [SqlValue::from(1).into()]).into(),
                Sqlizer::expr("b = ?", [SqlValue::from(2).into()]).into(),
                SqlValue::from(true).into(),
            ],
        );
        let (sql, args) = fragment.to_sql();
        assert_eq!(count_placeholders(&sql), args.len());
    }

    #[test]
    #[should_panic(expected = "expected 2 arguments, got 1")]
    fn arity_mismatch_panics() {
        let _ = Sqlizer::expr("a = ? AND b = ?", [SqlValue::from(1).into()]);
    }

    #[test]
    fn escaped_placeholders_consume_no_args() {
        let (sql, args) = Sqlizer::expr("data ??| ?", [SqlValue::from("x").into()]).to_sql();
        assert_eq!(sql, "data ?| ?");
        assert_eq!(args, vec![SqlValue::from("x")]);
    }

    #[test]
    fn concat_glues_text_and_fragments() {
        let (sql, args) = Sqlizer::concat([
            Sqlizer::expr("resource", []).into(),
            ".".into(),
            "owner".into(),
        ])
        .to_sql();
        assert_eq!(sql, "resource.owner");
        assert_eq!(args, vec![]);
    }

    #[test]
    fn marshal_scalars() {
        assert_eq!(
            SqlValue::try_from(&Value::from("bob")),
            Ok(SqlValue::from("bob"))
        );
        assert_eq!(SqlValue::try_from(&Value::from(7)), Ok(SqlValue::from(7)));
        assert_eq!(
            SqlValue::try_from(&Value::from(true)),
            Ok(SqlValue::from(true))
        );
        assert_eq!(
            SqlValue::try_from(&Value::from(EntityUID::new("User", "bob"))),
            Ok(SqlValue::from("bob"))
        );
        let decimal = crate::extensions::call("decimal", &[Value::from("12.5000")]).unwrap();
        assert_eq!(SqlValue::try_from(&decimal), Ok(SqlValue::from("12.5")));
    }

    #[test]
    fn marshal_set_positionally() {
        let set = Value::set([Value::from("a"), Value::from("b")]);
        assert_eq!(
            SqlValue::try_from(&set),
            Ok(SqlValue::Array(vec![
                SqlValue::from("a"),
                SqlValue::from("b")
            ]))
        );
    }

    #[test]
    fn marshal_rejects_records_and_ips() {
        let record = Value::record([(smol_str::SmolStr::new_static("a"), Value::from(1))]);
        assert_matches!(SqlValue::try_from(&record), Err(UnsupportedSqlValueError { .. }));
        let ip = crate::extensions::call("ip", &[Value::from("10.0.0.1")]).unwrap();
        assert_matches!(SqlValue::try_from(&ip), Err(UnsupportedSqlValueError { .. }));
    }

    #[test]
    fn marshal_timestamp() {
        let dt = crate::extensions::call("datetime", &[Value::from("2024-06-01T12:00:00Z")])
            .unwrap();
        assert_matches!(
            SqlValue::try_from(&dt),
            Ok(SqlValue::Timestamp(ts)) => assert_eq!(ts.timestamp(), 1717243200)
        );
    }
}
