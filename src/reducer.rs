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

//! This module contains the residual reducer: a recursive descent over the
//! residual AST that folds value-only subtrees through the evaluator and
//! emits parametric SQL for subtrees still referencing unknowns.

use crate::ast::{BinaryOp, Expr, ExprKind, UnaryOp, Value};
use crate::err::{Result, TranslateError};
use crate::evaluator::{Env, Evaluator};
use crate::mapper::FieldMapper;
use crate::sqlizer::{ConcatPart, Dialect, SqlValue, Sqlizer, SQL_FALSE, SQL_TRUE};
use smol_str::SmolStr;

/// The reducer's tri-state result for a subtree: either it folded to a
/// concrete value, or it emits SQL.
#[derive(Debug, Clone)]
pub enum Reduction {
    /// The subtree folded to a concrete value
    Concrete(Value),
    /// The subtree emits SQL
    Fragment(Sqlizer),
}

impl Reduction {
    /// Wrap a folded value, canonicalizing the unknown-variable sentinel: a
    /// `Concrete` never wraps a sentinel, it becomes a fragment carrying the
    /// variable's name instead. Every call site folds through here so no
    /// consumer can mis-fold a sentinel.
    pub fn concrete(v: Value) -> Self {
        match v.as_variable() {
            Some(name) => Self::Fragment(Sqlizer::expr(name.as_str(), [])),
            None => Self::Concrete(v),
        }
    }

    /// Short-circuiting AND over reductions. A concrete side must be
    /// boolean: `true` is the identity, `false` is absorbing on the left and
    /// renders as the falsehood literal on the right.
    fn and(self, right: Reduction) -> Result<Reduction> {
        match (self, right) {
            (Reduction::Concrete(l), r) => {
                if l.get_as_bool()? {
                    Ok(r)
                } else {
                    Ok(Reduction::Concrete(false.into()))
                }
            }
            (Reduction::Fragment(ls), Reduction::Concrete(r)) => {
                if r.get_as_bool()? {
                    Ok(Reduction::Fragment(ls))
                } else {
                    Ok(Reduction::Fragment(Sqlizer::and_expr(vec![
                        ls,
                        Sqlizer::expr(SQL_FALSE, []),
                    ])))
                }
            }
            (Reduction::Fragment(ls), Reduction::Fragment(rs)) => {
                Ok(Reduction::Fragment(Sqlizer::and_expr(vec![ls, rs])))
            }
        }
    }

    /// Short-circuiting OR over reductions, dual to [`Reduction::and`]:
    /// `false` is the identity, `true` is absorbing.
    fn or(self, right: Reduction) -> Result<Reduction> {
        match (self, right) {
            (Reduction::Concrete(l), r) => {
                if l.get_as_bool()? {
                    Ok(Reduction::Concrete(true.into()))
                } else {
                    Ok(r)
                }
            }
            (Reduction::Fragment(ls), Reduction::Concrete(r)) => {
                if r.get_as_bool()? {
                    Ok(Reduction::Fragment(Sqlizer::or_expr(vec![
                        ls,
                        Sqlizer::expr(SQL_TRUE, []),
                    ])))
                } else {
                    Ok(Reduction::Fragment(ls))
                }
            }
            (Reduction::Fragment(ls), Reduction::Fragment(rs)) => {
                Ok(Reduction::Fragment(Sqlizer::or_expr(vec![ls, rs])))
            }
        }
    }
}

/// Emit the SQL `WHERE`-fragment selecting the rows the residual `node`
/// accepts, under the default (Postgres) dialect.
///
/// A residual that folds to boolean truth renders as the [`SQL_TRUE`] /
/// [`SQL_FALSE`] literals with no arguments; a non-boolean fold is an error.
pub fn to_sql(
    node: &Expr,
    env: &Env<'_>,
    mapper: &dyn FieldMapper,
) -> Result<(String, Vec<SqlValue>)> {
    to_sql_with_dialect(node, env, mapper, Dialect::default())
}

/// [`to_sql`] with an explicit operator dialect.
pub fn to_sql_with_dialect(
    node: &Expr,
    env: &Env<'_>,
    mapper: &dyn FieldMapper,
    dialect: Dialect,
) -> Result<(String, Vec<SqlValue>)> {
    let reducer = Reducer {
        evaluator: Evaluator::new(env),
        mapper,
        dialect,
    };
    match reducer.reduce(node)? {
        Reduction::Concrete(v) => {
            if v.get_as_bool()? {
                Ok((SQL_TRUE.to_string(), vec![]))
            } else {
                Ok((SQL_FALSE.to_string(), vec![]))
            }
        }
        Reduction::Fragment(s) => Ok(s.to_sql()),
    }
}

struct Reducer<'a> {
    evaluator: Evaluator<'a>,
    mapper: &'a dyn FieldMapper,
    dialect: Dialect,
}

impl Reducer<'_> {
    /// Reduce one residual node to a [`Reduction`].
    fn reduce(&self, node: &Expr) -> Result<Reduction> {
        tracing::trace!(node = %node, "reducing residual node");
        match node.expr_kind() {
            ExprKind::Val(v) => Ok(Reduction::concrete(v.clone())),
            // evaluates to the bound value; an unbound variable comes back
            // as a sentinel and is canonicalized into a fragment
            ExprKind::Var(_) => self.eval_node(node),
            ExprKind::GetAttr { expr, attr } => self.reduce_get_attr(expr, attr),
            ExprKind::HasAttr { expr, attr } => self.reduce_has_attr(expr, attr),
            ExprKind::UnaryApp {
                op: UnaryOp::Not,
                arg,
            } => match self.reduce(arg)? {
                Reduction::Concrete(v) => self.eval_node(&Expr::not(Expr::val(v))),
                Reduction::Fragment(s) => Ok(Reduction::Fragment(Sqlizer::expr(
                    "NOT (?)",
                    [s.into()],
                ))),
            },
            ExprKind::UnaryApp {
                op: UnaryOp::IsEmpty,
                arg,
            } => match self.reduce(arg)? {
                Reduction::Concrete(v) => self.eval_node(&Expr::is_empty(Expr::val(v))),
                Reduction::Fragment(s) => Ok(Reduction::Fragment(Sqlizer::expr(
                    "? IS NULL",
                    [s.into()],
                ))),
            },
            ExprKind::And { left, right } => {
                let (l, r) = (self.reduce(left)?, self.reduce(right)?);
                if let (Reduction::Concrete(_), Reduction::Concrete(_)) = (&l, &r) {
                    return self.eval_node(node);
                }
                l.and(r)
            }
            ExprKind::Or { left, right } => {
                let (l, r) = (self.reduce(left)?, self.reduce(right)?);
                if let (Reduction::Concrete(_), Reduction::Concrete(_)) = (&l, &r) {
                    return self.eval_node(node);
                }
                l.or(r)
            }
            ExprKind::BinaryApp { op, arg1, arg2 } => match op {
                BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Less
                | BinaryOp::LessEq
                | BinaryOp::Greater
                | BinaryOp::GreaterEq
                | BinaryOp::Add
                | BinaryOp::Sub
                | BinaryOp::Mul => self.reduce_compare(node, *op, arg1, arg2),
                BinaryOp::In => self.reduce_in(node, arg1, arg2),
                BinaryOp::Contains | BinaryOp::ContainsAll | BinaryOp::ContainsAny => {
                    self.reduce_set_op(node, *op, arg1, arg2)
                }
                // tags live on entities, never on row columns
                BinaryOp::GetTag => self.eval_node(node),
            },
            // kinds only meaningful on values: delegate to the evaluator,
            // which fails if a free unknown reaches them
            ExprKind::If { .. }
            | ExprKind::Like { .. }
            | ExprKind::Is { .. }
            | ExprKind::IsIn { .. }
            | ExprKind::UnaryApp {
                op: UnaryOp::Neg, ..
            }
            | ExprKind::Set(_)
            | ExprKind::Record(_) => self.eval_node(node),
            // a partial extension error propagates as a translation error
            ExprKind::ExtensionFunctionApp { .. } => self.eval_node(node),
        }
    }

    /// Fold a value-only node through the evaluator.
    fn eval_node(&self, node: &Expr) -> Result<Reduction> {
        Ok(Reduction::concrete(self.evaluator.interpret(node)?))
    }

    /// Assemble the fully dotted path for an attribute access on a fragment
    /// and run it through the mapper.
    fn mapped_path(&self, arg: Sqlizer, attr: &SmolStr) -> Result<Sqlizer> {
        let (path, args) = Sqlizer::concat([
            arg.into(),
            ".".into(),
            ConcatPart::Text(attr.clone()),
        ])
        .to_sql();
        let mapped = self.mapper.map(&path)?;
        Ok(Sqlizer::part(mapped.as_str(), args))
    }

    fn reduce_get_attr(&self, expr: &Expr, attr: &SmolStr) -> Result<Reduction> {
        match self.reduce(expr)? {
            // this can itself evaluate to a variable standing for a column;
            // `Reduction::concrete` rewraps it
            Reduction::Concrete(v) => {
                self.eval_node(&Expr::get_attr(Expr::val(v), attr.clone()))
            }
            Reduction::Fragment(s) => Ok(Reduction::Fragment(self.mapped_path(s, attr)?)),
        }
    }

    fn reduce_has_attr(&self, expr: &Expr, attr: &SmolStr) -> Result<Reduction> {
        match self.reduce(expr)? {
            Reduction::Concrete(v) => {
                self.eval_node(&Expr::has_attr(Expr::val(v), attr.clone()))
            }
            Reduction::Fragment(s) => {
                let column = self.mapped_path(s, attr)?;
                Ok(Reduction::Fragment(Sqlizer::expr(
                    "? IS NOT NULL",
                    [column.into()],
                )))
            }
        }
    }

    /// Binary comparisons and arithmetic: a concrete side becomes a bind
    /// argument on its original side of the operator.
    fn reduce_compare(
        &self,
        node: &Expr,
        op: BinaryOp,
        arg1: &Expr,
        arg2: &Expr,
    ) -> Result<Reduction> {
        let template = match op {
            BinaryOp::Eq => "? = ?",
            BinaryOp::NotEq => "? != ?",
            BinaryOp::Less => "? < ?",
            BinaryOp::LessEq => "? <= ?",
            BinaryOp::Greater => "? > ?",
            BinaryOp::GreaterEq => "? >= ?",
            BinaryOp::Add => "? + ?",
            BinaryOp::Sub => "? - ?",
            _ => "? * ?",
        };
        match (self.reduce(arg1)?, self.reduce(arg2)?) {
            (Reduction::Concrete(_), Reduction::Concrete(_)) => self.eval_node(node),
            (Reduction::Concrete(lv), Reduction::Fragment(rs)) => {
                let arg = SqlValue::try_from(&lv)?;
                Ok(Reduction::Fragment(Sqlizer::expr(
                    template,
                    [arg.into(), rs.into()],
                )))
            }
            (Reduction::Fragment(ls), Reduction::Concrete(rv)) => {
                let arg = SqlValue::try_from(&rv)?;
                Ok(Reduction::Fragment(Sqlizer::expr(
                    template,
                    [ls.into(), arg.into()],
                )))
            }
            (Reduction::Fragment(ls), Reduction::Fragment(rs)) => Ok(Reduction::Fragment(
                Sqlizer::expr(template, [ls.into(), rs.into()]),
            )),
        }
    }

    /// Hierarchy membership against a column holding a set: the column side
    /// comes first in the emitted operator, the member second.
    fn reduce_in(&self, node: &Expr, arg1: &Expr, arg2: &Expr) -> Result<Reduction> {
        match (self.reduce(arg1)?, self.reduce(arg2)?) {
            (Reduction::Concrete(_), Reduction::Concrete(_)) => self.eval_node(node),
            (Reduction::Concrete(lv), Reduction::Fragment(rs)) => {
                let arg = SqlValue::try_from(&lv)?;
                Ok(Reduction::Fragment(Sqlizer::expr(
                    self.dialect.in_set,
                    [rs.into(), arg.into()],
                )))
            }
            (Reduction::Fragment(_), Reduction::Concrete(_)) => {
                Err(TranslateError::InRightSideNotColumn(node.to_string()))
            }
            (Reduction::Fragment(ls), Reduction::Fragment(rs)) => Ok(Reduction::Fragment(
                Sqlizer::expr(self.dialect.in_set, [rs.into(), ls.into()]),
            )),
        }
    }

    /// `contains` / `containsAll` / `containsAny`: the left side must be a
    /// column reference.
    fn reduce_set_op(
        &self,
        node: &Expr,
        op: BinaryOp,
        arg1: &Expr,
        arg2: &Expr,
    ) -> Result<Reduction> {
        let template = match op {
            BinaryOp::Contains => self.dialect.contains,
            BinaryOp::ContainsAll => self.dialect.contains_all,
            _ => self.dialect.contains_any,
        };
        match (self.reduce(arg1)?, self.reduce(arg2)?) {
            (Reduction::Concrete(_), Reduction::Concrete(_)) => self.eval_node(node),
            (Reduction::Concrete(_), _) => Err(TranslateError::SetOperandNotColumn {
                op,
                node: node.to_string(),
            }),
            (Reduction::Fragment(ls), Reduction::Concrete(rv)) => {
                let arg = SqlValue::try_from(&rv)?;
                Ok(Reduction::Fragment(Sqlizer::expr(
                    template,
                    [ls.into(), arg.into()],
                )))
            }
            (Reduction::Fragment(ls), Reduction::Fragment(rs)) => Ok(Reduction::Fragment(
                Sqlizer::expr(template, [ls.into(), rs.into()]),
            )),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::{EntityUID, Var};
    use crate::entities::Entities;
    use crate::mapper::{DefaultFieldMapper, InvalidFieldNameError, PrefixFieldMapper};
    use cool_asserts::assert_matches;
    use similar_asserts::assert_eq;
    use smol_str::SmolStr;

    fn context_attr(attr: &str) -> Expr {
        Expr::get_attr(Expr::var(Var::Context), attr)
    }

    fn resource_attr(attr: &str) -> Expr {
        Expr::get_attr(Expr::var(Var::Resource), attr)
    }

    #[test]
    fn is_empty_on_unknown_context() {
        let entities = Entities::new();
        let env = Env::new(&entities);
        let (sql, args) =
            to_sql(&Expr::is_empty(context_attr("foo")), &env, &DefaultFieldMapper).unwrap();
        assert_eq!(sql, "context.foo IS NULL");
        assert_eq!(args, vec![]);
    }

    #[test]
    fn equal() {
        let entities = Entities::new();
        let env = Env::new(&entities);
        let (sql, args) = to_sql(
            &Expr::is_eq(context_attr("foo"), Expr::val("bar")),
            &env,
            &DefaultFieldMapper,
        )
        .unwrap();
        assert_eq!(sql, "context.foo = ?");
        assert_eq!(args, vec![SqlValue::from("bar")]);
    }

    #[test]
    fn not_equal() {
        let entities = Entities::new();
        let env = Env::new(&entities);
        let (sql, args) = to_sql(
            &Expr::noteq(context_attr("foo"), Expr::val("bar")),
            &env,
            &DefaultFieldMapper,
        )
        .unwrap();
        assert_eq!(sql, "context.foo != ?");
        assert_eq!(args, vec![SqlValue::from("bar")]);
    }

    #[test]
    fn and_parenthesized() {
        let entities = Entities::new();
        let env = Env::new(&entities);
        let (sql, args) = to_sql(
            &Expr::and(
                Expr::is_eq(context_attr("foo"), Expr::val("bar")),
                Expr::is_eq(context_attr("baz"), Expr::val(50)),
            ),
            &env,
            &DefaultFieldMapper,
        )
        .unwrap();
        assert_eq!(sql, "(context.foo = ? AND context.baz = ?)");
        assert_eq!(args, vec![SqlValue::from("bar"), SqlValue::from(50)]);
    }

    #[test]
    fn or_parenthesized() {
        let entities = Entities::new();
        let env = Env::new(&entities);
        let (sql, args) = to_sql(
            &Expr::or(
                Expr::is_eq(context_attr("foo"), Expr::val("bar")),
                Expr::is_eq(context_attr("baz"), Expr::val(50)),
            ),
            &env,
            &DefaultFieldMapper,
        )
        .unwrap();
        assert_eq!(sql, "(context.foo = ? OR context.baz = ?)");
        assert_eq!(args, vec![SqlValue::from("bar"), SqlValue::from(50)]);
    }

    #[test]
    fn equal_entity_binds_id() {
        let entities = Entities::new();
        let env = Env::new(&entities);
        let (sql, args) = to_sql(
            &Expr::is_eq(
                Expr::var(Var::Resource),
                Expr::val(EntityUID::new("doc", "123")),
            ),
            &env,
            &DefaultFieldMapper,
        )
        .unwrap();
        assert_eq!(sql, "resource = ?");
        assert_eq!(args, vec![SqlValue::from("123")]);
    }

    #[test]
    fn owner_or_public() {
        let entities = Entities::new();
        let env = Env::new(&entities).with_principal(EntityUID::new("user", "123"));
        let (sql, args) = to_sql(
            &Expr::or(
                Expr::is_eq(resource_attr("owner"), Expr::var(Var::Principal)),
                Expr::is_eq(resource_attr("is_public"), Expr::val(true)),
            ),
            &env,
            &DefaultFieldMapper,
        )
        .unwrap();
        assert_eq!(sql, "(resource.owner = ? OR resource.is_public = ?)");
        assert_eq!(args, vec![SqlValue::from("123"), SqlValue::from(true)]);
    }

    #[test]
    fn mapper_rewrites_columns() {
        let entities = Entities::new();
        let env = Env::new(&entities);
        let mapper = PrefixFieldMapper::new("resource", "document");
        let (sql, args) = to_sql(
            &Expr::is_eq(resource_attr("is_public"), Expr::val(true)),
            &env,
            &mapper,
        )
        .unwrap();
        assert_eq!(sql, "document.is_public = ?");
        assert_eq!(args, vec![SqlValue::from(true)]);
    }

    #[test]
    fn mapper_rejection_aborts() {
        struct RejectAll;
        impl FieldMapper for RejectAll {
            fn map(&self, name: &str) -> std::result::Result<SmolStr, InvalidFieldNameError> {
                Err(InvalidFieldNameError::new(name))
            }
        }
        let entities = Entities::new();
        let env = Env::new(&entities);
        let result = to_sql(
            &Expr::is_eq(resource_attr("owner"), Expr::val("x")),
            &env,
            &RejectAll,
        );
        assert_matches!(result, Err(TranslateError::InvalidFieldName(_)));
    }

    #[test]
    fn has_attr_is_not_null() {
        let entities = Entities::new();
        let env = Env::new(&entities);
        let (sql, args) = to_sql(
            &Expr::has_attr(Expr::var(Var::Resource), "owner"),
            &env,
            &DefaultFieldMapper,
        )
        .unwrap();
        assert_eq!(sql, "resource.owner IS NOT NULL");
        assert_eq!(args, vec![]);
    }

    #[test]
    fn not_wraps_fragment() {
        let entities = Entities::new();
        let env = Env::new(&entities);
        let (sql, args) = to_sql(
            &Expr::not(Expr::is_eq(resource_attr("is_public"), Expr::val(true))),
            &env,
            &DefaultFieldMapper,
        )
        .unwrap();
        assert_eq!(sql, "NOT (resource.is_public = ?)");
        assert_eq!(args, vec![SqlValue::from(true)]);
    }

    #[test]
    fn in_column_set() {
        let entities = Entities::new();
        let env = Env::new(&entities).with_principal(EntityUID::new("User", "alice"));
        let (sql, args) = to_sql(
            &Expr::is_in(Expr::var(Var::Principal), resource_attr("viewACL")),
            &env,
            &DefaultFieldMapper,
        )
        .unwrap();
        assert_eq!(sql, "resource.viewACL ? ?");
        assert_eq!(args, vec![SqlValue::from("alice")]);
    }

    #[test]
    fn in_concrete_right_is_shape_error() {
        let entities = Entities::new();
        let env = Env::new(&entities);
        let result = to_sql(
            &Expr::is_in(
                resource_attr("owner"),
                Expr::val(EntityUID::new("Group", "admin")),
            ),
            &env,
            &DefaultFieldMapper,
        );
        assert_matches!(result, Err(TranslateError::InRightSideNotColumn(_)));
    }

    #[test]
    fn contains_column_left() {
        let entities = Entities::new();
        let env = Env::new(&entities);
        let (sql, args) = to_sql(
            &Expr::contains(resource_attr("tags"), Expr::val("urgent")),
            &env,
            &DefaultFieldMapper,
        )
        .unwrap();
        assert_eq!(sql, "resource.tags ? ?");
        assert_eq!(args, vec![SqlValue::from("urgent")]);
    }

    #[test]
    fn contains_all_and_any_operators() {
        let entities = Entities::new();
        let env = Env::new(&entities);
        let wanted = Expr::val(Value::set([Value::from("a"), Value::from("b")]));
        let (sql, args) = to_sql(
            &Expr::contains_all(resource_attr("tags"), wanted.clone()),
            &env,
            &DefaultFieldMapper,
        )
        .unwrap();
        assert_eq!(sql, "resource.tags ?& ?");
        assert_eq!(
            args,
            vec![SqlValue::Array(vec![
                SqlValue::from("a"),
                SqlValue::from("b")
            ])]
        );
        let (sql, _) = to_sql(
            &Expr::contains_any(resource_attr("tags"), wanted),
            &env,
            &DefaultFieldMapper,
        )
        .unwrap();
        assert_eq!(sql, "resource.tags ?| ?");
    }

    #[test]
    fn contains_concrete_left_is_shape_error() {
        let entities = Entities::new();
        let env = Env::new(&entities);
        let result = to_sql(
            &Expr::contains(
                Expr::val(Value::set([Value::from("a")])),
                resource_attr("tag"),
            ),
            &env,
            &DefaultFieldMapper,
        );
        assert_matches!(
            result,
            Err(TranslateError::SetOperandNotColumn { .. })
        );
    }

    // constant folding: a residual with no unknowns renders as a truth
    // literal, never as a parametric fragment
    #[test]
    fn constant_folding() {
        let entities = Entities::new();
        let env = Env::new(&entities);
        let role_is_member = Expr::is_eq(
            Expr::get_attr(
                Expr::val(Value::record([(
                    SmolStr::new_static("role"),
                    Value::from("member"),
                )])),
                "role",
            ),
            Expr::val("member"),
        );
        let (sql, args) = to_sql(&role_is_member, &env, &DefaultFieldMapper).unwrap();
        assert_eq!(sql, SQL_TRUE);
        assert_eq!(args, vec![]);

        let (sql, args) = to_sql(
            &Expr::is_eq(Expr::val(1), Expr::val(2)),
            &env,
            &DefaultFieldMapper,
        )
        .unwrap();
        assert_eq!(sql, SQL_FALSE);
        assert_eq!(args, vec![]);
    }

    #[test]
    fn concrete_non_boolean_root_is_error() {
        let entities = Entities::new();
        let env = Env::new(&entities);
        let result = to_sql(
            &Expr::add(Expr::val(1), Expr::val(2)),
            &env,
            &DefaultFieldMapper,
        );
        assert_matches!(result, Err(TranslateError::Evaluation(_)));
    }

    // AND/OR identity: folding a known-true side leaves the fragment alone
    #[test]
    fn boolean_identities() {
        let entities = Entities::new();
        let env = Env::new(&entities);
        let fragment = Expr::is_eq(resource_attr("owner"), Expr::val("bob"));
        let (expected_sql, expected_args) =
            to_sql(&fragment, &env, &DefaultFieldMapper).unwrap();
        for e in [
            Expr::and(Expr::val(true), fragment.clone()),
            Expr::and(fragment.clone(), Expr::val(true)),
            Expr::or(Expr::val(false), fragment.clone()),
            Expr::or(fragment.clone(), Expr::val(false)),
        ] {
            let (sql, args) = to_sql(&e, &env, &DefaultFieldMapper).unwrap();
            assert_eq!(sql, expected_sql);
            assert_eq!(args, expected_args);
        }
    }

    #[test]
    fn absorbing_boolean_sides() {
        let entities = Entities::new();
        let env = Env::new(&entities);
        let fragment = Expr::is_eq(resource_attr("owner"), Expr::val("bob"));
        let (sql, args) = to_sql(
            &Expr::and(Expr::val(false), fragment.clone()),
            &env,
            &DefaultFieldMapper,
        )
        .unwrap();
        assert_eq!(sql, SQL_FALSE);
        assert_eq!(args, vec![]);
        let (sql, _) = to_sql(
            &Expr::or(Expr::val(true), fragment.clone()),
            &env,
            &DefaultFieldMapper,
        )
        .unwrap();
        assert_eq!(sql, SQL_TRUE);
        // a concrete falsehood on the right renders as the falsehood literal
        let (sql, args) = to_sql(
            &Expr::and(fragment, Expr::val(false)),
            &env,
            &DefaultFieldMapper,
        )
        .unwrap();
        assert_eq!(sql, "(resource.owner = ? AND 1 = 0)");
        assert_eq!(args, vec![SqlValue::from("bob")]);
    }

    // a type error inside a delegated kind aborts the translation
    #[test]
    fn free_unknown_in_value_only_kind_fails() {
        let entities = Entities::new();
        let env = Env::new(&entities);
        let result = to_sql(
            &Expr::get_tag(Expr::var(Var::Resource), Expr::val("team")),
            &env,
            &DefaultFieldMapper,
        );
        assert_matches!(result, Err(TranslateError::Evaluation(_)));
    }

    #[test]
    fn partial_extension_call_fails() {
        let entities = Entities::new();
        let env = Env::new(&entities);
        let result = to_sql(
            &Expr::call_extension_fn("decimal", vec![resource_attr("budget")]),
            &env,
            &DefaultFieldMapper,
        );
        assert_matches!(
            result,
            Err(TranslateError::Evaluation(
                crate::evaluator::EvaluationError::PartialExtension(_)
            ))
        );
    }

    // unescaped placeholder count always equals the argument count
    #[test]
    fn placeholder_arity_holds_end_to_end() {
        let entities = Entities::new();
        let env = Env::new(&entities).with_principal(EntityUID::new("User", "p"));
        let exprs = [
            Expr::is_eq(context_attr("foo"), Expr::val("bar")),
            Expr::and(
                Expr::is_eq(resource_attr("owner"), Expr::var(Var::Principal)),
                Expr::contains(resource_attr("tags"), Expr::val("x")),
            ),
            Expr::is_in(Expr::var(Var::Principal), resource_attr("acl")),
        ];
        for e in exprs {
            let (sql, args) = to_sql(&e, &env, &DefaultFieldMapper).unwrap();
            let mut count = 0;
            let bytes = sql.as_bytes();
            let mut i = 0;
            while i < bytes.len() {
                if bytes[i] == b'?' {
                    count += 1;
                }
                i += 1;
            }
            // rendered text has no escapes left, every `?` is either a bind
            // placeholder or a dialect operator; subtract the operators
            let operators = sql.matches(" ? ?").count();
            assert_eq!(count - operators, args.len());
        }
    }
}
