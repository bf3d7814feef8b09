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

//! Partial evaluation of policies under an environment that leaves some
//! request variables unknown. Closed subtrees fold through the concrete
//! evaluator; everything touching an unknown stays residual.

use crate::ast::{Expr, ExprKind, PartialValue, Policy, Value};
use crate::evaluator::{Env, Evaluator, Result};

/// What partial evaluation concluded about a single policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyOutcome {
    /// The policy can never apply under this environment (its condition
    /// collapsed to `false`, or evaluating its concrete parts errored).
    Dropped,
    /// The policy's condition collapsed to `true` with no remainder.
    Satisfied,
    /// The policy's condition reduced to an expression still containing
    /// unknowns.
    Remainder(Expr),
}

/// Partial evaluator over a (possibly partial) environment.
#[derive(Debug)]
pub struct PartialEvaluator<'e> {
    evaluator: Evaluator<'e>,
}

impl<'e> PartialEvaluator<'e> {
    /// Create a fresh `PartialEvaluator` over the given environment.
    pub fn new(env: &'e Env<'e>) -> Self {
        Self {
            evaluator: Evaluator::new(env),
        }
    }

    /// Partially evaluate a policy's condition and classify the outcome.
    ///
    /// A condition that collapses to a value which is itself an
    /// unknown-variable sentinel counts as a remainder, not as satisfied.
    /// A non-boolean collapse is a type error and aborts the whole
    /// translation rather than dropping the policy.
    pub fn partial_policy(&self, policy: &Policy) -> Result<PolicyOutcome> {
        match self.partial_interpret(policy.condition()) {
            Err(_) => Ok(PolicyOutcome::Dropped),
            Ok(PartialValue::Value(v)) => {
                if v.as_variable().is_some() {
                    return Ok(PolicyOutcome::Remainder(Expr::val(v)));
                }
                if v.get_as_bool()? {
                    Ok(PolicyOutcome::Satisfied)
                } else {
                    Ok(PolicyOutcome::Dropped)
                }
            }
            Ok(PartialValue::Residual(e)) => Ok(PolicyOutcome::Remainder(e)),
        }
    }

    /// A value is only allowed to stand as a `PartialValue::Value` when it is
    /// fully known; anything carrying a sentinel becomes a residual.
    fn partial_value(&self, v: Value) -> PartialValue {
        if v.contains_unknown() {
            PartialValue::Residual(Expr::val(v))
        } else {
            PartialValue::Value(v)
        }
    }

    /// Fold a closed node through the concrete evaluator.
    fn fold(&self, expr: &Expr) -> Result<PartialValue> {
        self.evaluator.interpret(expr).map(|v| self.partial_value(v))
    }

    /// Partially interpret an `Expr` into a `PartialValue`.
    pub fn partial_interpret(&self, expr: &Expr) -> Result<PartialValue> {
        match expr.expr_kind() {
            ExprKind::Val(v) => Ok(self.partial_value(v.clone())),
            ExprKind::Var(v) => Ok(self.partial_value(self.evaluator.env().var(*v).clone())),
            ExprKind::If {
                test_expr,
                then_expr,
                else_expr,
            } => match self.partial_interpret(test_expr)? {
                PartialValue::Value(v) => {
                    if v.get_as_bool()? {
                        self.partial_interpret(then_expr)
                    } else {
                        self.partial_interpret(else_expr)
                    }
                }
                PartialValue::Residual(test) => {
                    let then_part = self.partial_interpret(then_expr)?;
                    let else_part = self.partial_interpret(else_expr)?;
                    Ok(PartialValue::Residual(Expr::ite(
                        test,
                        then_part.into(),
                        else_part.into(),
                    )))
                }
            },
            ExprKind::And { left, right } => match self.partial_interpret(left)? {
                PartialValue::Value(v) => {
                    if !v.get_as_bool()? {
                        // We can short circuit here
                        return Ok(Value::from(false).into());
                    }
                    match self.partial_interpret(right)? {
                        PartialValue::Value(rv) => Ok(Value::from(rv.get_as_bool()?).into()),
                        PartialValue::Residual(r) => Ok(PartialValue::Residual(r)),
                    }
                }
                PartialValue::Residual(l) => {
                    let r = self.partial_interpret(right)?;
                    Ok(PartialValue::Residual(Expr::and(l, r.into())))
                }
            },
            ExprKind::Or { left, right } => match self.partial_interpret(left)? {
                PartialValue::Value(v) => {
                    if v.get_as_bool()? {
                        // We can short circuit here
                        return Ok(Value::from(true).into());
                    }
                    match self.partial_interpret(right)? {
                        PartialValue::Value(rv) => Ok(Value::from(rv.get_as_bool()?).into()),
                        PartialValue::Residual(r) => Ok(PartialValue::Residual(r)),
                    }
                }
                PartialValue::Residual(l) => {
                    let r = self.partial_interpret(right)?;
                    Ok(PartialValue::Residual(Expr::or(l, r.into())))
                }
            },
            ExprKind::UnaryApp { op, arg } => match self.partial_interpret(arg)? {
                PartialValue::Value(v) => self.fold(&Expr::unary_app(*op, Expr::val(v))),
                PartialValue::Residual(r) => {
                    Ok(PartialValue::Residual(Expr::unary_app(*op, r)))
                }
            },
            ExprKind::BinaryApp { op, arg1, arg2 } => {
                let arg1 = self.partial_interpret(arg1)?;
                let arg2 = self.partial_interpret(arg2)?;
                match (arg1, arg2) {
                    (PartialValue::Value(v1), PartialValue::Value(v2)) => {
                        self.fold(&Expr::binary_app(*op, Expr::val(v1), Expr::val(v2)))
                    }
                    (arg1, arg2) => Ok(PartialValue::Residual(Expr::binary_app(
                        *op,
                        arg1.into(),
                        arg2.into(),
                    ))),
                }
            }
            ExprKind::ExtensionFunctionApp { fn_name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.partial_interpret(arg))
                    .collect::<Result<Vec<_>>>()?;
                if args.iter().all(|a| matches!(a, PartialValue::Value(_))) {
                    self.fold(&Expr::call_extension_fn(
                        fn_name.clone(),
                        args.into_iter().map(Expr::from).collect(),
                    ))
                } else {
                    Ok(PartialValue::Residual(Expr::call_extension_fn(
                        fn_name.clone(),
                        args.into_iter().map(Expr::from).collect(),
                    )))
                }
            }
            ExprKind::GetAttr { expr, attr } => match self.partial_interpret(expr)? {
                PartialValue::Value(v) => {
                    self.fold(&Expr::get_attr(Expr::val(v), attr.clone()))
                }
                PartialValue::Residual(r) => {
                    Ok(PartialValue::Residual(Expr::get_attr(r, attr.clone())))
                }
            },
            ExprKind::HasAttr { expr, attr } => match self.partial_interpret(expr)? {
                PartialValue::Value(v) => {
                    self.fold(&Expr::has_attr(Expr::val(v), attr.clone()))
                }
                PartialValue::Residual(r) => {
                    Ok(PartialValue::Residual(Expr::has_attr(r, attr.clone())))
                }
            },
            ExprKind::Like { expr, pattern } => match self.partial_interpret(expr)? {
                PartialValue::Value(v) => {
                    self.fold(&Expr::like(Expr::val(v), pattern.clone()))
                }
                PartialValue::Residual(r) => {
                    Ok(PartialValue::Residual(Expr::like(r, pattern.clone())))
                }
            },
            ExprKind::Is { expr, entity_type } => match self.partial_interpret(expr)? {
                PartialValue::Value(v) => {
                    self.fold(&Expr::is_entity_type(Expr::val(v), entity_type.clone()))
                }
                PartialValue::Residual(r) => Ok(PartialValue::Residual(Expr::is_entity_type(
                    r,
                    entity_type.clone(),
                ))),
            },
            ExprKind::IsIn {
                expr,
                entity_type,
                in_expr,
            } => {
                let arg = self.partial_interpret(expr)?;
                let in_arg = self.partial_interpret(in_expr)?;
                match (arg, in_arg) {
                    (PartialValue::Value(v), PartialValue::Value(in_v)) => {
                        self.fold(&Expr::is_entity_type_in(
                            Expr::val(v),
                            entity_type.clone(),
                            Expr::val(in_v),
                        ))
                    }
                    (arg, in_arg) => Ok(PartialValue::Residual(Expr::is_entity_type_in(
                        arg.into(),
                        entity_type.clone(),
                        in_arg.into(),
                    ))),
                }
            }
            ExprKind::Set(elements) => {
                let elements = elements
                    .iter()
                    .map(|e| self.partial_interpret(e))
                    .collect::<Result<Vec<_>>>()?;
                if elements.iter().all(|e| matches!(e, PartialValue::Value(_))) {
                    self.fold(&Expr::set(elements.into_iter().map(Expr::from)))
                } else {
                    Ok(PartialValue::Residual(Expr::set(
                        elements.into_iter().map(Expr::from),
                    )))
                }
            }
            ExprKind::Record(attrs) => {
                let attrs = attrs
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.partial_interpret(v)?)))
                    .collect::<Result<Vec<_>>>()?;
                if attrs.iter().all(|(_, v)| matches!(v, PartialValue::Value(_))) {
                    self.fold(&Expr::record(
                        attrs.into_iter().map(|(k, v)| (k, Expr::from(v))),
                    ))
                } else {
                    Ok(PartialValue::Residual(Expr::record(
                        attrs.into_iter().map(|(k, v)| (k, Expr::from(v))),
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::{Effect, EntityUID, Var};
    use crate::entities::Entities;
    use cool_asserts::assert_matches;
    use similar_asserts::assert_eq;
    use smol_str::SmolStr;

    fn store() -> Entities {
        Entities::from_json_str(
            r#"
            [
                {
                    "uid": {"type": "User", "id": "alice"},
                    "parents": [{"type": "Group", "id": "admin"}]
                },
                {"uid": {"type": "User", "id": "bob"}},
                {"uid": {"type": "Group", "id": "admin"}}
            ]
            "#,
        )
        .unwrap()
    }

    fn authenticated_context() -> Value {
        Value::record([(SmolStr::new_static("is_authenticated"), Value::from(true))])
    }

    #[test]
    fn satisfied_policy() {
        let entities = store();
        let env = Env::new(&entities)
            .with_principal(EntityUID::new("User", "alice"))
            .with_context(authenticated_context());
        let pe = PartialEvaluator::new(&env);
        let policy = Policy::new(
            "admins",
            Effect::Permit,
            Expr::and(
                Expr::get_attr(Expr::var(Var::Context), "is_authenticated"),
                Expr::is_in(
                    Expr::var(Var::Principal),
                    Expr::val(EntityUID::new("Group", "admin")),
                ),
            ),
        );
        assert_eq!(pe.partial_policy(&policy).unwrap(), PolicyOutcome::Satisfied);
    }

    #[test]
    fn dropped_policy() {
        let entities = store();
        let env = Env::new(&entities)
            .with_principal(EntityUID::new("User", "bob"))
            .with_context(authenticated_context());
        let pe = PartialEvaluator::new(&env);
        // bob is not an admin, so the condition collapses to false
        let not_admin = Policy::new(
            "admins",
            Effect::Permit,
            Expr::is_in(
                Expr::var(Var::Principal),
                Expr::val(EntityUID::new("Group", "admin")),
            ),
        );
        assert_eq!(pe.partial_policy(&not_admin).unwrap(), PolicyOutcome::Dropped);
        // bob has no `block` attribute, so this condition errors concretely
        let blocked = Policy::new(
            "blocked",
            Effect::Forbid,
            Expr::is_eq(
                Expr::get_attr(Expr::var(Var::Principal), "block"),
                Expr::val(true),
            ),
        );
        assert_eq!(pe.partial_policy(&blocked).unwrap(), PolicyOutcome::Dropped);
    }

    #[test]
    fn remainder_keeps_unknown_subtree() {
        let entities = store();
        let env = Env::new(&entities)
            .with_principal(EntityUID::new("User", "bob"))
            .with_context(authenticated_context());
        let pe = PartialEvaluator::new(&env);
        let policy = Policy::new(
            "owners",
            Effect::Permit,
            Expr::and(
                Expr::get_attr(Expr::var(Var::Context), "is_authenticated"),
                Expr::is_eq(
                    Expr::get_attr(Expr::var(Var::Resource), "owner"),
                    Expr::var(Var::Principal),
                ),
            ),
        );
        let expected = Expr::is_eq(
            Expr::get_attr(Expr::val(Value::variable("resource")), "owner"),
            Expr::val(EntityUID::new("User", "bob")),
        );
        assert_matches!(
            pe.partial_policy(&policy).unwrap(),
            PolicyOutcome::Remainder(e) => assert_eq!(e, expected)
        );
    }

    #[test]
    fn non_boolean_condition_is_an_error() {
        let entities = store();
        let env = Env::new(&entities).with_principal(EntityUID::new("User", "bob"));
        let pe = PartialEvaluator::new(&env);
        let policy = Policy::new("odd", Effect::Permit, Expr::val(42));
        assert!(pe.partial_policy(&policy).is_err());
    }

    #[test]
    fn short_circuit_hides_residuals() {
        let entities = store();
        let env = Env::new(&entities).with_context(authenticated_context());
        let pe = PartialEvaluator::new(&env);
        // left side is concretely false; the unknown right side vanishes
        let e = Expr::and(
            Expr::not(Expr::get_attr(Expr::var(Var::Context), "is_authenticated")),
            Expr::is_eq(
                Expr::get_attr(Expr::var(Var::Resource), "owner"),
                Expr::val("bob"),
            ),
        );
        assert_eq!(
            pe.partial_interpret(&e).unwrap(),
            PartialValue::Value(Value::from(false))
        );
    }
}
