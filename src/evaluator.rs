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

//! This module contains the evaluator for closed (value-only) subtrees, and
//! the partial evaluator built on top of it.

use crate::ast::{
    BinaryOp, EntityUID, Expr, ExprKind, Literal, Type, UnaryOp, Value, Var,
};
use crate::entities::Entities;
use crate::extensions::{self, ExtValue};
use nonempty::nonempty;
use std::sync::Arc;

mod err;
pub use err::*;
mod partial;
pub use partial::*;

/// The (possibly partial) environment an expression is evaluated under.
///
/// Any of the four request variables may be bound to a concrete value or to
/// an unknown-variable sentinel ([`Value::variable`]); the entity store is
/// always concrete and read-only.
#[derive(Debug, Clone)]
pub struct Env<'e> {
    /// `principal` for the current request
    pub principal: Value,
    /// `action` for the current request
    pub action: Value,
    /// `resource` for the current request
    pub resource: Value,
    /// `context` for the current request; when concrete this is a Record
    pub context: Value,
    /// Entities used to resolve entity references
    pub entities: &'e Entities,
}

impl<'e> Env<'e> {
    /// Create an environment over the given entity store with all four
    /// request variables unknown.
    pub fn new(entities: &'e Entities) -> Self {
        Self {
            principal: Value::variable("principal"),
            action: Value::variable("action"),
            resource: Value::variable("resource"),
            context: Value::variable("context"),
            entities,
        }
    }

    /// Bind `principal` to a concrete value.
    pub fn with_principal(self, v: impl Into<Value>) -> Self {
        Self {
            principal: v.into(),
            ..self
        }
    }

    /// Bind `action` to a concrete value.
    pub fn with_action(self, v: impl Into<Value>) -> Self {
        Self {
            action: v.into(),
            ..self
        }
    }

    /// Bind `resource` to a concrete value.
    pub fn with_resource(self, v: impl Into<Value>) -> Self {
        Self {
            resource: v.into(),
            ..self
        }
    }

    /// Bind `context` to a concrete value.
    pub fn with_context(self, v: impl Into<Value>) -> Self {
        Self {
            context: v.into(),
            ..self
        }
    }

    /// The value bound to the given request variable.
    pub fn var(&self, v: Var) -> &Value {
        match v {
            Var::Principal => &self.principal,
            Var::Action => &self.action,
            Var::Resource => &self.resource,
            Var::Context => &self.context,
        }
    }
}

/// Evaluator for closed expressions.
///
/// Evaluating a `Var` bound to an unknown-variable sentinel yields the
/// sentinel itself (callers canonicalize it), but any *operation* on a value
/// containing unknowns fails with [`EvaluationError::NonValue`] rather than
/// folding an unknown silently.
#[derive(Debug)]
pub struct Evaluator<'e> {
    env: &'e Env<'e>,
}

impl<'e> Evaluator<'e> {
    /// Create a fresh `Evaluator` over the given environment.
    pub fn new(env: &'e Env<'e>) -> Self {
        Self { env }
    }

    pub(crate) fn env(&self) -> &Env<'e> {
        self.env
    }

    /// Interpret an `Expr` into a `Value` in this evaluation environment.
    ///
    /// May return an error, for instance if the `Expr` tries to access an
    /// attribute that doesn't exist.
    pub fn interpret(&self, expr: &Expr) -> Result<Value> {
        match expr.expr_kind() {
            ExprKind::Val(v) => Ok(v.clone()),
            ExprKind::Var(v) => Ok(self.env.var(*v).clone()),
            ExprKind::If {
                test_expr,
                then_expr,
                else_expr,
            } => {
                if self.interpret(test_expr)?.get_as_bool()? {
                    self.interpret(then_expr)
                } else {
                    self.interpret(else_expr)
                }
            }
            ExprKind::And { left, right } => {
                if self.interpret(left)?.get_as_bool()? {
                    Ok(self.interpret(right)?.get_as_bool()?.into())
                } else {
                    // We can short circuit here
                    Ok(false.into())
                }
            }
            ExprKind::Or { left, right } => {
                if self.interpret(left)?.get_as_bool()? {
                    // We can short circuit here
                    Ok(true.into())
                } else {
                    Ok(self.interpret(right)?.get_as_bool()?.into())
                }
            }
            ExprKind::UnaryApp { op, arg } => {
                let arg = self.interpret(arg)?;
                match op {
                    UnaryOp::Not => arg.get_as_bool().map(|b| (!b).into()),
                    UnaryOp::Neg => arg
                        .get_as_long()?
                        .checked_neg()
                        .map(Value::from)
                        .ok_or_else(|| {
                            IntegerOverflowError::UnaryOp { op: *op, arg }.into()
                        }),
                    UnaryOp::IsEmpty => arg.get_as_set().map(|s| s.is_empty().into()),
                }
            }
            ExprKind::BinaryApp { op, arg1, arg2 } => {
                let (arg1, arg2) = (self.interpret(arg1)?, self.interpret(arg2)?);
                self.apply_binary(*op, arg1, arg2)
            }
            ExprKind::ExtensionFunctionApp { fn_name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.interpret(arg))
                    .collect::<Result<Vec<_>>>()?;
                if args.iter().any(Value::contains_unknown) {
                    return Err(EvaluationError::partial_extension(fn_name.clone()));
                }
                extensions::call(fn_name, &args)
            }
            ExprKind::GetAttr { expr, attr } => self.get_attr(self.interpret(expr)?, attr),
            ExprKind::HasAttr { expr, attr } => self.has_attr(self.interpret(expr)?, attr),
            ExprKind::Like { expr, pattern } => {
                let v = self.interpret(expr)?;
                Ok(pattern.wildcard_match(v.get_as_string()?).into())
            }
            ExprKind::Is { expr, entity_type } => {
                let v = self.interpret(expr)?;
                Ok((v.get_as_entity()?.entity_type() == entity_type).into())
            }
            ExprKind::IsIn {
                expr,
                entity_type,
                in_expr,
            } => {
                let v = self.interpret(expr)?;
                if v.get_as_entity()?.entity_type() != entity_type {
                    return Ok(false.into());
                }
                let in_val = self.interpret(in_expr)?;
                self.apply_binary(BinaryOp::In, v, in_val)
            }
            ExprKind::Set(elements) => {
                let vals = elements
                    .iter()
                    .map(|e| self.interpret(e))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::set(vals))
            }
            ExprKind::Record(attrs) => {
                let attrs = attrs
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.interpret(v)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::record(attrs))
            }
        }
    }

    fn apply_binary(&self, op: BinaryOp, arg1: Value, arg2: Value) -> Result<Value> {
        match op {
            BinaryOp::Eq | BinaryOp::NotEq => {
                // total equality must not compare unknowns structurally
                if arg1.contains_unknown() {
                    return Err(EvaluationError::non_value(&arg1));
                }
                if arg2.contains_unknown() {
                    return Err(EvaluationError::non_value(&arg2));
                }
                let eq = arg1 == arg2;
                Ok((if op == BinaryOp::Eq { eq } else { !eq }).into())
            }
            BinaryOp::Less | BinaryOp::LessEq | BinaryOp::Greater | BinaryOp::GreaterEq => {
                let ordering = match (&arg1, &arg2) {
                    (Value::Lit(Literal::Long(i1)), Value::Lit(Literal::Long(i2))) => i1.cmp(i2),
                    (Value::Ext(ExtValue::Decimal(d1)), Value::Ext(ExtValue::Decimal(d2))) => {
                        d1.cmp(d2)
                    }
                    (Value::Ext(ExtValue::Datetime(d1)), Value::Ext(ExtValue::Datetime(d2))) => {
                        d1.cmp(d2)
                    }
                    _ => {
                        let culprit = if arg1.get_as_long().is_err() {
                            &arg1
                        } else {
                            &arg2
                        };
                        return Err(EvaluationError::type_error_with_advice(
                            nonempty![Type::Long],
                            culprit,
                            format!("operation `{op}` should have operands of the same comparable type"),
                        ));
                    }
                };
                Ok(match op {
                    BinaryOp::Less => ordering.is_lt(),
                    BinaryOp::LessEq => ordering.is_le(),
                    BinaryOp::Greater => ordering.is_gt(),
                    _ => ordering.is_ge(),
                }
                .into())
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => {
                let (i1, i2) = (arg1.get_as_long()?, arg2.get_as_long()?);
                let result = match op {
                    BinaryOp::Add => i1.checked_add(i2),
                    BinaryOp::Sub => i1.checked_sub(i2),
                    _ => i1.checked_mul(i2),
                };
                result.map(Value::from).ok_or_else(|| {
                    IntegerOverflowError::BinaryOp { op, arg1, arg2 }.into()
                })
            }
            BinaryOp::In => {
                let uid1 = arg1.get_as_entity()?.clone();
                match &arg2 {
                    Value::Set(set) => {
                        for element in set.iter() {
                            if self.entity_in(&uid1, element.get_as_entity()?) {
                                return Ok(true.into());
                            }
                        }
                        Ok(false.into())
                    }
                    _ => Ok(self.entity_in(&uid1, arg2.get_as_entity()?).into()),
                }
            }
            BinaryOp::Contains => {
                if arg2.contains_unknown() {
                    return Err(EvaluationError::non_value(&arg2));
                }
                let set = arg1.get_as_set()?;
                if set.iter().any(Value::contains_unknown) {
                    return Err(EvaluationError::non_value(&arg1));
                }
                Ok(set.contains(&arg2).into())
            }
            BinaryOp::ContainsAll | BinaryOp::ContainsAny => {
                if arg1.contains_unknown() {
                    return Err(EvaluationError::non_value(&arg1));
                }
                if arg2.contains_unknown() {
                    return Err(EvaluationError::non_value(&arg2));
                }
                let (set1, set2) = (arg1.get_as_set()?, arg2.get_as_set()?);
                Ok(if op == BinaryOp::ContainsAll {
                    set1.is_superset(set2)
                } else {
                    set1.intersects(set2)
                }
                .into())
            }
            BinaryOp::GetTag => {
                let uid = arg1.get_as_entity()?.clone();
                let tag = arg2.get_as_string()?;
                let entity = self
                    .env
                    .entities
                    .entity(&uid)
                    .ok_or_else(|| EvaluationError::entity_does_not_exist(uid.clone()))?;
                entity.tag(tag).cloned().ok_or_else(|| {
                    EvaluationError::entity_tag_does_not_exist(uid.clone(), tag.clone())
                })
            }
        }
    }

    /// Hierarchy membership: reflexive, then via the ancestor set.
    fn entity_in(&self, uid: &Arc<EntityUID>, ancestor: &Arc<EntityUID>) -> bool {
        if uid == ancestor {
            return true;
        }
        match self.env.entities.entity(uid) {
            Some(entity) => entity.is_descendant_of(ancestor),
            None => false,
        }
    }

    fn get_attr(&self, value: Value, attr: &smol_str::SmolStr) -> Result<Value> {
        match value {
            Value::Record(attrs) => attrs
                .get(attr)
                .cloned()
                .ok_or_else(|| EvaluationError::RecordAttrDoesNotExist(attr.clone())),
            _ => {
                let uid = value.get_as_entity()?.clone();
                let entity = self
                    .env
                    .entities
                    .entity(&uid)
                    .ok_or_else(|| EvaluationError::entity_does_not_exist(uid.clone()))?;
                entity.attr(attr).cloned().ok_or_else(|| {
                    EvaluationError::entity_attr_does_not_exist(uid.clone(), attr.clone())
                })
            }
        }
    }

    fn has_attr(&self, value: Value, attr: &smol_str::SmolStr) -> Result<Value> {
        match value {
            Value::Record(attrs) => Ok(attrs.contains_key(attr).into()),
            _ => {
                let uid = value.get_as_entity()?;
                Ok(match self.env.entities.entity(uid) {
                    Some(entity) => entity.has_attr(attr),
                    // an entity absent from the store has no attributes
                    None => false,
                }
                .into())
            }
        }
    }
}
