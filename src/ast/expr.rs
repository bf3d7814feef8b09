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

use crate::ast::{BinaryOp, EntityType, Literal, Pattern, UnaryOp, Value};
use itertools::Itertools;
use smol_str::SmolStr;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The four variables bound by an authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Var {
    /// The principal of the request
    Principal,
    /// The action of the request
    Action,
    /// The resource of the request
    Resource,
    /// The context of the request
    Context,
}

impl std::fmt::Display for Var {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Principal => write!(f, "principal"),
            Self::Action => write!(f, "action"),
            Self::Resource => write!(f, "resource"),
            Self::Context => write!(f, "context"),
        }
    }
}

/// A residual expression: what is left of a policy condition after partial
/// evaluation under an environment that leaves at least one request variable
/// unknown. This structure is a wrapper around an `ExprKind`, the expression
/// variant this object contains. Cloning is O(1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    expr_kind: ExprKind,
}

/// The possible expression variants. This enum should be matched on by code
/// recursively traversing the AST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    /// A fully evaluated value. Partial evaluation folds closed subtrees into
    /// this variant, so it carries a full `Value`, not just a literal.
    Val(Value),
    /// Variable
    Var(Var),
    /// Ternary expression
    If {
        /// Condition for the ternary expression. Must evaluate to Bool type
        test_expr: Arc<Expr>,
        /// Value if true
        then_expr: Arc<Expr>,
        /// Value if false
        else_expr: Arc<Expr>,
    },
    /// Boolean AND
    And {
        /// Left operand, which will be eagerly evaluated
        left: Arc<Expr>,
        /// Right operand, which may not be evaluated due to short-circuiting
        right: Arc<Expr>,
    },
    /// Boolean OR
    Or {
        /// Left operand, which will be eagerly evaluated
        left: Arc<Expr>,
        /// Right operand, which may not be evaluated due to short-circuiting
        right: Arc<Expr>,
    },
    /// Application of a built-in unary operator (single parameter)
    UnaryApp {
        /// Unary operator to apply
        op: UnaryOp,
        /// Argument to apply operator to
        arg: Arc<Expr>,
    },
    /// Application of a built-in binary operator (two parameters)
    BinaryApp {
        /// Binary operator to apply
        op: BinaryOp,
        /// First arg
        arg1: Arc<Expr>,
        /// Second arg
        arg2: Arc<Expr>,
    },
    /// Application of an extension function to n arguments
    ExtensionFunctionApp {
        /// Extension function to apply
        fn_name: SmolStr,
        /// Args to apply the function to
        args: Arc<Vec<Expr>>,
    },
    /// Get an attribute of an entity, or a field of a record
    GetAttr {
        /// Expression to get an attribute/field of. Must evaluate to either
        /// Entity or Record type
        expr: Arc<Expr>,
        /// Attribute or field to get
        attr: SmolStr,
    },
    /// Does the given `expr` have the given `attr`?
    HasAttr {
        /// Expression to test. Must evaluate to either Entity or Record type
        expr: Arc<Expr>,
        /// Attribute or field to check for
        attr: SmolStr,
    },
    /// Regex-like string matching similar to IAM's `StringLike` operator.
    Like {
        /// Expression to test. Must evaluate to String type
        expr: Arc<Expr>,
        /// Pattern to match on; can include the wildcard *, which matches any string.
        pattern: Pattern,
    },
    /// Entity type test. Does the first argument have the entity type
    /// specified by the second argument.
    Is {
        /// Expression to test. Must evaluate to an Entity.
        expr: Arc<Expr>,
        /// The entity type used for the type membership test.
        entity_type: EntityType,
    },
    /// Combined entity type and hierarchy test: `expr is entity_type in in_expr`.
    IsIn {
        /// Expression to test. Must evaluate to an Entity.
        expr: Arc<Expr>,
        /// The entity type used for the type membership test.
        entity_type: EntityType,
        /// The hierarchy to test membership of. Must evaluate to an Entity or
        /// a Set of Entities.
        in_expr: Arc<Expr>,
    },
    /// Set (whose elements may be arbitrary expressions)
    //
    // Backed by `Vec` (and not e.g. `HashSet`), because two `Expr`s that are
    // syntactically unequal may be semantically equal, so dedup has to wait
    // until the elements are evaluated into `Value`s.
    Set(Arc<Vec<Expr>>),
    /// Anonymous record (whose elements may be arbitrary expressions)
    Record(Arc<BTreeMap<SmolStr, Expr>>),
}

impl Expr {
    fn new(expr_kind: ExprKind) -> Self {
        Self { expr_kind }
    }

    /// Access the inner `ExprKind` for this `Expr`. The `ExprKind` is the
    /// `enum` which specifies the expression variant, so it must be accessed
    /// by any code matching and recursing on an expression.
    pub fn expr_kind(&self) -> &ExprKind {
        &self.expr_kind
    }

    /// Access the inner `ExprKind`, taking ownership and consuming the `Expr`.
    pub fn into_expr_kind(self) -> ExprKind {
        self.expr_kind
    }

    /// Create an `Expr` that's a single value.
    ///
    /// Note that you can pass this a `Value`, a `Literal`, an integer, a
    /// string, an `EntityUID`, etc.
    pub fn val(v: impl Into<Value>) -> Self {
        Self::new(ExprKind::Val(v.into()))
    }

    /// Create an `Expr` that's just this `Var`
    pub fn var(v: Var) -> Self {
        Self::new(ExprKind::Var(v))
    }

    /// Create a ternary (if-then-else) `Expr`.
    ///
    /// `test_expr` must evaluate to a Bool type
    pub fn ite(test_expr: Expr, then_expr: Expr, else_expr: Expr) -> Self {
        Self::new(ExprKind::If {
            test_expr: Arc::new(test_expr),
            then_expr: Arc::new(then_expr),
            else_expr: Arc::new(else_expr),
        })
    }

    /// Create an `and` expression. Arguments must evaluate to Bool type
    pub fn and(left: Expr, right: Expr) -> Self {
        Self::new(ExprKind::And {
            left: Arc::new(left),
            right: Arc::new(right),
        })
    }

    /// Create an `or` expression. Arguments must evaluate to Bool type
    pub fn or(left: Expr, right: Expr) -> Self {
        Self::new(ExprKind::Or {
            left: Arc::new(left),
            right: Arc::new(right),
        })
    }

    /// Create an `Expr` which evaluates to Bool, then applies logical negation
    pub fn not(e: Expr) -> Self {
        Self::unary_app(UnaryOp::Not, e)
    }

    /// Create an `Expr` which evaluates to Long, then applies integer negation
    pub fn neg(e: Expr) -> Self {
        Self::unary_app(UnaryOp::Neg, e)
    }

    /// Create an `Expr` which evaluates to Set, then tests it for emptiness
    pub fn is_empty(e: Expr) -> Self {
        Self::unary_app(UnaryOp::IsEmpty, e)
    }

    /// Create an `Expr` which applies the given unary operator
    pub fn unary_app(op: UnaryOp, arg: Expr) -> Self {
        Self::new(ExprKind::UnaryApp {
            op,
            arg: Arc::new(arg),
        })
    }

    /// Create an `Expr` which applies the given binary operator
    pub fn binary_app(op: BinaryOp, arg1: Expr, arg2: Expr) -> Self {
        Self::new(ExprKind::BinaryApp {
            op,
            arg1: Arc::new(arg1),
            arg2: Arc::new(arg2),
        })
    }

    /// Create an `==` expression
    pub fn is_eq(arg1: Expr, arg2: Expr) -> Self {
        Self::binary_app(BinaryOp::Eq, arg1, arg2)
    }

    /// Create a `!=` expression
    pub fn noteq(arg1: Expr, arg2: Expr) -> Self {
        Self::binary_app(BinaryOp::NotEq, arg1, arg2)
    }

    /// Create a `<` expression
    pub fn less(arg1: Expr, arg2: Expr) -> Self {
        Self::binary_app(BinaryOp::Less, arg1, arg2)
    }

    /// Create a `<=` expression
    pub fn lesseq(arg1: Expr, arg2: Expr) -> Self {
        Self::binary_app(BinaryOp::LessEq, arg1, arg2)
    }

    /// Create a `>` expression
    pub fn greater(arg1: Expr, arg2: Expr) -> Self {
        Self::binary_app(BinaryOp::Greater, arg1, arg2)
    }

    /// Create a `>=` expression
    pub fn greatereq(arg1: Expr, arg2: Expr) -> Self {
        Self::binary_app(BinaryOp::GreaterEq, arg1, arg2)
    }

    /// Create an `add` expression. Arguments must evaluate to Long type
    pub fn add(arg1: Expr, arg2: Expr) -> Self {
        Self::binary_app(BinaryOp::Add, arg1, arg2)
    }

    /// Create a `subtract` expression. Arguments must evaluate to Long type
    pub fn sub(arg1: Expr, arg2: Expr) -> Self {
        Self::binary_app(BinaryOp::Sub, arg1, arg2)
    }

    /// Create a `multiply` expression. Arguments must evaluate to Long type
    pub fn mul(arg1: Expr, arg2: Expr) -> Self {
        Self::binary_app(BinaryOp::Mul, arg1, arg2)
    }

    /// Create an `in` (hierarchy membership) expression. First argument must
    /// evaluate to Entity type
    pub fn is_in(arg1: Expr, arg2: Expr) -> Self {
        Self::binary_app(BinaryOp::In, arg1, arg2)
    }

    /// Create a `contains` expression. First argument must evaluate to Set type
    pub fn contains(arg1: Expr, arg2: Expr) -> Self {
        Self::binary_app(BinaryOp::Contains, arg1, arg2)
    }

    /// Create a `containsAll` expression. Arguments must evaluate to Set type
    pub fn contains_all(arg1: Expr, arg2: Expr) -> Self {
        Self::binary_app(BinaryOp::ContainsAll, arg1, arg2)
    }

    /// Create a `containsAny` expression. Arguments must evaluate to Set type
    pub fn contains_any(arg1: Expr, arg2: Expr) -> Self {
        Self::binary_app(BinaryOp::ContainsAny, arg1, arg2)
    }

    /// Create a `getTag` expression. First argument must evaluate to Entity
    /// type, second to String type
    pub fn get_tag(arg1: Expr, arg2: Expr) -> Self {
        Self::binary_app(BinaryOp::GetTag, arg1, arg2)
    }

    /// Create an `Expr` which calls the extension function with the given
    /// name on the given arguments
    pub fn call_extension_fn(fn_name: impl Into<SmolStr>, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::ExtensionFunctionApp {
            fn_name: fn_name.into(),
            args: Arc::new(args),
        })
    }

    /// Create an `Expr` which gets a given attribute of a given `Entity` or
    /// record
    pub fn get_attr(expr: Expr, attr: impl Into<SmolStr>) -> Self {
        Self::new(ExprKind::GetAttr {
            expr: Arc::new(expr),
            attr: attr.into(),
        })
    }

    /// Create an `Expr` which tests for the existence of a given attribute
    /// on a given `Entity` or record
    pub fn has_attr(expr: Expr, attr: impl Into<SmolStr>) -> Self {
        Self::new(ExprKind::HasAttr {
            expr: Arc::new(expr),
            attr: attr.into(),
        })
    }

    /// Create a `like` expression
    pub fn like(expr: Expr, pattern: Pattern) -> Self {
        Self::new(ExprKind::Like {
            expr: Arc::new(expr),
            pattern,
        })
    }

    /// Create an `is` expression
    pub fn is_entity_type(expr: Expr, entity_type: impl Into<EntityType>) -> Self {
        Self::new(ExprKind::Is {
            expr: Arc::new(expr),
            entity_type: entity_type.into(),
        })
    }

    /// Create an `is ... in ...` expression
    pub fn is_entity_type_in(
        expr: Expr,
        entity_type: impl Into<EntityType>,
        in_expr: Expr,
    ) -> Self {
        Self::new(ExprKind::IsIn {
            expr: Arc::new(expr),
            entity_type: entity_type.into(),
            in_expr: Arc::new(in_expr),
        })
    }

    /// Create an `Expr` which evaluates to a Set of the given elements
    pub fn set(elements: impl IntoIterator<Item = Expr>) -> Self {
        Self::new(ExprKind::Set(Arc::new(elements.into_iter().collect())))
    }

    /// Create an `Expr` which evaluates to a Record with the given attributes.
    /// Later entries win on duplicate keys.
    pub fn record(attrs: impl IntoIterator<Item = (SmolStr, Expr)>) -> Self {
        Self::new(ExprKind::Record(Arc::new(attrs.into_iter().collect())))
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::val(v)
    }
}

impl From<Literal> for Expr {
    fn from(lit: Literal) -> Self {
        Expr::val(lit)
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.expr_kind() {
            ExprKind::Val(v) => write!(f, "{v}"),
            ExprKind::Var(v) => write!(f, "{v}"),
            ExprKind::If {
                test_expr,
                then_expr,
                else_expr,
            } => write!(f, "if {test_expr} then {then_expr} else {else_expr}"),
            ExprKind::And { left, right } => write!(f, "({left} && {right})"),
            ExprKind::Or { left, right } => write!(f, "({left} || {right})"),
            ExprKind::UnaryApp { op, arg } => match op {
                UnaryOp::Not => write!(f, "!{arg}"),
                UnaryOp::Neg => write!(f, "-{arg}"),
                UnaryOp::IsEmpty => write!(f, "{arg}.isEmpty()"),
            },
            ExprKind::BinaryApp { op, arg1, arg2 } => match op {
                BinaryOp::Eq => write!(f, "({arg1} == {arg2})"),
                BinaryOp::NotEq => write!(f, "({arg1} != {arg2})"),
                BinaryOp::Less => write!(f, "({arg1} < {arg2})"),
                BinaryOp::LessEq => write!(f, "({arg1} <= {arg2})"),
                BinaryOp::Greater => write!(f, "({arg1} > {arg2})"),
                BinaryOp::GreaterEq => write!(f, "({arg1} >= {arg2})"),
                BinaryOp::Add => write!(f, "({arg1} + {arg2})"),
                BinaryOp::Sub => write!(f, "({arg1} - {arg2})"),
                BinaryOp::Mul => write!(f, "({arg1} * {arg2})"),
                BinaryOp::In => write!(f, "({arg1} in {arg2})"),
                BinaryOp::Contains => write!(f, "{arg1}.contains({arg2})"),
                BinaryOp::ContainsAll => write!(f, "{arg1}.containsAll({arg2})"),
                BinaryOp::ContainsAny => write!(f, "{arg1}.containsAny({arg2})"),
                BinaryOp::GetTag => write!(f, "{arg1}.getTag({arg2})"),
            },
            ExprKind::ExtensionFunctionApp { fn_name, args } => {
                write!(f, "{fn_name}({})", args.iter().join(", "))
            }
            ExprKind::GetAttr { expr, attr } => write!(f, "{expr}[\"{}\"]", attr.escape_debug()),
            ExprKind::HasAttr { expr, attr } => {
                write!(f, "{expr} has \"{}\"", attr.escape_debug())
            }
            ExprKind::Like { expr, pattern } => write!(f, "{expr} like \"{pattern}\""),
            ExprKind::Is { expr, entity_type } => write!(f, "{expr} is {entity_type}"),
            ExprKind::IsIn {
                expr,
                entity_type,
                in_expr,
            } => write!(f, "{expr} is {entity_type} in {in_expr}"),
            ExprKind::Set(elements) => write!(f, "[{}]", elements.iter().join(", ")),
            ExprKind::Record(attrs) => write!(
                f,
                "{{{}}}",
                attrs
                    .iter()
                    .map(|(k, v)| format!("\"{}\": {}", k.escape_debug(), v))
                    .join(", ")
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        let e = Expr::and(
            Expr::get_attr(Expr::var(Var::Context), "is_authenticated"),
            Expr::is_eq(
                Expr::get_attr(Expr::var(Var::Resource), "owner"),
                Expr::var(Var::Principal),
            ),
        );
        assert_eq!(
            e.to_string(),
            r#"(context["is_authenticated"] && (resource["owner"] == principal))"#
        );
    }
}
