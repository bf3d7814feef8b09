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

use crate::ast::{EntityUID, Literal, Type};
use crate::evaluator::{EvaluationError, Result};
use crate::extensions::{Datetime, Decimal, ExtValue};
use itertools::Itertools;
use nonempty::nonempty;
use smol_str::SmolStr;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Reserved entity type marking a value as an unknown variable rather than a
/// real entity reference. Values of this type must only be built through
/// [`Value::variable`] and detected through [`Value::as_variable`].
pub(crate) const VARIABLE_ENTITY_TYPE: &str = "__variable__";

/// This describes all the values which could be the dynamic result of
/// evaluating a residual expression. Cloning is O(1) for sets and records.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Value {
    /// Anything that is a `Literal` can also be the dynamic result of
    /// evaluating an expression
    Lit(Literal),
    /// First-class set
    Set(Set),
    /// First-class anonymous record, keyed on string
    Record(Arc<BTreeMap<SmolStr, Value>>),
    /// Extension value (decimal, datetime, ipaddr)
    Ext(ExtValue),
}

/// A `Value`'s internal representation of a set.
///
/// Backed by a `BTreeSet` so that semantically equal sets compare equal
/// regardless of construction order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Set {
    elements: Arc<BTreeSet<Value>>,
}

impl Set {
    /// Get the number of items in the set
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Convenience method to check if a set is empty
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Borrowed iterator
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.elements.iter()
    }

    /// Whether the set contains the given value
    pub fn contains(&self, value: &Value) -> bool {
        self.elements.contains(value)
    }

    /// Whether every element of `other` is also an element of `self`
    pub fn is_superset(&self, other: &Set) -> bool {
        other.elements.is_subset(&self.elements)
    }

    /// Whether `self` and `other` share at least one element
    pub fn intersects(&self, other: &Set) -> bool {
        !self.elements.is_disjoint(&other.elements)
    }
}

impl FromIterator<Value> for Set {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        Self {
            elements: Arc::new(iter.into_iter().collect()),
        }
    }
}

impl Value {
    /// Create a set value from the given elements.
    pub fn set(elements: impl IntoIterator<Item = Value>) -> Self {
        Self::Set(elements.into_iter().collect())
    }

    /// Create a record value from the given attribute pairs.
    pub fn record(attrs: impl IntoIterator<Item = (SmolStr, Value)>) -> Self {
        Self::Record(Arc::new(attrs.into_iter().collect()))
    }

    /// Create the sentinel value standing for the unknown variable `name`.
    pub fn variable(name: impl Into<SmolStr>) -> Self {
        Self::Lit(Literal::EntityUID(Arc::new(EntityUID::new(
            VARIABLE_ENTITY_TYPE,
            name,
        ))))
    }

    /// If this value is an unknown-variable sentinel, the variable's name.
    pub fn as_variable(&self) -> Option<&SmolStr> {
        match self {
            Self::Lit(Literal::EntityUID(uid))
                if uid.entity_type().as_str() == VARIABLE_ENTITY_TYPE =>
            {
                Some(uid.eid())
            }
            _ => None,
        }
    }

    /// Whether this value is, or contains anywhere inside it, an
    /// unknown-variable sentinel. Such values must never be folded through
    /// concrete operations.
    pub fn contains_unknown(&self) -> bool {
        match self {
            Self::Lit(_) => self.as_variable().is_some(),
            Self::Set(set) => set.iter().any(Value::contains_unknown),
            Self::Record(attrs) => attrs.values().any(Value::contains_unknown),
            Self::Ext(_) => false,
        }
    }

    /// The runtime type of this value, for diagnostics.
    pub fn type_of(&self) -> Type {
        match self {
            Self::Lit(lit) => lit.type_of(),
            Self::Set(_) => Type::Set,
            Self::Record(_) => Type::Record,
            Self::Ext(ev) => ev.type_of(),
        }
    }

    /// Get the underlying boolean, or a type error.
    pub fn get_as_bool(&self) -> Result<bool> {
        match self {
            Self::Lit(Literal::Bool(b)) => Ok(*b),
            _ => Err(EvaluationError::type_error(nonempty![Type::Bool], self)),
        }
    }

    /// Get the underlying long, or a type error.
    pub fn get_as_long(&self) -> Result<i64> {
        match self {
            Self::Lit(Literal::Long(i)) => Ok(*i),
            _ => Err(EvaluationError::type_error(nonempty![Type::Long], self)),
        }
    }

    /// Get the underlying string, or a type error.
    pub fn get_as_string(&self) -> Result<&SmolStr> {
        match self {
            Self::Lit(Literal::String(s)) => Ok(s),
            _ => Err(EvaluationError::type_error(nonempty![Type::String], self)),
        }
    }

    /// Get the underlying set, or a type error.
    pub fn get_as_set(&self) -> Result<&Set> {
        match self {
            Self::Set(set) => Ok(set),
            _ => Err(EvaluationError::type_error(nonempty![Type::Set], self)),
        }
    }

    /// Get the underlying entity reference, or a type error.
    ///
    /// An unknown-variable sentinel is *not* an entity reference: letting one
    /// through here would let an unknown fold silently.
    pub fn get_as_entity(&self) -> Result<&Arc<EntityUID>> {
        if self.as_variable().is_some() {
            return Err(EvaluationError::non_value(self));
        }
        match self {
            Self::Lit(Literal::EntityUID(uid)) => Ok(uid),
            _ => Err(EvaluationError::type_error(
                nonempty![Type::Entity("any".into())],
                self,
            )),
        }
    }

    /// Get the underlying decimal, or a type error.
    pub fn get_as_decimal(&self) -> Result<&Decimal> {
        match self {
            Self::Ext(ExtValue::Decimal(d)) => Ok(d),
            _ => Err(EvaluationError::type_error(
                nonempty![Type::Extension(SmolStr::new_static("decimal"))],
                self,
            )),
        }
    }

    /// Get the underlying datetime, or a type error.
    pub fn get_as_datetime(&self) -> Result<&Datetime> {
        match self {
            Self::Ext(ExtValue::Datetime(d)) => Ok(d),
            _ => Err(EvaluationError::type_error(
                nonempty![Type::Extension(SmolStr::new_static("datetime"))],
                self,
            )),
        }
    }
}

impl From<Literal> for Value {
    fn from(lit: Literal) -> Self {
        Self::Lit(lit)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Lit(b.into())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Lit(i.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Lit(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Lit(s.into())
    }
}

impl From<SmolStr> for Value {
    fn from(s: SmolStr) -> Self {
        Self::Lit(s.into())
    }
}

impl From<EntityUID> for Value {
    fn from(uid: EntityUID) -> Self {
        Self::Lit(uid.into())
    }
}

impl From<ExtValue> for Value {
    fn from(ev: ExtValue) -> Self {
        Self::Ext(ev)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lit(lit) => write!(f, "{lit}"),
            Self::Set(set) => write!(f, "[{}]", set.iter().join(", ")),
            Self::Record(attrs) => write!(
                f,
                "{{{}}}",
                attrs
                    .iter()
                    .map(|(k, v)| format!("\"{}\": {}", k.escape_debug(), v))
                    .join(", ")
            ),
            Self::Ext(ev) => write!(f, "{ev}"),
        }
    }
}
