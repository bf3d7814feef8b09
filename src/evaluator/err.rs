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

use crate::ast::{BinaryOp, EntityUID, Type, UnaryOp, Value};
use itertools::Itertools;
use nonempty::NonEmpty;
use smol_str::SmolStr;
use std::sync::Arc;
use thiserror::Error;

/// An error generated while evaluating an expression
#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum EvaluationError {
    /// Tried to lookup this entity UID, but it didn't exist in the provided
    /// entities
    #[error("entity does not exist: {0}")]
    EntityDoesNotExist(Arc<EntityUID>),

    /// Tried to get this attribute, but the specified entity didn't have that
    /// attribute
    #[error("`{entity}` does not have the attribute: {attr}")]
    EntityAttrDoesNotExist {
        /// Entity that didn't have the attribute
        entity: Arc<EntityUID>,
        /// Name of the attribute it didn't have
        attr: SmolStr,
    },

    /// Tried to get this tag, but the specified entity didn't have that tag
    #[error("`{entity}` does not have the tag: {tag}")]
    EntityTagDoesNotExist {
        /// Entity that didn't have the tag
        entity: Arc<EntityUID>,
        /// Name of the tag it didn't have
        tag: SmolStr,
    },

    /// Tried to get an attribute of a (non-entity) record, but that record
    /// didn't have that attribute
    #[error("record does not have the attribute: {0}")]
    RecordAttrDoesNotExist(SmolStr),

    /// Tried to evaluate an operation on values with incorrect types for that
    /// operation
    #[error("{}", pretty_type_error(expected, actual, advice.as_deref()))]
    TypeError {
        /// Expected (one of) these types
        expected: NonEmpty<Type>,
        /// Encountered this type instead
        actual: Type,
        /// Optional advice on how to fix the error
        advice: Option<String>,
    },

    /// Overflow during an integer operation
    #[error(transparent)]
    IntegerOverflow(#[from] IntegerOverflowError),

    /// Raised if a value containing unknown(s) reaches an operation that can
    /// only be applied to fully known values
    #[error("value contains unknown(s): {0}")]
    NonValue(String),

    /// Wrong number of arguments provided to an extension function
    #[error("wrong number of arguments provided to extension function {name}: expected {expected}, got {actual}")]
    WrongNumArguments {
        /// the function with the wrong number of arguments
        name: SmolStr,
        /// expected number of arguments
        expected: usize,
        /// actual number of arguments
        actual: usize,
    },

    /// Tried to call an extension function that does not exist
    #[error("extension function does not exist: {0}")]
    UnknownExtensionFunction(SmolStr),

    /// Evaluation error thrown by an extension function
    #[error("error while evaluating {name} extension function: {msg}")]
    FailedExtensionFunctionApplication {
        /// Name of the extension function throwing the error
        name: SmolStr,
        /// Error message from the extension function
        msg: String,
    },

    /// An extension function whose arguments still contain unknowns cannot be
    /// evaluated, and unlike other residuals it cannot be turned into SQL
    /// either
    #[error("extension function `{0}` cannot be evaluated with unknown arguments")]
    PartialExtension(SmolStr),
}

impl EvaluationError {
    /// Construct a [`EvaluationError::TypeError`]
    pub(crate) fn type_error(expected: NonEmpty<Type>, actual: &Value) -> Self {
        Self::TypeError {
            expected,
            actual: actual.type_of(),
            advice: None,
        }
    }

    /// Construct a [`EvaluationError::TypeError`] with the advice field set
    pub(crate) fn type_error_with_advice(
        expected: NonEmpty<Type>,
        actual: &Value,
        advice: String,
    ) -> Self {
        Self::TypeError {
            expected,
            actual: actual.type_of(),
            advice: Some(advice),
        }
    }

    /// Construct a [`EvaluationError::NonValue`] carrying the rendition of the
    /// offending value or expression
    pub(crate) fn non_value(e: impl std::fmt::Display) -> Self {
        Self::NonValue(e.to_string())
    }

    /// Construct a [`EvaluationError::EntityDoesNotExist`]
    pub(crate) fn entity_does_not_exist(uid: Arc<EntityUID>) -> Self {
        Self::EntityDoesNotExist(uid)
    }

    /// Construct a [`EvaluationError::EntityAttrDoesNotExist`]
    pub(crate) fn entity_attr_does_not_exist(entity: Arc<EntityUID>, attr: SmolStr) -> Self {
        Self::EntityAttrDoesNotExist { entity, attr }
    }

    /// Construct a [`EvaluationError::EntityTagDoesNotExist`]
    pub(crate) fn entity_tag_does_not_exist(entity: Arc<EntityUID>, tag: SmolStr) -> Self {
        Self::EntityTagDoesNotExist { entity, tag }
    }

    /// Construct a [`EvaluationError::WrongNumArguments`]
    pub(crate) fn wrong_num_arguments(name: SmolStr, expected: usize, actual: usize) -> Self {
        Self::WrongNumArguments {
            name,
            expected,
            actual,
        }
    }

    /// Construct a [`EvaluationError::FailedExtensionFunctionApplication`]
    pub(crate) fn failed_extension_function_application(name: SmolStr, msg: String) -> Self {
        Self::FailedExtensionFunctionApplication { name, msg }
    }

    /// Construct a [`EvaluationError::UnknownExtensionFunction`]
    pub(crate) fn unknown_extension_function(name: SmolStr) -> Self {
        Self::UnknownExtensionFunction(name)
    }

    /// Construct a [`EvaluationError::PartialExtension`]
    pub(crate) fn partial_extension(name: SmolStr) -> Self {
        Self::PartialExtension(name)
    }
}

/// helper function for pretty-printing type errors
fn pretty_type_error(expected: &NonEmpty<Type>, actual: &Type, advice: Option<&str>) -> String {
    let mut msg = if expected.len() == 1 {
        format!("type error: expected {}, got {}", expected.first(), actual)
    } else {
        format!(
            "type error: expected one of [{}], got {actual}",
            expected.iter().join(", ")
        )
    };
    if let Some(advice) = advice {
        msg.push_str(". ");
        msg.push_str(advice);
    }
    msg
}

/// Overflow during an integer operation
#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum IntegerOverflowError {
    /// Overflow during a binary operation
    #[error("integer overflow while attempting to {} the values `{arg1}` and `{arg2}`", match .op { BinaryOp::Add => "add", BinaryOp::Sub => "subtract", BinaryOp::Mul => "multiply", _ => "perform an operation on" })]
    BinaryOp {
        /// overflow while evaluating this operator
        op: BinaryOp,
        /// first argument to that operator
        arg1: Value,
        /// second argument to that operator
        arg2: Value,
    },

    /// Overflow during a unary operation
    #[error("integer overflow while attempting to {} the value `{arg}`", match .op { UnaryOp::Neg => "negate", _ => "perform an operation on" })]
    UnaryOp {
        /// overflow while evaluating this operator
        op: UnaryOp,
        /// argument to that operator
        arg: Value,
    },
}

/// Type alias for convenience
pub type Result<T> = std::result::Result<T, EvaluationError>;
