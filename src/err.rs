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

//! This module contains the errors a translation can fail with. Any error
//! aborts the whole translation; no partial SQL is ever returned.

use crate::ast::BinaryOp;
use crate::evaluator::EvaluationError;
use crate::mapper::InvalidFieldNameError;
use crate::sqlizer::UnsupportedSqlValueError;
use thiserror::Error;

/// An error translating a residual to SQL
#[derive(Debug, Error)]
pub enum TranslateError {
    /// A subtree that must fold to a value failed to evaluate: type
    /// mismatches, missing entities or attributes, overflow, or an extension
    /// call that cannot be evaluated with unknown arguments
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// The field mapper rejected a dotted attribute path
    #[error(transparent)]
    InvalidFieldName(#[from] InvalidFieldNameError),

    /// A value with no SQL bind representation reached a bind position
    #[error(transparent)]
    UnsupportedSqlValue(#[from] UnsupportedSqlValueError),

    /// The right side of `in` reduced to a concrete value instead of a
    /// column reference
    #[error("right side of `in` must map to a SQL column: {0}")]
    InRightSideNotColumn(String),

    /// The left side of a set operator reduced to a concrete value instead
    /// of a column reference
    #[error("left side of `{op}` must map to a SQL column: {node}")]
    SetOperandNotColumn {
        /// The set operator
        op: BinaryOp,
        /// Rendition of the offending node
        node: String,
    },
}

/// Type alias for convenience
pub type Result<T> = std::result::Result<T, TranslateError>;
