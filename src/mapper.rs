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

//! This module contains the caller-supplied rewrite from logical attribute
//! paths (`resource.owner`) to physical column references (`document.owner`).

use smol_str::SmolStr;
use thiserror::Error;

/// Error returned by a mapper that rejects a dotted attribute path
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("invalid field name: {name}")]
pub struct InvalidFieldNameError {
    /// The rejected path
    name: SmolStr,
}

impl InvalidFieldNameError {
    /// Reject the given path.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self { name: name.into() }
    }
}

/// Rewrites a fully dotted attribute path to the column reference to emit.
///
/// Invoked exactly once per leaf attribute access, on the path as assembled
/// by the reducer (`"resource.owner"`, `"context.is_authenticated"`, ...).
/// A mapper may rewrite the path, accept it unchanged, or reject it, which
/// aborts the translation.
///
/// Mappers are shared across concurrent translations, so implementations
/// must be pure with respect to `&self`.
pub trait FieldMapper: Send + Sync {
    /// Map a dotted path to a column reference, or reject it.
    fn map(&self, name: &str) -> Result<SmolStr, InvalidFieldNameError>;
}

/// The identity mapper: every path is its own column reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFieldMapper;

impl FieldMapper for DefaultFieldMapper {
    fn map(&self, name: &str) -> Result<SmolStr, InvalidFieldNameError> {
        Ok(SmolStr::new(name))
    }
}

/// Maps paths under one request variable onto one table: `resource.owner`
/// becomes `document.owner` for a mapper from `resource` to `document`.
/// Paths under other variables pass through unchanged.
#[derive(Debug, Clone)]
pub struct PrefixFieldMapper {
    from: SmolStr,
    to: SmolStr,
}

impl PrefixFieldMapper {
    /// Create a mapper rewriting `{from}.x` to `{to}.x`.
    pub fn new(from: impl Into<SmolStr>, to: impl Into<SmolStr>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl FieldMapper for PrefixFieldMapper {
    fn map(&self, name: &str) -> Result<SmolStr, InvalidFieldNameError> {
        match name.strip_prefix(self.from.as_str()) {
            Some(rest) if rest.starts_with('.') => Ok(SmolStr::new(format!("{}{rest}", self.to))),
            _ => Ok(SmolStr::new(name)),
        }
    }
}
