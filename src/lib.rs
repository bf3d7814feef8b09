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

//! Translation of partially evaluated authorization policy residuals into
//! parametric SQL `WHERE` fragments.
//!
//! Given a policy set and a request whose *resource* is unknown,
//! [`authorize_sql`] emits a SQL fragment with bind arguments that selects
//! exactly those rows the request would be authorized on; callers embed it
//! in any `SELECT ... WHERE {fragment}`. [`to_sql`] exposes the underlying
//! reducer for callers who already hold a residual expression.
//!
//! The translator is purely functional: no shared mutable state, no I/O,
//! and any error aborts the whole translation with no partial SQL.

#![forbid(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

extern crate alloc;

pub mod ast;
pub mod authorize;
pub mod entities;
pub mod err;
pub mod evaluator;
pub mod extensions;
pub mod mapper;
pub mod reducer;
pub mod sqlizer;

pub use authorize::{authorize_sql, AuthorizeSqlRequest};
pub use err::TranslateError;
pub use mapper::{DefaultFieldMapper, FieldMapper, InvalidFieldNameError, PrefixFieldMapper};
pub use reducer::{to_sql, to_sql_with_dialect, Reduction};
pub use sqlizer::{Dialect, SqlValue, Sqlizer};
