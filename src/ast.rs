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

//! This module contains the residual AST and the domain values it carries.

mod entity;
pub use entity::*;
mod expr;
pub use expr::*;
mod literal;
pub use literal::*;
mod ops;
pub use ops::*;
mod partial_value;
pub use partial_value::*;
mod pattern;
pub use pattern::*;
mod policy;
pub use policy::*;
mod types;
pub use types::*;
mod value;
pub use value::*;
