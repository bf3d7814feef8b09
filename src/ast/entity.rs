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

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// The type of an entity, e.g. `User` in `User::"alice"`.
///
/// Cloning is O(1).
#[derive(Serialize, Deserialize, Hash, Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntityType(SmolStr);

impl EntityType {
    /// Get the type name as a string slice
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for EntityType {
    fn from(s: &str) -> Self {
        Self(SmolStr::new(s))
    }
}

impl From<String> for EntityType {
    fn from(s: String) -> Self {
        Self(SmolStr::new(s))
    }
}

impl From<SmolStr> for EntityType {
    fn from(s: SmolStr) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique ID for an entity. These represent entities in the AST.
#[derive(Serialize, Deserialize, Hash, Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntityUID {
    /// Typename of the entity
    ty: EntityType,
    /// EID of the entity
    eid: SmolStr,
}

impl EntityUID {
    /// Create an `EntityUID` with the given type and id
    pub fn new(ty: impl Into<EntityType>, eid: impl Into<SmolStr>) -> Self {
        Self {
            ty: ty.into(),
            eid: eid.into(),
        }
    }

    /// Get the type component.
    pub fn entity_type(&self) -> &EntityType {
        &self.ty
    }

    /// Get the id component.
    pub fn eid(&self) -> &SmolStr {
        &self.eid
    }
}

impl std::fmt::Display for EntityUID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::\"{}\"", self.ty, self.eid.escape_debug())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        let uid = EntityUID::new("User", "alice");
        assert_eq!(format!("{uid}"), r#"User::"alice""#);
    }

    #[test]
    fn display_escapes_quotes() {
        let uid = EntityUID::new("User", r#"a"b"#);
        assert_eq!(format!("{uid}"), r#"User::"a\"b""#);
    }
}
