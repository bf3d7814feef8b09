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

//! This module contains the read-only entity store consulted during
//! evaluation for attribute access and hierarchy membership.

use crate::ast::{EntityUID, Value};
use crate::extensions;
use serde::Deserialize;
use smol_str::SmolStr;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use thiserror::Error;

/// An entity: a UID, attributes, tags, and its ancestors in the hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    uid: EntityUID,
    attrs: BTreeMap<SmolStr, Value>,
    /// Direct parents as given at construction; widened to the full ancestor
    /// set when the entity joins an [`Entities`] store.
    ancestors: HashSet<EntityUID>,
    tags: BTreeMap<SmolStr, Value>,
}

impl Entity {
    /// Create an entity with the given uid, attributes, and direct parents.
    pub fn new(
        uid: EntityUID,
        attrs: impl IntoIterator<Item = (SmolStr, Value)>,
        parents: impl IntoIterator<Item = EntityUID>,
    ) -> Self {
        Self {
            uid,
            attrs: attrs.into_iter().collect(),
            ancestors: parents.into_iter().collect(),
            tags: BTreeMap::new(),
        }
    }

    /// Create an entity with tags as well.
    pub fn new_with_tags(
        uid: EntityUID,
        attrs: impl IntoIterator<Item = (SmolStr, Value)>,
        parents: impl IntoIterator<Item = EntityUID>,
        tags: impl IntoIterator<Item = (SmolStr, Value)>,
    ) -> Self {
        Self {
            tags: tags.into_iter().collect(),
            ..Self::new(uid, attrs, parents)
        }
    }

    /// Get the UID of this entity
    pub fn uid(&self) -> &EntityUID {
        &self.uid
    }

    /// Get the value for the given attribute, if it exists
    pub fn attr(&self, attr: &str) -> Option<&Value> {
        self.attrs.get(attr)
    }

    /// Whether the given attribute exists on this entity
    pub fn has_attr(&self, attr: &str) -> bool {
        self.attrs.contains_key(attr)
    }

    /// Get the value for the given tag, if it exists
    pub fn tag(&self, tag: &str) -> Option<&Value> {
        self.tags.get(tag)
    }

    /// Whether `ancestor` is an ancestor of this entity in the hierarchy
    pub fn is_descendant_of(&self, ancestor: &EntityUID) -> bool {
        self.ancestors.contains(ancestor)
    }

    /// Iterate over this entity's ancestors
    pub fn ancestors(&self) -> impl Iterator<Item = &EntityUID> {
        self.ancestors.iter()
    }
}

/// A read-only collection of entities, with the transitive closure of the
/// `parents` hierarchy precomputed at construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entities {
    entities: HashMap<EntityUID, Entity>,
}

impl Entities {
    /// Create an empty entity store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from entities whose ancestor sets hold *direct* parents;
    /// the transitive closure is computed here.
    pub fn from_entities(
        entities: impl IntoIterator<Item = Entity>,
    ) -> std::result::Result<Self, EntitiesError> {
        let mut map: HashMap<EntityUID, Entity> = HashMap::new();
        for entity in entities {
            if map.contains_key(entity.uid()) {
                return Err(EntitiesError::Duplicate(entity.uid().clone()));
            }
            map.insert(entity.uid().clone(), entity);
        }
        compute_transitive_closure(&mut map);
        Ok(Self { entities: map })
    }

    /// Look up an entity by UID.
    pub fn entity(&self, uid: &EntityUID) -> Option<&Entity> {
        self.entities.get(uid)
    }

    /// Iterate over all entities in the store.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Parse a store from the JSON entity-list format:
    ///
    /// ```json
    /// [{"uid": {"type": "User", "id": "alice"},
    ///   "attrs": {"role": "member"},
    ///   "parents": [{"type": "Group", "id": "admin"}],
    ///   "tags": {}}]
    /// ```
    ///
    /// Attribute values: JSON primitives map to the corresponding domain
    /// values, arrays to sets, objects of the exact shape `{"type", "id"}` to
    /// entity references, `{"__extn": {"fn", "arg"}}` to extension values,
    /// and any other object to a record.
    pub fn from_json_str(json: &str) -> std::result::Result<Self, EntitiesError> {
        let parsed: Vec<EntityJson> = serde_json::from_str(json)?;
        Self::from_entities(
            parsed
                .into_iter()
                .map(Entity::try_from)
                .collect::<std::result::Result<Vec<_>, _>>()?,
        )
    }
}

/// Replace each entity's direct-parent set with its full ancestor set.
///
/// Walks the parent graph breadth-first from each entity; a cycle in the
/// input simply makes its members ancestors of each other.
fn compute_transitive_closure(entities: &mut HashMap<EntityUID, Entity>) {
    let parents: HashMap<EntityUID, Vec<EntityUID>> = entities
        .iter()
        .map(|(uid, e)| (uid.clone(), e.ancestors.iter().cloned().collect()))
        .collect();
    for entity in entities.values_mut() {
        let mut seen: HashSet<EntityUID> = HashSet::new();
        let mut queue: VecDeque<&EntityUID> = entity.ancestors.iter().collect();
        while let Some(uid) = queue.pop_front() {
            if !seen.insert(uid.clone()) {
                continue;
            }
            if let Some(grandparents) = parents.get(uid) {
                queue.extend(grandparents.iter());
            }
        }
        entity.ancestors = seen;
    }
}

/// Error constructing an [`Entities`] store
#[derive(Debug, Error)]
pub enum EntitiesError {
    /// Two entities in the input share a UID
    #[error("duplicate entity entry `{0}`")]
    Duplicate(EntityUID),
    /// The input is not well-formed entity-list JSON
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// An attribute value has no domain equivalent (e.g. `null` or a
    /// non-integer number)
    #[error("unsupported attribute value in entity JSON: {0}")]
    UnsupportedJsonValue(String),
    /// An `__extn` attribute failed to construct
    #[error(transparent)]
    Extension(#[from] crate::evaluator::EvaluationError),
}

#[derive(Deserialize)]
struct EntityUIDJson {
    #[serde(rename = "type")]
    ty: SmolStr,
    id: SmolStr,
}

impl From<EntityUIDJson> for EntityUID {
    fn from(uid: EntityUIDJson) -> Self {
        EntityUID::new(uid.ty, uid.id)
    }
}

#[derive(Deserialize)]
struct EntityJson {
    uid: EntityUIDJson,
    #[serde(default)]
    attrs: BTreeMap<SmolStr, serde_json::Value>,
    #[serde(default)]
    parents: Vec<EntityUIDJson>,
    #[serde(default)]
    tags: BTreeMap<SmolStr, serde_json::Value>,
}

impl TryFrom<EntityJson> for Entity {
    type Error = EntitiesError;

    fn try_from(e: EntityJson) -> std::result::Result<Self, EntitiesError> {
        let attrs = e
            .attrs
            .into_iter()
            .map(|(k, v)| Ok((k, value_from_json(v)?)))
            .collect::<std::result::Result<Vec<_>, EntitiesError>>()?;
        let tags = e
            .tags
            .into_iter()
            .map(|(k, v)| Ok((k, value_from_json(v)?)))
            .collect::<std::result::Result<Vec<_>, EntitiesError>>()?;
        Ok(Entity::new_with_tags(
            e.uid.into(),
            attrs,
            e.parents.into_iter().map(EntityUID::from),
            tags,
        ))
    }
}

fn value_from_json(v: serde_json::Value) -> std::result::Result<Value, EntitiesError> {
    match v {
        serde_json::Value::Bool(b) => Ok(Value::from(b)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::from)
            .ok_or_else(|| EntitiesError::UnsupportedJsonValue(n.to_string())),
        serde_json::Value::String(s) => Ok(Value::from(s)),
        serde_json::Value::Array(elements) => Ok(Value::set(
            elements
                .into_iter()
                .map(value_from_json)
                .collect::<std::result::Result<Vec<_>, _>>()?,
        )),
        serde_json::Value::Object(map) => {
            if map.len() == 2 {
                if let (Some(serde_json::Value::String(ty)), Some(serde_json::Value::String(id))) =
                    (map.get("type"), map.get("id"))
                {
                    return Ok(Value::from(EntityUID::new(ty.as_str(), id.as_str())));
                }
            }
            if map.len() == 1 {
                if let Some(serde_json::Value::Object(extn)) = map.get("__extn") {
                    if let (
                        Some(serde_json::Value::String(name)),
                        Some(serde_json::Value::String(arg)),
                    ) = (extn.get("fn"), extn.get("arg"))
                    {
                        return Ok(extensions::call(name, &[Value::from(arg.as_str())])?);
                    }
                }
            }
            Ok(Value::record(
                map.into_iter()
                    .map(|(k, v)| Ok((SmolStr::new(k), value_from_json(v)?)))
                    .collect::<std::result::Result<Vec<_>, EntitiesError>>()?,
            ))
        }
        serde_json::Value::Null => Err(EntitiesError::UnsupportedJsonValue("null".into())),
    }
}
