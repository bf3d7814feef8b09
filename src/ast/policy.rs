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

use crate::ast::Expr;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::sync::Arc;

/// The effect of a policy
#[derive(Serialize, Deserialize, Hash, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Effect {
    /// this means a matching request should be permitted
    Permit,
    /// this means a matching request should be forbidden
    Forbid,
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Permit => write!(f, "permit"),
            Self::Forbid => write!(f, "forbid"),
        }
    }
}

/// The identifier of a policy within a policy set.
#[derive(Serialize, Deserialize, Hash, Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PolicyID(SmolStr);

impl PolicyID {
    /// Get the policy id as a string slice
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for PolicyID {
    fn from(s: &str) -> Self {
        Self(SmolStr::new(s))
    }
}

impl From<String> for PolicyID {
    fn from(s: String) -> Self {
        Self(SmolStr::new(s))
    }
}

impl std::fmt::Display for PolicyID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A policy: an effect guarded by a condition expression. The condition is
/// the conjunction of the policy's scope constraints and `when`/`unless`
/// clauses, as produced by whatever frontend parsed the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    id: PolicyID,
    effect: Effect,
    condition: Arc<Expr>,
}

impl Policy {
    /// Create a policy with the given id, effect, and condition.
    pub fn new(id: impl Into<PolicyID>, effect: Effect, condition: Expr) -> Self {
        Self {
            id: id.into(),
            effect,
            condition: Arc::new(condition),
        }
    }

    /// Get the id of this policy.
    pub fn id(&self) -> &PolicyID {
        &self.id
    }

    /// Get the effect of this policy.
    pub fn effect(&self) -> Effect {
        self.effect
    }

    /// Get the condition expression of this policy.
    pub fn condition(&self) -> &Expr {
        &self.condition
    }
}

/// A set of policies. Iteration preserves insertion order, so callers get
/// byte-stable SQL out of the combiner for a fixed input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySet {
    policies: Vec<Policy>,
}

impl PolicySet {
    /// Create an empty policy set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a policy to the set.
    pub fn add(&mut self, policy: Policy) {
        self.policies.push(policy);
    }

    /// Iterate over the policies in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Policy> {
        self.policies.iter()
    }

    /// Number of policies in the set.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether the set contains no policies.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl FromIterator<Policy> for PolicySet {
    fn from_iter<T: IntoIterator<Item = Policy>>(iter: T) -> Self {
        Self {
            policies: iter.into_iter().collect(),
        }
    }
}
