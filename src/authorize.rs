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

//! This module contains the policy combiner: it partially evaluates every
//! policy under a request whose resource is unknown, then reduces the set to
//! a single residual under deny-override semantics and renders it to SQL.

use crate::ast::{Effect, EntityUID, Expr, PolicySet, Value};
use crate::entities::Entities;
use crate::err::Result;
use crate::evaluator::{Env, PartialEvaluator, PolicyOutcome};
use crate::mapper::{DefaultFieldMapper, FieldMapper};
use crate::reducer::to_sql_with_dialect;
use crate::sqlizer::{Dialect, SqlValue};
use tracing::debug;

/// A request whose resource is left unknown: who is asking, what action, and
/// optionally a concrete context.
pub struct AuthorizeSqlRequest {
    principal: EntityUID,
    action: EntityUID,
    context: Option<Value>,
    mapper: Option<Box<dyn FieldMapper>>,
    dialect: Dialect,
    default_deny: bool,
}

impl AuthorizeSqlRequest {
    /// A request by `principal` to perform `action`, with the context
    /// unknown, the identity mapper, and the default dialect.
    pub fn new(principal: EntityUID, action: EntityUID) -> Self {
        Self {
            principal,
            action,
            context: None,
            mapper: None,
            dialect: Dialect::default(),
            default_deny: false,
        }
    }

    /// Bind the context to a concrete value (normally a Record).
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Use the given field mapper instead of the identity mapper.
    pub fn with_mapper(mut self, mapper: impl FieldMapper + 'static) -> Self {
        self.mapper = Some(Box::new(mapper));
        self
    }

    /// Use the given operator dialect instead of [`Dialect::POSTGRES`].
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// When no permit policy applies at all, emit `1 = 0` (strict default
    /// deny) instead of the historical `1 = 1`.
    pub fn with_default_deny(mut self, default_deny: bool) -> Self {
        self.default_deny = default_deny;
        self
    }
}

impl std::fmt::Debug for AuthorizeSqlRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizeSqlRequest")
            .field("principal", &self.principal)
            .field("action", &self.action)
            .field("context", &self.context)
            .field("dialect", &self.dialect)
            .field("default_deny", &self.default_deny)
            .finish_non_exhaustive()
    }
}

/// Emit the SQL `WHERE`-fragment selecting exactly the rows the request
/// would be authorized on.
///
/// Policies are combined under deny-override semantics projected onto the
/// unknown-row space: a row is selected iff some permit would match it and
/// no forbid would match it once the row's columns are substituted in.
/// Policies within the same effect are combined under `OR` in the caller's
/// iteration order, so a fixed input order yields byte-stable SQL.
pub fn authorize_sql(
    policies: &PolicySet,
    entities: &Entities,
    request: &AuthorizeSqlRequest,
) -> Result<(String, Vec<SqlValue>)> {
    let context = request
        .context
        .clone()
        .unwrap_or_else(|| Value::variable("context"));
    let env = Env::new(entities)
        .with_principal(request.principal.clone())
        .with_action(request.action.clone())
        .with_context(context);
    let evaluator = PartialEvaluator::new(&env);

    let mut permits = Vec::new();
    let mut forbids = Vec::new();
    let mut permits_remains = Vec::new();
    let mut forbids_remains = Vec::new();
    for policy in policies.iter() {
        match evaluator.partial_policy(policy)? {
            PolicyOutcome::Dropped => {}
            PolicyOutcome::Satisfied => match policy.effect() {
                Effect::Permit => permits.push(policy.id().clone()),
                Effect::Forbid => forbids.push(policy.id().clone()),
            },
            PolicyOutcome::Remainder(e) => match policy.effect() {
                Effect::Permit => permits_remains.push(e),
                Effect::Forbid => forbids_remains.push(e),
            },
        }
    }

    let node = if !forbids.is_empty() {
        // deny overrides: a satisfied forbid blocks every row
        for pid in &forbids {
            debug!(policy_id = %pid, "forbid policy satisfied");
        }
        Expr::val(false)
    } else {
        let permits_node = if !permits.is_empty() {
            for pid in &permits {
                debug!(policy_id = %pid, "permit policy satisfied");
            }
            Some(Expr::val(true))
        } else {
            // rows satisfying any of the permit remainders
            or_fold(permits_remains)
        };
        let mut node = match permits_node {
            Some(node) => node,
            // nothing authorizes at all; the historical combiner admits
            // every row here unless the caller opted into default deny
            None => Expr::val(!request.default_deny),
        };
        // the selected rows must also not satisfy any forbid remainder
        if let Some(forbids_node) = or_fold(forbids_remains) {
            node = Expr::and(node, Expr::not(forbids_node));
        }
        node
    };

    let mapper: &dyn FieldMapper = request.mapper.as_deref().unwrap_or(&DefaultFieldMapper);
    to_sql_with_dialect(&node, &env, mapper, request.dialect)
}

fn or_fold(exprs: Vec<Expr>) -> Option<Expr> {
    exprs.into_iter().reduce(Expr::or)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sqlizer::{SQL_FALSE, SQL_TRUE};
    use similar_asserts::assert_eq;

    fn request() -> AuthorizeSqlRequest {
        AuthorizeSqlRequest::new(
            EntityUID::new("User", "nobody"),
            EntityUID::new("Action", "View"),
        )
    }

    #[test]
    fn empty_policy_set_admits_everything() {
        let entities = Entities::new();
        let (sql, args) = authorize_sql(&PolicySet::new(), &entities, &request()).unwrap();
        assert_eq!(sql, SQL_TRUE);
        assert_eq!(args, vec![]);
    }

    #[test]
    fn empty_policy_set_with_default_deny() {
        let entities = Entities::new();
        let (sql, args) =
            authorize_sql(&PolicySet::new(), &entities, &request().with_default_deny(true))
                .unwrap();
        assert_eq!(sql, SQL_FALSE);
        assert_eq!(args, vec![]);
    }
}
