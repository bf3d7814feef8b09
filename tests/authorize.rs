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

//! End-to-end tests for the policy combiner: a document-access policy set
//! evaluated for different principals, rendered down to `WHERE` fragments.

use cedar_residual_sql::ast::{Effect, EntityUID, Expr, Policy, PolicySet, Value, Var};
use cedar_residual_sql::entities::Entities;
use cedar_residual_sql::{
    authorize_sql, AuthorizeSqlRequest, FieldMapper, InvalidFieldNameError, SqlValue,
    TranslateError,
};
use cool_asserts::assert_matches;
use similar_asserts::assert_eq;
use smol_str::SmolStr;

const ENTITIES: &str = r#"
[
    {
        "uid": {"type": "User", "id": "alice"},
        "parents": [{"type": "Group", "id": "admin"}],
        "attrs": {}
    },
    {
        "uid": {"type": "User", "id": "bob"},
        "attrs": {}
    },
    {
        "uid": {"type": "User", "id": "charlie"},
        "attrs": {"block": true}
    },
    {
        "uid": {"type": "Group", "id": "admin"},
        "attrs": {}
    }
]
"#;

/// Maps `resource.*` onto the `document` table, rejecting columns that do
/// not exist on it.
struct DocMapper;

impl FieldMapper for DocMapper {
    fn map(&self, name: &str) -> Result<SmolStr, InvalidFieldNameError> {
        if let Some(field) = name.strip_prefix("resource.") {
            return if ["owner", "is_public"].contains(&field) {
                Ok(SmolStr::new(format!("document.{field}")))
            } else {
                Err(InvalidFieldNameError::new(name))
            };
        }
        Ok(SmolStr::new(name))
    }
}

fn view_document() -> EntityUID {
    EntityUID::new("Action", "ViewDocument")
}

fn action_is_view_document() -> Expr {
    Expr::is_eq(Expr::var(Var::Action), Expr::val(view_document()))
}

fn context_is_authenticated() -> Expr {
    Expr::get_attr(Expr::var(Var::Context), "is_authenticated")
}

/// The policy set from the document-access example:
///   - authenticated users may view documents they own or public ones
///   - authenticated admins may view everything
///   - unauthenticated users may view public documents
///   - blocked users may view nothing
fn policies() -> PolicySet {
    [
        Policy::new(
            "policy0",
            Effect::Permit,
            Expr::and(
                Expr::and(action_is_view_document(), context_is_authenticated()),
                Expr::or(
                    Expr::is_eq(
                        Expr::get_attr(Expr::var(Var::Resource), "owner"),
                        Expr::var(Var::Principal),
                    ),
                    Expr::is_eq(
                        Expr::get_attr(Expr::var(Var::Resource), "is_public"),
                        Expr::val(true),
                    ),
                ),
            ),
        ),
        Policy::new(
            "policy1",
            Effect::Permit,
            Expr::and(
                Expr::and(action_is_view_document(), context_is_authenticated()),
                Expr::is_in(
                    Expr::var(Var::Principal),
                    Expr::val(EntityUID::new("Group", "admin")),
                ),
            ),
        ),
        Policy::new(
            "policy2",
            Effect::Permit,
            Expr::and(
                Expr::and(action_is_view_document(), Expr::not(context_is_authenticated())),
                Expr::is_eq(
                    Expr::get_attr(Expr::var(Var::Resource), "is_public"),
                    Expr::val(true),
                ),
            ),
        ),
        Policy::new(
            "policy3",
            Effect::Forbid,
            Expr::and(
                action_is_view_document(),
                Expr::and(
                    Expr::has_attr(Expr::var(Var::Principal), "block"),
                    Expr::is_eq(
                        Expr::get_attr(Expr::var(Var::Principal), "block"),
                        Expr::val(true),
                    ),
                ),
            ),
        ),
    ]
    .into_iter()
    .collect()
}

fn entities() -> Entities {
    Entities::from_json_str(ENTITIES).unwrap()
}

fn context(authenticated: bool) -> Value {
    Value::record([(
        SmolStr::new_static("is_authenticated"),
        Value::from(authenticated),
    )])
}

fn request(principal: &str, authenticated: bool) -> AuthorizeSqlRequest {
    AuthorizeSqlRequest::new(EntityUID::new("User", principal), view_document())
        .with_context(context(authenticated))
        .with_mapper(DocMapper)
}

#[test]
fn admin_sees_all_documents() {
    let (sql, args) = authorize_sql(&policies(), &entities(), &request("alice", true)).unwrap();
    assert_eq!(sql, "1 = 1");
    assert_eq!(args, vec![]);
}

#[test]
fn regular_user_sees_own_and_public_documents() {
    let (sql, args) = authorize_sql(&policies(), &entities(), &request("bob", true)).unwrap();
    assert_eq!(sql, "(document.owner = ? OR document.is_public = ?)");
    assert_eq!(args, vec![SqlValue::from("bob"), SqlValue::from(true)]);
}

#[test]
fn blocked_user_sees_nothing() {
    let (sql, args) = authorize_sql(&policies(), &entities(), &request("charlie", true)).unwrap();
    assert_eq!(sql, "1 = 0");
    assert_eq!(args, vec![]);
}

#[test]
fn unauthenticated_user_sees_public_documents() {
    let (sql, args) =
        authorize_sql(&policies(), &entities(), &request("unauthenticated", false)).unwrap();
    assert_eq!(sql, "document.is_public = ?");
    assert_eq!(args, vec![SqlValue::from(true)]);
}

#[test]
fn no_applicable_policy_defaults_open() {
    // a request for an action no policy covers: everything drops
    let request = AuthorizeSqlRequest::new(EntityUID::new("User", "bob"), EntityUID::new("Action", "Delete"))
        .with_context(context(true))
        .with_mapper(DocMapper);
    let (sql, args) = authorize_sql(&policies(), &entities(), &request).unwrap();
    assert_eq!(sql, "1 = 1");
    assert_eq!(args, vec![]);
}

#[test]
fn no_applicable_policy_with_default_deny() {
    let request = AuthorizeSqlRequest::new(EntityUID::new("User", "bob"), EntityUID::new("Action", "Delete"))
        .with_context(context(true))
        .with_mapper(DocMapper)
        .with_default_deny(true);
    let (sql, args) = authorize_sql(&policies(), &entities(), &request).unwrap();
    assert_eq!(sql, "1 = 0");
    assert_eq!(args, vec![]);
}

#[test]
fn forbid_remainder_excludes_rows() {
    let policies: PolicySet = [
        Policy::new("allow-all", Effect::Permit, Expr::val(true)),
        Policy::new(
            "hide-archived",
            Effect::Forbid,
            Expr::is_eq(
                Expr::get_attr(Expr::var(Var::Resource), "archived"),
                Expr::val(true),
            ),
        ),
    ]
    .into_iter()
    .collect();
    let request = AuthorizeSqlRequest::new(EntityUID::new("User", "bob"), view_document())
        .with_context(context(true));
    let (sql, args) = authorize_sql(&policies, &entities(), &request).unwrap();
    assert_eq!(sql, "NOT (resource.archived = ?)");
    assert_eq!(args, vec![SqlValue::from(true)]);
}

#[test]
fn permit_and_forbid_remainders_combine() {
    let policies: PolicySet = [
        Policy::new(
            "own-documents",
            Effect::Permit,
            Expr::is_eq(
                Expr::get_attr(Expr::var(Var::Resource), "owner"),
                Expr::var(Var::Principal),
            ),
        ),
        Policy::new(
            "hide-archived",
            Effect::Forbid,
            Expr::is_eq(
                Expr::get_attr(Expr::var(Var::Resource), "archived"),
                Expr::val(true),
            ),
        ),
    ]
    .into_iter()
    .collect();
    let request = AuthorizeSqlRequest::new(EntityUID::new("User", "bob"), view_document())
        .with_context(context(true));
    let (sql, args) = authorize_sql(&policies, &entities(), &request).unwrap();
    assert_eq!(
        sql,
        "(resource.owner = ? AND NOT (resource.archived = ?))"
    );
    assert_eq!(args, vec![SqlValue::from("bob"), SqlValue::from(true)]);
}

#[test]
fn unmapped_column_aborts_translation() {
    let policies: PolicySet = [Policy::new(
        "secret",
        Effect::Permit,
        Expr::is_eq(
            Expr::get_attr(Expr::var(Var::Resource), "secret"),
            Expr::val(true),
        ),
    )]
    .into_iter()
    .collect();
    let result = authorize_sql(&policies, &entities(), &request("bob", true));
    assert_matches!(result, Err(TranslateError::InvalidFieldName(_)));
}

#[test]
fn disjuncts_follow_policy_order() {
    let make = |id: &str, attr: &str| {
        Policy::new(
            id,
            Effect::Permit,
            Expr::is_eq(
                Expr::get_attr(Expr::var(Var::Resource), attr),
                Expr::val(true),
            ),
        )
    };
    let policies: PolicySet = [make("a", "first"), make("b", "second"), make("c", "third")]
        .into_iter()
        .collect();
    let request = AuthorizeSqlRequest::new(EntityUID::new("User", "bob"), view_document())
        .with_context(context(true));
    let (sql, _) = authorize_sql(&policies, &entities(), &request).unwrap();
    assert_eq!(
        sql,
        "((resource.first = ? OR resource.second = ?) OR resource.third = ?)"
    );
}
