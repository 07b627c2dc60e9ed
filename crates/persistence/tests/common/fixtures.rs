//! Test fixtures: entities seeded through the provider under test.

use std::sync::Arc;

use tessera_persistence::entities::{Content, Membership, User, UserGroup};
use tessera_persistence::entity::Resource;
use tessera_persistence::provider::Provider;
use tessera_persistence::tenant::RequestContext;

use super::harness::TestContext;

/// Builds an unsaved user with a fixed id.
pub fn user(id: &str, name: &str) -> User {
    let mut user = User::new(name);
    user.entity_mut().set_id(id);
    user.set_email(Some(format!("{id}@example.com")));
    user
}

/// Builds an unsaved content item with a fixed id.
pub fn article(id: &str, name: &str, body: &str) -> Content {
    let mut content = Content::new(name);
    content.entity_mut().set_id(id);
    content.set_body(Some(body.to_string()));
    content
}

/// Saves `entity` and panics unless the save succeeded.
pub async fn seed<E: Resource>(
    provider: &Arc<dyn Provider<E>>,
    ctx: &RequestContext,
    mut entity: E,
) -> E {
    let result = provider.save(ctx, &mut entity).await;
    assert!(
        result.is_successful(),
        "seeding {} {} failed: {:?}",
        E::KIND,
        entity.entity().id(),
        result
    );
    entity
}

/// Saves users with the given `(id, name)` pairs in order.
pub async fn seed_users(tc: &TestContext, ctx: &RequestContext, users: &[(&str, &str)]) -> Vec<User> {
    let provider = tc.provider::<User>();
    let mut saved = Vec::with_capacity(users.len());
    for (id, name) in users {
        saved.push(seed(&provider, ctx, user(id, name)).await);
    }
    saved
}

/// A group with two members, the second one a manager.
pub struct TeamFixture {
    pub group: UserGroup,
    pub members: Vec<User>,
    pub memberships: Vec<Membership>,
}

pub async fn seed_team(tc: &TestContext, ctx: &RequestContext) -> TeamFixture {
    let members = seed_users(tc, ctx, &[("ada", "Ada"), ("grace", "Grace")]).await;

    let mut group = UserGroup::new("editors");
    group.entity_mut().set_id("editors");
    let group = seed(&tc.provider::<UserGroup>(), ctx, group).await;

    let group_ref = Arc::new(group.clone());
    let mut memberships = Vec::new();
    for (index, member) in members.iter().enumerate() {
        let mut membership = Membership::new(group_ref.clone(), Arc::new(member.clone()));
        if index == 1 {
            membership.set_role(tessera_persistence::entities::MemberRole::Manager);
        }
        memberships.push(seed(&tc.provider::<Membership>(), ctx, membership).await);
    }

    TeamFixture {
        group,
        members,
        memberships,
    }
}
