//! Idempotent reconcile loop shared by the managed-object modules
//!
//! A module describes its object through [`Resource`]; [`reconcile`] fetches
//! the current state, plans the transition and issues writes only when the
//! plan is not a no-op.

use super::params::State;
use super::result::ModuleResult;
use crate::svc::SvcApi;
use anyhow::Result;

/// Typed difference between desired and observed attributes
pub trait ChangeSet {
    fn is_empty(&self) -> bool;

    /// Names of the attributes that will be written, in command order
    fn fields(&self) -> Vec<&'static str>;
}

/// What one invocation will do
#[derive(Debug, Clone, PartialEq)]
pub enum Plan<C> {
    Noop,
    Create,
    Update(C),
    Delete,
}

/// A named object with desired state `present` or `absent`
#[allow(async_fn_in_trait)]
pub trait Resource {
    type Observed;
    type Changes: ChangeSet;

    /// Human readable object kind used in messages, e.g. "Storage partition"
    fn kind(&self) -> &'static str;
    fn name(&self) -> &str;
    fn state(&self) -> State;

    async fn fetch<A: SvcApi>(&self, api: &A) -> Result<Option<Self::Observed>>;

    /// Desired-vs-observed difference. Fails when the observed object can
    /// never be brought to the desired state by modification.
    fn diff(&self, observed: &Self::Observed) -> Result<Self::Changes>;

    /// Create the object; returns the new id when the appliance reports one
    async fn create<A: SvcApi>(&self, api: &A) -> Result<Option<String>>;

    async fn update<A: SvcApi>(
        &self,
        api: &A,
        observed: &Self::Observed,
        changes: &Self::Changes,
    ) -> Result<()>;

    async fn delete<A: SvcApi>(&self, api: &A, observed: &Self::Observed) -> Result<()>;
}

/// Decide the transition for the observed state
pub fn plan<R: Resource>(resource: &R, observed: Option<&R::Observed>) -> Result<Plan<R::Changes>> {
    Ok(match (resource.state(), observed) {
        (State::Present, None) => Plan::Create,
        (State::Present, Some(current)) => {
            let changes = resource.diff(current)?;
            if changes.is_empty() {
                Plan::Noop
            } else {
                Plan::Update(changes)
            }
        }
        (State::Absent, Some(_)) => Plan::Delete,
        (State::Absent, None) => Plan::Noop,
    })
}

/// Fetch, plan and apply
pub async fn reconcile<R: Resource, A: SvcApi>(resource: &R, api: &A) -> Result<ModuleResult> {
    let observed = resource.fetch(api).await?;
    reconcile_observed(resource, api, observed).await
}

/// Plan and apply against an already fetched state
pub async fn reconcile_observed<R: Resource, A: SvcApi>(
    resource: &R,
    api: &A,
    observed: Option<R::Observed>,
) -> Result<ModuleResult> {
    let kind = resource.kind();
    let name = resource.name();

    match (plan(resource, observed.as_ref())?, observed) {
        (Plan::Create, _) => {
            let id = resource.create(api).await?;
            tracing::info!("{} [{}] created", kind, name);
            let result = ModuleResult::changed(format!("{} [{}] has been created.", kind, name));
            Ok(match id {
                Some(id) => result.with("id", id),
                None => result,
            })
        }
        (Plan::Update(changes), Some(current)) => {
            resource.update(api, &current, &changes).await?;
            let fields = changes.fields();
            tracing::info!("{} [{}] modified: {:?}", kind, name, fields);
            Ok(ModuleResult::changed(format!("{} [{}] has been modified.", kind, name))
                .with("changes", fields))
        }
        (Plan::Delete, Some(current)) => {
            resource.delete(api, &current).await?;
            tracing::info!("{} [{}] deleted", kind, name);
            Ok(ModuleResult::changed(format!("{} [{}] has been deleted.", kind, name)))
        }
        (_, _) => Ok(noop_result(kind, name, resource.state())),
    }
}

fn noop_result(kind: &str, name: &str, state: State) -> ModuleResult {
    match state {
        State::Present => ModuleResult::unchanged(format!(
            "No modifications required for {} [{}].",
            kind.to_lowercase(),
            name
        )),
        State::Absent => ModuleResult::unchanged(format!("{} [{}] does not exist.", kind, name)),
    }
}
