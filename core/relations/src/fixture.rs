//! In-memory implementation of [`RelationBackend`] for unit tests.
//!
//! The fixture resolves usersets (`group:<uuid>#member`) recursively but, like the real
//! graph schema, does not imply weaker relations from stronger ones.
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use anyhow::Result;

use fleetcore_context::Context;
use fleetcore_models::Entity;
use fleetcore_models::Relation;
use fleetcore_models::Resource;
use fleetcore_models::ResourceKind;
use fleetcore_models::Tuple;
use fleetcore_models::TupleFilter;

use super::CheckResponse;
use super::RelationBackend;
use super::TuplePage;

/// Maximum depth of userset resolution, to stop on cyclic memberships.
const MAX_RESOLVE_DEPTH: usize = 16;

/// In-memory authorization graph for unit tests.
#[derive(Clone, Default)]
pub struct RelationsFixture {
    /// Shared in-memory state to mock the graph with.
    inner: Arc<Mutex<RelationsFixtureState>>,
}

impl RelationsFixture {
    /// Make every following operation fail, as if the graph was unreachable.
    pub fn fail(&self, fail: bool) {
        self.access().fail = fail;
    }

    /// Number of write and delete calls received.
    pub fn mutations(&self) -> usize {
        self.access().mutations
    }

    /// Page sizes requested by each read call received.
    pub fn reads(&self) -> Vec<u32> {
        self.access().reads.clone()
    }

    /// Snapshot of all tuples currently in the graph, sorted.
    pub fn tuples(&self) -> Vec<Tuple> {
        self.access().tuples.iter().cloned().collect()
    }

    /// Lock and access the shared inner state.
    fn access(&self) -> MutexGuard<RelationsFixtureState> {
        self.inner
            .lock()
            .expect("RelationsFixture::inner state lock poisoned")
    }
}

#[async_trait::async_trait]
impl RelationBackend for RelationsFixture {
    async fn check(&self, _: &Context, tuple: &Tuple, trace: bool) -> Result<CheckResponse> {
        let state = self.access();
        state.available()?;
        let grant = resolve(
            &state.tuples,
            &[],
            &tuple.object,
            tuple.relation,
            &tuple.target,
            0,
        );
        let resolution = match (&grant, trace) {
            (Some(grant), true) => Some(format!("granted by '{grant}'")),
            (None, true) => Some("no matching tuple".to_string()),
            (_, false) => None,
        };
        Ok(CheckResponse {
            allowed: grant.is_some(),
            resolution,
        })
    }

    async fn delete(&self, _: &Context, tuples: &[Tuple]) -> Result<()> {
        let mut state = self.access();
        state.available()?;
        state.mutations += 1;
        for tuple in tuples {
            state.tuples.remove(tuple);
        }
        Ok(())
    }

    async fn list_objects(
        &self,
        _: &Context,
        subject: &Entity,
        relation: Relation,
        kind: ResourceKind,
        contextual: &[Tuple],
    ) -> Result<Vec<Resource>> {
        let state = self.access();
        state.available()?;
        let candidates: BTreeSet<&Resource> = state
            .tuples
            .iter()
            .chain(contextual.iter())
            .map(|tuple| &tuple.target)
            .filter(|target| target.kind() == kind)
            .collect();
        let objects = candidates
            .into_iter()
            .filter(|target| {
                resolve(&state.tuples, contextual, subject, relation, target, 0).is_some()
            })
            .cloned()
            .collect();
        Ok(objects)
    }

    async fn read(
        &self,
        _: &Context,
        filter: &TupleFilter,
        page_size: u32,
        continuation_token: Option<String>,
    ) -> Result<TuplePage> {
        let mut state = self.access();
        state.available()?;
        state.reads.push(page_size);

        // Tokens are the last tuple returned so deletes between pages do not skip tuples.
        let after = continuation_token.as_deref().map(parse_token).transpose()?;
        let page_size = page_size.max(1) as usize;
        let mut matching = state
            .tuples
            .iter()
            .filter(|tuple| after.as_ref().map(|after| *tuple > after).unwrap_or(true))
            .filter(|tuple| filter.matches(tuple));

        let tuples: Vec<Tuple> = matching.by_ref().take(page_size).cloned().collect();
        let continuation_token = match (matching.next(), tuples.last()) {
            (Some(_), Some(last)) => Some(last.to_string()),
            _ => None,
        };
        Ok(TuplePage {
            continuation_token,
            tuples,
        })
    }

    async fn write(&self, _: &Context, tuples: &[Tuple]) -> Result<()> {
        let mut state = self.access();
        state.available()?;
        state.mutations += 1;
        state.tuples.extend(tuples.iter().cloned());
        Ok(())
    }
}

/// Container for the shared state.
#[derive(Default)]
struct RelationsFixtureState {
    fail: bool,
    mutations: usize,
    reads: Vec<u32>,
    tuples: BTreeSet<Tuple>,
}

impl RelationsFixtureState {
    fn available(&self) -> Result<()> {
        if self.fail {
            anyhow::bail!("authorization graph fixture is unavailable");
        }
        Ok(())
    }
}

/// Decode a continuation token back into the tuple it was generated from.
fn parse_token(token: &str) -> Result<Tuple> {
    let mut parts = token.split(' ');
    let (object, relation, target) = match (parts.next(), parts.next(), parts.next()) {
        (Some(object), Some(relation), Some(target)) => (object, relation, target),
        _ => anyhow::bail!("invalid continuation token '{}'", token),
    };
    let tuple = Tuple {
        object: Entity::from_str(object)?,
        relation: Relation::from_str(relation)?,
        target: Resource::from_str(target)?,
    };
    Ok(tuple)
}

/// Find the tuple granting `object` the `relation` to `target`, following usersets.
fn resolve(
    tuples: &BTreeSet<Tuple>,
    contextual: &[Tuple],
    object: &Entity,
    relation: Relation,
    target: &Resource,
    depth: usize,
) -> Option<Tuple> {
    if depth > MAX_RESOLVE_DEPTH {
        return None;
    }
    let candidates = tuples
        .iter()
        .chain(contextual.iter())
        .filter(|tuple| tuple.relation == relation && &tuple.target == target);
    for tuple in candidates {
        if &tuple.object == object {
            return Some(tuple.clone());
        }
        if let Some(userset) = tuple.object.relation {
            let via = resolve(
                tuples,
                contextual,
                object,
                userset,
                &tuple.object.resource,
                depth + 1,
            );
            if via.is_some() {
                return Some(tuple.clone());
            }
        }
    }
    None
}
