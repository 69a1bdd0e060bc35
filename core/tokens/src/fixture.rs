//! In-memory collaborators of the [`TokenGenerator`](crate::TokenGenerator) for unit tests.
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use anyhow::Result;
use uuid::Uuid;

use fleetcore_context::Context;

use crate::Claims;
use crate::ControllerLookup;
use crate::TokenSigner;

/// Token signer encoding claims as plain JSON so tests can inspect them.
#[derive(Clone, Default)]
pub struct SignerFixture {
    inner: Arc<Mutex<SignerState>>,
}

#[derive(Default)]
struct SignerState {
    fail: bool,
    signed: usize,
}

impl SignerFixture {
    /// Decode a token returned by the fixture back into its claims.
    pub fn decode(token: &[u8]) -> Claims {
        serde_json::from_slice(token).expect("SignerFixture token must be JSON encoded claims")
    }

    /// Make every following signing request fail.
    pub fn fail(&self, fail: bool) {
        self.access().fail = fail;
    }

    /// Number of tokens signed so far.
    pub fn signed(&self) -> usize {
        self.access().signed
    }

    fn access(&self) -> MutexGuard<SignerState> {
        self.inner
            .lock()
            .expect("SignerFixture::inner state lock poisoned")
    }
}

#[async_trait::async_trait]
impl TokenSigner for SignerFixture {
    async fn sign(&self, _: &Context, claims: &Claims) -> Result<Vec<u8>> {
        let mut state = self.access();
        if state.fail {
            anyhow::bail!("signer fixture configured to fail");
        }
        state.signed += 1;
        let token = serde_json::to_vec(claims)?;
        Ok(token)
    }
}

/// Controller lookup returning the clouds registered with the fixture.
#[derive(Clone, Default)]
pub struct ControllersFixture {
    clouds: Arc<Mutex<HashMap<Uuid, Vec<String>>>>,
}

impl ControllersFixture {
    /// Register the clouds of each region of a controller.
    pub fn insert<I, S>(&self, controller: Uuid, regions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let regions = regions.into_iter().map(Into::into).collect();
        self.clouds
            .lock()
            .expect("ControllersFixture::clouds lock poisoned")
            .insert(controller, regions);
    }
}

#[async_trait::async_trait]
impl ControllerLookup for ControllersFixture {
    async fn controller_clouds(&self, _: &Context, controller: Uuid) -> Result<Vec<String>> {
        let clouds = self
            .clouds
            .lock()
            .expect("ControllersFixture::clouds lock poisoned");
        match clouds.get(&controller) {
            Some(regions) => Ok(regions.clone()),
            None => anyhow::bail!("controller {} not found", controller),
        }
    }
}
