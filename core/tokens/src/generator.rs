//! Per-session capability token generator.
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Context as AnyContext;
use anyhow::Result;
use tokio::sync::Mutex;
use uuid::Uuid;

use fleetcore_auth::AuthorisedUser;
use fleetcore_context::Context;
use fleetcore_errors::RateLimited;
use fleetcore_errors::Unauthorized;
use fleetcore_errors::Upstream;
use fleetcore_errors::Validation;
use fleetcore_models::Relation;
use fleetcore_models::Resource;

use crate::telemetry::TOKENS_ISSUED;
use crate::telemetry::TOKENS_RATE_LIMITED;
use crate::Claims;
use crate::ControllerLookup;
use crate::TokenSigner;

/// Maximum number of [`TokenGenerator::make_token`] calls for each login.
pub const MAX_TOKEN_CALLS: u32 = 10;

/// Generate capability tokens for a single client session.
///
/// Operations may be called concurrently by handlers sharing the session
/// and are serialised by an internal lock.
pub struct TokenGenerator {
    controllers: Arc<dyn ControllerLookup>,
    signer: Arc<dyn TokenSigner>,
    state: Mutex<SessionState>,
}

/// Mutable state of a session, reset on every login.
#[derive(Default)]
struct SessionState {
    /// Access claims, keyed by resource tag.
    access: BTreeMap<String, String>,

    /// Number of token requests since the last login.
    calls: u32,

    controller: Option<Uuid>,
    model: Option<Uuid>,

    /// The last successful login, if any.
    login: Option<Login>,
}

/// Details of a successful login, fixed until the next login.
struct Login {
    controller: Uuid,
    user: AuthorisedUser,
}

impl TokenGenerator {
    pub fn new(controllers: Arc<dyn ControllerLookup>, signer: Arc<dyn TokenSigner>) -> Self {
        TokenGenerator {
            controllers,
            signer,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Set the model and controller the session is for.
    ///
    /// Tags are read at login: tokens extending an existing login keep the
    /// controller the login was issued for.
    pub async fn set_tags(&self, model: Option<Uuid>, controller: Option<Uuid>) {
        let mut state = self.state.lock().await;
        state.model = model;
        state.controller = controller;
    }

    /// Compute the base claims for the user and return them in a signed token.
    ///
    /// Claims from any previous login are discarded, as is the token request count.
    /// The user must have access to the session's model.
    pub async fn make_login_token(
        &self,
        context: &Context,
        user: Option<&AuthorisedUser>,
    ) -> Result<Vec<u8>> {
        let mut state = self.state.lock().await;
        let user = user.ok_or_else(|| Validation::new("user not specified"))?;
        let (model, controller) = match (state.model, state.controller) {
            (None, _) => return Err(Validation::new("model not set").into()),
            (_, None) => return Err(Validation::new("controller not set").into()),
            (Some(model), Some(controller)) => (model, controller),
        };

        state.access.clear();
        state.calls = 0;
        state.login = None;

        let model_access = user.model_access(context, model).await;
        if !model_access.is_granted() {
            let error = Unauthorized::new(format!("no access to model {}", model));
            return Err(error.into());
        }
        let model = Resource::Model(model);
        state.access.insert(model.tag(), model_access.to_string());

        let controller_access = user.controller_access(context, controller).await;
        let controller_tag = Resource::Controller(controller).tag();
        state
            .access
            .insert(controller_tag.clone(), controller_access.to_string());

        let clouds: BTreeSet<String> = self
            .controllers
            .controller_clouds(context, controller)
            .await
            .context(Upstream::new("tokens.controller_clouds"))?
            .into_iter()
            .collect();
        for cloud in clouds {
            let access = user.cloud_access(context, &cloud).await;
            let cloud = Resource::Cloud(cloud);
            state.access.insert(cloud.tag(), access.to_string());
        }

        let claims = Claims {
            controller: controller_tag,
            user: user.identity().tag(),
            access: state.access.clone(),
        };
        let token = self.sign(context, &claims, "login").await?;
        state.login = Some(Login {
            controller,
            user: user.clone(),
        });
        slog::info!(
            context.logger, "Issued login token";
            "user" => &claims.user,
            "model" => model.tag(),
            "controller" => &claims.controller,
            "claims" => claims.access.len(),
        );
        Ok(token)
    }

    /// Extend the claims of the current login with the requested permissions.
    ///
    /// Permissions map resource tags to access levels, such as `model-<uuid>: write`.
    /// Every requested permission must be granted for any of them to be added.
    /// Existing claims are never removed or re-checked.
    pub async fn make_token(
        &self,
        context: &Context,
        permissions: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>> {
        let mut state = self.state.lock().await;
        let (controller, user) = match &state.login {
            Some(login) => (login.controller, login.user.clone()),
            None => {
                let error = Validation::new("login required before requesting a token");
                return Err(error.into());
            }
        };

        state.calls += 1;
        if state.calls > MAX_TOKEN_CALLS {
            TOKENS_RATE_LIMITED.inc();
            slog::warn!(
                context.logger, "Token request rejected by per-login limit";
                "user" => user.identity().tag(),
                "limit" => MAX_TOKEN_CALLS,
            );
            return Err(RateLimited::new("permission check limit").into());
        }

        let mut granted = BTreeMap::new();
        for (tag, access) in permissions {
            let resource = Resource::parse_tag(tag)?;
            let tag = resource.tag();
            if state.access.contains_key(&tag) || granted.contains_key(&tag) {
                continue;
            }
            let relation = Relation::from_access(access)?;
            let allowed = user.check_relation(context, relation, &resource).await?;
            if !allowed {
                let error = Unauthorized::new(format!("missing permissions for {}", tag));
                return Err(error.into());
            }
            granted.insert(tag, access.clone());
        }
        state.access.extend(granted);

        let claims = Claims {
            controller: Resource::Controller(controller).tag(),
            user: user.identity().tag(),
            access: state.access.clone(),
        };
        self.sign(context, &claims, "permissions").await
    }

    async fn sign(&self, context: &Context, claims: &Claims, kind: &str) -> Result<Vec<u8>> {
        let token = self
            .signer
            .sign(context, claims)
            .await
            .context(Upstream::new("tokens.sign"))?;
        TOKENS_ISSUED.with_label_values(&[kind]).inc();
        Ok(token)
    }
}
