use std::sync::Arc;

use crate::auth::{TokenDecoder, UnverifiedTokenDecoder, VerifyingTokenDecoder};
use crate::config::AppConfig;
use crate::email::{Mailer, ResendMailer};
use crate::identity::{GoTrueAdmin, IdentityAdmin};
use crate::services::{InviteService, OrgMismatchPolicy, PermissionService};
use crate::store::{SupabaseStore, TableStore};

/// Everything a request handler needs, constructed once at startup and
/// shared across requests. Replaces the lazily-initialized global client
/// handles the service grew up with.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn TableStore>,
    pub decoder: Arc<dyn TokenDecoder>,
    pub permissions: PermissionService,
    pub invites: InviteService,
}

impl AppState {
    /// Wire up an application state from already-built collaborators. Tests
    /// use this with in-memory fakes.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn TableStore>,
        identity: Arc<dyn IdentityAdmin>,
        mailer: Arc<dyn Mailer>,
        decoder: Arc<dyn TokenDecoder>,
    ) -> Self {
        let policy = if config.allow_org_mismatch {
            OrgMismatchPolicy::Permissive
        } else {
            OrgMismatchPolicy::Strict
        };
        let permissions = PermissionService::new(store.clone(), policy);
        let invites = InviteService::new(
            store.clone(),
            identity,
            mailer,
            permissions.clone(),
            config.frontend_url.clone(),
        );
        Self {
            config: Arc::new(config),
            store,
            decoder,
            permissions,
            invites,
        }
    }

    /// Build the production wiring: hosted table store, identity admin API
    /// and email provider clients.
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let store = Arc::new(SupabaseStore::new(&config)?);
        let identity = Arc::new(GoTrueAdmin::new(&config)?);
        let mailer = Arc::new(ResendMailer::new(&config)?);

        let decoder: Arc<dyn TokenDecoder> = if config.verify_tokens {
            let secret = config
                .supabase_jwt_secret
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("token verification requires SUPABASE_JWT_SECRET"))?;
            Arc::new(VerifyingTokenDecoder::new(secret))
        } else {
            tracing::warn!("token signature verification is OFF; do not run this in production");
            Arc::new(UnverifiedTokenDecoder)
        };

        Ok(Self::new(config, store, identity, mailer, decoder))
    }
}
