use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::email::{invitation_email, EmailError, EmailOutcome, Mailer};
use crate::identity::{CreateUserRequest, IdentityAdmin, IdentityError};
use crate::middleware::AuthUser;
use crate::services::permission::PermissionService;
use crate::store::{StoreError, TableStore};

#[derive(Debug, Error)]
pub enum InviteError {
    #[error("inviter is not permitted to act on this organization")]
    NotPermitted,

    #[error("no organization resolved for slug {0}")]
    OrgNotResolved(String),

    #[error("{0} is already registered")]
    AlreadyRegistered(String),

    #[error(transparent)]
    Identity(IdentityError),

    #[error(transparent)]
    Email(#[from] EmailError),
}

#[derive(Debug, Error)]
pub enum AcceptError {
    #[error("no organization could be determined from the invitation")]
    NoOrganization,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a successful invitation.
#[derive(Debug, Clone)]
pub struct InviteReceipt {
    pub user_id: String,
}

/// Result of a successful invite acceptance.
#[derive(Debug, Clone)]
pub struct Acceptance {
    pub org_id: i64,
    pub org_slug: String,
}

/// Onboards new users into an organization: provisions them at the identity
/// provider, makes sure an invitation email goes out one way or another, and
/// records a pending profile.
#[derive(Clone)]
pub struct InviteService {
    store: Arc<dyn TableStore>,
    identity: Arc<dyn IdentityAdmin>,
    mailer: Arc<dyn Mailer>,
    permissions: PermissionService,
    frontend_url: String,
}

impl InviteService {
    pub fn new(
        store: Arc<dyn TableStore>,
        identity: Arc<dyn IdentityAdmin>,
        mailer: Arc<dyn Mailer>,
        permissions: PermissionService,
        frontend_url: String,
    ) -> Self {
        Self {
            store,
            identity,
            mailer,
            permissions,
            frontend_url,
        }
    }

    fn redirect_target(&self) -> String {
        format!("{}/accept-invite", self.frontend_url.trim_end_matches('/'))
    }

    pub async fn invite(
        &self,
        inviter: &AuthUser,
        org_slug: &str,
        email: &str,
    ) -> Result<InviteReceipt, InviteError> {
        let decision = self.permissions.authorize(inviter, org_slug, false).await;
        if !decision.allowed {
            return Err(InviteError::NotPermitted);
        }
        let org_id = decision
            .org_id
            .ok_or_else(|| InviteError::OrgNotResolved(org_slug.to_string()))?;

        let redirect_to = self.redirect_target();
        // The hints ride in both metadata maps so the invited user's session
        // token carries them into /auth/accept.
        let hints = json!({ "org_slug": org_slug, "org_id": org_id });
        let created = self
            .identity
            .create_user(&CreateUserRequest {
                email: email.to_string(),
                user_metadata: hints.clone(),
                app_metadata: hints,
                redirect_to: redirect_to.clone(),
            })
            .await
            .map_err(|e| match e {
                IdentityError::AlreadyRegistered(email) => InviteError::AlreadyRegistered(email),
                other => InviteError::Identity(other),
            })?;

        let email_result = if created.email_dispatched() {
            info!(user_id = %created.id, "identity provider already dispatched the invitation email");
            Ok(())
        } else {
            self.send_fallback_email(email, org_slug, &redirect_to).await
        };

        // The pending profile is recorded whatever happened to the email.
        if let Err(e) = self.store.upsert_profile(&created.id, org_id, false).await {
            warn!(user_id = %created.id, error = %e, "failed to upsert invited profile");
        }

        email_result?;

        info!(user_id = %created.id, org_slug, "invited user");
        Ok(InviteReceipt {
            user_id: created.id,
        })
    }

    async fn send_fallback_email(
        &self,
        email: &str,
        org_slug: &str,
        redirect_to: &str,
    ) -> Result<(), InviteError> {
        let link = self
            .identity
            .generate_invite_link(email, redirect_to)
            .await
            .map_err(InviteError::Identity)?;

        let message = invitation_email(email, org_slug, &link);
        match self.mailer.send(&message).await? {
            EmailOutcome::Sent => {}
            EmailOutcome::Skipped => {
                // Not a failure: the link still exists, it just only lands in
                // the logs.
                warn!(to = %email, invite_link = %link, "email delivery not configured, invite link logged only");
            }
        }
        Ok(())
    }

    /// Reconcile the caller's profile from the organization hints their
    /// session token carries after they accepted an invitation.
    pub async fn accept(&self, user: &AuthUser) -> Result<Acceptance, AcceptError> {
        let metadata = &user.user_metadata;
        let slug_hint = metadata
            .get("org_slug")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut org_id = coerce_org_id(metadata.get("org_id"));
        if org_id.is_none() {
            if let Some(slug) = slug_hint.as_deref() {
                org_id = self
                    .store
                    .find_org_by_slug(slug)
                    .await?
                    .map(|org| org.org_id);
            }
        }
        let Some(org_id) = org_id else {
            return Err(AcceptError::NoOrganization);
        };

        let org_slug = match slug_hint {
            Some(slug) => slug,
            None => self
                .store
                .find_org_by_id(org_id)
                .await?
                .map(|org| org.org_slug)
                .unwrap_or_default(),
        };

        self.store.upsert_profile(&user.id, org_id, true).await?;
        info!(user_id = %user.id, org_id, "accepted invitation");

        Ok(Acceptance { org_id, org_slug })
    }
}

/// Invite metadata may carry the org id as a JSON number or a string.
fn coerce_org_id(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
