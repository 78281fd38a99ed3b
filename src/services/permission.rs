use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::middleware::AuthUser;
use crate::store::{Profile, StoreError, TableStore};

/// What happens when a profile bound to one organization asks to act on
/// another. Development keeps the permissive behavior the product started
/// with; production denies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrgMismatchPolicy {
    Permissive,
    Strict,
}

/// Outcome of a permission check. `org_id` is deliberately withheld on
/// superuser-requirement checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authorization {
    pub allowed: bool,
    pub org_id: Option<i64>,
}

impl Authorization {
    pub fn granted(org_id: i64) -> Self {
        Self {
            allowed: true,
            org_id: Some(org_id),
        }
    }

    pub fn denied() -> Self {
        Self {
            allowed: false,
            org_id: None,
        }
    }
}

/// Decides whether a user may act on an organization, lazily provisioning
/// the organization and the user's profile along the way.
#[derive(Clone)]
pub struct PermissionService {
    store: Arc<dyn TableStore>,
    policy: OrgMismatchPolicy,
}

impl PermissionService {
    pub fn new(store: Arc<dyn TableStore>, policy: OrgMismatchPolicy) -> Self {
        Self { store, policy }
    }

    /// Check whether `user` may act on the organization named by `org_slug`.
    ///
    /// Never fails: store errors inside the check are logged and collapse to
    /// a denial.
    pub async fn authorize(
        &self,
        user: &AuthUser,
        org_slug: &str,
        require_superuser: bool,
    ) -> Authorization {
        match self.try_authorize(user, org_slug, require_superuser).await {
            Ok(decision) => decision,
            Err(e) => {
                error!(user_id = %user.id, org_slug, error = %e, "permission check failed");
                Authorization::denied()
            }
        }
    }

    async fn try_authorize(
        &self,
        user: &AuthUser,
        org_slug: &str,
        require_superuser: bool,
    ) -> Result<Authorization, StoreError> {
        let org_id = match self.store.find_org_by_slug(org_slug).await? {
            Some(org) => org.org_id,
            None => {
                debug!(org_slug, "organization not found, creating it");
                match self.store.insert_org(org_slug).await {
                    Ok(org) => org.org_id,
                    Err(e) => {
                        error!(org_slug, error = %e, "failed to create organization");
                        return Ok(Authorization::denied());
                    }
                }
            }
        };

        let Some(profile) = self.store.find_profile(&user.id).await? else {
            // First sighting of this user: bind them to the queried org and
            // grant access.
            debug!(user_id = %user.id, org_id, "no profile yet, creating one");
            let fresh = Profile {
                id: user.id.clone(),
                org_id: Some(org_id),
                is_activated: true,
                is_superuser: false,
            };
            return match self.store.insert_profile(&fresh).await {
                Ok(()) => Ok(Authorization::granted(org_id)),
                Err(e) => {
                    error!(user_id = %user.id, error = %e, "failed to create profile");
                    Ok(Authorization::denied())
                }
            };
        };

        if require_superuser {
            return Ok(Authorization {
                allowed: profile.is_superuser,
                org_id: None,
            });
        }

        if profile.is_superuser {
            return Ok(Authorization::granted(org_id));
        }

        match profile.org_id {
            None => {
                // Grant proceeds even when the binding write fails.
                if let Err(e) = self.store.update_profile_org(&user.id, org_id).await {
                    warn!(user_id = %user.id, org_id, error = %e, "failed to bind profile to organization");
                }
                Ok(Authorization::granted(org_id))
            }
            Some(current) if current == org_id => Ok(Authorization::granted(org_id)),
            Some(current) => {
                warn!(
                    user_id = %user.id,
                    profile_org = current,
                    requested_org = org_id,
                    "profile belongs to a different organization"
                );
                match self.policy {
                    OrgMismatchPolicy::Permissive => Ok(Authorization::granted(org_id)),
                    OrgMismatchPolicy::Strict => Ok(Authorization::denied()),
                }
            }
        }
    }
}
