//! Admin promotion across the ledger and the external identity store.
//!
//! There is no transaction spanning both systems. The ledger is updated
//! first and the identity store second; if the second step fails the prior
//! role is written back before the error is returned. Profiles deleted in the
//! first step stay deleted.

use serde::Serialize;
use std::sync::Arc;

use super::error::{ServiceError, ServiceResult};
use super::identity::IdentityStore;
use crate::ledger::Ledger;
use crate::models::{Role, User};

#[derive(Debug, Clone, Serialize)]
pub struct Promoted {
    pub user: User,
    pub message: String,
}

#[derive(Clone)]
pub struct PromotionCoordinator {
    ledger: Arc<dyn Ledger>,
    identity: Arc<dyn IdentityStore>,
}

impl PromotionCoordinator {
    pub fn new(ledger: Arc<dyn Ledger>, identity: Arc<dyn IdentityStore>) -> Self {
        Self { ledger, identity }
    }

    /// Promote `target_user_id` to admin. `admin_credential` is the
    /// requesting admin's re-authentication secret and must be present.
    pub async fn promote(
        &self,
        target_user_id: Option<i64>,
        admin_credential: Option<&str>,
    ) -> ServiceResult<Promoted> {
        let target_user_id =
            target_user_id.ok_or_else(|| ServiceError::validation("user_id", "This field is required."))?;
        if admin_credential.is_none_or(|c| c.is_empty()) {
            return Err(ServiceError::validation("admin_password", "This field is required."));
        }

        let target = self
            .ledger
            .find_user(target_user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        if let Err(e) = self.identity.lookup(&target.external_id).await {
            tracing::warn!(user_id = target.id, error = %e, "identity lookup rejected promotion");
            return Err(ServiceError::AuthFailure(e.to_string()));
        }

        let prior_role = target.role;
        let promoted = self
            .ledger
            .promote_to_admin(target.id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;
        tracing::debug!(user_id = target.id, "ledger updated, syncing identity store");

        match self.identity.update_role(&target.external_id, Role::Admin).await {
            Ok(()) => {
                tracing::info!(user_id = target.id, "user promoted to admin");
                Ok(Promoted {
                    message: format!("Successfully promoted {} to admin", promoted.email),
                    user: promoted,
                })
            }
            Err(sync_err) => {
                if let Err(rollback_err) = self.ledger.restore_role(target.id, prior_role).await {
                    tracing::error!(
                        user_id = target.id,
                        sync_error = %sync_err,
                        rollback_error = %rollback_err,
                        prior_role = prior_role.as_str(),
                        "identity sync failed and role rollback failed; ledger still says admin"
                    );
                } else {
                    tracing::error!(
                        user_id = target.id,
                        error = %sync_err,
                        "identity sync failed, role restored"
                    );
                }
                Err(ServiceError::SyncFailure(sync_err.to_string()))
            }
        }
    }
}
