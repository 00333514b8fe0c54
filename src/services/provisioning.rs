//! Per-request onboarding decision for an authenticated visitor.
//!
//! Every authenticated request lands in exactly one [`ProvisioningState`]:
//!
//! ```text
//!   no record ──create──▶ incomplete ──signup──▶ complete
//! ```
//!
//! Records are created lazily on the first landing visit and mutated only by a
//! signup submission. The store's unique index on `external_id` is the only
//! guard against concurrent first visits; a lost race is resolved by re-reading.

use crate::models::{NewUser, User, UserProfile};
use crate::services::session::IdentityClaims;
use crate::services::user_store::UserStore;
use crate::utils::AppError;

pub const MAX_PAYOUT_DETAIL_LEN: usize = 254;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningState {
    AuthenticatedNoRecord,
    AuthenticatedIncomplete,
    AuthenticatedComplete,
}

/// Classifies an authenticated visitor by their stored record. Anonymous visitors
/// never get here: `RequireSession` redirects them to `/login`.
pub fn classify(user: Option<&User>) -> ProvisioningState {
    match user {
        None => ProvisioningState::AuthenticatedNoRecord,
        Some(user) if user.is_onboarded() => ProvisioningState::AuthenticatedComplete,
        Some(_) => ProvisioningState::AuthenticatedIncomplete,
    }
}

/// Where the landing route sends the visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandingTarget {
    Signup,
    Profile,
}

impl LandingTarget {
    pub fn path(self) -> &'static str {
        match self {
            LandingTarget::Signup => "/signup",
            LandingTarget::Profile => "/profile",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileOutcome {
    Found(UserProfile),
    /// The session outlived its record; a fresh one was provisioned and still needs signup.
    Reprovisioned,
}

/// Runs the landing decision, creating the record on a first visit.
pub async fn resolve_landing(
    store: &dyn UserStore,
    claims: &IdentityClaims,
) -> Result<LandingTarget, AppError> {
    let existing = store.find_by_external_id(&claims.external_id).await?;

    let user = match classify(existing.as_ref()) {
        ProvisioningState::AuthenticatedNoRecord => {
            log::info!("🆕 Provisioning user {}", claims.external_id);
            provision(store, claims).await?
        }
        _ => existing.ok_or_else(|| AppError::Store("lookup result vanished".to_string()))?,
    };

    Ok(match classify(Some(&user)) {
        ProvisioningState::AuthenticatedComplete => LandingTarget::Profile,
        _ => LandingTarget::Signup,
    })
}

/// Stores a validated payout detail for the visitor and returns the updated record.
pub async fn complete_signup(
    store: &dyn UserStore,
    claims: &IdentityClaims,
    raw_payout_detail: &str,
) -> Result<User, AppError> {
    let payout_detail = validate_payout_detail(raw_payout_detail)?;

    if let Some(user) = store
        .update_payout_detail(&claims.external_id, payout_detail)
        .await?
    {
        return Ok(user);
    }

    log::warn!(
        "⚠️ No record for {} at signup, re-provisioning",
        claims.external_id
    );
    provision(store, claims).await?;

    store
        .update_payout_detail(&claims.external_id, payout_detail)
        .await?
        .ok_or_else(|| {
            AppError::Store(format!(
                "record for {} missing right after provisioning",
                claims.external_id
            ))
        })
}

/// Loads the profile projection, re-provisioning the record if it disappeared.
pub async fn load_profile(
    store: &dyn UserStore,
    claims: &IdentityClaims,
) -> Result<ProfileOutcome, AppError> {
    match store.find_by_external_id(&claims.external_id).await? {
        Some(user) => Ok(ProfileOutcome::Found(UserProfile::from(&user))),
        None => {
            log::warn!(
                "⚠️ Session for {} has no record, re-provisioning",
                claims.external_id
            );
            provision(store, claims).await?;
            Ok(ProfileOutcome::Reprovisioned)
        }
    }
}

/// Creates the record for the claim. A conflict means another request created it
/// first, so the existing row is returned instead.
async fn provision(store: &dyn UserStore, claims: &IdentityClaims) -> Result<User, AppError> {
    let new_user = NewUser {
        external_id: claims.external_id.clone(),
        email: claims.email.clone(),
    };

    match store.create(new_user).await {
        Ok(user) => Ok(user),
        Err(AppError::Conflict(_)) => {
            log::info!(
                "🔁 Concurrent provisioning for {}, re-reading",
                claims.external_id
            );
            store
                .find_by_external_id(&claims.external_id)
                .await?
                .ok_or_else(|| {
                    AppError::Store(format!(
                        "conflicting record for {} not found on re-read",
                        claims.external_id
                    ))
                })
        }
        Err(e) => Err(e),
    }
}

/// Trims the submitted payout detail and rejects values that cannot be a
/// payout receiver (email, phone number or account id).
pub fn validate_payout_detail(raw: &str) -> Result<&str, AppError> {
    let value = raw.trim();

    if value.is_empty() {
        return Err(AppError::InvalidRequest(
            "payout detail is required".to_string(),
        ));
    }
    if value.chars().count() > MAX_PAYOUT_DETAIL_LEN {
        return Err(AppError::InvalidRequest(format!(
            "payout detail must be at most {} characters",
            MAX_PAYOUT_DETAIL_LEN
        )));
    }
    if value.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(AppError::InvalidRequest(
            "payout detail must not contain whitespace or control characters".to_string(),
        ));
    }

    Ok(value)
}
