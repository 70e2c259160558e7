//! User provisioning and profile edits.
//!
//! Users are keyed by the identity provider's subject. The first request that
//! carries an unknown subject creates the account on the free plan.

use trendscout_core::PlanTier;

use crate::error::SearchError;
use crate::model::User;
use crate::store::SearchStore;

/// Domain used for the placeholder address of users who arrive without one.
const PLACEHOLDER_EMAIL_DOMAIN: &str = "users.trendscout.invalid";
const MAX_DISPLAY_NAME_CHARS: usize = 200;

/// Returns the user for `external_id`, creating a free-plan account on first
/// contact.
///
/// # Errors
///
/// - [`SearchError::Validation`] when `external_id` is blank.
/// - [`SearchError::Store`] if the backend fails.
pub async fn provision_user(
    store: &dyn SearchStore,
    external_id: &str,
    email: Option<&str>,
    display_name: Option<&str>,
) -> Result<User, SearchError> {
    let external_id = external_id.trim();
    if external_id.is_empty() {
        return Err(SearchError::Validation(
            "identity subject must not be empty".to_string(),
        ));
    }

    let email = match email.map(str::trim).filter(|e| !e.is_empty()) {
        Some(e) => e.to_string(),
        None => placeholder_email(external_id),
    };
    let display_name = display_name.map(str::trim).filter(|n| !n.is_empty());

    let user = store
        .find_or_create_user(external_id, &email, display_name, PlanTier::Free)
        .await?;
    Ok(user)
}

/// Applies a partial profile edit. Blank values are rejected rather than
/// stored.
///
/// # Errors
///
/// - [`SearchError::Validation`] for an empty or oversized field.
/// - [`SearchError::NotFound`] when the user does not exist.
pub async fn update_profile(
    store: &dyn SearchStore,
    user_id: i64,
    email: Option<&str>,
    display_name: Option<&str>,
) -> Result<User, SearchError> {
    let email = email.map(str::trim);
    if let Some(e) = email {
        if e.is_empty() || !e.contains('@') {
            return Err(SearchError::Validation(
                "email must be a non-empty address".to_string(),
            ));
        }
    }

    let display_name = display_name.map(str::trim);
    if let Some(n) = display_name {
        if n.is_empty() {
            return Err(SearchError::Validation(
                "display_name must not be empty".to_string(),
            ));
        }
        if n.chars().count() > MAX_DISPLAY_NAME_CHARS {
            return Err(SearchError::Validation(format!(
                "display_name must be at most {MAX_DISPLAY_NAME_CHARS} characters"
            )));
        }
    }

    match store.update_profile(user_id, email, display_name).await {
        Ok(user) => Ok(user),
        Err(crate::StoreError::NotFound) => Err(SearchError::NotFound),
        Err(e) => Err(e.into()),
    }
}

/// Moves the user to `plan` with that plan's default quota. Usage in the
/// current period is kept.
///
/// # Errors
///
/// Returns [`SearchError::NotFound`] when the user does not exist.
pub async fn change_plan(
    store: &dyn SearchStore,
    user_id: i64,
    plan: PlanTier,
) -> Result<User, SearchError> {
    match store.set_plan(user_id, plan, plan.default_quota()).await {
        Ok(user) => {
            tracing::info!(user_id, plan = %plan, quota = user.search_quota, "plan changed");
            Ok(user)
        }
        Err(crate::StoreError::NotFound) => Err(SearchError::NotFound),
        Err(e) => Err(e.into()),
    }
}

fn placeholder_email(external_id: &str) -> String {
    let local: String = external_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    format!("{local}@{PLACEHOLDER_EMAIL_DOMAIN}")
}
