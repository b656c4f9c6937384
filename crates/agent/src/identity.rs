//! Identity extraction after login.
//!
//! The portal's session token carries the user's personal code and first
//! name. The token is only decoded here, never verified: the portal is the
//! party that validates it on every request. When the token lacks the
//! claims, the identity endpoint is queried instead.

use datawatch_core::error::CoreError;
use datawatch_core::session::IdentityClaims;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::error::AgentError;
use crate::transport::Transport;

/// Claim and field names used by both the token and the identity document.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityDocument {
    #[serde(default)]
    personal_code: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
}

impl IdentityDocument {
    fn into_claims(self) -> IdentityClaims {
        IdentityClaims::from_raw(
            self.personal_code.as_deref().unwrap_or_default(),
            self.first_name.as_deref().unwrap_or_default(),
        )
    }
}

/// Decode identity claims from a session token without checking its
/// signature or expiry.
pub fn claims_from_jwt(token: &str) -> Result<IdentityClaims, CoreError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<IdentityDocument>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| CoreError::InvalidToken(e.to_string()))?;
    Ok(data.claims.into_claims())
}

/// Parse the identity endpoint's JSON document.
pub fn parse_identity(body: &str) -> Result<IdentityClaims, CoreError> {
    serde_json::from_str::<IdentityDocument>(body)
        .map(IdentityDocument::into_claims)
        .map_err(|e| CoreError::Validation(format!("identity document: {e}")))
}

/// Query the identity endpoint with the stored session.
pub async fn fetch_identity(
    transport: &dyn Transport,
    url: &str,
) -> Result<IdentityClaims, AgentError> {
    let response = transport.get(url).await?;
    if !response.is_ok() {
        return Err(AgentError::IdentityStatus(response.status));
    }
    Ok(parse_identity(&response.body)?)
}

/// Identity for a fresh session: token claims first, the endpoint as a
/// fallback when the token carries no personal code.
///
/// The caller must have stored the session credentials before calling, so
/// the endpoint request is authenticated.
pub async fn resolve_identity(
    token: &str,
    transport: &dyn Transport,
    identity_url: &str,
) -> Result<IdentityClaims, AgentError> {
    match claims_from_jwt(token) {
        Ok(claims) if !claims.personal_code.is_empty() => return Ok(claims),
        Ok(_) => {
            tracing::info!("Session token has no personal code, querying identity endpoint")
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not decode session token, querying identity endpoint")
        }
    }

    let claims = fetch_identity(transport, identity_url).await?;
    if claims.personal_code.is_empty() {
        tracing::warn!("Identity endpoint returned no personal code; self-filtering disabled");
    }
    Ok(claims)
}
