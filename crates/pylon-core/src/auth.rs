//! Facts written back onto a request by the authentication step.

use serde::{Deserialize, Serialize};

/// Identity of an authenticated end user, extracted from a verified token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Subject id.
    pub id: String,
    /// Email, if the token carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Consumer id, if the token carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer_id: Option<String>,
    /// Token issuer.
    pub issuer: String,
    /// Audiences the token was issued for.
    #[serde(default)]
    pub audiences: Vec<String>,
    /// Authorized party (`azp` claim).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorized_party: Option<String>,
    /// Raw claims JSON, passed through to the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<String>,
}

/// Authentication facts recorded on a request.
///
/// Starts as [`AuthState::Pending`]. Each write moves it to
/// [`AuthState::Authenticated`] and replaces the field it targets, so the
/// last writer wins.
///
/// # Example
///
/// ```
/// use pylon_core::{AuthState, UserInfo};
///
/// let mut state = AuthState::default();
/// state.set_auth_token("first");
/// state.set_auth_token("second");
/// assert_eq!(state.auth_token(), Some("second"));
/// assert!(state.user_info().is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    /// Nothing has been written yet.
    #[default]
    Pending,
    /// At least one authentication fact has been written.
    Authenticated {
        /// Verified user identity.
        user_info: Option<UserInfo>,
        /// Raw auth token as presented by the caller.
        token: Option<String>,
    },
}

impl AuthState {
    /// Records the verified user identity, replacing any earlier value.
    pub fn set_user_info(&mut self, info: UserInfo) {
        match self {
            Self::Pending => {
                *self = Self::Authenticated {
                    user_info: Some(info),
                    token: None,
                };
            }
            Self::Authenticated { user_info, .. } => {
                if user_info.is_some() {
                    tracing::debug!(user_id = %info.id, "user info overwritten");
                }
                *user_info = Some(info);
            }
        }
    }

    /// Records the raw auth token, replacing any earlier value.
    pub fn set_auth_token(&mut self, auth_token: impl Into<String>) {
        let auth_token = auth_token.into();
        match self {
            Self::Pending => {
                *self = Self::Authenticated {
                    user_info: None,
                    token: Some(auth_token),
                };
            }
            Self::Authenticated { token, .. } => {
                if token.is_some() {
                    tracing::debug!("auth token overwritten");
                }
                *token = Some(auth_token);
            }
        }
    }

    /// Returns the recorded user identity.
    #[must_use]
    pub fn user_info(&self) -> Option<&UserInfo> {
        match self {
            Self::Authenticated { user_info, .. } => user_info.as_ref(),
            Self::Pending => None,
        }
    }

    /// Returns the recorded auth token.
    #[must_use]
    pub fn auth_token(&self) -> Option<&str> {
        match self {
            Self::Authenticated { token, .. } => token.as_deref(),
            Self::Pending => None,
        }
    }

    /// Returns true once any fact has been written.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}
