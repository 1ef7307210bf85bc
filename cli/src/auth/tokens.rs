//! Credential and user data types exchanged with the web service.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Display profile attached to a credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub image_url: String,
    pub email_addresses: Vec<String>,
    pub username: Option<String>,
}

/// Session credential issued by the service after a browser login.
///
/// A credential is never edited in place; a new login replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Opaque bearer token.
    pub session_token: String,
    /// Identity the realtime channel delivers commands for.
    pub user_id: String,
    /// Service-side session identifier.
    #[serde(default)]
    pub session_id: String,
    /// Profile captured at login time.
    #[serde(default)]
    pub profile: Profile,
}

impl Credential {
    /// Checks that the credential carries the fields every consumer relies on.
    ///
    /// Applied to freshly acquired credentials and to credentials reloaded
    /// from disk alike.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Decode`] if the token or user id is blank.
    pub fn validate(&self) -> Result<()> {
        if self.session_token.trim().is_empty() {
            return Err(AppError::Decode("credential has no session token".to_string()));
        }
        if self.user_id.trim().is_empty() {
            return Err(AppError::Decode("credential has no user id".to_string()));
        }
        Ok(())
    }

    /// User data derived from the stored profile alone.
    #[must_use]
    pub fn local_user_data(&self) -> UserData {
        UserData {
            username: self.profile.username.clone().unwrap_or_default(),
            profile: self.profile.clone(),
        }
    }
}

/// User data returned by the verification endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserData {
    pub username: String,
    pub profile: Profile,
}

impl UserData {
    /// Fill a missing profile from the one issued with the credential.
    #[must_use]
    pub fn with_fallback_profile(mut self, credential: &Credential) -> Self {
        if self.profile.first_name.is_empty() {
            self.profile = credential.profile.clone();
        }
        self
    }

    /// Name to show for the signed-in user.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if !self.profile.first_name.is_empty() {
            &self.profile.first_name
        } else if !self.username.is_empty() {
            &self.username
        } else if let Some(email) = self.profile.email_addresses.first() {
            email
        } else {
            "Logged in"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> Credential {
        Credential {
            session_token: "tok1".to_string(),
            user_id: "u1".to_string(),
            session_id: "s1".to_string(),
            profile: Profile {
                first_name: "Ada".to_string(),
                ..Profile::default()
            },
        }
    }

    #[test]
    fn decodes_sparse_service_payload() {
        let cred: Credential = serde_json::from_str(
            r#"{"sessionToken":"tok1","userId":"u1","profile":{"firstName":"Ada"}}"#,
        )
        .unwrap();

        assert_eq!(cred.session_token, "tok1");
        assert_eq!(cred.user_id, "u1");
        assert!(cred.session_id.is_empty());
        assert_eq!(cred.profile.first_name, "Ada");
        assert!(cred.profile.username.is_none());
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let json = serde_json::to_value(credential()).unwrap();
        assert_eq!(json["sessionToken"], "tok1");
        assert_eq!(json["profile"]["firstName"], "Ada");
        assert!(json["profile"]["emailAddresses"].is_array());
        assert!(json["profile"].get("imageUrl").is_some());
    }

    #[test]
    fn validate_rejects_blank_fields() {
        assert!(credential().validate().is_ok());

        let mut no_token = credential();
        no_token.session_token = "  ".to_string();
        assert!(matches!(no_token.validate(), Err(AppError::Decode(_))));

        let mut no_user = credential();
        no_user.user_id.clear();
        assert!(no_user.validate().is_err());
    }

    #[test]
    fn fallback_profile_only_when_first_name_missing() {
        let cred = credential();

        let empty = UserData::default().with_fallback_profile(&cred);
        assert_eq!(empty.profile.first_name, "Ada");

        let named = UserData {
            username: "grace".to_string(),
            profile: Profile {
                first_name: "Grace".to_string(),
                ..Profile::default()
            },
        }
        .with_fallback_profile(&cred);
        assert_eq!(named.profile.first_name, "Grace");
    }

    #[test]
    fn display_name_precedence() {
        let mut data = UserData::default();
        assert_eq!(data.display_name(), "Logged in");

        data.profile.email_addresses = vec!["ada@example.com".to_string()];
        assert_eq!(data.display_name(), "ada@example.com");

        data.username = "ada".to_string();
        assert_eq!(data.display_name(), "ada");

        data.profile.first_name = "Ada".to_string();
        assert_eq!(data.display_name(), "Ada");
    }
}
