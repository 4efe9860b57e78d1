// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use oauth2_types::scope::Scope;
use serde::{Deserialize, Serialize};

use super::{Credential, PendingUser};
use crate::{ValidationError, require_text};

/// The normalized identity a federation adapter (SAML, LDAP, upstream OIDC)
/// hands over after authenticating a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    /// The identity provider the user comes from.
    pub origin: String,

    /// The identifier of the user at that provider.
    pub external_id: String,

    pub username: String,
    pub email: Option<String>,
    pub given_name: String,
    pub family_name: String,
}

/// Providers don't always release an email address. Derive a stable,
/// non-routable placeholder from the username in that case.
fn email_or_placeholder(email: Option<String>, username: &str, origin: &str) -> String {
    if let Some(email) = email.filter(|email| !email.trim().is_empty()) {
        return email;
    }

    match username.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
        {
            username.to_owned()
        }
        _ => format!("{}@user.from.{origin}.cf", username.replace('@', "")),
    }
}

impl ExternalIdentity {
    /// Normalize into a pending user. The user authenticates with the
    /// provider, so the record gets a delegated credential.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the first empty required field.
    pub fn normalize(self, authorities: Scope) -> Result<PendingUser, ValidationError> {
        require_text("origin", &self.origin)?;
        require_text("external_id", &self.external_id)?;
        require_text("username", &self.username)?;

        let email = email_or_placeholder(self.email, &self.username, &self.origin);
        let mut pending = PendingUser::new(
            self.username,
            Credential::Delegated {
                origin: self.origin,
            },
            email,
            self.given_name,
            self.family_name,
            authorities,
        )?;
        pending.external_id = Some(self.external_id);
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> ExternalIdentity {
        ExternalIdentity {
            origin: "ldap".to_owned(),
            external_id: "cn=joe,ou=people".to_owned(),
            username: "joe".to_owned(),
            email: Some("joe@corp.example".to_owned()),
            given_name: "Joe".to_owned(),
            family_name: "Smith".to_owned(),
        }
    }

    #[test]
    fn normalizes_to_delegated_pending_user() {
        let pending = identity().normalize(Scope::default()).unwrap();
        assert_eq!(pending.origin, "ldap");
        assert_eq!(pending.external_id.as_deref(), Some("cn=joe,ou=people"));
        assert_eq!(
            pending.credential,
            Credential::Delegated {
                origin: "ldap".to_owned()
            }
        );
        assert_eq!(pending.email, "joe@corp.example");
    }

    #[test]
    fn missing_email_gets_a_placeholder() {
        let pending = ExternalIdentity {
            email: None,
            ..identity()
        }
        .normalize(Scope::default())
        .unwrap();
        assert_eq!(pending.email, "joe@user.from.ldap.cf");

        let pending = ExternalIdentity {
            email: Some(String::new()),
            username: "joe@corp.example".to_owned(),
            ..identity()
        }
        .normalize(Scope::default())
        .unwrap();
        assert_eq!(pending.email, "joe@corp.example");

        let pending = ExternalIdentity {
            email: None,
            username: "@joe".to_owned(),
            ..identity()
        }
        .normalize(Scope::default())
        .unwrap();
        assert_eq!(pending.email, "joe@user.from.ldap.cf");
    }

    #[test]
    fn same_invariants_as_local_users() {
        let err = ExternalIdentity {
            family_name: " ".to_owned(),
            ..identity()
        }
        .normalize(Scope::default())
        .unwrap_err();
        assert_eq!(err, ValidationError::empty("family_name"));

        let err = ExternalIdentity {
            username: String::new(),
            ..identity()
        }
        .normalize(Scope::default())
        .unwrap_err();
        assert_eq!(err, ValidationError::empty("username"));
    }
}
