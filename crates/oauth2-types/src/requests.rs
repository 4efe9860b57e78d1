// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Requests and response types to interact with the [OAuth 2.0]
//! specification.
//!
//! [OAuth 2.0]: https://oauth.net/2/

use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, TimestampSeconds, serde_as, skip_serializing_none};
use thiserror::Error;
use url::Url;

use crate::{pkce::PkceCodeChallengeMethod, scope::Scope};

// ----- Grant types -----

/// An OAuth 2.0 grant type a client can be allowed to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// [`authorization_code`](https://www.rfc-editor.org/rfc/rfc6749#section-4.1)
    AuthorizationCode,

    /// [`implicit`](https://www.rfc-editor.org/rfc/rfc6749#section-4.2)
    Implicit,

    /// [`password`](https://www.rfc-editor.org/rfc/rfc6749#section-4.3)
    Password,

    /// [`client_credentials`](https://www.rfc-editor.org/rfc/rfc6749#section-4.4)
    ClientCredentials,

    /// [`refresh_token`](https://www.rfc-editor.org/rfc/rfc6749#section-6)
    RefreshToken,
}

impl GrantType {
    /// The string representation of this grant type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::Implicit => "implicit",
            Self::Password => "password",
            Self::ClientCredentials => "client_credentials",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error returned when parsing an unknown grant type.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported grant type {0:?}")]
pub struct UnknownGrantType(String);

impl FromStr for GrantType {
    type Err = UnknownGrantType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "implicit" => Ok(Self::Implicit),
            "password" => Ok(Self::Password),
            "client_credentials" => Ok(Self::ClientCredentials),
            "refresh_token" => Ok(Self::RefreshToken),
            other => Err(UnknownGrantType(other.to_owned())),
        }
    }
}

// ----- Authorization endpoint -----

/// The response type requested at the authorization endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// An authorization code, for the `authorization_code` grant.
    Code,

    /// An access token returned directly, for the `implicit` grant.
    Token,
}

/// The parameters of a request to the authorization endpoint, once the end
/// user is authenticated.
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    /// What the client expects back.
    pub response_type: ResponseType,

    /// The ID of the client making the request.
    pub client_id: String,

    /// The URI the response should be delivered to. May be omitted when the
    /// client has a single registered redirect URI.
    pub redirect_uri: Option<Url>,

    /// The scope being requested.
    pub scope: Option<Scope>,

    /// An opaque value the client gets back with the response.
    pub state: Option<String>,

    /// The PKCE code challenge.
    pub code_challenge: Option<String>,

    /// The method used to derive the PKCE code challenge. Defaults to
    /// `plain` when a challenge is given without a method.
    pub code_challenge_method: Option<PkceCodeChallengeMethod>,
}

/// The response of the authorization endpoint for the `code` response type.
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationResponse {
    /// The authorization code to redeem at the token endpoint.
    pub code: String,

    /// The `state` parameter of the request, echoed back.
    pub state: Option<String>,
}

// ----- Token endpoint -----

/// The type of an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OAuthAccessTokenType {
    /// A [bearer token](https://www.rfc-editor.org/rfc/rfc6750).
    #[serde(rename = "bearer")]
    Bearer,
}

/// A request for an access token with an [authorization code].
///
/// [authorization code]: https://www.rfc-editor.org/rfc/rfc6749#section-4.1.3
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AuthorizationCodeGrant {
    /// The authorization code that was returned from the authorization
    /// endpoint.
    pub code: String,

    /// The `redirect_uri` that was included in the authorization request.
    ///
    /// This field must match exactly the value passed to the authorization
    /// endpoint.
    pub redirect_uri: Option<Url>,

    /// The code verifier that matches the code challenge that was sent to the
    /// authorization endpoint.
    pub code_verifier: Option<String>,
}

impl fmt::Debug for AuthorizationCodeGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationCodeGrant")
            .field("redirect_uri", &self.redirect_uri)
            .finish_non_exhaustive()
    }
}

/// A request for an access token with the [resource owner password
/// credentials].
///
/// [resource owner password credentials]: https://www.rfc-editor.org/rfc/rfc6749#section-4.3.2
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PasswordGrant {
    /// The resource owner username.
    pub username: String,

    /// The resource owner password.
    pub password: String,

    /// The scope of the access request.
    pub scope: Option<Scope>,
}

impl fmt::Debug for PasswordGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordGrant")
            .field("username", &self.username)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// A request for an access token with [client credentials].
///
/// [client credentials]: https://www.rfc-editor.org/rfc/rfc6749#section-4.4.2
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentialsGrant {
    /// The scope of the access request.
    pub scope: Option<Scope>,
}

/// A request for a new access token with a [refresh token].
///
/// [refresh token]: https://www.rfc-editor.org/rfc/rfc6749#section-6
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RefreshTokenGrant {
    /// The refresh token issued to the client.
    pub refresh_token: String,

    /// The scope of the access request.
    ///
    /// The requested scope must not include any scope not originally granted
    /// by the resource owner, and if omitted is treated as equal to the scope
    /// originally granted by the resource owner.
    pub scope: Option<Scope>,
}

impl fmt::Debug for RefreshTokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshTokenGrant")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// An request for an access token, tagged by its grant type.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum AccessTokenRequest {
    /// A request in the Authorization Code flow.
    AuthorizationCode(AuthorizationCodeGrant),

    /// A request with the resource owner password.
    Password(PasswordGrant),

    /// A request in the Client Credentials flow.
    ClientCredentials(ClientCredentialsGrant),

    /// A request to get a new access token with a refresh token.
    RefreshToken(RefreshTokenGrant),
}

impl AccessTokenRequest {
    /// The grant type of this request.
    #[must_use]
    pub const fn grant_type(&self) -> GrantType {
        match self {
            Self::AuthorizationCode(_) => GrantType::AuthorizationCode,
            Self::Password(_) => GrantType::Password,
            Self::ClientCredentials(_) => GrantType::ClientCredentials,
            Self::RefreshToken(_) => GrantType::RefreshToken,
        }
    }
}

/// A successful response from the [token endpoint].
///
/// [token endpoint]: https://www.rfc-editor.org/rfc/rfc6749#section-5.1
#[serde_as]
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AccessTokenResponse {
    /// The access token to access the requested scope.
    pub access_token: String,

    /// The type of the access token.
    pub token_type: OAuthAccessTokenType,

    /// The duration for which the access token is valid.
    #[serde_as(as = "Option<DurationSeconds<i64>>")]
    pub expires_in: Option<Duration>,

    /// The token to refresh the access token when it expires.
    pub refresh_token: Option<String>,

    /// The scope of the access token.
    pub scope: Option<Scope>,
}

impl AccessTokenResponse {
    /// Creates a new `AccessTokenResponse` with the given access token.
    #[must_use]
    pub fn new(access_token: String) -> AccessTokenResponse {
        AccessTokenResponse {
            access_token,
            token_type: OAuthAccessTokenType::Bearer,
            expires_in: None,
            refresh_token: None,
            scope: None,
        }
    }

    /// Adds a refresh token to an `AccessTokenResponse`.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: String) -> Self {
        self.refresh_token = Some(refresh_token);
        self
    }

    /// Adds an expiration duration to an `AccessTokenResponse`.
    #[must_use]
    pub fn with_expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = Some(expires_in);
        self
    }

    /// Adds a scope to an `AccessTokenResponse`.
    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }
}

impl fmt::Debug for AccessTokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessTokenResponse")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

// ----- Introspection -----

/// A response from the [introspection endpoint].
///
/// [introspection endpoint]: https://www.rfc-editor.org/rfc/rfc7662#section-2.2
#[serde_as]
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct IntrospectionResponse {
    /// Whether or not the presented token is currently active.
    pub active: bool,

    /// The scope associated with the token.
    pub scope: Option<Scope>,

    /// The ID of the client for which the token was issued.
    pub client_id: Option<String>,

    /// The subject of the token.
    pub sub: Option<String>,

    /// The identity zone the token belongs to.
    pub zid: Option<String>,

    /// Timestamp indicating when the token was issued.
    #[serde_as(as = "Option<TimestampSeconds>")]
    pub iat: Option<DateTime<Utc>>,

    /// Timestamp indicating when the token will expire.
    #[serde_as(as = "Option<TimestampSeconds>")]
    pub exp: Option<DateTime<Utc>>,
}

impl IntrospectionResponse {
    /// The response for a token which is not active, for whatever reason.
    #[must_use]
    pub fn inactive() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_utils::assert_json_shape;

    #[test]
    fn serde_password_grant() {
        let req = AccessTokenRequest::Password(PasswordGrant {
            username: "marissa".to_owned(),
            password: "koala".to_owned(),
            scope: Some("openid read".parse().unwrap()),
        });

        assert_json_shape(
            &req,
            json!({
                "grant_type": "password",
                "username": "marissa",
                "password": "koala",
                "scope": "openid read",
            }),
        );
        assert_eq!(req.grant_type(), GrantType::Password);
    }

    #[test]
    fn serde_client_credentials_grant() {
        let req = AccessTokenRequest::ClientCredentials(ClientCredentialsGrant { scope: None });

        assert_json_shape(&req, json!({ "grant_type": "client_credentials" }));
    }

    #[test]
    fn serde_authorization_code_grant() {
        let req = AccessTokenRequest::AuthorizationCode(AuthorizationCodeGrant {
            code: "abc123".to_owned(),
            redirect_uri: Some("https://example.com/callback".parse().unwrap()),
            code_verifier: None,
        });

        assert_json_shape(
            &req,
            json!({
                "grant_type": "authorization_code",
                "code": "abc123",
                "redirect_uri": "https://example.com/callback",
            }),
        );
    }

    #[test]
    fn secrets_are_not_debug_printed() {
        let req = PasswordGrant {
            username: "marissa".to_owned(),
            password: "hunter2".to_owned(),
            scope: None,
        };
        assert!(!format!("{req:?}").contains("hunter2"));

        let req = RefreshTokenGrant {
            refresh_token: "some.refresh.token".to_owned(),
            scope: None,
        };
        assert!(!format!("{req:?}").contains("some.refresh.token"));

        let resp = AccessTokenResponse::new("some.access.token".to_owned())
            .with_refresh_token("some.refresh.token".to_owned());
        let debug = format!("{resp:?}");
        assert!(!debug.contains("some.access.token"));
        assert!(!debug.contains("some.refresh.token"));
    }

    #[test]
    fn token_response_shape() {
        let resp = AccessTokenResponse::new("access".to_owned())
            .with_refresh_token("refresh".to_owned())
            .with_expires_in(Duration::seconds(3600))
            .with_scope("read write".parse().unwrap());

        insta::assert_json_snapshot!(resp, @r###"
        {
          "access_token": "access",
          "token_type": "bearer",
          "expires_in": 3600,
          "refresh_token": "refresh",
          "scope": "read write"
        }
        "###);
    }

    #[test]
    fn inactive_introspection_is_minimal() {
        assert_json_shape(&IntrospectionResponse::inactive(), json!({ "active": false }));
    }

    #[test]
    fn grant_type_strings() {
        for grant in [
            GrantType::AuthorizationCode,
            GrantType::Implicit,
            GrantType::Password,
            GrantType::ClientCredentials,
            GrantType::RefreshToken,
        ] {
            assert_eq!(grant.as_str().parse(), Ok(grant));
            assert_eq!(serde_json::to_value(grant).unwrap(), json!(grant.as_str()));
        }

        assert!("urn:ietf:params:oauth:grant-type:device_code"
            .parse::<GrantType>()
            .is_err());
    }
}
