// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Error types returned by the authorization core, as they appear on the
//! wire.

use std::{borrow::Cow, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// A client error returned by an authorization server.
///
/// To construct this with a default description for the error code, use its
/// `From<ClientErrorCode>` implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientError {
    /// The error code.
    pub error: ClientErrorCode,

    /// A human-readable description of the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<Cow<'static, str>>,

    /// The status code a transport should answer with.
    pub status: u16,
}

impl ClientError {
    /// Creates a new `ClientError` with the given error code and description.
    #[must_use]
    pub const fn new(error: ClientErrorCode, error_description: &'static str) -> Self {
        Self {
            error,
            error_description: Some(Cow::Borrowed(error_description)),
            status: error.default_status(),
        }
    }

    /// Changes the description of this `ClientError` with the given `String`.
    #[must_use]
    pub fn with_description(mut self, description: String) -> Self {
        self.error_description = Some(Cow::Owned(description));
        self
    }
}

impl From<ClientErrorCode> for ClientError {
    fn from(error: ClientErrorCode) -> Self {
        let desc = error.default_description();
        Self::new(error, desc)
    }
}

/// Client error codes.
///
/// The OAuth 2.0 codes come from [RFC 6749] and [RFC 6750]. The others are
/// returned by the administrative operations of the core.
///
/// [RFC 6749]: https://www.rfc-editor.org/rfc/rfc6749#section-5.2
/// [RFC 6750]: https://www.rfc-editor.org/rfc/rfc6750#section-3.1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientErrorCode {
    /// `invalid_request`
    ///
    /// The request is missing a required parameter, or a value failed
    /// validation.
    InvalidRequest,

    /// `invalid_client`
    ///
    /// Client authentication failed, the client is unknown, or it is not
    /// allowed to use the requested grant.
    InvalidClient,

    /// `invalid_grant`
    ///
    /// The provided authorization grant or refresh token is invalid, expired,
    /// revoked or was already used, or the resource owner credentials are
    /// wrong.
    InvalidGrant,

    /// `invalid_scope`
    ///
    /// The requested scope is invalid, unknown, or exceeds the scope allowed
    /// to the client.
    InvalidScope,

    /// `invalid_token`
    ///
    /// The access token provided is expired, revoked or malformed.
    InvalidToken,

    /// `access_denied`
    ///
    /// The operation is disabled by the server policy.
    AccessDenied,

    /// `zone_not_found`
    ///
    /// No identity zone exists with this identifier.
    ZoneNotFound,

    /// `zone_conflict`
    ///
    /// An identity zone already uses this subdomain.
    ZoneConflict,

    /// `user_not_found`
    ///
    /// No user exists with this identifier in the zone.
    UserNotFound,

    /// `user_conflict`
    ///
    /// The user record was already persisted, or its username is taken.
    UserConflict,

    /// `client_not_found`
    ///
    /// No client is registered with this identifier in the zone.
    ClientNotFound,

    /// `client_conflict`
    ///
    /// A client is already registered with this identifier in the zone.
    ClientConflict,

    /// `server_error`
    ///
    /// The server encountered an unexpected condition.
    ServerError,
}

impl ClientErrorCode {
    /// The string representation of this code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::InvalidScope => "invalid_scope",
            Self::InvalidToken => "invalid_token",
            Self::AccessDenied => "access_denied",
            Self::ZoneNotFound => "zone_not_found",
            Self::ZoneConflict => "zone_conflict",
            Self::UserNotFound => "user_not_found",
            Self::UserConflict => "user_conflict",
            Self::ClientNotFound => "client_not_found",
            Self::ClientConflict => "client_conflict",
            Self::ServerError => "server_error",
        }
    }

    /// Get the default description for this `ClientErrorCode`.
    #[must_use]
    pub const fn default_description(self) -> &'static str {
        match self {
            Self::InvalidRequest => "The request is invalid.",
            Self::InvalidClient => "Client authentication failed.",
            Self::InvalidGrant => {
                "The provided access grant is invalid, expired, or revoked \
                 (e.g. invalid assertion, expired authorization token, bad \
                 end-user password credentials, or mismatching authorization \
                 code and redirection URI)."
            }
            Self::InvalidScope => "The requested scope is invalid, unknown, or malformed.",
            Self::InvalidToken => "The access token is invalid.",
            Self::AccessDenied => "The operation is not allowed.",
            Self::ZoneNotFound => "Identity zone not found",
            Self::ZoneConflict => "The identity zone subdomain is already taken.",
            Self::UserNotFound => "User not found",
            Self::UserConflict => "The user already exists.",
            Self::ClientNotFound => "Client not found",
            Self::ClientConflict => "The client already exists.",
            Self::ServerError => {
                "The server encountered an unexpected condition that prevented it \
                 from fulfilling the request."
            }
        }
    }

    /// The status code a transport should answer with for this error.
    #[must_use]
    pub const fn default_status(self) -> u16 {
        match self {
            Self::InvalidRequest | Self::InvalidGrant | Self::InvalidScope => 400,
            Self::InvalidClient | Self::InvalidToken => 401,
            Self::AccessDenied => 403,
            Self::ZoneNotFound | Self::UserNotFound | Self::ClientNotFound => 404,
            Self::ZoneConflict | Self::UserConflict | Self::ClientConflict => 409,
            Self::ServerError => 500,
        }
    }
}

impl fmt::Display for ClientErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error returned when parsing an unknown error code.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown error code {0:?}")]
pub struct UnknownErrorCode(String);

impl FromStr for ClientErrorCode {
    type Err = UnknownErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = match s {
            "invalid_request" => Self::InvalidRequest,
            "invalid_client" => Self::InvalidClient,
            "invalid_grant" => Self::InvalidGrant,
            "invalid_scope" => Self::InvalidScope,
            "invalid_token" => Self::InvalidToken,
            "access_denied" => Self::AccessDenied,
            "zone_not_found" => Self::ZoneNotFound,
            "zone_conflict" => Self::ZoneConflict,
            "user_not_found" => Self::UserNotFound,
            "user_conflict" => Self::UserConflict,
            "client_not_found" => Self::ClientNotFound,
            "client_conflict" => Self::ClientConflict,
            "server_error" => Self::ServerError,
            other => return Err(UnknownErrorCode(other.to_owned())),
        };

        Ok(code)
    }
}
