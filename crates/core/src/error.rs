// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use oauth2_types::errors::{ClientError, ClientErrorCode};
use thiserror::Error;
use uaa_data_model::{AlreadyPersistedError, InvalidRedirectUriError, ValidationError};
use uaa_storage::RepositoryError;

use crate::credentials::VerifierError;

/// Errors returned by the services of the core.
///
/// The `Display` output never contains a secret, so that errors can be logged
/// as they are.
#[derive(Debug, Error)]
pub enum Error {
    #[error("identity zone not found")]
    ZoneNotFound,

    #[error("identity zone subdomain already taken")]
    ZoneConflict,

    #[error("identity zones cannot be deleted")]
    ZoneDeletionDisabled,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    AlreadyPersisted(#[from] AlreadyPersistedError),

    #[error("user not found")]
    UserNotFound,

    #[error("username already taken")]
    UserConflict,

    #[error("client not found")]
    ClientMetadataNotFound,

    #[error("client ID already taken")]
    ClientConflict,

    #[error("invalid client")]
    InvalidClient,

    #[error("invalid client credentials")]
    InvalidClientCredentials,

    #[error("invalid grant")]
    InvalidGrant,

    #[error("invalid scope")]
    InvalidScope,

    #[error(transparent)]
    InvalidRedirectUri(#[from] InvalidRedirectUriError),

    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),

    #[error("token expired")]
    TokenExpired,

    #[error("token revoked")]
    TokenRevoked,

    #[error("token malformed")]
    TokenMalformed,

    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync + 'static>),
}

/// The kind of an [`Error`], without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ZoneNotFound,
    ZoneConflict,
    ZoneDeletionDisabled,
    ValidationError,
    AlreadyPersisted,
    UserNotFound,
    UserConflict,
    ClientMetadataNotFound,
    ClientConflict,
    InvalidClient,
    InvalidClientCredentials,
    InvalidGrant,
    InvalidScope,
    InvalidRequest,
    TokenExpired,
    TokenRevoked,
    TokenMalformed,
    Internal,
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ZoneNotFound => ErrorKind::ZoneNotFound,
            Self::ZoneConflict => ErrorKind::ZoneConflict,
            Self::ZoneDeletionDisabled => ErrorKind::ZoneDeletionDisabled,
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::AlreadyPersisted(_) => ErrorKind::AlreadyPersisted,
            Self::UserNotFound => ErrorKind::UserNotFound,
            Self::UserConflict => ErrorKind::UserConflict,
            Self::ClientMetadataNotFound => ErrorKind::ClientMetadataNotFound,
            Self::ClientConflict => ErrorKind::ClientConflict,
            Self::InvalidClient => ErrorKind::InvalidClient,
            Self::InvalidClientCredentials => ErrorKind::InvalidClientCredentials,
            Self::InvalidGrant => ErrorKind::InvalidGrant,
            Self::InvalidScope => ErrorKind::InvalidScope,
            Self::InvalidRedirectUri(_) | Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::TokenExpired => ErrorKind::TokenExpired,
            Self::TokenRevoked => ErrorKind::TokenRevoked,
            Self::TokenMalformed => ErrorKind::TokenMalformed,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn internal<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal(Box::new(error))
    }

    /// Whether this is a failure of the service rather than of the request
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

impl From<RepositoryError> for Error {
    fn from(error: RepositoryError) -> Self {
        Self::internal(error)
    }
}

impl From<VerifierError> for Error {
    fn from(error: VerifierError) -> Self {
        Self::internal(error)
    }
}

impl From<ErrorKind> for ClientErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::ZoneNotFound => Self::ZoneNotFound,
            ErrorKind::ZoneConflict => Self::ZoneConflict,
            ErrorKind::ZoneDeletionDisabled => Self::AccessDenied,
            ErrorKind::ValidationError
            | ErrorKind::AlreadyPersisted
            | ErrorKind::InvalidRequest => Self::InvalidRequest,
            ErrorKind::UserNotFound => Self::UserNotFound,
            ErrorKind::UserConflict => Self::UserConflict,
            ErrorKind::ClientMetadataNotFound => Self::ClientNotFound,
            ErrorKind::ClientConflict => Self::ClientConflict,
            ErrorKind::InvalidClient | ErrorKind::InvalidClientCredentials => Self::InvalidClient,
            ErrorKind::InvalidGrant => Self::InvalidGrant,
            ErrorKind::InvalidScope => Self::InvalidScope,
            ErrorKind::TokenExpired | ErrorKind::TokenRevoked | ErrorKind::TokenMalformed => {
                Self::InvalidToken
            }
            ErrorKind::Internal => Self::ServerError,
        }
    }
}

impl From<&Error> for ClientError {
    fn from(error: &Error) -> Self {
        let client_error = ClientError::from(ClientErrorCode::from(error.kind()));

        // Those only name fields or constraints, never values
        match error {
            Error::Validation(_) | Error::InvalidRedirectUri(_) | Error::InvalidRequest(_) => {
                client_error.with_description(error.to_string())
            }
            Error::TokenExpired => client_error.with_description("The token expired.".to_owned()),
            Error::TokenRevoked => {
                client_error.with_description("The token was revoked.".to_owned())
            }
            _ => client_error,
        }
    }
}
