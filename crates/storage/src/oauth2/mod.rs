// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2021-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Repositories to interact with entities related to the OAuth 2.0 protocol

mod authorization_code;
mod client;

pub use self::{
    authorization_code::{AuthorizationCodeParams, AuthorizationCodeRepository},
    client::ClientRepository,
};
