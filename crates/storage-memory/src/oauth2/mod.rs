// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

mod authorization_code;
mod client;

pub use self::{
    authorization_code::MemoryAuthorizationCodeRepository, client::MemoryClientRepository,
};
