// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

mod header;
mod raw;
mod signed;

pub use self::{
    header::{JWT_TYPE, JsonWebSignatureHeader},
    raw::{DecodeError, RawJwt},
    signed::{Jwt, JwtDecodeError, JwtSignatureError, JwtVerificationError},
};
