// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Compact [JSON Web Signature] handling for the self-contained tokens
//! minted by the authorization core.
//!
//! Only the symmetric `HS*` algorithms are supported: the same party signs
//! and verifies every token.
//!
//! [JSON Web Signature]: https://www.rfc-editor.org/rfc/rfc7515

#![deny(rustdoc::broken_intra_doc_links)]
#![allow(clippy::module_name_repetitions)]

pub mod jwa;
pub mod jwt;
mod keyset;

pub use self::keyset::{Keyset, KeysetError};
