// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2021-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::fmt::Debug;

use serde::{Serialize, de::DeserializeOwned};

/// Check that `value` serializes to `expected`, and that `expected`
/// deserializes back to an equal value.
#[track_caller]
pub(crate) fn assert_json_shape<T>(value: &T, expected: serde_json::Value)
where
    T: Serialize + DeserializeOwned + PartialEq + Debug,
{
    let serialized = serde_json::to_value(value).expect("value should serialize to JSON");
    assert_eq!(serialized, expected);

    let parsed: T = serde_json::from_value(expected).expect("JSON should deserialize back");
    assert_eq!(&parsed, value);
}
