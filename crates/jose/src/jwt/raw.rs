// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::{borrow::Cow, ops::Deref};

use thiserror::Error;

/// A compact JWS split into its three dot-separated parts, without any
/// decoding done yet.
#[derive(Clone, PartialEq, Eq)]
pub struct RawJwt<'a> {
    inner: Cow<'a, str>,
    first_dot: usize,
    second_dot: usize,
}

impl RawJwt<'static> {
    pub(super) fn new(inner: String, first_dot: usize, second_dot: usize) -> Self {
        Self {
            inner: inner.into(),
            first_dot,
            second_dot,
        }
    }
}

// Never print the token itself, it is a bearer credential
impl std::fmt::Debug for RawJwt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawJwt")
            .field("len", &self.inner.len())
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for RawJwt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl<'a> RawJwt<'a> {
    #[must_use]
    pub fn header(&'a self) -> &'a str {
        &self.inner[..self.first_dot]
    }

    #[must_use]
    pub fn payload(&'a self) -> &'a str {
        &self.inner[self.first_dot + 1..self.second_dot]
    }

    #[must_use]
    pub fn signature(&'a self) -> &'a str {
        &self.inner[self.second_dot + 1..]
    }

    /// The part of the token covered by the signature, `header.payload`.
    #[must_use]
    pub fn signed_part(&'a self) -> &'a str {
        &self.inner[..self.second_dot]
    }

    #[must_use]
    pub fn into_owned(self) -> RawJwt<'static> {
        RawJwt {
            inner: self.inner.into_owned().into(),
            first_dot: self.first_dot,
            second_dot: self.second_dot,
        }
    }
}

impl Deref for RawJwt<'_> {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("no dots found in JWT")]
    NoDots,

    #[error("only one dot found in JWT")]
    OnlyOneDot,

    #[error("too many dots in JWT")]
    TooManyDots,
}

impl<'a> From<RawJwt<'a>> for String {
    fn from(val: RawJwt<'a>) -> Self {
        val.inner.into()
    }
}

fn find_dots(value: &str) -> Result<(usize, usize), DecodeError> {
    let mut indices = value
        .char_indices()
        .filter_map(|(idx, c)| (c == '.').then_some(idx));

    let first_dot = indices.next().ok_or(DecodeError::NoDots)?;
    let second_dot = indices.next().ok_or(DecodeError::OnlyOneDot)?;

    if indices.next().is_some() {
        return Err(DecodeError::TooManyDots);
    }

    Ok((first_dot, second_dot))
}

impl<'a> TryFrom<&'a str> for RawJwt<'a> {
    type Error = DecodeError;
    fn try_from(value: &'a str) -> Result<Self, Self::Error> {
        let (first_dot, second_dot) = find_dots(value)?;
        Ok(Self {
            inner: value.into(),
            first_dot,
            second_dot,
        })
    }
}

impl TryFrom<String> for RawJwt<'static> {
    type Error = DecodeError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (first_dot, second_dot) = find_dots(&value)?;
        Ok(Self::new(value, first_dot, second_dot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_parts() {
        let raw = RawJwt::try_from("aaa.bbb.ccc").unwrap();
        assert_eq!(raw.header(), "aaa");
        assert_eq!(raw.payload(), "bbb");
        assert_eq!(raw.signature(), "ccc");
        assert_eq!(raw.signed_part(), "aaa.bbb");

        let raw = RawJwt::try_from("..".to_owned()).unwrap();
        assert_eq!(raw.header(), "");
        assert_eq!(raw.signature(), "");
    }

    #[test]
    fn wrong_number_of_dots() {
        assert_eq!(RawJwt::try_from("aaa").unwrap_err(), DecodeError::NoDots);
        assert_eq!(
            RawJwt::try_from("aaa.bbb").unwrap_err(),
            DecodeError::OnlyOneDot
        );
        assert_eq!(
            RawJwt::try_from("a.b.c.d").unwrap_err(),
            DecodeError::TooManyDots
        );
    }

    #[test]
    fn debug_hides_the_token() {
        let raw = RawJwt::try_from("secret.token.value").unwrap();
        assert!(!format!("{raw:?}").contains("secret"));
    }
}
