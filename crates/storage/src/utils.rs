// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2023, 2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Wrappers shared by every repository

/// Wraps a repository, passing every error it returns through `mapper`.
///
/// This is how backends erase their error type into
/// [`RepositoryError`](crate::RepositoryError) when they are boxed.
pub struct MapErr<R, F> {
    pub(crate) inner: R,
    pub(crate) mapper: F,
}

impl<R, F> MapErr<R, F> {
    /// Wrap `inner`, mapping its errors with `mapper`
    #[must_use]
    pub fn new(inner: R, mapper: F) -> Self {
        Self { inner, mapper }
    }
}

/// Given the methods of a repository trait, implement it for [`Box<R>`]
/// and for [`MapErr`], forwarding each call to the wrapped repository.
///
/// Every method must take `&mut self` and return `Result<_, Self::Error>`.
#[macro_export]
macro_rules! repository_impl {
    ($trait_:ident:
        $(
            async fn $method:ident (
                &mut self
                $(, $arg:ident: $arg_ty:ty )*
                $(,)?
            ) -> Result<$ret_ty:ty, Self::Error>;
        )*
    ) => {
        #[::async_trait::async_trait]
        impl<R> $trait_ for ::std::boxed::Box<R>
        where
            R: $trait_ + ?Sized,
        {
            type Error = R::Error;

            $(
                async fn $method (&mut self $(, $arg: $arg_ty)*) -> Result<$ret_ty, Self::Error> {
                    R::$method(&mut **self $(, $arg)*).await
                }
            )*
        }

        #[::async_trait::async_trait]
        impl<R, F, E> $trait_ for $crate::MapErr<R, F>
        where
            R: $trait_,
            F: FnMut(R::Error) -> E + ::std::marker::Send + ::std::marker::Sync,
        {
            type Error = E;

            $(
                async fn $method (&mut self $(, $arg: $arg_ty)*) -> Result<$ret_ty, Self::Error> {
                    let result = R::$method(&mut self.inner $(, $arg)*).await;
                    result.map_err(&mut self.mapper)
                }
            )*
        }
    };
}
