//! The fetch operation a cache key revalidates with.

use std::future::Future;

use common::Result;
use futures::future::BoxFuture;
use futures::FutureExt;

pub type FetchFuture<T> = BoxFuture<'static, Result<T>>;

/// A zero-argument async operation producing a fresh value for one key.
///
/// Implemented for any `Fn() -> impl Future<Output = Result<T>>`, so plain
/// closures capturing a client and a location work as fetchers.
pub trait Fetcher<T>: Send + Sync + 'static {
    fn fetch(&self) -> FetchFuture<T>;
}

impl<T, F, Fut> Fetcher<T> for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    fn fetch(&self) -> FetchFuture<T> {
        (self)().boxed()
    }
}
