//! Uniform async contract for identity-resolution functions.
//!
//! Integrators write resolvers in whichever style suits them: settling a
//! one-shot [`Completion`], returning a future, or returning the result
//! directly. [`Resolver`] wraps each style behind the object-safe
//! [`IdentityResolver`] trait, so the pipeline only ever awaits one
//! `Result<Option<Identity>, BoxError>`. The style is chosen by the
//! constructor, never guessed from the function's shape.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use http::request::Parts;
use tokio::sync::oneshot;

use super::identity::Identity;
use crate::error::{BoxError, ProxyError};

/// Outcome of resolving a request's identity. `Ok(None)` means anonymous.
pub type ResolveResult = Result<Option<Identity>, BoxError>;

// async_trait is required here because IdentityResolver is used as Arc<dyn IdentityResolver>
// and native async fn in traits does not support dyn dispatch.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, request: &Parts) -> ResolveResult;
}

/// Settles a callback-style resolution. Consumed on use, so a resolver
/// can settle at most once.
pub struct Completion {
    tx: oneshot::Sender<ResolveResult>,
}

impl Completion {
    pub fn done(self, result: ResolveResult) {
        // The receiver is gone only when the request itself was dropped
        let _ = self.tx.send(result);
    }

    pub fn ok(self, identity: Option<Identity>) {
        self.done(Ok(identity));
    }

    pub fn fail(self, error: impl Into<BoxError>) {
        self.done(Err(error.into()));
    }
}

struct CallbackFn<F>(F);

#[async_trait]
impl<F> IdentityResolver for CallbackFn<F>
where
    F: Fn(&Parts, Completion) -> Result<(), BoxError> + Send + Sync,
{
    async fn resolve(&self, request: &Parts) -> ResolveResult {
        let (tx, rx) = oneshot::channel();
        (self.0)(request, Completion { tx })?;
        rx.await.map_err(|_| Box::new(ProxyError::CompletionDropped) as BoxError)?
    }
}

struct FutureFn<F, Fut>(F, PhantomData<fn() -> Fut>);

#[async_trait]
impl<F, Fut> IdentityResolver for FutureFn<F, Fut>
where
    F: Fn(&Parts) -> Fut + Send + Sync,
    Fut: Future<Output = ResolveResult> + Send + 'static,
{
    async fn resolve(&self, request: &Parts) -> ResolveResult {
        (self.0)(request).await
    }
}

struct SyncFn<F>(F);

#[async_trait]
impl<F> IdentityResolver for SyncFn<F>
where
    F: Fn(&Parts) -> ResolveResult + Send + Sync,
{
    async fn resolve(&self, request: &Parts) -> ResolveResult {
        (self.0)(request)
    }
}

/// Cheaply cloneable handle to an identity-resolution function.
#[derive(Clone)]
pub struct Resolver(Arc<dyn IdentityResolver>);

impl Resolver {
    /// Callback style: `f` receives a [`Completion`] and must settle it.
    /// An `Err` returned synchronously rejects immediately; a completion
    /// dropped unsettled rejects with [`ProxyError::CompletionDropped`].
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&Parts, Completion) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self(Arc::new(CallbackFn(f)))
    }

    /// Future style: `f` returns a future that yields the result.
    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn(&Parts) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolveResult> + Send + 'static,
    {
        Self(Arc::new(FutureFn(f, PhantomData)))
    }

    /// Direct style: `f` returns the result without suspending.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&Parts) -> ResolveResult + Send + Sync + 'static,
    {
        Self(Arc::new(SyncFn(f)))
    }

    pub fn from_resolver(resolver: impl IdentityResolver + 'static) -> Self {
        Self(Arc::new(resolver))
    }

    /// Every request resolves to no identity.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::sync(|_| Ok(None))
    }
}

#[async_trait]
impl IdentityResolver for Resolver {
    async fn resolve(&self, request: &Parts) -> ResolveResult {
        self.0.resolve(request).await
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Resolver(..)")
    }
}
