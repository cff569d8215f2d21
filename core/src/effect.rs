//! Effect descriptions.
//!
//! An effect is a value: building one does nothing. The runtime spawns it,
//! and an effect that resolves to `Some(action)` feeds that action back into
//! the same reducer.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Future carried by [`Effect::Future`].
pub type EffectFuture<A> = Pin<Box<dyn Future<Output = Option<A>> + Send>>;

/// Work a reducer asks the runtime to perform.
pub enum Effect<A> {
    /// Nothing to do.
    None,

    /// Run an async computation; `Some(action)` is reduced next.
    Future(EffectFuture<A>),
}

impl<A> Effect<A> {
    /// Wrap a future. See also [`async_effect!`](crate::async_effect).
    pub fn future<F>(fut: F) -> Self
    where
        F: Future<Output = Option<A>> + Send + 'static,
    {
        Self::Future(Box::pin(fut))
    }

    /// Whether this effect does nothing.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Whether this effect carries async work.
    #[must_use]
    pub const fn is_future(&self) -> bool {
        matches!(self, Self::Future(_))
    }
}

impl<A> fmt::Debug for Effect<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("Effect::None"),
            Self::Future(_) => f.write_str("Effect::Future(<future>)"),
        }
    }
}
