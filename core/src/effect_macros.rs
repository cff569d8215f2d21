//! Shorthand for building effects inside reducers.

/// Build an [`Effect::Future`](crate::effect::Effect::Future) from the body
/// of an `async move` block.
///
/// Everything the block uses must be owned (clone `Arc`s out of the
/// environment first), since the effect outlives the reducer call.
///
/// ```rust,ignore
/// use bay_booking_core::async_effect;
///
/// let capacity = env.capacity.clone();
/// async_effect! {
///     match capacity.check(date, now).await {
///         Ok(availability) => Some(SessionAction::AvailabilityLoaded { availability }),
///         Err(error) => Some(SessionAction::StoreFailed { error: error.to_string() }),
///     }
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}
