use core::marker::PhantomData;

/// A marker type that indicates that the type is not `Send`.
///
/// Guards carry one: a hold is recorded under the identity of the thread
/// that took it and has to be released by that same thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotSend(PhantomData<*const ()>);

// SAFETY: This is a marker type that indicates that the type is not `Send`.
//         So no restrictions on `Sync` are needed.
unsafe impl Sync for NotSend {}
