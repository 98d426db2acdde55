//! Dispatcher trait

use handoff_foundation::Result;

/// A unit of work destined for the owning context
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Dispatcher trait - implement to bind tasks to a new owning context
pub trait OwnerDispatcher: Send + Sync {
    /// Schedule `callback` to run later on the owning context.
    ///
    /// Callbacks scheduled from one thread must run in submission order and
    /// never concurrently with each other. A callback scheduled from inside
    /// another callback runs after the outer one returns. Returns an error if the owning
    /// context can no longer accept work; the callback is dropped unrun.
    fn schedule(&self, callback: Callback) -> Result<()>;

    /// Get dispatcher name
    fn name(&self) -> &'static str;
}
