//! Owning-context dispatchers
//!
//! Every phase callback except the background body is handed to an
//! [`OwnerDispatcher`], which must run callbacks one at a time in the order
//! they were scheduled.
//!
//! - `MainLoop` / `LoopHandle` - queue drained by whichever thread drives the loop
//! - `InlineDispatcher` - runs callbacks immediately on the scheduling thread

pub mod inline;
pub mod main_loop;
pub mod r#trait;

pub use inline::InlineDispatcher;
pub use main_loop::{main_loop, LoopHandle, MainLoop};
pub use r#trait::{Callback, OwnerDispatcher};
