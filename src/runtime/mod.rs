//! The runtime woven code links against.
//!
//! - [`abi`] - Fixed, versioned names and descriptors the weaver targets
//! - [`classes`] - Class files of the runtime types, for hosts that define them at startup

pub mod abi;
mod classes;

pub use classes::{classes, context_class, context_interface, invalid_exit_class};
