// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
// - 'file/physical.rs' uses mmap to map a class file into memory

//! # classweave
//!
//! [![Crates.io](https://img.shields.io/crates/v/classweave.svg)](https://crates.io/crates/classweave)
//! [![Documentation](https://docs.rs/classweave/badge.svg)](https://docs.rs/classweave)
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://github.com/BinFlip/classweave/blob/main/LICENSE-APACHE)
//!
//! A load-time weaving engine for JVM class files. While a class is being defined, `classweave`
//! rewrites its bytes so that it implements *accessor contracts*, interfaces exposing fields and
//! methods the class keeps private, and calls *interceptors* at identified instructions of
//! identified methods. Interceptors can read and write the method's locals, return early, or
//! jump to identified exits.
//!
//! ## Features
//!
//! - **🔍 Pluggable identification** - Classes, members and instruction offsets are named by
//!   symbolic ids that mappers resolve, so contracts survive obfuscated or renamed targets
//! - **🧩 Loader-aware topology** - Hierarchy walks across class-loader boundaries without
//!   defining classes
//! - **🛡️ Static compatibility checks** - Types and generic signatures are checked before any
//!   instruction is emitted; a class is either woven completely or left untouched
//! - **📦 Self-contained codec** - Class-file reading and writing with frame computation
//! - **⚡ Parallel batches** - An immutable engine shared across threads
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use classweave::prelude::*;
//!
//! let mut builder = BootstrapBuilder::new();
//! builder.register_class_mapper("game", |id: &str, _: SearchPurpose| {
//!     (id == "player").then(|| ClassIdentifier::names(["game/a"]))
//! });
//! builder.register_field_mapper("game", |id: &str, _: SearchPurpose| {
//!     (id == "health").then(|| FieldIdentifier::descriptions([ElementDescription::new("b", "I")]))
//! });
//! builder.register_accessor(
//!     ContractDescriptor::builder("hooks/Player", "player")
//!         .member(MemberDescriptor::field_accessor("getHealth", "()I", "health")),
//! )?;
//! let bootstrapper = builder.initialize();
//!
//! let loader = MemoryClassLoader::new("game").into_ref();
//! let original = std::fs::read("game/a.class")?;
//! let woven = bootstrapper.transform(&loader, "game/a", &original);
//! # Ok::<(), classweave::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`identification`] - Identifiers and the mapper registry
//! - [`topology`] - Loader-aware structural class cache and hierarchy walks
//! - [`signature`] - Generic signature model
//! - [`accessor`] - Contract descriptors and their validated form
//! - [`compat`] - Type and signature compatibility
//! - [`weaver`] - The per-class weaving state machine
//! - [`runtime`] - The runtime ABI woven code links against
//! - [`bootstrap`] - Composition root and host hook
//! - [`classfile`] and [`analysis`] - Class-file codec and dataflow analysis
//! - [`mappings`] - Declarative XML mappings
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, Error>`](Result). [`Error::category`] tells
//! configuration problems from genuine incompatibilities:
//!
//! ```rust,no_run
//! use classweave::{Error, ErrorCategory};
//!
//! fn explain(error: &Error) {
//!     match error.category() {
//!         ErrorCategory::Registration => println!("contract or mapper problem: {error}"),
//!         ErrorCategory::Infrastructure => println!("hierarchy could not be resolved: {error}"),
//!         _ => println!("{error}"),
//!     }
//! }
//! ```
//!
//! ## Development and Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! cargo +nightly fuzz run classreader --release
//! ```
#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use classweave::prelude::*;
///
/// let builder = BootstrapBuilder::new();
/// let bootstrapper = builder.initialize();
/// assert!(bootstrapper.accessors().is_empty());
/// ```
pub mod prelude;

/// Class-file model, reader and writer.
///
/// # Key Components
///
/// - [`classfile::ClassReader`] / [`classfile::ClassWriter`] - Decoding and encoding
/// - [`classfile::ClassNode`], [`classfile::MethodNode`], [`classfile::FieldNode`] - The tree
/// - [`classfile::Insn`] / [`classfile::InsnList`] - Instructions with symbolic labels
/// - [`classfile::Type`] / [`classfile::MethodType`] - Descriptors
pub mod classfile;

/// Dataflow analysis over method bodies.
///
/// Used for the operand-stack check at interceptor exits and for stack map frames.
pub mod analysis;

/// Generic signatures: parse, traverse, emit and resolve type variables.
pub mod signature;

/// Identification strategies and the mapper registry.
pub mod identification;

/// Loader-aware class topology.
pub mod topology;

/// Accessor contracts.
pub mod accessor;

/// Compatibility checks between contracts and targets.
pub mod compat;

/// The weaving engine.
pub mod weaver;

/// The runtime ABI.
pub mod runtime;

/// Engine configuration.
pub mod config;

/// Composition root and host hook.
pub mod bootstrap;

/// Declarative XML mappings.
pub mod mappings;

/// `classweave` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `classweave` Error type
///
/// # Examples
///
/// ```rust
/// use classweave::{classfile::ClassReader, classfile::ReaderFlags, Error};
///
/// match ClassReader::new(&[0xCA, 0xFE]).read(ReaderFlags::empty()) {
///     Err(Error::OutOfBounds) | Err(Error::Malformed { .. }) => {}
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
pub use error::{Error, ErrorCategory};

/// Class-file bytes from memory or a memory-mapped file.
pub use file::File;

pub use bootstrap::{BootstrapBuilder, Bootstrapper, Escalate, FailureHandler};
pub use config::WeaverConfig;
