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

//! # cilgraph
//!
//! Imports stack-based CIL method bodies into an explicit basic-block graph
//! with full value/use tracking.
//!
//! The CIL encoding leaves almost everything implicit: data flows through an
//! evaluation stack, control flow is byte offsets, and exception handling
//! lives in a side table of nested byte ranges. `cilgraph` makes all of it
//! explicit in a single forward pass:
//!
//! - **Blocks** - the instruction stream is split at leaders (branch targets,
//!   post-terminator offsets, region boundaries) into [`graph::BasicBlock`]s
//!   with predecessor/successor edges.
//! - **Values** - every stack slot becomes a [`graph::ValueId`] naming an
//!   instruction result, constant, argument or variable; every value tracks
//!   the operand slots using it, so rewrites like
//!   [`graph::MethodBody::replace_uses`] are cheap.
//! - **Stack merges** - when control paths meet with values still on the
//!   stack, the importer reconciles them through merge variables: stores on
//!   each incoming edge, loads at the confluence. Paths that disagree on the
//!   stack shape abort the import.
//! - **Exception regions** - the region table becomes guard instructions
//!   anchored at try-entry blocks, after validating proper nesting and
//!   splitting entry blocks so no block anchors two regions.
//!
//! ## Quick Start
//!
//! ```rust
//! use cilgraph::prelude::*;
//!
//! // static int add(int a, int b) => a + b;
//! let source = MethodSource::from_ops(vec![
//!     RawOp::Ldarg(0),
//!     RawOp::Ldarg(1),
//!     RawOp::Binary { op: BinaryOp::Add, checked: false, unsigned: false },
//!     RawOp::Ret,
//! ])
//! .with_args(&[StackKind::Int32, StackKind::Int32])
//! .returning(StackKind::Int32);
//!
//! let body = cilgraph::import(&source)?;
//! assert_eq!(body.blocks().len(), 1);
//! println!("{body}");
//! # Ok::<(), cilgraph::Error>(())
//! ```
//!
//! ## Input Contract
//!
//! The importer does not decode bytes. Its input is a [`raw::MethodSource`]
//! produced by an upstream decoder: instructions with opcodes already widened
//! to their canonical forms, metadata tokens resolved into entity references,
//! and the exception table decoded into [`raw::ExceptionRegion`] entries.
//!
//! ## Error Handling
//!
//! [`import`] either returns a fully consistent [`graph::MethodBody`] or an
//! [`Error`]; there is no partial result. See [`Error`] for the failure
//! taxonomy.

#[macro_use]
pub(crate) mod error;

pub mod graph;
mod import;
pub mod prelude;
pub mod raw;

/// `cilgraph` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is
/// always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

pub use error::Error;
pub use import::import;
