//! # extdd: External-memory Decision Diagrams in Rust
//!
//! **`extdd`** manipulates **Binary Decision Diagrams (BDDs)** and **Zero-suppressed Decision
//! Diagrams (ZDDs)** that may be far larger than main memory.
//!
//! ## How is this different from an in-memory BDD package?
//!
//! A classic BDD package keeps all nodes in a hash table (the *unique table*) and runs recursive
//! algorithms with a memoization cache. Both access the nodes randomly, so performance falls off a
//! cliff once the diagram no longer fits into memory.
//!
//! Here, a diagram is a **file** of nodes sorted by level. Every operation is a *sweep* that
//! streams its inputs top-down and replaces recursion by a **levelized priority queue**. The
//! unreduced result is then canonicalized by a bottom-up **Reduce** sweep. All steps are
//! I/O-efficient: they only scan and sort.
//!
//! ## Key Features
//!
//! - **Two-state files**: a writer owns a file until `finish()` turns it into an immutable
//!   [`SharedFile`][crate::file::SharedFile] that any number of diagrams may share.
//! - **Tiered queues**: small instances run entirely in memory, large ones spill sorted runs to
//!   temporary files. The tier is picked per operation from predicted sizes, see
//!   [`MemoryMode`][crate::config::MemoryMode].
//! - **Policies**: BDDs and ZDDs share every algorithm and differ only in the
//!   [`DdPolicy`][crate::policy::DdPolicy] reduction rule and a few sweep policies.
//! - **Rich API**: all ten binary operators, if-then-else, quantification (∃, ∀), restriction,
//!   relabelling, subset selection, BDD/ZDD conversion, equality checks, counting with arbitrary
//!   precision, and persistence.
//!
//! ## Basic Usage
//!
//! ```rust
//! use extdd::manager::Manager;
//!
//! // 1. Initialize the manager (with the default configuration)
//! let mgr = Manager::default();
//!
//! // 2. Create variables (0-indexed)
//! let x0 = mgr.mk_var(0)?;
//! let x1 = mgr.mk_var(1)?;
//!
//! // 3. Build a formula: f = x0 AND (NOT x1)
//! let f = mgr.apply_and(&x0, &mgr.apply_not(&x1))?;
//!
//! // 4. Check properties
//! assert!(!f.is_zero());
//! assert!(!f.is_one());
//!
//! // 5. Evaluate (x0=true, x1=false) -> should be true
//! assert!(mgr.eval(&f, |x| x == 0)?);
//! # Ok::<(), extdd::error::Error>(())
//! ```
//!
//! ## Core Components
//!
//! - **[`ptr`]**, **[`node`]**, **[`arc`]**: the bit-packed identifiers and the on-disk records.
//! - **[`file`]**: levelized files, their writers and streams.
//! - **[`sorter`]**, **[`lpq`]**: external sorting and the levelized priority queue.
//! - **[`reduce`]** and **[`sweep`]**: the algorithms.
//! - **[`manager`]**, **[`bdd`]**, **[`zdd`]**: the user-facing API.

pub mod arc;
pub mod bdd;
pub mod bool_op;
pub mod build;
pub mod config;
pub mod count;
pub mod dd;
pub mod equal;
pub mod error;
pub mod eval;
pub mod file;
pub mod lpq;
pub mod manager;
pub mod node;
pub mod policy;
pub mod ptr;
pub mod record;
pub mod reduce;
pub mod replace;
pub mod sorter;
pub mod sweep;
pub mod zdd;
