//! Linear-programming backend for the dispatch model.
//!
//! This crate provides [`LpBackend`], an implementation of
//! [`MipBackend`](dispatch_core::MipBackend) on top of `good_lp` with the
//! pure-Rust `microlp` solver. The backend keeps its own copy of every
//! declared variable, constraint and objective and rebuilds the `good_lp`
//! problem on each solve, which is what lets constraint groups be removed
//! between solves.
//!
//! `microlp` cannot be interrupted and has no warm-start entry point, so the
//! stage budget is enforced by waiting on a worker thread for at most the
//! time limit, and a warm start becomes an objective cut-off and the fallback
//! solution when the limit expires.

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod backend;
mod lp;

pub use backend::LpBackend;
