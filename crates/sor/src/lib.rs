//! A smart order router over a universe of AMM liquidity pools.
//!
//! Given an immutable snapshot of pools, the router finds how to trade one
//! token for another at the best overall rate: it builds candidate paths
//! over the pool graph, bounds each path by the liquidity it can actually
//! carry, splits the traded amount across paths until their marginal prices
//! agree, and reshapes the result into the settlement facing swap layout.
//!
//! The pipeline stages live in their own modules and only communicate
//! through values:
//!
//! * [`pool`] — pool state, validation, and the capability interface every
//!   pool kind implements (pricing, limits, marginal prices).
//! * [`graph`] — candidate path construction.
//! * [`limits`] — per path liquidity limits and the seed allocation.
//! * [`optimizer`] — the water filling amount allocator.
//! * [`format`] — the settlement layout of the final allocation.
//! * [`router`] — the entry point tying the stages together.
//!
//! The numeric foundation is an 18 decimal fixed point kernel
//! ([`fixed_point`]) with explicit rounding direction on every operation.

pub mod conversions;
pub mod error;
pub mod fixed_point;
pub mod format;
pub mod graph;
pub mod limits;
pub mod optimizer;
pub mod path;
pub mod pool;
pub mod router;

pub use crate::{
    error::Error,
    format::{SwapResult, SwapStep},
    graph::RouterConfig,
    pool::{Pool, Snapshot},
    router::{SwapKind, SwapRequest, best_swap},
};
