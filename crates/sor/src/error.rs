//! Arithmetic and domain errors shared by all pricing math.
//!
//! These are deliberately a closed set: every failure a pricing function can
//! produce maps onto one of these variants, and the router treats all of them
//! the same way (the offending pool or path is dropped for the request at
//! hand, the computation carries on with whatever liquidity remains).

#[derive(thiserror::Error, Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    #[error("addition overflow")]
    AddOverflow,
    #[error("subtraction underflow")]
    SubOverflow,
    #[error("multiplication overflow")]
    MulOverflow,
    #[error("division by zero")]
    ZeroDivision,
    #[error("power base out of bounds")]
    XOutOfBounds,
    #[error("power exponent out of bounds")]
    YOutOfBounds,
    #[error("natural exponent out of bounds")]
    InvalidExponent,
    #[error("power result out of bounds")]
    ProductOutOfBounds,
    #[error("amount in exceeds the maximum swappable ratio")]
    MaxInRatio,
    #[error("amount out exceeds the maximum swappable ratio")]
    MaxOutRatio,
    #[error("invariant iteration did not converge")]
    InvariantDidNotConverge,
}
