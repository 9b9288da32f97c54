//! Splits the traded amount across candidate paths.
//!
//! The allocator is a water filling iteration: flow repeatedly moves from
//! the path with the worst marginal price to the one with the best, in
//! geometrically shrinking steps, until the marginal prices agree within a
//! tolerance or the iteration budget runs out. The iteration never fails;
//! the best allocation seen so far is what comes out. On top of that, every
//! viable number of used paths is tried and the per path execution cost
//! decides whether splitting is worth it at all.

use crate::{
    conversions::U256Ext as _,
    limits::seed_allocation,
    path::Path,
    pool::Snapshot,
    router::SwapKind,
};
use num::{BigInt, BigRational, Zero as _};
use primitive_types::U256;

/// Iteration controls. The defaults converge well below a basis point on
/// realistic pool depths.
#[derive(Clone, Debug)]
pub struct Settings {
    pub max_iterations: usize,
    /// Relative marginal price spread below which the allocation counts as
    /// converged.
    pub tolerance: BigRational,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: BigRational::new(1.into(), 100_000.into()),
        }
    }
}

/// The value the fixed `amount` buys (exact in) or costs (exact out) when
/// sent down the path. `None` when any hop cannot price its share.
pub fn path_output(snapshot: &Snapshot, path: &Path, amount: U256, kind: SwapKind) -> Option<U256> {
    match kind {
        SwapKind::GivenIn => path.hops().iter().try_fold(amount, |amount, hop| {
            let pool = snapshot.get(&hop.pool)?;
            let pair = pool.pair_data(hop.token_in, hop.token_out).ok()?;
            pool.amount_out(&pair, amount).ok()
        }),
        SwapKind::GivenOut => path.hops().iter().rev().try_fold(amount, |amount, hop| {
            let pool = snapshot.get(&hop.pool)?;
            let pair = pool.pair_data(hop.token_in, hop.token_out).ok()?;
            pool.amount_in(&pair, amount).ok()
        }),
    }
}

/// The path's marginal price at the given executed amount: out per in for
/// exact in trades, in per out for exact out trades. The product of the hop
/// marginals, each evaluated at the amount that actually flows through the
/// hop.
pub fn path_marginal(
    snapshot: &Snapshot,
    path: &Path,
    amount: U256,
    kind: SwapKind,
) -> Option<BigRational> {
    let mut product = BigRational::new(1.into(), 1.into());
    let mut flowing = amount;
    let hops: Vec<_> = match kind {
        SwapKind::GivenIn => path.hops().iter().collect(),
        SwapKind::GivenOut => path.hops().iter().rev().collect(),
    };
    for hop in hops {
        let pool = snapshot.get(&hop.pool)?;
        let pair = pool.pair_data(hop.token_in, hop.token_out).ok()?;
        product *= pool.marginal_price(&pair, flowing, kind)?;
        flowing = match kind {
            SwapKind::GivenIn => pool.amount_out(&pair, flowing).ok()?,
            SwapKind::GivenOut => pool.amount_in(&pair, flowing).ok()?,
        };
    }
    Some(product)
}

/// Finds the best allocation of `total` over the limit sorted `paths`.
///
/// Returns one amount per path, summing to exactly `total`, or an empty
/// vector when the paths cannot carry the amount within the pool budget.
pub fn optimize_allocation(
    snapshot: &Snapshot,
    paths: &[(Path, U256)],
    total: U256,
    kind: SwapKind,
    cost_per_path: U256,
    max_pools: usize,
    settings: &Settings,
) -> Vec<U256> {
    if paths.is_empty() {
        return Vec::new();
    }
    if total.is_zero() {
        return vec![U256::zero(); paths.len()];
    }

    // The smallest prefix whose limits cover the total; smaller sizes are
    // infeasible and need not be tried.
    let mut cumulative = U256::zero();
    let mut smallest = None;
    for (index, (_, limit)) in paths.iter().enumerate() {
        cumulative = cumulative.saturating_add(*limit);
        if cumulative >= total {
            smallest = Some(index + 1);
            break;
        }
    }
    let Some(smallest) = smallest else {
        return Vec::new();
    };
    // The pool budget counts pools, not paths: a prefix of paths only
    // qualifies while its hops fit the budget.
    let mut largest = 0;
    let mut pools_used = 0;
    for (path, _) in paths {
        pools_used += path.len();
        if pools_used > max_pools {
            break;
        }
        largest += 1;
    }
    if smallest > largest {
        return Vec::new();
    }

    let mut best: Option<(BigInt, Vec<U256>)> = None;
    for size in smallest..=largest {
        let subset = &paths[..size];
        let Some(seed) = seed_allocation(subset, total) else {
            continue;
        };
        let Some((value, allocation)) =
            water_fill(snapshot, subset, seed, kind, cost_per_path, settings)
        else {
            continue;
        };
        if best.as_ref().is_none_or(|(current, _)| value > *current) {
            best = Some((value, allocation));
        }
    }

    match best {
        Some((_, mut allocation)) => {
            allocation.resize(paths.len(), U256::zero());
            allocation
        }
        None => Vec::new(),
    }
}

/// Iterates one fixed path-set size to (approximate) marginal price
/// equality. Returns the best objective value seen and its allocation.
fn water_fill(
    snapshot: &Snapshot,
    subset: &[(Path, U256)],
    seed: Vec<U256>,
    kind: SwapKind,
    cost_per_path: U256,
    settings: &Settings,
) -> Option<(BigInt, Vec<U256>)> {
    let limits: Vec<U256> = subset.iter().map(|(_, limit)| *limit).collect();
    let total: U256 = seed.iter().fold(U256::zero(), |sum, a| sum + a);

    let mut current = seed;
    let mut best_value = objective(snapshot, subset, &current, kind, cost_per_path)?;
    let mut best_allocation = current.clone();
    let mut step = (total >> 2).max(U256::one());
    let mut iterations = 0_usize;
    let mut converged = false;

    for _ in 0..settings.max_iterations {
        iterations += 1;

        let marginals: Vec<Option<BigRational>> = subset
            .iter()
            .zip(&current)
            .map(|((path, _), amount)| path_marginal(snapshot, path, *amount, kind))
            .collect();

        let mut donor: Option<usize> = None;
        for (index, marginal) in marginals.iter().enumerate() {
            if current[index].is_zero() {
                continue;
            }
            donor = Some(match donor {
                None => index,
                Some(held) => {
                    if is_worse(kind, marginal, &marginals[held]) {
                        index
                    } else {
                        held
                    }
                }
            });
        }
        let mut receiver: Option<usize> = None;
        for (index, marginal) in marginals.iter().enumerate() {
            if current[index] >= limits[index] || marginal.is_none() {
                continue;
            }
            receiver = Some(match receiver {
                None => index,
                Some(held) => {
                    if is_better(kind, marginal, &marginals[held]) {
                        index
                    } else {
                        held
                    }
                }
            });
        }
        let (Some(donor), Some(receiver)) = (donor, receiver) else {
            converged = true;
            break;
        };
        if donor == receiver {
            converged = true;
            break;
        }

        // Only check the spread when the donor can still be priced; an
        // unpriceable donor gets drained regardless.
        if let (Some(donor_price), Some(receiver_price)) =
            (&marginals[donor], &marginals[receiver])
        {
            let (high, low) = match kind {
                SwapKind::GivenIn => (receiver_price, donor_price),
                SwapKind::GivenOut => (donor_price, receiver_price),
            };
            if spread_within(high, low, &settings.tolerance) {
                converged = true;
                break;
            }
        }

        let moved = step
            .min(current[donor])
            .min(limits[receiver] - current[receiver]);
        if moved.is_zero() {
            step >>= 1;
            if step.is_zero() {
                break;
            }
            continue;
        }

        current[donor] -= moved;
        current[receiver] += moved;
        match objective(snapshot, subset, &current, kind, cost_per_path) {
            Some(value) => {
                if value > best_value {
                    best_value = value;
                    best_allocation = current.clone();
                }
            }
            None => {
                // The move left some pool's domain; undo it and try finer.
                current[donor] += moved;
                current[receiver] -= moved;
            }
        }

        step >>= 1;
        if step.is_zero() {
            break;
        }
    }

    tracing::debug!(
        size = subset.len(),
        iterations,
        converged,
        "water filling finished",
    );
    Some((best_value, best_allocation))
}

/// The value to maximize: total return net of execution costs for exact in,
/// the negated total input plus costs for exact out.
fn objective(
    snapshot: &Snapshot,
    subset: &[(Path, U256)],
    allocation: &[U256],
    kind: SwapKind,
    cost_per_path: U256,
) -> Option<BigInt> {
    let mut total = BigInt::zero();
    let mut active = 0_u32;
    for ((path, _), amount) in subset.iter().zip(allocation) {
        if amount.is_zero() {
            continue;
        }
        total += path_output(snapshot, path, *amount, kind)?.to_big_int();
        active += 1;
    }
    let costs = cost_per_path.to_big_int() * active;
    Some(match kind {
        SwapKind::GivenIn => total - costs,
        SwapKind::GivenOut => -(total + costs),
    })
}

/// Whether `a` is a strictly worse marginal than `b` for the trade kind.
/// An unpriceable marginal is always worst.
fn is_worse(kind: SwapKind, a: &Option<BigRational>, b: &Option<BigRational>) -> bool {
    match (a, b) {
        (None, _) => true,
        (_, None) => false,
        (Some(a), Some(b)) => match kind {
            SwapKind::GivenIn => a < b,
            SwapKind::GivenOut => a > b,
        },
    }
}

fn is_better(kind: SwapKind, a: &Option<BigRational>, b: &Option<BigRational>) -> bool {
    match (a, b) {
        (None, _) => false,
        (_, None) => true,
        (Some(a), Some(b)) => match kind {
            SwapKind::GivenIn => a > b,
            SwapKind::GivenOut => a < b,
        },
    }
}

fn spread_within(high: &BigRational, low: &BigRational, tolerance: &BigRational) -> bool {
    if high <= low {
        return true;
    }
    if low.is_zero() {
        return false;
    }
    &((high - low) / low) <= tolerance
}
