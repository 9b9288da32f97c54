//! Candidate path construction.
//!
//! Two strategies feed the optimizer: the simple strategy turns direct pools
//! into single hop paths and greedily picks the deepest pool on each side of
//! a hop token, while the boosted strategy routes through designated hub
//! assets, wrapping through linear pools where that opens up liquidity. Both
//! only ever produce structurally valid [`Path`] values; anything a pool
//! cannot price is silently left out.

use crate::{
    optimizer,
    path::{Hop, Path},
    pool::{Pool, PoolKind, Snapshot},
};
use num::BigRational;
use primitive_types::{H160, H256};
use std::collections::{HashMap, HashSet};

/// The longest route worth considering; everything beyond this loses more
/// to fees than it gains in price.
const MAX_HOPS: usize = 4;

/// Static routing configuration.
#[derive(Clone, Debug, Default)]
pub struct RouterConfig {
    /// The network's base asset, the first boosted hub.
    pub base_asset: H160,
    /// The pool token of the designated phantom hub pool, the second
    /// boosted hub.
    pub hub_pool_token: H160,
    /// A pool trading the two hubs against each other, if one exists.
    pub hub_bridge_pool: Option<H256>,
    /// Counter assets that qualify a liquidity bootstrapping pool as an
    /// entry or exit ramp.
    pub bootstrap_counter_assets: Vec<H160>,
    pub optimizer: optimizer::Settings,
}

/// How a pool can participate in routes for one (token in, token out)
/// request. Kept in an external map so pools stay immutable and shareable
/// across concurrent requests.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PoolRole {
    /// Holds both tokens.
    Direct,
    /// Holds the in token only.
    HopIn,
    /// Holds the out token only.
    HopOut,
}

/// Classifies every usable pool of the snapshot for the given trade.
/// Paused pools and pools holding neither token are not classified; with a
/// budget of at most one pool only direct pools are.
pub fn pool_roles(
    snapshot: &Snapshot,
    token_in: H160,
    token_out: H160,
    max_pools: usize,
) -> HashMap<H256, PoolRole> {
    let mut roles = HashMap::new();
    for pool in snapshot.pools() {
        if pool.common.paused {
            continue;
        }
        let holds = |token| pool.common.tokens.iter().any(|state| state.token == token);
        let role = match (holds(token_in), holds(token_out)) {
            (true, true) => PoolRole::Direct,
            (true, false) if max_pools > 1 => PoolRole::HopIn,
            (false, true) if max_pools > 1 => PoolRole::HopOut,
            _ => continue,
        };
        roles.insert(pool.id(), role);
    }
    roles
}

/// Direct paths plus one two hop path per hop token, using the deepest pool
/// on either side of the hop token.
pub fn simple_hop_paths(
    snapshot: &Snapshot,
    token_in: H160,
    token_out: H160,
    max_pools: usize,
) -> Vec<Path> {
    let roles = pool_roles(snapshot, token_in, token_out, max_pools);
    let pools = sorted_pools(snapshot);

    let mut paths = Vec::new();
    for pool in &pools {
        if roles.get(&pool.id()) == Some(&PoolRole::Direct)
            && pool.pair_data(token_in, token_out).is_ok()
        {
            paths.push(Path::single(Hop {
                pool: pool.id(),
                token_in,
                token_out,
            }));
        }
    }

    // For every hop token, the deepest pool into it and the deepest pool out
    // of it. Later pools win ties so the ordering is deterministic.
    let mut best_in: HashMap<H160, (BigRational, Hop)> = HashMap::new();
    let mut best_out: HashMap<H160, (BigRational, Hop)> = HashMap::new();
    for &pool in &pools {
        match roles.get(&pool.id()) {
            Some(PoolRole::HopIn) => {
                for state in &pool.common.tokens {
                    if state.token == token_in || state.token == token_out {
                        continue;
                    }
                    note_best(&mut best_in, pool, token_in, state.token, state.token);
                }
            }
            Some(PoolRole::HopOut) => {
                for state in &pool.common.tokens {
                    if state.token == token_in || state.token == token_out {
                        continue;
                    }
                    note_best(&mut best_out, pool, state.token, token_out, state.token);
                }
            }
            _ => {}
        }
    }

    let mut hop_tokens = best_in
        .keys()
        .filter(|token| best_out.contains_key(token))
        .copied()
        .collect::<Vec<_>>();
    hop_tokens.sort();
    for token in hop_tokens {
        let (_, into) = &best_in[&token];
        let (_, out_of) = &best_out[&token];
        if let Some(path) = Path::new(vec![*into, *out_of]) {
            paths.push(path);
        }
    }
    paths
}

/// Records the pool as the best way to trade `token_in` for `token_out` if
/// it is at least as liquid as the current best.
fn note_best(
    best: &mut HashMap<H160, (BigRational, Hop)>,
    pool: &Pool,
    token_in: H160,
    token_out: H160,
    hop_token: H160,
) {
    let Ok(pair) = pool.pair_data(token_in, token_out) else {
        return;
    };
    let liquidity = pool.normalized_liquidity(&pair);
    let hop = Hop {
        pool: pool.id(),
        token_in,
        token_out,
    };
    match best.get(&hop_token) {
        Some((current, _)) if liquidity < *current => {}
        _ => {
            best.insert(hop_token, (liquidity, hop));
        }
    }
}

/// Paths routed through the configured hub assets: at most one linear pool
/// wrap on each end plus one bridging pool, optionally extended by a
/// liquidity bootstrapping ramp at either endpoint.
pub fn boosted_paths(
    snapshot: &Snapshot,
    config: &RouterConfig,
    token_in: H160,
    token_out: H160,
) -> Vec<Path> {
    let hubs = [config.base_asset, config.hub_pool_token];
    let pools = sorted_pools(snapshot);

    let in_ramp = bootstrap_ramp(&pools, config, token_in).map(|(pool, counter)| Hop {
        pool,
        token_in,
        token_out: counter,
    });
    let out_ramp = bootstrap_ramp(&pools, config, token_out).map(|(pool, counter)| Hop {
        pool,
        token_in: counter,
        token_out,
    });

    let mut in_semis = Vec::new();
    let mut out_semis = Vec::new();
    for hub in hubs {
        in_semis.extend(semipaths_to_hub(&pools, token_in, hub));
        if let Some(ramp) = in_ramp {
            for semi in semipaths_to_hub(&pools, ramp.token_out, hub) {
                if let Some(path) = Path::single(ramp).compose(&semi) {
                    in_semis.push(path);
                }
            }
        }
        for semi in semipaths_to_hub(&pools, token_out, hub) {
            out_semis.push(semi.reverse());
        }
        if let Some(ramp) = out_ramp {
            for semi in semipaths_to_hub(&pools, ramp.token_in, hub) {
                if let Some(path) = semi.reverse().compose(&Path::single(ramp)) {
                    out_semis.push(path);
                }
            }
        }
    }

    let mut paths = Vec::new();
    for front in &in_semis {
        for back in &out_semis {
            let combined = if front.token_out() == back.token_in() {
                join(front, back)
            } else {
                bridge_hop(snapshot, config, front.token_out(), back.token_in())
                    .and_then(|bridge| join(&Path::single(bridge), back))
                    .and_then(|back| join(front, &back))
            };
            let Some(path) = combined else {
                continue;
            };
            // Anything two hops or shorter is the simple strategy's job.
            if path.len() > 2 && path.len() <= MAX_HOPS && !path.has_cycle() {
                paths.push(path);
            }
        }
    }
    paths
}

/// Runs both strategies and deduplicates by path identity.
pub fn candidate_paths(
    snapshot: &Snapshot,
    config: &RouterConfig,
    token_in: H160,
    token_out: H160,
    max_pools: usize,
) -> Vec<Path> {
    let mut seen = HashSet::new();
    let mut paths = Vec::new();
    let simple = simple_hop_paths(snapshot, token_in, token_out, max_pools);
    let boosted = if max_pools > 2 {
        boosted_paths(snapshot, config, token_in, token_out)
    } else {
        Vec::new()
    };
    for path in simple.into_iter().chain(boosted) {
        if seen.insert(path.clone()) {
            paths.push(path);
        }
    }
    tracing::debug!(candidates = paths.len(), "built candidate paths");
    paths
}

fn join(front: &Path, back: &Path) -> Option<Path> {
    front
        .merge_on_shared_pool(back)
        .or_else(|| front.compose(back))
}

fn sorted_pools(snapshot: &Snapshot) -> Vec<&Pool> {
    let mut pools = snapshot
        .pools()
        .filter(|pool| !pool.common.paused)
        .collect::<Vec<_>>();
    pools.sort_by_key(|pool| pool.id());
    pools
}

/// The deepest pool trading the ordered pair, as a hop.
fn best_pool(pools: &[&Pool], token_in: H160, token_out: H160) -> Option<Hop> {
    let mut best: Option<(BigRational, Hop)> = None;
    for pool in pools {
        let Ok(pair) = pool.pair_data(token_in, token_out) else {
            continue;
        };
        let liquidity = pool.normalized_liquidity(&pair);
        if best.as_ref().is_none_or(|(current, _)| liquidity >= *current) {
            best = Some((
                liquidity,
                Hop {
                    pool: pool.id(),
                    token_in,
                    token_out,
                },
            ));
        }
    }
    best.map(|(_, hop)| hop)
}

/// Semipaths from `token` to `hub`: the deepest direct pool, plus one wrap
/// through each linear pool holding the token followed by the deepest pool
/// from that pool's own token to the hub.
fn semipaths_to_hub(pools: &[&Pool], token: H160, hub: H160) -> Vec<Path> {
    if token == hub {
        return Vec::new();
    }
    let mut semis = Vec::new();
    if let Some(hop) = best_pool(pools, token, hub) {
        semis.push(Path::single(hop));
    }
    for pool in pools {
        let PoolKind::Linear(state) = &pool.kind else {
            continue;
        };
        let tokens = &pool.common.tokens;
        let wraps = tokens[state.main_index].token == token
            || tokens[state.wrapped_index].token == token;
        if !wraps {
            continue;
        }
        let wrap = Hop {
            pool: pool.id(),
            token_in: token,
            token_out: pool.common.address,
        };
        if pool.common.address == hub {
            semis.push(Path::single(wrap));
            continue;
        }
        let Some(bridge) = best_pool(pools, pool.common.address, hub) else {
            continue;
        };
        if let Some(path) = Path::new(vec![wrap, bridge]) {
            semis.push(path);
        }
    }
    semis
}

/// A liquidity bootstrapping pool trading the token against a configured
/// counter asset, if one exists.
fn bootstrap_ramp(
    pools: &[&Pool],
    config: &RouterConfig,
    token: H160,
) -> Option<(H256, H160)> {
    for pool in pools {
        if !matches!(pool.kind, PoolKind::LiquidityBootstrapping(_)) {
            continue;
        }
        for counter in &config.bootstrap_counter_assets {
            if pool.pair_data(token, *counter).is_ok() {
                return Some((pool.id(), *counter));
            }
        }
    }
    None
}

/// The configured hub to hub bridge hop, when it connects the two tokens.
fn bridge_hop(
    snapshot: &Snapshot,
    config: &RouterConfig,
    token_in: H160,
    token_out: H160,
) -> Option<Hop> {
    let pool = snapshot.get(&config.hub_bridge_pool?)?;
    pool.pair_data(token_in, token_out).ok()?;
    Some(Hop {
        pool: pool.id(),
        token_in,
        token_out,
    })
}
