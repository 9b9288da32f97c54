//! Swap path primitives shared by the path building strategies.

use itertools::Itertools as _;
use primitive_types::{H160, H256};

/// One swap through one pool.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Hop {
    pub pool: H256,
    pub token_in: H160,
    pub token_out: H160,
}

/// An ordered sequence of hops where each hop's out token is the next hop's
/// in token and no pool appears twice.
///
/// Equality and hashing are over the full hop sequence, which is also the
/// path's identity for deduplication purposes.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Path {
    hops: Vec<Hop>,
}

impl Path {
    /// Builds a path from hops, or `None` when the hops are not contiguous,
    /// repeat a pool, or the sequence is empty.
    pub fn new(hops: Vec<Hop>) -> Option<Self> {
        if hops.is_empty() {
            return None;
        }
        let contiguous = hops
            .iter()
            .tuple_windows()
            .all(|(hop, next)| hop.token_out == next.token_in);
        if !contiguous || !hops.iter().map(|hop| hop.pool).all_unique() {
            return None;
        }
        Some(Self { hops })
    }

    pub fn single(hop: Hop) -> Self {
        Self { hops: vec![hop] }
    }

    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        // Paths are never empty by construction.
        false
    }

    pub fn token_in(&self) -> H160 {
        self.hops[0].token_in
    }

    pub fn token_out(&self) -> H160 {
        self.hops[self.hops.len() - 1].token_out
    }

    /// The token sequence the path visits, starting with the in token.
    pub fn tokens(&self) -> impl Iterator<Item = H160> + '_ {
        std::iter::once(self.token_in()).chain(self.hops.iter().map(|hop| hop.token_out))
    }

    /// Whether the path visits any token more than once.
    pub fn has_cycle(&self) -> bool {
        !self.tokens().all_unique()
    }

    /// Concatenates two paths. `None` when they do not meet at a common
    /// token or share a pool.
    pub fn compose(&self, other: &Self) -> Option<Self> {
        if self.token_out() != other.token_in() {
            return None;
        }
        let hops = self
            .hops
            .iter()
            .chain(&other.hops)
            .copied()
            .collect::<Vec<_>>();
        Self::new(hops)
    }

    /// Concatenates two paths that meet at a common token through the same
    /// pool, collapsing the doubled pool into one direct hop. `None` when
    /// the paths do not share their boundary pool or any other pool
    /// repeats.
    pub fn merge_on_shared_pool(&self, other: &Self) -> Option<Self> {
        if self.token_out() != other.token_in() {
            return None;
        }
        let last = self.hops.last()?;
        let first = other.hops.first()?;
        if last.pool != first.pool {
            return None;
        }
        let merged = Hop {
            pool: last.pool,
            token_in: last.token_in,
            token_out: first.token_out,
        };
        let hops = self.hops[..self.hops.len() - 1]
            .iter()
            .chain(std::iter::once(&merged))
            .chain(&other.hops[1..])
            .copied()
            .collect::<Vec<_>>();
        Self::new(hops)
    }

    /// The same path traded in the opposite direction.
    pub fn reverse(&self) -> Self {
        Self {
            hops: self
                .hops
                .iter()
                .rev()
                .map(|hop| Hop {
                    pool: hop.pool,
                    token_in: hop.token_out,
                    token_out: hop.token_in,
                })
                .collect(),
        }
    }
}
