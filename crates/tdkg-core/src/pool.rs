//! Weighted operator pool
//!
//! Tracks operator registrations and a selection weight proportional to the
//! authorized collateral of each operator's backing account. Weight is a
//! snapshot: it reflects the last explicit synchronization, never the live
//! staking value, and the pool lock freezes that snapshot for the duration
//! of an in-flight DKG attempt.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::staking::Staking;
use crate::types::{keccak256, Address, Hash32};

/// Pool view of a registered operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMember {
    /// Operator identity
    pub operator: Address,

    /// Backing (staking) account bound at registration
    pub backing: Address,

    /// Weight at the last synchronization
    pub weight: u64,

    /// Whether the operator currently occupies a pool seat
    pub in_pool: bool,
}

#[derive(Debug, Clone)]
struct OperatorEntry {
    backing: Address,
    weight: u64,
}

/// Weighted operator pool with deterministic seeded group selection
#[derive(Debug, Default)]
pub struct SortitionPool {
    weight_divisor: u128,
    /// Registration-ordered operators holding a seat (weight > 0)
    seats: Vec<Address>,
    operators: HashMap<Address, OperatorEntry>,
    backing_index: HashMap<Address, Address>,
    locked: bool,
    /// Backing account -> banned-until height for reward eligibility
    reward_bans: HashMap<Address, u64>,
}

impl SortitionPool {
    pub fn new(weight_divisor: u128) -> Self {
        Self {
            weight_divisor,
            ..Default::default()
        }
    }

    /// Bind a backing account to an operator identity.
    ///
    /// Fails if either side is already mapped, or if the backing account
    /// has an unapproved authorization decrease (joining with stale state).
    pub fn register_operator<S: Staking>(
        &mut self,
        operator: Address,
        backing: Address,
        staking: &S,
    ) -> Result<()> {
        if self.operators.contains_key(&operator) || self.backing_index.contains_key(&backing) {
            return Err(Error::AlreadyRegistered);
        }
        if staking.has_pending_authorization_decrease(backing) {
            return Err(Error::PendingAuthorizationDecrease);
        }

        self.operators
            .insert(operator, OperatorEntry { backing, weight: 0 });
        self.backing_index.insert(backing, operator);
        debug!(%operator, %backing, "operator registered");
        Ok(())
    }

    /// Recompute an operator's weight from its current authorized stake and
    /// insert, update, or remove its pool seat accordingly.
    ///
    /// Callable by anyone and idempotent. Rejected while the pool is locked
    /// so selection outcomes stay frozen for the in-flight attempt.
    pub fn update_operator_status<S: Staking>(
        &mut self,
        operator: Address,
        staking: &S,
    ) -> Result<u64> {
        if self.locked {
            return Err(Error::SortitionPoolLocked);
        }
        let entry = self
            .operators
            .get_mut(&operator)
            .ok_or(Error::OperatorNotRegistered)?;

        let authorized = staking.authorized_stake(entry.backing);
        let weight = (authorized / self.weight_divisor) as u64;
        let had_seat = entry.weight > 0;
        entry.weight = weight;

        match (had_seat, weight > 0) {
            (false, true) => self.seats.push(operator),
            (true, false) => self.seats.retain(|seat| *seat != operator),
            _ => {}
        }

        debug!(%operator, weight, "operator status updated");
        Ok(weight)
    }

    /// Freeze the pool for an in-flight attempt
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Release the pool after the attempt concluded
    pub fn unlock(&mut self) {
        self.locked = false;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Sum of all seat weights at the last synchronization
    pub fn total_weight(&self) -> u64 {
        self.seats
            .iter()
            .map(|operator| self.operators[operator].weight)
            .sum()
    }

    /// Deterministic weighted sampling of `group_size` seats from `seed`.
    ///
    /// Each seat draws `keccak256(seed ‖ seat)` against the cumulative
    /// weight line, so the same pool state and seed always reproduce the
    /// same group. An operator may win several seats; duplicates only
    /// concentrate voting power.
    pub fn select_group(&self, group_size: u32, seed: Hash32) -> Result<Vec<Address>> {
        let total_weight = self.total_weight();
        if total_weight == 0 {
            return Err(Error::SortitionPoolEmpty);
        }

        let mut group = Vec::with_capacity(group_size as usize);
        for seat in 1..=group_size {
            let digest = keccak256(&[&seed, &seat.to_be_bytes()]);
            let mut draw_bytes = [0u8; 8];
            draw_bytes.copy_from_slice(&digest[..8]);
            let mut draw = u64::from_be_bytes(draw_bytes) % total_weight;

            for operator in &self.seats {
                let weight = self.operators[operator].weight;
                if draw < weight {
                    group.push(*operator);
                    break;
                }
                draw -= weight;
            }
        }
        Ok(group)
    }

    /// Pool view of a registered operator, if any
    pub fn member(&self, operator: Address) -> Option<PoolMember> {
        self.operators.get(&operator).map(|entry| PoolMember {
            operator,
            backing: entry.backing,
            weight: entry.weight,
            in_pool: entry.weight > 0,
        })
    }

    /// Backing account bound to an operator identity
    pub fn backing_of(&self, operator: Address) -> Option<Address> {
        self.operators.get(&operator).map(|entry| entry.backing)
    }

    pub fn is_operator_registered(&self, operator: Address) -> bool {
        self.operators.contains_key(&operator)
    }

    pub fn is_operator_in_pool(&self, operator: Address) -> bool {
        self.operators
            .get(&operator)
            .map(|entry| entry.weight > 0)
            .unwrap_or(false)
    }

    /// Make backing accounts ineligible for pool rewards until `until`
    pub fn ban_rewards(&mut self, backings: &[Address], until: u64) {
        for backing in backings {
            let ban = self.reward_bans.entry(*backing).or_insert(0);
            if until > *ban {
                *ban = until;
            }
        }
    }

    /// Whether a backing account may currently collect pool rewards
    pub fn is_eligible_for_rewards(&self, backing: Address, height: u64) -> bool {
        self.reward_bans
            .get(&backing)
            .map(|until| height >= *until)
            .unwrap_or(true)
    }
}
