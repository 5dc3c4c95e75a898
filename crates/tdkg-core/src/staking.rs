//! Staking seam
//!
//! The coordination core never holds collateral itself; it reads authorized
//! amounts from, and delegates slashing to, an external staking ledger
//! behind the [`Staking`] trait.

use std::collections::{HashMap, HashSet};

use crate::types::Address;

/// External staking ledger at the boundary of the core
pub trait Staking {
    /// Collateral the backing account has authorized for this application
    fn authorized_stake(&self, backing: Address) -> u128;

    /// Whether the backing account has an unapproved authorization-decrease
    /// request
    fn has_pending_authorization_decrease(&self, backing: Address) -> bool;

    /// Seize `amount` from each backing account, paying `reward_multiplier`
    /// percent of the notification reward to `notifier`
    fn seize(
        &mut self,
        amount: u128,
        reward_multiplier: u8,
        notifier: Address,
        backings: &[Address],
    );
}

/// Record of a single [`Staking::seize`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seizure {
    pub amount: u128,
    pub reward_multiplier: u8,
    pub notifier: Address,
    pub backings: Vec<Address>,
}

/// In-memory staking ledger for local testing and simulation
#[derive(Debug, Default)]
pub struct InMemoryStaking {
    stakes: HashMap<Address, u128>,
    pending_decreases: HashSet<Address>,
    seizures: Vec<Seizure>,
}

impl InMemoryStaking {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the authorized stake of a backing account
    pub fn set_stake(&mut self, backing: Address, amount: u128) {
        self.stakes.insert(backing, amount);
    }

    /// Flag a backing account as having a pending authorization decrease
    pub fn request_decrease(&mut self, backing: Address) {
        self.pending_decreases.insert(backing);
    }

    /// Approve (clear) a pending authorization decrease
    pub fn approve_decrease(&mut self, backing: Address) {
        self.pending_decreases.remove(&backing);
    }

    /// Seizures recorded so far, oldest first
    pub fn seizures(&self) -> &[Seizure] {
        &self.seizures
    }
}

impl Staking for InMemoryStaking {
    fn authorized_stake(&self, backing: Address) -> u128 {
        self.stakes.get(&backing).copied().unwrap_or(0)
    }

    fn has_pending_authorization_decrease(&self, backing: Address) -> bool {
        self.pending_decreases.contains(&backing)
    }

    fn seize(
        &mut self,
        amount: u128,
        reward_multiplier: u8,
        notifier: Address,
        backings: &[Address],
    ) {
        for backing in backings {
            let stake = self.stakes.entry(*backing).or_insert(0);
            *stake = stake.saturating_sub(amount);
        }
        self.seizures.push(Seizure {
            amount,
            reward_multiplier,
            notifier,
            backings: backings.to_vec(),
        });
    }
}
