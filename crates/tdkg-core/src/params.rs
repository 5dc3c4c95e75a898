//! Configuration for the group and the DKG lifecycle

use serde::{Deserialize, Serialize};

/// Static group parameters shared by every attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Number of seats sampled per attempt
    pub group_size: u32,

    /// Signatures required to certify a result or an inactivity claim
    pub group_threshold: u32,

    /// Divisor turning authorized collateral into pool weight
    pub weight_divisor: u128,

    /// Chain scope bound into every result signing payload
    pub chain_id: u64,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            group_size: 100,
            group_threshold: 51,
            weight_divisor: 1_000_000_000_000_000_000,
            chain_id: 1,
        }
    }
}

/// Governable timing and penalty parameters of the DKG lifecycle.
///
/// All durations are expressed in blocks on the ledger's height axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DkgParameters {
    /// Blocks the seed source gets to deliver entropy before the attempt
    /// can be reset
    pub seed_timeout: u64,

    /// Blocks reserved for the off-chain key-generation protocol before
    /// the submission window opens
    pub offchain_dkg_time: u64,

    /// Rotation step: seat k becomes an eligible submitter `(k-1)` steps
    /// after the submission window opens
    pub eligibility_delay: u64,

    /// Blocks a pending result stays challengeable
    pub challenge_period_length: u64,

    /// Collateral seized from the submitter of a challenged result
    pub slashing_amount: u128,

    /// Percentage of the notification reward paid to a challenger
    pub notifier_reward_multiplier: u8,

    /// Blocks a penalized account stays ineligible for pool rewards
    pub rewards_ban_duration: u64,
}

impl Default for DkgParameters {
    fn default() -> Self {
        Self {
            seed_timeout: 8,
            offchain_dkg_time: 72,
            eligibility_delay: 5,
            challenge_period_length: 10,
            slashing_amount: 400_000_000_000_000_000_000,
            notifier_reward_multiplier: 100,
            rewards_ban_duration: 100_800,
        }
    }
}

impl DkgParameters {
    /// Total length of the submission window: every seat's rotation step
    pub fn submission_timeout(&self, group_size: u32) -> u64 {
        self.eligibility_delay * group_size as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_timeout_covers_every_seat() {
        let params = DkgParameters {
            eligibility_delay: 5,
            ..Default::default()
        };
        assert_eq!(params.submission_timeout(100), 500);
    }

    #[test]
    fn test_default_group_is_51_of_100() {
        let config = GroupConfig::default();
        assert_eq!(config.group_size, 100);
        assert_eq!(config.group_threshold, 51);
    }
}
