//! Events emitted by coordination operations
//!
//! Every mutating operation returns the events it produced; they are the
//! caller-visible record of what happened and mirror what the operation
//! logs via `tracing`.

use serde::{Deserialize, Serialize};

use crate::types::{Address, Hash32, WalletId};

/// Observable effects of a coordination operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// An operator identity was bound to a backing account
    OperatorRegistered { operator: Address, backing: Address },

    /// An operator's pool weight was resynchronized
    OperatorStatusUpdated { operator: Address, weight: u64 },

    /// A new wallet was requested; the pool is locked for the attempt
    DkgStateLocked,

    /// Seed entropy arrived; off-chain key generation may begin
    DkgStarted { seed: Hash32 },

    /// A candidate result passed submission-time validation
    DkgResultSubmitted {
        result_hash: Hash32,
        submitter_member_index: u32,
        submitter: Address,
    },

    /// A pending result was invalidated; the submitter was slashed
    DkgResultChallenged {
        result_hash: Hash32,
        challenger: Address,
        reason: String,
    },

    /// A pending result survived its challenge period and was approved
    DkgResultApproved { result_hash: Hash32, approver: Address },

    /// A wallet was registered from an approved result
    WalletCreated {
        wallet_id: WalletId,
        dkg_result_hash: Hash32,
    },

    /// Best-effort owner notification failed; never fatal
    WalletOwnerNotificationFailed { wallet_id: WalletId },

    /// The attempt produced no approved result in time and was reset
    DkgTimedOut,

    /// The seed source never delivered entropy and the attempt was reset
    DkgSeedTimedOut,

    /// An inactivity claim was processed against a wallet
    InactivityClaimed {
        wallet_id: WalletId,
        nonce: u64,
        notifier: Address,
    },

    /// Backing accounts were made ineligible for pool rewards
    RewardsBanned { accounts: Vec<Address>, until: u64 },
}
