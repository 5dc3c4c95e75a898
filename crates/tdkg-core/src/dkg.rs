//! DKG attempt state machine
//!
//! One attempt exists process-wide. Its state is never stored directly:
//! [`DkgAttempt::state`] is a pure projection of the stored heights and the
//! current height, so tests can assert state without mutating time.

use serde::{Deserialize, Serialize};

use crate::params::DkgParameters;
use crate::types::{keccak256, Address, Hash32};

/// Lifecycle states of the singleton DKG attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DkgState {
    /// No attempt in flight
    Idle,
    /// Pool locked, waiting for the seed source callback
    AwaitingSeed,
    /// Seed known, off-chain key generation in progress
    KeyGeneration,
    /// Submission window open, waiting for a candidate result
    AwaitingResult,
    /// A pending result is inside its challenge window
    Challenge,
}

/// Pending (submitted, not yet approved) result bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingResult {
    /// Canonical hash of the submitted result
    pub hash: Hash32,

    /// Height the result was submitted at
    pub height: u64,

    /// Operator that submitted it
    pub submitter: Address,

    /// Seat the submitter claimed
    pub submitter_member_index: u32,
}

/// The singleton in-flight DKG attempt.
///
/// Exactly one non-idle attempt may exist; every height field is cleared
/// on return to idle.
#[derive(Debug, Clone)]
pub struct DkgAttempt {
    params: DkgParameters,
    group_size: u32,
    seed: Option<Hash32>,
    request_start_height: Option<u64>,
    submission_start_offset: u64,
    pending: Option<PendingResult>,
}

impl DkgAttempt {
    pub fn new(params: DkgParameters, group_size: u32) -> Self {
        Self {
            params,
            group_size,
            seed: None,
            request_start_height: None,
            submission_start_offset: 0,
            pending: None,
        }
    }

    /// Pure state projection from stored data and the current height
    pub fn state(&self, height: u64) -> DkgState {
        if self.pending.is_some() {
            return DkgState::Challenge;
        }
        match (self.request_start_height, self.seed) {
            (None, _) => DkgState::Idle,
            (Some(_), None) => DkgState::AwaitingSeed,
            (Some(_), Some(_)) => {
                if height < self.submission_window_start() {
                    DkgState::KeyGeneration
                } else {
                    DkgState::AwaitingResult
                }
            }
        }
    }

    /// Begin a new attempt at `height`
    pub fn start(&mut self, height: u64) {
        self.request_start_height = Some(height);
        self.submission_start_offset = 0;
    }

    /// Mix delivered entropy with the request height into the attempt seed
    pub fn set_seed(&mut self, entropy: Hash32) -> Hash32 {
        let start = self.request_start_height.unwrap_or(0);
        let seed = keccak256(&[&entropy, &start.to_be_bytes()]);
        self.seed = Some(seed);
        seed
    }

    pub fn seed(&self) -> Option<Hash32> {
        self.seed
    }

    /// Height the attempt was requested at, 0 when idle
    pub fn request_start_height(&self) -> u64 {
        self.request_start_height.unwrap_or(0)
    }

    /// First height of the submission window
    pub fn submission_window_start(&self) -> u64 {
        self.request_start_height() + self.params.offchain_dkg_time + self.submission_start_offset
    }

    /// Last height at which a submission is still accepted
    pub fn timeout_height(&self) -> u64 {
        self.submission_window_start() + self.params.submission_timeout(self.group_size)
    }

    /// Height at which seat `index` rotates into submission eligibility.
    ///
    /// Eligibility is monotone: earlier-eligible seats stay eligible until
    /// the absolute timeout.
    pub fn seat_eligible_at(&self, index: u32) -> u64 {
        self.submission_window_start() + (index as u64 - 1) * self.params.eligibility_delay
    }

    /// Whether seat `index` may submit at `height`
    pub fn is_submitter_eligible(&self, index: u32, height: u64) -> bool {
        height >= self.seat_eligible_at(index)
    }

    /// Whether the attempt ran out of submission time with nothing pending
    pub fn has_timed_out(&self, height: u64) -> bool {
        self.state(height) == DkgState::AwaitingResult && height > self.timeout_height()
    }

    /// Whether the seed source ran out of time
    pub fn has_seed_timed_out(&self, height: u64) -> bool {
        self.state(height) == DkgState::AwaitingSeed
            && height > self.request_start_height() + self.params.seed_timeout
    }

    /// Record a submitted result, opening its challenge window
    pub fn record_pending(&mut self, pending: PendingResult) {
        self.pending = Some(pending);
    }

    pub fn pending(&self) -> Option<&PendingResult> {
        self.pending.as_ref()
    }

    /// Drop the pending result after a successful challenge and move the
    /// submission window forward so the challenged time is not lost:
    /// the window restarts at the challenge height.
    pub fn clear_pending_and_extend(&mut self, height: u64) {
        self.pending = None;
        self.submission_start_offset =
            height.saturating_sub(self.request_start_height() + self.params.offchain_dkg_time);
    }

    /// Return to idle, clearing every height field
    pub fn reset(&mut self) {
        self.seed = None;
        self.request_start_height = None;
        self.submission_start_offset = 0;
        self.pending = None;
    }

    pub fn params(&self) -> &DkgParameters {
        &self.params
    }
}
