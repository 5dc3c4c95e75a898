//! Wallet coordinator
//!
//! The central facade owning the sortition pool, the singleton DKG
//! attempt, and the wallet registry. Every caller-facing operation lives
//! here; each one is an atomic transition that either fully applies or
//! fails with a descriptive error, and returns the events it emitted.

use tracing::{info, instrument, warn};

use crate::dkg::{DkgAttempt, DkgState, PendingResult};
use crate::error::{Error, Result, ValidationError};
use crate::events::Event;
use crate::inactivity::{inactive_backings, verify_claim};
use crate::params::{DkgParameters, GroupConfig};
use crate::pool::SortitionPool;
use crate::registry::{WalletOwner, WalletRegistry};
use crate::staking::Staking;
use crate::types::{keccak256, Address, DkgResult, Hash32, InactivityClaim, Wallet, WalletId};
use crate::validator;

/// Coordinates DKG attempts, result validation, and wallet finalization.
///
/// Generic over the staking ledger and the owning application, the two
/// external collaborators at the boundary of the core.
pub struct WalletCoordinator<S: Staking, O: WalletOwner> {
    config: GroupConfig,
    wallet_owner: Address,
    seed_provider: Address,
    pool: SortitionPool,
    dkg: DkgAttempt,
    registry: WalletRegistry<O>,
    staking: S,
}

impl<S: Staking, O: WalletOwner> WalletCoordinator<S, O> {
    pub fn new(
        config: GroupConfig,
        params: DkgParameters,
        wallet_owner: Address,
        seed_provider: Address,
        staking: S,
        owner: O,
    ) -> Self {
        let pool = SortitionPool::new(config.weight_divisor);
        let dkg = DkgAttempt::new(params, config.group_size);
        Self {
            config,
            wallet_owner,
            seed_provider,
            pool,
            dkg,
            registry: WalletRegistry::new(owner),
            staking,
        }
    }

    // ---- operator management -------------------------------------------

    /// Bind a backing account to an operator identity
    pub fn register_operator(&mut self, operator: Address, backing: Address) -> Result<Vec<Event>> {
        self.pool.register_operator(operator, backing, &self.staking)?;
        Ok(vec![Event::OperatorRegistered { operator, backing }])
    }

    /// Resynchronize an operator's pool weight from its authorized stake
    pub fn update_operator_status(&mut self, operator: Address) -> Result<Vec<Event>> {
        let weight = self.pool.update_operator_status(operator, &self.staking)?;
        Ok(vec![Event::OperatorStatusUpdated { operator, weight }])
    }

    // ---- DKG lifecycle -------------------------------------------------

    /// Begin a new wallet-creation attempt.
    ///
    /// Owner-only; locks the pool and waits for the seed source callback.
    #[instrument(skip(self))]
    pub fn request_new_wallet(&mut self, caller: Address, height: u64) -> Result<Vec<Event>> {
        if caller != self.wallet_owner {
            return Err(Error::NotWalletOwner);
        }
        let state = self.dkg.state(height);
        if state != DkgState::Idle {
            return Err(Error::InvalidState {
                expected: DkgState::Idle,
                actual: state,
            });
        }

        self.pool.lock();
        self.dkg.start(height);
        info!(height, "new wallet requested, awaiting seed");
        Ok(vec![Event::DkgStateLocked])
    }

    /// Seed source callback delivering entropy for the attempt
    #[instrument(skip(self, entropy))]
    pub fn submit_seed_entropy(
        &mut self,
        caller: Address,
        entropy: Hash32,
        height: u64,
    ) -> Result<Vec<Event>> {
        if caller != self.seed_provider {
            return Err(Error::NotSeedProvider);
        }
        let state = self.dkg.state(height);
        if state != DkgState::AwaitingSeed {
            return Err(Error::InvalidState {
                expected: DkgState::AwaitingSeed,
                actual: state,
            });
        }

        let seed = self.dkg.set_seed(entropy);
        info!(seed = %hex::encode(seed), "DKG started");
        Ok(vec![Event::DkgStarted { seed }])
    }

    /// Reset an attempt whose seed source never delivered
    #[instrument(skip(self))]
    pub fn notify_seed_timeout(&mut self, height: u64) -> Result<Vec<Event>> {
        let state = self.dkg.state(height);
        if state != DkgState::AwaitingSeed {
            return Err(Error::InvalidState {
                expected: DkgState::AwaitingSeed,
                actual: state,
            });
        }
        if !self.dkg.has_seed_timed_out(height) {
            return Err(Error::SeedTimeoutNotPassed);
        }

        self.dkg.reset();
        self.pool.unlock();
        warn!(height, "seed timed out, attempt reset");
        Ok(vec![Event::DkgSeedTimedOut])
    }

    /// Submit a candidate DKG result.
    ///
    /// The caller must be the operator seated at the claimed submitter
    /// index, and that seat must have rotated into eligibility. Field and
    /// membership validation must pass or nothing is recorded.
    #[instrument(skip(self, result), fields(result_hash = %hex::encode(result.hash())))]
    pub fn submit_dkg_result(
        &mut self,
        caller: Address,
        result: &DkgResult,
        height: u64,
    ) -> Result<Vec<Event>> {
        let state = self.dkg.state(height);
        if state != DkgState::AwaitingResult {
            return Err(Error::InvalidState {
                expected: DkgState::AwaitingResult,
                actual: state,
            });
        }
        if !self.pool.is_locked() {
            return Err(Error::SortitionPoolUnlocked);
        }
        if height > self.dkg.timeout_height() {
            return Err(Error::DkgTimeoutAlreadyPassed);
        }

        let index = result.submitter_member_index;
        if index == 0 || index > self.config.group_size {
            return Err(Error::InvalidSubmitterIndex);
        }
        if result.members.get(index as usize - 1) != Some(&caller) {
            return Err(Error::SubmitterMismatch);
        }
        if !self.dkg.is_submitter_eligible(index, height) {
            return Err(Error::SubmitterNotEligible);
        }

        // state == AwaitingResult implies the seed is set.
        let seed = self.dkg.seed().ok_or(Error::InvalidState {
            expected: DkgState::AwaitingResult,
            actual: DkgState::Idle,
        })?;
        validator::validate_submission(result, &self.pool, &self.config, seed)?;

        let result_hash = result.hash();
        self.dkg.record_pending(PendingResult {
            hash: result_hash,
            height,
            submitter: caller,
            submitter_member_index: index,
        });
        info!(submitter_member_index = index, "DKG result submitted");
        Ok(vec![Event::DkgResultSubmitted {
            result_hash,
            submitter_member_index: index,
            submitter: caller,
        }])
    }

    /// Challenge the pending result.
    ///
    /// Succeeds iff any validation phase fails, in which case the
    /// submitter is slashed, the pending result is dropped, and the
    /// submission window restarts. A challenge of a fully valid result
    /// fails with [`Error::UnjustifiedChallenge`].
    #[instrument(skip(self, result))]
    pub fn challenge_dkg_result(
        &mut self,
        caller: Address,
        result: &DkgResult,
        height: u64,
    ) -> Result<Vec<Event>> {
        let state = self.dkg.state(height);
        if state != DkgState::Challenge {
            return Err(Error::InvalidState {
                expected: DkgState::Challenge,
                actual: state,
            });
        }
        let Some(pending) = self.dkg.pending() else {
            return Err(Error::InvalidState {
                expected: DkgState::Challenge,
                actual: state,
            });
        };
        let result_hash = result.hash();
        if result_hash != pending.hash {
            return Err(Error::ResultMismatch);
        }
        if height >= pending.height + self.dkg.params().challenge_period_length {
            return Err(Error::ChallengePeriodPassed);
        }

        let seed = self.dkg.seed().ok_or(Error::InvalidState {
            expected: DkgState::Challenge,
            actual: DkgState::Idle,
        })?;
        let start_height = self.dkg.request_start_height();
        let reason = match validator::validate(result, &self.pool, &self.config, seed, start_height)
        {
            Ok(()) => return Err(Error::UnjustifiedChallenge),
            Err(validation_error) => validation_error.to_string(),
        };

        let submitter = pending.submitter;
        if let Some(backing) = self.pool.backing_of(submitter) {
            self.staking.seize(
                self.dkg.params().slashing_amount,
                self.dkg.params().notifier_reward_multiplier,
                caller,
                &[backing],
            );
        }
        self.dkg.clear_pending_and_extend(height);

        warn!(%submitter, reason, "DKG result challenged, submitter slashed");
        Ok(vec![Event::DkgResultChallenged {
            result_hash,
            challenger: caller,
            reason,
        }])
    }

    /// Approve the pending result after its challenge period.
    ///
    /// The original submitter has precedence for one rotation step; any
    /// caller may approve afterwards. Registers and activates the wallet,
    /// unlocks the pool, and resets the attempt.
    #[instrument(skip(self, result))]
    pub fn approve_dkg_result(
        &mut self,
        caller: Address,
        result: &DkgResult,
        height: u64,
    ) -> Result<Vec<Event>> {
        let state = self.dkg.state(height);
        if state != DkgState::Challenge {
            return Err(Error::InvalidState {
                expected: DkgState::Challenge,
                actual: state,
            });
        }
        let Some(pending) = self.dkg.pending() else {
            return Err(Error::InvalidState {
                expected: DkgState::Challenge,
                actual: state,
            });
        };
        let result_hash = result.hash();
        if result_hash != pending.hash {
            return Err(Error::ResultMismatch);
        }

        let challenge_end = pending.height + self.dkg.params().challenge_period_length;
        if height < challenge_end {
            return Err(Error::ChallengePeriodNotElapsed);
        }
        if caller != pending.submitter
            && height < challenge_end + self.dkg.params().eligibility_delay
        {
            return Err(Error::OnlySubmitterCanApprove);
        }

        let (public_key_x, public_key_y) = result
            .public_key_halves()
            .ok_or(Error::Validation(ValidationError::MalformedPublicKey))?;
        let wallet = Wallet {
            id: result.wallet_id(),
            public_key_x,
            public_key_y,
            members_hash: result.members_hash,
            activation_height: height,
        };
        let wallet_id = wallet.id;
        self.registry.register_wallet(wallet)?;

        let mut events = vec![
            Event::DkgResultApproved {
                result_hash,
                approver: caller,
            },
            Event::WalletCreated {
                wallet_id,
                dkg_result_hash: result_hash,
            },
        ];

        // Misbehaved members sit out pool rewards for the ban duration.
        if !result.misbehaved_members_indices.is_empty() {
            let backings: Vec<Address> = result
                .misbehaved_members_indices
                .iter()
                .filter_map(|&seat| {
                    result
                        .members
                        .get(seat as usize - 1)
                        .and_then(|member| self.pool.backing_of(*member))
                })
                .collect();
            let until = height + self.dkg.params().rewards_ban_duration;
            self.pool.ban_rewards(&backings, until);
            events.push(Event::RewardsBanned {
                accounts: backings,
                until,
            });
        }

        self.dkg.reset();
        self.pool.unlock();

        if !self.registry.notify_wallet_created(wallet_id) {
            events.push(Event::WalletOwnerNotificationFailed { wallet_id });
        }

        info!(wallet_id = %hex::encode(wallet_id), "DKG result approved, wallet created");
        Ok(events)
    }

    /// Reset an attempt that received no valid result in time
    #[instrument(skip(self))]
    pub fn notify_dkg_timeout(&mut self, height: u64) -> Result<Vec<Event>> {
        if !self.dkg.has_timed_out(height) {
            return Err(Error::DkgTimeoutNotPassed);
        }

        self.dkg.reset();
        self.pool.unlock();
        warn!(height, "DKG timed out, attempt reset");
        Ok(vec![Event::DkgTimedOut])
    }

    // ---- inactivity claims ---------------------------------------------

    /// Process a threshold-signed claim that specific wallet members went
    /// silent.
    ///
    /// `current_members` is the wallet's final member set in seat order,
    /// authenticated against the stored fingerprint. The caller must be
    /// one of the claim signers.
    #[instrument(skip(self, claim, current_members), fields(wallet_id = %hex::encode(claim.wallet_id)))]
    pub fn notify_operator_inactivity(
        &mut self,
        caller: Address,
        claim: &InactivityClaim,
        current_members: &[Address],
        height: u64,
    ) -> Result<Vec<Event>> {
        let wallet = self
            .registry
            .wallet(&claim.wallet_id)
            .ok_or(Error::WalletNotFound)?;

        let member_bytes: Vec<&[u8]> = current_members
            .iter()
            .map(|member| member.as_bytes().as_slice())
            .collect();
        if keccak256(&member_bytes) != wallet.members_hash {
            return Err(Error::WalletMembersMismatch);
        }

        let expected_nonce = self.registry.nonce(&claim.wallet_id);
        if claim.nonce != expected_nonce {
            return Err(Error::InvalidNonce {
                expected: expected_nonce,
                actual: claim.nonce,
            });
        }

        let public_key = wallet.public_key();
        let signers = verify_claim(
            claim,
            &public_key,
            current_members,
            &self.pool,
            self.config.group_threshold,
        )?;
        if !signers.contains(&caller) {
            return Err(Error::SenderMustBeClaimSigner);
        }

        self.registry.increment_nonce(&claim.wallet_id);

        let backings = inactive_backings(claim, current_members, &self.pool);
        let until = height + self.dkg.params().rewards_ban_duration;
        self.pool.ban_rewards(&backings, until);

        let mut events = vec![
            Event::InactivityClaimed {
                wallet_id: claim.wallet_id,
                nonce: claim.nonce,
                notifier: caller,
            },
            Event::RewardsBanned {
                accounts: backings,
                until,
            },
        ];

        if claim.heartbeat_failed && !self.registry.notify_heartbeat_failed(claim.wallet_id) {
            events.push(Event::WalletOwnerNotificationFailed {
                wallet_id: claim.wallet_id,
            });
        }

        info!(nonce = claim.nonce, "inactivity claim processed");
        Ok(events)
    }

    // ---- read-only queries ---------------------------------------------

    /// Current DKG state at `height`; pure, no side effects
    pub fn dkg_state(&self, height: u64) -> DkgState {
        self.dkg.state(height)
    }

    /// Whether the attempt can be timed out at `height`
    pub fn has_dkg_timed_out(&self, height: u64) -> bool {
        self.dkg.has_timed_out(height)
    }

    /// Seed of the in-flight attempt, once delivered
    pub fn dkg_seed(&self) -> Option<Hash32> {
        self.dkg.seed()
    }

    /// Wallet lookup by id
    pub fn wallet(&self, id: &WalletId) -> Option<&Wallet> {
        self.registry.wallet(id)
    }

    /// Current inactivity nonce of a wallet
    pub fn wallet_nonce(&self, id: &WalletId) -> u64 {
        self.registry.nonce(id)
    }

    pub fn pool(&self) -> &SortitionPool {
        &self.pool
    }

    pub fn staking(&self) -> &S {
        &self.staking
    }

    pub fn registry(&self) -> &WalletRegistry<O> {
        &self.registry
    }

    /// The in-flight attempt, for inspection
    pub fn dkg(&self) -> &DkgAttempt {
        &self.dkg
    }
}
