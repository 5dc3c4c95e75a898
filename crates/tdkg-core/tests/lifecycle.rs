//! End-to-end wallet-creation lifecycle tests: request, seed delivery,
//! result submission under the rotating eligibility window, challenge,
//! approval, timeout recovery, and inactivity claims, all against a
//! 51-of-100 group of real secp256k1 keys.

use std::collections::HashMap;

use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;

use tdkg_core::{
    keccak256, members_fingerprint, Address, DkgParameters, DkgResult, DkgState, Error, Event,
    GroupConfig, InMemoryStaking, InactivityClaim, RecordingWalletOwner, ValidationError,
    WalletCoordinator, GROUP_PUBLIC_KEY_LEN,
};

const WALLET_OWNER: Address = Address([0xaa; 20]);
const SEED_PROVIDER: Address = Address([0xbb; 20]);
const OUTSIDER: Address = Address([0xcc; 20]);

const REQUEST_HEIGHT: u64 = 1_000;
// request + offchain_dkg_time (72)
const WINDOW_START: u64 = 1_072;

struct Harness {
    coordinator: WalletCoordinator<InMemoryStaking, RecordingWalletOwner>,
    /// operator identity -> backing signing key
    keys: HashMap<Address, SigningKey>,
    config: GroupConfig,
}

fn harness() -> Harness {
    let config = GroupConfig {
        weight_divisor: 1,
        ..Default::default()
    };
    let params = DkgParameters::default();

    let mut staking = InMemoryStaking::new();
    let mut keys = HashMap::new();
    let mut operators = Vec::new();
    for byte in 1..=100u8 {
        let operator = Address([byte; 20]);
        let key = SigningKey::random(&mut OsRng);
        let backing = Address::from_public_key(key.verifying_key());
        staking.set_stake(backing, 100);
        keys.insert(operator, key);
        operators.push((operator, backing));
    }

    let mut coordinator = WalletCoordinator::new(
        config.clone(),
        params,
        WALLET_OWNER,
        SEED_PROVIDER,
        staking,
        RecordingWalletOwner::new(),
    );
    for (operator, backing) in operators {
        coordinator.register_operator(operator, backing).unwrap();
        coordinator.update_operator_status(operator).unwrap();
    }

    Harness {
        coordinator,
        keys,
        config,
    }
}

/// Request a wallet and deliver entropy; returns the attempt seed.
fn start_attempt(harness: &mut Harness) -> [u8; 32] {
    harness
        .coordinator
        .request_new_wallet(WALLET_OWNER, REQUEST_HEIGHT)
        .unwrap();
    harness
        .coordinator
        .submit_seed_entropy(SEED_PROVIDER, [8u8; 32], REQUEST_HEIGHT + 4)
        .unwrap();
    harness.coordinator.dkg_seed().unwrap()
}

/// Build a result signed by the true selected group.
fn build_result(
    harness: &Harness,
    seed: [u8; 32],
    signature_count: usize,
    misbehaved: &[u32],
) -> DkgResult {
    let members = harness
        .coordinator
        .pool()
        .select_group(harness.config.group_size, seed)
        .unwrap();

    let mut result = DkgResult {
        submitter_member_index: 1,
        group_public_key: vec![7u8; GROUP_PUBLIC_KEY_LEN],
        misbehaved_members_indices: misbehaved.to_vec(),
        signatures: vec![],
        signing_members_indices: vec![],
        members: members.clone(),
        members_hash: members_fingerprint(&members, misbehaved),
    };

    let payload = result.signed_payload(harness.config.chain_id, REQUEST_HEIGHT);
    for seat in 1..=signature_count {
        let key = &harness.keys[&members[seat - 1]];
        let (signature, recovery_id) = key.sign_prehash_recoverable(&payload).unwrap();
        result.signatures.extend_from_slice(&signature.to_bytes());
        result.signatures.push(recovery_id.to_byte());
        result.signing_members_indices.push(seat as u32);
    }
    result
}

#[test]
fn test_accepts_threshold_result_from_first_eligible_seat() {
    let mut harness = harness();
    let seed = start_attempt(&mut harness);

    assert_eq!(
        harness.coordinator.dkg_state(WINDOW_START),
        DkgState::AwaitingResult
    );

    // Scenario A: exactly 51 ascending signatures from the true group,
    // submitted by seat 1 at window start.
    let result = build_result(&harness, seed, 51, &[]);
    let submitter = result.members[0];
    let events = harness
        .coordinator
        .submit_dkg_result(submitter, &result, WINDOW_START)
        .unwrap();

    assert!(matches!(events[0], Event::DkgResultSubmitted { .. }));
    assert_eq!(
        harness.coordinator.dkg_state(WINDOW_START),
        DkgState::Challenge
    );
}

#[test]
fn test_rejects_result_below_threshold() {
    let mut harness = harness();
    let seed = start_attempt(&mut harness);

    // Scenario B: 50 of 100 signatures is one short of the threshold.
    let result = build_result(&harness, seed, 50, &[]);
    let submitter = result.members[0];
    assert_eq!(
        harness
            .coordinator
            .submit_dkg_result(submitter, &result, WINDOW_START),
        Err(Error::Validation(ValidationError::TooFewSignatures))
    );
    // Nothing was recorded.
    assert_eq!(
        harness.coordinator.dkg_state(WINDOW_START),
        DkgState::AwaitingResult
    );
}

#[test]
fn test_second_seat_is_not_eligible_at_window_start() {
    let mut harness = harness();
    let seed = start_attempt(&mut harness);

    // Scenario C: seat 2 rotates in only one eligibility delay later.
    let mut result = build_result(&harness, seed, 51, &[]);
    result.submitter_member_index = 2;
    let submitter = result.members[1];
    assert_eq!(
        harness
            .coordinator
            .submit_dkg_result(submitter, &result, WINDOW_START),
        Err(Error::SubmitterNotEligible)
    );
    assert!(harness
        .coordinator
        .submit_dkg_result(submitter, &result, WINDOW_START + 5)
        .is_ok());
}

#[test]
fn test_submitter_must_hold_the_claimed_seat() {
    let mut harness = harness();
    let seed = start_attempt(&mut harness);

    let result = build_result(&harness, seed, 51, &[]);
    assert_eq!(
        harness
            .coordinator
            .submit_dkg_result(OUTSIDER, &result, WINDOW_START),
        Err(Error::SubmitterMismatch)
    );
}

#[test]
fn test_shuffled_members_are_rejected_at_submission() {
    let mut harness = harness();
    let seed = start_attempt(&mut harness);

    // Scenario E, submission half: a members list shuffled relative to
    // the sortition selection never becomes a pending result.
    let mut result = build_result(&harness, seed, 51, &[]);
    result.members.swap(0, 99);
    result.members_hash = members_fingerprint(&result.members, &[]);
    let submitter = result.members[0];
    assert_eq!(
        harness
            .coordinator
            .submit_dkg_result(submitter, &result, WINDOW_START),
        Err(Error::Validation(ValidationError::InvalidGroupMembers))
    );
}

#[test]
fn test_challenge_slashes_submitter_and_restarts_window() {
    let mut harness = harness();
    let seed = start_attempt(&mut harness);

    // Scenario E, challenge half: valid shape and membership, but the
    // signatures are garbage, which only the challenge phase detects.
    let mut result = build_result(&harness, seed, 51, &[]);
    result.signatures = vec![0xaa; 51 * 65];
    let submitter = result.members[0];
    harness
        .coordinator
        .submit_dkg_result(submitter, &result, WINDOW_START)
        .unwrap();

    let events = harness
        .coordinator
        .challenge_dkg_result(OUTSIDER, &result, WINDOW_START + 3)
        .unwrap();
    match &events[0] {
        Event::DkgResultChallenged {
            challenger, reason, ..
        } => {
            assert_eq!(*challenger, OUTSIDER);
            assert!(reason.starts_with("validation reverted"), "reason: {reason}");
        }
        other => panic!("expected DkgResultChallenged, got {other:?}"),
    }

    // The submitter lost collateral and the pool stays locked.
    let seizures = harness.coordinator.staking().seizures();
    assert_eq!(seizures.len(), 1);
    assert_eq!(seizures[0].notifier, OUTSIDER);
    assert!(harness.coordinator.pool().is_locked());

    // The window restarted at the challenge height: seat 1 may submit a
    // correct result immediately.
    let good = build_result(&harness, seed, 51, &[]);
    assert!(harness
        .coordinator
        .submit_dkg_result(good.members[0], &good, WINDOW_START + 3)
        .is_ok());
}

#[test]
fn test_challenge_of_valid_result_is_unjustified() {
    let mut harness = harness();
    let seed = start_attempt(&mut harness);

    let result = build_result(&harness, seed, 51, &[]);
    let submitter = result.members[0];
    harness
        .coordinator
        .submit_dkg_result(submitter, &result, WINDOW_START)
        .unwrap();

    assert_eq!(
        harness
            .coordinator
            .challenge_dkg_result(OUTSIDER, &result, WINDOW_START + 3),
        Err(Error::UnjustifiedChallenge)
    );
    // The result stays pending and can still be approved.
    assert_eq!(
        harness.coordinator.dkg_state(WINDOW_START + 3),
        DkgState::Challenge
    );
}

#[test]
fn test_approval_creates_wallet_and_unlocks_pool() {
    let mut harness = harness();
    let seed = start_attempt(&mut harness);

    let result = build_result(&harness, seed, 51, &[]);
    let submitter = result.members[0];
    harness
        .coordinator
        .submit_dkg_result(submitter, &result, WINDOW_START)
        .unwrap();

    let challenge_end = WINDOW_START + 10;
    assert_eq!(
        harness
            .coordinator
            .approve_dkg_result(submitter, &result, challenge_end - 1),
        Err(Error::ChallengePeriodNotElapsed)
    );

    let events = harness
        .coordinator
        .approve_dkg_result(submitter, &result, challenge_end)
        .unwrap();
    let wallet_id = result.wallet_id();
    assert!(events.contains(&Event::WalletCreated {
        wallet_id,
        dkg_result_hash: result.hash(),
    }));

    let wallet = harness.coordinator.wallet(&wallet_id).unwrap();
    assert_eq!(wallet.members_hash, result.members_hash);
    assert_eq!(wallet.activation_height, challenge_end);

    assert!(!harness.coordinator.pool().is_locked());
    assert_eq!(harness.coordinator.dkg_state(challenge_end), DkgState::Idle);
    // The owning application heard about the wallet.
    assert_eq!(harness.coordinator.registry().owner().created, vec![wallet_id]);
}

#[test]
fn test_non_submitter_approves_only_after_precedence() {
    let mut harness = harness();
    let seed = start_attempt(&mut harness);

    let result = build_result(&harness, seed, 51, &[]);
    let submitter = result.members[0];
    harness
        .coordinator
        .submit_dkg_result(submitter, &result, WINDOW_START)
        .unwrap();

    let challenge_end = WINDOW_START + 10;
    assert_eq!(
        harness
            .coordinator
            .approve_dkg_result(OUTSIDER, &result, challenge_end),
        Err(Error::OnlySubmitterCanApprove)
    );
    // One rotation step later anyone may approve.
    assert!(harness
        .coordinator
        .approve_dkg_result(OUTSIDER, &result, challenge_end + 5)
        .is_ok());
}

#[test]
fn test_misbehaved_members_shrink_the_fingerprint_and_lose_rewards() {
    let mut harness = harness();
    let seed = start_attempt(&mut harness);

    // Scenario D: four misbehaved seats leave a 96-member fingerprint.
    let misbehaved = [22u32, 28, 46, 53];
    let result = build_result(&harness, seed, 51, &misbehaved);

    let kept: Vec<&[u8]> = result
        .members
        .iter()
        .enumerate()
        .filter(|(i, _)| !misbehaved.contains(&((i + 1) as u32)))
        .map(|(_, m)| m.as_bytes().as_slice())
        .collect();
    assert_eq!(kept.len(), 96);
    assert_eq!(result.members_hash, keccak256(&kept));

    let submitter = result.members[0];
    harness
        .coordinator
        .submit_dkg_result(submitter, &result, WINDOW_START)
        .unwrap();
    let events = harness
        .coordinator
        .approve_dkg_result(submitter, &result, WINDOW_START + 10)
        .unwrap();

    assert!(events
        .iter()
        .any(|event| matches!(event, Event::RewardsBanned { .. })));
    let misbehaved_backing = harness
        .coordinator
        .pool()
        .backing_of(result.members[21])
        .unwrap();
    assert!(!harness
        .coordinator
        .pool()
        .is_eligible_for_rewards(misbehaved_backing, WINDOW_START + 10));
}

#[test]
fn test_timeout_resets_the_attempt() {
    let mut harness = harness();
    start_attempt(&mut harness);

    // 100 seats at delay 5: the window closes 500 blocks after start.
    let timeout_height = WINDOW_START + 500;
    assert!(!harness.coordinator.has_dkg_timed_out(timeout_height));
    assert!(harness.coordinator.has_dkg_timed_out(timeout_height + 1));

    assert_eq!(
        harness.coordinator.notify_dkg_timeout(timeout_height),
        Err(Error::DkgTimeoutNotPassed)
    );
    let events = harness
        .coordinator
        .notify_dkg_timeout(timeout_height + 1)
        .unwrap();
    assert_eq!(events, vec![Event::DkgTimedOut]);
    assert!(!harness.coordinator.pool().is_locked());
    assert_eq!(
        harness.coordinator.dkg_state(timeout_height + 1),
        DkgState::Idle
    );
}

#[test]
fn test_submission_after_timeout_is_rejected() {
    let mut harness = harness();
    let seed = start_attempt(&mut harness);

    let result = build_result(&harness, seed, 51, &[]);
    let submitter = result.members[0];
    assert_eq!(
        harness
            .coordinator
            .submit_dkg_result(submitter, &result, WINDOW_START + 501),
        Err(Error::DkgTimeoutAlreadyPassed)
    );
}

#[test]
fn test_seed_timeout_resets_the_attempt() {
    let mut harness = harness();
    harness
        .coordinator
        .request_new_wallet(WALLET_OWNER, REQUEST_HEIGHT)
        .unwrap();

    assert_eq!(
        harness.coordinator.notify_seed_timeout(REQUEST_HEIGHT + 8),
        Err(Error::SeedTimeoutNotPassed)
    );
    let events = harness
        .coordinator
        .notify_seed_timeout(REQUEST_HEIGHT + 9)
        .unwrap();
    assert_eq!(events, vec![Event::DkgSeedTimedOut]);
    assert!(!harness.coordinator.pool().is_locked());
}

#[test]
fn test_single_attempt_in_flight() {
    let mut harness = harness();
    start_attempt(&mut harness);

    assert!(matches!(
        harness
            .coordinator
            .request_new_wallet(WALLET_OWNER, REQUEST_HEIGHT + 10),
        Err(Error::InvalidState { .. })
    ));
    assert_eq!(
        harness
            .coordinator
            .request_new_wallet(OUTSIDER, REQUEST_HEIGHT + 10),
        Err(Error::NotWalletOwner)
    );
}

#[test]
fn test_challenge_after_period_is_too_late() {
    let mut harness = harness();
    let seed = start_attempt(&mut harness);

    let result = build_result(&harness, seed, 51, &[]);
    let submitter = result.members[0];
    harness
        .coordinator
        .submit_dkg_result(submitter, &result, WINDOW_START)
        .unwrap();

    assert_eq!(
        harness
            .coordinator
            .challenge_dkg_result(OUTSIDER, &result, WINDOW_START + 10),
        Err(Error::ChallengePeriodPassed)
    );
}

#[test]
fn test_challenge_must_reference_the_pending_result() {
    let mut harness = harness();
    let seed = start_attempt(&mut harness);

    let result = build_result(&harness, seed, 51, &[]);
    let submitter = result.members[0];
    harness
        .coordinator
        .submit_dkg_result(submitter, &result, WINDOW_START)
        .unwrap();

    let mut other = result.clone();
    other.group_public_key = vec![9u8; GROUP_PUBLIC_KEY_LEN];
    assert_eq!(
        harness
            .coordinator
            .challenge_dkg_result(OUTSIDER, &other, WINDOW_START + 1),
        Err(Error::ResultMismatch)
    );
}

#[test]
fn test_submitter_index_must_be_a_group_seat() {
    let mut harness = harness();
    let seed = start_attempt(&mut harness);

    let mut result = build_result(&harness, seed, 51, &[]);
    result.submitter_member_index = 0;
    assert_eq!(
        harness
            .coordinator
            .submit_dkg_result(result.members[0], &result, WINDOW_START),
        Err(Error::InvalidSubmitterIndex)
    );

    result.submitter_member_index = 101;
    assert_eq!(
        harness
            .coordinator
            .submit_dkg_result(result.members[0], &result, WINDOW_START),
        Err(Error::InvalidSubmitterIndex)
    );
}

#[test]
fn test_seed_entropy_is_provider_only() {
    let mut harness = harness();
    harness
        .coordinator
        .request_new_wallet(WALLET_OWNER, REQUEST_HEIGHT)
        .unwrap();

    assert_eq!(
        harness
            .coordinator
            .submit_seed_entropy(OUTSIDER, [8u8; 32], REQUEST_HEIGHT + 4),
        Err(Error::NotSeedProvider)
    );
}

#[test]
fn test_claim_against_unknown_wallet() {
    let mut harness = harness();
    let claim = InactivityClaim {
        wallet_id: [9u8; 32],
        nonce: 0,
        inactive_members_indices: vec![1],
        heartbeat_failed: false,
        signatures: vec![],
        signing_members_indices: vec![],
    };
    assert_eq!(
        harness
            .coordinator
            .notify_operator_inactivity(OUTSIDER, &claim, &[], 1_000),
        Err(Error::WalletNotFound)
    );
}

#[test]
fn test_resubmission_while_pending_is_rejected() {
    let mut harness = harness();
    let seed = start_attempt(&mut harness);

    let result = build_result(&harness, seed, 51, &[]);
    let submitter = result.members[0];
    harness
        .coordinator
        .submit_dkg_result(submitter, &result, WINDOW_START)
        .unwrap();

    assert_eq!(
        harness
            .coordinator
            .submit_dkg_result(submitter, &result, WINDOW_START + 1),
        Err(Error::InvalidState {
            expected: DkgState::AwaitingResult,
            actual: DkgState::Challenge,
        })
    );
}

/// Create a wallet with no misbehaved members and return its member list.
fn create_wallet(harness: &mut Harness) -> (tdkg_core::WalletId, Vec<Address>) {
    let seed = start_attempt(harness);
    let result = build_result(harness, seed, 51, &[]);
    let submitter = result.members[0];
    harness
        .coordinator
        .submit_dkg_result(submitter, &result, WINDOW_START)
        .unwrap();
    harness
        .coordinator
        .approve_dkg_result(submitter, &result, WINDOW_START + 10)
        .unwrap();
    (result.wallet_id(), result.members)
}

fn build_claim(
    harness: &Harness,
    wallet_id: tdkg_core::WalletId,
    nonce: u64,
    members: &[Address],
    inactive: &[u32],
    heartbeat_failed: bool,
) -> InactivityClaim {
    let mut claim = InactivityClaim {
        wallet_id,
        nonce,
        inactive_members_indices: inactive.to_vec(),
        heartbeat_failed,
        signatures: vec![],
        signing_members_indices: vec![],
    };
    let wallet = harness.coordinator.wallet(&wallet_id).unwrap();
    let payload = claim.signed_payload(&wallet.public_key());
    for seat in 1..=51u32 {
        let key = &harness.keys[&members[seat as usize - 1]];
        let (signature, recovery_id) = key.sign_prehash_recoverable(&payload).unwrap();
        claim.signatures.extend_from_slice(&signature.to_bytes());
        claim.signatures.push(recovery_id.to_byte());
        claim.signing_members_indices.push(seat);
    }
    claim
}

#[test]
fn test_inactivity_claim_nonce_lifecycle() {
    let mut harness = harness();
    let (wallet_id, members) = create_wallet(&mut harness);

    // Scenario F: nonce 0 is accepted once.
    let claim = build_claim(&harness, wallet_id, 0, &members, &[3, 7], true);
    let caller = Address::from_public_key(harness.keys[&members[0]].verifying_key());
    let events = harness
        .coordinator
        .notify_operator_inactivity(caller, &claim, &members, 2_000)
        .unwrap();

    assert!(matches!(events[0], Event::InactivityClaimed { nonce: 0, .. }));
    assert_eq!(harness.coordinator.wallet_nonce(&wallet_id), 1);

    // Inactive members lost reward eligibility.
    let banned = harness
        .coordinator
        .pool()
        .backing_of(members[2])
        .unwrap();
    assert!(!harness
        .coordinator
        .pool()
        .is_eligible_for_rewards(banned, 2_000));

    // The heartbeat failure reached the owning application.
    assert_eq!(
        harness.coordinator.registry().owner().heartbeat_failures,
        vec![wallet_id]
    );

    // Replaying nonce 0 fails.
    assert_eq!(
        harness
            .coordinator
            .notify_operator_inactivity(caller, &claim, &members, 2_001),
        Err(Error::InvalidNonce {
            expected: 1,
            actual: 0,
        })
    );
}

#[test]
fn test_claim_sender_must_be_a_signer() {
    let mut harness = harness();
    let (wallet_id, members) = create_wallet(&mut harness);

    let claim = build_claim(&harness, wallet_id, 0, &members, &[3], false);
    // Seat 60 did not sign (only seats 1..=51 did).
    let non_signer = Address::from_public_key(harness.keys[&members[59]].verifying_key());
    assert_eq!(
        harness
            .coordinator
            .notify_operator_inactivity(non_signer, &claim, &members, 2_000),
        Err(Error::SenderMustBeClaimSigner)
    );
}

#[test]
fn test_claim_members_are_authenticated() {
    let mut harness = harness();
    let (wallet_id, members) = create_wallet(&mut harness);

    let claim = build_claim(&harness, wallet_id, 0, &members, &[3], false);
    let caller = Address::from_public_key(harness.keys[&members[0]].verifying_key());

    let mut wrong = members.clone();
    wrong.swap(0, 1);
    assert_eq!(
        harness
            .coordinator
            .notify_operator_inactivity(caller, &claim, &wrong, 2_000),
        Err(Error::WalletMembersMismatch)
    );
}

#[test]
fn test_duplicate_wallet_public_key_cannot_be_approved_twice() {
    let mut harness = harness();
    let (_, _) = create_wallet(&mut harness);

    // A second attempt producing the same group public key derives the
    // same wallet id, which the registry rejects; the approval fails
    // whole and the pending result survives.
    let seed = start_attempt(&mut harness);
    let result = build_result(&harness, seed, 51, &[]);
    let submitter = result.members[0];
    harness
        .coordinator
        .submit_dkg_result(submitter, &result, WINDOW_START)
        .unwrap();
    assert_eq!(
        harness
            .coordinator
            .approve_dkg_result(submitter, &result, WINDOW_START + 10),
        Err(Error::WalletAlreadyRegistered)
    );
    assert_eq!(
        harness.coordinator.dkg_state(WINDOW_START + 10),
        DkgState::Challenge
    );
}
