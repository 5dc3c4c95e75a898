//! Error types for the wallet coordination core

use thiserror::Error;

use crate::dkg::DkgState;

/// Result type alias for coordination operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the coordination core.
///
/// Every failure aborts the triggering call with no partial state mutation.
/// The one exception is wallet-owner notification, which is swallowed and
/// reported only as an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Operation is invalid in the current DKG state
    #[error("current DKG state is not {expected:?} (actual: {actual:?})")]
    InvalidState {
        expected: DkgState,
        actual: DkgState,
    },

    /// Result submission raced with an approval that already unlocked the pool
    #[error("sortition pool is unlocked")]
    SortitionPoolUnlocked,

    /// Pool mutation attempted while an attempt holds the lock
    #[error("sortition pool is locked")]
    SortitionPoolLocked,

    /// Challenge or approval referenced a result other than the pending one
    #[error("result does not match the pending submission")]
    ResultMismatch,

    /// Operator or backing account is already bound
    #[error("operator is already registered")]
    AlreadyRegistered,

    /// Backing account has an unapproved authorization-decrease request
    #[error("backing account has a pending authorization decrease")]
    PendingAuthorizationDecrease,

    /// Operator identity has no registered binding
    #[error("operator is not registered")]
    OperatorNotRegistered,

    /// Group selection requested from a pool with no weight
    #[error("sortition pool is empty")]
    SortitionPoolEmpty,

    /// Claimed submitter seat is outside [1, group size]
    #[error("invalid submitter member index")]
    InvalidSubmitterIndex,

    /// Caller is not the operator seated at the claimed submitter index
    #[error("submitter is not the member at the claimed seat")]
    SubmitterMismatch,

    /// Submitter seat has not yet rotated into eligibility
    #[error("submitter is not eligible yet")]
    SubmitterNotEligible,

    /// Submission window has expired
    #[error("DKG timeout already passed")]
    DkgTimeoutAlreadyPassed,

    /// Timeout notification arrived before the window expired
    #[error("DKG timeout has not passed")]
    DkgTimeoutNotPassed,

    /// Seed-timeout notification arrived before the seed window expired
    #[error("DKG seed timeout has not passed")]
    SeedTimeoutNotPassed,

    /// Challenge arrived before the challenge period elapsed on approval
    #[error("challenge period has not elapsed yet")]
    ChallengePeriodNotElapsed,

    /// Challenge arrived after the pending result survived its window
    #[error("challenge period has already passed")]
    ChallengePeriodPassed,

    /// Non-submitter tried to approve before the precedence window elapsed
    #[error("only the submitter can approve during the precedence period")]
    OnlySubmitterCanApprove,

    /// Challenge target passed every validation check
    #[error("unjustified challenge: the result is valid")]
    UnjustifiedChallenge,

    /// Caller is not the configured wallet owner
    #[error("caller is not the wallet owner")]
    NotWalletOwner,

    /// Seed callback came from an account other than the seed source
    #[error("caller is not the seed provider")]
    NotSeedProvider,

    /// Inactivity claim submitted by an account that did not sign it
    #[error("sender must be a claim signer")]
    SenderMustBeClaimSigner,

    /// Wallet id is already registered
    #[error("wallet with the given id already exists")]
    WalletAlreadyRegistered,

    /// Wallet id is unknown to the registry
    #[error("wallet with the given id is not registered")]
    WalletNotFound,

    /// Claim nonce does not match the wallet's stored nonce
    #[error("invalid nonce: expected {expected}, got {actual}")]
    InvalidNonce { expected: u64, actual: u64 },

    /// Inactive member indices are empty, out of range, or not ascending
    #[error("corrupted members indices")]
    CorruptedMemberIndices,

    /// Supplied member list does not hash to the wallet's fingerprint
    #[error("supplied members do not match the wallet fingerprint")]
    WalletMembersMismatch,

    /// A result validation check failed
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Failures detected by the result validator.
///
/// The variant message doubles as the human-readable reason string attached
/// to a successful challenge event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Group public key is not the fixed uncompressed-point length
    #[error("malformed group public key")]
    MalformedPublicKey,

    /// Misbehaved indices are out of range or not strictly ascending
    #[error("corrupted misbehaved members indices")]
    CorruptedMisbehavedIndices,

    /// Too many seats excluded to still reach the threshold
    #[error("too many misbehaving members")]
    TooManyMisbehaving,

    /// Signature bytes are not a multiple of the per-signature size
    #[error("malformed signatures array")]
    MalformedSignatures,

    /// Signature count differs from the signing-index count
    #[error("unexpected signatures count")]
    UnexpectedSignatureCount,

    /// Fewer signatures than the threshold
    #[error("too few signatures")]
    TooFewSignatures,

    /// More signatures than group seats
    #[error("too many signatures")]
    TooManySignatures,

    /// Signing indices are out of range or not strictly ascending
    #[error("corrupted signing members indices")]
    CorruptedSigningIndices,

    /// Members fingerprint does not hash the non-misbehaved seats
    #[error("invalid members hash")]
    InvalidMembersHash,

    /// Members do not match the sortition selection for the attempt seed
    #[error("invalid group members")]
    InvalidGroupMembers,

    /// A signature recovered to an account other than the seat's backing
    #[error("invalid signature")]
    InvalidSignature,

    /// Signature bytes could not be parsed into curve points at all
    #[error("validation reverted: {0}")]
    ValidationReverted(String),
}
