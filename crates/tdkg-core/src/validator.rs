//! DKG result validator
//!
//! Three composable, pure validation phases over a candidate result:
//! cheap field-shape checks, group-membership checks against the sortition
//! selection for the attempt seed, and recovery of every supporting
//! signature against the backing account of its claimed seat.
//!
//! The coordinator runs fields + membership at submission time; a
//! challenger runs all three.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use tracing::debug;

use crate::error::ValidationError;
use crate::params::GroupConfig;
use crate::pool::SortitionPool;
use crate::types::{
    members_fingerprint, Address, DkgResult, Hash32, GROUP_PUBLIC_KEY_LEN, SIGNATURE_LEN,
};

/// True iff every index is in `[1, max]` and the sequence strictly ascends
pub(crate) fn indices_well_formed(indices: &[u32], max: u32) -> bool {
    let mut previous = 0u32;
    for &index in indices {
        if index <= previous || index > max {
            return false;
        }
        previous = index;
    }
    true
}

/// Shape rules shared by DKG results and inactivity claims: the signature
/// byte array must split into whole blobs, one per signing index, with a
/// count between the threshold and the group size.
pub(crate) fn validate_signature_shape(
    signatures: &[u8],
    signing_indices: &[u32],
    group_size: u32,
    threshold: u32,
) -> Result<(), ValidationError> {
    if signatures.is_empty() || signatures.len() % SIGNATURE_LEN != 0 {
        return Err(ValidationError::MalformedSignatures);
    }
    let count = signatures.len() / SIGNATURE_LEN;
    if count != signing_indices.len() {
        return Err(ValidationError::UnexpectedSignatureCount);
    }
    if count < threshold as usize {
        return Err(ValidationError::TooFewSignatures);
    }
    if count > group_size as usize {
        return Err(ValidationError::TooManySignatures);
    }
    if !indices_well_formed(signing_indices, group_size) {
        return Err(ValidationError::CorruptedSigningIndices);
    }
    Ok(())
}

/// Recover the signing account of one 65-byte `r ‖ s ‖ v` blob.
///
/// Inputs that cannot be parsed into curve points are a hard failure, not
/// a silent mismatch: a challenger must be able to prove the result was
/// unverifiable.
pub(crate) fn recover_signer(
    payload: &Hash32,
    blob: &[u8],
) -> Result<Address, ValidationError> {
    let v = blob[SIGNATURE_LEN - 1];
    let recovery_byte = if v >= 27 { v - 27 } else { v };
    let recovery_id = RecoveryId::from_byte(recovery_byte).ok_or_else(|| {
        ValidationError::ValidationReverted(format!("invalid recovery id {v}"))
    })?;
    let signature = Signature::from_slice(&blob[..SIGNATURE_LEN - 1])
        .map_err(|e| ValidationError::ValidationReverted(e.to_string()))?;
    let key = VerifyingKey::recover_from_prehash(payload, &signature, recovery_id)
        .map_err(|e| ValidationError::ValidationReverted(e.to_string()))?;
    Ok(Address::from_public_key(&key))
}

/// Cheap structural checks requiring no pool state
pub fn validate_fields(result: &DkgResult, config: &GroupConfig) -> Result<(), ValidationError> {
    if result.group_public_key.len() != GROUP_PUBLIC_KEY_LEN {
        return Err(ValidationError::MalformedPublicKey);
    }

    if !indices_well_formed(&result.misbehaved_members_indices, config.group_size) {
        return Err(ValidationError::CorruptedMisbehavedIndices);
    }
    let max_misbehaved = config.group_size - config.group_threshold;
    if result.misbehaved_members_indices.len() > max_misbehaved as usize {
        return Err(ValidationError::TooManyMisbehaving);
    }

    validate_signature_shape(
        &result.signatures,
        &result.signing_members_indices,
        config.group_size,
        config.group_threshold,
    )?;

    if result.members_hash
        != members_fingerprint(&result.members, &result.misbehaved_members_indices)
    {
        return Err(ValidationError::InvalidMembersHash);
    }
    Ok(())
}

/// The claimed members must equal, seat by seat, the sortition selection
/// for the attempt's seed
pub fn validate_group_members(
    result: &DkgResult,
    pool: &SortitionPool,
    config: &GroupConfig,
    seed: Hash32,
) -> Result<(), ValidationError> {
    let selected = pool
        .select_group(config.group_size, seed)
        .map_err(|e| ValidationError::ValidationReverted(e.to_string()))?;
    if result.members != selected {
        return Err(ValidationError::InvalidGroupMembers);
    }
    Ok(())
}

/// Every signature must recover to the backing account of the member at
/// its claimed seat
pub fn validate_signatures(
    result: &DkgResult,
    pool: &SortitionPool,
    config: &GroupConfig,
    start_height: u64,
) -> Result<(), ValidationError> {
    if result.signatures.len() != result.signing_members_indices.len() * SIGNATURE_LEN {
        return Err(ValidationError::UnexpectedSignatureCount);
    }
    let payload = result.signed_payload(config.chain_id, start_height);

    for (position, &seat) in result.signing_members_indices.iter().enumerate() {
        let blob = &result.signatures[position * SIGNATURE_LEN..(position + 1) * SIGNATURE_LEN];
        let signer = recover_signer(&payload, blob)?;

        let member = result
            .members
            .get(seat as usize - 1)
            .ok_or(ValidationError::CorruptedSigningIndices)?;
        let backing = pool
            .backing_of(*member)
            .ok_or(ValidationError::InvalidSignature)?;
        if signer != backing {
            debug!(seat, %signer, %backing, "signature recovered to wrong account");
            return Err(ValidationError::InvalidSignature);
        }
    }
    Ok(())
}

/// Submission-time validation: fields + membership
pub fn validate_submission(
    result: &DkgResult,
    pool: &SortitionPool,
    config: &GroupConfig,
    seed: Hash32,
) -> Result<(), ValidationError> {
    validate_fields(result, config)?;
    validate_group_members(result, pool, config, seed)
}

/// Challenge-time validation: all three phases
pub fn validate(
    result: &DkgResult,
    pool: &SortitionPool,
    config: &GroupConfig,
    seed: Hash32,
    start_height: u64,
) -> Result<(), ValidationError> {
    validate_submission(result, pool, config, seed)?;
    validate_signatures(result, pool, config, start_height)
}
