//! Inactivity claim verification
//!
//! A second threshold-signature protocol, reusing the result validator's
//! signature-quorum rules, that wallet members use to mark silent peers
//! ineligible for pool rewards.

use crate::error::{Error, Result, ValidationError};
use crate::pool::SortitionPool;
use crate::types::{Address, InactivityClaim, GROUP_PUBLIC_KEY_LEN, SIGNATURE_LEN};
use crate::validator::{indices_well_formed, recover_signer, validate_signature_shape};

/// Verify an inactivity claim against a wallet's final member set.
///
/// `members` is the wallet's non-misbehaved membership in seat order (the
/// coordinator authenticates it against the stored fingerprint first).
/// Returns the recovered signer backing accounts so the caller can enforce
/// the sender-must-be-a-signer rule.
pub fn verify_claim(
    claim: &InactivityClaim,
    wallet_public_key: &[u8; GROUP_PUBLIC_KEY_LEN],
    members: &[Address],
    pool: &SortitionPool,
    quorum: u32,
) -> Result<Vec<Address>> {
    let member_count = members.len() as u32;

    if claim.inactive_members_indices.is_empty()
        || !indices_well_formed(&claim.inactive_members_indices, member_count)
    {
        return Err(Error::CorruptedMemberIndices);
    }

    validate_signature_shape(
        &claim.signatures,
        &claim.signing_members_indices,
        member_count,
        quorum,
    )
    .map_err(Error::Validation)?;

    let payload = claim.signed_payload(wallet_public_key);
    let mut signers = Vec::with_capacity(claim.signing_members_indices.len());
    for (position, &seat) in claim.signing_members_indices.iter().enumerate() {
        let blob = &claim.signatures[position * SIGNATURE_LEN..(position + 1) * SIGNATURE_LEN];
        let signer = recover_signer(&payload, blob).map_err(Error::Validation)?;

        let backing = pool
            .backing_of(members[seat as usize - 1])
            .ok_or(Error::Validation(ValidationError::InvalidSignature))?;
        if signer != backing {
            return Err(Error::Validation(ValidationError::InvalidSignature));
        }
        signers.push(signer);
    }
    Ok(signers)
}

/// Resolve the backing accounts of the seats a verified claim marks
/// inactive
pub fn inactive_backings(
    claim: &InactivityClaim,
    members: &[Address],
    pool: &SortitionPool,
) -> Vec<Address> {
    claim
        .inactive_members_indices
        .iter()
        .filter_map(|&seat| pool.backing_of(members[seat as usize - 1]))
        .collect()
}
