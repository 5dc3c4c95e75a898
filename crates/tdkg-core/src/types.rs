//! Core types for the wallet coordination protocol

use std::fmt;

use elliptic_curve::sec1::ToEncodedPoint;
use k256::ecdsa::VerifyingKey;
use serde::{Deserialize, Serialize};
use tiny_keccak::{Hasher, Keccak};

/// 32-byte Keccak-256 digest
pub type Hash32 = [u8; 32];

/// Wallet identifier, derived as `keccak256(group_public_key)`
pub type WalletId = Hash32;

/// Uncompressed secp256k1 group public key length (x ‖ y, no SEC1 prefix)
pub const GROUP_PUBLIC_KEY_LEN: usize = 64;

/// Per-member signature blob length (r ‖ s ‖ v)
pub const SIGNATURE_LEN: usize = 65;

/// Keccak-256 over the concatenation of `parts`
pub fn keccak256(parts: &[&[u8]]) -> Hash32 {
    let mut hasher = Keccak::v256();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// 20-byte account identity for operators and backing (staking) accounts
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Derive the address of an uncompressed secp256k1 public key:
    /// the last 20 bytes of `keccak256(x ‖ y)`.
    pub fn from_public_key(key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        // Skip the 0x04 SEC1 tag.
        let digest = keccak256(&[&point.as_bytes()[1..]]);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[12..]);
        Address(bytes)
    }

    /// Raw address bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", hex::encode(self.0))
    }
}

/// Candidate DKG result as submitted by a group member.
///
/// Member indices are 1-based seat positions within the attempt's sampled
/// group, not global operator ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DkgResult {
    /// Seat index of the submitting member
    pub submitter_member_index: u32,

    /// Uncompressed group public key produced off-chain (64 bytes)
    pub group_public_key: Vec<u8>,

    /// Seats excluded from the final membership, strictly ascending
    pub misbehaved_members_indices: Vec<u32>,

    /// Concatenated 65-byte signature blobs over [`DkgResult::signed_payload`]
    pub signatures: Vec<u8>,

    /// Seat index of each signature, strictly ascending
    pub signing_members_indices: Vec<u32>,

    /// Operator identities in seat order, one per group seat
    pub members: Vec<Address>,

    /// Fingerprint of `members` with misbehaved seats removed
    pub members_hash: Hash32,
}

impl DkgResult {
    /// Canonical hash identifying this result.
    ///
    /// Variable-length fields are prefixed with their element count so that
    /// no two distinct results can concatenate to the same byte stream.
    pub fn hash(&self) -> Hash32 {
        let mut hasher = Keccak::v256();
        hasher.update(&self.submitter_member_index.to_be_bytes());
        hasher.update(&(self.group_public_key.len() as u32).to_be_bytes());
        hasher.update(&self.group_public_key);
        hasher.update(&(self.misbehaved_members_indices.len() as u32).to_be_bytes());
        for index in &self.misbehaved_members_indices {
            hasher.update(&index.to_be_bytes());
        }
        hasher.update(&(self.signatures.len() as u32).to_be_bytes());
        hasher.update(&self.signatures);
        hasher.update(&(self.signing_members_indices.len() as u32).to_be_bytes());
        for index in &self.signing_members_indices {
            hasher.update(&index.to_be_bytes());
        }
        hasher.update(&(self.members.len() as u32).to_be_bytes());
        for member in &self.members {
            hasher.update(member.as_bytes());
        }
        hasher.update(&self.members_hash);
        let mut out = [0u8; 32];
        hasher.finalize(&mut out);
        out
    }

    /// Payload each supporting member signs: binds the chain scope, the
    /// group key, the excluded seats, and the attempt start height.
    pub fn signed_payload(&self, chain_id: u64, start_height: u64) -> Hash32 {
        let mut hasher = Keccak::v256();
        hasher.update(&chain_id.to_be_bytes());
        hasher.update(&self.group_public_key);
        for index in &self.misbehaved_members_indices {
            hasher.update(&index.to_be_bytes());
        }
        hasher.update(&start_height.to_be_bytes());
        let mut out = [0u8; 32];
        hasher.finalize(&mut out);
        out
    }

    /// Wallet id the group public key derives to
    pub fn wallet_id(&self) -> WalletId {
        keccak256(&[&self.group_public_key])
    }

    /// Split the group public key into its x and y halves.
    ///
    /// Returns `None` until field validation has confirmed the length.
    pub fn public_key_halves(&self) -> Option<(Hash32, Hash32)> {
        if self.group_public_key.len() != GROUP_PUBLIC_KEY_LEN {
            return None;
        }
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];
        x.copy_from_slice(&self.group_public_key[..32]);
        y.copy_from_slice(&self.group_public_key[32..]);
        Some((x, y))
    }
}

/// Fingerprint of a member list with the misbehaved seats removed.
///
/// `misbehaved` holds 1-based seat indices; remaining members keep their
/// original relative order.
pub fn members_fingerprint(members: &[Address], misbehaved: &[u32]) -> Hash32 {
    let mut hasher = Keccak::v256();
    let mut excluded = misbehaved.iter().peekable();
    for (position, member) in members.iter().enumerate() {
        let seat = (position + 1) as u32;
        if excluded.peek() == Some(&&seat) {
            excluded.next();
            continue;
        }
        hasher.update(member.as_bytes());
    }
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Finalized threshold-signing wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// `keccak256(group_public_key)`
    pub id: WalletId,

    /// X coordinate of the group public key
    pub public_key_x: Hash32,

    /// Y coordinate of the group public key
    pub public_key_y: Hash32,

    /// Fingerprint of the final (non-misbehaved) member set
    pub members_hash: Hash32,

    /// Height at which the wallet was approved
    pub activation_height: u64,
}

impl Wallet {
    /// Uncompressed group public key (x ‖ y)
    pub fn public_key(&self) -> [u8; GROUP_PUBLIC_KEY_LEN] {
        let mut out = [0u8; GROUP_PUBLIC_KEY_LEN];
        out[..32].copy_from_slice(&self.public_key_x);
        out[32..].copy_from_slice(&self.public_key_y);
        out
    }
}

/// Threshold-signed claim that specific wallet members went silent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InactivityClaim {
    /// Wallet the claim targets
    pub wallet_id: WalletId,

    /// Must equal the wallet's current stored nonce
    pub nonce: u64,

    /// Seats claimed inactive, strictly ascending, 1-based
    pub inactive_members_indices: Vec<u32>,

    /// Whether the wallet failed a heartbeat (triggers owner notification)
    pub heartbeat_failed: bool,

    /// Concatenated 65-byte signature blobs over [`InactivityClaim::signed_payload`]
    pub signatures: Vec<u8>,

    /// Seat index of each signature, strictly ascending
    pub signing_members_indices: Vec<u32>,
}

impl InactivityClaim {
    /// Payload each claim signer signs
    pub fn signed_payload(&self, wallet_public_key: &[u8; GROUP_PUBLIC_KEY_LEN]) -> Hash32 {
        let mut hasher = Keccak::v256();
        hasher.update(&self.nonce.to_be_bytes());
        hasher.update(wallet_public_key);
        for index in &self.inactive_members_indices {
            hasher.update(&index.to_be_bytes());
        }
        hasher.update(&[self.heartbeat_failed as u8]);
        let mut out = [0u8; 32];
        hasher.finalize(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(byte: u8) -> Address {
        Address([byte; 20])
    }

    #[test]
    fn test_fingerprint_excludes_misbehaved_seats() {
        let members: Vec<Address> = (1..=10u8).map(address).collect();

        // Removing seats at the start, middle, and end must equal hashing
        // the remaining members directly.
        let expected = {
            let kept: Vec<&[u8]> = members
                .iter()
                .enumerate()
                .filter(|(i, _)| ![0usize, 4, 9].contains(i))
                .map(|(_, m)| m.as_bytes().as_slice())
                .collect();
            keccak256(&kept)
        };

        assert_eq!(members_fingerprint(&members, &[1, 5, 10]), expected);
    }

    #[test]
    fn test_fingerprint_without_misbehaved_hashes_all_members() {
        let members: Vec<Address> = (1..=4u8).map(address).collect();
        let all: Vec<&[u8]> = members.iter().map(|m| m.as_bytes().as_slice()).collect();
        assert_eq!(members_fingerprint(&members, &[]), keccak256(&all));
    }

    #[test]
    fn test_result_hash_commits_to_every_field() {
        let base = DkgResult {
            submitter_member_index: 1,
            group_public_key: vec![7u8; GROUP_PUBLIC_KEY_LEN],
            misbehaved_members_indices: vec![2],
            signatures: vec![0u8; SIGNATURE_LEN],
            signing_members_indices: vec![1],
            members: (1..=3u8).map(address).collect(),
            members_hash: [0u8; 32],
        };

        let mut changed = base.clone();
        changed.submitter_member_index = 2;
        assert_ne!(base.hash(), changed.hash());

        let mut changed = base.clone();
        changed.misbehaved_members_indices = vec![3];
        assert_ne!(base.hash(), changed.hash());

        let mut changed = base.clone();
        changed.members_hash = [1u8; 32];
        assert_ne!(base.hash(), changed.hash());

        assert_eq!(base.hash(), base.clone().hash());
    }

    #[test]
    fn test_signed_payload_binds_start_height() {
        let result = DkgResult {
            submitter_member_index: 1,
            group_public_key: vec![7u8; GROUP_PUBLIC_KEY_LEN],
            misbehaved_members_indices: vec![],
            signatures: vec![],
            signing_members_indices: vec![],
            members: vec![],
            members_hash: [0u8; 32],
        };

        assert_ne!(
            result.signed_payload(1, 100),
            result.signed_payload(1, 101)
        );
        assert_ne!(result.signed_payload(1, 100), result.signed_payload(2, 100));
    }

    #[test]
    fn test_address_from_public_key_is_stable() {
        use k256::ecdsa::SigningKey;
        use rand::rngs::OsRng;

        let key = SigningKey::random(&mut OsRng);
        let a = Address::from_public_key(key.verifying_key());
        let b = Address::from_public_key(key.verifying_key());
        assert_eq!(a, b);
        assert_ne!(a, Address::default());
    }
}
