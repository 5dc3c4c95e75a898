//! Wallet registry
//!
//! Durable record of finalized wallets plus the best-effort hook notifying
//! the owning application. Notification failures are logged and surfaced
//! as events, never propagated: wallet registration must not roll back
//! because a collaborator misbehaved.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::types::{Wallet, WalletId, GROUP_PUBLIC_KEY_LEN};

/// Error type for owner notifications; the registry only logs it
pub type NotifyError = Box<dyn std::error::Error + Send + Sync>;

/// Owning application notified of wallet lifecycle events.
///
/// Both hooks follow a notify-don't-await pattern: the registry swallows
/// any error they return.
pub trait WalletOwner {
    /// A wallet finished DKG and was registered
    fn on_wallet_created(
        &mut self,
        wallet_id: WalletId,
        public_key: &[u8; GROUP_PUBLIC_KEY_LEN],
    ) -> std::result::Result<(), NotifyError>;

    /// A wallet reported a failed heartbeat through an inactivity claim
    fn on_heartbeat_failed(
        &mut self,
        wallet_id: WalletId,
        public_key: &[u8; GROUP_PUBLIC_KEY_LEN],
    ) -> std::result::Result<(), NotifyError>;
}

/// Registry of finalized wallets and their inactivity nonces
pub struct WalletRegistry<O: WalletOwner> {
    wallets: HashMap<WalletId, Wallet>,
    nonces: HashMap<WalletId, u64>,
    owner: O,
}

impl<O: WalletOwner> WalletRegistry<O> {
    pub fn new(owner: O) -> Self {
        Self {
            wallets: HashMap::new(),
            nonces: HashMap::new(),
            owner,
        }
    }

    /// Record a finalized wallet.
    ///
    /// A second registration of the same id is rejected: the id derives
    /// from the group public key and an existing record is immutable.
    pub fn register_wallet(&mut self, wallet: Wallet) -> Result<()> {
        if self.wallets.contains_key(&wallet.id) {
            return Err(Error::WalletAlreadyRegistered);
        }
        info!(wallet_id = %hex::encode(wallet.id), "wallet registered");
        self.nonces.insert(wallet.id, 0);
        self.wallets.insert(wallet.id, wallet);
        Ok(())
    }

    pub fn wallet(&self, id: &WalletId) -> Option<&Wallet> {
        self.wallets.get(id)
    }

    pub fn is_registered(&self, id: &WalletId) -> bool {
        self.wallets.contains_key(id)
    }

    /// Current inactivity nonce of a wallet
    pub fn nonce(&self, id: &WalletId) -> u64 {
        self.nonces.get(id).copied().unwrap_or(0)
    }

    /// Advance the inactivity nonce after a processed claim
    pub fn increment_nonce(&mut self, id: &WalletId) {
        *self.nonces.entry(*id).or_insert(0) += 1;
    }

    /// Best-effort creation notification; returns whether it succeeded
    pub fn notify_wallet_created(&mut self, id: WalletId) -> bool {
        let Some(wallet) = self.wallets.get(&id) else {
            return false;
        };
        let public_key = wallet.public_key();
        match self.owner.on_wallet_created(id, &public_key) {
            Ok(()) => true,
            Err(error) => {
                warn!(wallet_id = %hex::encode(id), %error, "wallet owner notification failed");
                false
            }
        }
    }

    /// Best-effort heartbeat-failure notification; returns whether it
    /// succeeded
    pub fn notify_heartbeat_failed(&mut self, id: WalletId) -> bool {
        let Some(wallet) = self.wallets.get(&id) else {
            return false;
        };
        let public_key = wallet.public_key();
        match self.owner.on_heartbeat_failed(id, &public_key) {
            Ok(()) => true,
            Err(error) => {
                warn!(wallet_id = %hex::encode(id), %error, "heartbeat notification failed");
                false
            }
        }
    }

    pub fn owner(&self) -> &O {
        &self.owner
    }
}

/// In-memory wallet owner for local testing and simulation.
///
/// Records every notification and can be told to fail the next one, which
/// is how the swallowed-failure path gets exercised.
#[derive(Debug, Default)]
pub struct RecordingWalletOwner {
    pub created: Vec<WalletId>,
    pub heartbeat_failures: Vec<WalletId>,
    pub fail_next: bool,
}

impl RecordingWalletOwner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WalletOwner for RecordingWalletOwner {
    fn on_wallet_created(
        &mut self,
        wallet_id: WalletId,
        _public_key: &[u8; GROUP_PUBLIC_KEY_LEN],
    ) -> std::result::Result<(), NotifyError> {
        if self.fail_next {
            self.fail_next = false;
            return Err("owner rejected the notification".into());
        }
        self.created.push(wallet_id);
        Ok(())
    }

    fn on_heartbeat_failed(
        &mut self,
        wallet_id: WalletId,
        _public_key: &[u8; GROUP_PUBLIC_KEY_LEN],
    ) -> std::result::Result<(), NotifyError> {
        if self.fail_next {
            self.fail_next = false;
            return Err("owner rejected the notification".into());
        }
        self.heartbeat_failures.push(wallet_id);
        Ok(())
    }
}
