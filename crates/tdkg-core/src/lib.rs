//! # tdkg-core
//!
//! Coordination core for threshold-ECDSA wallet creation among an
//! economically staked operator set.
//!
//! The crate owns four cooperating pieces:
//! - a **weighted operator pool** with deterministic seeded group
//!   selection and a lock freezing weights during an attempt,
//! - a **result validator** checking a submitted DKG result's field
//!   shape, claimed membership, and threshold-signature quorum,
//! - the **DKG coordinator** state machine sequencing seed delivery, the
//!   rotating submission window, the challenge period, and approval or
//!   timeout recovery,
//! - a **wallet registry** with best-effort owner notification and the
//!   **inactivity claim** protocol penalizing silent members.
//!
//! Execution is single-threaded and fully serialized: every operation is
//! an atomic transition keyed on the caller-supplied ledger height, and
//! "blocking" exists only as height-based eligibility windows.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tdkg_core::{WalletCoordinator, GroupConfig, DkgParameters};
//!
//! let mut coordinator = WalletCoordinator::new(
//!     GroupConfig::default(),
//!     DkgParameters::default(),
//!     wallet_owner,
//!     seed_provider,
//!     staking,
//!     owner_app,
//! );
//! coordinator.request_new_wallet(wallet_owner, height)?;
//! ```

pub mod coordinator;
pub mod dkg;
pub mod error;
pub mod events;
pub mod inactivity;
pub mod params;
pub mod pool;
pub mod registry;
pub mod staking;
pub mod types;
pub mod validator;

pub use coordinator::WalletCoordinator;
pub use dkg::{DkgAttempt, DkgState, PendingResult};
pub use error::{Error, Result, ValidationError};
pub use events::Event;
pub use params::{DkgParameters, GroupConfig};
pub use pool::{PoolMember, SortitionPool};
pub use registry::{RecordingWalletOwner, WalletOwner, WalletRegistry};
pub use staking::{InMemoryStaking, Seizure, Staking};
pub use types::{
    keccak256, members_fingerprint, Address, DkgResult, Hash32, InactivityClaim, Wallet,
    WalletId, GROUP_PUBLIC_KEY_LEN, SIGNATURE_LEN,
};

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
