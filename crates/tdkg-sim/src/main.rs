//! tdkg Simulator CLI
//!
//! Drives the wallet-creation lifecycle against in-memory collaborators:
//! - operator registration and pool seeding
//! - wallet request, seed delivery, off-chain result signing
//! - result submission, optional challenge, and approval

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use tracing::{info, warn, Level};

use tdkg_core::{
    members_fingerprint, Address, DkgParameters, DkgResult, Event, GroupConfig, InMemoryStaking,
    RecordingWalletOwner, WalletCoordinator,
};

const WALLET_OWNER: Address = Address([0xaa; 20]);
const SEED_PROVIDER: Address = Address([0xbb; 20]);
const CHALLENGER: Address = Address([0xcd; 20]);

/// tdkg-sim - wallet coordination simulator
#[derive(Parser)]
#[command(name = "tdkg-sim")]
#[command(about = "Threshold-ECDSA wallet coordination simulator")]
#[command(version)]
struct Cli {
    /// Number of operators to register
    #[arg(short, long, env = "OPERATORS", default_value_t = 100)]
    operators: u32,

    /// Authorized stake per backing account
    #[arg(long, default_value_t = 100)]
    stake: u128,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full wallet-creation lifecycle
    Lifecycle {
        /// Seats sampled per attempt
        #[arg(short, long, default_value_t = 100)]
        group_size: u32,

        /// Signatures required to certify the result
        #[arg(short, long, default_value_t = 51)]
        threshold: u32,

        /// Submit an unverifiable result first and challenge it
        #[arg(long)]
        challenge: bool,

        /// Print every emitted event as a JSON line
        #[arg(long)]
        events: bool,
    },

    /// Print the sortition selection for a seed
    SelectGroup {
        /// 32-byte selection seed (hex encoded)
        #[arg(short, long)]
        seed: String,

        /// Seats to sample
        #[arg(short, long, default_value_t = 100)]
        group_size: u32,
    },

    /// Print the default lifecycle parameters as JSON
    Params,
}

/// Registered operator set with its backing signing keys.
struct OperatorSet {
    coordinator: WalletCoordinator<InMemoryStaking, RecordingWalletOwner>,
    keys: HashMap<Address, SigningKey>,
}

fn operator_address(index: u32) -> Address {
    let mut bytes = [0u8; 20];
    bytes[16..].copy_from_slice(&index.to_be_bytes());
    Address(bytes)
}

fn operator_set(config: GroupConfig, params: DkgParameters, cli: &Cli) -> Result<OperatorSet> {
    let mut staking = InMemoryStaking::new();
    let mut keys = HashMap::new();
    let mut operators = Vec::new();
    for index in 1..=cli.operators {
        let operator = operator_address(index);
        let key = SigningKey::random(&mut OsRng);
        let backing = Address::from_public_key(key.verifying_key());
        staking.set_stake(backing, cli.stake);
        keys.insert(operator, key);
        operators.push((operator, backing));
    }

    let mut coordinator = WalletCoordinator::new(
        config,
        params,
        WALLET_OWNER,
        SEED_PROVIDER,
        staking,
        RecordingWalletOwner::new(),
    );
    for (operator, backing) in operators {
        coordinator.register_operator(operator, backing)?;
        coordinator.update_operator_status(operator)?;
    }
    info!(operators = cli.operators, stake = cli.stake, "operator set registered");
    Ok(OperatorSet { coordinator, keys })
}

/// Build a result over a fresh wallet key, signed by the first
/// `threshold` seats of the selected group.
fn build_signed_result(
    set: &OperatorSet,
    config: &GroupConfig,
    seed: [u8; 32],
    start_height: u64,
    threshold: u32,
) -> Result<DkgResult> {
    let members = set.coordinator.pool().select_group(config.group_size, seed)?;

    let wallet_key = SigningKey::random(&mut OsRng);
    let point = wallet_key.verifying_key().to_encoded_point(false);
    let group_public_key = point.as_bytes()[1..].to_vec();

    let mut result = DkgResult {
        submitter_member_index: 1,
        group_public_key,
        misbehaved_members_indices: vec![],
        signatures: vec![],
        signing_members_indices: vec![],
        members: members.clone(),
        members_hash: members_fingerprint(&members, &[]),
    };

    let payload = result.signed_payload(config.chain_id, start_height);
    for seat in 1..=threshold {
        let member = members
            .get(seat as usize - 1)
            .ok_or_else(|| anyhow!("group has fewer than {threshold} seats"))?;
        let key = set
            .keys
            .get(member)
            .ok_or_else(|| anyhow!("no backing key for operator {member}"))?;
        let (signature, recovery_id) = key.sign_prehash_recoverable(&payload)?;
        result.signatures.extend_from_slice(&signature.to_bytes());
        result.signatures.push(recovery_id.to_byte());
        result.signing_members_indices.push(seat);
    }
    Ok(result)
}

fn print_events(events: &[Event], enabled: bool) -> Result<()> {
    if enabled {
        for event in events {
            println!("{}", serde_json::to_string(event)?);
        }
    }
    Ok(())
}

fn run_lifecycle(
    cli: &Cli,
    group_size: u32,
    threshold: u32,
    with_challenge: bool,
    show_events: bool,
) -> Result<()> {
    let config = GroupConfig {
        group_size,
        group_threshold: threshold,
        weight_divisor: 1,
        chain_id: 1,
    };
    let params = DkgParameters::default();
    let mut set = operator_set(config.clone(), params.clone(), cli)?;

    let start_height = 1_000;
    let events = set
        .coordinator
        .request_new_wallet(WALLET_OWNER, start_height)?;
    print_events(&events, show_events)?;

    let entropy: [u8; 32] = rand::random();
    let events = set
        .coordinator
        .submit_seed_entropy(SEED_PROVIDER, entropy, start_height + 2)?;
    print_events(&events, show_events)?;

    let seed = set
        .coordinator
        .dkg_seed()
        .ok_or_else(|| anyhow!("attempt has no seed after entropy delivery"))?;
    info!(seed = %hex::encode(seed), "off-chain key generation window open");

    let mut height = start_height + params.offchain_dkg_time;
    let result = build_signed_result(&set, &config, seed, start_height, threshold)?;
    let submitter = result.members[0];

    if with_challenge {
        // An unverifiable result: right shape, garbage signature bytes.
        let mut bad = result.clone();
        bad.signatures = vec![0xaa; bad.signatures.len()];
        let events = set.coordinator.submit_dkg_result(submitter, &bad, height)?;
        print_events(&events, show_events)?;

        height += 3;
        let events = set
            .coordinator
            .challenge_dkg_result(CHALLENGER, &bad, height)?;
        print_events(&events, show_events)?;
        warn!(height, "challenged result dropped, submission window restarted");
    }

    let events = set
        .coordinator
        .submit_dkg_result(submitter, &result, height)?;
    print_events(&events, show_events)?;
    let submitted_at = height;

    height = submitted_at + params.challenge_period_length;
    let events = set
        .coordinator
        .approve_dkg_result(submitter, &result, height)?;
    print_events(&events, show_events)?;

    let wallet_id = result.wallet_id();
    let wallet = set
        .coordinator
        .wallet(&wallet_id)
        .ok_or_else(|| anyhow!("approved wallet is not registered"))?;
    info!(
        wallet_id = %hex::encode(wallet.id),
        activation_height = wallet.activation_height,
        "lifecycle complete"
    );

    println!("Wallet ID:  {}", hex::encode(wallet.id));
    println!("Public key: {}", hex::encode(wallet.public_key()));
    Ok(())
}

fn run_select_group(cli: &Cli, seed_hex: &str, group_size: u32) -> Result<()> {
    let decoded = hex::decode(seed_hex)?;
    let seed: [u8; 32] = decoded
        .as_slice()
        .try_into()
        .map_err(|_| anyhow!("seed must be exactly 32 bytes, got {}", decoded.len()))?;

    let config = GroupConfig {
        group_size,
        weight_divisor: 1,
        ..Default::default()
    };
    let set = operator_set(config, DkgParameters::default(), cli)?;

    let members = set.coordinator.pool().select_group(group_size, seed)?;
    for (position, member) in members.iter().enumerate() {
        println!("{:>3}  {member}", position + 1);
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Lifecycle {
            group_size,
            threshold,
            challenge,
            events,
        } => run_lifecycle(&cli, *group_size, *threshold, *challenge, *events)?,
        Commands::SelectGroup { seed, group_size } => {
            run_select_group(&cli, seed, *group_size)?
        }
        Commands::Params => {
            println!(
                "{}",
                serde_json::to_string_pretty(&DkgParameters::default())?
            );
        }
    }

    Ok(())
}
