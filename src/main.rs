//! Elohim Provenance CLI
//!
//! Drives a ledger persisted under the storage directory.
//!
//! ## Usage
//!
//! ```bash
//! # Deploy a registry and tag content
//! elohim-provenance deploy-registry --seed testseedphrase
//! elohim-provenance tag --registry 0x... http://arweave.net/abc http://arweave.net/def
//!
//! # Deploy a record that stays open for tracing for 10 minutes
//! elohim-provenance deploy-record --name Records --symbol IMG --parent 0x... --building-secs 600
//! elohim-provenance trace --record 0x... --registry 0x... 0x<tag id>
//!
//! # Attest once the record is immutable
//! elohim-provenance --from 0x... sign --record 0x...
//! ```
//!
//! Results are printed to stdout as JSON; logs go to stderr (`RUST_LOG`).

use clap::{Parser, Subcommand};
use elohim_provenance::{
    Address, Config, Entity, Ledger, LedgerStore, RecordParams, SystemClock, TagId,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "elohim-provenance")]
#[command(about = "Content-provenance ledger: tag registries and lineage-linked records")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "ELOHIM_PROVENANCE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the ledger state (overrides config file)
    #[arg(long, env = "ELOHIM_PROVENANCE_DIR")]
    storage_dir: Option<PathBuf>,

    /// Calling account (defaults to the configured operator)
    #[arg(long, env = "ELOHIM_PROVENANCE_CALLER")]
    from: Option<Address>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default config file
    InitConfig,

    /// Deploy a tag registry
    DeployRegistry {
        #[arg(long)]
        seed: String,
    },

    /// Mint tags for one or more content URIs
    Tag {
        #[arg(long)]
        registry: Address,

        #[arg(required = true)]
        uris: Vec<String>,
    },

    /// Deploy a record
    DeployRecord {
        #[arg(long)]
        name: String,

        #[arg(long)]
        symbol: String,

        /// Parent record (repeatable)
        #[arg(long = "parent")]
        parents: Vec<Address>,

        /// Unix time at which the record becomes immutable (0 = immediately)
        #[arg(long, conflicts_with = "building_secs")]
        immutable_from: Option<u64>,

        /// Length of the building window from now
        #[arg(long)]
        building_secs: Option<u64>,
    },

    /// Trace tags of a registry into a building record
    Trace {
        #[arg(long)]
        record: Address,

        #[arg(long)]
        registry: Address,

        #[arg(required = true)]
        tag_ids: Vec<TagId>,
    },

    /// Attest an immutable record
    Sign {
        #[arg(long)]
        record: Address,
    },

    /// Check whether an account attested a record
    HasSigned {
        #[arg(long)]
        record: Address,

        #[arg(long)]
        signer: Address,
    },

    /// Show a deployed registry or record
    Show { address: Address },

    /// List committed events
    Events {
        #[arg(long)]
        emitter: Option<Address>,
    },
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => {
            let mut defaults = Config::default();
            if let Some(dir) = &args.storage_dir {
                defaults.storage_dir = dir.clone();
            }
            let fallback = defaults.config_path();
            if fallback.exists() {
                Config::load(&fallback)?
            } else {
                defaults
            }
        }
    };

    if let Some(dir) = &args.storage_dir {
        config.storage_dir = dir.clone();
    }
    Ok(config)
}

/// Timestamp at which a building window of `secs` starting at `now` closes
fn building_window_end(now: u64, secs: u64) -> anyhow::Result<u64> {
    now.checked_add(secs)
        .ok_or_else(|| anyhow::anyhow!("building window of {} seconds overflows the timestamp range", secs))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("elohim_provenance=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let caller = args.from.unwrap_or(config.default_caller);

    if let Command::InitConfig = args.command {
        let path = args.config.clone().unwrap_or_else(|| config.config_path());
        if path.exists() {
            anyhow::bail!("config file already exists: {}", path.display());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        config.save(&path)?;
        println!("{}", json!({ "config": path }));
        return Ok(());
    }

    let store = LedgerStore::new(config.state_path());
    let mut ledger = Ledger::from_state(store.load()?, config.ledger.clone(), Arc::new(SystemClock));
    info!(caller = %caller, state = %store.path().display(), "Ledger opened");

    let output = match args.command {
        Command::InitConfig => unreachable!("handled above"),
        Command::DeployRegistry { seed } => {
            let address = ledger.deploy_tag_registry(&caller, &seed);
            json!({ "registry": address })
        }
        Command::Tag { registry, uris } => {
            let tag_ids = ledger.tag_multi(&caller, &registry, &uris)?;
            let tags: Vec<_> = tag_ids
                .iter()
                .zip(&uris)
                .map(|(id, uri)| json!({ "tag_id": id, "uri": uri }))
                .collect();
            json!({ "registry": registry, "tags": tags })
        }
        Command::DeployRecord {
            name,
            symbol,
            parents,
            immutable_from,
            building_secs,
        } => {
            let immutable_from = match immutable_from {
                Some(ts) => ts,
                None => building_window_end(
                    ledger.now(),
                    building_secs.unwrap_or(config.ledger.default_building_secs),
                )?,
            };
            let address = ledger.deploy_record(
                &caller,
                RecordParams {
                    parent_records: parents,
                    name,
                    symbol,
                    immutable_from,
                },
            )?;
            let record = ledger.record(&address)?;
            json!({
                "record": address,
                "immutable_from": record.immutable_from(),
                "chain_length": record.record_chain_length(),
            })
        }
        Command::Trace {
            record,
            registry,
            tag_ids,
        } => {
            ledger.trace_multi_tags(&caller, &record, &registry, &tag_ids)?;
            json!({ "record": record, "traced": tag_ids.len() })
        }
        Command::Sign { record } => {
            let newly_signed = ledger.sign(&caller, &record)?;
            json!({ "record": record, "signer": caller, "newly_signed": newly_signed })
        }
        Command::HasSigned { record, signer } => {
            let signed = ledger.has_signed(&record, &signer)?;
            json!({ "record": record, "signer": signer, "signed": signed })
        }
        Command::Show { address } => match ledger.entity(&address)? {
            Entity::Record(record) => json!({
                "kind": "record",
                "phase": record.phase(ledger.now()),
                "ancestors": ledger.ancestors(&address)?,
                "record": record,
            }),
            entity => serde_json::to_value(entity)?,
        },
        Command::Events { emitter } => {
            let receipts: Vec<_> = match &emitter {
                Some(addr) => ledger.events().by_emitter(addr).collect(),
                None => ledger.events().iter().collect(),
            };
            serde_json::to_value(receipts)?
        }
    };

    store.save(ledger.state())?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
