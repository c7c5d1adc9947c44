// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Migrates a RocksDB key inventory to a new algorithm.
//!
//! Usage:
//!   KEYMIGRATE_MASTER_KEY=<hex> ./migrate_keys --db ./keys \
//!       --source rsa2048 --target hybrid_kyber768 --policy nist-sp800-208
//!
//! Options:
//!   --db <path>            RocksDB directory (required)
//!   --source <algorithm>   Algorithm to migrate away from (default: rsa2048)
//!   --target <algorithm>   Algorithm to migrate to (default: hybrid_kyber768)
//!   --policy <name>        Compliance policy (default: nist-sp800-208)
//!   --concurrency <n>      Records migrated concurrently (default: 32)
//!   --timeout-secs <n>     Cancel the run after n seconds
//!   --json                 JSON logs and a JSON report
//!
//! Exits 0 on success, 1 if the run did not succeed, 2 on bad arguments.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use keymigrate::algorithm::{AlgorithmSpec, AlgorithmType};
use keymigrate::compliance::PolicyName;
use keymigrate::crypto::{CapabilityTable, SoftwareBackend};
use keymigrate::migration::{run_migration, CancellationToken, MigrationRequest, ProofSigner};
use keymigrate::store::RocksKeyStore;
use tracing_subscriber::{fmt, EnvFilter};

const MASTER_KEY_ENV: &str = "KEYMIGRATE_MASTER_KEY";

struct Args {
    db: PathBuf,
    source: AlgorithmType,
    target: AlgorithmType,
    policy: PolicyName,
    concurrency: Option<usize>,
    timeout: Option<Duration>,
    json: bool,
}

fn usage() -> &'static str {
    "usage: migrate_keys --db <path> [--source <algorithm>] [--target <algorithm>] \
     [--policy <name>] [--concurrency <n>] [--timeout-secs <n>] [--json]"
}

fn parse_algorithm(name: &str) -> Result<AlgorithmType, String> {
    AlgorithmType::parse(name).ok_or_else(|| {
        let known: Vec<_> = AlgorithmType::ALL.iter().map(|t| t.as_str()).collect();
        format!("unknown algorithm {name:?}; expected one of {}", known.join(", "))
    })
}

fn parse_args(argv: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut db = None;
    let mut source = AlgorithmType::Rsa2048;
    let mut target = AlgorithmType::HybridKyber768;
    let mut policy = PolicyName::NistSp800_208;
    let mut concurrency = None;
    let mut timeout = None;
    let mut json = false;

    let mut argv = argv.into_iter();
    while let Some(flag) = argv.next() {
        let mut value = || argv.next().ok_or_else(|| format!("{flag} needs a value"));
        match flag.as_str() {
            "--db" => db = Some(PathBuf::from(value()?)),
            "--source" => source = parse_algorithm(&value()?)?,
            "--target" => target = parse_algorithm(&value()?)?,
            "--policy" => policy = value()?.parse().map_err(|e| format!("{e}"))?,
            "--concurrency" => {
                let n = value()?
                    .parse::<usize>()
                    .map_err(|e| format!("--concurrency: {e}"))?;
                concurrency = Some(n);
            }
            "--timeout-secs" => {
                let secs = value()?
                    .parse::<u64>()
                    .map_err(|e| format!("--timeout-secs: {e}"))?;
                timeout = Some(Duration::from_secs(secs));
            }
            "--json" => json = true,
            "-h" | "--help" => return Err(usage().to_string()),
            other => return Err(format!("unknown argument {other:?}\n{}", usage())),
        }
    }

    Ok(Args {
        db: db.ok_or_else(|| format!("--db is required\n{}", usage()))?,
        source,
        target,
        policy,
        concurrency,
        timeout,
        json,
    })
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(2);
        }
    };
    init_tracing(args.json);

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            tracing::error!(error = %err, "Migration could not start");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> Result<bool, Box<dyn std::error::Error>> {
    let master_key = std::env::var(MASTER_KEY_ENV)
        .map_err(|_| format!("{MASTER_KEY_ENV} must hold a hex-encoded 32-byte key"))?;
    let provider = Arc::new(CapabilityTable::software(SoftwareBackend::from_hex(
        &master_key,
    )?));
    let store = Arc::new(RocksKeyStore::open(&args.db)?);
    let signer = ProofSigner::generate()?;

    let mut request = MigrationRequest::new(
        AlgorithmSpec::preset(args.source),
        AlgorithmSpec::preset(args.target),
        args.policy.policy(),
    );
    if let Some(limit) = args.concurrency {
        request = request.with_concurrency_limit(limit);
    }
    if let Some(timeout) = args.timeout {
        request = request.with_timeout(timeout);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling migration");
            on_interrupt.cancel();
        }
    });

    let report = run_migration(store.clone(), provider, signer, request, cancel).await?;
    store.sync()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.to_json())?);
    } else {
        println!("status:          {}", report.status);
        println!("total:           {}", report.counts.total);
        println!("processed:       {}", report.counts.processed);
        println!("failed:          {}", report.counts.failed);
        println!("skipped:         {}", report.counts.skipped);
        println!("cancelled:       {}", report.counts.cancelled);
        println!("rolled back:     {}", report.counts.rolled_back);
        println!("throughput:      {:.1} records/s", report.throughput());
        if let Some(reason) = &report.reason {
            println!("reason:          {reason}");
        }
        for failure in &report.failures {
            println!("  {} failed at {}: {}", failure.id, failure.step, failure.error);
        }
        for id in &report.unrecovered {
            println!("  {id} NEEDS MANUAL RECOVERY");
        }
        if let Some(proof) = &report.proof {
            println!("proof signer:    {}", proof.signer_public_key);
            println!("proof signature: {}", proof.signature);
        }
    }

    Ok(report.is_success())
}
