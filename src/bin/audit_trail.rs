//! Print the audit trail held in a JSON-lines record store.
//!
//! Reads persisted records only; no ledger is contacted.

use clap::Parser;
use dual_ledger_audit::audit::{AuditStore, AuditTrailQuery, JsonlAuditStore, TrailFilter, VerificationStatus};
use dual_ledger_audit::config::AuditConfig;
use dual_ledger_audit::core::{from_millis, now, to_millis};
use dual_ledger_audit::telemetry::init_tracing;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "audit-trail", version, about = "Print the ordered audit trail for a time range")]
struct Args {
    /// Record store file (defaults to AUDIT_STORE_PATH)
    #[arg(short, long, value_name = "PATH")]
    store: Option<PathBuf>,

    /// Range start, epoch milliseconds
    #[arg(long, default_value_t = 0)]
    from: i64,

    /// Range end, epoch milliseconds (defaults to now)
    #[arg(long)]
    to: Option<i64>,

    /// Only records flagged for manual audit
    #[arg(long)]
    flagged: bool,

    /// Only records with this status (VERIFIED, PARTIAL, FAILED)
    #[arg(long, value_parser = parse_status)]
    status: Option<VerificationStatus>,
}

fn parse_status(raw: &str) -> Result<VerificationStatus, String> {
    match raw.to_ascii_uppercase().as_str() {
        "VERIFIED" => Ok(VerificationStatus::Verified),
        "PARTIAL" => Ok(VerificationStatus::Partial),
        "FAILED" => Ok(VerificationStatus::Failed),
        other => Err(format!("unknown status {:?}", other)),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing("dual_ledger_audit=info,audit_trail=info");
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("audit trail failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> dual_ledger_audit::Result<()> {
    let path = match args.store {
        Some(path) => path,
        None => AuditConfig::from_env()?.store.path.ok_or_else(|| {
            dual_ledger_audit::Error::Config("no store given and AUDIT_STORE_PATH is unset".into())
        })?,
    };

    let store = Arc::new(JsonlAuditStore::open_read_only(&path)?);
    info!(path = %path.display(), records = store.count().await?, "store loaded");

    let to = args.to.unwrap_or_else(|| to_millis(&now()));
    let start = from_millis(args.from)
        .ok_or_else(|| dual_ledger_audit::Error::Validation(format!("--from {} is out of range", args.from)))?;
    let end = from_millis(to)
        .ok_or_else(|| dual_ledger_audit::Error::Validation(format!("--to {} is out of range", to)))?;

    let mut filter = TrailFilter::new();
    if args.flagged {
        filter = filter.flagged_only();
    }
    if let Some(status) = args.status {
        filter = filter.by_status(status);
    }

    let trail = AuditTrailQuery::new(store)
        .generate_filtered(start, end, &filter)
        .await?;
    for summary in trail.summaries() {
        println!("{}", serde_json::to_string(&summary)?);
    }
    Ok(())
}
