//! Periodic reconciliation: expire overdue disbursement votes and report
//! pools that lost their last administrator.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::env;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr, eyre};
use mockable::{Clock, DefaultClock};
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use healthfund::domain::ports::{DisbursementWorkflow, PoolRegistry};
use healthfund::domain::{DisbursementService, PoolRegistryService};
use healthfund::outbound::persistence::{
    DbPool, DieselDisbursementRepository, DieselMembershipRepository, DieselPoolRepository,
    PoolConfig,
};
use healthfund::outbound::security::RandomPoolCodeGenerator;

/// `reconcile-pools` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "reconcile-pools",
    about = "Expire overdue disbursement votes and list pools without an administrator",
    version
)]
struct CliArgs {
    /// Database connection URL. Falls back to `HEALTHFUND_DATABASE_URL`, then
    /// `DATABASE_URL`.
    #[arg(long = "database-url", value_name = "url")]
    database_url: Option<String>,
    /// Only report orphaned pools; leave overdue votes untouched.
    #[arg(long = "report-only")]
    report_only: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        eprintln!("tracing init failed: {e}");
    }
    let args = CliArgs::try_parse()?;
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("failed to build Tokio runtime")?;
    runtime.block_on(run(args))
}

async fn run(args: CliArgs) -> Result<()> {
    let database_url = resolve_database_url(args.database_url)?;
    let pool = DbPool::new(PoolConfig::new(database_url))
        .await
        .wrap_err("failed to create database pool")?;

    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let pools = Arc::new(DieselPoolRepository::new(pool.clone()));
    let members = Arc::new(DieselMembershipRepository::new(pool.clone()));
    let disbursements = Arc::new(DieselDisbursementRepository::new(pool));

    if !args.report_only {
        let workflow = DisbursementService::new(
            pools.clone(),
            members.clone(),
            disbursements,
            clock.clone(),
        );
        let expired = workflow
            .expire_overdue()
            .await
            .map_err(|e| eyre!("expiring overdue disbursements failed: {e}"))?;
        info!(expired, "overdue disbursements expired");
        println!("expired_disbursements={expired}");
    }

    let registry =
        PoolRegistryService::new(pools, members, Arc::new(RandomPoolCodeGenerator), clock);
    let orphaned = registry
        .list_orphaned_pools()
        .await
        .map_err(|e| eyre!("listing orphaned pools failed: {e}"))?;
    for pool_id in &orphaned {
        warn!(%pool_id, "pool has no administrator");
        println!("orphaned_pool={pool_id}");
    }
    println!("orphaned_pool_count={}", orphaned.len());
    Ok(())
}

fn resolve_database_url(flag: Option<String>) -> Result<String> {
    flag.or_else(|| env::var("HEALTHFUND_DATABASE_URL").ok())
        .or_else(|| env::var("DATABASE_URL").ok())
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| {
            eyre!("no database URL; pass --database-url or set HEALTHFUND_DATABASE_URL")
        })
}
