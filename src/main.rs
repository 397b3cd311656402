//! RAX SFTP Pool - Entry Point
//!
//! Opens a pool of SFTP sessions against one server, has every unit upload
//! (and optionally download) a file concurrently, then tears the pool down.

use log::{error, info};
use std::process;
use std::sync::Arc;
use tokio::task::JoinSet;

use rax_sftp_pool::config::HarnessConfig;
use rax_sftp_pool::error::handlers::{error_to_exit_code, handle_error};
use rax_sftp_pool::middleware::setup_logging;
use rax_sftp_pool::pool::{PoolOptions, SftpPool, dialer_from_config};
use rax_sftp_pool::{SftpPoolError, transfer::TransferReport};

#[tokio::main]
async fn main() {
    setup_logging();

    let config = match HarnessConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    info!(
        "Launching {} units against {}:{}{}",
        config.scenario.vus,
        config.target.host,
        config.target.port,
        if config.scenario.dry_run { " (dry run)" } else { "" }
    );

    let pool = Arc::new(SftpPool::new(
        dialer_from_config(&config),
        PoolOptions::from_config(&config),
    ));

    let outcome = run_scenario(&pool, &config).await;
    let teardown = pool.disconnect_pool().await;

    let first_error = match (outcome, teardown) {
        (Err(e), _) | (Ok(()), Err(e)) => e,
        (Ok(()), Ok(closed)) => {
            info!("Scenario complete, closed {} units", closed.closed);
            return;
        }
    };
    handle_error(&first_error);
    process::exit(error_to_exit_code(&first_error));
}

async fn run_scenario(pool: &Arc<SftpPool>, config: &HarnessConfig) -> Result<(), SftpPoolError> {
    let target = &config.target;
    let connected = pool
        .connect_pool(
            config.scenario.vus,
            &target.host,
            target.port,
            &target.user,
            &target.key_path,
            &target.passphrase,
        )
        .await?;

    let mut units = JoinSet::new();
    for vu in connected.ids {
        let pool = Arc::clone(pool);
        let scenario = config.scenario.clone();
        units.spawn(async move {
            let mut reports: Vec<TransferReport> = Vec::with_capacity(2);
            reports.push(
                pool.upload(vu, &scenario.local_dir, &scenario.file_name, &scenario.remote_dir)
                    .await?,
            );
            if let Some(download_dir) = &scenario.download_dir {
                reports.push(
                    pool.download(vu, &scenario.remote_dir, &scenario.file_name, download_dir)
                        .await?,
                );
            }
            Ok::<_, SftpPoolError>(reports)
        });
    }

    let mut first_error = None;
    let mut bytes = 0u64;
    while let Some(joined) = units.join_next().await {
        match joined {
            Ok(Ok(reports)) => bytes += reports.iter().map(|r| r.bytes).sum::<u64>(),
            Ok(Err(e)) => {
                handle_error(&e);
                first_error.get_or_insert(e);
            }
            Err(e) => {
                let e = SftpPoolError::Worker {
                    vu: None,
                    reason: e.to_string(),
                };
                handle_error(&e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => {
            info!("Transferred {} bytes across all units", bytes);
            Ok(())
        }
    }
}
