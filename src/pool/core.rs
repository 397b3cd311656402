use log::{debug, info, warn};
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::task::{self, JoinError, JoinSet};

use crate::auth::{TransportConfig, load_transport_config};
use crate::client::{SharedSession, VuId, VuRegistry};
use crate::error::{ClientError, SessionError, SftpPoolError};
use crate::middleware::{LogObserver, PoolObserver};
use crate::pool::options::PoolOptions;
use crate::pool::results::{ConnectPoolResult, DisconnectPoolResult};
use crate::storage::PathGuard;
use crate::transfer::{Direction, TransferReport, download_file, remote_join, upload_file};
use crate::transport::{Dialer, TransportSession};

type Establishment = (VuId, Result<TransportSession, SessionError>);

/// A pool of virtual units, each owning one SFTP session to the target.
pub struct SftpPool {
    registry: Arc<VuRegistry>,
    dialer: Arc<dyn Dialer>,
    options: Arc<PoolOptions>,
    observer: Arc<dyn PoolObserver>,
}

impl SftpPool {
    pub fn new(dialer: Arc<dyn Dialer>, options: PoolOptions) -> Self {
        Self {
            registry: Arc::new(VuRegistry::new()),
            dialer,
            options: Arc::new(options),
            observer: Arc::new(LogObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PoolObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn guard(&self) -> &PathGuard {
        &self.options.guard
    }

    pub async fn len(&self) -> usize {
        self.registry.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.registry.is_empty().await
    }

    /// Live unit identities, ascending.
    pub async fn unit_ids(&self) -> Vec<VuId> {
        self.registry.ids().await
    }

    /// Connect a single unit under the next free identity.
    pub async fn connect(
        &self,
        host: &str,
        port: u16,
        user: &str,
        key_path: impl AsRef<Path>,
        passphrase: &str,
    ) -> Result<VuId, SftpPoolError> {
        let config = self.load_config(user, key_path.as_ref(), passphrase).await?;

        let dialer = Arc::clone(&self.dialer);
        let host = host.to_string();
        let session = task::spawn_blocking(move || {
            TransportSession::establish(dialer.as_ref(), &config, &host, port)
        })
        .await
        .map_err(|e| worker_error(None, e))??;

        let addr = session.addr().to_string();
        let vu = self.registry.register(session).await;
        self.observer.on_connect(vu, &addr);
        Ok(vu)
    }

    /// Remove unit `vu` from the pool and close its session.
    ///
    /// The unit is gone from the registry even when closing fails.
    pub async fn disconnect(&self, vu: VuId) -> Result<(), SftpPoolError> {
        let session = self
            .registry
            .remove(vu)
            .await
            .ok_or(ClientError::UnknownUnit(vu))?;

        self.observer.on_disconnect(vu);
        close_shared(session).await.map_err(|e| {
            self.observer.on_close_error(vu, &e);
            SftpPoolError::Session(e)
        })
    }

    /// Establish `units` sessions concurrently and register them as units
    /// `1..=units`.
    ///
    /// Either every unit connects or none is registered. On the first
    /// failure, workers that have not dialled yet give up, sessions that
    /// already connected are closed, and sessions still being established are
    /// closed in the background as they finish. Any units from a previous
    /// pool are torn down first.
    pub async fn connect_pool(
        &self,
        units: usize,
        host: &str,
        port: u16,
        user: &str,
        key_path: impl AsRef<Path>,
        passphrase: &str,
    ) -> Result<ConnectPoolResult, SftpPoolError> {
        let count = VuId::try_from(units).map_err(|_| SftpPoolError::InvalidPoolSize(units))?;
        let config = self.load_config(user, key_path.as_ref(), passphrase).await?;

        if !self.registry.is_empty().await {
            info!(
                "Replacing {} units from the previous pool",
                self.registry.len().await
            );
            if let Err(e) = self.disconnect_pool().await {
                warn!("Previous pool did not close cleanly: {}", e);
            }
        }

        let started = Instant::now();
        let cancel = Arc::new(AtomicBool::new(false));
        let mut workers: JoinSet<Establishment> = JoinSet::new();
        let mut task_units = HashMap::with_capacity(units);

        for vu in 1..=count {
            let dialer = Arc::clone(&self.dialer);
            let config = Arc::clone(&config);
            let cancel = Arc::clone(&cancel);
            let host = host.to_string();

            let handle = workers.spawn_blocking(move || {
                if cancel.load(Ordering::SeqCst) {
                    return (vu, Err(SessionError::Cancelled));
                }
                (
                    vu,
                    TransportSession::establish(dialer.as_ref(), &config, &host, port),
                )
            });
            task_units.insert(handle.id(), vu);
        }
        debug!("Dispatched {} connection workers to {}:{}", units, host, port);

        let mut slots: Vec<Option<TransportSession>> = (0..units).map(|_| None).collect();
        let failure = loop {
            let Some(joined) = workers.join_next().await else {
                break None;
            };
            match joined {
                Ok((vu, Ok(session))) => slots[(vu - 1) as usize] = Some(session),
                Ok((vu, Err(source))) => {
                    self.observer.on_pool_failed(vu, &source);
                    break Some(SftpPoolError::Unit { vu, source });
                }
                Err(e) => {
                    let vu = task_units.get(&e.id()).copied();
                    break Some(worker_error(vu, e));
                }
            }
        };

        if let Some(err) = failure {
            cancel.store(true, Ordering::SeqCst);
            let collected: Vec<_> = slots
                .into_iter()
                .enumerate()
                .filter_map(|(i, slot)| slot.map(|s| (i as VuId + 1, s)))
                .collect();
            debug!(
                "Closing {} connected sessions, {} workers still running",
                collected.len(),
                workers.len()
            );
            self.close_collected(collected).await;
            self.reap(workers);
            return Err(err);
        }

        let mut ids = Vec::with_capacity(units);
        for (vu, session) in (1..=count).zip(slots.into_iter().flatten()) {
            let addr = session.addr().to_string();
            self.registry.put(vu, session).await;
            self.observer.on_connect(vu, &addr);
            ids.push(vu);
        }

        let elapsed = started.elapsed();
        self.observer.on_pool_connected(ids.len(), elapsed);
        Ok(ConnectPoolResult { ids, elapsed })
    }

    /// Close every unit concurrently and empty the registry.
    ///
    /// Every session is closed even when some fail; the first failure (by
    /// unit identity) is returned together with the failure count.
    pub async fn disconnect_pool(&self) -> Result<DisconnectPoolResult, SftpPoolError> {
        let units = self.registry.drain().await;
        let total = units.len();

        let mut closing = JoinSet::new();
        let mut task_units = HashMap::with_capacity(total);
        for (vu, session) in units {
            self.observer.on_disconnect(vu);
            let handle = closing.spawn(async move { (vu, close_shared(session).await) });
            task_units.insert(handle.id(), vu);
        }

        let mut failures = Vec::new();
        while let Some(joined) = closing.join_next().await {
            let (vu, err) = match joined {
                Ok((_, Ok(()))) => continue,
                Ok((vu, Err(err))) => (vu, err),
                Err(e) => {
                    let vu = task_units.get(&e.id()).copied().unwrap_or_default();
                    let err = SessionError::CloseConnection {
                        addr: format!("VU[{:05}]", vu),
                        source: io::Error::other(e.to_string()),
                    };
                    (vu, err)
                }
            };
            self.observer.on_close_error(vu, &err);
            failures.push((vu, err));
        }

        failures.sort_by_key(|(vu, _)| *vu);
        let failed = failures.len();
        match failures.into_iter().next() {
            None => Ok(DisconnectPoolResult { closed: total }),
            Some((vu, source)) => Err(SftpPoolError::Teardown {
                vu,
                source,
                failed,
                total,
            }),
        }
    }

    /// Upload `local_dir/file_name` to `remote_dir/file_name` over unit `vu`.
    pub async fn upload(
        &self,
        vu: VuId,
        local_dir: impl AsRef<Path>,
        file_name: &str,
        remote_dir: &str,
    ) -> Result<TransferReport, SftpPoolError> {
        let session = self.session(vu).await?;
        let local = self.options.guard.guard_join(local_dir, file_name)?;
        let remote = remote_join(remote_dir, file_name);
        let buffer_size = self.options.buffer_size;

        let started = Instant::now();
        let session = session.lock_owned().await;
        let (local, remote, copied) = task::spawn_blocking(move || {
            let copied = upload_file(&session, &local, &remote, buffer_size);
            (local, remote, copied)
        })
        .await
        .map_err(|e| worker_error(Some(vu), e))?;

        let report = TransferReport {
            vu,
            direction: Direction::Upload,
            local_path: local.into_path_buf(),
            remote_path: remote,
            bytes: copied?,
            elapsed: started.elapsed(),
        };
        self.observer.on_transfer(&report);
        Ok(report)
    }

    /// Download `remote_dir/file_name` to `local_dir/file_name` over unit
    /// `vu`, creating `local_dir` if needed.
    pub async fn download(
        &self,
        vu: VuId,
        remote_dir: &str,
        file_name: &str,
        local_dir: impl AsRef<Path>,
    ) -> Result<TransferReport, SftpPoolError> {
        let session = self.session(vu).await?;
        let local_dir = local_dir.as_ref();
        let local = self.options.guard.guard_join(local_dir, file_name)?;
        let staging = self
            .options
            .guard
            .guard_join(local_dir, &staging_name(file_name, vu))?;
        let remote = remote_join(remote_dir, file_name);
        let options = Arc::clone(&self.options);

        let started = Instant::now();
        let session = session.lock_owned().await;
        let (local, remote, copied) = task::spawn_blocking(move || {
            let copied = download_file(
                &session,
                &remote,
                &local,
                &staging,
                options.guard.root(),
                options.buffer_size,
            );
            (local, remote, copied)
        })
        .await
        .map_err(|e| worker_error(Some(vu), e))?;

        let report = TransferReport {
            vu,
            direction: Direction::Download,
            local_path: local.into_path_buf(),
            remote_path: remote,
            bytes: copied?,
            elapsed: started.elapsed(),
        };
        self.observer.on_transfer(&report);
        Ok(report)
    }

    async fn session(&self, vu: VuId) -> Result<SharedSession, SftpPoolError> {
        self.registry
            .get(vu)
            .await
            .ok_or_else(|| ClientError::UnknownUnit(vu).into())
    }

    /// Key decryption is CPU-bound, so it runs off the async workers.
    async fn load_config(
        &self,
        user: &str,
        key_path: &Path,
        passphrase: &str,
    ) -> Result<Arc<TransportConfig>, SftpPoolError> {
        let options = Arc::clone(&self.options);
        let user = user.to_string();
        let key_path = key_path.to_path_buf();
        let passphrase = zeroize::Zeroizing::new(passphrase.to_string());

        let config = task::spawn_blocking(move || {
            load_transport_config(
                &options.guard,
                &options.trust,
                &user,
                &key_path,
                &passphrase,
            )
        })
        .await
        .map_err(|e| worker_error(None, e))??;
        Ok(Arc::new(config))
    }

    async fn close_collected(&self, sessions: Vec<(VuId, TransportSession)>) {
        let mut closing = JoinSet::new();
        for (vu, mut session) in sessions {
            closing.spawn_blocking(move || (vu, session.close()));
        }
        while let Some(joined) = closing.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((vu, Err(e))) => self.observer.on_close_error(vu, &e),
                Err(e) => warn!("Close worker failed: {}", e),
            }
        }
    }

    /// Close sessions from workers that finish after the pool was abandoned.
    fn reap(&self, mut workers: JoinSet<Establishment>) {
        if workers.is_empty() {
            return;
        }
        let observer = Arc::clone(&self.observer);
        tokio::spawn(async move {
            let mut reaped = 0usize;
            while let Some(joined) = workers.join_next().await {
                let Ok((vu, Ok(mut session))) = joined else {
                    continue;
                };
                match task::spawn_blocking(move || session.close()).await {
                    Ok(Ok(())) => reaped += 1,
                    Ok(Err(e)) => observer.on_close_error(vu, &e),
                    Err(e) => warn!("VU[{:05}] Close worker failed: {}", vu, e),
                }
            }
            debug!("Reaped {} sessions from an abandoned pool", reaped);
        });
    }
}

/// Close a registered session, waiting for any transfer holding it.
async fn close_shared(session: SharedSession) -> Result<(), SessionError> {
    let mut session = session.lock_owned().await;
    let addr = session.addr().to_string();
    task::spawn_blocking(move || session.close())
        .await
        .unwrap_or_else(|e| {
            Err(SessionError::CloseConnection {
                addr,
                source: io::Error::other(e.to_string()),
            })
        })
}

/// Per-unit staging file, so units downloading the same name into one
/// directory never share a partial file.
fn staging_name(file_name: &str, vu: VuId) -> String {
    format!("{}.{:05}.part", file_name, vu)
}

fn worker_error(vu: Option<VuId>, err: JoinError) -> SftpPoolError {
    SftpPoolError::Worker {
        vu,
        reason: err.to_string(),
    }
}
