//! libssh2-backed transport
//!
//! Dials real SFTP hosts: TCP connect, SSH handshake, host-key check against
//! the known-hosts store, then public-key authentication from memory.

use log::{debug, info, warn};
use ssh2::{CheckResult, KnownHostFileKind, Session, Sftp};
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use crate::auth::{HostKeyPolicy, KnownHostsStore, TransportConfig};
use crate::transport::traits::{Connection, Dialer, RemoteFs};

/// Dialer for real SSH hosts.
#[derive(Debug, Clone)]
pub struct Ssh2Dialer {
    connect_timeout: Option<Duration>,
}

impl Ssh2Dialer {
    /// `connect_timeout` bounds the TCP connect and every blocking libssh2
    /// call; `None` waits indefinitely.
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        Self { connect_timeout }
    }

    fn connect_tcp(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        let mut last_error = None;

        for addr in (host, port).to_socket_addrs()? {
            let attempt = match self.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!("TCP connect to {} failed: {}", addr, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no addresses resolved for {}:{}", host, port),
            )
        }))
    }
}

impl Default for Ssh2Dialer {
    fn default() -> Self {
        Self::new(Some(Duration::from_secs(30)))
    }
}

impl Dialer for Ssh2Dialer {
    fn dial(
        &self,
        config: &TransportConfig,
        host: &str,
        port: u16,
    ) -> io::Result<Box<dyn Connection>> {
        let tcp = self.connect_tcp(host, port)?;

        let mut session = Session::new()?;
        if let Some(timeout) = self.connect_timeout {
            session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
        }
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| io::Error::other(format!("SSH handshake failed: {}", e)))?;

        verify_host_key(&session, config.host_keys(), host, port)?;

        session
            .userauth_pubkey_memory(config.user(), None, config.identity().openssh(), None)
            .map_err(|e| {
                io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    format!("public-key authentication failed for {}: {}", config.user(), e),
                )
            })?;

        if !session.authenticated() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("not authenticated as {} after public-key auth", config.user()),
            ));
        }

        info!("SSH authenticated to {}:{} as {}", host, port, config.user());
        Ok(Box::new(Ssh2Connection {
            session,
            open: true,
        }))
    }
}

fn verify_host_key(
    session: &Session,
    policy: &HostKeyPolicy,
    host: &str,
    port: u16,
) -> io::Result<()> {
    let store = match policy {
        HostKeyPolicy::AcceptAny => return Ok(()),
        HostKeyPolicy::KnownHosts(store) => store,
    };

    let (key, _) = session
        .host_key()
        .ok_or_else(|| io::Error::other("server presented no host key"))?;

    let mut known_hosts = session.known_hosts()?;
    load_known_hosts(&mut known_hosts, store);

    match known_hosts.check_port(host, port, key) {
        CheckResult::Match => Ok(()),
        CheckResult::NotFound => Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!(
                "host key for {}:{} not found in {}",
                host,
                port,
                store.path().display()
            ),
        )),
        CheckResult::Mismatch => Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("host key for {}:{} does not match known hosts", host, port),
        )),
        CheckResult::Failure => Err(io::Error::other(format!(
            "host key check for {}:{} failed",
            host, port
        ))),
    }
}

fn load_known_hosts(known_hosts: &mut ssh2::KnownHosts, store: &KnownHostsStore) {
    for line in store.lines() {
        if let Err(e) = known_hosts.read_str(line, KnownHostFileKind::OpenSSH) {
            warn!(
                "Skipping known-hosts entry libssh2 cannot read ({}): {}",
                store.path().display(),
                e
            );
        }
    }
}

struct Ssh2Connection {
    session: Session,
    open: bool,
}

impl Connection for Ssh2Connection {
    fn open_sftp(&mut self) -> io::Result<Box<dyn RemoteFs>> {
        let sftp = self.session.sftp()?;
        Ok(Box::new(Ssh2Sftp { sftp: Some(sftp) }))
    }

    fn close(&mut self) -> io::Result<()> {
        if !std::mem::replace(&mut self.open, false) {
            return Ok(());
        }
        self.session
            .disconnect(None, "Client disconnecting", None)
            .map_err(io::Error::from)
    }
}

struct Ssh2Sftp {
    sftp: Option<Sftp>,
}

impl Ssh2Sftp {
    fn channel(&self) -> io::Result<&Sftp> {
        self.sftp
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "SFTP channel closed"))
    }
}

impl RemoteFs for Ssh2Sftp {
    fn create(&self, path: &str) -> io::Result<Box<dyn Write + Send>> {
        let file = self.channel()?.create(Path::new(path))?;
        Ok(Box::new(file))
    }

    fn open(&self, path: &str) -> io::Result<Box<dyn Read + Send>> {
        let file = self.channel()?.open(Path::new(path))?;
        Ok(Box::new(file))
    }

    fn close(&mut self) -> io::Result<()> {
        match self.sftp.take() {
            Some(mut sftp) => sftp.shutdown().map_err(io::Error::from),
            None => Ok(()),
        }
    }
}
