//! Transport session
//!
//! One authenticated connection plus the SFTP sub-session layered on it.

use log::{debug, warn};
use std::io;

use crate::auth::TransportConfig;
use crate::error::SessionError;
use crate::transport::traits::{Connection, Dialer, RemoteFs};

/// A live connection and its SFTP sub-session.
///
/// Not safe for concurrent use; the registry wraps each one in a mutex.
pub struct TransportSession {
    addr: String,
    connection: Option<Box<dyn Connection>>,
    sftp: Option<Box<dyn RemoteFs>>,
}

impl TransportSession {
    /// Dial `host:port` and start an SFTP sub-session.
    ///
    /// If the sub-session fails to start, the already-open connection is
    /// closed before returning.
    pub fn establish(
        dialer: &dyn Dialer,
        config: &TransportConfig,
        host: &str,
        port: u16,
    ) -> Result<Self, SessionError> {
        let addr = format!("{}:{}", host, port);

        let mut connection = dialer
            .dial(config, host, port)
            .map_err(|source| SessionError::Dial {
                addr: addr.clone(),
                source,
            })?;

        let sftp = match connection.open_sftp() {
            Ok(sftp) => sftp,
            Err(source) => {
                if let Err(e) = connection.close() {
                    warn!("Failed to close connection to {} after SFTP start failure: {}", addr, e);
                }
                return Err(SessionError::SessionStart { addr, source });
            }
        };

        debug!("Transport session established with {}", addr);
        Ok(Self {
            addr,
            connection: Some(connection),
            sftp: Some(sftp),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// The SFTP sub-session, or `NotConnected` once closed.
    pub fn sftp(&self) -> io::Result<&dyn RemoteFs> {
        self.sftp.as_deref().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "SFTP session already closed")
        })
    }

    /// Close the sub-session, then the connection.
    ///
    /// Both closes are always attempted; the first error is returned.
    /// Closing an already-closed session is a no-op.
    pub fn close(&mut self) -> Result<(), SessionError> {
        let mut first_error = None;

        if let Some(mut sftp) = self.sftp.take() {
            if let Err(source) = sftp.close() {
                first_error = Some(SessionError::CloseSftp {
                    addr: self.addr.clone(),
                    source,
                });
            }
        }

        if let Some(mut connection) = self.connection.take() {
            if let Err(source) = connection.close() {
                let err = SessionError::CloseConnection {
                    addr: self.addr.clone(),
                    source,
                };
                match first_error {
                    Some(_) => warn!("{}", err),
                    None => first_error = Some(err),
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        if self.is_open() {
            if let Err(e) = self.close() {
                warn!("Error closing dropped session to {}: {}", self.addr, e);
            }
        }
    }
}
