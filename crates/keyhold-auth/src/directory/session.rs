//! One scoped connection to a directory server

use super::classify::{self, Phase};
use keyhold_core::config::DirectoryPreviewConfig;
use keyhold_core::types::{DirectoryConfig, EncryptionType, EntryAttributes};
use keyhold_core::{Error, Result};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry, SearchOptions};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Entries returned by one search
pub(crate) struct SearchOutcome {
    pub entries: Vec<(String, EntryAttributes)>,
    pub truncated: bool,
}

/// Open LDAP session plus its connection driver.
///
/// Dropping the session aborts the driver, which closes the socket, so the
/// connection is released on every exit path including cancellation.
pub(crate) struct DirectorySession {
    ldap: Ldap,
    driver: JoinHandle<()>,
    target: String,
}

impl DirectorySession {
    /// Resolve, reach and open a session to the configured server
    pub(crate) async fn open(
        config: &DirectoryConfig,
        settings: &DirectoryPreviewConfig,
    ) -> Result<Self> {
        let host = config.server_host.trim();
        let port = config
            .port()
            .ok_or_else(|| Error::validation("ServerPort", "must be between 1 and 65535"))?;
        let target = format!("{}:{}", host, port);
        let connect_timeout = settings.connect_timeout();

        let addrs = resolve(host, port, connect_timeout).await?;
        check_reachable(&addrs, &target, connect_timeout).await?;

        let ldap_settings = LdapConnSettings::new()
            .set_conn_timeout(connect_timeout)
            .set_starttls(config.encryption_type == EncryptionType::StartTls)
            .set_no_tls_verify(settings.skip_tls_verify);

        debug!(
            server = %target,
            encryption = %config.encryption_type,
            "Opening directory session"
        );

        let url = config.url();
        let (conn, ldap) = match timeout(
            connect_timeout,
            LdapConnAsync::with_settings(ldap_settings, &url),
        )
        .await
        {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                warn!(server = %target, error = %e, "Directory session setup failed");
                return Err(classify::open_failure(&e, &config.encryption_type, &target));
            }
            Err(_) => {
                warn!(server = %target, "Directory session setup timed out");
                return Err(classify::timed_out(Phase::Connect, Some(connect_timeout)));
            }
        };

        let driver_target = target.clone();
        let driver = tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                debug!(server = %driver_target, error = %e, "Directory connection driver stopped");
            }
        });

        Ok(Self {
            ldap,
            driver,
            target,
        })
    }

    pub(crate) async fn bind(&mut self, dn: &str, password: &str, limit: Duration) -> Result<()> {
        let result = match timeout(limit, self.ldap.simple_bind(dn, password)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(server = %self.target, error = %e, "Directory bind failed");
                return Err(classify::operation_failure(Phase::Bind, &e));
            }
            Err(_) => {
                warn!(server = %self.target, "Directory bind timed out");
                return Err(classify::timed_out(Phase::Bind, Some(limit)));
            }
        };

        if result.rc != 0 {
            debug!(
                server = %self.target,
                rc = result.rc,
                text = %result.text,
                "Directory server rejected bind"
            );
        }

        classify::bind_code(result.rc)
    }

    /// Subtree search capped at `size_limit` entries
    pub(crate) async fn search(
        &mut self,
        phase: Phase,
        base: &str,
        filter: &str,
        attrs: Vec<String>,
        size_limit: i32,
        limit: Duration,
    ) -> Result<SearchOutcome> {
        debug!(server = %self.target, phase = %phase, base, filter, "Running directory search");

        let search = self
            .ldap
            .with_search_options(SearchOptions::new().sizelimit(size_limit))
            .search(base, Scope::Subtree, filter, attrs);

        let result = match timeout(limit, search).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(server = %self.target, phase = %phase, error = %e, "Directory search failed");
                return Err(classify::operation_failure(phase, &e));
            }
            Err(_) => {
                warn!(server = %self.target, phase = %phase, "Directory search timed out");
                return Err(classify::timed_out(phase, Some(limit)));
            }
        };

        let (entries, status) = (result.0, result.1);
        if status.rc != 0 {
            debug!(
                server = %self.target,
                phase = %phase,
                rc = status.rc,
                text = %status.text,
                "Directory search finished with non-zero result"
            );
        }
        let truncated = classify::search_code(phase, status.rc)?;

        let entries = entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| (entry.dn, entry.attrs))
            .collect();

        Ok(SearchOutcome { entries, truncated })
    }

    /// Unbind politely; the socket closes when the session drops
    pub(crate) async fn close(mut self, limit: Duration) {
        match timeout(limit, self.ldap.unbind()).await {
            Ok(Ok(())) => debug!(server = %self.target, "Directory session closed"),
            Ok(Err(e)) => debug!(server = %self.target, error = %e, "Unbind failed"),
            Err(_) => debug!(server = %self.target, "Unbind timed out"),
        }
    }
}

impl Drop for DirectorySession {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

async fn resolve(host: &str, port: u16, limit: Duration) -> Result<Vec<SocketAddr>> {
    match timeout(limit, tokio::net::lookup_host((host, port))).await {
        Ok(Ok(addrs)) => {
            let addrs: Vec<SocketAddr> = addrs.collect();
            if addrs.is_empty() {
                Err(Error::Connect(format!("host {} has no addresses", host)))
            } else {
                Ok(addrs)
            }
        }
        Ok(Err(e)) => {
            debug!(host, error = %e, "Directory host lookup failed");
            Err(Error::Connect(format!("unable to resolve host {}", host)))
        }
        Err(_) => Err(Error::Connect(format!("timed out resolving host {}", host))),
    }
}

/// Confirm the server accepts TCP connections before starting the protocol
async fn check_reachable(addrs: &[SocketAddr], target: &str, limit: Duration) -> Result<()> {
    let mut last_error = None;

    for addr in addrs {
        match timeout(limit, TcpStream::connect(*addr)).await {
            Ok(Ok(_stream)) => return Ok(()),
            Ok(Err(e)) => {
                debug!(%addr, error = %e, "Directory server not reachable");
                last_error = Some(e.kind());
            }
            Err(_) => {
                debug!(%addr, "Directory server connect timed out");
                last_error = Some(std::io::ErrorKind::TimedOut);
            }
        }
    }

    warn!(server = target, "Directory server unreachable");
    Err(match last_error {
        Some(kind) => Error::Connect(format!("unable to connect to {}: {}", target, kind)),
        None => Error::Connect(format!("unable to connect to {}", target)),
    })
}
