//! Mapping of directory failures onto the core error taxonomy

use keyhold_core::types::EncryptionType;
use keyhold_core::{Error, Result};
use ldap3::LdapError;
use std::fmt;
use std::io::ErrorKind;
use std::time::Duration;

// LDAP result codes (RFC 4511)
const SUCCESS: u32 = 0;
const SIZE_LIMIT_EXCEEDED: u32 = 4;
const REFERRAL: u32 = 10;
const NO_SUCH_OBJECT: u32 = 32;
const INVALID_DN_SYNTAX: u32 = 34;
const INVALID_CREDENTIALS: u32 = 49;
const INSUFFICIENT_ACCESS_RIGHTS: u32 = 50;
const FILTER_ERROR: u32 = 87;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Connect,
    Bind,
    UserSearch,
    GroupSearch,
}

impl Phase {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Phase::Connect => "connect",
            Phase::Bind => "bind",
            Phase::UserSearch => "user search",
            Phase::GroupSearch => "group search",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Socket-level failures, as opposed to protocol or TLS failures
pub(crate) fn is_transport(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::AddrNotAvailable
            | ErrorKind::BrokenPipe
            | ErrorKind::TimedOut
            | ErrorKind::HostUnreachable
            | ErrorKind::NetworkUnreachable
    )
}

/// Failure while establishing the LDAP session (TCP already reachable)
pub(crate) fn open_failure(err: &LdapError, encryption: &EncryptionType, target: &str) -> Error {
    match err {
        LdapError::Timeout { .. } => timed_out(Phase::Connect, None),
        LdapError::Io { source } if is_transport(source.kind()) => {
            Error::Connect(format!("unable to connect to {}: {}", target, source.kind()))
        }
        LdapError::LdapResult { result } if *encryption == EncryptionType::StartTls => {
            Error::Encryption(format!("server refused StartTLS (code {})", result.rc))
        }
        _ => match encryption {
            EncryptionType::None => Error::Connect(format!("unable to connect to {}", target)),
            _ => Error::Encryption(format!(
                "{} negotiation with {} failed; check the encryption type and server certificate",
                encryption_label(encryption),
                target
            )),
        },
    }
}

/// Failure of an operation on an established session
pub(crate) fn operation_failure(phase: Phase, err: &LdapError) -> Error {
    match err {
        LdapError::Timeout { .. } => timed_out(phase, None),
        LdapError::FilterParsing => {
            Error::Query(format!("{}: filter could not be encoded", phase))
        }
        _ => Error::Connect(format!(
            "connection to directory server lost during {}",
            phase
        )),
    }
}

pub(crate) fn timed_out(phase: Phase, limit: Option<Duration>) -> Error {
    match limit {
        Some(limit) => Error::Connect(format!(
            "directory server did not respond during {} within {}s",
            phase,
            limit.as_secs()
        )),
        None => Error::Connect(format!("directory server did not respond during {}", phase)),
    }
}

pub(crate) fn bind_code(rc: u32) -> Result<()> {
    match rc {
        SUCCESS => Ok(()),
        INVALID_CREDENTIALS => Err(Error::Auth("invalid credentials".to_string())),
        INVALID_DN_SYNTAX => Err(Error::Auth("bind DN is not a valid DN".to_string())),
        rc => Err(Error::Auth(format!(
            "bind rejected by directory server (code {})",
            rc
        ))),
    }
}

/// `Ok(true)` when the server stopped at the size limit
pub(crate) fn search_code(phase: Phase, rc: u32) -> Result<bool> {
    let reason = match rc {
        SUCCESS => return Ok(false),
        SIZE_LIMIT_EXCEEDED => return Ok(true),
        NO_SUCH_OBJECT => "base DN does not exist".to_string(),
        INVALID_DN_SYNTAX => "base DN is not a valid DN".to_string(),
        FILTER_ERROR => "filter rejected by directory server".to_string(),
        INSUFFICIENT_ACCESS_RIGHTS => "insufficient access rights".to_string(),
        REFERRAL => "base DN is held by another server".to_string(),
        rc => format!("search failed (code {})", rc),
    };
    Err(Error::Query(format!("{}: {}", phase, reason)))
}

fn encryption_label(encryption: &EncryptionType) -> &'static str {
    match encryption {
        EncryptionType::StartTls => "StartTLS",
        _ => "TLS",
    }
}
