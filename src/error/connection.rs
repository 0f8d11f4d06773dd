use std::fmt;
use std::time::Duration;
use thiserror::Error as ThisError;

// SQLite primary result codes that mean "you may not open this store".
const SQLITE_PERM: i64 = 3;
const SQLITE_AUTH: i64 = 23;
const SQLITE_NOTADB: i64 = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectPhase {
    Connect,
    Ping,
}

impl fmt::Display for ConnectPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectPhase::Connect => f.write_str("connect"),
            ConnectPhase::Ping => f.write_str("ping"),
        }
    }
}

#[derive(Debug, ThisError)]
pub enum ConnectionError {
    #[error("Invalid database URI: {0}")]
    InvalidUri(#[source] sqlx::Error),

    #[error("Database {phase} timed out after {after:?}")]
    Timeout { phase: ConnectPhase, after: Duration },

    #[error("Database connect failed: {0}")]
    Network(#[source] sqlx::Error),

    #[error("Database authentication failed: {0}")]
    Auth(#[source] sqlx::Error),

    #[error("Database ping failed: {0}")]
    Ping(#[source] sqlx::Error),
}

impl ConnectionError {
    /// Classifies an error raised while opening the pool.
    pub(crate) fn from_connect(err: sqlx::Error, after: Duration) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => ConnectionError::Timeout {
                phase: ConnectPhase::Connect,
                after,
            },
            sqlx::Error::Configuration(_) => ConnectionError::InvalidUri(err),
            sqlx::Error::Database(db) if is_auth_code(db.code().as_deref()) => {
                ConnectionError::Auth(err)
            }
            _ => ConnectionError::Network(err),
        }
    }

    pub fn phase(&self) -> ConnectPhase {
        match self {
            ConnectionError::Timeout { phase, .. } => *phase,
            ConnectionError::Ping(_) => ConnectPhase::Ping,
            _ => ConnectPhase::Connect,
        }
    }
}

fn is_auth_code(code: Option<&str>) -> bool {
    // sqlx reports the extended result code; the primary code is the low byte.
    code.and_then(|c| c.parse::<i64>().ok())
        .map(|c| c & 0xff)
        .is_some_and(|c| matches!(c, SQLITE_PERM | SQLITE_AUTH | SQLITE_NOTADB))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_codes_match_on_primary_byte() {
        assert!(is_auth_code(Some("23")));
        assert!(is_auth_code(Some("26")));
        // SQLITE_AUTH_USER (extended) still reduces to SQLITE_AUTH.
        assert!(is_auth_code(Some("279")));
        assert!(!is_auth_code(Some("14")));
        assert!(!is_auth_code(None));
    }

    #[test]
    fn pool_timeout_maps_to_connect_timeout() {
        let err = ConnectionError::from_connect(sqlx::Error::PoolTimedOut, Duration::from_secs(3));
        assert!(matches!(
            err,
            ConnectionError::Timeout {
                phase: ConnectPhase::Connect,
                ..
            }
        ));
        assert_eq!(err.phase(), ConnectPhase::Connect);
    }
}
