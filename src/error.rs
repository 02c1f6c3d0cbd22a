//! The crate's single error currency.

use std::io;

use thiserror::Error;

use crate::result::LdapResult;

/// Everything that can go wrong talking to a directory server.
#[derive(Debug, Error)]
pub enum LdapError {
    /// Bad input caught before anything touched the wire: a missing
    /// field, a control of the wrong shape, an empty attribute list.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The message decoded at the BER level but isn't a recognized
    /// LDAPMessage shape, or the response carries a result code the
    /// caller didn't ask for and which has no more specific mapping.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A well-formed LDAPResult whose code wasn't in the caller's
    /// expected set.
    #[error("server error: {result}")]
    Server { result: LdapResult },

    /// Dialing failed, the connect timer fired, or the transport closed
    /// with requests still pending.
    #[error("connection error: {0}")]
    Connection(String),

    /// The request queue held this entry past its configured timeout.
    #[error("queue timeout")]
    QueueTimeout,

    /// `Client::destroy()` was called before this operation completed.
    #[error("client destroyed")]
    ClientDestroyed,

    /// The per-request timer fired before a terminal response arrived.
    #[error("request timeout")]
    RequestTimeout(LdapResult),

    /// Underlying I/O failure not otherwise classified above.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl LdapError {
    /// RFC 4511 result code 80 ("other"), used to synthesize the local
    /// `LdapResult` a request timeout resolves with.
    pub const RESULT_CODE_OTHER: u32 = 80;

    pub(crate) fn request_timeout() -> LdapError {
        LdapError::RequestTimeout(LdapResult {
            rc: Self::RESULT_CODE_OTHER,
            matched: String::new(),
            text: "request timeout (client interrupt)".to_string(),
            refs: Vec::new(),
            ctrls: Vec::new(),
        })
    }
}

pub type Result<T> = std::result::Result<T, LdapError>;
