//! Operation result structures and helpers.
//!
//! Most LDAP operations return an [`LdapResult`]. This module contains
//! its definition plus a couple of wrapper structs for operations whose
//! result codes carry extra meaning (Search, Compare), along with
//! [`success()`](LdapResult::success)/[`non_error()`](LdapResult::non_error)
//! helpers that adapt the C-like numeric result code to idiomatic
//! `Result`-based error handling without discarding the raw code.

use std::collections::HashSet;
use std::fmt;

use crate::controls::Control;
use crate::error::{LdapError, Result};
use crate::message::SearchEntry;

/// Common components of an LDAP operation result.
///
/// This struct faithfully replicates the components dictated by the
/// standard and is distinctly C-like in its reliance on numeric codes.
/// It would be tempting to hide it behind an automatic `Result`-like
/// interface, but some callers (e.g. Compare) need to inspect
/// non-error codes that aren't plain success, so the raw fields stay
/// available and [`success()`](#method.success)/[`non_error()`]
/// (#method.non_error) are offered as ergonomic shortcuts.
#[derive(Clone, Debug, Default)]
pub struct LdapResult {
    /// Result code. Zero indicates success; see
    /// [RFC 4511 appendix A.1](https://tools.ietf.org/html/rfc4511#appendix-A.1)
    /// for the rest.
    pub rc: u32,
    /// Matched component DN, where applicable.
    pub matched: String,
    /// Additional diagnostic text.
    pub text: String,
    /// Referral URIs, accumulated across a Search if more than one
    /// SearchResultReference was received.
    pub refs: Vec<HashSet<String>>,
    /// Response controls. Missing and empty are both an empty vector.
    pub ctrls: Vec<Control>,
}

pub(crate) fn describe_rc(rc: u32) -> &'static str {
    match rc {
        0 => "success",
        1 => "operationsError",
        2 => "protocolError",
        3 => "timeLimitExceeded",
        4 => "sizeLimitExceeded",
        5 => "compareFalse",
        6 => "compareTrue",
        7 => "authMethodNotSupported",
        8 => "strongerAuthRequired",
        10 => "referral",
        11 => "adminLimitExceeded",
        12 => "unavailableCriticalExtension",
        13 => "confidentialityRequired",
        14 => "saslBindInProgress",
        16 => "noSuchAttribute",
        17 => "undefinedAttributeType",
        18 => "inappropriateMatching",
        19 => "constraintViolation",
        20 => "attributeOrValueExists",
        21 => "invalidAttributeSyntax",
        32 => "noSuchObject",
        33 => "aliasProblem",
        34 => "invalidDNSyntax",
        36 => "aliasDereferencingProblem",
        48 => "inappropriateAuthentication",
        49 => "invalidCredentials",
        50 => "insufficientAccessRights",
        51 => "busy",
        52 => "unavailable",
        53 => "unwillingToPerform",
        54 => "loopDetect",
        64 => "namingViolation",
        65 => "objectClassViolation",
        66 => "notAllowedOnNonLeaf",
        67 => "notAllowedOnRDN",
        68 => "entryAlreadyExists",
        69 => "objectClassModsProhibited",
        71 => "affectsMultipleDSAs",
        80 => "other",
        88 => "abandoned",
        _ => "unknown",
    }
}

impl fmt::Display for LdapResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "rc={} ({}), dn: \"{}\", text: \"{}\"",
            self.rc,
            describe_rc(self.rc),
            self.matched,
            self.text
        )
    }
}

impl LdapResult {
    /// `true` for result code 0.
    pub fn is_success(&self) -> bool {
        self.rc == 0
    }

    /// `true` for result code 0 or 10 (referral).
    pub fn is_non_error(&self) -> bool {
        self.rc == 0 || self.rc == 10
    }

    /// If the result code is zero, return the instance wrapped in
    /// `Ok`, otherwise wrap it in `LdapError::Server`.
    pub fn success(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(LdapError::Server { result: self })
        }
    }

    /// If the result code is 0 or 10 (referral), return the instance
    /// wrapped in `Ok`, otherwise wrap it in `LdapError::Server`.
    pub fn non_error(self) -> Result<Self> {
        if self.is_non_error() {
            Ok(self)
        } else {
            Err(LdapError::Server { result: self })
        }
    }
}

/// Result of a Search operation collected into memory: every entry the
/// server sent plus the terminating `LdapResult`.
#[derive(Clone, Debug)]
pub struct SearchResult(pub Vec<SearchEntry>, pub LdapResult);

impl SearchResult {
    pub fn success(self) -> Result<(Vec<SearchEntry>, LdapResult)> {
        if self.1.is_success() {
            Ok((self.0, self.1))
        } else {
            Err(LdapError::Server { result: self.1 })
        }
    }

    pub fn non_error(self) -> Result<(Vec<SearchEntry>, LdapResult)> {
        if self.1.is_non_error() {
            Ok((self.0, self.1))
        } else {
            Err(LdapError::Server { result: self.1 })
        }
    }
}

/// Result of a Compare operation.
///
/// Compare uniquely has two non-error result codes (5/6) to carry the
/// boolean outcome of the comparison, while other codes indicate
/// errors as usual (barring 10, referral). [`equal()`](#method.equal)
/// optimizes for the common case of ignoring referrals;
/// [`non_error()`](#method.non_error) is available when that's not
/// possible.
#[derive(Clone, Debug)]
pub struct CompareResult(pub LdapResult);

impl CompareResult {
    /// `Ok(true)`/`Ok(false)` for compareTrue/compareFalse, else `Err`.
    pub fn equal(self) -> Result<bool> {
        match self.0.rc {
            5 => Ok(false),
            6 => Ok(true),
            _ => Err(LdapError::Server { result: self.0 }),
        }
    }

    /// `Ok` for compareTrue/compareFalse/referral, else `Err`.
    pub fn non_error(self) -> Result<LdapResult> {
        if matches!(self.0.rc, 5 | 6 | 10) {
            Ok(self.0)
        } else {
            Err(LdapError::Server { result: self.0 })
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn success_passes_through() {
        let r = LdapResult::default();
        assert!(r.success().is_ok());
    }

    #[test]
    fn non_zero_is_server_error() {
        let r = LdapResult {
            rc: 32,
            ..Default::default()
        };
        match r.success() {
            Err(LdapError::Server { result }) => assert_eq!(result.rc, 32),
            _ => panic!("expected Server error"),
        }
    }

    #[test]
    fn compare_maps_true_and_false() {
        let t = CompareResult(LdapResult {
            rc: 6,
            ..Default::default()
        });
        assert_eq!(t.equal().unwrap(), true);

        let f = CompareResult(LdapResult {
            rc: 5,
            ..Default::default()
        });
        assert_eq!(f.equal().unwrap(), false);
    }

    #[test]
    fn compare_no_such_object_is_error() {
        let e = CompareResult(LdapResult {
            rc: 32,
            ..Default::default()
        });
        assert!(e.equal().is_err());
    }
}
