//! Ordered status classification rules.
//!
//! WHOIS responses are free text, so their rules match on substrings of the
//! lowercased response. RDAP responses carry a list of status tokens, so
//! their rules match whole tokens. In both tables the first matching rule
//! wins.

use crate::status::DomainStatus;
use std::collections::HashSet;

/// Extra condition a rule needs before it applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// A marker match is enough
    None,
    /// The response must also carry an expiry date in the past
    ExpiryPassed,
}

/// One row of a classification table.
#[derive(Debug, Clone, Copy)]
pub struct StatusRule {
    pub status: DomainStatus,
    pub markers: &'static [&'static str],
    pub confirmation: Confirmation,
}

impl StatusRule {
    const fn new(status: DomainStatus, markers: &'static [&'static str]) -> Self {
        Self {
            status,
            markers,
            confirmation: Confirmation::None,
        }
    }

    const fn confirmed(
        status: DomainStatus,
        markers: &'static [&'static str],
        confirmation: Confirmation,
    ) -> Self {
        Self {
            status,
            markers,
            confirmation,
        }
    }
}

/// Substring rules for lowercased WHOIS text.
pub const WHOIS_RULES: &[StatusRule] = &[
    StatusRule::new(
        DomainStatus::Available,
        &[
            "no matching record",
            "not found",
            "no data found",
            "not exist",
            "no entries found",
            "status: available",
            "is available",
            "status: free",
            "未注册",
            "not registered",
        ],
    ),
    StatusRule::new(
        DomainStatus::Redemption,
        &[
            "redemption",
            "pending restore",
            "redemptionperiod",
            "pending delete restorable",
        ],
    ),
    StatusRule::new(
        DomainStatus::PendingDelete,
        &["pending delete", "pendingdelete", "to be released"],
    ),
    StatusRule::confirmed(
        DomainStatus::Expired,
        &["expired", "expiry date", "expires:"],
        Confirmation::ExpiryPassed,
    ),
    StatusRule::new(
        DomainStatus::Hold,
        &[
            "client hold",
            "server hold",
            "registrar hold",
            "registry hold",
            "clienthold",
            "serverhold",
        ],
    ),
    StatusRule::new(
        DomainStatus::TransferLocked,
        &[
            "transfer prohibited",
            "clienttransferprohibited",
            "servertransferprohibited",
        ],
    ),
    StatusRule::new(
        DomainStatus::Registered,
        &[
            "registrar:",
            "registrant:",
            "domain status:",
            "status:",
            "creation date:",
            "expiry date:",
            "name server",
        ],
    ),
];

/// Whole-token rules for lowercased RDAP status values.
pub const RDAP_RULES: &[StatusRule] = &[
    StatusRule::new(
        DomainStatus::Redemption,
        &["redemption period", "redemptionperiod"],
    ),
    StatusRule::new(DomainStatus::PendingDelete, &["pending delete", "pendingdelete"]),
    StatusRule::new(DomainStatus::Expired, &["expired"]),
    StatusRule::new(
        DomainStatus::Hold,
        &[
            "client hold",
            "server hold",
            "registrar hold",
            "registry hold",
            "clienthold",
            "serverhold",
        ],
    ),
    StatusRule::new(
        DomainStatus::TransferLocked,
        &[
            "client transfer prohibited",
            "server transfer prohibited",
            "clienttransferprohibited",
            "servertransferprohibited",
        ],
    ),
    StatusRule::new(
        DomainStatus::Registered,
        &[
            "ok",
            "active",
            "client update prohibited",
            "server update prohibited",
            "client delete prohibited",
            "server delete prohibited",
        ],
    ),
];

/// Classify lowercased WHOIS text.
///
/// `expiry_passed` tells whether the response carries an expiry date that
/// is already in the past; it gates the `expired` rule. Falls back to
/// `unknown` when nothing matches.
pub fn classify_text(lower: &str, expiry_passed: bool) -> DomainStatus {
    for rule in WHOIS_RULES {
        if !rule.markers.iter().any(|m| lower.contains(m)) {
            continue;
        }
        match rule.confirmation {
            Confirmation::None => return rule.status,
            Confirmation::ExpiryPassed if expiry_passed => return rule.status,
            Confirmation::ExpiryPassed => {}
        }
    }
    DomainStatus::Unknown
}

/// Classify a list of RDAP status tokens.
///
/// An empty list is `unknown`; a non-empty list that matches no rule is
/// still a registration record and classifies as `registered`.
pub fn classify_tokens<S: AsRef<str>>(tokens: &[S]) -> DomainStatus {
    if tokens.is_empty() {
        return DomainStatus::Unknown;
    }

    let set: HashSet<String> = tokens
        .iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .collect();

    RDAP_RULES
        .iter()
        .find(|rule| rule.markers.iter().any(|m| set.contains(*m)))
        .map(|rule| rule.status)
        .unwrap_or(DomainStatus::Registered)
}
