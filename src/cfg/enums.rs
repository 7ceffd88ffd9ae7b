// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use serde::{Deserialize, Serialize};

/// Authentication scheme selected by the account.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    #[serde(rename = "native", alias = "Native", alias = "NATIVE")]
    Native,
    #[serde(rename = "gsi", alias = "GSI")]
    Gsi,
    #[serde(rename = "pam", alias = "PAM")]
    Pam,
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthScheme::Native => "native",
            AuthScheme::Gsi => "gsi",
            AuthScheme::Pam => "pam",
        })
    }
}

/// Client-server negotiation policy, serialized with the on-wire token
/// names ("CS_NEG_REFUSE" means "plain TCP only").
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CSNegotiationPolicy {
    #[serde(rename = "CS_NEG_DONT_CARE", alias = "dont_care", alias = "DontCare")]
    DontCare,
    #[serde(
        rename = "CS_NEG_REFUSE",
        alias = "require_tcp",
        alias = "RequireTcp",
        alias = "refuse_ssl"
    )]
    RequireTcp,
    #[serde(rename = "CS_NEG_REQUIRE", alias = "require_ssl", alias = "RequireSsl")]
    RequireSsl,
    #[serde(rename = "CS_NEG_FAILURE", alias = "failure")]
    Failure,
}

impl CSNegotiationPolicy {
    pub fn as_wire(&self) -> &'static str {
        match self {
            CSNegotiationPolicy::DontCare => "CS_NEG_DONT_CARE",
            CSNegotiationPolicy::RequireTcp => "CS_NEG_REFUSE",
            CSNegotiationPolicy::RequireSsl => "CS_NEG_REQUIRE",
            CSNegotiationPolicy::Failure => "CS_NEG_FAILURE",
        }
    }

    pub fn from_wire(token: &str) -> Option<Self> {
        match token {
            "CS_NEG_DONT_CARE" => Some(CSNegotiationPolicy::DontCare),
            "CS_NEG_REFUSE" => Some(CSNegotiationPolicy::RequireTcp),
            "CS_NEG_REQUIRE" => Some(CSNegotiationPolicy::RequireSsl),
            "CS_NEG_FAILURE" => Some(CSNegotiationPolicy::Failure),
            _ => None,
        }
    }
}

impl fmt::Display for CSNegotiationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Joint outcome of a client/server negotiation round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationOutcome {
    UseTcp,
    UseSsl,
}

impl NegotiationOutcome {
    pub fn as_wire(&self) -> &'static str {
        match self {
            NegotiationOutcome::UseTcp => "CS_NEG_USE_TCP",
            NegotiationOutcome::UseSsl => "CS_NEG_USE_SSL",
        }
    }
}

impl fmt::Display for NegotiationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}
