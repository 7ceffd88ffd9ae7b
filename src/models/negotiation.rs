// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::{Deserialize, Serialize};

use crate::{
    cfg::enums::{CSNegotiationPolicy, NegotiationOutcome},
    error::{IrodsError, Result},
};

pub const NEG_RESULT_KW: &str = "cs_neg_result_kw";

/// `CS_NEG_PI`: both the server's announcement of its policy and the
/// client's reply carrying the joint outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "CS_NEG_PI")]
pub struct CsNegotiation {
    pub status: i32,
    pub result: String,
}

impl CsNegotiation {
    /// Client reply for a successful round.
    pub fn accept(outcome: NegotiationOutcome) -> Self {
        Self {
            status: 1,
            result: format!("{NEG_RESULT_KW}={};", outcome.as_wire()),
        }
    }

    /// Client reply when the matrix disallows any outcome.
    pub fn refuse() -> Self {
        Self {
            status: 0,
            result: format!("{NEG_RESULT_KW}={};", CSNegotiationPolicy::Failure.as_wire()),
        }
    }

    /// The policy token inside `result`, with or without the keyword
    /// prefix (servers send the bare token, clients echo the kw form).
    pub fn policy(&self) -> Result<CSNegotiationPolicy> {
        let raw = self.result.trim().trim_end_matches(';');
        let token = raw.strip_prefix(&format!("{NEG_RESULT_KW}=")).unwrap_or(raw);
        CSNegotiationPolicy::from_wire(token).ok_or_else(|| {
            IrodsError::protocol(
                "negotiation",
                format!("unknown negotiation token {token:?}"),
            )
        })
    }
}

/// The joint-outcome matrix. Requiring TCP against a server that requires
/// SSL (and vice versa) has no outcome.
pub fn negotiate(
    client: CSNegotiationPolicy,
    server: CSNegotiationPolicy,
) -> Result<NegotiationOutcome> {
    use CSNegotiationPolicy::*;

    match (client, server) {
        (DontCare, RequireSsl) => Ok(NegotiationOutcome::UseSsl),
        (DontCare, _) => Ok(NegotiationOutcome::UseTcp),
        (RequireTcp, DontCare | RequireTcp) => Ok(NegotiationOutcome::UseTcp),
        (RequireSsl, DontCare | RequireSsl) => Ok(NegotiationOutcome::UseSsl),
        _ => Err(IrodsError::Negotiation { client, server }),
    }
}
