//! Admission policy: whether a discovered URL may enter the frontier.
//!
//! Combines the scheme check, scope classification, exclusion rules,
//! external-depth bound, and the robots gate into a single verdict.
//! The robots check may fetch; everything else is pure.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::canonical::CanonicalUrl;
use crate::exclude::ExclusionFilter;
use crate::frontier::Discovery;
use crate::robots::RobotsGate;
use crate::scope::ScopeSet;

/// Why a URL was refused admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    UnsupportedScheme,
    Excluded,
    RobotsDenied,
    /// External anchor discovered deeper than `max_excluded_depth`.
    TooDeep,
}

/// The admission decision for one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Admitted {
        /// Not covered by any scope prefix.
        external: bool,
        /// At or under a scope root.
        lower_layer: bool,
    },
    Rejected(RejectReason),
}

/// Shared admission state for a crawl session.
pub struct Admission {
    scope: ScopeSet,
    exclude: ExclusionFilter,
    robots: Arc<RobotsGate>,
    max_excluded_depth: u32,
}

impl Admission {
    #[must_use]
    pub fn new(
        scope: ScopeSet,
        exclude: ExclusionFilter,
        robots: Arc<RobotsGate>,
        max_excluded_depth: u32,
    ) -> Self {
        Self {
            scope,
            exclude,
            robots,
            max_excluded_depth,
        }
    }

    #[must_use]
    pub fn scope(&self) -> &ScopeSet {
        &self.scope
    }

    /// Judge one URL. Seeds bypass the depth bound; everything else
    /// applies in order: scheme, exclusions, depth, robots.
    pub async fn admit(&self, url: &CanonicalUrl, discovery: Discovery, depth: u32) -> Verdict {
        if !url.is_http() {
            return Verdict::Rejected(RejectReason::UnsupportedScheme);
        }
        if self.exclude.is_excluded(url) {
            return Verdict::Rejected(RejectReason::Excluded);
        }

        let lower_layer = self.scope.in_lower_layer(url);
        let external = !lower_layer;

        if external && discovery != Discovery::Seed && depth > self.max_excluded_depth {
            return Verdict::Rejected(RejectReason::TooDeep);
        }
        if !self.robots.is_allowed(url).await {
            return Verdict::Rejected(RejectReason::RobotsDenied);
        }

        Verdict::Admitted {
            external,
            lower_layer,
        }
    }
}
