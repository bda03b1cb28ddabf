//! Consent decision engine
//!
//! Classifies the stored consent into a page state and derives what the page
//! has to show. Evaluated once per page load and again after a revoke.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::category::{CategoryModel, NECESSARY};
use crate::record::ConsentRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    /// No record stored (or it expired)
    NoDecision,
    /// A record exists but does not grant the required categories
    Insufficient,
    Sufficient,
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageState::NoDecision => write!(f, "no_decision"),
            PageState::Insufficient => write!(f, "insufficient"),
            PageState::Sufficient => write!(f, "sufficient"),
        }
    }
}

/// The page-level switches the engine needs, taken from the page config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PagePolicy {
    pub require_consent: bool,
    pub show_block_overlay: bool,
    /// False on exempt pages (privacy policy, imprint)
    pub should_block_page: bool,
    pub preview_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub state: PageState,
    pub must_show_banner: bool,
    pub must_block_page: bool,
    pub must_show_overlay: bool,
}

/// True iff a record exists and grants `necessary`.
///
/// Optional categories never gate page access, so rejecting all of them is
/// still a completed decision.
pub fn has_sufficient_consent(record: Option<&ConsentRecord>) -> bool {
    record
        .and_then(|r| r.categories.get(NECESSARY))
        .copied()
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy)]
pub struct DecisionEngine {
    policy: PagePolicy,
}

impl DecisionEngine {
    pub fn new(policy: PagePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PagePolicy {
        &self.policy
    }

    pub fn classify(&self, model: &CategoryModel, record: Option<&ConsentRecord>) -> PageState {
        let Some(record) = record else {
            return PageState::NoDecision;
        };

        let required_denied = model
            .definitions()
            .iter()
            .filter(|c| c.required)
            .any(|c| record.categories.get(&c.key) == Some(&false));

        if has_sufficient_consent(Some(record)) && !required_denied {
            PageState::Sufficient
        } else {
            PageState::Insufficient
        }
    }

    pub fn evaluate(&self, model: &CategoryModel, record: Option<&ConsentRecord>) -> Decision {
        let state = self.classify(model, record);
        let undecided = matches!(state, PageState::NoDecision | PageState::Insufficient);
        let must_show_banner =
            self.policy.preview_mode || (undecided && self.policy.should_block_page);

        let decision = self.gate(state, must_show_banner);
        tracing::debug!(
            state = %decision.state,
            banner = decision.must_show_banner,
            block = decision.must_block_page,
            overlay = decision.must_show_overlay,
            "Evaluated consent decision"
        );
        decision
    }

    /// Decision right after the user revoked consent.
    ///
    /// The banner is always shown so consent can be given again, also on
    /// exempt pages; blocking still honours the page policy.
    pub fn evaluate_revoked(&self) -> Decision {
        self.gate(PageState::NoDecision, true)
    }

    fn gate(&self, state: PageState, must_show_banner: bool) -> Decision {
        let must_block_page =
            self.policy.require_consent && must_show_banner && self.policy.should_block_page;
        let must_show_overlay =
            self.policy.show_block_overlay && must_show_banner && self.policy.should_block_page;

        Decision {
            state,
            must_show_banner,
            must_block_page,
            must_show_overlay,
        }
    }
}
