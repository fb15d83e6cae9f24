//! Intent classification and routing contracts.
//!
//! The analysis stage classifies a user query into an [`Intent`]; the routing
//! stage turns that intent into a [`RouteAction`] through [`RoutingTable`], a
//! total pure function over closed enumerations. Keeping routing separate from
//! inference is what makes control flow deterministic and auditable even
//! though the upstream classification is not.
//!
//! The intent → action mapping is part of the crate's observable behaviour and
//! must stay stable across versions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classified purpose of a user query.
///
/// Anything the classifier emits outside the known set parses as
/// [`Intent::Unknown`]; routing maps that onto a defined default rather than
/// failing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Price,
    News,
    Fundamentals,
    Earnings,
    Trade,
    Portfolio,
    Analysis,
    Comparison,
    Unknown,
}

impl Intent {
    /// All intents the classifier is expected to produce.
    pub const KNOWN: [Intent; 8] = [
        Intent::Price,
        Intent::News,
        Intent::Fundamentals,
        Intent::Earnings,
        Intent::Trade,
        Intent::Portfolio,
        Intent::Analysis,
        Intent::Comparison,
    ];

    /// Parse a classifier label into the closed intent set.
    ///
    /// Parsing is case-insensitive and never fails: unrecognized labels become
    /// [`Intent::Unknown`].
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "PRICE" => Intent::Price,
            "NEWS" => Intent::News,
            "FUNDAMENTALS" => Intent::Fundamentals,
            "EARNINGS" => Intent::Earnings,
            "TRADE" => Intent::Trade,
            "PORTFOLIO" => Intent::Portfolio,
            "ANALYSIS" => Intent::Analysis,
            "COMPARISON" => Intent::Comparison,
            _ => Intent::Unknown,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Price => "PRICE",
            Intent::News => "NEWS",
            Intent::Fundamentals => "FUNDAMENTALS",
            Intent::Earnings => "EARNINGS",
            Intent::Trade => "TRADE",
            Intent::Portfolio => "PORTFOLIO",
            Intent::Analysis => "ANALYSIS",
            Intent::Comparison => "COMPARISON",
            Intent::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One concurrently executing specialist path within a cycle.
///
/// Each branch owns exactly one `results` key; the serialized key names
/// (`price`, `fundamental`, `trading`) are a persisted contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchId {
    Price,
    Fundamental,
    Trading,
}

impl BranchId {
    /// Every branch a routing action can dispatch.
    pub const ALL: [BranchId; 3] = [BranchId::Price, BranchId::Fundamental, BranchId::Trading];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BranchId::Price => "price",
            BranchId::Fundamental => "fundamental",
            BranchId::Trading => "trading",
        }
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing decision produced once per cycle by the routing stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteAction {
    Price,
    Fundamental,
    Trading,
    /// Parallel dispatch of the price and fundamental branches.
    Both,
}

impl RouteAction {
    /// The fixed branch set this action spawns.
    ///
    /// `Both` is the only parallel action; everything else is a single
    /// dispatch.
    #[must_use]
    pub fn branches(&self) -> &'static [BranchId] {
        match self {
            RouteAction::Price => &[BranchId::Price],
            RouteAction::Fundamental => &[BranchId::Fundamental],
            RouteAction::Trading => &[BranchId::Trading],
            RouteAction::Both => &[BranchId::Price, BranchId::Fundamental],
        }
    }

    /// True when this action fans out more than one branch.
    #[must_use]
    pub fn is_parallel(&self) -> bool {
        self.branches().len() > 1
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteAction::Price => "price",
            RouteAction::Fundamental => "fundamental",
            RouteAction::Trading => "trading",
            RouteAction::Both => "both",
        }
    }
}

impl fmt::Display for RouteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Total, pure mapping from intent to routing action.
pub struct RoutingTable;

impl RoutingTable {
    /// The action taken for an unrecognized classification.
    ///
    /// Inherited contract: unknown intents dispatch the price branch. See
    /// DESIGN.md for the rationale discussion.
    pub const DEFAULT_ACTION: RouteAction = RouteAction::Price;

    /// Map a classified intent to a routing action.
    ///
    /// Exhaustive over the closed enumeration, side-effect free, O(1), and
    /// independent of the inference interface. Calling it twice with the same
    /// intent always yields the same action.
    ///
    /// ```
    /// use tickerflow::routing::{Intent, RouteAction, RoutingTable};
    ///
    /// assert_eq!(RoutingTable::decide(Intent::Comparison), RouteAction::Both);
    /// assert_eq!(RoutingTable::decide(Intent::Unknown), RoutingTable::DEFAULT_ACTION);
    /// ```
    #[must_use]
    pub fn decide(intent: Intent) -> RouteAction {
        match intent {
            Intent::Price => RouteAction::Price,
            Intent::News | Intent::Fundamentals | Intent::Earnings => RouteAction::Fundamental,
            Intent::Trade | Intent::Portfolio => RouteAction::Trading,
            Intent::Analysis | Intent::Comparison => RouteAction::Both,
            Intent::Unknown => Self::DEFAULT_ACTION,
        }
    }
}
