use serde::{Deserialize, Serialize};
use std::fmt;

/// Derived table families that keep their own "last computed date"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DerivationComponent {
    Balances,
    Supply,
    Concentration,
    Flows,
    Flags,
    Unlocks,
}

impl DerivationComponent {
    /// Dependency order; every component only reads tables of earlier ones
    pub const ALL: [DerivationComponent; 6] = [
        DerivationComponent::Balances,
        DerivationComponent::Supply,
        DerivationComponent::Concentration,
        DerivationComponent::Flows,
        DerivationComponent::Flags,
        DerivationComponent::Unlocks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DerivationComponent::Balances => "balances",
            DerivationComponent::Supply => "supply",
            DerivationComponent::Concentration => "concentration",
            DerivationComponent::Flows => "flows",
            DerivationComponent::Flags => "flags",
            DerivationComponent::Unlocks => "unlocks",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == value.to_lowercase())
    }
}

impl fmt::Display for DerivationComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
