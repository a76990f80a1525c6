use serde::{Deserialize, Serialize};

/// Categories whose holdings never count as circulating supply
pub const NON_CIRCULATING_CATEGORIES: [&str; 7] = [
    "treasury",
    "foundation",
    "investor",
    "team",
    "vesting",
    "escrow",
    "contract",
];

/// Label or category fragments that mark locked holdings
const LOCKUP_PATTERNS: [&str; 3] = ["lockup", "escrow", "multisig"];

/// Static address classification, maintained outside the indexer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressLabel {
    pub address: String,
    pub label: String,
    pub category: String,
    pub confidence: String,
    pub rationale: String,
    pub source: String,
}

impl AddressLabel {
    /// Whether balances held by this address are excluded from circulating supply
    pub fn is_non_circulating(&self) -> bool {
        let category = self.category.to_lowercase();
        if NON_CIRCULATING_CATEGORIES.contains(&category.as_str()) {
            return true;
        }
        let label = self.label.to_lowercase();
        LOCKUP_PATTERNS
            .iter()
            .any(|p| category.contains(p) || label.contains(p))
    }

    /// Whether the label marks an exchange wallet
    pub fn is_exchange(&self, exchange_categories: &[String]) -> bool {
        let category = self.category.to_lowercase();
        exchange_categories.iter().any(|c| *c == category)
    }

    /// Name used for the exchange column of the flow table
    pub fn exchange_name(&self) -> String {
        self.label
            .strip_prefix("CEX:")
            .unwrap_or(&self.label)
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(label: &str, category: &str) -> AddressLabel {
        AddressLabel {
            address: "0xabc".to_string(),
            label: label.to_string(),
            category: category.to_string(),
            confidence: "high".to_string(),
            rationale: String::new(),
            source: "manual".to_string(),
        }
    }

    #[test]
    fn fixed_categories_are_non_circulating() {
        assert!(label("Foundation wallet", "foundation").is_non_circulating());
        assert!(label("x", "Treasury").is_non_circulating());
        assert!(!label("Binance 14", "cex").is_non_circulating());
    }

    #[test]
    fn lockup_patterns_match_label_or_category() {
        assert!(label("Team Multisig", "unknown").is_non_circulating());
        assert!(label("x", "ecosystem_lockup").is_non_circulating());
    }

    #[test]
    fn exchange_name_strips_seed_prefix() {
        let l = label("CEX:Binance", "cex");
        assert!(l.is_exchange(&["cex".to_string()]));
        assert_eq!(l.exchange_name(), "Binance");
    }
}
