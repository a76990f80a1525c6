use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Conversion between whole tokens and base units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUnits {
    pub decimals: u32,
}

impl TokenUnits {
    pub fn new(decimals: u32) -> Self {
        Self { decimals }
    }

    fn scale(&self) -> Decimal {
        Decimal::from_i128_with_scale(10i128.pow(self.decimals), 0)
    }

    /// Whole tokens (possibly fractional) to base units, truncated to an integer
    pub fn to_base(&self, tokens: Decimal) -> Decimal {
        (tokens * self.scale()).trunc()
    }

    pub fn to_tokens(&self, base: Decimal) -> Decimal {
        base / self.scale()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_between_tokens_and_base_units() {
        let units = TokenUnits::new(18);
        let base = units.to_base(Decimal::new(15, 1));
        assert_eq!(base, Decimal::from(1_500_000_000_000_000_000u64));
        assert_eq!(units.to_tokens(base), Decimal::new(15, 1));
    }
}
