use std::collections::{BTreeMap, HashSet};

use rust_decimal::Decimal;

use crate::domain::errors::ConfigError;
use crate::domain::models::{AddressLabel, Transfer};

/// Distinct counterparties that make an address high-traffic
pub const FAN_MIN_COUNTERPARTIES: usize = 50;

/// Volume, in base units, a high-traffic address must exceed (10^22)
pub fn fan_min_volume() -> Decimal {
    Decimal::from_i128_with_scale(10_000_000_000_000_000_000_000, 0)
}

/// Parses the exchange seed list: `<address> [tag]` per line, `#` comments
pub fn parse_seed_list(raw: &str) -> Result<Vec<AddressLabel>, ConfigError> {
    let mut labels = Vec::new();
    for (n, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (address, tag) = match line.split_once(char::is_whitespace) {
            Some((address, tag)) => (address, tag.trim()),
            None => (line, "Exchange"),
        };
        let address = normalize_address(address).ok_or_else(|| {
            ConfigError::Invalid(format!("line {}: '{}' is not an address", n + 1, address))
        })?;
        labels.push(AddressLabel {
            address,
            label: format!("CEX:{}", if tag.is_empty() { "Exchange" } else { tag }),
            category: "cex".to_string(),
            confidence: "high".to_string(),
            rationale: "seed list".to_string(),
            source: "manual".to_string(),
        });
    }
    Ok(labels)
}

/// Lowercase `0x` hex form of an address
pub fn normalize_address(raw: &str) -> Option<String> {
    let hex = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")).unwrap_or(raw);
    if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("0x{}", hex.to_lowercase()))
}

#[derive(Default)]
struct Traffic<'a> {
    counterparties: HashSet<&'a str>,
    volume: Decimal,
}

/// Low-confidence labels for unlabeled high-traffic addresses
///
/// Receivers from many distinct senders become `FanIn`, senders to many
/// distinct receivers become `FanOut`. An address matching both keeps `FanIn`.
pub fn fan_heuristics(transfers: &[Transfer]) -> Vec<AddressLabel> {
    let mut incoming: BTreeMap<&str, Traffic<'_>> = BTreeMap::new();
    let mut outgoing: BTreeMap<&str, Traffic<'_>> = BTreeMap::new();
    for t in transfers {
        let inbound = incoming.entry(t.to.as_str()).or_default();
        inbound.counterparties.insert(t.from.as_str());
        inbound.volume += t.value;

        let outbound = outgoing.entry(t.from.as_str()).or_default();
        outbound.counterparties.insert(t.to.as_str());
        outbound.volume += t.value;
    }

    let min_volume = fan_min_volume();
    let qualifies =
        |t: &Traffic<'_>| t.counterparties.len() >= FAN_MIN_COUNTERPARTIES && t.volume > min_volume;

    let mut labels = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for (kind, rationale, table) in [
        ("FanIn", "many unique senders", &incoming),
        ("FanOut", "many unique receivers", &outgoing),
    ] {
        for (address, traffic) in table {
            if qualifies(traffic) && seen.insert(*address) {
                labels.push(AddressLabel {
                    address: address.to_string(),
                    label: kind.to_string(),
                    category: "unknown".to_string(),
                    confidence: "low".to_string(),
                    rationale: rationale.to_string(),
                    source: "heuristic".to_string(),
                });
            }
        }
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::TransferSource;

    fn transfer(from: String, to: String, value: Decimal) -> Transfer {
        Transfer {
            block_number: 1,
            tx_hash: format!("0x{}{}", from, to),
            idx: 0,
            from,
            to,
            value,
            source: TransferSource::TopLevel,
        }
    }

    #[test]
    fn seed_lines_become_exchange_labels() {
        let labels = parse_seed_list(
            "# exchanges\n0xABCDEF Binance Hot 1\n\n0x1234\n",
        )
        .unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].address, "0xabcdef");
        assert_eq!(labels[0].label, "CEX:Binance Hot 1");
        assert_eq!(labels[1].label, "CEX:Exchange");
        assert_eq!(labels[1].source, "manual");
    }

    #[test]
    fn malformed_seed_address_is_rejected() {
        assert!(matches!(parse_seed_list("not-an-address"), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn fan_in_needs_many_senders_and_volume() {
        let big = fan_min_volume();
        let mut transfers: Vec<Transfer> = (0..50)
            .map(|i| transfer(format!("0xs{}", i), "0xhot".to_string(), big / Decimal::from(40)))
            .collect();
        transfers.push(transfer("0xs0".to_string(), "0xquiet".to_string(), big));

        let labels = fan_heuristics(&transfers);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].address, "0xhot");
        assert_eq!(labels[0].label, "FanIn");
        assert_eq!(labels[0].confidence, "low");

        transfers.truncate(49);
        assert!(fan_heuristics(&transfers).is_empty());
    }

    #[test]
    fn fan_out_detects_distributors() {
        let transfers: Vec<Transfer> = (0..60)
            .map(|i| transfer("0xdist".to_string(), format!("0xr{}", i), fan_min_volume() / Decimal::from(50)))
            .collect();
        let labels = fan_heuristics(&transfers);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].label, "FanOut");
        assert_eq!(labels[0].rationale, "many unique receivers");
    }
}
