//! Assets and the tickers they group.

use std::str::FromStr;

use super::error::LedgerError;

/// An asset is quoted by a primary listing plus at most two alternates.
pub const MAX_TICKERS_PER_ASSET: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetType {
    Stock,
    Bond,
    Etf,
    MutualFund,
    Crypto,
    PreciousMetals,
    Other,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Stock => "Stock",
            AssetType::Bond => "Bond",
            AssetType::Etf => "ETF",
            AssetType::MutualFund => "MutualFund",
            AssetType::Crypto => "Crypto",
            AssetType::PreciousMetals => "PreciousMetals",
            AssetType::Other => "Other",
        }
    }
}

impl FromStr for AssetType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Stock" => Ok(AssetType::Stock),
            "Bond" => Ok(AssetType::Bond),
            "ETF" | "Etf" => Ok(AssetType::Etf),
            "MutualFund" => Ok(AssetType::MutualFund),
            "Crypto" => Ok(AssetType::Crypto),
            "PreciousMetals" => Ok(AssetType::PreciousMetals),
            "Other" => Ok(AssetType::Other),
            _ => Err(LedgerError::InvalidAssetType {
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    /// Storage id, `None` until persisted.
    pub id: Option<i64>,
    pub name: String,
    pub asset_type: Option<AssetType>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub isin: Option<String>,
    ticker_ids: Vec<i64>,
}

impl Asset {
    pub fn new(name: &str) -> Self {
        Asset {
            id: None,
            name: name.trim().to_string(),
            asset_type: None,
            sector: None,
            industry: None,
            isin: None,
            ticker_ids: Vec::new(),
        }
    }

    pub fn with_isin(mut self, isin: &str) -> Result<Self, LedgerError> {
        validate_isin(isin)?;
        self.isin = Some(isin.to_string());
        Ok(self)
    }

    pub fn ticker_ids(&self) -> &[i64] {
        &self.ticker_ids
    }

    /// The first attached ticker is the primary listing.
    pub fn primary_ticker(&self) -> Option<i64> {
        self.ticker_ids.first().copied()
    }

    /// Attach a ticker. Attaching one that is already present is a no-op.
    pub fn attach_ticker(&mut self, ticker_id: i64) -> Result<(), LedgerError> {
        if self.ticker_ids.contains(&ticker_id) {
            return Ok(());
        }
        if self.ticker_ids.len() >= MAX_TICKERS_PER_ASSET {
            return Err(LedgerError::TooManyTickers {
                asset: self.name.clone(),
                limit: MAX_TICKERS_PER_ASSET,
            });
        }
        self.ticker_ids.push(ticker_id);
        Ok(())
    }
}

/// Validates ISIN shape and its Luhn check digit.
pub fn validate_isin(isin: &str) -> Result<(), LedgerError> {
    let invalid = || LedgerError::InvalidIsin {
        value: isin.to_string(),
    };
    let bytes = isin.as_bytes();
    if bytes.len() != 12
        || !bytes[..2].iter().all(u8::is_ascii_uppercase)
        || !bytes[2..11]
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        || !bytes[11].is_ascii_digit()
    {
        return Err(invalid());
    }

    // Letters expand to two digits (A=10 .. Z=35) before the Luhn pass.
    let mut digits = Vec::with_capacity(24);
    for &b in bytes {
        if b.is_ascii_digit() {
            digits.push(b - b'0');
        } else {
            let value = b - b'A' + 10;
            digits.push(value / 10);
            digits.push(value % 10);
        }
    }

    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            let d = u32::from(d);
            if i % 2 == 1 {
                let doubled = d * 2;
                doubled / 10 + doubled % 10
            } else {
                d
            }
        })
        .sum();

    if sum % 10 == 0 { Ok(()) } else { Err(invalid()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_type_round_trips() {
        for t in [
            AssetType::Stock,
            AssetType::Bond,
            AssetType::Etf,
            AssetType::MutualFund,
            AssetType::Crypto,
            AssetType::PreciousMetals,
            AssetType::Other,
        ] {
            assert_eq!(t.as_str().parse::<AssetType>().unwrap(), t);
        }
        assert!("Future".parse::<AssetType>().is_err());
    }

    #[test]
    fn attach_up_to_three_tickers() {
        let mut asset = Asset::new("Apple Inc.");
        asset.attach_ticker(1).unwrap();
        asset.attach_ticker(2).unwrap();
        asset.attach_ticker(3).unwrap();
        assert_eq!(asset.ticker_ids(), &[1, 2, 3]);
        assert_eq!(asset.primary_ticker(), Some(1));

        match asset.attach_ticker(4) {
            Err(LedgerError::TooManyTickers { asset, limit }) => {
                assert_eq!(asset, "Apple Inc.");
                assert_eq!(limit, 3);
            }
            other => panic!("expected TooManyTickers, got {other:?}"),
        }
    }

    #[test]
    fn attach_same_ticker_twice_is_noop() {
        let mut asset = Asset::new("Apple Inc.");
        asset.attach_ticker(1).unwrap();
        asset.attach_ticker(1).unwrap();
        assert_eq!(asset.ticker_ids(), &[1]);
    }

    #[test]
    fn valid_isins_pass() {
        assert!(validate_isin("US0378331005").is_ok());
        assert!(validate_isin("AU0000XVGZA3").is_ok());
        assert!(validate_isin("GB0002634946").is_ok());
    }

    #[test]
    fn bad_isins_fail() {
        for bad in ["US0378331006", "US037833100", "us0378331005", "US03783310X5", ""] {
            assert!(
                matches!(validate_isin(bad), Err(LedgerError::InvalidIsin { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn with_isin_sets_field() {
        let asset = Asset::new("Apple Inc.").with_isin("US0378331005").unwrap();
        assert_eq!(asset.isin.as_deref(), Some("US0378331005"));
        assert!(Asset::new("Apple Inc.").with_isin("XX").is_err());
    }
}
