//! Open-position summary valued at a ticker's last price.

use rust_decimal::Decimal;

use super::error::LedgerError;
use super::transaction::DerivedFields;

#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub symbol: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub market_value: Decimal,
    pub cost_per_unit: Decimal,
    pub total_cost: Decimal,
    pub unrealized_gain: Decimal,
    pub unrealized_gain_percent: Decimal,
    pub realized_gain: Decimal,
    pub dividends_collected: Decimal,
    pub total_gain: Decimal,
}

impl Holding {
    /// Values the running totals after a scope's last transaction.
    ///
    /// Returns `Ok(None)` for closed positions.
    pub fn from_derived(
        symbol: &str,
        derived: &DerivedFields,
        price: Decimal,
    ) -> Result<Option<Self>, LedgerError> {
        let quantity = derived.cumulative_units;
        if quantity <= Decimal::ZERO {
            return Ok(None);
        }
        let overflow = || LedgerError::ValuationOverflow {
            symbol: symbol.to_string(),
        };

        let total_cost = derived.cumulative_cost;
        let market_value = quantity.checked_mul(price).ok_or_else(overflow)?;
        let unrealized_gain = market_value.checked_sub(total_cost).ok_or_else(overflow)?;
        let unrealized_gain_percent = if total_cost > Decimal::ZERO {
            unrealized_gain
                .checked_div(total_cost)
                .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
                .ok_or_else(overflow)?
        } else {
            Decimal::ZERO
        };
        let total_gain = derived
            .realized_gains
            .checked_add(unrealized_gain)
            .and_then(|gain| gain.checked_add(derived.dividends_collected))
            .ok_or_else(overflow)?;

        Ok(Some(Holding {
            symbol: symbol.to_string(),
            quantity,
            price,
            market_value,
            cost_per_unit: total_cost.checked_div(quantity).ok_or_else(overflow)?,
            total_cost,
            unrealized_gain,
            unrealized_gain_percent,
            realized_gain: derived.realized_gains,
            dividends_collected: derived.dividends_collected,
            total_gain,
        }))
    }
}
