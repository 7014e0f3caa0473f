//! Gas prices, fee computation and coin parsing

use crate::error::{DeployError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Gas buffer applied to simulated gas above [`BUFFER_THRESHOLD`].
pub const GAS_BUFFER: f64 = 1.3;
/// Gas buffer applied at or below [`BUFFER_THRESHOLD`].
pub const SMALL_GAS_BUFFER: f64 = 1.4;
pub const BUFFER_THRESHOLD: u64 = 200_000;

/// Gas limit used for the simulation pass itself. The node ignores it.
/// Simulations are signed with a zero fee, since fees are deducted in simulate mode too.
pub const SIMULATION_GAS_LIMIT: u64 = 100_000_000;

/// A native coin amount, e.g. `100uluna`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u128,
}

impl Coin {
    pub fn new(amount: u128, denom: impl Into<String>) -> Self {
        Coin {
            denom: denom.into(),
            amount,
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for Coin {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| DeployError::Msg(format!("Coin '{}' has no denom", s)))?;
        let (amount, denom) = s.split_at(split);
        if amount.is_empty() {
            return Err(DeployError::Msg(format!("Coin '{}' has no amount", s)));
        }
        validate_denom(denom)?;
        let amount = amount
            .parse::<u128>()
            .map_err(|e| DeployError::Msg(format!("Invalid coin amount in '{}': {}", s, e)))?;
        Ok(Coin::new(amount, denom))
    }
}

fn validate_denom(denom: &str) -> Result<()> {
    let mut chars = denom.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => {
            return Err(DeployError::Msg(format!(
                "Denom '{}' must start with a letter",
                denom
            )))
        }
    }
    if denom.len() > 128
        || !chars.all(|c| c.is_ascii_alphanumeric() || "/:._-".contains(c))
    {
        return Err(DeployError::Msg(format!("Invalid denom '{}'", denom)));
    }
    Ok(())
}

/// Parses a comma separated list of coins (`"100uluna,5uusd"`).
///
/// The result is sorted by denom, as the chain expects for funds. Zero amounts and
/// repeated denoms are rejected. An empty string yields no coins.
pub fn parse_coins(s: &str) -> Result<Vec<Coin>> {
    let mut coins = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let coin: Coin = part.parse()?;
        if coin.amount == 0 {
            return Err(DeployError::Msg(format!(
                "Zero amount for {} is not allowed",
                coin.denom
            )));
        }
        coins.push(coin);
    }
    coins.sort_by(|a, b| a.denom.cmp(&b.denom));
    if let Some(dup) = coins.windows(2).find(|w| w[0].denom == w[1].denom) {
        return Err(DeployError::Msg(format!("Denom {} appears twice", dup[0].denom)));
    }
    Ok(coins)
}

/// Price of one unit of gas, e.g. `0.15uluna`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasPrice {
    pub amount: f64,
    pub denom: String,
}

impl fmt::Display for GasPrice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for GasPrice {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| DeployError::Msg(format!("Gas price '{}' has no denom", s)))?;
        let (amount, denom) = s.split_at(split);
        validate_denom(denom)?;
        let amount = amount
            .parse::<f64>()
            .map_err(|e| DeployError::Msg(format!("Invalid gas price '{}': {}", s, e)))?;
        Ok(GasPrice {
            amount,
            denom: denom.to_string(),
        })
    }
}

/// Applies the gas adjustment to a simulated gas amount.
///
/// Without an explicit adjustment, [`GAS_BUFFER`] is used above [`BUFFER_THRESHOLD`]
/// and [`SMALL_GAS_BUFFER`] below it.
pub fn gas_limit_from_simulation(simulated: u64, adjustment: Option<f64>) -> u64 {
    let factor = adjustment.unwrap_or(if simulated > BUFFER_THRESHOLD {
        GAS_BUFFER
    } else {
        SMALL_GAS_BUFFER
    });
    (simulated as f64 * factor).ceil() as u64
}

/// Gas limit together with the fee paid for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeSpec {
    pub gas_limit: u64,
    pub amount: Coin,
}

impl FeeSpec {
    pub fn from_gas(gas_limit: u64, price: &GasPrice) -> Self {
        let amount = (gas_limit as f64 * price.amount).ceil() as u128;
        FeeSpec {
            gas_limit,
            amount: Coin::new(amount, price.denom.clone()),
        }
    }
}
