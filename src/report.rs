use std::path::Path;

use anyhow::Context;
use log::{debug, warn};
use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use time::{format_description::BorrowedFormatItem, macros::format_description};

use crate::{rates::ExchangeRates, trades::Trade, Result};

static DETAIL_DATE_FMT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

/// A sell with its amounts converted to SEK.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedTrade {
    pub trade: Trade,
    pub rate: Decimal,
    pub proceeds: Decimal,
    pub cost_basis: Decimal,
    pub gain: Decimal,
    pub loss: Decimal,
    pub whole: WholeKronor,
}

/// The SEK amounts as they appear on the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WholeKronor {
    pub proceeds: i64,
    pub cost_basis: i64,
    pub gain: i64,
    pub loss: i64,
}

impl ConvertedTrade {
    pub fn new(trade: Trade, rate: Decimal) -> Result<Self> {
        let convert = |amount: Decimal, field: &str| {
            amount.checked_mul(rate).with_context(|| {
                format!("{field} of {} overflows at rate {rate}", trade.security)
            })
        };
        let proceeds = convert(trade.sale_price, "sale price")?;
        let cost_basis = convert(trade.cost_basis, "cost basis")?;
        let gain = convert(trade.gain(), "gain")?;
        let loss = convert(trade.loss(), "loss")?;
        let whole = WholeKronor {
            proceeds: round_sek(proceeds)?,
            cost_basis: round_sek(cost_basis)?,
            gain: round_sek(gain)?,
            loss: round_sek(loss)?,
        };
        Ok(Self {
            trade,
            rate,
            proceeds,
            cost_basis,
            gain,
            loss,
            whole,
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Totals {
    pub gain: Decimal,
    pub loss: Decimal,
}

impl Totals {
    pub fn net(&self) -> Decimal {
        self.gain - self.loss
    }
}

/// Resolves a rate for every trade and converts it. Fails on the first trade
/// without a rate or with an amount that does not fit.
pub fn convert_trades(
    trades: Vec<Trade>,
    rates: &ExchangeRates,
    year: i32,
) -> Result<Vec<ConvertedTrade>> {
    trades
        .into_iter()
        .map(|t| -> Result<ConvertedTrade> {
            if let Some(date) = t.trade_date {
                if date.year() != year {
                    warn!("sell of {} on {date} is outside tax year {year}", t.security);
                }
            }
            let rate = rates
                .rate_for(&t)
                .with_context(|| format!("failed to find exchange rate for {}", t.security))?;
            debug!("{} x {} at rate {rate}", t.quantity, t.security);
            ConvertedTrade::new(t, rate)
        })
        .collect()
}

pub fn compute_totals(trades: &[ConvertedTrade]) -> Result<Totals> {
    trades.iter().try_fold(Totals::default(), |acc, t| {
        Ok(Totals {
            gain: acc.gain.checked_add(t.gain).context("total gain overflows")?,
            loss: acc.loss.checked_add(t.loss).context("total loss overflows")?,
        })
    })
}

/// Rounds a SEK amount to whole kronor, ties to even.
pub fn round_sek(value: Decimal) -> Result<i64> {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
        .to_i64()
        .with_context(|| format!("amount {value} does not fit a whole number of kronor"))
}

/// Two decimals with a comma as decimal separator.
pub fn swedish_decimal(value: Decimal) -> String {
    let value = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.2}", value).replace('.', ",")
}

pub fn print_summary(totals: &Totals) {
    println!("Vinst (SEK): {}", swedish_decimal(totals.gain));
    println!("Förlust (SEK): {}", swedish_decimal(totals.loss));
    println!("Resultat (SEK): {}", swedish_decimal(totals.net()));
}

pub fn write_detail_as_csv<P: AsRef<Path>>(trades: &[ConvertedTrade], file_path: P) -> Result<()> {
    let mut wtr = csv::Writer::from_path(&file_path)?;
    wtr.write_record([
        "Date",
        "Security",
        "Quantity",
        "Rate",
        "Proceeds (SEK)",
        "Cost basis (SEK)",
        "Gain (SEK)",
        "Loss (SEK)",
    ])?;
    for t in trades {
        let date = match t.trade.trade_date {
            Some(d) => d.format(DETAIL_DATE_FMT)?,
            None => String::new(),
        };
        wtr.write_record(&[
            date,
            t.trade.security.clone(),
            t.trade.quantity.to_string(),
            t.rate.to_string(),
            t.proceeds.round_dp(2).to_string(),
            t.cost_basis.round_dp(2).to_string(),
            t.gain.round_dp(2).to_string(),
            t.loss.round_dp(2).to_string(),
        ])?;
    }
    wtr.flush()?;
    println!(
        "The transaction detail was written as CSV to file {}",
        file_path.as_ref().to_string_lossy()
    );
    Ok(())
}
