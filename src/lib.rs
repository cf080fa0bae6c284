use std::fs;

use anyhow::{bail, Context, Error};
use log::info;
use time::PrimitiveDateTime;

pub mod args;
mod cells;
pub mod config;
pub mod rates;
pub mod report;
pub mod sru;
pub mod trades;

use config::Config;
use rates::ExchangeRates;
use report::{compute_totals, convert_trades, write_detail_as_csv, Totals};
use trades::{get_trades, Trade};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub trade_count: usize,
    pub page_count: usize,
    pub totals: Totals,
}

/// Reads the trades workbook and the rate table named in `config`, then
/// writes the submission.
pub fn run(config: &Config, generated_at: PrimitiveDateTime) -> Result<Summary> {
    let trades = get_trades(
        &config.trades,
        config.sheet.as_deref(),
        config.layout,
        &config.excluded_order_types,
    )?;
    let rates = ExchangeRates::load(config.rate_mode, &config.rate_table, config.year)?;
    generate(config, trades, &rates, generated_at)
}

/// Converts `trades` with `rates` and writes the SRU files. Every rate,
/// conversion and total is computed before anything is written.
pub fn generate(
    config: &Config,
    trades: Vec<Trade>,
    rates: &ExchangeRates,
    generated_at: PrimitiveDateTime,
) -> Result<Summary> {
    if rates.mode() != config.rate_mode {
        bail!(
            "exchange rates are {:?} but the submission uses {:?} rates",
            rates.mode(),
            config.rate_mode
        );
    }
    let converted = convert_trades(trades, rates, config.year)?;
    let totals = compute_totals(&converted)?;

    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            config.output_dir.display()
        )
    })?;
    let page_count = sru::write_files(
        &config.output_dir,
        &config.identity,
        config.year,
        &converted,
        generated_at,
    )?;
    info!("wrote {} sells on {page_count} pages", converted.len());

    if let Some(path) = &config.detail_csv {
        write_detail_as_csv(&converted, path)?;
    }

    Ok(Summary {
        trade_count: converted.len(),
        page_count,
        totals,
    })
}
