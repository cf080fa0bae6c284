use std::{
    collections::{btree_map::Entry, BTreeMap},
    path::Path,
};

use anyhow::{bail, Context, Error};
use calamine::{open_workbook, Data, Reader, Xlsx};
use log::{debug, info};
use rust_decimal::Decimal;
use time::Date;

use crate::{cells, config::RateMode, trades::Trade, Result};

/// Furthest a daily rate may be from the trade date it is used for.
pub const DAILY_RATE_TOLERANCE_DAYS: i64 = 7;

/// SEK exchange rates for one submission.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeRates {
    /// The single rate of the tax year.
    Yearly { year: i32, rate: Decimal },
    Daily(BTreeMap<Date, Decimal>),
}

impl ExchangeRates {
    /// Loads the rate table for `mode`. Yearly tables are resolved against
    /// `year` right away so a missing year fails before any trade is read.
    pub fn load<P: AsRef<Path>>(mode: RateMode, file_path: P, year: i32) -> Result<Self> {
        let file_path = file_path.as_ref();
        let rows = read_table(file_path)
            .with_context(|| format!("failed to read rate table {}", file_path.display()))?;
        let rates = match mode {
            RateMode::Yearly => Self::from_yearly_table(&yearly_table(rows)?, year)?,
            RateMode::Daily => Self::Daily(daily_table(rows)?),
        };
        info!("loaded {:?} exchange rates from {}", mode, file_path.display());
        Ok(rates)
    }

    pub fn from_yearly_table(table: &BTreeMap<i32, Decimal>, year: i32) -> Result<Self> {
        let rate = table
            .get(&year)
            .copied()
            .with_context(|| format!("no yearly exchange rate for {year}"))?;
        Ok(Self::Yearly { year, rate })
    }

    pub fn mode(&self) -> RateMode {
        match self {
            Self::Yearly { .. } => RateMode::Yearly,
            Self::Daily(_) => RateMode::Daily,
        }
    }

    pub fn rate_for(&self, trade: &Trade) -> Result<Decimal> {
        match self {
            Self::Yearly { rate, .. } => Ok(*rate),
            Self::Daily(table) => {
                let date = trade.trade_date.with_context(|| {
                    format!(
                        "sell of {} has no trade date, daily rates need the v2 layout",
                        trade.security
                    )
                })?;
                nearest_rate(table, date)
            }
        }
    }
}

/// Rate of `date`, or of the closest table date within the tolerance.
/// Equidistant dates resolve to the earlier one.
pub fn nearest_rate(table: &BTreeMap<Date, Decimal>, date: Date) -> Result<Decimal> {
    let before = table.range(..=date).next_back();
    let after = table.range(date..).next();
    let (found, rate) = match (before, after) {
        (Some(b), Some(a)) => {
            if date - *b.0 <= *a.0 - date {
                b
            } else {
                a
            }
        }
        (Some(b), None) => b,
        (None, Some(a)) => a,
        (None, None) => bail!("daily exchange rate table is empty"),
    };
    let distance = (date - *found).whole_days().abs();
    if distance > DAILY_RATE_TOLERANCE_DAYS {
        bail!("no exchange rate within {DAILY_RATE_TOLERANCE_DAYS} days of {date}");
    }
    if distance > 0 {
        debug!("using rate of {found} for {date}");
    }
    Ok(*rate)
}

fn read_table(file_path: &Path) -> Result<Vec<Vec<Data>>> {
    let is_csv = file_path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(file_path)?;
        let mut rows = Vec::new();
        for record in rdr.records() {
            rows.push(
                record?
                    .iter()
                    .map(|field| Data::String(field.to_string()))
                    .collect(),
            );
        }
        return Ok(rows);
    }
    let mut workbook: Xlsx<_> = open_workbook(file_path)?;
    let range = workbook
        .worksheet_range_at(0)
        .context("rate workbook has no sheets")??;
    Ok(range.rows().map(<[Data]>::to_vec).collect())
}

/// Splits rows into (row number, key cell, rate), dropping a leading header
/// row and blank rows.
fn rate_rows(rows: Vec<Vec<Data>>) -> Result<Vec<(usize, Data, Decimal)>> {
    let mut out = Vec::new();
    for (idx, mut row) in rows.into_iter().enumerate() {
        if row.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        if row.len() < 2 {
            bail!("row {} of rate table needs a key and a rate", idx + 1);
        }
        let rate = match cells::as_decimal(&row[1]) {
            Some(rate) => rate,
            None if idx == 0 => continue,
            None => bail!("row {} of rate table has no numeric rate", idx + 1),
        };
        if rate <= Decimal::ZERO {
            bail!("row {} of rate table has a non-positive rate", idx + 1);
        }
        out.push((idx + 1, row.swap_remove(0), rate));
    }
    Ok(out)
}

fn yearly_table(rows: Vec<Vec<Data>>) -> Result<BTreeMap<i32, Decimal>> {
    let mut table = BTreeMap::new();
    for (row_number, key, rate) in rate_rows(rows)? {
        let year = cells::as_whole_number(&key)
            .and_then(|y| i32::try_from(y).ok())
            .with_context(|| format!("row {row_number} of rate table has no valid year"))?;
        insert_unique(&mut table, year, rate, row_number)?;
    }
    Ok(table)
}

fn daily_table(rows: Vec<Vec<Data>>) -> Result<BTreeMap<Date, Decimal>> {
    let mut table = BTreeMap::new();
    for (row_number, key, rate) in rate_rows(rows)? {
        let date = cells::as_date(&key)
            .with_context(|| format!("row {row_number} of rate table has no valid date"))?;
        insert_unique(&mut table, date, rate, row_number)?;
    }
    Ok(table)
}

fn insert_unique<K: Ord + std::fmt::Display>(
    table: &mut BTreeMap<K, Decimal>,
    key: K,
    rate: Decimal,
    row_number: usize,
) -> Result<()> {
    match table.entry(key) {
        Entry::Occupied(e) => Err(Error::msg(format!(
            "row {row_number} of rate table repeats {}",
            e.key()
        ))),
        Entry::Vacant(e) => {
            e.insert(rate);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use time::macros::date;

    fn daily(entries: &[(Date, Decimal)]) -> BTreeMap<Date, Decimal> {
        entries.iter().copied().collect()
    }

    fn trade_on(trade_date: Option<Date>) -> Trade {
        Trade {
            quantity: 1,
            security: "ACME".into(),
            sale_price: dec!(10),
            cost_basis: dec!(8),
            net_gain_loss: dec!(2),
            order_type: None,
            trade_date,
        }
    }

    #[test]
    fn yearly_rate_requires_exact_year() {
        let table = BTreeMap::from([(2021, dec!(8.58)), (2022, dec!(10.5))]);
        let rates = ExchangeRates::from_yearly_table(&table, 2022).unwrap();
        assert_eq!(rates.rate_for(&trade_on(None)).unwrap(), dec!(10.5));
        assert_eq!(rates.mode(), RateMode::Yearly);

        let err = ExchangeRates::from_yearly_table(&table, 2023).unwrap_err();
        assert_eq!(err.to_string(), "no yearly exchange rate for 2023");
    }

    #[test]
    fn exact_daily_match_wins() {
        let table = daily(&[
            (date!(2022 - 03 - 01), dec!(9.5)),
            (date!(2022 - 03 - 02), dec!(9.6)),
        ]);
        assert_eq!(nearest_rate(&table, date!(2022 - 03 - 02)).unwrap(), dec!(9.6));
    }

    #[test]
    fn nearest_daily_date_within_tolerance() {
        let table = daily(&[
            (date!(2022 - 03 - 01), dec!(9.5)),
            (date!(2022 - 03 - 10), dec!(9.9)),
        ]);
        assert_eq!(nearest_rate(&table, date!(2022 - 03 - 04)).unwrap(), dec!(9.5));
        assert_eq!(nearest_rate(&table, date!(2022 - 03 - 07)).unwrap(), dec!(9.9));
        // exactly seven days after the last entry is still accepted
        assert_eq!(nearest_rate(&table, date!(2022 - 03 - 17)).unwrap(), dec!(9.9));
        assert_eq!(nearest_rate(&table, date!(2022 - 02 - 22)).unwrap(), dec!(9.5));
    }

    #[test]
    fn equidistant_dates_pick_the_earlier() {
        let table = daily(&[
            (date!(2022 - 03 - 01), dec!(9.5)),
            (date!(2022 - 03 - 05), dec!(9.9)),
        ]);
        assert_eq!(nearest_rate(&table, date!(2022 - 03 - 03)).unwrap(), dec!(9.5));
    }

    #[test]
    fn eight_days_away_is_out_of_tolerance() {
        let table = daily(&[(date!(2022 - 03 - 01), dec!(9.5))]);
        let err = nearest_rate(&table, date!(2022 - 03 - 09)).unwrap_err();
        assert_eq!(err.to_string(), "no exchange rate within 7 days of 2022-03-09");
        assert!(nearest_rate(&table, date!(2022 - 02 - 21)).is_err());
        assert!(nearest_rate(&BTreeMap::new(), date!(2022 - 02 - 21)).is_err());
    }

    #[test]
    fn daily_mode_needs_trade_dates() {
        let rates = ExchangeRates::Daily(daily(&[(date!(2022 - 03 - 01), dec!(9.5))]));
        assert_eq!(
            rates.rate_for(&trade_on(Some(date!(2022 - 03 - 02)))).unwrap(),
            dec!(9.5)
        );
        assert!(rates.rate_for(&trade_on(None)).is_err());
    }

    #[test]
    fn csv_tables_skip_header_and_reject_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yearly.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "year,rate\n2021,8.58\n2022,10.5").unwrap();
        drop(file);
        let rates = ExchangeRates::load(RateMode::Yearly, &path, 2021).unwrap();
        assert_eq!(
            rates,
            ExchangeRates::Yearly {
                year: 2021,
                rate: dec!(8.58)
            }
        );

        let path = dir.path().join("daily.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "2022-03-01,9.5\n2022-03-01,9.6").unwrap();
        drop(file);
        let err = ExchangeRates::load(RateMode::Daily, &path, 2022).unwrap_err();
        assert_eq!(
            err.root_cause().to_string(),
            "row 2 of rate table repeats 2022-03-01"
        );
    }

    #[test]
    fn non_numeric_rate_after_header_fails() {
        let rows = vec![
            vec![Data::String("date".into()), Data::String("rate".into())],
            vec![Data::String("2022-03-01".into()), Data::String("n/a".into())],
        ];
        let err = daily_table(rows).unwrap_err();
        assert_eq!(err.to_string(), "row 2 of rate table has no numeric rate");
    }
}
