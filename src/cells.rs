use std::str::FromStr;

use anyhow::Error;
use calamine::Data;
use rust_decimal::{prelude::FromPrimitive, Decimal};
use time::{
    format_description::BorrowedFormatItem,
    macros::{date, format_description},
    Date, Duration,
};

use crate::Result;

static ISO_DATE_FMT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");
static XLSX_DATE_FMT: &[BorrowedFormatItem] = format_description!("[month]/[day]/[year]");

// Serial day 0 of the 1900 date system. Excel counts a phantom 1900-02-29, so
// dates are only right from serial 61 (1900-03-01) on.
const EXCEL_EPOCH: Date = date!(1899 - 12 - 30);

pub(crate) fn cell<'a>(row: &'a [Data], index: usize, field: &str) -> Result<&'a Data> {
    match row.get(index) {
        None | Some(Data::Empty) => Err(Error::msg(format!(
            "missing {} field (column {})",
            field,
            index + 1
        ))),
        Some(c) => Ok(c),
    }
}

pub(crate) fn as_decimal(cell: &Data) -> Option<Decimal> {
    match cell {
        Data::Int(i) => Some(Decimal::from(*i)),
        Data::Float(f) => Decimal::from_f64(*f),
        Data::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

pub(crate) fn as_whole_number(cell: &Data) -> Option<i64> {
    match cell {
        Data::Int(i) => Some(*i),
        Data::Float(f) if f.fract() == 0. && f.is_finite() => Some(*f as i64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn as_text(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) => Some(s.trim().to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(f.to_string()),
        _ => None,
    }
}

pub(crate) fn as_date(cell: &Data) -> Option<Date> {
    match cell {
        Data::DateTime(dt) => from_excel_serial(dt.as_f64()),
        Data::Float(f) => from_excel_serial(*f),
        Data::Int(i) => from_excel_serial(*i as f64),
        Data::DateTimeIso(s) | Data::String(s) => parse_date(s),
        _ => None,
    }
}

pub(crate) fn parse_date(s: &str) -> Option<Date> {
    let s = s.trim();
    let day = s.split(['T', ' ']).next().unwrap_or(s);
    Date::parse(day, ISO_DATE_FMT)
        .or_else(|_| Date::parse(day, XLSX_DATE_FMT))
        .ok()
}

fn from_excel_serial(serial: f64) -> Option<Date> {
    if !serial.is_finite() || serial < 1. {
        return None;
    }
    EXCEL_EPOCH.checked_add(Duration::days(serial.trunc() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn decimals_from_numbers_and_strings() {
        assert_eq!(as_decimal(&Data::Int(12)), Some(dec!(12)));
        assert_eq!(as_decimal(&Data::Float(123.456)), Some(dec!(123.456)));
        assert_eq!(as_decimal(&Data::String(" -4.5 ".into())), Some(dec!(-4.5)));
        assert_eq!(as_decimal(&Data::String("abc".into())), None);
        assert_eq!(as_decimal(&Data::Bool(true)), None);
    }

    #[test]
    fn whole_numbers_reject_fractions() {
        assert_eq!(as_whole_number(&Data::Float(10.)), Some(10));
        assert_eq!(as_whole_number(&Data::Float(10.5)), None);
        assert_eq!(as_whole_number(&Data::String("2022".into())), Some(2022));
    }

    #[test]
    fn dates_in_every_accepted_shape() {
        let expected = date!(2022 - 03 - 14);
        assert_eq!(as_date(&Data::String("2022-03-14".into())), Some(expected));
        assert_eq!(as_date(&Data::String("03/14/2022".into())), Some(expected));
        assert_eq!(
            as_date(&Data::DateTimeIso("2022-03-14T10:30:00".into())),
            Some(expected)
        );
        // 44634 is 2022-03-14 in the 1900 date system
        assert_eq!(as_date(&Data::Float(44634.25)), Some(expected));
        assert_eq!(as_date(&Data::String("14th of March".into())), None);
    }

    #[test]
    fn serial_dates_hold_from_march_1900() {
        assert_eq!(as_date(&Data::Int(61)), Some(date!(1900 - 03 - 01)));
        assert_eq!(as_date(&Data::Int(44621)), Some(date!(2022 - 03 - 01)));
        assert_eq!(as_date(&Data::Float(0.5)), None);
    }

    #[test]
    fn empty_cells_are_missing() {
        let row = vec![Data::String("Sell".into()), Data::Empty];
        assert!(cell(&row, 0, "type").is_ok());
        let err = cell(&row, 1, "security").unwrap_err();
        assert_eq!(err.to_string(), "missing security field (column 2)");
        assert!(cell(&row, 5, "quantity").is_err());
    }
}
