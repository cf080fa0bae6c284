use std::path::Path;

use anyhow::{Context, Error};
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use log::{debug, info};
use rust_decimal::Decimal;
use time::Date;

use crate::{cells, Result};

pub const SELL: &str = "Sell";

/// Column layout of the broker export.
///
/// `V1` is the older export without order type and trade date columns; it can
/// only be used with yearly exchange rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    V1,
    #[default]
    V2,
}

/// Zero-based column positions of the fields read from a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Columns {
    pub kind: usize,
    pub security: usize,
    pub order_type: Option<usize>,
    pub quantity: usize,
    pub trade_date: Option<usize>,
    pub cost_basis: usize,
    pub sale_price: usize,
    pub gain_loss: usize,
}

impl Layout {
    pub const fn columns(self) -> Columns {
        match self {
            Layout::V1 => Columns {
                kind: 0,
                security: 1,
                order_type: None,
                quantity: 3,
                trade_date: None,
                cost_basis: 10,
                sale_price: 13,
                gain_loss: 18,
            },
            Layout::V2 => Columns {
                kind: 0,
                security: 1,
                order_type: Some(2),
                quantity: 4,
                trade_date: Some(5),
                cost_basis: 11,
                sale_price: 14,
                gain_loss: 19,
            },
        }
    }
}

/// A sell as found in the export, amounts in the traded currency.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub quantity: i64,
    pub security: String,
    pub sale_price: Decimal,
    pub cost_basis: Decimal,
    pub net_gain_loss: Decimal,
    pub order_type: Option<String>,
    pub trade_date: Option<Date>,
}

impl Trade {
    pub fn gain(&self) -> Decimal {
        gain(self.net_gain_loss)
    }

    pub fn loss(&self) -> Decimal {
        loss(self.net_gain_loss)
    }
}

pub fn gain(net: Decimal) -> Decimal {
    if net > Decimal::ZERO {
        net
    } else {
        Decimal::ZERO
    }
}

pub fn loss(net: Decimal) -> Decimal {
    if net < Decimal::ZERO {
        -net
    } else {
        Decimal::ZERO
    }
}

pub fn get_trades<P: AsRef<Path>>(
    file_path: P,
    sheet: Option<&str>,
    layout: Layout,
    excluded_order_types: &[String],
) -> Result<Vec<Trade>> {
    let file_path = file_path.as_ref();
    let mut workbook: Xlsx<_> = open_workbook(file_path)
        .with_context(|| format!("failed to open trades workbook {}", file_path.display()))?;
    let range = match sheet {
        Some(name) => workbook
            .worksheet_range(name)
            .with_context(|| format!("failed to read sheet {name}"))?,
        None => workbook
            .worksheet_range_at(0)
            .context("trades workbook has no sheets")??,
    };
    trades_from_range(&range, layout, excluded_order_types)
}

pub fn trades_from_range(
    range: &Range<Data>,
    layout: Layout,
    excluded_order_types: &[String],
) -> Result<Vec<Trade>> {
    let columns = layout.columns();
    let first_row = range.start().map(|(r, _)| r as usize).unwrap_or_default();
    let mut trades = Vec::new();

    for (idx, r) in range.rows().enumerate() {
        let row_number = first_row + idx + 1;
        if !is_sell(r, columns.kind) {
            continue;
        }
        let order_type = read_order_type(r, &columns)
            .with_context(|| format!("failed to parse sell on row {row_number}"))?;
        if let Some(order_type) = &order_type {
            if excluded_order_types.iter().any(|t| t == order_type) {
                debug!("skipping {order_type} sell on row {row_number}");
                continue;
            }
        }
        let trade = read_trade(r, &columns, order_type)
            .with_context(|| format!("failed to parse sell on row {row_number}"))?;
        trades.push(trade);
    }
    info!("read {} sells", trades.len());
    Ok(trades)
}

fn is_sell(row: &[Data], kind: usize) -> bool {
    matches!(row.get(kind), Some(Data::String(s)) if s.trim() == SELL)
}

fn read_order_type(row: &[Data], columns: &Columns) -> Result<Option<String>> {
    let Some(index) = columns.order_type else {
        return Ok(None);
    };
    match row.get(index) {
        None | Some(Data::Empty) => Ok(None),
        Some(c) => Ok(Some(
            cells::as_text(c).context("wrong order type field type")?,
        )),
    }
}

fn read_trade(row: &[Data], columns: &Columns, order_type: Option<String>) -> Result<Trade> {
    let quantity = cells::as_whole_number(cells::cell(row, columns.quantity, "quantity")?)
        .context("wrong quantity field type")?;
    let security = cells::as_text(cells::cell(row, columns.security, "security")?)
        .context("wrong security field type")?;
    if security.is_empty() {
        return Err(Error::msg("empty security field"));
    }
    let sale_price = cells::as_decimal(cells::cell(row, columns.sale_price, "sale price")?)
        .context("wrong sale price field type")?;
    let cost_basis = cells::as_decimal(cells::cell(row, columns.cost_basis, "cost basis")?)
        .context("wrong cost basis field type")?;
    let net_gain_loss = cells::as_decimal(cells::cell(row, columns.gain_loss, "gain/loss")?)
        .context("wrong gain/loss field type")?;
    let trade_date = match columns.trade_date {
        Some(index) => Some(
            cells::as_date(cells::cell(row, index, "trade date")?)
                .context("unparseable trade date")?,
        ),
        None => None,
    };

    Ok(Trade {
        quantity,
        security,
        sale_price,
        cost_basis,
        net_gain_loss,
        order_type,
        trade_date,
    })
}
