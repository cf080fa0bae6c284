use std::{fs, io::Write, path::Path};

use anyhow::{bail, Context};
use time::{format_description::BorrowedFormatItem, macros::format_description, PrimitiveDateTime};

use crate::{
    config::Identity,
    report::ConvertedTrade,
    Result,
};

// https://www.skatteverket.se/foretag/etjansterochblanketter/blanketterbroschyrer/broschyrer/info/269.4.39f16f103821c58f680007305.html

pub const SALES_PER_PAGE: usize = 7;
pub const INFO_FILE: &str = "INFO.SRU";
pub const BLANKETTER_FILE: &str = "BLANKETTER.SRU";

// Field codes are 3<row><n>, rows numbered from 31 on every page.
const FIRST_FIELD_ROW: usize = 31;

static IDENTITET_FMT: &[BorrowedFormatItem] =
    format_description!("[year][month][day] [hour][minute][second]");

pub fn pages<T>(items: &[T]) -> std::slice::Chunks<'_, T> {
    items.chunks(SALES_PER_PAGE)
}

pub fn write_info<W: Write>(out: &mut W, identity: &Identity) -> Result<()> {
    writeln!(out, "#DATABESKRIVNING_START")?;
    writeln!(out, "#PRODUKT SRU")?;
    writeln!(out, "#FILNAMN {BLANKETTER_FILE}")?;
    writeln!(out, "#DATABESKRIVNING_SLUT")?;
    writeln!(out, "#MEDIELEV_START")?;
    writeln!(out, "#ORGNR {}", identity.org_number)?;
    writeln!(out, "#NAMN {}", identity.name)?;
    writeln!(out, "#ADRESS {}", identity.address)?;
    writeln!(out, "#POSTNR {}", identity.postal_code)?;
    writeln!(out, "#POSTORT {}", identity.city)?;
    writeln!(out, "#EMAIL {}", identity.email)?;
    writeln!(out, "#MEDIELEV_SLUT")?;
    Ok(())
}

/// Writes one K4 form per page of trades and returns the page count.
pub fn write_blanketter<W: Write>(
    out: &mut W,
    identity: &Identity,
    year: i32,
    trades: &[ConvertedTrade],
    generated_at: PrimitiveDateTime,
) -> Result<usize> {
    let timestamp = generated_at.format(IDENTITET_FMT)?;
    let mut page_count = 0;
    for (idx, page) in pages(trades).enumerate() {
        write_page(out, identity, year, &timestamp, idx + 1, page)?;
        page_count += 1;
    }
    writeln!(out, "#FIL_SLUT")?;
    Ok(page_count)
}

fn write_page<W: Write>(
    out: &mut W,
    identity: &Identity,
    year: i32,
    timestamp: &str,
    page_number: usize,
    page: &[ConvertedTrade],
) -> Result<()> {
    if page.len() > SALES_PER_PAGE {
        bail!("can only have {SALES_PER_PAGE} sales per page");
    }
    writeln!(out, "#BLANKETT K4-{year}P4")?;
    writeln!(out, "#IDENTITET {} {timestamp}", identity.org_number)?;
    writeln!(out, "#NAMN {}", identity.name)?;
    let mut counter = FIRST_FIELD_ROW;
    for t in page {
        let field = |n: u8| format!("#UPPGIFT 3{counter}{n}");
        writeln!(out, "{} {}", field(0), t.trade.quantity)?;
        writeln!(out, "{} {}", field(1), t.trade.security)?;
        writeln!(out, "{} {}", field(2), t.whole.proceeds)?;
        writeln!(out, "{} {}", field(3), t.whole.cost_basis)?;
        writeln!(out, "{} {}", field(4), t.whole.gain)?;
        writeln!(out, "{} {}", field(5), t.whole.loss)?;
        counter += 1;
    }
    writeln!(out, "#UPPGIFT 7014 {page_number}")?;
    writeln!(out, "#BLANKETTSLUT")?;
    Ok(())
}

/// Writes `INFO.SRU` and `BLANKETTER.SRU` into `dir`. Returns the page count.
/// Both files are rendered before either is created.
pub fn write_files<P: AsRef<Path>>(
    dir: P,
    identity: &Identity,
    year: i32,
    trades: &[ConvertedTrade],
    generated_at: PrimitiveDateTime,
) -> Result<usize> {
    let mut info = Vec::new();
    write_info(&mut info, identity)?;
    let mut body = Vec::new();
    let page_count = write_blanketter(&mut body, identity, year, trades, generated_at)?;

    let dir = dir.as_ref();
    for (name, content) in [(INFO_FILE, info), (BLANKETTER_FILE, body)] {
        let path = dir.join(name);
        fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(page_count)
}
