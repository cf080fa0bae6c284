use std::path::PathBuf;

use crate::trades::Layout;

pub const DEFAULT_EXCLUDED_ORDER_TYPE: &str = "RS STC";

/// Who the submission is for. Every field is written verbatim into the SRU files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub org_number: String,
    pub name: String,
    pub address: String,
    pub postal_code: String,
    pub city: String,
    pub email: String,
}

/// Which exchange rate convention the whole submission uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateMode {
    Yearly,
    Daily,
}

impl RateMode {
    pub fn default_table(self) -> PathBuf {
        match self {
            RateMode::Yearly => PathBuf::from("yearly_rates.xlsx"),
            RateMode::Daily => PathBuf::from("daily_rates.xlsx"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub identity: Identity,
    pub year: i32,
    pub rate_mode: RateMode,
    pub rate_table: PathBuf,
    pub trades: PathBuf,
    pub sheet: Option<String>,
    pub layout: Layout,
    pub excluded_order_types: Vec<String>,
    pub output_dir: PathBuf,
    pub detail_csv: Option<PathBuf>,
}

