use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::{Config, Identity, RateMode, DEFAULT_EXCLUDED_ORDER_TYPE};
use crate::trades::Layout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RateArg {
    Year,
    Day,
}

impl From<RateArg> for RateMode {
    fn from(arg: RateArg) -> Self {
        match arg {
            RateArg::Year => RateMode::Yearly,
            RateArg::Day => RateMode::Daily,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LayoutArg {
    V1,
    V2,
}

impl From<LayoutArg> for Layout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::V1 => Layout::V1,
            LayoutArg::V2 => Layout::V2,
        }
    }
}

/// Generate K4 SRU files from a broker trade export.
#[derive(Parser, Debug)]
#[command(name = "k4", version)]
pub struct Opts {
    /// org eller personnummer
    #[arg(long)]
    pub org_nummer: String,
    /// för och efternamn
    #[arg(long)]
    pub fullt_namn: String,
    #[arg(long)]
    pub adress: String,
    #[arg(long)]
    pub postnummer: String,
    #[arg(long)]
    pub postort: String,
    #[arg(long)]
    pub epost: String,
    /// vilket räkenskapsår
    #[arg(long)]
    pub year: i32,
    /// Exchange rate convention, see https://www.riksbank.se/sv/statistik/rantor-och-valutakurser/valutakurser-till-deklarationen/
    #[arg(long, value_enum)]
    pub rate: RateArg,
    /// Trades workbook (xlsx)
    #[arg(long)]
    pub trades: PathBuf,
    /// Rate table (xlsx or csv), defaults to yearly_rates.xlsx or daily_rates.xlsx
    #[arg(long)]
    pub rate_table: Option<PathBuf>,
    /// Sheet of the trades workbook, defaults to the first one
    #[arg(long)]
    pub sheet: Option<String>,
    /// Column layout of the trades workbook
    #[arg(long, value_enum, default_value_t = LayoutArg::V2)]
    pub layout: LayoutArg,
    /// Order type whose sells are left out, may be repeated
    #[arg(long = "exclude-order-type", default_value = DEFAULT_EXCLUDED_ORDER_TYPE)]
    pub excluded_order_types: Vec<String>,
    /// Directory for INFO.SRU and BLANKETTER.SRU
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
    /// Also write per-trade detail as CSV
    #[arg(long)]
    pub detail_csv: Option<PathBuf>,

    #[arg(short, long)]
    pub quiet: bool,
    /// Verbose mode (-v, -vv, -vvv, etc)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Opts {
    pub fn into_config(self) -> Config {
        let rate_mode = RateMode::from(self.rate);
        let rate_table = self
            .rate_table
            .unwrap_or_else(|| rate_mode.default_table());
        Config {
            identity: Identity {
                org_number: self.org_nummer,
                name: self.fullt_namn,
                address: self.adress,
                postal_code: self.postnummer,
                city: self.postort,
                email: self.epost,
            },
            year: self.year,
            rate_mode,
            rate_table,
            trades: self.trades,
            sheet: self.sheet,
            layout: self.layout.into(),
            excluded_order_types: self.excluded_order_types,
            output_dir: self.output_dir,
            detail_csv: self.detail_csv,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const REQUIRED: &[&str] = &[
        "k4",
        "--org-nummer",
        "191212121212",
        "--fullt-namn",
        "Tolvan Tolvansson",
        "--adress",
        "Skatteverksgatan 1",
        "--postnummer",
        "17194",
        "--postort",
        "Solna",
        "--epost",
        "tolvan@example.se",
        "--year",
        "2022",
        "--trades",
        "trades.xlsx",
    ];

    fn parse(extra: &[&str]) -> Config {
        let argv = REQUIRED.iter().chain(extra).copied();
        Opts::try_parse_from(argv).unwrap().into_config()
    }

    #[test]
    fn defaults_follow_rate_mode() {
        let config = parse(&["--rate", "year"]);
        assert_eq!(config.rate_mode, RateMode::Yearly);
        assert_eq!(config.rate_table, Path::new("yearly_rates.xlsx"));
        assert_eq!(config.layout, Layout::V2);
        assert_eq!(config.excluded_order_types, vec!["RS STC".to_string()]);
        assert_eq!(config.output_dir, Path::new("."));
        assert_eq!(config.identity.org_number, "191212121212");

        let config = parse(&["--rate", "day", "--rate-table", "kurser.csv"]);
        assert_eq!(config.rate_mode, RateMode::Daily);
        assert_eq!(config.rate_table, Path::new("kurser.csv"));
    }

    #[test]
    fn exclusions_and_layout_can_be_overridden() {
        let config = parse(&[
            "--rate",
            "year",
            "--layout",
            "v1",
            "--exclude-order-type",
            "ESPP",
            "--exclude-order-type",
            "RS STC",
        ]);
        assert_eq!(config.layout, Layout::V1);
        assert_eq!(config.excluded_order_types, vec!["ESPP", "RS STC"]);
    }

    #[test]
    fn rate_mode_is_required() {
        assert!(Opts::try_parse_from(REQUIRED.iter().copied()).is_err());
        assert!(Opts::try_parse_from(REQUIRED.iter().chain(&["--rate", "week"]).copied()).is_err());
    }
}
