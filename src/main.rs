use clap::Parser;
use time::{OffsetDateTime, PrimitiveDateTime};

use k4_sru::{
    args::Opts,
    report::print_summary,
    run,
    sru::{BLANKETTER_FILE, INFO_FILE},
    Result,
};

fn main() -> Result<()> {
    let opts = Opts::parse();

    stderrlog::new()
        .module(module_path!())
        .module("k4_sru")
        .quiet(opts.quiet)
        .verbosity(opts.verbose as usize + 1) // The user needs warnings
        .init()?;

    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let generated_at = PrimitiveDateTime::new(now.date(), now.time());

    let config = opts.into_config();
    let summary = run(&config, generated_at)?;

    println!(
        "Wrote {} and {} ({} pages, {} sells)",
        config.output_dir.join(INFO_FILE).display(),
        config.output_dir.join(BLANKETTER_FILE).display(),
        summary.page_count,
        summary.trade_count
    );
    print_summary(&summary.totals);

    Ok(())
}
