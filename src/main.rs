use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use log::{debug, LevelFilter};
use postcode_centroids::config::{Config, ProvinceSelection, DEFAULT_THREADS};
use postcode_centroids::{logging, process_files};
use std::path::PathBuf;

fn main() -> Result<()> {
    let matches = Command::new("dcac-postcodes")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Computes a representative point per postal code from CartoCiudad street numbers")
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .env("DCAC_LOG")
                .default_value("info")
                .value_parser(["error", "warn", "info", "debug", "trace"])
                .ignore_case(true)
                .help("Logging level"),
        )
        .arg(
            Arg::new("province")
                .short('p')
                .long("province")
                .env("DCAC_PROVINCE")
                .default_value("all")
                .value_parser(|s: &str| s.parse::<ProvinceSelection>())
                .help("Province to process: alicante, castellon, valencia or all"),
        )
        .arg(
            Arg::new("force")
                .short('f')
                .long("force")
                .env("DCAC_FORCE")
                .action(ArgAction::SetTrue)
                .help("Re-acquire datasets even if they already exist"),
        )
        .arg(
            Arg::new("working-dir")
                .short('w')
                .long("working-dir")
                .env("DCAC_WORKING_DIR")
                .default_value(".")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Directory holding the data/ tree"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .env("DCAC_THREADS")
                .default_value("3")
                .value_parser(clap::value_parser!(usize))
                .help("Number of worker threads, capped by available cores"),
        )
        .get_matches();

    let config = Config {
        working_dir: matches
            .get_one::<PathBuf>("working-dir")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(".")),
        province: matches
            .get_one::<ProvinceSelection>("province")
            .copied()
            .unwrap_or_default(),
        force: matches.get_flag("force"),
        threads: matches
            .get_one::<usize>("threads")
            .copied()
            .unwrap_or(DEFAULT_THREADS),
    };

    let level = matches
        .get_one::<String>("log-level")
        .and_then(|l| l.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);
    logging::init(level, &config.log_path());
    debug!("Configuration: {:?}", config);

    let summary = process_files(config)?;
    println!(
        "Processing completed: {} postcodes written to {}",
        summary.postcodes,
        summary.output.display()
    );
    Ok(())
}
