//! ramptune: find the highest request rate a target can sustain.
//!
//! Polls a load generator's stats API and keeps raising its send rate
//! while the target stat keeps up with the compare stat.
//!
//! # Usage
//!
//! ```text
//! ramptune --tune-stat-name OfferReceived --tune-stat-compare-name DiscoverSent
//! ramptune --config ramptune.toml --format json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ramptune_controller::{Driver, DriverError, RunOutcome};
use ramptune_core::{ConfigError, RampPolicy, TunerConfig, TunerFile, UpdateMode};
use ramptune_target::HttpTarget;
use tokio::sync::watch;
use tracing::info;

mod report;

use report::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "ramptune",
    about = "Find the maximum sustainable request rate via a load generator API",
    version
)]
struct Cli {
    /// TOML config file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address of the load generator stats API.
    #[arg(short = 'a', long)]
    api_address: Option<String>,

    /// Port of the load generator stats API.
    #[arg(short = 'p', long)]
    api_port: Option<u16>,

    /// Stat used to decide whether to ramp up or down.
    #[arg(short = 't', long)]
    tune_stat_name: Option<String>,

    /// Stat the tune stat is compared against.
    #[arg(short = 'c', long)]
    tune_stat_compare_name: Option<String>,

    /// Minimum tune/compare ratio, as a percentage (e.g. 95).
    #[arg(long)]
    tune_compare_min_percentage: Option<f64>,

    /// Factor by which to ramp up the target rate.
    #[arg(long)]
    ramp_up_factor: Option<f64>,

    /// Factor by which to reduce the ramp-up factor on a miss.
    #[arg(long)]
    ramp_down_factor: Option<f64>,

    /// Seconds between stat polls. Should be slightly longer than the
    /// generator's own stats refresh.
    #[arg(short = 'r', long)]
    refresh_rate_seconds: Option<u64>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    request_timeout_seconds: Option<u64>,

    /// Ramp policy: decaying (converges) or fixed (runs until stopped).
    #[arg(long)]
    policy: Option<RampPolicy>,

    /// Rate update wire format: path (GET /update/rps/N) or json (PUT /update).
    #[arg(long)]
    update_mode: Option<UpdateMode>,

    /// Skip pushing the baseline rate before the first poll.
    #[arg(long)]
    no_prime: bool,

    /// Output format for the final result: text or json.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Layer the flags over the config file (if any) and resolve defaults.
    fn resolve(&self) -> Result<TunerConfig, ConfigError> {
        let mut file = match &self.config {
            Some(path) => TunerFile::from_file(path)?,
            None => TunerFile::default(),
        };

        if let Some(v) = &self.api_address {
            file.api_address = Some(v.clone());
        }
        if let Some(v) = self.api_port {
            file.api_port = Some(v);
        }
        if let Some(v) = &self.tune_stat_name {
            file.target_stat = Some(v.clone());
        }
        if let Some(v) = &self.tune_stat_compare_name {
            file.compare_stat = Some(v.clone());
        }
        if let Some(pct) = self.tune_compare_min_percentage {
            file.min_ratio_threshold = Some(pct / 100.0);
        }
        if let Some(v) = self.ramp_up_factor {
            file.ramp_up_factor = Some(v);
        }
        if let Some(v) = self.ramp_down_factor {
            file.ramp_down_factor = Some(v);
        }
        if let Some(secs) = self.refresh_rate_seconds {
            file.poll_interval = Some(format!("{secs}s"));
        }
        if let Some(secs) = self.request_timeout_seconds {
            file.request_timeout = Some(format!("{secs}s"));
        }
        if let Some(v) = self.policy {
            file.policy = Some(v);
        }
        if let Some(v) = self.update_mode {
            file.update_mode = Some(v);
        }
        if self.no_prime {
            file.prime = Some(false);
        }

        file.resolve()
    }
}

/// Exit status for a failed run.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<ConfigError>().is_some() {
        return 2;
    }
    match err.downcast_ref::<DriverError>() {
        Some(DriverError::Config(_)) => 2,
        _ => 1,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let directives = if cli.verbose {
        "info,ramptune=debug,ramptune_controller=debug,ramptune_target=debug"
    } else {
        "info"
    };
    // Logs go to stderr so `--format json` output stays parseable.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(directives)),
        )
        .init();

    match run(&cli).await {
        Ok(outcome) => match report::render(&outcome, cli.format) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Tuner broke down: {e}");
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprintln!("Tuner broke down: {e:#}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<RunOutcome> {
    let config = cli.resolve()?;
    let target = HttpTarget::from_config(&config);
    let mut driver = Driver::new(target, config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("stop requested, finishing current cycle");
            let _ = shutdown_tx.send(true);
        }
    });

    let outcome = driver.run(shutdown_rx).await?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("ramptune").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn flags_resolve_with_percentage_normalized() {
        let cli = parse(&[
            "-t",
            "OfferReceived",
            "-c",
            "DiscoverSent",
            "--tune-compare-min-percentage",
            "90",
            "--ramp-up-factor",
            "3",
            "-r",
            "2",
        ]);

        let config = cli.resolve().unwrap();
        assert_eq!(config.target_stat_name, "OfferReceived");
        assert_eq!(config.compare_stat_name, "DiscoverSent");
        assert!((config.min_ratio_threshold - 0.9).abs() < 1e-12);
        assert_eq!(config.ramp_up_factor, 3.0);
        assert_eq!(config.ramp_down_factor, 0.9);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.api_authority(), "localhost:8080");
    }

    #[test]
    fn missing_stat_names_is_config_error() {
        let cli = parse(&["-t", "OfferReceived"]);
        let err = cli.resolve().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn percentage_out_of_range_rejected() {
        let cli = parse(&["-t", "a", "-c", "b", "--tune-compare-min-percentage", "150"]);
        assert!(cli.resolve().is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            api_address = "192.168.1.10"
            target_stat = "AckReceived"
            compare_stat = "RequestSent"
            ramp_up_factor = 4.0
            policy = "fixed"
            "#
        )
        .unwrap();

        let path = file.path().to_str().unwrap();
        let cli = parse(&[
            "--config",
            path,
            "-t",
            "OfferReceived",
            "--update-mode",
            "json",
            "--no-prime",
        ]);

        let config = cli.resolve().unwrap();
        assert_eq!(config.api_address, "192.168.1.10");
        assert_eq!(config.target_stat_name, "OfferReceived");
        assert_eq!(config.compare_stat_name, "RequestSent");
        assert_eq!(config.ramp_up_factor, 4.0);
        assert_eq!(config.policy, RampPolicy::Fixed);
        assert_eq!(config.update_mode, UpdateMode::Json);
        assert!(!config.prime);
    }

    #[test]
    fn format_flag_accepts_json_and_rejects_typos() {
        let cli = parse(&["--format", "json"]);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(parse(&[]).format, OutputFormat::Text);

        assert!(Cli::try_parse_from(["ramptune", "--format", "xml"]).is_err());
    }

    #[test]
    fn rejects_unknown_policy() {
        let res = Cli::try_parse_from(["ramptune", "--policy", "linear"]);
        assert!(res.is_err());
    }

    #[test]
    fn exit_codes() {
        let config_err = anyhow::Error::from(ConfigError::Invalid("x".into()));
        assert_eq!(exit_code_for(&config_err), 2);

        let lookup = anyhow::Error::from(DriverError::Config(ramptune_core::LookupError(
            "OfferReceived".into(),
        )));
        assert_eq!(exit_code_for(&lookup), 2);

        let network = anyhow::Error::from(DriverError::Network(
            ramptune_core::TargetError::Connect {
                address: "localhost:8080".into(),
                reason: "refused".into(),
            },
        ));
        assert_eq!(exit_code_for(&network), 1);
    }
}
