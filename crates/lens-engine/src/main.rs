use clap::{value_parser, Arg, Command};
use lens_engine::{run_simulation, SimulatorConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Command::new("lens")
        .version(lens_engine::VERSION)
        .about("Analysis result cache and reconciliation engine")
        .subcommand_required(true)
        .subcommand(
            Command::new("simulate")
                .about("Drive the engine against a simulated analysis service")
                .arg(
                    Arg::new("runs")
                        .long("runs")
                        .default_value("12")
                        .value_parser(value_parser!(usize))
                        .help("Number of analysis runs to attempt"),
                )
                .arg(
                    Arg::new("datasets")
                        .long("datasets")
                        .default_value("3")
                        .value_parser(value_parser!(usize))
                        .help("Number of datasets cycled through"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("fail-rate")
                        .long("fail-rate")
                        .default_value("0.15")
                        .value_parser(value_parser!(f64))
                        .help("Probability a run fails at the transport"),
                )
                .arg(
                    Arg::new("capacity-kb")
                        .long("capacity-kb")
                        .default_value("64")
                        .value_parser(value_parser!(usize))
                        .help("Capacity of the bounded store in KiB"),
                )
                .arg(
                    Arg::new("models-per-run")
                        .long("models-per-run")
                        .default_value("3")
                        .value_parser(value_parser!(usize))
                        .help("Models trained per successful run"),
                ),
        );

    match cli.get_matches().subcommand() {
        Some(("simulate", matches)) => {
            let config = SimulatorConfig {
                seed: *matches.get_one::<u64>("seed").expect("has default"),
                datasets: *matches.get_one::<usize>("datasets").expect("has default"),
                runs: *matches.get_one::<usize>("runs").expect("has default"),
                fail_rate: *matches.get_one::<f64>("fail-rate").expect("has default"),
                capacity_bytes: matches
                    .get_one::<usize>("capacity-kb")
                    .expect("has default")
                    * 1024,
                models_per_run: *matches
                    .get_one::<usize>("models-per-run")
                    .expect("has default"),
            };

            let report = run_simulation(config).await;

            println!("runs attempted:   {}", report.runs);
            println!("succeeded:        {}", report.succeeded);
            println!("failed:           {}", report.failed);
            println!("store bytes used: {}", report.store_used_bytes);
            for (dataset, models) in &report.models_by_dataset {
                println!("  {dataset}: {models} models accumulated");
            }
            Ok(())
        }
        _ => unreachable!("subcommand is required"),
    }
}
