//! DAB compliance CLI.
//!
//! Entry point for the `dab-compliance` command-line tool. Suites run over
//! the in-process mock device with `--mock`; wiring a real broker adapter
//! into the [`dab_compliance::Transport`] boundary is an integration
//! concern outside this binary.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use dab_compliance::mock::{MockBroker, MockDevice, MockDeviceConfig};
use dab_compliance::{
    suite, CapabilityStore, DabClient, PreflightConfig, RuntimeConfig, Transport,
};
use dab_gate::RequirementSet;
use dab_protocol::Operation;

#[derive(Parser)]
#[command(name = "dab-compliance")]
#[command(about = "Conformance-test client for the Device Automation Bus", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a capability requirement spec without evaluating it
    Explain {
        /// The requirement spec, e.g. "ops: a,b | keys: KEY_HOME"
        spec: String,

        /// Output in human-readable format instead of JSON
        #[arg(long)]
        human: bool,
    },

    /// Broadcast a discovery probe and list the devices that answer
    Discover {
        /// Number of broadcast attempts
        #[arg(long, default_value_t = 2)]
        attempts: u32,

        /// Settling time after each attempt, in milliseconds
        #[arg(long, default_value_t = 1000)]
        wait_ms: u64,

        /// Run against the in-process mock device
        #[arg(long)]
        mock: bool,
    },

    /// List the registered suites and their cases
    List {
        /// Path to runtime config file
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Run a suite against a device and write the report
    Run {
        /// Target device id
        #[arg(long, short = 'd', default_value = "mock-device")]
        device: String,

        /// Suite name (see `list`)
        #[arg(long, short = 's', default_value = "conformance")]
        suite: String,

        /// Report output path
        #[arg(long, short = 'o', default_value = "test_result/report.json")]
        output: PathBuf,

        /// Path to runtime config file
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Run against the in-process mock device
        #[arg(long)]
        mock: bool,
    },

    /// Collect a chunked log artifact and write it to a file
    CollectLogs {
        /// Target device id
        #[arg(long, short = 'd', default_value = "mock-device")]
        device: String,

        /// Artifact output path
        #[arg(long, short = 'o', default_value = "test_result/logs.bin")]
        output: PathBuf,

        /// Run against the in-process mock device
        #[arg(long)]
        mock: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Explain { spec, human } => explain(&spec, human),
        Commands::Discover {
            attempts,
            wait_ms,
            mock,
        } => discover(attempts, wait_ms, mock),
        Commands::List { config } => list(config),
        Commands::Run {
            device,
            suite,
            output,
            config,
            mock,
        } => run(&device, &suite, &output, config, mock),
        Commands::CollectLogs {
            device,
            output,
            mock,
        } => collect_logs(&device, &output, mock),
    };
    process::exit(code);
}

/// Build the transport: the mock broker with a default device attached.
///
/// The device handle is returned alongside so it stays configured for the
/// life of the command.
fn mock_transport() -> (Arc<dyn Transport>, Arc<MockDevice>) {
    let broker = Arc::new(MockBroker::new());
    let device = MockDevice::attach(&broker, MockDeviceConfig::default());
    (broker as Arc<dyn Transport>, device)
}

fn require_mock(mock: bool) -> bool {
    if !mock {
        eprintln!(
            "error: no transport adapter is configured; pass --mock to run \
             against the in-process mock device"
        );
    }
    mock
}

fn load_config(path: Option<PathBuf>) -> Result<RuntimeConfig, i32> {
    match path {
        Some(path) => RuntimeConfig::load(&path).map_err(|err| {
            eprintln!("error: {err}");
            2
        }),
        None => Ok(RuntimeConfig::default()),
    }
}

fn explain(spec: &str, human: bool) -> i32 {
    let requirements = RequirementSet::parse(spec);
    if human {
        println!("operations: {:?}", requirements.operations);
        println!("settings:   {:?}", requirements.settings);
        println!("keys:       {:?}", requirements.keys);
        println!("voices:     {:?}", requirements.voices);
    } else {
        match serde_json::to_string_pretty(&requirements) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                eprintln!("error: {err}");
                return 2;
            }
        }
    }
    0
}

fn discover(attempts: u32, wait_ms: u64, mock: bool) -> i32 {
    if !require_mock(mock) {
        return 2;
    }
    let (transport, _device) = mock_transport();
    let client = DabClient::new(transport);
    match client.discover(attempts, Duration::from_millis(wait_ms)) {
        Ok(devices) if devices.is_empty() => {
            println!("no devices answered discovery");
            1
        }
        Ok(devices) => {
            for device in devices {
                println!(
                    "{} at {}",
                    device.device_id,
                    device.ip.as_deref().unwrap_or("n/a")
                );
            }
            0
        }
        Err(err) => {
            eprintln!("error: discovery failed: {err}");
            2
        }
    }
}

fn list(config: Option<PathBuf>) -> i32 {
    let config = match load_config(config) {
        Ok(config) => config,
        Err(code) => return code,
    };
    for suite in suite::all(&config) {
        println!("{} ({} cases)", suite.name, suite.cases.len());
        for case in &suite.cases {
            println!("  {} - {}", case.operation, case.title);
        }
    }
    0
}

fn run(device: &str, suite_name: &str, output: &PathBuf, config: Option<PathBuf>, mock: bool) -> i32 {
    if !require_mock(mock) {
        return 2;
    }
    let config = match load_config(config) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let Some(suite) = suite::by_name(&config, suite_name) else {
        eprintln!("error: unknown suite '{suite_name}'");
        return 2;
    };

    let (transport, _device) = mock_transport();
    let client = Arc::new(DabClient::new(transport));
    let store = Arc::new(CapabilityStore::new());
    let mut runner = dab_compliance::TestRunner::new(client, store).with_preflight(PreflightConfig {
        discovery_wait: Duration::from_millis(300),
        health_retry_delay: Duration::from_millis(500),
        ..PreflightConfig::default()
    });

    let report = runner.run_suite(device, &suite);
    if let Err(err) = report.write_to_file(output) {
        eprintln!("error: could not write report: {err}");
        return 2;
    }
    println!(
        "{}: {} executed, {} passed, {} failed, {} optional-failed, {} skipped -> {}",
        report.suite_name,
        report.result_summary.tests_executed,
        report.result_summary.tests_passed,
        report.result_summary.tests_failed,
        report.result_summary.tests_optional_failed,
        report.result_summary.tests_skipped,
        output.display()
    );
    if report.result_summary.overall_passed {
        0
    } else {
        1
    }
}

fn collect_logs(device: &str, output: &PathBuf, mock: bool) -> i32 {
    if !require_mock(mock) {
        return 2;
    }
    let (transport, _device) = mock_transport();
    let client = DabClient::new(transport);
    match client.call_chunked(
        device,
        &Operation::new(dab_protocol::ops::LOGS_COLLECT),
        &serde_json::json!({}),
        Duration::from_secs(30),
    ) {
        Ok(artifact) => {
            if let Some(parent) = output.parent() {
                if !parent.as_os_str().is_empty() {
                    if let Err(err) = std::fs::create_dir_all(parent) {
                        eprintln!("error: {err}");
                        return 2;
                    }
                }
            }
            if let Err(err) = std::fs::write(output, &artifact.bytes) {
                eprintln!("error: could not write artifact: {err}");
                return 2;
            }
            println!(
                "sealed artifact: {} bytes in {} chunk(s), sha256 {} -> {}",
                artifact.bytes.len(),
                artifact.chunk_count,
                artifact.sha256_hex,
                output.display()
            );
            0
        }
        Err(err) => {
            eprintln!("error: log collection failed: {err}");
            1
        }
    }
}
