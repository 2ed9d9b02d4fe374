// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{error, info, warn};

use uart_mux_core::RxProgram;
use uart_mux_sim::scenario::{parse_hex, Scenario, ScenarioAssertion};
use uart_mux_sim::{Frame, MuxConfig, MuxMachine, RunReport};

const EXIT_PASS: u8 = 0;
const EXIT_ASSERT_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

const RESULT_SCHEMA_VERSION: &str = "1.0";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Host simulator for the uart-mux PIO soft-UART firmware",
    long_about = None
)]
struct Cli {
    /// Log at DEBUG instead of INFO
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Feed bytes into the soft UART and print what the console echoes.
    Run(RunArgs),

    /// Deterministic, CI-friendly runner mode driven by a scenario (YAML).
    Test(TestArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProgramArg {
    Full,
    Mini,
}

impl From<ProgramArg> for RxProgram {
    fn from(arg: ProgramArg) -> Self {
        match arg {
            ProgramArg::Full => RxProgram::Full,
            ProgramArg::Mini => RxProgram::Mini,
        }
    }
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Text to send; read from stdin when no input option is given
    #[arg(short, long, conflicts_with_all = ["input_hex", "input_file"])]
    input: Option<String>,

    /// Bytes to send as hex, e.g. "41 42 0a"
    #[arg(long, conflicts_with = "input_file")]
    input_hex: Option<String>,

    /// File whose contents are sent byte for byte
    #[arg(long)]
    input_file: Option<PathBuf>,

    /// Receive microprogram loaded into the state machine
    #[arg(long, value_enum, default_value = "full")]
    program: ProgramArg,

    /// Soft-UART RX pin
    #[arg(long)]
    pin: Option<u8>,

    /// Line rate of the soft UART
    #[arg(long)]
    baud: Option<u32>,

    /// Print a JSON run report instead of streaming the console
    #[arg(long)]
    json: bool,

    /// Write the PIO block state (JSON) after the run
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Print the hard UART's output to stderr after the run
    #[arg(long)]
    show_hard_uart: bool,

    /// How long to wait for core 1's transmission once echoing stops
    #[arg(long, default_value = "1000")]
    settle_ms: u64,

    /// Give up if the run takes longer than this
    #[arg(long, default_value = "10000")]
    wall_time_ms: u64,
}

#[derive(Parser, Debug)]
struct TestArgs {
    /// Path to the scenario (YAML)
    #[arg(short = 'c', long)]
    scenario: PathBuf,

    /// Print the result as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Directory to write test artifacts (result.json, console.log, hard_uart.log)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Override the scenario's wall-time limit
    #[arg(long)]
    wall_time_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
struct AssertionResult {
    assertion: ScenarioAssertion,
    passed: bool,
}

#[derive(Debug, Serialize)]
struct TestResult {
    result_schema_version: &'static str,
    scenario: String,
    status: &'static str,
    duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    assertions: Vec<AssertionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<RunReport>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays the console stream (or JSON).
    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Test(args) => run_test(args),
    }
}

fn read_input(args: &RunArgs) -> anyhow::Result<Vec<u8>> {
    if let Some(text) = &args.input {
        return Ok(text.as_bytes().to_vec());
    }
    if let Some(hex) = &args.input_hex {
        return parse_hex(hex).context("Invalid --input-hex");
    }
    if let Some(path) = &args.input_file {
        return std::fs::read(path).with_context(|| format!("Failed to read input file {:?}", path));
    }
    let mut buf = Vec::new();
    std::io::stdin()
        .read_to_end(&mut buf)
        .context("Failed to read stdin")?;
    Ok(buf)
}

fn wire_of(frames: &[Frame]) -> crossbeam_channel::Receiver<Frame> {
    let (tx, rx) = crossbeam_channel::unbounded();
    for frame in frames {
        let _ = tx.send(*frame);
    }
    rx
}

fn run(args: RunArgs) -> ExitCode {
    let input = match read_input(&args) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let defaults = MuxConfig::default();
    let config = MuxConfig {
        rx_pin: args.pin.unwrap_or(defaults.rx_pin),
        baud: args.baud.unwrap_or(defaults.baud),
        program: args.program.into(),
        settle: Duration::from_millis(args.settle_ms),
        echo_stdout: !args.json,
        snapshot: args.snapshot.is_some(),
        ..defaults
    };
    if let Err(e) = config.validate() {
        error!("{}", e);
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }

    info!(
        bytes = input.len(),
        program = config.program.name(),
        baud = config.baud,
        "starting simulation"
    );

    let frames: Vec<Frame> = input.iter().copied().map(Frame::from).collect();
    let machine = MuxMachine::new(config);
    let hard_uart = machine.hard_uart().clone();
    let report = match machine.run_with_wall_time(
        wire_of(&frames),
        frames.len() as u64,
        Duration::from_millis(args.wall_time_ms),
    ) {
        Ok(report) => report,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    };

    if let Some(path) = &args.snapshot {
        if let Err(e) = write_json(path, &report.pio) {
            error!("{:#}", e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    }

    if args.show_hard_uart {
        eprint!("{}", String::from_utf8_lossy(&hard_uart.contents()));
    }

    if args.json {
        match serde_json::to_string(&report) {
            Ok(line) => println!("{}", line),
            Err(e) => {
                error!("Failed to serialise report: {}", e);
                return ExitCode::from(EXIT_RUNTIME_ERROR);
            }
        }
    }

    ExitCode::from(EXIT_PASS)
}

fn run_test(args: TestArgs) -> ExitCode {
    let start = Instant::now();
    let loaded = Scenario::from_file(&args.scenario).and_then(|s| s.frames().map(|f| (s, f)));
    let (scenario, frames) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            let result = TestResult {
                result_schema_version: RESULT_SCHEMA_VERSION,
                scenario: args.scenario.display().to_string(),
                status: "error",
                duration_ms: start.elapsed().as_millis() as u64,
                message: Some(msg),
                assertions: Vec::new(),
                report: None,
            };
            emit_result(&args, &result);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    if scenario.assertions.is_empty() {
        warn!("Scenario '{}' has no assertions", scenario.name);
    }

    let wall_time = args.wall_time_ms.unwrap_or(scenario.limits.wall_time_ms);
    let machine = MuxMachine::new(scenario.machine_config());
    let outcome = machine.run_with_wall_time(
        wire_of(&frames),
        scenario.echo_bytes(&frames),
        Duration::from_millis(wall_time),
    );

    let (status, code, message, assertions, report) = match outcome {
        Ok(report) => {
            let assertions: Vec<AssertionResult> = scenario
                .assertions
                .iter()
                .map(|assertion| {
                    let passed = assertion.holds(&report);
                    if !passed {
                        info!("Assertion failed: {}", assertion.short_name());
                    }
                    AssertionResult {
                        assertion: assertion.clone(),
                        passed,
                    }
                })
                .collect();
            if assertions.iter().all(|a| a.passed) {
                ("pass", EXIT_PASS, None, assertions, Some(report))
            } else {
                ("fail", EXIT_ASSERT_FAIL, None, assertions, Some(report))
            }
        }
        Err(e) => {
            error!("{}", e);
            ("error", EXIT_RUNTIME_ERROR, Some(e.to_string()), Vec::new(), None)
        }
    };

    let result = TestResult {
        result_schema_version: RESULT_SCHEMA_VERSION,
        scenario: scenario.name.clone(),
        status,
        duration_ms: start.elapsed().as_millis() as u64,
        message,
        assertions,
        report,
    };
    emit_result(&args, &result);
    info!("Scenario '{}': {}", scenario.name, status);
    ExitCode::from(code)
}

fn emit_result(args: &TestArgs, result: &TestResult) {
    if args.json {
        match serde_json::to_string(result) {
            Ok(line) => println!("{}", line),
            Err(e) => error!("Failed to serialise result: {}", e),
        }
    }

    let Some(output_dir) = &args.output_dir else {
        return;
    };
    if let Err(e) = std::fs::create_dir_all(output_dir) {
        error!("Failed to create output directory {:?}: {}", output_dir, e);
        return;
    }
    if let Err(e) = write_json(&output_dir.join("result.json"), result) {
        error!("{:#}", e);
    }
    if let Some(report) = &result.report {
        for (name, bytes) in [
            ("console.log", &report.console),
            ("hard_uart.log", &report.hard_uart),
        ] {
            if let Err(e) = std::fs::write(output_dir.join(name), bytes) {
                error!("Failed to write {}: {}", name, e);
            }
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let file = std::fs::File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    serde_json::to_writer_pretty(file, value).with_context(|| format!("Failed to write {:?}", path))
}
