// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! YAML test scenarios: what to put on the wire and what to expect back.
//!
//! ```yaml
//! schema_version: "1.0"
//! name: echo-ab
//! board:
//!   program: full
//! input:
//!   text: "AB\n"
//! limits:
//!   wall_time_ms: 5000
//! assertions:
//!   - echo_equals: "AB\n"
//!   - hard_uart_contains: "Hello"
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uart_mux_core::RxProgram;

use crate::line::Frame;
use crate::machine::{MuxConfig, RunReport};

pub const SCHEMA_VERSION: &str = "1.0";

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramKind {
    #[default]
    Full,
    Mini,
}

impl From<ProgramKind> for RxProgram {
    fn from(kind: ProgramKind) -> Self {
        match kind {
            ProgramKind::Full => RxProgram::Full,
            ProgramKind::Mini => RxProgram::Mini,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoardOverrides {
    #[serde(default)]
    pub program: ProgramKind,
    #[serde(default)]
    pub rx_pin: Option<u8>,
    #[serde(default)]
    pub baud: Option<u32>,
    #[serde(default)]
    pub reserved_state_machines: Vec<(u8, u8)>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioInput {
    #[serde(default)]
    pub text: Option<String>,
    /// Whitespace-separated or packed hex bytes, e.g. `"41 42 0a"`.
    #[serde(default)]
    pub hex: Option<String>,
    /// Raw frames, appended after `text` and `hex`, written as
    /// `- byte: 65` or `- malformed: 65`.
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub frames: Vec<Frame>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioLimits {
    #[serde(default = "default_wall_time_ms")]
    pub wall_time_ms: u64,
    /// Bytes core 0 echoes before the run stops. Defaults to the number of
    /// frames the selected program is expected to deliver.
    #[serde(default)]
    pub echo_bytes: Option<u64>,
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

fn default_wall_time_ms() -> u64 {
    10_000
}

fn default_settle_ms() -> u64 {
    1_000
}

impl Default for ScenarioLimits {
    fn default() -> Self {
        Self {
            wall_time_ms: default_wall_time_ms(),
            echo_bytes: None,
            settle_ms: default_settle_ms(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct EchoEqualsAssertion {
    pub echo_equals: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ConsoleEqualsAssertion {
    pub console_equals: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct HardUartEqualsAssertion {
    pub hard_uart_equals: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct HardUartContainsAssertion {
    pub hard_uart_contains: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct FramingErrorsAssertion {
    pub framing_errors: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum ScenarioAssertion {
    EchoEquals(EchoEqualsAssertion),
    ConsoleEquals(ConsoleEqualsAssertion),
    HardUartEquals(HardUartEqualsAssertion),
    HardUartContains(HardUartContainsAssertion),
    FramingErrors(FramingErrorsAssertion),
}

impl ScenarioAssertion {
    /// Checks the assertion against a finished run. Console output is
    /// compared after the startup banner.
    pub fn holds(&self, report: &RunReport) -> bool {
        let banner = uart_mux_core::board::BANNER.as_bytes();
        match self {
            ScenarioAssertion::EchoEquals(a) => {
                report.console.strip_prefix(banner) == Some(a.echo_equals.as_bytes())
            }
            ScenarioAssertion::ConsoleEquals(a) => report.console == a.console_equals.as_bytes(),
            ScenarioAssertion::HardUartEquals(a) => {
                report.hard_uart == a.hard_uart_equals.as_bytes()
            }
            ScenarioAssertion::HardUartContains(a) => {
                String::from_utf8_lossy(&report.hard_uart).contains(&a.hard_uart_contains)
            }
            ScenarioAssertion::FramingErrors(a) => report.framing_errors == a.framing_errors,
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            ScenarioAssertion::EchoEquals(_) => "echo_equals",
            ScenarioAssertion::ConsoleEquals(_) => "console_equals",
            ScenarioAssertion::HardUartEquals(_) => "hard_uart_equals",
            ScenarioAssertion::HardUartContains(_) => "hard_uart_contains",
            ScenarioAssertion::FramingErrors(_) => "framing_errors",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    #[serde(default)]
    pub board: BoardOverrides,
    #[serde(default)]
    pub input: ScenarioInput,
    #[serde(default)]
    pub limits: ScenarioLimits,
    #[serde(default)]
    pub assertions: Vec<ScenarioAssertion>,
}

impl Scenario {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario at {:?}", path.as_ref()))?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let scenario: Self =
            serde_yaml::from_str(contents).context("Failed to parse scenario YAML")?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '{}'",
                self.schema_version,
                SCHEMA_VERSION
            );
        }
        if self.name.trim().is_empty() {
            anyhow::bail!("Scenario 'name' cannot be empty");
        }
        if self.limits.wall_time_ms == 0 {
            anyhow::bail!("Limit 'wall_time_ms' must be greater than zero");
        }
        if let Some(hex) = &self.input.hex {
            parse_hex(hex).context("Invalid 'input.hex'")?;
        }
        self.machine_config()
            .validate()
            .context("Invalid 'board'")?;
        Ok(())
    }

    /// Every frame the scenario puts on the wire, in order.
    pub fn frames(&self) -> Result<Vec<Frame>> {
        let mut frames: Vec<Frame> = Vec::new();
        if let Some(text) = &self.input.text {
            frames.extend(text.bytes().map(Frame::from));
        }
        if let Some(hex) = &self.input.hex {
            frames.extend(parse_hex(hex)?.into_iter().map(Frame::from));
        }
        frames.extend(self.input.frames.iter().copied());
        Ok(frames)
    }

    /// Bytes the echo loop should see. The full program drops malformed
    /// frames; the mini program delivers whatever it sampled.
    pub fn echo_bytes(&self, frames: &[Frame]) -> u64 {
        self.limits.echo_bytes.unwrap_or_else(|| match self.board.program {
            ProgramKind::Full => frames
                .iter()
                .filter(|f| matches!(f, Frame::Byte(_)))
                .count() as u64,
            ProgramKind::Mini => frames.len() as u64,
        })
    }

    pub fn machine_config(&self) -> MuxConfig {
        let defaults = MuxConfig::default();
        MuxConfig {
            rx_pin: self.board.rx_pin.unwrap_or(defaults.rx_pin),
            baud: self.board.baud.unwrap_or(defaults.baud),
            program: self.board.program.into(),
            reserved: self.board.reserved_state_machines.clone(),
            settle: Duration::from_millis(self.limits.settle_ms),
            ..defaults
        }
    }
}

/// Parses `"41 42 0a"`, `"41420a"` or `"0x41 0x42"` into bytes.
pub fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let digits: String = input
        .split_whitespace()
        .map(|token| {
            token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token)
        })
        .collect();
    hex::decode(&digits).with_context(|| format!("invalid hex bytes '{}'", input))
}
