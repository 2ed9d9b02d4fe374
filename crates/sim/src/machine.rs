// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Both cores of the board, wired together on the host.
//!
//! Core 0 runs on the calling thread (or a `core0` thread for
//! [`MuxMachine::run_with_wall_time`]); core 1 gets its own `core1` thread
//! and, as on the device, never returns.

use std::thread;
use std::time::Duration;

use crossbeam_channel::Receiver;
use serde::Serialize;
use uart_mux_core::board;
use uart_mux_core::pool::STATE_MACHINES_PER_PIO;
use uart_mux_core::sm_config::baud_supported;
use uart_mux_core::text::DEMO_TEXT;
use uart_mux_core::{
    announce, Chip, Forever, Iterations, PeripheralBinding, PioPool, ReceiveLoop, RunControl,
    RxProgram, TextRef, TransmitWorker,
};

use crate::error::{SimError, SimResult};
use crate::line::Frame;
use crate::mailbox::FifoMailbox;
use crate::soft_uart::SimSoftUart;
use crate::uart::CaptureUart;

#[derive(Debug, Clone)]
pub struct MuxConfig {
    pub chip: Chip,
    pub rx_pin: u8,
    pub baud: u32,
    pub sys_clk_hz: u32,
    pub program: RxProgram,
    /// State machines taken by someone else before the soft UART is claimed,
    /// as `(instance, state_machine)`.
    pub reserved: Vec<(u8, u8)>,
    /// How long to wait for core 1's output once the echo loop stops.
    pub settle: Duration,
    pub echo_stdout: bool,
    pub snapshot: bool,
}

impl MuxConfig {
    /// Rejects settings the board cannot be built with. The RX pin is left
    /// to acquisition, which reports it the way the device would.
    pub fn validate(&self) -> SimResult<()> {
        if !baud_supported(self.sys_clk_hz, self.baud) {
            return Err(SimError::InvalidConfig(format!(
                "baud {} is outside 1..={} for a {} Hz system clock",
                self.baud,
                self.sys_clk_hz / uart_mux_core::program::OVERSAMPLING,
                self.sys_clk_hz
            )));
        }
        for &(instance, sm) in &self.reserved {
            if instance as usize >= self.chip.pio_instances() || sm >= STATE_MACHINES_PER_PIO {
                return Err(SimError::InvalidConfig(format!(
                    "reserved state machine PIO{instance} SM{sm} does not exist on {:?}",
                    self.chip
                )));
            }
        }
        Ok(())
    }
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            chip: board::CHIP,
            rx_pin: board::SOFT_UART_RX_PIN,
            baud: board::SERIAL_BAUD,
            sys_clk_hz: board::SYS_CLK_HZ,
            program: board::RX_PROGRAM,
            reserved: Vec::new(),
            settle: Duration::from_millis(1000),
            echo_stdout: false,
            snapshot: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BindingReport {
    pub pio: u8,
    pub state_machine: u8,
    pub offset: u8,
    pub program_len: u8,
    pub pin: u8,
    pub baud: u32,
}

impl From<&PeripheralBinding> for BindingReport {
    fn from(binding: &PeripheralBinding) -> Self {
        Self {
            pio: binding.instance,
            state_machine: binding.state_machine,
            offset: binding.offset,
            program_len: binding.program_len,
            pin: binding.pin,
            baud: binding.baud,
        }
    }
}

fn lossy<S: serde::Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub program: &'static str,
    pub binding: BindingReport,
    #[serde(serialize_with = "lossy")]
    pub console: Vec<u8>,
    #[serde(serialize_with = "lossy")]
    pub hard_uart: Vec<u8>,
    pub echoed: u64,
    pub framing_errors: u32,
    pub sys_ticks: u64,
    /// State machines still claimed on the soft UART's PIO after teardown.
    pub claimed_after_release: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pio: Option<serde_json::Value>,
}

pub struct MuxMachine {
    config: MuxConfig,
    console: CaptureUart,
    hard_uart: CaptureUart,
}

impl MuxMachine {
    pub fn new(config: MuxConfig) -> Self {
        let console = CaptureUart::new("console").with_stdout_echo(config.echo_stdout);
        Self {
            config,
            console,
            hard_uart: CaptureUart::new("hard_uart"),
        }
    }

    pub fn config(&self) -> &MuxConfig {
        &self.config
    }

    pub fn console(&self) -> &CaptureUart {
        &self.console
    }

    pub fn hard_uart(&self) -> &CaptureUart {
        &self.hard_uart
    }

    /// Boots both cores and runs core 0's echo loop until `control` stops it.
    ///
    /// Startup order matches the firmware: banner, soft UART claim, core 1
    /// launch, mailbox handoff, echo. An acquisition failure is returned
    /// after the banner has already been written. An invalid configuration
    /// is rejected before anything runs.
    pub fn run<K: RunControl>(&self, wire: Receiver<Frame>, control: K) -> SimResult<RunReport> {
        let config = &self.config;
        config.validate()?;
        let mut console = self.console.clone();
        announce(&mut console);

        let code = config.program.assemble();
        let mut pool = PioPool::new(config.chip);
        for &(instance, sm) in &config.reserved {
            pool.reserve_state_machine(instance, sm)?;
        }
        let binding = pool
            .claim_soft_uart(&code, config.rx_pin, config.baud)
            .inspect_err(|e| tracing::error!("{e}"))?;
        tracing::info!(
            pio = binding.instance,
            sm = binding.state_machine,
            offset = binding.offset,
            pin = binding.pin,
            "soft UART claimed"
        );

        let receiver = SimSoftUart::start(binding, config.program, config.sys_clk_hz, wire);
        let mut echo = ReceiveLoop::new(console, receiver);

        let (mut core0_mailbox, core1_mailbox) = FifoMailbox::pair();
        let hard_uart = self.hard_uart.clone();
        let mut core1 = None;
        echo.hand_off(
            &mut core0_mailbox,
            || {
                core1 = Some(thread::Builder::new().name("core1".into()).spawn(move || {
                    let mut worker = TransmitWorker::new(hard_uart, core1_mailbox);
                    worker.run(Forever);
                }));
            },
            TextRef::DEMO,
        );
        if let Some(Err(e)) = core1 {
            return Err(SimError::Launch(e));
        }
        tracing::debug!("core 1 launched");

        let echoed = echo.run(control);
        let (_, receiver) = echo.into_parts();

        pool.release(&binding);
        tracing::debug!("soft UART released");

        self.hard_uart
            .wait_until(config.settle, |out| out.len() >= DEMO_TEXT.len());

        Ok(RunReport {
            program: config.program.name(),
            binding: BindingReport::from(&binding),
            console: self.console.contents(),
            hard_uart: self.hard_uart.contents(),
            echoed,
            framing_errors: receiver.framing_errors(),
            sys_ticks: receiver.ticks(),
            claimed_after_release: pool.claimed_state_machines(binding.instance),
            pio: config.snapshot.then(|| receiver.snapshot()),
        })
    }

    /// Runs core 0 on its own thread for `echo_bytes` bytes and gives up
    /// after `wall_time`. A receiver starved of frames parks forever, so this
    /// is the variant to use for untrusted input.
    pub fn run_with_wall_time(
        self,
        wire: Receiver<Frame>,
        echo_bytes: u64,
        wall_time: Duration,
    ) -> SimResult<RunReport> {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        thread::Builder::new()
            .name("core0".into())
            .spawn(move || {
                let _ = done_tx.send(self.run(wire, Iterations::new(echo_bytes)));
            })
            .map_err(SimError::Launch)?;

        match done_rx.recv_timeout(wall_time) {
            Ok(result) => result,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                Err(SimError::WallTime(wall_time.as_millis() as u64))
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => Err(SimError::Panicked),
        }
    }
}
