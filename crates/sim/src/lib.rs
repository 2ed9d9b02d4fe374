// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Host simulator for uart-mux.
//!
//! Runs the unmodified [`uart_mux_core`] routines against simulated
//! peripherals: a PIO block interpreting the real receive program, a wire
//! that clocks 8N1 frames onto the RX pin, single-slot inter-core FIFOs and
//! capturing UARTs. Each core gets its own OS thread.

pub mod error;
pub mod line;
pub mod machine;
pub mod mailbox;
pub mod pio;
pub mod scenario;
pub mod soft_uart;
pub mod uart;

pub use error::{SimError, SimResult};
pub use line::{Frame, UartLine};
pub use machine::{BindingReport, MuxConfig, MuxMachine, RunReport};
pub use mailbox::FifoMailbox;
pub use pio::PioBlock;
pub use scenario::{Scenario, ScenarioAssertion};
pub use soft_uart::SimSoftUart;
pub use uart::CaptureUart;
