// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Hardware-independent half of uart-mux.
//!
//! The primary core echoes bytes from a PIO-backed soft UART to the console
//! ([`ReceiveLoop`]). The secondary core waits for one word on the cross-core
//! mailbox and writes the text it names to the hard UART
//! ([`TransmitWorker`]). Everything here is `no_std`; the firmware and the
//! host simulator provide the peripherals through the [`SoftUartRx`],
//! [`Mailbox`] and [`embedded_io::Write`] seams.

#![cfg_attr(not(test), no_std)]

pub mod board;
pub mod control;
pub mod mailbox;
pub mod pool;
pub mod program;
pub mod receive_loop;
pub mod sm_config;
pub mod soft_uart;
pub mod text;
pub mod transmit_worker;

pub use control::{Forever, Iterations, RunControl};
pub use mailbox::Mailbox;
pub use pool::{AcquireError, Chip, PeripheralBinding, PioPool};
pub use program::RxProgram;
pub use receive_loop::{announce, ReceiveLoop};
pub use sm_config::SmRegisters;
pub use soft_uart::SoftUartRx;
pub use text::TextRef;
pub use transmit_worker::{TransmitWorker, WorkerState};
