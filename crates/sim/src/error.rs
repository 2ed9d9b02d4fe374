// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use uart_mux_core::AcquireError;

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The device halts here; the simulator reports it instead.
    #[error("soft UART acquisition failed: {0}")]
    Acquire(#[from] AcquireError),
    #[error("invalid board configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to launch core 1")]
    Launch(#[source] std::io::Error),
    #[error("simulation did not finish within {0} ms")]
    WallTime(u64),
    #[error("simulation thread panicked")]
    Panicked,
}

pub type SimResult<T> = Result<T, SimError>;
