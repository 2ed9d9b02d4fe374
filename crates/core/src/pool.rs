// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! PIO state machine and instruction memory bookkeeping.
//!
//! [`PioPool::claim`] picks the first PIO instance that can address the
//! requested GPIO range, has a free state machine and has room for the
//! program. Nothing is touched on failure, so a failed claim can be reported
//! and the pool reused.

use crate::program::{RxCode, INSTRUCTION_MEMORY_SIZE};

pub const MAX_PIO_INSTANCES: usize = 3;
pub const STATE_MACHINES_PER_PIO: u8 = 4;

/// Every PIO block addresses a 32-pin window of GPIOs.
const GPIO_WINDOW: u8 = 32;
/// Alternative window base on chips with more than 32 GPIOs.
const HIGH_GPIO_BASE: u8 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chip {
    Rp2040,
    Rp2350A,
    Rp2350B,
}

impl Chip {
    pub const fn pio_instances(self) -> usize {
        match self {
            Chip::Rp2040 => 2,
            Chip::Rp2350A | Chip::Rp2350B => 3,
        }
    }

    pub const fn bank0_gpios(self) -> u8 {
        match self {
            Chip::Rp2040 | Chip::Rp2350A => 30,
            Chip::Rp2350B => 48,
        }
    }

    /// Whether a PIO block can move its GPIO window to start at 16.
    pub const fn movable_gpio_base(self) -> bool {
        matches!(self, Chip::Rp2350B)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AcquireError {
    #[error("GPIO {pin} is not a bank0 GPIO on {chip:?}")]
    PinOutOfRange { pin: u8, chip: Chip },
    #[error("no PIO instance can address GPIO {base}..{end}")]
    NoCapableInstance { base: u8, end: u8 },
    #[error("no free state machine on a PIO instance able to address GPIO {base}")]
    NoFreeStateMachine { base: u8 },
    #[error("no PIO instruction memory left for a {len}-instruction program")]
    NoProgramSpace { len: u8 },
    #[error("{chip:?} has no state machine {state_machine} on PIO{instance}")]
    NoSuchStateMachine {
        instance: u8,
        state_machine: u8,
        chip: Chip,
    },
}

/// A claimed state machine with its program loaded, bound to one input pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeripheralBinding {
    /// PIO block index (0 = PIO0).
    pub instance: u8,
    pub state_machine: u8,
    /// Instruction memory slot of the program's first instruction.
    pub offset: u8,
    pub program_len: u8,
    /// First GPIO of the instance's 32-pin window.
    pub gpio_base: u8,
    pub pin: u8,
    pub baud: u32,
}

impl PeripheralBinding {
    /// Pin index as seen from inside the PIO block.
    pub fn relative_pin(&self) -> u8 {
        self.pin - self.gpio_base
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct InstanceState {
    claimed_sms: u8,
    used_instructions: u32,
    gpio_base: u8,
}

impl InstanceState {
    fn is_idle(&self) -> bool {
        self.claimed_sms == 0 && self.used_instructions == 0
    }

    fn covers(&self, base: u8, end: u8) -> bool {
        base >= self.gpio_base && end <= self.gpio_base + GPIO_WINDOW
    }

    fn free_state_machine(&self) -> Option<u8> {
        (0..STATE_MACHINES_PER_PIO).find(|sm| self.claimed_sms & (1 << sm) == 0)
    }

    fn find_offset(&self, len: u8, origin: Option<u8>) -> Option<u8> {
        let mask = program_mask(len);
        let fits = |offset: u8| self.used_instructions & (mask << offset) == 0;
        let last = INSTRUCTION_MEMORY_SIZE as u8 - len;
        match origin {
            Some(origin) => (origin <= last && fits(origin)).then_some(origin),
            None => (0..=last).rev().find(|&offset| fits(offset)),
        }
    }
}

fn program_mask(len: u8) -> u32 {
    if len as usize >= INSTRUCTION_MEMORY_SIZE {
        u32::MAX
    } else {
        (1u32 << len) - 1
    }
}

/// Claim state of every PIO block on one chip.
#[derive(Debug, Clone)]
pub struct PioPool {
    chip: Chip,
    instances: [InstanceState; MAX_PIO_INSTANCES],
}

impl PioPool {
    pub fn new(chip: Chip) -> Self {
        Self {
            chip,
            instances: [InstanceState::default(); MAX_PIO_INSTANCES],
        }
    }

    pub fn chip(&self) -> Chip {
        self.chip
    }

    /// Claims a state machine and program space for a soft-UART receiver on
    /// `pin`.
    pub fn claim_soft_uart(
        &mut self,
        program: &RxCode,
        pin: u8,
        baud: u32,
    ) -> Result<PeripheralBinding, AcquireError> {
        self.claim(program, pin, 1).map(|claim| PeripheralBinding {
            instance: claim.instance,
            state_machine: claim.state_machine,
            offset: claim.offset,
            program_len: program.code.len() as u8,
            gpio_base: claim.gpio_base,
            pin,
            baud,
        })
    }

    /// Finds a PIO instance able to address `gpio_base..gpio_base + gpio_count`,
    /// claims its lowest free state machine and reserves instruction memory
    /// for `program`.
    pub fn claim(
        &mut self,
        program: &RxCode,
        gpio_base: u8,
        gpio_count: u8,
    ) -> Result<Claim, AcquireError> {
        let end = gpio_base.saturating_add(gpio_count);
        if gpio_count == 0 || end > self.chip.bank0_gpios() {
            return Err(AcquireError::PinOutOfRange {
                pin: end.saturating_sub(1).max(gpio_base),
                chip: self.chip,
            });
        }

        let len = program.code.len() as u8;
        let mut any_capable = false;
        let mut any_free_sm = false;

        for index in 0..self.chip.pio_instances() {
            let mut candidate = self.instances[index];

            let wanted_base = if end > GPIO_WINDOW { HIGH_GPIO_BASE } else { 0 };
            if self.chip.movable_gpio_base()
                && candidate.gpio_base != wanted_base
                && candidate.is_idle()
            {
                candidate.gpio_base = wanted_base;
            }
            if !candidate.covers(gpio_base, end) {
                continue;
            }
            any_capable = true;

            let Some(state_machine) = candidate.free_state_machine() else {
                continue;
            };
            any_free_sm = true;

            let Some(offset) = candidate.find_offset(len, program.origin) else {
                continue;
            };

            candidate.claimed_sms |= 1 << state_machine;
            candidate.used_instructions |= program_mask(len) << offset;
            self.instances[index] = candidate;

            return Ok(Claim {
                instance: index as u8,
                state_machine,
                offset,
                gpio_base: candidate.gpio_base,
            });
        }

        Err(if !any_capable {
            AcquireError::NoCapableInstance {
                base: gpio_base,
                end,
            }
        } else if !any_free_sm {
            AcquireError::NoFreeStateMachine { base: gpio_base }
        } else {
            AcquireError::NoProgramSpace { len }
        })
    }

    /// Frees the state machine and program memory held by `binding`.
    pub fn release(&mut self, binding: &PeripheralBinding) {
        let instance = &mut self.instances[binding.instance as usize];
        debug_assert!(instance.claimed_sms & (1 << binding.state_machine) != 0);
        instance.claimed_sms &= !(1 << binding.state_machine);
        instance.used_instructions &= !(program_mask(binding.program_len) << binding.offset);
    }

    /// Marks a state machine as used by something outside the pool.
    pub fn reserve_state_machine(
        &mut self,
        instance: u8,
        state_machine: u8,
    ) -> Result<(), AcquireError> {
        if instance as usize >= self.chip.pio_instances() || state_machine >= STATE_MACHINES_PER_PIO
        {
            return Err(AcquireError::NoSuchStateMachine {
                instance,
                state_machine,
                chip: self.chip,
            });
        }
        self.instances[instance as usize].claimed_sms |= 1 << state_machine;
        Ok(())
    }

    pub fn claimed_state_machines(&self, instance: u8) -> u8 {
        self.instances[instance as usize].claimed_sms
    }

    pub fn used_instructions(&self, instance: u8) -> u32 {
        self.instances[instance as usize].used_instructions
    }

    pub fn gpio_base(&self, instance: u8) -> u8 {
        self.instances[instance as usize].gpio_base
    }
}

/// Result of a successful [`PioPool::claim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    pub instance: u8,
    pub state_machine: u8,
    pub offset: u8,
    pub gpio_base: u8,
}
