// uart-mux - Dual-core PIO UART multiplexer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Run-until-told-otherwise contract for the endless core routines.

/// Consulted once before every blocking step of a core routine.
///
/// The device always runs with [`Forever`]. Bounded variants exist so a
/// harness can stop a routine without changing its body.
pub trait RunControl {
    fn should_continue(&mut self) -> bool;
}

impl<T: RunControl + ?Sized> RunControl for &mut T {
    fn should_continue(&mut self) -> bool {
        (**self).should_continue()
    }
}

/// Never stops.
#[derive(Debug, Clone, Copy, Default)]
pub struct Forever;

impl RunControl for Forever {
    fn should_continue(&mut self) -> bool {
        true
    }
}

/// Allows exactly `n` steps.
#[derive(Debug, Clone, Copy)]
pub struct Iterations {
    remaining: u64,
}

impl Iterations {
    pub fn new(n: u64) -> Self {
        Self { remaining: n }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl RunControl for Iterations {
    fn should_continue(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iterations_allow_exact_count() {
        let mut control = Iterations::new(3);
        let steps = core::iter::from_fn(|| control.should_continue().then_some(()))
            .take(10)
            .count();
        assert_eq!(steps, 3);
        assert_eq!(control.remaining(), 0);
        assert!(!control.should_continue());
    }

    #[test]
    fn test_zero_iterations_never_runs() {
        let mut control = Iterations::new(0);
        assert!(!control.should_continue());
    }

    #[test]
    fn test_forever_through_reference() {
        fn steps<K: RunControl>(mut control: K, limit: usize) -> usize {
            (0..limit).take_while(|_| control.should_continue()).count()
        }

        let mut forever = Forever;
        assert_eq!(steps(&mut forever, 1000), 1000);

        let mut bounded = Iterations::new(4);
        assert_eq!(steps(&mut bounded, 1000), 4);
    }
}
