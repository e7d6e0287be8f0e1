//! Register-level timing and software PWM for the Raspberry Pi RP2350
//!
//! This crate drives the RP2350 straight through its memory-mapped
//! registers, without going through a HAL:
//!
//! * [`clock::MonotonicClock`] builds a 64-bit tick count from the two
//!   32-bit counter words of a timer.
//! * [`scheduler::AlarmScheduler`] keeps a one-shot alarm firing
//!   periodically by re-arming it from inside its own interrupt handler.
//! * [`pwm::SoftwarePwm`] toggles a GPIO pin once per alarm fire to
//!   synthesise a PWM waveform whose duty cycle ramps once per period.
//!
//! All of the above are generic over the narrow register traits in
//! [`regs`]. The [`hw`] module implements them for the real silicon and
//! [`sim`] implements them in software, so the state machines can be
//! exercised on the host.
//!
//! # Crate features
//!
//! * **defmt** -
//!   Implement `defmt::Format` for several types and emit trace logs.
//! * **rt** -
//!   Minimal startup / runtime for Cortex-M microcontrollers

#![warn(missing_docs)]
#![no_std]

/// Re-export of the PAC
pub use rp235x_pac as pac;

pub(crate) mod atomic_register_access;
pub mod clock;
pub mod exclusive;
pub mod gpio;
pub mod hw;
pub mod pwm;
pub mod regs;
pub mod scheduler;
pub mod sim;
pub mod vector_table;

pub use clock::{Instant, MonotonicClock};
pub use exclusive::Exclusive;
pub use gpio::{GpioPort, OutputPin, PinId};
pub use pwm::{SoftPwmState, SoftwarePwm, Tick};
pub use scheduler::{AlarmId, AlarmScheduler, Rearm};

// Re-export crates used in rp235x-softpwm's public API
pub extern crate fugit;
