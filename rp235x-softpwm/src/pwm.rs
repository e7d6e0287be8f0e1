//! Software PWM engine
//!
//! A counter-driven state machine advanced once per timer tick. Each tick
//! inside a period bumps the cycle and duty counters and drives the pin:
//! HIGH while `duty_counter <= duty_period`, LOW after. The tick after the
//! cycle counter passes `cycle_period` resets both counters instead, leaves
//! the pin alone and reports [`Tick::PeriodComplete`]. One period therefore
//! spans `cycle_period + 2` ticks.
//!
//! [`SoftwarePwm::update`] is what an alarm handler calls: a tick, plus a
//! one-step ramp of `duty_period` whenever a period completes. The ramp
//! wraps to zero once it passes `cycle_period`, giving a slow repeating
//! fade when ticks are tens of microseconds apart.
//!
//! Counters are bumped before the comparison, so a `duty_period` of zero
//! drives no HIGH tick and `duty_period` HIGH ticks are driven per period
//! otherwise. The pin keeps whatever the last tick drove through the reset
//! tick; only a `duty_period` above `cycle_period` leaves it HIGH there.

use embedded_hal::digital::{OutputPin, PinState};

/// Largest `cycle_period` whose counters fit in a `u8`: the cycle counter
/// reaches `cycle_period + 1` before it resets.
pub const MAX_CYCLE_PERIOD: u8 = u8::MAX - 1;

/// Errors in the configuration of a [`SoftwarePwm`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PwmConfigError {
    /// `cycle_period` is above [`MAX_CYCLE_PERIOD`].
    CyclePeriodTooLong,
    /// `duty_period` is above `cycle_period + 1`.
    DutyPeriodTooLong,
}

/// Counters of the PWM engine, all in ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SoftPwmState {
    /// Ticks per full PWM period.
    pub cycle_period: u8,
    /// Ticks elapsed in the current period.
    pub cycle_counter: u8,
    /// Ticks within the period the output stays HIGH.
    pub duty_period: u8,
    /// Ticks elapsed toward `duty_period`. Moves in lockstep with
    /// `cycle_counter`.
    pub duty_counter: u8,
}

impl SoftPwmState {
    /// Fresh state: counters and duty at zero.
    pub const fn new(cycle_period: u8) -> Result<Self, PwmConfigError> {
        if cycle_period > MAX_CYCLE_PERIOD {
            return Err(PwmConfigError::CyclePeriodTooLong);
        }
        Ok(Self {
            cycle_period,
            cycle_counter: 0,
            duty_period: 0,
            duty_counter: 0,
        })
    }

    /// Advance the counters by one tick.
    ///
    /// Returns the level to drive, or `None` on the period-boundary tick.
    pub fn step(&mut self) -> Option<PinState> {
        if self.cycle_counter > self.cycle_period {
            self.cycle_counter = 0;
            self.duty_counter = 0;
            None
        } else {
            self.cycle_counter += 1;
            self.duty_counter += 1;
            Some(PinState::from(self.duty_counter <= self.duty_period))
        }
    }

    /// Ramp `duty_period` by one, wrapping to zero past `cycle_period`.
    pub fn advance_duty(&mut self) {
        self.duty_period = self.duty_period.wrapping_add(1);
        if self.duty_period > self.cycle_period {
            self.duty_period = 0;
        }
    }
}

/// Outcome of one [`SoftwarePwm::tick`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// The pin was driven to this level.
    Driven(PinState),
    /// Counters were reset; the pin was not written.
    PeriodComplete,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Tick {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Tick::Driven(PinState::High) => defmt::write!(f, "Driven(High)"),
            Tick::Driven(PinState::Low) => defmt::write!(f, "Driven(Low)"),
            Tick::PeriodComplete => defmt::write!(f, "PeriodComplete"),
        }
    }
}

/// Software PWM on one output pin.
///
/// Owns its counters and its pin; nothing outside the engine can mutate
/// either. Put the engine in an [`Exclusive`](crate::Exclusive) slot to
/// share it with an interrupt handler.
#[derive(Debug)]
pub struct SoftwarePwm<P> {
    state: SoftPwmState,
    pin: P,
}

impl<P: OutputPin> SoftwarePwm<P> {
    /// Drive `pin` with a period of `cycle_period` ticks, duty starting at
    /// zero.
    pub fn new(pin: P, cycle_period: u8) -> Result<Self, PwmConfigError> {
        Ok(Self {
            state: SoftPwmState::new(cycle_period)?,
            pin,
        })
    }

    /// Advance by one tick, writing the pin unless this is the
    /// period-boundary tick.
    pub fn tick(&mut self) -> Result<Tick, P::Error> {
        match self.state.step() {
            Some(level) => {
                self.pin.set_state(level)?;
                Ok(Tick::Driven(level))
            }
            None => Ok(Tick::PeriodComplete),
        }
    }

    /// Ramp the duty period by one tick, wrapping to zero past the cycle
    /// period.
    pub fn advance_duty(&mut self) {
        self.state.advance_duty();
        #[cfg(feature = "defmt")]
        if self.state.duty_period == 0 {
            defmt::debug!("soft pwm: duty ramp wrapped");
        }
    }

    /// One alarm fire: [`tick`](Self::tick), then
    /// [`advance_duty`](Self::advance_duty) if the period completed.
    pub fn update(&mut self) -> Result<Tick, P::Error> {
        let tick = self.tick()?;
        if tick == Tick::PeriodComplete {
            self.advance_duty();
        }
        Ok(tick)
    }

    /// Current counters.
    pub fn state(&self) -> &SoftPwmState {
        &self.state
    }

    /// Set the duty period directly. Takes effect from the next tick.
    pub fn set_duty_period(&mut self, duty_period: u8) -> Result<(), PwmConfigError> {
        if u16::from(duty_period) > u16::from(self.state.cycle_period) + 1 {
            return Err(PwmConfigError::DutyPeriodTooLong);
        }
        self.state.duty_period = duty_period;
        Ok(())
    }

    /// Release the pin.
    pub fn free(self) -> P {
        self.pin
    }
}
