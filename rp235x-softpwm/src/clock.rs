//! Monotonic clock
//!
//! The RP2350 timers count microseconds in a 64-bit register that is only
//! readable as two 32-bit words. [`MonotonicClock::now`] reads the low word,
//! then the high word, and joins them.
//!
//! On the RP2350 a read of `TIMELR` latches the matching high word into
//! `TIMEHR`, so the pair is consistent. Hardware without that latch shows a
//! transient skew of up to one low-word period when the low word wraps
//! between the two reads. That skew is accepted here, not retried away.

use fugit::{MicrosDurationU64, TimerInstantU64};

use crate::regs::TimerRegisters;

/// Instant type returned by [`MonotonicClock::now`]: one tick per microsecond.
pub type Instant = TimerInstantU64<1_000_000>;

/// A 64-bit tick count composed from the two counter words of a timer.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock<T> {
    timer: T,
}

impl<T: TimerRegisters> MonotonicClock<T> {
    /// Wrap the counter registers of `timer`.
    pub const fn new(timer: T) -> Self {
        Self { timer }
    }

    /// Current counter value.
    pub fn now(&self) -> Instant {
        let low = self.timer.time_low();
        let high = self.timer.time_high();
        Instant::from_ticks((u64::from(high) << 32) | u64::from(low))
    }

    /// The timer registers this clock reads.
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Busy-wait until `duration` has elapsed from now.
    pub fn wait(&self, duration: MicrosDurationU64) {
        let target = self.now().ticks().saturating_add(duration.ticks());
        while self.now().ticks() < target {
            core::hint::spin_loop();
        }
    }

    /// Initialise a [`CountDown`] instance without starting it.
    pub fn count_down(&self) -> CountDown<'_, T> {
        CountDown {
            clock: self,
            period: MicrosDurationU64::from_ticks(0),
            next_end: None,
        }
    }
}

macro_rules! impl_delay_traits {
    ($($t:ty),+) => {
        $(
        impl<T: TimerRegisters> embedded_hal_0_2::blocking::delay::DelayUs<$t> for MonotonicClock<T> {
            fn delay_us(&mut self, us: $t) {
                #![allow(unused_comparisons)]
                assert!(us >= 0); // Only meaningful for i32
                self.wait(MicrosDurationU64::micros(us as u64))
            }
        }
        impl<T: TimerRegisters> embedded_hal_0_2::blocking::delay::DelayMs<$t> for MonotonicClock<T> {
            fn delay_ms(&mut self, ms: $t) {
                #![allow(unused_comparisons)]
                assert!(ms >= 0); // Only meaningful for i32
                self.wait(MicrosDurationU64::millis(ms as u64))
            }
        }
        )*
    }
}

// The implementation for i32 is a workaround to allow `delay_ms(42)` construction without specifying a type.
impl_delay_traits!(u8, u16, u32, i32);

impl<T: TimerRegisters> embedded_hal::delay::DelayNs for MonotonicClock<T> {
    fn delay_ns(&mut self, ns: u32) {
        // Microsecond resolution only; rounds up.
        let us = ns.div_ceil(1000);
        self.wait(MicrosDurationU64::micros(u64::from(us)))
    }

    fn delay_us(&mut self, us: u32) {
        self.wait(MicrosDurationU64::micros(u64::from(us)))
    }

    fn delay_ms(&mut self, ms: u32) {
        self.wait(MicrosDurationU64::millis(u64::from(ms)))
    }
}

/// Polling count-down on top of a [`MonotonicClock`].
///
/// Implements the [`embedded_hal_0_2::timer`] traits. Each expiry advances
/// the deadline by exactly one period, so a periodic count-down does not
/// drift the way a re-armed alarm does.
pub struct CountDown<'clock, T> {
    clock: &'clock MonotonicClock<T>,
    period: MicrosDurationU64,
    next_end: Option<u64>,
}

impl<T: TimerRegisters> embedded_hal_0_2::timer::CountDown for CountDown<'_, T> {
    type Time = MicrosDurationU64;

    fn start<D>(&mut self, count: D)
    where
        D: Into<Self::Time>,
    {
        self.period = count.into();
        self.next_end = Some(
            self.clock
                .now()
                .ticks()
                .saturating_add(self.period.to_micros()),
        );
    }

    fn wait(&mut self) -> nb::Result<(), void::Void> {
        if let Some(end) = self.next_end {
            let ts = self.clock.now().ticks();
            if ts >= end {
                self.next_end = Some(end.saturating_add(self.period.to_micros()));
                Ok(())
            } else {
                Err(nb::Error::WouldBlock)
            }
        } else {
            panic!("CountDown is not running!");
        }
    }
}

impl<T: TimerRegisters> embedded_hal_0_2::timer::Periodic for CountDown<'_, T> {}

impl<T: TimerRegisters> embedded_hal_0_2::timer::Cancel for CountDown<'_, T> {
    type Error = &'static str;

    fn cancel(&mut self) -> Result<(), Self::Error> {
        if self.next_end.is_none() {
            Err("CountDown is not running.")
        } else {
            self.next_end = None;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimTimer;
    use embedded_hal::delay::DelayNs;
    use embedded_hal_0_2::timer::{Cancel, CountDown as _};
    use fugit::ExtU64;

    #[test]
    fn now_joins_both_words() {
        let timer = SimTimer::new();
        timer.set_counter(0x0000_0002_8000_0001);
        let clock = MonotonicClock::new(&timer);
        assert_eq!(clock.now().ticks(), 0x0000_0002_8000_0001);
    }

    #[test]
    fn now_without_a_tick_is_stable() {
        let timer = SimTimer::new();
        timer.set_counter(1234);
        let clock = MonotonicClock::new(&timer);
        let first = clock.now();
        let second = clock.now();
        assert!(second.ticks() >= first.ticks());
        assert_eq!(first.ticks(), 1234);
    }

    #[test]
    fn now_is_non_decreasing_while_counting() {
        let timer = SimTimer::new();
        timer.set_counter(0xFFFF_FF00);
        timer.set_step_per_read(3);
        let clock = MonotonicClock::new(&timer);
        let mut last = clock.now().ticks();
        for _ in 0..500 {
            let now = clock.now().ticks();
            assert!(now >= last, "{now:#x} < {last:#x}");
            last = now;
        }
        assert!(last > 0xFFFF_FFFF);
    }

    #[test]
    fn latched_high_word_has_no_rollover_skew() {
        let timer = SimTimer::new();
        timer.set_counter(0xFFFF_FFFF);
        timer.set_step_per_read(1);
        let clock = MonotonicClock::new(&timer);
        assert_eq!(clock.now().ticks(), 0xFFFF_FFFF);
    }

    #[test]
    fn unlatched_rollover_skews_by_one_low_word_period() {
        let timer = SimTimer::new();
        timer.set_high_word_latched(false);
        timer.set_counter(0xFFFF_FFFF);
        timer.set_step_per_read(1);
        let clock = MonotonicClock::new(&timer);
        // Low word read before the wrap, high word after it.
        assert_eq!(clock.now().ticks(), 0x1_FFFF_FFFF);
        // The next read is consistent again.
        assert_eq!(clock.now().ticks(), 0x1_0000_0000);
    }

    #[test]
    fn wait_returns_once_duration_elapsed() {
        let timer = SimTimer::new();
        timer.set_counter(1000);
        timer.set_step_per_read(7);
        let mut clock = MonotonicClock::new(&timer);
        clock.delay_ms(2);
        assert!(timer.counter() >= 3000);
        clock.wait(250.micros());
        assert!(timer.counter() >= 3250);
    }

    #[test]
    fn count_down_is_periodic_and_cancellable() {
        let timer = SimTimer::new();
        let clock = MonotonicClock::new(&timer);
        let mut count_down = clock.count_down();
        count_down.start(100.micros());
        assert!(matches!(count_down.wait(), Err(nb::Error::WouldBlock)));
        timer.advance(150);
        assert!(count_down.wait().is_ok());
        // Next deadline is 200, not 150 + 100.
        timer.advance(50);
        assert!(count_down.wait().is_ok());
        assert!(matches!(count_down.wait(), Err(nb::Error::WouldBlock)));
        assert_eq!(count_down.cancel(), Ok(()));
        assert!(count_down.cancel().is_err());
    }

    #[test]
    fn count_down_deadline_does_not_wrap() {
        let timer = SimTimer::new();
        timer.set_counter(u64::MAX - 10);
        let clock = MonotonicClock::new(&timer);
        let mut count_down = clock.count_down();
        count_down.start(100.micros());
        assert!(matches!(count_down.wait(), Err(nb::Error::WouldBlock)));
        timer.advance(5);
        assert!(matches!(count_down.wait(), Err(nb::Error::WouldBlock)));
    }
}
