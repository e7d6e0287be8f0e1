//! Alarm scheduler
//!
//! Turns one one-shot alarm compare register into a periodic interrupt by
//! rearming it from inside its own handler.
//!
//! The alarm compares against the low 32 bits of the counter only, so a
//! target is at most `u32::MAX` ticks ahead. [`AlarmScheduler::service`]
//! is the whole handler body: rearm, acknowledge, then do the work. The
//! rearm comes first so the next alarm is in flight before the pending bit
//! is dropped.
//!
//! With [`Rearm::Relative`] (the default) each new target is measured from
//! the moment the handler runs, so handler latency accumulates as drift:
//! after `n` fires the schedule is late by the sum of the `n` latencies.
//! [`Rearm::Absolute`] measures from the previous target instead.
//!
//! A match is only seen while the counter's low word equals the compare
//! value, so a target the counter passes before the compare write lands
//! would not fire for another 2^32 ticks. Every write is therefore checked
//! against the counter afterwards; a target already reached is disarmed and
//! its interrupt forced through `INTF`, so the fire happens at once instead
//! of being lost.
//!
//! ```ignore
//! static BLINK: Exclusive<(AlarmScheduler<Timer<Timer0Device>>, OutputPin<Bank0>)> =
//!     Exclusive::new();
//!
//! extern "C" fn on_alarm() {
//!     BLINK.with(|(scheduler, led)| scheduler.service(|| led.toggle()));
//! }
//! ```

use fugit::MicrosDurationU32;

use crate::{
    clock::{Instant, MonotonicClock},
    regs::{InterruptController, TimerRegisters},
};

pub use crate::regs::AlarmId;

/// How [`AlarmScheduler::service`] picks the next target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rearm {
    /// `now() + interval`, read when the handler runs. Handler latency
    /// shifts every later fire.
    #[default]
    Relative,
    /// `previous target + interval`. No drift, as long as the handler keeps
    /// up; if that target has already passed, falls back to `Relative` for
    /// this fire. A target passed during the write itself is forced.
    Absolute,
}

/// Alarm scheduling error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScheduleAlarmError {
    /// Alarm time is too high. Should not be more than `u32::MAX` in the future.
    AlarmTooLate,
}

/// Periodic interrupt built on one alarm of a timer.
#[derive(Debug)]
pub struct AlarmScheduler<T> {
    clock: MonotonicClock<T>,
    alarm: AlarmId,
    interval: MicrosDurationU32,
    rearm: Rearm,
    target: Option<Instant>,
}

impl<T: TimerRegisters> AlarmScheduler<T> {
    /// Fire `alarm` of `timer` every `interval`, rearming relative to the
    /// handler's own `now()`.
    ///
    /// A zero `interval` is treated as one tick.
    pub const fn new(timer: T, alarm: AlarmId, interval: MicrosDurationU32) -> Self {
        Self::with_rearm(timer, alarm, interval, Rearm::Relative)
    }

    /// Like [`new`](Self::new) with an explicit rearm mode.
    pub const fn with_rearm(
        timer: T,
        alarm: AlarmId,
        interval: MicrosDurationU32,
        rearm: Rearm,
    ) -> Self {
        Self {
            clock: MonotonicClock::new(timer),
            alarm,
            interval,
            rearm,
            target: None,
        }
    }

    /// Write `now() + interval` to the compare register. Returns the full
    /// 64-bit target; only its low word reaches the hardware.
    ///
    /// A zero `interval` is treated as one tick. If the counter is already
    /// at or past the target once written, the interrupt is forced instead.
    pub fn arm(&mut self, interval: MicrosDurationU32) -> Instant {
        let now = self.clock.now();
        let target = Instant::from_ticks(now.ticks() + u64::from(interval.ticks().max(1)));
        self.write_target(target);
        target
    }

    /// Arm for an absolute `timestamp`.
    ///
    /// A timestamp at or before `now()` is bumped to one tick from now, and
    /// forced like any target the counter reaches before the write lands.
    pub fn arm_at(&mut self, timestamp: Instant) -> Result<Instant, ScheduleAlarmError> {
        let now = self.clock.now();
        let duration = timestamp.ticks().saturating_sub(now.ticks());
        if duration > u32::MAX.into() {
            return Err(ScheduleAlarmError::AlarmTooLate);
        }
        let target = Instant::from_ticks(now.ticks() + duration.max(1));
        self.write_target(target);
        Ok(target)
    }

    fn write_target(&mut self, target: Instant) {
        let timer = self.clock.timer();
        // This lock is for time-criticality
        critical_section::with(|_| {
            timer.write_alarm(self.alarm, (target.ticks() & 0xFFFF_FFFF) as u32);
            // If it is not armed, it has already matched.
            if self.clock.now().ticks() >= target.ticks() && timer.is_armed(self.alarm) {
                timer.disarm(self.alarm);
                timer.force_interrupt(self.alarm);
            }
        });
        self.target = Some(target);
    }

    /// Start firing: bind `handler` to the alarm's vector (replacing any
    /// previous handler), enable the vector, arm the first alarm, then
    /// enable the alarm interrupt.
    ///
    /// `handler` will typically call [`service`](Self::service) on this
    /// scheduler, so install the scheduler where the handler can reach it
    /// before calling this.
    pub fn on_fire<I: InterruptController>(&mut self, mut controller: I, handler: extern "C" fn()) {
        let irq = self.clock.timer().interrupt(self.alarm);
        controller.bind_exclusive(irq, handler);
        controller.enable(irq);
        // Drop status left over from an earlier run
        self.clock.timer().clear_forced_interrupt(self.alarm);
        self.clock.timer().clear_interrupt(self.alarm);
        let _target = self.arm(self.interval);
        self.clock.timer().enable_interrupt(self.alarm);
        #[cfg(feature = "defmt")]
        defmt::debug!(
            "alarm {} firing every {} us, first at {}",
            self.alarm,
            self.interval.ticks(),
            _target.ticks()
        );
    }

    /// Schedule the next fire per the rearm mode.
    pub fn rearm(&mut self) -> Instant {
        match (self.rearm, self.target) {
            (Rearm::Absolute, Some(previous)) => {
                let next = Instant::from_ticks(previous.ticks() + u64::from(self.interval.ticks()));
                if next > self.clock.now() {
                    self.write_target(next);
                    next
                } else {
                    self.arm(self.interval)
                }
            }
            _ => self.arm(self.interval),
        }
    }

    /// Handler body: rearm, clear the pending bit, then run `tick`.
    ///
    /// A force left by the previous rearm is withdrawn before rearming; it
    /// holds no hardware event, and the new rearm may force again.
    pub fn service<R>(&mut self, tick: impl FnOnce() -> R) -> R {
        self.clock.timer().clear_forced_interrupt(self.alarm);
        let _next = self.rearm();
        self.clock.timer().clear_interrupt(self.alarm);
        #[cfg(feature = "defmt")]
        defmt::trace!("alarm {} serviced, next at {}", self.alarm, _next.ticks());
        tick()
    }

    /// Stop raising interrupts: disarm the alarm, then disable it and drop
    /// its pending and forced bits.
    pub fn stop(&mut self) {
        let timer = self.clock.timer();
        timer.disarm(self.alarm);
        timer.disable_interrupt(self.alarm);
        timer.clear_forced_interrupt(self.alarm);
        timer.clear_interrupt(self.alarm);
        self.target = None;
    }

    /// The clock this scheduler reads.
    pub fn clock(&self) -> &MonotonicClock<T> {
        &self.clock
    }

    /// The alarm this scheduler owns.
    pub fn alarm(&self) -> AlarmId {
        self.alarm
    }

    /// Rearm interval.
    pub fn interval(&self) -> MicrosDurationU32 {
        self.interval
    }

    /// Change the rearm interval. Takes effect at the next rearm.
    pub fn set_interval(&mut self, interval: MicrosDurationU32) {
        self.interval = interval;
    }

    /// The last target written, if any.
    pub fn target(&self) -> Option<Instant> {
        self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{exclusive::Exclusive, sim::SimInterruptController, sim::SimTimer};
    use fugit::ExtU32;

    type SimScheduler = AlarmScheduler<&'static SimTimer>;

    #[test]
    fn arm_writes_low_word_of_target() {
        let timer = SimTimer::new();
        timer.set_counter(1000);
        let mut scheduler = AlarmScheduler::new(&timer, AlarmId::Alarm0, 100.micros());
        assert_eq!(scheduler.arm(100.micros()).ticks(), 1100);
        assert_eq!(timer.alarm_target(AlarmId::Alarm0), 1100);
        assert!(timer.is_armed(AlarmId::Alarm0));

        timer.set_counter(0x1_FFFF_FFF0);
        assert_eq!(scheduler.arm(0x20.micros()).ticks(), 0x2_0000_0010);
        assert_eq!(timer.alarm_target(AlarmId::Alarm0), 0x10);
    }

    #[test]
    fn arm_at_rejects_targets_beyond_the_compare_window() {
        let timer = SimTimer::new();
        timer.set_counter(10);
        let mut scheduler = AlarmScheduler::new(&timer, AlarmId::Alarm1, 1.millis());
        assert_eq!(
            scheduler.arm_at(Instant::from_ticks(10 + (1 << 32))),
            Err(ScheduleAlarmError::AlarmTooLate)
        );
        assert_eq!(
            scheduler.arm_at(Instant::from_ticks(5)),
            Ok(Instant::from_ticks(11))
        );
        assert_eq!(
            scheduler.arm_at(Instant::from_ticks(500)),
            Ok(Instant::from_ticks(500))
        );
    }

    #[test]
    fn target_passed_during_the_write_fires_at_once() {
        let timer = SimTimer::new();
        timer.set_counter(1000);
        // Two ticks pass on every counter read.
        timer.set_step_per_read(2);
        timer.enable_interrupt(AlarmId::Alarm0);
        let mut scheduler = AlarmScheduler::new(&timer, AlarmId::Alarm0, 100.micros());

        assert_eq!(
            scheduler.arm_at(Instant::from_ticks(5)),
            Ok(Instant::from_ticks(1001))
        );
        assert!(!timer.is_armed(AlarmId::Alarm0));
        assert!(timer.is_forced(AlarmId::Alarm0));
        assert!(timer.interrupt_pending(AlarmId::Alarm0));

        timer.clear_forced_interrupt(AlarmId::Alarm0);
        scheduler.arm(0.micros());
        assert!(timer.interrupt_pending(AlarmId::Alarm0));

        timer.clear_forced_interrupt(AlarmId::Alarm0);
        scheduler.arm(100.micros());
        assert!(timer.is_armed(AlarmId::Alarm0));
        assert!(!timer.is_forced(AlarmId::Alarm0));
        timer.advance(10_000_000);
        assert!(timer.interrupt_pending(AlarmId::Alarm0));
    }

    static TIGHT_TIMER: SimTimer = SimTimer::new();
    static TIGHT_IRQ: SimInterruptController = SimInterruptController::new();
    static TIGHT: Exclusive<(SimScheduler, u32)> = Exclusive::new();

    extern "C" fn tight_handler() {
        TIGHT.with(|(scheduler, fires)| scheduler.service(|| *fires += 1));
    }

    #[test]
    fn one_tick_interval_never_starves() {
        TIGHT_TIMER.set_counter(1000);
        TIGHT_TIMER.set_step_per_read(2);
        TIGHT.install((
            AlarmScheduler::new(&TIGHT_TIMER, AlarmId::Alarm0, 1.micros()),
            0,
        ));
        TIGHT.with(|(s, _)| s.on_fire(&TIGHT_IRQ, tight_handler));
        assert_eq!(TIGHT_IRQ.run_for(&TIGHT_TIMER, 10), 10);
        assert_eq!(TIGHT.with(|(_, fires)| *fires), Some(10));
    }

    static RESTART_TIMER: SimTimer = SimTimer::new();
    static RESTART_IRQ: SimInterruptController = SimInterruptController::new();
    static RESTART: Exclusive<SimScheduler> = Exclusive::new();

    extern "C" fn restart_handler() {
        RESTART.with(|scheduler| scheduler.service(|| ()));
    }

    #[test]
    fn stop_then_restart_waits_for_the_new_target() {
        RESTART_TIMER.set_counter(1000);
        RESTART.install(AlarmScheduler::new(
            &RESTART_TIMER,
            AlarmId::Alarm1,
            100.micros(),
        ));
        RESTART.with(|s| s.on_fire(&RESTART_IRQ, restart_handler));
        RESTART.with(|s| s.stop());
        assert!(!RESTART_TIMER.is_armed(AlarmId::Alarm1));

        // The old target at 1100 goes by without latching anything.
        RESTART_TIMER.advance(200);
        assert!(!RESTART_TIMER.raw_interrupt(AlarmId::Alarm1));

        RESTART.with(|s| s.on_fire(&RESTART_IRQ, restart_handler));
        assert_eq!(RESTART_IRQ.dispatch(&RESTART_TIMER), 0);
        assert_eq!(RESTART_TIMER.advance_to_next_alarm(), Some(100));
        assert_eq!(RESTART_IRQ.dispatch(&RESTART_TIMER), 1);
    }

    static START_TIMER: SimTimer = SimTimer::new();
    static START_IRQ: SimInterruptController = SimInterruptController::new();

    extern "C" fn start_handler() {}

    #[test]
    fn on_fire_binds_enables_and_arms() {
        START_TIMER.set_counter(1000);
        let mut scheduler = AlarmScheduler::new(&START_TIMER, AlarmId::Alarm2, 250.millis());
        let irq = START_TIMER.interrupt(AlarmId::Alarm2);
        scheduler.on_fire(&START_IRQ, start_handler);
        assert_eq!(
            START_IRQ.handler(irq).map(|h| h as usize),
            Some(start_handler as usize)
        );
        assert!(START_IRQ.is_enabled(irq));
        assert_eq!(START_TIMER.alarm_target(AlarmId::Alarm2), 251_000);
        assert!(START_TIMER.is_interrupt_enabled(AlarmId::Alarm2));

        scheduler.stop();
        assert!(!START_TIMER.is_interrupt_enabled(AlarmId::Alarm2));
    }

    static DRIFT_TIMER: SimTimer = SimTimer::new();
    static DRIFT_IRQ: SimInterruptController = SimInterruptController::new();
    static DRIFT: Exclusive<SimScheduler> = Exclusive::new();

    extern "C" fn drift_handler() {
        DRIFT.with(|scheduler| scheduler.service(|| ()));
    }

    #[test]
    fn relative_rearm_accumulates_latency() {
        DRIFT_TIMER.set_counter(1000);
        DRIFT.install(AlarmScheduler::new(
            &DRIFT_TIMER,
            AlarmId::Alarm0,
            100.micros(),
        ));
        DRIFT.with(|s| s.on_fire(&DRIFT_IRQ, drift_handler));
        assert_eq!(DRIFT_TIMER.alarm_target(AlarmId::Alarm0), 1100);

        assert_eq!(DRIFT_TIMER.advance_to_next_alarm(), Some(100));
        // Handler runs 7 ticks late.
        DRIFT_TIMER.advance(7);
        assert_eq!(DRIFT_IRQ.dispatch(&DRIFT_TIMER), 1);
        assert_eq!(DRIFT_TIMER.alarm_target(AlarmId::Alarm0), 1207);
        assert!(!DRIFT_TIMER.raw_interrupt(AlarmId::Alarm0));

        // Rearm was written before the pending bit was cleared.
        let (armed_at, cleared_at) = DRIFT_TIMER.last_writes(AlarmId::Alarm0);
        assert!(armed_at.unwrap() < cleared_at.unwrap());
    }

    static ABS_TIMER: SimTimer = SimTimer::new();
    static ABS_IRQ: SimInterruptController = SimInterruptController::new();
    static ABS: Exclusive<SimScheduler> = Exclusive::new();

    extern "C" fn abs_handler() {
        ABS.with(|scheduler| scheduler.service(|| ()));
    }

    #[test]
    fn absolute_rearm_holds_the_grid() {
        ABS_TIMER.set_counter(1000);
        ABS.install(AlarmScheduler::with_rearm(
            &ABS_TIMER,
            AlarmId::Alarm3,
            100.micros(),
            Rearm::Absolute,
        ));
        ABS.with(|s| s.on_fire(&ABS_IRQ, abs_handler));
        ABS_TIMER.advance_to_next_alarm();
        ABS_TIMER.advance(7);
        assert_eq!(ABS_IRQ.dispatch(&ABS_TIMER), 1);
        assert_eq!(ABS_TIMER.alarm_target(AlarmId::Alarm3), 1200);

        // A handler more than a whole interval late falls back to now-based.
        ABS_TIMER.advance_to_next_alarm();
        ABS_TIMER.advance(150);
        assert_eq!(ABS_IRQ.dispatch(&ABS_TIMER), 1);
        assert_eq!(ABS_TIMER.alarm_target(AlarmId::Alarm3), 1450);
    }

    static RUN_TIMER: SimTimer = SimTimer::new();
    static RUN_IRQ: SimInterruptController = SimInterruptController::new();
    static RUN: Exclusive<(SimScheduler, u32)> = Exclusive::new();

    extern "C" fn run_handler() {
        RUN.with(|(scheduler, fires)| {
            scheduler.service(|| *fires += 1);
            let target = scheduler.target().unwrap();
            assert!(target > scheduler.clock().now());
        });
    }

    #[test]
    fn periodic_fires_with_targets_in_the_future() {
        RUN_TIMER.set_counter(0xFFFF_F000);
        RUN_TIMER.set_step_per_read(3);
        RUN.install((
            AlarmScheduler::new(&RUN_TIMER, AlarmId::Alarm1, 100.micros()),
            0,
        ));
        RUN.with(|(s, _)| s.on_fire(&RUN_IRQ, run_handler));
        // Crosses the low-word wrap.
        let taken = RUN_IRQ.run_for(&RUN_TIMER, 10_000);
        assert!(taken > 50);
        assert_eq!(RUN.with(|(_, fires)| *fires), Some(taken));
        assert!(RUN_TIMER.counter() > 0x1_0000_0000);
    }
}
