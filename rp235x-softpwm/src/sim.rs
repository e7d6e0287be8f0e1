//! Simulated Register Surface
//!
//! Software models of the timer, GPIO bank and interrupt controller, for
//! running the clock, scheduler and PWM engine off-target. State lives in
//! `critical_section::Mutex<Cell<_>>`, so the models can sit in `static`s
//! and be shared with a bound handler exactly like the real peripherals.
//!
//! The timer only moves when told to: through [`SimTimer::advance`], or by
//! a configurable step on every low-word read so that busy-wait loops end.

use core::{cell::Cell, marker::PhantomData};

use critical_section::Mutex;

use crate::{
    hw::{Timer0Device, Timer1Device, TimerDevice},
    pac::Interrupt,
    regs::{
        AlarmId, FunctionSelect, GpioRegisters, InterruptController, TimerRegisters, PAD_ISOLATION,
    },
};

const ALARMS: [AlarmId; 4] = [
    AlarmId::Alarm0,
    AlarmId::Alarm1,
    AlarmId::Alarm2,
    AlarmId::Alarm3,
];

#[derive(Clone, Copy)]
struct TimerState {
    counter: u64,
    latched_high: u32,
    latch_high: bool,
    step_per_read: u64,
    alarm: [u32; 4],
    armed: u32,
    intr: u32,
    intf: u32,
    inte: u32,
    writes: u32,
    alarm_written_at: [Option<u32>; 4],
    cleared_at: [Option<u32>; 4],
}

impl TimerState {
    const fn new() -> Self {
        Self {
            counter: 0,
            latched_high: 0,
            latch_high: true,
            step_per_read: 0,
            alarm: [0; 4],
            armed: 0,
            intr: 0,
            intf: 0,
            inte: 0,
            writes: 0,
            alarm_written_at: [None; 4],
            cleared_at: [None; 4],
        }
    }

    fn advance(&mut self, ticks: u64) {
        let low = self.counter as u32;
        for alarm in ALARMS {
            let mask = alarm.mask();
            if self.armed & mask == 0 {
                continue;
            }
            let distance = u64::from(self.alarm[alarm.index()].wrapping_sub(low));
            if distance <= ticks {
                self.armed &= !mask;
                self.intr |= mask;
            }
        }
        self.counter = self.counter.wrapping_add(ticks);
    }

    fn next_write(&mut self) -> u32 {
        self.writes += 1;
        self.writes
    }
}

/// A simulated system timer, TIMER0 unless `D` says otherwise.
///
/// Alarms compare against the low 32 bits of the counter, one-shot: a
/// fired alarm latches its `INTR` bit and disarms until written again.
/// The device only decides which interrupt vectors the alarms raise.
pub struct SimTimer<D = Timer0Device> {
    state: Mutex<Cell<TimerState>>,
    _device: PhantomData<D>,
}

impl Default for SimTimer<Timer0Device> {
    fn default() -> Self {
        Self::new()
    }
}

impl SimTimer<Timer0Device> {
    /// A TIMER0 at tick zero with no alarm armed.
    pub const fn new() -> Self {
        Self::at_reset()
    }
}

impl SimTimer<Timer1Device> {
    /// A TIMER1 at tick zero with no alarm armed.
    pub const fn new_timer1() -> Self {
        Self::at_reset()
    }
}

impl<D: TimerDevice> SimTimer<D> {
    const fn at_reset() -> Self {
        Self {
            state: Mutex::new(Cell::new(TimerState::new())),
            _device: PhantomData,
        }
    }

    fn update<R>(&self, f: impl FnOnce(&mut TimerState) -> R) -> R {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();
            let result = f(&mut state);
            cell.set(state);
            result
        })
    }

    /// Current 64-bit counter value.
    pub fn counter(&self) -> u64 {
        self.update(|s| s.counter)
    }

    /// Jump the counter to `value` without firing alarms on the way.
    pub fn set_counter(&self, value: u64) {
        self.update(|s| s.counter = value)
    }

    /// Let `ticks` ticks pass, firing every armed alarm whose target is
    /// reached on the way.
    pub fn advance(&self, ticks: u64) {
        self.update(|s| s.advance(ticks))
    }

    /// Advance to the closest armed alarm target. Returns the number of
    /// ticks that passed, or `None` if no alarm is armed.
    pub fn advance_to_next_alarm(&self) -> Option<u64> {
        self.update(|s| {
            let low = s.counter as u32;
            let distance = ALARMS
                .iter()
                .filter(|a| s.armed & a.mask() != 0)
                .map(|a| u64::from(s.alarm[a.index()].wrapping_sub(low)))
                .min()?;
            s.advance(distance);
            Some(distance)
        })
    }

    /// Ticks that pass on every `TIMELR` read. Zero (the default) freezes
    /// the counter between explicit [`advance`](Self::advance) calls.
    pub fn set_step_per_read(&self, ticks: u64) {
        self.update(|s| s.step_per_read = ticks)
    }

    /// Whether a `TIMELR` read latches the high word for the following
    /// `TIMEHR` read, as on the RP2350. Defaults to `true`.
    pub fn set_high_word_latched(&self, latched: bool) {
        self.update(|s| s.latch_high = latched)
    }

    /// Last value written to the compare register of `alarm`.
    pub fn alarm_target(&self, alarm: AlarmId) -> u32 {
        self.update(|s| s.alarm[alarm.index()])
    }

    /// Raw (unmasked) `INTR` status of `alarm`: set by a match only.
    pub fn raw_interrupt(&self, alarm: AlarmId) -> bool {
        self.update(|s| s.intr & alarm.mask() != 0)
    }

    /// Whether the `INTF` bit of `alarm` is set.
    pub fn is_forced(&self, alarm: AlarmId) -> bool {
        self.update(|s| s.intf & alarm.mask() != 0)
    }

    /// Whether the `INTE` bit of `alarm` is set.
    pub fn is_interrupt_enabled(&self, alarm: AlarmId) -> bool {
        self.update(|s| s.inte & alarm.mask() != 0)
    }

    /// Sequence numbers of the last compare write and the last `INTR` clear
    /// of `alarm`. Numbers grow with every register write to this timer.
    pub fn last_writes(&self, alarm: AlarmId) -> (Option<u32>, Option<u32>) {
        self.update(|s| {
            (
                s.alarm_written_at[alarm.index()],
                s.cleared_at[alarm.index()],
            )
        })
    }
}

impl<D: TimerDevice> TimerRegisters for SimTimer<D> {
    fn time_low(&self) -> u32 {
        self.update(|s| {
            let low = s.counter as u32;
            s.latched_high = (s.counter >> 32) as u32;
            let step = s.step_per_read;
            s.advance(step);
            low
        })
    }

    fn time_high(&self) -> u32 {
        self.update(|s| {
            if s.latch_high {
                s.latched_high
            } else {
                (s.counter >> 32) as u32
            }
        })
    }

    fn write_alarm(&self, alarm: AlarmId, target: u32) {
        self.update(|s| {
            let seq = s.next_write();
            s.alarm[alarm.index()] = target;
            s.armed |= alarm.mask();
            s.alarm_written_at[alarm.index()] = Some(seq);
        })
    }

    fn is_armed(&self, alarm: AlarmId) -> bool {
        self.update(|s| s.armed & alarm.mask() != 0)
    }

    fn disarm(&self, alarm: AlarmId) {
        self.update(|s| {
            s.next_write();
            s.armed &= !alarm.mask();
        })
    }

    fn enable_interrupt(&self, alarm: AlarmId) {
        self.update(|s| {
            s.next_write();
            s.inte |= alarm.mask();
        })
    }

    fn force_interrupt(&self, alarm: AlarmId) {
        self.update(|s| {
            s.next_write();
            s.intf |= alarm.mask();
        })
    }

    fn clear_forced_interrupt(&self, alarm: AlarmId) {
        self.update(|s| {
            s.next_write();
            s.intf &= !alarm.mask();
        })
    }

    fn disable_interrupt(&self, alarm: AlarmId) {
        self.update(|s| {
            s.next_write();
            s.inte &= !alarm.mask();
        })
    }

    fn clear_interrupt(&self, alarm: AlarmId) {
        self.update(|s| {
            let seq = s.next_write();
            s.intr &= !alarm.mask();
            s.cleared_at[alarm.index()] = Some(seq);
        })
    }

    fn interrupt_pending(&self, alarm: AlarmId) -> bool {
        self.update(|s| (s.intr | s.intf) & s.inte & alarm.mask() != 0)
    }

    fn interrupt(&self, alarm: AlarmId) -> Interrupt {
        D::IRQS[alarm.index()]
    }
}

/// Number of bank 0 GPIOs on the RP2350A.
pub const BANK0_PINS: usize = 30;

#[derive(Clone, Copy)]
struct GpioState {
    oe: u32,
    out: u32,
    funcsel: [u8; BANK0_PINS],
    pad: [u32; BANK0_PINS],
    level_writes: u32,
}

/// A simulated GPIO bank 0 as it comes out of reset: outputs disabled and
/// low, every pin on the null function with its pad isolated.
pub struct SimGpio {
    state: Mutex<Cell<GpioState>>,
}

impl Default for SimGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl SimGpio {
    /// Bank 0 in its reset state.
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(GpioState {
                oe: 0,
                out: 0,
                funcsel: [FunctionSelect::Null as u8; BANK0_PINS],
                pad: [PAD_ISOLATION; BANK0_PINS],
                level_writes: 0,
            })),
        }
    }

    fn update<R>(&self, f: impl FnOnce(&mut GpioState) -> R) -> R {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();
            let result = f(&mut state);
            cell.set(state);
            result
        })
    }

    /// Whether the `GPIO_OE` bit of `pin` is set.
    pub fn output_enabled(&self, pin: u8) -> bool {
        self.update(|s| s.oe & (1 << pin) != 0)
    }

    /// Whether the `GPIO_OUT` bit of `pin` is set.
    pub fn output_high(&self, pin: u8) -> bool {
        self.update(|s| s.out & (1 << pin) != 0)
    }

    /// Raw `FUNCSEL` value of `pin`.
    pub fn function(&self, pin: u8) -> u8 {
        self.update(|s| s.funcsel[usize::from(pin)])
    }

    /// Raw `PADS_BANK0` value of `pin`.
    pub fn pad(&self, pin: u8) -> u32 {
        self.update(|s| s.pad[usize::from(pin)])
    }

    /// Whether the physical pad is driven high: SIO function, pad not
    /// isolated, output enabled and output bit set.
    pub fn driven_high(&self, pin: u8) -> bool {
        self.update(|s| {
            let i = usize::from(pin);
            s.funcsel[i] == FunctionSelect::Sio as u8
                && s.pad[i] & PAD_ISOLATION == 0
                && s.oe & (1 << pin) != 0
                && s.out & (1 << pin) != 0
        })
    }

    /// Number of writes to `GPIO_OUT_SET`, `GPIO_OUT_CLR` and `GPIO_OUT_XOR`.
    pub fn level_writes(&self) -> u32 {
        self.update(|s| s.level_writes)
    }
}

impl GpioRegisters for SimGpio {
    fn output_enable_set(&self, mask: u32) {
        self.update(|s| s.oe |= mask)
    }

    fn output_enable_clear(&self, mask: u32) {
        self.update(|s| s.oe &= !mask)
    }

    fn output_set(&self, mask: u32) {
        self.update(|s| {
            s.out |= mask;
            s.level_writes += 1;
        })
    }

    fn output_clear(&self, mask: u32) {
        self.update(|s| {
            s.out &= !mask;
            s.level_writes += 1;
        })
    }

    fn output_toggle(&self, mask: u32) {
        self.update(|s| {
            s.out ^= mask;
            s.level_writes += 1;
        })
    }

    fn output_level(&self) -> u32 {
        self.update(|s| s.out)
    }

    fn select_function(&self, pin: u8, funcsel: FunctionSelect) {
        self.update(|s| s.funcsel[usize::from(pin)] = funcsel as u8)
    }

    fn pad_clear(&self, pin: u8, bits: u32) {
        self.update(|s| s.pad[usize::from(pin)] &= !bits)
    }
}

/// Number of external interrupt inputs modelled.
const IRQ_COUNT: usize = 52;

#[derive(Clone, Copy)]
struct IrqState {
    handlers: [Option<extern "C" fn()>; IRQ_COUNT],
    enabled: u64,
}

/// A simulated interrupt controller: a handler table plus enable bits.
///
/// [`dispatch`](Self::dispatch) plays the role of the core taking an
/// interrupt: it runs the bound handler of every enabled vector whose alarm
/// is pending, one at a time and to completion.
pub struct SimInterruptController {
    state: Mutex<Cell<IrqState>>,
}

impl Default for SimInterruptController {
    fn default() -> Self {
        Self::new()
    }
}

impl SimInterruptController {
    /// No handlers bound, every vector disabled.
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(IrqState {
                handlers: [None; IRQ_COUNT],
                enabled: 0,
            })),
        }
    }

    fn update<R>(&self, f: impl FnOnce(&mut IrqState) -> R) -> R {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();
            let result = f(&mut state);
            cell.set(state);
            result
        })
    }

    /// Whether `irq` is enabled.
    pub fn is_enabled(&self, irq: Interrupt) -> bool {
        self.update(|s| s.enabled & (1u64 << irq as u16) != 0)
    }

    /// Handler currently bound to `irq`.
    pub fn handler(&self, irq: Interrupt) -> Option<extern "C" fn()> {
        self.update(|s| s.handlers[irq as usize])
    }

    /// Run the handler of every enabled alarm vector of `timer` that is
    /// pending. Returns how many handlers ran.
    pub fn dispatch<T: TimerRegisters>(&self, timer: &T) -> u32 {
        let mut taken = 0;
        for alarm in ALARMS {
            if !timer.interrupt_pending(alarm) {
                continue;
            }
            let irq = timer.interrupt(alarm);
            if !self.is_enabled(irq) {
                continue;
            }
            if let Some(handler) = self.handler(irq) {
                handler();
                taken += 1;
            }
        }
        taken
    }

    /// Advance `timer` one tick at a time for `ticks` ticks, dispatching
    /// after each. Returns how many handlers ran.
    pub fn run_for<D: TimerDevice>(&self, timer: &SimTimer<D>, ticks: u64) -> u32 {
        let mut taken = 0;
        for _ in 0..ticks {
            timer.advance(1);
            taken += self.dispatch(timer);
        }
        taken
    }
}

impl InterruptController for &SimInterruptController {
    fn bind_exclusive(&mut self, irq: Interrupt, handler: extern "C" fn()) {
        self.update(|s| s.handlers[irq as usize] = Some(handler))
    }

    fn enable(&mut self, irq: Interrupt) {
        self.update(|s| s.enabled |= 1u64 << irq as u16)
    }
}

impl InterruptController for SimInterruptController {
    fn bind_exclusive(&mut self, irq: Interrupt, handler: extern "C" fn()) {
        InterruptController::bind_exclusive(&mut &*self, irq, handler)
    }

    fn enable(&mut self, irq: Interrupt) {
        InterruptController::enable(&mut &*self, irq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alarm_is_one_shot() {
        let timer = SimTimer::new();
        timer.enable_interrupt(AlarmId::Alarm0);
        timer.write_alarm(AlarmId::Alarm0, 10);
        timer.advance(9);
        assert!(!timer.interrupt_pending(AlarmId::Alarm0));
        timer.advance(1);
        assert!(timer.interrupt_pending(AlarmId::Alarm0));
        assert!(!timer.is_armed(AlarmId::Alarm0));
        timer.clear_interrupt(AlarmId::Alarm0);
        // Another full low-word lap does not fire it again.
        timer.advance(u64::from(u32::MAX));
        assert!(!timer.raw_interrupt(AlarmId::Alarm0));
    }

    #[test]
    fn status_is_masked_by_enable() {
        let timer = SimTimer::new();
        timer.write_alarm(AlarmId::Alarm1, 5);
        assert_eq!(timer.advance_to_next_alarm(), Some(5));
        assert!(timer.raw_interrupt(AlarmId::Alarm1));
        assert!(!timer.interrupt_pending(AlarmId::Alarm1));
        timer.enable_interrupt(AlarmId::Alarm1);
        assert!(timer.interrupt_pending(AlarmId::Alarm1));
        assert_eq!(timer.advance_to_next_alarm(), None);
    }

    #[test]
    fn alarm_matches_low_word_only() {
        let timer = SimTimer::new();
        timer.set_counter(0x3_FFFF_FFF0);
        timer.write_alarm(AlarmId::Alarm2, 0x0000_0010);
        assert_eq!(timer.advance_to_next_alarm(), Some(0x20));
        assert_eq!(timer.counter(), 0x4_0000_0010);
    }

    #[test]
    fn forced_interrupt_survives_intr_clear() {
        let timer = SimTimer::new();
        timer.force_interrupt(AlarmId::Alarm0);
        assert!(!timer.interrupt_pending(AlarmId::Alarm0));
        timer.enable_interrupt(AlarmId::Alarm0);
        assert!(timer.interrupt_pending(AlarmId::Alarm0));
        assert!(!timer.raw_interrupt(AlarmId::Alarm0));
        timer.clear_interrupt(AlarmId::Alarm0);
        assert!(timer.interrupt_pending(AlarmId::Alarm0));
        timer.clear_forced_interrupt(AlarmId::Alarm0);
        assert!(!timer.interrupt_pending(AlarmId::Alarm0));
    }

    #[test]
    fn disarmed_alarm_never_matches() {
        let timer = SimTimer::new();
        timer.write_alarm(AlarmId::Alarm1, 50);
        timer.disarm(AlarmId::Alarm1);
        assert_eq!(timer.advance_to_next_alarm(), None);
        timer.advance(100);
        assert!(!timer.raw_interrupt(AlarmId::Alarm1));
    }

    #[test]
    fn device_picks_the_vectors() {
        assert_eq!(
            SimTimer::new().interrupt(AlarmId::Alarm1),
            Interrupt::TIMER0_IRQ_1
        );
        assert_eq!(
            SimTimer::new_timer1().interrupt(AlarmId::Alarm3),
            Interrupt::TIMER1_IRQ_3
        );
    }

    #[test]
    fn gpio_comes_out_of_reset_isolated() {
        let gpio = SimGpio::new();
        gpio.output_enable_set(1 << 3);
        gpio.output_set(1 << 3);
        assert!(!gpio.driven_high(3));
        gpio.select_function(3, FunctionSelect::Sio);
        gpio.pad_clear(3, PAD_ISOLATION);
        assert!(gpio.driven_high(3));
        assert_eq!(gpio.level_writes(), 1);
    }
}
