//! Register Surface
//!
//! The narrow, side-effecting boundary between the state machines in this
//! crate and the silicon. Each trait names the registers of one group and
//! nothing more: every method is a single volatile read or write with no
//! status result.
//!
//! [`crate::hw`] implements these traits for the RP2350 and
//! [`crate::sim`] implements them in software.

use crate::pac::Interrupt;

/// `FUNCSEL` value of an `IO_BANK0` `GPIOn_CTRL` register.
///
/// Only the two values this crate writes are named; the other functions
/// (SPI, UART, PIO, ...) are selected by peripheral drivers we do not own.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FunctionSelect {
    /// The pin is driven by the SIO block, i.e. plain software I/O.
    Sio = 5,
    /// The pin is disconnected from every peripheral.
    Null = 0x1f,
}

impl From<FunctionSelect> for u32 {
    fn from(f: FunctionSelect) -> u32 {
        f as u32
    }
}

/// Pad isolation latch (`ISO`, bit 8 of a `PADS_BANK0` `GPIOn` register).
///
/// Pads come out of reset isolated on the RP2350; output-enable and
/// output-level have no effect until this bit is cleared.
pub const PAD_ISOLATION: u32 = 1 << 8;

/// One of the four alarm compare registers of a timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmId {
    #[allow(missing_docs)]
    Alarm0 = 0,
    #[allow(missing_docs)]
    Alarm1 = 1,
    #[allow(missing_docs)]
    Alarm2 = 2,
    #[allow(missing_docs)]
    Alarm3 = 3,
}

impl AlarmId {
    /// Index of the alarm within its timer.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Bit owned by this alarm in the `ARMED`, `INTR`, `INTE` and `INTS`
    /// registers.
    pub const fn mask(self) -> u32 {
        1 << self as u32
    }
}

/// GPIO register group: SIO output control, `IO_BANK0` function select and
/// `PADS_BANK0` pad control for bank 0.
///
/// Every method takes the bit mask (or pin number) it acts on. Methods
/// that use set/clear registers only touch the `1` bits of `mask`.
pub trait GpioRegisters {
    /// Write `mask` to `GPIO_OE_SET`.
    fn output_enable_set(&self, mask: u32);
    /// Write `mask` to `GPIO_OE_CLR`.
    fn output_enable_clear(&self, mask: u32);
    /// Write `mask` to `GPIO_OUT_SET`.
    fn output_set(&self, mask: u32);
    /// Write `mask` to `GPIO_OUT_CLR`.
    fn output_clear(&self, mask: u32);
    /// Write `mask` to `GPIO_OUT_XOR`.
    fn output_toggle(&self, mask: u32);
    /// Read back `GPIO_OUT`.
    fn output_level(&self) -> u32;
    /// Overwrite `GPIOn_CTRL` of `pin` with `funcsel` in the `FUNCSEL` field
    /// and zero in every override field.
    fn select_function(&self, pin: u8, funcsel: FunctionSelect);
    /// Clear `bits` in the `PADS_BANK0` register of `pin`.
    fn pad_clear(&self, pin: u8, bits: u32);
}

/// Timer register group: the 64-bit counter, the alarm compare registers
/// and the alarm interrupt bits.
pub trait TimerRegisters {
    /// Read `TIMELR`, the low word of the counter.
    fn time_low(&self) -> u32;
    /// Read `TIMEHR`, the high word of the counter.
    fn time_high(&self) -> u32;
    /// Write `target` to the compare register of `alarm`, arming it.
    fn write_alarm(&self, alarm: AlarmId, target: u32);
    /// Read the bit of `alarm` in `ARMED`: set from the compare write until
    /// the alarm matches or is disarmed.
    fn is_armed(&self, alarm: AlarmId) -> bool;
    /// Write-1-clear the bit of `alarm` in `ARMED`.
    fn disarm(&self, alarm: AlarmId);
    /// Set the bit of `alarm` in `INTE`.
    fn enable_interrupt(&self, alarm: AlarmId);
    /// Clear the bit of `alarm` in `INTE`.
    fn disable_interrupt(&self, alarm: AlarmId);
    /// Set the bit of `alarm` in `INTF`, raising the interrupt from software.
    fn force_interrupt(&self, alarm: AlarmId);
    /// Clear the bit of `alarm` in `INTF`.
    fn clear_forced_interrupt(&self, alarm: AlarmId);
    /// Write-1-clear the bit of `alarm` in `INTR`. Leaves `INTF` alone.
    fn clear_interrupt(&self, alarm: AlarmId);
    /// Read the bit of `alarm` in `INTS`: (`INTR` | `INTF`) & `INTE`.
    fn interrupt_pending(&self, alarm: AlarmId) -> bool;
    /// Vector raised by `alarm` of this timer.
    fn interrupt(&self, alarm: AlarmId) -> Interrupt;
}

/// Interrupt controller: the only two operations the scheduler consumes.
pub trait InterruptController {
    /// Make `handler` the only handler of `irq`, silently replacing any
    /// previous one.
    fn bind_exclusive(&mut self, irq: Interrupt, handler: extern "C" fn());
    /// Let `irq` reach the core.
    fn enable(&mut self, irq: Interrupt);
}

impl<T: GpioRegisters + ?Sized> GpioRegisters for &T {
    fn output_enable_set(&self, mask: u32) {
        (**self).output_enable_set(mask)
    }
    fn output_enable_clear(&self, mask: u32) {
        (**self).output_enable_clear(mask)
    }
    fn output_set(&self, mask: u32) {
        (**self).output_set(mask)
    }
    fn output_clear(&self, mask: u32) {
        (**self).output_clear(mask)
    }
    fn output_toggle(&self, mask: u32) {
        (**self).output_toggle(mask)
    }
    fn output_level(&self) -> u32 {
        (**self).output_level()
    }
    fn select_function(&self, pin: u8, funcsel: FunctionSelect) {
        (**self).select_function(pin, funcsel)
    }
    fn pad_clear(&self, pin: u8, bits: u32) {
        (**self).pad_clear(pin, bits)
    }
}

impl<T: TimerRegisters + ?Sized> TimerRegisters for &T {
    fn time_low(&self) -> u32 {
        (**self).time_low()
    }
    fn time_high(&self) -> u32 {
        (**self).time_high()
    }
    fn write_alarm(&self, alarm: AlarmId, target: u32) {
        (**self).write_alarm(alarm, target)
    }
    fn is_armed(&self, alarm: AlarmId) -> bool {
        (**self).is_armed(alarm)
    }
    fn disarm(&self, alarm: AlarmId) {
        (**self).disarm(alarm)
    }
    fn enable_interrupt(&self, alarm: AlarmId) {
        (**self).enable_interrupt(alarm)
    }
    fn disable_interrupt(&self, alarm: AlarmId) {
        (**self).disable_interrupt(alarm)
    }
    fn force_interrupt(&self, alarm: AlarmId) {
        (**self).force_interrupt(alarm)
    }
    fn clear_forced_interrupt(&self, alarm: AlarmId) {
        (**self).clear_forced_interrupt(alarm)
    }
    fn clear_interrupt(&self, alarm: AlarmId) {
        (**self).clear_interrupt(alarm)
    }
    fn interrupt_pending(&self, alarm: AlarmId) -> bool {
        (**self).interrupt_pending(alarm)
    }
    fn interrupt(&self, alarm: AlarmId) -> Interrupt {
        (**self).interrupt(alarm)
    }
}

impl<I: InterruptController + ?Sized> InterruptController for &mut I {
    fn bind_exclusive(&mut self, irq: Interrupt, handler: extern "C" fn()) {
        (**self).bind_exclusive(irq, handler)
    }
    fn enable(&mut self, irq: Interrupt) {
        (**self).enable(irq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alarm_masks() {
        assert_eq!(AlarmId::Alarm0.mask(), 0b0001);
        assert_eq!(AlarmId::Alarm3.mask(), 0b1000);
        assert_eq!(AlarmId::Alarm2.index(), 2);
    }

    #[test]
    fn sio_funcsel_is_five() {
        assert_eq!(u32::from(FunctionSelect::Sio), 5);
        assert_eq!(u32::from(FunctionSelect::Null), 0x1f);
    }
}
