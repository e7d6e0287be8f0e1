//! RP2350 implementation of the Register Surface
//!
//! Zero-sized handles that summon the PAC register blocks on every access.
//! Constructing one consumes the PAC singleton and brings the block out of
//! reset, so at most one handle per block exists.
//!
//! See [Section 12.8](https://rptl.io/rp2350-datasheet) (TIMER),
//! [Section 3.1](https://rptl.io/rp2350-datasheet) (SIO) and
//! [Section 9](https://rptl.io/rp2350-datasheet) (GPIO) of the datasheet.

use core::marker::PhantomData;

use crate::{
    atomic_register_access::{write_bitmask_clear, write_bitmask_set},
    pac::{self, Interrupt},
    regs::{AlarmId, FunctionSelect, GpioRegisters, TimerRegisters},
};

mod private {
    pub trait SubsystemReset {
        fn reset_bring_up(&self, resets: &mut crate::pac::RESETS);
        fn reset_bring_down(&self, resets: &mut crate::pac::RESETS);
    }

    pub trait Sealed {}
}

use private::{Sealed, SubsystemReset};

macro_rules! generate_reset {
    ($MODULE:ident, $module:ident) => {
        impl SubsystemReset for pac::$MODULE {
            fn reset_bring_up(&self, resets: &mut pac::RESETS) {
                resets.reset().modify(|_, w| w.$module().clear_bit());
                while resets.reset_done().read().$module().bit_is_clear() {}
            }
            fn reset_bring_down(&self, resets: &mut pac::RESETS) {
                resets.reset().modify(|_, w| w.$module().set_bit());
            }
        }
    };
}

generate_reset!(TIMER0, timer0);
generate_reset!(TIMER1, timer1);
generate_reset!(PADS_BANK0, pads_bank0);
generate_reset!(IO_BANK0, io_bank0);

/// Marker for TIMER0.
#[derive(Clone, Copy, Debug)]
pub struct Timer0Device;

/// Marker for TIMER1.
#[derive(Clone, Copy, Debug)]
pub struct Timer1Device;

/// Trait to handle both underlying devices (TIMER0 and TIMER1)
pub trait TimerDevice: Sealed + Clone + Copy + 'static {
    /// Index of the Timer.
    const ID: usize;

    /// Alarm vectors of this timer, indexed by [`AlarmId::index`].
    const IRQS: [Interrupt; 4];

    /// Get a timer registerblock, pointing at the appropriate timer
    fn get_perif() -> &'static pac::timer0::RegisterBlock {
        if Self::ID == 0 {
            unsafe { &*pac::TIMER0::ptr() }
        } else {
            unsafe { &*pac::TIMER1::ptr() }
        }
    }
}

impl TimerDevice for Timer0Device {
    const ID: usize = 0;
    const IRQS: [Interrupt; 4] = [
        Interrupt::TIMER0_IRQ_0,
        Interrupt::TIMER0_IRQ_1,
        Interrupt::TIMER0_IRQ_2,
        Interrupt::TIMER0_IRQ_3,
    ];
}
impl Sealed for Timer0Device {}

impl TimerDevice for Timer1Device {
    const ID: usize = 1;
    const IRQS: [Interrupt; 4] = [
        Interrupt::TIMER1_IRQ_0,
        Interrupt::TIMER1_IRQ_1,
        Interrupt::TIMER1_IRQ_2,
        Interrupt::TIMER1_IRQ_3,
    ];
}
impl Sealed for Timer1Device {}

/// Register handle for one of the two system timers.
//
// Like rp235x-hal's `Timer`, this does not store the PAC object: reads of
// the counter are side-effect free and each alarm bit is only touched by
// the scheduler that owns it, so the handle can be copied freely.
#[derive(Clone, Copy, Debug)]
pub struct Timer<D: TimerDevice> {
    _device: PhantomData<D>,
}

impl Timer<Timer0Device> {
    /// Take `TIMER0` and cycle it through reset.
    ///
    /// The tick generator must be configured for 1 MHz beforehand, otherwise
    /// durations handed to the scheduler will not be microseconds.
    pub fn new_timer0(timer: pac::TIMER0, resets: &mut pac::RESETS) -> Self {
        timer.reset_bring_down(resets);
        timer.reset_bring_up(resets);
        Self {
            _device: PhantomData,
        }
    }
}

impl Timer<Timer1Device> {
    /// Take `TIMER1` and cycle it through reset.
    ///
    /// The tick generator must be configured for 1 MHz beforehand, otherwise
    /// durations handed to the scheduler will not be microseconds.
    pub fn new_timer1(timer: pac::TIMER1, resets: &mut pac::RESETS) -> Self {
        timer.reset_bring_down(resets);
        timer.reset_bring_up(resets);
        Self {
            _device: PhantomData,
        }
    }
}

impl<D: TimerDevice> TimerRegisters for Timer<D> {
    fn time_low(&self) -> u32 {
        D::get_perif().timelr().read().bits()
    }

    fn time_high(&self) -> u32 {
        D::get_perif().timehr().read().bits()
    }

    fn write_alarm(&self, alarm: AlarmId, target: u32) {
        let timer = D::get_perif();
        // safety: every bit pattern is a valid alarm target, and only the
        // scheduler owning `alarm` writes its compare register
        match alarm {
            AlarmId::Alarm0 => timer.alarm0().write(|w| unsafe { w.bits(target) }),
            AlarmId::Alarm1 => timer.alarm1().write(|w| unsafe { w.bits(target) }),
            AlarmId::Alarm2 => timer.alarm2().write(|w| unsafe { w.bits(target) }),
            AlarmId::Alarm3 => timer.alarm3().write(|w| unsafe { w.bits(target) }),
        };
    }

    fn is_armed(&self, alarm: AlarmId) -> bool {
        D::get_perif().armed().read().bits() & alarm.mask() != 0
    }

    fn disarm(&self, alarm: AlarmId) {
        // safety: ARMED is write-1-clear, zero bits are left untouched
        unsafe {
            D::get_perif()
                .armed()
                .write_with_zero(|w| w.bits(alarm.mask()));
        }
    }

    fn enable_interrupt(&self, alarm: AlarmId) {
        // safety: the set alias only touches the bit of `alarm`
        unsafe {
            write_bitmask_set(D::get_perif().inte().as_ptr(), alarm.mask());
        }
    }

    fn disable_interrupt(&self, alarm: AlarmId) {
        // safety: the clear alias only touches the bit of `alarm`
        unsafe {
            write_bitmask_clear(D::get_perif().inte().as_ptr(), alarm.mask());
        }
    }

    fn force_interrupt(&self, alarm: AlarmId) {
        // safety: the set alias only touches the bit of `alarm`
        unsafe {
            write_bitmask_set(D::get_perif().intf().as_ptr(), alarm.mask());
        }
    }

    fn clear_forced_interrupt(&self, alarm: AlarmId) {
        // safety: the clear alias only touches the bit of `alarm`
        unsafe {
            write_bitmask_clear(D::get_perif().intf().as_ptr(), alarm.mask());
        }
    }

    fn clear_interrupt(&self, alarm: AlarmId) {
        // safety: INTR is write-1-clear, zero bits are left untouched
        unsafe {
            D::get_perif()
                .intr()
                .write_with_zero(|w| w.bits(alarm.mask()));
        }
    }

    fn interrupt_pending(&self, alarm: AlarmId) -> bool {
        D::get_perif().ints().read().bits() & alarm.mask() != 0
    }

    fn interrupt(&self, alarm: AlarmId) -> Interrupt {
        D::IRQS[alarm.index()]
    }
}

/// Register handle for GPIO bank 0: SIO outputs, `IO_BANK0` and
/// `PADS_BANK0`.
#[derive(Debug)]
pub struct Bank0 {
    _sio: pac::SIO,
    _io: pac::IO_BANK0,
    _pads: pac::PADS_BANK0,
}

impl Bank0 {
    /// Take the bank 0 register blocks and bring `IO_BANK0` and
    /// `PADS_BANK0` out of reset.
    pub fn new(
        sio: pac::SIO,
        io: pac::IO_BANK0,
        pads: pac::PADS_BANK0,
        resets: &mut pac::RESETS,
    ) -> Self {
        io.reset_bring_up(resets);
        pads.reset_bring_up(resets);
        Self {
            _sio: sio,
            _io: io,
            _pads: pads,
        }
    }

    fn sio() -> &'static pac::sio::RegisterBlock {
        unsafe { &*pac::SIO::ptr() }
    }
}

impl GpioRegisters for Bank0 {
    fn output_enable_set(&self, mask: u32) {
        Self::sio().gpio_oe_set().write(|w| unsafe { w.bits(mask) });
    }

    fn output_enable_clear(&self, mask: u32) {
        Self::sio().gpio_oe_clr().write(|w| unsafe { w.bits(mask) });
    }

    fn output_set(&self, mask: u32) {
        Self::sio().gpio_out_set().write(|w| unsafe { w.bits(mask) });
    }

    fn output_clear(&self, mask: u32) {
        Self::sio().gpio_out_clr().write(|w| unsafe { w.bits(mask) });
    }

    fn output_toggle(&self, mask: u32) {
        Self::sio().gpio_out_xor().write(|w| unsafe { w.bits(mask) });
    }

    fn output_level(&self) -> u32 {
        Self::sio().gpio_out().read().bits()
    }

    fn select_function(&self, pin: u8, funcsel: FunctionSelect) {
        let io = unsafe { &*pac::IO_BANK0::ptr() };
        // Whole-register write: FUNCSEL in the low bits, all overrides zero.
        io.gpio(usize::from(pin))
            .gpio_ctrl()
            .write(|w| unsafe { w.bits(u32::from(funcsel)) });
    }

    fn pad_clear(&self, pin: u8, bits: u32) {
        let pads = unsafe { &*pac::PADS_BANK0::ptr() };
        // safety: PADS_BANK0 provides atomic aliases
        unsafe {
            write_bitmask_clear(pads.gpio(usize::from(pin)).as_ptr(), bits);
        }
    }
}

/// NVIC together with a RAM vector table, so handlers can be bound at run
/// time.
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub struct Nvic {
    table: &'static mut crate::vector_table::VectorTable,
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
impl Nvic {
    /// Copy the active vector table into `table` and switch the core to it.
    pub fn new(
        table: &'static mut crate::vector_table::VectorTable,
        ppb: &mut pac::PPB,
    ) -> Self {
        table.init(ppb);
        // safety: `init` just filled every entry from the active table
        critical_section::with(|_| unsafe { table.activate(ppb) });
        Self { table }
    }
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
impl crate::regs::InterruptController for Nvic {
    fn bind_exclusive(&mut self, irq: Interrupt, handler: extern "C" fn()) {
        self.table.register_handler(irq as usize, handler);
    }

    fn enable(&mut self, irq: Interrupt) {
        // safety: critical sections on the RP2350 use PRIMASK plus a
        // spinlock, never NVIC masking, so unmasking cannot break one
        unsafe { cortex_m::peripheral::NVIC::unmask(irq) }
    }
}
