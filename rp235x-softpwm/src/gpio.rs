//! GPIO port
//!
//! Plain software-driven outputs on bank 0. A pin is usable as an output
//! only after it is routed to the SIO block and its pad isolation latch is
//! released; [`GpioPort::configure_as_output`] does both while keeping the
//! output disabled and low, so the pin never glitches high.
//!
//! ```no_run
//! use embedded_hal::digital::OutputPin as _;
//! use rp235x_softpwm::{gpio::GpioPort, hw::Bank0, pac, PinId};
//!
//! let mut p = pac::Peripherals::take().unwrap();
//! let bank0 = Bank0::new(p.SIO, p.IO_BANK0, p.PADS_BANK0, &mut p.RESETS);
//! let port = GpioPort::new(bank0);
//! let mut led = port.configure_as_output(PinId::new(10).unwrap());
//! led.set_high().unwrap();
//! ```

use core::convert::Infallible;

use crate::regs::{FunctionSelect, GpioRegisters, PAD_ISOLATION};

/// Highest bank 0 GPIO number on the RP2350A.
pub const MAX_PIN: u8 = 29;

/// Error returned when a GPIO number is outside bank 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidPinError(pub u8);

/// A bank 0 GPIO number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinId(u8);

impl PinId {
    /// `Some` if `num` is a bank 0 GPIO.
    pub const fn new(num: u8) -> Option<Self> {
        if num <= MAX_PIN {
            Some(Self(num))
        } else {
            None
        }
    }

    /// The GPIO number.
    pub const fn num(self) -> u8 {
        self.0
    }

    /// The bit of this pin in the SIO registers.
    pub const fn mask(self) -> u32 {
        1 << self.0
    }
}

impl TryFrom<u8> for PinId {
    type Error = InvalidPinError;

    fn try_from(num: u8) -> Result<Self, Self::Error> {
        Self::new(num).ok_or(InvalidPinError(num))
    }
}

/// Bank 0 GPIO register access with pin-level operations.
#[derive(Clone, Copy, Debug)]
pub struct GpioPort<G> {
    regs: G,
}

impl<G: GpioRegisters> GpioPort<G> {
    /// Wrap bank 0 registers.
    pub const fn new(regs: G) -> Self {
        Self { regs }
    }

    /// Release the registers.
    pub fn free(self) -> G {
        self.regs
    }

    /// Configure `pin` as a push-pull SIO output, starting low.
    ///
    /// The writes happen in this order: output-enable clear, output clear,
    /// function select, pad isolation clear, output-enable set.
    pub fn configure_as_output(self, pin: PinId) -> OutputPin<G> {
        self.setup_output(pin);
        OutputPin { port: self, pin }
    }

    /// Same sequence as [`configure_as_output`](Self::configure_as_output),
    /// without handing out a pin object.
    pub fn setup_output(&self, pin: PinId) {
        let mask = pin.mask();
        self.regs.output_enable_clear(mask);
        self.regs.output_clear(mask);
        self.regs.select_function(pin.num(), FunctionSelect::Sio);
        self.regs.pad_clear(pin.num(), PAD_ISOLATION);
        self.regs.output_enable_set(mask);
    }

    /// Drive `pin` high.
    #[inline]
    pub fn set(&self, pin: PinId) {
        self.regs.output_set(pin.mask());
    }

    /// Drive `pin` low.
    #[inline]
    pub fn clear(&self, pin: PinId) {
        self.regs.output_clear(pin.mask());
    }

    /// Invert the output level of `pin`.
    #[inline]
    pub fn toggle(&self, pin: PinId) {
        self.regs.output_toggle(pin.mask());
    }

    /// Read back the output level of `pin`.
    #[inline]
    pub fn is_set_high(&self, pin: PinId) -> bool {
        self.regs.output_level() & pin.mask() != 0
    }
}

/// A configured output pin.
#[derive(Debug)]
pub struct OutputPin<G> {
    port: GpioPort<G>,
    pin: PinId,
}

impl<G: GpioRegisters> OutputPin<G> {
    /// The GPIO this pin drives.
    pub fn id(&self) -> PinId {
        self.pin
    }

    /// Give back the port. The pin stays configured as an output.
    pub fn free(self) -> GpioPort<G> {
        self.port
    }
}

impl<G: GpioRegisters> embedded_hal::digital::ErrorType for OutputPin<G> {
    type Error = Infallible;
}

impl<G: GpioRegisters> embedded_hal::digital::OutputPin for OutputPin<G> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.port.clear(self.pin);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.port.set(self.pin);
        Ok(())
    }
}

impl<G: GpioRegisters> embedded_hal::digital::StatefulOutputPin for OutputPin<G> {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.port.is_set_high(self.pin))
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.port.is_set_high(self.pin))
    }

    fn toggle(&mut self) -> Result<(), Self::Error> {
        self.port.toggle(self.pin);
        Ok(())
    }
}

impl<G: GpioRegisters> embedded_hal_0_2::digital::v2::OutputPin for OutputPin<G> {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.port.clear(self.pin);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.port.set(self.pin);
        Ok(())
    }
}

impl<G: GpioRegisters> embedded_hal_0_2::digital::v2::StatefulOutputPin for OutputPin<G> {
    fn is_set_high(&self) -> Result<bool, Self::Error> {
        Ok(self.port.is_set_high(self.pin))
    }

    fn is_set_low(&self) -> Result<bool, Self::Error> {
        Ok(!self.port.is_set_high(self.pin))
    }
}

impl<G: GpioRegisters> embedded_hal_0_2::digital::v2::ToggleableOutputPin for OutputPin<G> {
    type Error = Infallible;

    fn toggle(&mut self) -> Result<(), Self::Error> {
        self.port.toggle(self.pin);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::sim::SimGpio;
    use core::cell::RefCell;
    use embedded_hal::digital::{OutputPin as _, StatefulOutputPin as _};
    use std::vec::Vec;

    #[derive(Debug, PartialEq)]
    enum Write {
        OeSet(u32),
        OeClr(u32),
        OutSet(u32),
        OutClr(u32),
        Funcsel(u8, u32),
        PadClr(u8, u32),
    }

    /// Records every register write in order, on top of a simulated bank.
    struct Recorder {
        sim: SimGpio,
        log: RefCell<Vec<Write>>,
    }

    impl GpioRegisters for Recorder {
        fn output_enable_set(&self, mask: u32) {
            // The pad must never be driven high while being configured.
            assert_eq!(self.sim.output_level() & mask, 0);
            self.log.borrow_mut().push(Write::OeSet(mask));
            self.sim.output_enable_set(mask)
        }
        fn output_enable_clear(&self, mask: u32) {
            self.log.borrow_mut().push(Write::OeClr(mask));
            self.sim.output_enable_clear(mask)
        }
        fn output_set(&self, mask: u32) {
            self.log.borrow_mut().push(Write::OutSet(mask));
            self.sim.output_set(mask)
        }
        fn output_clear(&self, mask: u32) {
            self.log.borrow_mut().push(Write::OutClr(mask));
            self.sim.output_clear(mask)
        }
        fn output_toggle(&self, mask: u32) {
            self.sim.output_toggle(mask)
        }
        fn output_level(&self) -> u32 {
            self.sim.output_level()
        }
        fn select_function(&self, pin: u8, funcsel: FunctionSelect) {
            self.log
                .borrow_mut()
                .push(Write::Funcsel(pin, u32::from(funcsel)));
            self.sim.select_function(pin, funcsel)
        }
        fn pad_clear(&self, pin: u8, bits: u32) {
            self.log.borrow_mut().push(Write::PadClr(pin, bits));
            self.sim.pad_clear(pin, bits)
        }
    }

    #[test]
    fn configure_writes_in_order() {
        let recorder = Recorder {
            sim: SimGpio::new(),
            log: RefCell::new(Vec::new()),
        };
        let port = GpioPort::new(&recorder);
        let _led = port.configure_as_output(PinId::new(10).unwrap());
        assert_eq!(
            *recorder.log.borrow(),
            [
                Write::OeClr(1 << 10),
                Write::OutClr(1 << 10),
                Write::Funcsel(10, 5),
                Write::PadClr(10, 1 << 8),
                Write::OeSet(1 << 10),
            ]
        );
        assert!(recorder.sim.output_enabled(10));
        assert!(!recorder.sim.driven_high(10));
    }

    #[test]
    fn reconfiguring_a_high_pin_drops_it_first() {
        let gpio = SimGpio::new();
        let port = GpioPort::new(&gpio);
        let pin = PinId::new(4).unwrap();
        port.setup_output(pin);
        port.set(pin);
        assert!(gpio.driven_high(4));
        port.setup_output(pin);
        assert!(!gpio.output_high(4));
        assert!(gpio.output_enabled(4));
    }

    #[test]
    fn set_clear_toggle_touch_only_their_pin() {
        let gpio = SimGpio::new();
        let mut led = GpioPort::new(&gpio).configure_as_output(PinId::new(10).unwrap());
        gpio.output_set(1 << 11);
        led.set_high().unwrap();
        assert!(gpio.driven_high(10));
        assert!(led.is_set_high().unwrap());
        led.set_low().unwrap();
        assert!(!gpio.output_high(10));
        assert!(gpio.output_high(11));
        led.toggle().unwrap();
        assert!(led.is_set_high().unwrap());
        led.toggle().unwrap();
        assert!(led.is_set_low().unwrap());
    }

    #[test]
    fn pin_numbers_are_checked() {
        assert_eq!(PinId::new(29).map(PinId::num), Some(29));
        assert!(PinId::new(30).is_none());
        assert_eq!(PinId::try_from(40), Err(InvalidPinError(40)));
        assert_eq!(PinId::new(10).unwrap().mask(), 1 << 10);
    }
}
