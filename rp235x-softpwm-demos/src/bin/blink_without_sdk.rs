//! # Busy-wait blink
//!
//! Blinks an LED on GPIO10 with no interrupts at all: the main loop drives
//! the pin and spins on the 64-bit TIMER0 counter between edges.

#![no_std]
#![no_main]

use defmt_rtt as _;
use panic_probe as _;

// Alias for our HAL crate
use rp235x_hal as hal;

use embedded_hal::delay::DelayNs;
use rp235x_softpwm::{hw::Bank0, hw::Timer, GpioPort, MonotonicClock, PinId};

/// Tell the Boot ROM about our application
#[link_section = ".start_block"]
#[used]
pub static IMAGE_DEF: hal::block::ImageDef = hal::block::ImageDef::secure_exe();

/// External high-speed crystal on the Raspberry Pi Pico 2 board is 12 MHz.
/// Adjust if your board has a different frequency
const XTAL_FREQ_HZ: u32 = 12_000_000u32;

const LED_PIN: u8 = 10;
const HALF_PERIOD_MS: u32 = 250;

#[hal::entry]
fn main() -> ! {
    let mut pac = hal::pac::Peripherals::take().unwrap();

    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);
    let _clocks = hal::clocks::init_clocks_and_plls(
        XTAL_FREQ_HZ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .ok()
    .unwrap();

    let bank0 = Bank0::new(pac.SIO, pac.IO_BANK0, pac.PADS_BANK0, &mut pac.RESETS);
    let port = GpioPort::new(bank0);
    let led = PinId::new(LED_PIN).unwrap();
    port.setup_output(led);

    let mut clock = MonotonicClock::new(Timer::new_timer0(pac.TIMER0, &mut pac.RESETS));
    defmt::info!("blinking GPIO{} from the main loop", LED_PIN);

    loop {
        port.set(led);
        clock.delay_ms(HALF_PERIOD_MS);
        port.clear(led);
        clock.delay_ms(HALF_PERIOD_MS);
    }
}

/// Program metadata for `picotool info`
#[link_section = ".bi_entries"]
#[used]
pub static PICOTOOL_ENTRIES: [hal::binary_info::EntryAddr; 4] = [
    hal::binary_info::rp_cargo_bin_name!(),
    hal::binary_info::rp_cargo_version!(),
    hal::binary_info::rp_program_description!(c"Busy-wait LED blink"),
    hal::binary_info::rp_program_build_attribute!(),
];

// End of file
