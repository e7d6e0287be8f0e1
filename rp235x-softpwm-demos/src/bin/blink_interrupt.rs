//! # Interrupt blink
//!
//! Toggles an LED on GPIO10 every 250 ms from the TIMER0 alarm 0 interrupt.
//! The handler rearms the alarm before acknowledging it, then flips the
//! pin by reading back its output level.

#![no_std]
#![no_main]

use defmt_rtt as _;
use panic_probe as _;

// Alias for our HAL crate
use rp235x_hal as hal;

use embedded_hal::digital::StatefulOutputPin;
use rp235x_softpwm::{
    fugit::MicrosDurationU32,
    hw::{Bank0, Nvic, Timer, Timer0Device},
    vector_table::VectorTable,
    AlarmId, AlarmScheduler, Exclusive, GpioPort, OutputPin, PinId,
};
use static_cell::ConstStaticCell;

/// Tell the Boot ROM about our application
#[link_section = ".start_block"]
#[used]
pub static IMAGE_DEF: hal::block::ImageDef = hal::block::ImageDef::secure_exe();

/// External high-speed crystal on the Raspberry Pi Pico 2 board is 12 MHz.
/// Adjust if your board has a different frequency
const XTAL_FREQ_HZ: u32 = 12_000_000u32;

const LED_PIN: u8 = 10;
const BLINK_INTERVAL: MicrosDurationU32 = MicrosDurationU32::millis(250);

static RAM_VTABLE: ConstStaticCell<VectorTable> = ConstStaticCell::new(VectorTable::new());

type SchedulerAndLed = (AlarmScheduler<Timer<Timer0Device>>, OutputPin<Bank0>);

static BLINK: Exclusive<SchedulerAndLed> = Exclusive::new();

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
    let led = GpioPort::new(bank0).configure_as_output(PinId::new(LED_PIN).unwrap());
    let timer = Timer::new_timer0(pac.TIMER0, &mut pac.RESETS);
    let mut nvic = Nvic::new(RAM_VTABLE.take(), &mut pac.PPB);

    BLINK.install((
        AlarmScheduler::new(timer, AlarmId::Alarm0, BLINK_INTERVAL),
        led,
    ));
    BLINK.with(|(scheduler, _)| scheduler.on_fire(&mut nvic, on_alarm));
    defmt::info!("blinking GPIO{} every {} ms", LED_PIN, BLINK_INTERVAL.to_millis());

    loop {
        // Free for other work; the LED is driven from the interrupt
        hal::arch::wfi();
    }
}

extern "C" fn on_alarm() {
    BLINK.with(|(scheduler, led)| {
        let _ = scheduler.service(|| led.toggle());
    });
}

/// Program metadata for `picotool info`
#[link_section = ".bi_entries"]
#[used]
pub static PICOTOOL_ENTRIES: [hal::binary_info::EntryAddr; 4] = [
    hal::binary_info::rp_cargo_bin_name!(),
    hal::binary_info::rp_cargo_version!(),
    hal::binary_info::rp_program_description!(c"Alarm interrupt LED blink"),
    hal::binary_info::rp_program_build_attribute!(),
];

// End of file
