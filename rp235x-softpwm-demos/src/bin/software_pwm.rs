//! # Software PWM
//!
//! Fades an LED on GPIO10 in and out with a PWM waveform generated entirely
//! in software: TIMER0 alarm 0 fires every 100 µs, and each fire advances a
//! counter-driven PWM engine by one tick. The duty cycle grows by one tick
//! per 202-tick period and wraps to zero after 200, so one fade takes about
//! four seconds.
//!
//! The main thread only sets things up and then sleeps.

#![no_std]
#![no_main]

use defmt_rtt as _;
use panic_probe as _;

// Alias for our HAL crate
use rp235x_hal as hal;

use rp235x_softpwm::{
    fugit::MicrosDurationU32,
    hw::{Bank0, Nvic, Timer, Timer0Device},
    vector_table::VectorTable,
    AlarmId, AlarmScheduler, Exclusive, GpioPort, OutputPin, PinId, SoftwarePwm,
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
const TICK_INTERVAL: MicrosDurationU32 = MicrosDurationU32::micros(100);
const CYCLE_PERIOD: u8 = 200;

// Memory that will hold our vector table in RAM
static RAM_VTABLE: ConstStaticCell<VectorTable> = ConstStaticCell::new(VectorTable::new());

struct Fade {
    scheduler: AlarmScheduler<Timer<Timer0Device>>,
    pwm: SoftwarePwm<OutputPin<Bank0>>,
}

static FADE: Exclusive<Fade> = Exclusive::new();

#[hal::entry]
fn main() -> ! {
    let mut pac = hal::pac::Peripherals::take().unwrap();

    // Brings up the 1 MHz tick the timers count
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

    FADE.install(Fade {
        scheduler: AlarmScheduler::new(timer, AlarmId::Alarm0, TICK_INTERVAL),
        pwm: SoftwarePwm::new(led, CYCLE_PERIOD).unwrap(),
    });
    FADE.with(|fade| fade.scheduler.on_fire(&mut nvic, on_alarm));
    defmt::info!(
        "software pwm on GPIO{}: {} ticks per period, {} us per tick",
        LED_PIN,
        CYCLE_PERIOD,
        TICK_INTERVAL.ticks()
    );

    loop {
        // Everything happens in the alarm handler
        hal::arch::wfi();
    }
}

extern "C" fn on_alarm() {
    FADE.with(|Fade { scheduler, pwm }| {
        // Pin writes cannot fail
        let _ = scheduler.service(|| pwm.update());
    });
}

/// Program metadata for `picotool info`
#[link_section = ".bi_entries"]
#[used]
pub static PICOTOOL_ENTRIES: [hal::binary_info::EntryAddr; 4] = [
    hal::binary_info::rp_cargo_bin_name!(),
    hal::binary_info::rp_cargo_version!(),
    hal::binary_info::rp_program_description!(c"Software PWM LED fade"),
    hal::binary_info::rp_program_build_attribute!(),
];

// End of file
