//! Send/receive demo for the STM32F429 Discovery.
//!
//! Brings the node up at 125 kbit/s on PB8/PB9, polls the bus every 10 ms,
//! and queues a temperature beacon on each press of the PA0 user button. A
//! display task prints the traffic counters once a second.

#![no_std]
#![no_main]
#![feature(type_alias_impl_trait)]
#![feature(impl_trait_in_assoc_type)]

use bxcan_node::{
    AcceptanceFilter, BxCan, CanConfig, Frame, NominalBitTiming, TrafficCounters, Transceiver,
};
use defmt::*;
use embassy_executor::Spawner;
use embassy_stm32::gpio::{Input, Pull};
use embassy_stm32::interrupt;
use embassy_stm32::interrupt::InterruptExt;
use embassy_stm32::rcc::{
    AHBPrescaler, APBPrescaler, HseMode, Pll, PllMul, PllPDiv, PllPreDiv, PllSource, Sysclk,
};
use embassy_stm32::time::Hertz;
use embassy_stm32::{Config, rcc};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Timer;
use {defmt_rtt as _, panic_probe as _};

/// Canned reading sent on every button press; the board has no sensor.
const DEMO_TEMPERATURE: f32 = 25.5;

/// Snapshot published by the polling loop for the display task.
#[derive(Clone, Copy)]
struct Status {
    counters: TrafficCounters,
    last_sent: Option<Frame>,
    last_received: Option<Frame>,
}

static STATUS: Signal<CriticalSectionRawMutex, Status> = Signal::new();

// Housekeeping only: pending frames drain through the poll loop below.
#[interrupt]
unsafe fn CAN1_RX0() {
    BxCan::on_rx0_interrupt();
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let mut config = Config::default();
    config.rcc.hse = Some(rcc::Hse {
        freq: Hertz::mhz(8),
        mode: HseMode::Oscillator,
    });
    config.rcc.pll_src = PllSource::HSE;
    config.rcc.pll = Some(Pll {
        // 8 MHz / 4 * 180 / 2 = 180 MHz system clock
        prediv: PllPreDiv::DIV4,
        mul: PllMul::MUL180,
        divp: Some(PllPDiv::DIV2),
        divq: None,
        divr: None,
    });
    config.rcc.sys = Sysclk::PLL1_P;
    config.rcc.ahb_pre = AHBPrescaler::DIV1;
    // 45 MHz APB1, the bus clock the default bit timing profile assumes.
    config.rcc.apb1_pre = APBPrescaler::DIV4;
    config.rcc.apb2_pre = APBPrescaler::DIV2;
    let p = embassy_stm32::init(config);

    info!("bxcan-node send/recv demo");

    // The driver claims PB8/PB9 and configures them for CAN1 itself.
    let timing = NominalBitTiming::default();
    let can = unwrap!(BxCan::take());
    let mut node = unwrap!(Transceiver::initialize(
        can,
        timing,
        CanConfig::default(),
        AcceptanceFilter::accept_all(),
    ));
    unsafe { interrupt::CAN1_RX0.enable() };
    info!(
        "CAN1 up: {=u32} bit/s, BTR {=u32:#x}",
        timing.bit_rate(45_000_000),
        timing.register_value()
    );

    unwrap!(spawner.spawn(display()));

    // User button, externally pulled down; pressed reads high.
    let button = Input::new(p.PA0, Pull::None);
    let mut was_pressed = false;
    let mut tick = 0u32;

    loop {
        Timer::after_millis(10).await;

        let pressed = button.is_high();
        if pressed && !was_pressed {
            match node.send_temperature(DEMO_TEMPERATURE) {
                Ok(()) => info!("beacon queued"),
                // Mailboxes drain in a few bit times; the next press retries.
                Err(e) => warn!("beacon not queued: {}", e),
            }
        }
        was_pressed = pressed;

        if let Some(frame) = node.poll_receive() {
            info!("received {}", frame);
        }

        tick = tick.wrapping_add(1);
        if tick % 100 == 0 {
            STATUS.signal(Status {
                counters: node.counters(),
                last_sent: node.last_sent().copied(),
                last_received: node.last_received().copied(),
            });
        }
    }
}

#[embassy_executor::task]
async fn display() {
    loop {
        let status = STATUS.wait().await;
        info!(
            "sent {=u32} received {=u32}",
            status.counters.sent, status.counters.received
        );
        if let Some(frame) = status.last_sent {
            info!("last sent {}", frame);
        }
        if let Some(frame) = status.last_received {
            info!("last received {}", frame);
        }
    }
}
