//! Register-level backend for the STM32F4 bxCAN controller, CAN1 on PB8/PB9.
//!
//! Implements [`CanPeripheral`] directly against the memory-mapped register
//! block in [`crate::pac`]; everything above this module is hardware-agnostic.

use crate::config::{AcceptanceFilter, CanConfig, NominalBitTiming, RxFifo};
use crate::frame::{Frame, StandardId};
use crate::pac::can::Can;
use crate::pac::gpio::{Gpio, vals};
use crate::pac::rcc::Rcc;
use crate::pac::{CAN1_REGISTER_BLOCK_ADDR, GPIOB_REGISTER_BLOCK_ADDR, RCC_REGISTER_BLOCK_ADDR};
use crate::peripheral::CanPeripheral;
use crate::util::checked_wait;
use crate::{InitError, TxError};
use static_cell::StaticCell;

// we must wait two peripheral clock cycles before the clock is active
// http://efton.sk/STM32/gotcha/g183.html
const CLOCK_DOMAIN_SYNCHRONIZATION_DELAY: u32 = 100;

const RX_PIN: usize = 8;
const TX_PIN: usize = 9;
const CAN1_AF: u32 = 9;

/// First filter bank assigned to the slave (CAN2) instance. Left at the reset
/// split since CAN2 is not used.
const CAN2_START_BANK: u8 = 14;

static CAN1_TAKEN: StaticCell<()> = StaticCell::new();

/// The CAN1 peripheral instance.
///
/// Obtained once via [`BxCan::take`] and then handed to
/// [`Transceiver::initialize`](crate::Transceiver::initialize), which drives
/// the `configure` → `apply_filter` → `start` bring-up through the
/// [`CanPeripheral`] trait.
pub struct BxCan {
    can: Can,
    configured: bool,
    fifo: usize,
    timeout_iterations: u32,
}

impl BxCan {
    /// Claims CAN1. This method can be called only once, otherwise
    /// `InitError::PeripheralTaken` is returned.
    pub fn take() -> Result<Self, InitError> {
        if CAN1_TAKEN.try_init(()).is_none() {
            return Err(InitError::PeripheralTaken);
        }
        let can = unsafe { Can::from_ptr(CAN1_REGISTER_BLOCK_ADDR) };
        Ok(Self {
            can,
            configured: false,
            fifo: RxFifo::Fifo0.index(),
            timeout_iterations: CanConfig::default().timeout_iterations,
        })
    }

    /// Body of the `CAN1_RX0` interrupt handler.
    ///
    /// Acknowledges the write-1-clear FIFO-0 events (full, overrun) and does
    /// nothing else. The pending-frame count is only decremented by releasing
    /// output mailboxes, which is the poll path's job; an ISR that read
    /// frames here would race the poll loop for them. Touching only these
    /// flag bits needs no critical section against the owning transceiver.
    pub fn on_rx0_interrupt() {
        let can = unsafe { Can::from_ptr(CAN1_REGISTER_BLOCK_ADDR) };
        can.rfr(0).write(|w| {
            w.set_full(true);
            w.set_fovr(true);
        });
    }

    fn enable_reset(&mut self) {
        let rcc = unsafe { Rcc::from_ptr(RCC_REGISTER_BLOCK_ADDR) };
        rcc.ahb1enr().modify(|w| w.set_gpioben(true));
        rcc.apb1rstr().modify(|w| w.set_can1rst(true));
        rcc.apb1enr().modify(|w| w.set_can1en(true));
        cortex_m::asm::delay(CLOCK_DOMAIN_SYNCHRONIZATION_DELAY);
        // DSB for good measure
        cortex_m::asm::dsb();
        rcc.apb1rstr().modify(|w| w.set_can1rst(false));
    }

    fn init_pins(&mut self) {
        let gpiob = unsafe { Gpio::from_ptr(GPIOB_REGISTER_BLOCK_ADDR) };
        configure_can_pin(gpiob, RX_PIN);
        configure_can_pin(gpiob, TX_PIN);
    }

    #[inline]
    fn enter_init_mode(&mut self) -> Result<(), InitError> {
        // Leaving sleep and entering initialization are both handshakes: the
        // controller acknowledges through MSR once the bus is idle.
        self.can.mcr().modify(|w| {
            w.set_sleep(false);
            w.set_inrq(true);
        });
        checked_wait(
            || {
                let msr = self.can.msr().read();
                !msr.inak() || msr.slak()
            },
            self.timeout_iterations,
        )
    }

    #[inline]
    fn leave_init_mode(&mut self) -> Result<(), InitError> {
        self.can.mcr().modify(|w| w.set_inrq(false));
        checked_wait(|| self.can.msr().read().inak(), self.timeout_iterations)
    }
}

impl CanPeripheral for BxCan {
    fn configure(
        &mut self,
        timing: &NominalBitTiming,
        config: &CanConfig,
    ) -> Result<(), InitError> {
        if !timing.validate() {
            return Err(InitError::InvalidBitTiming);
        }
        self.timeout_iterations = config.timeout_iterations;

        self.enable_reset();
        self.init_pins();
        self.enter_init_mode()?;

        self.can.mcr().modify(|w| {
            w.set_ttcm(config.time_triggered_mode);
            w.set_abom(config.automatic_bus_off_recovery);
            w.set_awum(config.automatic_wakeup);
            w.set_nart(!config.automatic_retransmission);
            w.set_rflm(config.receive_fifo_locked);
            w.set_txfp(config.transmit_fifo_priority);
        });

        let (lbkm, silm) = config.mode.bits();
        let btr = crate::pac::can::regs::Btr::from_bits(timing.register_value())
            .with_lbkm(lbkm)
            .with_silm(silm);
        self.can.btr().write_value(btr);

        #[cfg(feature = "defmt")]
        defmt::debug!("CAN1 configured, BTR {=u32:#x}", btr.into_bits());

        self.configured = true;
        Ok(())
    }

    fn apply_filter(&mut self, filter: &AcceptanceFilter) -> Result<(), InitError> {
        if !filter.is_valid() {
            return Err(InitError::InvalidFilter);
        }
        let bank = filter.bank as usize;
        let bit = 1u32 << bank;
        self.fifo = filter.fifo.index();

        self.can.fmr().modify(|w| {
            w.set_finit(true);
            w.set_can2sb(CAN2_START_BANK);
        });
        // Deactivate the bank while its registers are reprogrammed.
        self.can.fa1r().modify(|w| *w &= !bit);
        self.can.fb(bank).fr1().write_value(filter.id);
        self.can.fb(bank).fr2().write_value(filter.mask);
        // Single 32-bit slot in identifier-mask mode.
        self.can.fs1r().modify(|w| *w |= bit);
        self.can.fm1r().modify(|w| *w &= !bit);
        match filter.fifo {
            RxFifo::Fifo0 => self.can.ffa1r().modify(|w| *w &= !bit),
            RxFifo::Fifo1 => self.can.ffa1r().modify(|w| *w |= bit),
        }
        if filter.enabled {
            self.can.fa1r().modify(|w| *w |= bit);
        }
        self.can.fmr().modify(|w| w.set_finit(false));
        Ok(())
    }

    fn start(&mut self) -> Result<(), InitError> {
        if !self.configured {
            return Err(InitError::NotConfigured);
        }
        self.leave_init_mode()?;

        // Frame-pending notification line; the handler only clears these
        // write-1-clear events, see `on_rx0_interrupt`.
        self.can.ier().modify(|w| {
            w.set_ffie0(true);
            w.set_fovie0(true);
        });

        #[cfg(feature = "defmt")]
        defmt::trace!("CAN1 started, receive FIFO {=usize}", self.fifo);

        Ok(())
    }

    fn transmit(&mut self, frame: &Frame) -> Result<(), TxError> {
        let tsr = self.can.tsr().read();
        // CODE names a free mailbox whenever at least one TME bit is set.
        let idx = tsr.code() as usize;
        let free = match idx {
            0 => tsr.tme0(),
            1 => tsr.tme1(),
            _ => tsr.tme2(),
        };
        if !free {
            return Err(TxError::MailboxesFull);
        }

        let mut data = [0u8; 8];
        data[..frame.data().len()].copy_from_slice(frame.data());

        let mb = self.can.tx(idx);
        mb.tdtr().write(|w| w.set_dlc(frame.dlc() as u8));
        mb.tdlr()
            .write_value(u32::from_le_bytes([data[0], data[1], data[2], data[3]]));
        mb.tdhr()
            .write_value(u32::from_le_bytes([data[4], data[5], data[6], data[7]]));
        // Requesting transmission hands the mailbox to the hardware; no
        // completion wait, retransmission is governed by NART.
        mb.tir().write(|w| {
            w.set_stid(frame.id().as_raw());
            w.set_rtr(frame.is_remote());
            w.set_txrq(true);
        });
        Ok(())
    }

    fn rx_pending(&self) -> u8 {
        self.can.rfr(self.fifo).read().fmp()
    }

    fn read_rx(&mut self) -> Option<Frame> {
        let rfr = self.can.rfr(self.fifo);
        if rfr.read().fmp() == 0 {
            return None;
        }

        let mb = self.can.rx(self.fifo);
        let rir = mb.rir().read();
        let rdtr = mb.rdtr().read();
        let low = mb.rdlr().read().to_le_bytes();
        let high = mb.rdhr().read().to_le_bytes();
        // Release the output mailbox first; the frame image is latched above,
        // and a mailbox that cannot be rebuilt below must not wedge the FIFO.
        rfr.write(|w| w.set_rfom(true));

        if rir.ide() {
            return None;
        }
        let id = StandardId::new(rir.stid())?;
        let dlc = rdtr.dlc() as usize;
        if dlc > 8 {
            return None;
        }
        if rir.rtr() {
            return Frame::new_remote(id, dlc);
        }
        let mut data = [0u8; 8];
        data[..4].copy_from_slice(&low);
        data[4..].copy_from_slice(&high);
        Frame::new(id, &data[..dlc])
    }
}

/// Open-drain alternate function with pull-up at very-high slew rate. CAN is
/// a multi-drop bus; a push-pull transmit pin would fight other nodes'
/// dominant bits.
fn configure_can_pin(port: Gpio, pin: usize) {
    let two = 2 * pin;
    port.moder()
        .modify(|w| *w = (*w & !(0b11 << two)) | ((vals::Moder::Alternate as u32) << two));
    port.otyper().modify(|w| *w |= 1 << pin);
    port.ospeedr()
        .modify(|w| *w = (*w & !(0b11 << two)) | ((vals::Ospeedr::VeryHigh as u32) << two));
    port.pupdr()
        .modify(|w| *w = (*w & !(0b11 << two)) | ((vals::Pupdr::PullUp as u32) << two));

    let nibble = 4 * (pin % 8);
    port.afr(pin / 8)
        .modify(|w| *w = (*w & !(0xF << nibble)) | (CAN1_AF << nibble));
}
