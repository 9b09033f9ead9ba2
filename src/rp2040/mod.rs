//! RP2040 implementation of the hardware seams: PIO0/PIO1, the DMA controller and the GPOUT
//! clock generators, programmed through the PAC. Peripherals are accessed through raw pointers,
//! so ownership is by convention: one `Rp2040Hardware` per PIO block, DMA channels shared through
//! a claim mask.

pub mod heap;
pub mod pins;

use crate::hw::{Block, ClockOutput, DmaController, DmaTransfer, Sequencer, TransferSize, UnitConfig};
use crate::program::FRAME_DONE_FLAG;
use crate::registry;
use cortex_m::peripheral::NVIC;
use portable_atomic::{AtomicU16, Ordering};
use rp2040_hal::pac::{self, pio0, DMA, PIO0, PIO1, RESETS};

// PIO register addresses, the DMA reads the RX FIFOs directly
const PIO0_BASE: u32 = 0x5020_0000;
const PIO1_BASE: u32 = 0x5030_0000;
const PIO_RXF0_OFFSET: u32 = 0x20;

// CLOCKS GPOUT generators, 3 registers each starting at CLK_GPOUT0_CTRL
const CLK_GPOUT0_CTRL_ADDR: u32 = 0x4000_8000;
const CLK_GPOUT_STRIDE: u32 = 0x0C;
const CLK_GPOUT_ENABLE: u32 = 1 << 11;
const CLK_GPOUT_AUXSRC_CLK_SYS: u32 = 0x6 << 5;

// SMx_SHIFTCTRL
const FJOIN_RX: u32 = 1 << 31;
const OUT_SHIFTDIR: u32 = 1 << 19;
const IN_SHIFTDIR: u32 = 1 << 18;
const AUTOPUSH: u32 = 1 << 16;

// DMA CHx_CTRL
const DMA_EN: u32 = 1 << 0;
const DMA_INCR_READ: u32 = 1 << 4;
const DMA_INCR_WRITE: u32 = 1 << 5;

const DMA_CHANNELS: u8 = 12;

/// Bit per DMA channel in use, shared by every `Rp2040Hardware`.
static DMA_CLAIMED: AtomicU16 = AtomicU16::new(0);

/// One PIO block plus access to DMA and the clock generators.
pub struct Rp2040Hardware {
    block: Block,
}

impl Rp2040Hardware {
    /// Take PIO `block` and the DMA controller out of reset.
    pub fn new(block: Block, resets: &mut RESETS) -> Self {
        resets.reset().modify(|_, w| match block {
            Block::Pio0 => w.pio0().clear_bit().dma().clear_bit(),
            Block::Pio1 => w.pio1().clear_bit().dma().clear_bit(),
        });

        loop {
            let done = resets.reset_done().read();
            let pio_done = match block {
                Block::Pio0 => done.pio0().bit_is_set(),
                Block::Pio1 => done.pio1().bit_is_set(),
            };
            if pio_done && done.dma().bit_is_set() {
                break;
            }
        }

        Rp2040Hardware { block }
    }

    fn regs(&self) -> &'static pio0::RegisterBlock {
        pio_regs(self.block)
    }

    fn base(&self) -> u32 {
        match self.block {
            Block::Pio0 => PIO0_BASE,
            Block::Pio1 => PIO1_BASE,
        }
    }

    fn irq_line(&self) -> pac::Interrupt {
        match self.block {
            Block::Pio0 => pac::Interrupt::PIO0_IRQ_0,
            Block::Pio1 => pac::Interrupt::PIO1_IRQ_0,
        }
    }
}

fn pio_regs(block: Block) -> &'static pio0::RegisterBlock {
    match block {
        Block::Pio0 => unsafe { &(*PIO0::ptr()) },
        Block::Pio1 => unsafe { &(*PIO1::ptr()) },
    }
}

/// Frame-done interrupt body. Call from the firmware's `PIO0_IRQ_0` or `PIO1_IRQ_0` handler.
pub fn on_frame_irq(block: Block) {
    let regs = pio_regs(block);
    let flag = 1 << FRAME_DONE_FLAG;

    if regs.irq().read().bits() & flag != 0 {
        // Write 1 to clear
        regs.irq().write(|w| unsafe { w.bits(flag) });
        registry::signal_frame_done(block);
    }
}

impl Sequencer for Rp2040Hardware {
    fn block(&self) -> Block {
        self.block
    }

    fn write_instruction(&mut self, address: u8, instruction: u16) {
        self.regs()
            .instr_mem(address as usize)
            .write(|w| unsafe { w.bits(u32::from(instruction)) });
    }

    fn configure_pins(&mut self, base_pin: u8, count: u8) {
        for pin in base_pin..base_pin + count {
            pins::pio_input(pin, self.block);
        }
    }

    fn init_unit(&mut self, unit: u8, config: &UnitConfig) {
        let sm = self.regs().sm(unit as usize);

        unsafe {
            // Integer divider only
            sm.sm_clkdiv()
                .write(|w| w.bits(u32::from(config.clock_divider) << 16));

            // Wrap, everything else default
            sm.sm_execctrl().write(|w| {
                w.bits(u32::from(config.wrap_source) << 12 | u32::from(config.wrap_target) << 7)
            });

            // Push threshold 32 is encoded as 0
            let mut shift = OUT_SHIFTDIR | u32::from(config.push_threshold & 0x1F) << 20;
            if config.shift_right {
                shift |= IN_SHIFTDIR;
            }
            if config.autopush {
                shift |= AUTOPUSH;
            }
            sm.sm_shiftctrl().write(|w| w.bits(shift));

            // IN_BASE, no outputs
            sm.sm_pinctrl()
                .write(|w| w.bits(u32::from(config.in_base) << 15));

            // `jmp entry` executed immediately
            sm.sm_instr().write(|w| w.bits(u32::from(config.entry)));
        }
    }

    fn set_units_enabled(&mut self, mask: u8, enabled: bool) {
        let mask = u32::from(mask & 0xF);
        self.regs().ctrl().modify(|r, w| unsafe {
            if enabled {
                w.bits(r.bits() | mask)
            } else {
                w.bits(r.bits() & !mask)
            }
        });
    }

    fn restart_units(&mut self, mask: u8) {
        let mask = u32::from(mask & 0xF);
        // CLKDIV_RESTART and SM_RESTART are self-clearing
        self.regs()
            .ctrl()
            .modify(|r, w| unsafe { w.bits(r.bits() | mask << 8 | mask << 4) });
    }

    fn clear_fifos(&mut self, unit: u8) {
        // Toggling a FIFO join flushes both FIFOs
        let sm = self.regs().sm(unit as usize);
        sm.sm_shiftctrl()
            .modify(|r, w| unsafe { w.bits(r.bits() ^ FJOIN_RX) });
        sm.sm_shiftctrl()
            .modify(|r, w| unsafe { w.bits(r.bits() ^ FJOIN_RX) });
    }

    fn push(&mut self, unit: u8, word: u32) {
        let regs = self.regs();
        let tx_full = 1 << (16 + unit);

        while regs.fstat().read().bits() & tx_full != 0 {}
        regs.txf(unit as usize).write(|w| unsafe { w.bits(word) });
    }

    fn clear_flag(&mut self, flag: u8) {
        self.regs().irq().write(|w| unsafe { w.bits(1 << flag) });
    }

    fn rx_fifo_address(&self, unit: u8) -> u32 {
        self.base() + PIO_RXF0_OFFSET + 4 * u32::from(unit)
    }

    fn rx_dreq(&self, unit: u8) -> u8 {
        match self.block {
            Block::Pio0 => 4 + unit,
            Block::Pio1 => 12 + unit,
        }
    }

    fn set_frame_interrupt(&mut self, enabled: bool) {
        // IRQ0_INTE bit 8 is flag 0
        let bit = 1 << (8 + FRAME_DONE_FLAG);
        self.regs().sm_irq(0).irq_inte().modify(|r, w| unsafe {
            if enabled {
                w.bits(r.bits() | bit)
            } else {
                w.bits(r.bits() & !bit)
            }
        });

        if enabled {
            unsafe { NVIC::unmask(self.irq_line()) };
        } else {
            NVIC::mask(self.irq_line());
        }
    }
}

impl DmaController for Rp2040Hardware {
    fn claim(&mut self, channel: u8) -> bool {
        if channel >= DMA_CHANNELS {
            return false;
        }
        let bit = 1 << channel;
        DMA_CLAIMED.fetch_or(bit, Ordering::AcqRel) & bit == 0
    }

    fn claim_unused(&mut self) -> Option<u8> {
        (0..DMA_CHANNELS).find(|ch| self.claim(*ch))
    }

    fn unclaim(&mut self, channel: u8) {
        DMA_CLAIMED.fetch_and(!(1 << channel), Ordering::AcqRel);
    }

    unsafe fn start(&mut self, channel: u8, transfer: &DmaTransfer) {
        let dma_regs = &(*DMA::ptr());
        let ch = dma_regs.ch(channel as usize);

        let data_size = match transfer.size {
            TransferSize::Byte => 0,
            TransferSize::HalfWord => 1,
            TransferSize::Word => 2,
        };

        let mut ctrl = DMA_EN
            | data_size << 2
            // Chaining to itself disables chaining
            | u32::from(channel) << 11
            | u32::from(transfer.dreq) << 15;
        if transfer.read_increment {
            ctrl |= DMA_INCR_READ;
        }
        if transfer.write_increment {
            ctrl |= DMA_INCR_WRITE;
        }

        ch.ch_read_addr().write(|w| w.bits(transfer.read_addr));
        ch.ch_write_addr().write(|w| w.bits(transfer.write_addr));
        ch.ch_trans_count().write(|w| w.bits(transfer.count));
        ch.ch_ctrl_trig().write(|w| w.bits(ctrl));
    }

    fn abort(&mut self, channel: u8) {
        let dma_regs = unsafe { &(*DMA::ptr()) };
        let bit = 1 << channel;

        dma_regs.chan_abort().write(|w| unsafe { w.bits(bit) });
        while dma_regs.chan_abort().read().bits() & bit != 0 {}
    }
}

impl ClockOutput for Rp2040Hardware {
    fn start_clock(&mut self, pin: u8, divider: u32) -> bool {
        let index = match pins::gpout_index(pin) {
            Some(index) => index as u32,
            None => return false,
        };

        let ctrl = (CLK_GPOUT0_CTRL_ADDR + index * CLK_GPOUT_STRIDE) as *mut u32;
        let div = (CLK_GPOUT0_CTRL_ADDR + index * CLK_GPOUT_STRIDE + 4) as *mut u32;

        unsafe {
            // Integer divider in DIV[31:8]
            div.write_volatile(divider << 8);
            ctrl.write_volatile(CLK_GPOUT_AUXSRC_CLK_SYS | CLK_GPOUT_ENABLE);
        }
        pins::clock_output(pin);

        true
    }
}
