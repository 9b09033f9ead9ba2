//! Mock sensor bus, delay and PIO/DMA hardware for unit testing.

use crate::hw::{Block, ClockOutput, DmaController, DmaTransfer, Sequencer, UnitConfig};
use crate::ov7670::sccb::OV7670_ADDRESS;
use crate::registry;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::Cell;
use embedded_hal::blocking::{delay::DelayMs, i2c};

/// OV7670 register file behind an I2C bus.
pub struct MockI2c {
    pub regs: [u8; 256],
    /// Register selected by the last address-only write.
    pointer: u8,
    /// Every `(register, value)` write, in order.
    pub writes: Vec<(u8, u8)>,
    /// Read transactions attempted.
    pub reads: u32,
    /// Fail this many read transactions before answering.
    pub read_failures: u32,
    /// Fail every transaction.
    pub failing: bool,
}

impl MockI2c {
    pub fn new() -> Self {
        MockI2c {
            regs: [0; 256],
            pointer: 0,
            writes: Vec::new(),
            reads: 0,
            read_failures: 0,
            failing: false,
        }
    }
}

impl i2c::Write for MockI2c {
    type Error = ();

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), ()> {
        assert_eq!(address, OV7670_ADDRESS);
        if self.failing {
            return Err(());
        }

        match *bytes {
            [reg] => self.pointer = reg,
            [reg, val] => {
                self.regs[reg as usize] = val;
                self.writes.push((reg, val));
            }
            _ => return Err(()),
        }
        Ok(())
    }
}

impl i2c::Read for MockI2c {
    type Error = ();

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), ()> {
        assert_eq!(address, OV7670_ADDRESS);
        self.reads += 1;
        if self.failing {
            return Err(());
        }
        if self.read_failures > 0 {
            self.read_failures -= 1;
            return Err(());
        }

        buffer[0] = self.regs[self.pointer as usize];
        Ok(())
    }
}

// Borrowed bus, so a test can inspect it after the camera that used it is gone
impl i2c::Write for &mut MockI2c {
    type Error = ();

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), ()> {
        i2c::Write::write(&mut **self, address, bytes)
    }
}

impl i2c::Read for &mut MockI2c {
    type Error = ();

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), ()> {
        i2c::Read::read(&mut **self, address, buffer)
    }
}

/// Pending frame-done signal: block, and milliseconds of delay until it fires.
pub type SignalHandle = Rc<Cell<Option<(Block, u32)>>>;

/// Delay that only counts, and can raise frame-done partway through a wait like the interrupt
/// would.
pub struct MockDelay {
    pub total_ms: u32,
    signal: SignalHandle,
}

impl MockDelay {
    pub fn new() -> Self {
        MockDelay {
            total_ms: 0,
            signal: Rc::new(Cell::new(None)),
        }
    }

    pub fn signal_handle(&self) -> SignalHandle {
        self.signal.clone()
    }
}

impl DelayMs<u32> for MockDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.total_ms += ms;

        if let Some((block, remaining)) = self.signal.get() {
            if remaining <= ms {
                self.signal.set(None);
                registry::signal_frame_done(block);
            } else {
                self.signal.set(Some((block, remaining - ms)));
            }
        }
    }
}

/// Number of DMA channels on the RP2040.
const DMA_CHANNELS: u8 = 12;

/// Records everything the engine does to the PIO block and DMA controller.
pub struct MockHardware {
    pub block: Block,
    pub instructions: [u16; 32],
    /// Addresses written, in order.
    pub instruction_writes: Vec<u8>,
    pub pins: Option<(u8, u8)>,
    pub units: [Option<UnitConfig>; 4],
    pub enabled: u8,
    /// Masks passed to each enable, in order.
    pub enable_order: Vec<u8>,
    pub restarted: Vec<u8>,
    pub pushed: Vec<(u8, u32)>,
    pub cleared_flags: Vec<u8>,
    pub frame_interrupt: bool,
    /// Bit per claimed channel.
    pub claimed: u16,
    pub started: Vec<(u8, DmaTransfer)>,
    pub aborted: Vec<u8>,
    pub clock: Option<(u8, u32)>,
}

impl MockHardware {
    pub fn new() -> Self {
        MockHardware {
            block: Block::Pio0,
            instructions: [0; 32],
            instruction_writes: Vec::new(),
            pins: None,
            units: [None; 4],
            enabled: 0,
            enable_order: Vec::new(),
            restarted: Vec::new(),
            pushed: Vec::new(),
            cleared_flags: Vec::new(),
            frame_interrupt: false,
            claimed: 0,
            started: Vec::new(),
            aborted: Vec::new(),
            clock: None,
        }
    }
}

impl Sequencer for MockHardware {
    fn block(&self) -> Block {
        self.block
    }

    fn write_instruction(&mut self, address: u8, instruction: u16) {
        self.instructions[address as usize] = instruction;
        self.instruction_writes.push(address);
    }

    fn configure_pins(&mut self, base_pin: u8, count: u8) {
        self.pins = Some((base_pin, count));
    }

    fn init_unit(&mut self, unit: u8, config: &UnitConfig) {
        self.units[unit as usize] = Some(*config);
    }

    fn set_units_enabled(&mut self, mask: u8, enabled: bool) {
        if enabled {
            self.enabled |= mask;
            self.enable_order.push(mask);
        } else {
            self.enabled &= !mask;
        }
    }

    fn restart_units(&mut self, mask: u8) {
        self.restarted.push(mask);
    }

    fn clear_fifos(&mut self, _unit: u8) {}

    fn push(&mut self, unit: u8, word: u32) {
        self.pushed.push((unit, word));
    }

    fn clear_flag(&mut self, flag: u8) {
        self.cleared_flags.push(flag);
    }

    fn rx_fifo_address(&self, unit: u8) -> u32 {
        let base = match self.block {
            Block::Pio0 => 0x5020_0000,
            Block::Pio1 => 0x5030_0000,
        };
        base + 0x20 + 4 * u32::from(unit)
    }

    fn rx_dreq(&self, unit: u8) -> u8 {
        match self.block {
            Block::Pio0 => 4 + unit,
            Block::Pio1 => 12 + unit,
        }
    }

    fn set_frame_interrupt(&mut self, enabled: bool) {
        self.frame_interrupt = enabled;
    }
}

impl DmaController for MockHardware {
    fn claim(&mut self, channel: u8) -> bool {
        if channel >= DMA_CHANNELS || self.claimed & (1 << channel) != 0 {
            return false;
        }
        self.claimed |= 1 << channel;
        true
    }

    fn claim_unused(&mut self) -> Option<u8> {
        (0..DMA_CHANNELS).find(|ch| self.claim(*ch))
    }

    fn unclaim(&mut self, channel: u8) {
        self.claimed &= !(1 << channel);
    }

    unsafe fn start(&mut self, channel: u8, transfer: &DmaTransfer) {
        self.started.push((channel, *transfer));
    }

    fn abort(&mut self, channel: u8) {
        self.aborted.push(channel);
    }
}

impl ClockOutput for MockHardware {
    fn start_clock(&mut self, pin: u8, divider: u32) -> bool {
        self.clock = Some((pin, divider));
        true
    }
}
