//! Hardware seams used by the acquisition engine.
//!
//! The engine only ever talks to the PIO block, the DMA controller and the sensor clock through
//! these traits. The `rp2040` feature provides the register level implementation, the unit tests
//! provide a recording mock.

/// One of the two PIO blocks. Each has four state machines ("units") and its own instruction
/// memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    Pio0,
    Pio1,
}

impl Block {
    pub fn index(self) -> usize {
        match self {
            Block::Pio0 => 0,
            Block::Pio1 => 1,
        }
    }
}

/// Width of a single DMA transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferSize {
    Byte,
    HalfWord,
    Word,
}

impl TransferSize {
    pub fn bytes(self) -> u32 {
        match self {
            TransferSize::Byte => 1,
            TransferSize::HalfWord => 2,
            TransferSize::Word => 4,
        }
    }

    /// Autopush threshold matching this width.
    pub fn bits(self) -> u8 {
        (self.bytes() * 8) as u8
    }

    /// Offset into the 32-bit RX FIFO register where a right-shifted value of this width lands.
    pub fn lane_offset(self) -> u32 {
        4 - self.bytes()
    }
}

/// State machine setup applied by `Sequencer::init_unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitConfig {
    /// Absolute instruction address the unit starts at.
    pub entry: u8,
    pub wrap_target: u8,
    pub wrap_source: u8,
    /// First GPIO sampled by `in pins` and `wait pin`.
    pub in_base: u8,
    pub autopush: bool,
    /// Bits shifted in before an autopush, 1..=32.
    pub push_threshold: u8,
    pub shift_right: bool,
    /// Integer clock divider, 1 runs the unit at the system clock.
    pub clock_divider: u16,
}

/// One DMA transfer from a capture unit into a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaTransfer {
    pub size: TransferSize,
    pub read_addr: u32,
    pub write_addr: u32,
    pub count: u32,
    /// Data request line pacing the transfer.
    pub dreq: u8,
    pub read_increment: bool,
    pub write_increment: bool,
}

/// A PIO block: instruction memory, four state machines and the interrupt flags shared by them.
pub trait Sequencer {
    fn block(&self) -> Block;

    /// Write one encoded instruction at an absolute address.
    fn write_instruction(&mut self, address: u8, instruction: u16);

    /// Hand `count` consecutive GPIOs starting at `base_pin` to this block as inputs.
    fn configure_pins(&mut self, base_pin: u8, count: u8);

    /// Apply `config` to `unit` and point its program counter at `config.entry`. The unit is
    /// left disabled.
    fn init_unit(&mut self, unit: u8, config: &UnitConfig);

    /// Enable or disable every unit in `mask` at once.
    fn set_units_enabled(&mut self, mask: u8, enabled: bool);

    /// Restart the units in `mask`, clearing shift counters and clock dividers.
    fn restart_units(&mut self, mask: u8);

    fn clear_fifos(&mut self, unit: u8);

    /// Push a word into the TX FIFO of `unit`, waiting for space.
    fn push(&mut self, unit: u8, word: u32);

    /// Clear one of the block's eight interrupt flags.
    fn clear_flag(&mut self, flag: u8);

    /// Bus address of the RX FIFO register of `unit`.
    fn rx_fifo_address(&self, unit: u8) -> u32;

    /// DMA request line raised when the RX FIFO of `unit` has data.
    fn rx_dreq(&self, unit: u8) -> u8;

    /// Route frame-done (flag 0) to the block's first interrupt line.
    fn set_frame_interrupt(&mut self, enabled: bool);
}

/// The DMA controller, addressed by channel number.
pub trait DmaController {
    /// Claim a specific channel. Returns `false` when it is already in use.
    fn claim(&mut self, channel: u8) -> bool;

    /// Claim any free channel.
    fn claim_unused(&mut self) -> Option<u8>;

    fn unclaim(&mut self, channel: u8);

    /// Program and trigger `channel`.
    ///
    /// # Safety
    ///
    /// The hardware writes `transfer.count` items to `transfer.write_addr` after this returns.
    /// The caller must keep that memory alive and untouched until the transfer completes or is
    /// aborted.
    unsafe fn start(&mut self, channel: u8, transfer: &DmaTransfer);

    /// Stop `channel`, waiting for in-flight writes to drain.
    fn abort(&mut self, channel: u8);
}

/// Clock source feeding the sensor's XCLK input.
pub trait ClockOutput {
    /// Drive `pin` with the system clock divided by `divider`. Returns `false` if the pin cannot
    /// output a clock.
    fn start_clock(&mut self, pin: u8, divider: u32) -> bool;
}
