//! PIO programs that regenerate the OV7670 parallel protocol.
//!
//! Two programs share one PIO block:
//! * the byte program runs on units 1..=3. Each waits for its own trigger flag, latches the data
//!   pins on the next PCLK rising edge and raises `BYTE_DONE_FLAG`.
//! * the frame program runs on unit 0. It is handed the line and chunk counts through its TX
//!   FIFO, follows VSYNC and HREF, and for each chunk runs an 8 instruction pixel body that says
//!   which byte unit takes each of the four bytes. It raises `FRAME_DONE_FLAG` at the end of the
//!   frame and stalls on the next pull.
//!
//! Pin indices in both programs are relative to the data base pin: D0..D7 at 0..=7, then PCLK,
//! HREF and VSYNC.

use crate::hw::Sequencer;
use pio::{pio_asm, Program, RP2040_MAX_PROGRAM_SIZE};

/// Unit running the frame program.
pub const FRAME_UNIT: u8 = 0;

/// Units running the byte program, one per plane.
pub const BYTE_UNITS: [u8; 3] = [1, 2, 3];

/// Mask of every unit this driver uses.
pub const ALL_UNITS: u8 = 0b1111;

/// Raised by the frame program when the last line has been read.
pub const FRAME_DONE_FLAG: u8 = 0;

/// Raised by a byte unit once it has latched a byte.
pub const BYTE_DONE_FLAG: u8 = 1;

/// Byte unit `n` is started by flag `4 + n`.
pub const TRIGGER_FLAG_BASE: u8 = 4;

/// Pins the capture path needs, starting at the base pin.
pub const DATA_PIN_COUNT: u8 = 11;

/// Instructions in a pixel body.
pub const BODY_LEN: usize = 8;

/// Where the pixel body starts inside the frame program.
pub const BODY_OFFSET: u8 = 7;

type Code = Program<RP2040_MAX_PROGRAM_SIZE>;

/// Byte capture program.
pub fn byte_program() -> Code {
    pio_asm!(
        "wait 1 irq 4 rel", // Trigger from the frame unit, 4 + unit
        "wait 1 pin 8",     // PCLK high
        "in pins, 8",
        "wait 0 pin 8",     // PCLK low
        "irq 1",            // Byte latched
    )
    .program
}

/// Frame control program. The `nop`s are the pixel body, replaced by `patch_body`.
pub fn frame_program() -> Code {
    pio_asm!(
        "pull block",
        "mov y, osr",       // Lines - 1
        "pull block",       // Chunks - 1, stays in OSR
        "wait 1 pin 10",    // VSYNC pulse
        "wait 0 pin 10",
        "line:",
        "mov x, osr",
        "wait 1 pin 9",     // HREF high
        "chunk:",
        "nop",
        "nop",
        "nop",
        "nop",
        "nop",
        "nop",
        "nop",
        "nop",
        "jmp x-- chunk",
        "wait 0 pin 9",     // HREF low
        "jmp y-- line",
        "irq 0",            // Frame done
    )
    .program
}

/// How the four bytes of a chunk are routed to the byte units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelBody {
    /// Every byte to unit 1.
    Packed,
    /// Y to unit 1, U to unit 2, Y to unit 1, V to unit 3.
    Planar,
}

impl PixelBody {
    /// Encoded instructions of this body.
    pub fn instructions(self) -> [u16; BODY_LEN] {
        let program = match self {
            PixelBody::Packed => pio_asm!(
                "irq 5",
                "wait 1 irq 1",
                "irq 5",
                "wait 1 irq 1",
                "irq 5",
                "wait 1 irq 1",
                "irq 5",
                "wait 1 irq 1",
            )
            .program,
            PixelBody::Planar => pio_asm!(
                "irq 5",
                "wait 1 irq 1",
                "irq 6",
                "wait 1 irq 1",
                "irq 5",
                "wait 1 irq 1",
                "irq 7",
                "wait 1 irq 1",
            )
            .program,
        };

        let mut body = [0; BODY_LEN];
        for (dst, src) in body.iter_mut().zip(program.code.iter()) {
            *dst = *src;
        }
        body
    }
}

/// A program as it sits in instruction memory. Addresses are absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedProgram {
    pub origin: u8,
    pub len: u8,
    pub wrap_target: u8,
    pub wrap_source: u8,
}

impl LoadedProgram {
    /// Absolute address of the pixel body, for the frame program.
    pub fn body_address(&self) -> u8 {
        self.origin + BODY_OFFSET
    }
}

/// Both programs after loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedPrograms {
    pub byte: LoadedProgram,
    pub frame: LoadedProgram,
}

/// Shift the target of a `jmp` by `offset`. Every other instruction is returned unchanged.
pub fn relocate(instruction: u16, offset: u8) -> u16 {
    const JMP: u16 = 0b000;
    const ADDRESS_MASK: u16 = 0x1F;

    if instruction >> 13 != JMP {
        return instruction;
    }

    let target = (instruction + u16::from(offset)) & ADDRESS_MASK;
    (instruction & !ADDRESS_MASK) | target
}

fn write_program<S: Sequencer>(seq: &mut S, program: &Code, origin: u8) -> LoadedProgram {
    for (i, instr) in program.code.iter().enumerate() {
        seq.write_instruction(origin + i as u8, relocate(*instr, origin));
    }

    LoadedProgram {
        origin,
        len: program.code.len() as u8,
        wrap_target: origin + program.wrap.target,
        wrap_source: origin + program.wrap.source,
    }
}

/// Write both programs to instruction memory: byte program at 0, frame program right after it.
pub fn load<S: Sequencer>(seq: &mut S) -> LoadedPrograms {
    let byte = write_program(seq, &byte_program(), 0);
    let frame = write_program(seq, &frame_program(), byte.len);

    log::debug!(
        "{:?}: byte program at {}, frame program at {}",
        seq.block(),
        byte.origin,
        frame.origin
    );

    LoadedPrograms { byte, frame }
}

/// Replace the pixel body of the loaded frame program. Nothing outside the body is written.
pub fn patch_body<S: Sequencer>(seq: &mut S, frame: &LoadedProgram, body: PixelBody) {
    let base = frame.body_address();
    for (i, instr) in body.instructions().iter().enumerate() {
        seq.write_instruction(base + i as u8, *instr);
    }
}

/// Start one frame: clear frame-done and hand the counts to the frame unit.
pub fn trigger<S: Sequencer>(seq: &mut S, lines: u32, chunks: u32) {
    seq.clear_flag(FRAME_DONE_FLAG);
    seq.push(FRAME_UNIT, lines - 1);
    seq.push(FRAME_UNIT, chunks - 1);
}
