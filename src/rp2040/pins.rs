//! GPIO function selection for the camera pins. The HAL pin types are not used here because the
//! data pins are chosen at runtime from the base pin.
//!
//! Wiring used by the demo firmware on a Raspberry Pi Pico:
//!
//!     I2C0 SDA:   GP4  <--> OV7670 SIOD
//!     I2C0 SCL:   GP5   --> OV7670 SIOC
//!     GPOUT0:     GP21  --> OV7670 XCLK
//!     PIO D0-D7:  GP6-GP13 <-- OV7670 D0-D7
//!     PIO PCLK:   GP14 <-- OV7670 PCLK
//!     PIO HREF:   GP15 <-- OV7670 HREF
//!     PIO VSYNC:  GP16 <-- OV7670 VSYNC

use crate::hw::Block;
use rp2040_hal::pac::{IO_BANK0, PADS_BANK0};

// IO_BANK0 GPIO_CTRL function numbers
const FUNCSEL_PIO0: u32 = 6;
const FUNCSEL_PIO1: u32 = 7;
const FUNCSEL_GPCK: u32 = 8;

/// Hand `pin` to a PIO block as an input.
pub fn pio_input(pin: u8, block: Block) {
    let io_regs = unsafe { &(*IO_BANK0::ptr()) };
    let pads_regs = unsafe { &(*PADS_BANK0::ptr()) };

    let funcsel = match block {
        Block::Pio0 => FUNCSEL_PIO0,
        Block::Pio1 => FUNCSEL_PIO1,
    };

    // Input buffer on, output driver off
    pads_regs
        .gpio(pin as usize)
        .modify(|_, w| w.ie().set_bit().od().set_bit());
    io_regs
        .gpio(pin as usize)
        .gpio_ctrl()
        .write(|w| unsafe { w.bits(funcsel) });
}

/// GPOUT generator that can drive `pin`, if any.
pub fn gpout_index(pin: u8) -> Option<usize> {
    match pin {
        21 => Some(0),
        23 => Some(1),
        24 => Some(2),
        25 => Some(3),
        _ => None,
    }
}

/// Route a GPOUT clock generator to `pin`.
pub fn clock_output(pin: u8) {
    let io_regs = unsafe { &(*IO_BANK0::ptr()) };
    let pads_regs = unsafe { &(*PADS_BANK0::ptr()) };

    pads_regs
        .gpio(pin as usize)
        .modify(|_, w| w.ie().clear_bit().od().clear_bit());
    io_regs
        .gpio(pin as usize)
        .gpio_ctrl()
        .write(|w| unsafe { w.bits(FUNCSEL_GPCK) });
}
