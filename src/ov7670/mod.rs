//! OV7670 device driver: detection, bring-up and the register level mode controls.
//!
//! All methods borrow the bus for the duration of the call, so the same I2C peripheral can be
//! shared with other devices between calls.

pub mod regs;
pub mod sccb;

use embedded_hal::blocking::{delay::DelayMs, i2c};
use regs::*;
use sccb::{Sccb, SccbError};

/// Default XCLK frequency: 125 MHz system clock divided by 8.
pub const XCLK_HZ: u32 = 15_625_000;

/// Fastest frame rate the sensor is asked for.
pub const MAX_FPS: f32 = 30.0;

/// Number of PID reads before giving up on detection.
const DETECT_ATTEMPTS: u32 = 5;

/// PLL multipliers selectable through DBLV[7:6].
const PLL_RATIO: [u32; 4] = [1, 4, 6, 8];

/// Pixel clock per frame-per-second at VGA timing.
const PCLK_PER_FPS: f32 = 800_000.0;

/// Output encoding of the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colorspace {
    Rgb565,
    Yuv422,
}

/// Output size as a divisor of VGA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum FrameSize {
    /// 640x480
    Div1 = 0,
    /// 320x240
    Div2 = 1,
    /// 160x120
    Div4 = 2,
    /// 80x60
    Div8 = 3,
    /// 40x30
    Div16 = 4,
}

/// Timing window for one frame size, in VGA pixel and line units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameWindow {
    pub vstart: u16,
    pub hstart: u16,
    pub edge_offset: u8,
    pub pclk_delay: u8,
}

impl FrameSize {
    /// Output dimensions in pixels.
    pub fn dimensions(self) -> (u32, u32) {
        let shift = self as u32;
        (640 >> shift, 480 >> shift)
    }

    /// Empirically tuned window placement.
    pub fn window(self) -> FrameWindow {
        let (vstart, hstart, edge_offset, pclk_delay) = match self {
            FrameSize::Div1 => (9, 162, 2, 2),
            FrameSize::Div2 => (10, 174, 4, 2),
            FrameSize::Div4 => (11, 186, 2, 2),
            FrameSize::Div8 => (12, 210, 0, 2),
            FrameSize::Div16 => (15, 252, 3, 2),
        };

        FrameWindow {
            vstart,
            hstart,
            edge_offset,
            pclk_delay,
        }
    }
}

/// Night mode frame rate reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NightMode {
    Off,
    Half,
    Quarter,
    Eighth,
}

impl NightMode {
    fn com11_bits(self) -> u8 {
        match self {
            NightMode::Off => 0b0000_0000,
            NightMode::Half => 0b1010_0000,
            NightMode::Quarter => 0b1100_0000,
            NightMode::Eighth => 0b1110_0000,
        }
    }
}

/// Built-in test patterns. Bit 0 lands in XSC[7], bit 1 in YSC[7].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TestPattern {
    None = 0,
    Shifting1 = 1,
    ColorBar8 = 2,
    FadeToGray = 3,
}

/// Clock register values for a requested frame rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRate {
    pub dblv: u8,
    pub clkrc: u8,
    /// Frame rate these settings produce.
    pub fps: f32,
}

/// Pick the PLL multiplier and divider giving the fastest pixel clock not above the one `fps`
/// needs, with the sensor clocked at `xclk_hz`. Requests are clamped to 30 fps; requests below
/// what the slowest clock gives get the slowest clock.
pub fn frame_rate_settings(xclk_hz: u32, fps: f32) -> FrameRate {
    let fps = if fps > MAX_FPS { MAX_FPS } else { fps };
    let pclk_target = fps * PCLK_PER_FPS;
    let pclk_min = xclk_hz / 32;

    if pclk_target < pclk_min as f32 {
        return FrameRate {
            dblv: 0,
            clkrc: 31,
            fps: pclk_min as f32 / PCLK_PER_FPS,
        };
    }

    let mut best_pll = 0;
    let mut best_div = 1;
    let mut best_delta = MAX_FPS;

    for (p, ratio) in PLL_RATIO.iter().enumerate() {
        let xclk_pll = xclk_hz * ratio;
        let first_div = if p > 0 { 2 } else { 1 };

        for div in first_div..=32 {
            let pclk = xclk_pll / div;
            if pclk as f32 > pclk_target {
                continue;
            }

            let delta = fps - pclk as f32 / PCLK_PER_FPS;
            if delta < best_delta {
                best_delta = delta;
                best_pll = p;
                best_div = div;
            }
        }
    }

    let (dblv, clkrc) = if PLL_RATIO[best_pll] == best_div {
        // Multiplier and divider cancel, bypass both
        (0, 0x40)
    } else {
        ((best_pll as u8) << 6, (best_div - 1) as u8)
    };

    FrameRate {
        dblv,
        clkrc,
        fps: fps - best_delta,
    }
}

/// OV7670 driver.
pub struct Ov7670<I2C> {
    sccb: Sccb<I2C>,
    /// XCLK the sensor is driven with, for the frame rate math.
    xclk_hz: u32,
}

impl<I2C, E> Ov7670<I2C>
where
    I2C: i2c::Read<Error = E> + i2c::Write<Error = E>,
{
    /// Driver for a sensor clocked at `XCLK_HZ`.
    pub fn new() -> Self {
        Self::with_xclk(XCLK_HZ)
    }

    pub fn with_xclk(xclk_hz: u32) -> Self {
        Ov7670 {
            sccb: Sccb::new(),
            xclk_hz,
        }
    }

    /// Look for the sensor by reading its product ID, retrying while the bus or the sensor is
    /// still coming up.
    pub fn detect<D: DelayMs<u32>>(&self, i2c: &mut I2C, delay: &mut D) -> bool {
        for attempt in 1..=DETECT_ATTEMPTS {
            match self.sccb.read_register(i2c, Register::PID) {
                Ok(OV7670_PID) => {
                    log::info!("OV7670 found after {} attempt(s)", attempt);
                    return true;
                }
                Ok(pid) => log::debug!("unexpected PID {:#04x}", pid),
                Err(_) => log::debug!("PID read failed, attempt {}", attempt),
            }

            delay.delay_ms(100);
        }

        log::warn!("OV7670 not detected");
        false
    }

    /// Soft reset every register to its default, then wait for the sensor to come back.
    pub fn reset<D: DelayMs<u32>>(&self, i2c: &mut I2C, delay: &mut D) -> Result<(), SccbError<E>> {
        self.sccb.write_register(i2c, Register::COM7, COM7_RESET)?;
        delay.delay_ms(1000);
        Ok(())
    }

    /// Full bring-up. XCLK must already be running.
    pub fn begin<D: DelayMs<u32>>(
        &self,
        i2c: &mut I2C,
        delay: &mut D,
        colorspace: Colorspace,
        size: FrameSize,
    ) -> Result<(), SccbError<E>> {
        // Startup time from first XCLK edge is not specified, use tS:REG
        delay.delay_ms(300);
        self.reset(i2c, delay)?;

        self.sccb.write_register(i2c, Register::CLKRC, 1)?;
        self.sccb.write_register(i2c, Register::DBLV, 1 << 6)?;
        self.set_colorspace(i2c, delay, colorspace)?;
        self.sccb.write_list(i2c, delay, INIT)?;
        self.set_frame_geometry(i2c, size)?;

        // Settling time, 10 frames
        delay.delay_ms(300);
        Ok(())
    }

    pub fn set_colorspace<D: DelayMs<u32>>(
        &self,
        i2c: &mut I2C,
        delay: &mut D,
        colorspace: Colorspace,
    ) -> Result<(), SccbError<E>> {
        let list = match colorspace {
            Colorspace::Rgb565 => RGB565,
            Colorspace::Yuv422 => YUV422,
        };
        self.sccb.write_list(i2c, delay, list)
    }

    /// Program the clock for `fps` and return the frame rate actually achieved. With no bus the
    /// computation runs without touching the sensor.
    pub fn set_frame_rate(&self, i2c: Option<&mut I2C>, fps: f32) -> Result<f32, SccbError<E>> {
        let rate = frame_rate_settings(self.xclk_hz, fps);

        if let Some(i2c) = i2c {
            self.sccb.write_register(i2c, Register::DBLV, rate.dblv)?;
            self.sccb.write_register(i2c, Register::CLKRC, rate.clkrc)?;
            log::debug!(
                "{} fps requested, {} fps set (DBLV {:#04x}, CLKRC {:#04x})",
                fps,
                rate.fps,
                rate.dblv,
                rate.clkrc
            );
        }

        Ok(rate.fps)
    }

    /// Program scaling and the output window for `size`.
    pub fn set_frame_geometry(&self, i2c: &mut I2C, size: FrameSize) -> Result<(), SccbError<E>> {
        let s = size as u8;
        let scaled = size > FrameSize::Div1;
        let window = size.window();

        let mut com3 = if scaled { COM3_DCWEN } else { 0 };
        if size == FrameSize::Div16 {
            com3 |= COM3_SCALEEN;
        }
        self.sccb.write_register(i2c, Register::COM3, com3)?;

        let com14 = if scaled { 0x18 + s } else { 0 };
        self.sccb.write_register(i2c, Register::COM14, com14)?;

        // Downsampling tops out at 8, Div16 scales the rest
        let dcw = s.min(FrameSize::Div8 as u8);
        self.sccb.write_register(i2c, Register::SCALING_DCWCTR, dcw * 0x11)?;

        let pclk_div = if scaled { 0xF0 + s } else { 0x08 };
        self.sccb.write_register(i2c, Register::SCALING_PCLK_DIV, pclk_div)?;

        // Bit 7 of both is the test pattern, keep it
        let scale = if size == FrameSize::Div16 { 0x40 } else { 0x20 };
        self.sccb
            .modify_register(i2c, Register::SCALING_XSC, 0x7F, scale)?;
        self.sccb
            .modify_register(i2c, Register::SCALING_YSC, 0x7F, scale)?;

        let vstart = window.vstart;
        let hstart = window.hstart;
        let vstop = vstart + 480;
        let hstop = (hstart + 640) % 784;

        self.sccb
            .write_register(i2c, Register::HSTART, (hstart >> 3) as u8)?;
        self.sccb
            .write_register(i2c, Register::HSTOP, (hstop >> 3) as u8)?;
        let href = (window.edge_offset << 6) | (((hstop & 0b111) as u8) << 3) | (hstart & 0b111) as u8;
        self.sccb.write_register(i2c, Register::HREF, href)?;

        self.sccb
            .write_register(i2c, Register::VSTART, (vstart >> 2) as u8)?;
        self.sccb
            .write_register(i2c, Register::VSTOP, (vstop >> 2) as u8)?;
        let vref = (((vstop & 0b11) as u8) << 2) | (vstart & 0b11) as u8;
        self.sccb.write_register(i2c, Register::VREF, vref)?;

        self.sccb
            .write_register(i2c, Register::SCALING_PCLK_DELAY, window.pclk_delay)
    }

    pub fn set_mirror_flip(&self, i2c: &mut I2C, mirror: bool, flip: bool) -> Result<(), SccbError<E>> {
        let mut set = 0;
        if mirror {
            set |= MVFP_MIRROR;
        }
        if flip {
            set |= MVFP_VFLIP;
        }
        self.sccb
            .modify_register(i2c, Register::MVFP, MVFP_MIRROR | MVFP_VFLIP, set)
    }

    pub fn set_test_pattern(&self, i2c: &mut I2C, pattern: TestPattern) -> Result<(), SccbError<E>> {
        let bits = pattern as u8;
        let x = if bits & 1 != 0 { SCALING_TEST_PATTERN } else { 0 };
        let y = if bits & 2 != 0 { SCALING_TEST_PATTERN } else { 0 };
        self.sccb
            .modify_register(i2c, Register::SCALING_XSC, SCALING_TEST_PATTERN, x)?;
        self.sccb
            .modify_register(i2c, Register::SCALING_YSC, SCALING_TEST_PATTERN, y)
    }

    pub fn set_night_mode(&self, i2c: &mut I2C, mode: NightMode) -> Result<(), SccbError<E>> {
        self.sccb
            .modify_register(i2c, Register::COM11, COM11_NIGHT_MASK, mode.com11_bits())
    }
}

impl<I2C, E> Default for Ov7670<I2C>
where
    I2C: i2c::Read<Error = E> + i2c::Write<Error = E>,
{
    fn default() -> Self {
        Self::new()
    }
}
