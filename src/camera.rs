//! Frame acquisition engine.
//!
//! Owns the sensor bus, the PIO block and three DMA channels. A capture is armed by starting one
//! DMA transfer per plane and handing the frame unit its counts; from then on the hardware runs
//! on its own until the frame-done interrupt marks the capture ticket complete. Completion is
//! observed from normal context, either by the blocking capture's wait loop or by `poll`.

use crate::error::{CameraError, CaptureRejected};
use crate::format::{PixelFormat, MAX_PLANES};
use crate::frame_buf::FrameBuffer;
use crate::hw::{Block, ClockOutput, DmaController, DmaTransfer, Sequencer, TransferSize, UnitConfig};
use crate::ov7670::{Colorspace, FrameSize, NightMode, Ov7670, TestPattern};
use crate::program::{
    self, LoadedProgram, LoadedPrograms, PixelBody, ALL_UNITS, BYTE_DONE_FLAG, BYTE_UNITS,
    DATA_PIN_COUNT, FRAME_DONE_FLAG, FRAME_UNIT, TRIGGER_FLAG_BASE,
};
use crate::registry::{self, CaptureTicket, TicketState};
use alloc::boxed::Box;
use embedded_hal::blocking::{delay::DelayMs, i2c};

/// Frame width the capture path supports (VGA / 8).
pub const CAMERA_WIDTH_DIV8: u32 = 80;

/// Frame height the capture path supports (VGA / 8).
pub const CAMERA_HEIGHT_DIV8: u32 = 60;

/// Default XCLK output pin, GPOUT0.
pub const DEFAULT_XCLK_PIN: u8 = 21;

/// Default XCLK divider, 125 MHz / 8 = 15.625 MHz.
pub const DEFAULT_XCLK_DIVIDER: u32 = 8;

/// System clock XCLK is divided from.
pub const SYS_CLOCK_HZ: u32 = 125_000_000;

/// How DMA channels are reserved at init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaChannels {
    /// Exactly `base`, `base + 1` and `base + 2`.
    Fixed(u8),
    /// Any three free channels.
    Dynamic,
}

/// Board level wiring and policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformConfig {
    /// PIO block dedicated to the camera.
    pub block: Block,
    /// D0. D1..D7, PCLK, HREF and VSYNC follow on consecutive pins.
    pub base_pin: u8,
    /// Pin driving the sensor's XCLK.
    pub xclk_pin: u8,
    /// System clock divider for XCLK.
    pub xclk_divider: u32,
    pub dma_channels: DmaChannels,
    /// Give up on a blocking capture after this many milliseconds. `None` waits forever.
    pub capture_timeout_ms: Option<u32>,
}

impl PlatformConfig {
    pub fn new(block: Block, base_pin: u8) -> Self {
        PlatformConfig {
            block,
            base_pin,
            xclk_pin: DEFAULT_XCLK_PIN,
            xclk_divider: DEFAULT_XCLK_DIVIDER,
            dma_channels: DmaChannels::Dynamic,
            capture_timeout_ms: None,
        }
    }

    /// Drive XCLK from `pin` at `SYS_CLOCK_HZ / divider`. The sensor's frame rate settings
    /// follow the divider.
    pub fn xclk(mut self, pin: u8, divider: u32) -> Self {
        self.xclk_pin = pin;
        self.xclk_divider = divider;
        self
    }

    /// XCLK frequency produced by `xclk_divider`.
    pub fn xclk_hz(&self) -> u32 {
        SYS_CLOCK_HZ / self.xclk_divider.max(1)
    }

    pub fn dma_channels(mut self, channels: DmaChannels) -> Self {
        self.dma_channels = channels;
        self
    }

    pub fn capture_timeout_ms(mut self, timeout: Option<u32>) -> Self {
        self.capture_timeout_ms = timeout;
        self
    }
}

/// DMA and byte unit setup for one plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneConfig {
    pub transfer: TransferSize,
    /// Transfers per frame.
    pub count: u32,
    /// Byte offset into the RX FIFO register the DMA reads from.
    pub read_offset: u32,
    pub unit: UnitConfig,
}

/// Everything needed to arm a capture of one `(format, width, height)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub planes: heapless::Vec<PlaneConfig, MAX_PLANES>,
    pub frame_unit: UnitConfig,
    pub body: PixelBody,
    /// Lines per frame.
    pub lines: u32,
    /// Pixel body iterations per line.
    pub chunks: u32,
}

impl CaptureConfig {
    /// Derive the configuration for a frame shape.
    pub fn derive(
        format: PixelFormat,
        width: u32,
        height: u32,
        programs: &LoadedPrograms,
        base_pin: u8,
    ) -> Self {
        let mut planes = heapless::Vec::new();

        for plane in 0..format.plane_count() {
            let transfer = format.transfer_size(plane);
            let config = PlaneConfig {
                transfer,
                count: format.plane_size(plane, width, height) / transfer.bytes(),
                read_offset: transfer.lane_offset(),
                unit: unit_config(&programs.byte, base_pin, Some(transfer.bits())),
            };
            // Plane count never exceeds MAX_PLANES
            let _ = planes.push(config);
        }

        let body = if format.is_planar() {
            PixelBody::Planar
        } else {
            PixelBody::Packed
        };

        CaptureConfig {
            format,
            width,
            height,
            planes,
            frame_unit: unit_config(&programs.frame, base_pin, None),
            body,
            lines: height,
            chunks: width / format.pixels_per_chunk(),
        }
    }

    pub fn matches(&self, buffer: &FrameBuffer) -> bool {
        buffer.matches(self.format, self.width, self.height)
    }

    /// Mask of the byte units this format uses.
    fn byte_unit_mask(&self) -> u8 {
        BYTE_UNITS
            .iter()
            .take(self.planes.len())
            .fold(0, |mask, unit| mask | (1u8 << *unit))
    }
}

fn unit_config(program: &LoadedProgram, base_pin: u8, autopush: Option<u8>) -> UnitConfig {
    UnitConfig {
        entry: program.origin,
        wrap_target: program.wrap_target,
        wrap_source: program.wrap_source,
        in_base: base_pin,
        autopush: autopush.is_some(),
        push_threshold: autopush.unwrap_or(32),
        shift_right: true,
        clock_divider: 1,
    }
}

/// Start XCLK and bring the sensor up in its default mode.
fn bring_up<HW, I2C, D, E>(
    sensor: &Ov7670<I2C>,
    platform: &PlatformConfig,
    hw: &mut HW,
    i2c: &mut I2C,
    delay: &mut D,
) -> Result<(), CameraError<E>>
where
    HW: ClockOutput,
    I2C: i2c::Read<Error = E> + i2c::Write<Error = E>,
    D: DelayMs<u32>,
{
    if !hw.start_clock(platform.xclk_pin, platform.xclk_divider) {
        return Err(CameraError::ClockPin(platform.xclk_pin));
    }
    delay.delay_ms(300);

    if !sensor.detect(i2c, delay) {
        return Err(CameraError::Detection);
    }
    sensor.begin(i2c, delay, Colorspace::Rgb565, FrameSize::Div8)?;
    Ok(())
}

/// Reserve one channel per possible plane.
fn reserve_dma<HW: DmaController>(
    hw: &mut HW,
    strategy: DmaChannels,
) -> Option<heapless::Vec<u8, MAX_PLANES>> {
    let mut channels: heapless::Vec<u8, MAX_PLANES> = heapless::Vec::new();

    for i in 0..MAX_PLANES as u8 {
        let claimed = match strategy {
            DmaChannels::Fixed(base) => {
                let channel = base + i;
                if hw.claim(channel) {
                    Some(channel)
                } else {
                    None
                }
            }
            DmaChannels::Dynamic => hw.claim_unused(),
        };

        match claimed {
            Some(channel) => {
                let _ = channels.push(channel);
            }
            None => {
                for channel in channels.iter() {
                    hw.unclaim(*channel);
                }
                return None;
            }
        }
    }

    Some(channels)
}

/// Completion callback of a non-blocking capture.
type Callback = Box<dyn FnOnce(FrameBuffer)>;

/// The outstanding non-blocking capture.
struct Pending {
    buffer: FrameBuffer,
    on_complete: Option<Callback>,
}

/// OV7670 capture engine.
pub struct Camera<HW, I2C, D>
where
    HW: Sequencer + DmaController + ClockOutput,
{
    hw: HW,
    i2c: I2C,
    delay: D,
    sensor: Ov7670<I2C>,
    platform: PlatformConfig,
    programs: LoadedPrograms,
    dma_channels: heapless::Vec<u8, MAX_PLANES>,
    config: Option<CaptureConfig>,
    /// `None` once terminated.
    ticket: Option<&'static CaptureTicket>,
    pending: Option<Pending>,
}

impl<HW, I2C, D, E> Camera<HW, I2C, D>
where
    HW: Sequencer + DmaController + ClockOutput,
    I2C: i2c::Read<Error = E> + i2c::Write<Error = E>,
    D: DelayMs<u32>,
{
    /// Claim the hardware and bring up the sensor.
    /// * Binds the PIO block and reserves three DMA channels. Nothing else is touched if either
    ///   is already taken.
    /// * Starts XCLK, finds the sensor on the bus and runs its bring-up sequence, RGB565 at
    ///   80x60. The block and channels are given back if this fails.
    /// * Loads both programs.
    /// * User must call `configure` (or capture with `allow_reconfigure`) before capturing.
    pub fn init(
        platform: PlatformConfig,
        mut hw: HW,
        mut i2c: I2C,
        mut delay: D,
    ) -> Result<Self, CameraError<E>> {
        let ticket = registry::bind(platform.block).ok_or(CameraError::SequencerBusy)?;

        let dma_channels = match reserve_dma(&mut hw, platform.dma_channels) {
            Some(channels) => channels,
            None => {
                registry::unbind(platform.block);
                return Err(CameraError::DmaUnavailable);
            }
        };

        let sensor = Ov7670::with_xclk(platform.xclk_hz());
        if let Err(e) = bring_up(&sensor, &platform, &mut hw, &mut i2c, &mut delay) {
            for channel in dma_channels.iter() {
                hw.unclaim(*channel);
            }
            registry::unbind(platform.block);
            return Err(e);
        }

        let programs = program::load(&mut hw);
        hw.configure_pins(platform.base_pin, DATA_PIN_COUNT);
        hw.clear_flag(FRAME_DONE_FLAG);
        hw.set_frame_interrupt(true);

        log::info!(
            "camera ready on {:?}, data pins {}..{}, DMA channels {:?}",
            platform.block,
            platform.base_pin,
            platform.base_pin + DATA_PIN_COUNT - 1,
            dma_channels
        );

        Ok(Camera {
            hw,
            i2c,
            delay,
            sensor,
            platform,
            programs,
            dma_channels,
            config: None,
            ticket: Some(ticket),
            pending: None,
        })
    }

    fn ticket(&self) -> Result<&'static CaptureTicket, CameraError<E>> {
        self.ticket.ok_or(CameraError::Terminated)
    }

    /// Switch the capture path to a new frame shape. Only 80x60 is supported.
    ///
    /// Shape and busy errors change nothing. An `Sccb` error leaves the camera unconfigured, as
    /// the sensor may be half written; configure again before capturing.
    pub fn configure(
        &mut self,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Result<(), CameraError<E>> {
        let ticket = self.ticket()?;

        if (width, height) != FrameSize::Div8.dimensions() {
            return Err(CameraError::ConfigurationMismatch);
        }
        if self.pending.is_some() || ticket.state() != TicketState::Idle {
            return Err(CameraError::ConcurrentCapture);
        }

        // Half-written sensor state must not be captured from
        self.config = None;

        let colorspace = match format {
            PixelFormat::Rgb565 => Colorspace::Rgb565,
            PixelFormat::Yuyv | PixelFormat::Yuv422Planar => Colorspace::Yuv422,
        };
        self.sensor
            .set_colorspace(&mut self.i2c, &mut self.delay, colorspace)?;
        self.sensor
            .set_frame_geometry(&mut self.i2c, FrameSize::Div8)?;

        let config = CaptureConfig::derive(
            format,
            width,
            height,
            &self.programs,
            self.platform.base_pin,
        );
        self.apply(&config);

        log::info!("configured {:?} {}x{}", format, width, height);
        self.config = Some(config);
        Ok(())
    }

    /// Check everything that can refuse a capture, then start the hardware. Nothing is touched
    /// if this fails before the DMA is started.
    fn arm(&mut self, buffer: &mut FrameBuffer, allow_reconfigure: bool) -> Result<(), CameraError<E>> {
        let ticket = self.ticket()?;

        if self.pending.is_some() || ticket.state() != TicketState::Idle {
            return Err(CameraError::ConcurrentCapture);
        }

        let configured = self.config.as_ref().map_or(false, |c| c.matches(buffer));
        if !configured {
            if !allow_reconfigure {
                return Err(CameraError::ConfigurationMismatch);
            }
            self.configure(buffer.format(), buffer.width(), buffer.height())?;
        }

        if !buffer.is_well_formed() {
            return Err(CameraError::ConfigurationMismatch);
        }

        let config = self.config.as_ref().ok_or(CameraError::ConfigurationMismatch)?;
        let (lines, chunks) = (config.lines, config.chunks);

        for (i, (plane, data)) in config.planes.iter().zip(buffer.planes_mut()).enumerate() {
            let unit = BYTE_UNITS[i];
            let transfer = DmaTransfer {
                size: plane.transfer,
                read_addr: self.hw.rx_fifo_address(unit) + plane.read_offset,
                write_addr: data.dma_address(),
                count: plane.count,
                dreq: self.hw.rx_dreq(unit),
                read_increment: false,
                write_increment: true,
            };

            // The buffer is either borrowed for the whole blocking capture or moved into
            // `pending`, and transfers are aborted before it is handed back early
            unsafe { self.hw.start(self.dma_channels[i], &transfer) };
        }

        if !ticket.arm() {
            self.stop_transfers();
            return Err(CameraError::ConcurrentCapture);
        }

        program::trigger(&mut self.hw, lines, chunks);
        Ok(())
    }

    /// Capture one frame into `buffer` and wait for it.
    pub fn capture_blocking(
        &mut self,
        buffer: &mut FrameBuffer,
        allow_reconfigure: bool,
    ) -> Result<(), CameraError<E>> {
        self.arm(buffer, allow_reconfigure)?;
        let ticket = self.ticket()?;

        let mut waited_ms = 0;
        loop {
            if ticket.take_complete() {
                return Ok(());
            }

            if let Some(timeout) = self.platform.capture_timeout_ms {
                if waited_ms >= timeout {
                    log::warn!("capture timed out after {} ms", waited_ms);
                    self.abort();
                    return Err(CameraError::Timeout);
                }
            }

            self.delay.delay_ms(1);
            waited_ms += 1;
        }
    }

    /// Start capturing into `buffer` and return immediately. `on_complete` gets the buffer back
    /// from `poll` once the frame is in.
    pub fn capture_async<F>(
        &mut self,
        buffer: FrameBuffer,
        allow_reconfigure: bool,
        on_complete: F,
    ) -> Result<(), CaptureRejected<E>>
    where
        F: FnOnce(FrameBuffer) + 'static,
    {
        self.start(buffer, allow_reconfigure, Some(Box::new(on_complete)))
    }

    /// Start capturing into `buffer` and return immediately. `poll` returns the buffer once the
    /// frame is in.
    pub fn start_capture(
        &mut self,
        buffer: FrameBuffer,
        allow_reconfigure: bool,
    ) -> Result<(), CaptureRejected<E>> {
        self.start(buffer, allow_reconfigure, None)
    }

    fn start(
        &mut self,
        mut buffer: FrameBuffer,
        allow_reconfigure: bool,
        on_complete: Option<Callback>,
    ) -> Result<(), CaptureRejected<E>> {
        match self.arm(&mut buffer, allow_reconfigure) {
            Ok(()) => {
                self.pending = Some(Pending {
                    buffer,
                    on_complete,
                });
                Ok(())
            }
            Err(error) => Err(CaptureRejected { error, buffer }),
        }
    }

    /// Stop an outstanding capture and get its buffer back. The frame contents are undefined.
    pub fn cancel(&mut self) -> Option<FrameBuffer> {
        let pending = self.pending.take();
        self.abort();
        pending.map(|p| p.buffer)
    }

    /// Stop the hardware mid-frame and leave the engine ready for the next capture.
    fn abort(&mut self) {
        self.stop_transfers();
        if let Some(ticket) = self.ticket {
            ticket.reset();
        }
        if let Some(config) = self.config.take() {
            self.apply(&config);
            self.config = Some(config);
        }
    }

    /// Apply `config` to the PIO block. Units are stopped and restarted so the frame unit waits
    /// for a fresh VSYNC.
    fn apply(&mut self, config: &CaptureConfig) {
        let hw = &mut self.hw;

        hw.set_units_enabled(ALL_UNITS, false);
        program::patch_body(hw, &self.programs.frame, config.body);

        for unit in 0..4 {
            hw.clear_fifos(unit);
        }
        hw.clear_flag(FRAME_DONE_FLAG);
        hw.clear_flag(BYTE_DONE_FLAG);
        for unit in BYTE_UNITS.iter() {
            hw.clear_flag(TRIGGER_FLAG_BASE + unit);
        }

        for (plane, unit) in config.planes.iter().zip(BYTE_UNITS.iter()) {
            hw.init_unit(*unit, &plane.unit);
        }
        hw.init_unit(FRAME_UNIT, &config.frame_unit);

        let byte_units = config.byte_unit_mask();
        hw.restart_units(byte_units | 1 << FRAME_UNIT);

        // Byte units must be waiting on their trigger before the frame unit can raise one
        hw.set_units_enabled(byte_units, true);
        hw.set_units_enabled(1 << FRAME_UNIT, true);
    }

    /// Current configuration, if any.
    pub fn config(&self) -> Option<&CaptureConfig> {
        self.config.as_ref()
    }

    pub fn set_frame_rate(&mut self, fps: f32) -> Result<f32, CameraError<E>> {
        Ok(self.sensor.set_frame_rate(Some(&mut self.i2c), fps)?)
    }

    pub fn set_mirror_flip(&mut self, mirror: bool, flip: bool) -> Result<(), CameraError<E>> {
        Ok(self.sensor.set_mirror_flip(&mut self.i2c, mirror, flip)?)
    }

    pub fn set_test_pattern(&mut self, pattern: TestPattern) -> Result<(), CameraError<E>> {
        Ok(self.sensor.set_test_pattern(&mut self.i2c, pattern)?)
    }

    pub fn set_night_mode(&mut self, mode: NightMode) -> Result<(), CameraError<E>> {
        Ok(self.sensor.set_night_mode(&mut self.i2c, mode)?)
    }
}

impl<HW, I2C, D> Camera<HW, I2C, D>
where
    HW: Sequencer + DmaController + ClockOutput,
{
    /// Dispatch a completed non-blocking capture. With a callback the buffer is handed to it and
    /// `None` is returned, otherwise the buffer is returned.
    pub fn poll(&mut self) -> Option<FrameBuffer> {
        let ticket = self.ticket?;
        if self.pending.is_none() || !ticket.take_complete() {
            return None;
        }

        let pending = self.pending.take()?;
        match pending.on_complete {
            Some(on_complete) => {
                on_complete(pending.buffer);
                None
            }
            None => Some(pending.buffer),
        }
    }

    /// Whether a capture is outstanding.
    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
            || self
                .ticket
                .map_or(false, |t| t.state() != TicketState::Idle)
    }

    /// Channels reserved at init.
    pub fn dma_channels(&self) -> &[u8] {
        &self.dma_channels
    }

    fn stop_transfers(&mut self) {
        self.hw.set_units_enabled(ALL_UNITS, false);
        for channel in self.dma_channels.iter() {
            self.hw.abort(*channel);
        }
    }

    /// Stop the hardware and give back everything `init` claimed. Safe to call more than once,
    /// and run on drop.
    pub fn terminate(&mut self) {
        if self.ticket.take().is_none() {
            return;
        }

        self.stop_transfers();
        self.hw.set_frame_interrupt(false);
        self.hw.clear_flag(FRAME_DONE_FLAG);
        registry::unbind(self.platform.block);

        for channel in self.dma_channels.iter() {
            self.hw.unclaim(*channel);
        }
        self.dma_channels.clear();

        self.pending = None;
        self.config = None;
        log::info!("camera on {:?} terminated", self.platform.block);
    }

    #[cfg(test)]
    pub(crate) fn hardware(&self) -> &HW {
        &self.hw
    }
}

impl<HW, I2C, D> Drop for Camera<HW, I2C, D>
where
    HW: Sequencer + DmaController + ClockOutput,
{
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDelay, MockHardware, MockI2c};
    use crate::ov7670::regs::{Register, OV7670_PID};
    use crate::ov7670::sccb::SccbError;
    use alloc::rc::Rc;
    use core::cell::RefCell;
    use serial_test::serial;

    type TestCamera = Camera<MockHardware, MockI2c, MockDelay>;

    fn sensor() -> MockI2c {
        let mut i2c = MockI2c::new();
        i2c.regs[Register::PID as usize] = OV7670_PID;
        i2c
    }

    fn camera_with(platform: PlatformConfig, delay: MockDelay) -> TestCamera {
        Camera::init(platform, MockHardware::new(), sensor(), delay).unwrap()
    }

    fn camera() -> TestCamera {
        camera_with(PlatformConfig::new(Block::Pio0, 0), MockDelay::new())
    }

    fn frame(format: PixelFormat) -> FrameBuffer {
        FrameBuffer::allocate(format, CAMERA_WIDTH_DIV8, CAMERA_HEIGHT_DIV8).unwrap()
    }

    #[test]
    #[serial]
    fn init_reserves_three_channels() {
        let cam = camera();
        assert_eq!(cam.dma_channels().len(), 3);
        assert_eq!(cam.hardware().claimed.count_ones(), 3);
        assert!(cam.hardware().frame_interrupt);
        assert_eq!(cam.hardware().pins, Some((0, 11)));
        assert_eq!(cam.hardware().clock, Some((DEFAULT_XCLK_PIN, DEFAULT_XCLK_DIVIDER)));
    }

    #[test]
    #[serial]
    fn fixed_channels_roll_back_on_conflict() {
        let mut hw = MockHardware::new();
        hw.claimed = 1 << 6;
        let platform = PlatformConfig::new(Block::Pio0, 0).dma_channels(DmaChannels::Fixed(4));

        let result = Camera::init(platform, hw, sensor(), MockDelay::new());
        assert_eq!(result.err(), Some(CameraError::DmaUnavailable));
    }

    #[test]
    #[serial]
    fn missing_sensor_is_a_detection_error() {
        let platform = PlatformConfig::new(Block::Pio0, 0);
        let result = Camera::init(platform, MockHardware::new(), MockI2c::new(), MockDelay::new());
        assert_eq!(result.err(), Some(CameraError::Detection));
    }

    #[test]
    #[serial]
    fn second_camera_on_same_block_is_refused() {
        let mut first = camera();
        first.start_capture(frame(PixelFormat::Yuyv), true).unwrap();

        let mut bus = sensor();
        let platform = PlatformConfig::new(Block::Pio0, 0);
        let result = Camera::init(platform, MockHardware::new(), &mut bus, MockDelay::new());
        assert_eq!(result.err(), Some(CameraError::SequencerBusy));

        // The sensor belongs to the first camera and must not be reset under it
        assert!(bus.writes.is_empty());
        assert_eq!(bus.reads, 0);
        assert!(first.is_busy());
        assert!(registry::signal_frame_done(Block::Pio0));
        assert!(first.poll().is_some());
    }

    #[test]
    #[serial]
    fn busy_dma_refuses_before_touching_the_sensor() {
        let mut hw = MockHardware::new();
        hw.claimed = 1 << 6;
        let mut bus = sensor();
        let platform = PlatformConfig::new(Block::Pio0, 0).dma_channels(DmaChannels::Fixed(4));

        let result = Camera::init(platform, hw, &mut bus, MockDelay::new());
        assert_eq!(result.err(), Some(CameraError::DmaUnavailable));
        assert!(bus.writes.is_empty());
        assert_eq!(bus.reads, 0);

        // Block was handed back
        let _cam = camera();
    }

    #[test]
    #[serial]
    fn failed_detection_releases_the_block() {
        let platform = PlatformConfig::new(Block::Pio0, 0);
        let result = Camera::init(platform, MockHardware::new(), MockI2c::new(), MockDelay::new());
        assert_eq!(result.err(), Some(CameraError::Detection));

        let cam = camera();
        assert_eq!(cam.dma_channels().len(), 3);
    }

    #[test]
    #[serial]
    fn planar_config() {
        let mut cam = camera();
        cam.configure(PixelFormat::Yuv422Planar, 80, 60).unwrap();

        let config = cam.config().unwrap();
        assert_eq!(config.chunks, 40);
        assert_eq!(config.lines, 60);
        assert_eq!(config.body, PixelBody::Planar);

        let luma = config.planes[0];
        assert_eq!((luma.transfer, luma.count, luma.read_offset), (TransferSize::HalfWord, 2400, 2));
        assert_eq!(luma.unit.push_threshold, 16);
        let chroma = config.planes[1];
        assert_eq!((chroma.transfer, chroma.count, chroma.read_offset), (TransferSize::Byte, 2400, 3));

        // Byte units first, frame unit last
        assert_eq!(cam.hardware().enabled, 0b1111);
        assert_eq!(cam.hardware().enable_order.last(), Some(&0b0001));
    }

    #[test]
    #[serial]
    fn packed_config_uses_one_word_channel() {
        let mut cam = camera();
        cam.configure(PixelFormat::Rgb565, 80, 60).unwrap();

        let config = cam.config().unwrap();
        assert_eq!(config.planes.len(), 1);
        assert_eq!((config.planes[0].count, config.planes[0].read_offset), (2400, 0));
        assert_eq!(cam.hardware().enabled, 0b0011);
    }

    #[test]
    #[serial]
    fn only_80x60_is_accepted() {
        let mut cam = camera();
        assert_eq!(
            cam.configure(PixelFormat::Rgb565, 160, 120),
            Err(CameraError::ConfigurationMismatch)
        );
        assert!(cam.config().is_none());
    }

    #[test]
    #[serial]
    fn bus_error_during_configure_unconfigures() {
        let mut cam = camera();
        cam.configure(PixelFormat::Rgb565, 80, 60).unwrap();

        cam.i2c.failing = true;
        assert_eq!(
            cam.configure(PixelFormat::Yuyv, 80, 60),
            Err(CameraError::Sccb(SccbError::I2cWrite(())))
        );
        assert!(cam.config().is_none());

        let mut buf = frame(PixelFormat::Rgb565);
        assert_eq!(
            cam.capture_blocking(&mut buf, false),
            Err(CameraError::ConfigurationMismatch)
        );
        assert!(cam.hardware().started.is_empty());
    }

    #[test]
    #[serial]
    fn slower_xclk_lowers_the_frame_rate() {
        let platform = PlatformConfig::new(Block::Pio0, 0).xclk(DEFAULT_XCLK_PIN, 16);
        let mut cam = camera_with(platform, MockDelay::new());

        assert_eq!(cam.hardware().clock, Some((DEFAULT_XCLK_PIN, 16)));
        let fps = cam.set_frame_rate(15.0).unwrap();
        assert!((fps - 14.6484375).abs() < 1e-3);
    }

    #[test]
    #[serial]
    fn mismatched_buffer_without_reconfigure() {
        let mut cam = camera();
        cam.configure(PixelFormat::Rgb565, 80, 60).unwrap();

        let mut buf = frame(PixelFormat::Yuyv);
        assert_eq!(
            cam.capture_blocking(&mut buf, false),
            Err(CameraError::ConfigurationMismatch)
        );
        assert!(cam.hardware().started.is_empty());
        assert!(!cam.is_busy());
    }

    #[test]
    #[serial]
    fn blocking_capture_completes_on_interrupt() {
        let delay = MockDelay::new();
        let signal = delay.signal_handle();
        let mut cam = camera_with(PlatformConfig::new(Block::Pio0, 0), delay);
        cam.configure(PixelFormat::Yuv422Planar, 80, 60).unwrap();

        let mut buf = frame(PixelFormat::Yuv422Planar);
        signal.set(Some((Block::Pio0, 3)));
        cam.capture_blocking(&mut buf, false).unwrap();

        let hw = cam.hardware();
        assert_eq!(hw.started.len(), 3);
        assert_eq!(hw.started[0].1.read_addr, hw.rx_fifo_address(1) + 2);
        assert_eq!(hw.started[2].1.dreq, hw.rx_dreq(3));
        assert_eq!(&hw.pushed[hw.pushed.len() - 2..], &[(FRAME_UNIT, 59), (FRAME_UNIT, 39)]);
        assert!(!cam.is_busy());
    }

    #[test]
    #[serial]
    fn async_capture_excludes_others_until_dispatched() {
        let mut cam = camera();
        let delivered = Rc::new(RefCell::new(None));
        let sink = delivered.clone();

        let mut first = frame(PixelFormat::Yuyv);
        first.planes_mut()[0].data_mut()[0] = 0xA5;
        cam.capture_async(first, true, move |buf| {
            *sink.borrow_mut() = Some(buf);
        })
        .unwrap();
        assert!(cam.is_busy());
        let started = cam.hardware().started.len();
        let pushed = cam.hardware().pushed.len();

        let rejected = cam.start_capture(frame(PixelFormat::Rgb565), true).unwrap_err();
        assert_eq!(rejected.error, CameraError::ConcurrentCapture);
        assert_eq!(rejected.buffer.format(), PixelFormat::Rgb565);

        let mut other = frame(PixelFormat::Rgb565);
        assert_eq!(
            cam.capture_blocking(&mut other, true),
            Err(CameraError::ConcurrentCapture)
        );
        assert_eq!(
            cam.configure(PixelFormat::Yuyv, 80, 60),
            Err(CameraError::ConcurrentCapture)
        );

        // Rejections never reach the DMA or the frame unit
        assert_eq!(cam.hardware().started.len(), started);
        assert_eq!(cam.hardware().pushed.len(), pushed);
        assert_eq!(cam.config().map(|c| c.format), Some(PixelFormat::Yuyv));

        // Nothing delivered before the frame-done interrupt
        assert!(cam.poll().is_none());
        assert!(delivered.borrow().is_none());

        assert!(registry::signal_frame_done(Block::Pio0));
        assert!(cam.poll().is_none());
        let buf = delivered.borrow_mut().take().unwrap();
        assert_eq!(buf.format(), PixelFormat::Yuyv);
        assert_eq!(buf.plane(0).map(|p| p.data()[0]), Some(0xA5));
        assert!(!cam.is_busy());

        // Late duplicate interrupt changes nothing
        assert!(!registry::signal_frame_done(Block::Pio0));
        assert!(cam.poll().is_none());
    }

    #[test]
    #[serial]
    fn start_capture_returns_buffer_from_poll() {
        let mut cam = camera();
        cam.start_capture(frame(PixelFormat::Yuyv), true).unwrap();

        registry::signal_frame_done(Block::Pio0);
        let buf = cam.poll().unwrap();
        assert_eq!(buf.format(), PixelFormat::Yuyv);
    }

    #[test]
    #[serial]
    fn timeout_stops_hardware() {
        let platform = PlatformConfig::new(Block::Pio0, 0).capture_timeout_ms(Some(5));
        let mut cam = camera_with(platform, MockDelay::new());

        let mut buf = frame(PixelFormat::Rgb565);
        assert_eq!(cam.capture_blocking(&mut buf, true), Err(CameraError::Timeout));

        let channel = cam.dma_channels()[0];
        assert!(cam.hardware().aborted.contains(&channel));
        assert!(!cam.is_busy());

        // Ready for the next frame
        cam.start_capture(buf, false).unwrap();
        registry::signal_frame_done(Block::Pio0);
        assert!(cam.poll().is_some());
    }

    #[test]
    #[serial]
    fn cancel_returns_pending_buffer() {
        let mut cam = camera();
        cam.start_capture(frame(PixelFormat::Rgb565), true).unwrap();

        assert!(cam.cancel().is_some());
        assert!(!cam.is_busy());
        assert!(cam.cancel().is_none());
    }

    #[test]
    #[serial]
    fn terminate_is_idempotent() {
        let mut cam = camera();
        cam.start_capture(frame(PixelFormat::Rgb565), true).unwrap();

        cam.terminate();
        cam.terminate();

        assert_eq!(cam.hardware().claimed, 0);
        assert!(!cam.hardware().frame_interrupt);
        assert_eq!(cam.hardware().enabled, 0);
        assert!(!cam.is_busy());
        assert!(!registry::signal_frame_done(Block::Pio0));

        let rejected = cam.start_capture(frame(PixelFormat::Rgb565), true).unwrap_err();
        assert_eq!(rejected.error, CameraError::Terminated);

        // The block is free again
        drop(cam);
        let _next = camera();
    }

    #[test]
    #[serial]
    fn sensor_controls_reach_the_bus() {
        let mut cam = camera();
        assert!(cam.set_frame_rate(30.0).unwrap() > 29.0);
        cam.set_night_mode(NightMode::Half).unwrap();
        cam.set_mirror_flip(true, true).unwrap();
        cam.set_test_pattern(TestPattern::None).unwrap();
    }
}
