//! Capture demo for a Raspberry Pi Pico wired to an OV7670 (see `rp2040::pins` for the wiring).
//! Grabs RGB565 frames forever and logs a few pixels of each over RTT.

#![no_main]
#![no_std]

use pio_camera::hw::Block;
use pio_camera::rp2040::{self, heap::CameraHeap, Rp2040Hardware};
use pio_camera::{
    Camera, FrameBuffer, PixelFormat, PlatformConfig, CAMERA_HEIGHT_DIV8, CAMERA_WIDTH_DIV8,
};

use core::mem::MaybeUninit;
use core::panic::PanicInfo;
use cortex_m_rt::entry;
use rp2040_hal::{
    self as hal,
    clocks::init_clocks_and_plls,
    fugit::RateExtU32,
    gpio::{FunctionI2C, Pin, PullUp},
    pac::{self, interrupt},
    Clock, Sio, Watchdog, I2C,
};
use rtt_target::{rprintln, rtt_init, set_print_channel};

#[link_section = ".boot2"]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_GENERIC_03H;

// Pico crystal
const XTAL_FREQ_HZ: u32 = 12_000_000;

// D0 on GP6, PCLK/HREF/VSYNC on GP14-GP16
const CAMERA_BASE_PIN: u8 = 6;

const HEAP_SIZE: usize = 32 * 1024;

#[global_allocator]
static HEAP: CameraHeap = CameraHeap::empty();

struct RttLogger;

impl log::Log for RttLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Debug
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            rprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: RttLogger = RttLogger;

#[entry]
fn main() -> ! {
    // Setup RTT for logging
    let channels = rtt_init! {
        up: {
            0: {
                size: 4096
                mode: BlockIfFull
                name: "Terminal"
            }
        }
    };

    set_print_channel(channels.up.0);

    // No atomic CAS on the M0+, set once before anything else logs
    unsafe {
        log::set_logger_racy(&LOGGER).ok();
        log::set_max_level_racy(log::LevelFilter::Debug);
    }

    // Frame buffers come from here
    {
        static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
        unsafe { HEAP.init(core::ptr::addr_of_mut!(HEAP_MEM) as *mut u8, HEAP_SIZE) }
    }

    // Get peripherals
    let mut pac_periph = pac::Peripherals::take().unwrap();
    let cm_periph = pac::CorePeripherals::take().unwrap();

    /********** BEGIN: CLOCK CONFG **********/

    // SYSCLK = 125 MHz, GPOUT0 divides it by 8 for a 15.625 MHz XCLK
    let mut watchdog = Watchdog::new(pac_periph.WATCHDOG);
    let clocks = init_clocks_and_plls(
        XTAL_FREQ_HZ,
        pac_periph.XOSC,
        pac_periph.CLOCKS,
        pac_periph.PLL_SYS,
        pac_periph.PLL_USB,
        &mut pac_periph.RESETS,
        &mut watchdog,
    )
    .ok()
    .unwrap();

    /********** END: CLOCK CONFG **********/

    // Delay configuration
    let delay = cortex_m::delay::Delay::new(cm_periph.SYST, clocks.system_clock.freq().to_Hz());

    // GPIO configuration
    let sio = Sio::new(pac_periph.SIO);
    let pins = hal::gpio::Pins::new(
        pac_periph.IO_BANK0,
        pac_periph.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac_periph.RESETS,
    );

    // I2C0 configuration (SCCB)
    let sda: Pin<_, FunctionI2C, PullUp> = pins.gpio4.reconfigure();
    let scl: Pin<_, FunctionI2C, PullUp> = pins.gpio5.reconfigure();
    let i2c = I2C::i2c0(
        pac_periph.I2C0,
        sda,
        scl,
        100.kHz(),
        &mut pac_periph.RESETS,
        &clocks.system_clock,
    );

    // Bring up the OV7670 and the PIO capture path
    let hw = Rp2040Hardware::new(Block::Pio0, &mut pac_periph.RESETS);
    let platform = PlatformConfig::new(Block::Pio0, CAMERA_BASE_PIN).capture_timeout_ms(Some(1000));
    let mut camera = Camera::init(platform, hw, i2c, delay).unwrap();
    rprintln!("Camera initialization complete!");

    camera
        .configure(PixelFormat::Rgb565, CAMERA_WIDTH_DIV8, CAMERA_HEIGHT_DIV8)
        .unwrap();
    let fps = camera.set_frame_rate(30.0).unwrap();
    rprintln!("80x60 RGB565 at {} fps", fps);

    let mut frame =
        FrameBuffer::allocate(PixelFormat::Rgb565, CAMERA_WIDTH_DIV8, CAMERA_HEIGHT_DIV8).unwrap();
    rprintln!("Heap free: {} bytes", HEAP.free());

    let mut count: u32 = 0;
    loop {
        match camera.capture_blocking(&mut frame, false) {
            Ok(()) => {
                count += 1;
                rprintln!("Frame {}:", count);
                if let Some(plane) = frame.plane(0) {
                    for px in plane.data().chunks_exact(2).take(4) {
                        rprintln!("\t{:04X}", u16::from_be_bytes([px[0], px[1]]));
                    }
                }
            }
            Err(e) => rprintln!("Capture failed: {}", e),
        }
    }
}

#[interrupt]
fn PIO0_IRQ_0() {
    rp2040::on_frame_irq(Block::Pio0);
}

#[interrupt]
fn PIO1_IRQ_0() {
    rp2040::on_frame_irq(Block::Pio1);
}

#[inline(never)]
#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    rprintln!("Panicked!");
    rprintln!("{:?}", _info);
    loop {}
}
