//! OV7670 frame capture on the RP2040.
//!
//! The sensor's parallel bus is followed by PIO state machines and its pixel bytes are moved into
//! RAM by DMA, so the CPU is only involved when arming a capture and when it completes.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod camera;
pub mod convert;
pub mod error;
pub mod format;
pub mod frame_buf;
pub mod hw;
pub mod program;
pub mod registry;

/// Drivers and register tables for the OV7670.
pub mod ov7670;

/// Register level backend for the RP2040 PIO, DMA and clock blocks.
#[cfg(feature = "rp2040")]
pub mod rp2040;

#[cfg(test)]
mod mock;

pub use camera::{
    Camera, CaptureConfig, DmaChannels, PlatformConfig, CAMERA_HEIGHT_DIV8, CAMERA_WIDTH_DIV8,
};
pub use error::{CameraError, CaptureRejected};
pub use format::{FourCC, PixelFormat, MAX_PLANES};
pub use frame_buf::{release, FrameBuffer};
