//! Errors reported by the acquisition engine.

use crate::frame_buf::{AllocationError, FrameBuffer};
use crate::ov7670::sccb::SccbError;
use core::fmt;

/// Camera errors, generic over the control bus error type.
#[derive(Debug, Eq, PartialEq)]
pub enum CameraError<E> {
    /// The sensor did not answer with the expected product ID.
    Detection,
    /// Requested frame shape is not supported, or the buffer does not match the configured shape.
    ConfigurationMismatch,
    /// A capture is already outstanding.
    ConcurrentCapture,
    /// Frame storage could not be allocated.
    Allocation(AllocationError),
    /// Control bus transport error.
    Sccb(SccbError<E>),
    /// Not enough free DMA channels.
    DmaUnavailable,
    /// Another camera already owns this PIO block.
    SequencerBusy,
    /// The sensor clock cannot be routed to the configured pin.
    ClockPin(u8),
    /// A blocking capture did not complete in time.
    Timeout,
    /// The camera has been terminated.
    Terminated,
}

impl<E> From<SccbError<E>> for CameraError<E> {
    fn from(e: SccbError<E>) -> Self {
        CameraError::Sccb(e)
    }
}

impl<E> From<AllocationError> for CameraError<E> {
    fn from(e: AllocationError) -> Self {
        CameraError::Allocation(e)
    }
}

impl<E: fmt::Debug> fmt::Display for CameraError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detection => write!(f, "OV7670 not detected"),
            Self::ConfigurationMismatch => write!(f, "unsupported or mismatched frame configuration"),
            Self::ConcurrentCapture => write!(f, "capture already in progress"),
            Self::Allocation(e) => {
                write!(f, "could not allocate {} bytes for plane {}", e.size, e.plane)
            }
            Self::Sccb(e) => write!(f, "SCCB error: {:?}", e),
            Self::DmaUnavailable => write!(f, "no free DMA channels"),
            Self::SequencerBusy => write!(f, "PIO block already in use"),
            Self::ClockPin(pin) => write!(f, "GPIO{} cannot output the sensor clock", pin),
            Self::Timeout => write!(f, "capture timed out"),
            Self::Terminated => write!(f, "camera terminated"),
        }
    }
}

/// A non-blocking capture that was refused. The buffer goes back to the caller untouched.
#[derive(Debug)]
pub struct CaptureRejected<E> {
    pub error: CameraError<E>,
    pub buffer: FrameBuffer,
}

impl<E: fmt::Debug> fmt::Display for CaptureRejected<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "capture rejected: {}", self.error)
    }
}
