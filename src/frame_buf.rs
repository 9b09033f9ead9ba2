//! Caller-owned frame storage, one heap allocation per plane.

use crate::format::{PixelFormat, MAX_PLANES};
use alloc::vec::Vec;
use core::fmt;
use embedded_graphics::{image::ImageRawBE, pixelcolor::Rgb565};

/// One plane of a frame.
pub struct Plane {
    /// Bytes per row.
    stride: u32,
    /// Pixel data, `stride * height` bytes.
    data: Vec<u8>,
}

impl Plane {
    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn size(&self) -> u32 {
        self.data.len() as u32
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Start of the plane storage as a bus address for DMA.
    pub(crate) fn dma_address(&mut self) -> u32 {
        self.data.as_mut_ptr() as u32
    }
}

/// A frame sized for one `(format, width, height)`. The planes are allocated up front and the
/// engine only writes into them while a capture is armed.
pub struct FrameBuffer {
    /// Pixel format. Does not change after allocation.
    format: PixelFormat,
    /// Frame width in pixels.
    width: u32,
    /// Frame height in pixels.
    height: u32,
    /// One entry per plane of `format`.
    planes: heapless::Vec<Plane, MAX_PLANES>,
}

/// A plane could not be allocated. Planes allocated before it have been freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationError {
    /// Index of the plane that failed.
    pub plane: usize,
    /// Bytes requested for it.
    pub size: u32,
}

impl FrameBuffer {
    /// Allocate zeroed storage for every plane of a `width` x `height` frame.
    pub fn allocate(format: PixelFormat, width: u32, height: u32) -> Result<Self, AllocationError> {
        Self::allocate_in(format, width, height, zeroed)
    }

    /// `allocate` with the per-plane allocator supplied by the caller.
    pub(crate) fn allocate_in<F>(
        format: PixelFormat,
        width: u32,
        height: u32,
        mut alloc_plane: F,
    ) -> Result<Self, AllocationError>
    where
        F: FnMut(usize) -> Option<Vec<u8>>,
    {
        let mut planes = heapless::Vec::new();

        for plane in 0..format.plane_count() {
            let size = format.plane_size(plane, width, height);
            let error = AllocationError { plane, size };

            // Returning early drops `planes`, which frees everything allocated so far
            let data = alloc_plane(size as usize).ok_or(error)?;
            planes
                .push(Plane {
                    stride: format.stride(plane, width),
                    data,
                })
                .map_err(|_| error)?;
        }

        log::debug!(
            "allocated {}x{} {:?} frame in {} planes",
            width,
            height,
            format,
            planes.len()
        );

        Ok(FrameBuffer {
            format,
            width,
            height,
            planes,
        })
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn planes_mut(&mut self) -> &mut [Plane] {
        &mut self.planes
    }

    pub fn plane(&self, index: usize) -> Option<&Plane> {
        self.planes.get(index)
    }

    /// Whether this buffer has the shape `(format, width, height)`.
    pub fn matches(&self, format: PixelFormat, width: u32, height: u32) -> bool {
        self.format == format && self.width == width && self.height == height
    }

    /// Whether every plane exists and has the size its format requires.
    pub fn is_well_formed(&self) -> bool {
        self.planes.len() == self.format.plane_count()
            && self.planes.iter().enumerate().all(|(i, p)| {
                p.size() == self.format.plane_size(i, self.width, self.height)
                    && p.stride == self.format.stride(i, self.width)
            })
    }

    /// View an RGB565 frame as an image a display driver can draw. The sensor sends the high
    /// byte of each pixel first, which is where it lands in memory.
    pub fn as_rgb565_image(&self) -> Option<ImageRawBE<'_, Rgb565>> {
        match (self.format, self.planes.first()) {
            (PixelFormat::Rgb565, Some(plane)) => {
                Some(ImageRawBE::new(plane.data(), self.width, self.height))
            }
            _ => None,
        }
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for p in self.planes.iter() {
            list.entry(&(p.stride, p.size()));
        }
        list.finish()?;
        write!(f, " {:?} {}x{}", self.format, self.width, self.height)
    }
}

/// Free a frame. Accepts `None` so callers can release unconditionally.
pub fn release(buffer: Option<FrameBuffer>) {
    if let Some(buffer) = buffer {
        log::debug!("released {:?} frame", buffer.format);
        drop(buffer);
    }
}

fn zeroed(size: usize) -> Option<Vec<u8>> {
    let mut data = Vec::new();
    data.try_reserve_exact(size).ok()?;
    data.resize(size, 0);
    Some(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;

    #[test]
    fn planar_frame_has_three_planes() {
        let buf = FrameBuffer::allocate(PixelFormat::Yuv422Planar, 80, 60).unwrap();
        let sizes: Vec<u32> = buf.planes().iter().map(|p| p.size()).collect();
        assert_eq!(sizes, [4800, 2400, 2400]);
        assert_eq!(buf.planes()[1].stride(), 40);
        assert_eq!(buf.plane(2).map(|p| p.size()), Some(2400));
        assert!(buf.plane(3).is_none());
        assert!(buf.is_well_formed());
        assert!(buf.matches(PixelFormat::Yuv422Planar, 80, 60));
    }

    #[test]
    fn failed_plane_frees_earlier_planes() {
        let handed_out = RefCell::new(0);
        let result = FrameBuffer::allocate_in(PixelFormat::Yuv422Planar, 80, 60, |size| {
            let mut n = handed_out.borrow_mut();
            *n += 1;
            if *n == 3 {
                None
            } else {
                Some(vec![0; size])
            }
        });

        assert_eq!(
            result.unwrap_err(),
            AllocationError {
                plane: 2,
                size: 2400
            }
        );
        assert_eq!(*handed_out.borrow(), 3);
    }

    #[test]
    fn rgb565_image_view() {
        let buf = FrameBuffer::allocate(PixelFormat::Rgb565, 80, 60).unwrap();
        assert!(buf.as_rgb565_image().is_some());

        let yuv = FrameBuffer::allocate(PixelFormat::Yuyv, 80, 60).unwrap();
        assert!(yuv.as_rgb565_image().is_none());
    }

    #[test]
    fn release_accepts_none() {
        release(None);
        release(FrameBuffer::allocate(PixelFormat::Yuyv, 80, 60).ok());
    }
}
