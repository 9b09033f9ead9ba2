//! Pixel formats and the plane geometry derived from them.
//!
//! Everything here is a pure function of a FourCC code, so it is total over codes the driver
//! does not know about: an unknown code has no planes and zero-sized rows.

use crate::hw::TransferSize;

/// Largest number of planes any supported format needs.
pub const MAX_PLANES: usize = 3;

/// Four character pixel format code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create a new `FourCC` from a 4-byte array.
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// RGB565, packed, one plane.
    pub const RGB565: Self = Self::new(b"RG16");
    /// YUV 4:2:2 packed as Y0 U Y1 V, one plane.
    pub const YUYV: Self = Self::new(b"YUYV");
    /// YUV 4:2:2 planar: full resolution Y, then U and V at half horizontal resolution.
    pub const YUV422: Self = Self::new(b"YU16");

    /// Number of planes, 0 for unknown codes.
    pub fn plane_count(self) -> usize {
        match self {
            Self::RGB565 | Self::YUYV => 1,
            Self::YUV422 => 3,
            _ => 0,
        }
    }

    /// Bytes each pixel occupies in `plane`. The same for every plane of the supported formats.
    pub fn bytes_per_pixel(self, _plane: usize) -> u32 {
        match self {
            Self::RGB565 | Self::YUYV => 2,
            Self::YUV422 => 1,
            _ => 0,
        }
    }

    /// Horizontal subsampling of `plane`. Chroma planes of planar YUV are halved, everything
    /// else (unknown codes included) is 1.
    pub fn horizontal_subsample(self, plane: usize) -> u32 {
        match (self, plane) {
            (Self::YUV422, 1) | (Self::YUV422, 2) => 2,
            _ => 1,
        }
    }

    /// Bytes per row of `plane`.
    pub fn stride(self, plane: usize, width: u32) -> u32 {
        self.bytes_per_pixel(plane) * width / self.horizontal_subsample(plane)
    }

    /// Bytes in `plane` for a `width` x `height` frame.
    pub fn plane_size(self, plane: usize, width: u32, height: u32) -> u32 {
        self.stride(plane, width) * height
    }

    /// Pixels the frame program moves per iteration of its pixel body.
    pub fn pixels_per_chunk(self) -> u32 {
        match self {
            Self::RGB565 | Self::YUYV | Self::YUV422 => 2,
            _ => 1,
        }
    }

    /// Width of a single DMA transfer out of the capture unit feeding `plane`.
    pub fn transfer_size(self, plane: usize) -> TransferSize {
        match (self, plane) {
            (Self::YUV422, 0) => TransferSize::HalfWord,
            (Self::YUV422, _) => TransferSize::Byte,
            _ => TransferSize::Word,
        }
    }
}

/// Pixel formats the driver can capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgb565,
    Yuyv,
    Yuv422Planar,
}

impl PixelFormat {
    /// Look up a supported format by code.
    pub fn from_fourcc(code: FourCC) -> Option<Self> {
        match code {
            FourCC::RGB565 => Some(Self::Rgb565),
            FourCC::YUYV => Some(Self::Yuyv),
            FourCC::YUV422 => Some(Self::Yuv422Planar),
            _ => None,
        }
    }

    pub fn fourcc(self) -> FourCC {
        match self {
            Self::Rgb565 => FourCC::RGB565,
            Self::Yuyv => FourCC::YUYV,
            Self::Yuv422Planar => FourCC::YUV422,
        }
    }

    /// Whether this is a planar format. Planar formats spread one pixel body over several
    /// capture units.
    pub fn is_planar(self) -> bool {
        self.plane_count() > 1
    }

    pub fn plane_count(self) -> usize {
        self.fourcc().plane_count()
    }

    pub fn bytes_per_pixel(self, plane: usize) -> u32 {
        self.fourcc().bytes_per_pixel(plane)
    }

    pub fn horizontal_subsample(self, plane: usize) -> u32 {
        self.fourcc().horizontal_subsample(plane)
    }

    pub fn stride(self, plane: usize, width: u32) -> u32 {
        self.fourcc().stride(plane, width)
    }

    pub fn plane_size(self, plane: usize, width: u32, height: u32) -> u32 {
        self.fourcc().plane_size(plane, width, height)
    }

    pub fn pixels_per_chunk(self) -> u32 {
        self.fourcc().pixels_per_chunk()
    }

    pub fn transfer_size(self, plane: usize) -> TransferSize {
        self.fourcc().transfer_size(plane)
    }
}

impl From<PixelFormat> for FourCC {
    fn from(format: PixelFormat) -> Self {
        format.fourcc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb565_at_80x60() {
        let f = PixelFormat::Rgb565;
        assert_eq!(f.plane_count(), 1);
        assert_eq!(f.bytes_per_pixel(0), 2);
        assert_eq!(f.stride(0, 80), 160);
        assert_eq!(f.plane_size(0, 80, 60), 9600);
    }

    #[test]
    fn planar_yuv_at_80x60() {
        let f = PixelFormat::Yuv422Planar;
        assert_eq!(f.plane_count(), 3);
        assert_eq!(f.bytes_per_pixel(2), 1);
        assert_eq!(f.stride(0, 80), 80);
        assert_eq!(f.plane_size(0, 80, 60), 4800);
        assert_eq!(f.stride(1, 80), 40);
        assert_eq!(f.plane_size(1, 80, 60), 2400);
        assert_eq!(f.plane_size(2, 80, 60), 2400);
    }

    #[test]
    fn unknown_code_is_total() {
        let f = FourCC::new(b"MJPG");
        assert_eq!(PixelFormat::from_fourcc(f), None);
        assert_eq!(f.plane_count(), 0);
        assert_eq!(f.bytes_per_pixel(0), 0);
        assert_eq!(f.horizontal_subsample(1), 1);
        assert_eq!(f.stride(0, 80), 0);
        assert_eq!(f.plane_size(0, 80, 60), 0);
    }

    #[test]
    fn transfer_widths_follow_plane_layout() {
        assert_eq!(PixelFormat::Yuyv.transfer_size(0), TransferSize::Word);
        assert_eq!(PixelFormat::Yuv422Planar.transfer_size(0), TransferSize::HalfWord);
        assert_eq!(PixelFormat::Yuv422Planar.transfer_size(2), TransferSize::Byte);
    }
}
