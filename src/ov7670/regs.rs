//! OV7670 register map and the fixed command lists.

/// Device register addresses.
pub struct Register;

impl Register {
    pub const GAIN: u8 = 0x00;
    pub const VREF: u8 = 0x03;
    pub const COM2: u8 = 0x09;
    pub const PID: u8 = 0x0A;
    pub const COM3: u8 = 0x0C;
    pub const COM4: u8 = 0x0D;
    pub const COM5: u8 = 0x0E;
    pub const COM6: u8 = 0x0F;
    pub const CLKRC: u8 = 0x11;
    pub const COM7: u8 = 0x12;
    pub const COM8: u8 = 0x13;
    pub const COM9: u8 = 0x14;
    pub const HSTART: u8 = 0x17;
    pub const HSTOP: u8 = 0x18;
    pub const VSTART: u8 = 0x19;
    pub const VSTOP: u8 = 0x1A;
    pub const MVFP: u8 = 0x1E;
    pub const ADCCTR1: u8 = 0x21;
    pub const ADCCTR2: u8 = 0x22;
    pub const AEW: u8 = 0x24;
    pub const AEB: u8 = 0x25;
    pub const VPT: u8 = 0x26;
    pub const HREF: u8 = 0x32;
    pub const CHLF: u8 = 0x33;
    pub const ADC: u8 = 0x37;
    pub const ACOM: u8 = 0x38;
    pub const OFON: u8 = 0x39;
    pub const TSLB: u8 = 0x3A;
    pub const COM11: u8 = 0x3B;
    pub const COM12: u8 = 0x3C;
    pub const COM14: u8 = 0x3E;
    pub const COM15: u8 = 0x40;
    pub const AWBC1: u8 = 0x43;
    pub const AWBC2: u8 = 0x44;
    pub const AWBC3: u8 = 0x45;
    pub const AWBC4: u8 = 0x46;
    pub const AWBC5: u8 = 0x47;
    pub const AWBC6: u8 = 0x48;
    pub const BRIGHT: u8 = 0x55;
    pub const CONTRAS: u8 = 0x56;
    pub const CONTRAS_CENTER: u8 = 0x57;
    pub const LCC3: u8 = 0x64;
    pub const LCC4: u8 = 0x65;
    pub const LCC5: u8 = 0x66;
    pub const GFIX: u8 = 0x69;
    pub const DBLV: u8 = 0x6B;
    pub const AWBCTR3: u8 = 0x6C;
    pub const AWBCTR2: u8 = 0x6D;
    pub const AWBCTR1: u8 = 0x6E;
    pub const AWBCTR0: u8 = 0x6F;
    pub const SCALING_XSC: u8 = 0x70;
    pub const SCALING_YSC: u8 = 0x71;
    pub const SCALING_DCWCTR: u8 = 0x72;
    pub const SCALING_PCLK_DIV: u8 = 0x73;
    pub const REG74: u8 = 0x74;
    pub const SLOP: u8 = 0x7A;
    pub const GAM_BASE: u8 = 0x7B;
    pub const RGB444: u8 = 0x8C;
    pub const DM_LNL: u8 = 0x92;
    pub const LCC6: u8 = 0x94;
    pub const LCC7: u8 = 0x95;
    pub const HAECC1: u8 = 0x9F;
    pub const HAECC2: u8 = 0xA0;
    pub const SCALING_PCLK_DELAY: u8 = 0xA2;
    pub const BD50MAX: u8 = 0xA5;
    pub const HAECC3: u8 = 0xA6;
    pub const HAECC4: u8 = 0xA7;
    pub const HAECC5: u8 = 0xA8;
    pub const HAECC6: u8 = 0xA9;
    pub const HAECC7: u8 = 0xAA;
    pub const BD60MAX: u8 = 0xAB;
    pub const ABLC1: u8 = 0xB1;
    pub const THL_ST: u8 = 0xB3;
}

// Register bits
pub const COM3_SCALEEN: u8 = 0x08;
pub const COM3_DCWEN: u8 = 0x04;
pub const COM7_RESET: u8 = 0x80;
pub const COM7_RGB: u8 = 0x04;
pub const COM7_YUV: u8 = 0x00;
pub const COM8_FASTAEC: u8 = 0x80;
pub const COM8_AECSTEP: u8 = 0x40;
pub const COM8_BANDING: u8 = 0x20;
pub const COM8_AGC: u8 = 0x04;
pub const COM8_AWB: u8 = 0x02;
pub const COM8_AEC: u8 = 0x01;
pub const COM11_NIGHT_MASK: u8 = 0xE0;
pub const COM15_R00FF: u8 = 0xC0;
pub const COM15_RGB565: u8 = 0x10;
pub const MVFP_MIRROR: u8 = 0x20;
pub const MVFP_VFLIP: u8 = 0x10;
pub const TSLB_YLAST: u8 = 0x04;
pub const SCALING_TEST_PATTERN: u8 = 0x80;

/// Expected value of `Register::PID`.
pub const OV7670_PID: u8 = 0x76;

/// RGB565 output, full 00..FF range.
pub const RGB565: &[(u8, u8)] = &[
    (Register::COM7, COM7_RGB),
    (Register::RGB444, 0),
    (Register::COM15, COM15_RGB565 | COM15_R00FF),
];

/// YUV 4:2:2 output, full 00..FF range.
pub const YUV422: &[(u8, u8)] = &[
    (Register::COM7, COM7_YUV),
    (Register::COM15, COM15_R00FF),
];

/// Gamma, exposure, white balance and analog tuning applied once at bring-up. The reserved
/// registers come from the vendor reference settings and are not documented.
pub const INIT: &[(u8, u8)] = &[
    (Register::TSLB, TSLB_YLAST), // No auto window
    (Register::SLOP, 0x20),
    (Register::GAM_BASE, 0x1C),
    (Register::GAM_BASE + 1, 0x28),
    (Register::GAM_BASE + 2, 0x3C),
    (Register::GAM_BASE + 3, 0x55),
    (Register::GAM_BASE + 4, 0x68),
    (Register::GAM_BASE + 5, 0x76),
    (Register::GAM_BASE + 6, 0x80),
    (Register::GAM_BASE + 7, 0x88),
    (Register::GAM_BASE + 8, 0x8F),
    (Register::GAM_BASE + 9, 0x96),
    (Register::GAM_BASE + 10, 0xA3),
    (Register::GAM_BASE + 11, 0xAF),
    (Register::GAM_BASE + 12, 0xC4),
    (Register::GAM_BASE + 13, 0xD7),
    (Register::GAM_BASE + 14, 0xE8),
    (Register::COM8, COM8_FASTAEC | COM8_AECSTEP | COM8_BANDING),
    (Register::GAIN, 0x00),
    (Register::COM2, 0x00),
    (Register::COM4, 0x00),
    (Register::COM9, 0x20), // Max AGC value
    (Register::COM11, 1 << 3), // 50 Hz
    (0x9D, 89), // 50 Hz banding filter for a 13.888 MHz XCLK
    (Register::BD50MAX, 0x05),
    (Register::BD60MAX, 0x07),
    (Register::AEW, 0x75),
    (Register::AEB, 0x63),
    (Register::VPT, 0xA5),
    (Register::HAECC1, 0x78),
    (Register::HAECC2, 0x68),
    (0xA1, 0x03),
    (Register::HAECC3, 0xDF), // Histogram-based AEC/AGC
    (Register::HAECC4, 0xDF),
    (Register::HAECC5, 0xF0),
    (Register::HAECC6, 0x90),
    (Register::HAECC7, 0x94),
    (
        Register::COM8,
        COM8_FASTAEC | COM8_AECSTEP | COM8_BANDING | COM8_AGC | COM8_AEC | COM8_AWB,
    ),
    (Register::COM5, 0x61),
    (Register::COM6, 0x4B),
    (0x16, 0x02),
    (Register::MVFP, 0x07),
    (Register::ADCCTR1, 0x02),
    (Register::ADCCTR2, 0x91),
    (0x29, 0x07),
    (Register::CHLF, 0x0B),
    (0x35, 0x0B),
    (Register::ADC, 0x1D),
    (Register::ACOM, 0x71),
    (Register::OFON, 0x2A),
    (Register::COM12, 0x78),
    (0x4D, 0x40),
    (0x4E, 0x20),
    (Register::GFIX, 0x5D),
    (Register::REG74, 0x19),
    (0x8D, 0x4F),
    (0x8E, 0x00),
    (0x8F, 0x00),
    (0x90, 0x00),
    (0x91, 0x00),
    (Register::DM_LNL, 0x00),
    (0x96, 0x00),
    (0x9A, 0x80),
    (0xB0, 0x84),
    (Register::ABLC1, 0x0C),
    (0xB2, 0x0E),
    (Register::THL_ST, 0x82),
    (0xB8, 0x0A),
    (Register::AWBC1, 0x14),
    (Register::AWBC2, 0xF0),
    (Register::AWBC3, 0x34),
    (Register::AWBC4, 0x58),
    (Register::AWBC5, 0x28),
    (Register::AWBC6, 0x3A),
    (0x59, 0x88),
    (0x5A, 0x88),
    (0x5B, 0x44),
    (0x5C, 0x67),
    (0x5D, 0x49),
    (0x5E, 0x0E),
    (Register::LCC3, 0x04),
    (Register::LCC4, 0x20),
    (Register::LCC5, 0x05),
    (Register::LCC6, 0x04),
    (Register::LCC7, 0x08),
    (Register::AWBCTR3, 0x0A),
    (Register::AWBCTR2, 0x55),
    (Register::AWBCTR1, 0x11),
    (Register::AWBCTR0, 0x9E), // Advanced AWB
    (Register::BRIGHT, 0x00),
    (Register::CONTRAS, 0x40),
    (Register::CONTRAS_CENTER, 0x80),
];
