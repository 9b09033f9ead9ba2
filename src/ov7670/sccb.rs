//! Serial Camera Control Bus access to the OV7670. Works with any microcontroller implementing
//! the embedded-hal blocking I2C traits.

use core::marker::PhantomData;
use embedded_hal::blocking::{delay::DelayMs, i2c};

/// Device address. The I2C driver shifts it left by 1, giving 0x42/0x43 on the wire.
pub const OV7670_ADDRESS: u8 = 0x21;

/// Register address ending a command list.
pub const LIST_END: u8 = 0xFF;

/// SCCB driver.
pub struct Sccb<I2C> {
    /// Marker to ensure the same I2C type is used in all calls.
    i2c: PhantomData<I2C>,
    /// Device I2C address.
    address: u8,
}

/// SCCB errors.
#[derive(Debug, Eq, PartialEq)]
pub enum SccbError<E> {
    /// I2C write error.
    I2cWrite(E),
    /// I2C read error.
    I2cRead(E),
}

impl<I2C, E> Sccb<I2C>
where
    I2C: i2c::Read<Error = E> + i2c::Write<Error = E>,
{
    /// Creates a new SCCB driver for the OV7670.
    pub fn new() -> Self {
        Sccb {
            i2c: PhantomData,
            address: OV7670_ADDRESS,
        }
    }

    /// I2C read wrapper for mapping `E --> SccbError`.
    fn i2c_read(&self, i2c: &mut I2C, buf: &mut [u8]) -> Result<(), SccbError<E>> {
        i2c.read(self.address, buf).map_err(SccbError::I2cRead)
    }

    /// I2C write wrapper for mapping `E --> SccbError`.
    fn i2c_write(&self, i2c: &mut I2C, buf: &[u8]) -> Result<(), SccbError<E>> {
        i2c.write(self.address, buf).map_err(SccbError::I2cWrite)
    }

    /// Read a register, must be two seperate transactions since SCCB has no repeated start.
    pub fn read_register(&self, i2c: &mut I2C, reg: u8) -> Result<u8, SccbError<E>> {
        // Write the address
        self.i2c_write(i2c, &[reg])?;

        // Read the value
        let mut buf = [0x00];
        self.i2c_read(i2c, &mut buf)?;

        Ok(buf[0])
    }

    /// Write a register.
    pub fn write_register(&self, i2c: &mut I2C, reg: u8, val: u8) -> Result<(), SccbError<E>> {
        self.i2c_write(i2c, &[reg, val])
    }

    /// Read a register, clear the bits in `clear`, set the bits in `set`, write it back.
    pub fn modify_register(
        &self,
        i2c: &mut I2C,
        reg: u8,
        clear: u8,
        set: u8,
    ) -> Result<(), SccbError<E>> {
        let val = self.read_register(i2c, reg)?;
        self.write_register(i2c, reg, (val & !clear) | set)
    }

    /// Write `(register, value)` pairs in order, stopping at `LIST_END` or the end of the slice.
    /// The sensor needs a moment after every write or it locks up during init.
    pub fn write_list<D: DelayMs<u32>>(
        &self,
        i2c: &mut I2C,
        delay: &mut D,
        list: &[(u8, u8)],
    ) -> Result<(), SccbError<E>> {
        for (reg, val) in list.iter().take_while(|(reg, _)| *reg != LIST_END) {
            self.write_register(i2c, *reg, *val)?;
            delay.delay_ms(1);
        }

        Ok(())
    }
}

impl<I2C, E> Default for Sccb<I2C>
where
    I2C: i2c::Read<Error = E> + i2c::Write<Error = E>,
{
    fn default() -> Self {
        Self::new()
    }
}
