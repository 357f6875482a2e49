//! MCP23017 GPIO expander access over the I2C bus
//!
//! Register addresses assume the power-on IOCON.BANK=0 layout, where the A
//! and B registers interleave and the B register is always A+1. Startup
//! programming therefore clears IOCON first so the rest of the map is known
//! to be valid.

use anyhow::{Context, Result};
use rppal::i2c::I2c;

/// Register map, port A addresses (port B is the address + 1).
mod reg {
    /// Pin direction, 1 = input
    pub const IODIRA: u8 = 0x00;
    /// Input polarity inversion
    pub const IPOLA: u8 = 0x02;
    /// Interrupt-on-change enable
    pub const GPINTENA: u8 = 0x04;
    /// Default compare value for interrupts
    pub const DEFVALA: u8 = 0x06;
    /// Interrupt control: 1 = compare against DEFVAL
    pub const INTCONA: u8 = 0x08;
    /// Device configuration
    pub const IOCON: u8 = 0x0a;
    /// Pull-up enable
    pub const GPPUA: u8 = 0x0c;
    /// Port value
    pub const GPIOA: u8 = 0x12;
}

/// Source of raw port samples. The sampling worker only ever reads through
/// this trait, so tests can script a fake bus.
pub trait PortSource {
    /// Blocking register read of one 8-bit port (0 = A, 1 = B).
    fn read_port(&mut self, port: u8) -> Result<u8>;
}

/// An MCP23017 on a Linux I2C bus.
pub struct Mcp23017 {
    i2c: I2c,
}

impl Mcp23017 {
    /// Open `/dev/i2c-<bus>` and address the expander. Failure here is
    /// fatal: there is no panel without the bus.
    pub fn open(bus: u8, address: u16) -> Result<Self> {
        let mut i2c = I2c::with_bus(bus)
            .with_context(|| format!("failed to open /dev/i2c-{}", bus))?;
        i2c.set_slave_address(address)
            .with_context(|| format!("failed to address expander at {:#04x}", address))?;
        Ok(Self { i2c })
    }

    fn write_reg(&mut self, register: u8, value: u8) -> Result<()> {
        self.i2c
            .smbus_write_byte(register, value)
            .with_context(|| format!("i2c write to register {:#04x} failed", register))
    }

    fn read_reg(&mut self, register: u8) -> Result<u8> {
        self.i2c
            .smbus_read_byte(register)
            .with_context(|| format!("i2c read of register {:#04x} failed", register))
    }

    /// One-time startup programming: every enabled pin becomes a pull-up
    /// input with non-inverted polarity, and interrupt-on-change is armed
    /// against the idle (all-high) value so the INT line falls while any
    /// button is held.
    ///
    /// Any failure here is fatal; sampling must not start against
    /// unconfigured hardware.
    pub fn configure_inputs(&mut self, masks: [u8; 2]) -> Result<()> {
        // Reset IOCON so BANK=0 addressing is guaranteed before touching
        // anything else. If the chip was left in BANK=1 mode, the IOCON
        // address itself differs, so clear the aliased register first.
        self.write_reg(reg::GPINTENA + 1, 0x00)?;
        self.write_reg(reg::IOCON, 0x00)?;

        for (port, &mask) in masks.iter().enumerate() {
            let port = port as u8;
            self.write_reg(reg::IODIRA + port, mask)?;
            self.write_reg(reg::GPPUA + port, mask)?;
            self.write_reg(reg::IPOLA + port, 0x00)?;
            self.write_reg(reg::DEFVALA + port, mask)?;
            self.write_reg(reg::INTCONA + port, mask)?;
            self.write_reg(reg::GPINTENA + port, mask)?;
        }

        tracing::info!(
            "expander configured (mask A={:#010b}, B={:#010b})",
            masks[0],
            masks[1]
        );
        Ok(())
    }
}

impl PortSource for Mcp23017 {
    fn read_port(&mut self, port: u8) -> Result<u8> {
        self.read_reg(reg::GPIOA + port)
    }
}
