/* pcm032 board: Cyclone II (EP2C8F256C8N) wired to a MPC5200 */

// FPGA's            CPUs
//  pin     through   pin
// ---------------------------
//  DCLK (in)        PSC6_3 / GPIO_IRDA_1 (out)
//  DATA0 (in)       PSC6_2 / GPIO_IRDA_0 (out)
//  nCONFIG (in)     PSC6_1 / GPIO_WKUP_5 (out)
//  CONF_DONE (out)  PSC6_0 / GPIO_WKUP_4 (in)
//  nSTATUS (out)    GPIO_WKUP_7 (in)
//
// GPIO_WKUP_6 switches the board multiplexer between the PSC6 UART (low) and
// the FPGA lines (high). J8 must select "Passive Serial Mode" (2-3).
//
// While acquired PSC6 can't be used as UART.

use super::{
	Line,
	Mapped,
	Pins,
	Registers,
	map_physical,
};

#[allow(dead_code)]
mod consts {
	// default MBAR
	pub const GPIO_STD_BASE: u64 = 0xf000_0b00; // "fsl,mpc5200-gpio"
	pub const GPIO_WKUP_BASE: u64 = 0xf000_0c00; // "fsl,mpc5200-gpio-wkup"

	// struct mpc52xx_gpio
	pub const GPIO_STD_SIZE: usize = 0x40;
	pub const PORT_CONFIG: usize = 0x00;
	pub const SIMPLE_GPIOE: usize = 0x04;
	pub const SIMPLE_ODE: usize = 0x08;
	pub const SIMPLE_DDR: usize = 0x0c;
	pub const SIMPLE_DVO: usize = 0x10;
	pub const SIMPLE_IVAL: usize = 0x14;

	// struct mpc52xx_gpio_wkup
	pub const GPIO_WKUP_SIZE: usize = 0x28;
	pub const WKUP_GPIOE: usize = 0x00;
	pub const WKUP_ODE: usize = 0x01;
	pub const WKUP_DDR: usize = 0x02;
	pub const WKUP_DVO: usize = 0x03;
	pub const WKUP_IVAL: usize = 0x09;

	// port_config: PSC6 pin function; cleared means IrDA pins are GPIO
	pub const PORT_CONFIG_PSC6_MASK: u32 = 0x0070_0000;

	// simple gpio
	pub const IRDA_0: u32 = 0x1000_0000; // DATA0
	pub const IRDA_1: u32 = 0x2000_0000; // DCLK

	// wakeup gpio
	pub const WKUP_4: u8 = 0x10; // CONF_DONE
	pub const WKUP_5: u8 = 0x20; // nCONFIG
	pub const WKUP_6: u8 = 0x40; // multiplexer
	pub const WKUP_7: u8 = 0x80; // nSTATUS

	pub const WKUP_OUTPUTS: u8 = WKUP_5 | WKUP_6;
	pub const WKUP_INPUTS: u8 = WKUP_4 | WKUP_7;
}

pub use self::consts::{
	GPIO_STD_BASE,
	GPIO_WKUP_BASE,
};

use self::consts::*;

// register contents before `acquire`
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Backup {
	port_config: u32,
	simple_gpioe: u32,
	simple_ddr: u32,
	wkup_gpioe: u8,
	wkup_ddr: u8,
}

trait RegistersExt: Registers {
	fn modify_be32<F: FnOnce(u32) -> u32>(&mut self, offset: usize, f: F) -> u32 {
		let old = self.read_be32(offset);
		self.write_be32(offset, f(old));
		old
	}

	fn modify_u8<F: FnOnce(u8) -> u8>(&mut self, offset: usize, f: F) -> u8 {
		let old = self.read_u8(offset);
		self.write_u8(offset, f(old));
		old
	}
}
impl<R: Registers + ?Sized> RegistersExt for R {}

pub struct Mpc52xxPins<R: Registers> {
	gpio: R,
	wkup: R,
	backup: Option<Backup>,
}

impl<R: Registers> Mpc52xxPins<R> {
	pub fn new(gpio: R, wkup: R) -> Self {
		assert!(gpio.len() >= GPIO_STD_SIZE);
		assert!(wkup.len() >= GPIO_WKUP_SIZE);
		Mpc52xxPins {
			gpio,
			wkup,
			backup: None,
		}
	}

	pub fn is_acquired(&self) -> bool {
		self.backup.is_some()
	}
}

impl Mpc52xxPins<Mapped> {
	/// Map both GPIO register blocks from `/dev/mem`.
	pub fn open(gpio_base: u64, wkup_base: u64) -> crate::AResult<Self> {
		let gpio = with_context!(("couldn't map GPIO registers at 0x{:08x}", gpio_base),
			Ok(map_physical(gpio_base, GPIO_STD_SIZE)?)
		)?;
		let wkup = with_context!(("couldn't map GPIO_WKUP registers at 0x{:08x}", wkup_base),
			Ok(map_physical(wkup_base, GPIO_WKUP_SIZE)?)
		)?;
		Ok(Mpc52xxPins::new(gpio, wkup))
	}
}

impl<R: Registers> Drop for Mpc52xxPins<R> {
	fn drop(&mut self) {
		self.release();
	}
}

impl<R: Registers> Pins for Mpc52xxPins<R> {
	fn set_line(&mut self, line: Line, level: bool) {
		match line {
			Line::Dclk | Line::Data0 => {
				let mask = if line == Line::Dclk { IRDA_1 } else { IRDA_0 };
				self.gpio.modify_be32(SIMPLE_DVO, |dvo| if level { dvo | mask } else { dvo & !mask });
			},
			Line::NConfig => {
				self.wkup.modify_u8(WKUP_DVO, |dvo| if level { dvo | WKUP_5 } else { dvo & !WKUP_5 });
			},
			Line::NStatus | Line::ConfDone => debug_assert!(false, "{} is an input", line),
		}
	}

	fn read_line(&mut self, line: Line) -> bool {
		match line {
			Line::NStatus => 0 != self.wkup.read_u8(WKUP_IVAL) & WKUP_7,
			Line::ConfDone => 0 != self.wkup.read_u8(WKUP_IVAL) & WKUP_4,
			Line::NConfig => 0 != self.wkup.read_u8(WKUP_DVO) & WKUP_5,
			Line::Dclk => 0 != self.gpio.read_be32(SIMPLE_DVO) & IRDA_1,
			Line::Data0 => 0 != self.gpio.read_be32(SIMPLE_DVO) & IRDA_0,
		}
	}

	fn acquire(&mut self) -> crate::AResult<()> {
		ensure!(self.backup.is_none(), "MPC5200 GPIO pins already acquired");

		// PSC6 pins as GPIO
		let port_config = self.gpio.modify_be32(PORT_CONFIG, |v| v & !PORT_CONFIG_PSC6_MASK);
		// enable GPIO_IRDA_0/1 as outputs
		let simple_gpioe = self.gpio.modify_be32(SIMPLE_GPIOE, |v| v | IRDA_0 | IRDA_1);
		let simple_ddr = self.gpio.modify_be32(SIMPLE_DDR, |v| v | IRDA_0 | IRDA_1);
		// enable GPIO_WKUP_4..7; 4 and 7 in, 5 and 6 out
		let wkup_gpioe = self.wkup.modify_u8(WKUP_GPIOE, |v| v | WKUP_INPUTS | WKUP_OUTPUTS);
		let wkup_ddr = self.wkup.modify_u8(WKUP_DDR, |v| (v & !WKUP_INPUTS) | WKUP_OUTPUTS);

		self.backup = Some(Backup {
			port_config,
			simple_gpioe,
			simple_ddr,
			wkup_gpioe,
			wkup_ddr,
		});

		// nCONFIG idle (high), then route the FPGA lines instead of the UART
		self.wkup.modify_u8(WKUP_DVO, |v| v | WKUP_5 | WKUP_6);
		debug!("MPC5200 PSC6 switched to FPGA configuration lines");

		Ok(())
	}

	fn release(&mut self) {
		let backup = match self.backup.take() {
			None => return,
			Some(b) => b,
		};

		// multiplexer back to the UART
		self.wkup.modify_u8(WKUP_DVO, |v| v & !WKUP_6);

		self.wkup.write_u8(WKUP_DDR, backup.wkup_ddr);
		self.wkup.write_u8(WKUP_GPIOE, backup.wkup_gpioe);
		self.gpio.write_be32(SIMPLE_DDR, backup.simple_ddr);
		self.gpio.write_be32(SIMPLE_GPIOE, backup.simple_gpioe);
		self.gpio.write_be32(PORT_CONFIG, backup.port_config);
		debug!("MPC5200 PSC6 restored");
	}
}
