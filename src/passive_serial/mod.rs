//! Passive serial configuration (Altera/Intel "PS" mode)
//!
//! Sequence:
//! - wait for nSTATUS high (device ready), polling with a bounded budget
//! - pulse nCONFIG low and back high to start a fresh configuration cycle
//! - for each bit (LSB of each byte first): put it on DATA0, pulse DCLK;
//!   the FPGA shifts DATA0 in on the rising edge
//! - after each bit check CONF_DONE; the FPGA raises it once the image is
//!   complete
//!
//! There is no readback: the FPGA never tells us about bits it missed.
//! Clocking one bit past the image without CONF_DONE is a "bit overrun";
//! the transfer stops but isn't treated as an error.

use std::fmt;

use crate::pins::{
	Line,
	Pins,
};
use crate::{
	LoadError,
	Profile,
};

mod bitstream;

pub use self::bitstream::{
	Bits,
	Bitstream,
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum State {
	AwaitingReady,
	Resetting,
	Clocking,
	Done,
	TimedOut,
	Overrun,
}

impl State {
	pub fn is_terminal(self) -> bool {
		match self {
			State::Done | State::TimedOut | State::Overrun => true,
			_ => false,
		}
	}
}

/// How a transfer that got past the readiness check ended.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Report {
	/// `Done` or `Overrun`
	pub state: State,
	/// clock pulses issued
	pub bits: usize,
	/// last CONF_DONE read
	pub conf_done: bool,
}

impl Report {
	pub fn is_done(&self) -> bool {
		self.state == State::Done
	}

	pub fn is_overrun(&self) -> bool {
		self.state == State::Overrun
	}
}

impl fmt::Display for Report {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self.state {
			State::Done => write!(f, "configuration done after {} bits", self.bits),
			State::Overrun => write!(f, "bit overrun: no CONF_DONE after {} bits", self.bits),
			state => write!(f, "{:?} after {} bits", state, self.bits),
		}
	}
}

fn enter(from: State, to: State) -> State {
	trace!("passive serial: {:?} -> {:?}", from, to);
	to
}

trait InternalPassiveSerial: Pins {
	fn check_fault(&mut self) -> Result<(), LoadError> {
		match self.take_fault() {
			None => Ok(()),
			Some(e) => Err(LoadError::pin_fault(&e)),
		}
	}

	// poll nSTATUS; up to `ready_polls` retries, `poll_interval` apart
	fn wait_ready(&mut self, profile: &Profile) -> Result<(), LoadError> {
		let mut remaining = profile.ready_polls;
		loop {
			let ready = self.read_line(Line::NStatus);
			self.check_fault()?;
			if ready {
				return Ok(());
			}
			if 0 == remaining {
				return Err(LoadError::DeviceNotReady { polls: profile.ready_polls });
			}
			remaining -= 1;
			self.delay(profile.poll_interval);
		}
	}

	// nCONFIG low -> high starts a new configuration cycle
	fn reset_pulse(&mut self, profile: &Profile) {
		self.set_line(Line::NConfig, false);
		self.delay(profile.reset_hold);
		self.set_line(Line::NConfig, true);
		self.delay(profile.reset_hold);
	}

	// data is sampled on the rising DCLK edge
	fn clock_bit(&mut self, bit: bool) {
		self.set_line(Line::Data0, bit);
		self.set_line(Line::Dclk, true);
		self.set_line(Line::Dclk, false);
	}
}

impl<P: Pins + ?Sized> InternalPassiveSerial for P {
}

pub trait Configure: Pins {
	/// Run one full configuration cycle with `image`.
	///
	/// Pins must already be acquired.
	fn configure(&mut self, profile: &Profile, image: &Bitstream) -> Result<Report, LoadError> {
		let mut state = State::AwaitingReady;

		if let Err(e) = self.wait_ready(profile) {
			if let LoadError::DeviceNotReady { .. } = e {
				enter(state, State::TimedOut);
				debug!("nSTATUS still low after {:?}", profile.ready_timeout());
			}
			return Err(e);
		}
		debug!("flashing firmware, {} bytes to go", image.len());

		state = enter(state, State::Resetting);
		self.reset_pulse(profile);
		self.check_fault()?;

		state = enter(state, State::Clocking);
		let total = image.bit_len();
		let mut bits = image.bits();
		let mut transferred = 0usize;
		let mut conf_done = false;

		if image.is_empty() {
			state = enter(state, State::Overrun);
		}
		while !state.is_terminal() {
			// the bit after the image is clocked as 0
			self.clock_bit(bits.next().unwrap_or(false));
			transferred += 1;

			conf_done = self.read_line(Line::ConfDone);
			self.check_fault()?;
			if conf_done {
				state = enter(state, State::Done);
			} else if transferred > total {
				state = enter(state, State::Overrun);
			} else if 0 != profile.progress_every && 0 == transferred % profile.progress_every {
				debug!("{} of {} bits transferred", transferred, total);
			}
		}

		if state == State::Overrun {
			warn!("bit overrun: CONF_DONE still low after {} bits ({} bytes)", transferred, image.len());
		}
		debug!("config done status: {}", conf_done as u8);
		debug!("transferred bits: {}", transferred);

		Ok(Report {
			state,
			bits: transferred,
			conf_done,
		})
	}
}

impl<P: Pins + ?Sized> Configure for P {
}
