//! Pin access for passive serial configuration
//!
//! The FPGA sees five lines:
//!
//!  FPGA        direction (host view)
//! ---------------------------------
//!  nCONFIG     out (active low)
//!  nSTATUS     in  (active low)
//!  DCLK        out
//!  DATA0       out
//!  CONF_DONE   in
//!
//! Backends only know how to drive/read these lines; the protocol lives in
//! `passive_serial`.

use std::fmt;
use std::ops::{
	Deref,
	DerefMut,
};
use std::thread;
use std::time::{
	Duration,
	Instant,
};

mod mapped;
pub mod mpc52xx;
pub mod simulated;
pub mod sysfs;

pub use self::mapped::{
	Mapped,
	Registers,
	map_physical,
};

pub use self::simulated::{
	Event,
	Simulated,
};

pub fn reliable_sleep(mut duration: Duration) {
	loop {
		let now = Instant::now();
		thread::sleep(duration);
		let elapsed = now.elapsed();
		if elapsed >= duration {
			return;
		}
		duration -= elapsed;
	}
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Line {
	NConfig,
	NStatus,
	Dclk,
	Data0,
	ConfDone,
}

impl Line {
	pub const ALL: [Line; 5] = [
		Line::NConfig,
		Line::NStatus,
		Line::Dclk,
		Line::Data0,
		Line::ConfDone,
	];

	pub fn is_output(self) -> bool {
		match self {
			Line::NConfig | Line::Dclk | Line::Data0 => true,
			Line::NStatus | Line::ConfDone => false,
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			Line::NConfig => "nCONFIG",
			Line::NStatus => "nSTATUS",
			Line::Dclk => "DCLK",
			Line::Data0 => "DATA0",
			Line::ConfDone => "CONF_DONE",
		}
	}
}

impl fmt::Display for Line {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.name())
	}
}

pub trait Pins {
	// only called for output lines
	fn set_line(&mut self, line: Line, level: bool);
	fn read_line(&mut self, line: Line) -> bool;

	/// reserve all five lines; must not toggle any of them except to put
	/// nCONFIG into its idle (high) state
	fn acquire(&mut self) -> crate::AResult<()>;
	/// undo `acquire`; must be a no-op if not acquired
	fn release(&mut self);

	fn delay(&mut self, duration: Duration) {
		reliable_sleep(duration);
	}

	/// I/O errors hit by `set_line`/`read_line` since the last call
	fn take_fault(&mut self) -> Option<failure::Error> {
		None
	}
}

impl<'a, P: ?Sized + Pins> Pins for &'a mut P {
	fn set_line(&mut self, line: Line, level: bool) {
		P::set_line(*self, line, level)
	}
	fn read_line(&mut self, line: Line) -> bool {
		P::read_line(*self, line)
	}
	fn acquire(&mut self) -> crate::AResult<()> {
		P::acquire(*self)
	}
	fn release(&mut self) {
		P::release(*self)
	}
	fn delay(&mut self, duration: Duration) {
		P::delay(*self, duration)
	}
	fn take_fault(&mut self) -> Option<failure::Error> {
		P::take_fault(*self)
	}
}

impl<P: ?Sized + Pins> Pins for Box<P> {
	fn set_line(&mut self, line: Line, level: bool) {
		P::set_line(self, line, level)
	}
	fn read_line(&mut self, line: Line) -> bool {
		P::read_line(self, line)
	}
	fn acquire(&mut self) -> crate::AResult<()> {
		P::acquire(self)
	}
	fn release(&mut self) {
		P::release(self)
	}
	fn delay(&mut self, duration: Duration) {
		P::delay(self, duration)
	}
	fn take_fault(&mut self) -> Option<failure::Error> {
		P::take_fault(self)
	}
}

/// Pins reserved for the lifetime of the guard; released on drop.
pub struct Acquired<'a, P: ?Sized + Pins + 'a>(&'a mut P);

pub fn acquire<P: ?Sized + Pins>(pins: &mut P) -> crate::AResult<Acquired<P>> {
	pins.acquire()?;
	Ok(Acquired(pins))
}

impl<'a, P: ?Sized + Pins> Drop for Acquired<'a, P> {
	fn drop(&mut self) {
		self.0.release();
	}
}

impl<'a, P: ?Sized + Pins> Deref for Acquired<'a, P> {
	type Target = P;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<'a, P: ?Sized + Pins> DerefMut for Acquired<'a, P> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.0
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn line_directions() {
		let outputs: Vec<Line> = Line::ALL.iter().cloned().filter(|l| l.is_output()).collect();
		assert_eq!(outputs, vec![Line::NConfig, Line::Dclk, Line::Data0]);
		assert_eq!(Line::ConfDone.to_string(), "CONF_DONE");
	}

	#[test]
	fn guard_releases_on_drop() {
		let mut pins = Simulated::new();
		{
			let mut guard = acquire(&mut pins).unwrap();
			assert!(guard.is_acquired());
			guard.set_line(Line::NConfig, true);
		}
		assert!(!pins.is_acquired());
		assert_eq!(pins.events().last(), Some(&Event::Release));
	}

	#[test]
	fn failed_acquire_does_not_release() {
		let mut pins = Simulated::new().failing_acquire("busy");
		assert!(acquire(&mut pins).is_err());
		assert!(!pins.events().contains(&Event::Release));
	}
}
