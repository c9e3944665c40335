use std::time::Duration;

use super::{
	Line,
	Pins,
};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Event {
	Acquire,
	Release,
	Set(Line, bool),
	Read(Line, bool),
	Delay(Duration),
}

/// A scripted FPGA: records every call, never sleeps.
///
/// nSTATUS reads high from the given poll on, CONF_DONE once the given number
/// of rising DCLK edges was seen. Used for dry runs and in tests.
#[derive(Clone, Debug)]
pub struct Simulated {
	events: Vec<Event>,
	status_ready_after: Option<usize>,
	done_after_bits: Option<usize>,
	acquire_error: Option<String>,
	fault: Option<String>,
	fault_after_bits: usize,
	acquired: bool,
	status_polls: usize,
	dclk: bool,
	data0: bool,
	nconfig: bool,
	shifted: Vec<bool>,
}

impl Simulated {
	/// ready immediately, never signals CONF_DONE
	pub fn new() -> Self {
		Simulated {
			events: Vec::new(),
			status_ready_after: Some(0),
			done_after_bits: None,
			acquire_error: None,
			fault: None,
			fault_after_bits: 0,
			acquired: false,
			status_polls: 0,
			dclk: false,
			data0: false,
			nconfig: true,
			shifted: Vec::new(),
		}
	}

	/// nSTATUS reads low for the first `polls` reads
	pub fn status_ready_after(mut self, polls: usize) -> Self {
		self.status_ready_after = Some(polls);
		self
	}

	pub fn status_never_ready(mut self) -> Self {
		self.status_ready_after = None;
		self
	}

	/// CONF_DONE reads high once `bits` bits were clocked in
	pub fn done_after_bits(mut self, bits: usize) -> Self {
		self.done_after_bits = Some(bits);
		self
	}

	pub fn failing_acquire(mut self, reason: &str) -> Self {
		self.acquire_error = Some(reason.to_string());
		self
	}

	/// report an I/O fault at the next `take_fault`
	pub fn with_fault(mut self, reason: &str) -> Self {
		self.fault = Some(reason.to_string());
		self
	}

	/// like `with_fault`, but only once `bits` bits were clocked in
	pub fn fault_after_bits(mut self, bits: usize, reason: &str) -> Self {
		self.fault = Some(reason.to_string());
		self.fault_after_bits = bits;
		self
	}

	pub fn events(&self) -> &[Event] {
		&self.events
	}

	/// DATA0 at every rising DCLK edge
	pub fn shifted_bits(&self) -> &[bool] {
		&self.shifted
	}

	pub fn clock_pulses(&self) -> usize {
		self.shifted.len()
	}

	pub fn is_acquired(&self) -> bool {
		self.acquired
	}

	/// set/read/delay calls, i.e. everything but acquire/release
	pub fn line_calls(&self) -> usize {
		self.events.iter().filter(|e| match e {
			Event::Acquire | Event::Release => false,
			_ => true,
		}).count()
	}

	fn conf_done(&self) -> bool {
		match self.done_after_bits {
			Some(bits) => self.shifted.len() >= bits,
			None => false,
		}
	}
}

impl Default for Simulated {
	fn default() -> Self {
		Simulated::new()
	}
}

impl Pins for Simulated {
	fn set_line(&mut self, line: Line, level: bool) {
		debug_assert!(line.is_output(), "{} is an input", line);
		self.events.push(Event::Set(line, level));
		match line {
			Line::Dclk => {
				if level && !self.dclk {
					self.shifted.push(self.data0);
				}
				self.dclk = level;
			},
			Line::Data0 => self.data0 = level,
			Line::NConfig => {
				if !level {
					// a new configuration cycle drops what was loaded so far
					self.shifted.clear();
				}
				self.nconfig = level;
			},
			Line::NStatus | Line::ConfDone => (),
		}
	}

	fn read_line(&mut self, line: Line) -> bool {
		let level = match line {
			Line::NStatus => {
				let polls = self.status_polls;
				self.status_polls += 1;
				match self.status_ready_after {
					Some(after) => polls >= after,
					None => false,
				}
			},
			Line::ConfDone => self.conf_done(),
			Line::Dclk => self.dclk,
			Line::Data0 => self.data0,
			Line::NConfig => self.nconfig,
		};
		self.events.push(Event::Read(line, level));
		level
	}

	fn acquire(&mut self) -> crate::AResult<()> {
		if let Some(ref reason) = self.acquire_error {
			bail!("{}", reason);
		}
		ensure!(!self.acquired, "pins already acquired");
		self.events.push(Event::Acquire);
		self.acquired = true;
		Ok(())
	}

	fn release(&mut self) {
		if self.acquired {
			self.events.push(Event::Release);
			self.acquired = false;
		}
	}

	fn delay(&mut self, duration: Duration) {
		self.events.push(Event::Delay(duration));
	}

	fn take_fault(&mut self) -> Option<failure::Error> {
		if self.shifted.len() < self.fault_after_bits {
			return None;
		}
		self.fault.take().map(|reason| format_err!("{}", reason))
	}
}
