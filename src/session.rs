use std::fmt;

use crate::passive_serial::{
	Bitstream,
	Configure,
	Report,
};
use crate::pins::{
	self,
	Acquired,
	Pins,
};
use crate::{
	LoadError,
	Profile,
};

/// Result of an accepted submission.
///
/// `bytes` is always the full submitted length, even when the configuration
/// ended with a bit overrun; check `report` for that.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Written {
	pub bytes: usize,
	pub report: Report,
}

impl fmt::Display for Written {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{} bytes written, {}", self.bytes, self.report)
	}
}

/// One configuration attempt; accepts exactly one bitstream.
///
/// The reconfiguration handshake can't be resumed, so the image has to arrive
/// as one block. The pins stay acquired until the session is dropped.
pub struct Session<'a, P: ?Sized + Pins + 'a> {
	pins: Acquired<'a, P>,
	profile: Profile,
	buffer: Bitstream,
	submissions: usize,
}

impl<'a, P: ?Sized + Pins> Session<'a, P> {
	pub fn begin(pins: &'a mut P, profile: &Profile) -> Result<Self, LoadError> {
		let pins = pins::acquire(pins).map_err(|e| {
			error!("couldn't acquire pins: {}", e);
			LoadError::acquire(&e)
		})?;
		Ok(Session {
			pins,
			profile: *profile,
			buffer: Bitstream::with_capacity(profile.max_firmware_size),
			submissions: 0,
		})
	}

	pub fn submissions(&self) -> usize {
		self.submissions
	}

	pub fn submit(&mut self, data: &[u8]) -> Result<Written, LoadError> {
		if data.len() > self.profile.max_firmware_size {
			error!("bitstream too big: {} bytes (at most {})", data.len(), self.profile.max_firmware_size);
			return Err(LoadError::Oversize {
				size: data.len(),
				max: self.profile.max_firmware_size,
			});
		}
		if self.submissions > 0 {
			error!("bitstream has to be written in one chunk ({} already accepted)", self.submissions());
			return Err(LoadError::MultipleSubmission);
		}

		self.buffer.fill(data)?;
		self.submissions += 1;

		let report = self.pins.configure(&self.profile, &self.buffer)?;
		Ok(Written {
			bytes: data.len(),
			report,
		})
	}

	/// Release the pins.
	pub fn end(self) {
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;
	use crate::passive_serial::State;
	use crate::pins::{
		Event,
		Simulated,
	};

	fn profile() -> Profile {
		Profile::pcm032().with_max_firmware_size(4).with_ready_polls(3)
	}

	#[rstest]
	#[case::empty(&[])]
	#[case::one(&[0x55])]
	#[case::full(&[1, 2, 3, 4])]
	fn second_submission_rejected(#[case] data: &[u8]) {
		let mut pins = Simulated::new();
		let mut session = Session::begin(&mut pins, &profile()).unwrap();
		let written = session.submit(data).unwrap();
		assert_eq!(written.bytes, data.len());
		match session.submit(data) {
			Err(LoadError::MultipleSubmission) => (),
			other => panic!("unexpected {:?}", other),
		}
		match session.submit(&[]) {
			Err(LoadError::MultipleSubmission) => (),
			other => panic!("unexpected {:?}", other),
		}
		// size is checked first, even after an accepted image
		match session.submit(&[0; 5]) {
			Err(LoadError::Oversize { size: 5, max: 4 }) => (),
			other => panic!("unexpected {:?}", other),
		}
		assert_eq!(session.submissions(), 1);
	}

	#[test]
	fn oversize_touches_no_line() {
		let mut pins = Simulated::new();
		{
			let mut session = Session::begin(&mut pins, &profile()).unwrap();
			match session.submit(&[0; 5]) {
				Err(LoadError::Oversize { size: 5, max: 4 }) => (),
				other => panic!("unexpected {:?}", other),
			}
			assert_eq!(session.submissions(), 0);
		}
		assert_eq!(pins.line_calls(), 0);
		assert_eq!(pins.events(), &[Event::Acquire, Event::Release]);
	}

	#[test]
	fn oversize_then_fitting_image_accepted() {
		let mut pins = Simulated::new().done_after_bits(3);
		let mut session = Session::begin(&mut pins, &profile()).unwrap();
		assert!(session.submit(&[0; 5]).is_err());
		let written = session.submit(&[0x01, 0x00]).unwrap();
		assert_eq!(written.report.bits, 3);
	}

	#[test]
	fn two_byte_image_done_after_third_bit() {
		let mut pins = Simulated::new().done_after_bits(3);
		let written = Session::begin(&mut pins, &profile()).unwrap().submit(&[0x01, 0x00]).unwrap();
		assert_eq!(written.bytes, 2);
		assert_eq!(written.report.state, State::Done);
		assert_eq!(written.report.bits, 3);
		assert!(written.report.conf_done);
		assert_eq!(pins.shifted_bits(), &[true, false, false]);
	}

	#[test]
	fn overrun_still_reports_bytes() {
		let mut pins = Simulated::new();
		let mut session = Session::begin(&mut pins, &profile()).unwrap();
		let written = session.submit(&[0x01, 0x00]).unwrap();
		assert_eq!(written.bytes, 2);
		assert_eq!(written.report.state, State::Overrun);
		assert_eq!(written.report.bits, 17);
	}

	#[test]
	fn not_ready_counts_as_submission() {
		let mut pins = Simulated::new().status_never_ready();
		let mut session = Session::begin(&mut pins, &profile()).unwrap();
		match session.submit(&[0x01]) {
			Err(LoadError::DeviceNotReady { polls: 3 }) => (),
			other => panic!("unexpected {:?}", other),
		}
		match session.submit(&[0x01]) {
			Err(LoadError::MultipleSubmission) => (),
			other => panic!("unexpected {:?}", other),
		}
	}

	#[test]
	fn acquire_failure() {
		let mut pins = Simulated::new().failing_acquire("pins in use by UART");
		match Session::begin(&mut pins, &profile()) {
			Err(LoadError::Acquire { reason }) => assert_eq!(reason, "pins in use by UART"),
			Err(e) => panic!("unexpected {:?}", e),
			Ok(_) => panic!("acquire should fail"),
		}
		assert_eq!(pins.line_calls(), 0);
	}

	#[test]
	fn new_session_starts_fresh() {
		let mut pins = Simulated::new();
		{
			let mut session = Session::begin(&mut pins, &profile()).unwrap();
			session.submit(&[0x00]).unwrap();
			session.end();
		}
		let mut session = Session::begin(&mut pins, &profile()).unwrap();
		assert_eq!(session.submissions(), 0);
		assert!(session.submit(&[0x00]).is_ok());
	}
}
