use failure::Fail;

/// Why a submission was not loaded.
///
/// Everything except `DeviceNotReady` and `PinFault` is detected before any
/// line is touched. A bit overrun is not an error; see
/// [`State::Overrun`](crate::passive_serial::State::Overrun).
#[derive(Debug, Fail)]
pub enum LoadError {
	#[fail(display = "bitstream too big: {} bytes (at most {} allowed)", size, max)]
	Oversize {
		size: usize,
		max: usize,
	},
	#[fail(display = "bitstream has to be written in one chunk (for example: dd if=.. of=.. bs=5M)")]
	MultipleSubmission,
	#[fail(display = "device not ready: nSTATUS still low after {} polls", polls)]
	DeviceNotReady {
		polls: u32,
	},
	#[fail(display = "couldn't acquire configuration pins: {}", reason)]
	Acquire {
		reason: String,
	},
	#[fail(display = "pin access failed during configuration: {}", reason)]
	PinFault {
		reason: String,
	},
}

// failure::Error only displays its outermost context
fn describe_chain(e: &failure::Error) -> String {
	e.iter_chain().map(|c| c.to_string()).collect::<Vec<_>>().join(": ")
}

impl LoadError {
	pub fn acquire(e: &failure::Error) -> Self {
		LoadError::Acquire { reason: describe_chain(e) }
	}

	pub fn pin_fault(e: &failure::Error) -> Self {
		LoadError::PinFault { reason: describe_chain(e) }
	}

	/// errno a character device would have failed the write() with
	pub fn errno(&self) -> i32 {
		match self {
			LoadError::Oversize { .. } => libc::EFBIG,
			LoadError::MultipleSubmission => libc::EIO,
			LoadError::DeviceNotReady { .. } => libc::ENODEV,
			LoadError::Acquire { .. } => libc::EBUSY,
			LoadError::PinFault { .. } => libc::EIO,
		}
	}
}
