use std::time::Duration;

/// Limits and timing of one board.
///
/// The readiness timeout is a poll budget (`ready_polls` × `poll_interval`),
/// not wall-clock time.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Profile {
	/// largest image a session accepts (bytes)
	pub max_firmware_size: usize,
	/// how often nSTATUS is polled before giving up
	pub ready_polls: u32,
	pub poll_interval: Duration,
	/// nCONFIG is held low, and afterwards high, for this long
	pub reset_hold: Duration,
	/// emit a progress message every that many clocked bits (0: never)
	pub progress_every: usize,
}

pub const PCM032_MAX_FIRMWARE_SIZE: usize = 130_000;
pub const DEFAULT_READY_POLLS: u32 = 20_000;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_micros(1);
pub const DEFAULT_RESET_HOLD: Duration = Duration::from_micros(1000);
pub const DEFAULT_PROGRESS_EVERY: usize = 8192;

impl Profile {
	/// Cyclone II on the pcm032 board
	pub fn pcm032() -> Self {
		Profile {
			max_firmware_size: PCM032_MAX_FIRMWARE_SIZE,
			ready_polls: DEFAULT_READY_POLLS,
			poll_interval: DEFAULT_POLL_INTERVAL,
			reset_hold: DEFAULT_RESET_HOLD,
			progress_every: DEFAULT_PROGRESS_EVERY,
		}
	}

	pub fn with_max_firmware_size(mut self, size: usize) -> Self {
		self.max_firmware_size = size;
		self
	}

	pub fn with_ready_polls(mut self, polls: u32) -> Self {
		self.ready_polls = polls;
		self
	}

	/// Worst case time spent waiting for nSTATUS.
	pub fn ready_timeout(&self) -> Duration {
		self.poll_interval * self.ready_polls
	}
}

impl Default for Profile {
	fn default() -> Self {
		Profile::pcm032()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pcm032_defaults() {
		let p = Profile::default();
		assert_eq!(p.max_firmware_size, 130_000);
		assert_eq!(p.ready_polls, 20_000);
		assert_eq!(p.ready_timeout(), Duration::from_millis(20));
		assert_eq!(p.reset_hold, Duration::from_millis(1));
	}

	#[test]
	fn overrides() {
		let p = Profile::pcm032().with_max_firmware_size(4 << 20).with_ready_polls(5);
		assert_eq!(p.max_firmware_size, 4 << 20);
		assert_eq!(p.ready_timeout(), Duration::from_micros(5));
	}
}
