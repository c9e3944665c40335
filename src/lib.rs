#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

macro_rules! with_context {
	(( $fmt:tt $($t:tt)* ), $e:expr) => {{
		use failure::Error;

		match (|| { $e })() {
			Ok(v) => Ok(v),
			Err(e) => {
				let e: Error = e;
				let msg = format!(concat!($fmt, ": {}") $($t)*, e);
				Err(Error::from(e.context(msg)))
			}
		}
	}};

	($msg:expr, $e:expr) => {
		with_context!(("{}", $msg), $e)
	};
}

pub type AResult<T> = Result<T, failure::Error>;

pub mod config;
pub mod error;
pub mod passive_serial;
pub mod pins;
pub mod session;

pub use self::config::Profile;
pub use self::error::LoadError;
pub use self::session::{
	Session,
	Written,
};

/// Load one bitstream: open a session on `pins`, submit `image` once and
/// release the pins again.
pub fn load_bitstream<P>(pins: &mut P, profile: &Profile, image: &[u8]) -> Result<Written, LoadError>
where
	P: pins::Pins + ?Sized,
{
	let mut session = Session::begin(pins, profile)?;
	session.submit(image)
}
