use std::fmt;
use std::fs;
use std::io::Write;
use std::os::unix::fs::FileExt;
use std::path::{
	Path,
	PathBuf,
};

use super::{
	Line,
	Pins,
};

pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// Linux GPIO numbers of the five lines.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct GpioNumbers {
	pub nconfig: u32,
	pub nstatus: u32,
	pub dclk: u32,
	pub data0: u32,
	pub conf_done: u32,
}

impl GpioNumbers {
	pub fn get(&self, line: Line) -> u32 {
		match line {
			Line::NConfig => self.nconfig,
			Line::NStatus => self.nstatus,
			Line::Dclk => self.dclk,
			Line::Data0 => self.data0,
			Line::ConfDone => self.conf_done,
		}
	}
}

impl fmt::Display for GpioNumbers {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f,
			"nCONFIG={} nSTATUS={} DCLK={} DATA0={} CONF_DONE={}",
			self.nconfig, self.nstatus, self.dclk, self.data0, self.conf_done,
		)
	}
}

fn write_attribute(path: &Path, value: &str) -> crate::AResult<()> {
	with_context!(("couldn't write {:?} to {}", value, path.display()), {
		// sysfs wants the value in one write
		fs::OpenOptions::new().write(true).open(path)?.write_all(value.as_bytes())?;
		Ok(())
	})
}

/// The five lines as generic GPIOs through the sysfs interface.
pub struct SysfsPins {
	root: PathBuf,
	numbers: GpioNumbers,
	// "value" files, indexed like `Line::ALL`
	values: Option<Vec<fs::File>>,
	// GPIOs we exported and have to unexport again
	exported: Vec<u32>,
	fault: Option<failure::Error>,
}

impl SysfsPins {
	pub fn new(numbers: GpioNumbers) -> Self {
		SysfsPins::with_root(SYSFS_GPIO_ROOT, numbers)
	}

	pub fn with_root<P: Into<PathBuf>>(root: P, numbers: GpioNumbers) -> Self {
		SysfsPins {
			root: root.into(),
			numbers,
			values: None,
			exported: Vec::new(),
			fault: None,
		}
	}

	pub fn numbers(&self) -> GpioNumbers {
		self.numbers
	}

	fn gpio_dir(&self, gpio: u32) -> PathBuf {
		self.root.join(format!("gpio{}", gpio))
	}

	fn open_line(&mut self, line: Line) -> crate::AResult<fs::File> {
		let gpio = self.numbers.get(line);
		let dir = self.gpio_dir(gpio);
		if !dir.exists() {
			write_attribute(&self.root.join("export"), &gpio.to_string())?;
			self.exported.push(gpio);
		}

		// "high"/"low" set the output level together with the direction
		let direction = match line {
			Line::NConfig => "high",
			Line::Dclk | Line::Data0 => "low",
			Line::NStatus | Line::ConfDone => "in",
		};
		write_attribute(&dir.join("direction"), direction)?;

		let value = dir.join("value");
		with_context!(("couldn't open {} for {}", value.display(), line), {
			Ok(fs::OpenOptions::new()
				.read(true)
				.write(line.is_output())
				.open(&value)?)
		})
	}

	fn value_file(&self, line: Line) -> Option<&fs::File> {
		let index = Line::ALL.iter().position(|l| *l == line)?;
		self.values.as_ref().map(|v| &v[index])
	}

	// keeps (and logs) only the first error until `take_fault`
	fn latch_fault(&mut self, e: failure::Error) {
		if self.fault.is_none() {
			error!("GPIO access failed: {}", e);
			self.fault = Some(e);
		}
	}
}

impl Drop for SysfsPins {
	fn drop(&mut self) {
		self.release();
	}
}

impl Pins for SysfsPins {
	fn set_line(&mut self, line: Line, level: bool) {
		debug_assert!(line.is_output(), "{} is an input", line);
		let result = match self.value_file(line) {
			None => Err(format_err!("{} written while GPIOs not acquired", line)),
			Some(f) => f.write_at(if level { b"1" } else { b"0" }, 0).map(|_| ()).map_err(|e| {
				format_err!("write {} (GPIO {}): {}", line, self.numbers.get(line), e)
			}),
		};
		if let Err(e) = result {
			self.latch_fault(e);
		}
	}

	fn read_line(&mut self, line: Line) -> bool {
		let mut buf = [0u8; 1];
		let result = match self.value_file(line) {
			None => Err(format_err!("{} read while GPIOs not acquired", line)),
			Some(f) => match f.read_at(&mut buf, 0) {
				Ok(1) => Ok(buf[0] == b'1'),
				Ok(_) => Err(format_err!("read {} (GPIO {}): empty value", line, self.numbers.get(line))),
				Err(e) => Err(format_err!("read {} (GPIO {}): {}", line, self.numbers.get(line), e)),
			},
		};
		match result {
			Ok(level) => level,
			Err(e) => {
				self.latch_fault(e);
				false
			},
		}
	}

	fn acquire(&mut self) -> crate::AResult<()> {
		ensure!(self.values.is_none(), "GPIOs {} already acquired", self.numbers);
		let mut values = Vec::with_capacity(Line::ALL.len());
		for line in Line::ALL.iter() {
			match self.open_line(*line) {
				Ok(f) => values.push(f),
				Err(e) => {
					// unexport what we got so far
					self.release();
					return Err(e);
				},
			}
		}
		self.values = Some(values);
		self.fault = None;
		debug!("GPIOs acquired: {}", self.numbers);
		Ok(())
	}

	fn release(&mut self) {
		self.values = None;
		let exported = std::mem::replace(&mut self.exported, Vec::new());
		for gpio in exported {
			if let Err(e) = write_attribute(&self.root.join("unexport"), &gpio.to_string()) {
				error!("GPIO {}: failed to unexport: {}", gpio, e);
			}
		}
	}

	fn take_fault(&mut self) -> Option<failure::Error> {
		self.fault.take()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const NUMBERS: GpioNumbers = GpioNumbers {
		nconfig: 10,
		nstatus: 11,
		dclk: 12,
		data0: 13,
		conf_done: 14,
	};

	// fake sysfs tree; GPIOs listed in `present` already exported
	fn fake_root(name: &str, present: &[u32]) -> PathBuf {
		let root = std::env::temp_dir().join(format!("fpga-ps-loader-{}-{}", std::process::id(), name));
		let _ = fs::remove_dir_all(&root);
		fs::create_dir_all(&root).unwrap();
		fs::write(root.join("export"), b"").unwrap();
		fs::write(root.join("unexport"), b"").unwrap();
		for gpio in present {
			let dir = root.join(format!("gpio{}", gpio));
			fs::create_dir(&dir).unwrap();
			fs::write(dir.join("direction"), b"in\n").unwrap();
			fs::write(dir.join("value"), b"0\n").unwrap();
		}
		root
	}

	fn read(root: &Path, gpio: u32, attr: &str) -> String {
		fs::read_to_string(root.join(format!("gpio{}", gpio)).join(attr)).unwrap()
	}

	#[test]
	fn drives_and_reads_values() {
		let root = fake_root("sysfs-values", &[10, 11, 12, 13, 14]);
		let mut pins = SysfsPins::with_root(&root, NUMBERS);
		pins.acquire().unwrap();
		assert!(read(&root, 10, "direction").starts_with("high"));
		assert!(read(&root, 12, "direction").starts_with("low"));
		assert!(read(&root, 14, "direction").starts_with("in"));

		pins.set_line(Line::Data0, true);
		assert!(read(&root, 13, "value").starts_with('1'));
		pins.set_line(Line::Data0, false);
		assert!(read(&root, 13, "value").starts_with('0'));

		assert!(!pins.read_line(Line::ConfDone));
		fs::write(root.join("gpio14").join("value"), b"1\n").unwrap();
		assert!(pins.read_line(Line::ConfDone));
		assert!(pins.take_fault().is_none());

		pins.release();
		// nothing was exported by us
		assert_eq!(fs::read_to_string(root.join("unexport")).unwrap(), "");
		fs::remove_dir_all(&root).unwrap();
	}

	#[test]
	fn failed_export_unexports_partial() {
		// only nCONFIG present; exporting nSTATUS "works" but its directory never appears
		let root = fake_root("sysfs-partial", &[10]);
		let mut pins = SysfsPins::with_root(&root, NUMBERS);
		assert!(pins.acquire().is_err());
		assert_eq!(fs::read_to_string(root.join("export")).unwrap(), "11");
		assert_eq!(fs::read_to_string(root.join("unexport")).unwrap(), "11");
		fs::remove_dir_all(&root).unwrap();
	}

	#[test]
	fn access_without_acquire_is_a_fault() {
		let root = fake_root("sysfs-unacquired", &[]);
		let mut pins = SysfsPins::with_root(&root, NUMBERS);
		pins.set_line(Line::Dclk, true);
		assert!(!pins.read_line(Line::NStatus));
		let fault = pins.take_fault().unwrap();
		assert!(fault.to_string().contains("DCLK"));
		assert!(pins.take_fault().is_none());
		fs::remove_dir_all(&root).unwrap();
	}
}
