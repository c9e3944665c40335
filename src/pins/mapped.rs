use std::ffi::CString;
use std::fs;
use std::io;
use std::os::unix::io::{
	FromRawFd,
};
use std::ptr;

use libc::{
	MAP_SHARED,
	O_CLOEXEC,
	O_RDWR,
	O_SYNC,
	PROT_READ,
	PROT_WRITE,
	_SC_PAGESIZE,
	c_void,
	mmap,
	munmap,
	off_t,
	open,
	sysconf,
};

/// Register block access; multi-byte registers are big endian.
pub trait Registers {
	fn len(&self) -> usize;

	fn read_u8(&self, offset: usize) -> u8;
	fn read_be32(&self, offset: usize) -> u32;

	fn write_u8(&mut self, offset: usize, data: u8);
	fn write_be32(&mut self, offset: usize, data: u32);
}

/// A physical register window mapped through `/dev/mem`.
#[derive(Debug)]
pub struct Mapped {
	map: ptr::NonNull<u8>, // page aligned start of the mapping
	map_len: usize,
	offset: usize, // start of the register block within the mapping
	len: usize,
	base: u64,
}

impl Drop for Mapped {
	fn drop(&mut self) {
		let res = unsafe {
			munmap(
				self.map.as_ptr() as *mut c_void,
				self.map_len,
			)
		};
		if 0 != res {
			error!("munmap of registers at 0x{:08x} failed: {}", self.base, io::Error::last_os_error());
		}
	}
}

impl Mapped {
	pub fn base(&self) -> u64 {
		self.base
	}

	fn reg(&self, offset: usize) -> *mut u8 {
		unsafe { self.map.as_ptr().add(self.offset + offset) }
	}
}

impl Registers for Mapped {
	fn len(&self) -> usize {
		self.len
	}

	fn read_u8(&self, offset: usize) -> u8 {
		assert!(offset < self.len);
		unsafe { ptr::read_volatile(self.reg(offset)) }
	}

	fn read_be32(&self, offset: usize) -> u32 {
		assert!(offset & 3 == 0);
		assert!(offset + 3 < self.len);
		u32::from_be(unsafe { ptr::read_volatile(self.reg(offset) as *const u32) })
	}

	fn write_u8(&mut self, offset: usize, data: u8) {
		assert!(offset < self.len);
		unsafe { ptr::write_volatile(self.reg(offset), data) }
	}

	fn write_be32(&mut self, offset: usize, data: u32) {
		assert!(offset & 3 == 0);
		assert!(offset + 3 < self.len);
		unsafe { ptr::write_volatile(self.reg(offset) as *mut u32, data.to_be()) }
	}
}

/// Map `len` bytes of physical address space starting at `base`.
///
/// `base` doesn't need to be page aligned.
pub fn map_physical(base: u64, len: usize) -> io::Result<Mapped> {
	map_file("/dev/mem", base, len)
}

fn map_file(path: &str, base: u64, len: usize) -> io::Result<Mapped> {
	let page_size = unsafe { sysconf(_SC_PAGESIZE) };
	if page_size <= 0 {
		return Err(io::Error::last_os_error());
	}
	let page_size = page_size as u64;
	let map_base = base & !(page_size - 1);
	let offset = (base - map_base) as usize;
	let map_len = offset + len;

	let path = CString::new(path)?;

	let fd = unsafe { open(path.as_ptr(), O_RDWR | O_CLOEXEC | O_SYNC) };
	if -1 == fd {
		return Err(io::Error::last_os_error());
	}
	// the mapping stays valid after closing the fd
	let _f = unsafe { fs::File::from_raw_fd(fd) };

	let area = unsafe {
		mmap(
			ptr::null_mut(),
			map_len,
			PROT_READ | PROT_WRITE,
			MAP_SHARED,
			fd,
			map_base as off_t,
		)
	};

	if area == libc::MAP_FAILED {
		return Err(io::Error::last_os_error());
	}
	match ptr::NonNull::new(area as *mut u8) {
		None => Err(io::Error::new(io::ErrorKind::Other, "mmap returned NULL")),
		Some(map) => Ok(Mapped {
			map,
			map_len,
			offset,
			len,
			base,
		}),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn scratch_file(name: &str, size: usize) -> std::path::PathBuf {
		let path = std::env::temp_dir().join(format!("fpga-ps-loader-{}-{}", std::process::id(), name));
		fs::write(&path, vec![0u8; size]).unwrap();
		path
	}

	#[test]
	fn unaligned_window_is_big_endian() {
		let path = scratch_file("mapped", 8192);
		{
			let mut regs = map_file(path.to_str().unwrap(), 0x1004, 0x10).unwrap();
			assert_eq!(regs.len(), 0x10);
			assert_eq!(regs.base(), 0x1004);
			regs.write_be32(0, 0x1234_5678);
			regs.write_u8(9, 0xa5);
			assert_eq!(regs.read_u8(0), 0x12);
			assert_eq!(regs.read_be32(0), 0x1234_5678);
		}
		let data = fs::read(&path).unwrap();
		assert_eq!(&data[0x1004..0x1008], &[0x12, 0x34, 0x56, 0x78]);
		assert_eq!(data[0x100d], 0xa5);
		fs::remove_file(&path).unwrap();
	}

	#[test]
	#[should_panic]
	fn out_of_window_access_panics() {
		let path = scratch_file("mapped-oob", 4096);
		let regs = map_file(path.to_str().unwrap(), 0, 4).unwrap();
		regs.read_be32(4);
	}
}
