use std::slice;

use crate::LoadError;

/// Buffer for one configuration image.
///
/// The image is shifted out LSB first, byte by byte.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Bitstream {
	data: Vec<u8>,
	capacity: usize,
}

impl Bitstream {
	pub fn with_capacity(capacity: usize) -> Self {
		Bitstream {
			data: Vec::with_capacity(capacity),
			capacity,
		}
	}

	/// Replace the content; fails without touching the buffer if `data` is too big.
	pub fn fill(&mut self, data: &[u8]) -> Result<(), LoadError> {
		if data.len() > self.capacity {
			return Err(LoadError::Oversize {
				size: data.len(),
				max: self.capacity,
			});
		}
		self.data.clear();
		self.data.extend_from_slice(data);
		Ok(())
	}

	pub fn len(&self) -> usize {
		self.data.len()
	}

	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}

	pub fn bit_len(&self) -> usize {
		self.data.len() * 8
	}

	pub fn bits(&self) -> Bits {
		Bits {
			bytes: self.data.iter(),
			current: 0,
			left_in_current: 0,
		}
	}
}

pub struct Bits<'a> {
	bytes: slice::Iter<'a, u8>,
	current: u8,
	left_in_current: u8,
}

impl<'a> Iterator for Bits<'a> {
	type Item = bool;

	fn next(&mut self) -> Option<Self::Item> {
		if 0 == self.left_in_current {
			self.current = *self.bytes.next()?;
			self.left_in_current = 8;
		}
		let bit = 0 != self.current & 1;
		self.current >>= 1;
		self.left_in_current -= 1;
		Some(bit)
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		let len = self.bytes.len() * 8 + self.left_in_current as usize;
		(len, Some(len))
	}
}

impl<'a> ExactSizeIterator for Bits<'a> {}

#[cfg(test)]
mod tests {
	use super::*;

	fn filled(data: &[u8]) -> Bitstream {
		let mut b = Bitstream::with_capacity(16);
		b.fill(data).unwrap();
		b
	}

	#[test]
	fn lsb_first() {
		let b = filled(&[0b1011_0000]);
		let bits: Vec<u8> = b.bits().map(|b| b as u8).collect();
		assert_eq!(bits, vec![0, 0, 0, 0, 1, 1, 0, 1]);
	}

	#[test]
	fn bytes_in_order() {
		let b = filled(&[0x01, 0x80]);
		let bits: Vec<bool> = b.bits().collect();
		assert_eq!(bits.len(), 16);
		assert!(bits[0]);
		assert!(bits[15]);
		assert_eq!(bits.iter().filter(|b| **b).count(), 2);
	}

	#[test]
	fn exact_size() {
		let b = filled(&[0xff, 0x00, 0xaa]);
		let mut bits = b.bits();
		assert_eq!(bits.len(), 24);
		bits.next();
		assert_eq!(bits.len(), 23);
		assert_eq!(filled(&[]).bits().len(), 0);
	}

	#[test]
	fn oversize_keeps_content() {
		let mut b = filled(&[1, 2, 3]);
		match b.fill(&[0; 17]) {
			Err(LoadError::Oversize { size: 17, max: 16 }) => (),
			other => panic!("unexpected {:?}", other),
		}
		assert_eq!(b, filled(&[1, 2, 3]));
	}
}
