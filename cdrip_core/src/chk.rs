/*!
# CD Rip: Checksums
*/

use crate::SAMPLES_PER_SECTOR;
use crc32fast::Hasher as Crc;



/// # First-Track Skip.
///
/// AccurateRip ignores the first five sectors of the first track, minus one
/// sample.
const AR_SKIP: u32 = SAMPLES_PER_SECTOR as u32 * 5 - 1;

/// # Last-Track Chop.
///
/// AccurateRip ignores the last five sectors of the last track.
const AR_CHOP: u32 = SAMPLES_PER_SECTOR as u32 * 5;

/// # Sector 450 Window (first index, 1-based).
const AR_450_START: u32 = SAMPLES_PER_SECTOR as u32 * 450 + 1;

/// # Sector 450 Window (last index, 1-based).
const AR_450_END: u32 = SAMPLES_PER_SECTOR as u32 * 451;



#[must_use]
/// # CRC32.
///
/// Return the plain (IEEE) CRC32 of the data.
pub fn crc32(src: &[u8]) -> u32 {
	let mut crc = Crc::new();
	crc.update(src);
	crc.finalize()
}



#[derive(Debug, Clone, Copy)]
/// # AccurateRip Checksum.
///
/// This is a streaming accumulator for the AccurateRip v1, v2, and
/// sector-450 checksums of a single track.
///
/// Data is treated as a sequence of 32-bit little-endian samples. Each sample
/// is multiplied by its 1-based position within the track; the low halves of
/// the products sum to v1, and v2 adds the high halves on top of that. All
/// arithmetic wraps.
///
/// Samples before `skip` or after `end` still advance the position, but are
/// otherwise ignored.
pub struct ArChecksum {
	idx: u32,
	skip: u32,
	end: u32,
	lo: u32,
	hi: u32,
	c450: u32,
	partial: [u8; 4],
	partial_len: u8,
}

impl Default for ArChecksum {
	#[inline]
	fn default() -> Self { Self::new(0, None) }
}

impl Eq for ArChecksum {}

impl PartialEq for ArChecksum {
	/// # Equality.
	///
	/// Only the live part of the partial-sample scratch counts.
	fn eq(&self, other: &Self) -> bool {
		self.idx == other.idx &&
		self.skip == other.skip &&
		self.end == other.end &&
		self.lo == other.lo &&
		self.hi == other.hi &&
		self.c450 == other.c450 &&
		self.partial[..usize::from(self.partial_len)] ==
			other.partial[..usize::from(other.partial_len)]
	}
}

impl ArChecksum {
	#[must_use]
	/// # New.
	///
	/// Samples `1..=skip` are ignored, as are any past `end` (if provided).
	pub const fn new(skip: u32, end: Option<u32>) -> Self {
		Self {
			idx: 0,
			skip,
			end: match end {
				Some(e) => e,
				None => u32::MAX,
			},
			lo: 0,
			hi: 0,
			c450: 0,
			partial: [0; 4],
			partial_len: 0,
		}
	}

	#[must_use]
	/// # For Track.
	///
	/// Set up the accumulator for a track of `samples` total samples, applying
	/// the first/last-track exclusions as needed.
	pub const fn for_track(samples: u32, first: bool, last: bool) -> Self {
		let skip = if first { AR_SKIP } else { 0 };
		let end = if last { Some(samples.saturating_sub(AR_CHOP)) } else { None };
		Self::new(skip, end)
	}

	#[allow(clippy::cast_possible_truncation)]
	/// # Update.
	///
	/// Feed more data. Chunks need not be sample-aligned.
	pub fn update(&mut self, mut src: &[u8]) {
		// Finish any partial sample from last time.
		if 0 != self.partial_len {
			let have = usize::from(self.partial_len);
			let need = (4 - have).min(src.len());
			self.partial[have..have + need].copy_from_slice(&src[..need]);
			src = &src[need..];
			if have + need < 4 {
				self.partial_len += need as u8;
				return;
			}
			self.partial_len = 0;
			self.push(u32::from_le_bytes(self.partial));
			self.partial = [0; 4];
		}

		let mut chunks = src.chunks_exact(4);
		for c in chunks.by_ref() {
			self.push(u32::from_le_bytes([c[0], c[1], c[2], c[3]]));
		}

		let rem = chunks.remainder();
		if ! rem.is_empty() {
			self.partial[..rem.len()].copy_from_slice(rem);
			self.partial_len = rem.len() as u8;
		}
	}

	#[allow(clippy::cast_possible_truncation)]
	/// # Push Sample.
	fn push(&mut self, sample: u32) {
		self.idx = self.idx.wrapping_add(1);
		let k = self.idx;

		if self.skip < k && k <= self.end {
			let product = u64::from(sample) * u64::from(k);
			self.lo = self.lo.wrapping_add((product & 0xFFFF_FFFF) as u32);
			self.hi = self.hi.wrapping_add((product >> 32) as u32);
		}

		if (AR_450_START..=AR_450_END).contains(&k) {
			let rel = k - AR_450_START + 1;
			self.c450 = self.c450.wrapping_add(sample.wrapping_mul(rel));
		}
	}
}

impl ArChecksum {
	#[must_use]
	/// # Samples Seen.
	pub const fn samples(&self) -> u32 { self.idx }

	#[must_use]
	/// # AccurateRip v1.
	pub const fn v1(&self) -> u32 { self.lo }

	#[must_use]
	/// # AccurateRip v2.
	pub const fn v2(&self) -> u32 { self.lo.wrapping_add(self.hi) }

	#[must_use]
	/// # AccurateRip (Sector 450).
	///
	/// This covers only the 451st sector of the track, weighted by position
	/// within that sector, making it independent of the track's start.
	pub const fn c450(&self) -> u32 { self.c450 }
}



#[cfg(test)]
mod test {
	use super::*;

	/// # Samples to Bytes.
	fn bytes(src: &[u32]) -> Vec<u8> {
		src.iter().flat_map(|s| s.to_le_bytes()).collect()
	}

	#[test]
	fn t_crc32() {
		assert_eq!(crc32(&[]), 0);
		assert_eq!(crc32(b"123456789"), 0xCBF4_3926);

		let zero = vec![0_u8; 2352 * 10];
		assert_eq!(crc32(&zero), crc32(&zero), "CRC32 should be deterministic.");
		assert_ne!(crc32(&zero), 0);

		// Concatenation isn't a simple XOR fold.
		let x = b"12345";
		let y = b"6789";
		assert_eq!(crc32(b"123456789"), crc32(&[x.as_slice(), y.as_slice()].concat()));
		assert_ne!(crc32(b"123456789"), crc32(x) ^ crc32(y));

		let mut crc = Crc::new();
		crc.update(x);
		crc.update(y);
		assert_eq!(crc.finalize(), 0xCBF4_3926);
	}

	#[test]
	fn t_ar_basic() {
		let mut chk = ArChecksum::default();
		assert_eq!(chk.v1(), 0);
		assert_eq!(chk.v2(), 0);

		chk.update(&bytes(&[1, 2, 3]));
		assert_eq!(chk.samples(), 3);
		assert_eq!(chk.v1(), 14);
		assert_eq!(chk.v2(), 14);

		// Overflow into the high half.
		let mut chk = ArChecksum::default();
		chk.update(&bytes(&[0, u32::MAX]));
		assert_eq!(chk.v1(), 0xFFFF_FFFE);
		assert_eq!(chk.v2(), 0xFFFF_FFFF);

		// Zero is zero.
		let mut chk = ArChecksum::for_track(588 * 20, true, true);
		chk.update(&vec![0; 2352 * 20]);
		assert_eq!(chk.v1(), 0);
		assert_eq!(chk.v2(), 0);
	}

	#[test]
	fn t_ar_unaligned() {
		let raw = bytes(&[7, 0xDEAD_BEEF, 12_345, 0x8000_0001, 3]);

		let mut a = ArChecksum::default();
		a.update(&raw);

		let mut b = ArChecksum::default();
		for chunk in raw.chunks(3) { b.update(chunk); }

		assert_eq!(a, b);
		assert_eq!(b.samples(), 5);

		// Mid-sample states compare by the bytes held so far.
		let mut a = ArChecksum::default();
		a.update(&raw[..6]);
		let mut b = ArChecksum::default();
		b.update(&raw[..1]);
		b.update(&raw[1..6]);
		assert_eq!(a, b);
		b.update(&raw[6..7]);
		assert_ne!(a, b);
	}

	#[test]
	fn t_ar_skip_chop() {
		let total = 588 * 12;
		let raw = bytes(&vec![1_u32; total as usize]);

		// Middle tracks count everything.
		let mut chk = ArChecksum::for_track(total, false, false);
		chk.update(&raw);
		let all = (1..=total).sum::<u32>();
		assert_eq!(chk.v1(), all);

		// The first skips 2939 samples.
		let mut chk = ArChecksum::for_track(total, true, false);
		chk.update(&raw);
		assert_eq!(chk.v1(), (2940..=total).sum::<u32>());

		// The last chops 2940.
		let mut chk = ArChecksum::for_track(total, false, true);
		chk.update(&raw);
		assert_eq!(chk.v1(), (1..=total - 2940).sum::<u32>());

		// Both.
		let mut chk = ArChecksum::for_track(total, true, true);
		chk.update(&raw);
		assert_eq!(chk.v1(), (2940..=total - 2940).sum::<u32>());
		assert_eq!(chk.c450(), 0, "The track is too short for sector 450.");
	}

	#[test]
	fn t_ar_450() {
		let total = 588 * 452;
		let raw = bytes(&vec![1_u32; total]);
		let mut chk = ArChecksum::for_track(total as u32, true, true);
		chk.update(&raw);
		assert_eq!(chk.c450(), (1..=588).sum::<u32>());
	}
}
