/*!
# CD Rip: Rip Buffer.
*/

use crate::{
	CD_C2_SIZE,
	CD_DATA_SIZE,
	CD_LEADIN,
	CD_Q_SIZE,
	msf_to_frames,
	scsi::{
		Cdb,
		ErrorCode,
		Transport,
	},
};
use std::collections::VecDeque;



/// # Full Reply Size.
const BUF_SIZE: usize = CD_DATA_SIZE as usize + CD_C2_SIZE as usize + CD_Q_SIZE as usize;



#[derive(Debug)]
/// # Rip Buffer.
///
/// This is sized to accommodate the biggest reply (audio + C2 + Q) but gets
/// sub-sliced according to what was actually requested. One buffer for all!
pub(super) struct RipBuffer {
	buf: Box<[u8; BUF_SIZE]>,
	c2: bool,
	sub_q: bool,
}

impl RipBuffer {
	/// # New Instance.
	pub(super) fn new(c2: bool, sub_q: bool) -> Self {
		Self {
			buf: Box::new([0; BUF_SIZE]),
			c2,
			sub_q,
		}
	}

	/// # Read Sector.
	///
	/// The buffer is zeroed beforehand so that a failed read leaves silence
	/// behind rather than stale data from the previous sector.
	///
	/// Returns `true` if a complete reply was transferred.
	///
	/// ## Errors
	///
	/// Returns the decoded sense data on failure.
	pub(super) fn read(&mut self, dev: &mut dyn Transport, lba: i32)
	-> Result<bool, ErrorCode> {
		self.buf.fill(0);
		let len = self.reply_len();
		let read = dev.execute(
			&Cdb::read_cd(lba, self.c2, self.sub_q),
			&mut self.buf[..len],
		)?;
		Ok(len <= read)
	}

	/// # Into Sector.
	pub(super) fn sector(&self, lba: i32) -> Sector {
		Sector {
			lba,
			data: self.data().to_vec(),
			c2: self.c2_errors(),
			sync: self.sync(lba),
		}
	}
}

impl RipBuffer {
	/// # Reply Length.
	const fn reply_len(&self) -> usize {
		let mut len = CD_DATA_SIZE as usize;
		if self.c2 { len += CD_C2_SIZE as usize; }
		if self.sub_q { len += CD_Q_SIZE as usize; }
		len
	}

	/// # Audio Data.
	fn data(&self) -> &[u8] { &self.buf[..usize::from(CD_DATA_SIZE)] }

	/// # C2 Error Count.
	///
	/// Each set bit corresponds to one unreliable byte of audio data.
	fn c2_errors(&self) -> u32 {
		if self.c2 {
			let start = usize::from(CD_DATA_SIZE);
			self.buf[start..start + usize::from(CD_C2_SIZE)].iter()
				.map(|b| b.count_ones())
				.sum()
		}
		else { 0 }
	}

	/// # Q Subchannel Position Check.
	///
	/// Return `Some(true)` if the Q block holds a position (ADR 1) matching
	/// the requested sector, `Some(false)` if it holds a different one, or
	/// `None` if there is nothing to check.
	fn sync(&self, lba: i32) -> Option<bool> {
		if ! self.sub_q { return None; }

		let start =
			if self.c2 { usize::from(CD_DATA_SIZE + CD_C2_SIZE) }
			else { usize::from(CD_DATA_SIZE) };
		let q = &self.buf[start..start + usize::from(CD_Q_SIZE)];

		// Only mode-1 Q carries the position.
		if 1 != q[0] & 0x0F { return None; }

		let abs = msf_to_frames(from_bcd(q[7]), from_bcd(q[8]), from_bcd(q[9]));
		Some(i64::from(abs) == i64::from(lba) + i64::from(CD_LEADIN))
	}
}



#[derive(Debug, Clone, Eq, PartialEq)]
/// # Sector.
///
/// One sector's worth of audio data, along with what was learned about it
/// while reading.
pub(super) struct Sector {
	/// # Logical Block Address.
	pub(super) lba: i32,

	/// # Audio Data.
	pub(super) data: Vec<u8>,

	/// # C2 Errors.
	pub(super) c2: u32,

	/// # Subchannel Sync.
	pub(super) sync: Option<bool>,
}

impl Sector {
	/// # Silence.
	///
	/// This stands in for sectors that cannot or should not be read.
	pub(super) fn silence(lba: i32) -> Self {
		Self {
			lba,
			data: vec![0; usize::from(CD_DATA_SIZE)],
			c2: 0,
			sync: None,
		}
	}
}



#[derive(Debug)]
/// # Sector Array.
///
/// A bounded, ordered window of consecutive sectors.
pub(super) struct SectorArray {
	set: VecDeque<Sector>,
	cap: usize,
}

impl SectorArray {
	/// # New.
	pub(super) fn new(cap: u16) -> Self {
		let cap = usize::from(cap.max(1));
		Self {
			set: VecDeque::with_capacity(cap),
			cap,
		}
	}

	/// # Push.
	///
	/// Sectors must be pushed in ascending order. If the array is already
	/// full, the oldest sector is dropped to make room.
	pub(super) fn push(&mut self, sector: Sector) {
		if self.cap <= self.set.len() { self.set.pop_front(); }
		self.set.push_back(sector);
	}

	/// # Clear.
	pub(super) fn clear(&mut self) { self.set.clear(); }

	/// # Contains LBA?
	pub(super) fn contains(&self, lba: i32) -> bool {
		self.set.iter().any(|s| s.lba == lba)
	}

	/// # Is Full?
	pub(super) fn is_full(&self) -> bool { self.cap <= self.set.len() }

	/// # Iter.
	pub(super) fn iter(&self) -> impl Iterator<Item=&Sector> { self.set.iter() }

	/// # Keep Newest.
	///
	/// Drop the oldest sectors, keeping at most `n`.
	pub(super) fn keep_newest(&mut self, n: usize) {
		while n < self.set.len() { self.set.pop_front(); }
	}

	/// # Length.
	pub(super) fn len(&self) -> usize { self.set.len() }

	/// # Retain From.
	///
	/// Drop any sectors before `lba`.
	pub(super) fn retain_from(&mut self, lba: i32) {
		self.set.retain(|s| lba <= s.lba);
	}
}



/// # From BCD.
const fn from_bcd(v: u8) -> u8 { (v >> 4) * 10 + (v & 0x0F) }
