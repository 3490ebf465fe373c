/*!
# CD Rip: Command Descriptor Blocks
*/

use std::fmt;



/// # INQUIRY.
const OP_INQUIRY: u8 = 0x12;

/// # MODE SENSE (10).
const OP_MODE_SENSE_10: u8 = 0x5A;

/// # READ SUB-CHANNEL.
const OP_READ_SUBCHANNEL: u8 = 0x42;

/// # READ TOC/PMA/ATIP.
const OP_READ_TOC: u8 = 0x43;

/// # READ CD.
const OP_READ_CD: u8 = 0xBE;

/// # TOC Format: Raw.
const TOC_FORMAT_RAW: u8 = 0x02;

/// # TOC Format: CD-Text.
const TOC_FORMAT_CDTEXT: u8 = 0x05;

/// # Subchannel Format: Media Catalog Number.
const SUB_FORMAT_MCN: u8 = 0x02;

/// # Subchannel Format: ISRC.
const SUB_FORMAT_ISRC: u8 = 0x03;

/// # Mode Page: CD Capabilities and Mechanical Status.
pub(crate) const MODE_PAGE_CAPABILITIES: u8 = 0x2A;

/// # READ CD: Expected Sector Type CD-DA.
const READ_CD_CDDA: u8 = 0b0000_0100;

/// # READ CD: User Data.
const READ_CD_USER_DATA: u8 = 0b0001_0000;

/// # READ CD: C2 Error Pointers (294 bytes).
const READ_CD_C2: u8 = 0b0000_0010;

/// # READ CD: Formatted Q Subchannel (16 bytes).
const READ_CD_SUB_Q: u8 = 0b0000_0010;



#[derive(Clone, Copy, Eq, PartialEq)]
/// # Command Descriptor Block.
///
/// A fixed-length (10- or 12-byte) command. Fields are written at explicit
/// byte offsets with big-endian multi-byte values.
pub struct Cdb {
	bytes: [u8; 12],
	len: u8,
}

impl fmt::Debug for Cdb {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Cdb").field(&self.as_slice()).finish()
	}
}

impl Cdb {
	/// # New (Blank).
	const fn new(op: u8, len: u8) -> Self {
		let mut bytes = [0_u8; 12];
		bytes[0] = op;
		Self { bytes, len }
	}

	#[must_use]
	/// # INQUIRY.
	///
	/// Standard inquiry data, padded to the twelve bytes an ATAPI packet
	/// expects.
	pub const fn inquiry(alloc: u8) -> Self {
		let mut out = Self::new(OP_INQUIRY, 12);
		out.bytes[4] = alloc;
		out
	}

	#[must_use]
	/// # MODE SENSE (10).
	///
	/// Current values for `page`, with block descriptors disabled.
	pub const fn mode_sense(page: u8, alloc: u16) -> Self {
		let mut out = Self::new(OP_MODE_SENSE_10, 10);
		out.bytes[1] = 0b0000_1000; // DBD.
		out.bytes[2] = page & 0b0011_1111;
		out.with_alloc(alloc)
	}

	#[must_use]
	/// # READ TOC (Raw).
	pub const fn read_toc_raw(alloc: u16) -> Self {
		Self::read_toc(TOC_FORMAT_RAW, 1, alloc)
	}

	#[must_use]
	/// # READ TOC (CD-Text).
	pub const fn read_cdtext(alloc: u16) -> Self {
		Self::read_toc(TOC_FORMAT_CDTEXT, 0, alloc)
	}

	/// # READ TOC/PMA/ATIP.
	const fn read_toc(format: u8, session: u8, alloc: u16) -> Self {
		let mut out = Self::new(OP_READ_TOC, 10);
		out.bytes[1] = 0b0000_0010; // MSF.
		out.bytes[2] = format & 0b0000_1111;
		out.bytes[6] = session;
		out.with_alloc(alloc)
	}

	#[must_use]
	/// # READ SUB-CHANNEL (MCN).
	pub const fn read_mcn() -> Self { Self::read_subchannel(SUB_FORMAT_MCN, 0, 24) }

	#[must_use]
	/// # READ SUB-CHANNEL (ISRC).
	pub const fn read_isrc(track: u8) -> Self {
		Self::read_subchannel(SUB_FORMAT_ISRC, track, 24)
	}

	/// # READ SUB-CHANNEL.
	const fn read_subchannel(format: u8, track: u8, alloc: u16) -> Self {
		let mut out = Self::new(OP_READ_SUBCHANNEL, 10);
		out.bytes[2] = 0b0100_0000; // SubQ.
		out.bytes[3] = format;
		out.bytes[6] = track;
		out.with_alloc(alloc)
	}

	#[must_use]
	/// # READ CD.
	///
	/// Read a single CD-DA sector at `lba`, optionally with C2 error
	/// pointers and formatted Q subchannel data tacked onto the end (in that
	/// order).
	pub const fn read_cd(lba: i32, c2: bool, sub_q: bool) -> Self {
		let mut out = Self::new(OP_READ_CD, 12);
		out.bytes[1] = READ_CD_CDDA;
		let lba = lba.to_be_bytes();
		out.bytes[2] = lba[0];
		out.bytes[3] = lba[1];
		out.bytes[4] = lba[2];
		out.bytes[5] = lba[3];
		out.bytes[8] = 1; // One block.
		out.bytes[9] =
			if c2 { READ_CD_USER_DATA | READ_CD_C2 }
			else { READ_CD_USER_DATA };
		if sub_q { out.bytes[10] = READ_CD_SUB_Q; }
		out
	}

	/// # With Allocation Length (Bytes 7-8).
	const fn with_alloc(mut self, alloc: u16) -> Self {
		let alloc = alloc.to_be_bytes();
		self.bytes[7] = alloc[0];
		self.bytes[8] = alloc[1];
		self
	}
}

impl Cdb {
	#[must_use]
	/// # As Slice.
	pub fn as_slice(&self) -> &[u8] { &self.bytes[..usize::from(self.len)] }

	#[must_use]
	/// # Opcode.
	pub const fn opcode(&self) -> u8 { self.bytes[0] }

	#[must_use]
	/// # Length.
	pub const fn len(&self) -> u8 { self.len }

	#[must_use]
	/// # Is Empty?
	///
	/// Never, but clippy insists.
	pub const fn is_empty(&self) -> bool { self.len == 0 }

	#[must_use]
	/// # Allocation Length.
	///
	/// Return the requested allocation length for the variable-length
	/// commands.
	pub const fn alloc(&self) -> u16 {
		match self.bytes[0] {
			OP_INQUIRY => self.bytes[4] as u16,
			OP_MODE_SENSE_10 | OP_READ_SUBCHANNEL | OP_READ_TOC =>
				u16::from_be_bytes([self.bytes[7], self.bytes[8]]),
			_ => 0,
		}
	}

	#[must_use]
	/// # Format Code.
	///
	/// For READ TOC this is the TOC format; for READ SUB-CHANNEL, the data
	/// format.
	pub const fn format(&self) -> u8 {
		match self.bytes[0] {
			OP_READ_TOC => self.bytes[2] & 0b0000_1111,
			OP_READ_SUBCHANNEL => self.bytes[3],
			_ => 0,
		}
	}

	#[must_use]
	/// # Track Number (READ SUB-CHANNEL).
	pub const fn track(&self) -> u8 {
		if self.bytes[0] == OP_READ_SUBCHANNEL { self.bytes[6] }
		else { 0 }
	}

	#[must_use]
	/// # LBA (READ CD).
	pub const fn lba(&self) -> Option<i32> {
		if self.bytes[0] == OP_READ_CD {
			Some(i32::from_be_bytes([
				self.bytes[2], self.bytes[3], self.bytes[4], self.bytes[5],
			]))
		}
		else { None }
	}

	#[must_use]
	/// # READ CD With C2?
	pub const fn wants_c2(&self) -> bool {
		self.bytes[0] == OP_READ_CD && 0 != self.bytes[9] & READ_CD_C2
	}

	#[must_use]
	/// # READ CD With Q?
	pub const fn wants_sub_q(&self) -> bool {
		self.bytes[0] == OP_READ_CD && 0 != self.bytes[10] & READ_CD_SUB_Q
	}

	#[must_use]
	/// # Is READ TOC (CD-Text)?
	pub const fn is_cdtext(&self) -> bool {
		self.bytes[0] == OP_READ_TOC && self.format() == TOC_FORMAT_CDTEXT
	}

	#[must_use]
	/// # Is READ TOC (Raw)?
	pub const fn is_toc_raw(&self) -> bool {
		self.bytes[0] == OP_READ_TOC && self.format() == TOC_FORMAT_RAW
	}

	#[must_use]
	/// # Is INQUIRY?
	pub const fn is_inquiry(&self) -> bool { self.bytes[0] == OP_INQUIRY }

	#[must_use]
	/// # Is MODE SENSE?
	pub const fn is_mode_sense(&self) -> bool { self.bytes[0] == OP_MODE_SENSE_10 }

	#[must_use]
	/// # Is READ SUB-CHANNEL (MCN)?
	pub const fn is_mcn(&self) -> bool {
		self.bytes[0] == OP_READ_SUBCHANNEL && self.bytes[3] == SUB_FORMAT_MCN
	}

	#[must_use]
	/// # Is READ SUB-CHANNEL (ISRC)?
	pub const fn is_isrc(&self) -> bool {
		self.bytes[0] == OP_READ_SUBCHANNEL && self.bytes[3] == SUB_FORMAT_ISRC
	}
}
