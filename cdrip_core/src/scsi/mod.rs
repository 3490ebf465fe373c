/*!
# CD Rip: SCSI/MMC Transport

Everything here is a thin layer over a generic pass-through: command bytes
in, status + sense + data out. The readers and the ripper only ever see the
[`Transport`] trait, so the device can be swapped for a scripted fake in
tests.
*/

mod cdb;
#[cfg(test)] pub(crate) mod mock;
mod sg;

pub use cdb::Cdb;
pub(crate) use cdb::MODE_PAGE_CAPABILITIES;
pub use sg::{
	SgDevice,
	SgOpener,
};

use crate::CdRipError;
use std::fmt;



/// # Maximum Safe Allocation Length.
///
/// This is used in place of a reply length the drive got wrong.
pub const MAX_ALLOC: u16 = 0xFFFF;



/// # Helper: Sense Keys.
macro_rules! sense_keys {
	( $( $k:ident $v:literal $label:literal ),+ $(,)? ) => (
		#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
		#[repr(u8)]
		/// # Sense Key.
		///
		/// The broad error category reported by the device.
		pub enum SenseKey {
			$(
				#[doc = concat!("# ", $label, ".")]
				$k = $v,
			)+
		}

		impl From<u8> for SenseKey {
			fn from(src: u8) -> Self {
				match src & 0x0F {
					$( $v => Self::$k, )+
					_ => Self::Reserved,
				}
			}
		}

		impl SenseKey {
			#[must_use]
			/// # As Str.
			pub const fn as_str(self) -> &'static str {
				match self {
					$( Self::$k => $label, )+
				}
			}
		}
	);
}

sense_keys! {
	NoSense        0x00 "No Sense",
	RecoveredError 0x01 "Recovered Error",
	NotReady       0x02 "Not Ready",
	MediumError    0x03 "Medium Error",
	HardwareError  0x04 "Hardware Error",
	IllegalRequest 0x05 "Illegal Request",
	UnitAttention  0x06 "Unit Attention",
	DataProtect    0x07 "Data Protect",
	BlankCheck     0x08 "Blank Check",
	VendorSpecific 0x09 "Vendor Specific",
	CopyAborted    0x0A "Copy Aborted",
	AbortedCommand 0x0B "Aborted Command",
	Equal          0x0C "Equal",
	VolumeOverflow 0x0D "Volume Overflow",
	Miscompare     0x0E "Miscompare",
	Reserved       0x0F "Reserved",
}

impl Default for SenseKey {
	#[inline]
	fn default() -> Self { Self::NoSense }
}

impl fmt::Display for SenseKey {
	#[inline]
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		<str as fmt::Display>::fmt(self.as_str(), f)
	}
}



#[derive(Debug, Clone, Copy, Default, Eq, Hash, PartialEq)]
/// # Error Code.
///
/// A structured view of a failed command's sense data.
///
/// If the command failed without returning any sense data (e.g. a host or
/// driver-level failure), `raw_code` will be zero and `sense_key` will be
/// [`SenseKey::NoSense`].
pub struct ErrorCode {
	raw_code: u8,
	sense_key: SenseKey,
	asc: u8,
	ascq: u8,
}

impl fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} ({:X}/{:02X}/{:02X})",
			self.sense_key,
			self.sense_key as u8,
			self.asc,
			self.ascq,
		)
	}
}

impl ErrorCode {
	#[must_use]
	/// # New.
	pub const fn new(raw_code: u8, sense_key: SenseKey, asc: u8, ascq: u8) -> Self {
		Self { raw_code, sense_key, asc, ascq }
	}

	#[must_use]
	/// # From Sense Buffer.
	///
	/// Decode fixed-format (`0x70`/`0x71`) or descriptor-format
	/// (`0x72`/`0x73`) sense data. Anything shorter or stranger yields a
	/// mostly-empty code with just the response byte.
	pub fn from_sense(sense: &[u8]) -> Self {
		let Some(raw) = sense.first().map(|b| b & 0x7F) else {
			return Self::default();
		};

		match raw {
			0x70 | 0x71 if 14 <= sense.len() => Self::new(
				raw,
				SenseKey::from(sense[2]),
				sense[12],
				sense[13],
			),
			0x70 | 0x71 if 3 <= sense.len() => Self::new(raw, SenseKey::from(sense[2]), 0, 0),
			0x72 | 0x73 if 4 <= sense.len() => Self::new(
				raw,
				SenseKey::from(sense[1]),
				sense[2],
				sense[3],
			),
			_ => Self::new(raw, SenseKey::NoSense, 0, 0),
		}
	}

	#[must_use]
	/// # Raw Response Code.
	pub const fn raw_code(&self) -> u8 { self.raw_code }

	#[must_use]
	/// # Sense Key.
	pub const fn sense_key(&self) -> SenseKey { self.sense_key }

	#[must_use]
	/// # Additional Sense Code.
	pub const fn additional_sense_code(&self) -> u8 { self.asc }

	#[must_use]
	/// # Additional Sense Code Qualifier.
	pub const fn additional_sense_code_qualifier(&self) -> u8 { self.ascq }

	#[must_use]
	/// # Recovered?
	///
	/// The command succeeded after the drive applied its own error recovery.
	pub const fn is_recovered(&self) -> bool {
		matches!(self.sense_key, SenseKey::RecoveredError)
	}

	#[must_use]
	/// # Hardware Error?
	pub const fn is_hardware(&self) -> bool {
		matches!(self.sense_key, SenseKey::HardwareError)
	}
}



/// # Command Transport.
///
/// Execute a single command, filling `buf` with whatever the device
/// returns. On success, the number of bytes actually transferred is
/// returned.
///
/// Implementations must not panic; every failure is reported as an
/// [`ErrorCode`]. A failed command may still have written partial data to
/// `buf`.
pub trait Transport: Send {
	/// # Execute.
	///
	/// ## Errors
	///
	/// Returns the decoded sense data if the host, driver, or device
	/// reported a failure.
	fn execute(&mut self, cdb: &Cdb, buf: &mut [u8]) -> Result<usize, ErrorCode>;
}

/// # Device Opener.
///
/// This is how a [`Drive`](crate::Drive) gets a fresh [`Transport`] at the
/// start of each task.
pub trait DeviceOpen: Send + Sync + fmt::Debug {
	/// # Open.
	///
	/// ## Errors
	///
	/// Returns an error if the device cannot be opened.
	fn open(&self) -> Result<Box<dyn Transport>, CdRipError>;
}



/// # Send.
///
/// Issue a command expecting up to `len` bytes back, returning exactly what
/// the device transferred.
///
/// ## Errors
///
/// Returns the decoded sense data on failure.
pub fn send(dev: &mut dyn Transport, cdb: &Cdb, len: usize) -> Result<Vec<u8>, ErrorCode> {
	let mut buf = vec![0_u8; len];
	let read = dev.execute(cdb, &mut buf)?;
	buf.truncate(read.min(len));
	Ok(buf)
}

/// # Send (Two-Phase Length Negotiation).
///
/// Variable-length replies begin with a big-endian 16-bit length covering
/// everything after itself. This first asks for just the header to learn
/// the size, then re-issues the command for the whole thing.
///
/// `record` is the fixed size of each entry following the four-byte header.
/// Some firmwares declare a length that doesn't add up to a whole number of
/// records; in that case the drive is not trusted and [`MAX_ALLOC`] is
/// requested instead, keeping only what was actually transferred.
///
/// ## Errors
///
/// Returns the decoded sense data if either phase fails.
pub fn send_negotiated<F>(dev: &mut dyn Transport, build: F, record: usize)
-> Result<Vec<u8>, ErrorCode>
where F: Fn(u16) -> Cdb {
	let head = send(dev, &build(4), 4)?;
	let declared = declared_len(&head);

	let (alloc, trusted) = match declared {
		Some(len) if is_consistent(len, record) => match u16::try_from(len) {
			Ok(v) => (v, true),
			Err(_) => (MAX_ALLOC, false),
		},
		_ => (MAX_ALLOC, false),
	};

	let mut out = send(dev, &build(alloc), usize::from(alloc))?;
	if trusted {
		if let Some(len) = declared { out.truncate(len); }
	}
	Ok(out)
}

/// # Declared Length.
///
/// Return the total reply size implied by the leading length field.
pub(crate) fn declared_len(head: &[u8]) -> Option<usize> {
	let [a, b, ..] = head else { return None; };
	Some(usize::from(u16::from_be_bytes([*a, *b])) + 2)
}

/// # Consistent Length?
///
/// The total must cover the four-byte header and a whole number of records.
const fn is_consistent(total: usize, record: usize) -> bool {
	4 <= total && (record <= 1 || 0 == (total - 4) % record)
}
