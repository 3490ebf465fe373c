/*!
# CD Rip: MCN/ISRC
*/

use crate::{
	CdRipError,
	KillSwitch,
	scsi::{
		Cdb,
		send,
		Transport,
	},
};
use std::fmt;



/// # Reply Size.
const REPLY_SIZE: usize = 24;

/// # MCN Position.
const MCN_RANGE: std::ops::Range<usize> = 9..22;

/// # ISRC Position.
const ISRC_RANGE: std::ops::Range<usize> = 9..21;



#[derive(Debug, Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
/// # Media Catalog Number.
///
/// This is the disc's 13-digit UPC/EAN, as stored in the Q subchannel.
pub struct Mcn([u8; 13]);

impl AsRef<str> for Mcn {
	#[inline]
	fn as_ref(&self) -> &str { self.as_str() }
}

impl fmt::Display for Mcn {
	#[inline]
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl TryFrom<&[u8]> for Mcn {
	type Error = CdRipError;
	fn try_from(src: &[u8]) -> Result<Self, Self::Error> {
		let src: [u8; 13] = src.try_into().map_err(|_| CdRipError::Subchannel)?;
		if ! src.iter().all(u8::is_ascii_digit) { return Err(CdRipError::Subchannel); }
		Ok(Self(src))
	}
}

impl TryFrom<&str> for Mcn {
	type Error = CdRipError;

	#[inline]
	fn try_from(src: &str) -> Result<Self, Self::Error> {
		Self::try_from(src.trim().as_bytes())
	}
}

impl Mcn {
	#[must_use]
	/// # As Str.
	pub fn as_str(&self) -> &str {
		// All bytes are ASCII digits, so this will never fail.
		std::str::from_utf8(self.0.as_slice()).unwrap_or_default()
	}

	#[must_use]
	/// # Is Valid EAN-13?
	///
	/// Most, but not all, discs use a properly check-summed barcode.
	pub fn is_ean13(&self) -> bool {
		let mut total = 0_u32;
		for (k, num) in self.0[..12].iter().enumerate() {
			let num = u32::from(num ^ b'0');
			total += if k % 2 == 0 { num } else { num * 3 };
		}
		(10 - total % 10) % 10 == u32::from(self.0[12] ^ b'0')
	}

	#[must_use]
	/// # Barcode.
	///
	/// Format the number like a printed barcode: UPC-A style if the leading
	/// digit is zero, EAN-13 otherwise.
	pub fn barcode(&self) -> String {
		let s = self.as_str();
		if self.0[0] == b'0' {
			format!("{}-{}-{}-{}", &s[1..2], &s[2..7], &s[7..12], &s[12..])
		}
		else {
			format!("{}-{}-{}", &s[..1], &s[1..7], &s[7..])
		}
	}
}



#[derive(Debug, Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
/// # International Standard Recording Code.
pub struct Isrc([u8; 12]);

impl fmt::Display for Isrc {
	/// # Display.
	///
	/// This uses the hyphenated `CC-XXX-YY-NNNNN` form.
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = self.as_str();
		write!(f, "{}-{}-{}-{}", &s[..2], &s[2..5], &s[5..7], &s[7..])
	}
}

impl TryFrom<&[u8]> for Isrc {
	type Error = CdRipError;
	fn try_from(src: &[u8]) -> Result<Self, Self::Error> {
		let mut src: [u8; 12] = src.try_into().map_err(|_| CdRipError::Subchannel)?;
		src.make_ascii_uppercase();

		// Country and registrant are alphanumeric; the rest are digits.
		if
			src[..5].iter().all(u8::is_ascii_alphanumeric) &&
			src[5..].iter().all(u8::is_ascii_digit)
		{
			Ok(Self(src))
		}
		else { Err(CdRipError::Subchannel) }
	}
}

impl TryFrom<&str> for Isrc {
	type Error = CdRipError;
	fn try_from(src: &str) -> Result<Self, Self::Error> {
		let src: Vec<u8> = src.bytes().filter(|b| *b != b'-').collect();
		Self::try_from(src.as_slice())
	}
}

impl Isrc {
	#[must_use]
	/// # As Str (Compact).
	pub fn as_str(&self) -> &str {
		// All bytes are ASCII alphanumerics, so this will never fail.
		std::str::from_utf8(self.0.as_slice()).unwrap_or_default()
	}
}



/// # Read MCN.
///
/// Query the disc's Media Catalog Number. Discs without one return a
/// zeroed reply, which is treated as `None`.
///
/// ## Errors
///
/// Returns an error if the command fails, the reply is the wrong size or
/// garbled, or the operation is cancelled.
pub fn read_mcn(dev: &mut dyn Transport, killed: &KillSwitch)
-> Result<Option<Mcn>, CdRipError> {
	if killed.killed() { return Err(CdRipError::Killed); }
	let raw = send(dev, &Cdb::read_mcn(), REPLY_SIZE)?;
	parse_reply(&raw, MCN_RANGE).map(|v| v.map(Mcn::try_from).transpose())?
}

/// # Read ISRC.
///
/// Query the ISRC for a single track. Tracks without one return a zeroed
/// reply, which is treated as `None`.
///
/// ## Errors
///
/// Returns an error if the command fails, the reply is the wrong size or
/// garbled, or the operation is cancelled.
pub fn read_isrc(dev: &mut dyn Transport, track: u8, killed: &KillSwitch)
-> Result<Option<Isrc>, CdRipError> {
	if killed.killed() { return Err(CdRipError::Killed); }
	let raw = send(dev, &Cdb::read_isrc(track), REPLY_SIZE)?;
	parse_reply(&raw, ISRC_RANGE).map(|v| v.map(Isrc::try_from).transpose())?
}

/// # Parse Reply.
///
/// Return the code slice, or `None` if it is blank.
fn parse_reply(raw: &[u8], rng: std::ops::Range<usize>)
-> Result<Option<&[u8]>, CdRipError> {
	if raw.len() != REPLY_SIZE { return Err(CdRipError::Subchannel); }
	let code = &raw[rng];
	if code.iter().all(|b| matches!(b, 0 | b'0')) { Ok(None) }
	else { Ok(Some(code)) }
}
