/*!
# CD Rip: Read Offset
*/

use crate::{
	CdRipError,
	SAMPLES_PER_SECTOR,
};
use dactyl::traits::BytesToSigned;
use std::fmt;



/// # Min Offset.
const MIN_OFFSET: i16 = -5880;

/// # Max Offset.
const MAX_OFFSET: i16 = 5880;



#[derive(Debug, Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
/// # Read Offset.
///
/// This holds a drive read offset in samples, but can return values in
/// various other useful formats.
///
/// For historical reasons, values are restricted to `-5880..=5880`.
pub struct ReadOffset(i16);

impl fmt::Display for ReadOffset {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if 0 < self.0 { write!(f, "+{}", self.0) }
		else { write!(f, "{}", self.0) }
	}
}

impl TryFrom<i16> for ReadOffset {
	type Error = CdRipError;
	fn try_from(src: i16) -> Result<Self, Self::Error> {
		if (MIN_OFFSET..=MAX_OFFSET).contains(&src) { Ok(Self(src)) }
		else { Err(CdRipError::ReadOffset) }
	}
}

impl TryFrom<i32> for ReadOffset {
	type Error = CdRipError;
	fn try_from(src: i32) -> Result<Self, Self::Error> {
		i16::try_from(src)
			.map_err(|_| CdRipError::ReadOffset)
			.and_then(Self::try_from)
	}
}

impl TryFrom<&[u8]> for ReadOffset {
	type Error = CdRipError;
	fn try_from(src: &[u8]) -> Result<Self, Self::Error> {
		// A leading plus is allowed, but not understood by the parser.
		let src = src.strip_prefix(b"+").unwrap_or(src);
		if src.is_empty() { Ok(Self(0)) }
		else {
			i16::btoi(src)
				.ok_or(CdRipError::ReadOffset)
				.and_then(Self::try_from)
		}
	}
}

impl TryFrom<&str> for ReadOffset {
	type Error = CdRipError;
	fn try_from(src: &str) -> Result<Self, Self::Error> {
		Self::try_from(src.trim().as_bytes())
	}
}

impl ReadOffset {
	#[must_use]
	/// # Is Negative?
	pub const fn is_negative(self) -> bool { self.0 < 0 }

	#[must_use]
	/// # Samples.
	pub const fn samples(self) -> i16 { self.0 }

	#[must_use]
	/// # Samples (Absolute).
	pub const fn samples_abs(self) -> u16 { self.0.abs_diff(0) }
}

impl ReadOffset {
	#[must_use]
	#[allow(clippy::integer_division)]
	/// # Sector Shift.
	///
	/// Return the `(left, right)` sector shifts to apply to the requested
	/// range so that every sample the offset pulls in is actually read.
	///
	/// The range to read for a span of `first..=last` is thus
	/// `first + left..=last + right`.
	///
	/// * Zero: `(0, 0)`
	/// * Positive: `(o / 588, o / 588 + 1)`
	/// * Negative: `(-(|o| / 588) - 1, -(|o| / 588))`
	pub const fn sector_shift(self) -> (i32, i32) {
		let whole = (self.samples_abs() / SAMPLES_PER_SECTOR) as i32;
		if self.0 == 0 { (0, 0) }
		else if self.is_negative() { (-whole - 1, -whole) }
		else { (whole, whole + 1) }
	}

	#[must_use]
	#[allow(clippy::cast_sign_loss)]
	/// # Skip Samples.
	///
	/// Return the number of samples to throw away from the start of the
	/// shifted read before the requested range begins. This is in `0..588`
	/// except for negative whole-sector offsets, which skip exactly `588`.
	pub const fn skip_samples(self) -> u16 {
		let (left, _) = self.sector_shift();
		(self.0 as i32 - left * SAMPLES_PER_SECTOR as i32) as u16
	}
}
