/*!
# CD Rip: Ripping Options
*/

use crate::ReadOffset;



/// # FLAG: C2 Error Pointers.
const FLAG_C2: u8 =              0b0000_0001;

/// # FLAG: Over-Read Lead-In/Out.
const FLAG_OVERREAD: u8 =        0b0000_0010;

/// # FLAG: Skip Hardware Errors.
const FLAG_SKIP_HARDWARE: u8 =   0b0000_0100;

/// # FLAG: Skip Read Errors.
const FLAG_SKIP_READ: u8 =       0b0000_1000;

/// # FLAG: Subchannel Sync.
const FLAG_SYNC: u8 =            0b0001_0000;

/// # FLAG: Default.
const FLAG_DEFAULT: u8 = FLAG_C2;

/// # Default Retries.
const RETRIES_DEFAULT: u8 = 5;

/// # Minimum Window.
const WINDOW_MIN: u16 = 2;

/// # Maximum Window.
const WINDOW_MAX: u16 = 1024;

/// # Default Window.
const WINDOW_DEFAULT: u16 = 32;



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Rip Options.
///
/// This struct holds the rip-related options like read offset, track numbers,
/// error handling, etc.
///
/// Options are set using builder-style methods, like:
///
/// ```
/// use cdrip_core::RipOptions;
///
/// let opts = RipOptions::default()
///     .with_retries(3)
///     .with_track(3) // Order doesn't matter.
///     .with_track(2)
///     .with_track(15);
///
/// assert_eq!(opts.retries(), 3);
/// assert_eq!(opts.tracks().collect::<Vec<u8>>(), &[2, 3, 15]);
/// ```
///
/// If no tracks are set, the whole disc is ripped as a single stream.
pub struct RipOptions {
	offset: ReadOffset,
	retries: u8,
	window: u16,
	flags: u8,
	tracks: u128,
}

impl Default for RipOptions {
	fn default() -> Self {
		Self {
			offset: ReadOffset::default(),
			retries: RETRIES_DEFAULT,
			window: WINDOW_DEFAULT,
			flags: FLAG_DEFAULT,
			tracks: 0,
		}
	}
}

macro_rules! with_flag {
	($fn:ident, $flag:ident, $($doc:literal),+ $(,)?) => (
		#[must_use]
		$(
			#[doc = $doc]
		)+
		pub const fn $fn(self, v: bool) -> Self {
			let flags =
				if v { self.flags | $flag }
				else { self.flags & ! $flag };

			Self {
				flags,
				..self
			}
		}
	)
}

/// ## Setters.
impl RipOptions {
	with_flag!(
		with_c2,
		FLAG_C2,
		"# C2 Error Pointers.",
		"",
		"When `true`, C2 error pointers are requested alongside each sector",
		"and any set bits are flagged as possible defects.",
		"",
		"The default is `true`.",
	);

	#[must_use]
	/// # Read Offset.
	///
	/// Optical drives have weirdly arbitrary precision problems, causing them
	/// to read data a little earlier or later than another drive might.
	///
	/// To normalize the data obtained across different drives, it is critical
	/// to set the appropriate sample offset. See [here](http://www.accuraterip.com/driveoffsets.htm) if you're not sure
	/// what your drive's offset is.
	pub const fn with_offset(self, offset: ReadOffset) -> Self {
		Self {
			offset,
			..self
		}
	}

	with_flag!(
		with_overread,
		FLAG_OVERREAD,
		"# Over-Read.",
		"",
		"When `true`, sectors in the lead-in or lead-out needed by the read",
		"offset are requested from the drive. When `false`, they are filled",
		"with silence instead.",
		"",
		"Most drives cannot over-read. The default is `false`.",
	);

	#[must_use]
	/// # Retries.
	///
	/// The number of times a sector will be re-read after a medium error (or
	/// an empty reply) before it is skipped or the rip is aborted.
	///
	/// The default is `5`.
	pub const fn with_retries(self, retries: u8) -> Self {
		Self {
			retries,
			..self
		}
	}

	with_flag!(
		with_skip_hardware_errors,
		FLAG_SKIP_HARDWARE,
		"# Skip Hardware Errors.",
		"",
		"When `true`, a hardware error is logged and flagged as a defect",
		"rather than aborting the rip.",
		"",
		"The default is `false`.",
	);

	with_flag!(
		with_skip_read_errors,
		FLAG_SKIP_READ,
		"# Skip Read Errors.",
		"",
		"When `true`, a sector that still cannot be read after all retries is",
		"kept as-is (or replaced with silence if nothing came back) and",
		"flagged as a defect. When `false`, the rip is aborted.",
		"",
		"The default is `false`.",
	);

	with_flag!(
		with_sync,
		FLAG_SYNC,
		"# Subchannel Sync.",
		"",
		"When `true`, Q subchannel data is requested alongside each sector and",
		"its absolute position compared against the requested one.",
		"Mismatches are flagged as possible defects.",
		"",
		"The default is `false`.",
	);

	#[must_use]
	/// # Include Track.
	///
	/// Add a given track number to the to-rip list. Use `0` for the HTOA.
	pub const fn with_track(self, track: u8) -> Self {
		let tracks = self.tracks | track_idx_to_bits(track);
		Self {
			tracks,
			..self
		}
	}

	#[must_use]
	/// # Sector Window.
	///
	/// The number of sectors buffered between writes. Values are capped to
	/// `2..=1024`, with a default of `32`.
	pub const fn with_window(self, mut window: u16) -> Self {
		if window < WINDOW_MIN { window = WINDOW_MIN; }
		else if WINDOW_MAX < window { window = WINDOW_MAX; }
		Self {
			window,
			..self
		}
	}
}



macro_rules! get_flag {
	($fn:ident, $flag:ident, $title:literal) => (
		#[must_use]
		#[doc = concat!("# ", $title, "?")]
		pub const fn $fn(&self) -> bool { $flag == self.flags & $flag }
	);
}

/// # Getters.
impl RipOptions {
	get_flag!(c2, FLAG_C2, "C2 Error Pointers");
	get_flag!(overread, FLAG_OVERREAD, "Over-Read");
	get_flag!(skip_hardware_errors, FLAG_SKIP_HARDWARE, "Skip Hardware Errors");
	get_flag!(skip_read_errors, FLAG_SKIP_READ, "Skip Read Errors");
	get_flag!(sync, FLAG_SYNC, "Subchannel Sync");

	#[must_use]
	/// # Has Any Tracks?
	///
	/// If not, the whole disc will be ripped as a single stream.
	pub const fn has_tracks(&self) -> bool { self.tracks != 0 }

	#[must_use]
	/// # Read Offset.
	pub const fn offset(&self) -> ReadOffset { self.offset }

	#[must_use]
	/// # Retries.
	pub const fn retries(&self) -> u8 { self.retries }

	#[must_use]
	/// # Tracks.
	///
	/// Return an iterator over the included track indices.
	pub const fn tracks(&self) -> RipOptionsTracks {
		RipOptionsTracks {
			set: self.tracks,
			pos: 0,
		}
	}

	#[must_use]
	/// # Sector Window.
	pub const fn window(&self) -> u16 { self.window }
}



#[derive(Debug, Clone)]
/// # Rip Option Tracks.
///
/// This iterator converts the `u128` monster flag back into individual `u8`
/// track indexes.
pub struct RipOptionsTracks {
	set: u128,
	pos: u8,
}

impl Iterator for RipOptionsTracks {
	type Item = u8;

	fn next(&mut self) -> Option<Self::Item> {
		while self.pos < 100 {
			let idx = self.pos;
			self.pos += 1;
			if 0 != self.set & track_idx_to_bits(idx) {
				return Some(idx);
			}
		}
		None
	}

	/// # Size Hint.
	///
	/// There will never be more than 99 tracks.
	fn size_hint(&self) -> (usize, Option<usize>) {
		(0, Some(100_usize.saturating_sub(usize::from(self.pos))))
	}
}



/// # Track Number to Bitflag.
///
/// Redbook audio CDs can only have a maximum of 99 tracks, or 100 if we count
/// the HTOA as #0, so we can represent all possible combinations using a
/// single `u128` bitflag.
///
/// Out of range values are silently treated as zero.
const fn track_idx_to_bits(idx: u8) -> u128 {
	if 99 < idx { 0 }
	else { 1_u128 << idx }
}
