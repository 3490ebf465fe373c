/*!
# CD Rip: Errors
*/

use crate::scsi::ErrorCode;
use fyi_msg::Msg;
use std::{
	error::Error,
	fmt,
};



#[cfg(feature = "bin")]
/// # Help Text.
const HELP: &str = concat!(r#"
   .-"""-.
  / .===. \     CD Rip v"#, env!("CARGO_PKG_VERSION"), r#"
  \/ 6 6 \/     Audio CD extraction over SCSI/MMC,
  ( \___/ )     verified with AccurateRip.
___ooo_ooo___

USAGE:
    cdrip [OPTIONS]

BASIC SETTINGS:
    -t, --tracks <NUM(s),RNG>
                      Rip one or more specific tracks (rather than the whole
                      disc). Multiple tracks can be separated by commas (2,3),
                      specified as an inclusive range (2-3), and/or given their
                      own -t/--track (-t 2 -t 3). Track 0 can be used to rip
                      the HTOA, if any. [default: the whole disc]
    -e, --encoder <CMD>
                      Run an external command on each finished track, like
                      "flac -s -o %o.flac %i". %i is replaced with the WAV path
                      and %o with the same path minus its extension. Tracks are
                      encoded one at a time, in order, while ripping goes on.

DRIVE SETTINGS:
    -d, --dev <PATH>  The device path for the optical drive containing the CD
                      of interest, like /dev/sr0. [default: auto]
    -o, --offset <SAMPLES>
                      The AccurateRip sample read offset to apply to data
                      retrieved from the drive. [default: 0; range: ±5880]

ERROR HANDLING:
        --retries <NUM>
                      Re-read a failed sector up to <NUM> times before giving
                      up on it. [default: 5; max: 255]
        --skip-errors Keep going when a sector still cannot be read after all
                      retries, using whatever the drive returned, or silence.
        --skip-hardware-errors
                      Keep going when the drive reports a hardware error.
                      Expect an audible defect.
        --no-c2       Do not request C2 error pointers.
        --sync        Confirm sector positioning with Q subchannel data and
                      flag mismatches as possible defects.

UNUSUAL SETTINGS:
        --overread    Read into the lead-in/lead-out when the read offset
                      requires it, rather than filling the gap with silence.
                      Most drives cannot do this.
        --window <NUM>
                      The number of sectors buffered between writes.
                      [default: 32; range: 2..=1024]

MISCELLANEOUS:
    -h, --help        Print help information to STDOUT and exit.
    -V, --version     Print version information to STDOUT and exit.
        --no-rip      Print the basic drive and disc information to STDERR and
                      exit (without ripping anything).
        --no-verify   Skip the AccurateRip lookup after ripping.

EARLY EXIT:
    Press CTRL+C to stop early. The track in progress is discarded; finished
    tracks are kept.
"#);



#[derive(Debug, Clone, Eq, PartialEq)]
/// # Errors.
pub enum CdRipError {
	/// # AccurateRip: Network Failure.
	ArFetch,

	/// # AccurateRip: Disc Not Found.
	ArNotFound,

	/// # AccurateRip: Malformed Reply.
	ArParse,

	/// # Bug!
	Bug(&'static str),

	/// # Drive Busy.
	Busy(String),

	/// # Cache directory.
	Cache,

	/// # CD-Text: Malformed Reply.
	CdText,

	/// # CD-Text: Double-Byte Characters.
	CdTextDbcs,

	/// # Unable to open device.
	DeviceOpen(String),

	/// # Encoder Failure.
	Encode(String),

	/// # User Abort.
	Killed,

	/// # No Drive.
	NoDrive,

	/// # No Data Returned.
	NoData,

	/// # Noop.
	Noop,

	/// # No TOC.
	NoToc,

	/// # No Track.
	NoTrack(u8),

	/// # Read Offset.
	ReadOffset,

	/// # SCSI Command Failure.
	Scsi(ErrorCode),

	/// # Subchannel: Malformed Reply.
	Subchannel,

	/// # TOC: Malformed Reply.
	Toc,

	/// # Writing to disk.
	Write(String),

	#[cfg(feature = "bin")]
	/// # Invalid CLI arg.
	CliArg(String),

	#[cfg(feature = "bin")]
	/// # CLI Parsing failure.
	CliParse(&'static str),

	#[cfg(feature = "bin")]
	/// # Print Help (Not an Error).
	PrintHelp,

	#[cfg(feature = "bin")]
	/// # Print Version (Not an Error).
	PrintVersion,
}

impl Error for CdRipError {}

impl From<ErrorCode> for CdRipError {
	#[inline]
	fn from(err: ErrorCode) -> Self { Self::Scsi(err) }
}

impl From<CdRipError> for Msg {
	#[inline]
	fn from(src: CdRipError) -> Self { Self::error(src.to_string()) }
}

impl fmt::Display for CdRipError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::ArFetch => f.write_str("Unable to download the AccurateRip checksums."),
			Self::ArNotFound => f.write_str("The disc is not in the AccurateRip database."),
			Self::ArParse => f.write_str("Unable to parse the AccurateRip checksums."),
			Self::Bug(s) => write!(f, "Bug: {s}."),
			Self::Busy(s) => write!(f, "The drive {s} is busy with another task."),
			Self::Cache => f.write_str("Unable to establish a cache directory."),
			Self::CdText => f.write_str("Malformed CD-Text."),
			Self::CdTextDbcs => f.write_str("Double-byte CD-Text is not supported."),
			Self::DeviceOpen(s) => write!(f, "Unable to open connection with {s}."),
			Self::Encode(s) => write!(f, "Encoding failed: {s}"),
			Self::Killed => f.write_str("User abort."),
			Self::NoDrive => f.write_str("No optical drive was found."),
			Self::NoData => f.write_str("The drive returned no data."),
			Self::Noop => f.write_str("There's nothing to do!"),
			Self::NoToc => f.write_str("Unable to read the table of contents."),
			Self::NoTrack(n) =>
				if *n == 0 { f.write_str("There is no HTOA on this disc.") }
				else { write!(f, "There is no audio track #{n} on this disc.") },
			Self::ReadOffset => f.write_str("Invalid read offset."),
			Self::Scsi(e) => write!(f, "Drive error: {e}."),
			Self::Subchannel => f.write_str("Malformed subchannel reply."),
			Self::Toc => f.write_str("Malformed table of contents."),
			Self::Write(s) => write!(f, "Unable to write to {s}."),

			#[cfg(feature = "bin")]
			Self::CliArg(s) => write!(f, "Invalid CLI option: {s}"),

			#[cfg(feature = "bin")]
			Self::CliParse(s) => write!(f, "Unable to parse {s}."),

			#[cfg(feature = "bin")]
			Self::PrintHelp => f.write_str(HELP),

			#[cfg(feature = "bin")]
			Self::PrintVersion => f.write_str(concat!("CD Rip v", env!("CARGO_PKG_VERSION"))),
		}
	}
}
