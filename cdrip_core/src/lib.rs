/*!
# CD Rip: Library

This crate talks to optical drives directly over SCSI/MMC pass-through to
read the table of contents, CD-Text, and MCN/ISRC codes, extract audio with
sample-offset correction, and verify the results against AccurateRip.
*/

#![deny(unsafe_code)]

#![warn(
	clippy::filetype_is_file,
	clippy::integer_division,
	clippy::needless_borrow,
	clippy::nursery,
	clippy::pedantic,
	clippy::perf,
	clippy::suboptimal_flops,
	clippy::unneeded_field_pattern,
	macro_use_extern_crate,
	missing_copy_implementations,
	missing_debug_implementations,
	missing_docs,
	non_ascii_idents,
	trivial_casts,
	trivial_numeric_casts,
	unreachable_pub,
	unused_crate_dependencies,
	unused_extern_crates,
	unused_import_braces,
)]

#![allow(
	clippy::doc_markdown,
	clippy::module_name_repetitions,
	clippy::redundant_pub_crate,
)]

mod abort;
mod accuraterip;
mod cache;
mod cdtext;
mod chk;
mod drive;
mod encode;
mod error;
mod log;
mod metadata;
mod offset;
mod rip;
pub mod scsi;
mod subchannel;
mod task;
mod toc;

pub use abort::KillSwitch;
pub use accuraterip::{
	AccurateRip,
	AccurateRipId,
	ArMatch,
	ArRecord,
	ArTrack,
};
pub use cache::{
	Cache,
	CacheWriter,
};
pub use cdtext::{
	CdText,
	CDTextGenre,
	CDTextKind,
};
pub use chk::{
	ArChecksum,
	crc32,
};
pub use drive::{
	Capabilities,
	CdInfo,
	Drive,
	DriveInfo,
	DriveRegistry,
};
pub use encode::{
	CommandJob,
	EncodeEvent,
	EncodeJob,
	EncodeQueue,
};
pub use error::CdRipError;
pub use log::{
	Log,
	LogEntry,
	LogLevel,
	LogListener,
};
pub use metadata::{
	DiscMetadata,
	MetaField,
	TrackMetadata,
};
pub use offset::ReadOffset;
pub use rip::{
	Defect,
	DefectKind,
	opts::{
		RipOptions,
		RipOptionsTracks,
	},
	Ripper,
	RipPhase,
	RipProgress,
	RipReport,
	sink::{
		MemorySink,
		PcmSink,
		WavSink,
	},
};
pub use subchannel::{
	Isrc,
	Mcn,
	read_isrc,
	read_mcn,
};
pub use task::{
	run_blocking,
	Task,
	TaskEvent,
	TaskHandle,
	TaskKind,
	TaskOutcome,
};
pub use toc::{
	DataMode,
	DiscSignature,
	frames_to_msf,
	frames_to_msf_string,
	msf_to_frames,
	Toc,
	Track,
	TrackFormat,
};



/// # Static Hasher.
pub(crate) const AHASHER: ahash::RandomState = ahash::RandomState::with_seeds(13, 19, 23, 71);

/// # Cache Base.
///
/// The default cache root is thus `CWD/CACHE_BASE`.
pub const CACHE_BASE: &str = "_cdrip";

/// # Bytes Per Sample.
pub const BYTES_PER_SAMPLE: u16 = 4;

/// # Bytes Per Sector.
///
/// This is the number of bytes per sector of _audio_ data. Block sizes may
/// contain additional information.
pub const BYTES_PER_SECTOR: u16 = SAMPLES_PER_SECTOR * BYTES_PER_SAMPLE;

/// # Samples per sector.
pub const SAMPLES_PER_SECTOR: u16 = 588;

/// # Size of C2 block.
///
/// One bit per byte of audio data.
pub const CD_C2_SIZE: u16 = 294;

/// # Size of formatted Q subchannel block.
pub const CD_Q_SIZE: u16 = 16;

/// # Size of data block.
///
/// Data as in "audio data".
pub const CD_DATA_SIZE: u16 = BYTES_PER_SECTOR;

/// # Number of lead-in sectors.
///
/// All discs have a 2-second region at the start before any data. Different
/// contexts include or exclude this amount, so it's good to keep it handy.
pub const CD_LEADIN: u16 = 150;

/// # Frames (Sectors) Per Second.
pub const FRAMES_PER_SECOND: u32 = 75;

/// # Lead-out Label.
///
/// This is used solely for the table of contents printout; e.g. 01 02 03 AA.
pub const CD_LEADOUT_LABEL: &str = "AA";

/// # Wave Spec.
pub(crate) const WAVE_SPEC: hound::WavSpec = hound::WavSpec {
	channels: 2,
	sample_rate: 44100,
	bits_per_sample: 16,
	sample_format: hound::SampleFormat::Int,
};
