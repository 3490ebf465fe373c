/*!
# CD Rip: CLI
*/

use argyle::Argument;
use cdrip_core::{
	CdRipError,
	ReadOffset,
	RipOptions,
	Toc,
};
use dactyl::traits::BytesToUnsigned;



#[derive(Debug, Default)]
/// # Parsed Settings.
pub(super) struct Settings {
	/// # Rip Options.
	///
	/// The tracks and offset are filled in later, once the disc is known.
	pub(super) opts: RipOptions,

	/// # Device Path.
	pub(super) dev: Option<String>,

	/// # Encoder Command.
	pub(super) encoder: Option<String>,

	/// # Read Offset.
	pub(super) offset: Option<ReadOffset>,

	/// # Raw Track List.
	pub(super) tracks: String,

	/// # Print Disc Info Only.
	pub(super) no_rip: bool,

	/// # Skip AccurateRip.
	pub(super) no_verify: bool,
}



/// # Parse Options.
pub(super) fn parse() -> Result<Settings, CdRipError> {
	let args = argyle::args()
		.with_keywords(include!(concat!(env!("OUT_DIR"), "/argyle.rs")));

	let mut out = Settings::default();
	for arg in args {
		match arg {
			Argument::Key("-h" | "--help") => return Err(CdRipError::PrintHelp),
			Argument::Key("--no-c2") => { out.opts = out.opts.with_c2(false); },
			Argument::Key("--no-rip") => { out.no_rip = true; },
			Argument::Key("--no-verify") => { out.no_verify = true; },
			Argument::Key("--overread") => { out.opts = out.opts.with_overread(true); },
			Argument::Key("--skip-errors") => {
				out.opts = out.opts.with_skip_read_errors(true);
			},
			Argument::Key("--skip-hardware-errors") => {
				out.opts = out.opts.with_skip_hardware_errors(true);
			},
			Argument::Key("--sync") => { out.opts = out.opts.with_sync(true); },
			Argument::Key("-V" | "--version") => return Err(CdRipError::PrintVersion),

			Argument::KeyWithValue("-d" | "--dev", s) => { out.dev.replace(s); },
			Argument::KeyWithValue("-e" | "--encoder", s) => {
				let s = s.trim();
				if s.is_empty() { return Err(CdRipError::CliParse("-e/--encoder")); }
				out.encoder.replace(s.to_owned());
			},
			Argument::KeyWithValue("-o" | "--offset", s) => {
				let s = ReadOffset::try_from(s.trim().as_bytes())
					.map_err(|_| CdRipError::CliParse("-o/--offset"))?;
				out.offset.replace(s);
			},
			Argument::KeyWithValue("--retries", s) => {
				let s = u8::btou(s.trim().as_bytes())
					.ok_or(CdRipError::CliParse("--retries"))?;
				out.opts = out.opts.with_retries(s);
			},
			Argument::KeyWithValue("-t" | "--track" | "--tracks", s) => {
				if ! out.tracks.is_empty() { out.tracks.push(','); }
				out.tracks.push_str(&s);
			},
			Argument::KeyWithValue("--window", s) => {
				let s = u16::btou(s.trim().as_bytes())
					.ok_or(CdRipError::CliParse("--window"))?;
				out.opts = out.opts.with_window(s);
			},

			Argument::Other(s) => return Err(CdRipError::CliArg(s)),
			_ => {},
		}
	}

	Ok(out)
}

/// # Parse Rip Tracks.
///
/// Add the requested tracks to the options, or every track on the disc (HTOA
/// included) if none were requested.
pub(super) fn parse_tracks(toc: &Toc, mut opts: RipOptions, tracks: &str)
-> Result<RipOptions, CdRipError> {
	for v in tracks.split(',') {
		let v = v.trim();
		if v.is_empty() { continue; }

		// It might be a range.
		if let Some((a, b)) = v.split_once('-') {
			let a = u8::btou(a.trim().as_bytes()).ok_or(CdRipError::CliParse("-t/--tracks"))?;
			let b = u8::btou(b.trim().as_bytes()).ok_or(CdRipError::CliParse("-t/--tracks"))?;
			if b < a { return Err(CdRipError::CliParse("-t/--tracks")); }
			for idx in a..=b { opts = opts.with_track(idx); }
		}
		// Otherwise it should be a single index.
		else {
			let v = u8::btou(v.as_bytes()).ok_or(CdRipError::CliParse("-t/--tracks"))?;
			opts = opts.with_track(v);
		}
	}

	// Make sure the desired tracks are actually on the disc.
	if opts.has_tracks() {
		for idx in opts.tracks() {
			let good =
				if idx == 0 { toc.htoa().is_some() }
				else { toc.audio_track(idx).is_some() };
			if ! good { return Err(CdRipError::NoTrack(idx)); }
		}
	}
	// If no tracks were specified, DO IT ALL.
	else {
		if toc.htoa().is_some() { opts = opts.with_track(0); }
		for t in toc.audio_tracks() { opts = opts.with_track(t.number()); }
	}

	Ok(opts)
}
