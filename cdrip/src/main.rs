/*!
# CD Rip
*/

#![forbid(unsafe_code)]

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

#![allow(clippy::redundant_pub_crate)]



mod cli;

use cdrip_core::{
	AccurateRip,
	AccurateRipId,
	ArMatch,
	Cache,
	CdRipError,
	CommandJob,
	Drive,
	DriveRegistry,
	EncodeEvent,
	EncodeQueue,
	KillSwitch,
	Log,
	LogLevel,
	RipOptions,
	RipReport,
	run_blocking,
	Task,
	TaskEvent,
	Toc,
	WavSink,
};
use dactyl::NiceU32;
use fyi_msg::{
	Msg,
	Progless,
};
use oxford_join::JoinFmt;
use std::{
	borrow::Cow,
	collections::BTreeMap,
	fmt,
	path::PathBuf,
	process::ExitCode,
	sync::Arc,
};



/// # A Divider Line.
///
/// This is used to encase the drive vendor/model during summary. We'll slice
/// it to match the length rather than `"-".repeat()` or whatever.
const DIVIDER: &str = "------------------------------------------------";

/// # Maximum Log Lines.
///
/// Noisy discs can produce a lot of warnings; only this many are printed.
const MAX_LOG: usize = 20;



/// # Main.
///
/// This lets us bubble up startup errors so they can be pretty-printed.
fn main() -> ExitCode {
	match main__() {
		Ok(()) => ExitCode::SUCCESS,
		Err(e @ (CdRipError::PrintHelp | CdRipError::PrintVersion)) => {
			println!("{e}");
			ExitCode::SUCCESS
		},
		Err(e) => {
			Msg::from(e).eprint();
			ExitCode::FAILURE
		},
	}
}

#[inline]
/// # Actual Main.
///
/// This does all the stuff.
fn main__() -> Result<(), CdRipError> {
	let settings = cli::parse()?;

	// CTRL+C flips the killswitch; everything else checks it.
	let killed = KillSwitch::new();
	{
		let killed = killed.clone();
		ctrlc::set_handler(move || killed.kill())
			.map_err(|_| CdRipError::Bug("unable to set up the CTRL+C handler"))?;
	}

	// Find and identify the drive.
	let drive = find_drive(settings.dev.as_deref())?;
	let out = run_blocking(&drive, Task::DriveInfo, &killed);
	if let Some(e) = out.error() { return Err(e.clone()); }
	if let Some(offset) = settings.offset { drive.set_offset(offset); }

	// Read the disc.
	let out = run_blocking(&drive, Task::Toc, &killed);
	if let Some(e) = out.error() { return Err(e.clone()); }
	let toc = drive.toc().ok_or(CdRipError::NoToc)?;

	// CD-Text and MCN/ISRC are nice to have, but plenty of drives and discs
	// don't support them.
	for task in [Task::CdText, Task::McnIsrc] {
		if killed.killed() { return Err(CdRipError::Killed); }
		let _res = run_blocking(&drive, task, &killed);
	}

	disc_summary(&drive, &toc);
	if settings.no_rip { return Ok(()); }

	// Sort out the options.
	let offset = drive.info().map(|i| i.offset()).or(settings.offset).unwrap_or_default();
	let opts = cli::parse_tracks(&toc, settings.opts.with_offset(offset), &settings.tracks)?;

	rip(&drive, &toc, opts, &settings, &killed)
}

/// # Find Drive.
///
/// Use the one asked for, or the first one we can find.
fn find_drive(dev: Option<&str>) -> Result<Arc<Drive>, CdRipError> {
	let mut reg = DriveRegistry::default();
	if let Some(dev) = dev { return Ok(reg.attach(dev)); }

	reg.scan();
	reg.paths().into_iter()
		.next()
		.and_then(|p| reg.get(p))
		.ok_or(CdRipError::NoDrive)
}



/// # Disc Summary.
///
/// Print the drive, the table of contents, and whatever metadata we managed
/// to find.
fn disc_summary(drive: &Drive, toc: &Toc) {
	if let Some(info) = drive.info() {
		let vm = info.to_string();
		let div = &DIVIDER[..vm.len().min(DIVIDER.len())];
		eprintln!("\x1b[2;36m{div}\n\x1b[0;1;36m{vm}\n\x1b[0;2;36m{div}\x1b[0m");
		eprintln!("\x1b[2mCapabilities:\x1b[0m {}\n", info.capabilities());
	}

	let sig = toc.signature();
	let cd = drive.cd_info();
	let meta = &cd.metadata;
	let set = [
		("CDDB:", Some(Cow::Owned(format!("{:08x}", sig.cddb_id())))),
		("AccurateRip:", Some(Cow::Owned(AccurateRipId::from(&sig).to_string()))),
		("MusicBrainz:", sig.musicbrainz_id().map(Cow::Owned)),
		("Album:", meta.album().map(|v| Cow::Borrowed(v.as_str()))),
		("Artist:", meta.artist().map(|v| Cow::Borrowed(v.as_str()))),
		("Genre:", meta.genre().map(|v| Cow::Borrowed(v.as_str()))),
		("MCN:", meta.mcn().map(|v| Cow::Owned(v.to_string()))),
	];
	let max_label = set.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
	for (k, v) in set {
		if let Some(v) = v {
			eprintln!("\x1b[2m{k:max_label$}\x1b[0m \x1b[1m{v}\x1b[0m");
		}
	}

	eprintln!("\n{toc}\n");

	// Track titles and ISRCs, if any.
	let mut any = false;
	for t in meta.tracks() {
		let title = t.title().map_or("", String::as_str);
		let isrc = t.isrc().map_or_else(String::new, ToString::to_string);
		if title.is_empty() && isrc.is_empty() { continue; }
		any = true;
		eprintln!("\x1b[2m{:02}\x1b[0m  {isrc:15}  {title}", t.number());
	}
	if any { eprintln!(); }
}

/// # Rip Summary.
///
/// Print the settings that will be used.
fn rip_summary(opts: &RipOptions, dst: &str, encoder: Option<&str>) {
	let set = [
		("Tracks:", Cow::Owned(rip_summary_tracks(opts))),
		("Read Offset:", Cow::Owned(opts.offset().samples().to_string())),
		("Retries:", Cow::Owned(opts.retries().to_string())),
		("C2 Pointers:", Cow::Borrowed(if opts.c2() { "Yes" } else { "No" })),
		("Subchannel Sync:", Cow::Borrowed(if opts.sync() { "Yes" } else { "No" })),
		("Skip Errors:", Cow::Borrowed(
			match (opts.skip_read_errors(), opts.skip_hardware_errors()) {
				(true, true) => "Read and Hardware",
				(true, false) => "Read",
				(false, true) => "Hardware",
				(false, false) => "No",
			}
		)),
		("Destination:", Cow::Owned(format!("{dst}_\x1b[2m##\x1b[0;1m.wav"))),
		("Encoder:", Cow::Borrowed(encoder.unwrap_or("None"))),
	];
	let max_label = set.iter().map(|(k, _)| k.len()).max().unwrap_or(0);

	eprintln!("\x1b[1;38;5;199mRipping…\x1b[0m");
	for (k, v) in set {
		eprintln!("  {k:max_label$} \x1b[1m{v}\x1b[0m");
	}
	eprintln!();
}

/// # Rip Summary Tracks.
///
/// Format the desired tracks into a compact string, collapsing runs into
/// ranges.
fn rip_summary_tracks(opts: &RipOptions) -> String {
	#[derive(Clone, Copy)]
	/// # Track Number(s).
	enum SummaryTrack {
		/// # One Track.
		One(u8),

		/// # Track Range.
		Rng(u8, u8),
	}

	impl fmt::Display for SummaryTrack {
		fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
			match *self {
				Self::One(n) => write!(f, "{n}"),
				Self::Rng(a, b) => write!(f, "{a}\x1b[0;2m..=\x1b[0;1m{b}"),
			}
		}
	}

	let mut set: Vec<SummaryTrack> = Vec::new();
	for n in opts.tracks() {
		// Track numbers never exceed 99, so there's no overflow to worry about.
		let joined = match set.last() {
			Some(&SummaryTrack::One(a)) if a + 1 == n => Some(SummaryTrack::Rng(a, n)),
			Some(&SummaryTrack::Rng(a, b)) if b + 1 == n => Some(SummaryTrack::Rng(a, n)),
			_ => None,
		};

		if let Some(joined) = joined {
			set.pop();
			set.push(joined);
		}
		else { set.push(SummaryTrack::One(n)); }
	}

	JoinFmt::new(set.into_iter(), "\x1b[0;2m, \x1b[0;1m").to_string()
}



/// # Rip!
fn rip(
	drive: &Arc<Drive>,
	toc: &Toc,
	opts: RipOptions,
	settings: &cli::Settings,
	killed: &KillSwitch,
) -> Result<(), CdRipError> {
	let cache = Cache::cwd()?;
	let prefix = format!("{:08x}", toc.signature().cddb_id());
	let sink = WavSink::new(cache.root(), prefix.as_str())?;

	// Note where each track will end up, for the encoder.
	let wavs: BTreeMap<u8, PathBuf> = opts.tracks()
		.map(|n| (n, sink.path_for(Some(n))))
		.collect();

	rip_summary(
		&opts,
		&format!("./{}/{prefix}", cdrip_core::CACHE_BASE),
		settings.encoder.as_deref(),
	);

	let encoder = settings.encoder.as_ref().map(|_| EncodeQueue::new());
	let progress = Progless::default();
	let handle = Task::Rip { opts, sink: Box::new(sink) }.spawn(drive, killed.clone())?;

	let mut current = None;
	for event in handle.events().iter() {
		match event {
			TaskEvent::Progress(p) => {
				if current != Some(p.track()) {
					current = Some(p.track());
					let _res = progress.reset(p.total());
					progress.set_title(Some(Msg::custom("Ripping", 199, &track_label(p.track()))));
				}
				progress.increment();
			},
			TaskEvent::TrackDone { track, crc32 } => {
				progress.finish();
				current = None;
				Msg::custom("Ripped", 10, &format!(
					"{} \x1b[2m(CRC32 {crc32:08X})\x1b[0m",
					track_label(track),
				))
					.with_newline(true)
					.eprint();

				// Encode it!
				if let (Some(queue), Some(cmd), Some(src)) = (
					encoder.as_ref(),
					settings.encoder.as_deref(),
					track.and_then(|n| wavs.get(&n)),
				) {
					match CommandJob::new(cmd, src, src.with_extension("")) {
						Ok(job) => { queue.push(Box::new(job))?; },
						Err(e) => { Msg::from(e).eprint(); },
					}
					for e in queue.events().try_iter() { encode_event(&e); }
				}
			},
			TaskEvent::Log(_) => {},
			TaskEvent::Finished(_) => break,
		}
	}
	progress.finish();

	let outcome = handle.wait();
	print_log(outcome.log());

	// Let the encoder catch up regardless.
	if let Some(queue) = encoder {
		for e in queue.finish() { encode_event(&e); }
	}

	if outcome.is_cancelled() { return Err(CdRipError::Killed); }
	if let Some(e) = outcome.error() { return Err(e.clone()); }

	if let Some(report) = outcome.report() {
		let defects = u32::try_from(report.defects().len()).unwrap_or(u32::MAX);
		if defects != 0 {
			Msg::warning(format!(
				"{} possible defect{} noted; see above.",
				NiceU32::from(defects),
				if defects == 1 { " was" } else { "s were" },
			)).eprint();
		}

		if ! settings.no_verify { verify(&cache, toc, report); }
	}

	Ok(())
}

/// # Verify.
///
/// Look up the disc in AccurateRip and check each ripped track against it.
/// Not finding a match is worth mentioning, but isn't a failure.
fn verify(cache: &Cache, toc: &Toc, report: &RipReport) {
	let id = AccurateRipId::from(&toc.signature());
	let ar = match AccurateRip::lookup(&id, Some(cache)) {
		Ok(ar) => ar,
		Err(e) => {
			Msg::warning(e.to_string()).eprint();
			return;
		},
	};

	for (&n, &v1) in report.ar_v1() {
		let v2 = report.ar_v2().get(&n).copied().unwrap_or(0);
		match ar.verify(n, v1, v2) {
			ArMatch::None => {
				let hint = report.ar_450().get(&n)
					.and_then(|&c| ar.verify_450(n, c))
					.map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(
						" (Sector 450 matches with confidence {c}; this may be a different pressing.)"
					)));
				Msg::warning(format!(
					"{} could not be verified with AccurateRip.{hint}",
					track_label(Some(n)),
				)).eprint();
			},
			m => Msg::custom("Verified", 10, &format!("{} is {m}.", track_label(Some(n))))
				.with_newline(true)
				.eprint(),
		}
	}
}



/// # Encode Event.
fn encode_event(e: &EncodeEvent) {
	match e {
		EncodeEvent::Started(_) => {},
		EncodeEvent::Finished(_) => Msg::custom("Encoded", 10, &e.to_string())
			.with_newline(true)
			.eprint(),
		EncodeEvent::Failed(..) => Msg::warning(e.to_string()).eprint(),
	}
}

/// # Print Log.
///
/// Print the warnings and errors from a task, up to a point.
fn print_log(log: &Log) {
	let mut entries = log.entries().iter().filter(|e| LogLevel::Warning <= e.level());
	for e in entries.by_ref().take(MAX_LOG) {
		Msg::from(e).with_newline(true).eprint();
	}

	let more = entries.count();
	if more != 0 {
		Msg::warning(format!("…and {more} more.")).eprint();
	}
}

/// # Track Label.
fn track_label(track: Option<u8>) -> String {
	match track {
		Some(0) => "The HTOA".to_owned(),
		Some(n) => format!("Track #{n:02}"),
		None => "The disc".to_owned(),
	}
}
