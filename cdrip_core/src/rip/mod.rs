/*!
# CD Rip: Ripping
*/

mod buf;
pub(super) mod opts;
pub(super) mod sink;

use buf::{
	RipBuffer,
	Sector,
	SectorArray,
};
use crate::{
	ArChecksum,
	BYTES_PER_SAMPLE,
	BYTES_PER_SECTOR,
	CdRipError,
	KillSwitch,
	Log,
	LogListener,
	RipOptions,
	SAMPLES_PER_SECTOR,
	scsi::{
		ErrorCode,
		Transport,
	},
	Toc,
	Track,
};
use crc32fast::Hasher as Crc;
use sink::PcmSink;
use std::{
	collections::BTreeMap,
	fmt,
};



/// # Bytes Per Sector (Wide).
const SECTOR: i64 = BYTES_PER_SECTOR as i64;

/// # Progress Callback.
type ProgressFn<'a> = Box<dyn FnMut(RipProgress) + Send + 'a>;

/// # Track Done Callback.
type TrackDoneFn<'a> = Box<dyn FnMut(Option<u8>, u32) + Send + 'a>;



#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
/// # Rip Phase.
///
/// The ripper moves through these in order, once per track, ending with
/// one of the three terminal phases.
pub enum RipPhase {
	#[default]
	/// # Not Started.
	Idle,

	/// # Preparing Track.
	Prepare(Option<u8>),

	/// # Reading Track.
	ReadLoop(Option<u8>),

	/// # Track Finished.
	TrackDone(Option<u8>),

	/// # All Done.
	Finished,

	/// # Cancelled.
	Cancelled,

	/// # Failed.
	Error,
}

impl RipPhase {
	#[must_use]
	/// # Is Terminal?
	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Finished | Self::Cancelled | Self::Error)
	}
}



#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
/// # Defect Kind.
pub enum DefectKind {
	/// # C2 Errors (Count).
	C2(u32),

	/// # Subchannel Position Mismatch.
	SubchannelDesync,

	/// # Unreadable (Skipped).
	ReadError,

	/// # Hardware Error (Skipped).
	HardwareError,
}

impl fmt::Display for DefectKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::C2(n) => write!(f, "{n} C2 error(s)"),
			Self::SubchannelDesync => f.write_str("subchannel desync"),
			Self::ReadError => f.write_str("read error"),
			Self::HardwareError => f.write_str("hardware error"),
		}
	}
}

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
/// # Defect.
///
/// A possible flaw in the ripped data. These never stop a rip by themselves.
pub struct Defect {
	track: Option<u8>,
	sector: i32,
	kind: DefectKind,
}

impl Defect {
	#[must_use]
	/// # Track.
	pub const fn track(&self) -> Option<u8> { self.track }

	#[must_use]
	/// # Sector (LBA).
	pub const fn sector(&self) -> i32 { self.sector }

	#[must_use]
	/// # Kind.
	pub const fn kind(&self) -> DefectKind { self.kind }
}



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Rip Progress.
///
/// This is passed to the progress callback after every sector.
pub struct RipProgress {
	track: Option<u8>,
	sector: i32,
	done: u32,
	total: u32,
	read: u32,
}

impl RipProgress {
	#[must_use]
	/// # Track.
	///
	/// This is `None` for whole-disc rips.
	pub const fn track(&self) -> Option<u8> { self.track }

	#[must_use]
	/// # Current Sector (LBA).
	pub const fn sector(&self) -> i32 { self.sector }

	#[must_use]
	/// # Sectors Done (This Track).
	pub const fn done(&self) -> u32 { self.done }

	#[must_use]
	/// # Sectors Total (This Track).
	pub const fn total(&self) -> u32 { self.total }

	#[must_use]
	/// # Sectors Done (All Tracks).
	pub const fn read(&self) -> u32 { self.read }

	#[must_use]
	/// # Percent (This Track).
	pub fn percent(&self) -> f64 {
		if self.total == 0 { 100.0 }
		else { f64::from(self.done) * 100.0 / f64::from(self.total) }
	}
}



#[derive(Debug, Clone, Default)]
/// # Rip Report.
///
/// The outcome of [`Ripper::rip`]. Checksums are only recorded for tracks
/// that finished, so a failed or cancelled rip may still carry results for
/// the tracks before it.
pub struct RipReport {
	success: bool,
	phase: RipPhase,
	crc32: BTreeMap<u8, u32>,
	ar_v1: BTreeMap<u8, u32>,
	ar_v2: BTreeMap<u8, u32>,
	ar_450: BTreeMap<u8, u32>,
	disc_crc32: Option<u32>,
	defects: Vec<Defect>,
	log: Log,
	error: Option<CdRipError>,
}

impl RipReport {
	#[must_use]
	/// # Success?
	pub const fn is_success(&self) -> bool { self.success }

	#[must_use]
	/// # Final Phase.
	pub const fn phase(&self) -> RipPhase { self.phase }

	#[must_use]
	/// # CRC32 (by Track).
	pub const fn crc32(&self) -> &BTreeMap<u8, u32> { &self.crc32 }

	#[must_use]
	/// # AccurateRip v1 (by Track).
	pub const fn ar_v1(&self) -> &BTreeMap<u8, u32> { &self.ar_v1 }

	#[must_use]
	/// # AccurateRip v2 (by Track).
	pub const fn ar_v2(&self) -> &BTreeMap<u8, u32> { &self.ar_v2 }

	#[must_use]
	/// # AccurateRip Sector 450 (by Track).
	pub const fn ar_450(&self) -> &BTreeMap<u8, u32> { &self.ar_450 }

	#[must_use]
	/// # CRC32 (Whole Disc).
	///
	/// This is only set for whole-disc rips.
	pub const fn disc_crc32(&self) -> Option<u32> { self.disc_crc32 }

	#[must_use]
	/// # Defects.
	pub fn defects(&self) -> &[Defect] { &self.defects }

	#[must_use]
	/// # Log.
	pub const fn log(&self) -> &Log { &self.log }

	#[must_use]
	/// # Error.
	///
	/// Cancellation is not an error, so this will be `None` for cancelled
	/// rips.
	pub const fn error(&self) -> Option<&CdRipError> { self.error.as_ref() }

	/// # Take Log.
	pub fn take_log(&mut self) -> Log { std::mem::take(&mut self.log) }
}



#[derive(Debug, Clone)]
/// # Segment.
///
/// A contiguous run of sectors written as one sink "track". In track mode
/// this is a single track; in disc mode it is every audio track back to
/// back.
struct Segment {
	label: Option<u8>,
	first: i32,
	last: i32,
	parts: Vec<Part>,
}

#[derive(Debug, Clone, Copy)]
/// # Segment Part.
///
/// The per-track checksum boundaries within a segment.
struct Part {
	number: u8,
	first: i32,
	last: i32,
	ar: Option<ArChecksum>,
}

impl Part {
	/// # From Track.
	fn from_track(toc: &Toc, t: &Track) -> Result<Self, CdRipError> {
		let first = i32::try_from(t.first_sector()).map_err(|_| CdRipError::Toc)?;
		let last = i32::try_from(t.last_sector()).map_err(|_| CdRipError::Toc)?;
		let samples = t.sectors().saturating_mul(u32::from(SAMPLES_PER_SECTOR));
		Ok(Self {
			number: t.number(),
			first,
			last,
			ar: Some(ArChecksum::for_track(
				samples,
				toc.is_first_audio(t.number()),
				toc.is_last_audio(t.number()),
			)),
		})
	}
}



/// # Checksums.
///
/// Running checksums for one segment.
struct Sums {
	parts: Vec<(Part, Crc)>,
	idx: usize,
	disc: Option<Crc>,
}

impl Sums {
	/// # New.
	fn new(seg: &Segment) -> Self {
		Self {
			parts: seg.parts.iter().map(|p| (*p, Crc::new())).collect(),
			idx: 0,
			disc: if seg.label.is_none() { Some(Crc::new()) } else { None },
		}
	}

	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	/// # Update.
	///
	/// `pos` is the (offset-corrected) disc byte position of the first byte
	/// of `data`.
	fn update(&mut self, mut pos: i64, mut data: &[u8]) {
		if let Some(crc) = self.disc.as_mut() { crc.update(data); }

		while ! data.is_empty() {
			// Move past finished parts.
			while self.parts.get(self.idx).is_some_and(|(p, _)| part_end(p) <= pos) {
				self.idx += 1;
			}
			let Some((part, crc)) = self.parts.get_mut(self.idx) else { break; };

			// Bytes between parts don't belong to any track.
			let start = i64::from(part.first) * SECTOR;
			let len = data.len() as i64;
			if pos < start {
				let skip = (start - pos).min(len);
				data = &data[skip as usize..];
				pos += skip;
				continue;
			}

			let take = (part_end(part) - pos).min(len) as usize;
			crc.update(&data[..take]);
			if let Some(ar) = part.ar.as_mut() { ar.update(&data[..take]); }
			data = &data[take..];
			pos += take as i64;
		}
	}
}

/// # Part End (Byte).
fn part_end(part: &Part) -> i64 { (i64::from(part.last) + 1) * SECTOR }



/// # Ripper.
///
/// This reads audio from the drive for the tracks in a [`RipOptions`] (or
/// the whole disc), applying the read offset and the error-handling policy,
/// streaming the result to a [`PcmSink`] and working out the CRC32 and
/// AccurateRip checksums along the way.
///
/// The ripper never holds more than a small window of sectors in memory.
pub struct Ripper<'a> {
	toc: &'a Toc,
	opts: RipOptions,
	killed: KillSwitch,
	progress: Option<ProgressFn<'a>>,
	track_done: Option<TrackDoneFn<'a>>,
	phase: RipPhase,
	log: Log,
	defects: Vec<Defect>,
	read: u32,
}

impl fmt::Debug for Ripper<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Ripper")
			.field("toc", &self.toc)
			.field("opts", &self.opts)
			.field("phase", &self.phase)
			.finish_non_exhaustive()
	}
}

impl<'a> Ripper<'a> {
	#[must_use]
	/// # New.
	pub fn new(toc: &'a Toc, opts: RipOptions, killed: KillSwitch) -> Self {
		Self {
			toc,
			opts,
			killed,
			progress: None,
			track_done: None,
			phase: RipPhase::Idle,
			log: Log::default(),
			defects: Vec::new(),
			read: 0,
		}
	}

	#[must_use]
	/// # With Progress Callback.
	///
	/// The callback is run after every sector.
	pub fn with_progress<F>(mut self, cb: F) -> Self
	where F: FnMut(RipProgress) + Send + 'a {
		self.progress = Some(Box::new(cb));
		self
	}

	#[must_use]
	/// # With Track Done Callback.
	///
	/// The callback is run after each track (or the whole disc) has been
	/// committed to the sink, with its CRC32.
	pub fn with_track_done<F>(mut self, cb: F) -> Self
	where F: FnMut(Option<u8>, u32) + Send + 'a {
		self.track_done = Some(Box::new(cb));
		self
	}

	#[must_use]
	/// # With Log Listener.
	///
	/// The listener hears about each log entry as it happens. The full log
	/// is still included in the report.
	pub fn with_log_listener(mut self, listener: LogListener) -> Self {
		self.log = Log::with_listener(listener);
		self
	}

	#[must_use]
	/// # Phase.
	pub const fn phase(&self) -> RipPhase { self.phase }

	/// # Rip!
	///
	/// Rip the requested tracks in order, or the whole disc if none were
	/// requested.
	///
	/// This never panics or returns early; check [`RipReport::is_success`].
	/// If a track fails or the rip is cancelled, the sink is told to abort
	/// that track and nothing further is attempted.
	pub fn rip(&mut self, dev: &mut dyn Transport, sink: &mut dyn PcmSink) -> RipReport {
		let mut report = RipReport::default();
		self.phase = RipPhase::Idle;
		self.read = 0;

		match self.rip_all(dev, sink, &mut report) {
			Ok(()) => {
				self.phase = RipPhase::Finished;
				report.success = true;
			},
			Err(CdRipError::Killed) => { self.phase = RipPhase::Cancelled; },
			Err(e) => {
				let track = self.current_track();
				self.phase = RipPhase::Error;
				self.log.critical(track, None, e.to_string());
				report.error = Some(e);
			},
		}

		report.phase = self.phase;
		report.defects = std::mem::take(&mut self.defects);
		report.log = self.log.take_entries();
		report
	}
}

impl Ripper<'_> {
	/// # Rip Everything.
	fn rip_all(&mut self, dev: &mut dyn Transport, sink: &mut dyn PcmSink, report: &mut RipReport)
	-> Result<(), CdRipError> {
		let segments = self.segments()?;
		let leadout = i32::try_from(self.toc.audio_leadout()).map_err(|_| CdRipError::Toc)?;
		let mut buf = RipBuffer::new(self.opts.c2(), self.opts.sync());
		let mut window = SectorArray::new(self.opts.window());

		for (k, seg) in segments.iter().enumerate() {
			self.phase = RipPhase::Prepare(seg.label);
			sink.start_track(seg.label)?;

			let sums = match self.rip_segment(dev, sink, seg, leadout, &mut buf, &mut window) {
				Ok(sums) => sums,
				Err(e) => {
					sink.abort_track();
					return Err(e);
				},
			};
			sink.finish_track()?;

			// Record the results.
			let mut seg_crc = 0;
			for (part, crc) in sums.parts {
				let crc = crc.finalize();
				seg_crc = crc;
				report.crc32.insert(part.number, crc);
				if let Some(ar) = part.ar {
					report.ar_v1.insert(part.number, ar.v1());
					report.ar_v2.insert(part.number, ar.v2());
					report.ar_450.insert(part.number, ar.c450());
					self.log.info(Some(part.number), None, format!(
						"CRC32 {crc:08X}, AccurateRip v1 {:08X}, v2 {:08X}.",
						ar.v1(),
						ar.v2(),
					));
				}
				else {
					self.log.info(Some(part.number), None, format!("CRC32 {crc:08X}."));
				}
			}
			if let Some(crc) = sums.disc.map(Crc::finalize) {
				seg_crc = crc;
				report.disc_crc32 = Some(crc);
			}

			self.phase = RipPhase::TrackDone(seg.label);
			if let Some(cb) = self.track_done.as_mut() { cb(seg.label, seg_crc); }

			// Hold onto any sectors the next track needs.
			let (left, _) = self.opts.offset().sector_shift();
			match segments.get(k + 1) {
				Some(next) if self.opts.offset().samples() != 0 && next.first == seg.last + 1 =>
					window.retain_from(next.first + left),
				_ => window.clear(),
			}
		}

		Ok(())
	}

	/// # Rip Segment.
	fn rip_segment(
		&mut self,
		dev: &mut dyn Transport,
		sink: &mut dyn PcmSink,
		seg: &Segment,
		leadout: i32,
		buf: &mut RipBuffer,
		window: &mut SectorArray,
	) -> Result<Sums, CdRipError> {
		let offset = self.opts.offset();
		let (left, right) = offset.sector_shift();
		let shift = i64::from(offset.samples()) * i64::from(BYTES_PER_SAMPLE);

		// The drive bytes we want, and the sectors holding them.
		let mut cursor = i64::from(seg.first) * SECTOR + shift;
		let end = (i64::from(seg.last) + 1) * SECTOR + shift;
		let read_first = seg.first + left;
		let read_last = seg.last + right;
		let total = u32::try_from(read_last - read_first + 1).unwrap_or(0);

		let mut sums = Sums::new(seg);
		self.phase = RipPhase::ReadLoop(seg.label);

		for (done, lba) in (1..=total).zip(read_first..=read_last) {
			if self.killed.killed() { return Err(CdRipError::Killed); }

			// Sectors carried over from the previous track are reused.
			if ! window.contains(lba) {
				let track = seg.label.or_else(|| self.track_at(lba));
				let sector = self.read_sector(dev, buf, lba, leadout, track)?;
				window.push(sector);
			}

			self.read += 1;
			if let Some(cb) = self.progress.as_mut() {
				cb(RipProgress {
					track: seg.label,
					sector: lba,
					done,
					total,
					read: self.read,
				});
			}

			if window.is_full() {
				emit(window, &mut cursor, end, shift, &mut sums, sink)?;
				if offset.samples() == 0 { window.clear(); }
				else { window.keep_newest(1); }
			}
		}

		if self.killed.killed() { return Err(CdRipError::Killed); }
		emit(window, &mut cursor, end, shift, &mut sums, sink)?;
		if cursor == end { Ok(sums) }
		else { Err(CdRipError::Bug("sector window out of sync")) }
	}

	/// # Read Sector.
	///
	/// Read a single sector, applying the retry/skip policy.
	fn read_sector(
		&mut self,
		dev: &mut dyn Transport,
		buf: &mut RipBuffer,
		lba: i32,
		leadout: i32,
		track: Option<u8>,
	) -> Result<Sector, CdRipError> {
		// Outside the disc.
		if ! self.opts.overread() && (lba < 0 || leadout <= lba) {
			return Ok(Sector::silence(lba));
		}

		let retries = self.opts.retries();
		let mut attempt = 0_u8;
		loop {
			if self.killed.killed() { return Err(CdRipError::Killed); }

			let last: Option<ErrorCode> = match buf.read(dev, lba) {
				Ok(true) => break,
				Ok(false) => None,
				Err(e) if e.is_recovered() => {
					self.log.info(track, Some(lba), format!("Drive recovered the data: {e}."));
					break;
				},
				Err(e) if e.is_hardware() =>
					if self.opts.skip_hardware_errors() {
						self.log.error(track, Some(lba), format!("Hardware error (skipped): {e}."));
						self.defect(track, lba, DefectKind::HardwareError);
						break;
					}
					else { return Err(CdRipError::Scsi(e)); },
				Err(e) => Some(e),
			};

			// Out of chances?
			if retries <= attempt {
				if self.opts.skip_read_errors() {
					self.log.error(track, Some(lba), last.map_or_else(
						|| "No data returned (skipped).".to_owned(),
						|e| format!("Unreadable sector (skipped): {e}."),
					));
					self.defect(track, lba, DefectKind::ReadError);
					break;
				}
				return Err(last.map_or(CdRipError::NoData, CdRipError::Scsi));
			}

			attempt += 1;
			self.log.warning(track, Some(lba), last.map_or_else(
				|| format!("No data returned; retrying ({attempt}/{retries})."),
				|e| format!("Read failed: {e}; retrying ({attempt}/{retries})."),
			));
		}

		let sector = buf.sector(lba);
		if 0 != sector.c2 {
			self.log.warning(track, Some(lba), format!("{} C2 error(s).", sector.c2));
			self.defect(track, lba, DefectKind::C2(sector.c2));
		}
		if sector.sync == Some(false) {
			self.log.warning(track, Some(lba), "Subchannel position mismatch.");
			self.defect(track, lba, DefectKind::SubchannelDesync);
		}

		Ok(sector)
	}

	/// # Add Defect.
	fn defect(&mut self, track: Option<u8>, sector: i32, kind: DefectKind) {
		self.defects.push(Defect { track, sector, kind });
	}

	/// # Current Track.
	const fn current_track(&self) -> Option<u8> {
		match self.phase {
			RipPhase::Prepare(t) | RipPhase::ReadLoop(t) | RipPhase::TrackDone(t) => t,
			_ => None,
		}
	}

	/// # Segments.
	///
	/// Work out what needs ripping, in order. Requested data tracks are
	/// skipped with a warning.
	fn segments(&mut self) -> Result<Vec<Segment>, CdRipError> {
		// Specific tracks.
		let toc = self.toc;
		if self.opts.has_tracks() {
			let mut out = Vec::new();
			for n in self.opts.tracks() {
				if n == 0 {
					let (first, last) = toc.htoa().ok_or(CdRipError::NoTrack(0))?;
					let first = i32::try_from(first).map_err(|_| CdRipError::Toc)?;
					let last = i32::try_from(last).map_err(|_| CdRipError::Toc)?;
					out.push(Segment {
						label: Some(0),
						first,
						last,
						parts: vec![Part { number: 0, first, last, ar: None }],
					});
					continue;
				}

				let t = toc.track(n).ok_or(CdRipError::NoTrack(n))?;
				if ! t.is_audio() {
					self.log.warning(Some(n), None, "Data track (skipped).");
					continue;
				}

				let part = Part::from_track(toc, t)?;
				out.push(Segment {
					label: Some(n),
					first: part.first,
					last: part.last,
					parts: vec![part],
				});
			}

			if out.is_empty() { Err(CdRipError::Noop) }
			else { Ok(out) }
		}
		// The whole disc.
		else {
			let parts = self.toc.audio_tracks()
				.map(|t| Part::from_track(self.toc, t))
				.collect::<Result<Vec<_>, _>>()?;
			let (Some(first), Some(last)) = (parts.first(), parts.last()) else {
				return Err(CdRipError::Noop);
			};
			Ok(vec![Segment {
				label: None,
				first: first.first,
				last: last.last,
				parts,
			}])
		}
	}

	/// # Track At.
	fn track_at(&self, lba: i32) -> Option<u8> {
		let lba = u32::try_from(lba).ok()?;
		self.toc.audio_tracks()
			.find(|t| t.first_sector() <= lba && lba <= t.last_sector())
			.map(Track::number)
	}
}



#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
/// # Emit.
///
/// Send the wanted parts of the window that haven't been sent yet to the sink
/// and checksums, advancing the cursor.
fn emit(
	window: &SectorArray,
	cursor: &mut i64,
	end: i64,
	shift: i64,
	sums: &mut Sums,
	sink: &mut dyn PcmSink,
) -> Result<(), CdRipError> {
	for sector in window.iter() {
		let start = i64::from(sector.lba) * SECTOR;
		let from = (*cursor).max(start);
		let to = end.min(start + SECTOR);
		if from < to {
			let chunk = &sector.data[(from - start) as usize..(to - start) as usize];
			sink.write(chunk)?;
			sums.update(from - shift, chunk);
			*cursor = to;
		}
	}
	Ok(())
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::{
		crc32,
		MemorySink,
		ReadOffset,
		scsi::{
			mock::{
				MockDevice,
				raw_toc,
			},
			SenseKey,
		},
	};
	use std::sync::{
		Arc,
		Mutex,
	};

	/// # Medium Error.
	const MEDIUM: ErrorCode = ErrorCode::new(0x70, SenseKey::MediumError, 0x11, 0);

	/// # Hardware Error.
	const HARDWARE: ErrorCode = ErrorCode::new(0x70, SenseKey::HardwareError, 0x44, 0);

	/// # Recovered Error.
	const RECOVERED: ErrorCode = ErrorCode::new(0x70, SenseKey::RecoveredError, 0x17, 0x01);

	/// # TOC.
	fn toc(starts: &[u32], leadout: u32) -> Toc {
		Toc::from_raw(&raw_toc(starts, leadout)).expect("TOC failed.")
	}

	/// # Counting Device.
	///
	/// Each sample holds its own disc-wide index.
	fn counting() -> MockDevice {
		MockDevice::default().with_leadout(30).with_sectors(|lba| {
			let lba = u32::try_from(lba).expect("Negative LBA.");
			(0..u32::from(SAMPLES_PER_SECTOR))
				.flat_map(|i| (lba * u32::from(SAMPLES_PER_SECTOR) + i).to_le_bytes())
				.collect()
		})
	}

	/// # Expected Samples.
	///
	/// Indices outside `0..max` are silent.
	fn expected(from: i64, to: i64, max: i64) -> Vec<u8> {
		(from..to)
			.flat_map(|i|
				if (0..max).contains(&i) { u32::try_from(i).unwrap_or(0).to_le_bytes() }
				else { [0; 4] }
			)
			.collect()
	}

	/// # Rip.
	fn rip(toc: &Toc, opts: RipOptions, dev: &mut MockDevice) -> (RipReport, MemorySink) {
		let mut sink = MemorySink::new();
		let report = Ripper::new(toc, opts, KillSwitch::default()).rip(dev, &mut sink);
		(report, sink)
	}

	#[test]
	fn t_zero() {
		let toc = toc(&[0, 1000], 2000);
		let mut dev = MockDevice::default();
		let opts = RipOptions::default().with_track(1).with_track(2);
		let (report, sink) = rip(&toc, opts, &mut dev);

		assert!(report.is_success());
		assert_eq!(report.phase(), RipPhase::Finished);
		assert!(report.defects().is_empty());
		assert!(report.error().is_none());

		let zero = crc32(&vec![0_u8; 1000 * 2352]);
		for n in [1, 2] {
			assert_eq!(sink.get(Some(n)).map(<[u8]>::len), Some(1000 * 2352));
			assert_eq!(report.crc32().get(&n), Some(&zero));
			assert_eq!(report.ar_v1().get(&n), Some(&0));
			assert_eq!(report.ar_v2().get(&n), Some(&0));
			assert_eq!(report.ar_450().get(&n), Some(&0));
		}
		assert_eq!(report.disc_crc32(), None);

		// Each sector is read exactly once.
		assert_eq!(dev.reads().len(), 2000);

		// The whole disc as one stream.
		let mut dev = MockDevice::default();
		let (report, sink) = rip(&toc, RipOptions::default(), &mut dev);
		assert!(report.is_success());
		assert_eq!(sink.tracks().len(), 1);
		assert_eq!(sink.get(None).map(<[u8]>::len), Some(2000 * 2352));
		assert_eq!(report.disc_crc32(), Some(crc32(&vec![0_u8; 2000 * 2352])));
		assert_eq!(report.crc32().get(&1), Some(&zero));
		assert_eq!(report.crc32().get(&2), Some(&zero));
		assert_eq!(report.ar_v1().get(&2), Some(&0));
	}

	#[test]
	fn t_offset() {
		let toc = toc(&[0, 10, 20], 30);
		let spt = i64::from(SAMPLES_PER_SECTOR);

		for raw in [0_i16, 6, 588, 667, -1, -588, -1164] {
			let offset = ReadOffset::try_from(raw).expect("Bad offset.");
			let o = i64::from(raw);

			// One track at a time.
			for n in 1..=3_u8 {
				let mut dev = counting();
				let opts = RipOptions::default().with_offset(offset).with_track(n);
				let (report, sink) = rip(&toc, opts, &mut dev);
				assert!(report.is_success(), "Offset {raw}, track {n} failed.");

				let first = i64::from(n - 1) * 10;
				let want = expected(first * spt + o, (first + 10) * spt + o, 30 * spt);
				assert_eq!(
					sink.get(Some(n)),
					Some(want.as_slice()),
					"Offset {raw}, track {n} mismatch.",
				);
				assert_eq!(report.crc32().get(&n), Some(&crc32(&want)));

				// Nothing outside the disc should have been requested.
				assert!(dev.reads().iter().all(|lba| (0..30).contains(lba)));
			}

			// All together, sharing the straddling sector.
			let mut dev = counting();
			let opts = RipOptions::default()
				.with_offset(offset)
				.with_track(1)
				.with_track(2)
				.with_track(3);
			let (report, sink) = rip(&toc, opts, &mut dev);
			assert!(report.is_success());
			for n in 1..=3_u8 {
				let first = i64::from(n - 1) * 10;
				let want = expected(first * spt + o, (first + 10) * spt + o, 30 * spt);
				assert_eq!(sink.get(Some(n)), Some(want.as_slice()));
			}
			let mut reads = dev.reads().to_vec();
			let len = reads.len();
			reads.dedup();
			assert_eq!(reads.len(), len, "Offset {raw}: sectors were re-read.");

			// And as one stream.
			let mut dev = counting();
			let opts = RipOptions::default().with_offset(offset);
			let (report, sink) = rip(&toc, opts, &mut dev);
			assert!(report.is_success());
			let want = expected(o, 30 * spt + o, 30 * spt);
			assert_eq!(sink.get(None), Some(want.as_slice()));
			assert_eq!(report.disc_crc32(), Some(crc32(&want)));
			let first = expected(o, 10 * spt + o, 30 * spt);
			assert_eq!(report.crc32().get(&1), Some(&crc32(&first)));
		}
	}

	#[test]
	fn t_window() {
		// Window size shouldn't change the result.
		let toc = toc(&[0, 10, 20], 30);
		let offset = ReadOffset::try_from(667_i16).expect("Bad offset.");
		let mut last: Option<Vec<u8>> = None;
		for w in [2, 3, 7, 32] {
			let mut dev = counting();
			let opts = RipOptions::default().with_offset(offset).with_window(w).with_track(2);
			let (report, sink) = rip(&toc, opts, &mut dev);
			assert!(report.is_success());
			let got = sink.get(Some(2)).map(<[u8]>::to_vec);
			if let Some(last) = last.as_ref() { assert_eq!(got.as_ref(), Some(last)); }
			last = got;
		}
	}

	#[test]
	fn t_retry() {
		let toc = toc(&[0, 10, 20], 30);
		let opts = RipOptions::default().with_track(1).with_retries(5);

		// Eventual success.
		let mut dev = counting().with_failures(5, &[MEDIUM, MEDIUM]);
		let (report, sink) = rip(&toc, opts, &mut dev);
		assert!(report.is_success());
		assert!(report.defects().is_empty());
		assert_eq!(dev.reads().iter().filter(|v| 5.eq(*v)).count(), 3);
		assert_eq!(sink.get(Some(1)), Some(expected(0, 5880, 17_640).as_slice()));
		assert_eq!(report.log().worst(), Some(crate::LogLevel::Warning));
		assert_eq!(
			report.log().entries().iter()
				.filter(|e| e.level() == crate::LogLevel::Warning)
				.count(),
			2,
		);

		// Failure.
		let mut dev = counting().with_failures(5, &[MEDIUM; 6]);
		let (report, sink) = rip(&toc, opts, &mut dev);
		assert!(! report.is_success());
		assert_eq!(report.phase(), RipPhase::Error);
		assert_eq!(report.error(), Some(&CdRipError::Scsi(MEDIUM)));
		assert_eq!(dev.reads().iter().filter(|v| 5.eq(*v)).count(), 6);
		assert!(sink.get(Some(1)).is_none());
		assert_eq!(report.log().worst(), Some(crate::LogLevel::Critical));

		// Skipped.
		let mut dev = counting().with_failures(5, &[MEDIUM; 6]);
		let (report, sink) = rip(&toc, opts.with_skip_read_errors(true), &mut dev);
		assert!(report.is_success());
		assert_eq!(report.defects().len(), 1);
		assert_eq!(report.defects()[0].kind(), DefectKind::ReadError);
		assert_eq!(report.defects()[0].sector(), 5);
		assert_eq!(report.defects()[0].track(), Some(1));
		let data = sink.get(Some(1)).expect("Missing track.");
		assert!(data[5 * 2352..6 * 2352].iter().all(|b| 0.eq(b)), "Skipped sector should be silent.");
		assert_eq!(&data[..5 * 2352], &expected(0, 5 * 588, 17_640)[..]);

		// No retries at all.
		let mut dev = counting().with_failures(5, &[MEDIUM]);
		let (report, _) = rip(&toc, opts.with_retries(0), &mut dev);
		assert!(! report.is_success());
	}

	#[test]
	fn t_errors() {
		let toc = toc(&[0, 10, 20], 30);
		let opts = RipOptions::default().with_track(2);

		// Recovered data is kept.
		let mut dev = counting().with_failures(12, &[RECOVERED]);
		let (report, sink) = rip(&toc, opts, &mut dev);
		assert!(report.is_success());
		assert_eq!(dev.reads().iter().filter(|v| 12.eq(*v)).count(), 1);
		assert_eq!(sink.get(Some(2)), Some(expected(5880, 11_760, 17_640).as_slice()));

		// Hardware errors are fatal…
		let mut dev = counting().with_failures(12, &[HARDWARE]);
		let (report, _) = rip(&toc, opts, &mut dev);
		assert_eq!(report.error(), Some(&CdRipError::Scsi(HARDWARE)));
		assert_eq!(dev.reads().iter().filter(|v| 12.eq(*v)).count(), 1, "Hardware errors are not retried.");

		// …unless they aren't.
		let mut dev = counting().with_failures(12, &[HARDWARE]);
		let (report, _) = rip(&toc, opts.with_skip_hardware_errors(true), &mut dev);
		assert!(report.is_success());
		assert_eq!(report.defects()[0].kind(), DefectKind::HardwareError);

		// C2 and sync problems are flagged, not fatal.
		let mut dev = counting().with_c2_error(14).with_q_shift(16, 1);
		let (report, sink) = rip(&toc, opts.with_sync(true), &mut dev);
		assert!(report.is_success());
		assert_eq!(
			report.defects().iter().map(|d| (d.sector(), d.kind())).collect::<Vec<_>>(),
			[(14, DefectKind::C2(2)), (16, DefectKind::SubchannelDesync)],
		);
		assert_eq!(sink.get(Some(2)), Some(expected(5880, 11_760, 17_640).as_slice()));

		// No C2, no C2 defects.
		let mut dev = counting().with_c2_error(14);
		let (report, _) = rip(&toc, opts.with_c2(false), &mut dev);
		assert!(report.defects().is_empty());
	}

	#[test]
	fn t_tracks() {
		let toc = toc(&[0, 10, 20], 30);

		// Missing tracks.
		let mut dev = counting();
		let (report, _) = rip(&toc, RipOptions::default().with_track(4), &mut dev);
		assert_eq!(report.error(), Some(&CdRipError::NoTrack(4)));
		assert!(dev.reads().is_empty());

		let (report, _) = rip(&toc, RipOptions::default().with_track(0), &mut dev);
		assert_eq!(report.error(), Some(&CdRipError::NoTrack(0)));

		// HTOA.
		let toc = self::toc(&[5, 10, 20], 30);
		let mut dev = counting();
		let opts = RipOptions::default().with_track(0).with_track(1);
		let (report, sink) = rip(&toc, opts, &mut dev);
		assert!(report.is_success());
		assert_eq!(sink.get(Some(0)), Some(expected(0, 5 * 588, 17_640).as_slice()));
		assert!(report.crc32().contains_key(&0));
		assert!(! report.ar_v1().contains_key(&0), "The HTOA has no AccurateRip checksum.");
		assert!(report.ar_v1().contains_key(&1));

		// Mixed mode: the data track is skipped, the audio track isn't.
		let mut raw = raw_toc(&[0, 10], 30);
		raw[4 + 11 * 4 + 1] = 0x14;
		let toc = Toc::from_raw(&raw).expect("TOC failed.");
		assert!(! toc.tracks()[1].is_audio());
		let mut dev = counting();
		let opts = RipOptions::default().with_track(1).with_track(2);
		let (report, sink) = rip(&toc, opts, &mut dev);
		assert!(report.is_success());
		assert_eq!(sink.get(Some(1)), Some(expected(0, 5_880, 17_640).as_slice()));
		assert!(sink.get(Some(2)).is_none());
		assert!(report.crc32().contains_key(&1));
		assert!(! report.crc32().contains_key(&2));
		assert!(report.log().entries().iter().any(|e|
			e.track() == Some(2) && e.level() == crate::LogLevel::Warning
		));
		assert!(dev.reads().iter().all(|&lba| lba < 10));

		// Only data.
		let (report, _) = rip(&toc, RipOptions::default().with_track(2), &mut counting());
		assert_eq!(report.error(), Some(&CdRipError::Noop));
	}

	#[test]
	fn t_cancel() {
		let toc = toc(&[0, 1000], 2000);
		let killed = KillSwitch::default();
		let mut dev = MockDevice::default().with_kill_at(1500, killed.clone());
		let mut sink = MemorySink::new();
		let opts = RipOptions::default().with_track(1).with_track(2);

		let mut done = Vec::new();
		let report = {
			let mut ripper = Ripper::new(&toc, opts, killed)
				.with_track_done(|t, crc| done.push((t, crc)));
			ripper.rip(&mut dev, &mut sink)
		};

		assert!(! report.is_success());
		assert_eq!(report.phase(), RipPhase::Cancelled);
		assert!(report.error().is_none(), "Cancellation is not an error.");
		assert!(sink.get(Some(1)).is_some(), "The first track finished.");
		assert!(sink.get(Some(2)).is_none(), "The second track should be discarded.");
		assert_eq!(report.crc32().len(), 1);
		assert_eq!(done.len(), 1);
		assert_eq!(done[0].0, Some(1));

		// Reading stopped right away.
		assert_eq!(dev.reads().last(), Some(&1500));
	}

	#[test]
	fn t_progress() {
		let toc = toc(&[0, 10, 20], 30);
		let seen = Arc::new(Mutex::new(Vec::new()));
		let seen2 = Arc::clone(&seen);
		let mut dev = counting();
		let mut sink = MemorySink::new();
		let opts = RipOptions::default()
			.with_offset(ReadOffset::try_from(6_i16).expect("Bad offset."))
			.with_track(1)
			.with_track(2);

		let report = Ripper::new(&toc, opts, KillSwitch::default())
			.with_progress(move |p| seen2.lock().expect("Poisoned.").push(p))
			.rip(&mut dev, &mut sink);
		assert!(report.is_success());

		let seen = seen.lock().expect("Poisoned.");
		assert_eq!(seen.len(), 22, "Each track covers 11 sectors.");
		assert_eq!(seen[0].track(), Some(1));
		assert_eq!(seen[0].sector(), 0);
		assert_eq!(seen[10].total(), 11);
		assert!((seen[10].percent() - 100.0).abs() < f64::EPSILON);
		assert_eq!(seen[11].track(), Some(2));
		assert_eq!(seen[11].sector(), 10);
		assert_eq!(seen[21].read(), 22);
	}
}
