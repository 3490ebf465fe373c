/*!
# CD Rip: Table of Contents
*/

use crate::{
	CD_LEADIN,
	CD_LEADOUT_LABEL,
	CdRipError,
	FRAMES_PER_SECOND,
	KillSwitch,
	scsi::{
		Cdb,
		send_negotiated,
		Transport,
	},
};
use std::fmt;



/// # Raw TOC Descriptor Size.
const DESCRIPTOR_SIZE: usize = 11;

/// # Point: First Track.
const POINT_FIRST: u8 = 0xA0;

/// # Point: Last Track.
const POINT_LAST: u8 = 0xA1;

/// # Point: Lead-out.
const POINT_LEADOUT: u8 = 0xA2;

/// # Control: Data Track.
const CONTROL_DATA: u8 = 0b0100;

/// # Control: Copy Permitted.
const CONTROL_COPY: u8 = 0b0010;

/// # Control: Pre-emphasis.
const CONTROL_PREEMPHASIS: u8 = 0b0001;



#[derive(Debug, Clone, Copy, Default, Eq, Hash, PartialEq)]
/// # Track Format.
pub enum TrackFormat {
	/// # Audio.
	Audio,

	/// # Data.
	Data,

	#[default]
	/// # Unknown.
	Unknown,
}

#[derive(Debug, Clone, Copy, Default, Eq, Hash, PartialEq)]
/// # Data Track Sub-Mode.
pub enum DataMode {
	/// # Mode 1.
	Mode1,

	/// # Mode 2 (XA/CD-i).
	Mode2,

	#[default]
	/// # Unknown (or Audio).
	Unknown,
}



#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
/// # Track.
///
/// Sector values are logical block addresses, i.e. relative to the end of
/// the 150-sector lead-in.
pub struct Track {
	number: u8,
	session: u8,
	format: TrackFormat,
	mode: DataMode,
	first_sector: u32,
	last_sector: u32,
	copy_permitted: bool,
	pre_emphasis: bool,
	crc32: Option<u32>,
}

impl Track {
	#[must_use]
	/// # Number.
	pub const fn number(&self) -> u8 { self.number }

	#[must_use]
	/// # Session.
	pub const fn session(&self) -> u8 { self.session }

	#[must_use]
	/// # Format.
	pub const fn format(&self) -> TrackFormat { self.format }

	#[must_use]
	/// # Is Audio?
	pub const fn is_audio(&self) -> bool { matches!(self.format, TrackFormat::Audio) }

	#[must_use]
	/// # Data Mode.
	pub const fn mode(&self) -> DataMode { self.mode }

	#[must_use]
	/// # First Sector.
	pub const fn first_sector(&self) -> u32 { self.first_sector }

	#[must_use]
	/// # Last Sector (Inclusive).
	pub const fn last_sector(&self) -> u32 { self.last_sector }

	#[must_use]
	/// # Sector Count.
	pub const fn sectors(&self) -> u32 { self.last_sector + 1 - self.first_sector }

	#[must_use]
	/// # Copy Permitted?
	pub const fn copy_permitted(&self) -> bool { self.copy_permitted }

	#[must_use]
	/// # Pre-emphasis?
	pub const fn pre_emphasis(&self) -> bool { self.pre_emphasis }

	#[must_use]
	/// # CRC32.
	///
	/// This is populated after a successful rip.
	pub const fn crc32(&self) -> Option<u32> { self.crc32 }

	/// # Set CRC32.
	pub fn set_crc32(&mut self, crc: u32) { self.crc32 = Some(crc); }
}



#[derive(Debug, Clone, Default, Eq, PartialEq)]
/// # Table of Contents.
///
/// Tracks are sorted by first sector. Each track's last sector is the next
/// track's first sector minus one, or its session's lead-out minus one.
pub struct Toc {
	tracks: Vec<Track>,
	leadouts: Vec<(u8, u32)>,
}

impl fmt::Display for Toc {
	/// # Print a Table.
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for t in &self.tracks {
			writeln!(
				f,
				"{:02}  {:>5}  {}  {:>6}  {:>6}  {}",
				t.number,
				match t.format {
					TrackFormat::Audio => "Audio",
					TrackFormat::Data => "Data",
					TrackFormat::Unknown => "?",
				},
				frames_to_msf_string(t.first_sector + u32::from(CD_LEADIN)),
				t.first_sector,
				t.last_sector,
				if t.pre_emphasis { "pre-emphasis" } else { "" },
			)?;
		}
		write!(
			f,
			"{CD_LEADOUT_LABEL}         {}  {:>6}",
			frames_to_msf_string(self.leadout() + u32::from(CD_LEADIN)),
			self.leadout(),
		)
	}
}

impl Toc {
	/// # From Raw TOC Reply.
	///
	/// Parse a READ TOC format `0010b` reply: a four-byte header followed by
	/// eleven-byte descriptors.
	///
	/// ## Errors
	///
	/// Returns an error if the reply is too short or not a whole number of
	/// descriptors, or if the track layout is impossible.
	pub fn from_raw(raw: &[u8]) -> Result<Self, CdRipError> {
		if raw.len() < 4 || 0 != (raw.len() - 4) % DESCRIPTOR_SIZE {
			return Err(CdRipError::Toc);
		}

		let mut descriptors: Vec<&[u8]> = raw[4..].chunks_exact(DESCRIPTOR_SIZE).collect();
		descriptors.sort_by_key(|d| (d[0], d[3]));

		let mut first_number: Option<u8> = None;
		let mut modes: Vec<(u8, DataMode)> = Vec::new();
		let mut leadouts: Vec<(u8, u32)> = Vec::new();
		let mut tracks: Vec<Track> = Vec::new();
		for d in descriptors {
			let session = d[0];
			let adr = d[1] >> 4;
			let control = d[1] & 0x0F;
			let point = d[3];
			let (pmin, psec, pframe) = (d[8], d[9], d[10]);
			if adr != 1 { continue; }

			match point {
				0x01..=0x63 => {
					let abs = msf_to_frames(pmin, psec, pframe);
					let first_sector = abs.checked_sub(u32::from(CD_LEADIN))
						.ok_or(CdRipError::Toc)?;
					let format =
						if 0 == control & CONTROL_DATA { TrackFormat::Audio }
						else { TrackFormat::Data };
					tracks.push(Track {
						number: 0,
						session,
						format,
						mode: DataMode::Unknown,
						first_sector,
						last_sector: first_sector,
						copy_permitted: 0 != control & CONTROL_COPY,
						pre_emphasis:
							matches!(format, TrackFormat::Audio) &&
							0 != control & CONTROL_PREEMPHASIS,
						crc32: None,
					});
				},
				POINT_FIRST => {
					if first_number.is_none() { first_number = Some(pmin); }
					let mode = match psec {
						0x00 => DataMode::Mode1,
						0x10 | 0x20 => DataMode::Mode2,
						_ => DataMode::Unknown,
					};
					modes.push((session, mode));
				},
				POINT_LAST => {},
				POINT_LEADOUT => {
					let abs = msf_to_frames(pmin, psec, pframe);
					let lba = abs.checked_sub(u32::from(CD_LEADIN))
						.ok_or(CdRipError::Toc)?;
					leadouts.push((session, lba));
				},
				_ => {},
			}
		}

		// Number the tracks sequentially and close them out.
		tracks.sort_by_key(|t| t.first_sector);
		let mut number = first_number.unwrap_or(1);
		let len = tracks.len();
		for idx in 0..len {
			let next = tracks.get(idx + 1)
				.filter(|n| n.session == tracks[idx].session)
				.map(|n| n.first_sector);
			let t = &mut tracks[idx];
			t.number = number;
			number = number.saturating_add(1);

			if ! matches!(t.format, TrackFormat::Audio) {
				t.mode = modes.iter()
					.find_map(|(s, m)| if *s == t.session { Some(*m) } else { None })
					.unwrap_or_default();
			}

			let end = next.or_else(||
				leadouts.iter()
					.find_map(|(s, l)| if *s == t.session { Some(*l) } else { None })
			)
				.ok_or(CdRipError::Toc)?;
			if end <= t.first_sector { return Err(CdRipError::Toc); }
			t.last_sector = end - 1;
		}

		leadouts.sort_unstable();
		Ok(Self { tracks, leadouts })
	}
}

impl Toc {
	#[must_use]
	/// # Tracks.
	pub fn tracks(&self) -> &[Track] { &self.tracks }

	/// # Tracks (Mutable).
	pub(crate) fn tracks_mut(&mut self) -> &mut [Track] { &mut self.tracks }

	/// # Audio Tracks.
	pub fn audio_tracks(&self) -> impl Iterator<Item=&Track> {
		self.tracks.iter().filter(|t| t.is_audio())
	}

	#[must_use]
	/// # Track.
	///
	/// Return the track with this number, whatever its format.
	pub fn track(&self, number: u8) -> Option<&Track> {
		self.tracks.iter().find(|t| t.number == number)
	}

	#[must_use]
	/// # Audio Track.
	pub fn audio_track(&self, number: u8) -> Option<&Track> {
		self.audio_tracks().find(|t| t.number == number)
	}

	#[must_use]
	/// # Is Empty?
	pub fn is_empty(&self) -> bool { self.tracks.is_empty() }

	#[must_use]
	/// # First Sector.
	pub fn first_sector(&self) -> u32 {
		self.tracks.first().map_or(0, |t| t.first_sector)
	}

	#[must_use]
	/// # Last Sector.
	pub fn last_sector(&self) -> u32 { self.leadout().saturating_sub(1) }

	#[must_use]
	/// # Lead-out.
	///
	/// This is the final session's lead-out.
	pub fn leadout(&self) -> u32 {
		self.leadouts.last().map_or_else(
			|| self.tracks.last().map_or(0, |t| t.last_sector + 1),
			|(_, l)| *l,
		)
	}

	#[must_use]
	/// # Audio Lead-out.
	///
	/// The sector following the last audio track.
	pub fn audio_leadout(&self) -> u32 {
		self.audio_tracks().last().map_or(0, |t| t.last_sector + 1)
	}

	#[must_use]
	/// # Sector Count (Audio Tracks).
	pub fn sector_count_audio_tracks(&self) -> u32 {
		self.audio_tracks().map(Track::sectors).sum()
	}

	#[must_use]
	/// # HTOA Range.
	///
	/// A hidden track one audio exists when the first track starts more than
	/// one sector past the lead-in. It is derived, never stored, and returned
	/// as an inclusive `(first, last)` sector pair.
	pub fn htoa(&self) -> Option<(u32, u32)> {
		let first = self.tracks.first()?;
		if first.is_audio() && 1 < first.first_sector {
			Some((0, first.first_sector - 1))
		}
		else { None }
	}

	#[must_use]
	/// # First Audio Track?
	pub fn is_first_audio(&self, number: u8) -> bool {
		self.audio_tracks().next().is_some_and(|t| t.number == number)
	}

	#[must_use]
	/// # Last Audio Track?
	pub fn is_last_audio(&self, number: u8) -> bool {
		self.audio_tracks().last().is_some_and(|t| t.number == number)
	}

	#[must_use]
	/// # Disc Signature.
	pub fn signature(&self) -> DiscSignature { DiscSignature::from(self) }
}



#[derive(Debug, Clone, Eq, Hash, PartialEq)]
/// # Disc Signature.
///
/// The ordered track start sectors (with an audio flag) and lead-outs used
/// to identify a disc.
pub struct DiscSignature {
	starts: Vec<(u32, bool)>,
	leadout: u32,
	audio_leadout: u32,
}

impl From<&Toc> for DiscSignature {
	fn from(toc: &Toc) -> Self {
		Self {
			starts: toc.tracks.iter().map(|t| (t.first_sector, t.is_audio())).collect(),
			leadout: toc.leadout(),
			audio_leadout: toc.audio_leadout(),
		}
	}
}

impl DiscSignature {
	/// # Audio Starts.
	pub fn audio_starts(&self) -> impl Iterator<Item=u32> + '_ {
		self.starts.iter().filter_map(|(s, a)| if *a { Some(*s) } else { None })
	}

	#[must_use]
	/// # Audio Track Count.
	pub fn audio_len(&self) -> usize { self.audio_starts().count() }

	#[must_use]
	/// # Lead-out.
	pub const fn leadout(&self) -> u32 { self.leadout }

	#[must_use]
	/// # Audio Lead-out.
	pub const fn audio_leadout(&self) -> u32 { self.audio_leadout }

	#[must_use]
	/// # CDDB ID.
	///
	/// The classic FreeDB disc ID, computed over all tracks using
	/// lead-in-inclusive seconds.
	pub fn cddb_id(&self) -> u32 {
		let leadin = u32::from(CD_LEADIN);
		let mut n = 0_u32;
		for (start, _) in &self.starts {
			let mut secs = (start + leadin) / FRAMES_PER_SECOND;
			while 0 < secs {
				n += secs % 10;
				secs /= 10;
			}
		}

		let first = self.starts.first().map_or(0, |(s, _)| *s);
		let t = (self.leadout + leadin) / FRAMES_PER_SECOND - (first + leadin) / FRAMES_PER_SECOND;
		let len = u32::try_from(self.starts.len()).unwrap_or(0) & 0xFF;

		((n % 255) << 24) | (t << 8) | len
	}

	/// # CDTOC Equivalent.
	///
	/// ## Errors
	///
	/// Returns an error if the layout is not something `cdtoc` understands,
	/// e.g. a data track at the start of the disc.
	pub fn cdtoc(&self) -> Result<cdtoc::Toc, CdRipError> {
		let leadin = u32::from(CD_LEADIN);
		let audio: Vec<u32> = self.audio_starts().map(|s| s + leadin).collect();
		let data = self.starts.iter()
			.find_map(|(s, a)| if *a { None } else { Some(s + leadin) });
		cdtoc::Toc::from_parts(audio, data, self.leadout + leadin)
			.map_err(|_| CdRipError::Toc)
	}

	#[must_use]
	/// # MusicBrainz ID.
	pub fn musicbrainz_id(&self) -> Option<String> {
		self.cdtoc().ok().map(|t| t.musicbrainz_id().to_string())
	}
}



/// # Read TOC.
///
/// Issue a raw READ TOC and parse the result.
///
/// ## Errors
///
/// Returns an error if the command fails, the reply is malformed, or the
/// operation is cancelled.
pub fn read_toc(dev: &mut dyn Transport, killed: &KillSwitch) -> Result<Toc, CdRipError> {
	if killed.killed() { return Err(CdRipError::Killed); }
	let raw = send_negotiated(dev, Cdb::read_toc_raw, DESCRIPTOR_SIZE)?;
	if killed.killed() { return Err(CdRipError::Killed); }
	Toc::from_raw(&raw)
}

#[must_use]
/// # MSF to Frames.
pub const fn msf_to_frames(m: u8, s: u8, f: u8) -> u32 {
	(m as u32 * 60 + s as u32) * FRAMES_PER_SECOND + f as u32
}

#[must_use]
#[allow(clippy::cast_possible_truncation)]
/// # Frames to MSF.
///
/// Minutes saturate at `255`.
pub const fn frames_to_msf(frames: u32) -> (u8, u8, u8) {
	let f = (frames % FRAMES_PER_SECOND) as u8;
	let secs = frames / FRAMES_PER_SECOND;
	let s = (secs % 60) as u8;
	let m = secs / 60;
	let m = if m > 255 { 255 } else { m as u8 };
	(m, s, f)
}

#[must_use]
/// # Frames to MSF String.
///
/// Format like `mm:ss:ff`.
pub fn frames_to_msf_string(frames: u32) -> String {
	let (m, s, f) = frames_to_msf(frames);
	format!("{m:02}:{s:02}:{f:02}")
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::scsi::mock::{
		MockDevice,
		raw_toc,
	};

	/// # Descriptor Helper.
	fn desc(session: u8, ctrl: u8, point: u8, p: (u8, u8, u8)) -> [u8; 11] {
		[session, 0x10 | ctrl, 0, point, 0, 0, 0, 0, p.0, p.1, p.2]
	}

	#[test]
	fn t_msf() {
		for m in [0_u8, 1, 42, 79] {
			for s in 0..60_u8 {
				for f in 0..75_u8 {
					let frames = msf_to_frames(m, s, f);
					assert_eq!(frames_to_msf(frames), (m, s, f));
					assert_eq!(frames_to_msf_string(frames), format!("{m:02}:{s:02}:{f:02}"));
				}
			}
		}
		assert_eq!(msf_to_frames(0, 2, 0), 150);
	}

	#[test]
	fn t_parse_simple() {
		let raw = raw_toc(&[0, 11413, 25024, 45713], 55220);
		let toc = Toc::from_raw(&raw).expect("TOC failed.");
		assert_eq!(toc.tracks().len(), 4);
		assert_eq!(toc.leadout(), 55220);
		assert_eq!(toc.htoa(), None);

		let t = toc.tracks();
		assert_eq!((t[0].number(), t[0].first_sector(), t[0].last_sector()), (1, 0, 11412));
		assert_eq!((t[3].number(), t[3].first_sector(), t[3].last_sector()), (4, 45713, 55219));
		assert!(t.iter().all(Track::is_audio));

		// Contiguity.
		for pair in t.windows(2) {
			assert_eq!(pair[0].last_sector() + 1, pair[1].first_sector());
		}
		let total: u32 = toc.audio_tracks()
			.map(|t| t.last_sector() - t.first_sector() + 1)
			.sum();
		assert_eq!(total, toc.sector_count_audio_tracks());
		assert_eq!(total, 55220);
	}

	#[test]
	fn t_parse_enhanced() {
		// Two audio tracks in session one, a Mode 2 data track in session two,
		// shuffled to make sure order doesn't matter.
		let mut raw = vec![0_u8, 0, 1, 2];
		for d in [
			desc(2, 0b0100, 3, msf(20_000 + 150)),
			desc(1, 0, 0xA0, (1, 0, 0)),
			desc(1, 0, 1, msf(150)),
			desc(1, 0b0011, 2, msf(5_000 + 150)),
			desc(1, 0, 0xA1, (2, 0, 0)),
			desc(1, 0, 0xA2, msf(8_600 + 150)),
			desc(2, 0b0100, 0xA0, (3, 0x20, 0)),
			desc(2, 0b0100, 0xA1, (3, 0, 0)),
			desc(2, 0b0100, 0xA2, msf(30_000 + 150)),
		] { raw.extend_from_slice(&d); }
		let len = u16::try_from(raw.len() - 2).unwrap();
		raw[..2].copy_from_slice(&len.to_be_bytes());

		let toc = Toc::from_raw(&raw).expect("TOC failed.");
		let t = toc.tracks();
		assert_eq!(t.len(), 3);
		assert_eq!((t[0].first_sector(), t[0].last_sector()), (0, 4_999));
		assert_eq!((t[1].first_sector(), t[1].last_sector()), (5_000, 8_599));
		assert!(t[1].copy_permitted());
		assert!(t[1].pre_emphasis());
		assert_eq!(t[2].number(), 3);
		assert_eq!(t[2].session(), 2);
		assert_eq!(t[2].format(), TrackFormat::Data);
		assert_eq!(t[2].mode(), DataMode::Mode2);
		assert_eq!(t[2].last_sector(), 29_999);
		assert_eq!(toc.leadout(), 30_000);
		assert_eq!(toc.audio_leadout(), 8_600);
		assert_eq!(toc.sector_count_audio_tracks(), 8_600);
		assert!(toc.is_last_audio(2));
		assert!(toc.is_first_audio(1));
	}

	#[test]
	fn t_htoa() {
		let toc = Toc::from_raw(&raw_toc(&[1, 500], 1000)).expect("TOC failed.");
		assert_eq!(toc.htoa(), None, "One sector isn't enough.");

		let toc = Toc::from_raw(&raw_toc(&[2, 500], 1000)).expect("TOC failed.");
		assert_eq!(toc.htoa(), Some((0, 1)));
	}

	#[test]
	fn t_parse_bad() {
		assert_eq!(Toc::from_raw(&[0, 2]), Err(CdRipError::Toc));
		assert_eq!(Toc::from_raw(&[0, 5, 0, 0, 1, 2, 3]), Err(CdRipError::Toc));

		// A track without a lead-out can't be closed.
		let mut raw = vec![0_u8, 13, 1, 1];
		raw.extend_from_slice(&desc(1, 0, 1, msf(150)));
		assert_eq!(Toc::from_raw(&raw), Err(CdRipError::Toc));

		// No tracks at all is fine.
		let toc = Toc::from_raw(&[0, 2, 1, 1]).expect("Empty TOC failed.");
		assert!(toc.is_empty());
	}

	#[test]
	fn t_signature() {
		let toc = Toc::from_raw(&raw_toc(&[0, 11413, 25024, 45713], 55220))
			.expect("TOC failed.");
		let sig = toc.signature();
		assert_eq!(sig.cddb_id(), 0x1f02_e004);
		assert_eq!(sig.audio_len(), 4);

		// Cross-check with cdtoc.
		let other = cdtoc::Toc::from_cdtoc("4+96+2D2B+6256+B327+D84A").expect("CDTOC failed.");
		assert_eq!(sig.cdtoc().expect("CDTOC failed."), other);
		assert_eq!(format!("{:08x}", sig.cddb_id()), other.cddb_id().to_string());
		assert_eq!(sig.musicbrainz_id(), Some(other.musicbrainz_id().to_string()));
	}

	#[test]
	fn t_read_toc() {
		let raw = raw_toc(&[0, 1000], 2000);
		let mut dev = MockDevice::default().with_toc(raw);
		let toc = read_toc(&mut dev, &KillSwitch::new()).expect("Read failed.");
		assert_eq!(toc.tracks().len(), 2);

		// Errors pass through.
		let mut dev = MockDevice::default();
		assert!(matches!(read_toc(&mut dev, &KillSwitch::new()), Err(CdRipError::Scsi(_))));

		// As do kills.
		let killed = KillSwitch::new();
		killed.kill();
		assert_eq!(read_toc(&mut dev, &killed), Err(CdRipError::Killed));
	}

	/// # MSF Helper.
	fn msf(frames: u32) -> (u8, u8, u8) { frames_to_msf(frames) }
}
