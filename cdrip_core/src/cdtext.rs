/*!
# CD Rip: CD-Text
*/

use crate::{
	CdRipError,
	KillSwitch,
	Log,
	scsi::{
		Cdb,
		send_negotiated,
		Transport,
	},
};
use std::{
	cmp::Ordering,
	collections::BTreeMap,
	fmt,
};
use trimothy::TrimSlice;



/// # Pack Size.
const PACK_SIZE: usize = 18;

/// # Pack Type: Genre.
const PACK_GENRE: u8 = 0x87;

/// # Pack Type: Size Info.
const PACK_SIZE_INFO: u8 = 0x8F;

/// # Same As Previous Track.
const TAB: &[u8] = b"\t";



/// # Helper: CDText Fields.
macro_rules! fields {
	( $( $k:ident $v:literal $vstr:literal ),+ $(,)? ) => (
		#[repr(u8)]
		#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
		/// # CDText Field.
		///
		/// The text pack types, keyed by their pack ID.
		pub enum CDTextKind {
			$(
				#[doc = concat!("# ", stringify!($k), ".")]
				$k = $v,
			)+
		}

		impl CDTextKind {
			#[must_use]
			/// # As Str.
			///
			/// Return the field as an uppercase string, similar to how it would
			/// appear in track metadata.
			pub const fn as_str(self) -> &'static str {
				match self {
					$( Self::$k => $vstr, )+
				}
			}

			#[must_use]
			/// # From Pack ID.
			pub const fn from_pack(id: u8) -> Option<Self> {
				match id {
					$( $v => Some(Self::$k), )+
					_ => None,
				}
			}
		}
	);
}

fields! {
	Title      0x80 "TITLE",
	Performer  0x81 "ARTIST",
	Songwriter 0x82 "SONGWRITER",
	Composer   0x83 "COMPOSER",
	Arranger   0x84 "ARRANGER",
	Message    0x85 "COMMENT",
	DiscId     0x86 "DISC_ID",
	UpcIsrc    0x8E "UPC_ISRC",
}

impl AsRef<str> for CDTextKind {
	#[inline]
	fn as_ref(&self) -> &str { self.as_str() }
}

impl fmt::Display for CDTextKind {
	#[inline]
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		<str as fmt::Display>::fmt(self.as_str(), f)
	}
}

impl Ord for CDTextKind {
	#[inline]
	fn cmp(&self, rhs: &Self) -> Ordering { (*self as u8).cmp(&(*rhs as u8)) }
}

impl PartialOrd for CDTextKind {
	#[inline]
	fn partial_cmp(&self, rhs: &Self) -> Option<Ordering> { Some(self.cmp(rhs)) }
}



/// # Helper: Genres.
macro_rules! genres {
	( $( $k:ident $v:literal $vstr:literal ),+ $(,)? ) => (
		#[repr(u16)]
		#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
		/// # CD-Text Genre Code.
		pub enum CDTextGenre {
			$(
				#[doc = concat!("# ", $vstr, ".")]
				$k = $v,
			)+
		}

		impl CDTextGenre {
			#[must_use]
			/// # From Code.
			///
			/// Unknown codes are treated as [`CDTextGenre::NotDefined`].
			pub const fn from_code(code: u16) -> Self {
				match code {
					$( $v => Self::$k, )+
					_ => Self::NotDefined,
				}
			}

			#[must_use]
			/// # As Str.
			pub const fn as_str(self) -> &'static str {
				match self {
					$( Self::$k => $vstr, )+
				}
			}
		}
	);
}

genres! {
	NotUsed              0 "Not Used",
	NotDefined           1 "Not Defined",
	AdultContemporary    2 "Adult Contemporary",
	AlternativeRock      3 "Alternative Rock",
	Childrens            4 "Childrens Music",
	Classical            5 "Classical",
	ContemporaryChristian 6 "Contemporary Christian",
	Country              7 "Country",
	Dance                8 "Dance",
	EasyListening        9 "Easy Listening",
	Erotic              10 "Erotic",
	Folk                11 "Folk",
	Gospel              12 "Gospel",
	HipHop              13 "Hip Hop",
	Jazz                14 "Jazz",
	Latin               15 "Latin",
	Musical             16 "Musical",
	NewAge              17 "New Age",
	Opera               18 "Opera",
	Operetta            19 "Operetta",
	Pop                 20 "Pop Music",
	Rap                 21 "Rap",
	Reggae              22 "Reggae",
	Rock                23 "Rock Music",
	RhythmAndBlues      24 "Rhythm & Blues",
	SoundEffects        25 "Sound Effects",
	SpokenWord          26 "Spoken Word",
	World               27 "World Music",
}

impl fmt::Display for CDTextGenre {
	#[inline]
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		<str as fmt::Display>::fmt(self.as_str(), f)
	}
}



#[derive(Debug, Clone, Default, Eq, PartialEq)]
/// # CD-Text.
///
/// Decoded block-zero text, keyed by track number (`0` is the disc itself)
/// and field.
pub struct CdText {
	fields: BTreeMap<(u8, CDTextKind), String>,
	genre: Option<(CDTextGenre, String)>,
}

impl CdText {
	/// # From Raw Reply.
	///
	/// Decode a READ TOC format `0101b` reply: a four-byte header followed
	/// by eighteen-byte packs. CRC mismatches are logged as warnings but
	/// otherwise ignored.
	///
	/// ## Errors
	///
	/// Returns an error if the reply is not `4 + 18k` bytes or any pack uses
	/// double-byte characters.
	pub fn from_raw(raw: &[u8], log: &mut Log) -> Result<Self, CdRipError> {
		if raw.len() < 4 || 0 != (raw.len() - 4) % PACK_SIZE {
			return Err(CdRipError::CdText);
		}

		let mut out = Self::default();
		let mut text: BTreeMap<CDTextKind, (u8, Vec<u8>)> = BTreeMap::new();
		let mut genre: Vec<u8> = Vec::new();

		for pack in raw[4..].chunks_exact(PACK_SIZE) {
			let id = pack[0];
			let track = pack[1] & 0x7F;
			let extension = 0 != pack[1] & 0x80;
			let dbcc = 0 != pack[3] & 0x80;
			let block = (pack[3] >> 4) & 0b0111;
			let data = &pack[4..16];

			if ! pack_crc_ok(pack) {
				log.warning(None, None, format!("CD-Text CRC mismatch (pack #{}).", pack[2]));
			}

			if dbcc { return Err(CdRipError::CdTextDbcs); }
			if block != 0 || extension { continue; }

			if id == PACK_GENRE {
				genre.extend_from_slice(data);
				continue;
			}
			if id == PACK_SIZE_INFO { continue; }
			let Some(kind) = CDTextKind::from_pack(id) else { continue; };

			// The declared track only matters when starting a fresh value;
			// otherwise the running counter continues from the last pack.
			let (pos, buf) = text.entry(kind).or_insert_with(|| (track, Vec::new()));
			if buf.is_empty() { *pos = track; }

			for &b in data {
				if b == 0 {
					if ! buf.is_empty() {
						out.commit(*pos, kind, buf);
						buf.clear();
					}
					*pos = pos.saturating_add(1);
				}
				else { buf.push(b); }
			}
		}

		// Leftovers without a terminating nul.
		for (kind, (pos, buf)) in text {
			if ! buf.is_empty() { out.commit(pos, kind, &buf); }
		}

		// Genre: a big-endian code followed by nul-terminated text.
		if 2 <= genre.len() {
			let code = CDTextGenre::from_code(u16::from_be_bytes([genre[0], genre[1]]));
			let rest = &genre[2..];
			let rest = rest.iter().position(|b| 0 == *b).map_or(rest, |end| &rest[..end]);
			let rest = String::from_utf8_lossy(rest.trim()).into_owned();
			if ! matches!(code, CDTextGenre::NotUsed) || ! rest.is_empty() {
				out.genre = Some((code, rest));
			}
		}

		Ok(out)
	}

	/// # Commit Value.
	fn commit(&mut self, track: u8, kind: CDTextKind, raw: &[u8]) {
		// Tab means "same as the last one".
		let value =
			if raw == TAB {
				let Some(prev) = track.checked_sub(1)
					.and_then(|t| self.fields.get(&(t, kind)))
					else { return; };
				prev.clone()
			}
			else {
				let v = raw.trim();
				if v.is_empty() { return; }
				v.iter().map(|&b| char::from(b)).collect::<String>()
			};

		self.fields.insert((track, kind), value);
	}
}

impl CdText {
	#[must_use]
	/// # Get Field.
	///
	/// Track `0` holds the disc-level values.
	pub fn get(&self, track: u8, kind: CDTextKind) -> Option<&str> {
		self.fields.get(&(track, kind)).map(String::as_str)
	}

	/// # Iterate Fields.
	pub fn iter(&self) -> impl Iterator<Item=(u8, CDTextKind, &str)> {
		self.fields.iter().map(|((t, k), v)| (*t, *k, v.as_str()))
	}

	#[must_use]
	/// # Is Empty?
	pub fn is_empty(&self) -> bool { self.fields.is_empty() && self.genre.is_none() }

	#[must_use]
	/// # Genre.
	pub fn genre(&self) -> Option<(CDTextGenre, &str)> {
		self.genre.as_ref().map(|(g, s)| (*g, s.as_str()))
	}

	#[must_use]
	/// # Genre (Formatted).
	///
	/// The genre name, with any free-text suffix in parentheses.
	pub fn genre_string(&self) -> Option<String> {
		let (code, text) = self.genre()?;
		if text.is_empty() { Some(code.as_str().to_owned()) }
		else if matches!(code, CDTextGenre::NotUsed | CDTextGenre::NotDefined) {
			Some(text.to_owned())
		}
		else { Some(format!("{code} ({text})")) }
	}

	#[must_use]
	/// # Various Artists?
	///
	/// True if any track performer differs from the disc performer (or
	/// from each other, if there is no disc performer).
	pub fn various_artists(&self) -> bool {
		let disc = self.get(0, CDTextKind::Performer);
		let mut seen: Option<&str> = None;
		for (t, k, v) in self.iter() {
			if t == 0 || k != CDTextKind::Performer { continue; }
			if let Some(d) = disc {
				if d != v { return true; }
			}
			match seen {
				Some(s) if s != v => return true,
				None => { seen = Some(v); },
				_ => {},
			}
		}
		false
	}

	#[must_use]
	/// # Multi-Disc?
	///
	/// True if the album title carries a disc-number marker like "Disc 2" or
	/// "CD1".
	pub fn multi_disc(&self) -> bool {
		self.get(0, CDTextKind::Title).is_some_and(has_disc_marker)
	}
}



/// # Read CD-Text.
///
/// ## Errors
///
/// Returns an error if the command fails, the reply is malformed, or the
/// operation is cancelled.
pub(crate) fn read_cdtext(dev: &mut dyn Transport, log: &mut Log, killed: &KillSwitch)
-> Result<CdText, CdRipError> {
	if killed.killed() { return Err(CdRipError::Killed); }
	let raw = send_negotiated(dev, Cdb::read_cdtext, PACK_SIZE)?;
	if killed.killed() { return Err(CdRipError::Killed); }
	CdText::from_raw(&raw, log)
}

/// # CRC-16/CCITT.
///
/// Polynomial `0x1021`, MSB-first, zero initial value.
pub(crate) fn crc16(src: &[u8]) -> u16 {
	let mut crc = 0_u16;
	for &b in src {
		crc ^= u16::from(b) << 8;
		for _ in 0..8 {
			crc =
				if 0 == crc & 0x8000 { crc << 1 }
				else { (crc << 1) ^ 0x1021 };
		}
	}
	crc
}

/// # Pack CRC OK?
///
/// The trailing two bytes hold the inverted big-endian CRC of the first
/// sixteen.
fn pack_crc_ok(pack: &[u8]) -> bool {
	PACK_SIZE == pack.len() &&
	! crc16(&pack[..16]) == u16::from_be_bytes([pack[16], pack[17]])
}

/// # Disc Marker?
fn has_disc_marker(title: &str) -> bool {
	let title = title.to_ascii_lowercase();
	for needle in ["disc", "disk", "cd"] {
		for (idx, _) in title.match_indices(needle) {
			// Must start a word.
			if idx != 0 && title.as_bytes()[idx - 1].is_ascii_alphanumeric() { continue; }
			let rest = title[idx + needle.len()..].trim_start_matches(&[' ', '.', '#'][..]);
			if rest.starts_with(|c: char| c.is_ascii_digit()) { return true; }
		}
	}
	false
}



#[cfg(test)]
pub(crate) mod test {
	use super::*;
	use crate::scsi::mock::MockDevice;

	/// # Build a Pack.
	pub(crate) fn pack(id: u8, track: u8, seq: u8, data: &[u8]) -> [u8; PACK_SIZE] {
		let mut out = [0_u8; PACK_SIZE];
		out[0] = id;
		out[1] = track;
		out[2] = seq;
		out[4..4 + data.len()].copy_from_slice(data);
		let crc = ! crc16(&out[..16]);
		out[16..].copy_from_slice(&crc.to_be_bytes());
		out
	}

	/// # Build a Reply.
	pub(crate) fn reply(packs: &[[u8; PACK_SIZE]]) -> Vec<u8> {
		let mut out = vec![0_u8; 4];
		for p in packs { out.extend_from_slice(p); }
		let len = u16::try_from(out.len() - 2).unwrap();
		out[..2].copy_from_slice(&len.to_be_bytes());
		out
	}

	#[test]
	fn t_crc16() {
		// CRC-16/XMODEM check value.
		assert_eq!(crc16(b"123456789"), 0x31C3);
		assert!(pack_crc_ok(&pack(0x80, 0, 0, b"Hello")));

		let mut bad = pack(0x80, 0, 0, b"Hello");
		bad[5] = b'E';
		assert!(! pack_crc_ok(&bad));
	}

	#[test]
	fn t_hello_world() {
		let mut log = Log::default();
		let raw = reply(&[pack(0x80, 1, 0, b"Hello\0World\0")]);
		let text = CdText::from_raw(&raw, &mut log).expect("CD-Text failed.");
		assert_eq!(text.get(1, CDTextKind::Title), Some("Hello"));
		assert_eq!(text.get(2, CDTextKind::Title), Some("World"));
		assert!(log.is_empty(), "The CRC should have been fine.");
	}

	#[test]
	fn t_spanning() {
		let mut log = Log::default();
		let raw = reply(&[
			pack(0x80, 0, 0, b"An Album Nam"),
			pack(0x80, 0, 1, b"e\0First Song"),
			pack(0x80, 1, 2, b"\0\t\0\0\0\0\0\0\0\0\0\0"),
			pack(0x81, 0, 3, b"Somebody\0\0\0\0"),
			pack(0x81, 2, 4, b"Somebody Els"),
			pack(0x81, 2, 5, b"e\0\0\0\0\0\0\0\0\0\0\0"),
		]);
		let text = CdText::from_raw(&raw, &mut log).expect("CD-Text failed.");
		assert_eq!(text.get(0, CDTextKind::Title), Some("An Album Name"));
		assert_eq!(text.get(1, CDTextKind::Title), Some("First Song"));
		assert_eq!(text.get(2, CDTextKind::Title), Some("First Song"), "Tab should copy.");
		assert_eq!(text.get(0, CDTextKind::Performer), Some("Somebody"));
		assert_eq!(text.get(2, CDTextKind::Performer), Some("Somebody Else"));
		assert!(text.various_artists());
		assert!(! text.multi_disc());
	}

	#[test]
	fn t_genre() {
		let mut log = Log::default();
		let mut data = [0_u8; 12];
		data[..2].copy_from_slice(&14_u16.to_be_bytes());
		data[2..10].copy_from_slice(b"Bebop\0\0\0");
		let raw = reply(&[pack(0x87, 0, 0, &data)]);
		let text = CdText::from_raw(&raw, &mut log).expect("CD-Text failed.");
		assert_eq!(text.genre(), Some((CDTextGenre::Jazz, "Bebop")));
		assert_eq!(text.genre_string().as_deref(), Some("Jazz (Bebop)"));
	}

	#[test]
	fn t_skips_and_failures() {
		let mut log = Log::default();

		// Bad length.
		assert_eq!(CdText::from_raw(&[0, 0, 0, 0, 1], &mut log), Err(CdRipError::CdText));

		// DBCS.
		let mut p = pack(0x80, 0, 0, b"X");
		p[3] = 0x80;
		assert_eq!(CdText::from_raw(&reply(&[p]), &mut log), Err(CdRipError::CdTextDbcs));

		// Block one is ignored, and a bad CRC is only a warning.
		let mut log = Log::default();
		let mut p1 = pack(0x80, 0, 0, b"Ignored\0");
		p1[3] = 0x10;
		let mut p2 = pack(0x80, 0, 1, b"Kept\0");
		p2[16] ^= 0xFF;
		let text = CdText::from_raw(&reply(&[p1, p2]), &mut log).expect("CD-Text failed.");
		assert_eq!(text.get(0, CDTextKind::Title), Some("Kept"));
		assert_eq!(log.len(), 2, "Both CRCs should have been flagged.");
	}

	#[test]
	fn t_disc_marker() {
		for v in ["Greatest Hits (Disc 2)", "Live CD1", "disk #3", "Foo [cd 2]"] {
			assert!(has_disc_marker(v), "{v}");
		}
		for v in ["Discotheque", "ABCD 1", "Discipline", "CDs"] {
			assert!(! has_disc_marker(v), "{v}");
		}
	}

	#[test]
	fn t_read_cdtext() {
		let raw = reply(&[pack(0x80, 1, 0, b"Hello\0World\0")]);
		let mut dev = MockDevice::default().with_cdtext(raw);
		let mut log = Log::default();
		let text = read_cdtext(&mut dev, &mut log, &KillSwitch::new())
			.expect("Read failed.");
		assert_eq!(text.get(2, CDTextKind::Title), Some("World"));
		assert_eq!(dev.alloc_log(), &[4, 4 + PACK_SIZE]);
	}
}
