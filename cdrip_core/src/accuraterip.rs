/*!
# CD Rip: AccurateRip
*/

use crate::{
	Cache,
	CdRipError,
	DiscSignature,
};
use std::{
	fmt,
	io::Read,
	sync::OnceLock,
	time::Duration,
};
use ureq::{
	Agent,
	AgentBuilder,
};



/// # Connection Agent.
static AGENT: OnceLock<Agent> = OnceLock::new();

/// # Record Header Size.
///
/// Track count + three disc IDs.
const HEADER_SIZE: usize = 13;

/// # Record Track Size.
///
/// Confidence + checksum + sector 450 checksum.
const TRACK_SIZE: usize = 9;



#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
/// # AccurateRip Disc ID.
///
/// This is derived from the audio track offsets and lead-out, plus the
/// classic CDDB ID, and is used to locate the disc's checksums in the
/// AccurateRip database.
pub struct AccurateRipId {
	tracks: u8,
	id1: u32,
	id2: u32,
	cddb: u32,
}

impl fmt::Display for AccurateRipId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:03}-{:08x}-{:08x}-{:08x}", self.tracks, self.id1, self.id2, self.cddb)
	}
}

impl From<&DiscSignature> for AccurateRipId {
	fn from(sig: &DiscSignature) -> Self {
		let mut id1 = 0_u32;
		let mut id2 = 0_u32;
		let mut idx = 0_u32;
		for start in sig.audio_starts() {
			idx += 1;
			id1 = id1.wrapping_add(start);
			id2 = id2.wrapping_add(start.max(1).wrapping_mul(idx));
		}

		let leadout = sig.audio_leadout();
		id1 = id1.wrapping_add(leadout);
		id2 = id2.wrapping_add(leadout.wrapping_mul(idx + 1));

		Self {
			tracks: u8::try_from(idx).unwrap_or(u8::MAX),
			id1,
			id2,
			cddb: sig.cddb_id(),
		}
	}
}

impl AccurateRipId {
	#[must_use]
	/// # Audio Track Count.
	pub const fn tracks(&self) -> u8 { self.tracks }

	#[must_use]
	/// # Disc ID #1.
	pub const fn id1(&self) -> u32 { self.id1 }

	#[must_use]
	/// # Disc ID #2.
	pub const fn id2(&self) -> u32 { self.id2 }

	#[must_use]
	/// # CDDB ID.
	pub const fn cddb_id(&self) -> u32 { self.cddb }

	#[must_use]
	/// # Cache File Name.
	pub fn cache_name(&self) -> String { format!("dBAR-{self}.bin") }

	#[must_use]
	/// # Checksum URL.
	///
	/// The database is sharded by the last three hex digits of the first ID,
	/// in reverse order.
	pub fn url(&self) -> String {
		format!(
			"http://www.accuraterip.com/accuraterip/{:x}/{:x}/{:x}/dBAR-{self}.bin",
			self.id1 & 0xF,
			(self.id1 >> 4) & 0xF,
			(self.id1 >> 8) & 0xF,
		)
	}
}



#[derive(Debug, Clone, Copy, Default, Eq, Hash, PartialEq)]
/// # AccurateRip Track.
///
/// One pressing's checksum details for a single track.
pub struct ArTrack {
	confidence: u8,
	crc: u32,
	crc450: u32,
}

impl ArTrack {
	#[must_use]
	/// # Confidence.
	pub const fn confidence(&self) -> u8 { self.confidence }

	#[must_use]
	/// # Checksum.
	///
	/// Depending on the age of the submission, this may be a v1 or v2
	/// checksum.
	pub const fn crc(&self) -> u32 { self.crc }

	#[must_use]
	/// # Sector 450 Checksum.
	pub const fn crc450(&self) -> u32 { self.crc450 }
}



#[derive(Debug, Clone, Default, Eq, Hash, PartialEq)]
/// # AccurateRip Record.
///
/// The per-track checksums for one pressing.
pub struct ArRecord {
	tracks: Vec<ArTrack>,
}

impl ArRecord {
	#[must_use]
	/// # Tracks.
	pub fn tracks(&self) -> &[ArTrack] { &self.tracks }

	#[must_use]
	/// # Track.
	///
	/// Tracks are numbered from one.
	pub fn track(&self, number: u8) -> Option<&ArTrack> {
		usize::from(number).checked_sub(1).and_then(|idx| self.tracks.get(idx))
	}
}



#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
/// # AccurateRip Match.
pub enum ArMatch {
	/// # Matched v1.
	V1 {
		/// # Confidence.
		confidence: u8,
	},

	/// # Matched v2.
	V2 {
		/// # Confidence.
		confidence: u8,
	},

	/// # No Match.
	None,
}

impl fmt::Display for ArMatch {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::V1 { confidence } => write!(f, "accurate (v1, confidence {confidence})"),
			Self::V2 { confidence } => write!(f, "accurate (v2, confidence {confidence})"),
			Self::None => f.write_str("not verified"),
		}
	}
}

impl ArMatch {
	#[must_use]
	/// # Is Match?
	pub const fn is_match(self) -> bool { ! matches!(self, Self::None) }

	#[must_use]
	/// # Confidence.
	pub const fn confidence(self) -> u8 {
		match self {
			Self::V1 { confidence } | Self::V2 { confidence } => confidence,
			Self::None => 0,
		}
	}
}



#[derive(Debug, Clone, Default, Eq, PartialEq)]
/// # AccurateRip Checksums.
///
/// All of the competing pressings' checksums for a disc.
pub struct AccurateRip {
	records: Vec<ArRecord>,
}

impl AccurateRip {
	/// # Parse.
	///
	/// Parse a raw database reply for a disc with `tracks` audio tracks.
	///
	/// The reply is one or more back-to-back records, each holding a track
	/// count, three disc IDs, then a confidence, checksum, and sector 450
	/// checksum for each track, all little endian.
	///
	/// ## Errors
	///
	/// Returns an error if the reply is empty, is not an exact multiple of
	/// the record size, or contains a record for a different number of
	/// tracks.
	pub fn parse(raw: &[u8], tracks: u8) -> Result<Self, CdRipError> {
		let size = HEADER_SIZE + TRACK_SIZE * usize::from(tracks);
		if tracks == 0 || raw.is_empty() || 0 != raw.len() % size {
			return Err(CdRipError::ArParse);
		}

		let records = raw.chunks_exact(size)
			.map(|chunk| {
				if chunk[0] != tracks { return Err(CdRipError::ArParse); }
				let tracks = chunk[HEADER_SIZE..].chunks_exact(TRACK_SIZE)
					.map(|t| ArTrack {
						confidence: t[0],
						crc: u32::from_le_bytes([t[1], t[2], t[3], t[4]]),
						crc450: u32::from_le_bytes([t[5], t[6], t[7], t[8]]),
					})
					.collect();
				Ok(ArRecord { tracks })
			})
			.collect::<Result<Vec<_>, _>>()?;

		Ok(Self { records })
	}

	/// # Lookup.
	///
	/// Return the checksums for a disc, checking the cache first and falling
	/// back to the network. Downloaded replies are saved to the cache, if
	/// any, before being parsed.
	///
	/// Discs the database doesn't know are cached too, as empty files, so
	/// a cached miss stays a miss without another round trip. Delete the
	/// file to try again.
	///
	/// ## Errors
	///
	/// Returns an error if the disc is not in the database, the download
	/// fails, or the reply cannot be parsed.
	pub fn lookup(id: &AccurateRipId, cache: Option<&Cache>) -> Result<Self, CdRipError> {
		let name = id.cache_name();
		if let Some(cache) = cache {
			if let Some(raw) = cache.read(&name) {
				return Self::parse(&raw, id.tracks());
			}
			if cache.path(&name).is_file() { return Err(CdRipError::ArNotFound); }
		}

		// A cache failure shouldn't cost us the checksums.
		match download(&id.url()) {
			Ok(raw) => {
				if let Some(cache) = cache { let _res = cache.write(&name, &raw); }
				Self::parse(&raw, id.tracks())
			},
			Err(CdRipError::ArNotFound) => {
				if let Some(cache) = cache { let _res = cache.write(&name, &[]); }
				Err(CdRipError::ArNotFound)
			},
			Err(e) => Err(e),
		}
	}

	#[must_use]
	/// # Records.
	pub fn records(&self) -> &[ArRecord] { &self.records }

	#[must_use]
	/// # Is Empty?
	pub fn is_empty(&self) -> bool { self.records.is_empty() }

	#[must_use]
	/// # Verify.
	///
	/// Check a track's computed checksums against every pressing, returning
	/// the best match. A v2 match is preferred over v1; between pressings,
	/// the higher confidence wins.
	///
	/// Zero checksums never match.
	pub fn verify(&self, track: u8, v1: u32, v2: u32) -> ArMatch {
		let best = |chk: u32| -> Option<u8> {
			if chk == 0 { return None; }
			self.records.iter()
				.filter_map(|r| r.track(track))
				.filter(|t| t.crc == chk)
				.map(|t| t.confidence)
				.max()
		};

		if let Some(confidence) = best(v2) { ArMatch::V2 { confidence } }
		else if let Some(confidence) = best(v1) { ArMatch::V1 { confidence } }
		else { ArMatch::None }
	}

	#[must_use]
	/// # Verify Sector 450.
	///
	/// Check a track's sector 450 checksum against every pressing, returning
	/// the best confidence, if any. This helps tell a bad rip apart from an
	/// unknown pressing.
	pub fn verify_450(&self, track: u8, c450: u32) -> Option<u8> {
		if c450 == 0 { return None; }
		self.records.iter()
			.filter_map(|r| r.track(track))
			.filter(|t| t.crc450 == c450)
			.map(|t| t.confidence)
			.max()
	}
}



/// # Connection Agent.
///
/// Storing the agent statically saves a little bit of overhead on reuse. Since
/// the checksums are cached locally, this may not get called at all.
fn agent() -> &'static Agent {
	AGENT.get_or_init(||
		AgentBuilder::new()
			.timeout(Duration::from_secs(15))
			.user_agent(concat!("CDRip/", env!("CARGO_PKG_VERSION")))
			.max_idle_connections(0)
			.build()
	)
}

/// # Download.
fn download(url: &str) -> Result<Vec<u8>, CdRipError> {
	let res = agent().get(url).call().map_err(|e| match e {
		ureq::Error::Status(404, _) => CdRipError::ArNotFound,
		_ => CdRipError::ArFetch,
	})?;

	let mut out = Vec::new();
	res.into_reader().read_to_end(&mut out).map_err(|_| CdRipError::ArFetch)?;

	if out.is_empty() { Err(CdRipError::ArNotFound) }
	else { Ok(out) }
}
