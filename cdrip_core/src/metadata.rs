/*!
# CD Rip: Metadata
*/

use crate::{
	CdText,
	CDTextKind,
	Isrc,
	Mcn,
	Toc,
};
use std::fmt;



/// # Helper: Metadata Fields.
macro_rules! meta_fields {
	( $( $k:ident $v:literal $vstr:literal ),+ $(,)? ) => (
		#[repr(u8)]
		#[derive(Debug, Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
		/// # Metadata Field.
		pub enum MetaField {
			$(
				#[doc = concat!("# ", $vstr, ".")]
				$k = $v,
			)+
		}

		impl MetaField {
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

meta_fields! {
	Album          0 "Album",
	Artist         1 "Artist",
	Title          2 "Title",
	Composer       3 "Composer",
	Genre          4 "Genre",
	Year           5 "Year",
	Comment        6 "Comment",
	Mcn            7 "MCN",
	Isrc           8 "ISRC",
	VariousArtists 9 "Various Artists",
	MultiDisc     10 "Multi-Disc",
	Cover         11 "Cover",
}

impl fmt::Display for MetaField {
	#[inline]
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl MetaField {
	/// # Flag.
	const fn flag(self) -> u16 { 1 << self as u8 }
}



/// # Helper: Getters and User Setters.
///
/// Setters mark the field as modified; source merges will leave it alone
/// after that.
macro_rules! accessors {
	( $( $field:ident $set:ident $kind:ident $ty:ty ),+ $(,)? ) => (
		$(
			#[must_use]
			#[doc = concat!("# ", stringify!($kind), ".")]
			pub fn $field(&self) -> Option<&$ty> { self.$field.as_ref() }

			#[doc = concat!("# Set ", stringify!($kind), ".")]
			///
			/// This is treated as a user edit.
			pub fn $set(&mut self, v: Option<$ty>) {
				self.$field = v;
				self.modified |= MetaField::$kind.flag();
			}
		)+
	);
}

/// # Helper: Fill From Source.
///
/// Copy a value over if the field has not been modified and the source
/// actually has something.
macro_rules! fill {
	($self:ident, $field:ident, $kind:ident, $val:expr) => (
		if ! $self.is_modified(MetaField::$kind) {
			if let Some(v) = $val { $self.$field = Some(v); }
		}
	);
}

/// # Helper: Diff.
macro_rules! diff {
	($out:ident, $a:ident, $b:ident, $( $field:ident $kind:ident ),+) => (
		$(
			if $a.$field != $b.$field { $out.push(MetaField::$kind); }
		)+
	);
}



#[derive(Debug, Clone, Default, Eq, PartialEq)]
/// # Track Metadata.
pub struct TrackMetadata {
	number: u8,
	title: Option<String>,
	artist: Option<String>,
	composer: Option<String>,
	comment: Option<String>,
	isrc: Option<Isrc>,
	modified: u16,
}

impl TrackMetadata {
	#[must_use]
	/// # New.
	pub const fn new(number: u8) -> Self {
		Self {
			number,
			title: None,
			artist: None,
			composer: None,
			comment: None,
			isrc: None,
			modified: 0,
		}
	}

	#[must_use]
	/// # Track Number.
	pub const fn number(&self) -> u8 { self.number }

	#[must_use]
	/// # Is Modified?
	pub const fn is_modified(&self, field: MetaField) -> bool {
		0 != self.modified & field.flag()
	}

	accessors! {
		title set_title Title String,
		artist set_artist Artist String,
		composer set_composer Composer String,
		comment set_comment Comment String,
		isrc set_isrc Isrc Isrc,
	}

	/// # Merge.
	///
	/// Fill unmodified fields from another source.
	pub fn merge(&mut self, src: &Self) {
		fill!(self, title, Title, src.title.clone());
		fill!(self, artist, Artist, src.artist.clone());
		fill!(self, composer, Composer, src.composer.clone());
		fill!(self, comment, Comment, src.comment.clone());
		fill!(self, isrc, Isrc, src.isrc);
	}

	#[must_use]
	/// # Diff.
	///
	/// Return the fields that differ between the two.
	pub fn diff(&self, other: &Self) -> Vec<MetaField> {
		let mut out = Vec::new();
		diff!(out, self, other, title Title, artist Artist, composer Composer, comment Comment, isrc Isrc);
		out
	}
}



#[derive(Debug, Clone, Default, Eq, PartialEq)]
/// # Disc Metadata.
///
/// Disc- and track-level tags gathered from the various sources (TOC,
/// CD-Text, MCN/ISRC, user edits).
///
/// Each field carries a "modified" bit. User setters flip it; source
/// updates via [`DiscMetadata::merge`] and friends only ever touch fields
/// that are still unmodified.
pub struct DiscMetadata {
	album: Option<String>,
	artist: Option<String>,
	genre: Option<String>,
	year: Option<u16>,
	comment: Option<String>,
	mcn: Option<Mcn>,
	various_artists: bool,
	multi_disc: bool,
	cover: Option<Vec<u8>>,
	tracks: Vec<TrackMetadata>,
	modified: u16,
}

impl From<&Toc> for DiscMetadata {
	fn from(toc: &Toc) -> Self {
		Self {
			tracks: toc.audio_tracks().map(|t| TrackMetadata::new(t.number())).collect(),
			..Self::default()
		}
	}
}

impl DiscMetadata {
	#[must_use]
	/// # Is Modified?
	pub const fn is_modified(&self, field: MetaField) -> bool {
		0 != self.modified & field.flag()
	}

	#[must_use]
	/// # Any Modified?
	///
	/// True if any disc or track field has been edited.
	pub fn any_modified(&self) -> bool {
		0 != self.modified || self.tracks.iter().any(|t| 0 != t.modified)
	}

	/// # Clear Modified Bits.
	pub fn clear_modified(&mut self) {
		self.modified = 0;
		for t in &mut self.tracks { t.modified = 0; }
	}

	accessors! {
		album set_album Album String,
		artist set_artist Artist String,
		genre set_genre Genre String,
		comment set_comment Comment String,
		mcn set_mcn Mcn Mcn,
	}

	#[must_use]
	/// # Year.
	pub const fn year(&self) -> Option<u16> { self.year }

	/// # Set Year.
	pub fn set_year(&mut self, v: Option<u16>) {
		self.year = v;
		self.modified |= MetaField::Year.flag();
	}

	#[must_use]
	/// # Various Artists?
	pub const fn various_artists(&self) -> bool { self.various_artists }

	/// # Set Various Artists.
	pub fn set_various_artists(&mut self, v: bool) {
		self.various_artists = v;
		self.modified |= MetaField::VariousArtists.flag();
	}

	#[must_use]
	/// # Multi-Disc?
	pub const fn multi_disc(&self) -> bool { self.multi_disc }

	/// # Set Multi-Disc.
	pub fn set_multi_disc(&mut self, v: bool) {
		self.multi_disc = v;
		self.modified |= MetaField::MultiDisc.flag();
	}

	#[must_use]
	/// # Cover Image.
	pub fn cover(&self) -> Option<&[u8]> { self.cover.as_deref() }

	/// # Set Cover Image.
	pub fn set_cover(&mut self, v: Option<Vec<u8>>) {
		self.cover = v.filter(|v| ! v.is_empty());
		self.modified |= MetaField::Cover.flag();
	}

	#[must_use]
	/// # Tracks.
	pub fn tracks(&self) -> &[TrackMetadata] { &self.tracks }

	#[must_use]
	/// # Track.
	pub fn track(&self, number: u8) -> Option<&TrackMetadata> {
		self.tracks.iter().find(|t| t.number == number)
	}

	/// # Track (Mutable).
	///
	/// Tracks are created on demand, keeping the list sorted.
	pub fn track_mut(&mut self, number: u8) -> &mut TrackMetadata {
		let idx = match self.tracks.binary_search_by_key(&number, |t| t.number) {
			Ok(idx) => idx,
			Err(idx) => {
				self.tracks.insert(idx, TrackMetadata::new(number));
				idx
			},
		};
		&mut self.tracks[idx]
	}
}

impl DiscMetadata {
	/// # Merge.
	///
	/// Fill every unmodified field (disc and track) for which `src` has a
	/// value. Modified bits in `src` are not carried over.
	pub fn merge(&mut self, src: &Self) {
		fill!(self, album, Album, src.album.clone());
		fill!(self, artist, Artist, src.artist.clone());
		fill!(self, genre, Genre, src.genre.clone());
		fill!(self, year, Year, src.year);
		fill!(self, comment, Comment, src.comment.clone());
		fill!(self, mcn, Mcn, src.mcn);
		fill!(self, cover, Cover, src.cover.clone());
		if ! self.is_modified(MetaField::VariousArtists) {
			self.various_artists |= src.various_artists;
		}
		if ! self.is_modified(MetaField::MultiDisc) {
			self.multi_disc |= src.multi_disc;
		}

		for t in &src.tracks { self.track_mut(t.number).merge(t); }
	}

	#[must_use]
	/// # Diff.
	///
	/// Return the fields that differ between the two, with the track number
	/// for track-level fields.
	pub fn diff(&self, other: &Self) -> Vec<(Option<u8>, MetaField)> {
		let mut disc = Vec::new();
		diff!(
			disc, self, other,
			album Album, artist Artist, genre Genre, year Year, comment Comment,
			mcn Mcn, various_artists VariousArtists, multi_disc MultiDisc,
			cover Cover
		);
		let mut out: Vec<(Option<u8>, MetaField)> = disc.into_iter()
			.map(|f| (None, f))
			.collect();

		let blank = TrackMetadata::default();
		let mut numbers: Vec<u8> = self.tracks.iter()
			.chain(other.tracks.iter())
			.map(|t| t.number)
			.collect();
		numbers.sort_unstable();
		numbers.dedup();
		for n in numbers {
			let a = self.track(n).unwrap_or(&blank);
			let b = other.track(n).unwrap_or(&blank);
			out.extend(a.diff(b).into_iter().map(|f| (Some(n), f)));
		}

		out
	}

	/// # Apply CD-Text.
	pub fn apply_cdtext(&mut self, text: &CdText) {
		let mut src = Self::default();
		src.album = text.get(0, CDTextKind::Title).map(String::from);
		src.artist = text.get(0, CDTextKind::Performer).map(String::from);
		src.comment = text.get(0, CDTextKind::Message).map(String::from);
		src.genre = text.genre_string();
		src.various_artists = text.various_artists();
		src.multi_disc = text.multi_disc();
		src.mcn = text.get(0, CDTextKind::UpcIsrc).and_then(|v| Mcn::try_from(v).ok());

		for (t, kind, v) in text.iter() {
			if t == 0 { continue; }
			let track = src.track_mut(t);
			match kind {
				CDTextKind::Title => { track.title = Some(v.to_owned()); },
				CDTextKind::Performer => { track.artist = Some(v.to_owned()); },
				CDTextKind::Composer => { track.composer = Some(v.to_owned()); },
				// Songwriters stand in for missing composers.
				CDTextKind::Songwriter =>
					if track.composer.is_none() { track.composer = Some(v.to_owned()); },
				CDTextKind::Message => { track.comment = Some(v.to_owned()); },
				CDTextKind::UpcIsrc => { track.isrc = Isrc::try_from(v).ok(); },
				CDTextKind::Arranger | CDTextKind::DiscId => {},
			}
		}

		// Only merge into tracks we already know about, if any.
		if ! self.tracks.is_empty() {
			src.tracks.retain(|t| self.track(t.number).is_some());
		}

		self.merge(&src);
	}

	/// # Apply MCN.
	pub fn apply_mcn(&mut self, mcn: Mcn) {
		fill!(self, mcn, Mcn, Some(mcn));
	}

	/// # Apply ISRC.
	pub fn apply_isrc(&mut self, track: u8, isrc: Isrc) {
		let track = self.track_mut(track);
		fill!(track, isrc, Isrc, Some(isrc));
	}
}
