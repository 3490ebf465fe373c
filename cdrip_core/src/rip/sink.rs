/*!
# CD Rip: PCM Sinks
*/

use crate::{
	CdRipError,
	WAVE_SPEC,
};
use hound::WavWriter;
use std::{
	fs::File,
	io::BufWriter,
	path::{
		Path,
		PathBuf,
	},
};
use tempfile::TempPath;



/// # PCM Sink.
///
/// This receives the ripped audio, one track (or the whole disc) at a time.
///
/// Sinks are transactional: data written between [`PcmSink::start_track`]
/// and [`PcmSink::finish_track`] only "counts" once the latter succeeds. If
/// a rip fails or is cancelled, [`PcmSink::abort_track`] is called instead
/// and whatever was written for the track should be thrown away.
///
/// The track is `None` for whole-disc rips.
pub trait PcmSink: Send {
	/// # Start Track.
	///
	/// ## Errors
	///
	/// Returns an error if the sink cannot accept data.
	fn start_track(&mut self, track: Option<u8>) -> Result<(), CdRipError>;

	/// # Write.
	///
	/// Data is raw 16-bit stereo PCM, little endian.
	///
	/// ## Errors
	///
	/// Returns an error if the data cannot be written.
	fn write(&mut self, data: &[u8]) -> Result<(), CdRipError>;

	/// # Finish Track.
	///
	/// ## Errors
	///
	/// Returns an error if the track cannot be committed.
	fn finish_track(&mut self) -> Result<(), CdRipError>;

	/// # Abort Track.
	fn abort_track(&mut self);
}



#[derive(Debug, Default, Clone)]
/// # Memory Sink.
///
/// This keeps everything in memory. It is mostly useful for testing and
/// short rips.
pub struct MemorySink {
	pending: Option<(Option<u8>, Vec<u8>)>,
	tracks: Vec<(Option<u8>, Vec<u8>)>,
}

impl PcmSink for MemorySink {
	fn start_track(&mut self, track: Option<u8>) -> Result<(), CdRipError> {
		self.pending = Some((track, Vec::new()));
		Ok(())
	}

	fn write(&mut self, data: &[u8]) -> Result<(), CdRipError> {
		let (_, buf) = self.pending.as_mut().ok_or(CdRipError::Bug("no track started"))?;
		buf.extend_from_slice(data);
		Ok(())
	}

	fn finish_track(&mut self) -> Result<(), CdRipError> {
		let done = self.pending.take().ok_or(CdRipError::Bug("no track started"))?;
		self.tracks.push(done);
		Ok(())
	}

	fn abort_track(&mut self) { self.pending = None; }
}

impl MemorySink {
	#[must_use]
	/// # New.
	pub fn new() -> Self { Self::default() }

	#[must_use]
	/// # Get Track.
	///
	/// Return the committed data for a given track (or `None` for the whole
	/// disc), if any.
	pub fn get(&self, track: Option<u8>) -> Option<&[u8]> {
		self.tracks.iter()
			.find_map(|(t, v)| if *t == track { Some(v.as_slice()) } else { None })
	}

	#[must_use]
	/// # Committed Tracks.
	pub fn tracks(&self) -> &[(Option<u8>, Vec<u8>)] { &self.tracks }
}



/// # Open WAV.
struct OpenWav {
	track: Option<u8>,
	dst: PathBuf,
	wav: WavWriter<BufWriter<File>>,
	tmp: TempPath,
	partial: Option<u8>,
}

#[derive(Debug)]
/// # WAV Sink.
///
/// This writes each track to its own WAV file in a directory, named like
/// `{prefix}_{NN}.wav`, with `00` used for the HTOA and `disc` for
/// whole-disc rips.
///
/// Data goes to a temporary file first, which is moved into place when the
/// track finishes. Aborted tracks leave nothing behind.
pub struct WavSink {
	dir: PathBuf,
	prefix: String,
	open: Option<OpenWav>,
}

impl std::fmt::Debug for OpenWav {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("OpenWav")
			.field("track", &self.track)
			.field("dst", &self.dst)
			.field("tmp", &self.tmp)
			.finish_non_exhaustive()
	}
}

impl PcmSink for WavSink {
	fn start_track(&mut self, track: Option<u8>) -> Result<(), CdRipError> {
		self.abort_track();

		let dst = self.path_for(track);
		let tmp = tempfile::Builder::new()
			.prefix(".cdrip")
			.suffix(".wav")
			.tempfile_in(&self.dir)
			.map_err(|_| write_err(&dst))?
			.into_temp_path();
		let wav = WavWriter::create(&tmp, WAVE_SPEC).map_err(|_| write_err(&dst))?;

		self.open = Some(OpenWav { track, dst, wav, tmp, partial: None });
		Ok(())
	}

	fn write(&mut self, mut data: &[u8]) -> Result<(), CdRipError> {
		let open = self.open.as_mut().ok_or(CdRipError::Bug("no track started"))?;

		// Finish the odd byte from last time, if any.
		if let Some(lo) = open.partial.take() {
			let Some((hi, rest)) = data.split_first() else {
				open.partial = Some(lo);
				return Ok(());
			};
			open.wav.write_sample(i16::from_le_bytes([lo, *hi]))
				.map_err(|_| write_err(&open.dst))?;
			data = rest;
		}

		let mut chunks = data.chunks_exact(2);
		for pair in chunks.by_ref() {
			open.wav.write_sample(i16::from_le_bytes([pair[0], pair[1]]))
				.map_err(|_| write_err(&open.dst))?;
		}
		open.partial = chunks.remainder().first().copied();

		Ok(())
	}

	fn finish_track(&mut self) -> Result<(), CdRipError> {
		let OpenWav { dst, wav, tmp, partial, .. } = self.open.take()
			.ok_or(CdRipError::Bug("no track started"))?;

		// Half a sample is no sample at all.
		if partial.is_some() { return Err(write_err(&dst)); }
		wav.finalize().map_err(|_| write_err(&dst))?;
		tmp.persist(&dst).map_err(|_| write_err(&dst))?;
		Ok(())
	}

	fn abort_track(&mut self) {
		// Dropping the temporary path removes the file.
		if let Some(OpenWav { wav, tmp, .. }) = self.open.take() {
			drop(wav);
			drop(tmp);
		}
	}
}

impl WavSink {
	/// # New.
	///
	/// ## Errors
	///
	/// Returns an error if the directory does not exist and cannot be
	/// created.
	pub fn new<P, S>(dir: P, prefix: S) -> Result<Self, CdRipError>
	where P: AsRef<Path>, S: Into<String> {
		let dir = dir.as_ref();
		if ! dir.is_dir() {
			std::fs::create_dir_all(dir)
				.map_err(|_| CdRipError::Write(dir.to_string_lossy().into_owned()))?;
		}

		Ok(Self {
			dir: dir.to_path_buf(),
			prefix: prefix.into(),
			open: None,
		})
	}

	#[must_use]
	/// # Directory.
	pub fn dir(&self) -> &Path { &self.dir }

	#[must_use]
	/// # Output Path.
	///
	/// Return the destination file path for a given track.
	pub fn path_for(&self, track: Option<u8>) -> PathBuf {
		match track {
			Some(n) => self.dir.join(format!("{}_{n:02}.wav", self.prefix)),
			None => self.dir.join(format!("{}_disc.wav", self.prefix)),
		}
	}
}



/// # Write Error.
fn write_err(dst: &Path) -> CdRipError {
	CdRipError::Write(dst.to_string_lossy().into_owned())
}
