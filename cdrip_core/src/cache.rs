/*!
# CD Rip: Cache
*/

use crate::{
	CACHE_BASE,
	CdRipError,
};
use std::{
	io::{
		BufWriter,
		Write,
	},
	path::{
		Path,
		PathBuf,
	},
	sync::OnceLock,
};
use tempfile::NamedTempFile;



/// # Default Cache Root.
///
/// This will ultimately hold `CWD/CACHE_BASE`.
static CACHE_ROOT: OnceLock<Option<PathBuf>> = OnceLock::new();



#[derive(Debug, Clone, Eq, PartialEq)]
/// # Cache.
///
/// A flat directory of downloaded or otherwise expensive-to-recreate files,
/// currently just the AccurateRip checksum tables.
pub struct Cache {
	root: PathBuf,
}

impl Cache {
	/// # New.
	///
	/// Use (and create if needed) the given directory as the cache root.
	///
	/// ## Errors
	///
	/// Returns an error if the directory cannot be created.
	pub fn new<P>(root: P) -> Result<Self, CdRipError>
	where P: AsRef<Path> {
		let root = root.as_ref();
		if ! root.is_dir() {
			std::fs::create_dir_all(root).map_err(|_| CdRipError::Cache)?;
		}

		std::fs::canonicalize(root)
			.map(|root| Self { root })
			.map_err(|_| CdRipError::Cache)
	}

	/// # Default (CWD).
	///
	/// Return the cache rooted at `CWD/CACHE_BASE`.
	///
	/// ## Errors
	///
	/// Returns an error if the current working directory is missing or the
	/// cache directory cannot be created.
	pub fn cwd() -> Result<Self, CdRipError> {
		let root = CACHE_ROOT.get_or_init(|| {
			// The base must already exist.
			let dir = std::env::current_dir().ok()?;
			if dir.is_dir() { Some(dir.join(CACHE_BASE)) }
			else { None }
		})
			.as_deref()
			.ok_or(CdRipError::Cache)?;

		Self::new(root)
	}
}

impl Cache {
	#[must_use]
	/// # Root.
	pub fn root(&self) -> &Path { &self.root }

	#[must_use]
	/// # Path.
	///
	/// Glue a file name onto the root.
	pub fn path(&self, name: &str) -> PathBuf { self.root.join(name) }

	#[must_use]
	/// # Read.
	///
	/// Return the contents of the named file, if it exists and is non-empty.
	pub fn read(&self, name: &str) -> Option<Vec<u8>> {
		std::fs::read(self.path(name)).ok().filter(|v| ! v.is_empty())
	}

	/// # Write.
	///
	/// Write the named file, replacing the original if it exists.
	///
	/// ## Errors
	///
	/// Returns an error if the root has vanished and cannot be recreated, or
	/// the file cannot be written.
	pub fn write(&self, name: &str, data: &[u8]) -> Result<(), CdRipError> {
		if ! self.root.is_dir() {
			std::fs::create_dir_all(&self.root).map_err(|_| CdRipError::Cache)?;
		}

		let dst = self.path(name);
		let mut writer = CacheWriter::new(&dst)?;
		writer.writer().write_all(data)
			.map_err(|_| CdRipError::Write(dst.to_string_lossy().into_owned()))?;
		writer.finish()
	}
}



#[derive(Debug)]
/// # Cache Writer.
///
/// Data is written to a temporary file in the destination's directory, then
/// moved into place by [`CacheWriter::finish`]. If that never happens, the
/// temporary file is removed on drop and the destination is left alone.
pub struct CacheWriter {
	dst: PathBuf,
	tmp: BufWriter<NamedTempFile>,
}

impl CacheWriter {
	/// # New.
	///
	/// ## Errors
	///
	/// Returns an error if the destination has no parent directory or the
	/// temporary file cannot be created.
	pub fn new<P>(dst: P) -> Result<Self, CdRipError>
	where P: AsRef<Path> {
		let dst = dst.as_ref();
		let err = || CdRipError::Write(dst.to_string_lossy().into_owned());
		let parent = dst.parent().ok_or_else(err)?;
		let tmp = NamedTempFile::new_in(parent).map_err(|_| err())?;

		Ok(Self {
			dst: dst.to_path_buf(),
			tmp: BufWriter::new(tmp),
		})
	}

	/// # Writer.
	pub fn writer(&mut self) -> &mut BufWriter<NamedTempFile> { &mut self.tmp }

	#[must_use]
	/// # Destination.
	pub fn dst(&self) -> &Path { &self.dst }

	/// # Finish.
	///
	/// Flush and move the data into place.
	///
	/// ## Errors
	///
	/// Returns an error if the data cannot be flushed or persisted.
	pub fn finish(self) -> Result<(), CdRipError> {
		let Self { dst, tmp } = self;
		let err = || CdRipError::Write(dst.to_string_lossy().into_owned());
		let tmp = tmp.into_inner().map_err(|_| err())?;
		tmp.persist(&dst).map_err(|_| err())?;
		Ok(())
	}
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_cache() {
		let dir = tempfile::tempdir().expect("Tempdir failed.");
		let cache = Cache::new(dir.path().join("nested/cache")).expect("Cache failed.");
		assert!(cache.root().is_dir());

		assert_eq!(cache.read("foo.bin"), None);
		cache.write("foo.bin", b"Hello").expect("Write failed.");
		assert_eq!(cache.read("foo.bin").as_deref(), Some(&b"Hello"[..]));

		// Replacement.
		cache.write("foo.bin", b"World").expect("Write failed.");
		assert_eq!(cache.read("foo.bin").as_deref(), Some(&b"World"[..]));

		// Empty files don't count.
		cache.write("empty.bin", &[]).expect("Write failed.");
		assert_eq!(cache.read("empty.bin"), None);
	}

	#[test]
	fn t_writer_abandon() {
		let dir = tempfile::tempdir().expect("Tempdir failed.");
		let dst = dir.path().join("out.bin");
		{
			let mut writer = CacheWriter::new(&dst).expect("Writer failed.");
			writer.writer().write_all(b"partial").expect("Write failed.");
			assert_eq!(writer.dst(), dst);
		}
		assert!(! dst.exists(), "Abandoned writes should not land.");
		assert_eq!(
			std::fs::read_dir(dir.path()).expect("Readdir failed.").count(),
			0,
			"The temporary file should be cleaned up.",
		);
	}
}
