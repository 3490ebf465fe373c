/*!
# CD Rip: Drives
*/

use crate::{
	AHASHER,
	CdRipError,
	DiscMetadata,
	KillSwitch,
	ReadOffset,
	scsi::{
		Cdb,
		DeviceOpen,
		MODE_PAGE_CAPABILITIES,
		send,
		send_negotiated,
		SgOpener,
		Transport,
	},
	Toc,
};
use std::{
	collections::HashMap,
	fmt,
	path::{
		Path,
		PathBuf,
	},
	sync::{
		Arc,
		atomic::{
			AtomicU64,
			Ordering::{
				Acquire,
				SeqCst,
			},
		},
		Mutex,
		MutexGuard,
		PoisonError,
	},
};
use trimothy::TrimSliceMatches;



/// # INQUIRY Allocation.
const INQUIRY_SIZE: u8 = 96;

/// # Claim: Busy Bit.
const CLAIM_BUSY: u64 = 1;

/// # Highest `/dev/srN` Checked By Scans.
const SCAN_MAX: u8 = 16;



/// # Helper: Capability Flags.
macro_rules! caps {
	( $( $k:ident $flag:ident $byte:literal $bit:literal $label:literal ),+ $(,)? ) => (
		impl Capabilities {
			$(
				#[doc = concat!("# Flag: ", $label, ".")]
				pub const $flag: u16 = 1 << ($byte * 8 + $bit);
			)+

			/// # All Flags (for display).
			const ALL: &'static [(u16, &'static str)] = &[
				$( (Self::$flag, $label), )+
			];

			/// # From Page Bytes 4 and 5.
			const fn from_page(b4: u8, b5: u8) -> Self {
				let raw = (b4 as u16) | ((b5 as u16) << 8);
				let mut out = 0;
				$(
					if 0 != raw & Self::$flag { out |= Self::$flag; }
				)+
				Self(out)
			}

			$(
				#[must_use]
				#[doc = concat!("# ", $label, "?")]
				pub const fn $k(self) -> bool { 0 != self.0 & Self::$flag }
			)+
		}
	);
}



#[derive(Debug, Clone, Copy, Default, Eq, Hash, PartialEq)]
/// # Drive Capabilities.
///
/// The audio-relevant bits of the CD Capabilities and Mechanical Status mode
/// page (`0x2A`), bytes four and five.
pub struct Capabilities(u16);

caps! {
	multi_session  MULTI_SESSION  0 6 "Multi-Session",
	cdda           CDDA           1 0 "CD-DA",
	accurate       ACCURATE       1 1 "Accurate Stream",
	rw             RW             1 2 "R-W Subchannel",
	c2             C2             1 4 "C2 Pointers",
	isrc           ISRC           1 5 "ISRC",
	upc            UPC            1 6 "UPC",
}

impl fmt::Display for Capabilities {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut any = false;
		for (flag, label) in Self::ALL {
			if 0 != self.0 & flag {
				if any { f.write_str(", ")?; }
				f.write_str(label)?;
				any = true;
			}
		}
		if ! any { f.write_str("none")?; }
		Ok(())
	}
}

impl Capabilities {
	#[must_use]
	/// # Parse Mode Sense Reply.
	///
	/// Find the capabilities page in a MODE SENSE (10) reply. `None` is
	/// returned if the page is missing or truncated.
	pub fn from_mode_sense(raw: &[u8]) -> Option<Self> {
		// Eight-byte header, then any block descriptors, then the page.
		let bd_len = usize::from(u16::from_be_bytes([*raw.get(6)?, *raw.get(7)?]));
		let page = raw.get(8 + bd_len..)?;
		if page.len() < 6 || page[0] & 0b0011_1111 != MODE_PAGE_CAPABILITIES {
			return None;
		}
		Some(Self::from_page(page[4], page[5]))
	}

	#[must_use]
	/// # Raw Bits.
	pub const fn bits(self) -> u16 { self.0 }
}



#[derive(Debug, Clone, Default, Eq, PartialEq)]
/// # Drive Information.
pub struct DriveInfo {
	vendor: String,
	model: String,
	revision: String,
	offset: ReadOffset,
	capabilities: Capabilities,
}

impl fmt::Display for DriveInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.vendor.is_empty() { f.write_str(&self.model)?; }
		else { write!(f, "{} {}", self.vendor, self.model)?; }
		if ! self.revision.is_empty() { write!(f, " ({})", self.revision)?; }
		Ok(())
	}
}

impl DriveInfo {
	/// # From INQUIRY Reply.
	///
	/// ## Errors
	///
	/// Returns an error if the reply is too short or the model is blank.
	pub fn from_inquiry(raw: &[u8]) -> Result<Self, CdRipError> {
		if raw.len() < 36 { return Err(CdRipError::NoData); }

		let vendor = inquiry_str(&raw[8..16]);
		let model = inquiry_str(&raw[16..32]);
		let revision = inquiry_str(&raw[32..36]);
		if model.is_empty() { return Err(CdRipError::NoData); }

		Ok(Self {
			vendor,
			model,
			revision,
			offset: ReadOffset::default(),
			capabilities: Capabilities::default(),
		})
	}

	#[must_use]
	/// # Vendor.
	pub fn vendor(&self) -> &str { &self.vendor }

	#[must_use]
	/// # Model.
	pub fn model(&self) -> &str { &self.model }

	#[must_use]
	/// # Firmware Revision.
	pub fn revision(&self) -> &str { &self.revision }

	#[must_use]
	/// # Read Offset.
	pub const fn offset(&self) -> ReadOffset { self.offset }

	#[must_use]
	/// # Capabilities.
	pub const fn capabilities(&self) -> Capabilities { self.capabilities }

	/// # Set Read Offset.
	pub fn set_offset(&mut self, offset: ReadOffset) { self.offset = offset; }

	/// # Set Capabilities.
	pub fn set_capabilities(&mut self, caps: Capabilities) { self.capabilities = caps; }
}

/// # INQUIRY String.
///
/// Fixed-width ASCII, padded with spaces (or occasionally nuls).
fn inquiry_str(src: &[u8]) -> String {
	let src = src.trim_matches(|b: u8| b.is_ascii_whitespace() || b == 0);
	src.iter()
		.map(|&b| if b.is_ascii_graphic() { char::from(b) } else { ' ' })
		.collect()
}

/// # Read Drive Information.
///
/// Identify the drive and probe its capabilities. Capabilities are optional;
/// drives that refuse MODE SENSE are assumed to have none.
///
/// ## Errors
///
/// Returns an error if INQUIRY fails or the operation is cancelled.
pub(crate) fn read_drive_info(dev: &mut dyn Transport, killed: &KillSwitch)
-> Result<DriveInfo, CdRipError> {
	if killed.killed() { return Err(CdRipError::Killed); }
	let raw = send(dev, &Cdb::inquiry(INQUIRY_SIZE), usize::from(INQUIRY_SIZE))?;
	let mut out = DriveInfo::from_inquiry(&raw)?;

	if killed.killed() { return Err(CdRipError::Killed); }
	if let Some(caps) = send_negotiated(dev, |a| Cdb::mode_sense(MODE_PAGE_CAPABILITIES, a), 1)
		.ok()
		.and_then(|raw| Capabilities::from_mode_sense(&raw))
	{
		out.capabilities = caps;
	}

	Ok(out)
}



#[derive(Debug, Clone, Default, Eq, PartialEq)]
/// # CD Information.
///
/// What is known about the disc currently in the drive.
pub struct CdInfo {
	/// # Table of Contents.
	pub toc: Option<Toc>,

	/// # Metadata.
	pub metadata: DiscMetadata,
}



/// # Drive.
///
/// A physical optical drive and its cached state. The drive info and CD info
/// each live behind their own lock.
///
/// Tasks claim the drive with [`Drive::acquire`], which fails if another
/// task already holds it. Each claim is stamped with a generation; a
/// [`Drive::force_release`] bumps the generation so that anything the
/// abandoned task tries to commit afterward is discarded.
///
/// The busy flag and generation share one atomic word (`generation << 1 |
/// busy`) so claims and releases are never torn.
pub struct Drive {
	path: PathBuf,
	opener: Arc<dyn DeviceOpen>,
	info: Mutex<Option<DriveInfo>>,
	cd: Mutex<CdInfo>,
	claim: AtomicU64,
}

impl fmt::Debug for Drive {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Drive")
			.field("path", &self.path)
			.field("busy", &self.is_busy())
			.field("generation", &self.generation())
			.finish_non_exhaustive()
	}
}

impl Drive {
	#[must_use]
	/// # New (SG_IO).
	pub fn new<P>(path: P) -> Self
	where P: AsRef<Path> {
		let path = path.as_ref();
		Self::with_opener(path, Arc::new(SgOpener::new(path)))
	}

	#[must_use]
	/// # New (Custom Opener).
	pub fn with_opener<P>(path: P, opener: Arc<dyn DeviceOpen>) -> Self
	where P: AsRef<Path> {
		Self {
			path: path.as_ref().to_path_buf(),
			opener,
			info: Mutex::new(None),
			cd: Mutex::new(CdInfo::default()),
			claim: AtomicU64::new(0),
		}
	}

	#[must_use]
	/// # Path.
	pub fn path(&self) -> &Path { &self.path }

	/// # Open Device.
	///
	/// ## Errors
	///
	/// Returns an error if the device cannot be opened.
	pub fn open(&self) -> Result<Box<dyn Transport>, CdRipError> { self.opener.open() }
}

impl Drive {
	#[must_use]
	/// # Drive Info.
	pub fn info(&self) -> Option<DriveInfo> { self.lock_info().clone() }

	#[must_use]
	/// # CD Info.
	pub fn cd_info(&self) -> CdInfo { self.lock_cd().clone() }

	#[must_use]
	/// # TOC.
	pub fn toc(&self) -> Option<Toc> { self.lock_cd().toc.clone() }

	/// # Set Read Offset.
	///
	/// This is a user setting, so applies regardless of task state. Nothing
	/// happens if the drive has not been identified yet.
	pub fn set_offset(&self, offset: ReadOffset) {
		if let Some(info) = self.lock_info().as_mut() { info.set_offset(offset); }
	}

	/// # Edit Metadata.
	///
	/// Apply a user edit to the cached disc metadata.
	pub fn edit_metadata<F>(&self, cb: F)
	where F: FnOnce(&mut DiscMetadata) {
		cb(&mut self.lock_cd().metadata);
	}

	/// # Forget Disc.
	///
	/// Clear the CD info, e.g. after the media has changed.
	pub fn forget_disc(&self) { *self.lock_cd() = CdInfo::default(); }

	/// # Lock Drive Info.
	fn lock_info(&self) -> MutexGuard<'_, Option<DriveInfo>> {
		self.info.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// # Lock CD Info.
	fn lock_cd(&self) -> MutexGuard<'_, CdInfo> {
		self.cd.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

impl Drive {
	#[must_use]
	/// # Is Busy?
	pub fn is_busy(&self) -> bool { 0 != self.claim.load(Acquire) & CLAIM_BUSY }

	#[must_use]
	/// # Generation.
	pub fn generation(&self) -> u64 { self.claim.load(Acquire) >> 1 }

	/// # Acquire.
	///
	/// Claim the drive for a task, returning the generation stamp.
	///
	/// ## Errors
	///
	/// Returns an error if another task holds the drive.
	pub fn acquire(&self) -> Result<u64, CdRipError> {
		self.claim.fetch_update(SeqCst, SeqCst, |v|
			if 0 == v & CLAIM_BUSY { Some(v | CLAIM_BUSY) }
			else { None }
		)
			.map(|v| v >> 1)
			.map_err(|_| CdRipError::Busy(self.path.to_string_lossy().into_owned()))
	}

	/// # Release.
	///
	/// Give the drive back, but only if the claim is still current.
	pub fn release(&self, generation: u64) {
		let held = (generation << 1) | CLAIM_BUSY;
		let _res = self.claim.compare_exchange(held, generation << 1, SeqCst, SeqCst);
	}

	/// # Force Release.
	///
	/// Invalidate the current claim and free the drive. The previous holder
	/// can no longer commit results or release the drive.
	pub fn force_release(&self) {
		// Hold both locks so no commit can straddle the bump.
		let _info = self.lock_info();
		let _cd = self.lock_cd();
		let _res = self.claim.fetch_update(SeqCst, SeqCst, |v|
			Some(((v >> 1).wrapping_add(1)) << 1)
		);
	}

	/// # Commit Drive Info.
	///
	/// Returns `false` if the claim has gone stale.
	pub fn commit_info<F>(&self, generation: u64, cb: F) -> bool
	where F: FnOnce(&mut Option<DriveInfo>) {
		let mut lock = self.lock_info();
		if generation == self.generation() {
			cb(&mut lock);
			true
		}
		else { false }
	}

	/// # Commit CD Info.
	///
	/// Returns `false` if the claim has gone stale.
	pub fn commit_cd<F>(&self, generation: u64, cb: F) -> bool
	where F: FnOnce(&mut CdInfo) {
		let mut lock = self.lock_cd();
		if generation == self.generation() {
			cb(&mut lock);
			true
		}
		else { false }
	}
}



#[derive(Debug, Clone)]
/// # Drive Registry.
///
/// This tracks one [`Drive`] per device path, created on attach and dropped
/// on detach.
pub struct DriveRegistry {
	drives: HashMap<PathBuf, Arc<Drive>, ahash::RandomState>,
}

impl Default for DriveRegistry {
	fn default() -> Self {
		Self { drives: HashMap::with_hasher(AHASHER) }
	}
}

impl DriveRegistry {
	/// # Attach.
	///
	/// Register a drive at the path (using SG_IO), or return the existing
	/// one.
	pub fn attach<P>(&mut self, path: P) -> Arc<Drive>
	where P: AsRef<Path> {
		let path = normalize(path.as_ref());
		Arc::clone(
			self.drives.entry(path.clone())
				.or_insert_with(|| Arc::new(Drive::new(path)))
		)
	}

	/// # Attach (Custom Opener).
	pub fn attach_with<P>(&mut self, path: P, opener: Arc<dyn DeviceOpen>) -> Arc<Drive>
	where P: AsRef<Path> {
		let path = normalize(path.as_ref());
		Arc::clone(
			self.drives.entry(path.clone())
				.or_insert_with(|| Arc::new(Drive::with_opener(path, opener)))
		)
	}

	/// # Detach.
	///
	/// Remove the drive, returning it if it was registered. Outstanding
	/// references remain valid, but the registry forgets it.
	pub fn detach<P>(&mut self, path: P) -> Option<Arc<Drive>>
	where P: AsRef<Path> {
		self.drives.remove(&normalize(path.as_ref()))
	}

	#[must_use]
	/// # Get.
	pub fn get<P>(&self, path: P) -> Option<Arc<Drive>>
	where P: AsRef<Path> {
		self.drives.get(&normalize(path.as_ref())).map(Arc::clone)
	}

	#[must_use]
	/// # Is Empty?
	pub fn is_empty(&self) -> bool { self.drives.is_empty() }

	#[must_use]
	/// # Length.
	pub fn len(&self) -> usize { self.drives.len() }

	#[must_use]
	/// # Paths (Sorted).
	pub fn paths(&self) -> Vec<PathBuf> {
		let mut out: Vec<PathBuf> = self.drives.keys().cloned().collect();
		out.sort();
		out
	}

	/// # Scan.
	///
	/// Attach any `/dev/srN` devices that exist, returning the number of
	/// drives registered afterward.
	pub fn scan(&mut self) -> usize {
		for n in 0..SCAN_MAX {
			let path = PathBuf::from(format!("/dev/sr{n}"));
			if path.exists() { self.attach(path); }
		}
		self.len()
	}
}

/// # Normalize Path.
///
/// Symlinks like `/dev/cdrom` resolve to the real node so the same drive is
/// never registered twice.
fn normalize(path: &Path) -> PathBuf {
	std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
