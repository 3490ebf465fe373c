/*!
# CD Rip: Scripted Device (Tests)
*/

use crate::{
	CD_C2_SIZE,
	CD_DATA_SIZE,
	CD_LEADIN,
	CD_Q_SIZE,
	CdRipError,
	KillSwitch,
	scsi::{
		Cdb,
		DeviceOpen,
		ErrorCode,
		SenseKey,
		Transport,
	},
};
use crossbeam_channel::Sender;
use std::{
	collections::{
		HashMap,
		HashSet,
		VecDeque,
	},
	sync::Arc,
	time::Duration,
};



/// # Sector Generator.
type SectorFn = Arc<dyn Fn(i32) -> Vec<u8> + Send + Sync>;



#[derive(Clone)]
/// # Mock Device.
///
/// Replies are scripted per command; audio sectors come from a generator
/// function keyed by LBA.
pub(crate) struct MockDevice {
	inquiry: Option<Vec<u8>>,
	mode_sense: Option<Vec<u8>>,
	toc: Option<Vec<u8>>,
	cdtext: Option<Vec<u8>>,
	mcn: Option<Vec<u8>>,
	isrc: HashMap<u8, Vec<u8>>,
	sectors: SectorFn,
	leadout: i32,
	failures: HashMap<i32, VecDeque<ErrorCode>>,
	c2: HashSet<i32>,
	q_shift: HashMap<i32, i32>,
	kill_at: Option<(i32, KillSwitch)>,
	hang: Option<Duration>,
	entered: Option<Sender<()>>,
	reads: Vec<i32>,
	allocs: Vec<usize>,
}

impl std::fmt::Debug for MockDevice {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MockDevice").field("leadout", &self.leadout).finish_non_exhaustive()
	}
}

impl Default for MockDevice {
	fn default() -> Self {
		Self {
			inquiry: None,
			mode_sense: None,
			toc: None,
			cdtext: None,
			mcn: None,
			isrc: HashMap::new(),
			sectors: Arc::new(|_| vec![0; usize::from(CD_DATA_SIZE)]),
			leadout: 2000,
			failures: HashMap::new(),
			c2: HashSet::new(),
			q_shift: HashMap::new(),
			kill_at: None,
			hang: None,
			entered: None,
			reads: Vec::new(),
			allocs: Vec::new(),
		}
	}
}

/// # Builders.
impl MockDevice {
	pub(crate) fn with_inquiry(mut self, v: Vec<u8>) -> Self { self.inquiry = Some(v); self }
	pub(crate) fn with_mode_sense(mut self, v: Vec<u8>) -> Self { self.mode_sense = Some(v); self }
	pub(crate) fn with_toc(mut self, v: Vec<u8>) -> Self { self.toc = Some(v); self }
	pub(crate) fn with_cdtext(mut self, v: Vec<u8>) -> Self { self.cdtext = Some(v); self }
	pub(crate) fn with_mcn(mut self, v: Vec<u8>) -> Self { self.mcn = Some(v); self }
	pub(crate) fn with_isrc(mut self, track: u8, v: Vec<u8>) -> Self {
		self.isrc.insert(track, v);
		self
	}
	pub(crate) fn with_leadout(mut self, v: i32) -> Self { self.leadout = v; self }
	pub(crate) fn with_sectors<F>(mut self, cb: F) -> Self
	where F: Fn(i32) -> Vec<u8> + Send + Sync + 'static {
		self.sectors = Arc::new(cb);
		self
	}

	/// # Fail an LBA with these errors, one per attempt.
	pub(crate) fn with_failures(mut self, lba: i32, errs: &[ErrorCode]) -> Self {
		self.failures.insert(lba, errs.iter().copied().collect());
		self
	}
	pub(crate) fn with_c2_error(mut self, lba: i32) -> Self { self.c2.insert(lba); self }
	pub(crate) fn with_q_shift(mut self, lba: i32, shift: i32) -> Self {
		self.q_shift.insert(lba, shift);
		self
	}
	pub(crate) fn with_kill_at(mut self, lba: i32, kill: KillSwitch) -> Self {
		self.kill_at = Some((lba, kill));
		self
	}
	pub(crate) fn with_hang(mut self, v: Duration) -> Self { self.hang = Some(v); self }

	/// # Signal Each Command (before any hang).
	pub(crate) fn with_entered(mut self, tx: Sender<()>) -> Self {
		self.entered = Some(tx);
		self
	}

	/// # LBAs Read (in order).
	pub(crate) fn reads(&self) -> &[i32] { &self.reads }

	/// # Allocation Lengths Requested (TOC/CD-Text only).
	pub(crate) fn alloc_log(&self) -> &[usize] { &self.allocs }
}

impl MockDevice {
	/// # Copy Scripted Reply.
	fn reply(src: Option<&Vec<u8>>, buf: &mut [u8]) -> Result<usize, ErrorCode> {
		let src = src.ok_or(ErrorCode::new(0x70, SenseKey::IllegalRequest, 0x24, 0))?;
		let len = src.len().min(buf.len());
		buf[..len].copy_from_slice(&src[..len]);
		Ok(len)
	}

	/// # Read CD.
	fn read_cd(&mut self, lba: i32, c2: bool, sub_q: bool, buf: &mut [u8])
	-> Result<usize, ErrorCode> {
		self.reads.push(lba);
		if let Some((at, kill)) = &self.kill_at {
			if *at == lba { kill.kill(); }
		}

		if lba < 0 || self.leadout <= lba {
			return Err(ErrorCode::new(0x70, SenseKey::IllegalRequest, 0x21, 0));
		}

		// Build the full reply.
		let mut out = (self.sectors)(lba);
		out.resize(usize::from(CD_DATA_SIZE), 0);
		if c2 {
			let mut bits = vec![0_u8; usize::from(CD_C2_SIZE)];
			if self.c2.contains(&lba) { bits[0] = 0b1000_0001; }
			out.extend_from_slice(&bits);
		}
		if sub_q {
			let abs = lba + self.q_shift.get(&lba).copied().unwrap_or(0) + i32::from(CD_LEADIN);
			let abs = u32::try_from(abs).unwrap_or(0);
			let mut q = vec![0_u8; usize::from(CD_Q_SIZE)];
			q[0] = 0x01;
			q[1] = 0x01;
			q[2] = 0x01;
			q[7] = to_bcd(abs / 75 / 60);
			q[8] = to_bcd(abs / 75 % 60);
			q[9] = to_bcd(abs % 75);
			out.extend_from_slice(&q);
		}

		let len = out.len().min(buf.len());
		buf[..len].copy_from_slice(&out[..len]);

		// Scripted failure?
		if let Some(err) = self.failures.get_mut(&lba).and_then(VecDeque::pop_front) {
			if err.is_recovered() { return Err(err); }
			// Drives failing with a medium error typically return junk.
			buf[..len].fill(0);
			return Err(err);
		}

		Ok(len)
	}
}

impl Transport for MockDevice {
	fn execute(&mut self, cdb: &Cdb, buf: &mut [u8]) -> Result<usize, ErrorCode> {
		if let Some(tx) = &self.entered { let _res = tx.try_send(()); }
		if let Some(hang) = self.hang { std::thread::sleep(hang); }

		if let Some(lba) = cdb.lba() {
			self.read_cd(lba, cdb.wants_c2(), cdb.wants_sub_q(), buf)
		}
		else if cdb.is_toc_raw() {
			self.allocs.push(buf.len());
			Self::reply(self.toc.as_ref(), buf)
		}
		else if cdb.is_cdtext() {
			self.allocs.push(buf.len());
			Self::reply(self.cdtext.as_ref(), buf)
		}
		else if cdb.is_inquiry() { Self::reply(self.inquiry.as_ref(), buf) }
		else if cdb.is_mode_sense() { Self::reply(self.mode_sense.as_ref(), buf) }
		else if cdb.is_mcn() { Self::reply(self.mcn.as_ref(), buf) }
		else if cdb.is_isrc() { Self::reply(self.isrc.get(&cdb.track()), buf) }
		else { Err(ErrorCode::new(0x70, SenseKey::IllegalRequest, 0x20, 0)) }
	}
}



#[derive(Debug, Clone)]
/// # Mock Opener.
///
/// Hands out fresh copies of a template device.
pub(crate) struct MockOpener(pub(crate) Option<MockDevice>);

impl DeviceOpen for MockOpener {
	fn open(&self) -> Result<Box<dyn Transport>, CdRipError> {
		self.0.clone()
			.map(|d| Box::new(d) as Box<dyn Transport>)
			.ok_or_else(|| CdRipError::DeviceOpen("/dev/mock".to_owned()))
	}
}



/// # To BCD.
const fn to_bcd(v: u32) -> u8 { (((v / 10) << 4) | (v % 10)) as u8 }

/// # Raw TOC Builder.
///
/// Build a raw TOC reply for a single audio session with the given track
/// start LBAs and lead-out.
pub(crate) fn raw_toc(starts: &[u32], leadout: u32) -> Vec<u8> {
	let mut out = vec![0_u8, 0, 1, 1];
	let last = u8::try_from(starts.len()).unwrap_or(99);
	let mut push = |point: u8, ctrl: u8, abs: u32, pmin: Option<u8>| {
		let (m, s, f) = crate::frames_to_msf(abs);
		out.extend_from_slice(&[
			1, 0x10 | ctrl, 0, point, 0, 0, 0, 0,
			pmin.unwrap_or(m), if pmin.is_some() { 0 } else { s }, if pmin.is_some() { 0 } else { f },
		]);
	};
	push(0xA0, 0, 0, Some(1));
	push(0xA1, 0, 0, Some(last));
	push(0xA2, 0, leadout + u32::from(CD_LEADIN), None);
	for (k, v) in starts.iter().enumerate() {
		push(u8::try_from(k + 1).unwrap_or(99), 0, v + u32::from(CD_LEADIN), None);
	}
	let len = u16::try_from(out.len() - 2).unwrap_or(u16::MAX);
	out[..2].copy_from_slice(&len.to_be_bytes());
	out
}
