/*!
# CD Rip: Tasks
*/

use crate::{
	CdInfo,
	CdRipError,
	DiscMetadata,
	Drive,
	KillSwitch,
	Log,
	LogEntry,
	LogListener,
	PcmSink,
	read_isrc,
	read_mcn,
	RipOptions,
	RipProgress,
	RipReport,
	Ripper,
	Toc,
	cdtext::read_cdtext,
	drive::read_drive_info,
	scsi::Transport,
	toc::read_toc,
};
use crossbeam_channel::{
	Receiver,
	Sender,
};
use std::{
	fmt,
	sync::Arc,
	thread::JoinHandle,
	time::Duration,
};



#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
/// # Task Kind.
pub enum TaskKind {
	/// # Identify the Drive.
	DriveInfo,

	/// # Read the TOC.
	Toc,

	/// # Read CD-Text.
	CdText,

	/// # Read MCN and ISRCs.
	McnIsrc,

	/// # Rip Audio.
	Rip,
}

impl fmt::Display for TaskKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl TaskKind {
	#[must_use]
	/// # As Str.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::DriveInfo => "drive info",
			Self::Toc => "table of contents",
			Self::CdText => "CD-Text",
			Self::McnIsrc => "MCN/ISRC",
			Self::Rip => "rip",
		}
	}
}



/// # Task.
///
/// A unit of background work against a single drive. Each variant carries
/// only what it needs; everything else comes from the drive's cache.
///
/// Results are committed to the drive's cache only when the task succeeds.
pub enum Task {
	/// # Identify the Drive.
	///
	/// Any previously configured read offset is kept.
	DriveInfo,

	/// # Read the TOC.
	///
	/// If the disc has changed, the cached metadata is reset too.
	Toc,

	/// # Read CD-Text.
	CdText,

	/// # Read MCN and ISRCs.
	McnIsrc,

	/// # Rip Audio.
	///
	/// The TOC is read first if it isn't already cached.
	Rip {
		/// # Options.
		opts: RipOptions,

		/// # Output.
		sink: Box<dyn PcmSink>,
	},
}

impl fmt::Debug for Task {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Rip { opts, .. } => f.debug_struct("Rip")
				.field("opts", opts)
				.finish_non_exhaustive(),
			_ => write!(f, "{:?}", self.kind()),
		}
	}
}

impl Task {
	#[must_use]
	/// # Kind.
	pub const fn kind(&self) -> TaskKind {
		match self {
			Self::DriveInfo => TaskKind::DriveInfo,
			Self::Toc => TaskKind::Toc,
			Self::CdText => TaskKind::CdText,
			Self::McnIsrc => TaskKind::McnIsrc,
			Self::Rip { .. } => TaskKind::Rip,
		}
	}

	/// # Spawn.
	///
	/// Run the task on its own thread. Progress, log entries, and the final
	/// outcome are sent through [`TaskHandle::events`].
	///
	/// ## Errors
	///
	/// Returns an error if the drive is busy with another task or the thread
	/// cannot be started. Requests are never queued.
	pub fn spawn(self, drive: &Arc<Drive>, killed: KillSwitch)
	-> Result<TaskHandle, CdRipError> {
		let kind = self.kind();
		let generation = drive.acquire()?;
		let (tx, events) = crossbeam_channel::unbounded();
		let (done_tx, done) = crossbeam_channel::bounded(1);

		let worker = {
			let drive = Arc::clone(drive);
			let killed = killed.clone();
			std::thread::Builder::new()
				.name(format!("cdrip-{kind}"))
				.spawn(move || {
					let claim = Claim { drive: &drive, generation };
					let outcome = execute(&drive, generation, self, &killed, Events(Some(&tx)));
					drop(claim);

					let _res = tx.send(TaskEvent::Finished(outcome.clone()));
					let _res = done_tx.send(outcome);
				})
		};

		match worker {
			Ok(worker) => Ok(TaskHandle {
				drive: Arc::clone(drive),
				kind,
				killed,
				events,
				done,
				worker: Some(worker),
			}),
			Err(_) => {
				drive.release(generation);
				Err(CdRipError::Bug("unable to spawn task thread"))
			},
		}
	}
}



#[derive(Debug, Clone)]
/// # Task Event.
pub enum TaskEvent {
	/// # Rip Progress.
	Progress(RipProgress),

	/// # Log Entry.
	Log(LogEntry),

	/// # Track Finished.
	///
	/// The track is `None` for whole-disc rips.
	TrackDone {
		/// # Track.
		track: Option<u8>,

		/// # CRC32.
		crc32: u32,
	},

	/// # Task Finished.
	///
	/// This is always the last event.
	Finished(TaskOutcome),
}



#[derive(Debug, Clone)]
/// # Task Outcome.
///
/// A task either succeeds, fails with an error, or is cancelled, in which
/// case it is unsuccessful but has no error.
pub struct TaskOutcome {
	kind: TaskKind,
	success: bool,
	error: Option<CdRipError>,
	log: Log,
	report: Option<RipReport>,
}

impl TaskOutcome {
	/// # Failed.
	fn failed(kind: TaskKind, error: CdRipError, mut log: Log) -> Self {
		log.critical(None, None, error.to_string());
		Self { kind, success: false, error: Some(error), log, report: None }
	}

	/// # Cancelled.
	const fn cancelled(kind: TaskKind, log: Log) -> Self {
		Self { kind, success: false, error: None, log, report: None }
	}

	#[must_use]
	/// # Kind.
	pub const fn kind(&self) -> TaskKind { self.kind }

	#[must_use]
	/// # Success?
	pub const fn is_success(&self) -> bool { self.success }

	#[must_use]
	/// # Cancelled?
	pub const fn is_cancelled(&self) -> bool { ! self.success && self.error.is_none() }

	#[must_use]
	/// # Error.
	pub const fn error(&self) -> Option<&CdRipError> { self.error.as_ref() }

	#[must_use]
	/// # Log.
	pub const fn log(&self) -> &Log { &self.log }

	#[must_use]
	/// # Rip Report.
	///
	/// This is only present for rip tasks. Its log has been moved into the
	/// outcome's.
	pub const fn report(&self) -> Option<&RipReport> { self.report.as_ref() }
}



/// # Task Handle.
pub struct TaskHandle {
	drive: Arc<Drive>,
	kind: TaskKind,
	killed: KillSwitch,
	events: Receiver<TaskEvent>,
	done: Receiver<TaskOutcome>,
	worker: Option<JoinHandle<()>>,
}

impl fmt::Debug for TaskHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TaskHandle")
			.field("drive", &self.drive.path())
			.field("kind", &self.kind)
			.field("killed", &self.killed.killed())
			.finish_non_exhaustive()
	}
}

impl TaskHandle {
	#[must_use]
	/// # Kind.
	pub const fn kind(&self) -> TaskKind { self.kind }

	#[must_use]
	/// # Events.
	pub const fn events(&self) -> &Receiver<TaskEvent> { &self.events }

	#[must_use]
	/// # Is Finished?
	pub fn is_finished(&self) -> bool {
		self.worker.as_ref().map_or(true, JoinHandle::is_finished)
	}

	/// # Cancel.
	///
	/// Ask the task to stop. It will do so at the next sector or sub-step.
	pub fn cancel(&self) { self.killed.kill(); }

	/// # Wait.
	///
	/// Block until the task finishes.
	pub fn wait(mut self) -> TaskOutcome {
		let out = self.done.recv().unwrap_or_else(|_| TaskOutcome::failed(
			self.kind,
			CdRipError::Bug("task worker died"),
			Log::default(),
		));
		if let Some(worker) = self.worker.take() { let _res = worker.join(); }
		out
	}

	/// # Cancel and Wait.
	///
	/// Cancel the task and wait up to `grace` for it to stop. If it doesn't,
	/// the thread is abandoned and the drive forcibly released; anything the
	/// abandoned task tries to save afterward is discarded.
	pub fn cancel_and_wait(mut self, grace: Duration) -> TaskOutcome {
		self.cancel();
		if let Ok(out) = self.done.recv_timeout(grace) {
			if let Some(worker) = self.worker.take() { let _res = worker.join(); }
			return out;
		}

		self.drive.force_release();
		drop(self.worker.take());

		let mut log = Log::default();
		log.error(None, None, format!("The {} task did not stop in time and was abandoned.", self.kind));
		TaskOutcome::cancelled(self.kind, log)
	}
}



/// # Run Blocking.
///
/// Run a task on the current thread. This is meant for initial drive setup,
/// when there is nothing else to do anyway.
///
/// Busy drives are reported as a failed outcome.
pub fn run_blocking(drive: &Drive, task: Task, killed: &KillSwitch) -> TaskOutcome {
	let kind = task.kind();
	let generation = match drive.acquire() {
		Ok(g) => g,
		Err(e) => return TaskOutcome::failed(kind, e, Log::default()),
	};

	let _claim = Claim { drive, generation };
	execute(drive, generation, task, killed, Events(None))
}



/// # Drive Claim.
///
/// This releases the drive when dropped, even if the task panics.
struct Claim<'a> {
	drive: &'a Drive,
	generation: u64,
}

impl Drop for Claim<'_> {
	fn drop(&mut self) { self.drive.release(self.generation); }
}



#[derive(Clone, Copy)]
/// # Event Sender.
struct Events<'a>(Option<&'a Sender<TaskEvent>>);

impl Events<'_> {
	/// # Send.
	///
	/// Nobody listening is fine.
	fn send(self, event: TaskEvent) {
		if let Some(tx) = self.0 { let _res = tx.send(event); }
	}
}



/// # Execute.
fn execute(
	drive: &Drive,
	generation: u64,
	task: Task,
	killed: &KillSwitch,
	events: Events<'_>,
) -> TaskOutcome {
	let kind = task.kind();

	// Log entries are forwarded as they happen.
	let listener = events.0.map(|tx| {
		let tx = tx.clone();
		let cb: LogListener = Arc::new(move |e: &LogEntry| {
			let _res = tx.send(TaskEvent::Log(e.clone()));
		});
		cb
	});
	let mut log = listener.clone().map_or_else(Log::default, Log::with_listener);

	let res = drive.open().and_then(|mut dev| {
		let dev = dev.as_mut();
		match task {
			Task::DriveInfo => task_drive_info(drive, generation, dev, killed).map(|()| None),
			Task::Toc => task_toc(drive, generation, dev, killed).map(|()| None),
			Task::CdText => task_cdtext(drive, generation, dev, &mut log, killed).map(|()| None),
			Task::McnIsrc => task_mcn_isrc(drive, generation, dev, &mut log, killed).map(|()| None),
			Task::Rip { opts, mut sink } =>
				task_rip(drive, generation, dev, opts, sink.as_mut(), killed, events, listener)
					.map(Some),
		}
	});

	let mut out = match res {
		Ok(None) => TaskOutcome { kind, success: true, error: None, log, report: None },
		Ok(Some(mut report)) => {
			log.append(&mut report.take_log());
			TaskOutcome {
				kind,
				success: report.is_success(),
				error: report.error().cloned(),
				log,
				report: Some(report),
			}
		},
		Err(CdRipError::Killed) => TaskOutcome::cancelled(kind, log),
		Err(e) => TaskOutcome::failed(kind, e, log),
	};

	// The listener stays behind; it holds a sender.
	out.log = out.log.take_entries();
	out
}

/// # Commit CD Info.
///
/// A stale claim means the task was abandoned, which is as good as
/// cancelled.
fn commit_cd<F>(drive: &Drive, generation: u64, cb: F) -> Result<(), CdRipError>
where F: FnOnce(&mut CdInfo) {
	if drive.commit_cd(generation, cb) { Ok(()) }
	else { Err(CdRipError::Killed) }
}

/// # Set TOC.
///
/// A different disc invalidates everything else we knew.
fn set_toc(cd: &mut CdInfo, toc: Toc) {
	let same = cd.toc.as_ref().is_some_and(|old| old.signature() == toc.signature());
	if ! same {
		cd.metadata = DiscMetadata::from(&toc);
		cd.toc = Some(toc);
	}
}

/// # Task: Drive Info.
fn task_drive_info(drive: &Drive, generation: u64, dev: &mut dyn Transport, killed: &KillSwitch)
-> Result<(), CdRipError> {
	let mut info = read_drive_info(dev, killed)?;
	let ok = drive.commit_info(generation, |slot| {
		if let Some(old) = slot.as_ref() { info.set_offset(old.offset()); }
		*slot = Some(info);
	});

	if ok { Ok(()) }
	else { Err(CdRipError::Killed) }
}

/// # Task: TOC.
fn task_toc(drive: &Drive, generation: u64, dev: &mut dyn Transport, killed: &KillSwitch)
-> Result<(), CdRipError> {
	let toc = read_toc(dev, killed)?;
	commit_cd(drive, generation, |cd| set_toc(cd, toc))
}

/// # Task: CD-Text.
fn task_cdtext(
	drive: &Drive,
	generation: u64,
	dev: &mut dyn Transport,
	log: &mut Log,
	killed: &KillSwitch,
) -> Result<(), CdRipError> {
	let text = read_cdtext(dev, log, killed)?;
	if text.is_empty() { log.info(None, None, "The disc has no CD-Text."); }
	commit_cd(drive, generation, |cd| cd.metadata.apply_cdtext(&text))
}

/// # Task: MCN/ISRC.
///
/// Tracks without a readable ISRC are logged and skipped.
fn task_mcn_isrc(
	drive: &Drive,
	generation: u64,
	dev: &mut dyn Transport,
	log: &mut Log,
	killed: &KillSwitch,
) -> Result<(), CdRipError> {
	let (toc, fresh) = match drive.toc() {
		Some(toc) => (toc, false),
		None => (read_toc(dev, killed)?, true),
	};

	let mcn = read_mcn(dev, killed)?;
	let mut isrcs = Vec::new();
	for t in toc.audio_tracks() {
		match read_isrc(dev, t.number(), killed) {
			Ok(Some(isrc)) => { isrcs.push((t.number(), isrc)); },
			Ok(None) => {},
			Err(CdRipError::Killed) => return Err(CdRipError::Killed),
			Err(e) => { log.warning(Some(t.number()), None, e.to_string()); },
		}
	}

	commit_cd(drive, generation, |cd| {
		if fresh { set_toc(cd, toc); }
		if let Some(mcn) = mcn { cd.metadata.apply_mcn(mcn); }
		for (n, isrc) in isrcs { cd.metadata.apply_isrc(n, isrc); }
	})
}

#[allow(clippy::too_many_arguments)]
/// # Task: Rip.
///
/// The report is returned as-is, success or not. Track checksums are saved
/// to the cached TOC only if everything worked out.
fn task_rip(
	drive: &Drive,
	generation: u64,
	dev: &mut dyn Transport,
	opts: RipOptions,
	sink: &mut dyn PcmSink,
	killed: &KillSwitch,
	events: Events<'_>,
	listener: Option<LogListener>,
) -> Result<RipReport, CdRipError> {
	let (toc, fresh) = match drive.toc() {
		Some(toc) => (toc, false),
		None => (read_toc(dev, killed)?, true),
	};

	let mut ripper = Ripper::new(&toc, opts, killed.clone())
		.with_progress(move |p| events.send(TaskEvent::Progress(p)))
		.with_track_done(move |track, crc32| events.send(TaskEvent::TrackDone { track, crc32 }));
	if let Some(listener) = listener { ripper = ripper.with_log_listener(listener); }
	let report = ripper.rip(dev, sink);
	drop(ripper);

	if report.is_success() {
		let sig = toc.signature();
		commit_cd(drive, generation, |cd| {
			if fresh { set_toc(cd, toc); }
			if let Some(cached) = cd.toc.as_mut().filter(|t| t.signature() == sig) {
				for t in cached.tracks_mut() {
					if let Some(crc) = report.crc32().get(&t.number()) { t.set_crc32(*crc); }
				}
			}
		})?;
	}

	Ok(report)
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::{
		crc32,
		MemorySink,
		cdtext::test::{
			pack,
			reply as cdtext_reply,
		},
		drive::test::{
			inquiry,
			mode_sense,
		},
		ReadOffset,
		scsi::mock::{
			MockDevice,
			MockOpener,
			raw_toc,
		},
		subchannel::test::reply as subq_reply,
	};
	use std::sync::Mutex;

	/// # Shared Memory Sink.
	///
	/// Tasks take ownership of their sinks, so tests need a way to peek.
	#[derive(Clone, Default)]
	struct SharedSink(Arc<Mutex<MemorySink>>);

	impl PcmSink for SharedSink {
		fn start_track(&mut self, track: Option<u8>) -> Result<(), CdRipError> {
			self.0.lock().expect("Poisoned.").start_track(track)
		}
		fn write(&mut self, data: &[u8]) -> Result<(), CdRipError> {
			self.0.lock().expect("Poisoned.").write(data)
		}
		fn finish_track(&mut self) -> Result<(), CdRipError> {
			self.0.lock().expect("Poisoned.").finish_track()
		}
		fn abort_track(&mut self) { self.0.lock().expect("Poisoned.").abort_track(); }
	}

	/// # Two-Track Disc.
	fn device() -> MockDevice {
		MockDevice::default()
			.with_inquiry(inquiry("ACME", "CD-1000", "1.0"))
			.with_mode_sense(mode_sense(0, 0b0001_0001))
			.with_toc(raw_toc(&[0, 1000], 2000))
			.with_leadout(2000)
	}

	/// # Drive.
	fn drive(dev: MockDevice) -> Arc<Drive> {
		Arc::new(Drive::with_opener("/dev/mock", Arc::new(MockOpener(Some(dev)))))
	}

	#[test]
	fn t_drive_info() {
		let drive = drive(device());
		let killed = KillSwitch::default();

		let out = run_blocking(&drive, Task::DriveInfo, &killed);
		assert!(out.is_success());
		assert_eq!(out.kind(), TaskKind::DriveInfo);
		assert_eq!(drive.info().map(|i| i.to_string()), Some("ACME CD-1000 (1.0)".to_owned()));

		// The offset survives re-identification.
		drive.set_offset(ReadOffset::try_from(6_i16).expect("Offset failed."));
		let out = Task::DriveInfo.spawn(&drive, killed).expect("Spawn failed.").wait();
		assert!(out.is_success());
		assert_eq!(drive.info().map(|i| i.offset().samples()), Some(6));
		assert!(! drive.is_busy());
	}

	#[test]
	fn t_readers() {
		let dev = device()
			.with_mcn(subq_reply(2, 0, b"0008811126827"))
			.with_isrc(1, subq_reply(3, 1, b"USRC17607839"))
			.with_isrc(2, subq_reply(3, 2, &[0; 12]))
			.with_cdtext(cdtext_reply(&[pack(0x80, 0, 0, b"Album\0Hello\0")]));
		let drive = drive(dev);
		let killed = KillSwitch::default();

		// MCN/ISRC reads the TOC itself if need be.
		let out = run_blocking(&drive, Task::McnIsrc, &killed);
		assert!(out.is_success(), "{:?}", out.error());
		assert!(drive.toc().is_some());

		let out = run_blocking(&drive, Task::CdText, &killed);
		assert!(out.is_success(), "{:?}", out.error());

		let meta = drive.cd_info().metadata;
		assert_eq!(meta.mcn().map(ToString::to_string), Some("0008811126827".to_owned()));
		assert_eq!(
			meta.track(1).and_then(|t| t.isrc()).map(ToString::to_string),
			Some("US-RC1-76-07839".to_owned()),
		);
		assert!(meta.track(2).and_then(|t| t.isrc()).is_none());
		assert_eq!(meta.album().map(String::as_str), Some("Album"));
		assert_eq!(meta.track(1).and_then(|t| t.title()).map(String::as_str), Some("Hello"));

		// Re-reading the same disc leaves the metadata alone.
		assert!(run_blocking(&drive, Task::Toc, &killed).is_success());
		assert_eq!(drive.cd_info().metadata, meta);
	}

	#[test]
	fn t_failure() {
		// No TOC, no rip.
		let drive = drive(MockDevice::default());
		let killed = KillSwitch::default();
		let out = run_blocking(&drive, Task::Toc, &killed);
		assert!(! out.is_success());
		assert!(! out.is_cancelled());
		assert!(out.error().is_some());
		assert!(drive.toc().is_none(), "Failures commit nothing.");
		assert!(! drive.is_busy());

		// No device at all.
		let drive = Arc::new(Drive::with_opener("/dev/mock", Arc::new(MockOpener(None))));
		let out = run_blocking(&drive, Task::Toc, &killed);
		assert!(matches!(out.error(), Some(CdRipError::DeviceOpen(_))));
	}

	#[test]
	fn t_rip() {
		let drive = drive(device());
		let killed = KillSwitch::default();
		assert!(run_blocking(&drive, Task::Toc, &killed).is_success());

		let sink = SharedSink::default();
		let opts = RipOptions::default().with_track(1).with_track(2);
		let handle = Task::Rip { opts, sink: Box::new(sink.clone()) }
			.spawn(&drive, killed)
			.expect("Spawn failed.");
		assert_eq!(handle.kind(), TaskKind::Rip);

		let events = handle.events().clone();
		let out = handle.wait();
		assert!(out.is_success(), "{:?}", out.error());

		let events: Vec<TaskEvent> = events.try_iter().collect();
		let progress = events.iter().filter(|e| matches!(e, TaskEvent::Progress(_))).count();
		assert_eq!(progress, 2000);
		let done: Vec<_> = events.iter()
			.filter_map(|e| match e {
				TaskEvent::TrackDone { track, crc32 } => Some((*track, *crc32)),
				_ => None,
			})
			.collect();
		let zero = crc32(&vec![0; 1000 * 2352]);
		assert_eq!(done, [(Some(1), zero), (Some(2), zero)]);
		assert!(matches!(events.last(), Some(TaskEvent::Finished(_))));

		// Log entries arrive as they happen, not in a pile at the end.
		let logs: Vec<usize> = events.iter()
			.enumerate()
			.filter_map(|(k, e)| matches!(e, TaskEvent::Log(_)).then_some(k))
			.collect();
		assert_eq!(logs.len(), out.log().len());
		let last_progress = events.iter()
			.rposition(|e| matches!(e, TaskEvent::Progress(_)))
			.expect("Missing progress.");
		assert!(logs.first().is_some_and(|&k| k < last_progress));

		// All-zero audio.
		let report = out.report().expect("Missing report.");
		assert_eq!(report.ar_v1().get(&1), Some(&0));
		assert_eq!(report.ar_v1().get(&2), Some(&0));

		let sink = sink.0.lock().expect("Poisoned.");
		assert_eq!(sink.get(Some(1)).map(<[u8]>::len), Some(1000 * 2352));
		assert_eq!(sink.get(Some(2)).map(<[u8]>::len), Some(1000 * 2352));

		// The checksums were saved.
		let toc = drive.toc().expect("Missing TOC.");
		assert!(toc.tracks().iter().all(|t| t.crc32() == Some(zero)));
	}

	#[test]
	fn t_cancel() {
		let killed = KillSwitch::default();
		let drive = drive(device().with_kill_at(500, killed.clone()));
		assert!(run_blocking(&drive, Task::Toc, &KillSwitch::default()).is_success());
		let before = drive.toc();

		let sink = SharedSink::default();
		let opts = RipOptions::default().with_track(1);
		let out = Task::Rip { opts, sink: Box::new(sink.clone()) }
			.spawn(&drive, killed)
			.expect("Spawn failed.")
			.wait();

		assert!(out.is_cancelled());
		assert!(out.error().is_none());
		assert!(sink.0.lock().expect("Poisoned.").tracks().is_empty(), "Nothing was kept.");
		assert_eq!(drive.toc(), before, "The TOC is untouched.");
		assert!(! drive.is_busy());
	}

	#[test]
	fn t_busy() {
		let drive = drive(device().with_hang(Duration::from_millis(50)));
		let handle = Task::Toc.spawn(&drive, KillSwitch::default()).expect("Spawn failed.");

		// One at a time.
		assert!(matches!(
			Task::DriveInfo.spawn(&drive, KillSwitch::default()),
			Err(CdRipError::Busy(_)),
		));
		let out = run_blocking(&drive, Task::DriveInfo, &KillSwitch::default());
		assert!(matches!(out.error(), Some(CdRipError::Busy(_))));

		assert!(handle.wait().is_success());
		assert!(! drive.is_busy());
	}

	#[test]
	fn t_abandon() {
		let (tx, rx) = crossbeam_channel::bounded(1);
		let drive = drive(
			device().with_hang(Duration::from_millis(300)).with_entered(tx)
		);
		let generation = drive.generation();
		let handle = Task::Toc.spawn(&drive, KillSwitch::default()).expect("Spawn failed.");

		// Wait until the worker is stuck in the device.
		rx.recv_timeout(Duration::from_secs(5)).expect("The worker never reached the device.");
		let out = handle.cancel_and_wait(Duration::from_millis(10));
		assert!(out.is_cancelled());
		assert_eq!(out.log().worst(), Some(crate::LogLevel::Error));
		assert!(! drive.is_busy(), "The drive should be free.");
		assert_ne!(drive.generation(), generation);

		// The abandoned thread never gets to save anything.
		std::thread::sleep(Duration::from_millis(700));
		assert!(drive.toc().is_none());
		assert!(! drive.is_busy());
	}
}
