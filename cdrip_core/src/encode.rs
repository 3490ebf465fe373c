/*!
# CD Rip: Encode Queue
*/

use crate::CdRipError;
use crossbeam_channel::{
	Receiver,
	Sender,
};
use std::{
	fmt,
	path::{
		Path,
		PathBuf,
	},
	process::{
		Command,
		Stdio,
	},
	thread::JoinHandle,
};



/// # Encode Job.
///
/// Something to do with a finished track, like transcoding it.
pub trait EncodeJob: Send {
	/// # Label.
	///
	/// A short description for status messages.
	fn label(&self) -> String;

	/// # Run.
	///
	/// ## Errors
	///
	/// Returns an error if the job fails.
	fn run(&mut self) -> Result<(), CdRipError>;
}



#[derive(Debug, Clone, Eq, PartialEq)]
/// # Command Job.
///
/// Run an external program against a ripped file. The command template is
/// split on whitespace; `%i` and `%o` are replaced with the input and output
/// paths, respectively.
///
/// ```
/// use cdrip_core::CommandJob;
///
/// let job = CommandJob::new("flac -8 %i -o %o", "a.wav", "a.flac").unwrap();
/// assert_eq!(job.program(), "flac");
/// assert_eq!(job.args(), ["-8", "a.wav", "-o", "a.flac"]);
/// ```
pub struct CommandJob {
	program: String,
	args: Vec<String>,
	output: PathBuf,
}

impl EncodeJob for CommandJob {
	fn label(&self) -> String { self.output.to_string_lossy().into_owned() }

	fn run(&mut self) -> Result<(), CdRipError> {
		let status = Command::new(&self.program)
			.args(&self.args)
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.status()
			.map_err(|_| CdRipError::Encode(self.label()))?;

		if status.success() { Ok(()) }
		else { Err(CdRipError::Encode(self.label())) }
	}
}

impl CommandJob {
	/// # New.
	///
	/// ## Errors
	///
	/// Returns an error if the template is empty.
	pub fn new<P1, P2>(template: &str, input: P1, output: P2) -> Result<Self, CdRipError>
	where P1: AsRef<Path>, P2: AsRef<Path> {
		let input = input.as_ref().to_string_lossy();
		let output = output.as_ref();
		let output_str = output.to_string_lossy();

		let mut parts = template.split_whitespace()
			.map(|v| v.replace("%i", &input).replace("%o", &output_str));
		let program = parts.next()
			.ok_or_else(|| CdRipError::Encode(template.to_owned()))?;

		Ok(Self {
			program,
			args: parts.collect(),
			output: output.to_path_buf(),
		})
	}

	#[must_use]
	/// # Program.
	pub fn program(&self) -> &str { &self.program }

	#[must_use]
	/// # Arguments.
	pub fn args(&self) -> &[String] { &self.args }

	#[must_use]
	/// # Output Path.
	pub fn output(&self) -> &Path { &self.output }
}



#[derive(Debug, Clone, Eq, PartialEq)]
/// # Encode Event.
pub enum EncodeEvent {
	/// # Job Started.
	Started(String),

	/// # Job Finished.
	Finished(String),

	/// # Job Failed.
	Failed(String, CdRipError),
}

impl fmt::Display for EncodeEvent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Started(s) => write!(f, "Encoding {s}…"),
			Self::Finished(s) => write!(f, "Encoded {s}."),
			Self::Failed(s, e) => write!(f, "Encoding {s} failed: {e}"),
		}
	}
}



/// # Encode Queue.
///
/// Jobs run one at a time, in the order received, on a dedicated worker
/// thread. Ripping can thus continue while earlier tracks are encoded.
///
/// Dropping the queue waits for any outstanding jobs to finish.
pub struct EncodeQueue {
	tx: Option<Sender<Box<dyn EncodeJob>>>,
	events: Receiver<EncodeEvent>,
	worker: Option<JoinHandle<()>>,
}

impl fmt::Debug for EncodeQueue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EncodeQueue")
			.field("pending", &self.tx.as_ref().map_or(0, Sender::len))
			.finish_non_exhaustive()
	}
}

impl Default for EncodeQueue {
	fn default() -> Self { Self::new() }
}

impl Drop for EncodeQueue {
	fn drop(&mut self) { self.close(); }
}

impl EncodeQueue {
	#[must_use]
	/// # New.
	pub fn new() -> Self {
		let (tx, rx) = crossbeam_channel::unbounded::<Box<dyn EncodeJob>>();
		let (etx, events) = crossbeam_channel::unbounded();

		let worker = std::thread::spawn(move || {
			for mut job in rx {
				let label = job.label();
				let _res = etx.send(EncodeEvent::Started(label.clone()));
				let event = match job.run() {
					Ok(()) => EncodeEvent::Finished(label),
					Err(e) => EncodeEvent::Failed(label, e),
				};
				let _res = etx.send(event);
			}
		});

		Self {
			tx: Some(tx),
			events,
			worker: Some(worker),
		}
	}

	/// # Push Job.
	///
	/// ## Errors
	///
	/// Returns an error if the queue has been closed.
	pub fn push(&self, job: Box<dyn EncodeJob>) -> Result<(), CdRipError> {
		self.tx.as_ref()
			.ok_or(CdRipError::Bug("encode queue closed"))?
			.send(job)
			.map_err(|_| CdRipError::Bug("encode worker stopped"))
	}

	#[must_use]
	/// # Events.
	///
	/// Events arrive in job order; each job produces a `Started` followed
	/// by either `Finished` or `Failed`.
	pub const fn events(&self) -> &Receiver<EncodeEvent> { &self.events }

	/// # Finish.
	///
	/// Wait for all queued jobs to complete and return any events that
	/// haven't been received yet.
	pub fn finish(mut self) -> Vec<EncodeEvent> {
		self.close();
		self.events.try_iter().collect()
	}

	/// # Close.
	fn close(&mut self) {
		// Dropping the sender ends the worker's loop once the queue drains.
		drop(self.tx.take());
		if let Some(worker) = self.worker.take() { let _res = worker.join(); }
	}
}



#[cfg(test)]
mod test {
	use super::*;
	use std::sync::{
		Arc,
		atomic::{
			AtomicBool,
			Ordering::SeqCst,
		},
		Mutex,
	};

	/// # Test Job.
	struct TestJob {
		id: usize,
		fail: bool,
		busy: Arc<AtomicBool>,
		done: Arc<Mutex<Vec<usize>>>,
	}

	impl EncodeJob for TestJob {
		fn label(&self) -> String { self.id.to_string() }

		fn run(&mut self) -> Result<(), CdRipError> {
			assert!(! self.busy.swap(true, SeqCst), "Two jobs ran at once.");
			std::thread::sleep(std::time::Duration::from_millis(5));
			self.done.lock().expect("Poisoned.").push(self.id);
			self.busy.store(false, SeqCst);
			if self.fail { Err(CdRipError::Encode(self.label())) }
			else { Ok(()) }
		}
	}

	#[test]
	fn t_queue() {
		let busy = Arc::new(AtomicBool::new(false));
		let done = Arc::new(Mutex::new(Vec::new()));

		let queue = EncodeQueue::new();
		for id in 0..5 {
			queue.push(Box::new(TestJob {
				id,
				fail: id == 3,
				busy: Arc::clone(&busy),
				done: Arc::clone(&done),
			})).expect("Push failed.");
		}

		let events = queue.finish();
		assert_eq!(*done.lock().expect("Poisoned."), [0, 1, 2, 3, 4]);
		assert_eq!(events.len(), 10);
		assert_eq!(events[0], EncodeEvent::Started("0".to_owned()));
		assert_eq!(events[1], EncodeEvent::Finished("0".to_owned()));
		assert_eq!(
			events[7],
			EncodeEvent::Failed("3".to_owned(), CdRipError::Encode("3".to_owned())),
		);
	}

	#[test]
	fn t_command() {
		let job = CommandJob::new("  enc  -q %i   --out=%o ", "/tmp/a b.wav", "/tmp/a.flac")
			.expect("Job failed.");
		assert_eq!(job.program(), "enc");
		assert_eq!(job.args(), ["-q", "/tmp/a b.wav", "--out=/tmp/a.flac"]);
		assert_eq!(job.output(), Path::new("/tmp/a.flac"));
		assert_eq!(job.label(), "/tmp/a.flac");

		assert!(CommandJob::new("   ", "a", "b").is_err());
	}

	#[cfg(unix)]
	#[test]
	fn t_command_run() {
		let mut job = CommandJob::new("true %i %o", "a", "b").expect("Job failed.");
		assert_eq!(job.run(), Ok(()));

		let mut job = CommandJob::new("false", "a", "b").expect("Job failed.");
		assert_eq!(job.run(), Err(CdRipError::Encode("b".to_owned())));

		let mut job = CommandJob::new("/no/such/program", "a", "b").expect("Job failed.");
		assert!(job.run().is_err());
	}
}
