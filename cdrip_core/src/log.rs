/*!
# CD Rip: Log
*/

use fyi_msg::Msg;
use std::{
	fmt,
	sync::Arc,
};
use utc2k::FmtUtc2k;



/// # Log Listener.
///
/// A callback run for each entry as it is logged.
pub type LogListener = Arc<dyn Fn(&LogEntry) + Send + Sync>;



#[derive(Debug, Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
/// # Log Level.
pub enum LogLevel {
	/// # Informational.
	Info,

	/// # Possible Problem.
	Warning,

	/// # Operation Failed.
	Error,

	/// # Task Failed.
	Critical,
}

impl LogLevel {
	#[must_use]
	/// # As Str.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Info => "INFO",
			Self::Warning => "WARNING",
			Self::Error => "ERROR",
			Self::Critical => "CRITICAL",
		}
	}
}



#[derive(Debug, Clone, Eq, PartialEq)]
/// # Log Entry.
pub struct LogEntry {
	level: LogLevel,
	time: FmtUtc2k,
	track: Option<u8>,
	sector: Option<i32>,
	message: String,
}

impl fmt::Display for LogEntry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[{}] {:<8}", self.time, self.level.as_str())?;
		if let Some(t) = self.track { write!(f, " {t:02}")?; }
		if let Some(s) = self.sector { write!(f, " {s:06}")?; }
		write!(f, " {}", self.message)
	}
}

impl From<&LogEntry> for Msg {
	fn from(src: &LogEntry) -> Self {
		let msg = match (src.track, src.sector) {
			(Some(t), Some(s)) => format!("Track #{t:02}, sector {s}: {}", src.message),
			(Some(t), None) => format!("Track #{t:02}: {}", src.message),
			(None, Some(s)) => format!("Sector {s}: {}", src.message),
			(None, None) => src.message.clone(),
		};
		match src.level {
			LogLevel::Info => Self::info(msg),
			LogLevel::Warning => Self::warning(msg),
			LogLevel::Error => Self::error(msg),
			LogLevel::Critical => Self::custom("Critical", 199, &msg),
		}
	}
}

impl LogEntry {
	#[must_use]
	/// # Level.
	pub const fn level(&self) -> LogLevel { self.level }

	#[must_use]
	/// # Timestamp.
	pub const fn time(&self) -> &FmtUtc2k { &self.time }

	#[must_use]
	/// # Track.
	pub const fn track(&self) -> Option<u8> { self.track }

	#[must_use]
	/// # Sector.
	pub const fn sector(&self) -> Option<i32> { self.sector }

	#[must_use]
	/// # Message.
	pub fn message(&self) -> &str { &self.message }
}



#[derive(Clone, Default)]
/// # Operation Log.
///
/// Readers and the ripper collect their noteworthy happenings here rather
/// than printing them directly; the caller decides what to surface.
///
/// A log can optionally carry a [`LogListener`] to hear about entries as
/// they happen. Listeners don't factor into equality.
pub struct Log {
	entries: Vec<LogEntry>,
	listener: Option<LogListener>,
}

impl fmt::Debug for Log {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Log").field(&self.entries).finish()
	}
}

impl Eq for Log {}

impl PartialEq for Log {
	fn eq(&self, other: &Self) -> bool { self.entries == other.entries }
}

impl Log {
	#[must_use]
	/// # With Listener.
	pub fn with_listener(listener: LogListener) -> Self {
		Self { entries: Vec::new(), listener: Some(listener) }
	}

	/// # Push.
	pub fn push<S>(&mut self, level: LogLevel, track: Option<u8>, sector: Option<i32>, msg: S)
	where S: Into<String> {
		let entry = LogEntry {
			level,
			time: FmtUtc2k::now(),
			track,
			sector,
			message: msg.into(),
		};
		if let Some(cb) = self.listener.as_ref() { cb(&entry); }
		self.entries.push(entry);
	}

	/// # Info.
	pub fn info<S>(&mut self, track: Option<u8>, sector: Option<i32>, msg: S)
	where S: Into<String> { self.push(LogLevel::Info, track, sector, msg); }

	/// # Warning.
	pub fn warning<S>(&mut self, track: Option<u8>, sector: Option<i32>, msg: S)
	where S: Into<String> { self.push(LogLevel::Warning, track, sector, msg); }

	/// # Error.
	pub fn error<S>(&mut self, track: Option<u8>, sector: Option<i32>, msg: S)
	where S: Into<String> { self.push(LogLevel::Error, track, sector, msg); }

	/// # Critical.
	pub fn critical<S>(&mut self, track: Option<u8>, sector: Option<i32>, msg: S)
	where S: Into<String> { self.push(LogLevel::Critical, track, sector, msg); }

	/// # Append.
	///
	/// Move the other log's entries onto the end of this one. The listener,
	/// if any, is not told about them.
	pub fn append(&mut self, other: &mut Self) { self.entries.append(&mut other.entries); }

	/// # Drain.
	pub fn drain(&mut self) -> std::vec::Drain<'_, LogEntry> { self.entries.drain(..) }

	#[must_use]
	/// # Take Entries.
	///
	/// Move the entries into a new listener-free log, leaving this one empty
	/// (but still listening).
	pub fn take_entries(&mut self) -> Self {
		Self { entries: std::mem::take(&mut self.entries), listener: None }
	}
}

impl Log {
	#[must_use]
	/// # Entries.
	pub fn entries(&self) -> &[LogEntry] { &self.entries }

	#[must_use]
	/// # Is Empty?
	pub fn is_empty(&self) -> bool { self.entries.is_empty() }

	#[must_use]
	/// # Length.
	pub fn len(&self) -> usize { self.entries.len() }

	#[must_use]
	/// # Worst Level.
	pub fn worst(&self) -> Option<LogLevel> { self.entries.iter().map(|e| e.level).max() }
}
