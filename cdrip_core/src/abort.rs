/*!
# CD Rip: Kill Switch
*/

use std::sync::{
	Arc,
	atomic::{
		AtomicBool,
		Ordering::{
			Acquire,
			Release,
		},
	},
};



#[derive(Debug, Clone, Default)]
/// # Kill Switch.
///
/// This is a short-circuit for long-running operations across multiple
/// threads. Readers check it between steps and the ripper checks it between
/// sectors, bailing with a "not successful" result once it has been flipped.
///
/// Clones share the same underlying flag.
pub struct KillSwitch(Arc<AtomicBool>);

impl From<Arc<AtomicBool>> for KillSwitch {
	#[inline]
	fn from(src: Arc<AtomicBool>) -> Self { Self(src) }
}

impl KillSwitch {
	#[must_use]
	/// # New Instance.
	pub fn new() -> Self { Self::default() }

	/// # Kill!
	pub fn kill(&self) { self.0.store(true, Release); }

	#[must_use]
	/// # Dead?
	pub fn killed(&self) -> bool { self.0.load(Acquire) }

	#[must_use]
	/// # Inner Flag.
	///
	/// Return a copy of the shared flag, e.g. for a CTRL+C handler.
	pub fn inner(&self) -> Arc<AtomicBool> { Arc::clone(&self.0) }
}
