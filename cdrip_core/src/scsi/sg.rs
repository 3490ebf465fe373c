/*!
# CD Rip: SG_IO Pass-Through

Linux exposes a generic SCSI pass-through on the `/dev/sr*` (and `/dev/sg*`)
nodes via the `SG_IO` ioctl. Other platforms get a stub that refuses to
open.
*/

use crate::{
	CdRipError,
	scsi::{
		Cdb,
		DeviceOpen,
		ErrorCode,
		Transport,
	},
};
use std::{
	fs::File,
	path::{
		Path,
		PathBuf,
	},
};



#[derive(Debug, Clone, Eq, PartialEq)]
/// # SG_IO Opener.
///
/// This opens a new [`SgDevice`] for the path on demand.
pub struct SgOpener(PathBuf);

impl SgOpener {
	#[must_use]
	/// # New.
	pub fn new<P>(path: P) -> Self
	where P: AsRef<Path> {
		Self(path.as_ref().to_path_buf())
	}

	#[must_use]
	/// # Path.
	pub fn path(&self) -> &Path { &self.0 }
}

impl DeviceOpen for SgOpener {
	fn open(&self) -> Result<Box<dyn Transport>, CdRipError> {
		SgDevice::open(&self.0).map(|d| Box::new(d) as Box<dyn Transport>)
	}
}



#[derive(Debug)]
/// # SG_IO Device.
pub struct SgDevice {
	#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
	file: File,
	path: PathBuf,
}

impl SgDevice {
	#[must_use]
	/// # Path.
	pub fn path(&self) -> &Path { &self.path }
}

#[cfg(target_os = "linux")]
mod linux {
	use super::*;
	use std::{
		fs::OpenOptions,
		os::unix::{
			fs::OpenOptionsExt,
			io::AsRawFd,
		},
	};

	/// # SG_IO ioctl Request.
	const SG_IO: u32 = 0x2285;

	/// # No Data Transfer.
	const SG_DXFER_NONE: libc::c_int = -1;

	/// # Device to Host.
	const SG_DXFER_FROM_DEV: libc::c_int = -3;

	/// # Info: OK Mask.
	const SG_INFO_OK_MASK: libc::c_uint = 0x1;

	/// # Sense Buffer Size.
	const SENSE_LEN: usize = 32;

	/// # Command Timeout (ms).
	const TIMEOUT: libc::c_uint = 30_000;



	#[repr(C)]
	/// # `sg_io_hdr_t`.
	struct SgIoHdr {
		interface_id: libc::c_int,
		dxfer_direction: libc::c_int,
		cmd_len: libc::c_uchar,
		mx_sb_len: libc::c_uchar,
		iovec_count: libc::c_ushort,
		dxfer_len: libc::c_uint,
		dxferp: *mut libc::c_void,
		cmdp: *mut libc::c_uchar,
		sbp: *mut libc::c_uchar,
		timeout: libc::c_uint,
		flags: libc::c_uint,
		pack_id: libc::c_int,
		usr_ptr: *mut libc::c_void,
		status: libc::c_uchar,
		masked_status: libc::c_uchar,
		msg_status: libc::c_uchar,
		sb_len_wr: libc::c_uchar,
		host_status: libc::c_ushort,
		driver_status: libc::c_ushort,
		resid: libc::c_int,
		duration: libc::c_uint,
		info: libc::c_uint,
	}

	impl SgDevice {
		/// # Open.
		///
		/// Read/write access is needed for pass-through on most systems, but
		/// some permit it read-only, so that is tried second.
		///
		/// ## Errors
		///
		/// Returns an error if the device cannot be opened either way.
		pub fn open<P>(path: P) -> Result<Self, CdRipError>
		where P: AsRef<Path> {
			let path = path.as_ref();
			OpenOptions::new()
				.read(true)
				.write(true)
				.custom_flags(libc::O_NONBLOCK)
				.open(path)
				.or_else(|_|
					OpenOptions::new()
						.read(true)
						.custom_flags(libc::O_NONBLOCK)
						.open(path)
				)
				.map(|file| Self { file, path: path.to_path_buf() })
				.map_err(|_| CdRipError::DeviceOpen(path.to_string_lossy().into_owned()))
		}
	}

	impl Transport for SgDevice {
		#[allow(unsafe_code)]
		fn execute(&mut self, cdb: &Cdb, buf: &mut [u8]) -> Result<usize, ErrorCode> {
			let mut cmd = [0_u8; 12];
			let cmd_len = cdb.len();
			cmd[..usize::from(cmd_len)].copy_from_slice(cdb.as_slice());
			let mut sense = [0_u8; SENSE_LEN];
			let dxfer_len = libc::c_uint::try_from(buf.len())
				.map_err(|_| ErrorCode::default())?;

			let mut hdr = SgIoHdr {
				interface_id: libc::c_int::from(b'S'),
				dxfer_direction:
					if buf.is_empty() { SG_DXFER_NONE }
					else { SG_DXFER_FROM_DEV },
				cmd_len,
				mx_sb_len: SENSE_LEN as libc::c_uchar,
				iovec_count: 0,
				dxfer_len,
				dxferp: buf.as_mut_ptr().cast(),
				cmdp: cmd.as_mut_ptr(),
				sbp: sense.as_mut_ptr(),
				timeout: TIMEOUT,
				flags: 0,
				pack_id: 0,
				usr_ptr: std::ptr::null_mut(),
				status: 0,
				masked_status: 0,
				msg_status: 0,
				sb_len_wr: 0,
				host_status: 0,
				driver_status: 0,
				resid: 0,
				duration: 0,
				info: 0,
			};

			// Safety: every pointer in the header refers to a live local
			// buffer whose length matches the corresponding size field.
			let res = unsafe {
				libc::ioctl(self.file.as_raw_fd(), SG_IO as _, std::ptr::addr_of_mut!(hdr))
			};
			if res < 0 { return Err(ErrorCode::default()); }

			let resid = usize::try_from(hdr.resid).unwrap_or(0);
			let transferred = buf.len().saturating_sub(resid);

			if
				0 == hdr.info & SG_INFO_OK_MASK &&
				0 == hdr.status &&
				0 == hdr.host_status &&
				0 == hdr.driver_status
			{
				Ok(transferred)
			}
			else {
				let len = usize::from(hdr.sb_len_wr).min(SENSE_LEN);
				Err(ErrorCode::from_sense(&sense[..len]))
			}
		}
	}
}

#[cfg(not(target_os = "linux"))]
mod other {
	use super::*;

	impl SgDevice {
		/// # Open.
		///
		/// ## Errors
		///
		/// SCSI pass-through is only implemented for Linux.
		pub fn open<P>(path: P) -> Result<Self, CdRipError>
		where P: AsRef<Path> {
			Err(CdRipError::DeviceOpen(path.as_ref().to_string_lossy().into_owned()))
		}
	}

	impl Transport for SgDevice {
		fn execute(&mut self, _cdb: &Cdb, _buf: &mut [u8]) -> Result<usize, ErrorCode> {
			Err(ErrorCode::default())
		}
	}
}
