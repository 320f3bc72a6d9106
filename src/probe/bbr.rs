use std::ffi::c_void;
use std::io;
use std::mem::size_of;
use std::os::fd::{AsFd, AsRawFd, OwnedFd};

use tokio::net::TcpStream;
use tracing::debug;

use super::{BandwidthSample, CongestionProbe};

/// `TCP_CC_INFO` from `linux/tcp.h`.
const TCP_CC_INFO: libc::c_int = 26;
/// `TCP_CA_NAME_MAX` from `net/tcp.h`.
const CA_NAME_MAX: usize = 16;
const BBR: &[u8] = b"bbr";

/// `struct tcp_bbr_info` from `linux/inet_diag.h`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct TcpBbrInfo {
    bbr_bw_lo: u32,
    bbr_bw_hi: u32,
    bbr_min_rtt: u32,
    _bbr_pacing_gain: u32,
    _bbr_cwnd_gain: u32,
}

/// Reads the BBR model of a socket through `getsockopt(TCP_CC_INFO)`.
#[derive(Debug, Clone, Copy)]
pub struct BbrProbe {
    switch_to_bbr: bool,
}

impl BbrProbe {
    #[must_use]
    pub const fn new(switch_to_bbr: bool) -> Self {
        Self { switch_to_bbr }
    }
}

/// Duplicate of the session socket; closed when the session drops it.
#[derive(Debug)]
pub struct BbrHandle {
    fd: OwnedFd,
}

impl CongestionProbe for BbrProbe {
    type Handle = BbrHandle;

    fn attach(&self, socket: &TcpStream) -> Option<Self::Handle> {
        let local_addr = socket.local_addr().ok()?;
        let fd = match socket.as_fd().try_clone_to_owned() {
            Ok(fd) => fd,
            Err(err) => {
                debug!("Cannot duplicate socket {}: {}", local_addr, err);
                return None;
            }
        };

        if self.switch_to_bbr
            && let Err(err) = set_congestion_control(&fd, BBR)
        {
            debug!("Cannot enable bbr on {}: {}", local_addr, err);
        }

        match congestion_control(&fd) {
            Ok(name) if name == BBR => Some(BbrHandle { fd }),
            Ok(name) => {
                debug!(
                    "Socket {} uses {} instead of bbr",
                    local_addr,
                    String::from_utf8_lossy(&name)
                );
                None
            }
            Err(err) => {
                debug!("Cannot read congestion control of {}: {}", local_addr, err);
                None
            }
        }
    }

    fn sample(&self, handle: &Self::Handle) -> Option<BandwidthSample> {
        match read_bbr_info(&handle.fd) {
            Ok(info) => Some(BandwidthSample {
                bandwidth: u64::from(info.bbr_bw_hi).checked_shl(32).unwrap_or(0)
                    | u64::from(info.bbr_bw_lo),
                rtt_micros: u64::from(info.bbr_min_rtt),
            }),
            Err(err) => {
                debug!("Cannot read bbr info: {}", err);
                None
            }
        }
    }
}

fn socklen(len: usize) -> io::Result<libc::socklen_t> {
    libc::socklen_t::try_from(len).map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))
}

fn set_congestion_control(fd: &OwnedFd, name: &[u8]) -> io::Result<()> {
    let len = socklen(name.len())?;
    // SAFETY: `name` is valid for reads of `len` bytes for the whole call.
    let rc = unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            libc::IPPROTO_TCP,
            libc::TCP_CONGESTION,
            name.as_ptr().cast::<c_void>(),
            len,
        )
    };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn congestion_control(fd: &OwnedFd) -> io::Result<Vec<u8>> {
    let mut buffer = [0u8; CA_NAME_MAX];
    let mut len = socklen(buffer.len())?;
    // SAFETY: `buffer` is valid for writes of `len` bytes and `len` outlives the call.
    let rc = unsafe {
        libc::getsockopt(
            fd.as_raw_fd(),
            libc::IPPROTO_TCP,
            libc::TCP_CONGESTION,
            buffer.as_mut_ptr().cast::<c_void>(),
            &raw mut len,
        )
    };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    let written = usize::try_from(len).unwrap_or(0).min(buffer.len());
    let name = buffer.get(..written).unwrap_or_default();
    let end = name
        .iter()
        .position(|byte| *byte == 0)
        .unwrap_or(name.len());
    Ok(name.get(..end).unwrap_or_default().to_vec())
}

fn read_bbr_info(fd: &OwnedFd) -> io::Result<TcpBbrInfo> {
    let mut info = TcpBbrInfo::default();
    let expected = size_of::<TcpBbrInfo>();
    let mut len = socklen(expected)?;
    // SAFETY: `info` is a plain `repr(C)` struct valid for writes of `len` bytes.
    let rc = unsafe {
        libc::getsockopt(
            fd.as_raw_fd(),
            libc::IPPROTO_TCP,
            TCP_CC_INFO,
            (&raw mut info).cast::<c_void>(),
            &raw mut len,
        )
    };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    if usize::try_from(len).ok() != Some(expected) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("tcp_cc_info has {} bytes, expected {}", len, expected),
        ));
    }
    Ok(info)
}
