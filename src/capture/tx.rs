//! Non-blocking transmit sink
//!
//! A raw AF_PACKET socket bound to one interface. Sends use MSG_DONTWAIT;
//! a full kernel TX buffer drops the frame instead of stalling the
//! forwarding loop, which would back-pressure the RX ring and delay
//! higher-priority traffic.

use crate::capture::FrameTx;
use crate::{Error, Result};
use std::ffi::CString;
use std::os::unix::io::RawFd;

/// Raw send socket for one interface.
pub struct TxSink {
    fd: RawFd,
    ifindex: i32,
}

impl TxSink {
    /// Open a non-blocking raw socket bound to the named interface.
    pub fn open(ifname: &str) -> Result<Self> {
        let fd = open_packet_socket()?;

        let ifindex = match interface_index(fd, ifname) {
            Ok(idx) => idx,
            Err(e) => {
                unsafe { libc::close(fd) };
                return Err(e);
            }
        };

        if let Err(e) = bind_to_interface(fd, ifindex) {
            unsafe { libc::close(fd) };
            return Err(e);
        }

        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFL);
            libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
        }

        Ok(Self { fd, ifindex })
    }

    /// Submit one frame. Returns the number of bytes the kernel accepted;
    /// 0 means the frame was dropped (WOULD_BLOCK or buffer exhaustion).
    pub fn send(&self, frame: &[u8]) -> usize {
        let n = unsafe {
            libc::send(
                self.fd,
                frame.as_ptr() as *const libc::c_void,
                frame.len(),
                libc::MSG_DONTWAIT,
            )
        };
        if n < 0 {
            0
        } else {
            n as usize
        }
    }

    pub fn ifindex(&self) -> i32 {
        self.ifindex
    }
}

impl FrameTx for TxSink {
    fn send_frame(&mut self, frame: &[u8]) -> bool {
        TxSink::send(self, frame) > 0
    }
}

impl Drop for TxSink {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

/// Create a raw AF_PACKET socket capturing all ethertypes.
pub(crate) fn open_packet_socket() -> Result<RawFd> {
    let fd = unsafe {
        libc::socket(
            libc::AF_PACKET,
            libc::SOCK_RAW,
            (libc::ETH_P_ALL as u16).to_be() as i32,
        )
    };

    if fd < 0 {
        return Err(Error::Socket(std::io::Error::last_os_error()));
    }

    Ok(fd)
}

/// Resolve an interface name to its kernel index.
pub(crate) fn interface_index(fd: RawFd, ifname: &str) -> Result<i32> {
    let ifname_c = CString::new(ifname).map_err(|_| Error::InterfaceNotFound {
        name: ifname.to_string(),
    })?;

    let name_bytes = ifname_c.as_bytes_with_nul();
    if name_bytes.len() > libc::IFNAMSIZ {
        return Err(Error::InterfaceNotFound {
            name: ifname.to_string(),
        });
    }

    let mut ifr: libc::ifreq = unsafe { std::mem::zeroed() };
    ifr.ifr_name[..name_bytes.len()].copy_from_slice(unsafe {
        std::slice::from_raw_parts(name_bytes.as_ptr() as *const libc::c_char, name_bytes.len())
    });

    let ret = unsafe { libc::ioctl(fd, libc::SIOCGIFINDEX, &mut ifr) };
    if ret < 0 {
        return Err(Error::InterfaceNotFound {
            name: ifname.to_string(),
        });
    }

    Ok(unsafe { ifr.ifr_ifru.ifru_ifindex })
}

/// Bind a packet socket to one interface at the link layer.
pub(crate) fn bind_to_interface(fd: RawFd, ifindex: i32) -> Result<()> {
    let sockaddr = libc::sockaddr_ll {
        sll_family: libc::AF_PACKET as u16,
        sll_protocol: (libc::ETH_P_ALL as u16).to_be(),
        sll_ifindex: ifindex,
        sll_hatype: 0,
        sll_pkttype: 0,
        sll_halen: 0,
        sll_addr: [0; 8],
    };

    let ret = unsafe {
        libc::bind(
            fd,
            &sockaddr as *const _ as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_ll>() as u32,
        )
    };

    if ret < 0 {
        return Err(Error::Bind(std::io::Error::last_os_error()));
    }

    Ok(())
}
