//! Memory-mapped receive ring (PACKET_RX_RING, TPACKET_V1)
//!
//! The kernel writes frames into a shared ring of fixed-size slots; each
//! slot's `tp_status` word hands ownership back and forth. Userspace reads
//! the slot the cursor points at, forwards the frame, and flips the status
//! back to `TP_STATUS_KERNEL`. Slots are consumed strictly in ring order.

use crate::capture::tx::{bind_to_interface, interface_index, open_packet_socket};
use crate::{Error, Result};
use std::os::unix::io::RawFd;
use std::ptr;

/// Receive ring geometry.
#[derive(Debug, Clone, Copy)]
pub struct RingConfig {
    pub block_size: u32,
    pub block_count: u32,
    pub frame_size: u32,
}

impl Default for RingConfig {
    fn default() -> Self {
        // 32 KiB x 64 blocks / 2 KiB frames = 1024 slots, 2 MiB mapped.
        Self {
            block_size: 32 * 1024,
            block_count: 64,
            frame_size: 2048,
        }
    }
}

impl RingConfig {
    pub fn frame_count(&self) -> u32 {
        (self.block_size * self.block_count) / self.frame_size
    }

    pub fn ring_bytes(&self) -> usize {
        self.block_size as usize * self.block_count as usize
    }
}

/// Cursor over the mapped slots.
///
/// Separate from the socket plumbing so the status-word handshake can be
/// exercised over an anonymous buffer in tests.
struct SlotCursor {
    base: *mut u8,
    frame_size: usize,
    frame_count: usize,
    cursor: usize,
}

impl SlotCursor {
    /// `base` must point at `frame_count * frame_size` bytes laid out as
    /// tpacket slots, each starting with a `tpacket_hdr`, valid for the
    /// lifetime of the cursor.
    unsafe fn new(base: *mut u8, frame_size: usize, frame_count: usize) -> Self {
        Self {
            base,
            frame_size,
            frame_count,
            cursor: 0,
        }
    }

    fn header(&self) -> *mut libc::tpacket_hdr {
        unsafe { self.base.add(self.cursor * self.frame_size) as *mut libc::tpacket_hdr }
    }

    /// Frame in the current slot, if the kernel has filled it. Does not
    /// advance the cursor.
    fn next_ready(&self) -> Option<&[u8]> {
        let hdr = self.header();
        unsafe {
            let status = ptr::read_volatile(ptr::addr_of!((*hdr).tp_status));
            if status & libc::TP_STATUS_USER as libc::c_ulong == 0 {
                return None;
            }
            let mac = ptr::read_volatile(ptr::addr_of!((*hdr).tp_mac)) as usize;
            let len = ptr::read_volatile(ptr::addr_of!((*hdr).tp_len)) as usize;
            let frame = (hdr as *const u8).add(mac);
            Some(std::slice::from_raw_parts(frame, len))
        }
    }

    /// Return the current slot to the kernel and advance to the next one.
    /// Must only follow a `next_ready` that returned a frame.
    fn release(&mut self) {
        let hdr = self.header();
        unsafe {
            ptr::write_volatile(
                ptr::addr_of_mut!((*hdr).tp_status),
                libc::TP_STATUS_KERNEL as libc::c_ulong,
            );
        }
        self.cursor = (self.cursor + 1) % self.frame_count;
    }
}

/// One interface's kernel-shared receive ring.
pub struct RxRing {
    fd: RawFd,
    ring_size: usize,
    slots: SlotCursor,
    ifindex: i32,
}

// The raw pointer targets a mapping owned by this value; the ring moves to
// its worker thread whole and is never shared.
unsafe impl Send for RxRing {}

impl RxRing {
    /// Map a receive ring on the named interface.
    pub fn open(ifname: &str, config: RingConfig) -> Result<Self> {
        let fd = open_packet_socket()?;

        let ifindex = match interface_index(fd, ifname) {
            Ok(idx) => idx,
            Err(e) => {
                unsafe { libc::close(fd) };
                return Err(e);
            }
        };

        let req = libc::tpacket_req {
            tp_block_size: config.block_size,
            tp_block_nr: config.block_count,
            tp_frame_size: config.frame_size,
            tp_frame_nr: config.frame_count(),
        };

        let ret = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_PACKET,
                libc::PACKET_RX_RING,
                &req as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::tpacket_req>() as u32,
            )
        };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(Error::RingSetup(err));
        }

        let ring_size = config.ring_bytes();
        let ring = unsafe {
            libc::mmap(
                ptr::null_mut(),
                ring_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if ring == libc::MAP_FAILED {
            let err = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(Error::Mmap(err));
        }

        if let Err(e) = bind_to_interface(fd, ifindex) {
            unsafe {
                libc::munmap(ring, ring_size);
                libc::close(fd);
            }
            return Err(e);
        }

        if let Err(e) = set_promisc(fd, ifindex, true) {
            unsafe {
                libc::munmap(ring, ring_size);
                libc::close(fd);
            }
            return Err(e);
        }

        let slots = unsafe {
            SlotCursor::new(
                ring as *mut u8,
                config.frame_size as usize,
                config.frame_count() as usize,
            )
        };

        Ok(Self {
            fd,
            ring_size,
            slots,
            ifindex,
        })
    }

    /// Frame at the current slot, if the kernel has filled it. Never
    /// blocks, never advances.
    pub fn next_ready(&self) -> Option<&[u8]> {
        self.slots.next_ready()
    }

    /// Hand the current slot back to the kernel and advance the cursor.
    ///
    /// Precondition: the most recent `next_ready` returned a frame.
    pub fn release(&mut self) {
        self.slots.release();
    }

    pub fn ifindex(&self) -> i32 {
        self.ifindex
    }
}

impl Drop for RxRing {
    fn drop(&mut self) {
        let _ = set_promisc(self.fd, self.ifindex, false);
        unsafe {
            libc::munmap(self.slots.base as *mut libc::c_void, self.ring_size);
            libc::close(self.fd);
        }
    }
}

fn set_promisc(fd: RawFd, ifindex: i32, enable: bool) -> Result<()> {
    let mreq = libc::packet_mreq {
        mr_ifindex: ifindex,
        mr_type: libc::PACKET_MR_PROMISC as u16,
        mr_alen: 0,
        mr_address: [0; 8],
    };

    let optname = if enable {
        libc::PACKET_ADD_MEMBERSHIP
    } else {
        libc::PACKET_DROP_MEMBERSHIP
    };

    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_PACKET,
            optname,
            &mreq as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::packet_mreq>() as u32,
        )
    };

    if ret < 0 {
        return Err(Error::RingSetup(std::io::Error::last_os_error()));
    }

    Ok(())
}
