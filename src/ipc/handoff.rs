use std::io::{IoSlice, IoSliceMut};
use std::os::fd::{IntoRawFd, RawFd};

use nix::sys::socket::{
    self, AddressFamily, ControlMessage, ControlMessageOwned, MsgFlags, SockFlag, SockType,
};
use nix::unistd::close;

use crate::error::Result;

/// A `SOCK_STREAM` domain socket pair used to hand an accepted client
/// socket's file descriptor from the parent to exactly one worker over
/// `SCM_RIGHTS` ancillary data, built on `nix`'s safe wrappers over
/// `sendmsg`/`recvmsg`.
pub struct DomainPair {
    pub parent_end: RawFd,
    pub worker_end: RawFd,
}

pub fn create_domain_pair() -> Result<DomainPair> {
    let (a, b) = socket::socketpair(
        AddressFamily::Unix,
        SockType::Stream,
        None,
        SockFlag::empty(),
    )?;
    Ok(DomainPair {
        parent_end: a.into_raw_fd(),
        worker_end: b.into_raw_fd(),
    })
}

/// Sends `fd_to_send` over `channel`. The ordinary payload carries the
/// parent's slot index for this connection (as 4 little-endian bytes)
/// rather than a throwaway marker byte — a `sendmsg` carrying only
/// ancillary data is rejected on some platforms, and the slot index lets
/// the worker report back exactly which slot to free over the exit pipe
/// without the two processes sharing a file-descriptor namespace.
pub fn send_fd(channel: RawFd, fd_to_send: RawFd, slot: u32) -> Result<()> {
    let payload = slot.to_le_bytes();
    let iov = [IoSlice::new(&payload)];
    let fds = [fd_to_send];
    let cmsg = [ControlMessage::ScmRights(&fds)];
    socket::sendmsg::<()>(channel, &iov, &cmsg, MsgFlags::empty(), None)?;
    Ok(())
}

/// Blocks until a descriptor is received over `channel`. Returns the
/// descriptor together with the slot index it was tagged with.
pub fn recv_fd(channel: RawFd) -> Result<(RawFd, u32)> {
    let mut payload = [0u8; 4];
    let mut iov = [IoSliceMut::new(&mut payload)];
    let mut cmsg_buffer = nix::cmsg_space!([RawFd; 1]);
    let msg = socket::recvmsg::<()>(channel, &mut iov, Some(&mut cmsg_buffer), MsgFlags::empty())?;

    let slot = u32::from_le_bytes(payload);
    for cmsg in msg.cmsgs()? {
        if let ControlMessageOwned::ScmRights(fds) = cmsg {
            if let Some(fd) = fds.first() {
                return Ok((*fd, slot));
            }
        }
    }
    Err("handoff channel closed without a file descriptor".into())
}

pub fn close_fd(fd: RawFd) {
    let _ = close(fd);
}
