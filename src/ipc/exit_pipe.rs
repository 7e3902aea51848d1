use std::os::fd::{IntoRawFd, RawFd};

use nix::unistd::{pipe, read, write};

use crate::error::Result;
use crate::ipc::semaphore::NamedSemaphore;

/// The worker-to-parent "I'm done" signal, modeled per DESIGN.md's
/// redesign of the original's raw exit pipe as a bounded message channel:
/// enqueue (write) is serialized by a semaphore, dequeue (read) is
/// `poll`-integrated on the parent side. Each message is the 4-byte slot
/// index the worker was handed at handoff time, so the parent can free
/// exactly that slot without the two processes sharing an fd namespace.
/// Any wakeup on this pipe also doubles as the cue to sweep for exited
/// workers (`waitpid(WNOHANG)`) and respawn — the self-pipe trick applied
/// to ordinary request completions as well as process death.
pub struct ExitPipe {
    pub read_fd: RawFd,
    pub write_fd: RawFd,
}

pub fn create_exit_pipe() -> Result<ExitPipe> {
    let (read_end, write_end) = pipe()?;
    Ok(ExitPipe {
        read_fd: read_end.into_raw_fd(),
        write_fd: write_end.into_raw_fd(),
    })
}

/// Called by a worker after it finishes serving one request, freeing its
/// slot in the parent's pollset.
pub fn signal_slot_done(write_fd: RawFd, sem: &NamedSemaphore, slot: u32) -> Result<()> {
    let _guard = sem.guard()?;
    write(write_fd, &slot.to_le_bytes())?;
    Ok(())
}

/// Called by the parent once `read_fd` is readable. Reads exactly one
/// slot-index message; the caller loops until `Errno::EAGAIN` to drain
/// every message queued since the last wakeup. Returns the raw `nix`
/// error (rather than [`Result`]) so the caller can distinguish
/// "nothing more queued" from a genuine I/O failure without downcasting.
pub fn read_freed_slot(read_fd: RawFd) -> std::result::Result<u32, nix::Error> {
    let mut buf = [0u8; 4];
    let mut read_so_far = 0;
    while read_so_far < buf.len() {
        let n = read(read_fd, &mut buf[read_so_far..])?;
        if n == 0 {
            return Err(nix::Error::EPIPE);
        }
        read_so_far += n;
    }
    Ok(u32::from_le_bytes(buf))
}
