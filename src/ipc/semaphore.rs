use std::ffi::CString;

use crate::error::Result;

/// A POSIX named semaphore. `libc` is used directly here rather than `nix`
/// because `sem_open`/`sem_wait`/`sem_post`/`sem_unlink` have no safe
/// wrapper in `nix` — the same gap the fd-passing reference example fills
/// with raw `libc` calls for `sendmsg`/`recvmsg` ancillary data.
pub struct NamedSemaphore {
    sem: *mut libc::sem_t,
}

unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

impl NamedSemaphore {
    /// Opens the semaphore, creating it with `initial_value` if it does not
    /// already exist. Safe to call independently from the parent and from
    /// every worker after fork — all resolve to the same kernel object by
    /// name.
    pub fn open_or_create(name: &str, initial_value: u32) -> Result<Self> {
        let cname = CString::new(name).map_err(|e| e.to_string())?;
        let sem = unsafe { libc::sem_open(cname.as_ptr(), libc::O_CREAT, 0o666, initial_value) };
        if sem == libc::SEM_FAILED {
            return Err(std::io::Error::last_os_error().into());
        }
        Ok(NamedSemaphore { sem })
    }

    pub fn wait(&self) -> Result<()> {
        let rc = unsafe { libc::sem_wait(self.sem) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        Ok(())
    }

    pub fn post(&self) -> Result<()> {
        let rc = unsafe { libc::sem_post(self.sem) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        Ok(())
    }

    /// Waits on the semaphore and returns a guard that posts it back on
    /// drop, mirroring the `sem_wait(...)`/critical-section/`sem_post(...)`
    /// bracketing around `db_upsert` in the original.
    pub fn guard(&self) -> Result<SemGuard<'_>> {
        self.wait()?;
        Ok(SemGuard { sem: self })
    }

    /// Removes the kernel-persistent semaphore object. Called once by the
    /// parent during shutdown; workers only `sem_close`.
    pub fn unlink(name: &str) {
        if let Ok(cname) = CString::new(name) {
            unsafe {
                libc::sem_unlink(cname.as_ptr());
            }
        }
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        unsafe {
            libc::sem_close(self.sem);
        }
    }
}

pub struct SemGuard<'a> {
    sem: &'a NamedSemaphore,
}

impl Drop for SemGuard<'_> {
    fn drop(&mut self) {
        let _ = self.sem.post();
    }
}

/// The four named semaphores from the original's `objects.h`: one
/// serializing each direction of the handoff channel, one serializing
/// writes to the worker-exit pipe, and one serializing record-store
/// upserts.
pub const PIPE_WRITE_SEM_NAME: &str = "/pw_2f6b08";
pub const DOMAIN_READ_SEM_NAME: &str = "/dr_2f6b08";
pub const DOMAIN_WRITE_SEM_NAME: &str = "/dw_2f6b08";
pub const DB_WRITE_SEM_NAME: &str = "/db_2f6b08";

pub fn unlink_all_semaphores() {
    NamedSemaphore::unlink(PIPE_WRITE_SEM_NAME);
    NamedSemaphore::unlink(DOMAIN_READ_SEM_NAME);
    NamedSemaphore::unlink(DOMAIN_WRITE_SEM_NAME);
    NamedSemaphore::unlink(DB_WRITE_SEM_NAME);
}
