pub mod exit_pipe;
pub mod handoff;
pub mod semaphore;

pub use exit_pipe::{create_exit_pipe, read_freed_slot, signal_slot_done, ExitPipe};
pub use handoff::{close_fd, create_domain_pair, recv_fd, send_fd, DomainPair};
pub use semaphore::{
    unlink_all_semaphores, NamedSemaphore, DB_WRITE_SEM_NAME, DOMAIN_READ_SEM_NAME,
    DOMAIN_WRITE_SEM_NAME, PIPE_WRITE_SEM_NAME,
};
