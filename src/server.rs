//! The listener & pre-fork supervisor: owns the listening socket, forks
//! the fixed worker pool, polls the pollset, and runs the
//! accept/handoff/reap state machine, using `mio`'s `Poll`/`Events`/
//! `Token` idiom over the listen socket, the exit-signal pipe, and one
//! token per client slot.

use std::io;
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use mio::net::{TcpListener, TcpStream as MioTcpStream};
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use nix::sys::signal::{signal, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{close, fork, ForkResult, Pid};
use socket2::{Domain, Socket, Type};

use crate::config::ServerConfig;
use crate::ipc::{
    create_domain_pair, create_exit_pipe, read_freed_slot, send_fd, unlink_all_semaphores,
    DomainPair, ExitPipe, NamedSemaphore, DOMAIN_READ_SEM_NAME, DOMAIN_WRITE_SEM_NAME,
    PIPE_WRITE_SEM_NAME,
};
use crate::method_engine::Backends;
use crate::prelude::*;
use crate::storage::{FsBackend, RecordStoreBackend};
use crate::worker::{self, WorkerHandles};

const LISTEN_TOKEN: Token = Token(0);
const EXIT_PIPE_TOKEN: Token = Token(1);
/// Client slot tokens start at 2, matching `POLLFDS_SIZE = 2 + MAX_CONNECTIONS`.
const CLIENT_TOKEN_BASE: usize = 2;

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn request_shutdown(_signum: i32) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

/// Per-slot parent-side state. A slot is occupied iff `stream` is
/// `Some`; it moves `FREE -> OCCUPIED -> HANDED_OFF -> FREE`.
struct Slot {
    stream: Option<MioTcpStream>,
    addr: Option<SocketAddr>,
    handed_off: bool,
}

impl Slot {
    fn empty() -> Self {
        Slot {
            stream: None,
            addr: None,
            handed_off: false,
        }
    }

    fn is_free(&self) -> bool {
        self.stream.is_none()
    }
}

pub struct Server {
    config: ServerConfig,
    listener: TcpListener,
    domain: DomainPair,
    exit_pipe: ExitPipe,
    write_sem: NamedSemaphore,
    pipe_write_sem: NamedSemaphore,
    worker_pids: Vec<Pid>,
}

impl Server {
    /// Binds the listening socket with backlog 100 and creates the IPC
    /// primitives the worker pool will share after fork.
    /// Does not yet fork — call [`Server::run`] to fork workers and enter
    /// the poll loop.
    pub fn bind(config: ServerConfig) -> crate::error::Result<Self> {
        let addr: SocketAddr = config.listen_addr.parse()?;
        let std_listener = bind_with_backlog(addr, LISTEN_BACKLOG)?;
        std_listener.set_nonblocking(true)?;
        let listener = TcpListener::from_std(std_listener);

        let domain = create_domain_pair()?;
        let exit_pipe = create_exit_pipe()?;
        set_nonblocking(exit_pipe.read_fd)?;

        let write_sem = NamedSemaphore::open_or_create(DOMAIN_WRITE_SEM_NAME, 1)?;
        NamedSemaphore::open_or_create(DOMAIN_READ_SEM_NAME, 1)?;
        let pipe_write_sem = NamedSemaphore::open_or_create(PIPE_WRITE_SEM_NAME, 1)?;

        Ok(Server {
            config,
            listener,
            domain,
            exit_pipe,
            write_sem,
            pipe_write_sem,
            worker_pids: Vec::new(),
        })
    }

    /// Forks `worker_count` workers, installs the pollset, and runs the
    /// accept/poll loop until a shutdown signal arrives.
    pub fn run(&mut self) -> crate::error::Result<()> {
        install_signal_handlers()?;

        for _ in 0..self.config.worker_count {
            self.spawn_worker()?;
        }

        let mut poll = Poll::new()?;
        poll.registry()
            .register(&mut self.listener, LISTEN_TOKEN, Interest::READABLE)?;
        let mut exit_source = SourceFd(&self.exit_pipe.read_fd);
        poll.registry()
            .register(&mut exit_source, EXIT_PIPE_TOKEN, Interest::READABLE)?;

        let mut slots: Vec<Slot> = (0..self.config.max_clients).map(|_| Slot::empty()).collect();
        let mut events = Events::with_capacity(128);

        info!("listening on {} with {} workers", self.config.listen_addr, self.config.worker_count);

        loop {
            if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
                self.shutdown(&mut poll, &mut slots);
                return Ok(());
            }

            match poll.poll(&mut events, Some(Duration::from_millis(200))) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }

            for event in events.iter() {
                match event.token() {
                    LISTEN_TOKEN => self.accept_pending(&mut poll, &mut slots)?,
                    EXIT_PIPE_TOKEN => self.drain_exit_pipe(&mut poll, &mut slots)?,
                    token => self.handoff_slot(&mut poll, &mut slots, token)?,
                }
            }
        }
    }

    /// Accepts as many pending connections as there are free slots,
    /// leaving any further connections pending in the kernel backlog.
    fn accept_pending(&mut self, poll: &mut Poll, slots: &mut [Slot]) -> crate::error::Result<()> {
        loop {
            let Some(slot_index) = slots.iter().position(Slot::is_free) else {
                break;
            };
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    let token = Token(CLIENT_TOKEN_BASE + slot_index);
                    poll.registry()
                        .register(&mut stream, token, Interest::READABLE)?;
                    slots[slot_index] = Slot {
                        stream: Some(stream),
                        addr: Some(addr),
                        handed_off: false,
                    };
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    errors!("accept failed: {}", e);
                    break;
                }
            }
        }
        Ok(())
    }

    /// A client slot became readable: remove it from the pollset so only
    /// one worker ever handles it, then hand its fd to exactly one
    /// worker over the domain socket, serialized by the write semaphore.
    fn handoff_slot(
        &mut self,
        poll: &mut Poll,
        slots: &mut [Slot],
        token: Token,
    ) -> crate::error::Result<()> {
        let slot_index = token.0 - CLIENT_TOKEN_BASE;
        let Some(slot) = slots.get_mut(slot_index) else {
            return Ok(());
        };
        let Some(mut stream) = slot.stream.take() else {
            return Ok(());
        };
        let _ = poll.registry().deregister(&mut stream);

        let client_fd = stream.as_raw_fd();
        {
            let _guard = self.write_sem.guard()?;
            send_fd(self.domain.parent_end, client_fd, slot_index as u32)?;
        }

        crate::trace_if!("handed off slot {} ({:?}) to a worker", slot_index, slot.addr);
        // Keep `stream` alive (leaking its std wrapper, not the fd) so the
        // underlying socket stays open until the worker signals done —
        // the parent's copy is a distinct fd from the worker's SCM_RIGHTS
        // copy, and this one still needs closing at slot-free time.
        slot.stream = Some(stream);
        slot.handed_off = true;
        Ok(())
    }

    /// Drains every queued "slot done" message, freeing each slot and
    /// closing the parent's copy of that client's fd. Any wakeup here
    /// also triggers a non-blocking reap-and-respawn sweep: on any
    /// readable byte, the parent reaps all workers whose pids have
    /// exited and forks replacements.
    fn drain_exit_pipe(&mut self, poll: &mut Poll, slots: &mut [Slot]) -> crate::error::Result<()> {
        loop {
            match read_freed_slot(self.exit_pipe.read_fd) {
                Ok(slot_index) => {
                    if let Some(slot) = slots.get_mut(slot_index as usize) {
                        if let Some(mut stream) = slot.stream.take() {
                            let _ = poll.registry().deregister(&mut stream);
                        }
                        *slot = Slot::empty();
                    }
                }
                Err(nix::Error::EAGAIN) => break,
                Err(err) => {
                    errors!("exit pipe read failed: {}", err);
                    break;
                }
            }
        }
        self.reap_and_respawn()
    }

    /// Non-blocking reap of any exited worker pids, forking replacements
    /// until the configured pool size is restored.
    fn reap_and_respawn(&mut self) -> crate::error::Result<()> {
        loop {
            match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(pid, code)) => {
                    warn!("worker {} exited with code {}", pid, code);
                    self.worker_pids.retain(|&p| p != pid);
                }
                Ok(WaitStatus::Signaled(pid, sig, _)) => {
                    warn!("worker {} killed by signal {:?}", pid, sig);
                    self.worker_pids.retain(|&p| p != pid);
                }
                Ok(WaitStatus::StillAlive) | Err(nix::errno::Errno::ECHILD) => break,
                Ok(_) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        while self.worker_pids.len() < self.config.worker_count {
            self.spawn_worker()?;
        }
        Ok(())
    }

    /// Forks one worker. The child opens its own storage backend handles
    /// and enters [`worker::run`], never returning to this function; the
    /// parent records the pid and returns immediately.
    fn spawn_worker(&mut self) -> crate::error::Result<()> {
        match unsafe { fork()? } {
            ForkResult::Parent { child } => {
                self.worker_pids.push(child);
                Ok(())
            }
            ForkResult::Child => {
                let exit_code = match self.run_worker_body() {
                    Ok(()) => 0,
                    Err(e) => {
                        errors!("worker exiting: {}", e);
                        1
                    }
                };
                std::process::exit(exit_code);
            }
        }
    }

    fn run_worker_body(&self) -> crate::error::Result<()> {
        let fs = FsBackend::new(self.config.write_root.clone());
        let record_store = RecordStoreBackend::open(self.config.db_path.clone())?;
        let backends = Backends::new(fs, record_store);

        let domain_read_sem = NamedSemaphore::open_or_create(DOMAIN_READ_SEM_NAME, 1)?;
        let pipe_write_sem = NamedSemaphore::open_or_create(PIPE_WRITE_SEM_NAME, 1)?;
        let handles = WorkerHandles {
            domain_worker_end: self.domain.worker_end,
            domain_read_sem,
            exit_pipe_write_fd: self.exit_pipe.write_fd,
            pipe_write_sem,
        };
        worker::run(handles, backends)
    }

    /// Closes the listen fd, closes every registered client fd, sends
    /// `SIGTERM` to each worker, waits for all exits, and unlinks the
    /// named semaphores.
    fn shutdown(&mut self, poll: &mut Poll, slots: &mut [Slot]) {
        info!("shutting down");
        let _ = poll.registry().deregister(&mut self.listener);
        for slot in slots.iter_mut() {
            if let Some(mut stream) = slot.stream.take() {
                let _ = poll.registry().deregister(&mut stream);
            }
        }
        for &pid in &self.worker_pids {
            let _ = nix::sys::signal::kill(pid, Signal::SIGTERM);
        }
        for &pid in &self.worker_pids {
            let _ = waitpid(pid, None);
        }
        unlink_all_semaphores();
        let _ = close(self.domain.parent_end);
        let _ = close(self.domain.worker_end);
        let _ = close(self.exit_pipe.read_fd);
        let _ = close(self.exit_pipe.write_fd);
    }
}

fn install_signal_handlers() -> crate::error::Result<()> {
    unsafe {
        signal(Signal::SIGINT, SigHandler::Handler(request_shutdown))?;
        signal(Signal::SIGTERM, SigHandler::Handler(request_shutdown))?;
    }
    Ok(())
}

/// Builds the listening socket by hand via `socket2` so the configured
/// backlog is actually passed to `listen(2)` — `std::net::TcpListener::bind`
/// has no API for this and hard-codes its own backlog internally.
fn bind_with_backlog(addr: SocketAddr, backlog: i32) -> crate::error::Result<std::net::TcpListener> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;
    Ok(socket.into())
}

fn set_nonblocking(fd: RawFd) -> crate::error::Result<()> {
    use nix::fcntl::{fcntl, FcntlArg, OFlag};
    let flags = fcntl(fd, FcntlArg::F_GETFL)?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(fd, FcntlArg::F_SETFL(flags))?;
    Ok(())
}

