//! The worker process loop: wait for a handed-off connection, serve
//! exactly one request end-to-end, signal completion, repeat.

use std::io::Write;
use std::net::TcpStream;
use std::os::fd::{FromRawFd, RawFd};

use crate::http::{read_request, HttpResponse, Method};
use crate::ipc::{recv_fd, semaphore::NamedSemaphore, signal_slot_done};
use crate::method_engine::{perform_method, response_for_parse_error, Backends};
use crate::prelude::*;

pub struct WorkerHandles {
    pub domain_worker_end: RawFd,
    pub domain_read_sem: NamedSemaphore,
    pub exit_pipe_write_fd: RawFd,
    pub pipe_write_sem: NamedSemaphore,
}

/// Runs forever, serving one connection per iteration. Returns only on an
/// unrecoverable I/O error against the handoff channel itself (not
/// against any one client, which is isolated per-iteration).
pub fn run(handles: WorkerHandles, backends: Backends) -> crate::error::Result<()> {
    loop {
        let _read_guard = handles.domain_read_sem.guard()?;
        let (client_fd, slot) = recv_fd(handles.domain_worker_end)?;
        drop(_read_guard);

        serve_one(client_fd, &backends);

        signal_slot_done(handles.exit_pipe_write_fd, &handles.pipe_write_sem, slot)?;
    }
}

/// Reads one request, dispatches it, writes the response, and closes the
/// socket — exactly one request per connection. Errors at any stage
/// still produce a best-effort response where one is expected; errors
/// after a response begins writing just close the connection.
fn serve_one(client_fd: RawFd, backends: &Backends) {
    let mut stream = unsafe { TcpStream::from_raw_fd(client_fd) };

    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(err) => {
            crate::trace_if!("framing error: {}", err);
            let response = response_for_parse_error(&err);
            let _ = stream.write_all(&response.to_bytes());
            return;
        }
    };

    info!("{} {}", request.method_token, request.uri);

    let response = match perform_method(&request, backends) {
        Ok(response) => response,
        Err(err) => {
            errors!("method engine failure: {}", err);
            HttpResponse::new(crate::http::StatusCode::InternalServerError)
        }
    };

    let bytes = if request.method == Some(Method::Head) {
        response.to_bytes_headers_only()
    } else {
        response.to_bytes()
    };

    if let Err(err) = stream.write_all(&bytes) {
        errors!("write to client failed: {}", err);
    }
    // `stream` drops here, closing the socket — exactly one request per
    // connection.
}
