//! In-process stand-in for a clamd daemon.
//!
//! Listens on an ephemeral loopback port and speaks just enough of the
//! wire protocol for tests: line commands, the chunked stream upload, and
//! a few scripted misbehaviors (delays, silence, garbled replies). Scan
//! verdicts are keyed off the request itself, so tests pick the verdict
//! they want by choosing the path or payload.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

#[derive(Clone, Copy)]
enum Behavior {
    /// Answer every command the way a healthy daemon would.
    Normal,
    /// Healthy, but pause before each reply to keep connections open.
    Delayed(Duration),
    /// Accept and then never read or write.
    Silent,
    /// Reply to every line command with something no command expects.
    Garbled,
}

pub(crate) struct StubDaemon {
    address: String,
    shutdown: Arc<AtomicBool>,
    saw_shutdown: Arc<AtomicBool>,
    peak: Arc<AtomicUsize>,
    accept_thread: Option<thread::JoinHandle<()>>,
}

impl StubDaemon {
    pub(crate) const VERSION_BANNER: &'static str =
        "ClamAV 0.103.2/27253/Tue Aug 18 08:22:33 2026";

    pub(crate) fn start() -> Self {
        Self::launch(Behavior::Normal)
    }

    pub(crate) fn start_with_delay(delay: Duration) -> Self {
        Self::launch(Behavior::Delayed(delay))
    }

    pub(crate) fn start_silent() -> Self {
        Self::launch(Behavior::Silent)
    }

    pub(crate) fn start_garbled() -> Self {
        Self::launch(Behavior::Garbled)
    }

    pub(crate) fn address(&self) -> &str {
        &self.address
    }

    pub(crate) fn saw_shutdown(&self) -> bool {
        self.saw_shutdown.load(Ordering::SeqCst)
    }

    /// Highest number of connections served at the same time.
    pub(crate) fn peak_connections(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn launch(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let shutdown = Arc::new(AtomicBool::new(false));
        let saw_shutdown = Arc::new(AtomicBool::new(false));
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let accept_thread = {
            let shutdown = Arc::clone(&shutdown);
            let saw_shutdown = Arc::clone(&saw_shutdown);
            let peak = Arc::clone(&peak);
            thread::spawn(move || {
                for stream in listener.incoming() {
                    if shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    let Ok(stream) = stream else { continue };

                    let saw_shutdown = Arc::clone(&saw_shutdown);
                    let current = Arc::clone(&current);
                    let peak = Arc::clone(&peak);
                    // Connections are detached; a lingering one must not
                    // hold up the accept loop or the drop join.
                    thread::spawn(move || {
                        let in_flight = current.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(in_flight, Ordering::SeqCst);
                        serve(stream, behavior, &saw_shutdown);
                        current.fetch_sub(1, Ordering::SeqCst);
                    });
                }
            })
        };

        Self {
            address,
            shutdown,
            saw_shutdown,
            peak,
            accept_thread: Some(accept_thread),
        }
    }
}

impl Drop for StubDaemon {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Wake the accept loop so it observes the flag.
        let _ = TcpStream::connect(&self.address);
        if let Some(thread) = self.accept_thread.take() {
            let _ = thread.join();
        }
    }
}

fn serve(mut stream: TcpStream, behavior: Behavior, saw_shutdown: &AtomicBool) {
    if let Behavior::Silent = behavior {
        thread::sleep(Duration::from_secs(5));
        return;
    }

    let Ok(read_half) = stream.try_clone() else {
        return;
    };
    let mut reader = BufReader::new(read_half);

    let mut first = [0u8; 1];
    if reader.read_exact(&mut first).is_err() {
        return;
    }

    // The stream upload is the only exchange that does not start with an
    // ASCII command letter followed by a line.
    if first[0] == b'z' {
        serve_instream(&mut reader, &mut stream, behavior);
        return;
    }

    let mut rest = Vec::new();
    if reader.read_until(b'\n', &mut rest).is_err() {
        return;
    }
    let mut line = vec![first[0]];
    line.extend_from_slice(&rest);
    let line = String::from_utf8_lossy(&line).trim_end().to_string();

    if let Behavior::Delayed(delay) = behavior {
        thread::sleep(delay);
    }
    if let Behavior::Garbled = behavior {
        let _ = stream.write_all(b"UNEXPECTED GIBBERISH\n");
        return;
    }

    let reply: Option<String> = match line.as_str() {
        "PING" => Some("PONG\n".into()),
        "VERSION" => Some(format!("{}\n", StubDaemon::VERSION_BANNER)),
        "RELOAD" => Some("RELOADING\n".into()),
        "SHUTDOWN" => {
            saw_shutdown.store(true, Ordering::SeqCst);
            None
        }
        other => match other.strip_prefix("SCAN ") {
            Some(path) if path.contains(".drop") => None,
            Some(path) if path.contains(".broken") => {
                Some("this is not a verdict line\n".into())
            }
            Some(path) if path.contains(".infected") => {
                Some(format!("{path}: Eicar-Test-Signature FOUND\n"))
            }
            Some(path) => Some(format!("{path}: OK\n")),
            None => Some(format!("UNKNOWN COMMAND {line}\n")),
        },
    };

    if let Some(reply) = reply {
        let _ = stream.write_all(reply.as_bytes());
    }
}

fn serve_instream(reader: &mut BufReader<TcpStream>, stream: &mut TcpStream, behavior: Behavior) {
    // Consume the rest of the marker; the leading 'z' is already gone.
    let mut marker = Vec::new();
    if reader.read_until(0, &mut marker).is_err() {
        return;
    }

    let mut payload = Vec::new();
    loop {
        let mut len_bytes = [0u8; 4];
        if reader.read_exact(&mut len_bytes).is_err() {
            return;
        }
        let len = u32::from_be_bytes(len_bytes) as usize;
        if len == 0 {
            break;
        }
        let mut chunk = vec![0u8; len];
        if reader.read_exact(&mut chunk).is_err() {
            return;
        }
        payload.extend_from_slice(&chunk);
    }

    if let Behavior::Delayed(delay) = behavior {
        thread::sleep(delay);
    }

    let reply = if payload.windows(5).any(|window| window == b"EICAR") {
        "stream: Eicar-Test-Signature FOUND\0"
    } else {
        "stream: OK\0"
    };
    let _ = stream.write_all(reply.as_bytes());
}
