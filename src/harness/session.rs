//! Process-backed interpreter sessions
//!
//! A session is one interactive interpreter process fed through its stdin. Each example is sent as one unit (see
//! [`SessionConfig::example_command`]), followed by a command that prints a unique sentinel token; everything the
//! process writes to stdout before the token is the example's output. A reader thread forwards stdout to a channel
//! so every wait can be bounded by the configured timeout.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use docgate_core::RuntimeVersion;

use super::config::{DEBUG_ENV, FIXTURE_ENV, SessionConfig};
use super::requirements::find_on_path;
use crate::cli::test_interfaces::{Interpreter, Session, TestError};

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Starts [`ProcessSession`]s from a [`SessionConfig`].
#[derive(Debug, Clone)]
pub struct ProcessInterpreter {
    config: SessionConfig,
    version_args: Vec<String>,
    debug: bool,
}

impl ProcessInterpreter {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            version_args: vec!["--version".to_string()],
            debug: true,
        }
    }

    pub fn with_version_args(mut self, args: Vec<String>) -> Self {
        self.version_args = args;
        self
    }

    /// Whether sessions get the collaborator debug flag in their environment.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

impl Interpreter for ProcessInterpreter {
    fn program(&self) -> &str {
        &self.config.program
    }

    fn is_available(&self) -> bool {
        find_on_path(&self.config.program).is_some()
    }

    fn probe_version(&self) -> Result<RuntimeVersion, TestError> {
        let output = Command::new(&self.config.program)
            .args(&self.version_args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| TestError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;
        // Older interpreters print their banner on stderr.
        let mut banner = String::from_utf8_lossy(&output.stdout).into_owned();
        banner.push_str(&String::from_utf8_lossy(&output.stderr));
        let version = RuntimeVersion::parse(&banner).map_err(|e| TestError::VersionProbe(e.to_string()))?;
        tracing::debug!(program = %self.config.program, %version, "probed interpreter version");
        Ok(version)
    }

    fn start(&self, fixture: &Path) -> Result<Box<dyn Session>, TestError> {
        let session = ProcessSession::spawn(&self.config, fixture, self.debug)?;
        Ok(Box::new(session))
    }
}

/// One running interpreter.
pub struct ProcessSession {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Receiver<String>,
    token: String,
    counter: u64,
    config: SessionConfig,
}

impl ProcessSession {
    /// Spawn the interpreter in the fixture's directory and send the init lines.
    pub fn spawn(config: &SessionConfig, fixture: &Path, debug: bool) -> Result<Self, TestError> {
        let mut command = Command::new(&config.program);
        command
            .args(&config.args)
            .env(FIXTURE_ENV, fixture)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        if let Some(dir) = fixture.parent().filter(|d| !d.as_os_str().is_empty()) {
            command.current_dir(dir);
        }
        if debug {
            command.env(DEBUG_ENV, "1");
        }
        for (key, value) in &config.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|source| TestError::Spawn {
            program: config.program.clone(),
            source,
        })?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take().ok_or_else(|| TestError::SessionClosed {
            output: String::new(),
        })?;

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut reader = BufReader::new(stdout);
            loop {
                let mut buf = Vec::new();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(String::from_utf8_lossy(&buf).into_owned()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let mut session = Self {
            child,
            stdin,
            lines: rx,
            token: unique_token(),
            counter: 0,
            config: config.clone(),
        };

        if !config.init.is_empty() {
            let mut init = config.init.join("\n");
            init.push('\n');
            let banner = session.exchange(&init)?;
            if !banner.trim().is_empty() {
                tracing::debug!(output = %banner.trim_end(), "interpreter start-up output");
            }
        }
        tracing::debug!(program = %config.program, fixture = %fixture.display(), "session started");
        Ok(session)
    }

    fn next_sentinel(&mut self) -> String {
        self.counter += 1;
        format!("{}_{}__", self.token, self.counter)
    }

    fn send(&mut self, text: &str) -> Result<(), TestError> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(TestError::SessionClosed { output: String::new() });
        };
        let written = stdin.write_all(text.as_bytes()).and_then(|_| stdin.flush());
        written.map_err(|_| TestError::SessionClosed { output: String::new() })
    }

    /// Send `payload` as typed, then the sentinel command, and collect the output in between.
    fn exchange(&mut self, payload: &str) -> Result<String, TestError> {
        let sentinel = self.next_sentinel();
        let mut text = String::with_capacity(payload.len() + 64);
        text.push_str(payload);
        if self.config.blank_line_terminator {
            text.push('\n');
        }
        text.push_str(&self.config.sentinel_command(&sentinel));
        text.push('\n');

        self.send(&text)?;
        self.read_until_sentinel(&sentinel)
    }

    /// Collect output lines until one contains `sentinel`.
    fn read_until_sentinel(&mut self, sentinel: &str) -> Result<String, TestError> {
        let timeout = self.config.timeout;
        let deadline = Instant::now() + timeout;
        let mut output = String::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.lines.recv_timeout(remaining) {
                Ok(line) => {
                    if let Some(at) = line.find(sentinel) {
                        output.push_str(&line[..at]);
                        return Ok(output);
                    }
                    output.push_str(&line);
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.kill();
                    return Err(TestError::Timeout(timeout));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.stdin = None;
                    return Err(TestError::SessionClosed { output });
                }
            }
        }
    }

    fn kill(&mut self) {
        self.stdin = None;
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Session for ProcessSession {
    fn run(&mut self, source: &str) -> Result<String, TestError> {
        let command = self.config.example_command(source);
        self.exchange(&command)
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        self.kill();
    }
}

/// A token no example output is expected to contain.
fn unique_token() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let n = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("__docgate_{:x}{:08x}_{n}", std::process::id(), nanos)
}
