//! External process invocation as an ordered event stream
//!
//! A [`ProcessInvocation`] is handed to a [`ProcessRunner`], which launches it
//! and returns a [`ProcessStream`]: every line the child writes is delivered as
//! a [`StreamEvent`] tagged with its origin, followed by exactly one outcome.
//! A zero exit status completes the stream; a non-zero status fails it with the
//! buffered stderr lines joined by newline.
//!
//! Background invocations complete as soon as the child has been launched. The
//! child keeps running detached from the pipeline while its output is drained
//! into the log file.
//!
//! ## Example
//!
//! ```no_run
//! use playground_core::process::{ProcessInvocation, ProcessRunner, ShellRunner};
//!
//! # async fn example() -> Result<(), playground_core::errors::ProcessError> {
//! let runner = ShellRunner::from_env();
//! let mut stream = runner.run(&ProcessInvocation::new("docker --version"));
//! while let Some(event) = stream.next_event().await {
//!     println!("[{}] {}", event.origin.as_str(), event.line);
//! }
//! stream.finish().await?;
//! # Ok(())
//! # }
//! ```

use crate::errors::ProcessError;
use futures::Stream;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Tracing target used for raw process output lines
pub const OUTPUT_TARGET: &str = "playground::output";

/// Shell used when `$SHELL` is unset
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Which standard stream a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Stdout,
    Stderr,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Stdout => "stdout",
            Origin::Stderr => "stderr",
        }
    }
}

/// One line of output produced by a child process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub origin: Origin,
    pub line: String,
}

impl StreamEvent {
    pub fn stdout(line: impl Into<String>) -> Self {
        Self {
            origin: Origin::Stdout,
            line: line.into(),
        }
    }

    pub fn stderr(line: impl Into<String>) -> Self {
        Self {
            origin: Origin::Stderr,
            line: line.into(),
        }
    }
}

/// A single command to run through the shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInvocation {
    /// Shell command line
    pub command: String,
    /// Directory to run the command in (inherits the current one when unset)
    pub working_dir: Option<PathBuf>,
    /// Complete as soon as the child is launched instead of when it exits
    pub background: bool,
}

impl ProcessInvocation {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            working_dir: None,
            background: false,
        }
    }

    /// Run the command from `dir`
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Mark the invocation as a long-running background process
    pub fn in_background(mut self) -> Self {
        self.background = true;
        self
    }
}

/// Receiver of forwarded stream events
pub trait EventSink: Send {
    fn emit(&mut self, event: &StreamEvent);
}

impl EventSink for Vec<StreamEvent> {
    fn emit(&mut self, event: &StreamEvent) {
        self.push(event.clone());
    }
}

/// Writes every event to the log under [`OUTPUT_TARGET`]
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, event: &StreamEvent) {
        info!(target: OUTPUT_TARGET, stream = event.origin.as_str(), "{}", event.line);
    }
}

struct DiscardSink;

impl EventSink for DiscardSink {
    fn emit(&mut self, _event: &StreamEvent) {}
}

/// Lines captured while forwarding a stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

/// Producer half of a [`ProcessStream`]
#[derive(Debug)]
pub struct StreamSender {
    command: String,
    events: mpsc::UnboundedSender<StreamEvent>,
    outcome: oneshot::Sender<Result<(), ProcessError>>,
}

impl StreamSender {
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Push one event; a consumer that stopped listening is not an error
    pub fn emit(&self, event: StreamEvent) {
        let _ = self.events.send(event);
    }

    pub fn complete(self) {
        let _ = self.outcome.send(Ok(()));
    }

    pub fn fail(self, error: ProcessError) {
        let _ = self.outcome.send(Err(error));
    }
}

/// Ordered output events of one invocation followed by a single outcome
#[derive(Debug)]
pub struct ProcessStream {
    command: String,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    outcome: oneshot::Receiver<Result<(), ProcessError>>,
}

impl ProcessStream {
    /// Create a connected sender/stream pair
    pub fn channel(command: impl Into<String>) -> (StreamSender, ProcessStream) {
        let command = command.into();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        (
            StreamSender {
                command: command.clone(),
                events: events_tx,
                outcome: outcome_tx,
            },
            ProcessStream {
                command,
                events: events_rx,
                outcome: outcome_rx,
            },
        )
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Next output line, or `None` once the producer is done emitting
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Wait for the outcome, discarding any events not yet consumed
    pub async fn finish(mut self) -> Result<(), ProcessError> {
        while self.events.recv().await.is_some() {}
        match self.outcome.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProcessError::Abandoned {
                command: self.command,
            }),
        }
    }

    /// Forward every event to `sink` in arrival order, then wait for the outcome
    pub async fn forward(mut self, sink: &mut dyn EventSink) -> Result<ProcessOutput, ProcessError> {
        let mut output = ProcessOutput::default();
        while let Some(event) = self.events.recv().await {
            match event.origin {
                Origin::Stdout => output.stdout.push(event.line.clone()),
                Origin::Stderr => output.stderr.push(event.line.clone()),
            }
            sink.emit(&event);
        }
        self.finish().await?;
        Ok(output)
    }

    /// Capture the output without forwarding it anywhere
    pub async fn collect(self) -> Result<ProcessOutput, ProcessError> {
        self.forward(&mut DiscardSink).await
    }
}

impl Stream for ProcessStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

/// Launches invocations and exposes their output as a [`ProcessStream`]
pub trait ProcessRunner: Send + Sync {
    fn run(&self, invocation: &ProcessInvocation) -> ProcessStream;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs invocations through the user's shell (`$SHELL -c <command>`)
#[derive(Debug)]
pub struct ShellRunner {
    shell: PathBuf,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl ShellRunner {
    pub fn new(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
            background: Mutex::new(Vec::new()),
        }
    }

    /// Use `$SHELL`, falling back to [`DEFAULT_SHELL`]
    pub fn from_env() -> Self {
        let shell = std::env::var_os("SHELL")
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SHELL));
        Self::new(shell)
    }

    pub fn shell(&self) -> &Path {
        &self.shell
    }

    /// Number of background processes launched so far
    pub fn background_count(&self) -> usize {
        lock(&self.background).len()
    }

    /// Resolve once every background process launched so far has exited
    pub async fn wait_for_background(&self) {
        let handles = std::mem::take(&mut *lock(&self.background));
        for handle in handles {
            let _ = handle.await;
        }
    }

    fn command(&self, invocation: &ProcessInvocation) -> Command {
        let mut command = Command::new(&self.shell);
        command.arg("-c").arg(&invocation.command);
        if let Some(dir) = &invocation.working_dir {
            command.current_dir(dir);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

impl ProcessRunner for ShellRunner {
    fn run(&self, invocation: &ProcessInvocation) -> ProcessStream {
        debug!("🏃 Running command: {}", invocation.command);

        let (sender, stream) = ProcessStream::channel(invocation.command.clone());
        let child = match self.command(invocation).spawn() {
            Ok(child) => child,
            Err(source) => {
                let command = invocation.command.clone();
                sender.fail(ProcessError::Spawn { command, source });
                return stream;
            }
        };

        if invocation.background {
            let handle = tokio::spawn(drain_background(invocation.command.clone(), child));
            lock(&self.background).push(handle);
            sender.complete();
        } else {
            tokio::spawn(pump(child, sender));
        }

        stream
    }
}

/// Read `reader` line by line, sending each line as an event.
///
/// Returns the lines read when `capture` is set.
async fn read_lines<R>(
    reader: R,
    origin: Origin,
    events: mpsc::UnboundedSender<StreamEvent>,
    capture: bool,
) -> Vec<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut buffer = Vec::new();
    let mut captured = Vec::new();

    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buffer)
                    .trim_end_matches(&['\n', '\r'][..])
                    .to_string();
                if capture {
                    captured.push(line.clone());
                }
                let _ = events.send(StreamEvent { origin, line });
            }
            Err(e) => {
                debug!("Stopped reading {}: {}", origin.as_str(), e);
                break;
            }
        }
    }

    captured
}

async fn pump(mut child: Child, sender: StreamSender) {
    let command = sender.command.clone();

    let stdout = child.stdout.take().map(|pipe| {
        tokio::spawn(read_lines(pipe, Origin::Stdout, sender.events.clone(), false))
    });
    let stderr = child.stderr.take().map(|pipe| {
        tokio::spawn(read_lines(pipe, Origin::Stderr, sender.events.clone(), true))
    });

    let status = child.wait().await;

    if let Some(task) = stdout {
        let _ = task.await;
    }
    let stderr_lines = match stderr {
        Some(task) => task.await.unwrap_or_default(),
        None => Vec::new(),
    };

    match status {
        Ok(status) if status.success() => {
            debug!("Command succeeded: {}", command);
            sender.complete();
        }
        Ok(status) => {
            debug!("Command failed with {}: {}", status, command);
            sender.fail(ProcessError::Failed {
                command,
                code: status.code(),
                stderr: stderr_lines.join("\n"),
            });
        }
        Err(source) => sender.fail(ProcessError::Wait { command, source }),
    }
}

async fn drain_background(command: String, mut child: Child) {
    let (events, mut received) = mpsc::unbounded_channel();
    if let Some(pipe) = child.stdout.take() {
        tokio::spawn(read_lines(pipe, Origin::Stdout, events.clone(), false));
    }
    if let Some(pipe) = child.stderr.take() {
        tokio::spawn(read_lines(pipe, Origin::Stderr, events.clone(), false));
    }
    drop(events);

    let mut sink = LogSink;
    while let Some(event) = received.recv().await {
        sink.emit(&event);
    }

    match child.wait().await {
        Ok(status) => debug!("Background command exited with {}: {}", status, command),
        Err(e) => warn!("Lost track of background command `{}`: {}", command, e),
    }
}

pub mod mock {
    //! Scripted process runner for exercising pipelines without a shell
    //!
    //! Responses are matched by substring against the command line, most
    //! recently registered first. Every invocation is recorded with the instant
    //! it started and the instant its stream reported an outcome.

    use super::{lock, ProcessInvocation, ProcessRunner, ProcessStream, StreamEvent};
    use crate::errors::ProcessError;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    /// Scripted behavior for matching invocations
    #[derive(Debug, Clone, Default)]
    pub struct MockResponse {
        pub stdout: Vec<String>,
        pub stderr: Vec<String>,
        pub exit_code: i32,
        /// Time to wait before emitting output and exiting
        pub delay: Option<Duration>,
        /// Files created (with parents) when the command runs
        pub creates: Vec<PathBuf>,
    }

    impl MockResponse {
        pub fn success() -> Self {
            Self::default()
        }

        pub fn failure(exit_code: i32) -> Self {
            Self {
                exit_code,
                ..Self::default()
            }
        }

        pub fn with_stdout(mut self, line: impl Into<String>) -> Self {
            self.stdout.push(line.into());
            self
        }

        pub fn with_stderr(mut self, line: impl Into<String>) -> Self {
            self.stderr.push(line.into());
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn creating(mut self, path: impl Into<PathBuf>) -> Self {
            self.creates.push(path.into());
            self
        }
    }

    /// Record of one invocation
    #[derive(Debug, Clone)]
    pub struct MockCall {
        pub invocation: ProcessInvocation,
        pub started: Instant,
        pub completed: Option<Instant>,
    }

    #[derive(Debug, Clone, Default)]
    pub struct MockProcessRunner {
        responses: Arc<Mutex<Vec<(String, MockResponse)>>>,
        history: Arc<Mutex<Vec<MockCall>>>,
    }

    impl MockProcessRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Script the response for commands containing `pattern`
        pub fn respond(&self, pattern: impl Into<String>, response: MockResponse) {
            lock(&self.responses).push((pattern.into(), response));
        }

        pub fn calls(&self) -> Vec<MockCall> {
            lock(&self.history).clone()
        }

        pub fn commands(&self) -> Vec<String> {
            lock(&self.history)
                .iter()
                .map(|call| call.invocation.command.clone())
                .collect()
        }

        /// Number of invocations whose command contains `pattern`
        pub fn count_matching(&self, pattern: &str) -> usize {
            lock(&self.history)
                .iter()
                .filter(|call| call.invocation.command.contains(pattern))
                .count()
        }

        fn response_for(&self, command: &str) -> MockResponse {
            lock(&self.responses)
                .iter()
                .rev()
                .find(|(pattern, _)| command.contains(pattern.as_str()))
                .map(|(_, response)| response.clone())
                .unwrap_or_default()
        }

        fn record(&self, invocation: &ProcessInvocation) -> usize {
            let mut history = lock(&self.history);
            history.push(MockCall {
                invocation: invocation.clone(),
                started: Instant::now(),
                completed: None,
            });
            history.len() - 1
        }
    }

    fn mark_completed(history: &Mutex<Vec<MockCall>>, index: usize) {
        if let Some(call) = lock(history).get_mut(index) {
            call.completed = Some(Instant::now());
        }
    }

    fn create_files(paths: &[PathBuf]) -> std::io::Result<()> {
        for path in paths {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, "")?;
        }
        Ok(())
    }

    impl ProcessRunner for MockProcessRunner {
        fn run(&self, invocation: &ProcessInvocation) -> ProcessStream {
            let response = self.response_for(&invocation.command);
            let index = self.record(invocation);
            let history = Arc::clone(&self.history);
            let (sender, stream) = ProcessStream::channel(invocation.command.clone());

            if invocation.background {
                mark_completed(&history, index);
                sender.complete();
                return stream;
            }

            tokio::spawn(async move {
                if let Some(delay) = response.delay {
                    tokio::time::sleep(delay).await;
                }
                let command = sender.command().to_string();
                if let Err(e) = create_files(&response.creates) {
                    mark_completed(&history, index);
                    sender.fail(ProcessError::Failed {
                        command,
                        code: Some(1),
                        stderr: e.to_string(),
                    });
                    return;
                }
                for line in &response.stdout {
                    sender.emit(StreamEvent::stdout(line.clone()));
                }
                for line in &response.stderr {
                    sender.emit(StreamEvent::stderr(line.clone()));
                }
                mark_completed(&history, index);
                if response.exit_code == 0 {
                    sender.complete();
                } else {
                    sender.fail(ProcessError::Failed {
                        command,
                        code: Some(response.exit_code),
                        stderr: response.stderr.join("\n"),
                    });
                }
            });

            stream
        }
    }
}
