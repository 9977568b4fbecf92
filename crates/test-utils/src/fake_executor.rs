use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncWriteExt, DuplexStream, duplex};
use tokio::sync::oneshot;
use execwatch::errors::ExecwatchError;
use execwatch::exec::{CmdResult, ExecFuture, RemoteExecutor, RemoteProcess, RemoteStream};
use execwatch::types::Target;

const PIPE_CAPACITY: usize = 64 * 1024;

/// An in-memory executor:
/// - records every command it was asked to run
/// - answers `run_sync` from a queue of canned results (default: success)
/// - answers `run_async` with duplex pipes whose write ends the test drives
///   through a [`FakeRemote`].
#[derive(Clone, Default)]
pub struct FakeExecutor {
    inner: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
struct FakeState {
    sync_calls: Vec<(Target, String)>,
    async_calls: Vec<(Target, String)>,
    sync_responses: VecDeque<CmdResult>,
    remotes: VecDeque<FakeRemote>,
    fail_async_start: bool,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue results for subsequent `run_sync` calls, in order.
    pub fn with_sync_responses(self, responses: Vec<CmdResult>) -> Self {
        self.inner.lock().unwrap().sync_responses.extend(responses);
        self
    }

    /// Make every `run_async` fail as if the launch failed.
    pub fn failing_async_start(self) -> Self {
        self.inner.lock().unwrap().fail_async_start = true;
        self
    }

    pub fn sync_calls(&self) -> Vec<(Target, String)> {
        self.inner.lock().unwrap().sync_calls.clone()
    }

    pub fn async_calls(&self) -> Vec<(Target, String)> {
        self.inner.lock().unwrap().async_calls.clone()
    }

    /// The driver side of the oldest background command not yet taken.
    pub fn take_remote(&self) -> FakeRemote {
        self.inner
            .lock()
            .unwrap()
            .remotes
            .pop_front()
            .expect("no background command was started")
    }
}

impl RemoteExecutor for FakeExecutor {
    fn run_sync<'a>(
        &'a self,
        target: &'a Target,
        command: &'a str,
    ) -> ExecFuture<'a, CmdResult> {
        Box::pin(async move {
            let mut state = self.inner.lock().unwrap();
            state.sync_calls.push((target.clone(), command.to_string()));
            Ok(state.sync_responses.pop_front().unwrap_or_else(ok_result))
        })
    }

    fn run_async<'a>(
        &'a self,
        target: &'a Target,
        command: &'a str,
    ) -> ExecFuture<'a, RemoteStream> {
        Box::pin(async move {
            let mut state = self.inner.lock().unwrap();
            state.async_calls.push((target.clone(), command.to_string()));

            if state.fail_async_start {
                return Err(ExecwatchError::Start {
                    target: target.to_string(),
                    command: command.to_string(),
                    source: anyhow::anyhow!("connection refused"),
                });
            }

            let (out_writer, out_reader) = duplex(PIPE_CAPACITY);
            let (err_writer, err_reader) = duplex(PIPE_CAPACITY);
            let (exit_tx, exit_rx) = oneshot::channel();
            let killed = Arc::new(AtomicBool::new(false));

            state.remotes.push_back(FakeRemote {
                stdout: Some(out_writer),
                stderr: Some(err_writer),
                exit_tx: Some(exit_tx),
                killed: Arc::clone(&killed),
            });

            Ok(RemoteStream {
                stdout: Box::new(out_reader),
                stderr: Some(Box::new(err_reader)),
                process: Box::new(FakeProcess {
                    exit_rx: Some(exit_rx),
                    exit_code: None,
                    killed,
                }),
            })
        })
    }
}

/// Successful result with empty output.
pub fn ok_result() -> CmdResult {
    CmdResult {
        stdout: String::new(),
        stderr: String::new(),
        exit_code: Some(0),
    }
}

/// Failed result with the given exit code and stderr.
pub fn failed_result(code: i32, stderr: &str) -> CmdResult {
    CmdResult {
        stdout: String::new(),
        stderr: stderr.to_string(),
        exit_code: Some(code),
    }
}

/// Test-side driver of one fake background command.
pub struct FakeRemote {
    stdout: Option<DuplexStream>,
    stderr: Option<DuplexStream>,
    exit_tx: Option<oneshot::Sender<Option<i32>>>,
    killed: Arc<AtomicBool>,
}

impl FakeRemote {
    /// Write one stdout line. Writes after the reader is gone are dropped.
    pub async fn emit(&mut self, line: &str) {
        if let Some(out) = self.stdout.as_mut() {
            let _ = out.write_all(format!("{line}\n").as_bytes()).await;
        }
    }

    /// Write raw bytes to stdout, without adding a newline.
    pub async fn emit_raw(&mut self, bytes: &[u8]) {
        if let Some(out) = self.stdout.as_mut() {
            let _ = out.write_all(bytes).await;
        }
    }

    pub async fn emit_stderr(&mut self, line: &str) {
        if let Some(err) = self.stderr.as_mut() {
            let _ = err.write_all(format!("{line}\n").as_bytes()).await;
        }
    }

    /// Close both pipes and report `code` as the exit status.
    pub fn exit(mut self, code: Option<i32>) {
        self.stdout.take();
        self.stderr.take();
        if let Some(tx) = self.exit_tx.take() {
            let _ = tx.send(code);
        }
    }

    pub fn was_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }
}

struct FakeProcess {
    exit_rx: Option<oneshot::Receiver<Option<i32>>>,
    exit_code: Option<Option<i32>>,
    killed: Arc<AtomicBool>,
}

impl RemoteProcess for FakeProcess {
    fn kill(&mut self) -> ExecFuture<'_, ()> {
        Box::pin(async move {
            self.killed.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn wait(&mut self) -> ExecFuture<'_, Option<i32>> {
        Box::pin(async move {
            if let Some(code) = self.exit_code {
                return Ok(code);
            }
            let code = match self.exit_rx.as_mut() {
                Some(rx) => rx.await.unwrap_or(None),
                None => None,
            };
            self.exit_rx = None;
            self.exit_code = Some(code);
            Ok(code)
        })
    }
}
