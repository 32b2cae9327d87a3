// src/utils/powershell.rs

use std::{
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crate::{
    constants::{PROCESS_POLL_INTERVAL, SYNTHETIC_FAILURE_CODE, TEMP_SCRIPT_PREFIX},
    errors::CommandError,
};

/// How captured output bytes are turned into text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputEncoding {
    #[default]
    Utf8,
    /// The system OEM code page that native console tools such as `powercfg`
    /// write in when their output is redirected.
    Oem,
    /// An explicit Windows code page, e.g. 852.
    CodePage(u32),
}

/// A single external command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Whether stdout/stderr are piped back to the caller.
    pub capture: bool,
    pub encoding: OutputEncoding,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            capture: true,
            encoding: OutputEncoding::Utf8,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn capture(mut self, capture: bool) -> Self {
        self.capture = capture;
        self
    }

    pub fn encoding(mut self, encoding: OutputEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Human-readable form used in logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Outcome of one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executes external command lines. Implementations block the calling thread
/// until the process exits or a timeout ceiling is reached.
pub trait CommandRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> Result<CommandResult, CommandError>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandResult, CommandError> {
        tracing::debug!("Running '{}'", invocation.command_line());

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args).stdin(Stdio::null());
        if invocation.capture {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
        hide_console_window(&mut command);

        let mut child = command
            .spawn()
            .map_err(|source| CommandError::SpawnFailure {
                program: invocation.program.clone(),
                source,
            })?;

        let stdout_reader = child.stdout.take().map(spawn_reader);
        let stderr_reader = child.stderr.take().map(spawn_reader);

        // Readers of a killed child are not joined: a grandchild may still hold
        // the pipes. They exit once the last writer closes.
        // No deadline when the ceiling does not fit in an `Instant`.
        let deadline = Instant::now().checked_add(self.timeout);
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if deadline.is_some_and(|d| Instant::now() >= d) => {
                    tracing::error!(
                        "'{}' exceeded {:?}, killing it.",
                        invocation.program,
                        self.timeout
                    );
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(CommandError::Timeout {
                        program: invocation.program.clone(),
                        timeout: self.timeout,
                    });
                }
                Ok(None) => thread::sleep(PROCESS_POLL_INTERVAL),
                Err(source) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(CommandError::Wait {
                        program: invocation.program.clone(),
                        source,
                    });
                }
            }
        };

        let (stdout, stdout_ok) = collect_reader(stdout_reader, invocation.encoding);
        let (stderr, stderr_ok) = collect_reader(stderr_reader, invocation.encoding);

        let exit_code = match status.code() {
            Some(code) if stdout_ok && stderr_ok => code,
            _ => SYNTHETIC_FAILURE_CODE,
        };

        tracing::debug!(
            "'{}' exited with code {}",
            invocation.program,
            exit_code
        );

        Ok(CommandResult {
            exit_code,
            stdout,
            stderr,
        })
    }
}

#[cfg(windows)]
fn hide_console_window(command: &mut Command) {
    use std::os::windows::process::CommandExt;

    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    command.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn hide_console_window(_command: &mut Command) {}

fn spawn_reader<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        Ok(buffer)
    })
}

/// Joins a pipe reader. The flag is false when capture failed.
fn collect_reader(
    reader: Option<JoinHandle<io::Result<Vec<u8>>>>,
    encoding: OutputEncoding,
) -> (String, bool) {
    match reader.map(JoinHandle::join) {
        None => (String::new(), true),
        Some(Ok(Ok(bytes))) => (decode_output(&bytes, encoding), true),
        Some(Ok(Err(e))) => {
            tracing::error!("Failed to read process output: {}", e);
            (String::new(), false)
        }
        Some(Err(_)) => {
            tracing::error!("Process output reader panicked.");
            (String::new(), false)
        }
    }
}

/// Decodes captured output. Invalid sequences become U+FFFD.
pub fn decode_output(bytes: &[u8], encoding: OutputEncoding) -> String {
    match encoding {
        OutputEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        OutputEncoding::Oem => decode_code_page(bytes, oem_code_page()),
        OutputEncoding::CodePage(code_page) => decode_code_page(bytes, code_page),
    }
}

#[cfg(windows)]
fn oem_code_page() -> u32 {
    unsafe { windows::Win32::Globalization::GetOEMCP() }
}

/// Non-Windows consoles have no OEM code page; tools there write UTF-8.
#[cfg(not(windows))]
fn oem_code_page() -> u32 {
    crate::constants::UTF8_CODE_PAGE
}

#[cfg(windows)]
fn decode_code_page(bytes: &[u8], code_page: u32) -> String {
    use windows::Win32::Globalization::{MultiByteToWideChar, MULTI_BYTE_TO_WIDE_CHAR_FLAGS};

    if bytes.is_empty() {
        return String::new();
    }
    let flags = MULTI_BYTE_TO_WIDE_CHAR_FLAGS(0);
    let needed = unsafe { MultiByteToWideChar(code_page, flags, bytes, None) };
    if needed <= 0 {
        tracing::debug!(
            "Code page {} is not available, decoding output as UTF-8.",
            code_page
        );
        return String::from_utf8_lossy(bytes).into_owned();
    }
    let mut wide = vec![0u16; needed as usize];
    let written = unsafe { MultiByteToWideChar(code_page, flags, bytes, Some(&mut wide)) };
    wide.truncate(written.max(0) as usize);
    String::from_utf16_lossy(&wide)
}

#[cfg(not(windows))]
fn decode_code_page(bytes: &[u8], code_page: u32) -> String {
    if code_page != crate::constants::UTF8_CODE_PAGE {
        tracing::debug!(
            "Code page {} is only decoded on Windows, using UTF-8.",
            code_page
        );
    }
    String::from_utf8_lossy(bytes).into_owned()
}

/// A temporary file that is removed when dropped. Removal failures are ignored.
#[derive(Debug)]
pub struct ScopedTempFile {
    path: PathBuf,
}

impl ScopedTempFile {
    /// Writes `body` (UTF-8 without BOM) to a fresh `.ps1` file.
    pub fn script(body: &str) -> io::Result<Self> {
        Self::with_contents(body, ".ps1")
    }

    /// Creates an empty file for a script to write its results into.
    pub fn empty(suffix: &str) -> io::Result<Self> {
        Self::with_contents("", suffix)
    }

    fn with_contents(body: &str, suffix: &str) -> io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(TEMP_SCRIPT_PREFIX)
            .suffix(suffix)
            .tempfile()?;
        file.write_all(body.as_bytes())?;
        file.flush()?;
        let path = file.into_temp_path().keep().map_err(|e| e.error)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_to_string(&self) -> io::Result<String> {
        fs::read_to_string(self.path())
    }
}

impl Drop for ScopedTempFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::debug!(
                "Could not delete temporary file '{}': {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Arguments that make PowerShell execute a script file.
pub fn script_arguments(path: &Path) -> Vec<String> {
    vec![
        "-NoProfile".to_string(),
        "-ExecutionPolicy".to_string(),
        "Bypass".to_string(),
        "-File".to_string(),
        path.display().to_string(),
    ]
}

/// Stages `body` in a temporary script, runs it with output capture and removes the file.
pub fn run_script(
    runner: &dyn CommandRunner,
    interpreter: &str,
    body: &str,
) -> Result<CommandResult, CommandError> {
    let script = ScopedTempFile::script(body).map_err(CommandError::TempScript)?;
    let invocation = Invocation::new(interpreter)
        .args(script_arguments(script.path()))
        .capture(true);
    runner.run(&invocation)
}
