// src/utils/windows.rs

use super::powershell::{script_arguments, ScopedTempFile};

/// Win32 `ERROR_CANCELLED`, returned by the shell when the user dismisses the UAC prompt.
pub const ERROR_CANCELLED_CODE: u32 = 1223;

/// Result of one attempt to run a script with elevated privileges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElevationOutcome {
    /// The elevated process ran to completion with this exit code.
    Granted { exit_code: i32 },
    /// The user declined the elevation prompt.
    DeniedByUser,
    /// The elevation mechanism itself failed.
    Failed(String),
}

/// Privilege queries and elevated execution.
pub trait PrivilegeBroker: Send + Sync {
    /// Whether the current process already holds administrative rights. Fails closed.
    fn is_privileged(&self) -> bool;

    /// Runs `script_body` through an elevation prompt and blocks until the elevated
    /// process exits.
    fn run_elevated(&self, script_body: &str) -> ElevationOutcome;
}

/// Elevation through the OS shell (`runas` verb).
#[derive(Debug, Clone)]
pub struct SystemPrivilegeBroker {
    interpreter: String,
}

impl SystemPrivilegeBroker {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }
}

impl PrivilegeBroker for SystemPrivilegeBroker {
    fn is_privileged(&self) -> bool {
        is_elevated()
    }

    fn run_elevated(&self, script_body: &str) -> ElevationOutcome {
        let script = match ScopedTempFile::script(script_body) {
            Ok(script) => script,
            Err(e) => return ElevationOutcome::Failed(format!("Failed to write script: {}", e)),
        };

        let parameters = std::iter::once("-WindowStyle Hidden".to_string())
            .chain(script_arguments(script.path()).into_iter().map(quote_argument))
            .collect::<Vec<_>>()
            .join(" ");

        tracing::info!("Requesting elevation for '{}'", script.path().display());
        let outcome = shell_execute_elevated(&self.interpreter, &parameters);
        tracing::info!("Elevation outcome: {:?}", outcome);

        // `script` is dropped here, after the elevated process has exited.
        outcome
    }
}

/// Maps a failed shell launch to an outcome. The shell reports a dismissed prompt
/// either as the raw Win32 code or wrapped in an HRESULT.
pub fn classify_launch_error(code: i32, message: &str) -> ElevationOutcome {
    let cancelled_hresult = hresult_from_win32(ERROR_CANCELLED_CODE);
    if code == cancelled_hresult || code as u32 == ERROR_CANCELLED_CODE {
        ElevationOutcome::DeniedByUser
    } else {
        ElevationOutcome::Failed(format!("{} (0x{:08X})", message.trim(), code as u32))
    }
}

fn hresult_from_win32(code: u32) -> i32 {
    ((code & 0x0000_FFFF) | (7 << 16) | 0x8000_0000) as i32
}

fn quote_argument(argument: String) -> String {
    if argument.contains(' ') && !argument.starts_with('"') {
        format!("\"{}\"", argument)
    } else {
        argument
    }
}

/// Checks if the current process is running with elevated (administrator) privileges.
///
/// # Returns
///
/// - `true` if the process is elevated.
/// - `false` otherwise, including when the token cannot be queried.
#[cfg(windows)]
pub fn is_elevated() -> bool {
    use windows::Win32::{
        Foundation::HANDLE,
        Security::{GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY},
        System::Threading::{GetCurrentProcess, OpenProcessToken},
    };

    use super::HandleGuard;

    let mut handle: HANDLE = HANDLE::default();
    if unsafe { OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut handle) }.is_err() {
        tracing::debug!("OpenProcessToken failed, assuming not elevated.");
        return false;
    }
    let _guard = HandleGuard { handle };

    let mut elevation = TOKEN_ELEVATION::default();
    let size = std::mem::size_of::<TOKEN_ELEVATION>() as u32;
    let mut ret_size = 0u32;
    let queried = unsafe {
        GetTokenInformation(
            handle,
            TokenElevation,
            Some(&mut elevation as *mut _ as *mut _),
            size,
            &mut ret_size,
        )
    };
    match queried {
        Ok(()) => elevation.TokenIsElevated != 0,
        Err(e) => {
            tracing::debug!("GetTokenInformation failed: {:?}", e);
            false
        }
    }
}

#[cfg(not(windows))]
pub fn is_elevated() -> bool {
    false
}

#[cfg(windows)]
fn shell_execute_elevated(program: &str, parameters: &str) -> ElevationOutcome {
    use widestring::U16CString;
    use windows::{
        core::{w, PCWSTR},
        Win32::{
            System::Threading::{GetExitCodeProcess, WaitForSingleObject, INFINITE},
            UI::{
                Shell::{
                    ShellExecuteExW, SEE_MASK_NOASYNC, SEE_MASK_NOCLOSEPROCESS, SHELLEXECUTEINFOW,
                },
                WindowsAndMessaging::SW_HIDE,
            },
        },
    };

    use super::HandleGuard;

    let (program_w, parameters_w) =
        match (U16CString::from_str(program), U16CString::from_str(parameters)) {
            (Ok(program), Ok(parameters)) => (program, parameters),
            _ => return ElevationOutcome::Failed("Command line contains a NUL byte".to_string()),
        };

    let mut info = SHELLEXECUTEINFOW {
        cbSize: std::mem::size_of::<SHELLEXECUTEINFOW>() as u32,
        fMask: SEE_MASK_NOCLOSEPROCESS | SEE_MASK_NOASYNC,
        lpVerb: w!("runas"),
        lpFile: PCWSTR(program_w.as_ptr()),
        lpParameters: PCWSTR(parameters_w.as_ptr()),
        nShow: SW_HIDE.0,
        ..Default::default()
    };

    if let Err(e) = unsafe { ShellExecuteExW(&mut info) } {
        return classify_launch_error(e.code().0, &e.message());
    }
    if info.hProcess.is_invalid() {
        return ElevationOutcome::Failed("The shell did not return a process handle".to_string());
    }
    let process = HandleGuard {
        handle: info.hProcess,
    };

    // A person is answering the prompt, so there is no timeout here.
    unsafe { WaitForSingleObject(process.handle, INFINITE) };

    let mut exit_code = 0u32;
    match unsafe { GetExitCodeProcess(process.handle, &mut exit_code) } {
        Ok(()) => ElevationOutcome::Granted {
            exit_code: exit_code as i32,
        },
        Err(e) => ElevationOutcome::Failed(format!("Failed to read exit code: {}", e.message())),
    }
}

#[cfg(not(windows))]
fn shell_execute_elevated(program: &str, _parameters: &str) -> ElevationOutcome {
    ElevationOutcome::Failed(format!(
        "Cannot elevate '{}': elevation prompts are only available on Windows",
        program
    ))
}
