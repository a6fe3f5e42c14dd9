use std::process::Stdio;

#[cfg(windows)]
use std::os::windows::process::CommandExt as _;
#[cfg(unix)]
use std::os::unix::process::CommandExt as _;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;
#[cfg(windows)]
const DETACHED_PROCESS: u32 = 0x0000_0008;

/// Keeps captured children from flashing a console window on Windows.
pub trait HideWindow {
    fn hide_window(&mut self) -> &mut Self;
}

impl HideWindow for tokio::process::Command {
    #[cfg(windows)]
    fn hide_window(&mut self) -> &mut Self {
        self.creation_flags(CREATE_NO_WINDOW)
    }

    #[cfg(not(windows))]
    fn hide_window(&mut self) -> &mut Self {
        self
    }
}

impl HideWindow for std::process::Command {
    #[cfg(windows)]
    fn hide_window(&mut self) -> &mut Self {
        self.creation_flags(CREATE_NO_WINDOW)
    }

    #[cfg(not(windows))]
    fn hide_window(&mut self) -> &mut Self {
        self
    }
}

/// Configures a command to outlive its parent: no inherited stdio and its
/// own process group, so the caller can exit without waiting on it.
pub trait Detach {
    fn detached(&mut self) -> &mut Self;
}

impl Detach for std::process::Command {
    fn detached(&mut self) -> &mut Self {
        self.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            self.process_group(0);
        }

        #[cfg(windows)]
        {
            self.creation_flags(CREATE_NO_WINDOW | DETACHED_PROCESS);
        }

        self
    }
}
