//! # Persisted runtime files: pid lock and IPC-port sidecar.
//!
//! Two small files in the working directory tie a running master to the
//! operator CLI:
//!
//! - `.gpd-runtime.pid` — decimal pid of the master; doubles as the
//!   single-instance lock.
//! - `.gpd-runtime.port` — decimal port of the loopback IPC endpoint,
//!   written once the endpoint is bound.
//!
//! A lock whose referent process no longer exists is stale and gets
//! reclaimed together with its sidecar. Both files are removed at clean
//! exit ([`RunFiles`] removes them on drop).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use crate::error::RuntimeError;

/// Pid lock file name.
pub const PID_FILE: &str = ".gpd-runtime.pid";
/// IPC-port sidecar file name, next to the pid file.
pub const PORT_FILE: &str = ".gpd-runtime.port";

/// Holder of the pid lock. Dropping it removes the lock and the sidecar.
#[derive(Debug)]
pub struct RunFiles {
    dir: PathBuf,
}

impl RunFiles {
    /// Acquires the pid lock in `dir`.
    ///
    /// Fails with [`RuntimeError::AlreadyRunning`] when the recorded pid
    /// refers to a live process; a dead referent is reclaimed.
    pub fn acquire(dir: impl Into<PathBuf>) -> Result<Self, RuntimeError> {
        let files = Self { dir: dir.into() };

        if let Some(pid) = read_pid_in(&files.dir)? {
            if process_alive(pid) {
                // Leak self so Drop does not delete the live owner's files.
                std::mem::forget(files);
                return Err(RuntimeError::AlreadyRunning { pid });
            }
            let _ = fs::remove_file(files.pid_path());
            let _ = fs::remove_file(files.port_path());
        }

        fs::write(
            files.pid_path(),
            format!("{}\n", std::process::id()),
        )
        .map_err(|source| RuntimeError::RunFile { source })?;
        Ok(files)
    }

    /// Publishes the bound IPC port to the sidecar file.
    pub fn publish_port(&self, port: u16) -> Result<(), RuntimeError> {
        fs::write(self.port_path(), format!("{port}\n"))
            .map_err(|source| RuntimeError::RunFile { source })
    }

    fn pid_path(&self) -> PathBuf {
        self.dir.join(PID_FILE)
    }

    fn port_path(&self) -> PathBuf {
        self.dir.join(PORT_FILE)
    }
}

impl Drop for RunFiles {
    fn drop(&mut self) {
        let _ = fs::remove_file(self.pid_path());
        let _ = fs::remove_file(self.port_path());
    }
}

/// Reads the recorded master pid in `dir`, if the lock file exists and
/// parses. Unparsable content counts as absent (stale garbage).
pub fn read_pid_in(dir: &Path) -> Result<Option<i32>, RuntimeError> {
    match fs::read_to_string(dir.join(PID_FILE)) {
        Ok(content) => Ok(content.trim().parse().ok()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(RuntimeError::RunFile { source }),
    }
}

/// Reads the published IPC port in `dir`. Missing or malformed sidecar
/// means the IPC surface is unavailable.
pub fn read_port_in(dir: &Path) -> Option<u16> {
    fs::read_to_string(dir.join(PORT_FILE))
        .ok()
        .and_then(|content| content.trim().parse().ok())
        .filter(|port| *port != 0)
}

/// True when a process with this pid exists (signal 0 delivery check).
pub fn process_alive(pid: i32) -> bool {
    kill(Pid::from_raw(pid), None::<Signal>).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_writes_own_pid_and_cleans_up_on_drop() {
        let dir = tempfile::tempdir().unwrap();

        let files = RunFiles::acquire(dir.path()).unwrap();
        let recorded = read_pid_in(dir.path()).unwrap().unwrap();
        assert_eq!(recorded, std::process::id() as i32);

        files.publish_port(8080).unwrap();
        assert_eq!(read_port_in(dir.path()), Some(8080));

        drop(files);
        assert!(read_pid_in(dir.path()).unwrap().is_none());
        assert_eq!(read_port_in(dir.path()), None);
    }

    #[test]
    fn second_acquire_fails_while_owner_lives() {
        let dir = tempfile::tempdir().unwrap();

        let _files = RunFiles::acquire(dir.path()).unwrap();
        let err = RunFiles::acquire(dir.path()).unwrap_err();
        match err {
            RuntimeError::AlreadyRunning { pid } => {
                assert_eq!(pid, std::process::id() as i32);
            }
            other => panic!("expected AlreadyRunning, got {other:?}"),
        }

        // The failed attempt must not have deleted the owner's lock.
        assert!(read_pid_in(dir.path()).unwrap().is_some());
    }

    #[test]
    fn stale_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();

        // A pid far above any live process on the host.
        fs::write(dir.path().join(PID_FILE), "2000000000\n").unwrap();
        fs::write(dir.path().join(PORT_FILE), "9999\n").unwrap();

        let files = RunFiles::acquire(dir.path()).unwrap();
        let recorded = read_pid_in(dir.path()).unwrap().unwrap();
        assert_eq!(recorded, std::process::id() as i32);
        assert_eq!(read_port_in(dir.path()), None, "stale sidecar reclaimed");
        drop(files);
    }

    #[test]
    fn garbage_lock_content_counts_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(PID_FILE), "not-a-pid\n").unwrap();

        assert!(read_pid_in(dir.path()).unwrap().is_none());
        let _files = RunFiles::acquire(dir.path()).unwrap();
    }
}
