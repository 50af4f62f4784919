//! Archive extraction via the 7-Zip command line tool.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use convert_core::error::{ConvertError, Result};
use convert_core::plugin::Extractor;

/// Executable names tried on PATH, in order.
const EXECUTABLE_NAMES: &[&str] = &["7z", "7za", "7zz"];

/// Default install locations on Windows.
const WINDOWS_CANDIDATES: &[&str] = &[
    r"C:\Program Files\7-Zip\7z.exe",
    r"C:\Program Files (x86)\7-Zip\7z.exe",
];

/// Extracts archives by running `7z x -y -aoa -bd <archive> -o<dest>`.
pub struct SevenZipExtractor {
    executable: Option<PathBuf>,
}

impl SevenZipExtractor {
    /// Locate 7-Zip: an explicit path first, then PATH, then the standard
    /// Windows install directories.
    pub fn locate(explicit: Option<&Path>) -> Self {
        let executable = find_seven_zip(explicit);
        match executable {
            Some(ref exe) => log::debug!("Using 7-Zip at {}", exe.display()),
            None => log::warn!("7-Zip executable not found"),
        }
        Self { executable }
    }

    /// Use the given executable without searching.
    pub fn with_executable(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: Some(executable.into()),
        }
    }

    pub fn executable(&self) -> Option<&Path> {
        self.executable.as_deref()
    }

    fn require_executable(&self) -> Result<&Path> {
        self.executable.as_deref().ok_or_else(|| {
            ConvertError::Config(
                "7-Zip not found. Install 7-Zip, add it to PATH or set seven_zip_path."
                    .to_string(),
            )
        })
    }
}

fn find_seven_zip(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        if let Ok(found) = which::which(path) {
            return Some(found);
        }
        log::warn!("Configured 7-Zip path {} not usable", path.display());
    }

    for name in EXECUTABLE_NAMES {
        if let Ok(found) = which::which(name) {
            return Some(found);
        }
    }

    WINDOWS_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
}

impl Extractor for SevenZipExtractor {
    fn name(&self) -> &str {
        "7-Zip"
    }

    fn check_available(&self) -> Result<()> {
        self.require_executable().map(|_| ())
    }

    fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        let exe = self.require_executable()?;

        let mut out_arg = OsString::from("-o");
        out_arg.push(dest.as_os_str());

        // -y: yes to all queries, -aoa: overwrite all, -bd: no progress indicator
        let output = Command::new(exe)
            .arg("x")
            .arg("-y")
            .arg("-aoa")
            .arg("-bd")
            .arg(archive.as_os_str())
            .arg(out_arg)
            .output()
            .map_err(|e| ConvertError::Extraction {
                archive: archive.to_path_buf(),
                diagnostics: format!("Failed to run {}: {}", exe.display(), e),
            })?;

        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConvertError::Extraction {
                archive: archive.to_path_buf(),
                diagnostics: format!("STDOUT:\n{}\n\nSTDERR:\n{}", stdout.trim_end(), stderr.trim_end()),
            });
        }

        log::debug!("7-Zip extracted {} into {}", archive.display(), dest.display());
        Ok(())
    }
}
