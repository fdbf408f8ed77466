// src/artifacts/mask.rs

//! Raster masking through an external command (GDAL by default).

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{anyhow, Context};
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::{PropagatorError, Result};

/// Runs the configured mask command once per raster.
///
/// Arguments may contain `{input}`, `{output}` and `{cutline}`; the first
/// element is the program.
#[derive(Debug, Clone)]
pub struct CommandMasker {
    command: Vec<String>,
}

/// `cutoff_<basename>` next to the input.
pub fn masked_path(input: &Path) -> Result<PathBuf> {
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("raster path {input:?} has no file name"))?;
    Ok(input.with_file_name(format!("cutoff_{name}")))
}

impl CommandMasker {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    fn render(&self, input: &Path, output: &Path, cutline: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        let cutline = cutline.to_string_lossy();
        self.command
            .iter()
            .map(|arg| {
                arg.replace("{input}", &input)
                    .replace("{output}", &output)
                    .replace("{cutline}", &cutline)
            })
            .collect()
    }

    /// Mask `input` on the polygons in `cutline`, returning the masked file.
    pub async fn mask(&self, input: &Path, cutline: &Path) -> Result<PathBuf> {
        let output = masked_path(input)?;
        let argv = self.render(input, &output, cutline);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| PropagatorError::ConfigError("mask command is empty".to_string()))?;

        debug!(program = %program, args = ?args, "running mask command");
        let result = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("spawning mask command '{program}'"))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(anyhow!(
                "mask command '{program}' failed for {input:?} ({}): {}",
                result.status,
                stderr.trim()
            )
            .into());
        }

        info!(input = ?input, output = ?output, "raster masked");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masked_path_prefixes_basename() {
        let out = masked_path(Path::new("/work/r1/RoS_max_72.tiff")).unwrap();
        assert_eq!(out, PathBuf::from("/work/r1/cutoff_RoS_max_72.tiff"));
    }

    #[test]
    fn render_substitutes_all_placeholders() {
        let masker = CommandMasker::new(vec![
            "gdalwarp".into(),
            "-cutline".into(),
            "{cutline}".into(),
            "{input}".into(),
            "{output}".into(),
        ]);
        let argv = masker.render(
            Path::new("/r/in.tiff"),
            Path::new("/r/cutoff_in.tiff"),
            Path::new("/r/iso.geojson"),
        );
        assert_eq!(
            argv,
            vec!["gdalwarp", "-cutline", "/r/iso.geojson", "/r/in.tiff", "/r/cutoff_in.tiff"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_reports_stderr() {
        let masker = CommandMasker::new(vec![
            "sh".into(),
            "-c".into(),
            "echo broken raster >&2; exit 1".into(),
        ]);
        let err = masker
            .mask(Path::new("/tmp/in.tiff"), Path::new("/tmp/cut.geojson"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("broken raster"));
    }
}
