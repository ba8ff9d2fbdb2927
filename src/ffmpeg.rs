use std::{path::Path, process::ExitStatus, process::Stdio};

#[derive(thiserror::Error, Debug)]
pub enum FfmpegError {
    #[error("I/O error")]
    IoError(#[from] std::io::Error),
    #[error("{program} exited with {status}")]
    Failed { program: String, status: ExitStatus },
}

#[derive(Debug)]
pub struct MuxOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Remux the playlist served at `input` into `output` without re-encoding.
pub async fn mux(program: &str, input: &str, output: &Path) -> Result<MuxOutput, FfmpegError> {
    let mut child = tokio::process::Command::new(program);

    child
        .arg("-hide_banner")
        .arg("-y")
        .arg("-i")
        .arg(input)
        .arg("-c")
        .arg("copy")
        .arg("-bsf:a")
        .arg("aac_adtstoasc")
        .arg(output)
        .stdin(Stdio::null());

    info!("Muxing {} into {}", input, output.display());
    let out = child.output().await?;
    let out = MuxOutput {
        status: out.status,
        stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
    };

    if !out.stdout.is_empty() {
        info!("{} stdout:\n{}", program, out.stdout.trim_end());
    }
    if !out.stderr.is_empty() {
        info!("{} stderr:\n{}", program, out.stderr.trim_end());
    }

    if !out.status.success() {
        return Err(FfmpegError::Failed {
            program: program.to_string(),
            status: out.status,
        });
    }

    Ok(out)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_success() {
        let out = mux("true", "http://localhost:3000", Path::new("out.mp4"))
            .await
            .unwrap();
        assert!(out.status.success());
    }

    #[tokio::test]
    async fn reports_exit_status() {
        let err = mux("false", "http://localhost:3000", Path::new("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, FfmpegError::Failed { program, .. } if program == "false"));
    }

    #[tokio::test]
    async fn missing_program() {
        let err = mux("definitely-not-a-muxer", "http://localhost:3000", Path::new("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, FfmpegError::IoError(_)));
    }
}
