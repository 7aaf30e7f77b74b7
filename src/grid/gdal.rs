use std::process::Stdio;

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::{GridBuilder, GridRequest, InterpolationParams};

/// Runs `gdal_grid` as a child process. The child is killed if the build
/// future is dropped, so an outer timeout or cancellation terminates it.
#[derive(Debug, Clone)]
pub struct GdalGrid {
    program: String,
    format: String,
    params: InterpolationParams,
}

impl GdalGrid {
    pub fn new(program: impl Into<String>, format: impl Into<String>, params: InterpolationParams) -> Self {
        Self {
            program: program.into(),
            format: format.into(),
            params,
        }
    }

    pub fn args(&self, request: &GridRequest) -> Vec<String> {
        vec![
            "-zfield".to_string(),
            request.z_field.clone(),
            "-l".to_string(),
            request.layer.clone(),
            "-a".to_string(),
            self.params.algorithm(),
            "-of".to_string(),
            self.format.clone(),
            request.input.display().to_string(),
            request.output.display().to_string(),
        ]
    }
}

#[async_trait]
impl GridBuilder for GdalGrid {
    async fn build(&self, request: &GridRequest) -> Result<()> {
        let output = tokio::process::Command::new(&self.program)
            .args(self.args(request))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(Error::io(&self.program))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(Error::GridBuilder {
            program: self.program.clone(),
            status: output.status.to_string(),
            message: stderr.lines().last().unwrap_or("unknown error").to_string(),
        })
    }
}
