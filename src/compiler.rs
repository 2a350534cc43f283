/// External model-compiler invocation
use crate::constants::COMPILER_BINARY;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to launch model compiler: {0}")]
    Launch(#[from] std::io::Error),
    #[error("model compiler reported {0}")]
    Failed(std::process::ExitStatus),
}

/// Capability interface for turning a generated build script into a
/// compiled model.
pub trait ModelCompiler {
    fn compile(&self, script_path: &Path) -> Result<(), CompileError>;
}

/// Blocking `studiomdl` invocation. The compiler resolves output paths
/// itself from its game configuration; only the script path is passed.
pub struct StudiomdlCompiler {
    binary: PathBuf,
}

impl StudiomdlCompiler {
    pub fn new(bin_path: &Path) -> Self {
        Self {
            binary: bin_path.join(COMPILER_BINARY),
        }
    }
}

impl ModelCompiler for StudiomdlCompiler {
    fn compile(&self, script_path: &Path) -> Result<(), CompileError> {
        let status = Command::new(&self.binary).arg(script_path).status()?;
        if !status.success() {
            return Err(CompileError::Failed(status));
        }
        Ok(())
    }
}
