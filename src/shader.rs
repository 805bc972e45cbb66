//! GLSL to SPIR-V compilation with an on-disk artifact cache.
//!
//! Each stage is compiled only when its artifact is missing or not newer than
//! its source. Whatever path a stage takes, the code handed back is always
//! read from the artifact on disk.

use std::{
    io::Cursor,
    path::{Path, PathBuf},
    sync::Arc,
};

use ash::vk;

use crate::{
    device::Device,
    error::{Error, Result},
    files,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn source_extension(self) -> &'static str {
        match self {
            Self::Vertex => "vert",
            Self::Fragment => "frag",
        }
    }

    /// Keeps vertex and fragment artifacts of the same base name apart.
    pub fn artifact_suffix(self) -> &'static str {
        match self {
            Self::Vertex => ".vert.spv",
            Self::Fragment => ".frag.spv",
        }
    }

    pub fn shader_kind(self) -> shaderc::ShaderKind {
        match self {
            Self::Vertex => shaderc::ShaderKind::Vertex,
            Self::Fragment => shaderc::ShaderKind::Fragment,
        }
    }
}

/// Turns shader source text into SPIR-V words.
pub trait ShaderCompiler {
    fn compile(&mut self, stage: ShaderStage, source: &str, file_name: &str) -> Result<Vec<u32>>;
}

impl<C: ShaderCompiler + ?Sized> ShaderCompiler for &mut C {
    fn compile(&mut self, stage: ShaderStage, source: &str, file_name: &str) -> Result<Vec<u32>> {
        (**self).compile(stage, source, file_name)
    }
}

pub struct ShadercCompiler {
    compiler: shaderc::Compiler,
}

impl ShadercCompiler {
    pub fn new() -> Result<Self> {
        let compiler = shaderc::Compiler::new()
            .ok_or_else(|| Error::PlatformInit("shaderc compiler is not available".to_owned()))?;
        Ok(Self { compiler })
    }
}

impl ShaderCompiler for ShadercCompiler {
    fn compile(&mut self, stage: ShaderStage, source: &str, file_name: &str) -> Result<Vec<u32>> {
        let artifact = self
            .compiler
            .compile_into_spirv(source, stage.shader_kind(), file_name, "main", None)
            .map_err(|e| Error::ShaderCompilation {
                file: file_name.to_owned(),
                message: e.to_string(),
            })?;
        if artifact.get_num_warnings() > 0 {
            log::warn!("{file_name}: {}", artifact.get_warning_messages());
        }
        Ok(artifact.as_binary().to_owned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    UpToDate,
    NeedsCompile,
}

/// How a stage's code came to be on disk during one `ensure_compiled` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    UpToDate,
    Compiled,
}

#[derive(Debug, Clone)]
pub struct ShaderCompilationRecord {
    pub stage: ShaderStage,
    pub source: PathBuf,
    pub artifact: PathBuf,
    pub state: StageState,
}

impl ShaderCompilationRecord {
    fn plan(stage: ShaderStage, source: &Path, artifact_dir: &Path) -> Result<Self> {
        let base_name = source
            .file_stem()
            .ok_or_else(|| Error::InvalidShaderExtension {
                path: source.to_owned(),
                expected: stage.source_extension(),
            })?
            .to_string_lossy();
        let artifact = artifact_dir.join(format!("{base_name}{}", stage.artifact_suffix()));

        let state = if !files::exists(&artifact) {
            log::debug!("Did not find compiled shader for {}", source.display());
            StageState::NeedsCompile
        } else if files::modified(&artifact)? > files::modified(source)? {
            StageState::UpToDate
        } else {
            log::info!("{} changed since it was last compiled", source.display());
            StageState::NeedsCompile
        };

        Ok(Self {
            stage,
            source: source.to_owned(),
            artifact,
            state,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStage {
    pub code: Vec<u32>,
    pub outcome: StageOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStages {
    pub vertex: CompiledStage,
    pub fragment: CompiledStage,
}

#[derive(Debug, Clone)]
pub struct ShaderSources {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

pub struct ShaderCache<C = ShadercCompiler> {
    compiler: C,
    artifact_dir: PathBuf,
}

impl ShaderCache<ShadercCompiler> {
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::with_compiler(ShadercCompiler::new()?, artifact_dir))
    }
}

impl<C: ShaderCompiler> ShaderCache<C> {
    pub fn with_compiler(compiler: C, artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            compiler,
            artifact_dir: artifact_dir.into(),
        }
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    pub fn ensure_compiled(&mut self, sources: &ShaderSources) -> Result<CompiledStages> {
        check_extension(&sources.vertex, ShaderStage::Vertex)?;
        check_extension(&sources.fragment, ShaderStage::Fragment)?;

        files::ensure_dir(&self.artifact_dir)?;

        let vertex =
            ShaderCompilationRecord::plan(ShaderStage::Vertex, &sources.vertex, &self.artifact_dir)?;
        let fragment = ShaderCompilationRecord::plan(
            ShaderStage::Fragment,
            &sources.fragment,
            &self.artifact_dir,
        )?;

        Ok(CompiledStages {
            vertex: self.materialize(&vertex)?,
            fragment: self.materialize(&fragment)?,
        })
    }

    fn materialize(&mut self, record: &ShaderCompilationRecord) -> Result<CompiledStage> {
        let outcome = match record.state {
            StageState::UpToDate => {
                log::info!("{} is up to date", record.artifact.display());
                StageOutcome::UpToDate
            }
            StageState::NeedsCompile => {
                self.compile(record)?;
                StageOutcome::Compiled
            }
        };
        Ok(CompiledStage {
            code: read_artifact(&record.artifact)?,
            outcome,
        })
    }

    fn compile(&mut self, record: &ShaderCompilationRecord) -> Result<()> {
        let source = files::read_text(&record.source)?;
        let file_name = record
            .source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let code = self.compiler.compile(record.stage, &source, &file_name)?;
        let bytes: Vec<u8> = code.iter().flat_map(|word| word.to_ne_bytes()).collect();
        files::write_binary(&record.artifact, &bytes)?;
        log::info!("Compiled {} to {}", record.source.display(), record.artifact.display());
        Ok(())
    }
}

fn check_extension(path: &Path, stage: ShaderStage) -> Result<()> {
    if path.extension().and_then(|e| e.to_str()) == Some(stage.source_extension()) {
        Ok(())
    } else {
        Err(Error::InvalidShaderExtension {
            path: path.to_owned(),
            expected: stage.source_extension(),
        })
    }
}

fn read_artifact(path: &Path) -> Result<Vec<u32>> {
    if !files::exists(path) {
        return Err(Error::MissingCompiledArtifact(path.to_owned()));
    }
    let bytes = files::read_binary(path)?;
    ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|e| Error::io(path, e))
}

/// Vertex and fragment modules built from cached SPIR-V.
pub struct ShaderModules {
    pub vertex: vk::ShaderModule,
    pub fragment: vk::ShaderModule,
    device: Arc<Device>,
}

impl ShaderModules {
    pub fn new(device: &Arc<Device>, stages: &CompiledStages) -> Result<Self> {
        let vertex = create_shader_module(device, &stages.vertex.code)?;
        let fragment = match create_shader_module(device, &stages.fragment.code) {
            Ok(fragment) => fragment,
            Err(e) => {
                unsafe { device.handle.destroy_shader_module(vertex, None) };
                return Err(e);
            }
        };
        log::info!("Created shader modules");
        Ok(Self {
            vertex,
            fragment,
            device: device.clone(),
        })
    }
}

impl Drop for ShaderModules {
    fn drop(&mut self) {
        unsafe {
            self.device.handle.destroy_shader_module(self.vertex, None);
            self.device.handle.destroy_shader_module(self.fragment, None);
        }
    }
}

fn create_shader_module(device: &Device, code: &[u32]) -> Result<vk::ShaderModule> {
    Ok(unsafe {
        device.handle.create_shader_module(
            &vk::ShaderModuleCreateInfo::builder()
                .code(code)
                .flags(vk::ShaderModuleCreateFlags::empty()),
            None,
        )?
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_do_not_collide() {
        assert_ne!(
            ShaderStage::Vertex.artifact_suffix(),
            ShaderStage::Fragment.artifact_suffix()
        );
    }

    #[test]
    fn extension_must_match_stage() {
        assert!(check_extension(Path::new("shaders/a.vert"), ShaderStage::Vertex).is_ok());
        assert!(check_extension(Path::new("shaders/a.frag"), ShaderStage::Fragment).is_ok());
        assert!(matches!(
            check_extension(Path::new("shaders/a.frag"), ShaderStage::Vertex),
            Err(Error::InvalidShaderExtension { expected: "vert", .. })
        ));
        assert!(check_extension(Path::new("shaders/vert"), ShaderStage::Vertex).is_err());
    }

    #[test]
    fn planning_uses_stem_and_stage_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Base 2D.vert");
        files::write_text(&source, "void main() {}").unwrap();
        let record =
            ShaderCompilationRecord::plan(ShaderStage::Vertex, &source, dir.path()).unwrap();
        assert_eq!(record.artifact, dir.path().join("Base 2D.vert.spv"));
        assert_eq!(record.state, StageState::NeedsCompile);
    }

    #[test]
    fn artifact_must_be_spirv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.vert.spv");
        files::write_binary(&path, &[1, 2, 3]).unwrap();
        assert!(matches!(read_artifact(&path), Err(Error::Io { .. })));
        assert!(matches!(
            read_artifact(&dir.path().join("absent.vert.spv")),
            Err(Error::MissingCompiledArtifact(_))
        ));
    }
}
