//! Command engine: runs an external renderer (quarto, pandoc, typst, ...)
//! once per request.
//!
//! # Argv expansion
//!
//! | Config key   | Expanded                        | Extra variables    |
//! |--------------|---------------------------------|--------------------|
//! | `args`       | once, in order                  | none               |
//! | `param_args` | once per parameter, appended    | `name`, `value`    |
//!
//! With the default quarto config, binding `unit=A` rendered to pdf becomes
//! `quarto render unit.qmd --to pdf --output .a.partial.pdf --output-dir /out/a -P unit:A`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tera::Tera;

use quire_core::{ConfigError, EngineConfig};

use crate::context::ArgContext;
use crate::engine::{Artifact, RenderEngine, RenderRequest};
use crate::error::{error_chain, io_err, EngineError};

/// Kills the engine's whole process group when dropped, so helpers it started
/// (pandoc, a TeX engine, ...) stop with it instead of writing after a timeout.
struct ProcessGroup {
    leader: Option<u32>,
}

impl Drop for ProcessGroup {
    #[cfg(unix)]
    fn drop(&mut self) {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.leader.and_then(|id| i32::try_from(id).ok()) else {
            return;
        };
        // ESRCH once every member has exited.
        let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
    }

    #[cfg(not(unix))]
    fn drop(&mut self) {
        let _ = self.leader;
    }
}

/// Lines of engine output kept in a failure message.
const STDERR_TAIL_LINES: usize = 20;

fn arg_name(i: usize) -> String {
    format!("args/{i}")
}

fn param_arg_name(i: usize) -> String {
    format!("param_args/{i}")
}

fn build_tera(config: &EngineConfig) -> Result<Tera, ConfigError> {
    let mut templates: Vec<(String, String)> = Vec::new();
    for (i, arg) in config.args.iter().enumerate() {
        templates.push((arg_name(i), arg.clone()));
    }
    for (i, arg) in config.param_args.iter().enumerate() {
        templates.push((param_arg_name(i), arg.clone()));
    }

    let mut tera = Tera::default();
    tera.add_raw_templates(templates)
        .map_err(|e| ConfigError::EngineTemplate {
            name: config.program.clone(),
            message: error_chain(&e),
        })?;
    Ok(tera)
}

/// Keep the last `STDERR_TAIL_LINES` lines of process output.
fn output_tail(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Production engine: spawns `program` with Tera-expanded arguments.
pub struct CommandEngine {
    program: String,
    arg_count: usize,
    param_arg_count: usize,
    env: BTreeMap<String, String>,
    working_dir: Option<PathBuf>,
    tera: Tera,
}

impl CommandEngine {
    /// Compile every argv template up front so syntax errors surface before
    /// any job is dispatched.
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            program: config.program.clone(),
            arg_count: config.args.len(),
            param_arg_count: config.param_args.len(),
            env: config.env.clone(),
            working_dir: config.working_dir.clone(),
            tera: build_tera(config)?,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Expanded argument vector for `request`, program excluded.
    pub fn argv(&self, request: &RenderRequest) -> Result<Vec<String>, EngineError> {
        let ctx = ArgContext::from_request(request);
        let base = ctx.to_tera_context()?;

        let mut argv = Vec::with_capacity(self.arg_count + request.params.len() * self.param_arg_count);
        for i in 0..self.arg_count {
            argv.push(self.tera.render(&arg_name(i), &base)?);
        }
        for (name, value) in &request.params {
            let param_ctx = ctx.with_param(name, value)?;
            for i in 0..self.param_arg_count {
                argv.push(self.tera.render(&param_arg_name(i), &param_ctx)?);
            }
        }
        Ok(argv)
    }
}

#[async_trait]
impl RenderEngine for CommandEngine {
    async fn render(&self, request: &RenderRequest) -> Result<Artifact, EngineError> {
        let argv = self.argv(request)?;

        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&argv)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!(program = %self.program, args = ?argv, "spawning engine");
        let child = cmd.spawn().map_err(|e| EngineError::Spawn {
            program: self.program.clone(),
            source: e,
        })?;
        // Dropping the future on timeout drops this guard with it.
        let _group = ProcessGroup { leader: child.id() };
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| io_err(&self.program, e))?;

        if !output.status.success() {
            let mut detail = output_tail(&output.stderr);
            if detail.is_empty() {
                detail = output_tail(&output.stdout);
            }
            return Err(EngineError::Exit {
                status: output.status.to_string(),
                stderr: detail,
            });
        }

        let exists = tokio::fs::try_exists(&request.destination)
            .await
            .map_err(|e| io_err(&request.destination, e))?;
        if !exists {
            return Err(EngineError::MissingArtifact {
                path: request.destination.clone(),
            });
        }

        Ok(Artifact {
            path: request.destination.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use quire_core::{OutputFormat, TemplateRef};

    use super::*;

    fn request(dest: &Path) -> RenderRequest {
        let mut params = BTreeMap::new();
        params.insert("period".to_string(), "2023".to_string());
        params.insert("unit".to_string(), "A".to_string());
        RenderRequest {
            template: TemplateRef::from("unit.qmd"),
            params,
            format: OutputFormat::Pdf,
            destination: dest.to_path_buf(),
        }
    }

    fn sh(script: &str) -> EngineConfig {
        EngineConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            param_args: vec![],
            env: BTreeMap::new(),
            working_dir: None,
        }
    }

    #[test]
    fn default_quarto_argv() {
        let engine = CommandEngine::from_config(&EngineConfig::default()).unwrap();
        let argv = engine
            .argv(&request(Path::new("/out/a/2023/.a_2023.partial.pdf")))
            .unwrap();
        assert_eq!(
            argv,
            [
                "render",
                "unit.qmd",
                "--to",
                "pdf",
                "--output",
                ".a_2023.partial.pdf",
                "--output-dir",
                "/out/a/2023",
                "-P",
                "period:2023",
                "-P",
                "unit:A",
            ]
        );
    }

    #[test]
    fn params_are_reachable_by_name_in_args() {
        let engine = CommandEngine::from_config(&sh("echo {{ params.unit }}-{{ params.period }}")).unwrap();
        let argv = engine.argv(&request(Path::new("/tmp/x.pdf"))).unwrap();
        assert_eq!(argv[1], "echo A-2023");
    }

    #[test]
    fn bad_template_syntax_is_a_config_error() {
        let err = CommandEngine::from_config(&sh("{{ unclosed")).err().expect("must fail");
        assert!(matches!(err, ConfigError::EngineTemplate { .. }), "got: {err}");
    }

    #[test]
    fn undefined_variable_fails_at_expansion() {
        let engine = CommandEngine::from_config(&sh("{{ nope }}")).unwrap();
        let err = engine.argv(&request(Path::new("/tmp/x.pdf"))).unwrap_err();
        assert!(matches!(err, EngineError::Tera(_)));
    }

    #[test]
    fn output_tail_keeps_last_lines() {
        let text: String = (0..30).map(|i| format!("line {i}\n")).collect();
        let tail = output_tail(text.as_bytes());
        assert!(tail.starts_with("line 10"));
        assert!(tail.ends_with("line 29"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_command_returns_artifact() {
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("a.pdf");
        let engine = CommandEngine::from_config(&sh("printf '%s' {{ params.unit }} > '{{ output }}'")).unwrap();
        let artifact = engine.render(&request(&dest)).await.expect("render");
        assert_eq!(artifact.path, dest);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "A");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = CommandEngine::from_config(&sh("echo 'bad data for {{ params.unit }}' >&2; exit 3")).unwrap();
        let err = engine.render(&request(&dir.path().join("a.pdf"))).await.unwrap_err();
        match err {
            EngineError::Exit { stderr, .. } => assert_eq!(stderr, "bad data for A"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn clean_exit_without_file_is_missing_artifact() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = CommandEngine::from_config(&sh("true")).unwrap();
        let err = engine.render(&request(&dir.path().join("a.pdf"))).await.unwrap_err();
        assert!(matches!(err, EngineError::MissingArtifact { .. }));
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let mut config = sh("");
        config.program = "quire-definitely-not-installed".to_string();
        let engine = CommandEngine::from_config(&config).unwrap();
        let err = engine.render(&request(Path::new("/tmp/x.pdf"))).await.unwrap_err();
        assert!(matches!(err, EngineError::Spawn { .. }));
    }
}
