//! CLI: declaration files → deep-copy methods (Go source)
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser};

use deepcopy_gen::{GenerationRequest, SkipSet, DEFAULT_METHOD};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate DeepCopy methods for Go types described by JSON declaration files
#[derive(Parser, Debug)]
#[command(name = "deep-copy")]
pub struct CommandLineInterface {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    request_settings: RequestSettings,

    /// output .go file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// overwrite an existing output file even if it is not generated code
    #[arg(long)]
    force: bool,

    /// raise log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more declaration files. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct RequestSettings {
    /// type to generate a method for; repeatable, output keeps this order
    #[arg(long = "type", short = 't', value_name = "NAME", required = true)]
    types: Vec<String>,

    /// comma-separated skip paths for the type in the same position (e.g. "Map[k].Slice,ch")
    #[arg(long, value_name = "PATHS")]
    skip: Vec<String>,

    /// generate `func (o *T)` methods returning `*T`
    #[arg(long)]
    pointer_receiver: bool,

    /// name of the generated method
    #[arg(long, default_value = DEFAULT_METHOD)]
    method: String,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl RequestSettings {
    fn to_request(&self) -> anyhow::Result<GenerationRequest> {
        let skip_sets = self
            .skip
            .iter()
            .map(|list| SkipSet::parse_list(list))
            .collect::<Result<Vec<_>, _>>()
            .context("invalid --skip")?;
        Ok(GenerationRequest::new(&self.types)
            .with_skips(skip_sets)
            .pointer_receiver(self.pointer_receiver)
            .method(&self.method))
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn verbosity(&self) -> u8 {
        self.verbose
    }

    pub fn run(&self) -> anyhow::Result<()> {
        let request = self.request_settings.to_request()?;

        // debug path
        if self.no_op {
            eprintln!("{self:#?}");
            eprintln!("{request:#?}");
            return Ok(());
        }

        // 1) load declarations
        let source_paths = resolve_file_path_patterns(&self.input_settings.input)
            .context("failed to resolve input file paths")?;
        let universe = deepcopy_gen::load::load_universe(&source_paths)?;

        // 2) generate
        let go_src = deepcopy_gen::generate(&universe, &request)?;

        // 3) write
        match self.out.as_ref() {
            Some(out) => write_output(out, &go_src, self.force),
            None => {
                print!("{go_src}");
                Ok(())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Only generated files are replaced, and only when the content changed.
fn write_output(out: &Path, go_src: &str, force: bool) -> anyhow::Result<()> {
    match std::fs::read_to_string(out) {
        Ok(existing) if existing == go_src => {
            tracing::info!(path = %out.display(), "output unchanged");
            return Ok(());
        }
        Ok(existing) if !force && !deepcopy_gen::is_generated(&existing) => {
            bail!("refusing to overwrite {}: not a generated file (use --force)", out.display());
        }
        Ok(_) => {}
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => {
            return Err(error).with_context(|| format!("failed to read {}", out.display()));
        }
    }
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(out, go_src).with_context(|| format!("failed to write {}", out.display()))?;
    tracing::info!(path = %out.display(), "output written");
    Ok(())
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched = glob::glob(pattern)
                .with_context(|| format!("invalid glob pattern: {pattern}"))?
                .collect::<Result<Vec<_>, _>>()?;
            if matched.is_empty() {
                bail!("glob pattern matched no files: {pattern}");
            }
            out.append(&mut matched);
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

// ------------------------------- Tests ------------------------------------ //
