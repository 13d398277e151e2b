//! Runs every `testdata/cases/*.json` fixture through the generator and
//! compares the result with its expected Go file.
//!
//! ```text
//! cargo run -p dev-test-runner -- [--bless] [TESTDATA_DIR]
//! ```
//!
//! `--bless` rewrites the expected files from the current output.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use colored::Colorize;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use deepcopy_gen::{GenerationRequest, SkipSet, HEADER};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Case {
    types: Vec<String>,
    /// comma-separated, positionally paired with `types`
    #[serde(default)]
    skips: Vec<String>,
    #[serde(default)]
    pointer_receiver: bool,
    #[serde(default)]
    method: Option<String>,
    /// relative to the testdata directory
    expected: PathBuf,
}

enum Outcome {
    Pass,
    Blessed,
    Fail { line: usize, want: String, got: String },
}

static ANY_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^// Code generated by .*; DO NOT EDIT\.$").expect("static header pattern")
});

/// Fixtures stay valid across header wording changes.
fn normalize(src: &str) -> String {
    ANY_HEADER.replace(src.trim(), HEADER).into_owned()
}

fn load_case(path: &Path) -> anyhow::Result<Case> {
    let src = std::fs::read_to_string(path)?;
    let de = &mut serde_json::Deserializer::from_str(&src);
    serde_path_to_error::deserialize(de).map_err(|err| {
        let json_path = err.path().to_string();
        anyhow::anyhow!("at JSON path {json_path} → {}", err.into_inner())
    })
}

fn run_case(testdata: &Path, universe: &deepcopy_gen::Universe, case: &Case, bless: bool) -> anyhow::Result<Outcome> {
    let skip_sets = case
        .skips
        .iter()
        .map(|list| SkipSet::parse_list(list))
        .collect::<Result<Vec<_>, _>>()?;
    let mut request = GenerationRequest::new(&case.types)
        .with_skips(skip_sets)
        .pointer_receiver(case.pointer_receiver);
    if let Some(method) = &case.method {
        request = request.method(method);
    }
    let got = deepcopy_gen::generate(universe, &request)?;

    let expected_path = testdata.join(&case.expected);
    if bless {
        std::fs::write(&expected_path, &got)
            .with_context(|| format!("failed to write {}", expected_path.display()))?;
        return Ok(Outcome::Blessed);
    }
    let want = std::fs::read_to_string(&expected_path)
        .with_context(|| format!("failed to read {}", expected_path.display()))?;

    let (want, got) = (normalize(&want), normalize(&got));
    if want == got {
        return Ok(Outcome::Pass);
    }
    let mut want_lines = want.lines();
    let mut got_lines = got.lines();
    let mut line = 1;
    loop {
        match (want_lines.next(), got_lines.next()) {
            (Some(w), Some(g)) if w == g => line += 1,
            (w, g) => {
                return Ok(Outcome::Fail {
                    line,
                    want: w.unwrap_or("<end of file>").to_string(),
                    got: g.unwrap_or("<end of file>").to_string(),
                });
            }
        }
    }
}

fn run() -> anyhow::Result<bool> {
    let mut bless = false;
    let mut testdata = PathBuf::from("testdata");
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--bless" => bless = true,
            other => testdata = PathBuf::from(other),
        }
    }

    let universe = deepcopy_gen::load::load_universe(&[testdata.join("decls.json")])?;
    let mut case_paths = std::fs::read_dir(testdata.join("cases"))
        .with_context(|| format!("failed to list {}", testdata.join("cases").display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    case_paths.retain(|p| p.extension().is_some_and(|ext| ext == "json"));
    case_paths.sort();

    let mut failures = 0;
    for case_path in &case_paths {
        let name = case_path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        let outcome = load_case(case_path)
            .with_context(|| format!("{}", case_path.display()))
            .and_then(|case| run_case(&testdata, &universe, &case, bless));
        match outcome {
            Ok(Outcome::Pass) => eprintln!("✅ {name}"),
            Ok(Outcome::Blessed) => eprintln!("✍️  {name}"),
            Ok(Outcome::Fail { line, want, got }) => {
                failures += 1;
                eprintln!("❌ {name}: first difference at line {line}");
                eprintln!("   {} {want}", "want:".green());
                eprintln!("   {} {got}", " got:".red());
            }
            Err(error) => {
                failures += 1;
                eprintln!("❌ {name}: {}", format!("{error:#}").red());
            }
        }
    }
    eprintln!("—— {} cases, {failures} failed ——", case_paths.len());
    Ok(failures == 0)
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("{} {}", "error:".red().bold(), format!("{error:#}").red());
            ExitCode::FAILURE
        }
    }
}
