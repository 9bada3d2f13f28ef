use msiweb::MARKERS;
use msiweb::about;
use msiweb::session::{RunRequest, RunSession};
use msiweb::workspace::UploadedFile;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::{env, fs};

const DEFAULT_STATE_PATH: &str = ".msiweb_state.json";

#[derive(Serialize)]
struct MarkerSummary {
    id: String,
    seq1: String,
    seq2: String,
    motif: String,
}

fn usage() {
    eprintln!(
        "Usage:\n  \
  msiweb_cli --version\n  \
  msiweb_cli [--state PATH] markers\n  \
  msiweb_cli [--state PATH] run MARKER FASTQ... [run options]\n  \
  msiweb_cli [--state PATH] pileup FASTQ_NAME\n  \
  msiweb_cli [--state PATH] artifacts\n  \
  msiweb_cli [--state PATH] refresh\n  \
  msiweb_cli [--state PATH] result\n  \
  msiweb_cli [--state PATH] reset\n\n  \
Run options:\n  \
  --min-similarity X        anchor-extension similarity threshold (default 0.85)\n  \
  --anchor-units N          repeat units in the anchor (default 3)\n  \
  --run-tests               pass --run-tests to msianalyzer\n  \
  --skip-variant-summary    pass --skip-variant-summary to msianalyzer\n  \
  --threads N               analyzer threads, flag only passed when N > 1\n  \
  --group-map TEXT          stub = name lines, or @file.txt\n  \
  --analyzer-bin PATH       analyzer executable override for this session\n  \
  --reference-dir DIR       reference FASTA directory override"
    );
}

fn load_text_arg(value: &str) -> Result<String, String> {
    if let Some(path) = value.strip_prefix('@') {
        fs::read_to_string(path).map_err(|e| format!("Could not read file '{path}': {e}"))
    } else {
        Ok(value.to_string())
    }
}

fn load_session(path: &str) -> Result<RunSession, String> {
    if Path::new(path).exists() {
        RunSession::load_from_path(Path::new(path)).map_err(|e| e.to_string())
    } else {
        Ok(RunSession::new())
    }
}

fn save_session(session: &RunSession, path: &str) -> Result<(), String> {
    session
        .save_to_path(Path::new(path))
        .map_err(|e| e.to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Could not serialize JSON output: {e}"))?;
    println!("{text}");
    Ok(())
}

fn parse_global_state_arg(args: &[String]) -> (String, usize) {
    if args.len() >= 3 && args[1] == "--state" {
        return (args[2].clone(), 3);
    }
    (DEFAULT_STATE_PATH.to_string(), 1)
}

fn parse_run_request(args: &[String], session: &mut RunSession) -> Result<RunRequest, String> {
    let mut iter = args.iter();
    let marker = iter
        .next()
        .ok_or_else(|| "run requires: MARKER FASTQ...".to_string())?
        .clone();

    let mut files = Vec::new();
    let mut request = RunRequest::new(marker, vec![]);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--min-similarity" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "Missing value for --min-similarity".to_string())?;
                request.min_similarity = value
                    .parse()
                    .map_err(|_| format!("Invalid --min-similarity '{value}'"))?;
            }
            "--anchor-units" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "Missing value for --anchor-units".to_string())?;
                request.anchor_units = value
                    .parse()
                    .map_err(|_| format!("Invalid --anchor-units '{value}'"))?;
            }
            "--threads" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "Missing value for --threads".to_string())?;
                request.threads = value
                    .parse()
                    .map_err(|_| format!("Invalid --threads '{value}'"))?;
            }
            "--run-tests" => request.run_tests = true,
            "--skip-variant-summary" => request.skip_variant_summary = true,
            "--group-map" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "Missing value for --group-map".to_string())?;
                request.group_map_text = load_text_arg(value)?;
            }
            "--analyzer-bin" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "Missing value for --analyzer-bin".to_string())?;
                session.set_analyzer_bin(Some(value.clone()));
            }
            "--reference-dir" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "Missing value for --reference-dir".to_string())?;
                session.set_reference_dir(Some(PathBuf::from(value)));
            }
            path => {
                let bytes = fs::read(path)
                    .map_err(|e| format!("Could not read FASTQ file '{path}': {e}"))?;
                let name = Path::new(path)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.to_string());
                files.push(UploadedFile::new(name, bytes));
            }
        }
    }

    request.files = files;
    Ok(request)
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = env::args().collect();
    if args.len() <= 1 {
        usage();
        return Err("Missing command".to_string());
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{}", about::version_cli_text());
        return Ok(());
    }

    let (state_path, cmd_idx) = parse_global_state_arg(&args);
    if args.len() <= cmd_idx {
        usage();
        return Err("Missing command".to_string());
    }

    let command = &args[cmd_idx];

    match command.as_str() {
        "markers" => {
            let summaries: Vec<MarkerSummary> = MARKERS
                .names_sorted()
                .into_iter()
                .filter_map(|id| {
                    MARKERS.get(&id).map(|def| MarkerSummary {
                        id: id.clone(),
                        seq1: def.seq1.clone(),
                        seq2: def.seq2.clone(),
                        motif: def.motif.clone(),
                    })
                })
                .collect();
            print_json(&summaries)
        }
        "run" => {
            let mut session = load_session(&state_path)?;
            let request = parse_run_request(&args[cmd_idx + 1..], &mut session)?;

            let result = session.run_analysis(&request).map_err(|e| {
                // Keep the prepared workspace reachable for inspection even
                // when the invocation itself failed.
                let _ = save_session(&session, &state_path);
                e.to_string()
            })?;
            if let Some(root) = session.workspace_root() {
                eprintln!("Working directory: {}", root.display());
            }
            save_session(&session, &state_path)?;
            print_json(&result)
        }
        "pileup" => {
            if args.len() <= cmd_idx + 1 {
                usage();
                return Err("pileup requires: FASTQ_NAME".to_string());
            }
            let fastq_name = &args[cmd_idx + 1];
            let mut session = load_session(&state_path)?;
            let report = session.run_pileup(fastq_name).map_err(|e| e.to_string())?;
            save_session(&session, &state_path)?;
            print_json(&report)
        }
        "artifacts" => {
            let session = load_session(&state_path)?;
            match session.result() {
                Some(result) => print_json(&result.files),
                None => Err("No stored run result. Run the main analysis first.".to_string()),
            }
        }
        "refresh" => {
            let mut session = load_session(&state_path)?;
            session.refresh_artifacts();
            save_session(&session, &state_path)?;
            match session.result() {
                Some(result) => print_json(&result.files),
                None => Err("No stored run result. Run the main analysis first.".to_string()),
            }
        }
        "result" => {
            let session = load_session(&state_path)?;
            match session.result() {
                Some(result) => print_json(result),
                None => Err("No stored run result. Run the main analysis first.".to_string()),
            }
        }
        "reset" => {
            let mut session = load_session(&state_path)?;
            session.reset();
            save_session(&session, &state_path)?;
            println!("Results cleared. Upload new files and run again.");
            Ok(())
        }
        _ => {
            usage();
            Err(format!("Unknown command '{command}'"))
        }
    }
}
