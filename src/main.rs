// Chorus Arranger command-line front end

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use chorus_arranger_lib::commands::{self, CommandResult};
use chorus_arranger_lib::ArrangeSettings;

/// Arrange the chorus of MIDI transcriptions for two-hand piano
#[derive(Parser, Debug)]
#[command(name = "chorus-arranger")]
#[command(version)]
struct Args {
    /// Input MIDI files
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory for generated files (defaults to the user data dir)
    #[arg(short, long, env = "CHORUS_ARRANGER_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// JSON file overriding arrangement settings
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Only extract the melody chorus, without accompaniment
    #[arg(long)]
    melody_only: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn load_settings(path: Option<&PathBuf>) -> CommandResult<ArrangeSettings> {
    match path {
        Some(path) => {
            let data = fs::read_to_string(path)?;
            Ok(serde_json::from_str(&data)?)
        }
        None => Ok(ArrangeSettings::default()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let settings = match load_settings(args.settings.as_ref()) {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Failed to load settings: {}", e.message());
            return ExitCode::FAILURE;
        }
    };

    let output_dir = match args.output_dir {
        Some(dir) => dir,
        None => match commands::default_output_dir() {
            Ok(dir) => dir,
            Err(e) => {
                log::error!("{}", e.message());
                return ExitCode::FAILURE;
            }
        },
    };

    let mut failures = 0usize;

    if args.melody_only {
        for input in &args.inputs {
            let task_id = commands::new_task_id();
            match commands::extract_melody_file(input, &output_dir, &task_id, &settings) {
                Ok(output) => println!("{}", output.melody_midi_path.display()),
                Err(e) => {
                    log::error!("{}: {}", input.display(), e.message());
                    failures += 1;
                }
            }
        }
    } else {
        let results = commands::arrange_midi_files(args.inputs.clone(), output_dir, settings).await;
        for (_, result) in results {
            match result {
                Ok(output) => println!("{}", output.arrangement_midi_path.display()),
                Err(_) => failures += 1,
            }
        }
    }

    if failures > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
