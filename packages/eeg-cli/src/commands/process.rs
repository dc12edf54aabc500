use super::{fail, open_session, Context};
use crate::cli::ProcessArgs;
use crate::exit_codes;
use crate::output;
use eeg_rs::pipeline::{self, PipelineConfig};

fn load_pipeline(path: &str) -> Result<PipelineConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read pipeline file '{}': {}", path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("Invalid pipeline file '{}': {}", path, e))
}

/// Pipeline from the optional file, with command-line flags taking precedence
fn build_pipeline(args: &ProcessArgs, default_notch: f64) -> Result<PipelineConfig, String> {
    let mut config = match &args.pipeline {
        Some(path) => load_pipeline(path)?,
        None => PipelineConfig::default(),
    };

    if !args.channels.is_empty() {
        config.channels = args.channels.clone();
    }
    config.remove_dc |= args.remove_dc;
    if let Some(notch) = args.notch {
        config.notch = Some(notch.unwrap_or(default_notch));
    }
    if args.bandpass.is_some() {
        config.bandpass = args.bandpass;
    }
    if args.gain.is_some() {
        config.gain = args.gain;
    }
    if args.offset.is_some() {
        config.offset = args.offset;
    }
    config.normalize |= args.normalize;
    if args.montage.is_some() {
        config.montage = args.montage;
    }
    Ok(config)
}

pub fn execute(args: ProcessArgs, ctx: &Context) -> i32 {
    let config = match build_pipeline(&args, ctx.config.notch_frequency) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };
    if config.is_empty() {
        log::warn!("No processing steps requested; output will match input");
    }

    let mut session = match open_session(&args.file, ctx) {
        Ok(session) => session,
        Err(code) => return code,
    };

    let report = match pipeline::run(&mut session, &config) {
        Ok(report) => report,
        Err(e) => return fail(&e),
    };

    if let Err(e) = session.save(&args.output) {
        return fail(&e);
    }

    if args.json {
        if !output::emit(&report, None, false) {
            return exit_codes::EXECUTION_ERROR;
        }
    } else {
        for step in &report.steps {
            println!("Applied {}", step);
        }
        if let Some(ref montage) = report.montage {
            if montage.sanitized_values > 0 {
                println!("Replaced {} non-finite values", montage.sanitized_values);
            }
        }
        println!(
            "Wrote {} channels to {}",
            session.channel_count(),
            args.output
        );
    }

    exit_codes::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;
    use eeg_rs::MontageKind;

    fn process_args(argv: &[&str]) -> ProcessArgs {
        let mut full = vec!["eegproc", "process", "--file", "in.csv", "-o", "out.csv"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            crate::cli::Command::Process(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_flags_build_pipeline() {
        let args = process_args(&[
            "--notch",
            "--bandpass",
            "1,40",
            "--gain",
            "-2",
            "--montage",
            "bipolar",
        ]);
        let config = build_pipeline(&args, 60.0).unwrap();
        assert_eq!(config.notch, Some(60.0));
        assert_eq!(config.bandpass, Some((1.0, 40.0)));
        assert_eq!(config.gain, Some(-2.0));
        assert_eq!(config.montage, Some(MontageKind::Bipolar));
        assert!(!config.remove_dc);
    }

    #[test]
    fn test_explicit_notch_frequency() {
        let args = process_args(&["--notch", "50"]);
        assert_eq!(build_pipeline(&args, 60.0).unwrap().notch, Some(50.0));
    }

    #[test]
    fn test_flags_override_pipeline_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            br#"{"remove_dc": true, "gain": 3.0, "montage": "laplacian"}"#,
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = process_args(&["--pipeline", &path, "--gain", "0.5"]);
        let config = build_pipeline(&args, 50.0).unwrap();
        assert!(config.remove_dc);
        assert_eq!(config.gain, Some(0.5));
        assert_eq!(config.montage, Some(MontageKind::Laplacian));
    }

    #[test]
    fn test_missing_pipeline_file() {
        let args = process_args(&["--pipeline", "/nonexistent/pipeline.json"]);
        assert!(build_pipeline(&args, 50.0).is_err());
    }
}
