use anyhow::Context;
use clap::Parser;
use imgcrunch::{BatchProcessor, Cli, OutputMode, WorkOutcome};
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logger; RUST_LOG still wins when set
    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .init();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<bool> {
    let processor = BatchProcessor::new(cli.to_config()).context("invalid configuration")?;
    let config = processor.config();

    println!("Input folder:  {}", cli.input.display());
    match config.mode {
        OutputMode::Keep => println!(
            "Output folder: {}",
            config.output_dir_for(&cli.input).display()
        ),
        OutputMode::Replace => println!("Mode:          replace in place"),
    }
    println!("Format:        {} (.{})", config.format, config.format.extension());
    println!("Quality:       {}", config.quality);
    if config.max_size == 0 {
        println!("Resize:        convert only");
    } else {
        println!("Max size:      {}px longest side", config.max_size);
    }
    if let Some(base) = &config.rename {
        println!("Rename:        {}_001, {}_002, ...", base, base);
    }
    println!("Workers:       {}", processor.worker_count());

    let pb = create_progress_bar();
    let report = processor
        .process_directory_with_progress(&cli.input, |progress, result| {
            pb.set_length(progress.total as u64);
            pb.set_position(progress.completed as u64);
            if let WorkOutcome::Failed(failure) = &result.outcome {
                pb.println(format!(
                    "  x {}: {}",
                    result.source.display(),
                    failure.message
                ));
            }
        })
        .with_context(|| format!("cannot process {}", cli.input.display()))?;
    pb.finish_and_clear();

    if report.total == 0 {
        println!("No images found in {}", cli.input.display());
        return Ok(true);
    }

    print!("{}", report.summary());
    if report.failed > 0 {
        println!(
            "{} file(s) had errors and were left untouched",
            report.failed
        );
    }

    Ok(report.is_success())
}

fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}
