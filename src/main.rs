//! huecycle - publish a hue-rotated variant of a static image as a profile
//! picture on every run.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

mod config;
mod driver;
mod error;
mod hue;
mod preview;
mod sequencer;
mod upload;

use config::{Config, Overrides};
use driver::Sink;
use preview::{Cycle, DEFAULT_DELAY_MS};
use sequencer::{FramePolicy, Sequencer};

#[derive(Parser)]
#[command(name = "huecycle")]
#[command(author, version, about = "Cycle a profile picture through hue-shifted frames")]
#[command(long_about = "
Renders one hue-shifted frame of an image per run and uploads it as a
profile picture. Meant to be run from cron or a CI schedule.

Examples:
  huecycle run                          # next frame from current_frame.txt
  huecycle run --run-number 41          # frame from a scheduler counter
  huecycle run --output frame.png       # render only, state untouched
  huecycle preview --output cycle.gif   # whole cycle as an animated GIF
  huecycle status                       # what the next run would publish
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML config file
    #[arg(short, long, env = "HUECYCLE_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Subcommand)]
enum Commands {
    /// Render this run's frame and publish it
    Run(RunArgs),

    /// Write the full cycle as an animated GIF
    Preview(PreviewArgs),

    /// Show the frame the next run would publish
    Status(StatusArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Scheduler run counter; frames are taken modulo the cycle length and
    /// no state file is used
    #[arg(long, env = "RUN_NUMBER")]
    run_number: Option<u64>,

    /// Write the PNG here instead of uploading it; the state file is left
    /// alone
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct PreviewArgs {
    /// Output GIF
    #[arg(short, long)]
    output: PathBuf,

    /// Delay between frames in milliseconds
    #[arg(short, long, default_value_t = DEFAULT_DELAY_MS)]
    delay: u32,
}

#[derive(Args)]
struct StatusArgs {
    /// Scheduler run counter
    #[arg(long, env = "RUN_NUMBER")]
    run_number: Option<u64>,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("reqwest", log::LevelFilter::Warn)
        .format(|buf, record| {
            let style = buf.default_level_style(record.level());
            let ts = buf.timestamp_seconds();

            writeln!(
                buf,
                "[{} {style}{}{style:#} {} {}] {}",
                ts,
                record.level(),
                record
                    .file()
                    .unwrap_or("None")
                    .split('/')
                    .next_back()
                    .unwrap_or("None"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .init();
}

fn build_sequencer(config: &Config, run_number: Option<u64>) -> Result<Sequencer> {
    let policy = match run_number {
        Some(run_number) => FramePolicy::External { run_number },
        None => FramePolicy::Persisted {
            state_file: config.state_file.clone(),
        },
    };

    Ok(Sequencer::new(config.frames, policy)?)
}

fn run(config: &Config, args: RunArgs) -> Result<()> {
    let sequencer = build_sequencer(config, args.run_number)?;

    if let Some(output) = args.output {
        let frame = driver::publish(config, &sequencer, Sink::File(&output))
            .with_context(|| format!("Failed to render {}", config.image.display()))?;
        println!(
            "Wrote frame {} (hue {:.2}) to {}",
            frame.index,
            frame.shift(),
            output.display()
        );
        return Ok(());
    }

    let uploader = upload::from_config(config)?;
    let frame = driver::publish(config, &sequencer, Sink::Upload(&*uploader))
        .context("Failed to publish frame")?;
    println!(
        "Updated profile photo to hue {:.2} (frame {})",
        frame.shift(),
        frame.index
    );
    Ok(())
}

fn preview(config: &Config, args: PreviewArgs) -> Result<()> {
    let image = driver::load_image(&config.image)
        .with_context(|| format!("Failed to load: {}", config.image.display()))?;

    let cycle = Cycle::render(&image, config.frames, config.quantize).with_delay(args.delay);

    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create: {}", args.output.display()))?;
    let mut writer = BufWriter::new(file);
    cycle.encode(&mut writer)?;
    writer.flush()?;

    print!("{cycle}");
    Ok(())
}

fn status(config: &Config, args: StatusArgs) -> Result<()> {
    let sequencer = build_sequencer(config, args.run_number)?;
    let frame = sequencer.peek();

    match sequencer.policy() {
        FramePolicy::External { run_number } => {
            println!("Next: {frame}, from run number {run_number}")
        }
        FramePolicy::Persisted { state_file } => {
            println!("Next: {frame}, from {}", state_file.display())
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    init_logger();

    let cli = Cli::parse();
    let config =
        Config::load(cli.config.as_deref(), cli.overrides).context("Failed to load config")?;

    match cli.command {
        Commands::Run(args) => run(&config, args),
        Commands::Preview(args) => preview(&config, args),
        Commands::Status(args) => status(&config, args),
    }
}
