use clap::{Parser, Subcommand};
use csave_core::{
    count_samples, expand, GeneratorConfig, DEFAULT_QUANTUM, DEFAULT_SAMPLE_RATE,
    DEFAULT_SYMBOL_RATE,
};
use std::path::PathBuf;

mod error;
mod input;
mod playback;
mod wav;

use input::InputArgs;
use playback::PlaybackSession;
use wav::SampleDepth;

#[derive(Parser)]
#[command(name = "csave")]
#[command(about = "Play or render data as two-tone cassette save audio")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render data to a WAV audio file
    Encode {
        #[command(flatten)]
        input: InputArgs,

        /// Output WAV file
        #[arg(short, long, value_name = "OUTPUT.WAV")]
        output: PathBuf,

        /// Output sample rate in Hz
        #[arg(short, long, default_value_t = DEFAULT_SAMPLE_RATE)]
        sample_rate: u32,

        /// Symbols per second
        #[arg(long, default_value_t = DEFAULT_SYMBOL_RATE)]
        symbol_rate: f64,

        /// Frames rendered per block
        #[arg(short, long, default_value_t = DEFAULT_QUANTUM)]
        quantum: usize,

        /// WAV sample depth (16 = integer PCM, 32 = float)
        #[arg(short, long, default_value_t = 16)]
        bits: u16,
    },

    /// Play data through the default audio output device
    Play {
        #[command(flatten)]
        input: InputArgs,

        /// Symbols per second
        #[arg(long, default_value_t = DEFAULT_SYMBOL_RATE)]
        symbol_rate: f64,

        /// Also record the played audio to this WAV file
        #[arg(long, value_name = "OUTPUT.WAV")]
        record_to: Option<PathBuf>,

        /// WAV sample depth for the recording (16 or 32)
        #[arg(short, long, default_value_t = 16)]
        bits: u16,
    },

    /// Show the symbol and sample accounting for data without rendering it
    Info {
        #[command(flatten)]
        input: InputArgs,

        /// Output sample rate in Hz
        #[arg(short, long, default_value_t = DEFAULT_SAMPLE_RATE)]
        sample_rate: u32,

        /// Symbols per second
        #[arg(long, default_value_t = DEFAULT_SYMBOL_RATE)]
        symbol_rate: f64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Encode {
            input,
            output,
            sample_rate,
            symbol_rate,
            quantum,
            bits,
        } => encode_command(&input, &output, sample_rate, symbol_rate, quantum, bits)?,
        Commands::Play {
            input,
            symbol_rate,
            record_to,
            bits,
        } => play_command(&input, symbol_rate, record_to, bits)?,
        Commands::Info {
            input,
            sample_rate,
            symbol_rate,
        } => info_command(&input, sample_rate, symbol_rate)?,
    }

    Ok(())
}

fn encode_command(
    input: &InputArgs,
    output_path: &PathBuf,
    sample_rate: u32,
    symbol_rate: f64,
    quantum: usize,
    bits: u16,
) -> error::Result<()> {
    let depth = SampleDepth::from_bits(bits)?;
    let records = input.load()?;
    let bytes: usize = records.iter().map(|r| r.payload().len()).sum();
    println!("Read {} bytes in {} record(s)", bytes, records.len());

    let config = GeneratorConfig::new(sample_rate).with_symbol_rate(symbol_rate);
    let samples = wav::render_to_file(output_path, config, records, quantum, depth)?;
    println!(
        "Encoded {} audio samples ({:.3} s at {} Hz)",
        samples,
        samples as f64 / sample_rate as f64,
        sample_rate
    );
    println!("Wrote {}", output_path.display());
    Ok(())
}

fn play_command(
    input: &InputArgs,
    symbol_rate: f64,
    record_to: Option<PathBuf>,
    bits: u16,
) -> error::Result<()> {
    let depth = SampleDepth::from_bits(bits)?;
    let records = input.load()?;

    let session = PlaybackSession::open()?;
    let config = GeneratorConfig::new(session.sample_rate()).with_symbol_rate(symbol_rate);
    let config = config.validate()?;
    let total = count_samples(&records, &config)?;
    println!(
        "Playing {:.3} s of audio on {} channel(s)",
        total as f64 / config.sample_rate as f64,
        session.channels()
    );

    let playback = session.start(
        config,
        records,
        record_to.as_deref().map(|path| (path, depth)),
    )?;
    let summary = playback.wait()?;

    if summary.finished {
        println!("Finished");
    }
    if let (Some(samples), Some(path)) = (summary.recorded, &record_to) {
        println!("Recorded {} samples to {}", samples, path.display());
    }
    Ok(())
}

fn info_command(input: &InputArgs, sample_rate: u32, symbol_rate: f64) -> error::Result<()> {
    let records = input.load()?;
    let config = GeneratorConfig::new(sample_rate)
        .with_symbol_rate(symbol_rate)
        .validate()?;

    for (i, record) in records.iter().enumerate() {
        println!(
            "Record {}: preamble {:.3} s, {} bytes",
            i,
            record.preamble_secs(),
            record.payload().len()
        );
    }

    let symbols = expand(&records).len();
    let samples = count_samples(&records, &config)?;
    println!("Symbols: {}", symbols);
    println!(
        "Samples: {} ({:.3} s at {} Hz, {} samples/symbol)",
        samples,
        samples as f64 / config.sample_rate as f64,
        config.sample_rate,
        config.samples_per_bit()
    );
    Ok(())
}
