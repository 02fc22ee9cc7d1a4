use crate::error::{CliError, Result};
use csave_core::{
    finish_channel, CsaveError, GeneratorConfig, Interleaved, Record, RenderDriver,
    StreamingGenerator,
};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

/// WAV sample encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleDepth {
    /// 16-bit integer PCM
    Int16,
    /// 32-bit IEEE float
    Float32,
}

impl SampleDepth {
    pub fn from_bits(bits: u16) -> Result<Self> {
        match bits {
            16 => Ok(SampleDepth::Int16),
            32 => Ok(SampleDepth::Float32),
            other => Err(CliError::UnsupportedDepth(other)),
        }
    }

    fn spec(self, sample_rate: u32) -> WavSpec {
        let (bits_per_sample, sample_format) = match self {
            SampleDepth::Int16 => (16, SampleFormat::Int),
            SampleDepth::Float32 => (32, SampleFormat::Float),
        };
        WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample,
            sample_format,
        }
    }
}

/// Mono WAV writer accepting f32 samples
pub struct WavSink<W: Write + Seek> {
    writer: WavWriter<W>,
    depth: SampleDepth,
    written: u64,
}

impl WavSink<BufWriter<File>> {
    pub fn create(path: &Path, sample_rate: u32, depth: SampleDepth) -> Result<Self> {
        let writer = WavWriter::create(path, depth.spec(sample_rate))?;
        Ok(Self {
            writer,
            depth,
            written: 0,
        })
    }
}

impl<W: Write + Seek> WavSink<W> {
    pub fn new(inner: W, sample_rate: u32, depth: SampleDepth) -> Result<Self> {
        let writer = WavWriter::new(inner, depth.spec(sample_rate))?;
        Ok(Self {
            writer,
            depth,
            written: 0,
        })
    }

    pub fn write(&mut self, sample: f32) -> Result<()> {
        match self.depth {
            SampleDepth::Int16 => {
                // Clamp to [-1.0, 1.0] range to avoid overflow, then scale to i16
                let clamped = sample.clamp(-1.0, 1.0);
                self.writer.write_sample((clamped * 32767.0) as i16)?;
            }
            SampleDepth::Float32 => self.writer.write_sample(sample)?,
        }
        self.written += 1;
        Ok(())
    }

    pub fn write_all(&mut self, samples: &[f32]) -> Result<()> {
        for &sample in samples {
            self.write(sample)?;
        }
        Ok(())
    }

    /// Fix up the header and return the number of samples written
    pub fn finalize(self) -> Result<u64> {
        self.writer.finalize()?;
        Ok(self.written)
    }
}

/// Render records offline, pulling fixed quanta exactly as a live host would
pub fn render_to_sink<W: Write + Seek>(
    sink: &mut WavSink<W>,
    config: GeneratorConfig,
    records: Vec<Record>,
    quantum: usize,
) -> Result<u64> {
    if quantum == 0 {
        let reason = "quantum must be at least 1 frame".to_string();
        return Err(CsaveError::InvalidConfig(reason).into());
    }

    let generator = StreamingGenerator::new(config, records)?;
    let (signal, mut listener) = finish_channel();
    let mut driver = RenderDriver::new(generator, signal);

    let mut block = vec![0.0f32; quantum];
    let mut blocks = 0u64;
    while driver.process(&mut Interleaved::new(&mut block, 1)) {
        sink.write_all(&block[..driver.last_frames()])?;
        blocks += 1;
    }

    let emitted = driver.generator().emitted();
    log::debug!(
        "rendered {} samples in {} block(s), finished: {}",
        emitted,
        blocks,
        listener.is_finished()
    );
    Ok(emitted)
}

/// Render records into a WAV file; returns the number of samples written
pub fn render_to_file(
    path: &Path,
    config: GeneratorConfig,
    records: Vec<Record>,
    quantum: usize,
    depth: SampleDepth,
) -> Result<u64> {
    let mut sink = WavSink::create(path, config.sample_rate, depth)?;
    render_to_sink(&mut sink, config, records, quantum)?;
    sink.finalize()
}
