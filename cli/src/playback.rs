//! Live playback through the default output device
//!
//! The cpal callback is the real-time context: it owns the [`RenderDriver`]
//! and an optional recorder tap, and talks to the control thread only through
//! the finish channel. The recorder runs on its own thread, fed by a lock-free
//! ring buffer, and is stopped by the control thread once playback finishes.

use crate::error::{CliError, Result};
use crate::wav::{SampleDepth, WavSink};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample, Stream, StreamConfig};
use csave_core::{
    finish_channel, FinishListener, FinishNotify, GeneratorConfig, Interleaved, Record, RenderDriver,
    RenderTarget, StreamingGenerator, Tee,
};
use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapProd, HeapRb,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Seconds of audio the recorder ring buffer can hold
const RECORDER_BUFFER_SECS: usize = 2;

/// Recorder thread poll period when the ring buffer is empty
const RECORDER_POLL: Duration = Duration::from_millis(10);

/// Time left for the device to play out its last buffers after finishing
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Callback scratch size in samples; larger device buffers are rendered in pieces
const SCRATCH_SAMPLES: usize = 4096;

/// How often the control thread rechecks the stream while waiting to finish
const FINISH_POLL: Duration = Duration::from_millis(100);

/// Real-time side of the recorder: pushes into the ring buffer, never blocks
struct RecorderTap {
    producer: HeapProd<f32>,
    overruns: Arc<AtomicU64>,
}

impl RenderTarget for RecorderTap {
    fn frames(&self) -> usize {
        self.producer.vacant_len()
    }

    fn write_frame(&mut self, _frame: usize, sample: f32) {
        if self.producer.try_push(sample).is_err() {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Control side of the recorder
struct Recorder {
    path: PathBuf,
    stop: Arc<AtomicBool>,
    overruns: Arc<AtomicU64>,
    handle: JoinHandle<Result<u64>>,
}

impl Recorder {
    fn start(path: &Path, sample_rate: u32, depth: SampleDepth) -> Result<(Self, RecorderTap)> {
        let mut sink = WavSink::create(path, sample_rate, depth)?;
        let ring = HeapRb::<f32>::new(sample_rate as usize * RECORDER_BUFFER_SECS);
        let (producer, mut consumer) = ring.split();

        let stop = Arc::new(AtomicBool::new(false));
        let overruns = Arc::new(AtomicU64::new(0));

        let stop_flag = stop.clone();
        let handle = thread::Builder::new()
            .name("csave-recorder".to_string())
            .spawn(move || -> Result<u64> {
                let mut chunk = vec![0.0f32; SCRATCH_SAMPLES];
                loop {
                    // Read the flag first: once it is set every sample is already queued
                    let stopping = stop_flag.load(Ordering::Acquire);
                    let popped = consumer.pop_slice(&mut chunk);
                    sink.write_all(&chunk[..popped])?;
                    if popped == 0 {
                        if stopping {
                            break;
                        }
                        thread::sleep(RECORDER_POLL);
                    }
                }
                sink.finalize()
            })?;

        let recorder = Self {
            path: path.to_path_buf(),
            stop,
            overruns: overruns.clone(),
            handle,
        };
        Ok((recorder, RecorderTap { producer, overruns }))
    }

    /// Flush what is queued, finalize the file and return samples written
    fn stop(self) -> Result<u64> {
        self.stop.store(true, Ordering::Release);
        let written = self.handle.join().map_err(|_| CliError::RecorderPanicked)??;

        let overruns = self.overruns.load(Ordering::Relaxed);
        if overruns > 0 {
            log::warn!("Recorder dropped {} sample(s) (ring buffer full)", overruns);
        }
        log::info!("Recorded {} samples to {}", written, self.path.display());
        Ok(written)
    }
}

/// Explicitly owned audio output: one device, any number of playbacks
pub struct PlaybackSession {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
}

impl PlaybackSession {
    /// Open the default output device
    pub fn open() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| CliError::Audio("No audio output device available".to_string()))?;

        let config = device
            .default_output_config()
            .map_err(|e| CliError::Audio(format!("Failed to get default output config: {}", e)))?;

        log::info!(
            "Output device: {} ({} Hz, {} channel(s), {:?})",
            device.name().unwrap_or_else(|_| "unknown".to_string()),
            config.sample_rate().0,
            config.channels(),
            config.sample_format()
        );

        Ok(Self { device, config })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate().0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels()
    }

    /// Start playing `records`; the generator runs at the device sample rate
    ///
    /// If `recording` is given, the same stream is also written to a WAV file.
    /// A recorder that cannot be created is skipped with a warning.
    pub fn start(
        &self,
        config: GeneratorConfig,
        records: Vec<Record>,
        recording: Option<(&Path, SampleDepth)>,
    ) -> Result<Playback> {
        let config = GeneratorConfig {
            sample_rate: self.sample_rate(),
            ..config
        };
        let generator = StreamingGenerator::new(config, records)?;
        let (signal, listener) = finish_channel();
        let driver = RenderDriver::new(generator, signal);

        // The recorder must be running before the first sample is rendered
        let (recorder, tap) = match recording {
            Some((path, depth)) => match Recorder::start(path, self.sample_rate(), depth) {
                Ok((recorder, tap)) => (Some(recorder), Some(tap)),
                Err(e) => {
                    log::warn!("Recording disabled: {}", e);
                    (None, None)
                }
            },
            None => (None, None),
        };

        let stream_failed = Arc::new(AtomicBool::new(false));
        let failed = stream_failed.clone();
        let stream_config: StreamConfig = self.config.clone().into();
        let stream = match self.config.sample_format() {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&self.device, &stream_config, driver, tap, failed)?
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&self.device, &stream_config, driver, tap, failed)?
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&self.device, &stream_config, driver, tap, failed)?
            }
            format => {
                return Err(CliError::Audio(format!(
                    "Unsupported sample format: {:?}",
                    format
                )))
            }
        };

        stream
            .play()
            .map_err(|e| CliError::Audio(format!("Failed to play audio stream: {}", e)))?;
        log::debug!("Audio stream started");

        Ok(Playback {
            stream,
            listener,
            recorder,
            stream_failed,
        })
    }
}

fn build_stream<T: SizedSample + FromSample<f32>>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut driver: RenderDriver,
    mut tap: Option<RecorderTap>,
    stream_failed: Arc<AtomicBool>,
) -> Result<Stream> {
    let channels = config.channels as usize;
    let mut scratch = vec![0.0f32; SCRATCH_SAMPLES.max(channels)];

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                fill_device_buffer(&mut driver, tap.as_mut(), &mut scratch, data, channels);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
                if matches!(err, cpal::StreamError::DeviceNotAvailable) {
                    stream_failed.store(true, Ordering::Release);
                }
            },
            None,
        )
        .map_err(|e| CliError::Audio(format!("Failed to build audio stream: {}", e)))
}

/// Render one device buffer through `scratch`, a piece at a time
///
/// `scratch` must hold at least one frame. Nothing here allocates, whatever
/// the size of the buffer the device asks for.
fn fill_device_buffer<T, N>(
    driver: &mut RenderDriver<N>,
    mut tap: Option<&mut RecorderTap>,
    scratch: &mut [f32],
    data: &mut [T],
    channels: usize,
) where
    T: SizedSample + FromSample<f32>,
    N: FinishNotify,
{
    let channels = channels.max(1);
    let piece = (scratch.len() / channels).max(1) * channels;

    for out in data.chunks_mut(piece) {
        let block = &mut scratch[..out.len()];
        match tap.as_deref_mut() {
            Some(tap) => driver.process(&mut Tee(Interleaved::new(block, channels), tap)),
            None => driver.process(&mut Interleaved::new(block, channels)),
        };

        let filled = driver.last_frames() * channels;
        for (sample_out, &sample) in out[..filled].iter_mut().zip(block.iter()) {
            *sample_out = T::from_sample(sample);
        }
        // Short final block and retired driver: the device gets silence
        out[filled..].fill(T::EQUILIBRIUM);
    }
}

/// Wait for the finish message, giving up if the device has failed or the
/// real-time side is gone
fn wait_for_finish(listener: &mut FinishListener, stream_failed: &AtomicBool) -> bool {
    loop {
        if listener.wait_timeout(FINISH_POLL) {
            return true;
        }
        if stream_failed.load(Ordering::Acquire) || listener.is_abandoned() {
            return false;
        }
    }
}

/// What happened during one playback
#[derive(Debug, Clone, Copy)]
pub struct PlaybackSummary {
    pub finished: bool,
    pub recorded: Option<u64>,
}

/// A running playback; dropping it tears the stream down immediately
pub struct Playback {
    stream: Stream,
    listener: FinishListener,
    recorder: Option<Recorder>,
    stream_failed: Arc<AtomicBool>,
}

impl Playback {
    /// Block until the stream reports it has finished (or the device fails),
    /// then stop the recorder
    pub fn wait(self) -> Result<PlaybackSummary> {
        let Playback {
            stream,
            mut listener,
            recorder,
            stream_failed,
        } = self;

        let finished = wait_for_finish(&mut listener, &stream_failed);
        if finished {
            log::debug!("Stream finished");
            thread::sleep(DRAIN_GRACE);
        } else {
            log::warn!("Audio stream went away before finishing");
        }
        drop(stream);

        let recorded = match recorder {
            Some(recorder) => Some(recorder.stop()?),
            None => None,
        };
        Ok(PlaybackSummary { finished, recorded })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(records: Vec<Record>) -> StreamingGenerator {
        StreamingGenerator::new(GeneratorConfig::new(48000), records).unwrap()
    }

    #[test]
    fn test_device_buffer_larger_than_scratch() {
        // 2 bytes, no preamble: 880 samples
        let records = vec![Record::with_preamble(0.0, b"AB".to_vec()).unwrap()];
        let expected: Vec<f32> = generator(records.clone()).collect();

        let (signal, mut listener) = finish_channel();
        let mut driver = RenderDriver::new(generator(records), signal);

        let (producer, mut consumer) = HeapRb::<f32>::new(2048).split();
        let overruns = Arc::new(AtomicU64::new(0));
        let mut tap = RecorderTap {
            producer,
            overruns: overruns.clone(),
        };

        let mut scratch = vec![0.0f32; 64];
        let mut data = vec![1.0f32; 1000 * 2];
        fill_device_buffer(&mut driver, Some(&mut tap), &mut scratch, &mut data, 2);

        assert_eq!(scratch.len(), 64);
        for (frame, &sample) in data.chunks(2).zip(expected.iter()) {
            assert_eq!(frame, &[sample, sample]);
        }
        assert!(data[880 * 2..].iter().all(|&s| s == 0.0));

        let mut recorded = vec![0.0f32; 2048];
        let popped = consumer.pop_slice(&mut recorded);
        assert_eq!(&recorded[..popped], &expected[..]);
        assert_eq!(overruns.load(Ordering::Relaxed), 0);

        // The piece after the last sample retired the driver
        assert!(!driver.is_live());
        assert!(listener.is_finished());
    }

    #[test]
    fn test_device_buffer_silence_for_integer_formats() {
        let (signal, _listener) = finish_channel();
        let mut driver = RenderDriver::new(generator(Vec::new()), signal);
        let mut scratch = vec![0.0f32; 16];
        let mut data = vec![0u16; 100];
        fill_device_buffer(&mut driver, None, &mut scratch, &mut data, 1);
        assert!(data.iter().all(|&s| s == 32768));
    }

    #[test]
    fn test_wait_returns_on_finish() {
        let (mut signal, mut listener) = finish_channel();
        signal.notify_finished();
        assert!(wait_for_finish(&mut listener, &AtomicBool::new(false)));
    }

    #[test]
    fn test_wait_gives_up_on_device_failure() {
        let (_signal, mut listener) = finish_channel();
        assert!(!wait_for_finish(&mut listener, &AtomicBool::new(true)));
    }

    #[test]
    fn test_wait_gives_up_when_driver_dropped() {
        let (signal, mut listener) = finish_channel();
        drop(signal);
        assert!(!wait_for_finish(&mut listener, &AtomicBool::new(false)));
    }
}
