//! Real-time pull adapter
//!
//! A [`RenderDriver`] is called by the host audio clock once per quantum. It
//! pulls samples from its [`StreamingGenerator`] and replicates each one into
//! every channel of the target buffers. When a call produces no samples the
//! driver retires and posts a single [`StreamFinished`] message to the control
//! side through a [`FinishNotify`] implementation.

use crate::generator::StreamingGenerator;
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};
use std::time::Duration;

/// Output buffer shape a driver can render into
pub trait RenderTarget {
    /// Frames requested in this call (the quantum)
    fn frames(&self) -> usize;

    /// Write the mono `sample` into every channel at `frame`
    fn write_frame(&mut self, frame: usize, sample: f32);
}

impl<T: RenderTarget + ?Sized> RenderTarget for &mut T {
    fn frames(&self) -> usize {
        (**self).frames()
    }

    fn write_frame(&mut self, frame: usize, sample: f32) {
        (**self).write_frame(frame, sample)
    }
}

/// Separate buffer per channel; the quantum is the first channel's length
pub struct Channels<'a, 'b> {
    channels: &'a mut [&'b mut [f32]],
}

impl<'a, 'b> Channels<'a, 'b> {
    pub fn new(channels: &'a mut [&'b mut [f32]]) -> Self {
        Self { channels }
    }
}

impl RenderTarget for Channels<'_, '_> {
    fn frames(&self) -> usize {
        self.channels.first().map_or(0, |channel| channel.len())
    }

    fn write_frame(&mut self, frame: usize, sample: f32) {
        for channel in self.channels.iter_mut() {
            if let Some(slot) = channel.get_mut(frame) {
                *slot = sample;
            }
        }
    }
}

/// One contiguous block holding `channels` consecutive channel buffers
pub struct Planar<'a> {
    data: &'a mut [f32],
    channels: usize,
}

impl<'a> Planar<'a> {
    pub fn new(data: &'a mut [f32], channels: usize) -> Self {
        Self { data, channels }
    }
}

impl RenderTarget for Planar<'_> {
    fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.data.len() / self.channels
        }
    }

    fn write_frame(&mut self, frame: usize, sample: f32) {
        let frames = self.frames();
        if frame >= frames {
            return;
        }
        for channel in 0..self.channels {
            self.data[channel * frames + frame] = sample;
        }
    }
}

/// Interleaved frames (L, R, L, R, ...) as delivered by most device APIs
pub struct Interleaved<'a> {
    data: &'a mut [f32],
    channels: usize,
}

impl<'a> Interleaved<'a> {
    pub fn new(data: &'a mut [f32], channels: usize) -> Self {
        Self { data, channels }
    }
}

impl RenderTarget for Interleaved<'_> {
    fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.data.len() / self.channels
        }
    }

    fn write_frame(&mut self, frame: usize, sample: f32) {
        if frame >= self.frames() {
            return;
        }
        let start = frame * self.channels;
        self.data[start..start + self.channels].fill(sample);
    }
}

/// Feed the same stream to a second output (e.g. a recorder); the first
/// target decides the quantum and frames past the end of the second are dropped
pub struct Tee<A, B>(pub A, pub B);

impl<A: RenderTarget, B: RenderTarget> RenderTarget for Tee<A, B> {
    fn frames(&self) -> usize {
        self.0.frames()
    }

    fn write_frame(&mut self, frame: usize, sample: f32) {
        self.0.write_frame(frame, sample);
        self.1.write_frame(frame, sample);
    }
}

/// The "stream finished" message posted to the control side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFinished;

/// Receiver of the one-shot completion notification
///
/// Called from the real-time context, so implementations must not block.
pub trait FinishNotify {
    fn notify_finished(&mut self);
}

/// Real-time side of the completion channel
pub struct FinishSignal {
    tx: SyncSender<StreamFinished>,
}

impl FinishNotify for FinishSignal {
    fn notify_finished(&mut self) {
        // Capacity 1 and a single send per stream: this never blocks. A
        // dropped listener just means nobody is waiting.
        let _ = self.tx.try_send(StreamFinished);
    }
}

/// Control side of the completion channel
pub struct FinishListener {
    rx: Receiver<StreamFinished>,
    finished: bool,
}

impl FinishListener {
    /// Non-blocking check
    pub fn is_finished(&mut self) -> bool {
        if !self.finished {
            self.finished = matches!(self.rx.try_recv(), Ok(StreamFinished));
        }
        self.finished
    }

    /// Block until the stream finishes. Returns false if the driver was
    /// dropped without finishing (e.g. the audio graph was torn down).
    pub fn wait(&mut self) -> bool {
        if !self.finished {
            self.finished = self.rx.recv().is_ok();
        }
        self.finished
    }

    /// Block for at most `timeout`
    pub fn wait_timeout(&mut self, timeout: Duration) -> bool {
        if !self.finished {
            self.finished = self.rx.recv_timeout(timeout).is_ok();
        }
        self.finished
    }

    /// Whether the real-time side is gone without having finished
    pub fn is_abandoned(&mut self) -> bool {
        !self.is_finished() && matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }
}

/// Bounded one-shot channel between the real-time and control contexts
pub fn finish_channel() -> (FinishSignal, FinishListener) {
    let (tx, rx) = mpsc::sync_channel(1);
    (
        FinishSignal { tx },
        FinishListener {
            rx,
            finished: false,
        },
    )
}

/// Drives a generator from the host's render callback
pub struct RenderDriver<N: FinishNotify = FinishSignal> {
    generator: StreamingGenerator,
    notifier: N,
    live: bool,
    last_frames: usize,
}

impl<N: FinishNotify> RenderDriver<N> {
    pub fn new(generator: StreamingGenerator, notifier: N) -> Self {
        log::debug!(
            "render driver created (generator exhausted: {})",
            generator.is_exhausted()
        );
        Self {
            generator,
            notifier,
            live: true,
            last_frames: 0,
        }
    }

    /// Render one quantum into `target`
    ///
    /// Stops early on the final block without padding; the host owns whatever
    /// lies past [`last_frames`](Self::last_frames). Returns true while samples
    /// were written. The first call that writes nothing retires the driver and
    /// notifies the control side; every later call returns false.
    pub fn process<T: RenderTarget + ?Sized>(&mut self, target: &mut T) -> bool {
        self.last_frames = 0;
        if !self.live {
            return false;
        }

        let quantum = target.frames();
        if quantum == 0 {
            // No output buffers connected: nothing pulled, stay scheduled
            return true;
        }

        let mut written = 0;
        while written < quantum {
            match self.generator.next_sample() {
                Some(sample) => {
                    target.write_frame(written, sample);
                    written += 1;
                }
                None => break,
            }
        }
        self.last_frames = written;

        if written > 0 {
            return true;
        }

        self.live = false;
        self.notifier.notify_finished();
        false
    }

    /// Frames written by the most recent `process` call
    pub fn last_frames(&self) -> usize {
        self.last_frames
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn generator(&self) -> &StreamingGenerator {
        &self.generator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::GeneratorConfig;
    use crate::record::Record;

    struct CountingNotify(usize);

    impl FinishNotify for CountingNotify {
        fn notify_finished(&mut self) {
            self.0 += 1;
        }
    }

    fn driver(sample_rate: u32, records: Vec<Record>) -> RenderDriver<CountingNotify> {
        let generator =
            StreamingGenerator::new(GeneratorConfig::new(sample_rate), records).unwrap();
        RenderDriver::new(generator, CountingNotify(0))
    }

    #[test]
    fn test_partial_final_block_then_retire() {
        // 0.75 s at 400 Hz = 300 samples: two full quanta and a 44-frame tail
        let records = vec![Record::with_preamble(0.75, Vec::new()).unwrap()];
        let mut driver = driver(400, records);
        let mut block = [9.0f32; 128];

        assert!(driver.process(&mut Interleaved::new(&mut block, 1)));
        assert_eq!(driver.last_frames(), 128);
        assert!(driver.process(&mut Interleaved::new(&mut block, 1)));
        assert_eq!(driver.last_frames(), 128);

        let mut tail = [9.0f32; 128];
        assert!(driver.process(&mut Interleaved::new(&mut tail, 1)));
        assert_eq!(driver.last_frames(), 44);
        // No padding past the end of the stream
        assert!(tail[44..].iter().all(|&s| s == 9.0));
        assert_eq!(driver.notifier.0, 0);

        assert!(!driver.process(&mut Interleaved::new(&mut block, 1)));
        assert_eq!(driver.notifier.0, 1);
        assert!(!driver.is_live());

        for _ in 0..3 {
            assert!(!driver.process(&mut Interleaved::new(&mut block, 1)));
        }
        assert_eq!(driver.notifier.0, 1, "finish must be signalled once");
    }

    #[test]
    fn test_empty_stream_retires_on_first_call() {
        let mut driver = driver(48000, Vec::new());
        let mut block = [0.0f32; 128];
        assert!(!driver.process(&mut Interleaved::new(&mut block, 2)));
        assert_eq!(driver.notifier.0, 1);
    }

    #[test]
    fn test_no_outputs_keeps_driver_alive() {
        let mut driver = driver(48000, vec![Record::new(b"x".to_vec())]);
        let mut nothing: [&mut [f32]; 0] = [];
        assert!(driver.process(&mut Channels::new(&mut nothing)));
        assert_eq!(driver.generator().emitted(), 0);
        assert_eq!(driver.notifier.0, 0);
    }

    #[test]
    fn test_interleaved_replicates_channels() {
        let mut driver = driver(48000, vec![Record::new(b"A".to_vec())]);
        let mut block = vec![0.0f32; 128 * 2];
        driver.process(&mut Interleaved::new(&mut block, 2));
        for frame in block.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
        assert!(block.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn test_planar_and_channels_agree() {
        let records = vec![Record::new(b"Hi".to_vec())];
        let mut a = driver(44100, records.clone());
        let mut b = driver(44100, records);

        let mut planar = vec![0.0f32; 64 * 3];
        a.process(&mut Planar::new(&mut planar, 3));

        let mut left = [0.0f32; 64];
        let mut right = [0.0f32; 64];
        {
            let mut buffers: [&mut [f32]; 2] = [&mut left, &mut right];
            b.process(&mut Channels::new(&mut buffers));
        }

        assert_eq!(&planar[..64], &left[..]);
        assert_eq!(&planar[64..128], &left[..]);
        assert_eq!(&planar[128..], &left[..]);
        assert_eq!(left, right);
    }

    #[test]
    fn test_tee_writes_both_targets() {
        let mut driver = driver(48000, vec![Record::new(b"Z".to_vec())]);
        let mut speaker = vec![0.0f32; 32 * 2];
        let mut recorder = vec![0.0f32; 32];
        driver.process(&mut Tee(
            Interleaved::new(&mut speaker, 2),
            Interleaved::new(&mut recorder, 1),
        ));
        for (frame, &recorded) in speaker.chunks(2).zip(recorder.iter()) {
            assert_eq!(frame[0], recorded);
        }
    }

    #[test]
    fn test_tee_with_shorter_second_target() {
        let mut driver = driver(48000, vec![Record::new(b"Z".to_vec())]);
        let mut speaker = [0.0f32; 128];
        let mut recorder = [0.0f32; 64];
        let mut planar = [0.0f32; 32 * 2];
        assert!(driver.process(&mut Tee(
            Interleaved::new(&mut speaker, 1),
            Tee(Interleaved::new(&mut recorder, 1), Planar::new(&mut planar, 2)),
        )));
        assert_eq!(driver.last_frames(), 128);
        assert_eq!(&speaker[..64], &recorder[..]);
        assert_eq!(&speaker[..32], &planar[..32]);
        assert_eq!(&speaker[..32], &planar[32..]);
    }

    #[test]
    fn test_finish_channel_delivers_once() {
        let (signal, mut listener) = finish_channel();
        let generator = StreamingGenerator::new(
            GeneratorConfig::new(48000),
            vec![Record::with_preamble(0.0, b"k".to_vec()).unwrap()],
        )
        .unwrap();
        let mut driver = RenderDriver::new(generator, signal);

        let mut block = [0.0f32; 128];
        let mut calls = 0;
        while driver.process(&mut Interleaved::new(&mut block, 1)) {
            calls += 1;
            assert!(!listener.is_finished());
        }
        // 440 samples over 128-frame quanta
        assert_eq!(calls, 4);
        assert!(listener.is_finished());
        assert!(listener.wait());
        assert!(!listener.is_abandoned());
    }

    #[test]
    fn test_listener_reports_abandoned_driver() {
        let (signal, mut listener) = finish_channel();
        drop(signal);
        assert!(!listener.wait_timeout(Duration::from_millis(10)));
        assert!(listener.is_abandoned());
    }
}
