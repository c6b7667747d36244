//! Streaming layer between the renderer thread and the audio callback
//!
//! [`StreamBuffer`] is a single-producer/single-consumer ring of stereo
//! frames. The write and read cursors are atomics (release on publish,
//! acquire on the other side); the frame slots themselves are unguarded
//! because each slot is written by exactly one thread at a time. The
//! renderer thread keeps the buffer full and sleeps briefly when it is;
//! the audio callback only copies frames out and never blocks.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, warn};

use crate::midi::MidiData;

use super::engine::{StereoFrame, Synthesizer};
use super::envelope::AdsrConfig;
use super::sequencer::Sequencer;
use super::wavetable::SAMPLE_RATE;

/// Buffered play-ahead: 100 ms
const BUFFER_CAPACITY: usize = SAMPLE_RATE as usize / 10;

/// How long the renderer sleeps when the buffer reports full
const FULL_BUFFER_NAP: Duration = Duration::from_millis(1);

/// Lock-free SPSC ring of stereo frames
pub struct StreamBuffer {
    frames: Box<[UnsafeCell<StereoFrame>]>,
    write_pos: AtomicUsize,
    read_pos: AtomicUsize,
    underruns: AtomicUsize,
}

// Slots are only touched under the SPSC cursor discipline: a slot is
// written before write_pos publishes it and read before read_pos retires
// it, so no slot is ever accessed from two threads at once.
unsafe impl Sync for StreamBuffer {}

impl StreamBuffer {
    pub fn new(capacity: usize) -> Self {
        let frames = (0..capacity.max(2))
            .map(|_| UnsafeCell::new(StereoFrame::ZERO))
            .collect();
        Self {
            frames,
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(0),
            underruns: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    /// Frames buffered ahead of the consumer
    pub fn available(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write - read
    }

    pub fn is_full(&self) -> bool {
        let write = self.write_pos.load(Ordering::Relaxed);
        let read = self.read_pos.load(Ordering::Acquire);
        write - read + 1 >= self.capacity()
    }

    /// Total frames the consumer had to zero-fill so far
    pub fn underrun_frames(&self) -> usize {
        self.underruns.load(Ordering::Relaxed)
    }

    /// Producer side. Returns false (and stores nothing) when full.
    pub fn push(&self, frame: StereoFrame) -> bool {
        let write = self.write_pos.load(Ordering::Relaxed);
        let read = self.read_pos.load(Ordering::Acquire);
        if write - read + 1 >= self.capacity() {
            return false;
        }
        unsafe {
            *self.frames[write % self.capacity()].get() = frame;
        }
        self.write_pos.store(write + 1, Ordering::Release);
        true
    }

    /// Consumer side: copy up to `left.len()` frames into the channel
    /// slices. Frames the producer has not written yet are zero-filled
    /// (documented underrun) and the read cursor does not advance past
    /// the producer, so nothing is ever skipped or read twice.
    pub fn read_into(&self, left: &mut [f32], right: &mut [f32]) -> usize {
        let wanted = left.len().min(right.len());
        let read = self.read_pos.load(Ordering::Relaxed);
        let write = self.write_pos.load(Ordering::Acquire);
        let copied = wanted.min(write - read);

        for i in 0..copied {
            let frame = unsafe { *self.frames[(read + i) % self.capacity()].get() };
            left[i] = frame.left;
            right[i] = frame.right;
        }
        for i in copied..wanted {
            left[i] = 0.0;
            right[i] = 0.0;
        }
        self.read_pos.store(read + copied, Ordering::Release);

        if copied < wanted {
            self.underruns.fetch_add(wanted - copied, Ordering::Relaxed);
        }
        copied
    }
}

/// Patch surface of [`Synthesizer`], deliverable across threads
#[derive(Debug, Clone)]
pub enum PatchCommand {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    SetAmplitude(f64),
    SetOscIndex(usize),
    SetPitchShift(f64),
    SetUnisonCount(usize),
    SetDetune(f64),
    SetSpread(f64),
    SetMono(bool),
    SetLegato(bool),
    SetGlide(bool),
    SetGlideTime(f64),
    SetAdsr(AdsrConfig),
    Clear,
}

fn apply_command(synth: &mut Synthesizer, command: PatchCommand) {
    match command {
        PatchCommand::NoteOn { note, velocity } => synth.note_on(note, velocity),
        PatchCommand::NoteOff { note } => synth.note_off(note),
        PatchCommand::SetAmplitude(v) => synth.set_amplitude(v),
        PatchCommand::SetOscIndex(v) => synth.set_osc_index(v),
        PatchCommand::SetPitchShift(v) => synth.set_pitch_shift(v),
        PatchCommand::SetUnisonCount(v) => synth.set_unison_count(v),
        PatchCommand::SetDetune(v) => synth.set_detune(v),
        PatchCommand::SetSpread(v) => synth.set_spread(v),
        PatchCommand::SetMono(v) => synth.set_mono(v),
        PatchCommand::SetLegato(v) => synth.set_legato(v),
        PatchCommand::SetGlide(v) => synth.set_glide(v),
        PatchCommand::SetGlideTime(v) => synth.set_glide_time(v),
        PatchCommand::SetAdsr(v) => synth.set_adsr(v),
        PatchCommand::Clear => synth.clear(),
    }
}

/// Couples a sequencer and synthesizer to a stream buffer
pub struct AudioRenderer {
    synth: Synthesizer,
    sequencer: Sequencer,
    buffer: Arc<StreamBuffer>,
}

impl AudioRenderer {
    pub fn new(midi: MidiData) -> Self {
        Self {
            synth: Synthesizer::new(),
            sequencer: Sequencer::new(midi),
            buffer: Arc::new(StreamBuffer::new(BUFFER_CAPACITY)),
        }
    }

    pub fn buffer(&self) -> Arc<StreamBuffer> {
        Arc::clone(&self.buffer)
    }

    pub fn synth_mut(&mut self) -> &mut Synthesizer {
        &mut self.synth
    }

    /// Produce frames until the buffer reports full; returns how many
    pub fn fill(&mut self) -> usize {
        let mut produced = 0;
        while !self.buffer.is_full() {
            let frame = self.sequencer.process_sample(&mut self.synth);
            self.buffer.push(frame);
            produced += 1;
        }
        produced
    }

    fn run(mut self, running: Arc<AtomicBool>, commands: Receiver<PatchCommand>) {
        debug!("renderer thread up, buffer capacity {}", self.buffer.capacity());
        while running.load(Ordering::Relaxed) {
            for command in commands.try_iter() {
                apply_command(&mut self.synth, command);
            }
            self.fill();
            thread::sleep(FULL_BUFFER_NAP);
        }
        debug!("renderer thread down");
    }
}

/// Owns the renderer worker thread; dropping (or `stop`) joins it
pub struct RenderHandle {
    running: Arc<AtomicBool>,
    buffer: Arc<StreamBuffer>,
    commands: Sender<PatchCommand>,
    worker: Option<JoinHandle<()>>,
}

impl RenderHandle {
    pub fn spawn(renderer: AudioRenderer) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let buffer = renderer.buffer();
        let (tx, rx) = mpsc::channel();
        let worker = {
            let running = Arc::clone(&running);
            thread::spawn(move || renderer.run(running, rx))
        };
        Self {
            running,
            buffer,
            commands: tx,
            worker: Some(worker),
        }
    }

    pub fn buffer(&self) -> Arc<StreamBuffer> {
        Arc::clone(&self.buffer)
    }

    /// Queue a patch change; the renderer applies it before its next fill
    pub fn send(&self, command: PatchCommand) {
        // the renderer outlives the handle, a send cannot fail while it runs
        let _ = self.commands.send(command);
    }

    /// Pull-based sink contract: fill the two channel slices at the
    /// device rate. Never blocks.
    pub fn get_audio(&self, left: &mut [f32], right: &mut [f32]) {
        let copied = self.buffer.read_into(left, right);
        if copied < left.len() {
            warn!("audio underrun: {} of {} frames", copied, left.len());
        }
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for RenderHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_then_read_preserves_order() {
        let buffer = StreamBuffer::new(8);
        for i in 0..5 {
            assert!(buffer.push(StereoFrame::new(i as f32, -(i as f32))));
        }
        let mut left = [0.0f32; 5];
        let mut right = [0.0f32; 5];
        assert_eq!(buffer.read_into(&mut left, &mut right), 5);
        for i in 0..5 {
            assert_eq!(left[i], i as f32);
            assert_eq!(right[i], -(i as f32));
        }
    }

    #[test]
    fn test_full_buffer_rejects_push() {
        let buffer = StreamBuffer::new(4);
        let mut accepted = 0;
        while buffer.push(StereoFrame::ZERO) {
            accepted += 1;
        }
        assert_eq!(accepted, 3); // capacity - 1 with the guard slot
        assert!(buffer.is_full());

        let mut left = [0.0f32; 1];
        let mut right = [0.0f32; 1];
        buffer.read_into(&mut left, &mut right);
        assert!(buffer.push(StereoFrame::ZERO));
    }

    #[test]
    fn test_underrun_zero_fills_and_counts() {
        let buffer = StreamBuffer::new(8);
        buffer.push(StereoFrame::new(0.5, 0.5));

        let mut left = [9.0f32; 4];
        let mut right = [9.0f32; 4];
        let copied = buffer.read_into(&mut left, &mut right);
        assert_eq!(copied, 1);
        assert_eq!(left[0], 0.5);
        assert_eq!(&left[1..], &[0.0, 0.0, 0.0]);
        assert_eq!(buffer.underrun_frames(), 3);

        // the producer resumes exactly where it left off
        buffer.push(StereoFrame::new(0.25, 0.25));
        let copied = buffer.read_into(&mut left[..1], &mut right[..1]);
        assert_eq!(copied, 1);
        assert_eq!(left[0], 0.25);
    }

    #[test]
    fn test_wraparound_keeps_ordering() {
        let buffer = StreamBuffer::new(4);
        let mut next_value = 0u32;
        let mut expected = 0u32;
        let mut left = [0.0f32; 2];
        let mut right = [0.0f32; 2];

        // cycle well past the capacity
        for _ in 0..50 {
            while buffer.push(StereoFrame::new(next_value as f32, 0.0)) {
                next_value += 1;
            }
            let copied = buffer.read_into(&mut left, &mut right);
            for &value in &left[..copied] {
                assert_eq!(value, expected as f32);
                expected += 1;
            }
        }
        assert_eq!(buffer.underrun_frames(), 0);
    }

    #[test]
    fn test_threaded_producer_consumer() {
        let buffer = Arc::new(StreamBuffer::new(64));
        const TOTAL: usize = 10_000;

        let producer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                let mut sent = 0u32;
                while (sent as usize) < TOTAL {
                    if buffer.push(StereoFrame::new(sent as f32, 0.0)) {
                        sent += 1;
                    } else {
                        thread::sleep(Duration::from_micros(50));
                    }
                }
            })
        };

        let mut expected = 0u32;
        let mut left = [0.0f32; 32];
        let mut right = [0.0f32; 32];
        while (expected as usize) < TOTAL {
            let copied = buffer.read_into(&mut left, &mut right);
            for &value in &left[..copied] {
                assert_eq!(value, expected as f32, "frame out of order");
                expected += 1;
            }
        }
        producer.join().unwrap();
    }
}
