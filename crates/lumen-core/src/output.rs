//! Double-buffered frame publication and the optional output thread.
//!
//! The engine composes each frame into private working buffers, then
//! publishes by copying into the `render` side of a buffer pair and swapping
//! `render` and `copy` under the buffer-wide lock. Readers take the same
//! lock and snapshot the `copy` side, so the swap establishes the
//! happens-before edge between the engine's writes and any reader.
//!
//! Two pairs are kept: the main frame, and the cue frame with a flag saying
//! whether any cue tap was active. Without an output thread the lock is
//! never contended and a flip costs an uncontended mutex acquire.

use crate::color::Color;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug)]
struct FramePair {
    render: Vec<Color>,
    copy: Vec<Color>,
}

impl FramePair {
    fn new(point_count: usize) -> FramePair {
        FramePair {
            render: vec![Color::BLACK; point_count],
            copy: vec![Color::BLACK; point_count],
        }
    }

    fn publish(&mut self, frame: &[Color]) {
        self.render.copy_from_slice(frame);
        std::mem::swap(&mut self.render, &mut self.copy);
    }
}

#[derive(Debug)]
struct Buffers {
    main: FramePair,
    cue: FramePair,
    cue_active: bool,
    frame_count: u64,
}

/// A stable snapshot of one published frame.
#[derive(Clone, Debug)]
pub struct FrameSnapshot {
    /// The main output frame.
    pub main: Vec<Color>,
    /// The cue frame; meaningful only when `cue_active` is set.
    pub cue: Vec<Color>,
    /// Whether any cue tap contributed this frame.
    pub cue_active: bool,
    /// Monotonic frame number.
    pub frame: u64,
}

/// The engine's double-buffered frame handoff point.
#[derive(Debug)]
pub struct DoubleBuffer {
    buffers: Mutex<Buffers>,
    frame_ready: Condvar,
}

impl DoubleBuffer {
    /// A double buffer for frames of `point_count` colors.
    pub fn new(point_count: usize) -> DoubleBuffer {
        DoubleBuffer {
            buffers: Mutex::new(Buffers {
                main: FramePair::new(point_count),
                cue: FramePair::new(point_count),
                cue_active: false,
                frame_count: 0,
            }),
            frame_ready: Condvar::new(),
        }
    }

    /// Publishes a finished frame: copies into the render sides, flips both
    /// pairs, and signals waiting readers.
    pub fn publish(&self, main: &[Color], cue: &[Color], cue_active: bool) {
        let mut buffers = self.buffers.lock();
        buffers.main.publish(main);
        buffers.cue.publish(cue);
        buffers.cue_active = cue_active;
        buffers.frame_count += 1;
        drop(buffers);
        self.frame_ready.notify_all();
    }

    /// Number of frames published so far.
    pub fn frame_count(&self) -> u64 {
        self.buffers.lock().frame_count
    }

    /// Snapshots the latest published frame.
    pub fn snapshot(&self) -> FrameSnapshot {
        let buffers = self.buffers.lock();
        FrameSnapshot {
            main: buffers.main.copy.clone(),
            cue: buffers.cue.copy.clone(),
            cue_active: buffers.cue_active,
            frame: buffers.frame_count,
        }
    }

    /// Blocks until a frame newer than `seen` is published, or the timeout
    /// elapses. Returns the new snapshot, or `None` on timeout.
    pub fn wait_for_frame(&self, seen: u64, timeout: Duration) -> Option<FrameSnapshot> {
        let mut buffers = self.buffers.lock();
        if buffers.frame_count == seen {
            let result = self.frame_ready.wait_for(&mut buffers, timeout);
            if result.timed_out() && buffers.frame_count == seen {
                return None;
            }
        }
        Some(FrameSnapshot {
            main: buffers.main.copy.clone(),
            cue: buffers.cue.copy.clone(),
            cue_active: buffers.cue_active,
            frame: buffers.frame_count,
        })
    }

    /// Wakes any reader blocked in [`DoubleBuffer::wait_for_frame`].
    pub fn wake_readers(&self) {
        self.frame_ready.notify_all();
    }
}

/// Consumer of published frames, driven by the output thread.
///
/// Implementations forward frames to hardware, a network protocol, or a
/// preview surface. Called off the engine thread.
pub trait FrameSink: Send {
    /// Receives one frame. `cue` is present when a cue tap was active.
    fn frame(&mut self, main: &[Color], cue: Option<&[Color]>);
}

/// The optional output worker: waits for published frames and forwards the
/// stable copy side to a [`FrameSink`].
#[derive(Debug)]
pub struct OutputThread {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl OutputThread {
    /// Spawns the worker.
    pub fn start(buffer: Arc<DoubleBuffer>, mut sink: Box<dyn FrameSink>) -> OutputThread {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("lumen-output".into())
            .spawn(move || {
                tracing::debug!("output thread started");
                let mut seen = 0;
                while !stop_flag.load(Ordering::Acquire) {
                    let Some(snapshot) =
                        buffer.wait_for_frame(seen, Duration::from_millis(100))
                    else {
                        continue;
                    };
                    seen = snapshot.frame;
                    let cue = snapshot.cue_active.then_some(snapshot.cue.as_slice());
                    sink.frame(&snapshot.main, cue);
                }
                tracing::debug!("output thread stopped");
            })
            .expect("spawn output thread");
        OutputThread {
            stop,
            handle: Some(handle),
        }
    }

    /// Stops and joins the worker.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for OutputThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn publish_flip_exposes_previous_render() {
        let db = DoubleBuffer::new(2);
        let frame = [Color::RED, Color::BLUE];
        db.publish(&frame, &[Color::BLACK, Color::BLACK], false);

        let snap = db.snapshot();
        assert_eq!(snap.frame, 1);
        assert_eq!(snap.main, vec![Color::RED, Color::BLUE]);
        assert!(!snap.cue_active);
    }

    #[test]
    fn snapshot_is_stable_across_later_publishes() {
        let db = DoubleBuffer::new(1);
        db.publish(&[Color::RED], &[Color::BLACK], false);
        let snap = db.snapshot();
        db.publish(&[Color::GREEN], &[Color::BLACK], false);
        assert_eq!(snap.main[0], Color::RED);
        assert_eq!(db.snapshot().main[0], Color::GREEN);
    }

    #[test]
    fn wait_for_frame_times_out_without_publisher() {
        let db = DoubleBuffer::new(1);
        assert!(db.wait_for_frame(0, Duration::from_millis(10)).is_none());
    }

    #[test]
    fn output_thread_receives_frames() {
        struct Capture(Arc<StdMutex<Vec<Vec<Color>>>>);
        impl FrameSink for Capture {
            fn frame(&mut self, main: &[Color], _cue: Option<&[Color]>) {
                self.0.lock().unwrap().push(main.to_vec());
            }
        }

        let db = Arc::new(DoubleBuffer::new(1));
        let frames = Arc::new(StdMutex::new(Vec::new()));
        let thread = OutputThread::start(Arc::clone(&db), Box::new(Capture(Arc::clone(&frames))));

        db.publish(&[Color::RED], &[Color::BLACK], false);
        // allow the worker to pick up the frame
        for _ in 0..100 {
            if !frames.lock().unwrap().is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        thread.stop();

        let frames = frames.lock().unwrap();
        assert!(!frames.is_empty());
        assert_eq!(frames[0][0], Color::RED);
    }
}
