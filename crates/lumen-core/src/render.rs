//! The optional render thread.
//!
//! The engine's tick function is caller-agnostic; this worker owns the
//! engine, drives [`Engine::tick`] at the engine's `fps` parameter with a
//! best-effort sleep between frames, and returns the engine when stopped.
//! Other threads reach the running engine through the one-shot task queue.

use crate::engine::{Engine, EngineTask};
use crate::output::DoubleBuffer;
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Handle to an engine running on its own thread.
#[derive(Debug)]
pub struct RenderThread {
    stop: Arc<AtomicBool>,
    tasks: Sender<EngineTask>,
    frames: Arc<DoubleBuffer>,
    handle: JoinHandle<Engine>,
}

impl RenderThread {
    /// Takes ownership of the engine and starts ticking it.
    pub fn start(engine: Engine) -> RenderThread {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let tasks = engine.task_sender();
        let frames = engine.frames();
        let handle = std::thread::Builder::new()
            .name("lumen-render".into())
            .spawn(move || run_loop(engine, &stop_flag))
            .expect("spawn render thread");
        RenderThread {
            stop,
            tasks,
            frames,
            handle,
        }
    }

    /// A sender for one-shot tasks executed on the engine thread.
    pub fn tasks(&self) -> Sender<EngineTask> {
        self.tasks.clone()
    }

    /// The double buffer frames are published through.
    pub fn frames(&self) -> Arc<DoubleBuffer> {
        Arc::clone(&self.frames)
    }

    /// Sets the interrupt flag, joins the thread, and returns the engine.
    pub fn stop(self) -> Engine {
        self.stop.store(true, Ordering::Release);
        self.handle.join().expect("render thread panicked")
    }
}

fn run_loop(mut engine: Engine, stop: &AtomicBool) -> Engine {
    tracing::info!("render thread started");
    let start = Instant::now();
    while !stop.load(Ordering::Acquire) {
        let frame_start = Instant::now();
        let now_ms = start.elapsed().as_secs_f64() * 1000.0;
        engine.tick(now_ms);

        // Best-effort pacing toward the fps parameter.
        let frame_budget = Duration::from_secs_f64(1.0 / engine.fps().max(1.0));
        let elapsed = frame_start.elapsed();
        if elapsed < frame_budget {
            std::thread::sleep(frame_budget - elapsed);
        }
    }
    tracing::info!(ticks = engine.ticks(), "render thread stopped");
    engine
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::device::{EmptyFactory, Pattern, RunContext};
    use crate::engine::EngineOptions;

    struct Solid(Color);

    impl Pattern for Solid {
        fn class_name(&self) -> &'static str {
            "solid"
        }
        fn run(&mut self, _ctx: &RunContext<'_>, frame: &mut [Color]) {
            frame.fill(self.0);
        }
    }

    #[test]
    fn render_thread_publishes_frames_and_returns_engine() {
        let mut engine = Engine::new(EngineOptions::new(4), Box::new(EmptyFactory));
        engine.add_channel(Box::new(Solid(Color::RED)));

        let thread = RenderThread::start(engine);
        let frames = thread.frames();
        // wait for at least one published frame
        let snapshot = frames
            .wait_for_frame(0, Duration::from_secs(2))
            .expect("a frame within two seconds");
        assert!(snapshot.frame >= 1);

        // tasks reach the running engine
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        thread
            .tasks()
            .send(Box::new(move |engine: &mut Engine| {
                let _ = done_tx.send(engine.channels().len());
            }))
            .unwrap();
        assert_eq!(done_rx.recv_timeout(Duration::from_secs(2)).unwrap(), 1);

        let engine = thread.stop();
        assert!(engine.ticks() >= 1);
    }
}
