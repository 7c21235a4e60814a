// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

//! Frame admission and the inference worker.
//!
//! A [`FramePipeline`] processes at most one frame at a time. A frame that
//! arrives while another is in flight is dropped, never queued. Inference
//! runs on a dedicated thread and every frame waits for it no longer than
//! the session's inference timeout. A frame abandoned by its caller is never
//! inferred later.

use std::{
    sync::{
        Arc, Mutex, TryLockError,
        atomic::{AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use log::{debug, trace, warn};
use ndarray::ArrayD;

use crate::{DetectionSession, Error, FrameOutput, Result, SessionConfig};

/// Sequence marker for "no frame is awaited".
const NO_FRAME: u64 = u64::MAX;

/// One camera frame handed to the inference backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameInput {
    pub width: u32,
    pub height: u32,
    pub timestamp_ms: u64,
    /// pixel data in whatever layout the backend expects
    pub pixels: Vec<u8>,
}

/// Raw detector output for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceOutput {
    pub tensor: ArrayD<f32>,
}

/// The model runtime. Implementations run on the inference worker thread.
pub trait InferenceBackend: Send + 'static {
    fn infer(&mut self, frame: &FrameInput) -> Result<InferenceOutput>;
}

struct InferenceRequest {
    sequence: u64,
    frame: FrameInput,
}

struct InferenceResponse {
    sequence: u64,
    result: Result<InferenceOutput>,
}

/// Runs an [`InferenceBackend`] on its own thread.
///
/// The request queue holds a single frame. Before submitting, the caller
/// evicts a request the worker has not picked up yet, and the worker skips
/// any request whose caller stopped waiting. Results that arrive after their
/// frame timed out are discarded by sequence number.
#[derive(Debug)]
pub struct InferenceWorker {
    request_tx: Sender<InferenceRequest>,
    /// caller side of the request queue, used to evict stale requests
    pending_rx: Receiver<InferenceRequest>,
    response_rx: Receiver<InferenceResponse>,
    /// sequence the caller is waiting for, or `NO_FRAME`
    awaited: Arc<AtomicU64>,
    timeout: Duration,
    next_sequence: u64,
    _handle: JoinHandle<()>,
}

impl InferenceWorker {
    pub fn spawn<B: InferenceBackend>(mut backend: B, timeout: Duration) -> Result<Self> {
        let (request_tx, request_rx) = bounded::<InferenceRequest>(1);
        let (response_tx, response_rx) = bounded::<InferenceResponse>(1);
        let awaited = Arc::new(AtomicU64::new(NO_FRAME));
        let pending_rx = request_rx.clone();

        let worker_awaited = Arc::clone(&awaited);
        let handle = thread::Builder::new()
            .name("roadwatch-inference".to_string())
            .spawn(move || {
                debug!("inference worker started");
                while let Ok(req) = request_rx.recv() {
                    if worker_awaited.load(Ordering::SeqCst) != req.sequence {
                        trace!("skipping abandoned frame #{}", req.sequence);
                        continue;
                    }
                    let result = backend.infer(&req.frame);
                    let response = InferenceResponse {
                        sequence: req.sequence,
                        result,
                    };
                    if response_tx.send(response).is_err() {
                        break;
                    }
                }
                debug!("inference worker stopped");
            })?;

        Ok(Self {
            request_tx,
            pending_rx,
            response_rx,
            awaited,
            timeout,
            next_sequence: 0,
            _handle: handle,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Submits one frame and waits for its result.
    pub fn infer(&mut self, frame: FrameInput) -> Result<InferenceOutput> {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        for stale in self.pending_rx.try_iter() {
            trace!("evicting abandoned frame #{}", stale.sequence);
        }
        self.awaited.store(sequence, Ordering::SeqCst);
        match self.request_tx.try_send(InferenceRequest { sequence, frame }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.awaited.store(NO_FRAME, Ordering::SeqCst);
                return Err(Error::WorkerBusy);
            }
            Err(TrySendError::Disconnected(_)) => return Err(Error::WorkerDisconnected),
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(response) if response.sequence == sequence => {
                    self.awaited.store(NO_FRAME, Ordering::SeqCst);
                    return response.result;
                }
                Ok(response) => trace!("discarding late result #{}", response.sequence),
                Err(RecvTimeoutError::Timeout) => {
                    self.awaited.store(NO_FRAME, Ordering::SeqCst);
                    return Err(Error::InferenceTimeout(self.timeout));
                }
                Err(RecvTimeoutError::Disconnected) => return Err(Error::WorkerDisconnected),
            }
        }
    }
}

#[derive(Debug)]
pub enum FrameOutcome {
    Processed(FrameOutput),
    /// another frame was in flight
    Dropped,
    /// inference did not answer in time; no partial output
    TimedOut,
    /// the backend failed on this frame
    Failed(Error),
}

impl FrameOutcome {
    pub fn output(&self) -> Option<&FrameOutput> {
        match self {
            FrameOutcome::Processed(out) => Some(out),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct PipelineState {
    session: DetectionSession,
    worker: InferenceWorker,
}

/// Latest-frame-wins front end of a [`DetectionSession`].
#[derive(Debug)]
pub struct FramePipeline {
    state: Mutex<PipelineState>,
}

impl FramePipeline {
    pub fn new<B: InferenceBackend>(config: SessionConfig, backend: B) -> Result<Self> {
        let session = DetectionSession::new(config)?;
        let worker = InferenceWorker::spawn(backend, session.inference_timeout())?;
        Ok(Self::from_parts(session, worker))
    }

    pub fn from_parts(session: DetectionSession, worker: InferenceWorker) -> Self {
        Self {
            state: Mutex::new(PipelineState { session, worker }),
        }
    }

    /// Runs one frame end to end unless a previous frame is still in flight.
    pub fn process(&self, frame: FrameInput) -> FrameOutcome {
        let mut guard = match self.state.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                debug!("dropping frame at {} ms, pipeline busy", frame.timestamp_ms);
                return FrameOutcome::Dropped;
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        let state = &mut *guard;

        let (width, height, now_ms) = (frame.width, frame.height, frame.timestamp_ms);
        match state.worker.infer(frame) {
            Ok(output) => FrameOutcome::Processed(state.session.process_output(
                output.tensor.view(),
                width,
                height,
                now_ms,
            )),
            Err(Error::WorkerBusy) => {
                debug!("dropping frame at {} ms, inference worker busy", now_ms);
                FrameOutcome::Dropped
            }
            Err(Error::InferenceTimeout(t)) => {
                warn!(
                    "frame at {} ms abandoned after {} ms of inference",
                    now_ms,
                    t.as_millis()
                );
                FrameOutcome::TimedOut
            }
            Err(e) => {
                warn!("frame at {} ms failed: {}", now_ms, e);
                FrameOutcome::Failed(e)
            }
        }
    }

    /// Ends the current detection session's state. Blocks until an in-flight
    /// frame completes.
    pub fn reset(&self) {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.session.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl InferenceBackend for Echo {
        fn infer(&mut self, frame: &FrameInput) -> Result<InferenceOutput> {
            let value = frame.timestamp_ms as f32;
            Ok(InferenceOutput {
                tensor: ArrayD::from_elem(vec![1], value),
            })
        }
    }

    struct Sleepy(Duration);

    impl InferenceBackend for Sleepy {
        fn infer(&mut self, frame: &FrameInput) -> Result<InferenceOutput> {
            thread::sleep(self.0);
            Echo.infer(frame)
        }
    }

    fn frame(timestamp_ms: u64) -> FrameInput {
        FrameInput {
            width: 640,
            height: 480,
            timestamp_ms,
            pixels: Vec::new(),
        }
    }

    #[test]
    fn test_worker_returns_result_for_its_frame() {
        let mut worker = InferenceWorker::spawn(Echo, Duration::from_secs(5)).unwrap();
        for ts in [3, 7] {
            let out = worker.infer(frame(ts)).unwrap();
            assert_eq!(out.tensor.iter().next().copied(), Some(ts as f32));
        }
    }

    #[test]
    fn test_late_result_is_discarded() {
        let mut worker =
            InferenceWorker::spawn(Sleepy(Duration::from_millis(150)), Duration::from_millis(100))
                .unwrap();
        let err = worker.infer(frame(1)).unwrap_err();
        assert!(matches!(err, Error::InferenceTimeout(_)));

        // the first frame's result arrives while this one waits and must not
        // be returned in its place
        worker.timeout = Duration::from_secs(5);
        let out = worker.infer(frame(2)).unwrap();
        assert_eq!(out.tensor.iter().next().copied(), Some(2.0));
    }

    /// Records every frame it infers and holds the first one until released.
    struct Recording {
        inferred: Arc<Mutex<Vec<u64>>>,
        started: Sender<()>,
        release: Receiver<()>,
    }

    impl InferenceBackend for Recording {
        fn infer(&mut self, frame: &FrameInput) -> Result<InferenceOutput> {
            if let Ok(mut inferred) = self.inferred.lock() {
                inferred.push(frame.timestamp_ms);
            }
            if frame.timestamp_ms == 0 {
                let _ = self.started.send(());
                let _ = self.release.recv();
            }
            Echo.infer(frame)
        }
    }

    #[test]
    fn test_abandoned_frames_are_never_inferred() {
        let inferred = Arc::new(Mutex::new(Vec::new()));
        let (started_tx, started_rx) = crossbeam::channel::unbounded();
        let (release_tx, release_rx) = crossbeam::channel::unbounded();
        let backend = Recording {
            inferred: Arc::clone(&inferred),
            started: started_tx,
            release: release_rx,
        };
        let mut worker = InferenceWorker::spawn(backend, Duration::from_millis(200)).unwrap();

        let err = worker.infer(frame(0)).unwrap_err();
        assert!(matches!(err, Error::InferenceTimeout(_)));
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        // the worker is stuck on frame 0 while these all time out
        worker.timeout = Duration::from_millis(10);
        for ts in 1..10 {
            let err = worker.infer(frame(ts)).unwrap_err();
            assert!(matches!(err, Error::InferenceTimeout(_)));
        }

        release_tx.send(()).unwrap();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(*inferred.lock().unwrap(), [0]);

        worker.timeout = Duration::from_secs(5);
        let out = worker.infer(frame(10)).unwrap();
        assert_eq!(out.tensor.iter().next().copied(), Some(10.0));
        assert_eq!(*inferred.lock().unwrap(), [0, 10]);
    }

    #[test]
    fn test_backend_error_is_reported() {
        struct Broken;
        impl InferenceBackend for Broken {
            fn infer(&mut self, _: &FrameInput) -> Result<InferenceOutput> {
                Err(Error::Inference("no model".to_string()))
            }
        }
        let pipeline = FramePipeline::new(SessionConfig::default(), Broken).unwrap();
        assert!(matches!(
            pipeline.process(frame(0)),
            FrameOutcome::Failed(Error::Inference(_))
        ));
    }
}
