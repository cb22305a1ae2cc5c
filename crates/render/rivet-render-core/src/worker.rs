//! A named thread that owns frame production.
//!
//! The worker drains a job queue and, while ticking, calls its frame
//! callback once per frame interval with the seconds elapsed since the
//! previous frame. The first frame after ticking resumes reports zero.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{RenderError, Result};

pub type FrameCallback = Box<dyn FnMut(f32) + Send>;
type Job = Box<dyn FnOnce() + Send>;

enum Message {
    Job(Job),
    SetFrame(Option<FrameCallback>),
    Wake,
    Terminate,
}

pub struct WorkerThread {
    name: String,
    sender: Mutex<Option<Sender<Message>>>,
    join: Mutex<Option<JoinHandle<()>>>,
    /// Panic message of a worker that died, kept for later callers.
    panic: Mutex<Option<String>>,
    ticking: Arc<AtomicBool>,
    thread_id: ThreadId,
}

impl WorkerThread {
    pub fn spawn(name: &str, interval: Duration) -> Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let ticking = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ticking);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_loop(receiver, flag, interval))
            .map_err(|err| RenderError::WorkerSpawn {
                message: err.to_string(),
            })?;
        log::debug!("render worker '{name}' started ({interval:?} per frame)");
        Ok(Self {
            name: name.to_string(),
            thread_id: handle.thread().id(),
            sender: Mutex::new(Some(sender)),
            join: Mutex::new(Some(handle)),
            panic: Mutex::new(None),
            ticking,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    pub fn is_terminated(&self) -> bool {
        self.sender.lock().is_none()
    }

    pub fn is_ticking(&self) -> bool {
        self.ticking.load(Ordering::Acquire)
    }

    /// Starts or stops frame ticks. Harmless after termination.
    pub fn set_ticking(&self, ticking: bool) {
        let previous = self.ticking.swap(ticking, Ordering::AcqRel);
        if previous != ticking && self.send(Message::Wake).is_err() {
            log::debug!("ticking change ignored; worker '{}' is gone", self.name);
        }
    }

    pub fn set_frame_callback(&self, callback: Option<FrameCallback>) -> Result<()> {
        self.send(Message::SetFrame(callback))
    }

    /// Queues `job` behind everything already submitted.
    pub fn run(&self, job: impl FnOnce() + Send + 'static) -> Result<()> {
        self.send(Message::Job(Box::new(job)))
    }

    /// Runs `job` on the worker and blocks until it returns. Called from the
    /// worker itself, the job runs inline.
    pub fn run_and_wait<R, F>(&self, job: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if self.is_worker_thread() {
            return Ok(job());
        }
        let (reply, result) = mpsc::channel();
        self.run(move || {
            let _ = reply.send(job());
        })?;
        match result.recv() {
            Ok(value) => Ok(value),
            // The reply sender was dropped unsent: the job panicked or the
            // worker exited before reaching it.
            Err(_) => Err(self.reap()),
        }
    }

    /// Blocks until every job queued so far has run.
    pub fn wait_until_complete(&self) -> Result<()> {
        self.run_and_wait(|| ())
    }

    /// Stops the worker and joins it. Jobs still queued are dropped. From
    /// the worker thread itself the join is skipped.
    pub fn terminate(&self) -> Result<()> {
        self.ticking.store(false, Ordering::Release);
        if let Some(sender) = self.sender.lock().take() {
            let _ = sender.send(Message::Terminate);
        }
        if self.is_worker_thread() {
            return Ok(());
        }
        self.join_worker();
        match self.panic.lock().clone() {
            Some(message) => Err(RenderError::WorkerPanicked { message }),
            None => Ok(()),
        }
    }

    fn send(&self, message: Message) -> Result<()> {
        let failed = {
            let sender = self.sender.lock();
            match sender.as_ref() {
                None => return Err(RenderError::WorkerTerminated),
                Some(sender) => sender.send(message).is_err(),
            }
        };
        if failed {
            return Err(self.reap());
        }
        Ok(())
    }

    /// Marks a worker that exited on its own as terminated and reports why.
    fn reap(&self) -> RenderError {
        self.sender.lock().take();
        self.ticking.store(false, Ordering::Release);
        if !self.is_worker_thread() {
            self.join_worker();
        }
        match self.panic.lock().clone() {
            Some(message) => RenderError::WorkerPanicked { message },
            None => RenderError::WorkerTerminated,
        }
    }

    fn join_worker(&self) {
        let Some(handle) = self.join.lock().take() else {
            return;
        };
        if let Err(payload) = handle.join() {
            let message = panic_message(payload.as_ref());
            log::error!("render worker '{}' panicked: {message}", self.name);
            *self.panic.lock() = Some(message);
        } else {
            log::debug!("render worker '{}' joined", self.name);
        }
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        if let Err(err) = self.terminate() {
            log::warn!("render worker '{}' ended badly: {err}", self.name);
        }
    }
}

impl std::fmt::Debug for WorkerThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerThread")
            .field("name", &self.name)
            .field("ticking", &self.is_ticking())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn run_loop(receiver: Receiver<Message>, ticking: Arc<AtomicBool>, interval: Duration) {
    let mut frame: Option<FrameCallback> = None;
    let mut last_frame: Option<Instant> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        let message = if ticking.load(Ordering::Acquire) && frame.is_some() {
            let due = *deadline.get_or_insert_with(Instant::now);
            let now = Instant::now();
            if due <= now {
                None
            } else {
                match receiver.recv_timeout(due - now) {
                    Ok(message) => Some(message),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            }
        } else {
            last_frame = None;
            deadline = None;
            match receiver.recv() {
                Ok(message) => Some(message),
                Err(_) => return,
            }
        };

        match message {
            Some(Message::Job(job)) => job(),
            Some(Message::SetFrame(callback)) => frame = callback,
            Some(Message::Wake) => {}
            Some(Message::Terminate) => return,
            None => {
                let now = Instant::now();
                let elapsed = last_frame.map_or(0.0, |last| now.duration_since(last).as_secs_f32());
                last_frame = Some(now);
                deadline = Some(now + interval);
                if let Some(callback) = frame.as_mut() {
                    callback(elapsed);
                }
            }
        }
    }
}
