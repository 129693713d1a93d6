use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::audio::SampleBuffer;
use crate::error::DecodeError;

/// Turns a media path into PCM. Runs on a blocking worker thread.
pub trait Decode: Send + Sync + 'static {
    fn decode(&self, path: &str) -> Result<SampleBuffer, DecodeError>;
}

pub type Decoded = Result<Arc<SampleBuffer>, DecodeError>;
type DecodeJob = Shared<BoxFuture<'static, Decoded>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryState {
    Pending,
    Resolved,
}

// one shared decode per path: a second resolve while it runs awaits the same
// work, and a failed entry is dropped as soon as it is seen to have failed
pub struct DecodeCache {
    decoder: Arc<dyn Decode>,
    entries: RefCell<HashMap<String, DecodeJob>>,
}

impl DecodeCache {
    pub fn new(decoder: Arc<dyn Decode>) -> Self {
        Self {
            decoder,
            entries: RefCell::new(HashMap::new()),
        }
    }

    /// Decoded buffer for `path`, decoding it if nobody has yet.
    ///
    /// Keys are compared as given; no path normalization happens here.
    pub async fn resolve(&self, path: &str) -> Decoded {
        if path.trim().is_empty() {
            return Err(DecodeError::EmptyPath);
        }
        let job = self.job_for(path);
        let result = job.clone().await;
        if let Err(e) = &result {
            tracing::warn!(path, "decode failed: {e}");
            self.evict_if_same(path, &job);
        }
        result
    }

    /// Start decoding `path` in the background unless it is cached or in
    /// flight. Never waits.
    pub fn preload(&self, path: &str) {
        if path.trim().is_empty() {
            return;
        }
        if self.live_job(path).is_none() {
            tracing::debug!(path, "preloading");
            let job = self.start_decode(path);
            self.entries.borrow_mut().insert(path.to_string(), job);
        }
    }

    /// Preload the first `cap` paths of an already prioritized list.
    pub fn preload_many<I, S>(&self, paths: I, cap: usize)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for path in paths.into_iter().take(cap) {
            self.preload(path.as_ref());
        }
    }

    /// Drop every entry. Sessions already playing keep their own buffers.
    pub fn invalidate(&self) {
        let n = {
            let mut entries = self.entries.borrow_mut();
            let n = entries.len();
            entries.clear();
            n
        };
        tracing::debug!(entries = n, "decode cache cleared");
    }

    /// `None` when the path is absent, or its decode has already failed.
    pub fn entry_state(&self, path: &str) -> Option<EntryState> {
        let job = self.live_job(path)?;
        match job.peek() {
            Some(_) => Some(EntryState::Resolved),
            None => Some(EntryState::Pending),
        }
    }

    /// Entries still decoding or decoded. Failures are swept out first.
    pub fn len(&self) -> usize {
        self.sweep_failed();
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length of an already decoded file, if it is audible. Never starts a
    /// decode: `None` while the path is absent or still in flight.
    pub fn duration_seconds(&self, path: &str) -> Option<f64> {
        let job = self.live_job(path)?;
        let buffer = job.peek()?.as_ref().ok()?;
        let secs = buffer.duration_seconds();
        (secs.is_finite() && secs > 0.0).then_some(secs)
    }

    fn job_for(&self, path: &str) -> DecodeJob {
        if let Some(job) = self.live_job(path) {
            return job;
        }
        let job = self.start_decode(path);
        self.entries
            .borrow_mut()
            .insert(path.to_string(), job.clone());
        job
    }

    /// The cached job for `path`, evicting it first if it is known to have
    /// failed.
    fn live_job(&self, path: &str) -> Option<DecodeJob> {
        let job = self.entries.borrow().get(path).cloned()?;
        // polls once without blocking; finishes the job if the worker is done
        match job.clone().now_or_never() {
            Some(Err(_)) => {
                self.evict_if_same(path, &job);
                None
            }
            _ => Some(job),
        }
    }

    fn sweep_failed(&self) {
        let jobs: Vec<(String, DecodeJob)> = self
            .entries
            .borrow()
            .iter()
            .map(|(path, job)| (path.clone(), job.clone()))
            .collect();
        for (path, job) in jobs {
            if matches!(job.clone().now_or_never(), Some(Err(_))) {
                self.evict_if_same(&path, &job);
            }
        }
    }

    fn evict_if_same(&self, path: &str, job: &DecodeJob) {
        let mut entries = self.entries.borrow_mut();
        // a retry may already have replaced the failed job
        if entries.get(path).is_some_and(|current| current.ptr_eq(job)) {
            entries.remove(path);
        }
    }

    fn start_decode(&self, path: &str) -> DecodeJob {
        let decoder = self.decoder.clone();
        let owned = path.to_string();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                // spawned now so preloads make progress with nobody awaiting
                let worker = handle.spawn_blocking(move || decoder.decode(&owned));
                async move {
                    match worker.await {
                        Ok(result) => result.map(Arc::new),
                        Err(e) => Err(DecodeError::Worker(e.to_string())),
                    }
                }
                .boxed()
                .shared()
            }
            Err(_) => {
                let result = decoder.decode(&owned).map(Arc::new);
                futures::future::ready(result).boxed().shared()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::audio::StereoFrame;

    /// Decoder that hands out constant-level buffers of a configured length and
    /// counts how often it was asked.
    #[derive(Default)]
    pub struct FakeDecoder {
        calls: AtomicUsize,
        lengths: Mutex<HashMap<String, f64>>,
        failures_left: Mutex<HashMap<String, usize>>,
        delays: Mutex<HashMap<String, Duration>>,
    }

    pub const FAKE_RATE: u32 = 1_000;

    impl FakeDecoder {
        pub fn with_file(self, path: &str, seconds: f64) -> Self {
            self.lengths.lock().unwrap().insert(path.to_string(), seconds);
            self
        }

        /// Fail the next `n` decodes of `path`.
        pub fn failing(self, path: &str, n: usize) -> Self {
            self.failures_left.lock().unwrap().insert(path.to_string(), n);
            self
        }

        /// Take `delay` to decode `path`.
        pub fn slow(self, path: &str, delay: Duration) -> Self {
            self.delays.lock().unwrap().insert(path.to_string(), delay);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Decode for FakeDecoder {
        fn decode(&self, path: &str) -> Result<SampleBuffer, DecodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.delays.lock().unwrap().get(path).copied();
            if let Some(delay) = delay {
                std::thread::sleep(delay);
            }
            let mut failures = self.failures_left.lock().unwrap();
            if let Some(left) = failures.get_mut(path).filter(|n| **n > 0) {
                *left -= 1;
                return Err(DecodeError::Probe(format!("{path}: unsupported")));
            }
            let seconds = self.lengths.lock().unwrap().get(path).copied();
            let Some(seconds) = seconds else {
                return Err(DecodeError::Open {
                    path: path.to_string(),
                    reason: "not found".to_string(),
                });
            };
            let frames = (seconds * FAKE_RATE as f64).round() as usize;
            Ok(SampleBuffer::new(
                vec![StereoFrame::mono(0.5); frames],
                FAKE_RATE,
            ))
        }
    }
}
