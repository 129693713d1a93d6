use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::runner::CueRunner;
use crate::shared::CueId;

// No free-running timer: the deadline is re-armed only while something plays.
pub struct ProgressPoller {
    interval: Duration,
    next_due: Option<Instant>,
    snapshot: BTreeMap<CueId, f64>,
}

impl ProgressPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            next_due: None,
            snapshot: BTreeMap::new(),
        }
    }

    /// Schedule a tick if none is pending. Arming twice keeps the earlier
    /// deadline.
    pub fn arm(&mut self) {
        if self.next_due.is_none() {
            self.next_due = Some(Instant::now() + self.interval);
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.next_due
    }

    /// Pull engine completions, retire finished sessions and publish fresh
    /// per-cue progress. Re-arms only if the runner still has live sessions.
    pub fn tick(&mut self, runner: &mut CueRunner) -> &BTreeMap<CueId, f64> {
        runner.pump_voice_events();
        self.snapshot = runner.retire_and_snapshot();
        self.next_due = runner
            .has_live_sessions()
            .then(|| Instant::now() + self.interval);
        &self.snapshot
    }

    pub fn snapshot(&self) -> &BTreeMap<CueId, f64> {
        &self.snapshot
    }

    pub fn progress(&self, cue: &CueId) -> Option<f64> {
        self.snapshot.get(cue).copied()
    }

    /// Drop one cue from the published snapshot (it was just stopped).
    pub fn forget(&mut self, cue: &CueId) {
        self.snapshot.remove(cue);
    }

    pub fn clear(&mut self) {
        self.snapshot.clear();
        self.next_due = None;
    }
}

/// Resolves at `deadline`, or never when there is none.
pub async fn sleep_until_due(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use std::sync::Arc;

    use super::*;
    use crate::audio::testing::context;
    use crate::cache::DecodeCache;
    use crate::cache::testing::FakeDecoder;
    use crate::runner::Launch;
    use crate::show::tone_test_show;

    fn runner() -> CueRunner {
        let cache = Rc::new(DecodeCache::new(Arc::new(FakeDecoder::default())));
        CueRunner::new(tone_test_show(), cache, context(), 1.0)
    }

    fn render(runner: &CueRunner, seconds: f64) {
        runner.output().get().unwrap().render(seconds);
    }

    #[test]
    fn idle_until_armed() {
        let mut poller = ProgressPoller::new(Duration::from_millis(16));
        assert!(poller.deadline().is_none());
        poller.arm();
        let first = poller.deadline();
        poller.arm();
        assert_eq!(poller.deadline(), first);
        poller.clear();
        assert!(poller.deadline().is_none());
    }

    #[tokio::test]
    async fn rearms_while_playing_and_stops_when_done() {
        let mut runner = runner();
        let mut poller = ProgressPoller::new(Duration::from_millis(16));

        assert!(matches!(runner.go(), Launch::Started(_)));
        poller.arm();
        render(&runner, 0.25);
        let snap = poller.tick(&mut runner).clone();
        assert!((snap[&CueId::new("t1")] - 0.25).abs() < 1e-6);
        assert!(poller.deadline().is_some());

        render(&runner, 1.0);
        assert!(poller.tick(&mut runner).is_empty());
        assert!(poller.deadline().is_none());
        assert_eq!(poller.progress(&CueId::new("t1")), None);
    }

    #[tokio::test]
    async fn reports_the_furthest_session_per_cue() {
        let mut runner = runner();
        let mut poller = ProgressPoller::new(Duration::from_millis(16));

        assert!(matches!(runner.go(), Launch::Started(_)));
        render(&runner, 0.5);
        runner.select(&CueId::new("t1"));
        assert!(matches!(runner.go(), Launch::Started(_)));
        render(&runner, 0.1);

        poller.tick(&mut runner);
        let p = poller.progress(&CueId::new("t1")).unwrap();
        assert!((p - 0.6).abs() < 1e-6);
    }

    #[tokio::test]
    async fn sleeps_only_with_a_deadline() {
        let soon = Instant::now() + Duration::from_millis(5);
        tokio::time::timeout(Duration::from_secs(1), sleep_until_due(Some(soon)))
            .await
            .unwrap();

        let never = tokio::time::timeout(Duration::from_millis(20), sleep_until_due(None)).await;
        assert!(never.is_err());
    }
}
