//! Request pacing: a global sliding-window limit plus adaptive per-domain spacing.
//!
//! Start times are reserved atomically, so two jobs that ask at the same
//! moment get distinct, correctly spaced slots instead of both waiting the
//! same amount and firing together.

use std::collections::{HashMap, VecDeque};

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, info};

const WINDOW: Duration = Duration::from_secs(60);

/// Adaptive spacing state for one domain.
#[derive(Debug, Clone)]
pub struct DomainPacing {
    /// Current minimum spacing between request starts.
    pub delay: Duration,
    /// Last reserved start for this domain.
    pub last_start: Option<Instant>,
}

#[derive(Debug)]
struct PacerState {
    /// Reserved start times inside the window, ascending.
    starts: VecDeque<Instant>,
    domains: HashMap<String, DomainPacing>,
}

/// Shared request pacer.
#[derive(Debug)]
pub struct RequestPacer {
    capacity: usize,
    floor: Duration,
    ceiling: Duration,
    state: Mutex<PacerState>,
}

impl RequestPacer {
    /// Create a pacer allowing `requests_per_minute` starts per rolling minute.
    ///
    /// Domain delays start at `floor`, shrink toward it on success and grow
    /// up to `ceiling` on throttling.
    pub fn new(requests_per_minute: u32, floor: Duration, ceiling: Duration) -> Self {
        Self {
            capacity: requests_per_minute.max(1) as usize,
            floor,
            ceiling: ceiling.max(floor),
            state: Mutex::new(PacerState {
                starts: VecDeque::new(),
                domains: HashMap::new(),
            }),
        }
    }

    /// Reserve the next start slot for `domain`, returning how long to wait.
    pub async fn reserve(&self, domain: &str) -> Duration {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let now = Instant::now();

        while let Some(&oldest) = state.starts.front() {
            if oldest + WINDOW <= now {
                state.starts.pop_front();
            } else {
                break;
            }
        }

        let floor = self.floor;
        let pacing = state
            .domains
            .entry(domain.to_string())
            .or_insert_with(|| DomainPacing {
                delay: floor,
                last_start: None,
            });

        let mut start = now;
        if let Some(last) = pacing.last_start {
            start = start.max(last + pacing.delay);
        }
        if let Some(&latest) = state.starts.back() {
            start = start.max(latest);
        }

        // Reservations still inside the window at `start`.
        let in_window = state
            .starts
            .iter()
            .filter(|&&s| s + WINDOW > start)
            .count();
        if in_window >= self.capacity {
            let len = state.starts.len();
            let blocking = state.starts[len - self.capacity];
            start = start.max(blocking + WINDOW);
            info!(
                "Rate limit reached ({} starts/min), waiting {}s",
                self.capacity,
                (start - now).as_secs()
            );
        }

        state.starts.push_back(start);
        pacing.last_start = Some(start);

        start.saturating_duration_since(now)
    }

    /// Shrink the domain delay toward the floor.
    pub async fn record_success(&self, domain: &str) {
        let mut state = self.state.lock().await;
        if let Some(pacing) = state.domains.get_mut(domain) {
            pacing.delay = pacing.delay.mul_f64(0.9).max(self.floor);
        }
    }

    /// Widen the domain delay after a throttling response.
    pub async fn record_throttle(&self, domain: &str) {
        let mut state = self.state.lock().await;
        let floor = self.floor;
        let pacing = state
            .domains
            .entry(domain.to_string())
            .or_insert_with(|| DomainPacing {
                delay: floor,
                last_start: None,
            });
        pacing.delay = pacing.delay.mul_f64(1.5).min(self.ceiling);
        info!(
            "Increased delay for {} to {}ms",
            domain,
            pacing.delay.as_millis()
        );
    }

    /// Current pacing for a domain, if it has been seen.
    pub async fn domain(&self, domain: &str) -> Option<DomainPacing> {
        self.state.lock().await.domains.get(domain).cloned()
    }

    /// Starts reserved within the last minute.
    pub async fn requests_in_window(&self) -> usize {
        let state = self.state.lock().await;
        let now = Instant::now();
        let in_window = state
            .starts
            .iter()
            .filter(|&&s| s + WINDOW > now && s <= now)
            .count();
        debug!("{} request starts in the current window", in_window);
        in_window
    }
}
