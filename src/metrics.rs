use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Operational counters for monitoring
#[derive(Clone)]
pub struct Metrics {
    pub users_registered: Arc<AtomicUsize>,
    pub logins: Arc<AtomicUsize>,
    pub auth_failures: Arc<AtomicUsize>,
    pub books_created: Arc<AtomicUsize>,
    pub borrows_created: Arc<AtomicU64>,
    pub borrows_returned: Arc<AtomicU64>,
    pub borrow_conflicts: Arc<AtomicU64>,
    pub reviews_created: Arc<AtomicUsize>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            users_registered: Arc::new(AtomicUsize::new(0)),
            logins: Arc::new(AtomicUsize::new(0)),
            auth_failures: Arc::new(AtomicUsize::new(0)),
            books_created: Arc::new(AtomicUsize::new(0)),
            borrows_created: Arc::new(AtomicU64::new(0)),
            borrows_returned: Arc::new(AtomicU64::new(0)),
            borrow_conflicts: Arc::new(AtomicU64::new(0)),
            reviews_created: Arc::new(AtomicUsize::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_users_registered(&self) {
        self.users_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_logins(&self) {
        self.logins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_auth_failures(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_books_created(&self) {
        self.books_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_borrows_created(&self) {
        self.borrows_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_borrows_returned(&self) {
        self.borrows_returned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_borrow_conflicts(&self) {
        self.borrow_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reviews_created(&self) {
        self.reviews_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            users_registered: self.users_registered.load(Ordering::Relaxed),
            logins: self.logins.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            books_created: self.books_created.load(Ordering::Relaxed),
            borrows_created: self.borrows_created.load(Ordering::Relaxed),
            borrows_returned: self.borrows_returned.load(Ordering::Relaxed),
            borrow_conflicts: self.borrow_conflicts.load(Ordering::Relaxed),
            reviews_created: self.reviews_created.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub users_registered: usize,
    pub logins: usize,
    pub auth_failures: usize,
    pub books_created: usize,
    pub borrows_created: u64,
    pub borrows_returned: u64,
    pub borrow_conflicts: u64,
    pub reviews_created: usize,
    pub uptime_seconds: u64,
}
