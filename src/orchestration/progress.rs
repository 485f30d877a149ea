use parking_lot::Mutex;

/// Receives `(completed, total, current_source_ref)` after each item reaches
/// a terminal status. Fire-and-forget: nothing is read back.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, completed: usize, total: usize, current_source_ref: &str);
}

impl<F> ProgressReporter for F
where
    F: Fn(usize, usize, &str) + Send + Sync,
{
    fn report(&self, completed: usize, total: usize, current_source_ref: &str) {
        self(completed, total, current_source_ref)
    }
}

/// Counts finished items for one batch.
///
/// The counter is advanced and reported under one lock, so concurrent items
/// can never deliver a smaller `completed` after a larger one.
pub(crate) struct ProgressTracker<'a> {
    reporter: Option<&'a dyn ProgressReporter>,
    total: usize,
    completed: Mutex<usize>,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(reporter: Option<&'a dyn ProgressReporter>, total: usize) -> Self {
        Self {
            reporter,
            total,
            completed: Mutex::new(0),
        }
    }

    pub(crate) fn advance(&self, source_ref: &str) {
        let mut completed = self.completed.lock();
        *completed += 1;
        if let Some(reporter) = self.reporter {
            reporter.report(*completed, self.total, source_ref);
        }
    }

    #[cfg(test)]
    pub(crate) fn completed(&self) -> usize {
        *self.completed.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_reporter_receives_counts() {
        let seen = Mutex::new(Vec::new());
        let reporter = |completed: usize, total: usize, current: &str| {
            seen.lock().push((completed, total, current.to_string()));
        };

        let tracker = ProgressTracker::new(Some(&reporter), 2);
        tracker.advance("a.jpg");
        tracker.advance("b.jpg");

        assert_eq!(tracker.completed(), 2);
        assert_eq!(
            *seen.lock(),
            vec![(1, 2, "a.jpg".to_string()), (2, 2, "b.jpg".to_string())]
        );
    }

    #[test]
    fn test_tracker_without_reporter_still_counts() {
        let tracker = ProgressTracker::new(None, 1);
        tracker.advance("a.jpg");
        assert_eq!(tracker.completed(), 1);
    }
}
