//! Progress reporting capability supplied by callers

/// Receives `(processed, total)` after each unit of work completes
pub trait ProgressSink: Send + Sync {
    fn report(&self, processed: usize, total: usize);
}

impl<F> ProgressSink for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn report(&self, processed: usize, total: usize) {
        self(processed, total)
    }
}

/// Sink that discards every report
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _processed: usize, _total: usize) {}
}

/// Maps a stage's `(processed, total)` into a band of an outer 0-100 scale
///
/// The outer sink receives `(percent, 100)`.
pub struct ScaledProgress<'a> {
    inner: &'a dyn ProgressSink,
    start: usize,
    span: usize,
}

impl<'a> ScaledProgress<'a> {
    pub fn new(inner: &'a dyn ProgressSink, start: usize, span: usize) -> Self {
        Self { inner, start, span }
    }

    pub fn percent(&self, processed: usize, total: usize) -> usize {
        if total == 0 {
            return (self.start + self.span).min(100);
        }
        let done = processed.min(total);
        (self.start + self.span * done / total).min(100)
    }
}

impl ProgressSink for ScaledProgress<'_> {
    fn report(&self, processed: usize, total: usize) {
        self.inner.report(self.percent(processed, total), 100);
    }
}
