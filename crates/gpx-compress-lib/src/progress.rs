//! Progress reporting for long-running searches

/// Observational progress callback
///
/// Implementations must not influence the search: there is no return value and
/// delivery may be asynchronous or dropped entirely.
pub trait ProgressSink {
    /// Report `percent` (0..=100) completion with a human-readable status
    fn report(&mut self, percent: u8, message: &str);
}

/// Sink that discards every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    #[inline]
    fn report(&mut self, _percent: u8, _message: &str) {}
}

impl<F> ProgressSink for F
where
    F: FnMut(u8, &str),
{
    #[inline]
    fn report(&mut self, percent: u8, message: &str) {
        self(percent, message)
    }
}

/// Wraps a sink so the reported percentage never goes backwards
pub(crate) struct MonotonicProgress<'a> {
    sink: &'a mut dyn ProgressSink,
    last: u8,
}

impl<'a> MonotonicProgress<'a> {
    pub(crate) fn new(sink: &'a mut dyn ProgressSink) -> Self {
        Self { sink, last: 0 }
    }

    pub(crate) fn report(&mut self, percent: u8, message: &str) {
        self.last = self.last.max(percent.min(100));
        self.sink.report(self.last, message);
    }
}

/// Format a byte count as B, KB (one decimal) or MB (two decimals)
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * 1024;
    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = |p: u8, m: &str| seen.push((p, m.to_string()));
            sink.report(10, "hello");
        }
        assert_eq!(seen, vec![(10, "hello".to_string())]);
    }

    #[test]
    fn test_monotonic_progress_never_decreases() {
        let mut seen = Vec::new();
        let mut sink = |p: u8, _: &str| seen.push(p);
        {
            let mut progress = MonotonicProgress::new(&mut sink);
            for p in [10, 40, 30, 90, 20, 150] {
                progress.report(p, "step");
            }
        }
        assert_eq!(seen, vec![10, 40, 40, 90, 90, 100]);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }
}
