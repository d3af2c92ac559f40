//! Synchronous progress reporting.
//!
//! Callbacks receive a human-readable label and a percentage in `0..=100`.
//! They run on the patching thread and must not block.

/// Stage of a single-artifact patch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Preparing,
    Reading,
    Rewriting,
    Writing,
    Complete,
}

impl Stage {
    /// Percentage reported when the stage starts.
    pub const fn percent(self) -> u8 {
        match self {
            Stage::Preparing => 10,
            Stage::Reading => 20,
            Stage::Rewriting => 50,
            Stage::Writing => 80,
            Stage::Complete => 100,
        }
    }
}

/// Wraps a callback so reported percentages never go backwards.
pub struct Progress<'a> {
    callback: &'a mut dyn FnMut(&str, u8),
    last: u8,
}

impl<'a> Progress<'a> {
    pub fn new(callback: &'a mut dyn FnMut(&str, u8)) -> Self {
        Self { callback, last: 0 }
    }

    pub fn report(&mut self, message: &str, percent: u8) {
        let percent = percent.min(100).max(self.last);
        self.last = percent;
        (self.callback)(message, percent);
    }

    /// Report a child task's `0..=100` progress into `start..=end`, with
    /// `prefix` prepended to its labels.
    pub fn scoped<'s>(&'s mut self, prefix: &'s str, start: u8, end: u8) -> Scoped<'s, 'a> {
        Scoped {
            parent: self,
            prefix,
            start,
            end: end.max(start),
        }
    }
}

/// A sub-range of a [`Progress`].
pub struct Scoped<'s, 'a> {
    parent: &'s mut Progress<'a>,
    prefix: &'s str,
    start: u8,
    end: u8,
}

impl Scoped<'_, '_> {
    pub fn report(&mut self, message: &str, percent: u8) {
        let span = u32::from(self.end - self.start);
        let scaled = u32::from(self.start) + span * u32::from(percent.min(100)) / 100;
        let label = format!("{}{}", self.prefix, message);
        // scaled <= end <= 255
        self.parent.report(&label, scaled as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentages_are_monotonic() {
        let mut seen = Vec::new();
        let mut callback = |_: &str, pct: u8| seen.push(pct);
        let mut progress = Progress::new(&mut callback);

        progress.report("a", 30);
        progress.report("b", 10);
        progress.report("c", 150);
        drop(progress);

        assert_eq!(seen, vec![30, 30, 100]);
    }

    #[test]
    fn test_scoped_maps_into_range() {
        let mut seen = Vec::new();
        let mut callback = |msg: &str, pct: u8| seen.push((msg.to_string(), pct));
        let mut progress = Progress::new(&mut callback);

        {
            let mut client = progress.scoped("Client: ", 0, 45);
            client.report("Patching domain references...", Stage::Rewriting.percent());
            client.report("Patching complete", Stage::Complete.percent());
        }
        progress.scoped("Server: ", 45, 90).report("Opening server JAR...", 20);
        drop(progress);

        assert_eq!(
            seen,
            vec![
                ("Client: Patching domain references...".to_string(), 22),
                ("Client: Patching complete".to_string(), 45),
                ("Server: Opening server JAR...".to_string(), 54),
            ]
        );
    }
}
