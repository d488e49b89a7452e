//! A minimal `print` sink (supplementary to the distilled spec; see
//! `DESIGN.md`), kept deliberately tiny since real host I/O is out of scope
//! (spec §1's "no host filesystem dependency" stance, shared by `resource.rs`).
//!
//! Grounded on `io::{PrintWriter, StdPrint, CollectStringPrint, NoPrint}` in
//! the teacher, stripped of the Python-specific stdout/stderr redirect-stack
//! machinery: this crate only needs a sink the `print` native can write a
//! line to and a test can later inspect, not a full interpreter-wide stream
//! redirection stack.

/// Where `print` sends its output.
pub trait PrintSink: std::fmt::Debug {
    fn print_line(&mut self, text: &str);
}

/// Discards everything written to it (the crate's default sink).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrint;

impl PrintSink for NoPrint {
    fn print_line(&mut self, _text: &str) {}
}

/// Collects every printed line into a `Vec<String>`, in order, so tests can
/// assert on what `print` wrote without capturing real stdout.
#[derive(Debug, Default)]
pub struct CollectPrint {
    lines: Vec<String>,
}

impl CollectPrint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl PrintSink for CollectPrint {
    fn print_line(&mut self, text: &str) {
        self.lines.push(text.to_string());
    }
}

/// Writes to the process's real standard output. Used by `revolt-cli`; never
/// by library tests (`CollectPrint` gives deterministic assertions instead).
#[derive(Debug, Clone, Copy, Default)]
pub struct StdPrint;

impl PrintSink for StdPrint {
    fn print_line(&mut self, text: &str) {
        println!("{text}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn no_print_discards_everything() {
        let mut sink = NoPrint;
        sink.print_line("whatever");
        // Nothing to inspect; the point is that this doesn't panic or retain.
    }

    #[test]
    fn collect_print_keeps_lines_in_order() {
        let mut sink = CollectPrint::new();
        sink.print_line("first");
        sink.print_line("second");
        assert_eq!(sink.lines(), ["first", "second"]);
    }
}
