use std::io::{self, Write};

use tracing::info;

use crate::types::CycleResult;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("status sink write failed")]
    Sink(#[from] io::Error),
}

/// Observer of completed cycles. Must not feed back into control.
pub trait Reporter {
    fn report(&mut self, cycle: &CycleResult) -> Result<(), ReportError>;
}

impl<R: Reporter + ?Sized> Reporter for Box<R> {
    fn report(&mut self, cycle: &CycleResult) -> Result<(), ReportError> {
        (**self).report(cycle)
    }
}

/// `Temperature: <value> C | Fan: <ON|OFF>`; invalid readings print `--`.
pub fn status_line(cycle: &CycleResult, precision: usize) -> String {
    let fan = cycle.new_state.as_str();
    if cycle.reading.valid {
        format!(
            "Temperature: {:.precision$} C | Fan: {fan}",
            cycle.reading.value_c
        )
    } else {
        format!("Temperature: -- C | Fan: {fan}")
    }
}

#[derive(Debug)]
pub struct WriterReporter<W> {
    sink: W,
    precision: usize,
}

impl<W: Write> WriterReporter<W> {
    pub fn new(sink: W, precision: usize) -> Self {
        Self { sink, precision }
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

impl<W: Write> Reporter for WriterReporter<W> {
    fn report(&mut self, cycle: &CycleResult) -> Result<(), ReportError> {
        writeln!(self.sink, "{}", status_line(cycle, self.precision))?;
        self.sink.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TracingReporter {
    precision: usize,
}

impl TracingReporter {
    pub fn new(precision: usize) -> Self {
        Self { precision }
    }
}

impl Reporter for TracingReporter {
    fn report(&mut self, cycle: &CycleResult) -> Result<(), ReportError> {
        info!(changed = cycle.changed(), "{}", status_line(cycle, self.precision));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActuatorState, Reading};
    use pretty_assertions::assert_eq;

    fn cycle(reading: Reading, new_state: ActuatorState) -> CycleResult {
        CycleResult {
            reading,
            previous_state: ActuatorState::Off,
            new_state,
        }
    }

    #[test]
    fn formats_with_requested_precision() {
        let result = cycle(Reading::valid(27.0), ActuatorState::On);

        assert_eq!(status_line(&result, 2), "Temperature: 27.00 C | Fan: ON");
        assert_eq!(status_line(&result, 1), "Temperature: 27.0 C | Fan: ON");
    }

    #[test]
    fn invalid_reading_hides_value() {
        let result = cycle(Reading::invalid(f32::NAN), ActuatorState::Off);

        assert_eq!(status_line(&result, 2), "Temperature: -- C | Fan: OFF");
    }

    #[test]
    fn writer_reporter_appends_lines_in_order() {
        let mut reporter = WriterReporter::new(Vec::new(), 1);
        reporter
            .report(&cycle(Reading::valid(25.04), ActuatorState::Off))
            .unwrap();
        reporter
            .report(&cycle(Reading::valid(27.96), ActuatorState::On))
            .unwrap();

        let text = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(
            text,
            "Temperature: 25.0 C | Fan: OFF\nTemperature: 28.0 C | Fan: ON\n"
        );
    }

    struct ClosedSink;

    impl Write for ClosedSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn sink_failure_surfaces_as_report_error() {
        let mut reporter = WriterReporter::new(ClosedSink, 2);
        let err = reporter
            .report(&cycle(Reading::valid(25.0), ActuatorState::Off))
            .unwrap_err();

        assert!(matches!(err, ReportError::Sink(_)));
    }
}
