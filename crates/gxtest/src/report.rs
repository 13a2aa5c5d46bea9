//! Test bookkeeping and the text report sent to the client.
use std::fmt;
use std::io::{self, Write};
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use easyerr::{Error, ResultExt};
use tracing::{info, warn};

/// Port the report client connects to.
pub const PORT: u16 = 16784;

/// How many times binding the report port is attempted.
const BIND_ATTEMPTS: u32 = 20;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("could not bind the report port")]
    Bind { source: io::Error },
    #[error("could not accept a report client")]
    Accept { source: io::Error },
    #[error("could not send the report")]
    Send { source: io::Error },
}

/// Waits for a report client on `port`.
pub fn accept(port: u16) -> Result<TcpStream, ReportError> {
    let mut attempt = 1;
    let listener = loop {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)) {
            Ok(listener) => break listener,
            Err(e) if attempt < BIND_ATTEMPTS => {
                warn!("binding port {port} failed ({e}), retrying");
                attempt += 1;
                thread::sleep(Duration::from_millis(250));
            }
            Err(e) => return Err(e).context(ReportCtx::Bind),
        }
    };

    info!("waiting for a report client on port {port}");
    let (stream, peer) = listener.accept().context(ReportCtx::Accept)?;
    info!("report client {peer} connected");

    Ok(stream)
}

#[derive(Debug, Clone, Copy, Default)]
struct Status {
    passes: u32,
    failures: u32,
    subtests: u32,
    file: &'static str,
    line: u32,
}

/// Tracks the running test and writes the report lines.
pub struct Reporter<W> {
    out: W,
    tests: u32,
    failed_tests: u32,
    status: Status,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            tests: 0,
            failed_tests: 0,
            status: Status::default(),
        }
    }

    fn send(&mut self, args: fmt::Arguments<'_>) -> Result<(), ReportError> {
        self.out.write_fmt(args).context(ReportCtx::Send)
    }

    /// Starts a new test. Use `start_test!`.
    pub fn start(&mut self, file: &'static str, line: u32) {
        self.tests += 1;
        self.status = Status {
            file,
            line,
            ..Default::default()
        };
    }

    /// Records a subtest. Use `check!`.
    pub fn check(
        &mut self,
        condition: bool,
        file: &'static str,
        line: u32,
        message: fmt::Arguments<'_>,
    ) -> Result<bool, ReportError> {
        self.status.subtests += 1;
        if condition {
            self.status.passes += 1;
            return Ok(true);
        }

        self.status.failures += 1;
        let subtest = self.status.subtests;
        self.send(format_args!(
            "Subtest {subtest} failed in {file} on line {line}: {message}\n"
        ))?;

        Ok(false)
    }

    /// Ends the current test and reports its outcome. Use `end_test!`.
    pub fn end(&mut self) -> Result<(), ReportError> {
        let Status {
            failures,
            subtests,
            file,
            line,
            ..
        } = self.status;
        let test = self.tests;

        tracing::debug!("test {test} started at {file}:{line} finished");
        if failures == 0 {
            self.send(format_args!("Test {test} passed ({subtests} subtests)\n"))
        } else {
            self.failed_tests += 1;
            self.send(format_args!(
                "Test {test} failed ({subtests} subtests, {failures} failures)\n"
            ))
        }
    }

    pub fn tests(&self) -> u32 {
        self.tests
    }

    pub fn failed_tests(&self) -> u32 {
        self.failed_tests
    }

    pub fn flush(&mut self) -> Result<(), ReportError> {
        self.out.flush().context(ReportCtx::Send)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

macro_rules! start_test {
    ($reporter:expr) => {
        $reporter.start(file!(), line!())
    };
}

macro_rules! check {
    ($reporter:expr, $condition:expr, $($message:tt)+) => {
        $reporter.check($condition, file!(), line!(), format_args!($($message)+))?
    };
}

macro_rules! end_test {
    ($reporter:expr) => {
        $reporter.end()?
    };
}

pub(crate) use {check, end_test, start_test};

#[cfg(test)]
mod test {
    use super::*;

    fn run(reporter: &mut Reporter<Vec<u8>>) -> Result<(), ReportError> {
        start_test!(reporter);
        check!(reporter, 1 + 1 == 2, "math");
        check!(reporter, true, "still fine");
        end_test!(reporter);

        start_test!(reporter);
        check!(reporter, true, "fine");
        let line = line!() + 1;
        let passed = check!(reporter, 2 < 1, "expected {} to be below {}", 2, 1);
        assert!(!passed);
        end_test!(reporter);

        assert_eq!(reporter.tests(), 2);
        assert_eq!(reporter.failed_tests(), 1);
        let report = String::from_utf8(reporter.out.clone()).unwrap();
        assert!(report.contains(&format!(
            "Subtest 2 failed in {} on line {line}: expected 2 to be below 1\n",
            file!()
        )));

        Ok(())
    }

    #[test]
    fn report_lines() {
        let mut reporter = Reporter::new(Vec::new());
        run(&mut reporter).unwrap();

        let report = String::from_utf8(reporter.into_inner()).unwrap();
        let lines = report.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "Test 1 passed (2 subtests)");
        assert!(lines[1].starts_with("Subtest 2 failed in "));
        assert_eq!(lines[2], "Test 2 failed (2 subtests, 1 failures)");
        assert_eq!(lines.len(), 3);
    }
}
