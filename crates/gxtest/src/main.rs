mod cases;
mod cli;
mod report;

use std::io;

use cgx::Gx;
use cgx::soft::SoftGpu;
use clap::Parser;
use eyre_pretty::eyre::{Result, bail};
use tracing::info;

use crate::cases::{CASES, Output};
use crate::report::Reporter;

fn setup_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, fmt};

    let stderr_layer = fmt::layer().with_writer(io::stderr);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gxtest=debug,cgx=debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(env_filter)
        .init();
}

fn main() -> Result<()> {
    eyre_pretty::install()?;
    setup_tracing();
    let cfg = cli::Config::parse();

    let out: Output = if cfg.stdout {
        Box::new(io::stdout())
    } else {
        Box::new(report::accept(cfg.port)?)
    };

    let mut reporter = Reporter::new(out);
    let mut gx = Gx::init(SoftGpu::new());

    let selected = CASES.iter().filter(|case| {
        cfg.filter
            .as_deref()
            .is_none_or(|filter| case.name.contains(filter))
    });

    for case in selected {
        info!("running {}", case.name);
        (case.run)(&mut gx, &mut reporter)?;
    }
    reporter.flush()?;

    let (tests, failed) = (reporter.tests(), reporter.failed_tests());
    info!("{tests} tests run, {failed} failed");
    if failed > 0 {
        bail!("{failed} of {tests} tests failed");
    }

    Ok(())
}
