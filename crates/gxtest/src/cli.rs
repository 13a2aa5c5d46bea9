use clap::Parser;

use crate::report;

/// gxtest: GX hardware conformance runner
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Port to accept the report client on
    #[arg(short, long, default_value_t = report::PORT)]
    pub port: u16,
    /// Whether to write the report to stdout instead of sending it to a client
    #[arg(long, default_value_t = false)]
    pub stdout: bool,
    /// Only run the cases whose name contains this string
    #[arg(short, long)]
    pub filter: Option<String>,
}
