mod progress;
mod styling;
mod summary;
mod tables;

pub use progress::PhaseProgress;
use styling::Tone;
pub use summary::print_summary;

/// Prints the `OELens` banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        Tone::Brand.paint("🔍 OELens"),
        Tone::Muted.paint(env!("CARGO_PKG_VERSION")),
        Tone::Muted.paint("Yocto build metrics harvester")
    );
}
