use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::Tone;

/// Progress tracking for the phases of a scan
pub struct PhaseProgress {
    pb: ProgressBar,
}

impl PhaseProgress {
    pub fn start_phase_1() -> Self {
        eprintln!(
            "{}  {}",
            Tone::Heading.paint("⚙️"),
            Tone::Heading.paint("Phases").underlined()
        );
        let pb = create_spinner(
            "  {msg} {spinner}",
            Tone::Pending.paint("Phase 1/3: Connecting to the build store").to_string(),
        );
        Self { pb }
    }

    pub fn finish_phase_1_start_phase_2(self) -> Self {
        self.pb
            .finish_with_message(Tone::Done.paint("Phase 1/3: Build store ready ✓").to_string());
        let pb = create_spinner(
            "  {msg} {spinner} {pos} builds",
            Tone::Pending.paint("Phase 2/3: Harvesting builds").to_string(),
        );
        Self { pb }
    }

    pub fn finish_phase_2_start_phase_3(self) -> Self {
        self.pb
            .finish_with_message(Tone::Done.paint("Phase 2/3: Builds harvested ✓").to_string());
        let pb = create_spinner(
            "  {msg} {spinner}",
            Tone::Pending.paint("Phase 3/3: Writing results").to_string(),
        );
        Self { pb }
    }

    pub fn finish_phase_3(self) {
        self.pb
            .finish_with_message(Tone::Done.paint("Phase 3/3: Results written ✓").to_string());
        eprintln!("\n");
    }

    /// Bar of the running phase, advanced once per harvested build.
    pub fn bar(&self) -> &ProgressBar {
        &self.pb
    }
}

fn create_spinner(template: &str, message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
