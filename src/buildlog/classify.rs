//! Line classification for Yocto/OpenEmbedded build logs.
//!
//! Every log line is split into whitespace-delimited tokens and tested against
//! a fixed, ordered table of classifiers. The first classifier that recognizes
//! the line decides its [`LineKind`]; lines nobody recognizes are
//! [`LineKind::Unrecognized`] and carry no data.

/// Build-configuration keys that bitbake prints at the top of every build.
///
/// ```text
/// BB_VERSION           = "1.40.0"
/// TARGET_SYS           = "arm-starfish-linux-gnueabi"
/// TUNE_FEATURES        = "arm armv7a vfp thumb neon cortexa9"
/// ```
pub const IDENTITY_KEYS: [&str; 19] = [
    "BB_VERSION",
    "BUILD_SYS",
    "DATETIME",
    "DISTRO",
    "DISTRO_VERSION",
    "MACHINE",
    "NATIVELSBSTRING",
    "TARGET_FPU",
    "TARGET_SYS",
    "TUNE_FEATURES",
    "WEBOS_DISTRO_BUILD_ID",
    "WEBOS_DISTRO_MANUFACTURING_VERSION",
    "WEBOS_DISTRO_RELEASE_CODENAME",
    "WEBOS_DISTRO_TOPDIR_DESCRIBE",
    "WEBOS_DISTRO_TOPDIR_REVISION",
    "WEBOS_ENCRYPTION_KEY_TYPE",
    "meta",
    "meta-qt5",
    "meta-starfish-product",
];

/// The one identity key whose value is itself a space-separated list.
pub const TUNE_FEATURES: &str = "TUNE_FEATURES";

const NOTE_SENTINEL: &str = "NOTE:";
const TIME_SENTINEL: &str = "TIME:";

// Token layout of the sstate summary:
// NOTE: do_populate_lic: 54.8% sstate reuse (125 setscene, 103 scratch)
const SCRATCH_COUNT_TOKEN: usize = 7;

// Token layout of `TIME:` lines written by the build wrapper.
const ELAPSED_TOKEN: usize = 2;
const BITBAKE_ELAPSED_TOKEN: usize = 1;
const BITBAKE_TOKEN: usize = 11;
const COMMAND_TOKEN: usize = 12;
const ARGUMENT_TOKEN: usize = 13;
const TARGET_TOKEN: usize = 14;
const ARTIFACTS_TOKEN: usize = 17;

const ARTIFACTS_DIR: &str = "BUILD-ARTIFACTS";

/// A timed sub-step of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// The top-level `build.sh` invocation, local or over ssh.
    BuildScript,
    Bitbake,
    RsyncArtifacts,
    RemoveBuild,
    RemoveBuildArtifacts,
    RemoveDownloads,
    RemoveSstate,
}

impl Phase {
    /// Name of the metric this phase's duration is stored under.
    pub const fn metric(self) -> &'static str {
        match self {
            Self::BuildScript => "time_build_sh",
            Self::Bitbake => "time_bitbake",
            Self::RsyncArtifacts => "time_rsync_artifacts",
            Self::RemoveBuild => "time_rm_BUILD",
            Self::RemoveBuildArtifacts => "time_rm_BUILD_ARTIFACTS",
            Self::RemoveDownloads => "time_rm_downloads",
            Self::RemoveSstate => "time_rm_sstate",
        }
    }
}

/// What a single log line means for metric extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// `KEY = "value"` declaration of a build identity key.
    Identity { key: &'static str, value: String },
    /// Number of tasks run from scratch instead of restored from sstate.
    ScratchCount(&'a str),
    /// Elapsed time of a tracked phase.
    PhaseTiming { phase: Phase, duration: &'a str },
    /// Link to the external build report.
    ReportUrl(&'a str),
    Unrecognized,
}

type Classifier = for<'a> fn(&'a str, &[&'a str]) -> Option<LineKind<'a>>;

/// Classifiers in priority order.
static CLASSIFIERS: [Classifier; 4] = [
    classify_identity,
    classify_scratch_count,
    classify_phase_timing,
    classify_report_url,
];

struct PhaseRule {
    min_tokens: usize,
    resolve: fn(&[&str]) -> Option<Phase>,
    elapsed_token: usize,
}

/// `TIME:` rules in priority order.
static PHASE_RULES: [PhaseRule; 6] = [
    PhaseRule {
        min_tokens: 19,
        resolve: rsync_artifacts,
        elapsed_token: ELAPSED_TOKEN,
    },
    PhaseRule {
        min_tokens: 19,
        resolve: remote_rsync_artifacts,
        elapsed_token: ELAPSED_TOKEN,
    },
    PhaseRule {
        min_tokens: 15,
        resolve: remove_directory,
        elapsed_token: ELAPSED_TOKEN,
    },
    PhaseRule {
        min_tokens: 19,
        resolve: build_script,
        elapsed_token: ELAPSED_TOKEN,
    },
    PhaseRule {
        min_tokens: 19,
        resolve: remote_build_script,
        elapsed_token: ELAPSED_TOKEN,
    },
    PhaseRule {
        min_tokens: 13,
        resolve: bitbake,
        elapsed_token: BITBAKE_ELAPSED_TOKEN,
    },
];

/// Splits a line into whitespace-delimited tokens, dropping empty ones.
pub fn tokenize(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

/// Classifies one log line.
pub fn classify(line: &str) -> LineKind<'_> {
    let tokens = tokenize(line);
    CLASSIFIERS
        .iter()
        .find_map(|classifier| classifier(line, &tokens))
        .unwrap_or(LineKind::Unrecognized)
}

fn classify_identity<'a>(line: &'a str, tokens: &[&'a str]) -> Option<LineKind<'a>> {
    let first = *tokens.first()?;
    // Indented lines are part of some other block.
    if !line.starts_with(first) {
        return None;
    }
    let key = IDENTITY_KEYS.iter().copied().find(|key| *key == first)?;
    if tokens.get(1) != Some(&"=") {
        return None;
    }

    let value = if key == TUNE_FEATURES {
        tokens[2..].join(" ")
    } else if tokens.len() == 3 {
        tokens[2].to_string()
    } else {
        return None;
    };

    Some(LineKind::Identity { key, value })
}

fn classify_scratch_count<'a>(_line: &'a str, tokens: &[&'a str]) -> Option<LineKind<'a>> {
    match tokens {
        [NOTE_SENTINEL, "do_populate_lic:", _, "sstate", "reuse", ..]
            if tokens.len() > SCRATCH_COUNT_TOKEN =>
        {
            Some(LineKind::ScratchCount(tokens[SCRATCH_COUNT_TOKEN]))
        }
        _ => None,
    }
}

fn classify_phase_timing<'a>(_line: &'a str, tokens: &[&'a str]) -> Option<LineKind<'a>> {
    if tokens.first() != Some(&TIME_SENTINEL) {
        return None;
    }

    PHASE_RULES
        .iter()
        .filter(|rule| tokens.len() >= rule.min_tokens)
        .find_map(|rule| {
            let phase = (rule.resolve)(tokens)?;
            Some(LineKind::PhaseTiming {
                phase,
                duration: tokens[rule.elapsed_token],
            })
        })
}

fn classify_report_url<'a>(_line: &'a str, tokens: &[&'a str]) -> Option<LineKind<'a>> {
    if tokens.len() < 3 || tokens[0] != NOTE_SENTINEL {
        return None;
    }

    let url = tokens[tokens.len() - 1];
    let segments: Vec<&str> = url.split('/').collect();
    let n = segments.len();
    (n > 3 && segments[n - 3] == "Builds" && segments[n - 2] == "Details")
        .then_some(LineKind::ReportUrl(url))
}

fn command_is(tokens: &[&str], command: &str, argument: &str) -> bool {
    tokens[COMMAND_TOKEN] == command && tokens[ARGUMENT_TOKEN] == argument
}

fn rsync_artifacts(tokens: &[&str]) -> Option<Phase> {
    (command_is(tokens, "rsync", "-arz")
        && tokens[ARTIFACTS_TOKEN].split('/').next() == Some(ARTIFACTS_DIR))
    .then_some(Phase::RsyncArtifacts)
}

fn remote_rsync_artifacts(tokens: &[&str]) -> Option<Phase> {
    (command_is(tokens, "bash", "-c") && tokens[ARTIFACTS_TOKEN] == ARTIFACTS_DIR)
        .then_some(Phase::RsyncArtifacts)
}

fn remove_directory(tokens: &[&str]) -> Option<Phase> {
    if !command_is(tokens, "rm", "-rf") {
        return None;
    }

    match last_path_segment(tokens[TARGET_TOKEN]) {
        "BUILD" => Some(Phase::RemoveBuild),
        ARTIFACTS_DIR => Some(Phase::RemoveBuildArtifacts),
        "downloads" => Some(Phase::RemoveDownloads),
        "sstate-cache" => Some(Phase::RemoveSstate),
        _ => None,
    }
}

fn build_script(tokens: &[&str]) -> Option<Phase> {
    command_is(tokens, "sh", "-c").then_some(Phase::BuildScript)
}

fn remote_build_script(tokens: &[&str]) -> Option<Phase> {
    command_is(tokens, "ssh", "-o").then_some(Phase::BuildScript)
}

fn bitbake(tokens: &[&str]) -> Option<Phase> {
    (tokens[BITBAKE_TOKEN] == "bitbake").then_some(Phase::Bitbake)
}

fn last_path_segment(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}
