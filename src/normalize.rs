use std::fmt;

use indexmap::IndexMap;

use crate::buildlog::{LogMetrics, Phase, CAPRICA, IDENTITY_KEYS, NUM_OF_FROM_SCRATCH};
use crate::jenkins::report::{Account, GerritEvent, RawCause, RetriggerContext, TriggeredItem};
use crate::jenkins::{interpret, BuildDirectory, BuildReport, CauseKind};
use crate::record::{
    BuildRecord, CauseInfo, GerritChangeInfo, GitChangeInfo, PatchSetInfo, Person, RetriggerInfo,
    TriggeredBuild,
};

/// Position of the machine name in `-`-separated job names such as
/// `starfish-drd4tv-official-h15`.
const MACHINE_SEGMENT: usize = 3;

/// A value that could not be read and was replaced by its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeWarning {
    /// The job name has too few `-`-separated segments to name a machine.
    MalformedJobName(String),
    /// A numeric log metric that is present but not a number.
    UnparseableNumber { metric: &'static str, value: String },
}

impl fmt::Display for NormalizeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedJobName(job) => {
                write!(f, "job name '{job}' does not name a machine")
            }
            Self::UnparseableNumber { metric, value } => {
                write!(f, "{metric} value '{value}' is not a number")
            }
        }
    }
}

/// A merged build record plus the defaults that went into it.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub record: BuildRecord,
    pub warnings: Vec<NormalizeWarning>,
}

impl Normalized {
    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Merges log metrics and the Jenkins report of one build into a record.
///
/// Missing or malformed values never fail the merge: they fall back to
/// empty strings and zeros, and each fallback that hides bad input is
/// reported as a [`NormalizeWarning`].
pub fn normalize(dir: &BuildDirectory, metrics: &LogMetrics, report: &BuildReport) -> Normalized {
    let mut warnings = Vec::new();

    let machine = match dir.job_name.split('-').nth(MACHINE_SEGMENT) {
        Some(machine) => machine.to_string(),
        None => {
            warnings.push(NormalizeWarning::MalformedJobName(dir.job_name.clone()));
            String::new()
        }
    };

    let mut seconds = |metric: &'static str| parse_seconds(metrics, metric, &mut warnings);
    let time_build_sh = seconds(Phase::BuildScript.metric());
    let time_bitbake = seconds(Phase::Bitbake.metric());
    let time_rm_build = seconds(Phase::RemoveBuild.metric());
    let time_rm_build_artifacts = seconds(Phase::RemoveBuildArtifacts.metric());
    let time_rm_downloads = seconds(Phase::RemoveDownloads.metric());
    let time_rm_sstate = seconds(Phase::RemoveSstate.metric());
    let time_rsync_artifacts = seconds(Phase::RsyncArtifacts.metric());
    let num_of_from_scratch = seconds(NUM_OF_FROM_SCRATCH);

    let start = report.start_time / 1000;
    let received_on = report.gerrit.received_on / 1000;
    let timediff = if report.gerrit.received_on != 0 {
        start - received_on
    } else {
        0
    };

    #[allow(clippy::cast_precision_loss)]
    let duration_in_queue = report.queuing_duration as f64 / 1000.0;

    let record = BuildRecord {
        job_name: dir.job_name.clone(),
        build_number: dir.number,
        result: report.result.clone(),
        host: report.host.clone(),
        duration: report.duration / 1000,
        duration_in_queue,
        start,
        waiting: report.queuing_duration / 1000,
        workspace: report.workspace.clone(),
        description: report.description.clone(),
        timediff,
        machine,
        gerrit: gerrit_change_info(&report.gerrit, received_on),
        git: GitChangeInfo {
            branch: report.git.branch.clone(),
            commit_hash: report.git.commit_hash.clone(),
            build_number: report.git.build_number,
            repository_url: report.git.remote_url.clone(),
        },
        retrigger: retrigger_info(&report.retrigger),
        cause: cause_info(&report.causes),
        time_build_sh,
        time_bitbake,
        time_rm_build,
        time_rm_build_artifacts,
        time_rm_downloads,
        time_rm_sstate,
        time_rsync_artifacts,
        num_of_from_scratch,
        parameters: parameters(report, metrics),
    };

    Normalized { record, warnings }
}

fn parse_seconds(
    metrics: &LogMetrics,
    metric: &'static str,
    warnings: &mut Vec<NormalizeWarning>,
) -> f64 {
    let Some(value) = metrics.get(metric) else {
        return 0.0;
    };

    value.trim().parse().unwrap_or_else(|_| {
        warnings.push(NormalizeWarning::UnparseableNumber {
            metric,
            value: value.to_string(),
        });
        0.0
    })
}

fn strip_quotes(value: &str) -> String {
    value.trim_matches('"').to_string()
}

/// Jenkins parameters (last value wins), then every build identity key from
/// the log, then the external report URL.
fn parameters(report: &BuildReport, metrics: &LogMetrics) -> IndexMap<String, String> {
    let mut parameters: IndexMap<String, String> = report
        .parameters
        .iter()
        .map(|parameter| (parameter.name.clone(), parameter.value.clone()))
        .collect();

    for key in IDENTITY_KEYS {
        let value = metrics.get(key).map(strip_quotes).unwrap_or_default();
        parameters.insert(key.to_string(), value);
    }
    parameters.insert(
        CAPRICA.to_string(),
        metrics.get(CAPRICA).unwrap_or_default().to_string(),
    );

    parameters
}

fn person(account: &Account) -> Person {
    Person {
        name: account.name.clone(),
        email: account.email.clone(),
    }
}

fn gerrit_change_info(event: &GerritEvent, received_on: i64) -> GerritChangeInfo {
    let change = &event.change;
    let patch_set = &event.patch_set;

    GerritChangeInfo {
        project: change.project.clone(),
        branch: change.branch.clone(),
        change_number: change.number,
        change_id: change.id.clone(),
        subject: change.subject.clone(),
        owner: person(&change.owner),
        url: change.url.clone(),
        received_on,
        patch_set: PatchSetInfo {
            number: patch_set.number,
            revision: patch_set.revision.clone(),
            ref_: patch_set.ref_.clone(),
            parents: patch_set.parents.clone(),
            created_on: patch_set.created_on.clone(),
            author: person(&patch_set.author),
            uploader: person(&patch_set.uploader),
        },
    }
}

fn triggered_build(item: &TriggeredItem) -> TriggeredBuild {
    TriggeredBuild {
        project: item.project_id.clone(),
        build_number: item.build_number,
    }
}

fn retrigger_info(context: &RetriggerContext) -> RetriggerInfo {
    RetriggerInfo {
        this_build: triggered_build(&context.this_build),
        others: context.others.iter().map(triggered_build).collect(),
    }
}

/// Folds all recorded causes into one summary; the first cause of each kind
/// wins.
fn cause_info(causes: &[RawCause]) -> CauseInfo {
    let mut info = CauseInfo {
        kinds: causes.iter().map(|cause| cause.tag.clone()).collect(),
        ..CauseInfo::default()
    };

    for cause in causes {
        match interpret(cause) {
            CauseKind::ParentProject {
                project,
                build_number,
                url,
                user,
            } if info.parent_project.is_empty() => {
                info.parent_project = project;
                info.parent_buildnumber = build_number;
                info.parent_url = url;
                info.parent_user = user.unwrap_or_default();
            }
            CauseKind::ParentUser { user_id } if info.userid.is_empty() => info.userid = user_id,
            CauseKind::Remote { addr, .. } if info.remote_addr.is_empty() => {
                info.remote_addr = addr;
            }
            CauseKind::Retrigger { user } if info.retriggeredby.is_empty() => {
                info.retriggeredby = user;
            }
            _ => {}
        }
    }

    info
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::jenkins::report::{BuildParameter, GerritChange};
    use std::path::Path;

    fn build_dir(job: &str, number: u32) -> BuildDirectory {
        BuildDirectory::from_path(&Path::new("/jenkins/jobs").join(job).join("builds").join(number.to_string()))
            .unwrap()
    }

    fn report() -> BuildReport {
        BuildReport {
            start_time: 1_600_000_000_000,
            duration: 305_000,
            result: "SUCCESS".to_string(),
            ..BuildReport::default()
        }
    }

    fn parameter(name: &str, value: &str) -> BuildParameter {
        BuildParameter {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_end_to_end_scenario_fields() {
        let metrics: LogMetrics = [
            ("BB_VERSION", "\"1.40.0\""),
            ("time_rm_BUILD", "12.5"),
        ]
        .into_iter()
        .collect();

        let normalized = normalize(&build_dir("my-job-x-h15", 42), &metrics, &report());
        let record = &normalized.record;

        assert!(!normalized.is_partial());
        assert_eq!(record.job_name, "my-job-x-h15");
        assert_eq!(record.build_number, 42);
        assert_eq!(record.machine, "h15");
        assert_eq!(record.parameters["BB_VERSION"], "1.40.0");
        assert_eq!(record.time_rm_build, 12.5);
        assert_eq!(record.result, "SUCCESS");
        assert_eq!(record.duration, 305);
        assert_eq!(record.start, 1_600_000_000);
    }

    #[test]
    fn test_missing_metrics_default_to_empty_and_zero() {
        let normalized = normalize(
            &build_dir("starfish-drd4tv-official-h15", 1),
            &LogMetrics::default(),
            &report(),
        );
        let record = &normalized.record;

        assert!(normalized.warnings.is_empty());
        assert_eq!(record.time_bitbake, 0.0);
        assert_eq!(record.num_of_from_scratch, 0.0);
        assert_eq!(record.parameters["DISTRO"], "");
        assert_eq!(record.parameters[CAPRICA], "");
        assert_eq!(record.parameters.len(), IDENTITY_KEYS.len() + 1);
    }

    #[test]
    fn test_unparseable_numbers_default_to_zero_with_warning() {
        let metrics: LogMetrics = [("time_bitbake", "n/a"), ("num_of_from_scratch", "103")]
            .into_iter()
            .collect();

        let normalized = normalize(&build_dir("a-b-c-d", 1), &metrics, &report());

        assert_eq!(normalized.record.time_bitbake, 0.0);
        assert_eq!(normalized.record.num_of_from_scratch, 103.0);
        assert_eq!(
            normalized.warnings,
            vec![NormalizeWarning::UnparseableNumber {
                metric: "time_bitbake",
                value: "n/a".to_string()
            }]
        );
    }

    #[test]
    fn test_short_job_name_has_no_machine() {
        let normalized = normalize(&build_dir("my-job", 3), &LogMetrics::default(), &report());

        assert_eq!(normalized.record.machine, "");
        assert_eq!(
            normalized.warnings,
            vec![NormalizeWarning::MalformedJobName("my-job".to_string())]
        );
        assert!(normalized.warnings[0].to_string().contains("my-job"));
    }

    #[test]
    fn test_seconds_derivation_and_timediff() {
        let mut report = report();
        report.start_time = 1_463_613_210_268;
        report.duration = 1_999;
        report.queuing_duration = 12_345;
        report.gerrit = GerritEvent {
            change: GerritChange {
                number: 181_818,
                ..GerritChange::default()
            },
            received_on: 1_463_613_200_900,
            ..GerritEvent::default()
        };

        let record = normalize(&build_dir("a-b-c-d", 1), &LogMetrics::default(), &report).record;

        assert_eq!(record.start, 1_463_613_210);
        assert_eq!(record.duration, 1);
        assert_eq!(record.waiting, 12);
        assert_eq!(record.duration_in_queue, 12.345);
        assert_eq!(record.gerrit.received_on, 1_463_613_200);
        assert_eq!(record.timediff, 10);
        assert_eq!(record.gerrit.change_number, 181_818);
    }

    #[test]
    fn test_timediff_is_zero_without_gerrit_event() {
        let record = normalize(&build_dir("a-b-c-d", 1), &LogMetrics::default(), &report()).record;
        assert_eq!(record.timediff, 0);
        assert_eq!(record.gerrit.received_on, 0);
    }

    #[test]
    fn test_parameters_last_write_wins_and_log_values_override() {
        let mut report = report();
        report.parameters = vec![
            parameter("GERRIT_PROJECT", "first"),
            parameter("CLEAN_BUILD", "true"),
            parameter("GERRIT_PROJECT", "second"),
            parameter("DISTRO", "from-jenkins"),
        ];
        let metrics: LogMetrics = [("DISTRO", "\"starfish\"")].into_iter().collect();

        let record = normalize(&build_dir("a-b-c-d", 1), &metrics, &report).record;

        assert_eq!(record.parameters["GERRIT_PROJECT"], "second");
        assert_eq!(record.parameters["CLEAN_BUILD"], "true");
        assert_eq!(record.parameters["DISTRO"], "starfish");
        assert_eq!(record.parameters.get_index(0).unwrap().0, "GERRIT_PROJECT");
    }

    #[test]
    fn test_tune_features_quotes_stripped() {
        let metrics: LogMetrics = [("TUNE_FEATURES", "\"arm armv7a neon\"")]
            .into_iter()
            .collect();
        let record = normalize(&build_dir("a-b-c-d", 1), &metrics, &report()).record;
        assert_eq!(record.parameters["TUNE_FEATURES"], "arm armv7a neon");
    }

    #[test]
    fn test_cause_info_from_raw_causes() {
        let mut report = report();
        report.causes = vec![
            RawCause {
                tag: "hudson.model.Cause_-UpstreamCause".to_string(),
                content: "<upstreamProject>parent</upstreamProject>\
                          <upstreamUrl>job/parent/</upstreamUrl>\
                          <upstreamBuild>9</upstreamBuild>"
                    .to_string(),
            },
            RawCause {
                tag: "hudson.model.Cause_-UserIdCause".to_string(),
                content: "<userId>bob</userId>".to_string(),
            },
            RawCause {
                tag: "hudson.triggers.SCMTrigger_-SCMTriggerCause".to_string(),
                content: String::new(),
            },
        ];

        let cause = normalize(&build_dir("a-b-c-d", 1), &LogMetrics::default(), &report)
            .record
            .cause;

        assert_eq!(cause.parent_project, "parent");
        assert_eq!(cause.parent_buildnumber, 9);
        assert_eq!(cause.parent_url, "job/parent/");
        assert_eq!(cause.userid, "bob");
        assert_eq!(cause.retriggeredby, "");
        assert_eq!(cause.kinds.len(), 3);
    }

    #[test]
    fn test_merge_is_deterministic() {
        let metrics: LogMetrics = [("DISTRO", "\"starfish\""), ("time_bitbake", "2810.4")]
            .into_iter()
            .collect();
        let dir = build_dir("starfish-drd4tv-official-h15", 1445);
        let report = report();

        let first = normalize(&dir, &metrics, &report);
        let second = normalize(&dir, &metrics, &report);

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first.record).unwrap(),
            serde_json::to_string(&second.record).unwrap()
        );
    }
}
