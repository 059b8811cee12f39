use indexmap::IndexMap;
use serde::Serialize;

/// The persisted record of one build, keyed by (`jobname`, `buildnumber`).
///
/// Field names on the wire are the document keys that reports query by.
/// Metric keys keep their case, e.g. `time_rm_BUILD`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildRecord {
    #[serde(rename = "jobname")]
    pub job_name: String,
    #[serde(rename = "buildnumber")]
    pub build_number: u32,
    pub result: String,
    pub host: String,
    /// Build duration in whole seconds
    pub duration: i64,
    /// Time spent queued, in fractional seconds
    pub duration_in_queue: f64,
    /// Build start in whole seconds since the epoch
    pub start: i64,
    /// Time spent queued, in whole seconds
    pub waiting: i64,
    pub workspace: String,
    pub description: String,
    /// Seconds between Gerrit receiving the change and the build starting
    pub timediff: i64,
    pub machine: String,
    #[serde(rename = "gerritchangeinfo")]
    pub gerrit: GerritChangeInfo,
    #[serde(rename = "gitchangeinfo")]
    pub git: GitChangeInfo,
    pub retrigger: RetriggerInfo,
    pub cause: CauseInfo,
    pub time_build_sh: f64,
    pub time_bitbake: f64,
    #[serde(rename = "time_rm_BUILD")]
    pub time_rm_build: f64,
    #[serde(rename = "time_rm_BUILD_ARTIFACTS")]
    pub time_rm_build_artifacts: f64,
    pub time_rm_downloads: f64,
    pub time_rm_sstate: f64,
    pub time_rsync_artifacts: f64,
    pub num_of_from_scratch: f64,
    /// Jenkins build parameters, build identity values from the log and the
    /// external build report URL
    pub parameters: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Person {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatchSetInfo {
    pub number: i64,
    pub revision: String,
    #[serde(rename = "ref")]
    pub ref_: String,
    pub parents: Vec<String>,
    #[serde(rename = "createdon")]
    pub created_on: String,
    pub author: Person,
    pub uploader: Person,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GerritChangeInfo {
    pub project: String,
    pub branch: String,
    #[serde(rename = "changenumber")]
    pub change_number: i64,
    #[serde(rename = "changeid")]
    pub change_id: String,
    pub subject: String,
    pub owner: Person,
    pub url: String,
    /// Seconds since the epoch
    #[serde(rename = "receivedon")]
    pub received_on: i64,
    #[serde(rename = "patchset")]
    pub patch_set: PatchSetInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GitChangeInfo {
    pub branch: String,
    #[serde(rename = "commithash")]
    pub commit_hash: String,
    #[serde(rename = "buildnumber")]
    pub build_number: i64,
    #[serde(rename = "repositoryurl")]
    pub repository_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TriggeredBuild {
    pub project: String,
    #[serde(rename = "buildnumber")]
    pub build_number: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetriggerInfo {
    #[serde(rename = "thisbuild")]
    pub this_build: TriggeredBuild,
    pub others: Vec<TriggeredBuild>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CauseInfo {
    pub parent_project: String,
    pub parent_user: String,
    pub parent_buildnumber: i64,
    pub parent_url: String,
    pub userid: String,
    pub retriggeredby: String,
    pub remote_addr: String,
    /// Element names of every recorded cause, understood or not
    pub kinds: Vec<String>,
}
