use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::{OELensError, Result};

use super::xml::{Element, XmlDocument};

const CAUSE_ACTION: &str = "hudson.model.CauseAction";
const PARAMETERS_ACTION: &str = "hudson.model.ParametersAction";
const GIT_BUILD_DATA: &str = "hudson.plugins.git.util.BuildData";
const GIT_BRANCH: &str = "hudson.plugins.git.Branch";
const TIME_IN_QUEUE_ACTION: &str = "jenkins.metrics.impl.TimeInQueueAction";
const GERRIT_BADGE_ACTION: &str =
    "com.sonyericsson.hudson.plugins.gerrit.trigger.hudsontrigger.BadgeAction";
const GERRIT_RETRIGGER_ACTION: &str =
    "com.sonyericsson.hudson.plugins.gerrit.trigger.hudsontrigger.actions.RetriggerAction";
const GERRIT_CAUSE_PREFIX: &str = "com.sonyericsson.hudson.plugins.gerrit.trigger.hudsontrigger.Gerrit";

/// XML declarations that decoders reject, matched against the raw bytes.
const XML_1_1_DECLARATIONS: [&[u8]; 2] = [b"<?xml version='1.1'", b"<?xml version=\"1.1\""];

/// Jenkins-side record of one build, as read from `build.xml`.
///
/// Times are kept in milliseconds since the epoch, as Jenkins writes them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub start_time: i64,
    pub duration: i64,
    /// Time spent in the build queue, from the metrics plugin.
    pub queuing_duration: i64,
    pub result: String,
    pub host: String,
    pub description: String,
    pub workspace: String,
    pub gerrit: GerritEvent,
    pub git: GitCheckout,
    pub retrigger: RetriggerContext,
    pub causes: Vec<RawCause>,
    pub parameters: Vec<BuildParameter>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Account {
    pub name: String,
    pub email: String,
    pub username: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GerritChange {
    pub project: String,
    pub branch: String,
    pub id: String,
    pub number: i64,
    pub subject: String,
    pub owner: Account,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatchSet {
    pub number: i64,
    pub revision: String,
    pub ref_: String,
    pub uploader: Account,
    pub author: Account,
    pub parents: Vec<String>,
    pub created_on: String,
}

/// The Gerrit event that triggered the build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GerritEvent {
    pub change: GerritChange,
    pub patch_set: PatchSet,
    pub received_on: i64,
}

/// State of the Git checkout the build ran on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitCheckout {
    pub branch: String,
    pub commit_hash: String,
    pub build_number: i64,
    pub remote_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TriggeredItem {
    pub build_number: i64,
    pub project_id: String,
}

/// Builds started together by a Gerrit retrigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetriggerContext {
    pub this_build: TriggeredItem,
    pub others: Vec<TriggeredItem>,
}

/// A trigger cause exactly as recorded: its element name and raw inner XML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawCause {
    pub tag: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildParameter {
    pub name: String,
    pub value: String,
}

/// Rewrites the first XML 1.1 declaration in `bytes` to XML 1.0, in place.
///
/// Returns whether a declaration was rewritten.
pub fn downgrade_xml_version(bytes: &mut [u8]) -> bool {
    for declaration in XML_1_1_DECLARATIONS {
        if let Some(pos) = bytes
            .windows(declaration.len())
            .position(|window| window == declaration)
        {
            // "1.1'" -> "1.0'"
            bytes[pos + declaration.len() - 2] = b'0';
            return true;
        }
    }
    false
}

/// Reads and decodes the `build.xml` at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a well-formed
/// document.
pub fn read_report(path: &Path) -> Result<BuildReport> {
    let bytes = fs::read(path).map_err(|e| {
        OELensError::Report(format!("Cannot read {}: {e}", path.display()))
    })?;
    parse_report(bytes)
}

/// Decodes a build report from the raw bytes of a `build.xml`.
///
/// Optional plugin sections that are absent decode to their zero values.
///
/// # Errors
///
/// Returns an error if the bytes are not UTF-8 or not well-formed XML.
pub fn parse_report(mut bytes: Vec<u8>) -> Result<BuildReport> {
    downgrade_xml_version(&mut bytes);
    let source = String::from_utf8(bytes)
        .map_err(|e| OELensError::Report(format!("build.xml is not UTF-8: {e}")))?;
    let doc = XmlDocument::parse(source)?;
    let build = doc.root();

    let actions = build.child("actions");
    let action = |name: &str| actions.and_then(|a| a.child(name));

    let causes = actions
        .into_iter()
        .flat_map(|a| a.children_named(CAUSE_ACTION))
        .filter_map(|cause_action| cause_action.child("causes"))
        .flat_map(|causes| causes.children.iter())
        .collect::<Vec<_>>();

    let gerrit = action(GERRIT_BADGE_ACTION)
        .and_then(written_event)
        .or_else(|| {
            causes
                .iter()
                .filter(|cause| cause.name.starts_with(GERRIT_CAUSE_PREFIX))
                .find_map(|cause| written_event(cause))
        })
        .map(gerrit_event)
        .unwrap_or_default();

    let git = actions
        .into_iter()
        .flat_map(|a| a.children_named(GIT_BUILD_DATA))
        .find(|data| data.child("lastBuild").is_some())
        .map(git_checkout)
        .unwrap_or_default();

    let retrigger = action(GERRIT_RETRIGGER_ACTION)
        .and_then(|retrigger| retrigger.child("context"))
        .map(retrigger_context)
        .unwrap_or_default();

    let parameters = actions
        .into_iter()
        .flat_map(|a| a.children_named(PARAMETERS_ACTION))
        .filter_map(|parameters_action| parameters_action.child("parameters"))
        .flat_map(|parameters| parameters.children.iter())
        .filter(|parameter| parameter.child("name").is_some())
        .map(|parameter| BuildParameter {
            name: parameter.text_at(&["name"]).to_string(),
            value: parameter.text_at(&["value"]).to_string(),
        })
        .collect();

    Ok(BuildReport {
        start_time: build.int_at(&["startTime"]),
        duration: build.int_at(&["duration"]),
        queuing_duration: action(TIME_IN_QUEUE_ACTION)
            .map_or(0, |queue| queue.int_at(&["queuingDurationMillis"])),
        result: build.text_at(&["result"]).to_string(),
        host: build.text_at(&["builtOn"]).to_string(),
        description: build.text_at(&["description"]).to_string(),
        workspace: build.text_at(&["workspace"]).to_string(),
        gerrit,
        git,
        retrigger,
        causes: causes
            .iter()
            .map(|cause| RawCause {
                tag: cause.name.clone(),
                content: doc.inner_xml(cause).to_string(),
            })
            .collect(),
        parameters,
    })
}

fn account(element: Option<&Element>) -> Account {
    element.map_or_else(Account::default, |account| Account {
        name: account.text_at(&["name"]).to_string(),
        email: account.text_at(&["email"]).to_string(),
        username: account.text_at(&["username"]).to_string(),
    })
}

/// The `tEvent` under `holder`, unless it is an empty `reference=` back-pointer.
/// XStream writes each event once and points later copies at it.
fn written_event(holder: &Element) -> Option<&Element> {
    holder
        .child("tEvent")
        .filter(|event| !event.children.is_empty())
}

fn gerrit_event(event: &Element) -> GerritEvent {
    let change = event.child("change").map_or_else(GerritChange::default, |change| {
        GerritChange {
            project: change.text_at(&["project"]).to_string(),
            branch: change.text_at(&["branch"]).to_string(),
            id: change.text_at(&["id"]).to_string(),
            number: change.int_at(&["number"]),
            subject: change.text_at(&["subject"]).to_string(),
            owner: account(change.child("owner")),
            url: change.text_at(&["url"]).to_string(),
        }
    });

    let patch_set = event.child("patchSet").map_or_else(PatchSet::default, |patch_set| {
        PatchSet {
            number: patch_set.int_at(&["number"]),
            revision: patch_set.text_at(&["revision"]).to_string(),
            ref_: patch_set.text_at(&["ref"]).to_string(),
            uploader: account(patch_set.child("uploader")),
            author: account(patch_set.child("author").or_else(|| patch_set.child("Author"))),
            parents: patch_set
                .child("parents")
                .map(|parents| {
                    parents
                        .children_named("string")
                        .map(|sha| sha.text.trim().to_string())
                        .collect()
                })
                .unwrap_or_default(),
            created_on: patch_set.text_at(&["createdOn"]).to_string(),
        }
    });

    GerritEvent {
        change,
        patch_set,
        received_on: event.int_at(&["receivedOn"]),
    }
}

fn git_checkout(build_data: &Element) -> GitCheckout {
    let last_build = build_data.child("lastBuild");
    let revision = last_build.and_then(|build| build.child("revision"));
    let branch = revision.and_then(|revision| revision.path(&["branches", GIT_BRANCH]));

    let commit_hash = branch
        .map(|branch| branch.text_at(&["SHA1"]))
        .filter(|sha| !sha.is_empty())
        .or_else(|| revision.map(|revision| revision.text_at(&["SHA1"])))
        .unwrap_or_default();

    GitCheckout {
        branch: branch.map_or("", |branch| branch.text_at(&["name"])).to_string(),
        commit_hash: commit_hash.to_string(),
        build_number: last_build.map_or(0, |build| build.int_at(&["hudsonBuildNumber"])),
        remote_url: build_data.text_at(&["remoteUrls", "string"]).to_string(),
    }
}

fn triggered_item(item: &Element) -> TriggeredItem {
    TriggeredItem {
        build_number: item.int_at(&["buildNumber"]),
        project_id: item.text_at(&["projectId"]).to_string(),
    }
}

fn retrigger_context(context: &Element) -> RetriggerContext {
    RetriggerContext {
        this_build: context
            .child("thisBuild")
            .map(triggered_item)
            .unwrap_or_default(),
        others: context
            .child("others")
            .map(|others| {
                others
                    .children_named("triggeredItemEntity")
                    .map(triggered_item)
                    .collect()
            })
            .unwrap_or_default(),
    }
}
