//! Interpretation of raw Jenkins trigger causes.
//!
//! The set of cause kinds is open-ended: every plugin may contribute its own.
//! [`RawCause`] keeps what the report says verbatim, and the table below maps
//! the cause kinds this tool understands onto [`CauseKind`]. Anything else is
//! [`CauseKind::Unknown`].

use log::debug;

use super::report::RawCause;
use super::xml::{Element, XmlDocument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CauseKind {
    /// Started by another project's build.
    ParentProject {
        project: String,
        build_number: i64,
        url: String,
        /// User who started the parent build, if a user did.
        user: Option<String>,
    },
    /// Started by a logged-in user.
    ParentUser { user_id: String },
    /// Started through the remote trigger API.
    Remote { addr: String, note: String },
    /// Retriggered from Gerrit by a user.
    Retrigger { user: String },
    Unknown,
}

type Interpreter = fn(&Element) -> CauseKind;

const USER_ID_CAUSE: &str = "hudson.model.Cause_-UserIdCause";

static CAUSE_TABLE: [(&str, Interpreter); 7] = [
    ("hudson.model.Cause_-UpstreamCause", upstream),
    ("com.sonyericsson.rebuild.RebuildCause", upstream),
    (
        "org.jenkinsci.plugins.workflow.support.steps.build.BuildUpstreamCause",
        upstream,
    ),
    (USER_ID_CAUSE, user_id),
    ("hudson.model.Cause_-UserCause", legacy_user),
    ("hudson.model.Cause_-RemoteCause", remote),
    (
        "com.sonyericsson.hudson.plugins.gerrit.trigger.hudsontrigger.GerritUserCause",
        retrigger,
    ),
];

/// Interprets a raw cause through the cause table.
pub fn interpret(cause: &RawCause) -> CauseKind {
    let Some((_, interpreter)) = CAUSE_TABLE.iter().find(|(tag, _)| *tag == cause.tag) else {
        return CauseKind::Unknown;
    };

    match XmlDocument::parse(format!("<cause>{}</cause>", cause.content)) {
        Ok(doc) => interpreter(doc.root()),
        Err(e) => {
            debug!("Unreadable {} content: {e}", cause.tag);
            CauseKind::Unknown
        }
    }
}

fn upstream(cause: &Element) -> CauseKind {
    let user = cause
        .child("upstreamCauses")
        .and_then(|causes| causes.child(USER_ID_CAUSE))
        .map(|parent| parent.text_at(&["userId"]).to_string());

    CauseKind::ParentProject {
        project: cause.text_at(&["upstreamProject"]).to_string(),
        build_number: cause.int_at(&["upstreamBuild"]),
        url: cause.text_at(&["upstreamUrl"]).to_string(),
        user,
    }
}

fn user_id(cause: &Element) -> CauseKind {
    CauseKind::ParentUser {
        user_id: cause.text_at(&["userId"]).to_string(),
    }
}

fn legacy_user(cause: &Element) -> CauseKind {
    CauseKind::ParentUser {
        user_id: cause.text_at(&["authenticationName"]).to_string(),
    }
}

fn remote(cause: &Element) -> CauseKind {
    CauseKind::Remote {
        addr: cause.text_at(&["addr"]).to_string(),
        note: cause.text_at(&["note"]).to_string(),
    }
}

fn retrigger(cause: &Element) -> CauseKind {
    CauseKind::Retrigger {
        user: cause.text_at(&["userName"]).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(tag: &str, content: &str) -> RawCause {
        RawCause {
            tag: tag.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_upstream_cause_with_parent_user() {
        let cause = raw(
            "hudson.model.Cause_-UpstreamCause",
            "<upstreamProject>starfish-official</upstreamProject>\
             <upstreamUrl>job/starfish-official/</upstreamUrl>\
             <upstreamBuild>1445</upstreamBuild>\
             <upstreamCauses><hudson.model.Cause_-UserIdCause><userId>sunjoo</userId>\
             </hudson.model.Cause_-UserIdCause></upstreamCauses>",
        );

        assert_eq!(
            interpret(&cause),
            CauseKind::ParentProject {
                project: "starfish-official".to_string(),
                build_number: 1445,
                url: "job/starfish-official/".to_string(),
                user: Some("sunjoo".to_string()),
            }
        );
    }

    #[test]
    fn test_upstream_cause_started_by_timer() {
        let cause = raw(
            "hudson.model.Cause_-UpstreamCause",
            "<upstreamProject>nightly</upstreamProject><upstreamBuild>7</upstreamBuild>\
             <upstreamCauses><hudson.triggers.TimerTrigger_-TimerTriggerCause/></upstreamCauses>",
        );

        match interpret(&cause) {
            CauseKind::ParentProject { project, user, .. } => {
                assert_eq!(project, "nightly");
                assert_eq!(user, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_user_remote_and_retrigger_causes() {
        assert_eq!(
            interpret(&raw("hudson.model.Cause_-UserIdCause", "<userId>bob</userId>")),
            CauseKind::ParentUser {
                user_id: "bob".to_string()
            }
        );
        assert_eq!(
            interpret(&raw(
                "hudson.model.Cause_-RemoteCause",
                "<addr>10.0.0.1</addr><note>nightly</note>"
            )),
            CauseKind::Remote {
                addr: "10.0.0.1".to_string(),
                note: "nightly".to_string()
            }
        );
        assert_eq!(
            interpret(&raw(
                "com.sonyericsson.hudson.plugins.gerrit.trigger.hudsontrigger.GerritUserCause",
                "<tEvent/><userName>alice</userName>"
            )),
            CauseKind::Retrigger {
                user: "alice".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_and_unreadable_causes() {
        assert_eq!(
            interpret(&raw("hudson.triggers.SCMTrigger_-SCMTriggerCause", "")),
            CauseKind::Unknown
        );
        assert_eq!(
            interpret(&raw("hudson.model.Cause_-UserIdCause", "<userId>bob</oops>")),
            CauseKind::Unknown
        );
    }
}
