//! Upstream-trigger codec.
//!
//! Pipeline relationships live in `pipelines.yaml`, not in templates. On
//! push they are merged into the rendered document as a
//! `jenkins.triggers.ReverseBuildTrigger` under `<triggers>`; documents read
//! back from the server have the trigger extracted again:
//!
//! ```xml
//! <jenkins.triggers.ReverseBuildTrigger>
//!   <spec/>
//!   <upstreamProjects>build, lint</upstreamProjects>
//!   <threshold>
//!     <name>SUCCESS</name>
//!     <ordinal>0</ordinal>
//!     <color>BLUE</color>
//!     <completeBuild>true</completeBuild>
//!   </threshold>
//! </jenkins.triggers.ReverseBuildTrigger>
//! ```

use skipper_core::{LinkType, PipelineInfo};

use crate::document::{Document, Element};
use crate::SyncError;

pub const REVERSE_BUILD_TRIGGER: &str = "jenkins.triggers.ReverseBuildTrigger";
pub const TRIGGERS: &str = "triggers";

/// `(ordinal, color)` the server stores alongside a threshold name.
fn threshold_fields(link_type: LinkType) -> (&'static str, &'static str) {
    match link_type {
        LinkType::Success => ("0", "BLUE"),
        LinkType::Unstable => ("1", "YELLOW"),
        LinkType::Failure => ("2", "RED"),
    }
}

/// Split an `upstreamProjects` value, trimming names and dropping empties.
pub fn split_parents(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Remove the upstream trigger from `doc`.
///
/// Returns the relationship it declared, or `None` and an unchanged
/// document when there is no trigger.
pub fn extract_pipeline(doc: &Document) -> Result<(Option<PipelineInfo>, Document), SyncError> {
    let (removed, root) = doc.root().without_descendant(REVERSE_BUILD_TRIGGER);
    let Some(trigger) = removed else {
        return Ok((None, doc.clone()));
    };

    let parents = trigger
        .child_text("upstreamProjects")
        .map(|value| split_parents(&value))
        .unwrap_or_default();
    let threshold = trigger
        .child("threshold")
        .and_then(|t| t.child_text("name"))
        .ok_or_else(|| SyncError::MalformedTrigger {
            reason: "trigger has no threshold name".to_string(),
        })?;
    let link_type = threshold
        .parse::<LinkType>()
        .map_err(|_| SyncError::MalformedTrigger {
            reason: format!("unknown threshold '{threshold}'"),
        })?;

    Ok((Some(PipelineInfo::new(parents, link_type)), Document::new(root)))
}

/// Build the trigger element for `parents` and `link_type`.
pub fn trigger_element(parents: &[String], link_type: LinkType) -> Element {
    let (ordinal, color) = threshold_fields(link_type);
    let threshold = Element::new("threshold")
        .with_child(Element::with_text("name", link_type.as_str()))
        .with_child(Element::with_text("ordinal", ordinal))
        .with_child(Element::with_text("color", color))
        .with_child(Element::with_text("completeBuild", "true"));
    Element::new(REVERSE_BUILD_TRIGGER)
        .with_child(Element::new("spec"))
        .with_child(Element::with_text("upstreamProjects", &parents.join(", ")))
        .with_child(threshold)
}

/// Append an upstream trigger to the first `<triggers>` element of `doc`.
pub fn merge_pipeline(
    doc: &Document,
    parents: &[String],
    link_type: LinkType,
) -> Result<Document, SyncError> {
    if parents.is_empty() {
        return Err(SyncError::MalformedTrigger {
            reason: "no upstream projects".to_string(),
        });
    }
    if let Some(bad) = parents.iter().find(|p| p.contains(',') || p.trim().is_empty()) {
        return Err(SyncError::MalformedTrigger {
            reason: format!("invalid upstream project name '{bad}'"),
        });
    }
    let trigger = trigger_element(parents, link_type);
    let root = doc
        .root()
        .replace_first(TRIGGERS, &|triggers: &Element| triggers.clone().with_child(trigger.clone()))
        .ok_or_else(|| SyncError::MalformedTrigger {
            reason: format!("document has no <{TRIGGERS}> element"),
        })?;
    Ok(Document::new(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const JOB: &str = "<project>
  <description/>
  <triggers>
    <hudson.triggers.TimerTrigger><spec>@daily</spec></hudson.triggers.TimerTrigger>
  </triggers>
  <builders/>
</project>";

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn document_without_trigger_is_returned_unchanged() {
        let doc = Document::parse(JOB).unwrap();
        let (info, pruned) = extract_pipeline(&doc).unwrap();
        assert!(info.is_none());
        assert_eq!(pruned, doc);
    }

    #[test]
    fn merge_appends_after_existing_triggers() {
        let doc = Document::parse(JOB).unwrap();
        let merged = merge_pipeline(&doc, &names(&["a", "b"]), LinkType::Unstable).unwrap();
        let triggers = merged.find(TRIGGERS).unwrap();
        let kinds: Vec<&str> = triggers.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(kinds, vec!["hudson.triggers.TimerTrigger", REVERSE_BUILD_TRIGGER]);
        let trigger = triggers.child(REVERSE_BUILD_TRIGGER).unwrap();
        assert_eq!(trigger.child_text("upstreamProjects").as_deref(), Some("a, b"));
        let threshold = trigger.child("threshold").unwrap();
        assert_eq!(threshold.child_text("ordinal").as_deref(), Some("1"));
        assert_eq!(threshold.child_text("color").as_deref(), Some("YELLOW"));
        assert_eq!(threshold.child_text("completeBuild").as_deref(), Some("true"));
    }

    #[rstest]
    #[case(LinkType::Success, "0", "BLUE")]
    #[case(LinkType::Unstable, "1", "YELLOW")]
    #[case(LinkType::Failure, "2", "RED")]
    fn threshold_expansion(#[case] link: LinkType, #[case] ordinal: &str, #[case] color: &str) {
        let trigger = trigger_element(&names(&["p"]), link);
        let threshold = trigger.child("threshold").unwrap();
        assert_eq!(threshold.child_text("name").as_deref(), Some(link.as_str()));
        assert_eq!(threshold.child_text("ordinal").as_deref(), Some(ordinal));
        assert_eq!(threshold.child_text("color").as_deref(), Some(color));
    }

    #[test]
    fn merge_then_extract_round_trips() {
        let doc = Document::parse(JOB).unwrap();
        let merged = merge_pipeline(&doc, &names(&["up", "other"]), LinkType::Failure).unwrap();
        let (info, pruned) = extract_pipeline(&merged).unwrap();
        assert_eq!(info, Some(PipelineInfo::new(names(&["up", "other"]), LinkType::Failure)));
        assert_eq!(pruned, doc);
    }

    #[test]
    fn extract_trims_and_drops_empty_parents() {
        let xml = format!(
            "<project><triggers><{t}><upstreamProjects> a ,, b , </upstreamProjects>\
             <threshold><name>SUCCESS</name></threshold></{t}></triggers></project>",
            t = REVERSE_BUILD_TRIGGER
        );
        let (info, _) = extract_pipeline(&Document::parse(&xml).unwrap()).unwrap();
        assert_eq!(info.unwrap().upstream_projects, names(&["a", "b"]));
    }

    #[test]
    fn extract_rejects_unknown_threshold() {
        let xml = format!(
            "<project><triggers><{t}><upstreamProjects>a</upstreamProjects>\
             <threshold><name>ABORTED</name></threshold></{t}></triggers></project>",
            t = REVERSE_BUILD_TRIGGER
        );
        let err = extract_pipeline(&Document::parse(&xml).unwrap()).unwrap_err();
        assert!(matches!(err, SyncError::MalformedTrigger { .. }));
    }

    #[test]
    fn merge_requires_triggers_element() {
        let doc = Document::parse("<project><builders/></project>").unwrap();
        let err = merge_pipeline(&doc, &names(&["a"]), LinkType::Success).unwrap_err();
        assert!(err.to_string().contains("<triggers>"));
    }

    #[test]
    fn merge_rejects_bad_parent_lists() {
        let doc = Document::parse(JOB).unwrap();
        assert!(merge_pipeline(&doc, &[], LinkType::Success).is_err());
        assert!(merge_pipeline(&doc, &names(&["a,b"]), LinkType::Success).is_err());
    }
}
