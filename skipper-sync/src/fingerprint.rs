//! Content fingerprints embedded in a job's description.
//!
//! A pushed document carries the SHA-256 of its own canonical form as the
//! last line of `<description>`:
//!
//! ```text
//! Builds the nightly release.
//!
//! [skipper:fingerprint=3f1c…]
//! ```
//!
//! Re-hashing the document with the marker stripped reproduces the
//! fingerprint unless someone edited the job on the server.

use sha2::{Digest, Sha256};

use crate::document::{Document, Element, Node};

pub const DESCRIPTION: &str = "description";
pub const DISABLED: &str = "disabled";

const MARKER_PREFIX: &str = "[skipper:fingerprint=";
const MARKER_SUFFIX: &str = "]";
const SEPARATOR: &str = "\n\n";

/// What a fingerprint covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashScope {
    /// The whole document.
    #[default]
    Full,
    /// Everything except the root's `<disabled>` flag, which may be toggled
    /// from the server's UI.
    IgnoreDisabledFlag,
}

/// Marker line for `hash`.
pub fn marker(hash: &str) -> String {
    format!("{MARKER_PREFIX}{hash}{MARKER_SUFFIX}")
}

fn parse_marker(line: &str) -> Option<&str> {
    let hash = line.strip_prefix(MARKER_PREFIX)?.strip_suffix(MARKER_SUFFIX)?;
    (!hash.is_empty() && hash.chars().all(|c| c.is_ascii_hexdigit())).then_some(hash)
}

/// SHA-256 hex digest of `doc`'s canonical form, excluding any embedded
/// fingerprint.
pub fn fingerprint(doc: &Document, scope: HashScope) -> String {
    let (_, stripped) = extract_hash(doc);
    let hashed = match scope {
        HashScope::Full => stripped,
        HashScope::IgnoreDisabledFlag => Document::new(without_child(stripped.root(), DISABLED)),
    };
    let canonical = hashed.to_xml().replace("\r\n", "\n");
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Write `hash` as the last line of the root's `<description>`, creating the
/// element when missing. An earlier fingerprint is replaced.
///
/// An existing description, even an empty one, is always followed by the
/// separator; a description holding nothing but the marker line was created
/// here and is removed again by [`extract_hash`].
pub fn embed_hash(doc: &Document, hash: &str) -> Document {
    let (_, doc) = extract_hash(doc);
    let root = doc.root();
    let line = marker(hash);
    match root.child(DESCRIPTION).and_then(Element::text) {
        Some(text) => {
            let text = format!("{text}{SEPARATOR}{line}");
            Document::new(with_child_text(root, DESCRIPTION, &text))
        }
        None if root.child(DESCRIPTION).is_none() => {
            let mut root = root.clone();
            root.children
                .insert(0, Node::Element(Element::with_text(DESCRIPTION, &line)));
            Document::new(root)
        }
        // A description with markup cannot hold the marker line.
        None => doc,
    }
}

/// Read and remove the fingerprint from `doc`'s description.
pub fn extract_hash(doc: &Document) -> (Option<String>, Document) {
    let Some(text) = doc.root().child(DESCRIPTION).and_then(Element::text) else {
        return (None, doc.clone());
    };
    let (head, last) = match text.rfind('\n') {
        Some(i) => (&text[..i + 1], &text[i + 1..]),
        None => ("", text.as_str()),
    };
    let Some(hash) = parse_marker(last) else {
        return (None, doc.clone());
    };
    if head.is_empty() {
        let root = without_first_child(doc.root(), DESCRIPTION);
        return (Some(hash.to_string()), Document::new(root));
    }
    let head = head
        .strip_suffix(SEPARATOR)
        .or_else(|| head.strip_suffix('\n'))
        .unwrap_or(head);
    let root = with_child_text(doc.root(), DESCRIPTION, head);
    (Some(hash.to_string()), Document::new(root))
}

/// Copy `disabled` from `source`'s root into `target`'s root. `target` is
/// returned unchanged when either side lacks the flag.
pub fn transfer_disabled_flag(source: &Document, target: &Document) -> Document {
    let flag = source.root().child_text(DISABLED);
    match (flag, target.root().child(DISABLED)) {
        (Some(flag), Some(_)) => Document::new(with_child_text(target.root(), DISABLED, &flag)),
        _ => target.clone(),
    }
}

fn with_child_text(parent: &Element, name: &str, text: &str) -> Element {
    let mut parent = parent.clone();
    if let Some(Node::Element(child)) = parent
        .children
        .iter_mut()
        .find(|c| matches!(c, Node::Element(el) if el.name == name))
    {
        *child = child.clone().with_text_content(text);
    }
    parent
}

fn without_first_child(parent: &Element, name: &str) -> Element {
    let mut parent = parent.clone();
    if let Some(index) = parent
        .children
        .iter()
        .position(|c| matches!(c, Node::Element(el) if el.name == name))
    {
        parent.children.remove(index);
    }
    parent
}

fn without_child(parent: &Element, name: &str) -> Element {
    let mut parent = parent.clone();
    parent
        .children
        .retain(|c| !matches!(c, Node::Element(el) if el.name == name));
    parent
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn doc(description: &str) -> Document {
        Document::parse(&format!(
            "<project><description>{description}</description><disabled>false</disabled><builders/></project>"
        ))
        .unwrap()
    }

    #[rstest]
    #[case(Some(""))]
    #[case(Some("Nightly build"))]
    #[case(Some("two\n\nparagraphs"))]
    #[case(Some("trailing blank\n\n"))]
    #[case(None)]
    fn embed_then_extract_round_trips(#[case] description: Option<&str>) {
        let original = match description {
            Some(text) => doc(text),
            None => Document::parse("<project><disabled>false</disabled><builders/></project>")
                .unwrap(),
        };
        let hash = fingerprint(&original, HashScope::Full);
        let embedded = embed_hash(&original, &hash);
        assert_eq!(extract_hash(&embedded), (Some(hash), original));
    }

    #[rstest]
    #[case("<project/>")]
    #[case("<project><description><p>rich</p></description></project>")]
    fn round_trips_without_plain_description(#[case] xml: &str) {
        let original = Document::parse(xml).unwrap();
        let hash = fingerprint(&original, HashScope::Full);
        let embedded = embed_hash(&original, &hash);
        let reparsed = Document::parse(&embedded.to_xml()).unwrap();
        let (found, stripped) = extract_hash(&reparsed);
        assert_eq!(stripped, original);
        assert_eq!(fingerprint(&stripped, HashScope::Full), hash);
        if original.root().child(DESCRIPTION).is_none() {
            assert_eq!(found, Some(hash));
        }
    }

    #[test]
    fn empty_description_keeps_separator() {
        let embedded = embed_hash(&doc(""), "abc123");
        assert_eq!(
            embedded.root().child_text(DESCRIPTION).as_deref(),
            Some("\n\n[skipper:fingerprint=abc123]")
        );
    }

    #[test]
    fn marker_is_last_description_line() {
        let embedded = embed_hash(&doc("Nightly build"), "abc123");
        assert_eq!(
            embedded.root().child_text(DESCRIPTION).as_deref(),
            Some("Nightly build\n\n[skipper:fingerprint=abc123]")
        );
    }

    #[test]
    fn fingerprint_ignores_embedded_hash() {
        let original = doc("x");
        let hash = fingerprint(&original, HashScope::Full);
        assert_eq!(fingerprint(&embed_hash(&original, &hash), HashScope::Full), hash);
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn reembedding_replaces_previous_marker() {
        let once = embed_hash(&doc("x"), "aaaa");
        let twice = embed_hash(&once, "bbbb");
        assert_eq!(
            twice.root().child_text(DESCRIPTION).as_deref(),
            Some("x\n\n[skipper:fingerprint=bbbb]")
        );
    }

    #[test]
    fn missing_description_is_created() {
        let original = Document::parse("<project><builders/></project>").unwrap();
        let embedded = embed_hash(&original, "ff");
        assert_eq!(embedded.root().elements().next().map(|e| e.name.as_str()), Some(DESCRIPTION));
        let (hash, stripped) = extract_hash(&embedded);
        assert_eq!(hash.as_deref(), Some("ff"));
        assert_eq!(stripped, original);
    }

    #[test]
    fn plain_descriptions_have_no_hash() {
        let original = doc("[not a marker]");
        assert_eq!(extract_hash(&original), (None, original.clone()));
    }

    #[test]
    fn content_changes_change_the_fingerprint() {
        let a = fingerprint(&doc("a"), HashScope::Full);
        let b = fingerprint(&doc("b"), HashScope::Full);
        assert_ne!(a, b);
    }

    #[test]
    fn disabled_flag_scope() {
        let enabled = doc("x");
        let disabled = Document::parse(
            "<project><description>x</description><disabled>true</disabled><builders/></project>",
        )
        .unwrap();
        assert_ne!(
            fingerprint(&enabled, HashScope::Full),
            fingerprint(&disabled, HashScope::Full)
        );
        assert_eq!(
            fingerprint(&enabled, HashScope::IgnoreDisabledFlag),
            fingerprint(&disabled, HashScope::IgnoreDisabledFlag)
        );
    }

    #[test]
    fn disabled_flag_is_transferred() {
        let remote = Document::parse("<project><disabled>true</disabled></project>").unwrap();
        let merged = transfer_disabled_flag(&remote, &doc("x"));
        assert_eq!(merged.root().child_text(DISABLED).as_deref(), Some("true"));
        let untouched = Document::parse("<project/>").unwrap();
        assert_eq!(transfer_disabled_flag(&untouched, &doc("x")), doc("x"));
    }
}
