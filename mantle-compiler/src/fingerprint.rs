//! Source fingerprints — SHA-256 digests of template text.
//!
//! Every compiled entry remembers the digest of each file it was built from,
//! so staleness can be detected by re-reading sources without comparing
//! modification times.

use std::collections::{BTreeMap, BTreeSet};

use sha2::{Digest, Sha256};

use mantle_core::types::TemplateId;
use mantle_syntax::{ContentProvider, LoadError};

/// Hex SHA-256 of `text`. Line endings are normalised to LF first.
pub fn fingerprint(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    let mut h = Sha256::new();
    h.update(normalized.as_bytes());
    hex::encode(h.finalize())
}

/// Fingerprint every file in `files` through `provider`.
pub fn fingerprint_files(
    provider: &dyn ContentProvider,
    files: &BTreeSet<TemplateId>,
) -> Result<BTreeMap<TemplateId, String>, LoadError> {
    let mut out = BTreeMap::new();
    for id in files {
        let source = provider.source(id)?;
        out.insert(id.clone(), fingerprint(&source));
    }
    Ok(out)
}

/// Fingerprint sources that were already read, e.g. by the loader.
pub fn fingerprint_sources(sources: &BTreeMap<TemplateId, String>) -> BTreeMap<TemplateId, String> {
    sources
        .iter()
        .map(|(id, text)| (id.clone(), fingerprint(text)))
        .collect()
}

/// Files whose current source differs from `recorded`, or that can no
/// longer be read.
pub fn changed_files(
    provider: &dyn ContentProvider,
    recorded: &BTreeMap<TemplateId, String>,
) -> Vec<TemplateId> {
    recorded
        .iter()
        .filter(|(id, digest)| match provider.source(id) {
            Ok(source) => fingerprint(&source) != **digest,
            Err(_) => true,
        })
        .map(|(id, _)| id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mantle_syntax::InMemoryProvider;

    #[test]
    fn digest_is_stable_hex() {
        let a = fingerprint("hello");
        assert_eq!(a.len(), 64);
        assert_eq!(a, fingerprint("hello"));
        assert_ne!(a, fingerprint("hello!"));
    }

    #[test]
    fn crlf_and_lf_hash_the_same() {
        assert_eq!(fingerprint("a\r\nb\r\n"), fingerprint("a\nb\n"));
    }

    #[test]
    fn detects_edits_and_removals() {
        let provider = InMemoryProvider::with_templates([("a.html", "A"), ("b.html", "B")]);
        let files: BTreeSet<TemplateId> = ["a.html", "b.html"].into_iter().map(TemplateId::from).collect();
        let recorded = fingerprint_files(&provider, &files).unwrap();
        assert!(changed_files(&provider, &recorded).is_empty());

        provider.add("a.html", "A2");
        provider.remove(&TemplateId::from("b.html"));
        assert_eq!(
            changed_files(&provider, &recorded),
            vec![TemplateId::from("a.html"), TemplateId::from("b.html")]
        );
    }

    #[test]
    fn recorded_sources_detect_later_edits() {
        let provider = InMemoryProvider::with_templates([("a.html", "A2")]);
        let sources = BTreeMap::from([(TemplateId::from("a.html"), "A".to_string())]);
        let recorded = fingerprint_sources(&sources);
        assert_eq!(recorded[&TemplateId::from("a.html")], fingerprint("A"));
        assert_eq!(changed_files(&provider, &recorded), vec![TemplateId::from("a.html")]);
    }

    #[test]
    fn missing_file_fails_fingerprinting() {
        let provider = InMemoryProvider::new();
        let files: BTreeSet<TemplateId> = [TemplateId::from("gone.html")].into_iter().collect();
        assert!(matches!(
            fingerprint_files(&provider, &files),
            Err(LoadError::NotFound { .. })
        ));
    }
}
