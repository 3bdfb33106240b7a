//! Metadata object graph (§3, §4.7): a path-addressable tree of tags with
//! namespace/prefix/local-name/value-type, and XMP serialization.

mod xmp;

pub use xmp::{parse_xmp, serialize_xmp};

use std::collections::BTreeMap;

/// A tag's value, per §3's enumerated value types.
#[derive(Clone, Debug, PartialEq)]
pub enum TagValue {
    Str(String),
    Int(i64),
    OrderedArray(Vec<TagValue>),
    UnorderedArray(Vec<TagValue>),
    AlternateArray(Vec<TagValue>),
    AlternateText(Vec<(String, String)>), // (lang, text)
    Structure(BTreeMap<String, Tag>),
}

/// One metadata tag: namespace URI, optional prefix, local name, value, and
/// optional qualifier tags (small side-annotations on the value itself).
#[derive(Clone, Debug, PartialEq)]
pub struct Tag {
    pub namespace_uri: String,
    pub prefix: String,
    pub local_name: String,
    pub value: TagValue,
    pub qualifiers: Vec<Tag>,
}

/// Built-in registered namespace prefixes (§3).
pub const BUILTIN_PREFIXES: &[(&str, &str)] = &[
    ("dc", "http://purl.org/dc/elements/1.1/"),
    ("exif", "http://ns.adobe.com/exif/1.0/"),
    ("exifAux", "http://ns.adobe.com/exif/1.0/aux/"),
    ("exifEX", "http://cipa.jp/exif/1.0/"),
    ("Iptc4xmpCore", "http://iptc.org/std/Iptc4xmpCore/1.0/xmlns/"),
    ("Iptc4xmpExt", "http://iptc.org/std/Iptc4xmpExt/2008-02-29/"),
    ("photoshop", "http://ns.adobe.com/photoshop/1.0/"),
    ("tiff", "http://ns.adobe.com/tiff/1.0/"),
    ("xmp", "http://ns.adobe.com/xap/1.0/"),
    ("xmpRights", "http://ns.adobe.com/xap/1.0/rights/"),
];

fn namespace_for_prefix(prefix: &str) -> Option<&'static str> {
    BUILTIN_PREFIXES.iter().find(|(p, _)| *p == prefix).map(|(_, uri)| *uri)
}

/// The metadata object: an ordered map from a `prefix:name[/prefix:name]*`
/// path to a tag.
#[derive(Clone, Debug, Default)]
pub struct Metadata {
    tags: BTreeMap<String, Tag>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a raw XMP packet (§4.7: "create from XMP data
    /// (accept-only; parser may be tolerant)"). The parser is deliberately
    /// lossy — see [`xmp::parse_xmp`] — so this never fails; unparseable
    /// input just yields fewer tags.
    pub fn from_xmp(bytes: &[u8]) -> Self {
        xmp::parse_xmp(bytes)
    }

    /// Deep copy, matching §4.7's "create mutable copy (deep)" operation.
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }

    /// Set a tag by path (`prefix:name[/prefix:name]*`). The prefix of the
    /// final path segment must be registered.
    pub fn set(&mut self, path: &str, value: TagValue) -> Result<(), String> {
        let last = path.rsplit('/').next().unwrap_or(path);
        let (prefix, local_name) = last
            .split_once(':')
            .ok_or_else(|| format!("path segment {last:?} missing prefix:name"))?;
        let namespace_uri = namespace_for_prefix(prefix)
            .ok_or_else(|| format!("unregistered namespace prefix {prefix:?}"))?
            .to_string();
        self.tags.insert(
            path.to_string(),
            Tag {
                namespace_uri,
                prefix: prefix.to_string(),
                local_name: local_name.to_string(),
                value,
                qualifiers: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&Tag> {
        self.tags.get(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<Tag> {
        self.tags.remove(path)
    }

    /// Enumerate all top-level paths; `recursive` additionally yields paths
    /// nested inside `Structure` values.
    pub fn paths(&self, recursive: bool) -> Vec<String> {
        if !recursive {
            return self.tags.keys().cloned().collect();
        }
        let mut out = Vec::new();
        for (path, tag) in &self.tags {
            out.push(path.clone());
            collect_structure_paths(path, &tag.value, &mut out);
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Tag)> {
        self.tags.iter()
    }
}

fn collect_structure_paths(parent: &str, value: &TagValue, out: &mut Vec<String>) {
    if let TagValue::Structure(fields) = value {
        for (name, tag) in fields {
            let path = format!("{parent}/{name}");
            out.push(path.clone());
            collect_structure_paths(&path, &tag.value, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_round_trips_by_path() {
        let mut m = Metadata::new();
        m.set("dc:creator", TagValue::Str("Jane".into())).unwrap();
        assert_eq!(m.get("dc:creator").unwrap().local_name, "creator");
    }

    #[test]
    fn unregistered_prefix_rejected() {
        let mut m = Metadata::new();
        assert!(m.set("bogus:thing", TagValue::Int(1)).is_err());
    }

    #[test]
    fn remove_drops_tag() {
        let mut m = Metadata::new();
        m.set("tiff:Orientation", TagValue::Int(1)).unwrap();
        assert!(m.remove("tiff:Orientation").is_some());
        assert!(m.get("tiff:Orientation").is_none());
    }

    #[test]
    fn from_xmp_recovers_tags_written_by_serialize_xmp() {
        let mut m = Metadata::new();
        m.set("dc:creator", TagValue::Str("Jane Doe".into())).unwrap();
        let packet = xmp::serialize_xmp(&m);
        let recovered = Metadata::from_xmp(&packet);
        assert_eq!(recovered.get("dc:creator").unwrap().local_name, "creator");
    }
}
