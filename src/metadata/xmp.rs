//! XMP serialization: emits `x:xmpmeta`/`rdf:RDF` wrapping one `rdf:Description`
//! per namespace prefix used, binding every prefix that appears.

use super::{Metadata, TagValue};

/// Serialize a [`Metadata`] graph to XMP packet bytes. Always contains an
/// `x:xmpmeta` root and an `rdf:RDF` element, with each namespace prefix in
/// use bound via `xmlns:` on its `rdf:Description`.
pub fn serialize_xmp(meta: &Metadata) -> Vec<u8> {
    let mut by_prefix: std::collections::BTreeMap<&str, Vec<(&str, &TagValue)>> =
        std::collections::BTreeMap::new();
    for (_, tag) in meta.iter() {
        by_prefix.entry(tag.prefix.as_str()).or_default().push((tag.local_name.as_str(), &tag.value));
    }

    let mut out = String::new();
    out.push_str("<?xpacket begin=\"\xEF\xBB\xBF\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n");
    out.push_str("<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n");
    out.push_str("  <rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\n");
    for (prefix, fields) in &by_prefix {
        let uri = super::namespace_for_prefix(prefix).unwrap_or("");
        out.push_str(&format!(
            "    <rdf:Description rdf:about=\"\" xmlns:{prefix}=\"{uri}\">\n"
        ));
        for (name, value) in fields {
            out.push_str(&format!(
                "      <{prefix}:{name}>{}</{prefix}:{name}>\n",
                escape_xml(&tag_value_text(value))
            ));
        }
        out.push_str("    </rdf:Description>\n");
    }
    out.push_str("  </rdf:RDF>\n");
    out.push_str("</x:xmpmeta>\n");
    out.push_str("<?xpacket end=\"w\"?>");
    out.into_bytes()
}

/// Parse an XMP packet into a [`Metadata`] graph (§4.7: "create from XMP
/// data (accept-only; parser may be tolerant)"). Scans for
/// `<prefix:local>text</prefix:local>` elements inside each
/// `rdf:Description`, unescapes entities, and stores each as a flat
/// [`TagValue::Str`]; nested structures, arrays, and qualifiers in the
/// source packet are flattened away rather than rejected. Tags whose prefix
/// isn't in [`super::BUILTIN_PREFIXES`] are skipped. Malformed or truncated
/// input yields whatever tags were recognized before the malformed part,
/// never an error.
pub fn parse_xmp(bytes: &[u8]) -> Metadata {
    let mut meta = Metadata::new();
    let text = String::from_utf8_lossy(bytes);
    let mut rest = text.as_ref();
    while let Some(desc_start) = rest.find("<rdf:Description") {
        let after_open = &rest[desc_start..];
        let Some(tag_end) = after_open.find('>') else { break };
        match after_open.find("</rdf:Description>") {
            Some(desc_end) => {
                parse_description_body(&after_open[tag_end + 1..desc_end], &mut meta);
                rest = &after_open[desc_end + "</rdf:Description>".len()..];
            }
            None => {
                // No closing tag (truncated packet): parse what's left and stop.
                parse_description_body(&after_open[tag_end + 1..], &mut meta);
                break;
            }
        }
    }
    meta
}

fn parse_description_body(body: &str, meta: &mut Metadata) {
    let mut rest = body;
    while let Some(open) = rest.find('<') {
        let after = &rest[open + 1..];
        if after.starts_with('/') {
            rest = &after[1..];
            continue;
        }
        let Some(name_end) = after.find(|c: char| c == '>' || c.is_whitespace()) else { break };
        let name = &after[..name_end];
        let Some((prefix, local)) = name.split_once(':') else {
            rest = &after[name_end..];
            continue;
        };
        let close_tag = format!("</{name}>");
        let Some(gt) = after.find('>') else { break };
        let Some(close_pos) = after.find(&close_tag) else {
            rest = &after[gt + 1..];
            continue;
        };
        if super::namespace_for_prefix(prefix).is_some() {
            let text = unescape_xml(after[gt + 1..close_pos].trim());
            let path = format!("{prefix}:{local}");
            let _ = meta.set(&path, TagValue::Str(text));
        }
        rest = &after[close_pos + close_tag.len()..];
    }
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<").replace("&gt;", ">").replace("&amp;", "&")
}

fn tag_value_text(value: &TagValue) -> String {
    match value {
        TagValue::Str(s) => s.clone(),
        TagValue::Int(i) => i.to_string(),
        TagValue::OrderedArray(items) | TagValue::UnorderedArray(items) | TagValue::AlternateArray(items) => {
            items.iter().map(tag_value_text).collect::<Vec<_>>().join(", ")
        }
        TagValue::AlternateText(items) => {
            items.iter().map(|(_, t)| t.clone()).collect::<Vec<_>>().join(", ")
        }
        TagValue::Structure(_) => String::new(),
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_packet_contains_required_elements() {
        let mut m = Metadata::new();
        m.set("dc:creator", TagValue::Str("Jane Doe".into())).unwrap();
        let xmp = serialize_xmp(&m);
        let text = String::from_utf8(xmp).unwrap();
        assert!(text.contains("x:xmpmeta"));
        assert!(text.contains("rdf:RDF"));
        assert!(text.contains("xmlns:dc="));
        assert!(text.contains("Jane Doe"));
    }

    #[test]
    fn parse_round_trips_through_serialize() {
        let mut m = Metadata::new();
        m.set("dc:creator", TagValue::Str("Jane & Doe".into())).unwrap();
        m.set("tiff:Orientation", TagValue::Int(6)).unwrap();
        let packet = serialize_xmp(&m);
        let parsed = parse_xmp(&packet);
        assert_eq!(parsed.get("dc:creator").unwrap().value, TagValue::Str("Jane & Doe".into()));
        assert_eq!(parsed.get("tiff:Orientation").unwrap().value, TagValue::Str("6".into()));
    }

    #[test]
    fn parse_skips_unregistered_prefixes_and_tolerates_garbage() {
        let packet = b"<rdf:Description><bogus:thing>x</bogus:thing><dc:title>ok</dc:title><unterminated";
        let parsed = parse_xmp(packet);
        assert!(parsed.get("bogus:thing").is_none());
        assert_eq!(parsed.get("dc:title").unwrap().value, TagValue::Str("ok".into()));
    }

    #[test]
    fn parse_empty_input_yields_empty_metadata() {
        let parsed = parse_xmp(b"");
        assert!(parsed.paths(false).is_empty());
    }
}
