//! Claim export extraction.
//!
//! The claim markup arrives messy: unescaped ampersands, fields that appear
//! either as attributes or as child elements, and a few known tag
//! misspellings ("Encounte", "OrderingClnician"). Input is sanitized, parsed
//! into a small element tree, then walked twice — once for modifier-candidate
//! records, once for billed claim lines.

use std::collections::HashSet;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::AuditError;
use crate::model::{ActivityRecord, ClaimLine, Modifier, ModifierCandidate};
use crate::normalize::{normalize_date, normalize_member_id, normalize_voi};

/// Output of the modifier walk: candidate records plus the flat activity
/// list the modifier-25 co-occurrence check runs against.
#[derive(Debug, Default)]
pub struct Extraction {
    pub candidates: Vec<ModifierCandidate>,
    pub activities: Vec<ActivityRecord>,
}

// ---------------------------------------------------------------------------
// Entity sanitization
// ---------------------------------------------------------------------------

/// Replace any `&` that does not open a recognized entity/character reference
/// with the literal word "and", so claim narratives like "EAR & NOSE" survive
/// structural parsing.
pub fn sanitize_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for (idx, ch) in input.char_indices() {
        if ch == '&' && !is_entity_reference(&input[idx + 1..]) {
            out.push_str("and");
        } else {
            out.push(ch);
        }
    }
    out
}

fn is_entity_reference(rest: &str) -> bool {
    for named in ["amp;", "lt;", "gt;", "quot;", "apos;"] {
        if rest.starts_with(named) {
            return true;
        }
    }
    let Some(numeric) = rest.strip_prefix('#') else {
        return false;
    };
    let (digits, radix_ok): (&str, bool) = match numeric.strip_prefix(['x', 'X']) {
        Some(hex) => (hex, true),
        None => (numeric, false),
    };
    match digits.find(';') {
        Some(end) if end > 0 => digits[..end].chars().all(|c| {
            if radix_ok {
                c.is_ascii_hexdigit()
            } else {
                c.is_ascii_digit()
            }
        }),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Element tree
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All descendants with the given tag name, document order.
    fn descendants<'a>(&'a self, name: &str, out: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.name == name {
                out.push(child);
            }
            child.descendants(name, out);
        }
    }

    fn find_all(&self, name: &str) -> Vec<&Element> {
        let mut out = Vec::new();
        self.descendants(name, &mut out);
        out
    }

    fn first(&self, name: &str) -> Option<&Element> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.first(name) {
                return Some(found);
            }
        }
        None
    }

    /// Concatenated text content of this element and its descendants.
    fn deep_text(&self, out: &mut String) {
        out.push_str(&self.text);
        for child in &self.children {
            child.deep_text(out);
        }
    }
}

/// Field lookup: attribute first, then first descendant element with that
/// tag name. Always trimmed, "" when absent.
fn text_value(node: &Element, name: &str) -> String {
    if let Some(value) = node.attr(name) {
        return value.trim().to_string();
    }
    match node.first(name) {
        Some(el) => {
            let mut text = String::new();
            el.deep_text(&mut text);
            text.trim().to_string()
        }
        None => String::new(),
    }
}

fn first_non_empty(node: &Element, names: &[&str]) -> String {
    for name in names {
        let value = text_value(node, name);
        if !value.is_empty() {
            return value;
        }
    }
    String::new()
}

fn parse_document(xml: &str) -> Result<Element, AuditError> {
    let cleaned = sanitize_entities(xml);
    let mut reader = Reader::from_str(&cleaned);
    reader.config_mut().trim_text(true);

    let mut root = Element::default();
    let mut stack: Vec<Element> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let mut el = Element {
                    name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    ..Element::default()
                };
                for attr in e.attributes() {
                    let attr = attr.map_err(|err| AuditError::MalformedXml(err.to_string()))?;
                    let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                    let value = attr
                        .unescape_value()
                        .map_err(|err| AuditError::MalformedXml(err.to_string()))?
                        .into_owned();
                    el.attrs.push((key, value));
                }
                stack.push(el);
            }
            Ok(Event::Empty(e)) => {
                let mut el = Element {
                    name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    ..Element::default()
                };
                for attr in e.attributes() {
                    let attr = attr.map_err(|err| AuditError::MalformedXml(err.to_string()))?;
                    let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                    let value = attr
                        .unescape_value()
                        .map_err(|err| AuditError::MalformedXml(err.to_string()))?
                        .into_owned();
                    el.attrs.push((key, value));
                }
                stack.last_mut().unwrap_or(&mut root).children.push(el);
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|err| AuditError::MalformedXml(err.to_string()))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Ok(Event::CData(t)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                let el = stack
                    .pop()
                    .ok_or_else(|| AuditError::MalformedXml("unbalanced end tag".into()))?;
                stack.last_mut().unwrap_or(&mut root).children.push(el);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(AuditError::MalformedXml(err.to_string())),
        }
    }
    if !stack.is_empty() {
        return Err(AuditError::MalformedXml("unclosed element".into()));
    }
    Ok(root)
}

// ---------------------------------------------------------------------------
// Modifier walk
// ---------------------------------------------------------------------------

const CLINICIAN_TAGS: &[&str] = &[
    "OrderingClnician", // known export misspelling, highest observed frequency
    "OrderingClinician",
    "Ordering_Clinician",
    "OrderingClin",
];

/// Extract modifier-candidate records and the flat activity list.
///
/// Candidates are deduplicated on (claim, activity, member, modifier, code),
/// first occurrence wins. Observations whose ValueType is not "Modifiers" or
/// whose value maps to no known modifier are ignored, not errors.
pub fn extract_claims(xml: &str) -> Result<Extraction, AuditError> {
    let root = parse_document(xml)?;
    let mut out = Extraction::default();
    let mut seen: HashSet<(String, String, String, &'static str, String)> = HashSet::new();

    for claim in root.find_all("Claim") {
        let claim_id = text_value(claim, "ID");
        let payer_id = text_value(claim, "PayerID");
        let member_id = normalize_member_id(&text_value(claim, "MemberID"));

        // "Encounte" is a known tag misspelling in the wild
        let encounter = claim.first("Encounter").or_else(|| claim.first("Encounte"));
        let date = match encounter {
            Some(enc) => normalize_date(&first_non_empty(enc, &["Date", "Start", "EncounterDate"])),
            None => String::new(),
        };

        for activity in claim.find_all("Activity") {
            let activity_id = text_value(activity, "ID");
            let activity_code = first_non_empty(activity, &["Code", "ActivityCode"]);
            let activity_amount = first_non_empty(activity, &["NetAmount", "Net", "Amount"])
                .parse()
                .unwrap_or(0.0);
            let clinician = first_non_empty(activity, CLINICIAN_TAGS).to_uppercase();

            if !activity_code.is_empty() {
                out.activities.push(ActivityRecord {
                    claim_id: claim_id.clone(),
                    activity_id: activity_id.clone(),
                    code: activity_code.clone(),
                    amount: activity_amount,
                    payer_id: payer_id.clone(),
                });
            }

            for observation in activity.find_all("Observation") {
                let value_type = text_value(observation, "ValueType");
                if !value_type.trim().eq_ignore_ascii_case("modifiers") {
                    continue;
                }
                let code = text_value(observation, "Code");
                let value = first_non_empty(observation, &["Value", "ValueText"]);
                let Some(modifier) = modifier_from_voi(&normalize_voi(&value)) else {
                    continue;
                };

                let dedup_key = (
                    claim_id.clone(),
                    activity_id.clone(),
                    member_id.clone(),
                    modifier.as_str(),
                    code.clone(),
                );
                if !seen.insert(dedup_key) {
                    continue;
                }

                out.candidates.push(ModifierCandidate {
                    claim_id: claim_id.clone(),
                    member_id: member_id.clone(),
                    activity_id: activity_id.clone(),
                    activity_code: activity_code.clone(),
                    activity_amount,
                    payer_id: payer_id.clone(),
                    clinician: clinician.clone(),
                    date: date.clone(),
                    modifier,
                    code,
                    value,
                });
            }
        }
    }

    Ok(out)
}

fn modifier_from_voi(voi_norm: &str) -> Option<Modifier> {
    match voi_norm {
        "VOID" | "24" => Some(Modifier::M24),
        "VOIEF1" | "52" => Some(Modifier::M52),
        "25" | "VOI25" => Some(Modifier::M25),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Price walk
// ---------------------------------------------------------------------------

/// Extract billed claim lines for price reconciliation. Wider tag tolerance
/// than the modifier walk: pricing exports mix Activity/Service/Item and
/// lowercase spellings.
pub fn extract_claim_lines(xml: &str) -> Result<Vec<ClaimLine>, AuditError> {
    let root = parse_document(xml)?;
    let mut lines = Vec::new();

    let mut claims = root.find_all("Claim");
    claims.extend(root.find_all("claim"));

    for claim in claims {
        let claim_id = first_non_empty(claim, &["ID", "ClaimID", "claimId"]);
        let encounter_kind = claim
            .first("Encounter")
            .map(|enc| text_value(enc, "Type"))
            .unwrap_or_default();

        let mut activities = Vec::new();
        for tag in ["Activity", "activity", "Service", "service", "Item", "item"] {
            activities.extend(claim.find_all(tag));
        }

        for activity in activities {
            let mut kind = first_non_empty(activity, &["Type", "type"]);
            if kind.is_empty() {
                kind = encounter_kind.clone();
            }
            let line = ClaimLine {
                claim_id: claim_id.clone(),
                kind,
                code: first_non_empty(activity, &["Code", "code", "ServiceCode", "ActivityCode"]),
                net: first_non_empty(activity, &["Net", "net", "NetAmount", "Amount"])
                    .parse()
                    .unwrap_or(0.0),
                quantity: first_non_empty(activity, &["Quantity", "quantity", "Qty"])
                    .parse()
                    .unwrap_or(1),
                clinician: first_non_empty(
                    activity,
                    &["Clinician", "clinician", "Doctor", "Provider", "OrderingClinician"],
                ),
            };
            lines.push(line);
        }
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLAIMS_XML: &str = r#"
<Submission>
  <Claim>
    <ID>C1</ID>
    <PayerID>E001</PayerID>
    <MemberID>000123</MemberID>
    <Encounter>
      <Start>15/03/2024 09:00</Start>
    </Encounter>
    <Activity>
      <ID>A1</ID>
      <Code>99213</Code>
      <Net>130.00</Net>
      <OrderingClnician>dr smith</OrderingClnician>
      <Observation>
        <Code>CPT modifier</Code>
        <Value>VOI_D</Value>
        <ValueType>Modifiers</ValueType>
      </Observation>
      <Observation>
        <Code>LOINC</Code>
        <Value>8480-6</Value>
        <ValueType>Result</ValueType>
      </Observation>
    </Activity>
    <Activity ID="A2" Code="90834" NetAmount="50">
      <OrderingClinician>DR SMITH</OrderingClinician>
    </Activity>
  </Claim>
</Submission>"#;

    #[test]
    fn extracts_candidates_and_activities() {
        let extraction = extract_claims(CLAIMS_XML).unwrap();

        assert_eq!(extraction.activities.len(), 2);
        assert_eq!(extraction.activities[0].code, "99213");
        assert_eq!(extraction.activities[1].amount, 50.0);

        assert_eq!(extraction.candidates.len(), 1);
        let c = &extraction.candidates[0];
        assert_eq!(c.claim_id, "C1");
        assert_eq!(c.member_id, "123");
        assert_eq!(c.modifier, Modifier::M24);
        assert_eq!(c.clinician, "DR SMITH");
        assert_eq!(c.date, "2024-03-15");
        assert_eq!(c.code, "CPT modifier");
    }

    #[test]
    fn attribute_and_child_fields_both_read() {
        let extraction = extract_claims(CLAIMS_XML).unwrap();
        // A2 is attribute-only
        assert_eq!(extraction.activities[1].activity_id, "A2");
        assert_eq!(extraction.activities[1].code, "90834");
    }

    #[test]
    fn encounter_misspelling_tolerated() {
        let xml = r#"
<Claim>
  <ID>C2</ID><PayerID>E001</PayerID><MemberID>5</MemberID>
  <Encounte><Date>16/03/2024</Date></Encounte>
  <Activity>
    <ID>A1</ID><Code>99213</Code><Net>10</Net>
    <Observation><Code>CPT modifier</Code><Value>25</Value><ValueType>modifiers</ValueType></Observation>
  </Activity>
</Claim>"#;
        let extraction = extract_claims(xml).unwrap();
        assert_eq!(extraction.candidates[0].date, "2024-03-16");
        assert_eq!(extraction.candidates[0].modifier, Modifier::M25);
    }

    #[test]
    fn unescaped_ampersand_sanitized() {
        let xml = r#"<Claim><ID>C3</ID><MemberID>7</MemberID>
            <Activity><ID>A1</ID><Code>99213</Code><Net>1</Net>
            <Description>EAR & NOSE &amp; THROAT</Description></Activity></Claim>"#;
        let extraction = extract_claims(xml).unwrap();
        assert_eq!(extraction.activities.len(), 1);
    }

    #[test]
    fn sanitizer_preserves_recognized_references() {
        assert_eq!(sanitize_entities("a &amp; b"), "a &amp; b");
        assert_eq!(sanitize_entities("a & b"), "a and b");
        assert_eq!(sanitize_entities("x&#38;y"), "x&#38;y");
        assert_eq!(sanitize_entities("x&#x26;y"), "x&#x26;y");
        assert_eq!(sanitize_entities("R&D &lt; S"), "RandD &lt; S");
    }

    #[test]
    fn malformed_xml_is_fatal() {
        let err = extract_claims("<Claim><ID>C1</Claim>").unwrap_err();
        assert!(matches!(err, AuditError::MalformedXml(_)));
    }

    #[test]
    fn duplicate_candidates_collapse() {
        let xml = r#"
<Claim>
  <ID>C4</ID><PayerID>E001</PayerID><MemberID>9</MemberID>
  <Encounter><Date>16/03/2024</Date></Encounter>
  <Activity>
    <ID>A1</ID><Code>99213</Code><Net>10</Net>
    <Observation><Code>CPT modifier</Code><Value>VOI_D</Value><ValueType>Modifiers</ValueType></Observation>
    <Observation><Code>CPT modifier</Code><Value>VOI_D</Value><ValueType>Modifiers</ValueType></Observation>
  </Activity>
</Claim>"#;
        let extraction = extract_claims(xml).unwrap();
        assert_eq!(extraction.candidates.len(), 1);
    }

    #[test]
    fn ignored_voi_values_are_not_errors() {
        let xml = r#"
<Claim>
  <ID>C5</ID><PayerID>E001</PayerID><MemberID>9</MemberID>
  <Activity>
    <ID>A1</ID><Code>99213</Code><Net>10</Net>
    <Observation><Code>CPT modifier</Code><Value>VOI_Z9</Value><ValueType>Modifiers</ValueType></Observation>
  </Activity>
</Claim>"#;
        let extraction = extract_claims(xml).unwrap();
        assert!(extraction.candidates.is_empty());
        assert_eq!(extraction.activities.len(), 1);
    }

    #[test]
    fn claim_lines_for_pricing() {
        let lines = extract_claim_lines(CLAIMS_XML).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].code, "99213");
        assert_eq!(lines[0].net, 130.0);
        assert_eq!(lines[0].quantity, 1);
        assert_eq!(lines[1].code, "90834");
    }

    #[test]
    fn claim_line_quantity_and_service_tags() {
        let xml = r#"
<claim><claimId>C9</claimId>
  <Service><code>73000</code><net>240</net><Qty>2</Qty><Doctor>DR X</Doctor></Service>
</claim>"#;
        let lines = extract_claim_lines(xml).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].claim_id, "C9");
        assert_eq!(lines[0].quantity, 2);
        assert_eq!(lines[0].clinician, "DR X");
    }
}
