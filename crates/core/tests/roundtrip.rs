use std::fs;

use readingtype_core::{
    CodeEntry, Codec, CodecIssue, Dictionary, DictionaryError, FieldDefinition, MatchKind,
    SearchIndex, SparseFields,
};

#[test]
fn decode_then_encode_reproduces_input() {
    let dict = Dictionary::standard();
    let codec = Codec::new(&dict);
    for input in [
        "0.0.2.1.1.1.12.0.0.0.0.0.0.0.72.0",
        "4.3.2.3.19.1.38.1.3.3.0.3.64.6.72.156",
        "0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0",
    ] {
        let report = codec.decode(input);
        assert!(report.is_valid(), "{input} should be valid");
        assert_eq!(report.value().unwrap().to_string(), input);
    }
}

#[test]
fn fixture_dictionary_can_replace_the_standard_table() {
    let dict = fixture_dictionary();
    let codec = Codec::new(&dict);
    let mut fields = SparseFields::new();
    fields.insert(2, "7".to_string());
    let code = codec.encode(&fields);
    assert_eq!(code, "0.7.0.0.0.0.0.0.0.0.0.0.0.0.0.0");

    let report = codec.decode(&code);
    assert!(report.is_valid());
    assert_eq!(report.fields[1].value.unwrap().english, "seven");

    let report = codec.decode("0.1");
    assert_eq!(
        report.issues,
        vec![
            CodecIssue::Malformed { found: 2 },
            CodecIssue::UnknownCode {
                position: 2,
                field: "f2".to_string(),
                code: "1".to_string(),
            },
        ]
    );

    let index = SearchIndex::new(&dict);
    let hits = index.search("F2");
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|hit| hit.field.position == 2));
    assert_eq!(hits[0].matched_on, MatchKind::Field);
}

#[test]
fn dictionary_persists_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dictionary.json");
    let dict = Dictionary::standard();
    fs::write(&path, dict.to_json_pretty().unwrap()).unwrap();
    let loaded = Dictionary::load(&path).unwrap();
    assert_eq!(loaded, dict);

    let missing = Dictionary::load(dir.path().join("missing.json"));
    assert!(matches!(missing, Err(DictionaryError::Io { .. })));
}

#[test]
fn json_accepts_native_alias() {
    let mut raw: Vec<serde_json::Value> =
        serde_json::from_str(&fixture_dictionary().to_json_pretty().unwrap()).unwrap();
    let entry = &mut raw[0]["values"][0];
    let native = entry["chinese"].take();
    entry.as_object_mut().unwrap().remove("chinese");
    entry["native"] = native;
    let dict = Dictionary::from_json_str(&serde_json::to_string(&raw).unwrap()).unwrap();
    assert_eq!(dict.lookup(1, "0").unwrap().native, "零");
}

fn fixture_dictionary() -> Dictionary {
    let fields = (1..=16u8)
        .map(|position| {
            let mut values = vec![CodeEntry::new("0", "zero", "零")];
            if position == 2 {
                values.push(CodeEntry::new("7", "seven", "七"));
            }
            FieldDefinition {
                position,
                name: format!("f{position}"),
                display_name: format!("字段{position}"),
                description: String::new(),
                values,
            }
        })
        .rev()
        .collect();
    Dictionary::new(fields).unwrap()
}
