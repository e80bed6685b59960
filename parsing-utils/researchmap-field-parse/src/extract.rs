//! Flat-row extractors, one per researcher record type.
//!
//! Each extractor owns its header schema. Row structs serialize their fields
//! in declaration order, which must line up with the matching `*_HEADERS`.

use crate::record::{field, flag, graph_items, graphs_of_type, nested_field};
use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Researchers,
    Degrees,
    Education,
    ResearchExperience,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Researchers,
        RecordKind::Degrees,
        RecordKind::Education,
        RecordKind::ResearchExperience,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            RecordKind::Researchers => "jp_researchers.csv",
            RecordKind::Degrees => "jp_researchers_degrees.csv",
            RecordKind::Education => "jp_researchers_education.csv",
            RecordKind::ResearchExperience => "jp_researchers_research_experience.csv",
        }
    }

    pub fn headers(self) -> &'static [&'static str] {
        match self {
            RecordKind::Researchers => RESEARCHER_HEADERS,
            RecordKind::Degrees => DEGREE_HEADERS,
            RecordKind::Education => EDUCATION_HEADERS,
            RecordKind::ResearchExperience => EXPERIENCE_HEADERS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindSelection {
    All,
    Researchers,
    Degrees,
    Education,
    ResearchExperience,
}

impl KindSelection {
    pub fn kinds(self) -> Vec<RecordKind> {
        match self {
            KindSelection::All => RecordKind::ALL.to_vec(),
            KindSelection::Researchers => vec![RecordKind::Researchers],
            KindSelection::Degrees => vec![RecordKind::Degrees],
            KindSelection::Education => vec![RecordKind::Education],
            KindSelection::ResearchExperience => vec![RecordKind::ResearchExperience],
        }
    }
}

pub const RESEARCHER_HEADERS: &[&str] = &[
    "user_id", "creator_id", "creator_type", "created", "modifier_id", "modifier_type",
    "modified", "context", "id", "type", "permalink", "family_name_ja", "family_name_ja_kana",
    "family_name_en", "given_name_ja", "given_name_ja_kana", "given_name_en", "display_name_kana",
    "display_nickname", "display_image", "display_contact_pt", "display_profile", "display_url",
];

pub const DEGREE_HEADERS: &[&str] = &[
    "researcher_user_id", "degree_ja", "degree_en", "degree_institution_ja",
    "degree_institution_en", "degree_date", "display_degree", "rm_institution_code",
];

pub const EDUCATION_HEADERS: &[&str] = &[
    "researcher_user_id", "rm_id", "display", "major_achievement", "creator_id",
    "creator_type", "created", "modifier_id", "modifier_type", "modified",
    "from_date", "to_date", "rm_institution_code", "affiliation_ja",
    "affiliation_en", "department_ja", "department_en", "course_ja",
    "course_en", "address_country",
];

pub const EXPERIENCE_HEADERS: &[&str] = &[
    "researcher_user_id", "rm_id", "display", "major_achievement", "creator_id",
    "creator_type", "created", "modifier_id", "modifier_type", "modified",
    "from_date", "to_date", "rm_institution_code", "affiliation_ja",
    "affiliation_en", "section_ja", "section_en", "job_ja", "job_en",
    "address_country",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResearcherRow {
    pub user_id: String,
    pub creator_id: String,
    pub creator_type: String,
    pub created: String,
    pub modifier_id: String,
    pub modifier_type: String,
    pub modified: String,
    pub context: String,
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub permalink: String,
    pub family_name_ja: String,
    pub family_name_ja_kana: String,
    pub family_name_en: String,
    pub given_name_ja: String,
    pub given_name_ja_kana: String,
    pub given_name_en: String,
    pub display_name_kana: String,
    pub display_nickname: String,
    pub display_image: String,
    pub display_contact_pt: String,
    pub display_profile: String,
    pub display_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DegreeRow {
    pub researcher_user_id: String,
    pub degree_ja: String,
    pub degree_en: String,
    pub degree_institution_ja: String,
    pub degree_institution_en: String,
    pub degree_date: String,
    pub display_degree: String,
    pub rm_institution_code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EducationRow {
    pub researcher_user_id: String,
    pub rm_id: String,
    pub display: String,
    pub major_achievement: u8,
    pub creator_id: String,
    pub creator_type: String,
    pub created: String,
    pub modifier_id: String,
    pub modifier_type: String,
    pub modified: String,
    pub from_date: String,
    pub to_date: String,
    pub rm_institution_code: String,
    pub affiliation_ja: String,
    pub affiliation_en: String,
    pub department_ja: String,
    pub department_en: String,
    pub course_ja: String,
    pub course_en: String,
    pub address_country: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExperienceRow {
    pub researcher_user_id: String,
    pub rm_id: String,
    pub display: String,
    pub major_achievement: u8,
    pub creator_id: String,
    pub creator_type: String,
    pub created: String,
    pub modifier_id: String,
    pub modifier_type: String,
    pub modified: String,
    pub from_date: String,
    pub to_date: String,
    pub rm_institution_code: String,
    pub affiliation_ja: String,
    pub affiliation_en: String,
    pub section_ja: String,
    pub section_en: String,
    pub job_ja: String,
    pub job_en: String,
    pub address_country: String,
}

/// Rows produced from one record for one [`RecordKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedRows {
    Researchers(Vec<ResearcherRow>),
    Degrees(Vec<DegreeRow>),
    Education(Vec<EducationRow>),
    ResearchExperience(Vec<ExperienceRow>),
}

impl ExtractedRows {
    pub fn len(&self) -> usize {
        match self {
            ExtractedRows::Researchers(rows) => rows.len(),
            ExtractedRows::Degrees(rows) => rows.len(),
            ExtractedRows::Education(rows) => rows.len(),
            ExtractedRows::ResearchExperience(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn extract(kind: RecordKind, record: &Value) -> Option<ExtractedRows> {
    match kind {
        RecordKind::Researchers => Some(ExtractedRows::Researchers(vec![extract_researcher(record)])),
        RecordKind::Degrees => extract_degrees(record).map(ExtractedRows::Degrees),
        RecordKind::Education => extract_education(record).map(ExtractedRows::Education),
        RecordKind::ResearchExperience => extract_research_experience(record).map(ExtractedRows::ResearchExperience),
    }
}

pub fn extract_researcher(record: &Value) -> ResearcherRow {
    ResearcherRow {
        user_id: field(record, "rm:user_id"),
        creator_id: field(record, "rm:creator_id"),
        creator_type: field(record, "rm:creator_type"),
        created: field(record, "rm:created"),
        modifier_id: field(record, "rm:modifier_id"),
        modifier_type: field(record, "rm:modifier_type"),
        modified: field(record, "rm:modified"),
        context: field(record, "@context"),
        id: field(record, "@id"),
        record_type: field(record, "@type"),
        permalink: field(record, "permalink"),
        family_name_ja: nested_field(record, "family_name", "ja"),
        family_name_ja_kana: nested_field(record, "family_name", "ja-Kana"),
        family_name_en: nested_field(record, "family_name", "en"),
        given_name_ja: nested_field(record, "given_name", "ja"),
        given_name_ja_kana: nested_field(record, "given_name", "ja-Kana"),
        given_name_en: nested_field(record, "given_name", "en"),
        display_name_kana: field(record, "display_name_kana"),
        display_nickname: field(record, "display_nickname"),
        display_image: field(record, "display_image"),
        display_contact_pt: field(record, "display_contact_point"),
        display_profile: field(record, "display_profile"),
        display_url: field(record, "display_url"),
    }
}

/// One row per `degrees` entry. `None` without a user id or without degrees.
pub fn extract_degrees(record: &Value) -> Option<Vec<DegreeRow>> {
    let researcher_user_id = field(record, "rm:user_id").trim().to_string();
    if researcher_user_id.is_empty() {
        return None;
    }

    let degrees = record.get("degrees").and_then(Value::as_array)?;
    if degrees.is_empty() {
        return None;
    }

    Some(
        degrees
            .iter()
            .map(|degree| DegreeRow {
                researcher_user_id: researcher_user_id.clone(),
                degree_ja: nested_field(degree, "degree", "ja"),
                degree_en: nested_field(degree, "degree", "en"),
                degree_institution_ja: nested_field(degree, "degree_institution", "ja"),
                degree_institution_en: nested_field(degree, "degree_institution", "en"),
                degree_date: field(degree, "degree_date"),
                display_degree: field(degree, "display_degree"),
                rm_institution_code: field(degree, "rm:institution_code"),
            })
            .collect(),
    )
}

/// The item's own `rm:user_id`, or the record's when the item has none.
fn owner_id(record: &Value, item: &Value) -> String {
    let item_owner = field(item, "rm:user_id");
    if item_owner.is_empty() {
        field(record, "rm:user_id")
    } else {
        item_owner
    }
}

/// Items of the first `@graph` entry typed `education`.
pub fn extract_education(record: &Value) -> Option<Vec<EducationRow>> {
    let graph = graphs_of_type(record, "education").next()?;
    Some(
        graph_items(graph)
            .iter()
            .map(|item| EducationRow {
                researcher_user_id: owner_id(record, item),
                rm_id: field(item, "rm:id").trim().to_string(),
                display: field(item, "display"),
                major_achievement: flag(item, "major_achievement"),
                creator_id: field(item, "rm:creator_id"),
                creator_type: field(item, "rm:creator_type"),
                created: field(item, "rm:created"),
                modifier_id: field(item, "rm:modifier_id"),
                modifier_type: field(item, "rm:modifier_type"),
                modified: field(item, "rm:modified"),
                from_date: field(item, "from_date"),
                to_date: field(item, "to_date"),
                rm_institution_code: field(item, "rm:institution_code"),
                affiliation_ja: nested_field(item, "affiliation", "ja"),
                affiliation_en: nested_field(item, "affiliation", "en"),
                department_ja: nested_field(item, "department", "ja"),
                department_en: nested_field(item, "department", "en"),
                course_ja: nested_field(item, "course", "ja"),
                course_en: nested_field(item, "course", "en"),
                address_country: field(item, "address_country"),
            })
            .collect(),
    )
}

/// Items of the first `@graph` entry typed `research_experience`.
pub fn extract_research_experience(record: &Value) -> Option<Vec<ExperienceRow>> {
    let graph = graphs_of_type(record, "research_experience").next()?;
    Some(
        graph_items(graph)
            .iter()
            .map(|item| ExperienceRow {
                researcher_user_id: owner_id(record, item),
                rm_id: field(item, "rm:id").trim().to_string(),
                display: field(item, "display"),
                major_achievement: flag(item, "major_achievement"),
                creator_id: field(item, "rm:creator_id"),
                creator_type: field(item, "rm:creator_type"),
                created: field(item, "rm:created"),
                modifier_id: field(item, "rm:modifier_id"),
                modifier_type: field(item, "rm:modifier_type"),
                modified: field(item, "rm:modified"),
                from_date: field(item, "from_date"),
                to_date: field(item, "to_date"),
                rm_institution_code: field(item, "rm:institution_code"),
                affiliation_ja: nested_field(item, "affiliation", "ja"),
                affiliation_en: nested_field(item, "affiliation", "en"),
                section_ja: nested_field(item, "section", "ja"),
                section_en: nested_field(item, "section", "en"),
                job_ja: nested_field(item, "job", "ja"),
                job_en: nested_field(item, "job", "en"),
                address_country: field(item, "address_country"),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_record() -> Value {
        json!({
            "rm:user_id": " B000123 ",
            "rm:created": "2015-04-01",
            "@context": "https://api.researchmap.jp/context.jsonld",
            "@id": "https://api.researchmap.jp/tanaka",
            "@type": "researchers",
            "permalink": "tanaka",
            "family_name": {"ja": "田中", "ja-Kana": "タナカ", "en": "Tanaka"},
            "given_name": {"ja": "花子", "en": "Hanako"},
            "display_contact_point": "disclosed",
            "degrees": [
                {"degree": {"ja": "博士(理学)", "en": "Doctor (Science)"},
                 "degree_institution": {"ja": "東京大学"},
                 "degree_date": "2009-03",
                 "rm:institution_code": "0000012345"},
                {"degree": {"en": "Master"}}
            ],
            "@graph": [
                {"@type": "education", "items": [
                    {"rm:id": " 77 ", "rm:user_id": "B000123",
                     "affiliation": {"ja": "東京大学"}, "course": {"en": "Physics"},
                     "from_date": "2004-04", "major_achievement": true}
                ]},
                {"@type": "research_experience", "items": [
                    {"rm:id": "81", "affiliation": {"en": "RIKEN"},
                     "job": {"en": "Research Scientist"}, "from_date": "2011-04",
                     "major_achievement": false, "address_country": "JPN"},
                    {"rm:id": "82", "rm:user_id": "B000123", "section": {"ja": "物理学科"}}
                ]}
            ]
        })
    }

    fn serialized_header<R: Serialize>(row: &R) -> Vec<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.serialize(row).unwrap();
        let data = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        let mut rdr = csv::Reader::from_reader(data.as_bytes());
        rdr.headers().unwrap().iter().map(str::to_string).collect()
    }

    #[test]
    fn row_structs_match_declared_headers() {
        assert_eq!(serialized_header(&ResearcherRow::default()), RESEARCHER_HEADERS);
        assert_eq!(serialized_header(&DegreeRow::default()), DEGREE_HEADERS);
        assert_eq!(serialized_header(&EducationRow::default()), EDUCATION_HEADERS);
        assert_eq!(serialized_header(&ExperienceRow::default()), EXPERIENCE_HEADERS);
    }

    #[test]
    fn researcher_fields_map_and_default() {
        let row = extract_researcher(&sample_record());
        assert_eq!(row.user_id, " B000123 ");
        assert_eq!(row.context, "https://api.researchmap.jp/context.jsonld");
        assert_eq!(row.record_type, "researchers");
        assert_eq!(row.family_name_ja_kana, "タナカ");
        assert_eq!(row.given_name_ja_kana, "");
        assert_eq!(row.given_name_en, "Hanako");
        assert_eq!(row.display_contact_pt, "disclosed");
        assert_eq!(row.display_url, "");
    }

    #[test]
    fn one_degree_row_per_entry_with_owner() {
        let rows = extract_degrees(&sample_record()).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.researcher_user_id == "B000123"));
        assert_eq!(rows[0].degree_en, "Doctor (Science)");
        assert_eq!(rows[0].degree_institution_en, "");
        assert_eq!(rows[0].rm_institution_code, "0000012345");
        assert_eq!(rows[1].degree_ja, "");
        assert_eq!(rows[1].degree_date, "");
    }

    #[test]
    fn degrees_need_user_id_and_entries() {
        assert!(extract_degrees(&json!({"degrees": [{"degree": {"en": "PhD"}}]})).is_none());
        assert!(extract_degrees(&json!({"rm:user_id": "  ", "degrees": [{}]})).is_none());
        assert!(extract_degrees(&json!({"rm:user_id": "B1", "degrees": []})).is_none());
        assert!(extract_degrees(&json!({"rm:user_id": "B1"})).is_none());
    }

    #[test]
    fn education_items_flatten() {
        let rows = extract_education(&sample_record()).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.rm_id, "77");
        assert_eq!(row.major_achievement, 1);
        assert_eq!(row.affiliation_ja, "東京大学");
        assert_eq!(row.course_en, "Physics");
        assert_eq!(row.department_ja, "");
        assert_eq!(row.to_date, "");
    }

    #[test]
    fn experience_items_fall_back_to_record_owner() {
        let rows = extract_research_experience(&sample_record()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].researcher_user_id, " B000123 ");
        assert_eq!(rows[0].major_achievement, 0);
        assert_eq!(rows[0].job_en, "Research Scientist");
        assert_eq!(rows[0].address_country, "JPN");
        assert_eq!(rows[1].researcher_user_id, "B000123");
        assert_eq!(rows[1].section_ja, "物理学科");
    }

    #[test]
    fn absent_graph_yields_none() {
        let record = json!({"rm:user_id": "B1", "@graph": [{"@type": "awards", "items": []}]});
        assert!(extract_education(&record).is_none());
        assert!(extract_research_experience(&record).is_none());
    }

    #[test]
    fn every_kind_dispatches() {
        let record = sample_record();
        let counts: Vec<usize> = RecordKind::ALL
            .iter()
            .map(|kind| extract(*kind, &record).map_or(0, |rows| rows.len()))
            .collect();
        assert_eq!(counts, vec![1, 2, 1, 2]);
    }
}
