//! Core data models used throughout Study Scout.
//!
//! These types represent the catalog entities (courses, modules, items), the
//! classifier guess shapes, and the resource records that flow through the
//! resolution pipeline.

use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A course in the platform catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    pub id: i64,
    pub name: String,
}

/// The course catalog: an ordered name → id mapping.
///
/// Fetch order is preserved because the resolution stage's default fallback
/// selects the first entry; names are unique (first occurrence wins).
#[derive(Debug, Clone, Default)]
pub struct CourseList {
    courses: Vec<Course>,
}

impl CourseList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a course, keeping the first entry when a name repeats.
    pub fn push(&mut self, course: Course) {
        if !self.courses.iter().any(|c| c.name == course.name) {
            self.courses.push(course);
        }
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Course> {
        self.courses.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.courses.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.name == name)
    }

    pub fn first(&self) -> Option<&Course> {
        self.courses.first()
    }
}

impl FromIterator<Course> for CourseList {
    fn from_iter<I: IntoIterator<Item = Course>>(iter: I) -> Self {
        let mut list = CourseList::new();
        for course in iter {
            list.push(course);
        }
        list
    }
}

/// A module within a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: i64,
    pub name: String,
}

/// The kind of a module item, as reported by the platform.
///
/// Unknown kinds are preserved verbatim so they round-trip through the
/// output records.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemType {
    Page,
    Assignment,
    File,
    Quiz,
    Discussion,
    ExternalUrl,
    SubHeader,
    Other(String),
}

impl ItemType {
    pub fn parse(s: &str) -> Self {
        match s {
            "Page" => ItemType::Page,
            "Assignment" => ItemType::Assignment,
            "File" => ItemType::File,
            "Quiz" => ItemType::Quiz,
            "Discussion" => ItemType::Discussion,
            "ExternalUrl" => ItemType::ExternalUrl,
            "SubHeader" => ItemType::SubHeader,
            other => ItemType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ItemType::Page => "Page",
            ItemType::Assignment => "Assignment",
            ItemType::File => "File",
            ItemType::Quiz => "Quiz",
            ItemType::Discussion => "Discussion",
            ItemType::ExternalUrl => "ExternalUrl",
            ItemType::SubHeader => "SubHeader",
            ItemType::Other(s) => s,
        }
    }
}

impl Default for ItemType {
    fn default() -> Self {
        ItemType::Other("Unknown".to_string())
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ItemType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ItemType::parse(&s))
    }
}

impl Serialize for ItemType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

fn untitled() -> String {
    "Untitled Resource".to_string()
}

/// An item within a module, as returned by the catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct Item {
    pub id: i64,
    #[serde(default = "untitled")]
    pub title: String,
    #[serde(rename = "type", default)]
    pub item_type: ItemType,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub content_id: Option<i64>,
}

// ============ Classifier guess shapes ============

/// Course-stage classifier guess.
#[derive(Debug, Clone, Deserialize)]
pub struct CourseGuess {
    pub course_name: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

/// Module-stage classifier guess (up to 3 names).
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleGuess {
    #[serde(default)]
    pub module_names: Vec<String>,
    #[serde(default)]
    pub relevance_explanations: Vec<String>,
}

/// Resource-stage classifier guess (up to 5 indices into the item list).
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceGuess {
    #[serde(default)]
    pub resource_indices: Vec<usize>,
    #[serde(default)]
    pub relevance_scores: Vec<f64>,
    #[serde(default)]
    pub reasoning: String,
}

// ============ Output records ============

/// A single ranked search result.
#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    pub title: String,
    #[serde(rename = "type")]
    pub resource_type: ItemType,
    pub url: String,
    pub course: String,
    pub module: String,
    pub relevance_score: f64,
}

/// Structured empty-state record: the pipeline ran to completion but has
/// nothing to return. Carries a machine-checkable `error` field plus context
/// so callers can tell "found nothing" apart from "crashed".
#[derive(Debug, Clone, Serialize)]
pub struct EmptyRecord {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl EmptyRecord {
    pub fn no_courses(details: Option<String>) -> Self {
        Self {
            error: "No courses found".to_string(),
            query: None,
            course: None,
            details,
        }
    }

    pub fn no_modules(course: &str) -> Self {
        Self {
            error: "No modules found".to_string(),
            query: None,
            course: Some(course.to_string()),
            details: None,
        }
    }

    pub fn no_matches(query: &str, course: &str) -> Self {
        Self {
            error: "No relevant resources found".to_string(),
            query: Some(query.to_string()),
            course: Some(course.to_string()),
            details: None,
        }
    }
}

/// Pipeline outcome: a ranked resource list, or a structured empty state.
///
/// Both serialize to a JSON array (empty states become a single synthetic
/// record) so the wire shape is uniform for API consumers.
#[derive(Debug, Clone)]
pub enum Findings {
    Resources(Vec<Resource>),
    Empty(EmptyRecord),
}

impl Findings {
    pub fn is_empty(&self) -> bool {
        matches!(self, Findings::Empty(_))
    }
}

impl Serialize for Findings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Findings::Resources(resources) => resources.serialize(serializer),
            Findings::Empty(record) => {
                let mut seq = serializer.serialize_seq(Some(1))?;
                seq.serialize_element(record)?;
                seq.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_course_list_dedup_keeps_first() {
        let mut list = CourseList::new();
        list.push(Course {
            id: 1,
            name: "CSE 520: Operating Systems".to_string(),
        });
        list.push(Course {
            id: 2,
            name: "CSE 520: Operating Systems".to_string(),
        });
        assert_eq!(list.len(), 1);
        assert_eq!(list.get("CSE 520: Operating Systems").unwrap().id, 1);
    }

    #[test]
    fn test_course_list_preserves_order() {
        let list: CourseList = vec![
            Course {
                id: 10,
                name: "B".to_string(),
            },
            Course {
                id: 20,
                name: "A".to_string(),
            },
        ]
        .into_iter()
        .collect();
        assert_eq!(list.first().unwrap().name, "B");
    }

    #[test]
    fn test_item_type_roundtrip() {
        assert_eq!(ItemType::parse("File"), ItemType::File);
        assert_eq!(ItemType::parse("Wiki"), ItemType::Other("Wiki".to_string()));
        assert_eq!(ItemType::parse("Wiki").as_str(), "Wiki");
    }

    #[test]
    fn test_item_defaults() {
        let item: Item = serde_json::from_str(r#"{"id": 3001}"#).unwrap();
        assert_eq!(item.title, "Untitled Resource");
        assert_eq!(item.item_type.as_str(), "Unknown");
        assert_eq!(item.html_url, "");
        assert!(item.content_id.is_none());
    }

    #[test]
    fn test_findings_serialize_as_array() {
        let empty = Findings::Empty(EmptyRecord::no_matches("orthogonalization", "MAT 343"));
        let value = serde_json::to_value(&empty).unwrap();
        let arr = value.as_array().unwrap();
        assert_eq!(arr.len(), 1);
        assert_eq!(arr[0]["error"], "No relevant resources found");
        assert_eq!(arr[0]["query"], "orthogonalization");
        assert!(arr[0].get("details").is_none());
    }

    #[test]
    fn test_resource_wire_shape() {
        let resource = Resource {
            title: "Scheduling".to_string(),
            resource_type: ItemType::Page,
            url: "https://example.edu/p/1".to_string(),
            course: "CSE 520".to_string(),
            module: "Week 3".to_string(),
            relevance_score: 0.9,
        };
        let value = serde_json::to_value(&resource).unwrap();
        assert_eq!(value["type"], "Page");
        assert_eq!(value["relevance_score"], 0.9);
    }
}
