//! Integration tests for the resolution pipeline.
//!
//! These tests drive the whole course → module → resource pipeline through
//! the `CatalogSource` and `Oracle` traits with deterministic in-memory
//! fakes, proving the fallback and empty-state contracts end to end.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use study_scout::catalog::CatalogSource;
use study_scout::config::Config;
use study_scout::models::{Course, CourseList, Findings, Item, Module};
use study_scout::oracle::Oracle;
use study_scout::pipeline::Pipeline;

// ─── Fake catalog ───────────────────────────────────────────────────

#[derive(Default)]
struct FakeCatalog {
    courses: Vec<(String, i64)>,
    modules: HashMap<i64, Vec<Module>>,
    items: HashMap<i64, Vec<Item>>,
    file_urls: HashMap<i64, String>,
    module_calls: AtomicUsize,
    item_calls: AtomicUsize,
    file_calls: AtomicUsize,
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn list_courses(&self) -> Result<CourseList> {
        Ok(self
            .courses
            .iter()
            .map(|(name, id)| Course {
                id: *id,
                name: name.clone(),
            })
            .collect())
    }

    async fn list_modules(&self, course_id: i64) -> Result<Vec<Module>> {
        self.module_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.modules.get(&course_id).cloned().unwrap_or_default())
    }

    async fn list_module_items(&self, _course_id: i64, module_id: i64) -> Result<Vec<Item>> {
        self.item_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.items.get(&module_id).cloned().unwrap_or_default())
    }

    async fn resolve_file_url(&self, _course_id: i64, file_id: i64) -> Result<Option<String>> {
        self.file_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.file_urls.get(&file_id).cloned())
    }
}

// ─── Fake oracle ────────────────────────────────────────────────────

/// Replies are `Option<String>`: `None` simulates a failed oracle call.
#[derive(Default)]
struct FakeOracle {
    course_reply: Option<String>,
    module_reply: Option<String>,
    /// Per-module resource replies, keyed by module name.
    resource_replies: HashMap<String, String>,
    image_reply: Option<String>,
    course_calls: AtomicUsize,
    last_course_query: Mutex<Option<String>>,
}

#[async_trait]
impl Oracle for FakeOracle {
    async fn classify_course(&self, query: &str, _course_names: &[String]) -> Result<String> {
        self.course_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_course_query.lock().unwrap() = Some(query.to_string());
        match &self.course_reply {
            Some(reply) => Ok(reply.clone()),
            None => bail!("oracle unavailable"),
        }
    }

    async fn classify_modules(&self, _query: &str, _module_names: &[String]) -> Result<String> {
        match &self.module_reply {
            Some(reply) => Ok(reply.clone()),
            None => bail!("oracle unavailable"),
        }
    }

    async fn classify_resources(
        &self,
        _query: &str,
        _titles: &[String],
        _course_name: &str,
        module_name: &str,
    ) -> Result<String> {
        match self.resource_replies.get(module_name) {
            Some(reply) => Ok(reply.clone()),
            None => bail!("oracle unavailable"),
        }
    }

    async fn describe_image(&self, _image: &[u8], _mime_type: &str) -> Result<String> {
        match &self.image_reply {
            Some(reply) => Ok(reply.clone()),
            None => bail!("oracle unavailable"),
        }
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn page(id: i64, title: &str) -> Item {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "title": title,
        "type": "Page",
        "html_url": format!("https://lms.example.edu/pages/{}", id),
    }))
    .unwrap()
}

fn file_item(id: i64, title: &str, content_id: i64) -> Item {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "title": title,
        "type": "File",
        "html_url": format!("https://lms.example.edu/items/{}", id),
        "content_id": content_id,
    }))
    .unwrap()
}

fn module(id: i64, name: &str) -> Module {
    Module {
        id,
        name: name.to_string(),
    }
}

fn two_course_catalog() -> FakeCatalog {
    let mut catalog = FakeCatalog {
        courses: vec![
            ("CSE 520: Operating Systems".to_string(), 10),
            ("MAT 343: Linear Algebra".to_string(), 20),
        ],
        ..Default::default()
    };
    catalog.modules.insert(
        10,
        vec![module(101, "Week 2: Scheduling"), module(102, "Week 5: Memory")],
    );
    catalog.items.insert(
        101,
        vec![
            page(1, "Scheduling Algorithms Overview"),
            page(2, "Round Robin Walkthrough"),
            page(3, "Priority Inversion Notes"),
            page(4, "Quiz Prep"),
        ],
    );
    catalog
}

fn build(catalog: FakeCatalog, oracle: FakeOracle) -> (Pipeline, Arc<FakeCatalog>, Arc<FakeOracle>) {
    let catalog = Arc::new(catalog);
    let oracle = Arc::new(oracle);
    let pipeline = Pipeline::new(
        catalog.clone(),
        oracle.clone(),
        Arc::new(Config::minimal()),
    );
    (pipeline, catalog, oracle)
}

fn resources(findings: Findings) -> Vec<study_scout::models::Resource> {
    match findings {
        Findings::Resources(resources) => resources,
        Findings::Empty(record) => panic!("expected resources, got empty state: {}", record.error),
    }
}

// ─── Scenarios ──────────────────────────────────────────────────────

#[tokio::test]
async fn inexact_course_guess_resolves_through_fallback_matching() {
    let catalog = two_course_catalog();
    let oracle = FakeOracle {
        // not an exact catalog name; must resolve via the matching ladder
        course_reply: Some(r#"{"course_name": "CSE520", "confidence": 0.9, "reasoning": "os"}"#.to_string()),
        module_reply: Some(r#"{"module_names": ["Week 2: Scheduling"]}"#.to_string()),
        resource_replies: HashMap::from([(
            "Week 2: Scheduling".to_string(),
            r#"{"resource_indices": [1, 0], "relevance_scores": [0.7, 0.95]}"#.to_string(),
        )]),
        ..Default::default()
    };
    let (pipeline, _, _) = build(catalog, oracle);

    let findings = pipeline
        .find_resources(
            "How do process scheduling algorithms work in operating systems?",
            None,
        )
        .await
        .unwrap();

    let resources = resources(findings);
    assert_eq!(resources.len(), 2);
    // merged output is sorted by score, not guess order
    assert_eq!(resources[0].title, "Scheduling Algorithms Overview");
    assert_eq!(resources[0].relevance_score, 0.95);
    assert_eq!(resources[0].course, "CSE 520: Operating Systems");
    assert_eq!(resources[0].module, "Week 2: Scheduling");
    assert_eq!(resources[1].title, "Round Robin Walkthrough");
}

#[tokio::test]
async fn malformed_resource_reply_falls_back_to_first_three() {
    let catalog = two_course_catalog();
    let oracle = FakeOracle {
        course_reply: Some(r#"{"course_name": "CSE 520: Operating Systems"}"#.to_string()),
        module_reply: Some(r#"{"module_names": ["Week 2: Scheduling"]}"#.to_string()),
        resource_replies: HashMap::from([(
            "Week 2: Scheduling".to_string(),
            "I think the first two look good!".to_string(),
        )]),
        ..Default::default()
    };
    let (pipeline, _, _) = build(catalog, oracle);

    let findings = pipeline.find_resources("scheduling", None).await.unwrap();
    let resources = resources(findings);

    assert_eq!(resources.len(), 3);
    let titles: Vec<&str> = resources.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Scheduling Algorithms Overview",
            "Round Robin Walkthrough",
            "Priority Inversion Notes"
        ]
    );
    for resource in &resources {
        assert_eq!(resource.relevance_score, 0.8);
    }
}

#[tokio::test]
async fn empty_catalog_short_circuits_before_any_classification() {
    let (pipeline, catalog, oracle) = build(FakeCatalog::default(), FakeOracle::default());

    let findings = pipeline.find_resources("anything at all", None).await.unwrap();
    match findings {
        Findings::Empty(record) => assert_eq!(record.error, "No courses found"),
        Findings::Resources(_) => panic!("expected an empty state"),
    }
    assert_eq!(oracle.course_calls.load(Ordering::SeqCst), 0);
    assert_eq!(catalog.module_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_module_listing_reports_resolved_course() {
    let catalog = FakeCatalog {
        courses: vec![("CSE 520: Operating Systems".to_string(), 10)],
        ..Default::default()
    };
    let oracle = FakeOracle {
        course_reply: Some(r#"{"course_name": "CSE 520: Operating Systems"}"#.to_string()),
        ..Default::default()
    };
    let (pipeline, _, _) = build(catalog, oracle);

    let findings = pipeline.find_resources("scheduling", None).await.unwrap();
    match findings {
        Findings::Empty(record) => {
            assert_eq!(record.error, "No modules found");
            assert_eq!(record.course.as_deref(), Some("CSE 520: Operating Systems"));
        }
        Findings::Resources(_) => panic!("expected an empty state"),
    }
}

#[tokio::test]
async fn per_module_scores_merge_into_one_descending_list() {
    let mut catalog = two_course_catalog();
    catalog.items.insert(
        102,
        vec![page(5, "Paging and TLBs"), page(6, "Segmentation History")],
    );
    let oracle = FakeOracle {
        course_reply: Some(r#"{"course_name": "CSE 520: Operating Systems"}"#.to_string()),
        module_reply: Some(
            r#"{"module_names": ["Week 2: Scheduling", "Week 5: Memory"]}"#.to_string(),
        ),
        resource_replies: HashMap::from([
            (
                "Week 2: Scheduling".to_string(),
                r#"{"resource_indices": [0, 1], "relevance_scores": [0.9, 0.4]}"#.to_string(),
            ),
            (
                "Week 5: Memory".to_string(),
                r#"{"resource_indices": [0, 1], "relevance_scores": [0.95, 0.3]}"#.to_string(),
            ),
        ]),
        ..Default::default()
    };
    let (pipeline, _, _) = build(catalog, oracle);

    let findings = pipeline.find_resources("memory and scheduling", None).await.unwrap();
    let resources = resources(findings);
    let scores: Vec<f64> = resources.iter().map(|r| r.relevance_score).collect();
    assert_eq!(scores, vec![0.95, 0.9, 0.4, 0.3]);
    assert_eq!(resources[0].module, "Week 5: Memory");
    assert_eq!(resources[1].module, "Week 2: Scheduling");
}

#[tokio::test]
async fn total_oracle_outage_still_produces_ranked_fallback_results() {
    let catalog = two_course_catalog();
    // every oracle call fails
    let (pipeline, _, _) = build(catalog, FakeOracle::default());

    let findings = pipeline
        .find_resources("how does round robin scheduling work", None)
        .await
        .unwrap();
    let resources = resources(findings);

    // course falls back to keyword/default matching, modules to the keyword
    // pass, resources to the first three items at the fallback score
    assert_eq!(resources.len(), 3);
    for resource in &resources {
        assert_eq!(resource.relevance_score, 0.8);
        assert_eq!(resource.course, "CSE 520: Operating Systems");
    }
}

#[tokio::test]
async fn empty_merge_returns_no_matches_record_not_empty_list() {
    let mut catalog = two_course_catalog();
    // both modules exist, but neither has any items
    catalog.items.clear();
    let oracle = FakeOracle {
        course_reply: Some(r#"{"course_name": "CSE 520: Operating Systems"}"#.to_string()),
        module_reply: Some(r#"{"module_names": ["Week 2: Scheduling"]}"#.to_string()),
        ..Default::default()
    };
    let (pipeline, _, _) = build(catalog, oracle);

    let findings = pipeline.find_resources("scheduling", None).await.unwrap();
    match findings {
        Findings::Empty(record) => {
            assert_eq!(record.error, "No relevant resources found");
            assert_eq!(record.query.as_deref(), Some("scheduling"));
            assert_eq!(record.course.as_deref(), Some("CSE 520: Operating Systems"));
        }
        Findings::Resources(_) => panic!("expected an empty state"),
    }
}

#[tokio::test]
async fn file_items_get_download_urls_resolved() {
    let mut catalog = FakeCatalog {
        courses: vec![("CSE 520: Operating Systems".to_string(), 10)],
        ..Default::default()
    };
    catalog.modules.insert(10, vec![module(101, "Week 2: Scheduling")]);
    catalog.items.insert(
        101,
        vec![
            file_item(1, "Lecture Slides", 900),
            file_item(2, "Homework Sheet", 901),
        ],
    );
    catalog
        .file_urls
        .insert(900, "https://files.example.edu/slides.pdf".to_string());
    // 901 has no download URL; the item URL stays

    let oracle = FakeOracle {
        course_reply: Some(r#"{"course_name": "CSE 520: Operating Systems"}"#.to_string()),
        module_reply: Some(r#"{"module_names": ["Week 2: Scheduling"]}"#.to_string()),
        resource_replies: HashMap::from([(
            "Week 2: Scheduling".to_string(),
            r#"{"resource_indices": [0, 1], "relevance_scores": [0.9, 0.8]}"#.to_string(),
        )]),
        ..Default::default()
    };
    let (pipeline, catalog, _) = build(catalog, oracle);

    let findings = pipeline.find_resources("scheduling slides", None).await.unwrap();
    let resources = resources(findings);

    assert_eq!(resources[0].url, "https://files.example.edu/slides.pdf");
    assert_eq!(resources[1].url, "https://lms.example.edu/items/2");
    assert_eq!(catalog.file_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn image_concept_joins_the_text_query() {
    let image = tempfile::NamedTempFile::with_suffix(".png").unwrap();
    std::fs::write(image.path(), b"\x89PNG\r\n").unwrap();

    let catalog = two_course_catalog();
    let oracle = FakeOracle {
        image_reply: Some("orthogonalization of matrices in linear algebra".to_string()),
        course_reply: Some(r#"{"course_name": "MAT 343: Linear Algebra"}"#.to_string()),
        ..Default::default()
    };
    let (pipeline, _, oracle) = build(catalog, oracle);

    let _ = pipeline
        .find_resources("what is this", Some(image.path()))
        .await
        .unwrap();

    let seen = oracle.last_course_query.lock().unwrap().clone().unwrap();
    assert_eq!(
        seen,
        "what is this - orthogonalization of matrices in linear algebra"
    );
}

#[tokio::test]
async fn failed_image_analysis_degrades_to_sentinel_query() {
    let image = tempfile::NamedTempFile::with_suffix(".png").unwrap();
    std::fs::write(image.path(), b"\x89PNG\r\n").unwrap();

    let catalog = two_course_catalog();
    // describe_image fails; course classification still runs
    let oracle = FakeOracle {
        course_reply: Some(r#"{"course_name": "CSE 520: Operating Systems"}"#.to_string()),
        ..Default::default()
    };
    let (pipeline, _, oracle) = build(catalog, oracle);

    let _ = pipeline.find_resources("", Some(image.path())).await.unwrap();

    let seen = oracle.last_course_query.lock().unwrap().clone().unwrap();
    assert_eq!(seen, study_scout::concept::ANALYSIS_FALLBACK);
}

#[tokio::test]
async fn snapshots_are_written_when_artifacts_configured() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::minimal();
    config.artifacts.dir = Some(dir.path().to_path_buf());

    let catalog = Arc::new(two_course_catalog());
    let oracle = Arc::new(FakeOracle {
        course_reply: Some(r#"{"course_name": "CSE 520: Operating Systems"}"#.to_string()),
        module_reply: Some(r#"{"module_names": ["Week 2: Scheduling"]}"#.to_string()),
        resource_replies: HashMap::from([(
            "Week 2: Scheduling".to_string(),
            r#"{"resource_indices": [0], "relevance_scores": [0.9]}"#.to_string(),
        )]),
        ..Default::default()
    });
    let pipeline = Pipeline::new(catalog, oracle, Arc::new(config));

    let findings = pipeline.find_resources("scheduling", None).await.unwrap();
    assert!(!findings.is_empty());

    assert!(dir.path().join("courses.json").exists());
    assert!(dir.path().join("modules_10.json").exists());
    assert!(dir.path().join("resources_scheduling.json").exists());
}
