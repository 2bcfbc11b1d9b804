//! Documents to index and the built-in demo corpus.
//!
//! Document files are YAML or JSON lists of `{title, text, metadata}`.
//! The curated corpus is a handful of synthetic clinical notes, enough to
//! exercise retrieval and filtering without any external dataset.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::metadata;
use crate::vault::metadata::Metadata;
use crate::vault::service::{VaultError, VaultService};

/// A logical document before chunking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub title: Option<String>,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Counts reported after seeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub docs: usize,
    pub chunks: usize,
    pub vault_size: usize,
}

/// Load documents from a `.json` file or a YAML file (any other extension).
pub fn load_documents(path: &Path) -> Result<Vec<Document>, VaultError> {
    let raw = std::fs::read_to_string(path).map_err(|e| VaultError::read(path, e))?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let documents: Vec<Document> = if is_json {
        serde_json::from_str(&raw).map_err(|e| VaultError::json(path, e))?
    } else {
        serde_yml::from_str(&raw).map_err(|e| VaultError::yaml(path, e))?
    };

    log::info!("Loaded {} docs from {}", documents.len(), path.display());
    Ok(documents)
}

/// Index every document, skipping the ones that are rejected (no text).
pub fn index_documents(service: &VaultService, documents: &[Document]) -> SeedReport {
    let mut docs = 0;
    let mut chunks = 0;

    for document in documents {
        match service.index_document(document) {
            Ok(receipt) => {
                docs += 1;
                chunks += receipt.chunk_count;
            }
            Err(e) => {
                let title = document.title.as_deref().unwrap_or("untitled");
                log::warn!("skipping document {title:?}: {e}");
            }
        }
    }

    SeedReport {
        docs,
        chunks,
        vault_size: service.vault_size(),
    }
}

/// Index the curated demo corpus.
pub fn seed(service: &VaultService) -> SeedReport {
    index_documents(service, &curated_documents())
}

fn note(title: &str, text: &str, metadata: Metadata) -> Document {
    Document {
        title: Some(title.to_string()),
        text: text.to_string(),
        metadata,
    }
}

/// Synthetic clinical notes used for demos and tests.
pub fn curated_documents() -> Vec<Document> {
    vec![
        note(
            "ECG Note — ST Elevation",
            "ECG shows ST elevation in leads II, III, aVF. Patient reports acute chest pain \
             radiating to left arm. Troponin pending. Consider inferior wall MI; urgent \
             cardiology review advised.",
            metadata! {
                "patient_id" => "PT-001",
                "visit_date" => "2025-12-20",
                "tags" => vec!["ECG", "Chest Pain", "MI"],
                "source" => "OPD",
            },
        ),
        note(
            "Diabetes Follow-up",
            "Type 2 diabetes mellitus follow-up. HbA1c 8.2%. Current meds: Metformin 500mg BID. \
             Counsel diet/exercise. Consider adding SGLT2 inhibitor if renal function permits. \
             Foot exam normal.",
            metadata! {
                "patient_id" => "PT-001",
                "visit_date" => "2025-11-05",
                "tags" => vec!["Diabetes", "HbA1c", "Metformin"],
                "source" => "OPD",
            },
        ),
        note(
            "Dengue Risk — Climate + Symptoms",
            "Symptoms: fever 101.8F, body ache, headache. Local rainfall high and stagnant water \
             reported; mosquito risk elevated. Advice: hydration, avoid NSAIDs, monitor platelet \
             count if fever persists.",
            metadata! {
                "patient_id" => "PT-044",
                "visit_date" => "2025-12-12",
                "tags" => vec!["Dengue", "Fever", "Climate"],
                "source" => "Community",
            },
        ),
        note(
            "Allergy Record — Penicillin",
            "Documented allergy: Penicillin (urticaria + wheeze). Avoid beta-lactams if \
             possible; consider macrolide alternatives depending on indication.",
            metadata! {
                "patient_id" => "PT-017",
                "visit_date" => "2025-10-01",
                "tags" => vec!["Allergy", "Penicillin"],
                "source" => "EMR",
            },
        ),
        note(
            "Vitals Snapshot",
            "Vitals: BP 148/92 mmHg, HR 104 bpm, SpO2 95% RA, Temp 99.6F. Patient anxious. \
             Recommend repeat BP after rest, evaluate tachycardia causes, hydration status, \
             and pain score.",
            metadata! {
                "patient_id" => "PT-001",
                "visit_date" => "2025-12-20",
                "tags" => vec!["Vitals", "BP", "HR", "SpO2"],
                "source" => "Triage",
            },
        ),
    ]
}
