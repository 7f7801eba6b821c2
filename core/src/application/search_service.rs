// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! Semantic search (spec §4.8): embed the query, rank candidate pages by
//! cosine similarity over their stored embeddings, with optional filename
//! and inferred-page-date filters.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::domain::inference::InferenceService;
use crate::domain::note_page::NotePage;
use crate::domain::repository::NotePageRepository;

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub file_id: i64,
    pub file_name: String,
    pub page_index: i32,
    pub page_id: String,
    pub score: f32,
    pub text_preview: String,
    pub date: Option<DateTime<Utc>>,
}

pub struct SearchService {
    note_pages: Arc<dyn NotePageRepository>,
    inference: Arc<dyn InferenceService>,
}

impl SearchService {
    pub fn new(note_pages: Arc<dyn NotePageRepository>, inference: Arc<dyn InferenceService>) -> Self {
        Self { note_pages, inference }
    }

    /// Returns the top `top_n` pages by cosine similarity to `query`. An
    /// inference failure degrades to an empty result set rather than an
    /// error (spec §4.8 step 1).
    pub async fn search_chunks(
        &self,
        user_id: i64,
        query: &str,
        top_n: usize,
        name_filter: Option<&str>,
        date_after: Option<DateTime<Utc>>,
        date_before: Option<DateTime<Utc>>,
    ) -> Vec<SearchHit> {
        let query_vector = match self.inference.embed_text(query).await {
            Ok(v) => v,
            Err(_) => return Vec::new(),
        };

        let candidates = match self.note_pages.search_candidates(user_id, name_filter).await {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        let mut scored: Vec<SearchHit> = candidates
            .into_iter()
            .filter(|(page, _)| date_in_range(page, date_after, date_before))
            .filter_map(|(page, file_name)| score_page(&page, &query_vector).map(|score| (page, file_name, score)))
            .map(|(page, file_name, score)| SearchHit {
                file_id: page.file_id,
                file_name,
                page_index: page.page_index,
                page_id: page.page_id.clone(),
                score,
                text_preview: preview(page.text_content.as_deref().unwrap_or("")),
                date: page.inferred_date(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_n);
        scored
    }
}

fn date_in_range(page: &NotePage, after: Option<DateTime<Utc>>, before: Option<DateTime<Utc>>) -> bool {
    if after.is_none() && before.is_none() {
        return true;
    }
    match page.inferred_date() {
        Some(date) => after.is_none_or(|a| date >= a) && before.is_none_or(|b| date <= b),
        None => false,
    }
}

fn score_page(page: &NotePage, query_vector: &[f32]) -> Option<f32> {
    let embedding = page.embedding.as_ref()?;
    let vector: Vec<f32> = serde_json::from_value(embedding.clone()).ok()?;
    Some(cosine_similarity(query_vector, &vector))
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_score_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }

    #[test]
    fn mismatched_lengths_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
    }

    #[test]
    fn preview_truncates_to_200_chars() {
        let long = "a".repeat(500);
        assert_eq!(preview(&long).len(), 200);
    }

    #[test]
    fn date_range_excludes_pages_without_inferred_date() {
        let page = NotePage {
            file_id: 1,
            page_index: 0,
            page_id: "not-a-timestamp".to_string(),
            content_hash: "h".to_string(),
            text_content: None,
            embedding: None,
        };
        assert!(!date_in_range(&page, Some(Utc::now()), None));
    }
}
