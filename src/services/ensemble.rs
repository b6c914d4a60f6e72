//! Ensemble aggregation: merges predictions gathered across model/variant
//! combinations into one ranked, deduplicated result list.
//!
//! The confidence arithmetic here is a deterministic heuristic, not a
//! calibrated probability. The bonuses reward agreement across variants; they
//! are not Bayesian-sound, and changing their constants changes every ranked
//! confidence downstream.

use crate::models::classify_types::{Prediction, RankedResult, ResultAnalysis};
use crate::services::taxonomy::Taxonomy;
use std::collections::HashMap;

struct SemanticGroup {
    /// Member labels in first-seen order, deduplicated.
    labels: Vec<String>,
    /// Distinct contributing sources in first-seen order.
    sources: Vec<String>,
    /// Category of the first member.
    category: String,
    weighted_score: f32,
    raw_scores: Vec<f32>,
    votes: usize,
    max_score: f32,
    min_score: f32,
}

impl SemanticGroup {
    fn new(category: String) -> Self {
        Self {
            labels: Vec::new(),
            sources: Vec::new(),
            category,
            weighted_score: 0.0,
            raw_scores: Vec::new(),
            votes: 0,
            max_score: 0.0,
            min_score: 1.0,
        }
    }
}

/// Merge a flat prediction list into ranked, deduplicated results.
///
/// Groups by semantic key, accumulates weighted scores, synthesizes a
/// per-group confidence, filters by `min_confidence` and returns the top
/// `top_k` groups sorted by confidence, stability and consensus. Pure
/// function of its inputs; calling it twice yields identical output.
pub fn aggregate(
    predictions: &[Prediction],
    taxonomy: &Taxonomy,
    min_confidence: f32,
    top_k: usize,
) -> Vec<RankedResult> {
    // Insertion-ordered grouping keeps equal-scoring groups in a
    // deterministic order.
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, SemanticGroup> = HashMap::new();

    for pred in predictions {
        if pred.score < min_confidence {
            continue;
        }

        let key = taxonomy.semantic_key(&pred.label);
        let group = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            SemanticGroup::new(pred.category.clone())
        });

        group.weighted_score += pred.score * pred.weight;
        group.raw_scores.push(pred.score);
        group.votes += 1;
        group.max_score = group.max_score.max(pred.score);
        group.min_score = group.min_score.min(pred.score);
        if !group.labels.contains(&pred.label) {
            group.labels.push(pred.label.clone());
        }
        let source = pred.source.to_string();
        if !group.sources.contains(&source) {
            group.sources.push(source);
        }
    }

    let mut ranked: Vec<RankedResult> = order
        .into_iter()
        .map(|key| {
            let group = groups.remove(&key).expect("group exists for ordered key");

            let mean = group.raw_scores.iter().sum::<f32>() / group.raw_scores.len() as f32;
            let variance = group
                .raw_scores
                .iter()
                .map(|score| (score - mean).powi(2))
                .sum::<f32>()
                / group.raw_scores.len() as f32;

            let base_confidence = group.weighted_score / group.votes as f32;
            let stability_bonus = (0.1 - variance).max(0.0);
            let consensus_bonus = (group.votes as f32 * 0.05).min(0.2);
            let range_bonus = if group.max_score - group.min_score < 0.3 {
                0.05
            } else {
                0.0
            };
            let confidence =
                (base_confidence + stability_bonus + consensus_bonus + range_bonus).clamp(0.0, 1.0);

            RankedResult {
                label: select_display_name(&group.labels, taxonomy),
                confidence,
                raw_confidence: confidence,
                category: group.category,
                votes: group.votes,
                stability: 1.0 - variance,
                sources: group.sources,
                alternative_labels: group.labels,
            }
        })
        .filter(|result| result.confidence >= min_confidence)
        .collect();

    // Multi-criteria ranking: confidence, stability, consensus. The sort is
    // stable, so groups with equal keys keep their insertion order.
    ranked.sort_by(|a, b| {
        let score_a = a.confidence + a.stability * 0.1 + a.votes as f32 * 0.05;
        let score_b = b.confidence + b.stability * 0.1 + b.votes as f32 * 0.05;
        score_b
            .partial_cmp(&score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(top_k);
    ranked
}

/// Post-rank confidence calibration. Does not re-sort: a small penalty per
/// rank position reflects the decreasing reliability of lower ranks, a bonus
/// rewards source diversity, and non-`general` categories get a flat nudge.
pub fn calibrate(mut results: Vec<RankedResult>) -> Vec<RankedResult> {
    for (index, result) in results.iter_mut().enumerate() {
        result.raw_confidence = result.confidence;

        let mut confidence = result.confidence - 0.02 * index as f32;
        confidence = confidence.max(0.01);

        let diversity_bonus = (result.sources.len() as f32 * 0.03).min(0.1);
        confidence = (confidence + diversity_bonus).min(1.0);

        if result.category != "general" {
            confidence = (confidence + 0.02).min(1.0);
        }

        result.confidence = confidence.clamp(0.0, 1.0);
    }
    results
}

/// Prefer the shortest member label that contains no generic term; fall back
/// to the first-seen label when every member is generic.
fn select_display_name(labels: &[String], taxonomy: &Taxonomy) -> String {
    let mut specific: Option<&String> = None;
    for label in labels {
        if taxonomy.is_generic(label) {
            continue;
        }
        match specific {
            Some(best) if best.len() <= label.len() => {}
            _ => specific = Some(label),
        }
    }
    specific
        .or_else(|| labels.first())
        .cloned()
        .unwrap_or_default()
}

/// Summarize a ranked result list: confidence bands, category histogram and
/// the most frequent category.
pub fn analyze(results: &[RankedResult]) -> ResultAnalysis {
    let mut analysis = ResultAnalysis {
        total_predictions: results.len(),
        ..Default::default()
    };

    if results.is_empty() {
        return analysis;
    }

    let mut total_confidence = 0.0;
    let mut category_order: Vec<String> = Vec::new();
    for result in results {
        total_confidence += result.confidence;
        if result.confidence >= 0.7 {
            analysis.high_confidence_predictions += 1;
        } else if result.confidence >= 0.4 {
            analysis.medium_confidence_predictions += 1;
        } else {
            analysis.low_confidence_predictions += 1;
        }
        let count = analysis.categories.entry(result.category.clone()).or_insert(0);
        if *count == 0 {
            category_order.push(result.category.clone());
        }
        *count += 1;
    }
    analysis.average_confidence = total_confidence / results.len() as f32;

    // Ties keep the category seen earliest in the ranked list.
    let mut top: Option<(&String, usize)> = None;
    for category in &category_order {
        let count = analysis.categories[category];
        match top {
            Some((_, best)) if best >= count => {}
            _ => top = Some((category, count)),
        }
    }
    analysis.top_category = top.map(|(category, _)| category.clone());

    analysis
}
