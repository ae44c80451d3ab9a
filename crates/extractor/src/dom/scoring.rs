// ABOUTME: Readability-style scoring that locates the main article body when no site selector applies.
// ABOUTME: Strips unlikely nodes, seeds paragraph scores, propagates two levels, merges siblings and sweeps links.

//! Generic content scoring.
//!
//! The engine works on a private copy of the document. Each pass visits
//! nodes in document order and checks the optional deadline between visits.
//! All thresholds live in [`ScoringConfig`].

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use dom_query::{Document, NodeId, NodeRef};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cleaners::{is_caption, is_unlikely_candidate};
use super::{body_inner_html, direct_text, fragment_document, has_descendant_tag, link_density, node_text, tag_name};
use crate::error::ExtractError;

// Non-content tags removed before scoring
const NON_CONTENT_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "link", "meta", "object", "embed", "iframe",
];

// Seeded on full text length
const PARAGRAPH_TAGS: &[&str] = &["p", "pre", "td"];

// Seeded on their own (direct) text only
const BLOCK_TAGS: &[&str] = &[
    "div", "section", "article", "main", "blockquote", "li", "dd", "figure", "header", "footer",
    "aside",
];

// Containers the final sweep may strip
const SWEEP_TAGS: &[&str] = &[
    "div", "section", "aside", "nav", "header", "footer", "ul", "ol", "dl", "table", "form",
    "figure", "blockquote",
];

pub static NON_TOP_CANDIDATE_TAGS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(br|b|i|em|strong|span|a|label|hr|area|base|basefont|input|img|link|meta|html)$")
        .unwrap()
});

/// Tunable scoring constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Minimum text length, in characters, for a node to be seeded.
    pub min_text_length: usize,
    /// Characters per length bonus point.
    pub length_bonus_chars: usize,
    /// Cap on the length bonus.
    pub max_length_bonus: f64,
    /// Weight of a seed's score added to its parent.
    pub parent_weight: f64,
    /// Weight of a seed's score added to its grandparent.
    pub grandparent_weight: f64,
    /// Unlikely nodes are stripped only above this link density.
    pub unlikely_link_density: f64,
    /// Siblings scoring at least this fraction of the top score are merged.
    pub sibling_score_ratio: f64,
    /// Paragraph siblings longer than this are merged when link-light.
    pub sibling_paragraph_length: usize,
    /// Link density below which a long paragraph sibling is merged.
    pub sibling_link_density: f64,
    /// Containers above this link density are stripped from the result.
    pub sweep_link_density: f64,
    /// Longest text still treated as a caption.
    pub caption_max_length: usize,
    /// Wall-clock budget for one scoring run.
    pub time_budget_ms: Option<u64>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_text_length: 25,
            length_bonus_chars: 100,
            max_length_bonus: 3.0,
            parent_weight: 1.0,
            grandparent_weight: 0.5,
            unlikely_link_density: 0.5,
            sibling_score_ratio: 0.2,
            sibling_paragraph_length: 80,
            sibling_link_density: 0.25,
            sweep_link_density: 0.25,
            caption_max_length: 150,
            time_budget_ms: None,
        }
    }
}

impl ScoringConfig {
    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_ms.map(Duration::from_millis)
    }
}

/// A node's score state. Base scores are computed once per run.
#[derive(Clone)]
pub struct ScoredNode<'a> {
    pub node: NodeRef<'a>,
    pub base_score: f64,
    pub content_score: f64,
    pub link_density: f64,
    order: usize,
}

impl fmt::Debug for ScoredNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScoredNode")
            .field("node", &self.node.id)
            .field("tag", &tag_name(&self.node))
            .field("base_score", &self.base_score)
            .field("content_score", &self.content_score)
            .field("link_density", &self.link_density)
            .finish()
    }
}

/// The chosen top node plus everything merged around it.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub top_tag: String,
    pub top_score: f64,
    pub merged_count: usize,
    pub html: String,
}

struct Deadline(Option<Instant>);

impl Deadline {
    fn new(budget: Option<Duration>) -> Self {
        Deadline(budget.map(|b| Instant::now() + b))
    }

    fn check(&self) -> Result<(), ExtractError> {
        match self.0 {
            Some(at) if Instant::now() >= at => {
                Err(ExtractError::timeout("ScoreContent", "scoring deadline exceeded"))
            }
            _ => Ok(()),
        }
    }
}

/// Locate the main content and return its HTML.
///
/// `Ok(None)` means nothing plausible was found; `Err` is a deadline overrun.
pub fn extract_main_content(
    doc: &Document,
    config: &ScoringConfig,
) -> Result<Option<String>, ExtractError> {
    Ok(find_candidate(doc, config)?.map(|c| c.html))
}

/// Score a copy of the document and build the merged, swept candidate.
pub fn find_candidate(
    doc: &Document,
    config: &ScoringConfig,
) -> Result<Option<Candidate>, ExtractError> {
    let deadline = Deadline::new(config.time_budget());
    let source = doc.html().to_string();
    let work = Document::from(source.as_str());
    let Some(body) = work.select("body").nodes().first().copied() else {
        return Ok(None);
    };

    strip_non_content(&body);
    strip_unlikely(&body, config, &deadline)?;

    let scores = score_nodes(&body, config, &deadline)?;
    let Some(top) = top_candidate(&body, &scores) else {
        debug!("no scored content");
        return Ok(None);
    };

    let merged = merge_siblings(top, &scores, config, &deadline)?;
    let merged_count = merged.len();
    let html = if merged_count == 1 {
        merged[0].html().to_string()
    } else {
        let inner: String = merged.iter().map(|n| n.html().to_string()).collect();
        format!("<div>{}</div>", inner)
    };
    let html = sweep(&html, config, &deadline)?;

    debug!(
        top = %tag_name(&top.node).unwrap_or_default(),
        score = top.content_score,
        merged = merged_count,
        "selected content candidate"
    );
    Ok(Some(Candidate {
        top_tag: tag_name(&top.node).unwrap_or_default(),
        top_score: top.content_score,
        merged_count,
        html,
    }))
}

fn strip_non_content(body: &NodeRef) {
    for node in body.descendants() {
        if tag_name(&node).is_some_and(|t| NON_CONTENT_TAGS.contains(&t.as_str())) {
            node.remove_from_parent();
        }
    }
}

fn strip_unlikely(body: &NodeRef, config: &ScoringConfig, deadline: &Deadline) -> Result<(), ExtractError> {
    for node in body.descendants() {
        deadline.check()?;
        if !node.is_element() || !is_unlikely_candidate(&node) {
            continue;
        }
        if link_density(&node) > config.unlikely_link_density {
            node.remove_from_parent();
        }
    }
    Ok(())
}

/// Base score of a seed: 1 + commas + capped length bonus, damped by link density.
fn base_score(text: &str, density: f64, config: &ScoringConfig) -> f64 {
    let commas = text.matches(',').count() as f64;
    let per = config.length_bonus_chars.max(1);
    let length_bonus = ((text.chars().count() / per) as f64).min(config.max_length_bonus);
    (1.0 + commas + length_bonus) * (1.0 - density)
}

fn seed_text(node: &NodeRef, config: &ScoringConfig) -> Option<String> {
    let tag = tag_name(node)?;
    let text = if PARAGRAPH_TAGS.contains(&tag.as_str()) {
        node_text(node)
    } else if BLOCK_TAGS.contains(&tag.as_str()) {
        direct_text(node)
    } else {
        return None;
    };
    (text.chars().count() >= config.min_text_length).then_some(text)
}

fn score_nodes<'a>(
    body: &NodeRef<'a>,
    config: &ScoringConfig,
    deadline: &Deadline,
) -> Result<HashMap<NodeId, ScoredNode<'a>>, ExtractError> {
    let mut scores: HashMap<NodeId, ScoredNode<'a>> = HashMap::new();
    let order: HashMap<NodeId, usize> = std::iter::once(*body)
        .chain(body.descendants())
        .enumerate()
        .map(|(i, n)| (n.id, i))
        .collect();

    let entry = |scores: &mut HashMap<NodeId, ScoredNode<'a>>, node: NodeRef<'a>| {
        let id = node.id;
        let position = order.get(&id).copied().unwrap_or(usize::MAX);
        scores.entry(id).or_insert_with(|| ScoredNode {
            node,
            base_score: 0.0,
            content_score: 0.0,
            link_density: link_density(&node),
            order: position,
        });
    };

    for node in body.descendants() {
        deadline.check()?;
        let Some(text) = seed_text(&node, config) else {
            continue;
        };
        if scores.get(&node.id).is_some_and(|s| s.base_score > 0.0) {
            continue;
        }
        entry(&mut scores, node);
        let density = scores[&node.id].link_density;
        let base = base_score(&text, density, config);
        if let Some(seed) = scores.get_mut(&node.id) {
            seed.base_score = base;
        }
        if base <= 0.0 {
            continue;
        }

        let parent = node.parent().filter(|p| p.is_element());
        if let Some(parent) = parent {
            entry(&mut scores, parent);
            if let Some(p) = scores.get_mut(&parent.id) {
                p.content_score += base * config.parent_weight;
            }
            if let Some(grand) = parent.parent().filter(|g| g.is_element()) {
                entry(&mut scores, grand);
                if let Some(g) = scores.get_mut(&grand.id) {
                    g.content_score += base * config.grandparent_weight;
                }
            }
        }
    }
    Ok(scores)
}

/// Highest content score wins, earliest in document order on ties.
/// `body` is used only when nothing else scored; `html` never.
fn top_candidate<'s, 'a>(
    body: &NodeRef<'a>,
    scores: &'s HashMap<NodeId, ScoredNode<'a>>,
) -> Option<&'s ScoredNode<'a>> {
    let eligible = |s: &&ScoredNode<'a>| {
        s.content_score > 0.0
            && s.node.id != body.id
            && tag_name(&s.node).is_some_and(|t| !NON_TOP_CANDIDATE_TAGS_RE.is_match(&t))
    };
    let best = scores.values().filter(eligible).fold(None, |best: Option<&ScoredNode<'a>>, s| match best {
        Some(b)
            if b.content_score > s.content_score
                || (b.content_score == s.content_score && b.order < s.order) =>
        {
            Some(b)
        }
        _ => Some(s),
    });
    best.or_else(|| scores.get(&body.id).filter(|s| s.content_score > 0.0))
}

/// Collect the top node and the qualifying siblings, in document order.
fn merge_siblings<'a>(
    top: &ScoredNode<'a>,
    scores: &HashMap<NodeId, ScoredNode<'a>>,
    config: &ScoringConfig,
    deadline: &Deadline,
) -> Result<Vec<NodeRef<'a>>, ExtractError> {
    let is_body = tag_name(&top.node).as_deref() == Some("body");
    let Some(parent) = top.node.parent().filter(|_| !is_body) else {
        return Ok(vec![top.node]);
    };

    let threshold = top.content_score * config.sibling_score_ratio;
    let mut merged = Vec::new();
    for sibling in parent.children() {
        deadline.check()?;
        if !sibling.is_element() {
            continue;
        }
        if sibling.id == top.node.id {
            merged.push(sibling);
            continue;
        }
        let scored = scores.get(&sibling.id);
        if scored.is_some_and(|s| s.content_score > 0.0 && s.content_score >= threshold) {
            merged.push(sibling);
            continue;
        }
        if tag_name(&sibling).as_deref() == Some("p") {
            let len = node_text(&sibling).chars().count();
            let density = scored.map_or_else(|| link_density(&sibling), |s| s.link_density);
            if len > config.sibling_paragraph_length && density < config.sibling_link_density {
                merged.push(sibling);
            }
        }
    }
    Ok(merged)
}

/// Strip link-heavy containers from the merged content, innermost first.
fn sweep(html: &str, config: &ScoringConfig, deadline: &Deadline) -> Result<String, ExtractError> {
    let doc = fragment_document(html);
    let Some(body) = doc.select("body").nodes().first().copied() else {
        return Ok(html.to_string());
    };
    // a lone top-level element is the candidate wrapper and always stays
    let top: Vec<NodeRef> = body.children().into_iter().filter(|n| n.is_element()).collect();
    let wrapper = match top.as_slice() {
        [only] => Some(only.id),
        _ => None,
    };
    let mut nodes = body.descendants();
    nodes.reverse();
    for node in nodes {
        deadline.check()?;
        if Some(node.id) == wrapper {
            continue;
        }
        let Some(tag) = tag_name(&node) else { continue };
        if !SWEEP_TAGS.contains(&tag.as_str()) {
            continue;
        }
        if link_density(&node) <= config.sweep_link_density {
            continue;
        }
        if has_descendant_tag(&node, &["img", "picture"]) || is_caption(&node, config.caption_max_length) {
            continue;
        }
        node.remove_from_parent();
    }
    Ok(body_inner_html(&doc))
}
