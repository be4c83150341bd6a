//! DOM structure embeddings
//!
//! Projects a page's DOM into a fixed-dimension vector for
//! near-duplicate detection. Each element node contributes one count
//! to a bucket chosen from a stable hash of its tag, identifying
//! attributes and leading text, mixed with depth and tag weights so
//! structurally different pages land in different buckets.

use crate::util::{cosine_similarity, fnv1a64};
use lru::LruCache;
use ego_tree::NodeRef;
use scraper::{Html, Node};
use std::collections::VecDeque;
use std::num::NonZeroUsize;

/// Per-tag multiplier in the bucket projection. Interactive and
/// high-signal tags separate pages more than generic containers.
fn tag_weight(tag: &str) -> u64 {
    match tag {
        "form" => 13,
        "input" | "select" | "textarea" | "button" => 11,
        "a" => 7,
        "script" => 5,
        "table" | "ul" | "ol" => 3,
        _ => 1,
    }
}

const DEPTH_WEIGHT: u64 = 31;

/// Builds DOM embeddings of a fixed dimension.
pub struct DomEmbedder {
    dim: usize,
}

impl DomEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    /// Embed an HTML document. Single top-down traversal over element
    /// nodes; the result is L2-normalized.
    pub fn embed(&self, html: &str) -> Vec<f32> {
        let document = Html::parse_document(html);
        let mut vector = vec![0.0f32; self.dim];

        // BFS from the root so depth is the element's distance from
        // the document root.
        let mut queue: VecDeque<(NodeRef<'_, Node>, u32)> = VecDeque::new();
        queue.push_back((document.tree.root(), 0));
        while let Some((node, depth)) = queue.pop_front() {
            if let Node::Element(element) = node.value() {
                let tag = element.name();
                let mut key = String::with_capacity(80);
                key.push_str(tag);
                for attr in ["id", "class", "name", "type"] {
                    if let Some(value) = element.attr(attr) {
                        key.push('|');
                        key.push_str(attr);
                        key.push('=');
                        key.push_str(value);
                    }
                }
                key.push('|');
                key.push_str(&direct_text(&node, 50));

                let hash = fnv1a64(key.as_bytes());
                let mixed = hash
                    .wrapping_mul(DEPTH_WEIGHT.wrapping_pow(depth))
                    .wrapping_mul(tag_weight(tag));
                vector[(mixed % self.dim as u64) as usize] += 1.0;
            }
            for child in node.children() {
                queue.push_back((child, depth + 1));
            }
        }

        l2_normalize(&mut vector);
        vector
    }
}

/// Concatenated text of the node's direct text children, truncated to
/// `max_chars`.
fn direct_text(node: &NodeRef<'_, Node>, max_chars: usize) -> String {
    let mut out = String::new();
    for child in node.children() {
        if let Node::Text(text) = child.value() {
            for ch in text.trim().chars() {
                if out.len() >= max_chars {
                    return out;
                }
                out.push(ch);
            }
        }
        if out.len() >= max_chars {
            break;
        }
    }
    out
}

fn l2_normalize(vector: &mut [f32]) {
    let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for x in vector.iter_mut() {
            *x /= magnitude;
        }
    }
}

/// Stored page embeddings with a similarity threshold and a bounded
/// capacity. Matched templates stay hot, so eviction drops one-off
/// layouts first.
pub struct EmbeddingStore {
    entries: LruCache<String, Vec<f32>>,
    threshold: f32,
}

impl EmbeddingStore {
    pub fn new(threshold: f32, capacity: usize) -> Self {
        Self {
            entries: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            threshold,
        }
    }

    /// Compare a page embedding against all stored embeddings. If the
    /// best match reaches the threshold, returns the matched URL and
    /// similarity and does not store the new vector; otherwise stores
    /// it.
    pub fn check_and_insert(&mut self, url: &str, vector: Vec<f32>) -> Option<(String, f32)> {
        let mut best: Option<(String, f32)> = None;
        for (stored_url, stored_vec) in self.entries.iter() {
            let similarity = cosine_similarity(&vector, stored_vec);
            if best.as_ref().map(|(_, s)| similarity > *s).unwrap_or(true) {
                best = Some((stored_url.clone(), similarity));
            }
        }
        if let Some((matched, similarity)) = best {
            if similarity >= self.threshold {
                self.entries.promote(&matched);
                return Some((matched, similarity));
            }
        }
        self.entries.push(url.to_string(), vector);
        None
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
