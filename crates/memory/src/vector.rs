//! Vector utilities for the similarity index.
//!
//! Pure-Rust implementations of:
//! - Euclidean (L2) distance
//! - Exact nearest-neighbour ranking over stored messages
//! - The little-endian `f32` blob encoding used in the `message_vectors` table

use bashbot_core::message::{ScoredMessage, StoredMessage};

/// Euclidean distance between two vectors.
///
/// Returns `f32::INFINITY` when the lengths differ or either is empty, so a
/// mismatched vector can never pass a distance threshold.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return f32::INFINITY;
    }

    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = *x as f64 - *y as f64;
            d * d
        })
        .sum();

    sum.sqrt() as f32
}

/// Rank messages by L2 distance to `query`.
///
/// Keeps entries with `distance < max_distance`, sorted ascending (ties
/// broken by id), truncated to `top_k`. Messages without an embedding are
/// skipped.
pub fn nearest(
    messages: Vec<StoredMessage>,
    query: &[f32],
    top_k: usize,
    max_distance: f32,
) -> Vec<ScoredMessage> {
    if query.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<ScoredMessage> = messages
        .into_iter()
        .filter_map(|message| {
            let distance = l2_distance(message.embedding.as_deref()?, query);
            (distance < max_distance).then_some(ScoredMessage { message, distance })
        })
        .collect();

    scored.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.message.id.cmp(&b.message.id))
    });
    scored.truncate(top_k);
    scored
}

/// Serialize an embedding vector to bytes.
pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize bytes written by [`embedding_to_blob`].
pub fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bashbot_core::message::Role;
    use chrono::Utc;

    fn message(id: i64, embedding: Option<Vec<f32>>) -> StoredMessage {
        StoredMessage {
            id,
            turn_id: 1,
            timestamp: Utc::now(),
            role: Role::User,
            content: format!("Content for {id}"),
            tool_calls: None,
            thoughts: None,
            embedding,
        }
    }

    #[test]
    fn l2_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        assert_eq!(l2_distance(&v, &v), 0.0);
    }

    #[test]
    fn l2_known_value() {
        // 3-4-5 triangle
        let d = l2_distance(&[0.0, 0.0], &[3.0, 4.0]);
        assert!((d - 5.0).abs() < 1e-6);
    }

    #[test]
    fn l2_mismatched_lengths() {
        assert_eq!(l2_distance(&[1.0, 2.0], &[1.0, 2.0, 3.0]), f32::INFINITY);
        assert_eq!(l2_distance(&[], &[]), f32::INFINITY);
    }

    #[test]
    fn nearest_ranks_ascending() {
        let query = vec![1.0, 0.0, 0.0];
        let messages = vec![
            message(1, Some(vec![0.0, 1.0, 0.0])), // sqrt(2)
            message(2, Some(vec![1.0, 0.0, 0.0])), // 0
            message(3, Some(vec![0.8, 0.2, 0.0])), // ~0.28
        ];

        let results = nearest(messages, &query, 10, 10.0);
        let ids: Vec<i64> = results.iter().map(|s| s.message.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn nearest_threshold_is_strict() {
        let query = vec![0.0, 0.0];
        let messages = vec![
            message(1, Some(vec![1.0, 0.0])), // exactly 1.0
            message(2, Some(vec![0.5, 0.0])),
        ];
        let results = nearest(messages, &query, 10, 1.0);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].message.id, 2);
    }

    #[test]
    fn nearest_skips_missing_embeddings_and_caps() {
        let query = vec![1.0, 0.0];
        let mut messages: Vec<_> = (0..10)
            .map(|i| message(i, Some(vec![1.0, i as f32 * 0.01])))
            .collect();
        messages.push(message(99, None));

        let results = nearest(messages, &query, 3, 1.0);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|s| s.message.id != 99));
    }

    #[test]
    fn nearest_empty_query() {
        let messages = vec![message(1, Some(vec![1.0]))];
        assert!(nearest(messages, &[], 5, 1.0).is_empty());
    }

    #[test]
    fn blob_roundtrip() {
        let v = vec![0.25, -1.5, 3.0];
        let blob = embedding_to_blob(&v);
        assert_eq!(blob.len(), 12);
        assert_eq!(blob_to_embedding(&blob), v);
    }
}
