use folio_core::types::{DistanceMetric, IndexEntry, Neighbor};

pub fn distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Cosine => {
            let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
            let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if na <= f32::EPSILON || nb <= f32::EPSILON { return 1.0; }
            1.0 - dot / (na * nb)
        }
        DistanceMetric::L2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
    }
}

/// Exhaustive nearest-neighbour scan, closest first.
pub fn nearest<'a, I>(metric: DistanceMetric, query: &[f32], entries: I, top_k: usize) -> Vec<Neighbor>
where
    I: IntoIterator<Item = &'a IndexEntry>,
{
    let mut scored: Vec<(f32, &IndexEntry)> =
        entries.into_iter().map(|e| (distance(metric, query, &e.vector), e)).collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.chunk.id.cmp(&b.1.chunk.id)));
    scored
        .into_iter()
        .take(top_k)
        .map(|(d, e)| Neighbor { chunk: e.chunk.clone(), distance: Some(d) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::types::Chunk;

    fn entry(id: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            chunk: Chunk { id: id.into(), text: id.into(), source: "a.txt".into(), chunk_index: 0, file_type: ".txt".into() },
            vector,
        }
    }

    #[test]
    fn cosine_distance_bounds() {
        assert!(distance(DistanceMetric::Cosine, &[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((distance(DistanceMetric::Cosine, &[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((distance(DistanceMetric::Cosine, &[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn nearest_orders_and_truncates() {
        let entries = vec![
            entry("far", vec![0.0, 1.0]),
            entry("near", vec![1.0, 0.0]),
            entry("mid", vec![0.7, 0.7]),
        ];
        let hits = nearest(DistanceMetric::L2, &[1.0, 0.0], &entries, 2);
        let ids: Vec<&str> = hits.iter().map(|n| n.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!(hits[0].distance.unwrap() <= hits[1].distance.unwrap());
    }
}
