use super::QuizScoreEntry;

/// Local entries first, then remote entries not already present (by full
/// value equality), ordered by timestamp string. The sort is stable, so equal
/// timestamps keep their local-then-remote order.
pub fn merge_histories(
    local: Vec<QuizScoreEntry>,
    remote: Vec<QuizScoreEntry>,
) -> Vec<QuizScoreEntry> {
    let mut merged = local;
    for entry in remote {
        if !merged.contains(&entry) {
            merged.push(entry);
        }
    }
    merged.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Difficulty;

    fn entry(timestamp: &str, score: f64) -> QuizScoreEntry {
        QuizScoreEntry {
            timestamp: timestamp.to_string(),
            score,
            difficulty: Difficulty::Medium,
            topic: "Foot Drill".to_string(),
        }
    }

    #[test]
    fn empty_remote_just_sorts_local() {
        let local = vec![
            entry("2024-03-02T10:00:00Z", 40.0),
            entry("2024-03-01T10:00:00Z", 80.0),
        ];
        let merged = merge_histories(local.clone(), Vec::new());
        assert_eq!(merged, vec![local[1].clone(), local[0].clone()]);
    }

    #[test]
    fn duplicates_are_dropped_and_order_is_chronological() {
        let shared = entry("2024-03-02T10:00:00Z", 60.0);
        let local = vec![entry("2024-03-03T10:00:00Z", 90.0), shared.clone()];
        let remote = vec![shared.clone(), entry("2024-03-01T10:00:00Z", 30.0)];

        let merged = merge_histories(local, remote);
        let stamps: Vec<&str> = merged.iter().map(|e| e.timestamp.as_str()).collect();
        assert_eq!(
            stamps,
            [
                "2024-03-01T10:00:00Z",
                "2024-03-02T10:00:00Z",
                "2024-03-03T10:00:00Z"
            ]
        );
    }

    #[test]
    fn merging_again_with_the_same_remote_changes_nothing() {
        let local = vec![entry("2024-03-02T10:00:00Z", 50.0)];
        let remote = vec![
            entry("2024-03-01T10:00:00Z", 70.0),
            entry("2024-03-02T10:00:00Z", 50.0),
        ];
        let once = merge_histories(local, remote.clone());
        let twice = merge_histories(once.clone(), remote);
        assert_eq!(once, twice);
    }

    #[test]
    fn same_event_with_different_timestamps_is_kept_twice() {
        let local = vec![entry("2024-03-02T10:00:00.000001Z", 50.0)];
        let remote = vec![entry("2024-03-02T10:00:00.000002Z", 50.0)];
        assert_eq!(merge_histories(local, remote).len(), 2);
    }
}
