//! Duplicate-like detection.
//!
//! The same recording is often exposed under several track ids (remasters,
//! regional releases). Likes are grouped by `(track_name, duration_ms)` and
//! every group with more than one member keeps only its most recent like.

use crate::models::{LikedEntry, TrackId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub track_name: String,
    pub duration_ms: u64,
    pub kept: TrackId,
    pub kept_added_at: DateTime<Utc>,
    /// Versions to unlike with the date they were liked.
    pub removed: Vec<(TrackId, DateTime<Utc>)>,
}

impl fmt::Display for DuplicateGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dates: Vec<String> = self
            .removed
            .iter()
            .map(|(_, added_at)| added_at.format("%Y-%m-%d").to_string())
            .collect();
        write!(
            f,
            "Found a duplicate for '{}' ({} ms) - removing {} liked on [{}], keeping the one liked on {}",
            self.track_name,
            self.duration_ms,
            self.removed.len(),
            dates.join(", "),
            self.kept_added_at.format("%Y-%m-%d")
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicatePlan {
    pub groups: Vec<DuplicateGroup>,
}

impl DuplicatePlan {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Every id to unlike, each listed once, in group order.
    pub fn to_unlike(&self) -> Vec<TrackId> {
        let mut ids: Vec<TrackId> = Vec::new();
        for (id, _) in self.groups.iter().flat_map(|group| &group.removed) {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }
}

/// Group `likes` by name and duration and plan the removal of older versions.
///
/// The member with the latest `added_at` is kept; on a tie the first one read
/// wins. A group whose members all share one id is not a duplicate.
pub fn find_duplicates<'a, I>(likes: I) -> DuplicatePlan
where
    I: IntoIterator<Item = &'a LikedEntry>,
{
    let mut index: HashMap<(&'a str, u64), usize> = HashMap::new();
    let mut grouped: Vec<Vec<&'a LikedEntry>> = Vec::new();
    for like in likes {
        let key = (like.track_name.as_str(), like.duration_ms);
        let slot = *index.entry(key).or_insert_with(|| {
            grouped.push(Vec::new());
            grouped.len() - 1
        });
        grouped[slot].push(like);
    }

    let groups = grouped
        .into_iter()
        .filter_map(|members| {
            let kept = members
                .iter()
                .copied()
                .reduce(|best, like| if like.added_at > best.added_at { like } else { best })?;
            let removed: Vec<(TrackId, DateTime<Utc>)> = members
                .iter()
                .filter(|like| like.track_id != kept.track_id)
                .map(|like| (like.track_id.clone(), like.added_at))
                .collect();
            if removed.is_empty() {
                return None;
            }
            Some(DuplicateGroup {
                track_name: kept.track_name.clone(),
                duration_ms: kept.duration_ms,
                kept: kept.track_id.clone(),
                kept_added_at: kept.added_at,
                removed,
            })
        })
        .collect();

    DuplicatePlan { groups }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::parse_timestamp;

    fn like(added_at: &str, id: &str, name: &str, duration_ms: u64) -> LikedEntry {
        LikedEntry {
            track_id: TrackId::new(id),
            track_name: name.to_string(),
            duration_ms,
            added_at: parse_timestamp(added_at).unwrap(),
        }
    }

    #[test]
    fn keeps_the_most_recent_like() {
        let likes = vec![
            like("2021-03-01", "remaster", "Song", 200_000),
            like("2020-03-01", "other", "Other", 100_000),
            like("2019-03-01", "original", "Song", 200_000),
        ];
        let plan = find_duplicates(&likes);

        assert_eq!(plan.groups.len(), 1);
        let group = &plan.groups[0];
        assert_eq!(group.kept, TrackId::new("remaster"));
        assert_eq!(group.removed.len(), 1);
        assert_eq!(group.removed[0].0, TrackId::new("original"));
        assert_eq!(plan.to_unlike(), vec![TrackId::new("original")]);
    }

    #[test]
    fn different_durations_are_different_recordings() {
        let likes = vec![
            like("2021-03-01", "live", "Song", 260_000),
            like("2019-03-01", "studio", "Song", 200_000),
        ];
        assert!(find_duplicates(&likes).is_empty());
    }

    #[test]
    fn tie_keeps_first_seen() {
        let likes = vec![
            like("2021-03-01", "first", "Song", 200_000),
            like("2021-03-01", "second", "Song", 200_000),
            like("2021-03-01", "third", "Song", 200_000),
        ];
        let plan = find_duplicates(&likes);
        assert_eq!(plan.groups[0].kept, TrackId::new("first"));
        assert_eq!(
            plan.to_unlike(),
            vec![TrackId::new("second"), TrackId::new("third")]
        );
    }

    #[test]
    fn repeated_id_is_not_a_duplicate() {
        let likes = vec![
            like("2021-03-01", "same", "Song", 200_000),
            like("2020-03-01", "same", "Song", 200_000),
        ];
        assert!(find_duplicates(&likes).is_empty());
    }

    #[test]
    fn describes_group_for_logs() {
        let likes = vec![
            like("2021-03-01", "b", "Song", 200_000),
            like("2019-03-01", "a", "Song", 200_000),
        ];
        let plan = find_duplicates(&likes);
        assert_eq!(
            plan.groups[0].to_string(),
            "Found a duplicate for 'Song' (200000 ms) - removing 1 liked on [2019-03-01], keeping the one liked on 2021-03-01"
        );
    }
}
