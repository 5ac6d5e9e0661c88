use crate::error::Error;
use crate::storage::{Database, FingerprintKind, FingerprintValue, MediaFile, Upserted};
use std::cmp::Reverse;
use std::path::Path;
use tracing::{debug, info};

/// Records sharing one fingerprint value. `members` is ordered by id and holds
/// at least two records.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub kind: FingerprintKind,
    pub value: FingerprintValue,
    pub members: Vec<MediaFile>,
    /// Index into `members` of the copy to keep.
    pub keep: usize,
}

impl DuplicateGroup {
    pub fn kept(&self) -> &MediaFile {
        &self.members[self.keep]
    }

    /// Every member except the kept one.
    pub fn others(&self) -> impl Iterator<Item = &MediaFile> {
        self.members
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != self.keep)
            .map(|(_, member)| member)
    }

    pub fn reclaimable_bytes(&self) -> i64 {
        self.others().map(|member| member.file_size).sum()
    }
}

/// Largest file wins; equal sizes go to the earliest record.
pub fn select_keep_largest(members: &[MediaFile]) -> usize {
    members
        .iter()
        .enumerate()
        .max_by_key(|(_, member)| (member.file_size, Reverse(member.id)))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// `true` when `folder` is `scope` or lies below it.
pub fn in_scope(folder: &str, scope: &str) -> bool {
    Path::new(folder).starts_with(Path::new(scope))
}

/// Group records by the `kind` fingerprint. With a `scope`, only members whose
/// folder lies under it are considered, and groups left with fewer than two
/// members are dropped. Read only.
pub fn find_duplicate_groups(
    db: &mut Database,
    kind: FingerprintKind,
    scope: Option<&str>,
) -> Result<Vec<DuplicateGroup>, Error> {
    let counts = db.find_grouped_by_field(kind)?;
    debug!("{} candidate {} values", counts.len(), kind);

    let mut groups = Vec::with_capacity(counts.len());
    for count in counts {
        let mut members = db.find_by_field(kind, &count.value)?;
        if let Some(scope) = scope.filter(|s| !s.is_empty()) {
            members.retain(|member| in_scope(&member.folder, scope));
        }
        if members.len() < 2 {
            continue;
        }
        let keep = select_keep_largest(&members);
        groups.push(DuplicateGroup {
            kind,
            value: count.value,
            members,
            keep,
        });
    }

    info!("Found {} duplicate groups by {}", groups.len(), kind);
    Ok(groups)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasisSummary {
    pub inserted: usize,
    pub updated: usize,
}

/// Record for every group member which value made it a duplicate.
pub fn record_duplicate_basis(
    db: &mut Database,
    groups: &[DuplicateGroup],
) -> Result<BasisSummary, Error> {
    let mut summary = BasisSummary::default();
    for group in groups {
        let value = group.value.to_string();
        for member in &group.members {
            match db.upsert_duplicate_basis(member.id, group.kind, &value)? {
                Upserted::Inserted => summary.inserted += 1,
                Upserted::Updated => summary.updated += 1,
            }
        }
    }
    info!(
        "Duplicate basis: {} inserted, {} updated",
        summary.inserted, summary.updated
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: i32, size: i64) -> MediaFile {
        MediaFile {
            id,
            folder: "/photos".to_string(),
            file_name: format!("{}.jpg", id),
            file_ext: ".JPG".to_string(),
            media_group: "Photo".to_string(),
            file_size: size,
            file_created: None,
            content_created: None,
            content_created_raw: None,
            sha: None,
            average_hash: None,
            difference_hash: None,
            perceptual_hash: None,
            format_valid: None,
        }
    }

    #[test]
    fn test_keep_largest() {
        let members = vec![member(1, 100), member(2, 300), member(3, 200)];
        assert_eq!(select_keep_largest(&members), 1);
    }

    #[test]
    fn test_keep_tie_goes_to_earliest_id() {
        let members = vec![member(4, 500), member(7, 500), member(9, 10)];
        assert_eq!(select_keep_largest(&members), 0);
        let reversed = vec![member(7, 500), member(4, 500)];
        assert_eq!(select_keep_largest(&reversed), 1);
    }

    #[test]
    fn test_scope_is_component_based() {
        assert!(in_scope("/photos/2020", "/photos"));
        assert!(in_scope("/photos", "/photos"));
        assert!(!in_scope("/photos-old", "/photos"));
    }

    #[test]
    fn test_others_skips_kept() {
        let group = DuplicateGroup {
            kind: FingerprintKind::Sha,
            value: FingerprintValue::Digest("AA".to_string()),
            members: vec![member(1, 10), member(2, 30), member(3, 20)],
            keep: 1,
        };
        let others: Vec<i32> = group.others().map(|m| m.id).collect();
        assert_eq!(others, vec![1, 3]);
        assert_eq!(group.kept().id, 2);
        assert_eq!(group.reclaimable_bytes(), 30);
    }
}
