use super::schema::{duplicate_basis, media_file};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Coarse media classification derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaGroup {
    Photo,
    Video,
    Unknown,
}

impl MediaGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaGroup::Photo => "Photo",
            MediaGroup::Video => "Video",
            MediaGroup::Unknown => "Unknown",
        }
    }
}

impl From<&str> for MediaGroup {
    fn from(s: &str) -> Self {
        match s {
            "Photo" => MediaGroup::Photo,
            "Video" => MediaGroup::Video,
            _ => MediaGroup::Unknown,
        }
    }
}

impl fmt::Display for MediaGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "photo" => Ok(MediaGroup::Photo),
            "video" => Ok(MediaGroup::Video),
            _ => Err(format!("unknown media group '{}', expected Photo or Video", s)),
        }
    }
}

/// The four fingerprint columns of a media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FingerprintKind {
    Sha,
    Average,
    Difference,
    Perceptual,
}

impl FingerprintKind {
    pub const ALL: [FingerprintKind; 4] = [
        FingerprintKind::Sha,
        FingerprintKind::Average,
        FingerprintKind::Difference,
        FingerprintKind::Perceptual,
    ];

    /// Column holding this fingerprint in `media_file`.
    pub fn column(self) -> &'static str {
        match self {
            FingerprintKind::Sha => "sha",
            FingerprintKind::Average => "average_hash",
            FingerprintKind::Difference => "difference_hash",
            FingerprintKind::Perceptual => "perceptual_hash",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FingerprintKind::Sha => "Sha",
            FingerprintKind::Average => "Average",
            FingerprintKind::Difference => "Difference",
            FingerprintKind::Perceptual => "Perceptual",
        }
    }

    pub fn is_perceptual(self) -> bool {
        !matches!(self, FingerprintKind::Sha)
    }
}

impl fmt::Display for FingerprintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FingerprintKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha" => Ok(FingerprintKind::Sha),
            "average" => Ok(FingerprintKind::Average),
            "difference" => Ok(FingerprintKind::Difference),
            "perceptual" => Ok(FingerprintKind::Perceptual),
            _ => Err(format!(
                "hash '{}' not implemented, expected one of sha, average, difference, perceptual",
                s
            )),
        }
    }
}

/// A concrete fingerprint value a duplicate group is keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FingerprintValue {
    Digest(String),
    Perceptual(u64),
}

impl fmt::Display for FingerprintValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FingerprintValue::Digest(digest) => f.write_str(digest),
            FingerprintValue::Perceptual(hash) => write!(f, "{}", hash),
        }
    }
}

/// Result row of a group-by query, only produced for `count > 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCount {
    pub value: FingerprintValue,
    pub count: i64,
}

/// Fingerprints are unsigned 64-bit values; SQLite only has signed integers,
/// so the bits are stored unchanged.
pub fn hash_to_db(hash: u64) -> i64 {
    hash as i64
}

pub fn hash_from_db(raw: i64) -> u64 {
    raw as u64
}

/// One row per physical file ever scanned.
#[derive(Debug, Clone, PartialEq, Queryable, QueryableByName, Selectable, Identifiable)]
#[diesel(table_name = media_file)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MediaFile {
    pub id: i32,
    pub folder: String,
    pub file_name: String,
    pub file_ext: String,
    pub media_group: String,
    pub file_size: i64,
    pub file_created: Option<NaiveDateTime>,
    pub content_created: Option<NaiveDateTime>,
    pub content_created_raw: Option<String>,
    pub sha: Option<String>,
    pub average_hash: Option<i64>,
    pub difference_hash: Option<i64>,
    pub perceptual_hash: Option<i64>,
    pub format_valid: Option<bool>,
}

impl MediaFile {
    pub fn full_path(&self) -> PathBuf {
        Path::new(&self.folder).join(&self.file_name)
    }

    pub fn group(&self) -> MediaGroup {
        MediaGroup::from(self.media_group.as_str())
    }

    /// `None` when the field has not been computed yet.
    pub fn fingerprint(&self, kind: FingerprintKind) -> Option<FingerprintValue> {
        match kind {
            FingerprintKind::Sha => self.sha.clone().map(FingerprintValue::Digest),
            FingerprintKind::Average => self
                .average_hash
                .map(|h| FingerprintValue::Perceptual(hash_from_db(h))),
            FingerprintKind::Difference => self
                .difference_hash
                .map(|h| FingerprintValue::Perceptual(hash_from_db(h))),
            FingerprintKind::Perceptual => self
                .perceptual_hash
                .map(|h| FingerprintValue::Perceptual(hash_from_db(h))),
        }
    }

    pub fn has_fingerprint(&self, kind: FingerprintKind) -> bool {
        match kind {
            FingerprintKind::Sha => self.sha.is_some(),
            FingerprintKind::Average => self.average_hash.is_some(),
            FingerprintKind::Difference => self.difference_hash.is_some(),
            FingerprintKind::Perceptual => self.perceptual_hash.is_some(),
        }
    }

    pub fn is_marked_invalid(&self) -> bool {
        self.format_valid == Some(false)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = media_file)]
pub struct NewMediaFile {
    pub folder: String,
    pub file_name: String,
    pub file_ext: String,
    pub media_group: String,
    pub file_size: i64,
    pub file_created: Option<NaiveDateTime>,
    pub content_created: Option<NaiveDateTime>,
    pub content_created_raw: Option<String>,
}

impl NewMediaFile {
    pub fn full_path(&self) -> PathBuf {
        Path::new(&self.folder).join(&self.file_name)
    }
}

/// Field level changes staged by the hash pass. `None` members are left untouched.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = media_file)]
pub struct FingerprintUpdate {
    pub media_group: Option<String>,
    pub sha: Option<String>,
    pub average_hash: Option<i64>,
    pub difference_hash: Option<i64>,
    pub perceptual_hash: Option<i64>,
    pub format_valid: Option<bool>,
}

impl FingerprintUpdate {
    pub fn is_empty(&self) -> bool {
        self == &FingerprintUpdate::default()
    }

    pub fn set_hash(&mut self, kind: FingerprintKind, hash: u64) {
        let raw = Some(hash_to_db(hash));
        match kind {
            FingerprintKind::Sha => {}
            FingerprintKind::Average => self.average_hash = raw,
            FingerprintKind::Difference => self.difference_hash = raw,
            FingerprintKind::Perceptual => self.perceptual_hash = raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = duplicate_basis)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DuplicateBasis {
    pub id: i32,
    pub media_file_id: i32,
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = duplicate_basis)]
pub struct NewDuplicateBasis<'a> {
    pub media_file_id: i32,
    pub kind: &'a str,
    pub value: &'a str,
}

/// Whether an upsert created a new row or overwrote an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Inserted,
    Updated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_bits_survive_db_round_trip() {
        for hash in [0u64, 1, u64::MAX, 0x8000_0000_0000_0000, 12_345_678_901_234_567_890] {
            assert_eq!(hash_from_db(hash_to_db(hash)), hash);
        }
    }

    #[test]
    fn test_fingerprint_kind_parsing() {
        assert_eq!("Sha".parse::<FingerprintKind>(), Ok(FingerprintKind::Sha));
        assert_eq!(
            "perceptual".parse::<FingerprintKind>(),
            Ok(FingerprintKind::Perceptual)
        );
        assert!("crc32".parse::<FingerprintKind>().is_err());
    }

    #[test]
    fn test_update_emptiness() {
        let mut update = FingerprintUpdate::default();
        assert!(update.is_empty());
        update.set_hash(FingerprintKind::Difference, 42);
        assert!(!update.is_empty());
        assert_eq!(update.difference_hash, Some(42));
    }
}
