use super::models::*;
use super::schema::{duplicate_basis, media_file};
use super::sqlite::Database;
use crate::error::Error;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text};
use std::path::{Path, MAIN_SEPARATOR};
use tracing::debug;

#[derive(QueryableByName)]
struct DigestCountRow {
    #[diesel(sql_type = Text)]
    value: String,
    #[diesel(sql_type = BigInt)]
    count: i64,
}

#[derive(QueryableByName)]
struct HashCountRow {
    #[diesel(sql_type = BigInt)]
    value: i64,
    #[diesel(sql_type = BigInt)]
    count: i64,
}

/// Split a full path into the `(folder, file_name)` pair the table is keyed on.
pub fn split_path(path: &Path) -> Option<(String, String)> {
    let folder = path.parent()?.to_string_lossy().into_owned();
    let file_name = path.file_name()?.to_string_lossy().into_owned();
    Some((folder, file_name))
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl Database {
    // ── Media Files ──────────────────────────────────────────────

    /// Create the record if its path is unknown. Returns the row id and whether
    /// a row was inserted.
    pub fn upsert_by_path(&mut self, new_file: &NewMediaFile) -> Result<(i32, bool), Error> {
        let conn = self.connection();
        let inserted = diesel::insert_or_ignore_into(media_file::table)
            .values(new_file)
            .execute(conn)?;
        let id = media_file::table
            .filter(media_file::folder.eq(&new_file.folder))
            .filter(media_file::file_name.eq(&new_file.file_name))
            .select(media_file::id)
            .first::<i32>(conn)?;
        Ok((id, inserted > 0))
    }

    /// Insert a batch of scanned files in one transaction. Known paths are
    /// ignored; returns the number of rows actually inserted.
    pub fn insert_new_files(&mut self, files: &[NewMediaFile]) -> Result<usize, Error> {
        if files.is_empty() {
            return Ok(0);
        }
        let inserted = self.connection().transaction::<_, Error, _>(|conn| {
            let mut inserted = 0;
            for file in files {
                inserted += diesel::insert_or_ignore_into(media_file::table)
                    .values(file)
                    .execute(conn)?;
            }
            Ok(inserted)
        })?;
        debug!("Inserted {} of {} media files", inserted, files.len());
        Ok(inserted)
    }

    pub fn find_by_id(&mut self, id: i32) -> Result<Option<MediaFile>, Error> {
        Ok(media_file::table
            .find(id)
            .select(MediaFile::as_select())
            .first(self.connection())
            .optional()?)
    }

    pub fn find_by_path(&mut self, path: &Path) -> Result<Option<MediaFile>, Error> {
        let Some((folder, file_name)) = split_path(path) else {
            return Ok(None);
        };
        Ok(media_file::table
            .filter(media_file::folder.eq(folder))
            .filter(media_file::file_name.eq(file_name))
            .select(MediaFile::as_select())
            .first(self.connection())
            .optional()?)
    }

    pub fn find_all(&mut self) -> Result<Vec<MediaFile>, Error> {
        Ok(media_file::table
            .order(media_file::id.asc())
            .select(MediaFile::as_select())
            .load(self.connection())?)
    }

    /// Records whose folder is `prefix` or lies below it. An empty prefix matches everything.
    pub fn find_by_folder_prefix(&mut self, prefix: &str) -> Result<Vec<MediaFile>, Error> {
        if prefix.is_empty() {
            return self.find_all();
        }
        let root = prefix.trim_end_matches(['/', '\\']);
        let pattern = format!("{}%", escape_like(&format!("{}{}", root, MAIN_SEPARATOR)));
        Ok(media_file::table
            .filter(
                media_file::folder
                    .eq(root)
                    .or(media_file::folder.like(pattern).escape('\\')),
            )
            .order(media_file::id.asc())
            .select(MediaFile::as_select())
            .load(self.connection())?)
    }

    pub fn count_media_files(&mut self) -> Result<i64, Error> {
        Ok(media_file::table.count().get_result(self.connection())?)
    }

    /// All records carrying `value` in the `kind` column, ordered by id.
    pub fn find_by_field(
        &mut self,
        kind: FingerprintKind,
        value: &FingerprintValue,
    ) -> Result<Vec<MediaFile>, Error> {
        let conn = self.connection();
        let rows = match (kind, value) {
            (FingerprintKind::Sha, FingerprintValue::Digest(digest)) => media_file::table
                .filter(media_file::sha.eq(digest))
                .order(media_file::id.asc())
                .select(MediaFile::as_select())
                .load(conn)?,
            (FingerprintKind::Average, FingerprintValue::Perceptual(hash)) => media_file::table
                .filter(media_file::average_hash.eq(hash_to_db(*hash)))
                .order(media_file::id.asc())
                .select(MediaFile::as_select())
                .load(conn)?,
            (FingerprintKind::Difference, FingerprintValue::Perceptual(hash)) => {
                media_file::table
                    .filter(media_file::difference_hash.eq(hash_to_db(*hash)))
                    .order(media_file::id.asc())
                    .select(MediaFile::as_select())
                    .load(conn)?
            }
            (FingerprintKind::Perceptual, FingerprintValue::Perceptual(hash)) => {
                media_file::table
                    .filter(media_file::perceptual_hash.eq(hash_to_db(*hash)))
                    .order(media_file::id.asc())
                    .select(MediaFile::as_select())
                    .load(conn)?
            }
            _ => {
                return Err(Error::Usage(format!(
                    "value '{}' does not match the {} column",
                    value, kind
                )))
            }
        };
        Ok(rows)
    }

    /// Distinct values of the `kind` column shared by more than one record,
    /// most frequent first, ties ordered by value.
    pub fn find_grouped_by_field(&mut self, kind: FingerprintKind) -> Result<Vec<GroupCount>, Error> {
        let sql = format!(
            "SELECT {col} AS value, COUNT(*) AS count FROM media_file \
             WHERE {col} IS NOT NULL GROUP BY {col} HAVING COUNT(*) > 1 \
             ORDER BY count DESC, value",
            col = kind.column()
        );
        let conn = self.connection();
        let groups = if kind.is_perceptual() {
            diesel::sql_query(sql)
                .load::<HashCountRow>(conn)?
                .into_iter()
                .map(|row| GroupCount {
                    value: FingerprintValue::Perceptual(hash_from_db(row.value)),
                    count: row.count,
                })
                .collect()
        } else {
            diesel::sql_query(sql)
                .load::<DigestCountRow>(conn)?
                .into_iter()
                .map(|row| GroupCount {
                    value: FingerprintValue::Digest(row.value),
                    count: row.count,
                })
                .collect()
        };
        Ok(groups)
    }

    /// Records with at least one of `kinds` still null.
    pub fn find_missing_any(&mut self, kinds: &[FingerprintKind]) -> Result<Vec<MediaFile>, Error> {
        if kinds.is_empty() {
            return Ok(Vec::new());
        }
        let condition = kinds
            .iter()
            .map(|kind| format!("{} IS NULL", kind.column()))
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!("SELECT * FROM media_file WHERE {} ORDER BY id", condition);
        Ok(diesel::sql_query(sql).load::<MediaFile>(self.connection())?)
    }

    /// Apply staged fingerprint updates in a single transaction. Empty updates are skipped.
    pub fn apply_updates(&mut self, updates: &[(i32, FingerprintUpdate)]) -> Result<usize, Error> {
        let written = self.connection().transaction::<_, Error, _>(|conn| {
            let mut written = 0;
            for (id, update) in updates.iter().filter(|(_, u)| !u.is_empty()) {
                written += diesel::update(media_file::table.find(*id))
                    .set(update)
                    .execute(conn)?;
            }
            Ok(written)
        })?;
        debug!("Applied {} fingerprint updates", written);
        Ok(written)
    }

    pub fn update_location(&mut self, id: i32, folder: &str, file_name: &str) -> Result<(), Error> {
        let rows = diesel::update(media_file::table.find(id))
            .set((
                media_file::folder.eq(folder),
                media_file::file_name.eq(file_name),
            ))
            .execute(self.connection())?;
        if rows == 0 {
            return Err(Error::NotFound(format!("media file {}", id)));
        }
        Ok(())
    }

    pub fn set_content_created(
        &mut self,
        id: i32,
        parsed: Option<NaiveDateTime>,
        raw: &str,
    ) -> Result<(), Error> {
        diesel::update(media_file::table.find(id))
            .set((
                media_file::content_created.eq(parsed),
                media_file::content_created_raw.eq(raw),
            ))
            .execute(self.connection())?;
        Ok(())
    }

    pub fn delete(&mut self, id: i32) -> Result<bool, Error> {
        let rows = diesel::delete(media_file::table.find(id)).execute(self.connection())?;
        Ok(rows > 0)
    }

    /// Records a previous hash pass marked as undecodable.
    pub fn find_invalid(&mut self) -> Result<Vec<MediaFile>, Error> {
        Ok(media_file::table
            .filter(media_file::format_valid.eq(false))
            .order(media_file::id.asc())
            .select(MediaFile::as_select())
            .load(self.connection())?)
    }

    /// Forget the validity verdict so the next hash pass tries the record again.
    pub fn reset_validity(&mut self, id: i32, media_group: MediaGroup) -> Result<(), Error> {
        diesel::update(media_file::table.find(id))
            .set((
                media_file::format_valid.eq(None::<bool>),
                media_file::media_group.eq(media_group.as_str()),
            ))
            .execute(self.connection())?;
        Ok(())
    }

    // ── Duplicate Basis ──────────────────────────────────────────

    pub fn upsert_duplicate_basis(
        &mut self,
        media_file_id: i32,
        kind: FingerprintKind,
        value: &str,
    ) -> Result<Upserted, Error> {
        let conn = self.connection();
        let updated = diesel::update(
            duplicate_basis::table
                .filter(duplicate_basis::media_file_id.eq(media_file_id))
                .filter(duplicate_basis::kind.eq(kind.name())),
        )
        .set(duplicate_basis::value.eq(value))
        .execute(conn)?;
        if updated > 0 {
            return Ok(Upserted::Updated);
        }
        diesel::insert_into(duplicate_basis::table)
            .values(&NewDuplicateBasis {
                media_file_id,
                kind: kind.name(),
                value,
            })
            .execute(conn)?;
        Ok(Upserted::Inserted)
    }

    pub fn find_duplicate_basis(&mut self, media_file_id: i32) -> Result<Vec<DuplicateBasis>, Error> {
        Ok(duplicate_basis::table
            .filter(duplicate_basis::media_file_id.eq(media_file_id))
            .order(duplicate_basis::kind.asc())
            .select(DuplicateBasis::as_select())
            .load(self.connection())?)
    }
}
