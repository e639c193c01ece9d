//! Film and music category repositories.
//!
//! # Invariants
//! - Categories are value entities keyed by name.
//! - A rename repoints every join row that names the category.
//! - Deleting a category first removes it from every film/album/track.

use crate::model::{FilmCategory, MusicCategory};
use crate::repo::RepoResult;
use crate::session::ConnectionSession;
use log::warn;
use rusqlite::params;

/// Repository interface for film categories.
pub trait FilmCategoryRepository {
    fn list_film_categories(&self) -> RepoResult<Vec<FilmCategory>>;
    fn add_film_category(&self, category: &FilmCategory) -> RepoResult<()>;
    fn update_film_category(&self, previous_name: &str, category: &FilmCategory)
        -> RepoResult<usize>;
    fn delete_film_category(&self, name: &str) -> RepoResult<usize>;
}

/// Repository interface for music categories (albums and tracks).
pub trait MusicCategoryRepository {
    fn list_music_categories(&self) -> RepoResult<Vec<MusicCategory>>;
    fn add_music_category(&self, category: &MusicCategory) -> RepoResult<()>;
    fn update_music_category(
        &self,
        previous_name: &str,
        category: &MusicCategory,
    ) -> RepoResult<usize>;
    fn delete_music_category(&self, name: &str) -> RepoResult<usize>;
}

/// SQLite-backed repository for both category families.
pub struct SqliteCategoryRepository<'s> {
    session: &'s ConnectionSession,
}

impl<'s> SqliteCategoryRepository<'s> {
    pub fn new(session: &'s ConnectionSession) -> Self {
        Self { session }
    }

    fn list_names(&self, table: &str) -> RepoResult<Vec<String>> {
        self.session.query(
            &format!("SELECT name FROM {table} ORDER BY name ASC;"),
            [],
            |row| Ok(row.get::<_, String>(0)?),
        )
    }

    fn rename(
        &self,
        table: &str,
        join_tables: &[&str],
        previous_name: &str,
        name: &str,
    ) -> RepoResult<usize> {
        let changed = self.session.execute(
            &format!("UPDATE {table} SET name = ?1 WHERE name = ?2;"),
            params![name, previous_name],
        )?;
        if changed == 0 {
            warn!("event=category_update module=repo status=stale_key table={table} matched=0");
            return Ok(0);
        }
        if previous_name != name {
            for join_table in join_tables {
                self.session.execute(
                    &format!("UPDATE {join_table} SET category_name = ?1 WHERE category_name = ?2;"),
                    params![name, previous_name],
                )?;
            }
        }
        Ok(changed)
    }

    fn delete(&self, table: &str, join_tables: &[&str], name: &str) -> RepoResult<usize> {
        for join_table in join_tables {
            self.session.execute(
                &format!("DELETE FROM {join_table} WHERE category_name = ?1;"),
                [name],
            )?;
        }
        let changed = self
            .session
            .execute(&format!("DELETE FROM {table} WHERE name = ?1;"), [name])?;
        Ok(changed)
    }
}

const FILM_CATEGORY_JOINS: &[&str] = &["Film_has_Category"];
const MUSIC_CATEGORY_JOINS: &[&str] = &["Album_has_Category", "Track_has_Category"];

impl FilmCategoryRepository for SqliteCategoryRepository<'_> {
    fn list_film_categories(&self) -> RepoResult<Vec<FilmCategory>> {
        Ok(self
            .list_names("FilmCategory")?
            .into_iter()
            .map(FilmCategory::new)
            .collect())
    }

    fn add_film_category(&self, category: &FilmCategory) -> RepoResult<()> {
        category.validate()?;
        self.session.execute(
            "INSERT INTO FilmCategory (name) VALUES (?1);",
            [category.name.as_str()],
        )?;
        Ok(())
    }

    fn update_film_category(
        &self,
        previous_name: &str,
        category: &FilmCategory,
    ) -> RepoResult<usize> {
        category.validate()?;
        self.rename(
            "FilmCategory",
            FILM_CATEGORY_JOINS,
            previous_name,
            &category.name,
        )
    }

    fn delete_film_category(&self, name: &str) -> RepoResult<usize> {
        self.delete("FilmCategory", FILM_CATEGORY_JOINS, name)
    }
}

impl MusicCategoryRepository for SqliteCategoryRepository<'_> {
    fn list_music_categories(&self) -> RepoResult<Vec<MusicCategory>> {
        Ok(self
            .list_names("MusicCategory")?
            .into_iter()
            .map(MusicCategory::new)
            .collect())
    }

    fn add_music_category(&self, category: &MusicCategory) -> RepoResult<()> {
        category.validate()?;
        self.session.execute(
            "INSERT INTO MusicCategory (name) VALUES (?1);",
            [category.name.as_str()],
        )?;
        Ok(())
    }

    fn update_music_category(
        &self,
        previous_name: &str,
        category: &MusicCategory,
    ) -> RepoResult<usize> {
        category.validate()?;
        self.rename(
            "MusicCategory",
            MUSIC_CATEGORY_JOINS,
            previous_name,
            &category.name,
        )
    }

    fn delete_music_category(&self, name: &str) -> RepoResult<usize> {
        self.delete("MusicCategory", MUSIC_CATEGORY_JOINS, name)
    }
}
