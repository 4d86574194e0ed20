use rusqlite::{OptionalExtension, params};

use super::{Database, DiscordId};
use crate::error::BotError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionEntry {
    pub pokemon: String,
    pub shiny: bool,
    pub count: u32,
}

fn normalize(pokemon: &str) -> String {
    pokemon.trim().to_lowercase()
}

impl Database {
    /// Adds one to the user's count and returns the new count.
    pub fn add_to_collection(
        &self,
        user_id: DiscordId,
        pokemon: &str,
        shiny: bool,
    ) -> Result<u32, BotError> {
        let conn = self.conn()?;
        let pokemon = normalize(pokemon);

        conn.execute(
            "INSERT INTO collections (user_id, pokemon, shiny, count) VALUES (?1, ?2, ?3, 1)
             ON CONFLICT (user_id, pokemon, shiny) DO UPDATE SET count = count + 1",
            params![user_id, pokemon, shiny],
        )?;

        let count = conn.query_row(
            "SELECT count FROM collections WHERE user_id = ?1 AND pokemon = ?2 AND shiny = ?3",
            params![user_id, pokemon, shiny],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    /// Removes one from the user's count. Returns `None` if they had none,
    /// otherwise the remaining count (the row is dropped at zero).
    pub fn remove_from_collection(
        &self,
        user_id: DiscordId,
        pokemon: &str,
        shiny: bool,
    ) -> Result<Option<u32>, BotError> {
        let mut conn = self.conn()?;
        let pokemon = normalize(pokemon);
        let tx = conn.transaction()?;

        let current: Option<u32> = tx
            .query_row(
                "SELECT count FROM collections WHERE user_id = ?1 AND pokemon = ?2 AND shiny = ?3",
                params![user_id, pokemon, shiny],
                |row| row.get(0),
            )
            .optional()?;

        let Some(current) = current else {
            return Ok(None);
        };

        let remaining = current.saturating_sub(1);
        if remaining == 0 {
            tx.execute(
                "DELETE FROM collections WHERE user_id = ?1 AND pokemon = ?2 AND shiny = ?3",
                params![user_id, pokemon, shiny],
            )?;
        } else {
            tx.execute(
                "UPDATE collections SET count = ?4 WHERE user_id = ?1 AND pokemon = ?2 AND shiny = ?3",
                params![user_id, pokemon, shiny, remaining],
            )?;
        }
        tx.commit()?;

        Ok(Some(remaining))
    }

    pub fn collection(&self, user_id: DiscordId) -> Result<Vec<CollectionEntry>, BotError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT pokemon, shiny, count FROM collections
             WHERE user_id = ?1 ORDER BY pokemon ASC, shiny ASC",
        )?;

        let entries = stmt
            .query_map(params![user_id], |row| {
                Ok(CollectionEntry {
                    pokemon: row.get(0)?,
                    shiny: row.get(1)?,
                    count: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_increments_per_variant() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.add_to_collection(1, "Pikachu", false).unwrap(), 1);
        assert_eq!(db.add_to_collection(1, " pikachu ", false).unwrap(), 2);
        assert_eq!(db.add_to_collection(1, "pikachu", true).unwrap(), 1);

        let entries = db.collection(1).unwrap();
        assert_eq!(
            entries,
            vec![
                CollectionEntry { pokemon: "pikachu".into(), shiny: false, count: 2 },
                CollectionEntry { pokemon: "pikachu".into(), shiny: true, count: 1 },
            ]
        );
    }

    #[test]
    fn remove_deletes_at_zero() {
        let db = Database::open_in_memory().unwrap();
        db.add_to_collection(1, "eevee", false).unwrap();
        db.add_to_collection(1, "eevee", false).unwrap();

        assert_eq!(db.remove_from_collection(1, "eevee", false).unwrap(), Some(1));
        assert_eq!(db.remove_from_collection(1, "eevee", false).unwrap(), Some(0));
        assert_eq!(db.remove_from_collection(1, "eevee", false).unwrap(), None);
        assert!(db.collection(1).unwrap().is_empty());
    }

    #[test]
    fn collections_are_per_user_and_sorted() {
        let db = Database::open_in_memory().unwrap();
        db.add_to_collection(1, "zubat", false).unwrap();
        db.add_to_collection(1, "abra", false).unwrap();
        db.add_to_collection(2, "mew", false).unwrap();

        let names: Vec<_> = db
            .collection(1)
            .unwrap()
            .into_iter()
            .map(|e| e.pokemon)
            .collect();
        assert_eq!(names, vec!["abra", "zubat"]);
    }
}
