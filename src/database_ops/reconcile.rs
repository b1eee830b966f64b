//! Removal of stored reviews that vanished upstream.

use std::collections::HashSet;

use anyhow::Result;
use tracing::{info, warn};

use crate::database_ops::reviews::ReviewStore;
use crate::database_ops::walker::RunOutcome;
use crate::settings::Language;

/// Deletes reviews stored for `appid` that were not observed by the given
/// run, restricted to tracked languages (rows in untracked languages are
/// left alone even when absent). Returns the number of deletions.
///
/// Only a complete walk is trusted: a run that aborted early deletes
/// nothing, since absence from a truncated fetch proves nothing.
pub async fn remove_vanished_reviews(
    store: &dyn ReviewStore,
    appid: i64,
    outcome: &RunOutcome,
    tracked: &[&Language],
) -> Result<u64> {
    if !outcome.complete {
        warn!(appid, "walk did not complete; skipping stale-review removal");
        return Ok(0);
    }

    let tracked_keys: HashSet<&str> = tracked.iter().map(|l| l.lang_key.as_str()).collect();
    info!(
        appid,
        languages = ?tracked_keys,
        "checking for reviews deleted upstream"
    );

    let mut deleted = 0u64;
    for stored in store.stored_reviews(appid).await? {
        if outcome.ids.contains(&stored.id) {
            continue;
        }
        let tracked_row = stored
            .lang_key
            .as_deref()
            .is_some_and(|key| tracked_keys.contains(key));
        if !tracked_row {
            continue;
        }
        info!(review_id = stored.id, appid, lang = ?stored.lang_key, "deleting vanished review");
        store.delete_review(stored.id).await?;
        deleted += 1;
    }

    info!(appid, deleted, "stale-review removal finished");
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::reviews::{ReviewRecord, StoredReviewRef, UpsertMode};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeStore {
        stored: Vec<StoredReviewRef>,
        deleted: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl ReviewStore for FakeStore {
        async fn upsert_reviews(
            &self,
            reviews: &[ReviewRecord],
            _mode: UpsertMode,
        ) -> Result<usize> {
            Ok(reviews.len())
        }

        async fn delete_review(&self, review_id: i64) -> Result<()> {
            self.deleted.lock().unwrap().push(review_id);
            Ok(())
        }

        async fn upsert_app(&self, _appid: i64, _display_name: &str) -> Result<()> {
            Ok(())
        }

        async fn upsert_language(&self, _language: &Language) -> Result<()> {
            Ok(())
        }

        async fn stored_reviews(&self, _appid: i64) -> Result<Vec<StoredReviewRef>> {
            Ok(self.stored.clone())
        }
    }

    fn english() -> Language {
        Language {
            lang_key: "en".into(),
            name: "English".into(),
            steam_key: "english".into(),
            track: true,
        }
    }

    fn stored(id: i64, lang: &str) -> StoredReviewRef {
        StoredReviewRef {
            id,
            lang_key: Some(lang.into()),
        }
    }

    fn outcome(ids: &[i64], complete: bool) -> RunOutcome {
        RunOutcome {
            ids: ids.iter().copied().collect(),
            total: None,
            complete,
        }
    }

    #[tokio::test]
    async fn deletes_exactly_the_stale_tracked_rows() {
        let store = FakeStore {
            stored: vec![stored(1, "en"), stored(2, "en"), stored(3, "en")],
            deleted: Mutex::new(Vec::new()),
        };
        let english = english();

        let deleted =
            remove_vanished_reviews(&store, 440, &outcome(&[1, 3], true), &[&english])
                .await
                .unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(*store.deleted.lock().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn untracked_language_rows_are_left_alone() {
        let store = FakeStore {
            stored: vec![stored(1, "en"), stored(9, "de")],
            deleted: Mutex::new(Vec::new()),
        };
        let english = english();

        let deleted = remove_vanished_reviews(&store, 440, &outcome(&[1], true), &[&english])
            .await
            .unwrap();

        assert_eq!(deleted, 0);
        assert!(store.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn aborted_walk_deletes_nothing() {
        let store = FakeStore {
            stored: vec![stored(1, "en"), stored(2, "en")],
            deleted: Mutex::new(Vec::new()),
        };
        let english = english();

        let deleted = remove_vanished_reviews(&store, 440, &outcome(&[], false), &[&english])
            .await
            .unwrap();

        assert_eq!(deleted, 0);
        assert!(store.deleted.lock().unwrap().is_empty());
    }
}
