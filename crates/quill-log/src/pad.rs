//! A single document and its revision log.

use crate::error::{LogError, Result};
use crate::revision::{key_revision_number, DocRecord, Rev, Revision, RevisionMeta, KEYFRAME_INTERVAL};
use crate::store::{doc_key, rev_key, KeyValueStore};
use chrono::{DateTime, Utc};
use quill_changeset::{apply_to_atext, AText, Attribute, AttributePool, Changeset};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Normalize text coming from outside: CRLF and lone CR become LF, tabs
/// become eight spaces and non-breaking spaces become plain spaces.
pub fn clean_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\t', "        ")
        .replace('\u{a0}', " ")
}

/// A document: its current attributed text, attribute pool and head
/// revision, backed by an append-only log in a [`KeyValueStore`].
///
/// The in-memory state only advances after the store has accepted both the
/// revision record and the updated document record.
pub struct Pad {
    id: String,
    store: Arc<dyn KeyValueStore>,
    atext: AText,
    pool: AttributePool,
    head: Rev,
}

impl std::fmt::Debug for Pad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pad")
            .field("id", &self.id)
            .field("head", &self.head)
            .field("len", &self.atext.len())
            .finish()
    }
}

impl Pad {
    /// Load a document, creating it if the store has no record for `id`.
    ///
    /// A new document starts at head `-1` with text `"\n"`. When
    /// `initial_text` is non-empty it is committed as revision 0 by the
    /// anonymous author.
    pub async fn load(
        id: impl Into<String>,
        store: Arc<dyn KeyValueStore>,
        initial_text: Option<&str>,
    ) -> Result<Self> {
        let id = id.into();
        let key = doc_key(&id);

        if let Some(value) = store.get(&key).await? {
            let record: DocRecord = serde_json::from_value(value).map_err(|e| LogError::Corrupt {
                key: key.clone(),
                reason: e.to_string(),
            })?;
            record.atext.check()?;
            debug!(doc = %id, head = record.head, "loaded document");
            return Ok(Self {
                id,
                store,
                atext: record.atext,
                pool: record.pool,
                head: record.head,
            });
        }

        let mut pad = Self {
            id,
            store,
            atext: AText::default(),
            pool: AttributePool::new(),
            head: -1,
        };
        info!(doc = %pad.id, "created document");

        let text = clean_text(initial_text.unwrap_or(""));
        if !text.is_empty() {
            pad.set_text(&text, "").await?;
        }
        Ok(pad)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn head(&self) -> Rev {
        self.head
    }

    pub fn atext(&self) -> &AText {
        &self.atext
    }

    pub fn text(&self) -> &str {
        &self.atext.text
    }

    pub fn pool(&self) -> &AttributePool {
        &self.pool
    }

    /// Every author that ever contributed to the document.
    pub fn all_authors(&self) -> Vec<String> {
        self.pool.authors()
    }

    /// Append `changeset` (which must apply to the current text) as the next
    /// revision and return its number.
    pub async fn append_revision(&mut self, changeset: Changeset, author: &str) -> Result<Rev> {
        let pool = self.pool.clone();
        self.append_with_pool(changeset, author, pool).await
    }

    /// Replace the whole text. The final newline is kept; a trailing newline
    /// in `new_text` is folded into it.
    pub async fn set_text(&mut self, new_text: &str, author: &str) -> Result<Rev> {
        let cleaned = clean_text(new_text);
        let body = cleaned.strip_suffix('\n').unwrap_or(&cleaned);
        if self.atext.text.strip_suffix('\n') == Some(body) {
            return Ok(self.head);
        }

        let mut pool = self.pool.clone();
        let attribs: Vec<_> = if author.is_empty() || body.is_empty() {
            Vec::new()
        } else {
            vec![pool.intern(Attribute::author(author))]
        };
        let old_len = self.atext.len();
        let changeset =
            Changeset::make_splice(&self.atext.text, 0, old_len.saturating_sub(1), body, &attribs)?;
        self.append_with_pool(changeset, author, pool).await
    }

    /// Like [`append_revision`](Self::append_revision), for a changeset whose
    /// attribute numbers refer to `pool`, an extension of this document's
    /// pool. `pool` replaces the document pool once the revision is stored.
    pub async fn append_with_pool(
        &mut self,
        changeset: Changeset,
        author: &str,
        mut pool: AttributePool,
    ) -> Result<Rev> {
        let atext = apply_to_atext(&changeset, &self.atext, &mut pool)?;
        if !author.is_empty() {
            pool.intern(Attribute::author(author));
        }

        let rev = self.head + 1;
        let record = Revision {
            changeset,
            meta: RevisionMeta {
                author: author.to_string(),
                timestamp: Utc::now(),
                atext: (rev % KEYFRAME_INTERVAL == 0).then(|| atext.clone()),
            },
        };
        self.store
            .set(&rev_key(&self.id, rev), serde_json::to_value(&record)?)
            .await?;

        let doc = DocRecord {
            head: rev,
            atext,
            pool,
        };
        self.store
            .set(&doc_key(&self.id), serde_json::to_value(&doc)?)
            .await?;

        self.head = doc.head;
        self.atext = doc.atext;
        self.pool = doc.pool;
        debug!(doc = %self.id, rev, author, "appended revision");
        Ok(rev)
    }

    fn check_rev(&self, rev: Rev) -> Result<()> {
        if rev < 0 || rev > self.head {
            return Err(LogError::RevisionNotFound {
                doc: self.id.clone(),
                rev,
            });
        }
        Ok(())
    }

    async fn read_field<T: DeserializeOwned>(&self, rev: Rev, path: &[&str]) -> Result<T> {
        self.check_rev(rev)?;
        let key = rev_key(&self.id, rev);
        let value = self
            .store
            .get_sub(&key, path)
            .await?
            .ok_or_else(|| LogError::RevisionNotFound {
                doc: self.id.clone(),
                rev,
            })?;
        serde_json::from_value(value).map_err(|e| LogError::Corrupt {
            key,
            reason: e.to_string(),
        })
    }

    pub async fn get_revision(&self, rev: Rev) -> Result<Revision> {
        self.read_field(rev, &[]).await
    }

    pub async fn get_revision_changeset(&self, rev: Rev) -> Result<Changeset> {
        self.read_field(rev, &["changeset"]).await
    }

    pub async fn get_revision_author(&self, rev: Rev) -> Result<String> {
        self.read_field(rev, &["meta", "author"]).await
    }

    pub async fn get_revision_date(&self, rev: Rev) -> Result<DateTime<Utc>> {
        self.read_field(rev, &["meta", "timestamp"]).await
    }

    /// Reconstruct the document as of `rev` from the nearest snapshot at or
    /// below it plus the changesets in between.
    pub async fn get_internal_revision_atext(&self, rev: Rev) -> Result<AText> {
        if rev == -1 {
            return Ok(AText::default());
        }
        self.check_rev(rev)?;

        let key_rev = key_revision_number(rev);
        let mut atext: AText = self.read_field(key_rev, &["meta", "atext"]).await?;
        atext.check()?;

        // Replaying only recombines pairs the pool already holds.
        let mut pool = self.pool.clone();
        for r in key_rev + 1..=rev {
            let changeset = self.get_revision_changeset(r).await?;
            atext = apply_to_atext(&changeset, &atext, &mut pool)?;
        }
        Ok(atext)
    }

    /// Revisions `start..=end` in order; `end` defaults to the head.
    pub async fn get_revision_set(&self, start: Rev, end: Option<Rev>) -> Result<Vec<Revision>> {
        let end = end.unwrap_or(self.head);
        if start < 0 || start > end || end > self.head {
            return Err(LogError::InvalidRange {
                start,
                end,
                head: self.head,
            });
        }

        let mut revisions = Vec::with_capacity((end - start + 1) as usize);
        for rev in start..=end {
            revisions.push(self.get_revision(rev).await?);
        }
        Ok(revisions)
    }

    /// Authors of revisions `start..=end`, each with the timestamp of their
    /// most recent revision in the range. Anonymous revisions are skipped.
    pub async fn get_authors_for_revision_set(
        &self,
        start: Rev,
        end: Option<Rev>,
    ) -> Result<BTreeMap<String, DateTime<Utc>>> {
        let mut authors = BTreeMap::new();
        for revision in self.get_revision_set(start, end).await? {
            if revision.meta.author.is_empty() {
                continue;
            }
            authors
                .entry(revision.meta.author)
                .and_modify(|latest: &mut DateTime<Utc>| {
                    *latest = (*latest).max(revision.meta.timestamp)
                })
                .or_insert(revision.meta.timestamp);
        }
        Ok(authors)
    }

    /// Delete every record of this document, the document record last, and
    /// reset to the empty state.
    pub async fn remove(&mut self) -> Result<()> {
        for rev in 0..=self.head {
            self.store.remove(&rev_key(&self.id, rev)).await?;
        }
        self.store.remove(&doc_key(&self.id)).await?;

        info!(doc = %self.id, revisions = self.head + 1, "removed document");
        self.head = -1;
        self.atext = AText::default();
        self.pool = AttributePool::new();
        Ok(())
    }
}
