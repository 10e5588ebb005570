use std::collections::{BTreeSet, HashMap};

use anyhow::anyhow;
use parlor_types::models::{ContentKind, ConversationKind};
use parlor_types::validate::{
    MAX_GROUP_MEMBERS, ValidationError, validate_group_name, validate_photo,
};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::error::DbResultExt;
use crate::models::{ConversationSummary, LastMessageRow, UserRow};
use crate::users::{user_exists, user_from_row};
use crate::{Database, DbError, DbResult, new_id, now_timestamp, parse_column};

/// Stored columns of a conversation, before the per-viewer projection.
struct StoredConversation {
    id: String,
    kind: ConversationKind,
    name: String,
    photo: Option<Vec<u8>>,
    created_at: String,
}

impl Database {
    // -- Reads --

    /// The viewer's conversations, most recently active first.
    pub fn get_my_conversations(&self, user_id: &str) -> DbResult<Vec<ConversationSummary>> {
        self.with_conn(|conn| list_for_viewer(conn, user_id, None))
            .op("get my conversations")
    }

    /// The viewer's group conversations, most recently active first.
    pub fn get_my_groups(&self, user_id: &str) -> DbResult<Vec<ConversationSummary>> {
        self.with_conn(|conn| list_for_viewer(conn, user_id, Some(ConversationKind::Group)))
            .op("get my groups")
    }

    /// Looks a conversation up through the caller's membership. A conversation
    /// the caller does not belong to is indistinguishable from a missing one.
    pub fn get_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> DbResult<ConversationSummary> {
        self.with_conn(|conn| query_summary(conn, user_id, conversation_id))
            .op("get conversation")?
            .ok_or_else(|| DbError::not_found("conversation"))
    }

    pub fn get_conversation_members(&self, conversation_id: &str) -> DbResult<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.photo, u.created_at
                 FROM users u
                 JOIN conversation_members cm ON cm.user_id = u.id
                 WHERE cm.conversation_id = ?1
                 ORDER BY u.username",
            )?;
            let rows = stmt
                .query_map([conversation_id], user_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .op("get conversation members")
    }

    pub fn is_member(&self, conversation_id: &str, user_id: &str) -> DbResult<bool> {
        self.with_conn(|conn| is_member(conn, conversation_id, user_id))
            .op("check membership")
    }

    // -- Writes --

    /// Creates a group. The creator is always a member and duplicate ids
    /// collapse. The conversation and its roster are written in one
    /// transaction, so an unknown member leaves nothing behind.
    pub fn create_group(
        &self,
        name: &str,
        members: &[String],
        photo: Option<&[u8]>,
        creator_id: &str,
    ) -> DbResult<ConversationSummary> {
        validate_group_name(name)?;
        let photo = photo.filter(|p| !p.is_empty());
        if let Some(photo) = photo {
            validate_photo(photo)?;
        }

        let mut roster: BTreeSet<&str> = members.iter().map(String::as_str).collect();
        roster.insert(creator_id);
        if roster.len() > MAX_GROUP_MEMBERS {
            return Err(ValidationError::TooManyMembers.into());
        }

        let id = new_id();
        let now = now_timestamp();

        let summary = self
            .with_conn_mut(|conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO conversations (id, kind, name, photo, created_at)
                     VALUES (?1, 'group', ?2, ?3, ?4)",
                    params![id, name.trim(), photo, now],
                )?;
                for member in &roster {
                    if !user_exists(&tx, member)? {
                        return Err(DbError::not_found(format!("user {}", member)));
                    }
                    insert_member(&tx, &id, member, &now)?;
                }
                tx.commit()?;

                query_summary(conn, creator_id, &id)?
                    .ok_or_else(|| anyhow!("group {} missing right after insert", id).into())
            })
            .op("create group")?;

        info!(
            conversation_id = %summary.id,
            members = summary.members.len(),
            "Group created"
        );
        Ok(summary)
    }

    /// Returns the direct conversation between two users, creating it when
    /// the pair has none. The pair key is unique in the schema and the insert
    /// is an upsert, so concurrent callers converge on a single row.
    pub fn ensure_direct_conversation(
        &self,
        user_id: &str,
        peer_id: &str,
    ) -> DbResult<ConversationSummary> {
        if user_id == peer_id {
            return Err(ValidationError::SelfConversation.into());
        }
        let key = direct_key(user_id, peer_id);

        let (summary, created) = self
            .with_conn_mut(|conn| {
                let tx = conn.transaction()?;
                for id in [user_id, peer_id] {
                    if !user_exists(&tx, id)? {
                        return Err(DbError::not_found("user"));
                    }
                }

                let now = now_timestamp();
                let inserted = tx.execute(
                    "INSERT INTO conversations (id, kind, name, direct_key, created_at)
                     VALUES (?1, 'direct', '', ?2, ?3)
                     ON CONFLICT(direct_key) DO NOTHING",
                    params![new_id(), key, now],
                )?;
                let conversation_id: String = tx.query_row(
                    "SELECT id FROM conversations WHERE direct_key = ?1",
                    [&key],
                    |r| r.get(0),
                )?;
                if inserted == 1 {
                    insert_member(&tx, &conversation_id, user_id, &now)?;
                    insert_member(&tx, &conversation_id, peer_id, &now)?;
                }
                tx.commit()?;

                let summary = query_summary(conn, user_id, &conversation_id)?.ok_or_else(|| {
                    DbError::from(anyhow!("direct conversation {} has no roster", conversation_id))
                })?;
                Ok((summary, inserted == 1))
            })
            .op("ensure direct conversation")?;

        if created {
            info!(conversation_id = %summary.id, "Direct conversation created");
        }
        Ok(summary)
    }

    pub fn add_member(&self, group_id: &str, user_id: &str) -> DbResult<()> {
        self.with_conn(|conn| {
            require_group(conn, group_id)?;
            if !user_exists(conn, user_id)? {
                return Err(DbError::not_found("user"));
            }
            insert_member(conn, group_id, user_id, &now_timestamp())
                .on_conflict(|| "user is already a member".into())
        })
        .op("add member")?;

        info!(conversation_id = group_id, user_id, "Member added");
        Ok(())
    }

    /// Leaves a group. The conversation itself survives, even when empty.
    pub fn remove_member(&self, group_id: &str, user_id: &str) -> DbResult<()> {
        self.with_conn(|conn| {
            require_group(conn, group_id)?;
            let removed = conn.execute(
                "DELETE FROM conversation_members WHERE conversation_id = ?1 AND user_id = ?2",
                params![group_id, user_id],
            )?;
            if removed == 0 {
                return Err(DbError::not_found("membership"));
            }
            Ok(())
        })
        .op("remove member")?;

        info!(conversation_id = group_id, user_id, "Member left");
        Ok(())
    }

    pub fn update_group_name(&self, group_id: &str, name: &str) -> DbResult<()> {
        validate_group_name(name)?;

        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE conversations SET name = ?1 WHERE id = ?2 AND kind = 'group'",
                params![name.trim(), group_id],
            )?;
            if changed == 0 {
                return Err(DbError::not_found("group"));
            }
            Ok(())
        })
        .op("update group name")
    }

    pub fn update_group_photo(&self, group_id: &str, photo: &[u8]) -> DbResult<()> {
        validate_photo(photo)?;

        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE conversations SET photo = ?1 WHERE id = ?2 AND kind = 'group'",
                params![photo, group_id],
            )?;
            if changed == 0 {
                return Err(DbError::not_found("group"));
            }
            Ok(())
        })
        .op("update group photo")
    }
}

/// Unordered pair key: the same for (a, b) and (b, a).
fn direct_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}|{}", a, b)
    } else {
        format!("{}|{}", b, a)
    }
}

pub(crate) fn is_member(conn: &Connection, conversation_id: &str, user_id: &str) -> DbResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM conversation_members WHERE conversation_id = ?1 AND user_id = ?2",
            params![conversation_id, user_id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn conversation_exists(conn: &Connection, conversation_id: &str) -> DbResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM conversations WHERE id = ?1",
            [conversation_id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Member ids of a conversation, in join order.
pub(crate) fn member_ids(conn: &Connection, conversation_id: &str) -> DbResult<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT user_id FROM conversation_members
         WHERE conversation_id = ?1
         ORDER BY joined_at, user_id",
    )?;
    let ids = stmt
        .query_map([conversation_id], |r| r.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

fn insert_member(conn: &Connection, conversation_id: &str, user_id: &str, now: &str) -> DbResult<()> {
    conn.execute(
        "INSERT INTO conversation_members (conversation_id, user_id, joined_at) VALUES (?1, ?2, ?3)",
        params![conversation_id, user_id, now],
    )?;
    Ok(())
}

/// Groups only: a direct conversation's roster is fixed at creation, so it
/// is not a valid target here.
fn require_group(conn: &Connection, conversation_id: &str) -> DbResult<()> {
    let found = conn
        .query_row(
            "SELECT 1 FROM conversations WHERE id = ?1 AND kind = 'group'",
            [conversation_id],
            |_| Ok(()),
        )
        .optional()?;
    found.ok_or_else(|| DbError::not_found("group"))
}

fn stored_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredConversation> {
    Ok(StoredConversation {
        id: row.get(0)?,
        kind: parse_column(row, 1)?,
        name: row.get(2)?,
        photo: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn list_for_viewer(
    conn: &Connection,
    viewer: &str,
    kind: Option<ConversationKind>,
) -> DbResult<Vec<ConversationSummary>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.kind, c.name, c.photo, c.created_at
         FROM conversations c
         JOIN conversation_members cm ON cm.conversation_id = c.id
         WHERE cm.user_id = ?1 AND (?2 IS NULL OR c.kind = ?2)
         ORDER BY COALESCE(
                      (SELECT MAX(m.created_at) FROM messages m WHERE m.conversation_id = c.id),
                      c.created_at
                  ) DESC,
                  c.rowid DESC",
    )?;
    let stored = stmt
        .query_map(params![viewer, kind.map(|k| k.as_str())], stored_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    debug!(viewer, count = stored.len(), "Listing conversations");
    if stored.is_empty() {
        return Ok(Vec::new());
    }
    let mut projection = Projection::load(conn, viewer, None)?;
    Ok(stored
        .into_iter()
        .map(|conversation| projection.apply(viewer, conversation))
        .collect())
}

fn query_summary(
    conn: &Connection,
    viewer: &str,
    conversation_id: &str,
) -> DbResult<Option<ConversationSummary>> {
    let stored = conn
        .query_row(
            "SELECT c.id, c.kind, c.name, c.photo, c.created_at
             FROM conversations c
             JOIN conversation_members cm ON cm.conversation_id = c.id
             WHERE c.id = ?1 AND cm.user_id = ?2",
            params![conversation_id, viewer],
            stored_from_row,
        )
        .optional()?;

    let Some(stored) = stored else {
        return Ok(None);
    };
    let mut projection = Projection::load(conn, viewer, Some(conversation_id))?;
    Ok(Some(projection.apply(viewer, stored)))
}

/// A member as seen from the conversation list. `photo` is only loaded for
/// direct conversations, where it stands in for the conversation's own.
struct MemberEntry {
    user_id: String,
    username: String,
    photo: Option<Vec<u8>>,
}

/// Rosters and last messages of the viewer's conversations, loaded with one
/// query each. `only` narrows both to a single conversation.
struct Projection {
    members: HashMap<String, Vec<MemberEntry>>,
    last_messages: HashMap<String, LastMessageRow>,
}

impl Projection {
    fn load(conn: &Connection, viewer: &str, only: Option<&str>) -> DbResult<Self> {
        let mut members: HashMap<String, Vec<MemberEntry>> = HashMap::new();
        let mut stmt = conn.prepare_cached(
            "SELECT cm.conversation_id, cm.user_id, u.username,
                    CASE WHEN c.kind = 'direct' THEN u.photo END
             FROM conversation_members mine
             JOIN conversations c ON c.id = mine.conversation_id
             JOIN conversation_members cm ON cm.conversation_id = mine.conversation_id
             JOIN users u ON u.id = cm.user_id
             WHERE mine.user_id = ?1 AND (?2 IS NULL OR mine.conversation_id = ?2)
             ORDER BY cm.joined_at, cm.user_id",
        )?;
        let rows = stmt.query_map(params![viewer, only], |r| {
            Ok((
                r.get::<_, String>(0)?,
                MemberEntry {
                    user_id: r.get(1)?,
                    username: r.get(2)?,
                    photo: r.get(3)?,
                },
            ))
        })?;
        for row in rows {
            let (conversation_id, member) = row?;
            members.entry(conversation_id).or_default().push(member);
        }

        let mut last_messages = HashMap::new();
        let mut stmt = conn.prepare_cached(
            "SELECT mine.conversation_id, m.content_kind, m.content, m.sender_id, m.created_at
             FROM conversation_members mine
             JOIN messages m ON m.rowid = (
                 SELECT latest.rowid FROM messages latest
                 WHERE latest.conversation_id = mine.conversation_id
                 ORDER BY latest.created_at DESC, latest.rowid DESC
                 LIMIT 1
             )
             WHERE mine.user_id = ?1 AND (?2 IS NULL OR mine.conversation_id = ?2)",
        )?;
        let rows = stmt.query_map(params![viewer, only], |r| {
            let content_kind: ContentKind = parse_column(r, 1)?;
            let content: Vec<u8> = r.get(2)?;
            let preview = match content_kind {
                ContentKind::Text => String::from_utf8_lossy(&content).into_owned(),
                ContentKind::Photo => "Photo".to_string(),
            };
            Ok((
                r.get::<_, String>(0)?,
                LastMessageRow {
                    content_kind,
                    preview,
                    sender_id: r.get(3)?,
                    created_at: r.get(4)?,
                },
            ))
        })?;
        for row in rows {
            let (conversation_id, last) = row?;
            last_messages.insert(conversation_id, last);
        }

        Ok(Self {
            members,
            last_messages,
        })
    }

    /// Applies the per-viewer projection: a direct conversation is shown
    /// under the other member's name and photo, a group under its own.
    fn apply(&mut self, viewer: &str, stored: StoredConversation) -> ConversationSummary {
        let members = self.members.remove(&stored.id).unwrap_or_default();
        let (display_name, photo) = match stored.kind {
            ConversationKind::Group => (stored.name, stored.photo),
            ConversationKind::Direct => members
                .iter()
                .find(|m| m.user_id != viewer)
                .map(|peer| (peer.username.clone(), peer.photo.clone()))
                .unwrap_or((stored.name, None)),
        };

        ConversationSummary {
            members: members.into_iter().map(|m| m.user_id).collect(),
            last_message: self.last_messages.remove(&stored.id),
            id: stored.id,
            kind: stored.kind,
            display_name,
            photo,
            created_at: stored.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{db, user};
    use parlor_types::models::MessageContent;
    use std::sync::Arc;

    #[test]
    fn direct_conversation_is_unique_per_pair() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");

        let first = db.ensure_direct_conversation(&alice.id, &bob.id).unwrap();
        let again = db.ensure_direct_conversation(&alice.id, &bob.id).unwrap();
        let reversed = db.ensure_direct_conversation(&bob.id, &alice.id).unwrap();

        assert_eq!(first.id, again.id);
        assert_eq!(first.id, reversed.id);
        assert_eq!(first.kind, ConversationKind::Direct);
        assert_eq!(first.members.len(), 2);

        let rows: i64 = db
            .with_conn(|c| {
                Ok(c.query_row(
                    "SELECT COUNT(*) FROM conversations WHERE kind = 'direct'",
                    [],
                    |r| r.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn concurrent_direct_creation_converges() {
        let db = Arc::new(db());
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let db = db.clone();
                let (a, b) = if i % 2 == 0 {
                    (alice.id.clone(), bob.id.clone())
                } else {
                    (bob.id.clone(), alice.id.clone())
                };
                std::thread::spawn(move || db.ensure_direct_conversation(&a, &b).unwrap().id)
            })
            .collect();

        let ids: BTreeSet<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn direct_conversation_rejects_self_and_unknown_peer() {
        let db = db();
        let alice = user(&db, "alice");

        assert!(matches!(
            db.ensure_direct_conversation(&alice.id, &alice.id),
            Err(DbError::Invalid(ValidationError::SelfConversation))
        ));
        assert!(matches!(
            db.ensure_direct_conversation(&alice.id, "ghost"),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn direct_conversation_is_projected_per_viewer() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        db.update_user_photo(&bob.id, &[9, 9]).unwrap();

        let conv = db.ensure_direct_conversation(&alice.id, &bob.id).unwrap();

        let as_alice = db.get_conversation(&alice.id, &conv.id).unwrap();
        assert_eq!(as_alice.display_name, "bob");
        assert_eq!(as_alice.photo, Some(vec![9, 9]));

        let as_bob = db.get_conversation(&bob.id, &conv.id).unwrap();
        assert_eq!(as_bob.display_name, "alice");
        assert_eq!(as_bob.photo, None);
    }

    #[test]
    fn outsiders_cannot_see_a_conversation() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let eve = user(&db, "eve");
        let conv = db.ensure_direct_conversation(&alice.id, &bob.id).unwrap();

        assert!(matches!(
            db.get_conversation(&eve.id, &conv.id),
            Err(DbError::NotFound(_))
        ));
        assert!(!db.is_member(&conv.id, &eve.id).unwrap());
    }

    #[test]
    fn group_creation_adds_creator_and_dedupes() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");

        let group = db
            .create_group("book club", &[bob.id.clone(), bob.id.clone()], None, &alice.id)
            .unwrap();

        assert_eq!(group.kind, ConversationKind::Group);
        assert_eq!(group.display_name, "book club");
        let members: BTreeSet<_> = group.members.iter().cloned().collect();
        assert_eq!(members, BTreeSet::from([alice.id.clone(), bob.id.clone()]));
    }

    #[test]
    fn group_with_unknown_member_leaves_no_rows() {
        let db = db();
        let alice = user(&db, "alice");

        let err = db
            .create_group("book club", &["ghost".to_string()], None, &alice.id)
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
        assert!(db.get_my_conversations(&alice.id).unwrap().is_empty());

        let count: i64 = db
            .with_conn(|c| Ok(c.query_row("SELECT COUNT(*) FROM conversations", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn group_name_and_photo_updates() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let group = db.create_group("book club", &[], None, &alice.id).unwrap();

        assert!(matches!(
            db.update_group_name(&group.id, "no"),
            Err(DbError::Invalid(ValidationError::InvalidName))
        ));
        assert!(matches!(
            db.update_group_name("ghost", "valid name"),
            Err(DbError::NotFound(_))
        ));
        assert!(matches!(
            db.update_group_photo(&group.id, &[]),
            Err(DbError::Invalid(ValidationError::EmptyPhoto))
        ));

        let direct = db.ensure_direct_conversation(&alice.id, &bob.id).unwrap();
        assert!(matches!(
            db.update_group_name(&direct.id, "valid name"),
            Err(DbError::NotFound(_))
        ));

        db.update_group_name(&group.id, "poetry club").unwrap();
        db.update_group_photo(&group.id, &[1, 2]).unwrap();
        let group = db.get_conversation(&alice.id, &group.id).unwrap();
        assert_eq!(group.display_name, "poetry club");
        assert_eq!(group.photo, Some(vec![1, 2]));
    }

    #[test]
    fn membership_changes() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let group = db.create_group("book club", &[], None, &alice.id).unwrap();

        db.add_member(&group.id, &bob.id).unwrap();
        assert!(matches!(
            db.add_member(&group.id, &bob.id),
            Err(DbError::Conflict(_))
        ));
        assert!(matches!(
            db.add_member(&group.id, "ghost"),
            Err(DbError::NotFound(_))
        ));

        db.remove_member(&group.id, &bob.id).unwrap();
        assert!(matches!(
            db.remove_member(&group.id, &bob.id),
            Err(DbError::NotFound(_))
        ));

        // The last member leaving keeps the conversation row.
        db.remove_member(&group.id, &alice.id).unwrap();
        let exists = db
            .with_conn(|c| conversation_exists(c, &group.id))
            .unwrap();
        assert!(exists);
    }

    #[test]
    fn direct_rosters_are_fixed() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let carol = user(&db, "carol");
        let direct = db.ensure_direct_conversation(&alice.id, &bob.id).unwrap();

        assert!(matches!(
            db.add_member(&direct.id, &carol.id),
            Err(DbError::NotFound(_))
        ));
        assert!(matches!(
            db.remove_member(&direct.id, &bob.id),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn conversations_are_ordered_by_recent_activity() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");

        let older = db.create_group("first group", &[], None, &alice.id).unwrap();
        let newer = db.ensure_direct_conversation(&alice.id, &bob.id).unwrap();
        let ids: Vec<_> = db
            .get_my_conversations(&alice.id)
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![newer.id.clone(), older.id.clone()]);

        db.send_message(&older.id, &alice.id, &MessageContent::text("bump"), None)
            .unwrap();
        let list = db.get_my_conversations(&alice.id).unwrap();
        assert_eq!(list[0].id, older.id);
        let last = list[0].last_message.as_ref().unwrap();
        assert_eq!(last.preview, "bump");
        assert_eq!(last.content_kind, ContentKind::Text);

        let groups = db.get_my_groups(&alice.id).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id, older.id);
    }

    #[test]
    fn listing_projects_each_conversation_on_its_own() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let carol = user(&db, "carol");
        db.update_user_photo(&carol.id, &[3]).unwrap();

        let with_bob = db.ensure_direct_conversation(&alice.id, &bob.id).unwrap();
        let with_carol = db.ensure_direct_conversation(&alice.id, &carol.id).unwrap();
        let group = db
            .create_group("everyone", &[bob.id.clone(), carol.id.clone()], Some(&[7u8][..]), &alice.id)
            .unwrap();
        // Not alice's, so never part of her listing.
        db.ensure_direct_conversation(&bob.id, &carol.id).unwrap();

        db.send_message(&with_bob.id, &bob.id, &MessageContent::text("first"), None)
            .unwrap();
        db.send_message(&with_bob.id, &alice.id, &MessageContent::text("second"), None)
            .unwrap();
        db.send_message(&group.id, &carol.id, &MessageContent::text("hey all"), None)
            .unwrap();

        let list = db.get_my_conversations(&alice.id).unwrap();
        assert_eq!(list.len(), 3);
        let find = |id: &str| list.iter().find(|c| c.id == id).unwrap();

        let b = find(&with_bob.id);
        assert_eq!(b.display_name, "bob");
        assert_eq!(b.photo, None);
        assert_eq!(
            b.members.iter().cloned().collect::<BTreeSet<_>>(),
            BTreeSet::from([alice.id.clone(), bob.id.clone()])
        );
        assert_eq!(b.last_message.as_ref().unwrap().preview, "second");

        let c = find(&with_carol.id);
        assert_eq!(c.display_name, "carol");
        assert_eq!(c.photo, Some(vec![3]));
        assert!(c.last_message.is_none());

        let g = find(&group.id);
        assert_eq!(g.display_name, "everyone");
        assert_eq!(g.photo, Some(vec![7]));
        assert_eq!(g.members.len(), 3);
        assert_eq!(g.last_message.as_ref().unwrap().sender_id, carol.id);
    }

    #[test]
    fn photo_messages_preview_as_photo() {
        let db = db();
        let alice = user(&db, "alice");
        let group = db.create_group("album", &[], None, &alice.id).unwrap();
        db.send_message(&group.id, &alice.id, &MessageContent::photo(vec![0xFF, 0xD8, 0xFF]), None)
            .unwrap();

        let conv = db.get_conversation(&alice.id, &group.id).unwrap();
        let last = conv.last_message.unwrap();
        assert_eq!(last.preview, "Photo");
        assert_eq!(last.content_kind, ContentKind::Photo);
    }

    #[test]
    fn members_are_listed_with_profiles() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let group = db.create_group("book club", &[bob.id.clone()], None, &alice.id).unwrap();

        let names: Vec<_> = db
            .get_conversation_members(&group.id)
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }
}
