// Notes

pub(super) const SELECT_NOTES_BASE: &str = r#"
    SELECT n.id, n.owner_id, n.title, n.content, n.subject, n.tags,
           n.is_public, n.is_approved, n.like_count, n.view_count,
           n.created_at, n.updated_at, p.display_name AS author_name
    FROM notes n
    LEFT JOIN profiles p ON p.user_id = n.owner_id
"#;

pub(super) const SELECT_NOTE_BY_ID: &str = r#"
    SELECT n.id, n.owner_id, n.title, n.content, n.subject, n.tags,
           n.is_public, n.is_approved, n.like_count, n.view_count,
           n.created_at, n.updated_at, p.display_name AS author_name
    FROM notes n
    LEFT JOIN profiles p ON p.user_id = n.owner_id
    WHERE n.id = ?1
"#;

pub(super) const INSERT_NOTE: &str = r#"
    INSERT INTO notes (
        id, owner_id, title, content, subject, tags,
        is_public, is_approved, like_count, view_count, created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 0, 0, ?8, ?8)
"#;

pub(super) const UPDATE_NOTE: &str = r#"
    UPDATE notes
    SET title = ?2, content = ?3, subject = ?4, tags = ?5, is_public = ?6, updated_at = ?7
    WHERE id = ?1
"#;

pub(super) const UPDATE_NOTE_APPROVAL: &str = r#"
    UPDATE notes SET is_approved = ?2, updated_at = ?3 WHERE id = ?1
"#;

pub(super) const INCREMENT_NOTE_VIEW_COUNT: &str = r#"
    UPDATE notes SET view_count = view_count + 1 WHERE id = ?1
"#;

pub(super) const DELETE_NOTE: &str = r#"
    DELETE FROM notes WHERE id = ?1
"#;

pub(super) const INSERT_NOTE_LIKE: &str = r#"
    INSERT INTO note_likes (note_id, user_id, created_at)
    VALUES (?1, ?2, ?3)
    ON CONFLICT(note_id, user_id) DO NOTHING
"#;

pub(super) const DELETE_NOTE_LIKE: &str = r#"
    DELETE FROM note_likes WHERE note_id = ?1 AND user_id = ?2
"#;

pub(super) const REFRESH_NOTE_LIKE_COUNT: &str = r#"
    UPDATE notes
    SET like_count = (SELECT COUNT(*) FROM note_likes l WHERE l.note_id = notes.id)
    WHERE id = ?1
"#;

pub(super) const SELECT_LIKED_NOTE_IDS: &str = r#"
    SELECT note_id
    FROM note_likes
    WHERE user_id = ?1
    ORDER BY created_at DESC
"#;

// Comments

pub(super) const SELECT_COMMENTS_BY_NOTE: &str = r#"
    SELECT m.id, m.note_id, m.owner_id, m.content, m.created_at,
           p.display_name AS author_name
    FROM note_comments m
    LEFT JOIN profiles p ON p.user_id = m.owner_id
    WHERE m.note_id = ?1
    ORDER BY m.created_at DESC, m.rowid DESC
    LIMIT ?2
"#;

pub(super) const SELECT_COMMENT_BY_ID: &str = r#"
    SELECT m.id, m.note_id, m.owner_id, m.content, m.created_at,
           p.display_name AS author_name
    FROM note_comments m
    LEFT JOIN profiles p ON p.user_id = m.owner_id
    WHERE m.id = ?1
"#;

pub(super) const SELECT_ALL_COMMENTS_BY_NOTE: &str = r#"
    SELECT m.id, m.note_id, m.owner_id, m.content, m.created_at,
           p.display_name AS author_name
    FROM note_comments m
    LEFT JOIN profiles p ON p.user_id = m.owner_id
    WHERE m.note_id = ?1
"#;

pub(super) const INSERT_COMMENT: &str = r#"
    INSERT INTO note_comments (id, note_id, owner_id, content, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5)
"#;

pub(super) const DELETE_COMMENT: &str = r#"
    DELETE FROM note_comments WHERE id = ?1
"#;

// Hangout spots

pub(super) const SELECT_SPOTS_BASE: &str = r#"
    SELECT s.id, s.owner_id, s.name, s.description, s.spot_type,
           s.latitude, s.longitude, s.capacity, s.is_active,
           s.created_at, s.updated_at,
           (SELECT COUNT(*) FROM hangout_checkins c
             WHERE c.spot_id = s.id AND c.is_active = 1) AS current_occupancy
    FROM hangout_spots s
"#;

pub(super) const SELECT_SPOT_BY_ID: &str = r#"
    SELECT s.id, s.owner_id, s.name, s.description, s.spot_type,
           s.latitude, s.longitude, s.capacity, s.is_active,
           s.created_at, s.updated_at,
           (SELECT COUNT(*) FROM hangout_checkins c
             WHERE c.spot_id = s.id AND c.is_active = 1) AS current_occupancy
    FROM hangout_spots s
    WHERE s.id = ?1
"#;

pub(super) const INSERT_SPOT: &str = r#"
    INSERT INTO hangout_spots (
        id, owner_id, name, description, spot_type,
        latitude, longitude, capacity, is_active, created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?9)
"#;

pub(super) const UPDATE_SPOT: &str = r#"
    UPDATE hangout_spots
    SET name = ?2, description = ?3, spot_type = ?4, capacity = ?5, is_active = ?6, updated_at = ?7
    WHERE id = ?1
"#;

pub(super) const DELETE_SPOT: &str = r#"
    DELETE FROM hangout_spots WHERE id = ?1
"#;

// Check-ins

pub(super) const SELECT_CHECKINS_BASE: &str = r#"
    SELECT c.id, c.spot_id, c.user_id, c.checked_in_at, c.checked_out_at, c.is_active,
           p.display_name AS user_name
    FROM hangout_checkins c
    LEFT JOIN profiles p ON p.user_id = c.user_id
"#;

pub(super) const SELECT_CHECKIN_BY_ID: &str = r#"
    SELECT c.id, c.spot_id, c.user_id, c.checked_in_at, c.checked_out_at, c.is_active,
           p.display_name AS user_name
    FROM hangout_checkins c
    LEFT JOIN profiles p ON p.user_id = c.user_id
    WHERE c.id = ?1
"#;

pub(super) const SELECT_ACTIVE_CHECKIN_BY_USER: &str = r#"
    SELECT c.id, c.spot_id, c.user_id, c.checked_in_at, c.checked_out_at, c.is_active,
           p.display_name AS user_name
    FROM hangout_checkins c
    LEFT JOIN profiles p ON p.user_id = c.user_id
    WHERE c.user_id = ?1 AND c.is_active = 1
"#;

pub(super) const SELECT_ACTIVE_CHECKINS_BY_SPOT: &str = r#"
    SELECT c.id, c.spot_id, c.user_id, c.checked_in_at, c.checked_out_at, c.is_active,
           p.display_name AS user_name
    FROM hangout_checkins c
    LEFT JOIN profiles p ON p.user_id = c.user_id
    WHERE c.spot_id = ?1 AND c.is_active = 1
"#;

pub(super) const INSERT_CHECKIN: &str = r#"
    INSERT INTO hangout_checkins (id, spot_id, user_id, checked_in_at, checked_out_at, is_active)
    VALUES (?1, ?2, ?3, ?4, NULL, 1)
"#;

pub(super) const CLOSE_CHECKIN: &str = r#"
    UPDATE hangout_checkins
    SET is_active = 0, checked_out_at = ?2
    WHERE id = ?1 AND is_active = 1
"#;

// Profiles

pub(super) const UPSERT_PROFILE: &str = r#"
    INSERT INTO profiles (user_id, display_name, updated_at)
    VALUES (?1, ?2, ?3)
    ON CONFLICT(user_id) DO UPDATE SET
        display_name = excluded.display_name,
        updated_at = excluded.updated_at
"#;
