//! Human-readable school identifiers: `SID-{BOARD}-{NNN}`, one running
//! sequence per board.

use rusqlite::Connection;
use std::collections::HashMap;

pub const UID_PREFIX: &str = "SID";
pub const SEQ_WIDTH: usize = 3;

/// Board name with all whitespace removed. Sequences are keyed on this so
/// that "CBSE" and "C BSE" can never hand out the same uid.
pub fn board_key(board: &str) -> String {
    board.chars().filter(|c| !c.is_whitespace()).collect()
}

pub fn format_uid(board: &str, seq: i64) -> String {
    format!(
        "{}-{}-{:0width$}",
        UID_PREFIX,
        board_key(board),
        seq,
        width = SEQ_WIDTH
    )
}

/// Numeric suffix after the last `-`.
pub fn parse_seq(uid: &str) -> Option<i64> {
    uid.rsplit_once('-')
        .and_then(|(_, tail)| tail.trim().parse::<i64>().ok())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub sn: i64,
    pub uid: String,
}

/// In-memory running counters, seeded once from what is already stored.
#[derive(Debug, Default)]
pub struct UidAllocator {
    last: HashMap<String, i64>,
}

impl UidAllocator {
    /// Raises the counter for `board` to at least `seq`.
    pub fn observe(&mut self, board: &str, seq: i64) {
        let slot = self.last.entry(board_key(board)).or_insert(0);
        if seq > *slot {
            *slot = seq;
        }
    }

    /// Seeds from stored rows and the persisted per-board counters, in one
    /// pass each.
    pub fn load(conn: &Connection) -> rusqlite::Result<Self> {
        let mut alloc = UidAllocator::default();

        let mut stmt = conn.prepare("SELECT board, sn, uid FROM school_data ORDER BY sn")?;
        let rows = stmt
            .query_map([], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (board, sn, uid) in rows {
            alloc.observe(&board, sn);
            if let Some(seq) = parse_seq(&uid) {
                alloc.observe(&board, seq);
            }
        }

        let mut stmt = conn.prepare("SELECT board_key, last_seq FROM board_counters")?;
        let counters = stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        for (key, last_seq) in counters {
            alloc.observe(&key, last_seq);
        }

        Ok(alloc)
    }

    pub fn allocate(&mut self, board: &str) -> Allocation {
        let slot = self.last.entry(board_key(board)).or_insert(0);
        *slot += 1;
        Allocation {
            uid: format_uid(board, *slot),
            sn: *slot,
        }
    }

    /// Current high-water mark per board key.
    pub fn counters(&self) -> impl Iterator<Item = (&str, i64)> {
        self.last.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_two_for_a_board_are_001_and_002() {
        let mut alloc = UidAllocator::default();
        assert_eq!(alloc.allocate("CBSE").uid, "SID-CBSE-001");
        let second = alloc.allocate("CBSE");
        assert_eq!(second.uid, "SID-CBSE-002");
        assert_eq!(second.sn, 2);
    }

    #[test]
    fn boards_count_independently() {
        let mut alloc = UidAllocator::default();
        alloc.allocate("CBSE");
        alloc.allocate("CBSE");
        assert_eq!(alloc.allocate("ICSE").uid, "SID-ICSE-001");
        assert_eq!(alloc.allocate("CBSE").uid, "SID-CBSE-003");
    }

    #[test]
    fn whitespace_is_stripped_from_board() {
        let mut alloc = UidAllocator::default();
        assert_eq!(alloc.allocate("State Board").uid, "SID-StateBoard-001");
        assert_eq!(alloc.allocate("StateBoard").uid, "SID-StateBoard-002");
    }

    #[test]
    fn continues_after_observed_sequence() {
        let mut alloc = UidAllocator::default();
        alloc.observe("CBSE", 41);
        alloc.observe("CBSE", 7);
        assert_eq!(alloc.allocate("CBSE").uid, "SID-CBSE-042");
    }

    #[test]
    fn padding_grows_past_three_digits() {
        assert_eq!(format_uid("CBSE", 1000), "SID-CBSE-1000");
        assert_eq!(parse_seq("SID-CBSE-1000"), Some(1000));
        assert_eq!(parse_seq("SID-CBSE-x"), None);
    }
}
