//! Per-user sliding-window conversation history.
//!
//! Each user's turns live behind their own mutex, so concurrent turns for the
//! same user serialize while different users never contend. Locks are plain
//! `parking_lot` mutexes and are never held across an `.await`.

use dashmap::DashMap;
use parking_lot::Mutex;
use ragline_core::message::ConversationTurn;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Turns that survive eviction no matter how large they are.
pub const MIN_RETAINED_TURNS: usize = 2;

pub const DEFAULT_HISTORY_CHAR_BUDGET: usize = 2000;

type History = Arc<Mutex<VecDeque<ConversationTurn>>>;

/// User id → ordered turns, oldest first.
///
/// Budget rule: while a user holds more than [`MIN_RETAINED_TURNS`] turns and
/// their total character count exceeds the budget, the oldest turn is evicted.
/// Characters are Unicode scalar values, not bytes.
#[derive(Debug)]
pub struct ConversationMemory {
    histories: DashMap<String, History>,
    char_budget: usize,
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CHAR_BUDGET)
    }
}

impl ConversationMemory {
    pub fn new(char_budget: usize) -> Self {
        Self {
            histories: DashMap::new(),
            char_budget,
        }
    }

    pub fn char_budget(&self) -> usize {
        self.char_budget
    }

    /// The history handle for `user_id`, created on first use.
    ///
    /// The map shard guard is released before the caller locks the history.
    fn history(&self, user_id: &str) -> History {
        if let Some(existing) = self.histories.get(user_id) {
            return existing.clone();
        }
        self.histories
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }

    fn existing(&self, user_id: &str) -> Option<History> {
        self.histories.get(user_id).map(|h| h.clone())
    }

    /// Append one turn without applying the budget.
    pub fn append(&self, user_id: &str, turn: ConversationTurn) {
        self.history(user_id).lock().push_back(turn);
    }

    /// Up to `n` most recent turns, oldest first. Unknown users get nothing.
    pub fn recent(&self, user_id: &str, n: usize) -> Vec<ConversationTurn> {
        let Some(history) = self.existing(user_id) else {
            return Vec::new();
        };
        let turns = history.lock();
        let skip = turns.len().saturating_sub(n);
        turns.iter().skip(skip).cloned().collect()
    }

    /// Evict the oldest turns of `user_id` until the budget holds.
    ///
    /// Returns the number of evicted turns.
    pub fn enforce_budget(&self, user_id: &str) -> usize {
        let Some(history) = self.existing(user_id) else {
            return 0;
        };
        let mut turns = history.lock();
        let evicted = evict(&mut turns, self.char_budget);
        if evicted > 0 {
            debug!(user_id, evicted, remaining = turns.len(), "History trimmed to budget");
        }
        evicted
    }

    /// Record a completed exchange: both turns and the budget check happen
    /// under one lock, so a concurrent reader never sees half an exchange.
    pub fn record_exchange(
        &self,
        user_id: &str,
        user_turn: ConversationTurn,
        assistant_turn: ConversationTurn,
    ) {
        let history = self.history(user_id);
        let mut turns = history.lock();
        turns.push_back(user_turn);
        turns.push_back(assistant_turn);
        let evicted = evict(&mut turns, self.char_budget);
        debug!(user_id, turns = turns.len(), evicted, "Exchange recorded");
    }

    /// Number of turns held for `user_id`.
    pub fn len(&self, user_id: &str) -> usize {
        self.existing(user_id).map_or(0, |h| h.lock().len())
    }

    pub fn is_empty(&self, user_id: &str) -> bool {
        self.len(user_id) == 0
    }

    /// Total characters across `user_id`'s turns.
    pub fn total_chars(&self, user_id: &str) -> usize {
        self.existing(user_id)
            .map_or(0, |h| h.lock().iter().map(ConversationTurn::char_len).sum())
    }

    /// Users with a history entry.
    pub fn user_count(&self) -> usize {
        self.histories.len()
    }
}

fn evict(turns: &mut VecDeque<ConversationTurn>, budget: usize) -> usize {
    let mut total: usize = turns.iter().map(ConversationTurn::char_len).sum();
    let mut evicted = 0;
    while turns.len() > MIN_RETAINED_TURNS && total > budget {
        match turns.pop_front() {
            Some(oldest) => {
                total -= oldest.char_len();
                evicted += 1;
            }
            None => break,
        }
    }
    evicted
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use ragline_core::message::TurnRole;

    fn contents(turns: &[ConversationTurn]) -> Vec<&str> {
        turns.iter().map(ConversationTurn::content).collect()
    }

    #[test]
    fn unknown_user_is_empty() {
        let memory = ConversationMemory::default();
        assert!(memory.recent("nobody", 8).is_empty());
        assert_eq!(memory.len("nobody"), 0);
        assert_eq!(memory.enforce_budget("nobody"), 0);
        assert_eq!(memory.user_count(), 0);
    }

    #[test]
    fn recent_returns_newest_in_order() {
        let memory = ConversationMemory::default();
        for i in 0..5 {
            memory.append("u", ConversationTurn::user(format!("t{i}")));
        }
        assert_eq!(contents(&memory.recent("u", 3)), vec!["t2", "t3", "t4"]);
        assert_eq!(memory.recent("u", 10).len(), 5);
        assert!(memory.recent("u", 0).is_empty());
    }

    #[test]
    fn users_are_isolated() {
        let memory = ConversationMemory::default();
        memory.record_exchange("a", ConversationTurn::user("q"), ConversationTurn::assistant("r"));
        assert_eq!(memory.len("a"), 2);
        assert_eq!(memory.len("b"), 0);
        assert_eq!(memory.user_count(), 1);
    }

    #[test]
    fn exchange_is_user_then_assistant() {
        let memory = ConversationMemory::default();
        memory.record_exchange("u", ConversationTurn::user("問"), ConversationTurn::assistant("答"));
        let turns = memory.recent("u", 8);
        assert_eq!(turns[0].role(), TurnRole::User);
        assert_eq!(turns[1].role(), TurnRole::Assistant);
    }

    #[test]
    fn budget_evicts_oldest_first() {
        let memory = ConversationMemory::new(10);
        memory.append("u", ConversationTurn::user("aaaa"));
        memory.append("u", ConversationTurn::assistant("bbbb"));
        memory.append("u", ConversationTurn::user("cccc"));
        assert_eq!(memory.enforce_budget("u"), 1);
        assert_eq!(contents(&memory.recent("u", 8)), vec!["bbbb", "cccc"]);
    }

    #[test]
    fn budget_counts_characters_not_bytes() {
        let memory = ConversationMemory::new(6);
        memory.append("u", ConversationTurn::user("電機"));
        memory.append("u", ConversationTurn::assistant("老師"));
        memory.append("u", ConversationTurn::user("你好"));
        // 6 characters but 18 bytes: nothing to evict.
        assert_eq!(memory.enforce_budget("u"), 0);
        assert_eq!(memory.total_chars("u"), 6);
    }

    #[test]
    fn two_newest_turns_survive_oversized_content() {
        let memory = ConversationMemory::new(5);
        memory.record_exchange(
            "u",
            ConversationTurn::user("x".repeat(100)),
            ConversationTurn::assistant("y".repeat(100)),
        );
        assert_eq!(memory.len("u"), 2);
        memory.record_exchange(
            "u",
            ConversationTurn::user("z".repeat(100)),
            ConversationTurn::assistant("w".repeat(100)),
        );
        let turns = memory.recent("u", 8);
        assert_eq!(turns.len(), 2);
        assert!(turns[0].content().starts_with('z'));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_exchanges_never_interleave() {
        let memory = Arc::new(ConversationMemory::new(usize::MAX));
        let mut handles = Vec::new();
        for i in 0..32 {
            let memory = memory.clone();
            handles.push(tokio::spawn(async move {
                let user = if i % 2 == 0 { "even" } else { "odd" };
                memory.record_exchange(
                    user,
                    ConversationTurn::user(format!("q{i}")),
                    ConversationTurn::assistant(format!("a{i}")),
                );
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for user in ["even", "odd"] {
            let turns = memory.recent(user, usize::MAX);
            assert_eq!(turns.len(), 32);
            for pair in turns.chunks(2) {
                assert_eq!(pair[0].role(), TurnRole::User);
                assert_eq!(pair[1].role(), TurnRole::Assistant);
                assert_eq!(&pair[0].content()[1..], &pair[1].content()[1..]);
            }
        }
    }

    proptest! {
        #[test]
        fn prop_budget_floor_and_ceiling(
            budget in 0usize..200,
            lens in proptest::collection::vec(0usize..120, 1..30),
        ) {
            let memory = ConversationMemory::new(budget);
            for (i, len) in lens.iter().enumerate() {
                let turn = ConversationTurn::new(
                    if i % 2 == 0 { TurnRole::User } else { TurnRole::Assistant },
                    "字".repeat(*len),
                );
                memory.append("u", turn);
                memory.enforce_budget("u");

                let held = memory.len("u");
                prop_assert!(held >= (i + 1).min(MIN_RETAINED_TURNS));
                if held > MIN_RETAINED_TURNS {
                    prop_assert!(memory.total_chars("u") <= budget);
                }
            }
        }

        #[test]
        fn prop_recent_is_suffix(count in 0usize..20, n in 0usize..25) {
            let memory = ConversationMemory::new(usize::MAX);
            for i in 0..count {
                memory.append("u", ConversationTurn::user(i.to_string()));
            }
            let recent = memory.recent("u", n);
            prop_assert_eq!(recent.len(), n.min(count));
            if let Some(last) = recent.last() {
                let expected = (count - 1).to_string();
                prop_assert_eq!(last.content(), expected.as_str());
            }
        }
    }
}
