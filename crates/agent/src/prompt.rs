//! Prompt construction.
//!
//! Layout, in order:
//!
//! 1. one system message: persona, then either the reference block or the
//!    no-grounding instruction
//! 2. the user's recent turns, oldest first
//! 3. the current question

use ragline_core::message::{ConversationTurn, Message};
use ragline_knowledge::RetrievalResult;

const GROUNDED_INSTRUCTION: &str = "請根據以下資訊回答問題，資訊中沒有的內容請勿自行編造：";

const UNGROUNDED_INSTRUCTION: &str = "知識庫中沒有與此問題相關的資料。\
請依一般知識簡短回答，並在回答開頭說明此回答並非來自系所資料，不要編造系所的具體事實。";

pub fn build_system_prompt(persona: &str, retrieval: &RetrievalResult) -> String {
    let persona = persona.trim();
    if retrieval.is_grounded() {
        format!("{persona}\n{GROUNDED_INSTRUCTION}\n{}", retrieval.reference_text)
    } else {
        format!("{persona}\n{UNGROUNDED_INSTRUCTION}")
    }
}

pub fn build_messages(
    persona: &str,
    retrieval: &RetrievalResult,
    history: &[ConversationTurn],
    user_text: &str,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(build_system_prompt(persona, retrieval)));
    messages.extend(history.iter().map(ConversationTurn::to_message));
    messages.push(Message::user(user_text));
    messages
}
