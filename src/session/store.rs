//! In-memory store for one session's transcript and persona

use super::{Message, SessionEvent, SessionState};
use tokio::sync::broadcast;

/// Mutable state of one session.
///
/// State is created lazily on first access. Every mutation is announced on
/// the event channel so views can update incrementally instead of
/// re-reading the whole session.
pub struct SessionStore {
    state: Option<SessionState>,
    default_instruction: String,
    /// Bumped on every instruction change; lets a turn that started before a
    /// reset detect that its reply no longer belongs in the transcript.
    generation: u64,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    pub fn new(
        default_instruction: impl Into<String>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            state: None,
            default_instruction: default_instruction.into(),
            generation: 0,
            events,
        }
    }

    /// Current state, created with the default persona if absent
    pub fn get_state(&mut self) -> &SessionState {
        let default_instruction = &self.default_instruction;
        self.state
            .get_or_insert_with(|| SessionState::new(default_instruction.clone()))
    }

    fn state_mut(&mut self) -> &mut SessionState {
        let default_instruction = &self.default_instruction;
        self.state
            .get_or_insert_with(|| SessionState::new(default_instruction.clone()))
    }

    /// Replace the persona and clear the transcript
    pub fn apply_new_instruction(&mut self, text: impl Into<String>) {
        let instruction = text.into();
        let state = self.state_mut();
        state.instruction.clone_from(&instruction);
        state.transcript.clear();
        self.generation += 1;
        self.notify(SessionEvent::Reset { instruction });
    }

    /// Append a message. Role alternation is the caller's concern.
    pub fn append(&mut self, message: Message) {
        self.state_mut().transcript.push(message.clone());
        self.notify(SessionEvent::Message { message });
    }

    /// Append only if no instruction change happened since `generation`
    pub fn append_if_current(&mut self, generation: u64, message: Message) -> bool {
        if self.generation != generation {
            return false;
        }
        self.append(message);
        true
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Publish an event that does not change stored state
    pub fn notify(&self, event: SessionEvent) {
        // No subscribers is fine: the state is still readable via snapshots
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Role, DEFAULT_INSTRUCTION};

    fn store() -> (SessionStore, broadcast::Receiver<SessionEvent>) {
        let (tx, rx) = broadcast::channel(16);
        (SessionStore::new(DEFAULT_INSTRUCTION, tx), rx)
    }

    #[test]
    fn test_lazy_default_state() {
        let (mut store, _rx) = store();
        let state = store.get_state();
        assert!(state.transcript.is_empty());
        assert_eq!(state.instruction, DEFAULT_INSTRUCTION);
    }

    #[test]
    fn test_append_preserves_order() {
        let (mut store, _rx) = store();
        store.append(Message::user("a"));
        store.append(Message::assistant("b"));
        store.append(Message::user("c"));

        let contents: Vec<&str> = store
            .get_state()
            .transcript
            .iter()
            .map(Message::content)
            .collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_append_does_not_enforce_alternation() {
        let (mut store, _rx) = store();
        store.append(Message::user("a"));
        store.append(Message::user("b"));
        assert_eq!(store.get_state().transcript.len(), 2);
        assert!(store
            .get_state()
            .transcript
            .iter()
            .all(|m| m.role() == Role::User));
    }

    #[test]
    fn test_apply_instruction_resets_transcript() {
        let (mut store, _rx) = store();
        for i in 0..4 {
            store.append(Message::user(format!("m{i}")));
        }

        store.apply_new_instruction("You are a pirate.");

        let state = store.get_state();
        assert!(state.transcript.is_empty());
        assert_eq!(state.instruction, "You are a pirate.");
    }

    #[test]
    fn test_mutations_are_announced() {
        let (mut store, mut rx) = store();
        store.append(Message::user("hi"));
        store.apply_new_instruction("new");

        match rx.try_recv().unwrap() {
            SessionEvent::Message { message } => assert_eq!(message.content(), "hi"),
            other => panic!("unexpected event: {other:?}"),
        }
        match rx.try_recv().unwrap() {
            SessionEvent::Reset { instruction } => assert_eq!(instruction, "new"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_append_if_current_rejects_stale_generation() {
        let (mut store, _rx) = store();
        let generation = store.generation();
        store.apply_new_instruction("new");

        assert!(!store.append_if_current(generation, Message::assistant("late")));
        assert!(store.get_state().transcript.is_empty());
        assert!(store.append_if_current(store.generation(), Message::assistant("ok")));
        assert_eq!(store.get_state().transcript.len(), 1);
    }
}
