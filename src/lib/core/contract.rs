//! The todo record store that lives on the ledger.
//!
//! Records are kept in an arena: slot `i` holds the record with id `i + 1`.
//! Slots are never removed, so ids are never reused and the count never
//! shrinks. Deleting a record overwrites its slot with the zero record.

use serde::{Deserialize, Serialize};

use crate::core::{Call, ContractError, Log, Query, QueryOutput};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TodoRecord {
    pub id: u64,
    pub content: String,
    pub completed: bool,
}

impl TodoRecord {
    /// The value returned for ids that were never created or have been deleted.
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.id == 0
    }
}

/// Result of a successful state-changing call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Execution {
    pub output: Option<u64>,
    pub logs: Vec<Log>,
}

#[derive(Debug, Clone, Default)]
pub struct TodoList {
    slots: Vec<TodoRecord>,
}

impl TodoList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new record and returns its id, which is always `count() + 1` before the call.
    pub fn create_todo(&mut self, content: impl Into<String>) -> u64 {
        let id = self.todo_count() + 1;
        self.slots.push(TodoRecord {
            id,
            content: content.into(),
            completed: false,
        });
        id
    }

    pub fn todos(&self, id: u64) -> TodoRecord {
        self.slot(id).cloned().unwrap_or_default()
    }

    /// Flips the completion flag and returns the new value. Slots without a live record are rejected.
    pub fn toggle_completed(&mut self, id: u64) -> Result<bool, ContractError> {
        let record = self.live_slot_mut(id).ok_or(ContractError::TodoNotFound(id))?;
        record.completed = !record.completed;
        Ok(record.completed)
    }

    /// Zeroes the slot. Returns whether a live record was removed; deleting an empty slot is a no-op.
    pub fn delete_todo(&mut self, id: u64) -> bool {
        match self.live_slot_mut(id) {
            Some(record) => {
                *record = TodoRecord::zero();
                true
            }
            None => false,
        }
    }

    pub fn todo_count(&self) -> u64 {
        self.slots.len() as u64
    }

    pub fn execute(&mut self, call: &Call) -> Result<Execution, ContractError> {
        match call {
            Call::CreateTodo { content } => {
                let id = self.create_todo(content.clone());
                Ok(Execution {
                    output: Some(id),
                    logs: vec![Log::TodoCreated { id, content: content.clone() }],
                })
            }
            Call::ToggleCompleted { id } => {
                let completed = self.toggle_completed(*id)?;
                Ok(Execution {
                    output: None,
                    logs: vec![Log::TodoToggled { id: *id, completed }],
                })
            }
            Call::DeleteTodo { id } => {
                let logs = if self.delete_todo(*id) {
                    vec![Log::TodoDeleted { id: *id }]
                } else {
                    vec![]
                };
                Ok(Execution { output: None, logs })
            }
        }
    }

    pub fn query(&self, query: &Query) -> QueryOutput {
        match query {
            Query::Todos { id } => QueryOutput::Todo(self.todos(*id)),
            Query::TodoCount => QueryOutput::Count(self.todo_count()),
        }
    }

    fn slot(&self, id: u64) -> Option<&TodoRecord> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        self.slots.get(index)
    }

    fn live_slot_mut(&mut self, id: u64) -> Option<&mut TodoRecord> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        self.slots.get_mut(index).filter(|record| !record.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(id: u64, content: &str, completed: bool) -> TodoRecord {
        TodoRecord {
            id,
            content: content.to_string(),
            completed,
        }
    }

    #[test]
    fn create_then_get() {
        let mut list = TodoList::new();
        let id = list.create_todo("Test todo");
        assert_eq!(id, 1);
        assert_eq!(list.todos(1), record(1, "Test todo", false));
    }

    #[test]
    fn toggle_twice_restores_flag() {
        let mut list = TodoList::new();
        list.create_todo("Test todo");

        assert_eq!(list.toggle_completed(1), Ok(true));
        assert!(list.todos(1).completed);

        assert_eq!(list.toggle_completed(1), Ok(false));
        assert!(!list.todos(1).completed);
    }

    #[test]
    fn delete_zeroes_the_slot() {
        let mut list = TodoList::new();
        list.create_todo("Test todo");
        assert!(list.delete_todo(1));
        assert_eq!(list.todos(1), TodoRecord::zero());
    }

    #[test]
    fn count_survives_deletes() {
        let mut list = TodoList::new();
        assert_eq!(list.todo_count(), 0);
        list.create_todo("First");
        assert_eq!(list.todo_count(), 1);
        list.create_todo("Second");
        assert_eq!(list.todo_count(), 2);
        list.delete_todo(1);
        assert_eq!(list.todo_count(), 2);
        assert_eq!(list.todos(2), record(2, "Second", false));
    }

    #[test]
    fn out_of_range_lookups_yield_zero_record() {
        let mut list = TodoList::new();
        list.create_todo("only");
        assert!(list.todos(0).is_zero());
        assert!(list.todos(2).is_zero());
        assert!(list.todos(u64::MAX).is_zero());
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let mut list = TodoList::new();
        list.create_todo("a");
        list.delete_todo(1);
        assert_eq!(list.create_todo("b"), 2);
        assert!(list.todos(1).is_zero());
    }

    #[test]
    fn toggle_rejects_deleted_and_missing_slots() {
        let mut list = TodoList::new();
        list.create_todo("gone");
        list.delete_todo(1);

        assert_eq!(list.toggle_completed(1), Err(ContractError::TodoNotFound(1)));
        assert_eq!(list.toggle_completed(7), Err(ContractError::TodoNotFound(7)));
        assert_eq!(list.toggle_completed(0), Err(ContractError::TodoNotFound(0)));
        assert_eq!(list.todos(1), TodoRecord::zero());
    }

    #[test]
    fn delete_of_empty_slot_is_a_noop() {
        let mut list = TodoList::new();
        assert!(!list.delete_todo(3));
        list.create_todo("x");
        assert!(list.delete_todo(1));
        assert!(!list.delete_todo(1));
        assert_eq!(list.todo_count(), 1);
    }

    #[test]
    fn empty_and_duplicate_content_is_accepted() {
        let mut list = TodoList::new();
        assert_eq!(list.create_todo(""), 1);
        assert_eq!(list.create_todo("same"), 2);
        assert_eq!(list.create_todo("same"), 3);
        assert_eq!(list.todos(1), record(1, "", false));
    }

    #[test]
    fn execute_emits_logs() {
        let mut list = TodoList::new();
        let created = list
            .execute(&Call::CreateTodo { content: "write docs".into() })
            .unwrap();
        assert_eq!(created.output, Some(1));
        assert_eq!(
            created.logs,
            vec![Log::TodoCreated { id: 1, content: "write docs".into() }]
        );

        let toggled = list.execute(&Call::ToggleCompleted { id: 1 }).unwrap();
        assert_eq!(toggled.logs, vec![Log::TodoToggled { id: 1, completed: true }]);

        let deleted = list.execute(&Call::DeleteTodo { id: 1 }).unwrap();
        assert_eq!(deleted.logs, vec![Log::TodoDeleted { id: 1 }]);

        let again = list.execute(&Call::DeleteTodo { id: 1 }).unwrap();
        assert!(again.logs.is_empty());

        assert!(list.execute(&Call::ToggleCompleted { id: 1 }).is_err());
    }

    #[test]
    fn query_reads_state() {
        let mut list = TodoList::new();
        list.create_todo("q");
        assert_eq!(list.query(&Query::TodoCount), QueryOutput::Count(1));
        assert_eq!(
            list.query(&Query::Todos { id: 1 }),
            QueryOutput::Todo(record(1, "q", false))
        );
    }

    #[derive(Debug, Clone)]
    enum Op {
        Create(String),
        Toggle(u64),
        Delete(u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            ".{0,12}".prop_map(Op::Create),
            (0u64..12).prop_map(Op::Toggle),
            (0u64..12).prop_map(Op::Delete),
        ]
    }

    proptest! {
        #[test]
        fn create_returns_next_id_and_stores_content(contents in proptest::collection::vec(".*", 1..16)) {
            let mut list = TodoList::new();
            for content in contents {
                let before = list.todo_count();
                let id = list.create_todo(content.clone());
                prop_assert_eq!(id, before + 1);
                prop_assert_eq!(list.todos(id), record(id, &content, false));
            }
        }

        #[test]
        fn count_never_decreases(ops in proptest::collection::vec(op(), 0..64)) {
            let mut list = TodoList::new();
            let mut last = 0;
            for op in ops {
                match op {
                    Op::Create(content) => { list.create_todo(content); }
                    Op::Toggle(id) => { let _ = list.toggle_completed(id); }
                    Op::Delete(id) => { list.delete_todo(id); }
                }
                prop_assert!(list.todo_count() >= last);
                last = list.todo_count();
            }
        }

        #[test]
        fn delete_always_yields_zero_record(content in ".*", extra in 0usize..4) {
            let mut list = TodoList::new();
            for _ in 0..extra {
                list.create_todo("filler");
            }
            let id = list.create_todo(content);
            list.delete_todo(id);
            prop_assert_eq!(list.todos(id), TodoRecord::zero());
        }

        #[test]
        fn toggle_is_an_involution(creates in 1u64..8, pick in 0u64..8) {
            let mut list = TodoList::new();
            for n in 0..creates {
                list.create_todo(format!("todo {n}"));
            }
            let id = pick % creates + 1;
            let before = list.todos(id).completed;
            list.toggle_completed(id).unwrap();
            list.toggle_completed(id).unwrap();
            prop_assert_eq!(list.todos(id).completed, before);
        }
    }
}
