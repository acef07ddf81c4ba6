use super::{BoardStore, PersistenceError, PersistenceResult};
use crate::board::DueDateBoard;
use crate::calendar::CalendarPolicy;
use crate::task::RequestTask;
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

pub struct SqliteBoardStore {
    connection: Mutex<Connection>,
}

impl SqliteBoardStore {
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        let connection = Connection::open_in_memory()?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            CREATE TABLE IF NOT EXISTS calendar_policy (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                policy_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS request_tasks (
                id INTEGER PRIMARY KEY,
                task_json TEXT NOT NULL
            );
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn lock(&self) -> PersistenceResult<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| PersistenceError::LockPoisoned)
    }

    fn save_policy(
        &self,
        tx: &rusqlite::Transaction,
        policy: &CalendarPolicy,
    ) -> PersistenceResult<()> {
        let json = serde_json::to_string(policy)?;
        tx.execute("DELETE FROM calendar_policy", [])?;
        tx.execute(
            "INSERT INTO calendar_policy (id, policy_json) VALUES (1, ?1)",
            params![json],
        )?;
        Ok(())
    }

    fn save_tasks(&self, tx: &rusqlite::Transaction, board: &DueDateBoard) -> PersistenceResult<()> {
        tx.execute("DELETE FROM request_tasks", [])?;
        let mut stmt = tx.prepare("INSERT INTO request_tasks (id, task_json) VALUES (?1, ?2)")?;
        for task in board.tasks() {
            let json = serde_json::to_string(task)?;
            stmt.execute(params![task.id, json])?;
        }
        Ok(())
    }
}

impl BoardStore for SqliteBoardStore {
    fn save_board(&self, board: &DueDateBoard) -> PersistenceResult<()> {
        super::validate_board(board)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        self.save_policy(&tx, board.policy())?;
        self.save_tasks(&tx, board)?;
        tx.commit()?;
        debug!(tasks = board.tasks().len(), "board saved to sqlite");
        Ok(())
    }

    fn load_board(&self) -> PersistenceResult<Option<DueDateBoard>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare("SELECT policy_json FROM calendar_policy WHERE id = 1")?;
        let policy_json_opt: Option<String> = stmt.query_row([], |row| row.get(0)).optional()?;

        let Some(policy_json) = policy_json_opt else {
            return Ok(None);
        };

        let policy: CalendarPolicy = serde_json::from_str(&policy_json)?;

        let mut stmt = conn.prepare("SELECT task_json FROM request_tasks ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut tasks = Vec::new();
        for json in rows {
            let json = json?;
            let task: RequestTask = serde_json::from_str(&json)?;
            tasks.push(task);
        }

        super::validate_tasks(&tasks)?;
        Ok(Some(DueDateBoard::with_tasks(policy, tasks)?))
    }
}
