//! Database-backed static commands.

use crate::error::StoreError;
use crate::store::Store;
use crate::types::{StaticCommand, StaticMessageRow};
use tracing::{info, instrument};

impl Store {
    /// All static commands in insertion order.
    pub async fn static_commands(&self) -> Result<Vec<StaticCommand>, StoreError> {
        let rows = sqlx::query_as::<_, StaticMessageRow>(
            "SELECT command, alt_commands, response, response_keyboards \
             FROM static_messages ORDER BY id",
        )
        .fetch_all(self.pool())
        .await?;

        rows.into_iter()
            .map(|row| StaticCommand::try_from(row).map_err(StoreError::from))
            .collect()
    }

    /// Static command answering to `name`, matched against commands and alternatives.
    pub async fn static_command(&self, name: &str) -> Result<Option<StaticCommand>, StoreError> {
        Ok(self
            .static_commands()
            .await?
            .into_iter()
            .find(|cmd| cmd.answers_to(name)))
    }

    /// Create or replace the response of a static command.
    #[instrument(skip(self, response))]
    pub async fn set_static_command(&self, command: &str, response: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO static_messages (command, response) VALUES (?, ?) \
             ON CONFLICT(command) DO UPDATE SET response = excluded.response",
        )
        .bind(command.trim().to_lowercase())
        .bind(response)
        .execute(self.pool())
        .await?;
        info!("Static command '{command}' updated");
        Ok(())
    }

    /// Set the suggested replies of a static command. Returns `false` when it does not exist.
    pub async fn set_static_command_keyboards(
        &self,
        command: &str,
        keyboards: &[String],
    ) -> Result<bool, StoreError> {
        let json = serde_json::to_string(keyboards)?;
        let result = sqlx::query("UPDATE static_messages SET response_keyboards = ? WHERE command = ?")
            .bind(json)
            .bind(command.trim())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the alternative names of a static command. Returns `false` when it does not exist.
    pub async fn set_static_command_alternatives(
        &self,
        command: &str,
        alternatives: &[String],
    ) -> Result<bool, StoreError> {
        let alternatives: Vec<String> = alternatives
            .iter()
            .map(|alt| alt.trim().to_lowercase())
            .filter(|alt| !alt.is_empty())
            .collect();
        let json = serde_json::to_string(&alternatives)?;
        let result = sqlx::query("UPDATE static_messages SET alt_commands = ? WHERE command = ?")
            .bind(json)
            .bind(command.trim())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    pub async fn delete_static_command(&self, command: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM static_messages WHERE command = ?")
            .bind(command.trim())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
