//! TodoMVC suite
//!
//! Drives the new-todo input of a TodoMVC app served at the base URL.

use crate::core::Result;
use crate::registry::TestRegistry;
use crate::session::Session;

/// Input that creates todos on Enter
pub const NEW_TODO: &str = ".new-todo";

/// Rendered todo items
pub const TODO_ITEMS: &str = ".todo-list li";

/// Register the TodoMVC tests
pub fn register(registry: &mut TestRegistry) -> Result<()> {
    registry.register("adds a todo", adds_a_todo)?;
    registry.register("ignores a blank todo", ignores_a_blank_todo)?;
    Ok(())
}

async fn adds_a_todo(page: Session) -> Result<()> {
    page.navigate("/").await?;
    page.fill(NEW_TODO, "Buy milk").await?;
    page.press_key("Enter").await?;
    page.expect_text(TODO_ITEMS).to_have_text(&["Buy milk"]).await
}

async fn ignores_a_blank_todo(page: Session) -> Result<()> {
    page.navigate("/").await?;
    page.fill(NEW_TODO, "   ").await?;
    page.press_key("Enter").await?;
    page.expect_text(TODO_ITEMS).to_have_count(0).await
}
