//! Variable-object operations.
//!
//! Every operation keeps the client [`VarTable`](crate::varobj::VarTable)
//! in step with the debugger's own table.

use std::collections::HashSet;

use migdb_mi::Value;

use crate::command::{MiCommand, PrintValues, VarFormat};
use crate::error::SessionError;
use crate::event::SessionEvent;
use crate::session::{lock, Session};
use crate::varobj::{root_of, VarObject};

impl Session {
    /// Create a variable object for `expression` in the current frame.
    pub async fn var_create(&self, expression: &str) -> Result<VarObject, SessionError> {
        let response = self
            .execute(MiCommand::var_create(None, None, expression))
            .await?;
        let mut var = VarObject::from_create(expression, &response.fields)?;
        if var.value.is_none() {
            match self.evaluate_var(&var.name).await {
                Ok(value) => var.value = Some(value),
                Err(e) => {
                    // The debugger already holds the object.
                    self.discard_var(&var.name).await;
                    return Err(e);
                }
            }
        }
        lock(&self.inner.vars).insert(var.clone());
        self.emit(SessionEvent::WatchUpdated(var.clone()));
        Ok(var)
    }

    async fn evaluate_var(&self, name: &str) -> Result<String, SessionError> {
        let response = self
            .execute(MiCommand::var_evaluate_expression(name))
            .await?;
        response
            .fields
            .get_str("value")
            .map(str::to_string)
            .ok_or_else(|| SessionError::InvalidResponse(format!("no value for {name}")))
    }

    /// Fetch the current value of a variable object.
    pub async fn var_eval(&self, name: &str) -> Result<String, SessionError> {
        let value = self.evaluate_var(name).await?;
        if let Some(var) = lock(&self.inner.vars).get_mut(name) {
            var.value = Some(value.clone());
        }
        Ok(value)
    }

    /// Fetch the full expression of a (child) variable object.
    pub async fn var_path_expr(&self, name: &str) -> Result<String, SessionError> {
        let response = self
            .execute(MiCommand::var_info_path_expression(name))
            .await?;
        let path = response
            .fields
            .get_str("path_expr")
            .map(str::to_string)
            .ok_or_else(|| SessionError::InvalidResponse(format!("no path_expr for {name}")))?;
        if let Some(var) = lock(&self.inner.vars).get_mut(name) {
            var.path_expression = Some(path.clone());
        }
        Ok(path)
    }

    /// Assign a new value; returns the value the debugger reports.
    pub async fn var_assign(&self, name: &str, expression: &str) -> Result<String, SessionError> {
        let response = self
            .execute(MiCommand::var_assign(name, expression))
            .await?;
        let value = response.fields.get_str("value").unwrap_or_default().to_string();
        let updated = {
            let mut vars = lock(&self.inner.vars);
            vars.get_mut(name).map(|var| {
                var.value = Some(value.clone());
                var.clone()
            })
        };
        if let Some(var) = updated {
            self.emit(SessionEvent::WatchUpdated(var));
        }
        Ok(value)
    }

    /// Change the display format; returns the value in the new format.
    pub async fn var_set_format(&self, name: &str, format: VarFormat) -> Result<String, SessionError> {
        let response = self
            .execute(MiCommand::var_set_format(name, format))
            .await?;
        let value = response.fields.get_str("value").unwrap_or_default().to_string();
        if let Some(var) = lock(&self.inner.vars).get_mut(name) {
            var.value = Some(value.clone());
        }
        Ok(value)
    }

    /// Delete a variable object and its descendants. Returns the names
    /// dropped from the client table.
    pub async fn var_delete(&self, name: &str) -> Result<Vec<String>, SessionError> {
        self.execute(MiCommand::var_delete(name)).await?;
        Ok(lock(&self.inner.vars).remove_tree(name))
    }

    /// Best-effort `-var-delete` on a cleanup path; failures are logged.
    pub(crate) async fn discard_var(&self, name: &str) {
        if let Err(e) = self.execute(MiCommand::var_delete(name)).await {
            tracing::warn!("could not delete variable object {}: {}", name, e);
        }
        lock(&self.inner.vars).remove_tree(name);
    }

    /// List children, replacing the cached ones wholesale.
    ///
    /// Children without an inline value get it fetched, and every child
    /// gets its path expression. Failures of those follow-ups are logged
    /// and leave the field empty.
    pub async fn var_list_children(&self, name: &str) -> Result<Vec<VarObject>, SessionError> {
        let response = self
            .execute(MiCommand::var_list_children(name, PrintValues::AllValues))
            .await?;
        let mut children: Vec<VarObject> = response
            .fields
            .get_list("children")
            .map(|list| {
                list.items()
                    .into_iter()
                    .filter_map(Value::as_tuple)
                    .filter_map(VarObject::from_child)
                    .collect()
            })
            .unwrap_or_default();

        for child in &mut children {
            if child.value.is_none() {
                match self.evaluate_var(&child.name).await {
                    Ok(value) => child.value = Some(value),
                    Err(e) => tracing::debug!("no value for {}: {}", child.name, e),
                }
            }
            match self
                .execute(MiCommand::var_info_path_expression(&child.name))
                .await
            {
                Ok(response) => {
                    child.path_expression = response.fields.get_str("path_expr").map(str::to_string)
                }
                Err(e) => tracing::debug!("no path expression for {}: {}", child.name, e),
            }
        }

        lock(&self.inner.vars).set_children(name, children.clone())?;
        Ok(children)
    }

    /// Refresh every variable object from the debugger's change list.
    ///
    /// Raises one [`SessionEvent::WatchUpdated`] per changed object and one
    /// [`SessionEvent::RootUpdated`] per affected root, then re-decodes the
    /// affected watches.
    pub async fn var_update(&self) -> Result<Vec<VarObject>, SessionError> {
        let response = self
            .execute(MiCommand::var_update(None, PrintValues::AllValues))
            .await?;
        let updated: Vec<VarObject> = {
            let mut vars = lock(&self.inner.vars);
            response
                .fields
                .get_list("changelist")
                .map(|list| {
                    list.items()
                        .into_iter()
                        .filter_map(Value::as_tuple)
                        .filter_map(|change| vars.apply_update(change))
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut roots: Vec<&str> = Vec::new();
        for var in &updated {
            self.emit(SessionEvent::WatchUpdated(var.clone()));
            let root = root_of(&var.name);
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        for root in roots {
            self.emit(SessionEvent::RootUpdated(root.to_string()));
        }

        let changed: HashSet<String> = updated.iter().map(|var| var.name.clone()).collect();
        if !changed.is_empty() {
            self.refresh_watches(&changed).await;
        }
        Ok(updated)
    }
}
