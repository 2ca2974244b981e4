//! Batch edit-column workflow: select rows, then delete them (after confirmation)
//! or set one column on all of them. State lives in the session between requests.

use super::widget::{menu_box, script};
use super::Module;
use crate::error::AppError;
use crate::record::{is_truthy, value_text, Criteria, Record};
use crate::service::RequestValidator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Session key holding a module type's batch state.
pub fn session_key(module_type: &str) -> String {
    format!("edit_column:{}", module_type.to_lowercase())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditPhase {
    #[default]
    Selecting,
    ConfirmingDelete,
    EditingColumn,
}

/// Selection and intent merged across requests.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EditSession {
    #[serde(default)]
    pub selected: BTreeSet<i64>,
    #[serde(default)]
    pub all: bool,
    #[serde(default)]
    pub delete: bool,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub phase: EditPhase,
}

impl EditSession {
    pub fn has_selection(&self) -> bool {
        self.all || !self.selected.is_empty()
    }
}

fn navigation(popup: bool) -> String {
    script(if popup { "window.close();" } else { "history.go(-2);" })
}

impl Module {
    /// One step of the batch workflow. Returns the markup to show; validation problems
    /// come back as `AppError::Validation`.
    pub async fn edit_column(&mut self, popup: bool) -> Result<String, AppError> {
        let key = session_key(&self.descriptor.module_type);
        let post = self.request.post.clone();

        if !self.allow("edit").await || post.contains("No") {
            self.session.clear(&key).await?;
            tracing::debug!(module = %self.descriptor.module_type, "batch edit abandoned");
            return Ok(navigation(popup));
        }

        let mut state = self.load_edit_session(&key).await?;
        if let Some(ids) = post.section(&self.descriptor.id_column) {
            for (id, checked) in ids {
                let Ok(id) = id.parse::<i64>() else {
                    continue;
                };
                if value_text(checked).is_some_and(|t| is_truthy(&t)) {
                    state.selected.insert(id);
                } else {
                    state.selected.remove(&id);
                }
            }
        }
        if post.contains("Delete") {
            state.delete = true;
        }
        if post.contains("All") {
            state.all = true;
        }
        if let Some(column) = post.get_str("Column").filter(|c| !c.is_empty()) {
            state.column = Some(column.to_string());
        }
        self.store_edit_session(&key, &state).await?;

        if !state.has_selection() {
            let verb = if state.delete { "delete" } else { "edit" };
            return Err(AppError::Validation(format!(
                "No IDs were checked, {} has failed.  Please check some items and try again!",
                verb
            )));
        }

        if state.delete {
            return self.batch_delete(&key, state, popup).await;
        }
        self.batch_update(&key, state, popup).await
    }

    async fn batch_delete(&mut self, key: &str, mut state: EditSession, popup: bool) -> Result<String, AppError> {
        if !self.request.post.contains("Check") {
            state.phase = EditPhase::ConfirmingDelete;
            self.store_edit_session(key, &state).await?;
            return Ok(self.edit_dialog(
                popup,
                "Delete",
                "Check",
                "Once deleted these items can <b>not</b> be restored!  Continue anyway?",
            ));
        }
        if state.phase != EditPhase::ConfirmingDelete {
            return Err(AppError::Validation(
                "Deletion has not been confirmed.  Please confirm and try again!".into(),
            ));
        }
        if !self.allow("delete").await {
            self.session.clear(key).await?;
            return Err(AppError::PermissionDenied("Action (delete) not allowed".into()));
        }

        let targets = self.edit_targets(&state).await?;
        let mut failed = 0usize;
        for record in &targets {
            match self.records.delete(&self.descriptor, record).await {
                Ok(true) => {}
                Ok(false) => {
                    failed += 1;
                    tracing::warn!(module = %self.descriptor.module_type, id = record.id, "batch delete refused");
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(module = %self.descriptor.module_type, id = record.id, error = %e, "batch delete failed");
                }
            }
        }
        self.session.clear(key).await?;
        tracing::info!(
            module = %self.descriptor.module_type,
            targets = targets.len(),
            failed,
            "batch delete finished"
        );
        Ok(self.edit_finish(if failed == 0 { "Deletion complete!" } else { "Deletion failed!" }))
    }

    async fn batch_update(&mut self, key: &str, mut state: EditSession, popup: bool) -> Result<String, AppError> {
        let requested = state.column.clone().unwrap_or_default();
        let column = self
            .descriptor
            .column(&requested)
            .filter(|c| c.name != self.descriptor.id_column)
            .filter(|c| !self.descriptor.static_columns.contains(&c.name))
            .cloned();
        let Some(column) = column else {
            self.session.clear(key).await?;
            return Err(AppError::Validation(format!("The column \"{}\" does not exist!", requested)));
        };

        if !self.request.post.contains("Update") {
            state.phase = EditPhase::EditingColumn;
            self.store_edit_session(key, &state).await?;
            self.form = Default::default();
            let input = self.render_field(&column.name, None, &column).await;
            return Ok(self.edit_dialog(popup, "Edit Column", "Update", &input));
        }

        let fields = RequestValidator::posted_fields(&self.descriptor, &self.request.post).clone();
        let posted = fields.get(&column.name);
        let value = if column.is_flag() {
            Value::Bool(posted.and_then(value_text).is_some_and(|t| is_truthy(&t)))
        } else {
            let posted = posted.cloned().unwrap_or(Value::Null);
            if let Err(e) = RequestValidator::validate_column(&column, &posted, &fields) {
                // Selection survives so the dialog can be resubmitted.
                state.phase = EditPhase::EditingColumn;
                self.store_edit_session(key, &state).await?;
                tracing::debug!(module = %self.descriptor.module_type, column = %column.name, error = %e, "batch update rejected");
                return Err(e);
            }
            posted
        };

        let mut targets = self.edit_targets(&state).await?;
        let mut failed = 0usize;
        for record in targets.iter_mut() {
            record.set(column.name.clone(), value.clone());
            match self.records.save(&self.descriptor, record).await {
                Ok(true) => {}
                Ok(false) => {
                    failed += 1;
                    tracing::warn!(module = %self.descriptor.module_type, id = record.id, "batch update refused");
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(module = %self.descriptor.module_type, id = record.id, error = %e, "batch update failed");
                }
            }
        }
        self.session.clear(key).await?;
        tracing::info!(
            module = %self.descriptor.module_type,
            column = %column.name,
            targets = targets.len(),
            failed,
            "batch update finished"
        );
        Ok(self.edit_finish(if failed == 0 { "Update complete!" } else { "Update failed!" }))
    }

    async fn load_edit_session(&self, key: &str) -> Result<EditSession, AppError> {
        let Some(stored) = self.session.get(key).await? else {
            return Ok(EditSession::default());
        };
        match serde_json::from_value(stored) {
            Ok(state) => Ok(state),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding unreadable batch state");
                Ok(EditSession::default())
            }
        }
    }

    async fn store_edit_session(&self, key: &str, state: &EditSession) -> Result<(), AppError> {
        let value = serde_json::to_value(state).map_err(|e| AppError::Persistence(e.to_string()))?;
        self.session.set(key, value).await
    }

    /// Every record when "all" was chosen, otherwise the selected ids.
    async fn edit_targets(&self, state: &EditSession) -> Result<Vec<Record>, AppError> {
        let mut criteria = Criteria::new();
        if !state.all {
            criteria.insert(
                self.descriptor.id_column.clone(),
                Value::Array(state.selected.iter().map(|id| Value::from(*id)).collect()),
            );
        }
        self.records
            .search(&self.descriptor, &criteria, Some(&self.descriptor.id_column))
            .await
    }

    fn edit_dialog(&self, popup: bool, title: &str, button: &str, text: &str) -> String {
        let action = if popup {
            self.uri(&["editcolumn", "popup"])
        } else {
            self.uri(&["editcolumn"])
        };
        let form = format!(
            r#"<form name="EditColumn" action="{action}" method="post">{text}<input type="submit" name="{button}" value="Yes">&nbsp;&nbsp;&nbsp;&nbsp;<input type="submit" name="No" value="No"></form>"#
        );
        menu_box(&format!("{} :: {}", self.title(), title), &form)
    }

    fn edit_finish(&self, text: &str) -> String {
        let url = if self.item.id > 0 {
            self.uri(&[&self.item.id.to_string(), "view"])
        } else {
            self.uri(&["list"])
        };
        format!(r#"<center><h1>{text}</h1> Click <a href="{url}">here</a> to continue.</center>"#)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::record::RecordStore;
    use crate::request::{FormData, Method, RequestContext};
    use crate::session::SessionProvider;
    use serde_json::json;

    fn post(pairs: Vec<(&str, &str)>) -> RequestContext {
        RequestContext::new(Method::Post)
            .with_action("editcolumn")
            .with_post(FormData::from_pairs(pairs))
    }

    async fn stored(f: &Fixture) -> Option<EditSession> {
        f.sessions
            .session("test-session")
            .get(&session_key("Widget"))
            .await
            .unwrap()
            .map(|v| serde_json::from_value(v).unwrap())
    }

    fn seed_widgets(f: &Fixture) -> (i64, i64) {
        let w = f.module_descriptor("Widget");
        (
            f.records.seed(&w, json!({ "Name": "A", "Active": true })).unwrap(),
            f.records.seed(&w, json!({ "Name": "B", "Active": true })).unwrap(),
        )
    }

    #[tokio::test]
    async fn empty_selection_fails_but_keeps_state_for_retry() {
        let f = Fixture::new();
        seed_widgets(&f);

        let mut m = f.open("Widget", post(vec![("Column", "Active")])).await;
        let err = m.edit_column(false).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(
            err.to_string(),
            "No IDs were checked, edit has failed.  Please check some items and try again!"
        );
        assert_eq!(stored(&f).await.unwrap().column.as_deref(), Some("Active"));

        let mut m = f.open("Widget", post(vec![("WidgetID[1]", "1")])).await;
        let html = m.edit_column(false).await.unwrap();
        assert!(html.contains("Widget :: Edit Column"));
        assert!(html.contains(r#"name="Widget[Active]""#));
        assert!(html.contains(r#"name="Update" value="Yes""#));
        assert_eq!(stored(&f).await.unwrap().phase, EditPhase::EditingColumn);
    }

    #[tokio::test]
    async fn delete_cannot_skip_confirmation() {
        let f = Fixture::new();
        let (a, _) = seed_widgets(&f);
        let widget = f.module_descriptor("Widget");

        let mut m = f
            .open("Widget", post(vec![("WidgetID[1]", "1"), ("Delete", "1"), ("Check", "Yes")]))
            .await;
        assert!(matches!(m.edit_column(false).await, Err(AppError::Validation(_))));
        assert!(f.records.load(&widget, a).await.unwrap().is_some());

        let mut m = f.open("Widget", post(vec![("Delete", "1")])).await;
        let html = m.edit_column(false).await.unwrap();
        assert!(html.contains("Widget :: Delete"));
        assert!(html.contains("Once deleted these items can <b>not</b> be restored!"));
        assert_eq!(stored(&f).await.unwrap().phase, EditPhase::ConfirmingDelete);

        let mut m = f.open("Widget", post(vec![("Check", "Yes")])).await;
        let html = m.edit_column(false).await.unwrap();
        assert_eq!(
            html,
            r#"<center><h1>Deletion complete!</h1> Click <a href="/admin/widget/list">here</a> to continue.</center>"#
        );
        assert!(f.records.load(&widget, a).await.unwrap().is_none());
        assert_eq!(f.records.count("Widget"), 1);
        assert!(stored(&f).await.is_none());
    }

    #[tokio::test]
    async fn update_applies_value_to_every_row() {
        let f = Fixture::new();
        let (a, b) = seed_widgets(&f);
        let widget = f.module_descriptor("Widget");

        let mut m = f.open("Widget", post(vec![("All", "1"), ("Column", "Active")])).await;
        m.edit_column(false).await.unwrap();

        let mut m = f.open("Widget", post(vec![("Update", "Yes")])).await;
        let html = m.edit_column(false).await.unwrap();
        assert!(html.contains("Update complete!"));
        for id in [a, b] {
            let r = f.records.load(&widget, id).await.unwrap().unwrap();
            assert_eq!(r.get("Active"), Some(&json!(false)));
        }
        assert!(stored(&f).await.is_none());
    }

    async fn stored_account(f: &Fixture) -> Option<EditSession> {
        f.sessions
            .session("test-session")
            .get(&session_key("Account"))
            .await
            .unwrap()
            .map(|v| serde_json::from_value(v).unwrap())
    }

    #[tokio::test]
    async fn invalid_update_value_is_rejected_and_selection_kept() {
        let f = Fixture::new();
        let account = f.module_descriptor("Account");
        let id = f.records.seed(&account, json!({ "Name": "Ann", "Kind": "internal" })).unwrap();

        let mut m = f.open("Account", post(vec![("AccountID[1]", "1"), ("Column", "Kind")])).await;
        let html = m.edit_column(false).await.unwrap();
        assert!(html.contains("Account :: Edit Column"));

        let mut m = f.open("Account", post(vec![("Update", "Yes"), ("Account[Kind]", "bogus")])).await;
        let err = m.edit_column(false).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.to_string(), "Kind must be one of: internal, contact");
        let row = f.records.load(&account, id).await.unwrap().unwrap();
        assert_eq!(row.get("Kind"), Some(&json!("internal")));
        let state = stored_account(&f).await.unwrap();
        assert_eq!(state.phase, EditPhase::EditingColumn);
        assert!(state.selected.contains(&id));

        let mut m = f.open("Account", post(vec![("Update", "Yes"), ("Account[Kind]", "contact")])).await;
        let html = m.edit_column(false).await.unwrap();
        assert!(html.contains("Update complete!"));
        let row = f.records.load(&account, id).await.unwrap().unwrap();
        assert_eq!(row.get("Kind"), Some(&json!("contact")));
        assert!(stored_account(&f).await.is_none());
    }

    #[tokio::test]
    async fn missing_update_value_is_rejected() {
        let f = Fixture::new();
        let account = f.module_descriptor("Account");
        let id = f.records.seed(&account, json!({ "Name": "Ann", "Kind": "internal" })).unwrap();

        let mut m = f.open("Account", post(vec![("AccountID[1]", "1"), ("Column", "Kind")])).await;
        m.edit_column(false).await.unwrap();

        let mut m = f.open("Account", post(vec![("Update", "Yes")])).await;
        let err = m.edit_column(false).await.unwrap_err();
        assert_eq!(err.to_string(), "Kind is required");
        let row = f.records.load(&account, id).await.unwrap().unwrap();
        assert_eq!(row.get("Kind"), Some(&json!("internal")));
        assert!(stored_account(&f).await.is_some());
    }

    #[tokio::test]
    async fn declining_clears_state_and_navigates_back() {
        let f = Fixture::new();
        seed_widgets(&f);
        let mut m = f.open("Widget", post(vec![("WidgetID[2]", "1"), ("Column", "Active")])).await;
        m.edit_column(false).await.unwrap();
        assert!(stored(&f).await.is_some());

        let mut m = f.open("Widget", post(vec![("No", "No")])).await;
        let html = m.edit_column(false).await.unwrap();
        assert!(html.contains("history.go(-2);"));
        assert!(stored(&f).await.is_none());

        let req = post(vec![("No", "No")]).with_sub_action("popup");
        let mut m = f.open("Widget", req).await;
        m.prepare_template().await;
        assert!(m.template_data()["editColumn"].as_str().unwrap().contains("window.close();"));
    }

    #[tokio::test]
    async fn static_or_unknown_column_is_rejected_and_cleared() {
        let f = Fixture::new();
        seed_widgets(&f);
        let mut m = f.open("Widget", post(vec![("WidgetID[1]", "1"), ("Column", "Name")])).await;
        let err = m.edit_column(false).await.unwrap_err();
        assert_eq!(err.to_string(), r#"The column "Name" does not exist!"#);
        assert!(stored(&f).await.is_none());
    }

    #[tokio::test]
    async fn unchecking_removes_a_selection() {
        let f = Fixture::new();
        seed_widgets(&f);
        let mut m = f.open("Widget", post(vec![("WidgetID[1]", "1"), ("WidgetID[2]", "1"), ("Column", "Active")])).await;
        let _ = m.edit_column(false).await;
        let mut m = f.open("Widget", post(vec![("WidgetID[1]", "0")])).await;
        let _ = m.edit_column(false).await;
        let state = stored(&f).await;
        assert_eq!(state.map(|s| s.selected.into_iter().collect::<Vec<_>>()), Some(vec![2]));
    }
}
