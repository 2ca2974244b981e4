//! API phase: direct record access by HTTP method, no templates.

use super::Module;
use crate::error::AppError;
use crate::record::{clean_criteria, Criteria, Record};
use crate::request::Method;
use crate::service::RequestValidator;
use serde_json::Value;

/// Result of an API request.
#[derive(Clone, Debug, PartialEq)]
pub enum ApiOutcome {
    List(Vec<Value>),
    Item(Value),
    Created(Value),
    /// Which view the caller should show next: "list" or "view".
    Hint(String),
}

impl Module {
    async fn require(&mut self, component: &str) -> Result<(), AppError> {
        if self.allow(component).await {
            Ok(())
        } else {
            Err(AppError::PermissionDenied(format!("Action ({}) not allowed", component)))
        }
    }

    fn require_item(&self) -> Result<(), AppError> {
        if self.item.id > 0 {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("{} not found", self.descriptor.module_type)))
        }
    }

    /// Serve the request straight from the record store.
    pub async fn process_api(&mut self) -> Result<ApiOutcome, AppError> {
        let has_id = self.request.id.is_some();
        match self.request.method {
            Method::Get => {
                self.require("search").await?;
                if has_id {
                    self.require_item()?;
                    return Ok(ApiOutcome::Item(self.item.to_json()));
                }
                let raw = self
                    .request
                    .query
                    .section(&self.descriptor.module_type)
                    .unwrap_or_else(|| self.request.query.as_map());
                let criteria: Criteria = clean_criteria(raw)
                    .into_iter()
                    .filter(|(k, _)| self.descriptor.has_column(k))
                    .collect();
                let found = self
                    .records
                    .search(&self.descriptor, &criteria, Some(&self.descriptor.id_column))
                    .await?;
                Ok(ApiOutcome::List(found.iter().map(Record::to_json).collect()))
            }
            Method::Put => {
                self.require("edit").await?;
                if !has_id {
                    return Ok(ApiOutcome::Hint("list".into()));
                }
                self.require_item()?;
                let data = RequestValidator::edit_data(&self.descriptor, &self.request.post)?;
                self.item.set_all(data);
                if !self.records.save(&self.descriptor, &mut self.item).await? {
                    return Err(AppError::Persistence(format!(
                        "This {} update has failed.",
                        self.descriptor.module_type
                    )));
                }
                tracing::info!(module = %self.descriptor.module_type, id = self.item.id, "updated");
                Ok(ApiOutcome::Hint("view".into()))
            }
            Method::Post => {
                if has_id {
                    return Err(AppError::BadRequest("POST creates; use PUT to update an item".into()));
                }
                self.require("create").await?;
                let data = RequestValidator::create_data(&self.descriptor, &self.request.post)?;
                let mut record = Record::new(&self.descriptor);
                record.set_all(data);
                if !self.records.save(&self.descriptor, &mut record).await? {
                    return Err(AppError::Persistence(format!(
                        "This {} could not be created.",
                        self.descriptor.module_type
                    )));
                }
                tracing::info!(module = %self.descriptor.module_type, id = record.id, "created");
                self.item = record;
                Ok(ApiOutcome::Created(self.item.to_json()))
            }
            Method::Delete => {
                if !has_id {
                    return Err(AppError::MultipleDeletion);
                }
                self.require("delete").await?;
                self.require_item()?;
                if !self.records.delete(&self.descriptor, &self.item).await? {
                    return Err(AppError::Persistence(format!(
                        "This {} could not be deleted.",
                        self.descriptor.module_type
                    )));
                }
                tracing::info!(module = %self.descriptor.module_type, id = self.item.id, "deleted");
                Ok(ApiOutcome::Hint("list".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::permission::AuthorizationProvider;
    use crate::record::RecordStore;
    use crate::request::{FormData, RequestContext};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Grants everything except `deny`, remembering every component asked about.
    struct Asked {
        deny: &'static str,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AuthorizationProvider for Asked {
        async fn has_resource(&self, _module_type: &str, component: &str) -> bool {
            self.seen.lock().unwrap().push(component.to_string());
            component != self.deny
        }
    }

    fn asked(deny: &'static str) -> Arc<Asked> {
        Arc::new(Asked { deny, seen: Mutex::new(Vec::new()) })
    }

    #[tokio::test]
    async fn delete_without_id_is_refused_regardless_of_permission() {
        let provider = asked("delete");
        let f = Fixture::with_authorizer(provider.clone());
        let mut m = f.open("Widget", RequestContext::new(Method::Delete)).await;
        assert!(matches!(m.process_api().await, Err(AppError::MultipleDeletion)));
        assert!(provider.seen.lock().unwrap().is_empty());

        let f = Fixture::new();
        let mut m = f.open("Widget", RequestContext::new(Method::Delete)).await;
        assert!(matches!(m.process_api().await, Err(AppError::MultipleDeletion)));
    }

    #[tokio::test]
    async fn delete_one_item() {
        let f = Fixture::new();
        let widget = f.module_descriptor("Widget");
        let id = f.records.seed(&widget, json!({ "Name": "Cog" })).unwrap();
        let mut m = f.open("Widget", RequestContext::new(Method::Delete).with_id(id)).await;
        assert_eq!(m.process_api().await.unwrap(), ApiOutcome::Hint("list".into()));
        assert!(f.records.load(&widget, id).await.unwrap().is_none());

        let provider = asked("delete");
        let f = Fixture::with_authorizer(provider);
        let mut m = f.open("Widget", RequestContext::new(Method::Delete).with_id(id)).await;
        assert!(matches!(m.process_api().await, Err(AppError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn post_creates_without_consulting_delete() {
        let provider = asked("delete");
        let f = Fixture::with_authorizer(provider.clone());
        let post = FormData::from_pairs(vec![("Widget[Name]", "Cog"), ("Widget[Active]", "1")]);
        let mut m = f.open("Widget", RequestContext::new(Method::Post).with_post(post)).await;
        let ApiOutcome::Created(created) = m.process_api().await.unwrap() else {
            panic!("expected a created item");
        };
        assert_eq!(created["WidgetID"], json!(1));
        assert_eq!(created["Active"], json!(true));
        assert_eq!(*provider.seen.lock().unwrap(), vec!["create".to_string()]);

        let mut m = f.open("Widget", RequestContext::new(Method::Post).with_id(1)).await;
        assert!(matches!(m.process_api().await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn get_lists_and_fetches() {
        let f = Fixture::new();
        let widget = f.module_descriptor("Widget");
        f.records.seed(&widget, json!({ "Name": "Cog", "Active": true })).unwrap();
        f.records.seed(&widget, json!({ "Name": "Gear", "Active": false })).unwrap();

        let query = FormData::from_pairs(vec![("Active", "1"), ("Bogus", "x")]);
        let mut m = f.open("Widget", RequestContext::new(Method::Get).with_query(query)).await;
        let ApiOutcome::List(rows) = m.process_api().await.unwrap() else {
            panic!("expected a list");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Name"], json!("Cog"));

        let mut m = f.open("Widget", RequestContext::new(Method::Get).with_id(2)).await;
        assert_eq!(
            m.process_api().await.unwrap(),
            ApiOutcome::Item(json!({ "WidgetID": 2, "Name": "Gear", "Active": false }))
        );

        let mut m = f.open("Widget", RequestContext::new(Method::Get).with_id(42)).await;
        let err = m.process_api().await.unwrap_err();
        assert_eq!(err.to_string(), "Widget not found");
    }

    #[tokio::test]
    async fn put_updates_and_hints_next_view() {
        let f = Fixture::new();
        let widget = f.module_descriptor("Widget");
        let id = f.records.seed(&widget, json!({ "Name": "Cog", "Active": true })).unwrap();

        let mut m = f.open("Widget", RequestContext::new(Method::Put)).await;
        assert_eq!(m.process_api().await.unwrap(), ApiOutcome::Hint("list".into()));

        let post = FormData::from_pairs(vec![("Widget[Name]", "Sprocket"), ("Widget[Active]", "1")]);
        let mut m = f.open("Widget", RequestContext::new(Method::Put).with_id(id).with_post(post)).await;
        assert_eq!(m.process_api().await.unwrap(), ApiOutcome::Hint("view".into()));
        let saved = f.records.load(&widget, id).await.unwrap().unwrap();
        assert_eq!(saved.get("Name"), Some(&json!("Sprocket")));

        let provider = asked("edit");
        let f = Fixture::with_authorizer(provider);
        let mut m = f.open("Widget", RequestContext::new(Method::Put)).await;
        assert!(matches!(m.process_api().await, Err(AppError::PermissionDenied(_))));
    }
}
