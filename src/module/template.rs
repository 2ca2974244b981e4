//! Template resolution over the configured template roots.

use super::Module;
use crate::config::Action;
use crate::error::AppError;
use std::path::Path;

async fn is_readable_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

impl Module {
    /// "search.html" for the list action, otherwise "{action}.html".
    pub fn action_template(&self) -> String {
        match self.current_action {
            Action::List => "search.html".to_string(),
            other => format!("{}.html", other),
        }
    }

    /// Action template prefixed with "process" for posts and lists, "display" otherwise.
    pub fn method_template(&self) -> String {
        let prefix = if self.request.method.is_post() || self.current_action == Action::List {
            "process"
        } else {
            "display"
        };
        format!("{}{}", prefix, self.action_template())
    }

    /// Template path relative to the root it was found in. `None` when the current
    /// action is not permitted.
    pub async fn resolve_template(&mut self) -> Result<Option<String>, AppError> {
        let action = self.current_action;
        if !self.allow(action.as_str()).await {
            tracing::debug!(module = %self.descriptor.module_type, action = %action, "template denied");
            return Ok(None);
        }

        let scope = self.descriptor.module_type.to_lowercase();
        let (action_template, method_template) = (self.action_template(), self.method_template());
        let candidates = [
            format!("{}/{}", scope, action_template),
            format!("{}/{}", scope, method_template),
            action_template,
            method_template,
        ];
        for dir in &self.env.template_dirs {
            for candidate in &candidates {
                if is_readable_file(&dir.join(candidate)).await {
                    tracing::debug!(module = %self.descriptor.module_type, dir = %dir.display(), template = %candidate, "template resolved");
                    return Ok(Some(candidate.clone()));
                }
            }
        }

        Err(AppError::ConfigurationFatal(format!(
            "The action \"{}\" does not exist in {}",
            action, self.descriptor.module_type
        )))
    }
}
