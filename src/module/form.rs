//! Form field renderer and search-grid markup.

use super::widget::{
    calendar, checkbox, date_operator, editor, field, field_id, field_name, file_input, hidden, password,
    radio_group, script, select, sort_header, text_input, STATES,
};
use super::Module;
use crate::case::{foreign_key_entity, html_escape, js_escape};
use crate::config::{ColumnDescriptor, ColumnKind};
use crate::record::{is_truthy, value_text, Criteria};
use serde_json::{Map, Value};

/// Per-form render state. The address block is emitted once per form.
#[derive(Clone, Debug, Default)]
pub struct FormState {
    address_done: bool,
}

const ADDRESS_FIELDS: [&str; 3] = ["State", "City", "Zip"];

impl Module {
    /// Render every column as one form, values taken from `values` by column name.
    pub async fn render_fields(&mut self, columns: &[ColumnDescriptor], values: &Map<String, Value>) -> String {
        self.form = FormState::default();
        let mut html = String::new();
        for column in columns {
            let value = values.get(&column.name).and_then(value_text);
            html.push_str(&self.render_field(&column.name, value.as_deref(), column).await);
        }
        html
    }

    /// Markup for one field. Address parts, references and file uploads are special-cased
    /// before the column kind decides.
    pub async fn render_field(&mut self, name: &str, value: Option<&str>, column: &ColumnDescriptor) -> String {
        let mut value = value.filter(|v| !v.is_empty()).map(str::to_string);
        if value.is_none() && !self.is_search() {
            value = column.default_value.clone();
        }
        let value = value.as_deref();

        if ADDRESS_FIELDS.contains(&name) {
            return self.address_field(name, value);
        }
        if let Some(html) = self.reference_field(name, value).await {
            return html;
        }
        if name == "FileName" {
            let module_type = &self.descriptor.module_type;
            return field("File Name", &file_input(&field_name(module_type, name), &field_id(module_type, name)));
        }
        self.typed_field(name, value, column)
    }

    fn address_field(&mut self, name: &str, value: Option<&str>) -> String {
        let seed = value.map(|v| script(&format!("set{}('{}');", name, js_escape(v))));
        if self.form.address_done {
            return seed.unwrap_or_default();
        }
        self.form.address_done = true;
        let mut html = self.address_block();
        if let Some(seed) = seed {
            html.push_str(&seed);
        }
        html
    }

    fn address_block(&self) -> String {
        let t = &self.descriptor.module_type;
        let none = |what: &str| {
            if self.is_search() {
                "None".to_string()
            } else {
                format!("Select {}", what)
            }
        };
        let mut states = vec![(String::new(), none("State"))];
        states.extend(STATES.iter().map(|s| (s.to_string(), s.to_string())));
        let (state_id, city_id, zip_id) = (field_id(t, "State"), field_id(t, "City"), field_id(t, "Zip"));

        let mut html = field("State", &select(&field_name(t, "State"), &state_id, &states, None));
        html.push_str(&field(
            "City",
            &select(&field_name(t, "City"), &city_id, &[(String::new(), none("City"))], None),
        ));
        html.push_str(&field(
            "Zip",
            &select(&field_name(t, "Zip"), &zip_id, &[(String::new(), none("Zip"))], None),
        ));

        let lookup = js_escape(&self.env.lookup_uri);
        html.push_str(&script(&format!(
            r#"
function fillAddress(id, query, placeholder) {{
  var target = document.getElementById(id);
  fetch('{lookup}?' + query).then(function (r) {{ return r.json(); }}).then(function (items) {{
    var keep = target.dataset.pending || target.value;
    target.innerHTML = '';
    target.appendChild(new Option(placeholder, ''));
    items.forEach(function (item) {{ target.appendChild(new Option(item, item, false, item === keep)); }});
    delete target.dataset.pending;
  }});
}}
function setState(v) {{ document.getElementById('{state_id}').value = v; fillAddress('{city_id}', 'state=' + encodeURIComponent(v), 'Select City'); }}
function setCity(v) {{ document.getElementById('{city_id}').dataset.pending = v; fillAddress('{zip_id}', 'city=' + encodeURIComponent(v), 'Select Zip'); }}
function setZip(v) {{ document.getElementById('{zip_id}').dataset.pending = v; }}
document.getElementById('{state_id}').addEventListener('change', function () {{ setState(this.value); }});
document.getElementById('{city_id}').addEventListener('change', function () {{ setCity(this.value); }});
"#
        )));
        html
    }

    /// Select over the referenced entity's visible, active records. `None` when the
    /// name is not a reference or the entity cannot back a select.
    async fn reference_field(&mut self, name: &str, value: Option<&str>) -> Option<String> {
        let (entity, label) = match name {
            "UserID" => ("User", Some("User")),
            "KeyID" => ("ResourceKey", Some("Required resource")),
            other => (foreign_key_entity(other)?, None),
        };
        let referenced = self.env.model.module(entity)?.clone();
        let name_column = referenced.name_column.clone()?;

        let mut criteria = Criteria::new();
        for flag in ["Visible", "Active"] {
            if referenced.has_column(flag) {
                criteria.insert(flag.to_string(), Value::Bool(true));
            }
        }
        let rows = match self.records.search(&referenced, &criteria, Some(&name_column)).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(module = %referenced.module_type, error = %e, "reference options failed");
                return None;
            }
        };

        let title = referenced.title();
        let placeholder = if self.is_search() {
            "None".to_string()
        } else {
            format!("Select {}", title)
        };
        let mut options = vec![(String::new(), placeholder)];
        options.extend(rows.iter().map(|r| (r.id.to_string(), r.name().unwrap_or_default())));

        let t = &self.descriptor.module_type;
        let control = select(&field_name(t, name), &field_id(t, name), &options, value);
        Some(field(label.unwrap_or(&title), &control))
    }

    fn typed_field(&self, name: &str, value: Option<&str>, column: &ColumnDescriptor) -> String {
        let t = &self.descriptor.module_type;
        let (input_name, id) = (field_name(t, name), field_id(t, name));
        let label = self.column_title(name);
        match &column.kind {
            ColumnKind::Hidden => hidden(&input_name, &id, value),
            ColumnKind::Enum { options } => {
                let placeholder = if self.is_search() {
                    "None".to_string()
                } else {
                    format!("Select {}", label)
                };
                let mut choices = vec![(String::new(), placeholder)];
                choices.extend(options.iter().map(|o| (o.value.clone(), o.label.clone())));
                field(&label, &select(&input_name, &id, &choices, value))
            }
            ColumnKind::RichText => field(&label, &editor(&input_name, &id, value)),
            ColumnKind::Radio => field(&label, &radio_group(&input_name, &id, &column.values, value)),
            ColumnKind::Numeric | ColumnKind::Text => field(&label, &text_input(&input_name, &id, value)),
            ColumnKind::Date => field(&label, &calendar(&input_name, &id, value)),
            ColumnKind::SearchDate => {
                let control = format!("{}{}", date_operator(name), calendar(&input_name, &id, value));
                field(&label, &control)
            }
            ColumnKind::Password => {
                let confirm = format!("{}2", name);
                let mut html = field(&label, &password(&input_name, &id, value));
                html.push_str(&field(
                    &format!("{} (double check)", label),
                    &password(&field_name(t, &confirm), &field_id(t, &confirm), value),
                ));
                html
            }
            ColumnKind::Boolean => field(&label, &checkbox(&input_name, &id, value.is_some_and(is_truthy))),
            ColumnKind::Unrecognized { family } => {
                field("Not valid", &html_escape(&format!("{} :: {}", name, family)))
            }
        }
    }

    /// Search grid header cell. Edit columns get an `[Edit]` trigger posting the checked rows.
    pub async fn search_grid_header(&mut self, column: &str) -> String {
        let header = sort_header(column, &self.column_title(column));
        let is_static = self.descriptor.static_columns.iter().any(|c| c == column);
        if is_static || !self.allow("edit").await {
            return header;
        }
        if !self.descriptor.edit_columns.iter().any(|c| c == column) {
            return header;
        }
        let (action, target) = if self.env.use_popups {
            (self.uri(&["editcolumn", "popup"]), r#" formtarget="_blank""#)
        } else {
            (self.uri(&["editcolumn"]), "")
        };
        format!(
            r#"{header} <span class="edit-column">[<button type="submit" name="Column" value="{}" formaction="{action}"{target}>Edit</button>]</span>"#,
            html_escape(column)
        )
    }

    /// Checkbox and view link leading each search grid row.
    pub fn search_grid_row_control(&self, id: i64) -> String {
        let id_column = &self.descriptor.id_column;
        format!(
            r#"<input type="checkbox" class="SortGridCellCheckbox" name="{id_column}[{id}]" id="{id_column}_{id}" value="1"> [<a href="{}">View</a>]"#,
            self.uri(&[&id.to_string()])
        )
    }
}
