//! HTML controls used by admin forms and search grids.

use crate::case::html_escape;

/// Postal state codes offered by the address block.
pub const STATES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN", "IA", "KS",
    "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ", "NM", "NY", "NC",
    "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT", "VA", "WA", "WV", "WI", "WY",
];

/// Form input name for a module column: `Widget[Name]`.
pub fn field_name(module_type: &str, column: &str) -> String {
    format!("{module_type}[{column}]")
}

/// DOM id for a module column: `Widget_Name`.
pub fn field_id(module_type: &str, column: &str) -> String {
    format!("{module_type}_{column}")
}

/// Labelled field row.
pub fn field(label: &str, data: &str) -> String {
    let label = html_escape(label);
    format!(r##"<div class="field"><span class="label">{label}</span><span class="data">{data}</span></div>"##)
}

pub fn select(name: &str, id: &str, options: &[(String, String)], selected: Option<&str>) -> String {
    let options_html: String = options
        .iter()
        .map(|(value, text)| {
            let mark = if Some(value.as_str()) == selected { " selected" } else { "" };
            format!(
                r#"<option value="{}"{mark}>{}</option>"#,
                html_escape(value),
                html_escape(text)
            )
        })
        .collect();
    format!(r#"<select name="{name}" id="{id}">{options_html}</select>"#)
}

pub fn text_input(name: &str, id: &str, value: Option<&str>) -> String {
    let value = html_escape(value.unwrap_or(""));
    format!(r#"<input type="text" name="{name}" id="{id}" value="{value}">"#)
}

pub fn hidden(name: &str, id: &str, value: Option<&str>) -> String {
    let value = html_escape(value.unwrap_or(""));
    format!(r#"<input type="hidden" name="{name}" id="{id}" value="{value}">"#)
}

/// Rich-text editor with the basic toolbar.
pub fn editor(name: &str, id: &str, value: Option<&str>) -> String {
    let value = html_escape(value.unwrap_or(""));
    format!(r#"<textarea class="editor" data-toolbar="Basic" name="{name}" id="{id}">{value}</textarea>"#)
}

pub fn radio_group(name: &str, id: &str, values: &[String], selected: Option<&str>) -> String {
    values
        .iter()
        .map(|v| {
            let checked = if Some(v.as_str()) == selected { " checked" } else { "" };
            let v = html_escape(v);
            format!(r#"{v}:  <input type="radio" name="{name}" id="{id}" value="{v}"{checked}><br />"#)
        })
        .collect()
}

/// Date picker.
pub fn calendar(name: &str, id: &str, value: Option<&str>) -> String {
    let value = html_escape(value.unwrap_or(""));
    format!(
        r#"<input type="date" class="calendar" name="{name}" id="{id}" value="{value}"> <button type="button" class="calendar-button" data-for="{id}">Change</button>"#
    )
}

/// Comparison operator shown before a search date.
pub fn date_operator(column: &str) -> String {
    let column = html_escape(column);
    format!(
        "<select name=\"{column}Operator\"><option>&lt;</option><option selected>=</option><option>&gt;</option></select>\n"
    )
}

pub fn password(name: &str, id: &str, value: Option<&str>) -> String {
    let value = html_escape(value.unwrap_or(""));
    format!(r#"<input type="password" name="{name}" id="{id}" value="{value}">"#)
}

pub fn checkbox(name: &str, id: &str, checked: bool) -> String {
    let checked = if checked { r#" checked="checked""# } else { "" };
    format!(r#"<input type="checkbox" name="{name}" id="{id}" value="1"{checked}>"#)
}

pub fn file_input(name: &str, id: &str) -> String {
    format!(r#"<input type="file" name="{name}" id="{id}">"#)
}

pub fn script(body: &str) -> String {
    format!("<script type=\"text/javascript\">{body}</script>\n")
}

/// Clickable sort header for a search grid column.
pub fn sort_header(column: &str, label: &str) -> String {
    format!(
        r#"<a class="sort-header" href="?sort={}">{}</a>"#,
        html_escape(column),
        html_escape(label)
    )
}

/// Boxed dialog with a title bar.
pub fn menu_box(title: &str, content: &str) -> String {
    let title = html_escape(title);
    format!(
        r##"<div class="menu">
  <div class="menu-title">{title}</div>
  <div class="menu-content">{content}</div>
</div>"##
    )
}
