//! HTML for the admin page.

use sfrest_core::{ConnectionStatus, SettingsError, SettingsField};
use sfrest_oauth::QueryResult;
use url::Url;

use super::handlers::Tab;

const DISCONNECT_FORM: &str =
    r#"<form method="post" action="/token/clear"><button type="submit">Disconnect</button></form>"#;

/// Escapes text for element content and quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(active: Tab, body: &str) -> String {
    let nav: String = [Tab::Settings, Tab::Authorize]
        .into_iter()
        .map(|tab| {
            let class = if tab == active {
                "nav-tab nav-tab-active"
            } else {
                "nav-tab"
            };
            format!(
                r#"<a class="{class}" href="/?tab={}">{}</a>"#,
                tab.key(),
                tab.caption()
            )
        })
        .collect();

    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Salesforce</title></head>\
         <body><h1>Salesforce</h1><h2 class=\"nav-tab-wrapper\">{nav}</h2>{body}</body></html>"
    )
}

fn field_row(field: &SettingsField) -> String {
    let name = field.key.setting_name();
    let input_type = if field.key.is_url() { "url" } else { "text" };
    let input = if field.overridden {
        format!(r#"<input type="{input_type}" id="{name}" name="{name}" value="" disabled>"#)
            + " <em>Set in the environment</em>"
    } else {
        format!(
            r#"<input type="{input_type}" id="{name}" name="{name}" value="{}">"#,
            escape(&field.value)
        )
    };
    format!(
        r#"<tr><th><label for="{name}">{}</label></th><td>{input}</td></tr>"#,
        escape(field.label())
    )
}

fn connection_summary(status: &ConnectionStatus) -> String {
    let Some(instance) = &status.instance_url else {
        return "<p>Not connected.</p>".to_string();
    };
    let since = status
        .since
        .map(|at| format!(" since {}", at.format("%Y-%m-%d %H:%M UTC")))
        .unwrap_or_default();
    format!("<p>Connected to {}{since}.</p>{DISCONNECT_FORM}", escape(instance))
}

/// Settings tab: the form, any validation errors, and the connection summary.
pub fn settings(
    fields: &[SettingsField],
    errors: &[SettingsError],
    status: &ConnectionStatus,
) -> String {
    let mut body = String::new();

    if !errors.is_empty() {
        body.push_str(r#"<div class="error"><ul>"#);
        for error in errors {
            body.push_str(&format!("<li>{}</li>", escape(error.message())));
        }
        body.push_str("</ul></div>");
    }

    body.push_str(r#"<form method="post" action="/settings"><table class="form-table">"#);
    for field in fields {
        body.push_str(&field_row(field));
    }
    body.push_str(r#"</table><p><button type="submit">Save Changes</button></p></form>"#);
    body.push_str(&connection_summary(status));

    page(Tab::Settings, &body)
}

/// Authorize tab when not connected.
pub fn authorize_link(url: &Url) -> String {
    let body = format!(
        r#"<p><a class="button" href="{}">Connect to Salesforce</a></p>"#,
        escape(url.as_str())
    );
    page(Tab::Authorize, &body)
}

/// Authorize tab right after a successful exchange.
pub fn authorized(instance_url: &str) -> String {
    let body = format!(
        "<p>Salesforce is already authorized.</p><p>Instance: {}</p>",
        escape(instance_url)
    );
    page(Tab::Authorize, &body)
}

/// Authorize tab with the query result.
pub fn connected(instance_url: &str, result: &QueryResult) -> String {
    let mut body = format!(
        "<p>Salesforce is already authorized.</p><p>Instance: {}</p><p>{} record(s).</p>",
        escape(instance_url),
        result.total_size
    );

    body.push_str("<table><thead><tr><th>Name</th><th>Id</th></tr></thead><tbody>");
    for record in &result.records {
        let cell = |key: &str| {
            escape(record.get(key).and_then(|v| v.as_str()).unwrap_or_default())
        };
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>",
            cell("Name"),
            cell("Id")
        ));
    }
    body.push_str("</tbody></table>");

    page(Tab::Authorize, &body)
}
