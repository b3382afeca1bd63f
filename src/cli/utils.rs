use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Print a one-line confirmation, or `{"success":true,"message":..,..data}`
pub fn output_success(output_format: OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(target), Some(Value::Object(extra))) = (response.as_object_mut(), data) {
                target.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Print a collection as `{"<key>": [...]}` in JSON mode, or via `render` as text
pub fn output_collection<T, F>(output_format: OutputFormat, key: &str, items: &[T], empty: &str, render: F) -> anyhow::Result<()>
where
    T: Serialize,
    F: Fn(&[T]),
{
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ key: items }))?);
        }
        OutputFormat::Text if items.is_empty() => {
            println!("{}", empty);
        }
        OutputFormat::Text => render(items),
    }
    Ok(())
}
