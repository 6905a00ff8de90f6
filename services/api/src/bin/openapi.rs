//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI 3.0 document for the duel API to disk, so clients can
//! be generated without standing up a server. The output path defaults to
//! `openapi.json` and can be overridden as the first argument.

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());
    std::fs::write(&path, ApiDoc::openapi().to_pretty_json()?)?;
    println!("wrote OpenAPI document to {path}");
    Ok(())
}
