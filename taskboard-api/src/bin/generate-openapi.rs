//! Print the Taskboard OpenAPI document as JSON.
//!
//! Usage:
//!   cargo run -p taskboard-api --bin generate-openapi > openapi.json

use taskboard_api::ApiDoc;

fn main() {
    match ApiDoc::to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize OpenAPI document: {}", e);
            std::process::exit(1);
        }
    }
}
